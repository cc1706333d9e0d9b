use crate::branch::{BranchClassifier, BranchKind, BranchPattern};
use crate::commands;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::repo::RepositoryProxy;
use crate::types::{RevNum, TicketMap, TicketMention};

/// Ceiling on bring/deliver property chasing. The property graph is acyclic
/// in a healthy repository; hitting the ceiling means a cycle or vandalized
/// properties, and the collection fails closed instead of recursing forever.
pub const MAX_PROPAGATION_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// RevisionCollector
// ---------------------------------------------------------------------------

/// Resolves revision ranges to the revisions actually sitting on one branch,
/// and expands bring/deliver propagation properties into the set of tickets
/// a cross-branch operation carries.
pub struct RevisionCollector<'a> {
    repo: &'a dyn RepositoryProxy,
    pattern: &'a BranchPattern,
    classifier: &'a BranchClassifier,
    config: &'a GateConfig,
}

impl<'a> RevisionCollector<'a> {
    pub fn new(
        repo: &'a dyn RepositoryProxy,
        pattern: &'a BranchPattern,
        classifier: &'a BranchClassifier,
        config: &'a GateConfig,
    ) -> Self {
        Self {
            repo,
            pattern,
            classifier,
            config,
        }
    }

    /// All revisions in `[first, second]` sitting on the branch of `first`.
    ///
    /// Both endpoints must resolve, and to the same branch. Revisions inside
    /// the range that resolve to another branch, or to no branch at all
    /// (paths deleted mid-range), are skipped; an integrity fault from the
    /// branch lookup aborts the whole collection.
    pub fn branch_revisions(&self, first: RevNum, second: Option<RevNum>) -> Result<Vec<RevNum>> {
        let second = second.unwrap_or(first);
        if first > second {
            return Err(GateError::InvalidRange(first, second));
        }

        let first_branch = self
            .repo
            .find_revision_branch(first, self.pattern)?
            .ok_or(GateError::NoSuchRevision(first))?;
        let second_branch = self
            .repo
            .find_revision_branch(second, self.pattern)?
            .ok_or(GateError::NoSuchRevision(second))?;
        if first_branch != second_branch {
            return Err(GateError::IncoherentRange {
                first,
                second,
                first_branch,
                second_branch,
            });
        }

        let mut revisions = Vec::new();
        for rev in first..=second {
            match self.repo.find_revision_branch(rev, self.pattern)? {
                Some(branch) if branch == first_branch => revisions.push(rev),
                _ => {}
            }
        }
        Ok(revisions)
    }

    /// Expand the revision set into `ticket -> [(author, log)]`, chasing
    /// propagation properties depth-first.
    ///
    /// A revision carrying a propagation property contributes the tickets of
    /// the revisions named there instead of its own log; the sub-map is
    /// spliced wholesale, so a ticket reached through two branches keeps the
    /// later branch's mentions (kept for compatibility with the previous
    /// generation of this hook). The property consulted is `deliver` when
    /// the collection is hinted at trunk or an admin branch, `bring`
    /// otherwise.
    pub fn tickets(&self, revisions: &[RevNum], branch_hint: Option<&str>) -> Result<TicketMap> {
        self.tickets_at_depth(revisions, branch_hint, 0)
    }

    fn tickets_at_depth(
        &self,
        revisions: &[RevNum],
        branch_hint: Option<&str>,
        depth: usize,
    ) -> Result<TicketMap> {
        if depth > MAX_PROPAGATION_DEPTH {
            return Err(GateError::PropagationCycle);
        }

        let prop_name = match branch_hint {
            Some(branch)
                if matches!(
                    self.classifier.classify(branch),
                    BranchKind::Trunk | BranchKind::AdminBranch
                ) =>
            {
                &self.config.properties.deliver
            }
            _ => &self.config.properties.bring,
        };

        let mut tickets = TicketMap::new();
        for &rev in revisions {
            let prop = self
                .repo
                .revision_property(rev, prop_name)?
                .filter(|value| !value.is_empty());
            if let Some(value) = prop {
                let linked = parse_revision_list(rev, prop_name, &value)?;
                let sub = self.tickets_at_depth(&linked, branch_hint, depth + 1)?;
                tickets.extend(sub);
            } else {
                let log = self.repo.revision_log(rev)?;
                if let Some(ticket) = commands::leading_ticket(&log) {
                    let author = self.repo.revision_author(rev)?;
                    tickets
                        .entry(ticket)
                        .or_default()
                        .push(TicketMention { author, log });
                }
            }
        }
        Ok(tickets)
    }
}

fn parse_revision_list(rev: RevNum, prop_name: &str, value: &str) -> Result<Vec<RevNum>> {
    value
        .split(',')
        .map(|item| {
            item.trim().parse().map_err(|_| {
                GateError::Repository(format!("malformed {prop_name} property on r{rev}"))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
