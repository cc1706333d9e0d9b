use crate::access::AccessPolicy;
use crate::branch::{BranchClassifier, BranchKind, BranchPattern};
use crate::collector::{RevisionCollector, MAX_PROPAGATION_DEPTH};
use crate::commands;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::repo::{ExternalProjects, RepositoryProxy};
use crate::tracker::{self, IssueTracker, Ticket};
use crate::types::{ChangeKind, ChangesetKind, Commit, RevNum, TicketId, WorkflowCommand};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// PolicyEngine
// ---------------------------------------------------------------------------

/// Single-shot pre-commit evaluation: one commit in, either a rewritten log
/// message out or the first violated rule as the rejection reason. All
/// collaborator state is injected; the engine holds nothing across calls.
pub struct PolicyEngine<'a> {
    config: &'a GateConfig,
    access: &'a AccessPolicy,
    repo: &'a dyn RepositoryProxy,
    tracker: &'a dyn IssueTracker,
    externals: &'a dyn ExternalProjects,
    pattern: BranchPattern,
    classifier: BranchClassifier,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(
        config: &'a GateConfig,
        access: &'a AccessPolicy,
        repo: &'a dyn RepositoryProxy,
        tracker: &'a dyn IssueTracker,
        externals: &'a dyn ExternalProjects,
    ) -> Result<Self> {
        Ok(Self {
            config,
            access,
            repo,
            tracker,
            externals,
            pattern: config.branch_pattern()?,
            classifier: BranchClassifier::new(&config.branches),
        })
    }

    /// Evaluate the pending commit. `Ok` carries the canonicalized (and for
    /// cross-branch operations, audit-annotated) log message to persist;
    /// `Err` carries the rejection reason. Failure of any rule aborts the
    /// whole transaction — a rewritten log is never partially applied.
    pub fn evaluate(&self, commit: &Commit) -> Result<String> {
        let log = commands::normalize_log(&commit.log)?;

        // Structural vetoes come before any command-specific rule. The move
        // detector runs first: a move necessarily spans two branch paths and
        // would otherwise be misreported as a multi-branch commit.
        if self.classifier.is_branch_move(&commit.changed_paths) {
            return Err(GateError::BranchMove);
        }
        let _ = self.repo.find_commit_branch(&self.pattern, false)?;

        match WorkflowCommand::parse(&log)? {
            WorkflowCommand::AdminCommit => {
                self.check_admin(commit)?;
                Ok(log)
            }
            WorkflowCommand::TerminateBranch { force } => {
                self.check_terminate(commit, force)?;
                Ok(log)
            }
            WorkflowCommand::CreateBranch { ticket } => {
                self.check_create(commit, ticket)?;
                Ok(log)
            }
            WorkflowCommand::TicketAction { ticket, .. } => {
                self.check_ticket_action(ticket)?;
                Ok(log)
            }
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Deliver,
                first,
                second,
                force,
            } => self.check_deliver(commit, &log, first, second, force),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Bring,
                first,
                second,
                ..
            } => self.check_bring(&log, first, second),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Revert,
                first,
                second,
                ..
            } => self.check_revert(commit, &log, first, second, 0),
            WorkflowCommand::ExternalsUpdate { project, url, rev } => {
                self.check_externals(commit, &project, &url, rev)?;
                Ok(log)
            }
        }
    }

    fn collector(&self) -> RevisionCollector<'_> {
        RevisionCollector::new(self.repo, &self.pattern, &self.classifier, self.config)
    }

    // --- command rules -----------------------------------------------------

    fn check_admin(&self, commit: &Commit) -> Result<()> {
        if !self.access.is_admin(&commit.author) {
            return Err(GateError::AdminCommitDenied);
        }
        Ok(())
    }

    fn check_terminate(&self, commit: &Commit, force: bool) -> Result<()> {
        let mut paths = commit.changed_paths.iter();
        let Some((path, kind)) = paths.next() else {
            return Err(GateError::TerminateNothingDeleted);
        };
        if paths.next().is_some() {
            return Err(GateError::TerminateMultiple);
        }
        if *kind != ChangeKind::Delete {
            return Err(GateError::TerminateNotDelete(path.clone()));
        }
        if force {
            return Ok(());
        }

        let target = self.repo.find_commit_branch(&self.pattern, false)?;
        let is_sandbox = target
            .as_deref()
            .map(|b| self.classifier.classify(b) == BranchKind::Sandbox)
            .unwrap_or(false);
        if !is_sandbox {
            return Err(GateError::TerminateNonBranch(
                self.classifier.dev_dirs_label(),
            ));
        }

        // Only the branch's original creator may delete it.
        let youngest = self
            .repo
            .youngest_path_revision(path)?
            .ok_or_else(|| GateError::MalformedBranch(path.clone()))?;
        let history = self.repo.history(youngest, path, None)?;
        let (creation_rev, _) = history
            .last()
            .ok_or_else(|| GateError::MalformedBranch(path.clone()))?;
        let creator = self.repo.revision_author(*creation_rev)?;
        if creator != commit.author {
            return Err(GateError::NotSelfOwned {
                branch: path.clone(),
                owner: creator,
            });
        }
        Ok(())
    }

    fn check_create(&self, commit: &Commit, ticket: Option<TicketId>) -> Result<()> {
        if self.repo.copy_source()?.is_none() {
            return Err(GateError::NotACopy);
        }

        let admin = self.access.is_admin(&commit.author);
        let mut destination = self.repo.find_commit_branch(&self.pattern, false)?;
        if destination.is_none() && admin {
            destination = self.repo.find_commit_branch(&self.pattern, true)?;
        }
        let destination = destination.ok_or(GateError::InvalidDestination)?;

        let youngest = self.repo.youngest_revision()?;
        if let Some((rev, _)) = self.repo.history(youngest, &destination, Some(1))?.first() {
            return Err(GateError::BranchExists {
                branch: destination,
                rev: *rev,
            });
        }

        if admin && self.classifier.classify(&destination) == BranchKind::AdminBranch {
            return Ok(());
        }

        let ticket_id = ticket.ok_or(GateError::NoTicketForBranch)?;
        if self.tracker.ticket(ticket_id)?.is_closed() {
            return Err(GateError::TicketNotOpen(ticket_id));
        }

        if self.classifier.classify(&destination) == BranchKind::Sandbox {
            return Ok(());
        }
        Err(GateError::CreateOutsideBranches(
            self.classifier.dev_dirs_label(),
        ))
    }

    fn check_ticket_action(&self, ticket: TicketId) -> Result<()> {
        if self.tracker.ticket(ticket)?.is_closed() {
            return Err(GateError::TicketNotOpen(ticket));
        }
        let target = self.repo.find_commit_branch(&self.pattern, false)?;
        let is_sandbox = target
            .as_deref()
            .map(|b| self.classifier.classify(b) == BranchKind::Sandbox)
            .unwrap_or(false);
        if !is_sandbox {
            return Err(GateError::NotBranchDirectory(
                self.classifier.dev_dirs_label(),
            ));
        }
        Ok(())
    }

    fn check_deliver(
        &self,
        commit: &Commit,
        log: &str,
        first: RevNum,
        second: Option<RevNum>,
        force: bool,
    ) -> Result<String> {
        let collector = self.collector();
        let revisions = collector.branch_revisions(first, second)?;
        if revisions.is_empty() {
            return Err(GateError::EmptyCollection(first, second.unwrap_or(first)));
        }

        // The transaction dies with the hook on rejection, so the property
        // goes on before the remaining rules run.
        self.repo
            .set_commit_property(&self.config.properties.deliver, &join_revs(&revisions))?;

        let destination = self
            .repo
            .find_commit_branch(&self.pattern, false)?
            .ok_or(GateError::DeliverDestination)?;
        let source = self
            .repo
            .find_revision_branch(first, &self.pattern)?
            .ok_or(GateError::NoSuchRevision(first))?;
        if destination == source {
            return Err(GateError::SelfDelivery {
                from: source,
                to: destination,
            });
        }

        // The revision that created the source branch is not deliverable.
        let history = self.repo.history(first, &source, None)?;
        if let Some((creation, _)) = history.last() {
            if *creation == first {
                return Err(GateError::DeliverCreationRevision(first));
            }
        }

        // A stabilization branch coming back to trunk carries no tickets.
        if self.classifier.classify(&destination) == BranchKind::Trunk
            && self.classifier.classify(&source) == BranchKind::AdminBranch
        {
            return Ok(log.to_string());
        }

        if self.classifier.classify(&destination) == BranchKind::Vendor {
            return Err(GateError::DeliverToVendor(destination));
        }

        let tickets = collector.tickets(&revisions, None)?;
        let mut infos: BTreeMap<TicketId, Ticket> = BTreeMap::new();
        for &id in tickets.keys() {
            infos.insert(id, self.tracker.ticket(id)?);
        }

        if !(self.access.is_admin(&commit.author) && force) {
            if infos.is_empty() {
                return Err(GateError::NoSourceTickets);
            }
            let open: Vec<TicketId> = infos
                .values()
                .filter(|t| !t.is_closed())
                .map(|t| t.id)
                .collect();
            if !open.is_empty() {
                return Err(GateError::TicketsOpen(open));
            }
            let invalid: Vec<TicketId> = infos
                .values()
                .filter(|t| {
                    self.config
                        .invalid_components
                        .iter()
                        .any(|c| *c == t.component)
                })
                .map(|t| t.id)
                .collect();
            if !invalid.is_empty() {
                return Err(GateError::InvalidComponents(invalid));
            }
        }

        let mut out = String::from(log);
        out.push('\n');
        let lines: Vec<String> = infos
            .values()
            .map(|t| {
                format!(
                    " * #{} ({}{}): {}",
                    t.id,
                    camel_case_escape(&t.component),
                    t.component,
                    t.summary
                )
            })
            .collect();
        out.push_str(&lines.join("\n"));

        if tracker::next_milestone(self.tracker, &self.config.milestones)?.is_none() {
            return Err(GateError::NoNextMilestone);
        }
        Ok(out)
    }

    fn check_bring(&self, log: &str, first: RevNum, second: Option<RevNum>) -> Result<String> {
        let collector = self.collector();
        let revisions = collector.branch_revisions(first, second)?;
        if revisions.is_empty() {
            return Err(GateError::EmptyCollection(first, second.unwrap_or(first)));
        }

        self.repo
            .set_commit_property(&self.config.properties.bring, &join_revs(&revisions))?;

        let destination = self
            .repo
            .find_commit_branch(&self.pattern, false)?
            .ok_or(GateError::BringDestination)?;
        let source = self
            .repo
            .find_revision_branch(first, &self.pattern)?
            .ok_or(GateError::NoSuchRevision(first))?;
        if destination == source {
            return Err(GateError::SelfBring {
                from: source,
                to: destination,
            });
        }

        if self.classifier.classify(&destination) == BranchKind::Trunk {
            if self.classifier.classify(&source) != BranchKind::Vendor {
                return Err(GateError::BringToTrunk(source));
            }
            // Vendor import: no ticket bookkeeping.
            return Ok(log.to_string());
        }

        // Collected for effect: vandalized propagation data rejects the
        // bring here rather than surprising the post-commit side.
        collector.tickets(&revisions, None)?;

        let anchor = second.unwrap_or(first);
        Ok(format!("{log} (from [source:{source}@{anchor} {source}])"))
    }

    fn check_revert(
        &self,
        commit: &Commit,
        log: &str,
        first: RevNum,
        second: Option<RevNum>,
        depth: usize,
    ) -> Result<String> {
        if !self.access.is_admin(&commit.author) {
            return Err(GateError::RevertDenied);
        }
        if second.is_some() {
            return Err(GateError::RevertRange);
        }
        self.repo
            .find_commit_branch(&self.pattern, false)?
            .ok_or(GateError::RevertDestination)?;

        let reverted_log = self.repo.revision_log(first)?;
        if let Some((inner_first, inner_second)) = commands::changeset_range(&reverted_log) {
            let collector = self.collector();
            let revisions = collector.branch_revisions(inner_first, inner_second)?;
            if revisions.is_empty() {
                return Err(GateError::EmptyCollection(
                    inner_first,
                    inner_second.unwrap_or(inner_first),
                ));
            }
            let tickets = collector.tickets(&revisions, None)?;
            if tickets.is_empty() {
                // The reverted changeset was itself a deliver/bring with no
                // direct tickets; chase the chain one level down.
                if depth >= MAX_PROPAGATION_DEPTH {
                    return Err(GateError::PropagationCycle);
                }
                self.check_revert(commit, log, inner_first, inner_second, depth + 1)?;
            }
        }

        if depth > 0 {
            return Ok(log.to_string());
        }

        let mut out = String::from(log);
        if !reverted_log.is_empty() {
            let mut lines = reverted_log.lines();
            let first_line = lines.next().unwrap_or_default();
            out.push_str(&format!(" (''was: {first_line}"));
            if lines.next().is_some() {
                out.push_str("...");
            }
            out.push_str("'')");
        }
        Ok(out)
    }

    fn check_externals(
        &self,
        commit: &Commit,
        project: &str,
        url: &str,
        rev: RevNum,
    ) -> Result<()> {
        for (path, _) in &commit.changed_paths {
            let valid = self
                .repo
                .path_has_property(path, &self.config.properties.externals)?
                || self
                    .repo
                    .path_has_property(path, &self.config.properties.mergeinfo)?;
            if !valid {
                return Err(GateError::ExternalsProperty(path.clone()));
            }
        }
        if !self.externals.node_exists(project, url, rev)? {
            return Err(GateError::ExternalPath {
                url: url.to_string(),
                rev,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn join_revs(revisions: &[RevNum]) -> String {
    revisions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

static CAMEL_CASE_RE: OnceLock<Regex> = OnceLock::new();

/// CamelCase component names would render as wiki links in the tracker;
/// prefix them with the escape marker.
fn camel_case_escape(text: &str) -> &'static str {
    let re = CAMEL_CASE_RE
        .get_or_init(|| Regex::new(r"^[A-Z][a-z].*[A-Z][a-z]").unwrap());
    if re.is_match(text) {
        "!"
    } else {
        ""
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
