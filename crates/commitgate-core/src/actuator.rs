use crate::branch::{BranchClassifier, BranchKind, BranchPattern};
use crate::collector::{RevisionCollector, MAX_PROPAGATION_DEPTH};
use crate::commands;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::repo::RepositoryProxy;
use crate::tracker::{self, IssueTracker, TicketPatch, TicketStatus};
use crate::types::{ChangesetKind, Commit, RevNum, TicketActionKind, TicketId, WorkflowCommand};
use chrono::{DateTime, Duration, Utc};

// ---------------------------------------------------------------------------
// PostCommitActuator
// ---------------------------------------------------------------------------

/// Side-effect half of the hook: once a revision is durable, re-derive the
/// command from its final log and propagate it into the tracker.
///
/// Unlike the pre-commit engine, nothing here vetoes anything. The revision
/// is already permanent, so every tracker mutation is best-effort: failures
/// are logged and swallowed, degrading to "committed but tracker not
/// updated".
pub struct PostCommitActuator<'a> {
    config: &'a GateConfig,
    repo: &'a dyn RepositoryProxy,
    tracker: &'a dyn IssueTracker,
    pattern: BranchPattern,
    classifier: BranchClassifier,
}

impl<'a> PostCommitActuator<'a> {
    pub fn new(
        config: &'a GateConfig,
        repo: &'a dyn RepositoryProxy,
        tracker: &'a dyn IssueTracker,
    ) -> Result<Self> {
        Ok(Self {
            config,
            repo,
            tracker,
            pattern: config.branch_pattern()?,
            classifier: BranchClassifier::new(&config.branches),
        })
    }

    /// Run the side effects for a committed revision.
    pub fn actuate(&self, commit: &Commit) -> Result<()> {
        let rev = commit
            .revision()
            .ok_or_else(|| GateError::Repository("post-commit requires a revision".to_string()))?;

        match WorkflowCommand::parse(&commit.log) {
            Ok(command) => self.dispatch(commit, rev, &command),
            Err(err) => {
                tracing::warn!(rev, error = %err, "final log carries no command, skipping");
            }
        }

        self.write_event_marker(rev);
        Ok(())
    }

    fn dispatch(&self, commit: &Commit, rev: RevNum, command: &WorkflowCommand) {
        match command {
            WorkflowCommand::AdminCommit | WorkflowCommand::ExternalsUpdate { .. } => {}
            WorkflowCommand::CreateBranch { ticket } => {
                if let Some(ticket) = ticket {
                    self.on_create(commit, rev, *ticket);
                }
            }
            WorkflowCommand::TerminateBranch { .. } => self.on_terminate(commit, rev),
            WorkflowCommand::TicketAction { kind, ticket } => {
                self.on_ticket_action(commit, rev, *kind, *ticket)
            }
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Deliver,
                first,
                second,
                ..
            } => self.on_deliver(commit, rev, *first, *second),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Bring,
                first,
                second,
                ..
            } => self.on_bring(commit, rev, *first, *second),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Revert,
                first,
                second,
                ..
            } => self.on_revert(commit, rev, *first, *second, 0),
        }
    }

    fn collector(&self) -> RevisionCollector<'_> {
        RevisionCollector::new(self.repo, &self.pattern, &self.classifier, self.config)
    }

    // --- command side effects ----------------------------------------------

    fn on_create(&self, commit: &Commit, rev: RevNum, ticket_id: TicketId) {
        let comment = format!("(In [{rev}]) {}", commit.log);
        let ticket = match self.tracker.ticket(ticket_id) {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::warn!(rev, ticket = ticket_id, error = %err, "cannot read ticket");
                return;
            }
        };

        let mut patch = TicketPatch::default();
        if ticket.owner != commit.author {
            patch.owner = Some(commit.author.clone());
        }
        let newly_accepted = ticket.status == TicketStatus::New;
        if newly_accepted {
            patch.status = Some(TicketStatus::Accepted);
        }
        self.update(ticket_id, &patch, commit, &comment, commit.timestamp);
        if newly_accepted {
            self.notify(ticket_id, commit);
        }
    }

    fn on_ticket_action(
        &self,
        commit: &Commit,
        rev: RevNum,
        kind: TicketActionKind,
        ticket_id: TicketId,
    ) {
        let comment = format!("(In [{rev}]) {}", commit.log);
        let patch = match kind {
            TicketActionKind::Close => TicketPatch {
                status: Some(TicketStatus::Closed),
                resolution: Some("fixed".to_string()),
                ..TicketPatch::default()
            },
            TicketActionKind::Ref => TicketPatch::default(),
        };
        self.update(ticket_id, &patch, commit, &comment, commit.timestamp);
        self.notify(ticket_id, commit);
    }

    fn on_deliver(&self, commit: &Commit, rev: RevNum, first: RevNum, second: Option<RevNum>) {
        let collector = self.collector();
        let Some((revisions, source, destination)) =
            self.changeset_context(&collector, rev, first, second)
        else {
            return;
        };

        let next = match tracker::next_milestone(self.tracker, &self.config.milestones) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(rev, error = %err, "cannot list milestones");
                None
            }
        };

        let tickets = match collector.tickets(&revisions, Some(&source)) {
            Ok(tickets) => tickets,
            Err(err) => {
                tracing::warn!(rev, error = %err, "ticket collection failed");
                return;
            }
        };

        let to_trunk = self.classifier.classify(&destination) == BranchKind::Trunk;
        for &id in tickets.keys() {
            let mut patch = TicketPatch::default();
            if let Ok(ticket) = self.tracker.ticket(id) {
                // Closed tickets parked on the placeholder milestone move to
                // the delivery's real milestone.
                if ticket.is_closed() && ticket.milestone == self.config.milestones.placeholder {
                    if to_trunk {
                        patch.milestone = next.clone();
                    } else {
                        patch.milestone = Some(self.config.milestones.not_applicable.clone());
                    }
                }
            }
            let comment = format!(
                "Delivered in [{rev}] (from [source:{source}@{first} {source}] to [source:{destination}@{rev} {destination}])"
            );
            self.update(id, &patch, commit, &comment, commit.timestamp);
            self.notify(id, commit);
        }
    }

    fn on_bring(&self, commit: &Commit, rev: RevNum, first: RevNum, second: Option<RevNum>) {
        let collector = self.collector();
        let Some((revisions, source, destination)) =
            self.changeset_context(&collector, rev, first, second)
        else {
            return;
        };

        // A bring landing in a sandbox backlinks the sandbox's own ticket,
        // found on the branch-creation revision.
        if self.classifier.classify(&destination) == BranchKind::Sandbox {
            self.backlink_sandbox_ticket(commit, rev, &destination);
        }

        let tickets = match collector.tickets(&revisions, Some(&source)) {
            Ok(tickets) => tickets,
            Err(err) => {
                tracing::warn!(rev, error = %err, "ticket collection failed");
                return;
            }
        };
        if tickets.is_empty() {
            return;
        }

        let id_list = tickets
            .keys()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(" ");
        let annotated = format!("{} ticket(s) {}", commit.log, id_list);
        if let Err(err) = self.repo.set_revision_log(rev, &annotated) {
            tracing::warn!(rev, error = %err, "cannot annotate revision log");
        }

        for &id in tickets.keys() {
            let comment = format!(
                "Brought in [{rev}] (from [source:{source}@{first} {source}] to [source:{destination}@{rev} {destination}])"
            );
            self.update(id, &TicketPatch::default(), commit, &comment, commit.timestamp);
        }
    }

    fn on_revert(
        &self,
        commit: &Commit,
        rev: RevNum,
        first: RevNum,
        second: Option<RevNum>,
        depth: usize,
    ) {
        if second.is_some() {
            tracing::warn!(rev, "cannot revert more than one changeset at once");
            return;
        }
        let source = match self.repo.find_revision_branch(first, &self.pattern) {
            Ok(Some(branch)) => branch,
            Ok(None) | Err(_) => {
                tracing::warn!(rev, first, "cannot resolve reverted revision branch");
                return;
            }
        };
        let destination = match self.repo.find_revision_branch(rev, &self.pattern) {
            Ok(Some(branch)) => branch,
            Ok(None) | Err(_) => {
                tracing::warn!(rev, "cannot resolve revert destination branch");
                return;
            }
        };

        let reverted_log = match self.repo.revision_log(first) {
            Ok(log) => log,
            Err(err) => {
                tracing::warn!(rev, first, error = %err, "cannot read reverted log");
                return;
            }
        };

        if let Some((inner_first, inner_second)) = commands::changeset_range(&reverted_log) {
            let collector = self.collector();
            let tickets = collector
                .branch_revisions(inner_first, inner_second)
                .and_then(|revisions| collector.tickets(&revisions, Some(&source)));
            match tickets {
                Ok(tickets) => {
                    if tickets.is_empty() && depth < MAX_PROPAGATION_DEPTH {
                        self.on_revert(commit, rev, inner_first, inner_second, depth + 1);
                    }
                    let first_line = reverted_log.lines().next().unwrap_or_default();
                    for &id in tickets.keys() {
                        let comment = format!(
                            "Reverted in [{rev}] in [source:{destination}@{rev} {destination}] (''was: {first_line}'')"
                        );
                        self.update(id, &TicketPatch::default(), commit, &comment, commit.timestamp);
                    }
                }
                Err(err) => {
                    tracing::warn!(rev, error = %err, "ticket collection failed");
                }
            }
        }

        if depth == 0 {
            // Mark the reverted revision itself and drop its propagation
            // property so future collections no longer chase it.
            let annotated = format!("{reverted_log} (''reverted in [{rev}]'')");
            if let Err(err) = self.repo.set_revision_log(first, &annotated) {
                tracing::warn!(rev, first, error = %err, "cannot annotate reverted log");
            }
            let property = if reverted_log.starts_with("Delivers") {
                Some(&self.config.properties.deliver)
            } else if reverted_log.starts_with("Brings") {
                Some(&self.config.properties.bring)
            } else {
                None
            };
            if let Some(name) = property {
                if let Err(err) = self.repo.set_revision_property(first, name, None) {
                    tracing::warn!(rev, first, error = %err, "cannot clear propagation property");
                }
            }
        }
    }

    fn on_terminate(&self, commit: &Commit, rev: RevNum) {
        let Some((path, _)) = commit.changed_paths.first() else {
            tracing::warn!(rev, "termination without a deleted path");
            return;
        };
        let trimmed = path.trim_matches('/');

        // Only developer branches feed termination back into tickets.
        let is_dev = self
            .config
            .branches
            .dev_branch_dirs
            .iter()
            .any(|dir| trimmed.starts_with(dir.trim_start_matches('/')));
        if !is_dev {
            return;
        }

        let mut revs: Vec<RevNum> = Vec::new();
        match self.repo.history(rev.saturating_sub(1), path, None) {
            Ok(history) => {
                for (r, p) in history {
                    if p.trim_matches('/') != trimmed {
                        break;
                    }
                    revs.push(r);
                }
            }
            Err(err) => {
                tracing::warn!(rev, error = %err, "cannot walk terminated branch history");
                return;
            }
        }
        revs.reverse();
        let (Some(&oldest), Some(&newest)) = (revs.first(), revs.last()) else {
            tracing::warn!(rev, path = %path, "terminated branch has no history");
            return;
        };

        let collector = self.collector();
        let tickets = collector
            .branch_revisions(oldest, Some(newest))
            .and_then(|revisions| collector.tickets(&revisions, None));
        let tickets = match tickets {
            Ok(tickets) => tickets,
            Err(err) => {
                tracing::warn!(rev, error = %err, "ticket collection failed");
                return;
            }
        };

        for &id in tickets.keys() {
            // Stamp one second after the ticket's last change; change times
            // are a unique key on the tracker side.
            let when = self
                .tracker
                .ticket(id)
                .ok()
                .and_then(|t| t.changed_at)
                .map(|t| t + Duration::seconds(1))
                .unwrap_or(commit.timestamp);
            let mut patch = TicketPatch::default();
            if self
                .tracker
                .ticket(id)
                .map(|t| t.owner != commit.author)
                .unwrap_or(false)
            {
                patch.owner = Some(commit.author.clone());
            }
            let comment =
                format!("Sandbox [source:{trimmed}@{newest} /{trimmed}] terminated at [{rev}]");
            self.update(id, &patch, commit, &comment, when);
        }
    }

    // --- plumbing -----------------------------------------------------------

    fn changeset_context(
        &self,
        collector: &RevisionCollector<'_>,
        rev: RevNum,
        first: RevNum,
        second: Option<RevNum>,
    ) -> Option<(Vec<RevNum>, String, String)> {
        let revisions = match collector.branch_revisions(first, second) {
            Ok(revisions) => revisions,
            Err(err) => {
                tracing::warn!(rev, error = %err, "revision collection failed");
                return None;
            }
        };
        let source = match self.repo.find_revision_branch(first, &self.pattern) {
            Ok(Some(branch)) => branch,
            _ => {
                tracing::warn!(rev, first, "cannot resolve source branch");
                return None;
            }
        };
        let destination = match self.repo.find_revision_branch(rev, &self.pattern) {
            Ok(Some(branch)) => branch,
            _ => {
                tracing::warn!(rev, "cannot resolve destination branch");
                return None;
            }
        };
        Some((revisions, source, destination))
    }

    fn backlink_sandbox_ticket(&self, commit: &Commit, rev: RevNum, destination: &str) {
        let history = match self.repo.history(rev, destination, None) {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(rev, error = %err, "cannot walk sandbox history");
                return;
            }
        };
        let Some((creation, _)) = history.last() else {
            return;
        };
        let creation_log = match self.repo.revision_log(*creation) {
            Ok(log) => log,
            Err(err) => {
                tracing::warn!(rev, error = %err, "cannot read sandbox creation log");
                return;
            }
        };
        if let Some(ticket) = commands::any_ticket(&creation_log) {
            let comment = format!("(In [{rev}]) {}", commit.log);
            self.update(
                ticket,
                &TicketPatch::default(),
                commit,
                &comment,
                commit.timestamp,
            );
        }
    }

    fn update(
        &self,
        id: TicketId,
        patch: &TicketPatch,
        commit: &Commit,
        comment: &str,
        when: DateTime<Utc>,
    ) {
        if let Err(err) = self
            .tracker
            .update(id, patch, &commit.author, comment, when)
        {
            tracing::warn!(ticket = id, error = %err, "tracker update failed");
        }
    }

    fn notify(&self, id: TicketId, commit: &Commit) {
        let excluded = [commit.author.clone()];
        if let Err(err) = self.tracker.notify(id, &excluded) {
            tracing::warn!(ticket = id, error = %err, "notification failed");
        }
    }

    fn write_event_marker(&self, rev: RevNum) {
        let Some(dir) = &self.config.events_dir else {
            return;
        };
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join(format!("{rev}.tag")), "please backup this revision\n")
        };
        if let Err(err) = write() {
            tracing::warn!(rev, error = %err, "cannot write event marker");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemRepository, MemTracker};
    use crate::tracker::Ticket;
    use crate::types::ChangeKind::*;
    use crate::types::CommitId;

    struct Fixture {
        config: GateConfig,
        repo: MemRepository,
        tracker: MemTracker,
    }

    impl Fixture {
        fn new() -> Self {
            let tracker = MemTracker::new();
            tracker.add_milestone("Unclassified", false);
            tracker.add_milestone("Next", false);
            tracker.add_milestone("1.2", false);
            Self {
                config: GateConfig::default(),
                repo: MemRepository::new(),
                tracker,
            }
        }

        fn ticket(&self, id: TicketId, status: TicketStatus) {
            self.tracker.insert(Ticket {
                id,
                status,
                component: "driver".to_string(),
                summary: format!("summary of #{id}"),
                milestone: "Next".to_string(),
                owner: "jane".to_string(),
                changed_at: None,
            });
        }

        fn actuate(&self, rev: RevNum, author: &str, log: &str) {
            let commit = Commit {
                id: CommitId::Revision { rev },
                author: author.to_string(),
                timestamp: Utc::now(),
                log: log.to_string(),
                changed_paths: Vec::new(),
            };
            self.actuate_commit(commit);
        }

        fn actuate_with_paths(
            &self,
            rev: RevNum,
            author: &str,
            log: &str,
            paths: &[(&str, crate::types::ChangeKind)],
        ) {
            let commit = Commit {
                id: CommitId::Revision { rev },
                author: author.to_string(),
                timestamp: Utc::now(),
                log: log.to_string(),
                changed_paths: paths.iter().map(|(p, k)| (p.to_string(), *k)).collect(),
            };
            self.actuate_commit(commit);
        }

        fn actuate_commit(&self, commit: Commit) {
            let actuator =
                PostCommitActuator::new(&self.config, &self.repo, &self.tracker).unwrap();
            actuator.actuate(&commit).unwrap();
        }

        fn sandbox_history(&self) {
            self.repo
                .commit(2, "jane", "Creates t1 for #1", &[("sandboxes/t1", Add)]);
            self.repo
                .commit(3, "jane", "Refs #1, add driver", &[("sandboxes/t1/a.c", Add)]);
            self.repo.commit(
                4,
                "jane",
                "Closes #1, add i2c driver",
                &[("sandboxes/t1/b.c", Add)],
            );
        }
    }

    #[test]
    fn create_accepts_new_ticket_and_reassigns_owner() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::New);
        f.repo
            .commit(2, "john", "Creates t1 for #1", &[("sandboxes/t1", Add)]);
        f.actuate(2, "john", "Creates t1 for #1");

        let ticket = f.tracker.snapshot(1).unwrap();
        assert_eq!(ticket.status, TicketStatus::Accepted);
        assert_eq!(ticket.owner, "john");
        let comments = f.tracker.comments(1);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body, "(In [2]) Creates t1 for #1");
        assert_eq!(f.tracker.notifications(), vec![1]);
    }

    #[test]
    fn close_sets_status_and_backlinks() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Accepted);
        f.sandbox_history();
        f.actuate(4, "jane", "Closes #1, add i2c driver");

        let ticket = f.tracker.snapshot(1).unwrap();
        assert!(ticket.is_closed());
        let comments = f.tracker.comments(1);
        assert_eq!(comments[0].body, "(In [4]) Closes #1, add i2c driver");
        assert_eq!(f.tracker.notifications(), vec![1]);
    }

    #[test]
    fn missing_ticket_is_swallowed() {
        let f = Fixture::new();
        f.sandbox_history();
        // Ticket #1 does not exist in the tracker; the commit is already
        // durable so this must not error.
        f.actuate(4, "jane", "Closes #1, add i2c driver");
        assert!(f.tracker.snapshot(1).is_none());
    }

    #[test]
    fn deliver_moves_placeholder_milestone_and_backlinks() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Closed);
        f.sandbox_history();
        f.repo.commit(
            5,
            "jane",
            "Delivers [3:4], driver work",
            &[("trunk/a.c", Modify)],
        );
        f.repo.set_property(5, "rth:deliver", "3,4");
        f.actuate(5, "jane", "Delivers [3:4], driver work");

        let ticket = f.tracker.snapshot(1).unwrap();
        assert_eq!(ticket.milestone, "1.2");
        let comments = f.tracker.comments(1);
        assert_eq!(
            comments[0].body,
            "Delivered in [5] (from [source:/sandboxes/t1@3 /sandboxes/t1] to [source:/trunk@5 /trunk])"
        );
        assert_eq!(f.tracker.notifications(), vec![1]);
    }

    #[test]
    fn deliver_off_trunk_parks_milestone_as_not_applicable() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Closed);
        f.sandbox_history();
        f.repo.commit(
            5,
            "jane",
            "Delivers [3:4], to stabilization",
            &[("branches/stable/a.c", Modify)],
        );
        f.actuate(5, "jane", "Delivers [3:4], to stabilization");

        let ticket = f.tracker.snapshot(1).unwrap();
        assert_eq!(ticket.milestone, "NotApplicable");
    }

    #[test]
    fn bring_backlinks_and_annotates_revision_log() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Accepted);
        f.ticket(2, TicketStatus::New);
        f.sandbox_history();
        f.repo
            .commit(5, "john", "Creates t2 for #2", &[("sandboxes/t2", Add)]);
        f.repo.commit(
            6,
            "john",
            "Brings [3:4], shared work (from [source:/sandboxes/t1@4 /sandboxes/t1])",
            &[("sandboxes/t2/a.c", Add)],
        );
        f.actuate(
            6,
            "john",
            "Brings [3:4], shared work (from [source:/sandboxes/t1@4 /sandboxes/t1])",
        );

        // The sandbox's own ticket got the commit backlink.
        let own = f.tracker.comments(2);
        assert_eq!(own.len(), 1);
        assert!(own[0].body.starts_with("(In [6]) Brings [3:4]"));

        // The brought ticket got the cross-branch backlink.
        let brought = f.tracker.comments(1);
        assert_eq!(brought.len(), 1);
        assert_eq!(
            brought[0].body,
            "Brought in [6] (from [source:/sandboxes/t1@3 /sandboxes/t1] to [source:/sandboxes/t2@6 /sandboxes/t2])"
        );

        // The revision log now names the tickets.
        let log = f.repo.log_of(6).unwrap();
        assert!(log.ends_with("ticket(s) #1"));
    }

    #[test]
    fn revert_backlinks_annotates_and_clears_property() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Closed);
        f.sandbox_history();
        f.repo.commit(
            5,
            "jane",
            "Delivers [3:4], driver work",
            &[("trunk/a.c", Modify)],
        );
        f.repo.set_property(5, "rth:deliver", "3,4");
        f.repo.commit(
            6,
            "root",
            "Reverts [5], bad merge (''was: Delivers [3:4], driver work'')",
            &[("trunk/a.c", Modify)],
        );
        f.actuate(
            6,
            "root",
            "Reverts [5], bad merge (''was: Delivers [3:4], driver work'')",
        );

        // Ticket backlink.
        let comments = f.tracker.comments(1);
        assert_eq!(comments.len(), 1);
        assert!(comments[0]
            .body
            .starts_with("Reverted in [6] in [source:/trunk@6 /trunk]"));
        assert!(comments[0].body.contains("''was: Delivers [3:4], driver work''"));

        // The reverted revision is marked and its property cleared.
        let log = f.repo.log_of(5).unwrap();
        assert!(log.ends_with("(''reverted in [6]'')"));
        assert_eq!(f.repo.property_of(5, "rth:deliver"), None);
    }

    #[test]
    fn terminate_backlinks_sandbox_tickets() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Closed);
        f.sandbox_history();
        f.repo
            .commit(5, "jane", "Terminates t1", &[("sandboxes/t1", Delete)]);
        f.actuate_with_paths(5, "jane", "Terminates t1", &[("sandboxes/t1", Delete)]);

        let comments = f.tracker.comments(1);
        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].body,
            "Sandbox [source:sandboxes/t1@4 /sandboxes/t1] terminated at [5]"
        );
    }

    #[test]
    fn terminate_outside_dev_dirs_is_ignored() {
        let f = Fixture::new();
        f.ticket(1, TicketStatus::Closed);
        f.repo
            .commit(2, "root", "Admins, branch", &[("branches/stable", Add)]);
        f.repo
            .commit(3, "root", "Terminates stable", &[("branches/stable", Delete)]);
        f.actuate_with_paths(3, "root", "Terminates stable", &[("branches/stable", Delete)]);
        assert!(f.tracker.comments(1).is_empty());
    }

    #[test]
    fn event_marker_written_for_accepted_revision() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut f = Fixture::new();
        f.config.events_dir = Some(dir.path().join("events"));
        f.repo
            .commit(2, "root", "Admins, tidy", &[("trunk/a.c", Modify)]);
        f.actuate(2, "root", "Admins, tidy");

        let marker = dir.path().join("events").join("2.tag");
        let contents = std::fs::read_to_string(marker).unwrap();
        assert_eq!(contents, "please backup this revision\n");
    }
}
