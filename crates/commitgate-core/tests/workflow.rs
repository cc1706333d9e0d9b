//! End-to-end workflow scenarios: a fabricated repository and tracker, the
//! pre-commit engine gating each step, and the post-commit actuator feeding
//! the result back into the tracker — the way the two hooks run in
//! production.

use chrono::Utc;
use commitgate_core::access::AccessPolicy;
use commitgate_core::actuator::PostCommitActuator;
use commitgate_core::config::GateConfig;
use commitgate_core::engine::PolicyEngine;
use commitgate_core::error::GateError;
use commitgate_core::memory::{MemExternals, MemRepository, MemTracker};
use commitgate_core::tracker::{Ticket, TicketStatus};
use commitgate_core::types::{ChangeKind, Commit, CommitId, RevNum};

struct Harness {
    config: GateConfig,
    access: AccessPolicy,
    repo: MemRepository,
    tracker: MemTracker,
    externals: MemExternals,
    next_rev: std::cell::Cell<RevNum>,
}

impl Harness {
    fn new() -> Self {
        let tracker = MemTracker::new();
        tracker.add_milestone("Unclassified", false);
        tracker.add_milestone("Next", false);
        tracker.add_milestone("1.2", false);
        Self {
            config: GateConfig::default(),
            access: AccessPolicy::new(["root"]),
            repo: MemRepository::new(),
            tracker,
            externals: MemExternals::new(),
            next_rev: std::cell::Cell::new(2),
        }
    }

    fn open_ticket(&self, id: u32, component: &str, summary: &str) {
        self.tracker.insert(Ticket {
            id,
            status: TicketStatus::New,
            component: component.to_string(),
            summary: summary.to_string(),
            milestone: "Next".to_string(),
            owner: String::new(),
            changed_at: None,
        });
    }

    /// Run the full pre-commit + commit + post-commit cycle. On acceptance
    /// the staged transaction becomes a revision carrying the rewritten log
    /// and any propagation property, exactly as the hook pair leaves it.
    fn commit(
        &self,
        author: &str,
        log: &str,
        paths: &[(&str, ChangeKind)],
    ) -> Result<RevNum, GateError> {
        self.repo.begin_transaction(paths);
        self.try_commit(author, log, paths)
    }

    fn commit_copy(
        &self,
        author: &str,
        log: &str,
        paths: &[(&str, ChangeKind)],
        copy_from: (RevNum, &str),
    ) -> Result<RevNum, GateError> {
        self.repo.begin_transaction(paths);
        self.repo.set_copy_source(copy_from.0, copy_from.1);
        self.try_commit(author, log, paths)
    }

    fn try_commit(
        &self,
        author: &str,
        log: &str,
        paths: &[(&str, ChangeKind)],
    ) -> Result<RevNum, GateError> {
        let pending = Commit {
            id: CommitId::Transaction {
                name: "txn".to_string(),
            },
            author: author.to_string(),
            timestamp: Utc::now(),
            log: log.to_string(),
            changed_paths: paths.iter().map(|(p, k)| (p.to_string(), *k)).collect(),
        };
        let engine = PolicyEngine::new(
            &self.config,
            &self.access,
            &self.repo,
            &self.tracker,
            &self.externals,
        )
        .unwrap();
        let final_log = engine.evaluate(&pending)?;

        // Promote the transaction to a revision.
        let rev = self.next_rev.get();
        self.next_rev.set(rev + 1);
        self.repo.commit(rev, author, &final_log, paths);
        for name in [&self.config.properties.deliver, &self.config.properties.bring] {
            if let Some(value) = self.repo.transaction_property(name) {
                self.repo.set_property(rev, name, &value);
            }
        }

        // Post-commit side effects.
        let committed = Commit {
            id: CommitId::Revision { rev },
            author: author.to_string(),
            timestamp: Utc::now(),
            log: final_log,
            changed_paths: pending.changed_paths.clone(),
        };
        let actuator =
            PostCommitActuator::new(&self.config, &self.repo, &self.tracker).unwrap();
        actuator.actuate(&committed).unwrap();
        Ok(rev)
    }
}

use ChangeKind::{Add, Delete, Modify};

fn seed_trunk(h: &Harness) -> RevNum {
    h.commit("root", "Admins, seed repository", &[("trunk/driver.c", Add)])
        .unwrap()
}

/// Build the standard sandbox: created for ticket #1, one Refs commit, one
/// Closes commit. Returns (first work rev, last work rev).
fn build_sandbox(h: &Harness, trunk_rev: RevNum) -> (RevNum, RevNum) {
    h.commit_copy(
        "jane",
        "Creates t1 for #1",
        &[("sandboxes/t1", Add)],
        (trunk_rev, "/trunk"),
    )
    .unwrap();
    let r1 = h
        .commit(
            "jane",
            "Refs #1, add driver module",
            &[("sandboxes/t1/driver.c", Modify)],
        )
        .unwrap();
    let r2 = h
        .commit(
            "jane",
            "Closes #1, add i2c driver module",
            &[("sandboxes/t1/driver-i2c.c", Add)],
        )
        .unwrap();
    (r1, r2)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn sandbox_delivery_happy_path() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Add the i2c driver");
    let trunk = seed_trunk(&h);
    let (r1, r2) = build_sandbox(&h, trunk);

    // The sandbox lifecycle landed in the ticket.
    let comments = h.tracker.comments(1);
    assert_eq!(comments.len(), 3);
    assert!(comments[0].body.contains("Creates t1 for #1"));
    assert!(comments[1].body.contains("Refs #1"));
    assert!(comments[2].body.contains("Closes #1"));
    assert!(h.tracker.snapshot(1).unwrap().is_closed());

    // Deliver the sandbox into trunk.
    let rev = h
        .commit(
            "jane",
            &format!("Delivers [{r1}:{r2}], driver work"),
            &[("trunk/driver.c", Modify), ("trunk/driver-i2c.c", Add)],
        )
        .unwrap();

    // The trunk log gained one line per closed ticket.
    let log = h.repo.log_of(rev).unwrap();
    assert!(log.contains(" * #1 (driver): Add the i2c driver"));

    // The propagation property records what was consumed.
    assert_eq!(
        h.repo.property_of(rev, "rth:deliver").as_deref(),
        Some(format!("{r1},{r2}").as_str())
    );

    // Delivered to trunk: the placeholder milestone became the next open one.
    assert_eq!(h.tracker.snapshot(1).unwrap().milestone, "1.2");
}

#[test]
fn delivery_with_open_ticket_is_rejected() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Add the i2c driver");
    let trunk = seed_trunk(&h);
    h.commit_copy(
        "jane",
        "Creates t1 for #1",
        &[("sandboxes/t1", Add)],
        (trunk, "/trunk"),
    )
    .unwrap();
    let r1 = h
        .commit(
            "jane",
            "Refs #1, work in progress",
            &[("sandboxes/t1/driver.c", Modify)],
        )
        .unwrap();

    let err = h
        .commit(
            "jane",
            &format!("Delivers [{r1}]"),
            &[("trunk/driver.c", Modify)],
        )
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Not all tickets closed, delivery rejected"));
}

#[test]
fn multi_branch_commit_is_rejected() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Anything");
    seed_trunk(&h);

    let err = h
        .commit(
            "jane",
            "Refs #1, multi-branches commit",
            &[("trunk/x.c", Add), ("branches/y/x.c", Add)],
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Multiple branches in commit not allowed");
}

#[test]
fn vendor_bring_into_sandbox_backlinks_the_ticket() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Track vendor drop");
    let trunk = seed_trunk(&h);
    h.commit_copy(
        "jane",
        "Creates t1 for #1",
        &[("sandboxes/t1", Add)],
        (trunk, "/trunk"),
    )
    .unwrap();

    let vendor_rev = h
        .commit("root", "Admins, add vendor.c", &[("vendor/lib/vendor.c", Add)])
        .unwrap();

    let rev = h
        .commit(
            "jane",
            &format!("Brings [{vendor_rev}]"),
            &[("sandboxes/t1/vendor.c", Add)],
        )
        .unwrap();

    // Pre-commit rewrote the log with the literal source reference.
    let log = h.repo.log_of(rev).unwrap();
    assert!(log.contains(&format!(
        "(from [source:/vendor/lib@{vendor_rev} /vendor/lib])"
    )));

    // Post-commit backlinked the sandbox's own ticket.
    let comments = h.tracker.comments(1);
    let backlink = comments.last().unwrap();
    assert!(backlink.body.contains(&format!("(In [{rev}])")));
    assert!(backlink.body.contains("/vendor/lib"));
}

#[test]
fn terminate_feeds_ownership_and_backlink() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Add the i2c driver");
    let trunk = seed_trunk(&h);
    let (_, r2) = build_sandbox(&h, trunk);

    let rev = h
        .commit("jane", "Terminates t1", &[("sandboxes/t1", Delete)])
        .unwrap();

    let comments = h.tracker.comments(1);
    let backlink = comments.last().unwrap();
    assert_eq!(
        backlink.body,
        format!("Sandbox [source:sandboxes/t1@{r2} /sandboxes/t1] terminated at [{rev}]")
    );
    assert_eq!(h.tracker.snapshot(1).unwrap().owner, "jane");
}

#[test]
fn revert_of_delivery_round_trips() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Add the i2c driver");
    let trunk = seed_trunk(&h);
    let (r1, r2) = build_sandbox(&h, trunk);
    let delivered = h
        .commit(
            "jane",
            &format!("Delivers [{r1}:{r2}], driver work"),
            &[("trunk/driver.c", Modify)],
        )
        .unwrap();

    let reverted = h
        .commit(
            "root",
            &format!("Reverts [{delivered}]"),
            &[("trunk/driver.c", Modify)],
        )
        .unwrap();

    // The revert log quotes the first line of what it undid.
    let log = h.repo.log_of(reverted).unwrap();
    assert!(log.contains("(''was: Delivers"));

    // The delivered revision is marked and its propagation property gone.
    let old_log = h.repo.log_of(delivered).unwrap();
    assert!(old_log.ends_with(&format!("(''reverted in [{reverted}]'')")));
    assert_eq!(h.repo.property_of(delivered, "rth:deliver"), None);

    // Non-admins cannot revert at all.
    let err = h
        .commit(
            "jane",
            &format!("Reverts [{delivered}]"),
            &[("trunk/driver.c", Modify)],
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Only administrators can revert changes");
}

#[test]
fn log_normalization_is_persisted() {
    let h = Harness::new();
    h.open_ticket(1, "driver", "Anything");
    let trunk = seed_trunk(&h);
    h.commit_copy(
        "jane",
        "Creates t1 for #1",
        &[("sandboxes/t1", Add)],
        (trunk, "/trunk"),
    )
    .unwrap();

    let rev = h
        .commit(
            "jane",
            "refs #1, lowercase verb",
            &[("sandboxes/t1/a.c", Add)],
        )
        .unwrap();
    assert!(h.repo.log_of(rev).unwrap().starts_with("Refs #1"));
}
