use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Revision numbers as assigned by the repository.
pub type RevNum = u64;

/// Tracker ticket identifiers.
pub type TicketId = u32;

// ---------------------------------------------------------------------------
// CommitId
// ---------------------------------------------------------------------------

/// Identity of the commit under evaluation: a pending transaction before the
/// commit is durable, a revision number afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommitId {
    Transaction { name: String },
    Revision { rev: RevNum },
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitId::Transaction { name } => write!(f, "txn:{name}"),
            CommitId::Revision { rev } => write!(f, "r{rev}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Delete => "delete",
            ChangeKind::Modify => "modify",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// One commit event as seen by a hook invocation. Constructed once per
/// invocation and never mutated; the engine returns a rewritten log instead
/// of touching `log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub log: String,
    pub changed_paths: Vec<(String, ChangeKind)>,
}

impl Commit {
    /// Revision number for post-commit processing; `None` while the commit
    /// is still a pending transaction.
    pub fn revision(&self) -> Option<RevNum> {
        match &self.id {
            CommitId::Revision { rev } => Some(*rev),
            CommitId::Transaction { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowCommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketActionKind {
    Close,
    Ref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangesetKind {
    Deliver,
    Bring,
    Revert,
}

impl ChangesetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangesetKind::Deliver => "deliver",
            ChangesetKind::Bring => "bring",
            ChangesetKind::Revert => "revert",
        }
    }
}

impl fmt::Display for ChangesetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed command derived from a commit message. Exactly one command is
/// derived per commit; an unrecognized message is a parse failure, not a
/// fall-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowCommand {
    AdminCommit,
    TerminateBranch {
        force: bool,
    },
    CreateBranch {
        ticket: Option<TicketId>,
    },
    ChangesetAction {
        kind: ChangesetKind,
        first: RevNum,
        second: Option<RevNum>,
        force: bool,
    },
    TicketAction {
        kind: TicketActionKind,
        ticket: TicketId,
    },
    ExternalsUpdate {
        project: String,
        url: String,
        rev: RevNum,
    },
}

// ---------------------------------------------------------------------------
// Ticket mentions
// ---------------------------------------------------------------------------

/// One revision's contribution to a ticket: who committed it and with what
/// message. Collected by the propagation resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMention {
    pub author: String,
    pub log: String,
}

/// Ordered ticket -> mentions map. `BTreeMap` keeps rewritten logs and
/// tracker comments deterministic.
pub type TicketMap = std::collections::BTreeMap<TicketId, Vec<TicketMention>>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
