use crate::types::{RevNum, TicketId};
use thiserror::Error;

// ---------------------------------------------------------------------------
// GateError
// ---------------------------------------------------------------------------

/// Every way a commit can be rejected or a collaborator can fail.
///
/// The `Display` text of a policy variant is exactly what the hook prints on
/// stderr, one violated rule per line, so wording here is part of the
/// operator-facing contract.
#[derive(Debug, Error)]
pub enum GateError {
    // --- parse -------------------------------------------------------------
    #[error("Log message is invalid")]
    EmptyLog,

    #[error("No known action in log message")]
    UnknownAction,

    // --- structural --------------------------------------------------------
    #[error("Multiple branches in commit not allowed")]
    MultipleBranches,

    #[error("Moving a branch is never allowed")]
    BranchMove,

    // --- policy ------------------------------------------------------------
    #[error("Only administrators can execute admin commits")]
    AdminCommitDenied,

    #[error("Only administrators can revert changes")]
    RevertDenied,

    #[error("Ticket #{0} must be open")]
    TicketNotOpen(TicketId),

    #[error("No ticket associated to the new branch")]
    NoTicketForBranch,

    #[error("Cannot apply changes outside a developer branch ({0})")]
    NotBranchDirectory(String),

    #[error("Cannot create a new branch outside {0}")]
    CreateOutsideBranches(String),

    #[error("Destination branch {branch} already exists at [{rev}]")]
    BranchExists { branch: String, rev: RevNum },

    #[error("Cannot locate source revision (not a copy?)")]
    NotACopy,

    #[error("Destination branch is invalid")]
    InvalidDestination,

    #[error("No deleted path in the submitted revision")]
    TerminateNothingDeleted,

    #[error("Termination of more than one branch is not allowed")]
    TerminateMultiple,

    #[error("The branch {0} is not being deleted")]
    TerminateNotDelete(String),

    #[error("Cannot terminate outside a developer branch ({0})")]
    TerminateNonBranch(String),

    #[error("Cannot delete a non self-owned branch {branch}, owned by {owner}")]
    NotSelfOwned { branch: String, owner: String },

    #[error("Cannot deliver to self ({from} -> {to})")]
    SelfDelivery { from: String, to: String },

    #[error("Cannot bring to self ({from} -> {to})")]
    SelfBring { from: String, to: String },

    #[error("Cannot bring to trunk (from {0})")]
    BringToTrunk(String),

    #[error("Cannot deliver to {0} branch")]
    DeliverToVendor(String),

    #[error("Cannot deliver the initial branch revision ({0})")]
    DeliverCreationRevision(RevNum),

    #[error("No ticket tied to the source branch")]
    NoSourceTickets,

    #[error("Not all tickets closed, delivery rejected\n{}", close_request(.0))]
    TicketsOpen(Vec<TicketId>),

    #[error("No valid component, delivery rejected\n{}", component_request(.0))]
    InvalidComponents(Vec<TicketId>),

    #[error("No defined next milestone, please fix up roadmap")]
    NoNextMilestone,

    #[error("Cannot revert more than one changeset at once")]
    RevertRange,

    #[error("Unable to locate bring destination")]
    BringDestination,

    #[error("Unable to locate delivery destination")]
    DeliverDestination,

    #[error("Unable to locate revert branch")]
    RevertDestination,

    #[error("Not a valid svn:externals change for {0}")]
    ExternalsProperty(String),

    #[error("Invalid external project {0}")]
    ExternalProject(String),

    #[error("Invalid external path or revision {url}@{rev}")]
    ExternalPath { url: String, rev: RevNum },

    // --- referential -------------------------------------------------------
    #[error("Revision {0} does not exist")]
    NoSuchRevision(RevNum),

    #[error("Revision range is invalid {0}:{1}")]
    InvalidRange(RevNum, RevNum),

    #[error("Revisions ({first},{second}) not coherent: {first_branch},{second_branch}")]
    IncoherentRange {
        first: RevNum,
        second: RevNum,
        first_branch: String,
        second_branch: String,
    },

    #[error("No revisions found on branch in range {0}:{1}")]
    EmptyCollection(RevNum, RevNum),

    #[error("Ticket #{0} not found")]
    NoSuchTicket(TicketId),

    // --- integrity ---------------------------------------------------------
    #[error("Malformed branch, cannot find ancestor of {0}")]
    MalformedBranch(String),

    #[error("Propagation property cycle detected")]
    PropagationCycle,

    #[error("repository error: {0}")]
    Repository(String),

    #[error("tracker error: {0}")]
    Tracker(String),

    #[error("invalid branch pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;

// ---------------------------------------------------------------------------
// Message helpers
// ---------------------------------------------------------------------------

fn ticket_list(ids: &[TicketId]) -> String {
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn close_request(ids: &[TicketId]) -> String {
    if ids.len() > 1 {
        format!("Please close tickets {}", ticket_list(ids))
    } else {
        format!("Please close ticket {}", ticket_list(ids))
    }
}

fn component_request(ids: &[TicketId]) -> String {
    format!("Please correct component of {}", ticket_list(ids))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ticket_message_singular_and_plural() {
        let one = GateError::TicketsOpen(vec![3]);
        assert_eq!(
            one.to_string(),
            "Not all tickets closed, delivery rejected\nPlease close ticket #3"
        );

        let two = GateError::TicketsOpen(vec![3, 7]);
        assert_eq!(
            two.to_string(),
            "Not all tickets closed, delivery rejected\nPlease close tickets #3, #7"
        );
    }

    #[test]
    fn component_message_names_every_ticket() {
        let err = GateError::InvalidComponents(vec![11, 12]);
        let text = err.to_string();
        assert!(text.starts_with("No valid component, delivery rejected"));
        assert!(text.contains("#11, #12"));
    }

    #[test]
    fn multi_branch_message_is_verbatim() {
        assert_eq!(
            GateError::MultipleBranches.to_string(),
            "Multiple branches in commit not allowed"
        );
    }
}
