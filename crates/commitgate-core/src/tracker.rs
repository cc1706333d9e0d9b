use crate::config::MilestoneConfig;
use crate::error::Result;
use crate::types::TicketId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Accepted,
    Assigned,
    Reopened,
    Closed,
    /// Any workflow state this engine does not need to distinguish.
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::Accepted => "accepted",
            TicketStatus::Assigned => "assigned",
            TicketStatus::Reopened => "reopened",
            TicketStatus::Closed => "closed",
            TicketStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub status: TicketStatus,
    pub component: String,
    pub summary: String,
    pub milestone: String,
    pub owner: String,
    /// Last modification time, when the tracker exposes it.
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed
    }
}

// ---------------------------------------------------------------------------
// TicketPatch
// ---------------------------------------------------------------------------

/// Field updates applied together with a comment. Empty patch = comment
/// only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub resolution: Option<String>,
    pub milestone: Option<String>,
    pub owner: Option<String>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.resolution.is_none()
            && self.milestone.is_none()
            && self.owner.is_none()
    }
}

// ---------------------------------------------------------------------------
// IssueTracker
// ---------------------------------------------------------------------------

/// Narrow view of the issue tracker consumed by the engine and the
/// post-commit actuator.
pub trait IssueTracker {
    fn ticket(&self, id: TicketId) -> Result<Ticket>;

    /// Apply `patch` and append `comment` as `author` at `when`.
    fn update(
        &self,
        id: TicketId,
        patch: &TicketPatch,
        author: &str,
        comment: &str,
        when: DateTime<Utc>,
    ) -> Result<()>;

    /// Open milestones in roadmap order, minus the given names.
    fn open_milestones(&self, excluded: &[String]) -> Result<Vec<String>>;

    /// Send a change notification for the ticket, skipping the given
    /// recipients.
    fn notify(&self, id: TicketId, excluded_recipients: &[String]) -> Result<()>;
}

/// First open milestone a delivery may target: roadmap order, skipping the
/// configured exclusions and the placeholder itself.
pub fn next_milestone(
    tracker: &dyn IssueTracker,
    milestones: &MilestoneConfig,
) -> Result<Option<String>> {
    let mut excluded = milestones.excluded.clone();
    excluded.push(milestones.placeholder.clone());
    let open = tracker.open_milestones(&excluded)?;
    Ok(open.into_iter().next())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
