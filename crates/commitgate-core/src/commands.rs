use crate::error::{GateError, Result};
use crate::types::{ChangesetKind, RevNum, TicketActionKind, TicketId, WorkflowCommand};
use regex::Regex;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static ADMIN_RE: OnceLock<Regex> = OnceLock::new();
static TERMINATE_RE: OnceLock<Regex> = OnceLock::new();
static CREATE_RE: OnceLock<Regex> = OnceLock::new();
static CHANGESET_RE: OnceLock<Regex> = OnceLock::new();
static TICKET_CMD_RE: OnceLock<Regex> = OnceLock::new();
static EXTERNALS_RE: OnceLock<Regex> = OnceLock::new();
static ANY_TICKET_RE: OnceLock<Regex> = OnceLock::new();

fn admin_re() -> &'static Regex {
    ADMIN_RE.get_or_init(|| Regex::new(r"^Admins").unwrap())
}

fn terminate_re() -> &'static Regex {
    TERMINATE_RE.get_or_init(|| Regex::new(r"^Terminates(?P<force>!)?\s").unwrap())
}

fn create_re() -> &'static Regex {
    CREATE_RE.get_or_init(|| {
        Regex::new(r"^Creates\s+[^#]*(?:#(?P<ticket>\d+)(?:\W|$))?").unwrap()
    })
}

fn changeset_re() -> &'static Regex {
    CHANGESET_RE.get_or_init(|| {
        Regex::new(
            r"^(?P<action>Delivers|Brings|Reverts)(?P<force>!)?\s+\[(?P<first>\d+)(?::(?P<second>\d+))?\](?:[^:]|$)",
        )
        .unwrap()
    })
}

fn ticket_cmd_re() -> &'static Regex {
    TICKET_CMD_RE
        .get_or_init(|| Regex::new(r"^(?P<action>Refs|Closes|Fixes)\s+#(?P<ticket>\d+)").unwrap())
}

fn externals_re() -> &'static Regex {
    EXTERNALS_RE.get_or_init(|| {
        Regex::new(
            r"^Externals.+\[(?P<project>\w+):?source:?(?P<url>[a-zA-Z0-9/._-]+)@(?P<rev>\d+)\]",
        )
        .unwrap()
    })
}

fn any_ticket_re() -> &'static Regex {
    ANY_TICKET_RE.get_or_init(|| Regex::new(r"#(?P<ticket>\d+)").unwrap())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonicalize a raw log message: reject near-empty logs, upper-case the
/// first letter. The result is what gets parsed and what gets persisted.
pub fn normalize_log(raw: &str) -> Result<String> {
    let raw = raw.trim_end();
    if raw.chars().count() < 2 {
        return Err(GateError::EmptyLog);
    }
    let mut chars = raw.chars();
    let mut out = String::with_capacity(raw.len());
    match chars.next() {
        Some(first) => {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
        None => return Err(GateError::EmptyLog),
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl WorkflowCommand {
    /// Derive the command from a (normalized) log message. Patterns are
    /// tried in priority order; the first match wins, no match rejects.
    pub fn parse(log: &str) -> Result<WorkflowCommand> {
        if admin_re().is_match(log) {
            return Ok(WorkflowCommand::AdminCommit);
        }

        if let Some(caps) = terminate_re().captures(log) {
            return Ok(WorkflowCommand::TerminateBranch {
                force: caps.name("force").is_some(),
            });
        }

        if let Some(caps) = create_re().captures(log) {
            let ticket = match caps.name("ticket") {
                Some(m) => Some(parse_ticket(m.as_str())?),
                None => None,
            };
            return Ok(WorkflowCommand::CreateBranch { ticket });
        }

        if let Some(caps) = changeset_re().captures(log) {
            let kind = match &caps["action"] {
                "Delivers" => ChangesetKind::Deliver,
                "Brings" => ChangesetKind::Bring,
                _ => ChangesetKind::Revert,
            };
            let first = parse_rev(&caps["first"])?;
            let second = match caps.name("second") {
                Some(m) => Some(parse_rev(m.as_str())?),
                None => None,
            };
            return Ok(WorkflowCommand::ChangesetAction {
                kind,
                first,
                second,
                force: caps.name("force").is_some(),
            });
        }

        if let Some(caps) = ticket_cmd_re().captures(log) {
            let kind = match &caps["action"] {
                "Refs" => TicketActionKind::Ref,
                _ => TicketActionKind::Close,
            };
            return Ok(WorkflowCommand::TicketAction {
                kind,
                ticket: parse_ticket(&caps["ticket"])?,
            });
        }

        if let Some(caps) = externals_re().captures(log) {
            return Ok(WorkflowCommand::ExternalsUpdate {
                project: caps["project"].to_lowercase(),
                url: caps["url"].to_lowercase(),
                rev: parse_rev(&caps["rev"])?,
            });
        }

        Err(GateError::UnknownAction)
    }
}

fn parse_ticket(digits: &str) -> Result<TicketId> {
    digits.parse().map_err(|_| GateError::UnknownAction)
}

fn parse_rev(digits: &str) -> Result<RevNum> {
    digits.parse().map_err(|_| GateError::UnknownAction)
}

// ---------------------------------------------------------------------------
// Log probes
// ---------------------------------------------------------------------------

/// Ticket referenced by a leading `Refs/Closes/Fixes #n` command, if any.
pub fn leading_ticket(log: &str) -> Option<TicketId> {
    ticket_cmd_re()
        .captures(log)
        .and_then(|caps| caps["ticket"].parse().ok())
}

/// First `#n` reference anywhere in the message.
pub fn any_ticket(log: &str) -> Option<TicketId> {
    any_ticket_re()
        .captures(log)
        .and_then(|caps| caps["ticket"].parse().ok())
}

/// Revision bracket of a leading changeset command (`Delivers [a:b]` and
/// friends), used when chasing the changeset a revert points at.
pub fn changeset_range(log: &str) -> Option<(RevNum, Option<RevNum>)> {
    let caps = changeset_re().captures(log)?;
    let first = caps["first"].parse().ok()?;
    let second = match caps.name("second") {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    Some((first, second))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_short_logs() {
        assert!(matches!(normalize_log(""), Err(GateError::EmptyLog)));
        assert!(matches!(normalize_log("x"), Err(GateError::EmptyLog)));
        assert!(matches!(normalize_log("x\n"), Err(GateError::EmptyLog)));
    }

    #[test]
    fn normalize_uppercases_first_letter() {
        assert_eq!(
            normalize_log("delivers [3:4], fix").unwrap(),
            "Delivers [3:4], fix"
        );
        assert_eq!(normalize_log("Refs #1").unwrap(), "Refs #1");
    }

    #[test]
    fn parse_admin() {
        assert_eq!(
            WorkflowCommand::parse("Admins, bump externals").unwrap(),
            WorkflowCommand::AdminCommit
        );
    }

    #[test]
    fn parse_terminate() {
        assert_eq!(
            WorkflowCommand::parse("Terminates t42").unwrap(),
            WorkflowCommand::TerminateBranch { force: false }
        );
        assert_eq!(
            WorkflowCommand::parse("Terminates! t42").unwrap(),
            WorkflowCommand::TerminateBranch { force: true }
        );
        // A bare "Terminates!" with no trailing separator is not a command.
        assert!(WorkflowCommand::parse("Terminates!").is_err());
    }

    #[test]
    fn parse_create_with_and_without_ticket() {
        assert_eq!(
            WorkflowCommand::parse("Creates t42 for #42").unwrap(),
            WorkflowCommand::CreateBranch { ticket: Some(42) }
        );
        assert_eq!(
            WorkflowCommand::parse("Creates stabilization branch").unwrap(),
            WorkflowCommand::CreateBranch { ticket: None }
        );
    }

    #[test]
    fn parse_changeset_actions() {
        assert_eq!(
            WorkflowCommand::parse("Delivers [10:12] new driver").unwrap(),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Deliver,
                first: 10,
                second: Some(12),
                force: false,
            }
        );
        assert_eq!(
            WorkflowCommand::parse("Brings [7]").unwrap(),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Bring,
                first: 7,
                second: None,
                force: false,
            }
        );
        assert_eq!(
            WorkflowCommand::parse("Reverts! [99] bad merge").unwrap(),
            WorkflowCommand::ChangesetAction {
                kind: ChangesetKind::Revert,
                first: 99,
                second: None,
                force: true,
            }
        );
    }

    #[test]
    fn changeset_bracket_is_mandatory() {
        assert!(WorkflowCommand::parse("Delivers the goods").is_err());
        // A colon right after the bracket marks a source reference, not a
        // revision range.
        assert!(WorkflowCommand::parse("Delivers [3]: see above").is_err());
    }

    #[test]
    fn parse_ticket_actions() {
        assert_eq!(
            WorkflowCommand::parse("Refs #8, progress").unwrap(),
            WorkflowCommand::TicketAction {
                kind: TicketActionKind::Ref,
                ticket: 8,
            }
        );
        assert_eq!(
            WorkflowCommand::parse("Closes #8, done").unwrap(),
            WorkflowCommand::TicketAction {
                kind: TicketActionKind::Close,
                ticket: 8,
            }
        );
        // Fixes aliases Closes.
        assert_eq!(
            WorkflowCommand::parse("Fixes #8").unwrap(),
            WorkflowCommand::TicketAction {
                kind: TicketActionKind::Close,
                ticket: 8,
            }
        );
    }

    #[test]
    fn parse_externals() {
        assert_eq!(
            WorkflowCommand::parse("Externals update [Widget:source:/vendor/widget@55]").unwrap(),
            WorkflowCommand::ExternalsUpdate {
                project: "widget".to_string(),
                url: "/vendor/widget".to_string(),
                rev: 55,
            }
        );
    }

    #[test]
    fn unknown_action_rejects() {
        assert!(matches!(
            WorkflowCommand::parse("Fixed a typo"),
            Err(GateError::UnknownAction)
        ));
    }

    #[test]
    fn admin_wins_over_later_patterns() {
        // "Admins" anywhere at the start takes priority even if the rest of
        // the message would match another command.
        assert_eq!(
            WorkflowCommand::parse("Admins Refs #3").unwrap(),
            WorkflowCommand::AdminCommit
        );
    }

    #[test]
    fn log_probes() {
        assert_eq!(leading_ticket("Closes #12, done"), Some(12));
        assert_eq!(leading_ticket("See #12"), None);
        assert_eq!(any_ticket("Creates t9 for #9"), Some(9));
        assert_eq!(changeset_range("Delivers [4:6] stuff"), Some((4, Some(6))));
        assert_eq!(changeset_range("Brings [4] stuff"), Some((4, None)));
        assert_eq!(changeset_range("Refs #4"), None);
    }
}
