//! JSON-RPC client for the issue tracker.
//!
//! Speaks the Trac RPC dialect (`ticket.get`, `ticket.update`,
//! `ticket.milestone.*`) over a single endpoint. Everything is blocking; the
//! hook runs one commit at a time and has no use for concurrency here.

use chrono::{DateTime, Utc};
use commitgate_core::error::{GateError, Result};
use commitgate_core::tracker::{IssueTracker, Ticket, TicketPatch, TicketStatus};
use commitgate_core::types::TicketId;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TracTracker {
    url: String,
    client: reqwest::blocking::Client,
}

impl TracTracker {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| GateError::Tracker(err.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: Value = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|err| GateError::Tracker(format!("{method}: {err}")))?
            .json()
            .map_err(|err| GateError::Tracker(format!("{method}: bad response: {err}")))?;
        if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
            return Err(GateError::Tracker(format!("{method}: {err}")));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn attr<'a>(attrs: &'a Value, name: &str) -> &'a str {
    attrs.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn parse_status(raw: &str) -> TicketStatus {
    serde_json::from_value(Value::String(raw.to_string())).unwrap_or(TicketStatus::Unknown)
}

impl IssueTracker for TracTracker {
    fn ticket(&self, id: TicketId) -> Result<Ticket> {
        // Result shape: [id, time_created, time_changed, attributes].
        let result = self
            .call("ticket.get", json!([id]))
            .map_err(|_| GateError::NoSuchTicket(id))?;
        let attrs = result
            .get(3)
            .cloned()
            .unwrap_or(Value::Null);
        let changed_at = attr(&attrs, "changetime")
            .parse::<DateTime<Utc>>()
            .ok();
        Ok(Ticket {
            id,
            status: parse_status(attr(&attrs, "status")),
            component: attr(&attrs, "component").to_string(),
            summary: attr(&attrs, "summary").to_string(),
            milestone: attr(&attrs, "milestone").to_string(),
            owner: attr(&attrs, "owner").to_string(),
            changed_at,
        })
    }

    fn update(
        &self,
        id: TicketId,
        patch: &TicketPatch,
        author: &str,
        comment: &str,
        when: DateTime<Utc>,
    ) -> Result<()> {
        let mut attrs = serde_json::Map::new();
        if let Some(status) = patch.status {
            attrs.insert("status".to_string(), json!(status.as_str()));
        }
        if let Some(resolution) = &patch.resolution {
            attrs.insert("resolution".to_string(), json!(resolution));
        }
        if let Some(milestone) = &patch.milestone {
            attrs.insert("milestone".to_string(), json!(milestone));
        }
        if let Some(owner) = &patch.owner {
            attrs.insert("owner".to_string(), json!(owner));
        }
        self.call(
            "ticket.update",
            json!([id, comment, attrs, false, author, when.to_rfc3339()]),
        )?;
        Ok(())
    }

    fn open_milestones(&self, excluded: &[String]) -> Result<Vec<String>> {
        let names = self.call("ticket.milestone.getAll", json!([]))?;
        let names = names
            .as_array()
            .ok_or_else(|| GateError::Tracker("milestone list is not an array".to_string()))?;

        let mut open = Vec::new();
        for name in names {
            let Some(name) = name.as_str() else { continue };
            if excluded.iter().any(|e| e == name) {
                continue;
            }
            let milestone = self.call("ticket.milestone.get", json!([name]))?;
            let completed = milestone
                .get("completed")
                .map(|v| match v {
                    Value::Number(n) => n.as_u64().unwrap_or(0) != 0,
                    Value::String(s) => !s.is_empty() && s != "0",
                    _ => false,
                })
                .unwrap_or(false);
            if !completed {
                open.push(name.to_string());
            }
        }
        Ok(open)
    }

    fn notify(&self, id: TicketId, excluded_recipients: &[String]) -> Result<()> {
        self.call("ticket.notify", json!([id, excluded_recipients]))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_falls_back_to_unknown() {
        assert_eq!(parse_status("closed"), TicketStatus::Closed);
        assert_eq!(parse_status("new"), TicketStatus::New);
        assert_eq!(parse_status("infoneeded"), TicketStatus::Unknown);
        assert_eq!(parse_status(""), TicketStatus::Unknown);
    }

    #[test]
    fn attr_reads_strings_defensively() {
        let attrs = json!({"status": "closed", "component": 3});
        assert_eq!(attr(&attrs, "status"), "closed");
        assert_eq!(attr(&attrs, "component"), "");
        assert_eq!(attr(&attrs, "missing"), "");
    }
}
