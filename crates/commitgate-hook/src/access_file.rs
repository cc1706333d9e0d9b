//! Administrator allow-list loading.
//!
//! The access file is the INI-style ACL the repository already uses:
//! a `[groups]` section with a comma-separated `admins` entry.

use anyhow::{bail, Context};
use commitgate_core::access::AccessPolicy;
use std::path::Path;

pub fn load(path: &Path) -> anyhow::Result<AccessPolicy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read access file {}", path.display()))?;
    parse(&text).with_context(|| format!("in access file {}", path.display()))
}

fn parse(text: &str) -> anyhow::Result<AccessPolicy> {
    let mut in_groups = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_groups = section.trim().eq_ignore_ascii_case("groups");
            continue;
        }
        if !in_groups {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("admins") {
                let policy = AccessPolicy::new(value.split(','));
                if policy.is_empty() {
                    bail!("admins entry is empty");
                }
                return Ok(policy);
            }
        }
    }
    bail!("no [groups] admins entry found")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
