use crate::config::BranchConfig;
use crate::error::{GateError, Result};
use crate::types::ChangeKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ---------------------------------------------------------------------------
// BranchKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    Trunk,
    Sandbox,
    AdminBranch,
    Vendor,
    Unknown,
}

impl BranchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchKind::Trunk => "trunk",
            BranchKind::Sandbox => "sandbox",
            BranchKind::AdminBranch => "admin_branch",
            BranchKind::Vendor => "vendor",
            BranchKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BranchClassifier
// ---------------------------------------------------------------------------

/// Pure path -> category classification from the configured prefix lists.
/// Admin roots win over sandbox roots, which win over the trunk equality
/// test, which wins over the vendor root.
#[derive(Debug, Clone)]
pub struct BranchClassifier {
    trunk: String,
    dev_dirs: Vec<String>,
    admin_dirs: Vec<String>,
    vendor: String,
}

impl BranchClassifier {
    pub fn new(branches: &BranchConfig) -> Self {
        Self {
            trunk: branches.trunk_dir.clone(),
            dev_dirs: branches.dev_branch_dirs.clone(),
            admin_dirs: branches.admin_branch_dirs.clone(),
            vendor: branches.vendor_dir.clone(),
        }
    }

    pub fn classify(&self, path: &str) -> BranchKind {
        let path = canonical(path);
        if Self::is_branch_type(&path, &self.admin_dirs) {
            BranchKind::AdminBranch
        } else if Self::is_branch_type(&path, &self.dev_dirs) {
            BranchKind::Sandbox
        } else if *path == self.trunk {
            BranchKind::Trunk
        } else if Self::is_branch_type(&path, std::slice::from_ref(&self.vendor)) {
            BranchKind::Vendor
        } else {
            BranchKind::Unknown
        }
    }

    /// Prefix test against a set of branch roots.
    pub fn is_branch_type(path: &str, roots: &[String]) -> bool {
        if path.is_empty() {
            return false;
        }
        let path = canonical(path);
        roots.iter().any(|root| path.starts_with(root.as_str()))
    }

    pub fn dev_dirs(&self) -> &[String] {
        &self.dev_dirs
    }

    pub fn dev_dirs_label(&self) -> String {
        self.dev_dirs.join(", ")
    }

    /// Detect a branch move: exactly one Delete and one Add, both directly
    /// one level below an admin-branch root. Rewriting branch history this
    /// way is rejected unconditionally.
    pub fn is_branch_move(&self, changed: &[(String, ChangeKind)]) -> bool {
        if changed.len() != 2 {
            return false;
        }
        let kinds = (changed[0].1, changed[1].1);
        let delete_add = matches!(
            kinds,
            (ChangeKind::Delete, ChangeKind::Add) | (ChangeKind::Add, ChangeKind::Delete)
        );
        if !delete_add {
            return false;
        }
        changed
            .iter()
            .all(|(path, _)| self.is_admin_branch_child(path))
    }

    fn is_admin_branch_child(&self, path: &str) -> bool {
        let trimmed = path.trim_matches('/');
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() != 2 {
            return false;
        }
        let root = format!("/{}", parts[0]);
        self.admin_dirs.iter().any(|d| *d == root)
    }
}

fn canonical(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{path}"))
    }
}

// ---------------------------------------------------------------------------
// BranchPattern
// ---------------------------------------------------------------------------

/// The configured branch-extraction regex. The `branch` named group yields
/// the branch a path belongs to; the optional `tag` group supports the
/// administrator tag fallback on branch creation.
#[derive(Debug, Clone)]
pub struct BranchPattern {
    re: Regex,
}

impl BranchPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            re: Regex::new(pattern)?,
        })
    }

    pub fn branch_of(&self, path: &str) -> Option<String> {
        self.group_of(path, "branch")
    }

    pub fn tag_of(&self, path: &str) -> Option<String> {
        self.group_of(path, "tag")
    }

    fn group_of(&self, path: &str, group: &str) -> Option<String> {
        let path = canonical(path);
        self.re
            .captures(&path)
            .and_then(|caps| caps.name(group))
            .map(|m| m.as_str().to_string())
    }
}

/// Map a changed-path set to the single branch it touches. Two distinct
/// branches in one set is a structural violation.
pub fn resolve_branch<'a, I>(paths: I, pattern: &BranchPattern, tag: bool) -> Result<Option<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found: Option<String> = None;
    for path in paths {
        let hit = if tag {
            pattern.tag_of(path)
        } else {
            pattern.branch_of(path)
        };
        if let Some(branch) = hit {
            match &found {
                None => found = Some(branch),
                Some(existing) if *existing != branch => {
                    return Err(GateError::MultipleBranches);
                }
                Some(_) => {}
            }
        }
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
