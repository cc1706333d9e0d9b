//! In-memory collaborator implementations.
//!
//! These back the crate's own test-suite and give embedders a way to run the
//! engine against fabricated history. Single-threaded by design, like the
//! hook itself.

use crate::branch::{resolve_branch, BranchPattern};
use crate::error::{GateError, Result};
use crate::repo::{ExternalProjects, RepositoryProxy};
use crate::tracker::{IssueTracker, Ticket, TicketPatch};
use crate::types::{ChangeKind, RevNum, TicketId};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// MemRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct RevisionData {
    author: String,
    log: String,
    changed_paths: Vec<(String, ChangeKind)>,
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
struct TransactionData {
    changed_paths: Vec<(String, ChangeKind)>,
    copy_source: Option<(RevNum, String)>,
    properties: BTreeMap<String, String>,
    path_properties: BTreeMap<String, BTreeSet<String>>,
    log: Option<String>,
}

#[derive(Debug, Default)]
struct RepoInner {
    revisions: BTreeMap<RevNum, RevisionData>,
    transaction: Option<TransactionData>,
}

/// Fabricated revision store. Committed history is appended with
/// [`MemRepository::commit`]; the pending transaction, when one is needed,
/// is staged with [`MemRepository::begin_transaction`].
#[derive(Debug, Default)]
pub struct MemRepository {
    inner: RefCell<RepoInner>,
}

impl MemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // --- history fabrication ----------------------------------------------

    pub fn commit(&self, rev: RevNum, author: &str, log: &str, paths: &[(&str, ChangeKind)]) {
        self.inner.borrow_mut().revisions.insert(
            rev,
            RevisionData {
                author: author.to_string(),
                log: log.to_string(),
                changed_paths: paths
                    .iter()
                    .map(|(p, k)| (p.to_string(), *k))
                    .collect(),
                properties: BTreeMap::new(),
            },
        );
    }

    pub fn set_property(&self, rev: RevNum, name: &str, value: &str) {
        if let Some(data) = self.inner.borrow_mut().revisions.get_mut(&rev) {
            data.properties.insert(name.to_string(), value.to_string());
        }
    }

    pub fn begin_transaction(&self, paths: &[(&str, ChangeKind)]) {
        self.inner.borrow_mut().transaction = Some(TransactionData {
            changed_paths: paths
                .iter()
                .map(|(p, k)| (p.to_string(), *k))
                .collect(),
            ..TransactionData::default()
        });
    }

    pub fn set_copy_source(&self, rev: RevNum, path: &str) {
        if let Some(txn) = self.inner.borrow_mut().transaction.as_mut() {
            txn.copy_source = Some((rev, path.to_string()));
        }
    }

    pub fn mark_path_property(&self, path: &str, name: &str) {
        if let Some(txn) = self.inner.borrow_mut().transaction.as_mut() {
            txn.path_properties
                .entry(path.to_string())
                .or_default()
                .insert(name.to_string());
        }
    }

    // --- inspection --------------------------------------------------------

    pub fn transaction_paths(&self) -> Vec<(String, ChangeKind)> {
        self.inner
            .borrow()
            .transaction
            .as_ref()
            .map(|t| t.changed_paths.clone())
            .unwrap_or_default()
    }

    pub fn transaction_property(&self, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .transaction
            .as_ref()
            .and_then(|t| t.properties.get(name).cloned())
    }

    pub fn transaction_log(&self) -> Option<String> {
        self.inner
            .borrow()
            .transaction
            .as_ref()
            .and_then(|t| t.log.clone())
    }

    pub fn log_of(&self, rev: RevNum) -> Option<String> {
        self.inner
            .borrow()
            .revisions
            .get(&rev)
            .map(|d| d.log.clone())
    }

    pub fn property_of(&self, rev: RevNum, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .revisions
            .get(&rev)
            .and_then(|d| d.properties.get(name).cloned())
    }

    fn with_transaction<T>(&self, f: impl FnOnce(&mut TransactionData) -> T) -> Result<T> {
        let mut inner = self.inner.borrow_mut();
        match inner.transaction.as_mut() {
            Some(txn) => Ok(f(txn)),
            None => Err(GateError::Repository(
                "no pending transaction".to_string(),
            )),
        }
    }

    fn touches(data: &RevisionData, path: &str) -> bool {
        let wanted = path.trim_matches('/');
        data.changed_paths.iter().any(|(p, _)| {
            let p = p.trim_matches('/');
            p == wanted || p.starts_with(&format!("{wanted}/"))
        })
    }
}

impl RepositoryProxy for MemRepository {
    fn find_revision_branch(&self, rev: RevNum, pattern: &BranchPattern) -> Result<Option<String>> {
        let inner = self.inner.borrow();
        let Some(data) = inner.revisions.get(&rev) else {
            return Ok(None);
        };
        resolve_branch(data.changed_paths.iter().map(|(p, _)| p.as_str()), pattern, false)
    }

    fn find_commit_branch(&self, pattern: &BranchPattern, tag: bool) -> Result<Option<String>> {
        let inner = self.inner.borrow();
        let txn = inner
            .transaction
            .as_ref()
            .ok_or_else(|| GateError::Repository("no pending transaction".to_string()))?;
        resolve_branch(txn.changed_paths.iter().map(|(p, _)| p.as_str()), pattern, tag)
    }

    fn history(
        &self,
        from: RevNum,
        path: &str,
        limit: Option<usize>,
    ) -> Result<Vec<(RevNum, String)>> {
        let inner = self.inner.borrow();
        let mut hits: Vec<(RevNum, String)> = inner
            .revisions
            .range(..=from)
            .rev()
            .filter(|(_, data)| Self::touches(data, path))
            .map(|(rev, _)| (*rev, path.to_string()))
            .collect();
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    fn revision_log(&self, rev: RevNum) -> Result<String> {
        self.inner
            .borrow()
            .revisions
            .get(&rev)
            .map(|d| d.log.clone())
            .ok_or(GateError::NoSuchRevision(rev))
    }

    fn revision_author(&self, rev: RevNum) -> Result<String> {
        self.inner
            .borrow()
            .revisions
            .get(&rev)
            .map(|d| d.author.clone())
            .ok_or(GateError::NoSuchRevision(rev))
    }

    fn set_revision_log(&self, rev: RevNum, log: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let data = inner
            .revisions
            .get_mut(&rev)
            .ok_or(GateError::NoSuchRevision(rev))?;
        data.log = log.to_string();
        Ok(())
    }

    fn revision_property(&self, rev: RevNum, name: &str) -> Result<Option<String>> {
        let inner = self.inner.borrow();
        let data = inner
            .revisions
            .get(&rev)
            .ok_or(GateError::NoSuchRevision(rev))?;
        Ok(data.properties.get(name).cloned())
    }

    fn set_revision_property(&self, rev: RevNum, name: &str, value: Option<&str>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let data = inner
            .revisions
            .get_mut(&rev)
            .ok_or(GateError::NoSuchRevision(rev))?;
        match value {
            Some(value) => {
                data.properties.insert(name.to_string(), value.to_string());
            }
            None => {
                data.properties.remove(name);
            }
        }
        Ok(())
    }

    fn changed_paths(&self) -> Result<Vec<(String, ChangeKind)>> {
        self.with_transaction(|txn| txn.changed_paths.clone())
    }

    fn youngest_revision(&self) -> Result<RevNum> {
        Ok(self
            .inner
            .borrow()
            .revisions
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }

    fn youngest_path_revision(&self, path: &str) -> Result<Option<RevNum>> {
        let inner = self.inner.borrow();
        Ok(inner
            .revisions
            .iter()
            .rev()
            .find(|(_, data)| Self::touches(data, path))
            .map(|(rev, _)| *rev))
    }

    fn copy_source(&self) -> Result<Option<(RevNum, String)>> {
        self.with_transaction(|txn| txn.copy_source.clone())
    }

    fn set_commit_property(&self, name: &str, value: &str) -> Result<()> {
        self.with_transaction(|txn| {
            txn.properties.insert(name.to_string(), value.to_string());
        })
    }

    fn set_commit_log(&self, log: &str) -> Result<()> {
        self.with_transaction(|txn| {
            txn.log = Some(log.to_string());
        })
    }

    fn path_has_property(&self, path: &str, name: &str) -> Result<bool> {
        self.with_transaction(|txn| {
            txn.path_properties
                .get(path)
                .map(|props| props.contains(name))
                .unwrap_or(false)
        })
    }
}

// ---------------------------------------------------------------------------
// MemTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemComment {
    pub author: String,
    pub body: String,
    pub when: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    tickets: BTreeMap<TicketId, Ticket>,
    comments: BTreeMap<TicketId, Vec<MemComment>>,
    milestones: Vec<(String, bool)>,
    notified: Vec<TicketId>,
}

/// Fabricated issue tracker.
#[derive(Debug, Default)]
pub struct MemTracker {
    inner: RefCell<TrackerInner>,
}

impl MemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ticket: Ticket) {
        self.inner.borrow_mut().tickets.insert(ticket.id, ticket);
    }

    /// Append a milestone to the roadmap; `completed` ones are never listed
    /// as open.
    pub fn add_milestone(&self, name: &str, completed: bool) {
        self.inner
            .borrow_mut()
            .milestones
            .push((name.to_string(), completed));
    }

    pub fn snapshot(&self, id: TicketId) -> Option<Ticket> {
        self.inner.borrow().tickets.get(&id).cloned()
    }

    pub fn comments(&self, id: TicketId) -> Vec<MemComment> {
        self.inner
            .borrow()
            .comments
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<TicketId> {
        self.inner.borrow().notified.clone()
    }
}

impl IssueTracker for MemTracker {
    fn ticket(&self, id: TicketId) -> Result<Ticket> {
        self.inner
            .borrow()
            .tickets
            .get(&id)
            .cloned()
            .ok_or(GateError::NoSuchTicket(id))
    }

    fn update(
        &self,
        id: TicketId,
        patch: &TicketPatch,
        author: &str,
        comment: &str,
        when: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let ticket = inner
            .tickets
            .get_mut(&id)
            .ok_or(GateError::NoSuchTicket(id))?;
        if let Some(status) = patch.status {
            ticket.status = status;
        }
        if let Some(milestone) = &patch.milestone {
            ticket.milestone = milestone.clone();
        }
        if let Some(owner) = &patch.owner {
            ticket.owner = owner.clone();
        }
        ticket.changed_at = Some(when);
        inner.comments.entry(id).or_default().push(MemComment {
            author: author.to_string(),
            body: comment.to_string(),
            when,
        });
        Ok(())
    }

    fn open_milestones(&self, excluded: &[String]) -> Result<Vec<String>> {
        Ok(self
            .inner
            .borrow()
            .milestones
            .iter()
            .filter(|(name, completed)| !completed && !excluded.contains(name))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn notify(&self, id: TicketId, _excluded_recipients: &[String]) -> Result<()> {
        self.inner.borrow_mut().notified.push(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemExternals
// ---------------------------------------------------------------------------

/// Fabricated catalog of `project:url@rev` nodes.
#[derive(Debug, Default)]
pub struct MemExternals {
    nodes: RefCell<BTreeSet<(String, String, RevNum)>>,
}

impl MemExternals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, project: &str, url: &str, rev: RevNum) {
        self.nodes
            .borrow_mut()
            .insert((project.to_string(), url.to_string(), rev));
    }
}

impl ExternalProjects for MemExternals {
    fn node_exists(&self, project: &str, url: &str, rev: RevNum) -> Result<bool> {
        Ok(self
            .nodes
            .borrow()
            .contains(&(project.to_string(), url.to_string(), rev)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
