use crate::branch::BranchPattern;
use crate::error::Result;
use crate::types::{ChangeKind, RevNum};

// ---------------------------------------------------------------------------
// RepositoryProxy
// ---------------------------------------------------------------------------

/// Narrow view of the version-control store consumed by the engine.
///
/// Two production implementations exist in the hook binary: one backed by a
/// pending transaction (pre-commit) and one backed by a committed revision
/// (post-commit). The "commit-scoped" methods (`find_commit_branch`,
/// `changed_paths`, `copy_source`, `set_commit_property`, `set_commit_log`,
/// `path_has_property`) address whichever of the two the proxy wraps.
///
/// `history` walks backwards from `from` and yields `(revision, path)` pairs
/// newest-first, bounded by `limit` when given; a path with no history
/// yields an empty list, not an error.
pub trait RepositoryProxy {
    /// Branch a committed revision sits on, or `None` when the revision does
    /// not exist or touches nothing the pattern recognizes. An error here is
    /// an integrity fault and aborts whatever traversal is in progress.
    fn find_revision_branch(&self, rev: RevNum, pattern: &BranchPattern) -> Result<Option<String>>;

    /// Branch the pending commit targets. `tag` switches to the pattern's
    /// tag group (administrator tag creation). Fails with `MultipleBranches`
    /// when the changed-path set spans more than one branch.
    fn find_commit_branch(&self, pattern: &BranchPattern, tag: bool) -> Result<Option<String>>;

    fn history(&self, from: RevNum, path: &str, limit: Option<usize>)
        -> Result<Vec<(RevNum, String)>>;

    fn revision_log(&self, rev: RevNum) -> Result<String>;

    fn revision_author(&self, rev: RevNum) -> Result<String>;

    fn set_revision_log(&self, rev: RevNum, log: &str) -> Result<()>;

    fn revision_property(&self, rev: RevNum, name: &str) -> Result<Option<String>>;

    /// `None` clears the property.
    fn set_revision_property(&self, rev: RevNum, name: &str, value: Option<&str>) -> Result<()>;

    fn changed_paths(&self) -> Result<Vec<(String, ChangeKind)>>;

    fn youngest_revision(&self) -> Result<RevNum>;

    /// Newest revision that touched `path`, if any.
    fn youngest_path_revision(&self, path: &str) -> Result<Option<RevNum>>;

    /// Copy source of the pending commit, when the commit is a copy.
    fn copy_source(&self) -> Result<Option<(RevNum, String)>>;

    /// Attach a property to the pending commit. Written before validation
    /// completes; a rejected transaction keeps it harmlessly.
    fn set_commit_property(&self, name: &str, value: &str) -> Result<()>;

    /// Replace the pending commit's log message.
    fn set_commit_log(&self, log: &str) -> Result<()>;

    /// Whether `path` carries `name` in the pending commit.
    fn path_has_property(&self, path: &str, name: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// ExternalProjects
// ---------------------------------------------------------------------------

/// Existence probe for `project:url@rev` references into sibling
/// repositories, used by the Externals rule only.
pub trait ExternalProjects {
    fn node_exists(&self, project: &str, url: &str, rev: RevNum) -> Result<bool>;
}

/// Denies every external reference; for deployments without sibling
/// projects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalProjects;

impl ExternalProjects for NoExternalProjects {
    fn node_exists(&self, _project: &str, _url: &str, _rev: RevNum) -> Result<bool> {
        Ok(false)
    }
}
