//! `svnlook`/`svnadmin`-backed repository proxies.
//!
//! Reads go through `svnlook`, which handles both pending transactions
//! (`-t`) and committed revisions (`-r`). Revision writes go through
//! `svnadmin setlog` / `setrevprop`. Nothing in the stock toolchain can
//! write into a pending transaction, so transaction-scoped writes land in a
//! sidecar directory under the repository's hooks area; the post-commit
//! invocation promotes them onto the new revision before the actuator runs.

use commitgate_core::branch::{resolve_branch, BranchPattern};
use commitgate_core::error::{GateError, Result};
use commitgate_core::repo::{ExternalProjects, RepositoryProxy};
use commitgate_core::types::{ChangeKind, RevNum};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

const PENDING_DIR: &str = "hooks/commitgate.pending";

// ---------------------------------------------------------------------------
// Process plumbing
// ---------------------------------------------------------------------------

fn run(binary: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(binary)
        .args(args)
        .output()
        .map_err(|err| GateError::Repository(format!("failed to run {binary}: {err}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GateError::Repository(format!(
            "{binary} {}: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Like [`run`], but swallows failures whose stderr mentions one of the
/// given error codes (missing path, missing property, missing revision).
fn run_tolerant(binary: &str, args: &[&str], benign: &[&str]) -> Result<Option<String>> {
    let output = Command::new(binary)
        .args(args)
        .output()
        .map_err(|err| GateError::Repository(format!("failed to run {binary}: {err}")))?;
    if output.status.success() {
        return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if benign.iter().any(|code| stderr.contains(code)) {
        return Ok(None);
    }
    Err(GateError::Repository(format!(
        "{binary} {}: {}",
        args.first().copied().unwrap_or_default(),
        stderr.trim()
    )))
}

const E_NO_SUCH_REVISION: &str = "E160006";
const E_NOT_FOUND: &str = "E160013";
const E_NO_SUCH_PROPERTY: &str = "E200017";

// ---------------------------------------------------------------------------
// SvnlookProxy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Target {
    Transaction(String),
    Revision(RevNum),
}

#[derive(Debug, Clone)]
pub struct SvnlookProxy {
    repos: PathBuf,
    target: Target,
}

impl SvnlookProxy {
    pub fn transaction(repos: &Path, txn: &str) -> Self {
        Self {
            repos: repos.to_path_buf(),
            target: Target::Transaction(txn.to_string()),
        }
    }

    pub fn revision(repos: &Path, rev: RevNum) -> Self {
        Self {
            repos: repos.to_path_buf(),
            target: Target::Revision(rev),
        }
    }

    fn repos_str(&self) -> &str {
        self.repos.to_str().unwrap_or(".")
    }

    fn target_args(&self) -> (String, String) {
        match &self.target {
            Target::Transaction(txn) => ("-t".to_string(), txn.clone()),
            Target::Revision(rev) => ("-r".to_string(), rev.to_string()),
        }
    }

    /// Author of the pending commit.
    pub fn commit_author(&self) -> Result<String> {
        let (flag, value) = self.target_args();
        let out = run("svnlook", &["author", &flag, &value, self.repos_str()])?;
        Ok(out.trim().to_string())
    }

    /// Raw log message of the pending commit.
    pub fn commit_log(&self) -> Result<String> {
        let (flag, value) = self.target_args();
        let out = run("svnlook", &["log", &flag, &value, self.repos_str()])?;
        Ok(out.trim_end().to_string())
    }

    fn changed_lines(&self, flag: &str, value: &str) -> Result<Option<Vec<(String, ChangeKind)>>> {
        let out = run_tolerant(
            "svnlook",
            &["changed", flag, value, self.repos_str()],
            &[E_NO_SUCH_REVISION],
        )?;
        Ok(out.map(|out| {
            out.lines()
                .filter_map(|line| {
                    if line.len() < 4 {
                        return None;
                    }
                    let (flags, path) = line.split_at(4);
                    let kind = match flags.chars().next() {
                        Some('A') => ChangeKind::Add,
                        Some('D') => ChangeKind::Delete,
                        _ => ChangeKind::Modify,
                    };
                    Some((path.trim().to_string(), kind))
                })
                .collect()
        }))
    }

    fn pending_dir(&self) -> Option<PathBuf> {
        match &self.target {
            Target::Transaction(txn) => Some(self.repos.join(PENDING_DIR).join(txn)),
            Target::Revision(_) => None,
        }
    }

    fn stage_pending(&self, file: &str, contents: &str) -> Result<()> {
        let dir = self
            .pending_dir()
            .ok_or_else(|| GateError::Repository("no pending transaction".to_string()))?;
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(file), contents)?;
        Ok(())
    }

    fn pending_props(&self, dir: &Path) -> Result<BTreeMap<String, String>> {
        let path = dir.join("props.yaml");
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&data)?)
    }
}

impl RepositoryProxy for SvnlookProxy {
    fn find_revision_branch(&self, rev: RevNum, pattern: &BranchPattern) -> Result<Option<String>> {
        let rev_str = rev.to_string();
        let Some(changed) = self.changed_lines("-r", &rev_str)? else {
            return Ok(None);
        };
        resolve_branch(changed.iter().map(|(p, _)| p.as_str()), pattern, false)
    }

    fn find_commit_branch(&self, pattern: &BranchPattern, tag: bool) -> Result<Option<String>> {
        let changed = self.changed_paths()?;
        resolve_branch(changed.iter().map(|(p, _)| p.as_str()), pattern, tag)
    }

    fn history(
        &self,
        from: RevNum,
        path: &str,
        limit: Option<usize>,
    ) -> Result<Vec<(RevNum, String)>> {
        let from_str = from.to_string();
        let mut args: Vec<&str> = vec!["history", "-r", &from_str, self.repos_str(), path];
        let limit_str;
        if let Some(limit) = limit {
            limit_str = limit.to_string();
            args.push("-l");
            args.push(&limit_str);
        }
        let Some(out) = run_tolerant("svnlook", &args, &[E_NOT_FOUND, E_NO_SUCH_REVISION])? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for line in out.lines().skip_while(|l| !l.starts_with('-')).skip(1) {
            let mut fields = line.split_whitespace();
            let (Some(rev), Some(path)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(rev) = rev.parse() else { continue };
            entries.push((rev, path.to_string()));
        }
        Ok(entries)
    }

    fn revision_log(&self, rev: RevNum) -> Result<String> {
        let rev_str = rev.to_string();
        let out = run("svnlook", &["log", "-r", &rev_str, self.repos_str()])?;
        Ok(out.trim_end().to_string())
    }

    fn revision_author(&self, rev: RevNum) -> Result<String> {
        let rev_str = rev.to_string();
        let out = run("svnlook", &["author", "-r", &rev_str, self.repos_str()])?;
        Ok(out.trim().to_string())
    }

    fn set_revision_log(&self, rev: RevNum, log: &str) -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(log.as_bytes())?;
        let path = file.path().to_string_lossy().into_owned();
        let rev_str = rev.to_string();
        run(
            "svnadmin",
            &[
                "setlog",
                self.repos_str(),
                "-r",
                &rev_str,
                "--bypass-hooks",
                &path,
            ],
        )?;
        Ok(())
    }

    fn revision_property(&self, rev: RevNum, name: &str) -> Result<Option<String>> {
        let rev_str = rev.to_string();
        run_tolerant(
            "svnlook",
            &["propget", "--revprop", "-r", &rev_str, self.repos_str(), name],
            &[E_NO_SUCH_PROPERTY],
        )
    }

    fn set_revision_property(&self, rev: RevNum, name: &str, value: Option<&str>) -> Result<()> {
        let rev_str = rev.to_string();
        match value {
            Some(value) => {
                let mut file = tempfile::NamedTempFile::new()?;
                file.write_all(value.as_bytes())?;
                let path = file.path().to_string_lossy().into_owned();
                run(
                    "svnadmin",
                    &["setrevprop", self.repos_str(), "-r", &rev_str, name, &path],
                )?;
            }
            None => {
                run(
                    "svnadmin",
                    &["delrevprop", self.repos_str(), "-r", &rev_str, name],
                )?;
            }
        }
        Ok(())
    }

    fn changed_paths(&self) -> Result<Vec<(String, ChangeKind)>> {
        let (flag, value) = self.target_args();
        self.changed_lines(&flag, &value)?
            .ok_or_else(|| GateError::Repository("cannot read changed paths".to_string()))
    }

    fn youngest_revision(&self) -> Result<RevNum> {
        let out = run("svnlook", &["youngest", self.repos_str()])?;
        out.trim()
            .parse()
            .map_err(|_| GateError::Repository(format!("bad youngest revision: {}", out.trim())))
    }

    fn youngest_path_revision(&self, path: &str) -> Result<Option<RevNum>> {
        let Some(out) = run_tolerant(
            "svnlook",
            &["history", self.repos_str(), path, "-l", "1"],
            &[E_NOT_FOUND],
        )?
        else {
            return Ok(None);
        };
        let rev = out
            .lines()
            .skip_while(|l| !l.starts_with('-'))
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .find_map(|rev| rev.parse().ok());
        Ok(rev)
    }

    fn copy_source(&self) -> Result<Option<(RevNum, String)>> {
        let (flag, value) = self.target_args();
        let out = run(
            "svnlook",
            &["changed", "--copy-info", &flag, &value, self.repos_str()],
        )?;
        for line in out.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("(from ") {
                let Some(rest) = rest.strip_suffix(')') else {
                    continue;
                };
                let Some((path, rev)) = rest.rsplit_once(":r") else {
                    continue;
                };
                if let Ok(rev) = rev.parse() {
                    return Ok(Some((rev, path.to_string())));
                }
            }
        }
        Ok(None)
    }

    fn set_commit_property(&self, name: &str, value: &str) -> Result<()> {
        match &self.target {
            Target::Transaction(_) => {
                let dir = self
                    .pending_dir()
                    .ok_or_else(|| GateError::Repository("no pending transaction".to_string()))?;
                let mut props = self.pending_props(&dir)?;
                props.insert(name.to_string(), value.to_string());
                self.stage_pending("props.yaml", &serde_yaml::to_string(&props)?)
            }
            Target::Revision(rev) => self.set_revision_property(*rev, name, Some(value)),
        }
    }

    fn set_commit_log(&self, log: &str) -> Result<()> {
        match &self.target {
            Target::Transaction(_) => self.stage_pending("log", log),
            Target::Revision(rev) => self.set_revision_log(*rev, log),
        }
    }

    fn path_has_property(&self, path: &str, name: &str) -> Result<bool> {
        let (flag, value) = self.target_args();
        let out = run_tolerant(
            "svnlook",
            &["propget", &flag, &value, self.repos_str(), name, path],
            &[E_NO_SUCH_PROPERTY, E_NOT_FOUND],
        )?;
        Ok(out.is_some())
    }
}

// ---------------------------------------------------------------------------
// Sidecar promotion
// ---------------------------------------------------------------------------

/// Apply the rewritten log and propagation properties the pre-commit hook
/// staged for `txn` onto the now-durable revision, then drop the sidecar.
pub fn promote_pending(repos: &Path, txn: &str, rev: RevNum) -> Result<()> {
    let dir = repos.join(PENDING_DIR).join(txn);
    if !dir.exists() {
        return Ok(());
    }
    let proxy = SvnlookProxy::revision(repos, rev);

    let props_path = dir.join("props.yaml");
    if props_path.exists() {
        let data = std::fs::read_to_string(&props_path)?;
        let props: BTreeMap<String, String> = serde_yaml::from_str(&data)?;
        for (name, value) in &props {
            proxy.set_revision_property(rev, name, Some(value.as_str()))?;
        }
    }

    let log_path = dir.join("log");
    if log_path.exists() {
        let log = std::fs::read_to_string(&log_path)?;
        proxy.set_revision_log(rev, &log)?;
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Sibling repositories (Externals rule)
// ---------------------------------------------------------------------------

/// Resolves `project:url@rev` references against repositories living next to
/// the current one.
#[derive(Debug, Clone)]
pub struct SiblingRepos {
    parent: PathBuf,
}

impl SiblingRepos {
    pub fn new(repos: &Path) -> Self {
        Self {
            parent: repos.parent().unwrap_or(repos).to_path_buf(),
        }
    }
}

impl ExternalProjects for SiblingRepos {
    fn node_exists(&self, project: &str, url: &str, rev: RevNum) -> Result<bool> {
        let sibling = self.parent.join(project);
        if !sibling.is_dir() {
            return Err(GateError::ExternalProject(project.to_string()));
        }
        let sibling = sibling.to_string_lossy().into_owned();
        let rev_str = rev.to_string();
        let out = run_tolerant(
            "svnlook",
            &[
                "tree",
                "--non-recursive",
                "-r",
                &rev_str,
                &sibling,
                url,
            ],
            &[E_NOT_FOUND, E_NO_SUCH_REVISION],
        )?;
        Ok(out.is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
