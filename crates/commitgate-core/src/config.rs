use crate::branch::BranchPattern;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// BranchConfig
// ---------------------------------------------------------------------------

/// Branch topology: which roots hold which kind of branch, and the pattern
/// that extracts a branch path from a changed path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    #[serde(default = "default_trunk_dir")]
    pub trunk_dir: String,
    #[serde(default = "default_dev_branch_dirs")]
    pub dev_branch_dirs: Vec<String>,
    #[serde(default = "default_admin_branch_dirs")]
    pub admin_branch_dirs: Vec<String>,
    #[serde(default = "default_vendor_dir")]
    pub vendor_dir: String,
    /// Regex with a `branch` named group (and an optional `tag` group used
    /// for administrator tag lookups).
    #[serde(default = "default_branch_pattern")]
    pub pattern: String,
}

fn default_trunk_dir() -> String {
    "/trunk".to_string()
}

fn default_dev_branch_dirs() -> Vec<String> {
    vec!["/sandboxes".to_string()]
}

fn default_admin_branch_dirs() -> Vec<String> {
    vec![
        "/tags".to_string(),
        "/branches".to_string(),
        "/platforms".to_string(),
    ]
}

fn default_vendor_dir() -> String {
    "/vendor".to_string()
}

fn default_branch_pattern() -> String {
    r"^(?P<branch>/trunk|/(?:branches|sandboxes|platforms|vendor)/[^/]+)(?:/|$)|^(?P<tag>/tags/[^/]+)(?:/|$)"
        .to_string()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            trunk_dir: default_trunk_dir(),
            dev_branch_dirs: default_dev_branch_dirs(),
            admin_branch_dirs: default_admin_branch_dirs(),
            vendor_dir: default_vendor_dir(),
            pattern: default_branch_pattern(),
        }
    }
}

// ---------------------------------------------------------------------------
// MilestoneConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneConfig {
    /// Milestones never eligible as a delivery target.
    #[serde(default = "default_excluded_milestones")]
    pub excluded: Vec<String>,
    /// Placeholder a closed ticket sits in until its fix is delivered.
    #[serde(default = "default_placeholder_milestone")]
    pub placeholder: String,
    /// Milestone assigned when a delivery lands somewhere other than trunk.
    #[serde(default = "default_na_milestone")]
    pub not_applicable: String,
}

fn default_excluded_milestones() -> Vec<String> {
    vec!["Unclassified".to_string()]
}

fn default_placeholder_milestone() -> String {
    "Next".to_string()
}

fn default_na_milestone() -> String {
    "NotApplicable".to_string()
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            excluded: default_excluded_milestones(),
            placeholder: default_placeholder_milestone(),
            not_applicable: default_na_milestone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyConfig
// ---------------------------------------------------------------------------

/// Names of the revision properties the engine reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    #[serde(default = "default_deliver_prop")]
    pub deliver: String,
    #[serde(default = "default_bring_prop")]
    pub bring: String,
    #[serde(default = "default_export_prop")]
    pub export: String,
    #[serde(default = "default_externals_prop")]
    pub externals: String,
    #[serde(default = "default_mergeinfo_prop")]
    pub mergeinfo: String,
}

fn default_deliver_prop() -> String {
    "rth:deliver".to_string()
}

fn default_bring_prop() -> String {
    "rth:bring".to_string()
}

fn default_export_prop() -> String {
    "rth:export".to_string()
}

fn default_externals_prop() -> String {
    "svn:externals".to_string()
}

fn default_mergeinfo_prop() -> String {
    "svn:mergeinfo".to_string()
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            deliver: default_deliver_prop(),
            bring: default_bring_prop(),
            export: default_export_prop(),
            externals: default_externals_prop(),
            mergeinfo: default_mergeinfo_prop(),
        }
    }
}

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// JSON-RPC endpoint of the issue tracker.
    #[serde(default = "default_tracker_url")]
    pub url: String,
}

fn default_tracker_url() -> String {
    "http://localhost:8000/rpc".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: default_tracker_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub branches: BranchConfig,
    #[serde(default)]
    pub milestones: MilestoneConfig,
    #[serde(default)]
    pub properties: PropertyConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Components a ticket must be moved out of before its fix can ship.
    #[serde(default = "default_invalid_components")]
    pub invalid_components: Vec<String>,
    /// Administrator allow-list file (`[groups] admins = ...`).
    #[serde(default = "default_access_file")]
    pub access_file: PathBuf,
    /// Directory receiving one `<rev>.tag` marker per accepted revision.
    #[serde(default)]
    pub events_dir: Option<PathBuf>,
}

fn default_invalid_components() -> Vec<String> {
    vec!["Triage".to_string(), "None".to_string()]
}

fn default_access_file() -> PathBuf {
    PathBuf::from("/local/var/svn/config/access.conf")
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            branches: BranchConfig::default(),
            milestones: MilestoneConfig::default(),
            properties: PropertyConfig::default(),
            tracker: TrackerConfig::default(),
            invalid_components: default_invalid_components(),
            access_file: default_access_file(),
            events_dir: None,
        }
    }
}

impl GateConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: GateConfig = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Compile the configured branch-extraction pattern.
    pub fn branch_pattern(&self) -> Result<BranchPattern> {
        BranchPattern::new(&self.branches.pattern)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
