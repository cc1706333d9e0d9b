mod access_file;
mod svnlook;
mod trac;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use commitgate_core::actuator::PostCommitActuator;
use commitgate_core::config::GateConfig;
use commitgate_core::engine::PolicyEngine;
use commitgate_core::repo::RepositoryProxy;
use commitgate_core::types::{Commit, CommitId, RevNum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use svnlook::{SiblingRepos, SvnlookProxy};
use trac::TracTracker;

const ACCEPT: u8 = 0;
const REJECT: u8 = 1;

#[derive(Parser)]
#[command(
    name = "commitgate",
    about = "Commit-time workflow policy hooks for Subversion repositories",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file (YAML); defaults apply when omitted
    #[arg(long, global = true, env = "COMMITGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pending transaction; exit 0 to accept, 1 to abort
    PreCommit {
        /// Repository path
        #[arg(long)]
        repos: PathBuf,
        /// Transaction name, as handed to the hook by the server
        #[arg(long)]
        txn: String,
    },
    /// Propagate an accepted revision into the issue tracker
    PostCommit {
        /// Repository path
        #[arg(long)]
        repos: PathBuf,
        /// Committed revision number
        #[arg(long)]
        rev: RevNum,
        /// Transaction name the revision came from (promotes staged
        /// rewrites when given)
        #[arg(long)]
        txn: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(REJECT);
        }
    };

    match cli.command {
        Commands::PreCommit { repos, txn } => match pre_commit(&config, &repos, &txn) {
            Ok(()) => ExitCode::from(ACCEPT),
            Err(err) => {
                // One line per violated rule, the first failing rule first.
                eprintln!("{err}");
                ExitCode::from(REJECT)
            }
        },
        Commands::PostCommit { repos, rev, txn } => {
            // The revision is already durable; nothing here may veto it.
            if let Err(err) = post_commit(&config, &repos, rev, txn.as_deref()) {
                tracing::error!(rev, error = %err, "post-commit processing failed");
            }
            ExitCode::from(ACCEPT)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GateConfig> {
    match path {
        Some(path) => {
            GateConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(GateConfig::default()),
    }
}

fn pre_commit(config: &GateConfig, repos: &Path, txn: &str) -> anyhow::Result<()> {
    which::which("svnlook").context("svnlook not found in PATH")?;

    let proxy = SvnlookProxy::transaction(repos, txn);
    // A repository being seeded has nothing to police yet.
    if proxy.youngest_revision()? == 0 {
        return Ok(());
    }

    let access = access_file::load(&config.access_file)?;
    let tracker = TracTracker::new(&config.tracker.url)?;
    let externals = SiblingRepos::new(repos);

    let commit = Commit {
        id: CommitId::Transaction {
            name: txn.to_string(),
        },
        author: proxy.commit_author()?,
        timestamp: Utc::now(),
        log: proxy.commit_log()?,
        changed_paths: proxy.changed_paths()?,
    };

    let engine = PolicyEngine::new(config, &access, &proxy, &tracker, &externals)?;
    let final_log = engine.evaluate(&commit)?;
    proxy.set_commit_log(&final_log)?;
    Ok(())
}

fn post_commit(
    config: &GateConfig,
    repos: &Path,
    rev: RevNum,
    txn: Option<&str>,
) -> anyhow::Result<()> {
    // Repository bootstrap revisions carry no workflow commands.
    if rev < 2 {
        return Ok(());
    }
    which::which("svnlook").context("svnlook not found in PATH")?;

    if let Some(txn) = txn {
        if let Err(err) = svnlook::promote_pending(repos, txn, rev) {
            tracing::warn!(rev, txn, error = %err, "cannot promote staged rewrites");
        }
    }

    let proxy = SvnlookProxy::revision(repos, rev);
    let tracker = TracTracker::new(&config.tracker.url)?;

    let commit = Commit {
        id: CommitId::Revision { rev },
        author: proxy.revision_author(rev)?,
        timestamp: Utc::now(),
        log: proxy.revision_log(rev)?,
        changed_paths: proxy.changed_paths()?,
    };

    let actuator = PostCommitActuator::new(config, &proxy, &tracker)?;
    actuator.actuate(&commit)?;
    Ok(())
}
