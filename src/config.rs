use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

/// Branch every repository is synchronized toward.
pub const DEFAULT_STABLE_BRANCH: &str = "autotest-stable";

/// Directory holding one working copy per repository.
pub const DEFAULT_WORKSPACE: &str = "stable_workspace";

/// Repositories synchronized at once. Kept low so a batch does not hammer the
/// git host or local disk.
pub const DEFAULT_JOBS: usize = 2;

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: PathBuf,
    pub stable_branch: String,
    pub jobs: usize,
    /// Record successful steps as well as failures.
    pub verbose: bool,
}

impl Config {
    /// Create a new config with explicit values
    pub fn new(workspace: PathBuf, stable_branch: String, jobs: usize, verbose: bool) -> Self {
        Self {
            workspace,
            stable_branch,
            jobs: jobs.max(1),
            verbose,
        }
    }

    /// Default config for tests
    pub fn default_for_tests() -> Self {
        Self {
            workspace: PathBuf::from("test_workspace"),
            stable_branch: DEFAULT_STABLE_BRANCH.to_string(),
            jobs: DEFAULT_JOBS,
            verbose: false,
        }
    }

    /// Create the workspace directory if it does not exist yet.
    pub async fn prepare_workspace(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.workspace)
            .await
            .with_context(|| format!("Failed to create workspace {}", self.workspace.display()))
    }
}
