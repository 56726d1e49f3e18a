use std::fmt::Display;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::info;
use log::warn;
use tracing::instrument;

use crate::config::Config;
use crate::ops::git::GitOps;
use crate::outcome::OperationOutcome;
use crate::outcome::OutcomeLog;
use crate::report::RepositoryTask;

pub struct App<G: GitOps> {
    pub config: Config,
    pub git: G,
    /// Outcomes recorded during the current batch run.
    pub log: OutcomeLog,
}

/// Step of the synchronization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Clone,
    CheckoutStable,
    Merge,
    CheckoutTarget,
    CreateBranch,
}

/// Terminal state of one repository's synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// The stable branch existed and the target commit was merged into it.
    MergedIntoExisting,
    /// The stable branch was created at the target commit.
    CreatedNew,
    /// The sequence stopped at this step.
    Failed(SyncStep),
}

impl Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clone => f.write_str("clone"),
            Self::CheckoutStable => f.write_str("checkout stable branch"),
            Self::Merge => f.write_str("merge"),
            Self::CheckoutTarget => f.write_str("checkout target commit"),
            Self::CreateBranch => f.write_str("create branch"),
        }
    }
}

impl<G: GitOps> App<G> {
    pub fn new(config: Config, git: G) -> Self {
        Self {
            config,
            git,
            log: OutcomeLog::new(),
        }
    }

    /// Bring one repository's stable branch up to date with its target commit.
    ///
    /// 1. Clone the repository into its working copy.
    /// 2. If the stable branch exists, check it out and merge the target
    ///    commit with `--no-ff`.
    /// 3. Otherwise check out the target commit and create the stable branch
    ///    there.
    ///
    /// The first failing step is recorded and ends this repository's run.
    /// `Err` is returned only when git cannot be driven at all, which must
    /// abort the whole batch.
    #[instrument(skip_all, fields(repo = %task.name))]
    pub async fn sync_repository(&self, task: &RepositoryTask) -> Result<SyncState> {
        let repo = task.name.as_str();
        let branch = self.config.stable_branch.as_str();

        let outcome = self.git.clone_repo(repo, &task.remote_url).await?;
        if let Some(failed) = self.record(repo, SyncStep::Clone, &outcome) {
            return Ok(failed);
        }

        let exists = self
            .git
            .branch_exists(repo, branch)
            .await
            .with_context(|| format!("Unable to list branches of {repo}"))?;
        debug!("Stable branch {branch} exists: {exists}");

        if exists {
            let outcome = self.git.checkout(repo, branch).await?;
            if let Some(failed) = self.record(repo, SyncStep::CheckoutStable, &outcome) {
                return Ok(failed);
            }

            let outcome = self.git.merge_no_ff(repo, &task.target_commit).await?;
            if let Some(failed) = self.record(repo, SyncStep::Merge, &outcome) {
                return Ok(failed);
            }

            info!("Merged {} into {branch}", task.target_commit);
            Ok(SyncState::MergedIntoExisting)
        } else {
            let outcome = self.git.checkout(repo, &task.target_commit).await?;
            if let Some(failed) = self.record(repo, SyncStep::CheckoutTarget, &outcome) {
                return Ok(failed);
            }

            let outcome = self.git.create_branch(repo, branch).await?;
            if let Some(failed) = self.record(repo, SyncStep::CreateBranch, &outcome) {
                return Ok(failed);
            }

            info!("Created {branch} at {}", task.target_commit);
            Ok(SyncState::CreatedNew)
        }
    }

    /// Record a step's outcome, returning the failed state if the step failed.
    fn record(&self, repo: &str, step: SyncStep, outcome: &OperationOutcome) -> Option<SyncState> {
        self.log.record(repo, outcome, self.config.verbose);
        if outcome.failed {
            warn!("{step} failed for {repo}: {}", outcome.message);
            Some(SyncState::Failed(step))
        } else {
            None
        }
    }
}
