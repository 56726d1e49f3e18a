use anyhow::Result;
use clap::ValueEnum;
use futures_util::StreamExt as _;
use futures_util::TryStreamExt as _;
use futures_util::stream;
use log::info;
use serde::Serialize;

use crate::App;
use crate::SyncState;
use crate::ops::git::GitOps;
use crate::outcome::RepositoryOutcomes;
use crate::report::RepositoryTask;
use crate::table;

/// How the final report is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Boxed table of recorded outcomes
    #[default]
    Table,
    /// Summary and recorded outcomes as JSON
    Json,
}

/// Terminal state counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub merged: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn from_states(states: &[SyncState]) -> Self {
        states.iter().fold(Self::default(), |mut summary, state| {
            match state {
                SyncState::CreatedNew => summary.created += 1,
                SyncState::MergedIntoExisting => summary.merged += 1,
                SyncState::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a SyncSummary,
    repositories: &'a [RepositoryOutcomes],
}

impl<G: GitOps> App<G> {
    /// Synchronize every repository, at most `config.jobs` at a time.
    ///
    /// Returns once every repository has reached a terminal state. A driver
    /// error from any repository aborts the batch; repositories still running
    /// are dropped and the remaining ones never start.
    pub async fn run_batch(&self, tasks: &[RepositoryTask]) -> Result<SyncSummary> {
        info!(
            "Synchronizing {} repositories, {} at a time",
            tasks.len(),
            self.config.jobs
        );

        let states: Vec<SyncState> = stream::iter(tasks)
            .map(|task| self.sync_repository(task))
            .buffer_unordered(self.config.jobs.max(1))
            .try_collect()
            .await?;

        let summary = SyncSummary::from_states(&states);
        info!(
            "Done: {} created, {} merged, {} failed",
            summary.created, summary.merged, summary.failed
        );
        Ok(summary)
    }

    /// Run the batch and print the recorded outcomes.
    pub async fn cmd_sync(
        &self,
        tasks: &[RepositoryTask],
        format: OutputFormat,
        stdout: &mut impl std::io::Write,
    ) -> Result<SyncSummary> {
        let summary = self.run_batch(tasks).await?;
        let repositories = self.log.snapshot();

        match format {
            OutputFormat::Table => write!(stdout, "{}", table::render(&repositories))?,
            OutputFormat::Json => {
                let report = JsonReport {
                    summary: &summary,
                    repositories: &repositories,
                };
                serde_json::to_writer_pretty(&mut *stdout, &report)?;
                writeln!(stdout)?;
            }
        }

        Ok(summary)
    }
}
