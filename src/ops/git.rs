#![allow(async_fn_in_trait)]

use std::path::Path;
use std::path::PathBuf;
use std::process::Output;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;

use crate::outcome::OperationOutcome;

/// Message recorded when `git checkout -b` succeeds, since git prints nothing
/// useful on success.
pub const BRANCH_CREATED_MESSAGE: &str = "Branch Created Successfully";

// -----------------------------------------------------------------------------
// GitOps trait

/// Operations for driving a repository's working copy.
///
/// Every operation addresses the working copy by repository name. A returned
/// `Err` means git itself could not be driven; an operation that ran and
/// exited non-zero is an `Ok` outcome with `failed` set.
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Clone `url` into the working copy for `repo`.
    async fn clone_repo(&self, repo: &str, url: &str) -> Result<OperationOutcome>;

    /// Check whether a local or remote-tracking branch named `branch` exists.
    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool>;

    /// Switch the working copy to an existing branch or commit.
    async fn checkout(&self, repo: &str, revision: &str) -> Result<OperationOutcome>;

    /// Create `branch` at the current position and switch to it.
    async fn create_branch(&self, repo: &str, branch: &str) -> Result<OperationOutcome>;

    /// Merge `commit` into the current branch, always producing a merge commit.
    async fn merge_no_ff(&self, repo: &str, commit: &str) -> Result<OperationOutcome>;
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI.
///
/// Working copies live in `<workspace>/<repo>`.
pub struct RealGit {
    workspace: PathBuf,
}

impl RealGit {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    pub fn working_copy(&self, repo: &str) -> PathBuf {
        self.workspace.join(repo)
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(dir)
            .args(args)
            // Never block an unattended batch on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute git command")
    }
}

impl GitOps for RealGit {
    async fn clone_repo(&self, repo: &str, url: &str) -> Result<OperationOutcome> {
        let output = self
            .run(&self.workspace, &["clone", "--", url, repo])
            .await?;
        Ok(outcome_from_stderr("clone", &output))
    }

    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool> {
        let output = self
            .run(
                &self.working_copy(repo),
                &["for-each-ref", "--format=%(refname)", "refs/heads", "refs/remotes"],
            )
            .await?;

        if !output.status.success() {
            bail!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(has_branch(&String::from_utf8(output.stdout)?, branch))
    }

    async fn checkout(&self, repo: &str, revision: &str) -> Result<OperationOutcome> {
        if let Some(rejected) = reject_option_like("checkout", revision) {
            return Ok(rejected);
        }
        let output = self
            .run(&self.working_copy(repo), &["checkout", revision])
            .await?;
        Ok(outcome_from_stderr("checkout", &output))
    }

    async fn create_branch(&self, repo: &str, branch: &str) -> Result<OperationOutcome> {
        let output = self
            .run(&self.working_copy(repo), &["checkout", "-b", branch])
            .await?;

        if output.status.success() {
            Ok(OperationOutcome::success(BRANCH_CREATED_MESSAGE))
        } else {
            Ok(outcome_from_stderr("checkout -b", &output))
        }
    }

    async fn merge_no_ff(&self, repo: &str, commit: &str) -> Result<OperationOutcome> {
        if let Some(rejected) = reject_option_like("merge", commit) {
            return Ok(rejected);
        }
        let output = self
            .run(
                &self.working_copy(repo),
                &["merge", "--no-ff", "--no-edit", commit],
            )
            .await?;

        if output.status.success() {
            return Ok(OperationOutcome::success(String::from_utf8_lossy(
                &output.stdout,
            )));
        }

        // Conflicts are reported on stdout, usage errors on stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout)
        } else {
            stderr
        };
        Ok(failure_with_fallback("merge", &output, &text))
    }
}

// -----------------------------------------------------------------------------
// Helpers

fn outcome_from_stderr(subcommand: &str, output: &Output) -> OperationOutcome {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        OperationOutcome::success(stderr)
    } else {
        failure_with_fallback(subcommand, output, &stderr)
    }
}

/// A failed outcome always carries text, even when git printed nothing.
fn failure_with_fallback(subcommand: &str, output: &Output, text: &str) -> OperationOutcome {
    if text.trim().is_empty() {
        OperationOutcome::failure(format!("git {} exited with {}", subcommand, output.status))
    } else {
        OperationOutcome::failure(text)
    }
}

/// git would read a revision starting with `-` as an option.
fn reject_option_like(subcommand: &str, revision: &str) -> Option<OperationOutcome> {
    revision.starts_with('-').then(|| {
        OperationOutcome::failure(format!(
            "git {subcommand}: refusing revision {revision:?} that looks like an option"
        ))
    })
}

/// Match `branch` against full ref names, as a local branch or as a branch
/// under any remote.
fn has_branch(refs: &str, branch: &str) -> bool {
    refs.lines().map(str::trim).any(|refname| {
        if let Some(local) = refname.strip_prefix("refs/heads/") {
            return local == branch;
        }
        refname
            .strip_prefix("refs/remotes/")
            .and_then(|remote_ref| remote_ref.split_once('/'))
            .is_some_and(|(_, name)| name == branch)
    })
}
