use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use stable_sync::App;
use stable_sync::Config;
use stable_sync::commands::OutputFormat;
use stable_sync::config::DEFAULT_JOBS;
use stable_sync::config::DEFAULT_STABLE_BRANCH;
use stable_sync::config::DEFAULT_WORKSPACE;
use stable_sync::ops::git::RealGit;
use stable_sync::report;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "stable-sync")]
#[command(about = "Create or update a stable branch across every repository in a build report", long_about = None)]
pub struct Cli {
    /// The build report to update the stable branch from
    #[arg(long)]
    pub report: PathBuf,
    /// Also report steps that succeeded
    #[arg(short, long)]
    pub verbose: bool,
    /// Number of repositories synchronized at once
    #[arg(short, long, default_value_t = DEFAULT_JOBS, value_parser = parse_jobs)]
    pub jobs: usize,
    /// Directory holding the working copies
    #[arg(long, default_value = DEFAULT_WORKSPACE)]
    pub workspace: PathBuf,
    /// Name of the stable branch
    #[arg(long, default_value = DEFAULT_STABLE_BRANCH, value_parser = parse_branch)]
    pub branch: String,
    /// Output format of the final report
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Exit with status 1 if any repository failed to synchronize
    #[arg(long)]
    pub fail_on_error: bool,
}

fn parse_jobs(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_branch(s: &str) -> Result<String, String> {
    if s.is_empty() {
        Err("must not be empty".to_string())
    } else if s.starts_with('-') {
        Err("must not start with '-'".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()?;
    // stdout is reserved for the final report
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    let config = Config::new(cli.workspace, cli.branch, cli.jobs, cli.verbose);
    let tasks = report::load(&cli.report).await?;
    config.prepare_workspace().await?;

    let app = App::new(config.clone(), RealGit::new(config.workspace));
    let summary = app
        .cmd_sync(&tasks, cli.format, &mut std::io::stdout())
        .await?;

    if cli.fail_on_error && summary.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["stable-sync", "--report", "build.csv"]);
        assert_eq!(cli.report, PathBuf::from("build.csv"));
        assert!(!cli.verbose);
        assert_eq!(cli.jobs, 2);
        assert_eq!(cli.workspace, PathBuf::from("stable_workspace"));
        assert_eq!(cli.branch, "autotest-stable");
        assert_eq!(cli.format, OutputFormat::Table);
        assert!(!cli.fail_on_error);
    }

    #[test]
    fn test_cli_rejects_zero_jobs() {
        assert!(Cli::try_parse_from(["stable-sync", "--report", "r.csv", "--jobs", "0"]).is_err());
    }

    #[test]
    fn test_cli_rejects_option_like_branch() {
        assert!(Cli::try_parse_from(["stable-sync", "--report", "r.csv", "--branch=--detach"]).is_err());
        assert!(Cli::try_parse_from(["stable-sync", "--report", "r.csv", "--branch="]).is_err());
        let cli = Cli::parse_from(["stable-sync", "--report", "r.csv", "--branch", "release-stable"]);
        assert_eq!(cli.branch, "release-stable");
    }

    #[test]
    fn test_cli_requires_report() {
        assert!(Cli::try_parse_from(["stable-sync"]).is_err());
    }
}
