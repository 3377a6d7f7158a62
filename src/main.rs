use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sc_downloader::cli::{Cli, Commands};
use sc_downloader::command::{DownloadMode, DownloadRequest};
use sc_downloader::config::Config;
use sc_downloader::download::{DownloadReport, Downloader};
use sc_downloader::interactive::PromptLoop;
use sc_downloader::invoker::Outcome;
use sc_downloader::output::{ConsoleReporter, ConsoleSession};
use sc_downloader::{utils, DownloaderError};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "sc_downloader=debug"
    } else if cli.quiet {
        "sc_downloader=warn"
    } else {
        "sc_downloader=info"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let reporter = ConsoleReporter::new(cli.quiet);

    match cli.command {
        Some(Commands::Download {
            url,
            mode,
            output_dir,
            timeout,
            any_host,
            dry_run,
            json,
        }) => {
            if let Some(dir) = output_dir {
                config.app.output_dir = Some(dir);
            }
            if timeout.is_some() {
                config.tool.timeout_secs = timeout;
            }
            if any_host {
                config.app.required_host = None;
            }

            return run_download(&config, reporter, url, mode, dry_run, json).await;
        }
        Some(Commands::Interactive) | None => {
            warn_missing_dependencies(&config);

            let session = ConsoleSession::new(Downloader::new(&config), reporter);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            PromptLoop::new(session.downloader().validator(), &session)
                .run(stdin, &mut std::io::stdout())
                .await?;
        }
        Some(Commands::Config { show }) => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::config_path()?,
            };
            if show {
                config.display();
            }
            println!("Configuration file: {}", display_path(&path));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Exit status for a download that ran past its deadline, as `timeout(1)` uses
const EXIT_TIMED_OUT: u8 = 124;

/// Runs one download; failures were already shown, so they map to an exit code only
async fn run_download(
    config: &Config,
    reporter: ConsoleReporter,
    url: String,
    mode: DownloadMode,
    dry_run: bool,
    json: bool,
) -> Result<ExitCode> {
    let downloader = Downloader::new(config);
    let request = DownloadRequest::new(url, mode);

    let command = downloader
        .prepare(&request)
        .map_err(DownloaderError::from)?;

    if dry_run {
        println!("{}", command);
        return Ok(ExitCode::SUCCESS);
    }

    warn_missing_dependencies(config);
    tracing::info!(
        "Starting {} download from {}: {}",
        request.mode,
        utils::extract_domain(&request.url).unwrap_or_else(|| "unknown host".to_string()),
        request.url
    );
    tracing::info!("Saving to {}", config.output_dir().display());
    if let Some(limit) = downloader.timeout() {
        tracing::info!("Giving up after {}", utils::format_duration(limit));
    }

    let started_at = chrono::Utc::now();
    let outcome = reporter.render(downloader.start(command.clone())).await;

    if json {
        let report = DownloadReport::new(&request, &command, outcome.clone(), started_at);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        reporter.report(&outcome);
    }

    Ok(match outcome {
        Outcome::Succeeded => ExitCode::SUCCESS,
        Outcome::Failed(_) => ExitCode::FAILURE,
        Outcome::TimedOut { .. } => ExitCode::from(EXIT_TIMED_OUT),
    })
}

/// Non-fatal: a missing tool still surfaces as a launch failure later
fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(&config.tool.program);
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn display_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
