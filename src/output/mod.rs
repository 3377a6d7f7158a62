use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::command::DownloadRequest;
use crate::download::{DownloadJob, Downloader};
use crate::interactive::RequestHandler;
use crate::invoker::{DownloadEvent, Failure, LineLevel, Outcome, OutputLine};
use crate::InputError;

/// Renders the events of a running download on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Consume `job`'s events until the worker finishes
    pub async fn render(&self, mut job: DownloadJob) -> Outcome {
        let progress = if self.quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
                    )
                    .unwrap()
                    .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };

        while let Some(event) = job.events.recv().await {
            match event {
                DownloadEvent::Started { command } => {
                    tracing::debug!("Running: {}", command);
                    progress.set_message("Downloading...");
                }
                DownloadEvent::Output(line) => self.show_line(&progress, &line),
                DownloadEvent::Progress { percent } => {
                    progress.set_position(percent.round() as u64);
                }
                DownloadEvent::Finished(_) => break,
            }
        }

        progress.finish_and_clear();
        job.finish().await
    }

    fn show_line(&self, progress: &ProgressBar, line: &OutputLine) {
        // Progress lines are already reflected by the bar
        if line.progress_percent().is_some() && !progress.is_hidden() {
            return;
        }

        if self.quiet {
            if line.level == LineLevel::Error {
                eprintln!("{}", format_line(line));
            }
        } else if progress.is_hidden() {
            // No terminal on stderr: indicatif drops println on a hidden bar
            eprintln!("{}", format_line(line));
        } else {
            progress.println(format_line(line));
        }
    }

    /// Print the final outcome message
    pub fn report(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Succeeded => println!("\n{}", style(outcome.message()).green().bold()),
            Outcome::Failed(_) | Outcome::TimedOut { .. } => {
                eprintln!("\n{}", style(outcome.message()).red().bold());
                self.report_diagnostics(outcome);
            }
        }
    }

    /// Tool stderr tail for failed runs; without --quiet it was already shown live
    pub fn report_diagnostics(&self, outcome: &Outcome) {
        if let Outcome::Failed(Failure::Exit { diagnostics, .. }) = outcome {
            if self.quiet {
                for line in diagnostics {
                    eprintln!("  {}", style(line).dim());
                }
            }
        }
    }
}

/// Colour a tool line by its level
pub fn format_line(line: &OutputLine) -> String {
    match line.level {
        LineLevel::Error => style(&line.text).red().to_string(),
        LineLevel::Warning => style(&line.text).yellow().to_string(),
        LineLevel::Normal => line.text.clone(),
    }
}

/// Downloads submitted from the prompt loop, rendered on the terminal
pub struct ConsoleSession {
    downloader: Downloader,
    reporter: ConsoleReporter,
}

impl ConsoleSession {
    pub fn new(downloader: Downloader, reporter: ConsoleReporter) -> Self {
        Self {
            downloader,
            reporter,
        }
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }
}

#[async_trait]
impl RequestHandler for ConsoleSession {
    async fn handle(&self, request: DownloadRequest) -> Result<Outcome, InputError> {
        let command = self.downloader.prepare(&request)?;
        tracing::info!("Downloading {} ({})", request.url, request.mode);

        let outcome = self.reporter.render(self.downloader.start(command)).await;
        self.reporter.report_diagnostics(&outcome);
        Ok(outcome)
    }
}
