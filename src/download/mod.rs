use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::command::{CommandBuilder, DownloadMode, DownloadRequest, ToolCommand};
use crate::config::Config;
use crate::invoker::{DownloadEvent, Failure, Invoker, Outcome};
use crate::validate::UrlValidator;
use crate::InputError;

/// Summary of one finished download, printed with `--json`
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub url: String,
    pub mode: DownloadMode,
    pub command: String,
    pub outcome: Outcome,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
}

impl DownloadReport {
    pub fn new(
        request: &DownloadRequest,
        command: &ToolCommand,
        outcome: Outcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let elapsed_secs = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        Self {
            url: command.url().unwrap_or(&request.url).to_string(),
            mode: request.mode,
            command: command.to_string(),
            message: outcome.message(),
            outcome,
            started_at,
            finished_at,
            elapsed_secs,
        }
    }
}

/// An invocation running on its own worker task
pub struct DownloadJob {
    /// Events in the order the worker produced them, ending with `Finished`
    pub events: UnboundedReceiver<DownloadEvent>,
    handle: JoinHandle<Outcome>,
}

impl DownloadJob {
    /// Wait for the worker and return its outcome
    pub async fn finish(self) -> Outcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Download worker failed: {}", e);
                Outcome::Failed(Failure::Worker {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Main download pipeline
///
/// Validator, builder and invoker are built once from the configuration and
/// never mutated, so one `Downloader` can serve any number of requests.
#[derive(Debug, Clone)]
pub struct Downloader {
    validator: UrlValidator,
    builder: CommandBuilder,
    invoker: Invoker,
}

impl Downloader {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            config.url_validator(),
            CommandBuilder::new(config.tool.clone(), config.audio.clone(), config.output_dir()),
            Invoker::new(config.timeout()),
        )
    }

    pub fn from_parts(validator: UrlValidator, builder: CommandBuilder, invoker: Invoker) -> Self {
        Self {
            validator,
            builder,
            invoker,
        }
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.invoker.timeout()
    }

    /// Validate the request and build its command; the tool is not launched
    pub fn prepare(&self, request: &DownloadRequest) -> Result<ToolCommand, InputError> {
        let url = self.validator.validate(&request.url)?;
        let request = DownloadRequest::new(url, request.mode);
        Ok(self.builder.build(&request))
    }

    /// Run `command` on a worker task
    pub fn start(&self, command: ToolCommand) -> DownloadJob {
        let (tx, rx) = mpsc::unbounded_channel();
        let invoker = self.invoker.clone();

        let handle = tokio::spawn(async move {
            let _ = tx.send(DownloadEvent::Started {
                command: command.to_string(),
            });

            let outcome = invoker.run(&command, &tx).await;

            let _ = tx.send(DownloadEvent::Finished(outcome.clone()));
            outcome
        });

        DownloadJob { events: rx, handle }
    }

    /// Validate, launch and wait, discarding intermediate events
    pub async fn download(&self, request: &DownloadRequest) -> Result<Outcome, InputError> {
        let command = self.prepare(request)?;
        tracing::info!("Downloading {} ({})", request.url, request.mode);
        Ok(self.start(command).finish().await)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, ToolConfig};

    /// A stand-in tool that echoes its arguments and exits with `code`
    fn fake_tool(code: i32) -> ToolConfig {
        ToolConfig {
            program: "sh".to_string(),
            program_args: vec![
                "-c".to_string(),
                format!("echo \"$@\"; exit {}", code),
                "fake-yt-dlp".to_string(),
            ],
            timeout_secs: None,
        }
    }

    fn downloader(tool: ToolConfig, timeout: Option<Duration>) -> Downloader {
        Downloader::from_parts(
            UrlValidator::new().with_required_host("soundcloud.com"),
            CommandBuilder::new(tool, AudioConfig::default(), "/tmp/sc-downloader-test"),
            Invoker::new(timeout),
        )
    }

    async fn collect(mut job: DownloadJob) -> (Vec<DownloadEvent>, Outcome) {
        let mut events = Vec::new();
        while let Some(event) = job.events.recv().await {
            events.push(event);
        }
        (events, job.finish().await)
    }

    #[tokio::test]
    async fn test_successful_single_download() {
        let downloader = downloader(fake_tool(0), None);
        let request =
            DownloadRequest::new("https://soundcloud.com/artist/track", DownloadMode::Single);

        let command = downloader.prepare(&request).unwrap();
        let (events, outcome) = collect(downloader.start(command)).await;

        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(outcome.message(), "Download complete!");
        assert!(matches!(events.first(), Some(DownloadEvent::Started { .. })));
        assert_eq!(events.last(), Some(&DownloadEvent::Finished(Outcome::Succeeded)));

        let echoed = events
            .iter()
            .find_map(|event| match event {
                DownloadEvent::Output(line) => Some(line.text.clone()),
                _ => None,
            })
            .unwrap();
        assert!(echoed.contains("%(title)s - %(uploader)s.%(ext)s"));
        assert!(echoed.ends_with("https://soundcloud.com/artist/track"));
        assert!(!echoed.contains("--yes-playlist"));
    }

    #[tokio::test]
    async fn test_failed_collection_download() {
        let downloader = downloader(fake_tool(1), None);
        let request = DownloadRequest::new(
            "https://soundcloud.com/artist/sets/mix",
            DownloadMode::Collection,
        );

        let outcome = downloader.download(&request).await.unwrap();

        assert!(matches!(outcome, Outcome::Failed(Failure::Exit { code: Some(1), .. })));
    }

    #[tokio::test]
    async fn test_invalid_url_never_launches() {
        // The tool would fail loudly if it were launched
        let tool = ToolConfig {
            program: "definitely-not-installed-tool-xyz".to_string(),
            ..ToolConfig::default()
        };
        let downloader = downloader(tool, None);

        let result = downloader
            .download(&DownloadRequest::new("not a url", DownloadMode::Single))
            .await;

        assert_eq!(result, Err(InputError::Malformed("not a url".to_string())));
    }

    #[tokio::test]
    async fn test_wrong_host_is_rejected() {
        let downloader = downloader(fake_tool(0), None);
        let result = downloader.prepare(&DownloadRequest::new(
            "https://example.com/track",
            DownloadMode::Single,
        ));

        assert!(matches!(result, Err(InputError::WrongHost { .. })));
    }

    #[tokio::test]
    async fn test_prepare_trims_url() {
        let downloader = downloader(fake_tool(0), None);
        let command = downloader
            .prepare(&DownloadRequest::new("  https://soundcloud.com/a/b  ", DownloadMode::Single))
            .unwrap();

        assert_eq!(command.url(), Some("https://soundcloud.com/a/b"));
    }

    #[tokio::test]
    async fn test_timeout_returns_control() {
        let tool = ToolConfig {
            program: "sh".to_string(),
            program_args: vec![
                "-c".to_string(),
                "exec sleep 10".to_string(),
                "fake-yt-dlp".to_string(),
            ],
            timeout_secs: None,
        };
        let limit = Duration::from_millis(200);
        let downloader = downloader(tool, Some(limit));

        let outcome = downloader
            .download(&DownloadRequest::new("https://soundcloud.com/a/b", DownloadMode::Single))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::TimedOut { after: limit });
    }

    #[tokio::test]
    async fn test_report_serializes_outcome() {
        let downloader = downloader(fake_tool(1), None);
        let request = DownloadRequest::new("https://soundcloud.com/a/b", DownloadMode::Single);
        let command = downloader.prepare(&request).unwrap();
        let started_at = Utc::now();

        let outcome = downloader.start(command.clone()).finish().await;
        let report = DownloadReport::new(&request, &command, outcome, started_at);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["mode"], "single");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["kind"], "exit");
        assert_eq!(json["outcome"]["code"], 1);
        assert_eq!(json["message"], "Download failed. Please check the URL and try again.");
        assert!(report.finished_at >= report.started_at);
    }
}
