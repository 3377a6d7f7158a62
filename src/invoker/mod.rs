use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::command::ToolCommand;

/// How many trailing stderr lines are kept for failure reports
const DIAGNOSTIC_LINES: usize = 20;

/// How long to keep reading output once the tool itself has exited
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Which pipe a line of tool output arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Severity inferred from the text of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineLevel {
    Normal,
    Warning,
    Error,
}

impl LineLevel {
    pub fn classify(line: &str) -> Self {
        if line.contains("ERROR") || line.contains("error") {
            LineLevel::Error
        } else if line.contains("WARNING") || line.contains("warning") {
            LineLevel::Warning
        } else {
            LineLevel::Normal
        }
    }
}

/// One line of tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
    pub level: LineLevel,
}

impl OutputLine {
    pub fn new(stream: Stream, text: impl Into<String>) -> Self {
        let text = text.into();
        let level = LineLevel::classify(&text);
        Self { stream, text, level }
    }

    /// Percentage from a yt-dlp `[download]  42.0% of ...` line
    pub fn progress_percent(&self) -> Option<f32> {
        let rest = self.text.trim_start().strip_prefix("[download]")?;
        let token = rest.split_whitespace().next()?;
        let percent = token.strip_suffix('%')?.parse::<f32>().ok()?;
        (0.0..=100.0).contains(&percent).then_some(percent)
    }
}

/// Why an invocation did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// The tool could not be started or waited on
    Launch { message: String },

    /// The tool ran and exited non-zero (or was killed by a signal)
    Exit {
        code: Option<i32>,
        diagnostics: Vec<String>,
    },

    /// The worker running the invocation died
    Worker { message: String },
}

/// Final classification of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed(Failure),
    TimedOut { after: Duration },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    /// Short message shown to the user
    pub fn message(&self) -> String {
        match self {
            Outcome::Succeeded => "Download complete!".to_string(),
            Outcome::Failed(Failure::Exit { .. }) => {
                "Download failed. Please check the URL and try again.".to_string()
            }
            Outcome::Failed(Failure::Launch { message } | Failure::Worker { message }) => {
                format!("An unexpected error occurred: {}", message)
            }
            Outcome::TimedOut { after } => format!(
                "Download timed out after {}.",
                crate::utils::format_duration(*after)
            ),
        }
    }
}

/// Structured progress reported from the worker to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DownloadEvent {
    Started { command: String },
    Output(OutputLine),
    Progress { percent: f32 },
    Finished(Outcome),
}

/// Runs tool commands as child processes
#[derive(Debug, Clone, Default)]
pub struct Invoker {
    timeout: Option<Duration>,
}

impl Invoker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Launch `command`, forward its output to `events`, and wait for it to exit.
    ///
    /// Never retries. On timeout the child is killed best-effort and the wait is
    /// abandoned. `Started` and `Finished` events are left to the caller.
    pub async fn run(
        &self,
        command: &ToolCommand,
        events: &UnboundedSender<DownloadEvent>,
    ) -> Outcome {
        tracing::debug!("Spawning: {}", command);

        let mut child = match Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to launch {}: {}", command.program, e);
                return Outcome::Failed(Failure::Launch {
                    message: format!("failed to launch {}: {}", command.program, e),
                });
            }
        };

        let stdout = child
            .stdout
            .take()
            .map(|pipe| forward_lines(pipe, Stream::Stdout, events.clone()));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| forward_lines(pipe, Stream::Stderr, events.clone()));

        let completion = async {
            let status = child.wait().await;
            let (mut stdout, mut stderr) = (stdout, stderr);

            // A grandchild may inherit the pipes and keep them open after exit
            let drained = tokio::time::timeout(DRAIN_GRACE, async {
                if let Some(handle) = stdout.as_mut() {
                    let _ = handle.await;
                }
                match stderr.as_mut() {
                    Some(handle) => handle.await.unwrap_or_default(),
                    None => Vec::new(),
                }
            })
            .await;

            let diagnostics = match drained {
                Ok(diagnostics) => diagnostics,
                Err(_) => {
                    tracing::warn!(
                        "Output of {} still open {:?} after exit, not waiting",
                        command.program,
                        DRAIN_GRACE
                    );
                    for handle in stdout.iter().chain(stderr.iter()) {
                        handle.abort();
                    }
                    Vec::new()
                }
            };
            (status, diagnostics)
        };

        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, completion).await.ok(),
            None => Some(completion.await),
        };

        let Some((status, diagnostics)) = finished else {
            let limit = self.timeout.unwrap_or_default();
            tracing::warn!("{} timed out after {:?}, killing", command.program, limit);
            // Best-effort: the tool may leave its own children behind
            if let Err(e) = child.start_kill() {
                tracing::debug!("Kill after timeout failed: {}", e);
            }
            return Outcome::TimedOut { after: limit };
        };

        match status {
            Ok(status) if status.success() => {
                tracing::info!("{} exited successfully", command.program);
                Outcome::Succeeded
            }
            Ok(status) => {
                tracing::info!("{} exited with {}", command.program, status);
                Outcome::Failed(Failure::Exit {
                    code: status.code(),
                    diagnostics,
                })
            }
            Err(e) => Outcome::Failed(Failure::Launch {
                message: format!("failed waiting for {}: {}", command.program, e),
            }),
        }
    }
}

/// Forward each line of `pipe` as an event; returns the tail of the stream
fn forward_lines<R>(
    pipe: R,
    stream: Stream,
    events: UnboundedSender<DownloadEvent>,
) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(DIAGNOSTIC_LINES);
        let mut lines = BufReader::new(pipe).lines();

        loop {
            let text = match lines.next_line().await {
                Ok(Some(text)) => text,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Stopped reading {:?}: {}", stream, e);
                    break;
                }
            };

            let line = OutputLine::new(stream, text);
            if let Some(percent) = line.progress_percent() {
                let _ = events.send(DownloadEvent::Progress { percent });
            }

            if tail.len() == DIAGNOSTIC_LINES {
                tail.pop_front();
            }
            tail.push_back(line.text.clone());

            // A closed receiver only means nobody is watching any more
            let _ = events.send(DownloadEvent::Output(line));
        }

        tail.into_iter().collect()
    })
}
