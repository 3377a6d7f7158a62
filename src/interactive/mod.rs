//! Line-oriented prompt loop
//!
//! Asks for a URL, then for a download type, and hands each completed request
//! to a [`RequestHandler`]. Reading and writing go through generic streams so
//! the whole conversation can be driven from a byte slice.

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::command::{DownloadMode, DownloadRequest};
use crate::invoker::Outcome;
use crate::validate::UrlValidator;
use crate::InputError;

/// Whatever actually carries out a request collected by the prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: DownloadRequest) -> std::result::Result<Outcome, InputError>;
}

enum UrlInput {
    Quit,
    Rejected(String),
    Accepted(String),
}

enum ModeInput {
    Back,
    Rejected(&'static str),
    Chosen(DownloadMode),
}

/// Only malformed input carries the `Input Error:` prefix
fn rejection_message(error: &InputError) -> String {
    match error {
        InputError::Malformed(_) => format!("Input Error: {}", error),
        InputError::Empty | InputError::WrongHost { .. } => error.to_string(),
    }
}

fn is_quit(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "q" | "exit")
}

pub struct PromptLoop<'a, H> {
    validator: &'a UrlValidator,
    handler: &'a H,
}

impl<'a, H: RequestHandler> PromptLoop<'a, H> {
    pub fn new(validator: &'a UrlValidator, handler: &'a H) -> Self {
        Self { validator, handler }
    }

    /// Run until the user quits or `input` is exhausted
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        writeln!(out, "Welcome to the SoundCloud Downloader CLI")?;

        loop {
            write!(out, "Enter the SoundCloud URL (or type 'q' or 'exit' to quit): ")?;
            let Some(line) = next_input(&mut lines, out).await? else {
                break;
            };

            let url = match self.read_url(&line) {
                UrlInput::Quit => break,
                UrlInput::Rejected(message) => {
                    writeln!(out, "{}", message)?;
                    continue;
                }
                UrlInput::Accepted(url) => url,
            };

            let Some(mode) = self.select_mode(&mut lines, out).await? else {
                continue;
            };

            tracing::debug!("Prompt collected {} ({})", url, mode);
            match self.handler.handle(DownloadRequest::new(url, mode)).await {
                Ok(outcome) => writeln!(out, "\n{}", outcome.message())?,
                Err(e) => writeln!(out, "{}", rejection_message(&e))?,
            }
        }

        writeln!(out, "Goodbye!")?;
        Ok(())
    }

    fn read_url(&self, line: &str) -> UrlInput {
        if is_quit(line) {
            return UrlInput::Quit;
        }

        match self.validator.validate(line) {
            Ok(url) => UrlInput::Accepted(url.to_string()),
            Err(e) => UrlInput::Rejected(rejection_message(&e)),
        }
    }

    /// Ask for a download type; `None` means go back to the URL prompt
    async fn select_mode<R, W>(
        &self,
        lines: &mut Lines<R>,
        out: &mut W,
    ) -> Result<Option<DownloadMode>>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        loop {
            writeln!(out, "Select download type:")?;
            writeln!(out, "1. Single song")?;
            writeln!(out, "2. Playlist")?;
            write!(out, "Enter 1, 2, 'single', or 'playlist' (or 'q' to go back): ")?;

            let Some(choice) = next_input(lines, out).await? else {
                return Ok(None);
            };

            match parse_mode(&choice) {
                ModeInput::Back => return Ok(None),
                ModeInput::Rejected(message) => writeln!(out, "{}", message)?,
                ModeInput::Chosen(mode) => return Ok(Some(mode)),
            }
        }
    }
}

fn parse_mode(choice: &str) -> ModeInput {
    if is_quit(choice) {
        return ModeInput::Back;
    }
    if choice.is_empty() {
        return ModeInput::Rejected("Please select a download type.");
    }
    match choice.parse::<DownloadMode>() {
        // Only the menu spellings are offered here
        Ok(mode) if choice.to_lowercase() != "collection" => ModeInput::Chosen(mode),
        _ => ModeInput::Rejected("Invalid choice. Please enter 1, 2, 'single', or 'playlist'."),
    }
}

/// Flush the pending prompt and read one trimmed line; `None` at end of input
async fn next_input<R, W>(lines: &mut Lines<R>, out: &mut W) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    out.flush()?;
    match lines.next_line().await? {
        Some(line) => Ok(Some(line.trim().to_string())),
        None => {
            writeln!(out)?;
            Ok(None)
        }
    }
}
