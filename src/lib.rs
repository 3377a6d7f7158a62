//! SoundCloud Downloader - A Rust CLI tool for fetching SoundCloud tracks and playlists
//!
//! This library validates user-supplied URLs, builds a `yt-dlp` invocation that extracts
//! and transcodes audio, and supervises the child process while streaming its output as
//! structured events to whichever front-end is active.

pub mod cli;
pub mod command;
pub mod config;
pub mod download;
pub mod interactive;
pub mod invoker;
pub mod output;
pub mod utils;
pub mod validate;

pub use cli::{Cli, Commands};
pub use command::{CommandBuilder, DownloadMode, DownloadRequest, ToolCommand};
pub use config::Config;
pub use download::{DownloadJob, DownloadReport, Downloader};
pub use invoker::{DownloadEvent, Failure, Invoker, Outcome};
pub use validate::UrlValidator;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Rejections raised before the external tool is ever launched
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a URL.")]
    Empty,

    #[error("Please enter a valid URL.")]
    Malformed(String),

    #[error("Please enter a URL on {expected}.")]
    WrongHost { url: String, expected: String },
}

/// Error types specific to the downloader
#[derive(thiserror::Error, Debug)]
pub enum DownloaderError {
    #[error("Input Error: {0}")]
    Input(#[from] InputError),
}
