use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::command::DownloadMode;

#[derive(Parser)]
#[command(
    name = "sc-downloader",
    about = "SoundCloud Downloader - Save SoundCloud tracks and playlists as MP3 using yt-dlp",
    version,
    long_about = "A small CLI for downloading SoundCloud tracks and playlists. URLs are validated \
                  locally, then yt-dlp extracts the audio, converts it to MP3 and embeds metadata \
                  and cover art. Runs an interactive prompt when no subcommand is given."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators and tool output (errors are still shown)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE", env = "SC_DOWNLOADER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a single track or a whole playlist
    Download {
        /// SoundCloud track or playlist URL
        #[arg(value_name = "URL")]
        url: String,

        /// Download type
        #[arg(short, long, value_enum, default_value = "single")]
        mode: DownloadMode,

        /// Directory to save into (defaults to your downloads folder)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,

        /// Accept URLs on any host, not just the configured one
        #[arg(long)]
        any_host: bool,

        /// Print the yt-dlp command instead of running it
        #[arg(long)]
        dry_run: bool,

        /// Print a JSON report when done
        #[arg(long)]
        json: bool,
    },

    /// Prompt for URLs and download types until you quit (default)
    Interactive,

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
