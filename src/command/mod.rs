use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{AudioConfig, ToolConfig};

/// Filename used for every downloaded track
const TRACK_TEMPLATE: &str = "%(title)s - %(uploader)s.%(ext)s";

/// Folder created per playlist/set in collection mode
const COLLECTION_FOLDER_TEMPLATE: &str = "%(playlist_title)s";

/// What a single submission should fetch
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// One track, saved directly in the output directory
    Single,
    /// Every track of a playlist/set, saved in a folder named after it
    #[value(name = "playlist", alias = "collection")]
    Collection,
}

impl DownloadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMode::Single => "single",
            DownloadMode::Collection => "playlist",
        }
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    /// Accepts the menu numbers as well as the names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "single" => Ok(DownloadMode::Single),
            "2" | "playlist" | "collection" => Ok(DownloadMode::Collection),
            other => Err(format!("Unknown download type: {}", other)),
        }
    }
}

/// A single user submission; lives only until its invocation completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub mode: DownloadMode,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, mode: DownloadMode) -> Self {
        Self {
            url: url.into(),
            mode,
        }
    }
}

/// A fully built external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// The URL is always the final positional argument
    pub fn url(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// Value passed to `--output`, if any
    pub fn output_template(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == "--output")
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote an argument for display so it can be pasted into a POSIX shell
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Builds `yt-dlp` argument lists from requests
///
/// Holds only immutable settings taken from the configuration, so building is
/// a pure function of the request.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    tool: ToolConfig,
    audio: AudioConfig,
    output_dir: PathBuf,
}

impl CommandBuilder {
    pub fn new(tool: ToolConfig, audio: AudioConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            audio,
            output_dir: output_dir.into(),
        }
    }

    /// Output path template for the given mode
    pub fn output_template(&self, mode: DownloadMode) -> PathBuf {
        match mode {
            DownloadMode::Single => self.output_dir.join(TRACK_TEMPLATE),
            DownloadMode::Collection => self
                .output_dir
                .join(COLLECTION_FOLDER_TEMPLATE)
                .join(TRACK_TEMPLATE),
        }
    }

    /// Build the full invocation for an already validated request
    pub fn build(&self, request: &DownloadRequest) -> ToolCommand {
        let mut args: Vec<String> = self.tool.program_args.clone();

        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio.format.clone(),
            "--audio-quality".to_string(),
            self.audio.quality.clone(),
            "--output".to_string(),
            self.output_template(request.mode).to_string_lossy().into_owned(),
        ]);

        if self.audio.embed_metadata {
            args.push("--embed-metadata".to_string());
        }
        if self.audio.embed_thumbnail {
            args.push("--embed-thumbnail".to_string());
        }

        if request.mode == DownloadMode::Collection {
            args.push("--yes-playlist".to_string());
        }

        args.push(request.url.clone());

        ToolCommand {
            program: self.tool.program.clone(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CommandBuilder {
        CommandBuilder::new(
            ToolConfig::default(),
            AudioConfig::default(),
            PathBuf::from("/home/user/Downloads"),
        )
    }

    const URL: &str = "https://soundcloud.com/artist/track";

    #[test]
    fn test_single_mode_command() {
        let command = builder().build(&DownloadRequest::new(URL, DownloadMode::Single));

        assert_eq!(command.program, "yt-dlp");
        assert_eq!(
            command.args,
            vec![
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "320K",
                "--output",
                "/home/user/Downloads/%(title)s - %(uploader)s.%(ext)s",
                "--embed-metadata",
                "--embed-thumbnail",
                URL,
            ]
        );
    }

    #[test]
    fn test_collection_mode_command() {
        let command = builder().build(&DownloadRequest::new(URL, DownloadMode::Collection));

        assert_eq!(command.url(), Some(URL));
        assert_eq!(
            command.output_template(),
            Some("/home/user/Downloads/%(playlist_title)s/%(title)s - %(uploader)s.%(ext)s")
        );
        assert_eq!(command.args[command.args.len() - 2], "--yes-playlist");
    }

    #[test]
    fn test_url_is_last_and_single_output_flag() {
        let builder = builder();
        for mode in [DownloadMode::Single, DownloadMode::Collection] {
            let command = builder.build(&DownloadRequest::new(URL, mode));
            assert_eq!(command.url(), Some(URL));
            assert_eq!(command.args.iter().filter(|a| *a == "--output").count(), 1);
        }
    }

    #[test]
    fn test_playlist_flag_only_in_collection_mode() {
        let builder = builder();
        let single = builder.build(&DownloadRequest::new(URL, DownloadMode::Single));
        let collection = builder.build(&DownloadRequest::new(URL, DownloadMode::Collection));

        assert!(!single.args.iter().any(|a| a == "--yes-playlist"));
        assert!(collection.args.iter().any(|a| a == "--yes-playlist"));
    }

    #[test]
    fn test_collection_template_has_extra_segment() {
        let builder = builder();
        let single = builder.output_template(DownloadMode::Single);
        let collection = builder.output_template(DownloadMode::Collection);

        assert_ne!(single, collection);
        assert_eq!(
            collection.components().count(),
            single.components().count() + 1
        );
    }

    #[test]
    fn test_program_args_and_disabled_embeds() {
        let tool = ToolConfig {
            program: "python3".to_string(),
            program_args: vec!["-m".to_string(), "yt_dlp".to_string()],
            timeout_secs: None,
        };
        let audio = AudioConfig {
            format: "opus".to_string(),
            quality: "0".to_string(),
            embed_metadata: false,
            embed_thumbnail: false,
        };
        let command = CommandBuilder::new(tool, audio, "/music")
            .build(&DownloadRequest::new(URL, DownloadMode::Single));

        assert_eq!(command.program, "python3");
        assert_eq!(&command.args[..3], &["-m", "yt_dlp", "--extract-audio"]);
        assert!(command.args.contains(&"opus".to_string()));
        assert!(!command.args.iter().any(|a| a.starts_with("--embed")));
    }

    #[test]
    fn test_display_quotes_templates() {
        let command = builder().build(&DownloadRequest::new(URL, DownloadMode::Single));
        let line = command.to_string();

        assert!(line.starts_with("yt-dlp --extract-audio --audio-format mp3"));
        assert!(line.contains("'/home/user/Downloads/%(title)s - %(uploader)s.%(ext)s'"));
        assert!(line.ends_with(URL));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("1".parse::<DownloadMode>(), Ok(DownloadMode::Single));
        assert_eq!("Single".parse::<DownloadMode>(), Ok(DownloadMode::Single));
        assert_eq!("2".parse::<DownloadMode>(), Ok(DownloadMode::Collection));
        assert_eq!(" PLAYLIST ".parse::<DownloadMode>(), Ok(DownloadMode::Collection));
        assert!("3".parse::<DownloadMode>().is_err());
    }
}
