use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils;
use crate::validate::UrlValidator;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// External tool invocation
    pub tool: ToolConfig,

    /// Audio extraction settings passed to the tool
    pub audio: AudioConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable looked up on PATH
    pub program: String,

    /// Arguments placed before the generated ones (e.g. `-m yt_dlp`)
    pub program_args: Vec<String>,

    /// Wall-clock limit for a single download, unlimited when unset
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Target encoding
    pub format: String,

    /// Target bitrate
    pub quality: String,

    pub embed_metadata: bool,

    pub embed_thumbnail: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where downloads land; the user's downloads folder when unset
    pub output_dir: Option<PathBuf>,

    /// Host substring every URL must contain; any host when unset
    pub required_host: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            program_args: Vec::new(),
            timeout_secs: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            format: "mp3".to_string(),
            quality: "320K".to_string(),
            embed_metadata: true,
            embed_thumbnail: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            required_host: Some("soundcloud.com".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs_err::read_to_string(path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            tracing::debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("sc-downloader").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tool.program.trim().is_empty() {
            anyhow::bail!("tool.program must not be empty");
        }
        if self.audio.format.trim().is_empty() {
            anyhow::bail!("audio.format must not be empty");
        }
        if self.audio.quality.trim().is_empty() {
            anyhow::bail!("audio.quality must not be empty");
        }
        if self.tool.timeout_secs == Some(0) {
            anyhow::bail!("tool.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Directory the tool writes into
    pub fn output_dir(&self) -> PathBuf {
        self.app
            .output_dir
            .clone()
            .unwrap_or_else(utils::default_download_dir)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.tool.timeout_secs.map(Duration::from_secs)
    }

    /// Build the validator these settings describe
    pub fn url_validator(&self) -> UrlValidator {
        match &self.app.required_host {
            Some(host) => UrlValidator::new().with_required_host(host.as_str()),
            None => UrlValidator::new(),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Tool: {}", self.tool.program);
        if !self.tool.program_args.is_empty() {
            println!("  Tool Args: {}", self.tool.program_args.join(" "));
        }
        match self.tool.timeout_secs {
            Some(secs) => println!("  Timeout: {}s", secs),
            None => println!("  Timeout: none"),
        }
        println!("  Audio: {} @ {}", self.audio.format, self.audio.quality);
        println!("  Embed Metadata: {}", self.audio.embed_metadata);
        println!("  Embed Thumbnail: {}", self.audio.embed_thumbnail);
        println!("  Output Directory: {}", self.output_dir().display());
        println!(
            "  Required Host: {}",
            self.app.required_host.as_deref().unwrap_or("any")
        );
    }
}
