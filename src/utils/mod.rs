use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// The user's downloads folder, falling back to `~/Downloads`
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check if the current environment has required tools
pub fn check_dependencies(program: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(program) {
        missing.push(format!("{} - required for downloading", program));
    }

    // yt-dlp shells out to ffmpeg for transcoding and thumbnail embedding
    if !check_command_available("ffmpeg") {
        missing.push("ffmpeg - required for audio conversion".to_string());
    }

    missing
}

/// Check if a command resolves on PATH (or is an existing executable path)
fn check_command_available(command: &str) -> bool {
    which::which(command).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_duration(Duration::from_millis(200)), "0s");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.soundcloud.com/artist"),
            Some("soundcloud.com".to_string())
        );
        assert_eq!(
            extract_domain("https://m.soundcloud.com/artist"),
            Some("m.soundcloud.com".to_string())
        );
        assert_eq!(extract_domain("invalid-url"), None);
    }

    #[test]
    fn test_default_download_dir_is_named() {
        assert!(!default_download_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let missing = check_dependencies("definitely-not-installed-tool-xyz");
        assert!(missing
            .iter()
            .any(|m| m.starts_with("definitely-not-installed-tool-xyz")));
    }

    #[cfg(unix)]
    #[test]
    fn test_installed_tool_without_version_flag_is_found() {
        // sh rejects --version but is always on PATH
        let missing = check_dependencies("sh");
        assert!(!missing.iter().any(|m| m.starts_with("sh ")));
    }
}
