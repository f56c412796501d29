use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_scan_config")]
    pub scan: ScanConfig,
    #[serde(default = "default_retry_config")]
    pub retry: RetryConfig,
    #[serde(default = "default_inputs_config")]
    pub inputs: InputsConfig,
    #[serde(default = "default_output_config")]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

/// Scan behavior. The flags collapse the variant points of earlier script
/// drafts (window length, dedup scope, iteration order) into configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Oldest eligible message age, in hours before the scan start
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    /// Keep at most one message per sender within a dedup scope
    #[serde(default = "default_true")]
    pub per_user_dedup: bool,
    /// Extend the dedup scope across all chats instead of resetting per
    /// chat. Only meaningful when `per_user_dedup` is on.
    #[serde(default = "default_true")]
    pub cross_chat_dedup: bool,
    /// Report messages newest-first (the iteration order); set false for
    /// chronological output
    #[serde(default = "default_true")]
    pub newest_first: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts per chat scan, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputsConfig {
    #[serde(default = "default_chats_file")]
    pub chats_file: PathBuf,
    #[serde(default = "default_keywords_file")]
    pub keywords_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
}

fn default_session_file() -> PathBuf {
    PathBuf::from("telescan.session")
}

fn default_lookback_hours() -> i64 {
    8
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_chats_file() -> PathBuf {
    PathBuf::from("chats.csv")
}

fn default_keywords_file() -> PathBuf {
    PathBuf::from("keywords.csv")
}

fn default_report_file() -> PathBuf {
    PathBuf::from("report.txt")
}

fn default_scan_config() -> ScanConfig {
    ScanConfig {
        lookback_hours: default_lookback_hours(),
        per_user_dedup: true,
        cross_chat_dedup: true,
        newest_first: true,
    }
}

fn default_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: default_max_attempts(),
        delay_ms: 0,
    }
}

fn default_inputs_config() -> InputsConfig {
    InputsConfig {
        chats_file: default_chats_file(),
        keywords_file: default_keywords_file(),
    }
}

fn default_output_config() -> OutputConfig {
    OutputConfig {
        report_file: default_report_file(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

/// Load a single-column list file: one value per row, first field of the
/// row, blank rows skipped. A missing or empty file is fatal to the run.
pub fn load_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read list file: {}", path.display()))?;
    let values: Vec<String> = content
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        anyhow::bail!("List file {} contains no values", path.display());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            api_id = 12345
            api_hash = "abcdef"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.lookback_hours, 8);
        assert!(config.scan.per_user_dedup);
        assert!(config.scan.cross_chat_dedup);
        assert!(config.scan.newest_first);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 0);
        assert_eq!(config.inputs.chats_file, PathBuf::from("chats.csv"));
        assert_eq!(config.output.report_file, PathBuf::from("report.txt"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            api_id = 1
            api_hash = "x"

            [scan]
            lookback_hours = 48
            cross_chat_dedup = false

            [retry]
            max_attempts = 5
            delay_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.lookback_hours, 48);
        assert!(!config.scan.cross_chat_dedup);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay(), Duration::from_millis(250));
    }

    #[test]
    fn load_list_takes_first_column_and_skips_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rustlang").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "@somechannel, ignored trailing field").unwrap();
        writeln!(file, "  -1001234567890  ").unwrap();

        let values = load_list(file.path()).unwrap();
        assert_eq!(values, vec!["rustlang", "@somechannel", "-1001234567890"]);
    }

    #[test]
    fn load_list_missing_file_is_an_error() {
        let err = load_list(Path::new("definitely-not-here.csv")).unwrap_err();
        assert!(err.to_string().contains("definitely-not-here.csv"));
    }

    #[test]
    fn load_list_empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load_list(file.path()).unwrap_err();
        assert!(err.to_string().contains("no values"));
    }

    #[test]
    fn load_list_whitespace_only_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, ",,,").unwrap();

        let err = load_list(file.path()).unwrap_err();
        assert!(err.to_string().contains("no values"));
    }
}
