use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::export::ExportFormat;
use crate::fetch::DEFAULT_USER_AGENTS;
use crate::source::SourceDescriptor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Inline source descriptors; the built-in catalog is used when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Minimum seconds between two requests to the same domain
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: f64,
    /// Timeout for a single fetch attempt in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Total attempts for a target before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before the second attempt; doubles for each following one
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Upper bound for a single backoff delay
    #[serde(default = "default_retry_backoff_max")]
    pub retry_backoff_max_ms: u64,
    /// Maximum valid articles kept per source
    #[serde(default = "default_max_articles")]
    pub max_articles_per_source: usize,
    /// Sources processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Overall run deadline in seconds (0 = none)
    #[serde(default)]
    pub run_timeout_secs: u64,
    /// User-Agent pool rotated on every attempt
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_secs: default_rate_limit_delay(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            retry_backoff_max_ms: default_retry_backoff_max(),
            max_articles_per_source: default_max_articles(),
            concurrency: default_concurrency(),
            run_timeout_secs: 0,
            user_agents: default_user_agents(),
            proxy_url: None,
        }
    }
}

/// Upper bound for `fetch.rate_limit_delay_secs`
pub const MAX_RATE_LIMIT_DELAY_SECS: f64 = 3600.0;

/// Upper bound for `scheduler.interval_hours` (one year)
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

impl FetchConfig {
    /// Clamped to `0..=MAX_RATE_LIMIT_DELAY_SECS`; NaN counts as zero
    pub fn rate_limit_delay(&self) -> Duration {
        let secs = self.rate_limit_delay_secs.max(0.0).min(MAX_RATE_LIMIT_DELAY_SECS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for JSON/CSV exports (relative paths resolve against data_dir)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Formats written by `run` and the scheduler
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,
    /// SQLite database file name inside data_dir
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            formats: default_formats(),
            database_file: default_database_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hours between scheduled runs
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    /// Articles older than this are removed from the database by cleanup
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl SchedulerConfig {
    /// Time between scheduled runs, clamped to `1..=MAX_INTERVAL_HOURS` hours
    pub fn interval(&self) -> Duration {
        let hours = self.interval_hours.clamp(1, MAX_INTERVAL_HOURS);
        Duration::from_secs(hours.saturating_mul(3600))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newswire")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rate_limit_delay() -> f64 {
    2.0
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_retry_backoff_max() -> u64 {
    10_000
}

fn default_max_articles() -> usize {
    50
}

fn default_concurrency() -> usize {
    4
}

fn default_user_agents() -> Vec<String> {
    DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Json]
}

fn default_database_file() -> String {
    "news.db".to_string()
}

fn default_interval_hours() -> u64 {
    6
}

fn default_retention_days() -> u32 {
    30
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot be turned into durations
    pub fn validate(&self) -> crate::Result<()> {
        let delay = self.fetch.rate_limit_delay_secs;
        if !delay.is_finite() || !(0.0..=MAX_RATE_LIMIT_DELAY_SECS).contains(&delay) {
            return Err(crate::Error::Config(format!(
                "fetch.rate_limit_delay_secs must be between 0 and {}, got {}",
                MAX_RATE_LIMIT_DELAY_SECS, delay
            )));
        }
        if self.scheduler.interval_hours > MAX_INTERVAL_HOURS {
            return Err(crate::Error::Config(format!(
                "scheduler.interval_hours must be at most {}, got {}",
                MAX_INTERVAL_HOURS, self.scheduler.interval_hours
            )));
        }
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newswire/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newswire")
            .join("config.toml")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Get the SQLite database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(&self.export.database_file)
    }

    /// Get the directory JSON and CSV exports are written to
    pub fn output_dir(&self) -> PathBuf {
        let dir = expand_tilde(&self.export.output_dir);
        if dir.is_absolute() {
            dir
        } else {
            self.data_dir().join(dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.fetch.rate_limit_delay(), Duration::from_secs(2));
        assert_eq!(config.fetch.timeout(), Duration::from_secs(30));
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.max_articles_per_source, 50);
        assert!(config.fetch.run_timeout().is_none());
        assert!(!config.fetch.user_agents.is_empty());
        assert_eq!(config.export.formats, vec![ExportFormat::Json]);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [fetch]
            rate_limit_delay_secs = 0.5
            max_retries = 5
            run_timeout_secs = 120

            [export]
            formats = ["json", "csv", "sqlite"]
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.rate_limit_delay(), Duration::from_millis(500));
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.run_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.export.formats.len(), 3);
        assert_eq!(config.scheduler.interval_hours, 6);
    }

    #[test]
    fn test_inline_sources_are_parsed() {
        let config = AppConfig::from_toml_str(
            r#"
            [[sources]]
            name = "Example Daily"
            region = "usa"
            feed_url = "https://example.com/rss"
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].name, "Example Daily");
        assert!(config.sources[0].enabled);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[fetch\nmax_retries = ").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_relative_output_dir_resolves_under_data_dir() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/var/lib/newswire");
        assert_eq!(config.output_dir(), PathBuf::from("/var/lib/newswire/exports"));

        config.export.output_dir = PathBuf::from("/tmp/out");
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_out_of_range_delay_is_config_error() {
        for raw in ["inf", "nan", "-1.0", "1e20"] {
            let err = AppConfig::from_toml_str(&format!("[fetch]\nrate_limit_delay_secs = {}", raw)).unwrap_err();
            assert!(matches!(err, crate::Error::Config(_)), "accepted {}", raw);
        }
    }

    #[test]
    fn test_rate_limit_delay_accessor_clamps() {
        let mut fetch = FetchConfig {
            rate_limit_delay_secs: 1e20,
            ..FetchConfig::default()
        };
        assert_eq!(fetch.rate_limit_delay(), Duration::from_secs(3600));

        fetch.rate_limit_delay_secs = f64::INFINITY;
        assert_eq!(fetch.rate_limit_delay(), Duration::from_secs(3600));

        fetch.rate_limit_delay_secs = f64::NAN;
        assert_eq!(fetch.rate_limit_delay(), Duration::ZERO);
    }

    #[test]
    fn test_huge_run_timeout_is_accepted() {
        let config = AppConfig::from_toml_str(&format!("[fetch]\nrun_timeout_secs = {}", i64::MAX)).unwrap();
        assert_eq!(config.fetch.run_timeout(), Some(Duration::from_secs(i64::MAX as u64)));
    }

    #[test]
    fn test_scheduler_interval_is_bounded() {
        let mut scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.interval(), Duration::from_secs(6 * 3600));

        scheduler.interval_hours = 0;
        assert_eq!(scheduler.interval(), Duration::from_secs(3600));

        scheduler.interval_hours = u64::MAX;
        assert_eq!(scheduler.interval(), Duration::from_secs(MAX_INTERVAL_HOURS * 3600));

        let err = AppConfig::from_toml_str("[scheduler]\ninterval_hours = 9000").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/newswire.toml")).unwrap();
        assert_eq!(config.fetch.max_retries, 3);
    }
}
