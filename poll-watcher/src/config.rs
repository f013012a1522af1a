//! Configuration types for directory polling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for a polled directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to poll.
    pub root: PathBuf,

    /// Delay between the end of one tick and the start of the next.
    #[serde(
        rename = "interval_ms",
        with = "duration_ms",
        default = "default_interval"
    )]
    pub interval: Duration,

    /// What the first tick after `start` reports.
    #[serde(default)]
    pub initial_scan: InitialScan,

    /// Maximum depth to recurse below the root (None = unlimited).
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Whether to follow symbolic links while walking.
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl WatchConfig {
    /// Create a new config with the given root and interval.
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
            initial_scan: InitialScan::default(),
            max_depth: None,
            follow_symlinks: false,
        }
    }

    /// Set the first-tick policy.
    pub fn with_initial_scan(mut self, initial_scan: InitialScan) -> Self {
        self.initial_scan = initial_scan;
        self
    }

    /// Set the maximum depth. A depth of 1 lists only direct children.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Enable following symbolic links.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// Check the config for values the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(WatcherError::InvalidConfiguration(
                "root path is empty".to_string(),
            ));
        }

        if self.interval.is_zero() {
            return Err(WatcherError::InvalidConfiguration(
                "polling interval must be greater than zero".to_string(),
            ));
        }

        if self.max_depth == Some(0) {
            return Err(WatcherError::InvalidConfiguration(
                "max_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a config from TOML.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }
}

/// What the first tick after `start` reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialScan {
    /// Capture a baseline at `start`; the first tick reports only later changes.
    #[default]
    Baseline,

    /// Start from an empty baseline; the first tick reports every entry as created.
    ReportExisting,
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_watch_config_creation() {
        let config = WatchConfig::new("/home/user/documents", Duration::from_secs(2))
            .with_initial_scan(InitialScan::ReportExisting)
            .with_max_depth(1);

        assert_eq!(config.root, Path::new("/home/user/documents"));
        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(config.initial_scan, InitialScan::ReportExisting);
        assert_eq!(config.max_depth, Some(1));
        assert!(!config.follow_symlinks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = WatchConfig::new("/tmp", Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(WatcherError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_depth_and_empty_root_rejected() {
        let config = WatchConfig::new("/tmp", DEFAULT_INTERVAL).with_max_depth(0);
        assert!(config.validate().is_err());

        let config = WatchConfig::new("", DEFAULT_INTERVAL);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = WatchConfig::from_toml(r#"root = "/srv/data""#).unwrap();

        assert_eq!(config, WatchConfig::new("/srv/data", DEFAULT_INTERVAL));
    }

    #[test]
    fn test_from_toml_full() {
        let config = WatchConfig::from_toml(
            r#"
            root = "/srv/data"
            interval_ms = 250
            initial_scan = "report_existing"
            max_depth = 3
            follow_symlinks = true
            "#,
        )
        .unwrap();

        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.initial_scan, InitialScan::ReportExisting);
        assert_eq!(config.max_depth, Some(3));
        assert!(config.follow_symlinks);
    }

    #[test]
    fn test_from_toml_rejects_zero_interval() {
        let err = WatchConfig::from_toml("root = \"/srv\"\ninterval_ms = 0").unwrap_err();
        assert!(matches!(err, WatcherError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_toml_parse_error() {
        let err = WatchConfig::from_toml("interval_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, WatcherError::ConfigParse(_)));
    }

    #[test]
    fn test_toml_round_trip_uses_millis() {
        let config = WatchConfig::new("/srv", Duration::from_millis(1500));
        let rendered = toml::to_string(&config).unwrap();

        assert!(rendered.contains("interval_ms = 1500"));
        assert_eq!(WatchConfig::from_toml(&rendered).unwrap(), config);
    }
}
