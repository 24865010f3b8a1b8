use crate::milestones::MilestoneTable;
use crate::paths::AppDirs;
use crate::sink::CollectorCapabilities;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Collector globals detected on the page hosting the player.
    #[serde(default)]
    pub collector: CollectorCapabilities,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            logging: LoggingConfig::default(),
            analytics: AnalyticsConfig::default(),
            collector: CollectorCapabilities::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How semantic events are submitted to the collector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    #[default]
    Events,
    Pageviews,
}

/// Mappings from session data to collector custom dimensions.
///
/// Keys are the source names (metadata keys or session attributes), values
/// are the collector dimension or metric slot they are reported under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDimensions {
    #[serde(default)]
    pub from_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub from_attributes: BTreeMap<String, String>,
}

impl CustomDimensions {
    /// Slot for the elapsed-time custom metric, if one is configured.
    pub fn elapsed_time_key(&self) -> Option<&str> {
        self.from_attributes
            .get(ELAPSED_TIME_ATTRIBUTE)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }
}

pub const ELAPSED_TIME_ATTRIBUTE: &str = "elapsed_time";

/// Per-session analytics settings, read once when a plugin is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_event_category")]
    pub event_category: String,
    #[serde(default)]
    pub mechanism: Mechanism,
    #[serde(default = "default_pageview_format")]
    pub pageview_format: String,
    #[serde(default = "default_verbose_logging")]
    pub verbose_logging: bool,
    #[serde(default = "default_fallback_flush_secs")]
    pub fallback_flush_secs: u64,
    /// Pauses closer than this to the end of the stream are not user pauses.
    #[serde(default = "default_pause_end_tolerance")]
    pub pause_end_tolerance: f64,
    /// Minimum distance between periodic progress ticks.
    #[serde(default = "default_progress_step")]
    pub progress_step: f64,
    #[serde(default)]
    pub custom_dimensions: CustomDimensions,
    /// Semantic event name to custom metric slot.
    #[serde(default)]
    pub custom_metrics: BTreeMap<String, String>,
    #[serde(default)]
    pub milestones: MilestoneTable,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            event_category: default_event_category(),
            mechanism: Mechanism::default(),
            pageview_format: default_pageview_format(),
            verbose_logging: default_verbose_logging(),
            fallback_flush_secs: default_fallback_flush_secs(),
            pause_end_tolerance: default_pause_end_tolerance(),
            progress_step: default_progress_step(),
            custom_dimensions: CustomDimensions::default(),
            custom_metrics: BTreeMap::new(),
            milestones: MilestoneTable::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn fallback_flush_delay(&self) -> Duration {
        Duration::from_secs(self.fallback_flush_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.progress_step.is_finite() && self.progress_step > 0.0) {
            return Err(ValidationError::InvalidProgressStep(self.progress_step));
        }
        if !(self.pause_end_tolerance.is_finite() && self.pause_end_tolerance >= 0.0) {
            return Err(ValidationError::InvalidPauseTolerance(
                self.pause_end_tolerance,
            ));
        }
        self.milestones.validate()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("milestone fraction {fraction} is outside (0, 1]")]
    MilestoneOutOfRange { fraction: f64 },
    #[error("milestone fraction {fraction} does not follow {previous}")]
    MilestonesNotIncreasing { previous: f64, fraction: f64 },
    #[error("milestone at {fraction} has an empty event name")]
    EmptyMilestoneName { fraction: f64 },
    #[error("progress_step must be positive, got {0}")]
    InvalidProgressStep(f64),
    #[error("pause_end_tolerance must be non-negative, got {0}")]
    InvalidPauseTolerance(f64),
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        self.analytics.validate()
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}

fn default_event_category() -> String {
    "Video".to_string()
}

fn default_pageview_format() -> String {
    "video-event/:event/:title".to_string()
}

fn default_verbose_logging() -> bool {
    true
}

fn default_fallback_flush_secs() -> u64 {
    10
}

fn default_pause_end_tolerance() -> f64 {
    2.0
}

fn default_progress_step() -> f64 {
    5.0
}
