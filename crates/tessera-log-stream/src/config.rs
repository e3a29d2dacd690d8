//! Log stream configuration
//!
//! Values come from struct defaults, an optional TOML file and `TESSERA_LOG_*`
//! environment variables, in increasing priority. Every loaded configuration
//! is validated before it is returned.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tessera_common::validation::{
    collect_errors, DirectoryValidator, RangeValidator, Validatable, ValidationError, Validator,
};

use crate::error::LogStreamResult;
use crate::level::LogLevel;

/// Environment variable prefix, e.g. `TESSERA_LOG_STREAM_LIMIT`
pub const ENV_PREFIX: &str = "TESSERA_LOG";

pub const DEFAULT_STREAM_LIMIT: usize = 10_000;
pub const DEFAULT_ERROR_THRESHOLD: u32 = 10;
pub const DEFAULT_HIGH_WATER_MARK: usize = 1024;

const MAX_HIGH_WATER_MARK: usize = 1 << 20;

fn default_levels() -> Vec<LogLevel> {
    vec![LogLevel::Error, LogLevel::Fatal]
}

fn default_stream_limit() -> usize {
    DEFAULT_STREAM_LIMIT
}

fn default_error_threshold() -> u32 {
    DEFAULT_ERROR_THRESHOLD
}

fn default_high_water_mark() -> usize {
    DEFAULT_HIGH_WATER_MARK
}

/// Settings for a [`crate::LogStreamService`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStreamConfig {
    /// Existing, writable directory holding the `<level>.log` files
    pub abspath: PathBuf,
    /// Levels that get a stream; messages for other levels are ignored
    #[serde(default = "default_levels")]
    pub levels: Vec<LogLevel>,
    /// Maximum pending messages per level while a stream is backed up
    #[serde(default = "default_stream_limit")]
    pub stream_limit: usize,
    /// Terminate the process when a pending queue overflows
    #[serde(default)]
    pub kill_on_limit: bool,
    /// Stream errors tolerated before the process is terminated
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Messages a stream buffers before reporting backpressure
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
}

impl LogStreamConfig {
    /// Defaults rooted at `abspath`
    pub fn new(abspath: impl Into<PathBuf>) -> Self {
        Self {
            abspath: abspath.into(),
            levels: default_levels(),
            stream_limit: DEFAULT_STREAM_LIMIT,
            kill_on_limit: false,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_stream_limit(mut self, stream_limit: usize) -> Self {
        self.stream_limit = stream_limit;
        self
    }

    pub fn with_kill_on_limit(mut self, kill_on_limit: bool) -> Self {
        self.kill_on_limit = kill_on_limit;
        self
    }

    pub fn with_error_threshold(mut self, error_threshold: u32) -> Self {
        self.error_threshold = error_threshold;
        self
    }

    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    /// Configured levels without duplicates
    pub fn enabled_levels(&self) -> BTreeSet<LogLevel> {
        self.levels.iter().copied().collect()
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.levels.contains(&level)
    }

    /// Path of the file backing `level`
    pub fn file_path(&self, level: LogLevel) -> PathBuf {
        self.abspath.join(level.file_name())
    }

    /// Load from an optional TOML file layered with `TESSERA_LOG_*` variables
    ///
    /// `TESSERA_LOG_LEVELS` is a comma separated list (`error,fatal`).
    pub fn load(path: Option<&Path>) -> LogStreamResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("levels"),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }
}

impl Validatable for LogStreamConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        collect_errors([
            DirectoryValidator::new("abspath").validate(self.abspath.as_path()),
            RangeValidator::new("stream_limit", 1, usize::MAX).validate(&self.stream_limit),
            RangeValidator::new("error_threshold", 1, u32::MAX).validate(&self.error_threshold),
            RangeValidator::new("high_water_mark", 1, MAX_HIGH_WATER_MARK)
                .validate(&self.high_water_mark),
        ])
    }
}
