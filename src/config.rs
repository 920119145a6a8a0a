// Config - Engine tunables and task file loading
// RON or JSON, picked by file extension

use crate::sequencer::task::{MetronomeTask, TaskError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported file format: {0} (expected .ron or .json)")]
    UnsupportedFormat(String),

    #[error("invalid value {value} for {field}")]
    Invalid { field: &'static str, value: f64 },

    #[error("invalid task: {0}")]
    Task(#[from] TaskError),
}

/// Drift correction tunables of the stopwatch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Average error (seconds) that triggers a correction once enough samples exist
    pub error_threshold: f64,
    /// Divisor applied to the average error before it is compensated
    pub correction_damping: f64,
    /// Samples needed before `error_threshold` is checked
    pub min_error_samples: u32,
    /// Samples after which the accumulators start over
    pub max_error_samples: u32,
    /// Share of the note interval that triggers a correction regardless of samples
    pub interval_fraction: f64,
    /// Polling period while waiting for the task end (seconds)
    pub finish_poll: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            error_threshold: 0.008,
            correction_damping: 10.0,
            min_error_samples: 8,
            max_error_samples: 16,
            interval_fraction: 0.25,
            finish_poll: 0.002,
        }
    }
}

/// Look-ahead scheduler tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookaheadConfig {
    /// Seconds between two fills of the player queue
    pub interval: f64,
    /// Horizon of a fill, in multiples of `interval`
    pub factor: f64,
}

impl LookaheadConfig {
    /// How far ahead of the player clock sounds are queued
    pub fn horizon(&self) -> f64 {
        self.interval * self.factor
    }
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            interval: 7.0,
            factor: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub drift: DriftConfig,
    pub lookahead: LookaheadConfig,
    /// Gap between creating a player and the first note (seconds)
    pub start_delay: f64,
    pub master_volume: f32,
    pub sample_rate: u32,
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            drift: DriftConfig::default(),
            lookahead: LookaheadConfig::default(),
            start_delay: 0.1,
            master_volume: 1.0,
            sample_rate: 48000,
            queue_capacity: 4096,
        }
    }
}

impl EngineConfig {
    /// `<config dir>/practice-metronome/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("practice-metronome").join("config.ron"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_file(path)?;
        config.validate()?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Loads `path`, else the default location when it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = match format_of(path)? {
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?,
            Format::Json => serde_json::to_string_pretty(self)?,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let drift = &self.drift;
        let positive = [
            ("drift.error_threshold", drift.error_threshold),
            ("drift.correction_damping", drift.correction_damping),
            ("drift.min_error_samples", drift.min_error_samples as f64),
            ("drift.max_error_samples", drift.max_error_samples as f64),
            ("drift.interval_fraction", drift.interval_fraction),
            ("drift.finish_poll", drift.finish_poll),
            ("lookahead.interval", self.lookahead.interval),
            ("lookahead.factor", self.lookahead.factor),
            ("sample_rate", self.sample_rate as f64),
            ("queue_capacity", self.queue_capacity as f64),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid { field, value });
            }
        }

        if drift.min_error_samples > drift.max_error_samples {
            return Err(ConfigError::Invalid {
                field: "drift.min_error_samples",
                value: drift.min_error_samples as f64,
            });
        }
        if !(self.start_delay.is_finite() && self.start_delay >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "start_delay",
                value: self.start_delay,
            });
        }
        if !(0.0..=2.0).contains(&self.master_volume) {
            return Err(ConfigError::Invalid {
                field: "master_volume",
                value: self.master_volume as f64,
            });
        }
        Ok(())
    }
}

/// Reads and validates a task file
pub fn load_task(path: &Path) -> Result<MetronomeTask, ConfigError> {
    let task: MetronomeTask = read_file(path)?;
    task.validate()?;
    log::info!(
        "Loaded task with {} part(s) from {}",
        task.parts().len(),
        path.display()
    );
    Ok(task)
}

/// Parses a task from RON text
pub fn parse_task_ron(text: &str) -> Result<MetronomeTask, ConfigError> {
    let task: MetronomeTask = ron::from_str(text)?;
    task.validate()?;
    Ok(task)
}

enum Format {
    Ron,
    Json,
}

fn format_of(path: &Path) -> Result<Format, ConfigError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("ron") => Ok(Format::Ron),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    }
}

fn read_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = format_of(path)?;
    let content = fs::read_to_string(path)?;
    Ok(match format {
        Format::Ron => ron::from_str(&content)?,
        Format::Json => serde_json::from_str(&content)?,
    })
}
