use crate::io::garmin::SpeedLimits;
use chrono::Weekday;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown weekday `{0}`")]
    Weekday(String),
}

/// Optional TOML overrides; every field falls back to the built-in default.
///
/// ```toml
/// running_speed_limit_kmh = 40.0
/// cycling_speed_limit_kmh = 120.0
/// week_anchor = "sun"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub running_speed_limit_kmh: Option<f64>,
    pub cycling_speed_limit_kmh: Option<f64>,
    pub week_anchor: Option<String>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn speed_limits(&self) -> SpeedLimits {
        let mut limits = SpeedLimits::default();
        if let Some(kmh) = self.running_speed_limit_kmh {
            limits.running_kmh = kmh;
        }
        if let Some(kmh) = self.cycling_speed_limit_kmh {
            limits.cycling_kmh = kmh;
        }
        limits
    }

    /// Anchor weekday for weekly buckets, if the config names one.
    /// Accepts the forms `chrono` parses: "sun", "sunday", "Sun", ...
    pub fn week_anchor(&self) -> Result<Option<Weekday>, ConfigError> {
        self.week_anchor
            .as_deref()
            .map(|name| {
                name.parse::<Weekday>()
                    .map_err(|_| ConfigError::Weekday(name.to_string()))
            })
            .transpose()
    }
}
