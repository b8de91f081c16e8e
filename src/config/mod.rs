//! Typed configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! - `Settings::default()`
//! - a settings file (see [`SettingsFile`])
//! - `FUTSAL_*` environment variables

mod settings_file;

pub use settings_file::SettingsFile;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matching::MatchingStrategy;
use crate::statistics::StatisticsEngine;
use crate::tracker::{TrackerConfig, DEFAULT_MAX_TRACKING_DISTANCE};
use crate::{Error, Result};

/// Playing surface dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Length L in meters.
    pub length: f64,
    /// Width W in meters.
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub max_tracking_distance: f64,
    pub confidence_threshold: f64,
    /// Only every N-th frame is tracked.
    pub frame_stride: u64,
    pub strategy: MatchingStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSettings {
    pub defender_ratio: f64,
    pub attacker_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Maximum number of retained sessions.
    pub max_sessions: usize,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub field: FieldSettings,
    pub tracking: TrackingSettings,
    pub statistics: StatisticsSettings,
    pub sessions: SessionSettings,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            length: 40.0,
            width: 20.0,
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            max_tracking_distance: DEFAULT_MAX_TRACKING_DISTANCE,
            confidence_threshold: 0.5,
            frame_stride: 1,
            strategy: MatchingStrategy::Greedy,
        }
    }
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            defender_ratio: 0.35,
            attacker_ratio: 0.65,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { max_sessions: 10 }
    }
}

/// Environment variables and the `(section, key)` they override.
pub const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("FUTSAL_FIELD_LENGTH", "field", "length"),
    ("FUTSAL_FIELD_WIDTH", "field", "width"),
    ("FUTSAL_MAX_TRACKING_DISTANCE", "tracking", "max_tracking_distance"),
    ("FUTSAL_CONFIDENCE_THRESHOLD", "tracking", "confidence_threshold"),
    ("FUTSAL_FRAME_STRIDE", "tracking", "frame_stride"),
    ("FUTSAL_STRATEGY", "tracking", "strategy"),
    ("FUTSAL_MAX_SESSIONS", "sessions", "max_sessions"),
];

fn parse_value<T: std::str::FromStr>(section: &str, key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        Error::InvalidConfig(format!("invalid value '{}' for {}.{}: {}", value, section, key, e))
    })
}

impl Settings {
    /// Defaults, then the optional settings file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(path) = path {
            settings.apply_file(&SettingsFile::new(path)?)?;
        }
        settings.apply_env()?;
        settings.validate()?;
        debug!(?settings, "settings_loaded");
        Ok(settings)
    }

    /// Set a single value by section and key.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        match (section.to_ascii_lowercase().as_str(), key.to_ascii_lowercase().as_str()) {
            ("field", "length") => self.field.length = parse_value(section, key, value)?,
            ("field", "width") => self.field.width = parse_value(section, key, value)?,
            ("tracking", "max_tracking_distance") => {
                self.tracking.max_tracking_distance = parse_value(section, key, value)?
            }
            ("tracking", "confidence_threshold") => {
                self.tracking.confidence_threshold = parse_value(section, key, value)?
            }
            ("tracking", "frame_stride") => self.tracking.frame_stride = parse_value(section, key, value)?,
            ("tracking", "strategy") => self.tracking.strategy = value.parse()?,
            ("statistics", "defender_ratio") => self.statistics.defender_ratio = parse_value(section, key, value)?,
            ("statistics", "attacker_ratio") => self.statistics.attacker_ratio = parse_value(section, key, value)?,
            ("sessions", "max_sessions") => self.sessions.max_sessions = parse_value(section, key, value)?,
            _ => {
                return Err(Error::InvalidConfig(format!("unknown setting {}.{}", section, key)));
            }
        }
        Ok(())
    }

    /// Apply every known key present in a settings file.
    pub fn apply_file(&mut self, file: &SettingsFile) -> Result<()> {
        const KEYS: &[(&str, &str)] = &[
            ("field", "length"),
            ("field", "width"),
            ("tracking", "max_tracking_distance"),
            ("tracking", "confidence_threshold"),
            ("tracking", "frame_stride"),
            ("tracking", "strategy"),
            ("statistics", "defender_ratio"),
            ("statistics", "attacker_ratio"),
            ("sessions", "max_sessions"),
        ];
        for &(section, key) in KEYS {
            if let Some(value) = file.get(section, key) {
                self.set(section, key, value)?;
            }
        }
        Ok(())
    }

    /// Apply `FUTSAL_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `FUTSAL_*` overrides using the given variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for &(var, section, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                self.set(section, key, &value)?;
            }
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.field.length) || !positive(self.field.width) {
            return Err(Error::InvalidConfig(format!(
                "field dimensions must be positive, got {}x{}",
                self.field.length, self.field.width
            )));
        }
        if !positive(self.tracking.max_tracking_distance) {
            return Err(Error::InvalidConfig(format!(
                "max_tracking_distance must be positive, got {}",
                self.tracking.max_tracking_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.tracking.confidence_threshold) {
            return Err(Error::InvalidConfig(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.tracking.confidence_threshold
            )));
        }
        if self.tracking.frame_stride == 0 {
            return Err(Error::InvalidConfig("frame_stride must be at least 1".to_string()));
        }
        if self.sessions.max_sessions == 0 {
            return Err(Error::InvalidConfig("max_sessions must be at least 1".to_string()));
        }
        self.statistics_engine().map(|_| ())
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::new(self.tracking.max_tracking_distance, self.tracking.strategy)
    }

    pub fn statistics_engine(&self) -> Result<StatisticsEngine> {
        StatisticsEngine::new(
            self.field.length,
            self.statistics.defender_ratio,
            self.statistics.attacker_ratio,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.field.length, 40.0);
        assert_eq!(s.field.width, 20.0);
        assert_eq!(s.tracking.max_tracking_distance, 2.0);
        assert_eq!(s.tracking.confidence_threshold, 0.5);
        assert_eq!(s.tracking.frame_stride, 1);
        assert_eq!(s.tracking.strategy, MatchingStrategy::Greedy);
        assert_eq!(s.sessions.max_sessions, 10);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[field]\nlength=38\n[tracking]\nstrategy=hungarian\n[sessions]\nmax_sessions=3").unwrap();

        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.field.length, 38.0);
        assert_eq!(s.field.width, 20.0);
        assert_eq!(s.tracking.strategy, MatchingStrategy::Optimal);
        assert_eq!(s.sessions.max_sessions, 3);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = SettingsFile::from_text("[tracking]\nframe_stride=2\nconfidence_threshold=0.4").unwrap();
        let env: HashMap<&str, &str> = [("FUTSAL_FRAME_STRIDE", "5"), ("FUTSAL_STRATEGY", "optimal")]
            .into_iter()
            .collect();

        let mut s = Settings::default();
        s.apply_file(&file).unwrap();
        s.apply_env_from(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(s.tracking.frame_stride, 5);
        assert_eq!(s.tracking.confidence_threshold, 0.4);
        assert_eq!(s.tracking.strategy, MatchingStrategy::Optimal);
    }

    #[test]
    fn test_bad_values_rejected() {
        let mut s = Settings::default();
        assert!(s.set("field", "length", "long").is_err());
        assert!(s.set("tracking", "strategy", "random").is_err());
        assert!(s.set("nope", "key", "1").is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut s = Settings::default();
        s.tracking.frame_stride = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.tracking.confidence_threshold = 1.5;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.statistics.defender_ratio = 0.7;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.sessions.max_sessions = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.field.width = -20.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_derived_components() {
        let mut s = Settings::default();
        s.tracking.max_tracking_distance = 1.5;
        s.tracking.strategy = MatchingStrategy::Optimal;

        let tc = s.tracker_config();
        assert_eq!(tc.max_tracking_distance, 1.5);
        assert_eq!(tc.strategy, MatchingStrategy::Optimal);

        let engine = s.statistics_engine().unwrap();
        assert_eq!(engine.surface_length, 40.0);
    }
}
