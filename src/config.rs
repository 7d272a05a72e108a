//! Analyzer configuration
//!
//! Thresholds for the impact gate and the aggregate windows. Every field has a
//! default, so an empty TOML file (or no file at all) reproduces the stock
//! dashboard behavior.
//!
//! ```toml
//! min_sample_size = 3
//! recent_window_days = 7
//! sleep_target_hours = 8.0
//! ```

use crate::error::{InsightError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds used by the impact and aggregate stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Minimum days with the habit (or matching option) for a significant row
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,

    /// Minimum parseable values before the median split is attempted
    #[serde(default = "default_median_split_min_values")]
    pub median_split_min_values: usize,

    /// Number of most recent entries used for the recent average and sleep debt
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: usize,

    /// Nightly sleep target in hours
    #[serde(default = "default_sleep_target_hours")]
    pub sleep_target_hours: f64,

    /// Minimum nights an hour bucket needs to compete for the optimal bedtime
    #[serde(default = "default_bedtime_min_bucket")]
    pub bedtime_min_bucket: usize,

    /// Time habit values before this hour count as after midnight
    #[serde(default = "default_late_night_cutoff_hour")]
    pub late_night_cutoff_hour: u8,

    /// Bedtime hours before this hour sort after the evening hours
    #[serde(default = "default_night_order_pivot_hour")]
    pub night_order_pivot_hour: u8,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_sample_size: default_min_sample_size(),
            median_split_min_values: default_median_split_min_values(),
            recent_window_days: default_recent_window_days(),
            sleep_target_hours: default_sleep_target_hours(),
            bedtime_min_bucket: default_bedtime_min_bucket(),
            late_night_cutoff_hour: default_late_night_cutoff_hour(),
            night_order_pivot_hour: default_night_order_pivot_hour(),
        }
    }
}

fn default_min_sample_size() -> usize {
    3
}

fn default_median_split_min_values() -> usize {
    4
}

fn default_recent_window_days() -> usize {
    7
}

fn default_sleep_target_hours() -> f64 {
    8.0
}

fn default_bedtime_min_bucket() -> usize {
    2
}

fn default_late_night_cutoff_hour() -> u8 {
    5
}

fn default_night_order_pivot_hour() -> u8 {
    12
}

impl AnalyzerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: AnalyzerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded analyzer config");
        Ok(config)
    }

    /// Load from a file when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_sample_size == 0 {
            return Err(InsightError::InvalidConfig(
                "min_sample_size must be at least 1".to_string(),
            ));
        }
        // The median split needs one value on each side
        if self.median_split_min_values < 2 {
            return Err(InsightError::InvalidConfig(
                "median_split_min_values must be at least 2".to_string(),
            ));
        }
        if self.recent_window_days == 0 {
            return Err(InsightError::InvalidConfig(
                "recent_window_days must be at least 1".to_string(),
            ));
        }
        if !(self.sleep_target_hours.is_finite() && self.sleep_target_hours > 0.0) {
            return Err(InsightError::InvalidConfig(format!(
                "sleep_target_hours must be positive, got {}",
                self.sleep_target_hours
            )));
        }
        if self.bedtime_min_bucket == 0 {
            return Err(InsightError::InvalidConfig(
                "bedtime_min_bucket must be at least 1".to_string(),
            ));
        }
        if self.late_night_cutoff_hour > 23 || self.night_order_pivot_hour > 23 {
            return Err(InsightError::InvalidConfig(
                "hour thresholds must be between 0 and 23".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.min_sample_size, 3);
        assert_eq!(config.median_split_min_values, 4);
        assert_eq!(config.recent_window_days, 7);
        assert_eq!(config.bedtime_min_bucket, 2);
    }

    #[test]
    fn test_partial_override() {
        let config = AnalyzerConfig::from_toml_str("min_sample_size = 5\nsleep_target_hours = 7.5").unwrap();
        assert_eq!(config.min_sample_size, 5);
        assert!((config.sleep_target_hours - 7.5).abs() < f64::EPSILON);
        assert_eq!(config.recent_window_days, 7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AnalyzerConfig::from_toml_str("recent_window_days = 0"),
            Err(InsightError::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_toml_str("sleep_target_hours = -1.0"),
            Err(InsightError::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_toml_str("late_night_cutoff_hour = 30"),
            Err(InsightError::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_toml_str("min_sample_size = \"three\""),
            Err(InsightError::TomlError(_))
        ));
    }

    #[test]
    fn test_load_or_default_without_path() {
        assert_eq!(
            AnalyzerConfig::load_or_default(None).unwrap(),
            AnalyzerConfig::default()
        );
    }
}
