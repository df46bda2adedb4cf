use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum daily records for a (city, month) to enter historical or pattern series
    pub min_month_samples: usize,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Horizons up to this many days produce daily forecast points, longer ones monthly
    pub daily_horizon_limit_days: u32,
    pub history_context_days: u32,
    pub history_context_months: usize,
    /// Input temperatures, precipitation and snow are in tenths (GHCN daily convention)
    pub tenths_units: bool,
    /// TAVG used only when the corpus carries no observed TAVG at all
    pub fallback_tavg_c: f64,
    pub fallback_awnd_ms: f64,
    pub fallback_wsf2_ms: f64,
    pub top_cities_per_province: usize,
    pub forecast_horizons: Vec<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_month_samples: 3,
            lower_percentile: 5.0,
            upper_percentile: 95.0,
            daily_horizon_limit_days: 30,
            history_context_days: 90,
            history_context_months: 12,
            tenths_units: false,
            fallback_tavg_c: 0.0,
            fallback_awnd_ms: 2.0,
            fallback_wsf2_ms: 3.0,
            top_cities_per_province: 3,
            forecast_horizons: vec![30, 120, 365],
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config: {:?}", path))?;

        let config: PipelineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse pipeline config: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_month_samples == 0 {
            anyhow::bail!("min_month_samples must be at least 1");
        }
        let valid_pct = |p: f64| (0.0..=100.0).contains(&p);
        if !valid_pct(self.lower_percentile) || !valid_pct(self.upper_percentile) {
            anyhow::bail!(
                "percentiles must lie in [0, 100], got {} and {}",
                self.lower_percentile,
                self.upper_percentile
            );
        }
        if self.lower_percentile >= self.upper_percentile {
            anyhow::bail!(
                "lower_percentile ({}) must be below upper_percentile ({})",
                self.lower_percentile,
                self.upper_percentile
            );
        }
        if self.forecast_horizons.iter().any(|h| *h == 0) {
            anyhow::bail!("forecast horizons must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "min_month_samples": 5, "tenths_units": true }"#).unwrap();
        assert_eq!(config.min_month_samples, 5);
        assert!(config.tenths_units);
        assert_eq!(config.upper_percentile, 95.0);
        assert_eq!(config.forecast_horizons, vec![30, 120, 365]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_percentiles_rejected() {
        let config = PipelineConfig {
            lower_percentile: 95.0,
            upper_percentile: 5.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
