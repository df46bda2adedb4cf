//! Reconstruction of missing weather variables from station geography.
//!
//! Every variable is either derived from geography and correlated observations, or set to a
//! static fallback when the derivation inputs are themselves missing. The result is always a
//! fully populated [`Weather`].

use crate::config::PipelineConfig;
use crate::models::{StationDay, Weather};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

pub const TEMP_MIN_C: f64 = -50.0;
pub const TEMP_MAX_C: f64 = 45.0;
pub const DIURNAL_RANGE_MIN_C: f64 = 4.0;
pub const DIURNAL_RANGE_MAX_C: f64 = 12.0;
pub const AWND_MIN_MS: f64 = 0.5;
pub const AWND_MAX_MS: f64 = 12.0;
pub const GUST_FACTOR: f64 = 1.5;
pub const SNOW_PER_DEPTH: f64 = 0.1;
pub const DEPTH_PER_SNOW: f64 = 10.0;
const REFERENCE_LATITUDE: f64 = 45.0;

/// Daily temperature range in °C, kept within [4, 12]. Unknown elevation contributes nothing.
pub fn diurnal_range(elevation: Option<f64>, latitude: f64) -> f64 {
    (8.0 - 0.005 * elevation.unwrap_or(0.0) + 0.1 * (latitude - REFERENCE_LATITUDE).abs())
        .clamp(DIURNAL_RANGE_MIN_C, DIURNAL_RANGE_MAX_C)
}

/// Mean wind speed (m/s) estimated from elevation, precipitation and latitude
pub fn estimate_wind_speed(elevation: f64, prcp: f64, latitude: f64) -> f64 {
    (0.2 + 0.004 * elevation + 0.0008 * prcp + 0.03 * (latitude - REFERENCE_LATITUDE).abs())
        .clamp(AWND_MIN_MS, AWND_MAX_MS)
}

/// Corpus-wide column statistics, computed over observed values before any inference
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusMeans {
    pub tavg: Option<f64>,
    pub tavg_samples: usize,
}

impl CorpusMeans {
    pub fn from_station_days(days: &[StationDay]) -> Self {
        let (sum, n) = days
            .iter()
            .filter_map(|d| d.weather.tavg)
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

        Self {
            tavg: (n > 0).then(|| sum / n as f64),
            tavg_samples: n,
        }
    }
}

/// How many values were derived, replaced by a fallback, or clamped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub derived: usize,
    pub fallbacks: usize,
    pub clamped: usize,
}

impl AddAssign for InferenceStats {
    fn add_assign(&mut self, other: Self) {
        self.derived += other.derived;
        self.fallbacks += other.fallbacks;
        self.clamped += other.clamped;
    }
}

pub struct VariableInferenceEngine {
    means: CorpusMeans,
    fallback_tavg: f64,
    fallback_awnd: f64,
    fallback_wsf2: f64,
}

impl VariableInferenceEngine {
    pub fn new(config: &PipelineConfig, means: CorpusMeans) -> Self {
        Self {
            means,
            fallback_tavg: config.fallback_tavg_c,
            fallback_awnd: config.fallback_awnd_ms,
            fallback_wsf2: config.fallback_wsf2_ms,
        }
    }

    /// Fill every missing variable of a station-day
    pub fn complete(&self, day: &StationDay) -> (Weather, InferenceStats) {
        let mut stats = InferenceStats::default();
        let observed = &day.weather;

        let (tavg, tmax, tmin) = self.temperatures(day, &mut stats);

        let prcp = observed.prcp.unwrap_or_else(|| {
            stats.fallbacks += 1;
            0.0
        });

        let (snow, snwd) = match (observed.snow, observed.snwd) {
            (Some(snow), Some(snwd)) => (snow, snwd),
            (None, Some(snwd)) => {
                stats.derived += 1;
                (SNOW_PER_DEPTH * snwd, snwd)
            }
            (Some(snow), None) => {
                stats.derived += 1;
                (snow, DEPTH_PER_SNOW * snow)
            }
            (None, None) => {
                stats.fallbacks += 2;
                (0.0, 0.0)
            }
        };

        let mut awnd_fallback = false;
        let awnd = match (observed.awnd, day.elevation) {
            (Some(awnd), _) => clamp_counted(awnd, 0.0, f64::INFINITY, &mut stats),
            (None, Some(elevation)) => {
                stats.derived += 1;
                estimate_wind_speed(elevation, prcp, day.latitude)
            }
            (None, None) => {
                stats.fallbacks += 1;
                awnd_fallback = true;
                self.fallback_awnd
            }
        };

        let wsf2 = match observed.wsf2 {
            Some(wsf2) => clamp_counted(wsf2, 0.0, f64::INFINITY, &mut stats),
            None if awnd_fallback => {
                stats.fallbacks += 1;
                self.fallback_wsf2
            }
            None => {
                stats.derived += 1;
                GUST_FACTOR * awnd
            }
        };

        let weather = Weather {
            prcp,
            tavg,
            tmax,
            tmin,
            snow,
            snwd,
            awnd,
            wsf2,
        };
        (weather, stats)
    }

    /// TAVG, TMAX, TMIN. Observed extremes are kept; the corpus mean is the last resort.
    fn temperatures(&self, day: &StationDay, stats: &mut InferenceStats) -> (f64, f64, f64) {
        let delta = diurnal_range(day.elevation, day.latitude);
        let observed = &day.weather;

        let (tavg, tmax, tmin) = match (observed.tavg, observed.tmax, observed.tmin) {
            (Some(avg), max, min) => {
                stats.derived += usize::from(max.is_none()) + usize::from(min.is_none());
                (
                    avg,
                    max.unwrap_or(avg + delta / 2.0),
                    min.unwrap_or(avg - delta / 2.0),
                )
            }
            (None, Some(max), Some(min)) => {
                stats.derived += 1;
                ((max + min) / 2.0, max, min)
            }
            (None, Some(max), None) => {
                stats.derived += 2;
                let min = max - delta;
                ((max + min) / 2.0, max, min)
            }
            (None, None, Some(min)) => {
                stats.derived += 2;
                let max = min + delta;
                ((max + min) / 2.0, max, min)
            }
            (None, None, None) => {
                stats.fallbacks += 1;
                stats.derived += 2;
                let avg = self.means.tavg.unwrap_or(self.fallback_tavg);
                (avg, avg + delta / 2.0, avg - delta / 2.0)
            }
        };

        (
            clamp_counted(tavg, TEMP_MIN_C, TEMP_MAX_C, stats),
            clamp_counted(tmax, TEMP_MIN_C, TEMP_MAX_C, stats),
            clamp_counted(tmin, TEMP_MIN_C, TEMP_MAX_C, stats),
        )
    }
}

fn clamp_counted(value: f64, lo: f64, hi: f64, stats: &mut InferenceStats) -> f64 {
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        stats.clamped += 1;
    }
    clamped
}
