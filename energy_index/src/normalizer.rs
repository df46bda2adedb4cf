//! Corpus-wide percentile normalization.
//!
//! Normalization is two-phase: `fit` reads the raw value of every record in the corpus and
//! reduces them to one pair of bounds per index, then `apply` maps each record through those
//! bounds. Bounds are never computed per city or per month, so normalized values stay
//! comparable across the whole corpus.

use crate::config::PipelineConfig;
use crate::models::{DailyIndexRecord, MonthlyIndexPoint, MonthlyIndexRecord, NormalizedIndices};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value assigned to every record of an index whose bounds collapsed to a single value
pub const DEGENERATE_VALUE: f64 = 0.5;

/// Percentile by linear interpolation between order statistics. `sorted` must be ascending.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let fraction = rank - lo as f64;
    Some(sorted[lo] + fraction * (sorted[hi] - sorted[lo]))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBounds {
    pub lower: f64,
    pub upper: f64,
}

impl PercentileBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Non-finite values are ignored. No values at all yields degenerate bounds.
    pub fn from_values(mut values: Vec<f64>, lower_pct: f64, upper_pct: f64) -> Self {
        values.retain(|v| v.is_finite());
        values.par_sort_unstable_by(|a, b| a.total_cmp(b));

        match (percentile(&values, lower_pct), percentile(&values, upper_pct)) {
            (Some(lower), Some(upper)) => Self { lower, upper },
            _ => Self { lower: 0.0, upper: 0.0 },
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.lower.is_finite() && self.upper.is_finite() && self.upper > self.lower)
    }

    pub fn normalize(&self, raw: f64) -> f64 {
        if self.is_degenerate() {
            return DEGENERATE_VALUE;
        }
        let clipped = raw.clamp(self.lower, self.upper);
        ((clipped - self.lower) / (self.upper - self.lower)).clamp(0.0, 1.0)
    }
}

/// One pair of bounds per index, shared by every record of the run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBounds {
    pub solar: PercentileBounds,
    pub wind: PercentileBounds,
    pub hydro: PercentileBounds,
}

impl NormalizationBounds {
    pub fn normalize(&self, solar: f64, wind: f64, hydro: f64) -> NormalizedIndices {
        NormalizedIndices::from_components(
            self.solar.normalize(solar),
            self.wind.normalize(wind),
            self.hydro.normalize(hydro),
        )
    }
}

pub struct PercentileNormalizer {
    lower_pct: f64,
    upper_pct: f64,
}

impl PercentileNormalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            lower_pct: config.lower_percentile,
            upper_pct: config.upper_percentile,
        }
    }

    /// Phase 1: collect every raw value of the corpus and reduce to bounds
    pub fn fit(&self, daily: &[DailyIndexRecord]) -> NormalizationBounds {
        let fit_one = |f: fn(&DailyIndexRecord) -> f64| {
            let values: Vec<f64> = daily.par_iter().map(f).collect();
            PercentileBounds::from_values(values, self.lower_pct, self.upper_pct)
        };

        let bounds = NormalizationBounds {
            solar: fit_one(|d| d.indices.raw.solar),
            wind: fit_one(|d| d.indices.raw.wind),
            hydro: fit_one(|d| d.indices.raw.hydro),
        };

        for (name, b) in [("Solar", bounds.solar), ("Wind", bounds.wind), ("Hydro", bounds.hydro)] {
            if b.is_degenerate() {
                warn!(
                    "{} distribution is degenerate (p{}={}, p{}={}); normalizing to {}",
                    name, self.lower_pct, b.lower, self.upper_pct, b.upper, DEGENERATE_VALUE
                );
            } else {
                info!(
                    "{} bounds: p{}={:.4}, p{}={:.4}",
                    name, self.lower_pct, b.lower, self.upper_pct, b.upper
                );
            }
        }

        bounds
    }

    /// Phase 2: map every record through the fitted bounds. Records that already carry
    /// normalized values are left untouched. Returns how many records were written.
    pub fn apply(&self, bounds: &NormalizationBounds, daily: &mut [DailyIndexRecord]) -> usize {
        daily
            .par_iter_mut()
            .map(|d| {
                let raw = d.indices.raw;
                usize::from(d.indices.set_normalized(bounds.normalize(raw.solar, raw.wind, raw.hydro)))
            })
            .sum()
    }

    /// Join each monthly aggregate with the mean of its normalized daily Solar and Wind and
    /// its own normalized Hydro
    pub fn normalize_monthly(
        &self,
        bounds: &NormalizationBounds,
        monthly: &[MonthlyIndexRecord],
        daily: &[DailyIndexRecord],
    ) -> Vec<MonthlyIndexPoint> {
        #[derive(Default)]
        struct Sums {
            solar: f64,
            wind: f64,
            n: usize,
        }

        let mut sums: HashMap<(&str, &str, i32, u32), Sums> = HashMap::new();
        for d in daily {
            let Some(n) = d.indices.normalized() else {
                continue;
            };
            if !(n.solar.is_finite() && n.wind.is_finite()) {
                continue;
            }
            let key = (
                d.record.city.city.as_str(),
                d.record.city.province.as_str(),
                d.temporal.year,
                d.temporal.month,
            );
            let entry = sums.entry(key).or_default();
            entry.solar += n.solar;
            entry.wind += n.wind;
            entry.n += 1;
        }

        monthly
            .iter()
            .map(|m| {
                let agg = &m.aggregate;
                let means = agg.period.year.and_then(|year| {
                    let key = (agg.city.city.as_str(), agg.city.province.as_str(), year, agg.period.month);
                    sums.get(&key)
                        .filter(|s| s.n > 0)
                        .map(|s| (s.solar / s.n as f64, s.wind / s.n as f64))
                });
                let hydro = Some(bounds.hydro.normalize(m.hydro_raw)).filter(|h| h.is_finite());

                let (solar, wind) = match means {
                    Some((s, w)) => (Some(s), Some(w)),
                    None => (None, None),
                };
                let renewable_score = match (solar, wind, hydro) {
                    (Some(s), Some(w), Some(h)) => {
                        Some(NormalizedIndices::from_components(s, w, h).renewable_score)
                    }
                    _ => None,
                };

                MonthlyIndexPoint {
                    aggregate: agg.clone(),
                    hydro_raw: m.hydro_raw,
                    solar,
                    wind,
                    hydro,
                    renewable_score,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_interpolation() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 5.0), Some(5.0));
        assert_eq!(percentile(&values, 95.0), Some(95.0));

        let sparse = vec![10.0, 20.0];
        assert_eq!(percentile(&sparse, 5.0), Some(10.5));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_hydro_bounds_mapping() {
        let bounds = PercentileBounds::new(50.0, 350.0);
        assert_relative_eq!(bounds.normalize(340.0), 0.9667, epsilon = 1e-4);
        assert_eq!(bounds.normalize(10.0), 0.0);
        assert_eq!(bounds.normalize(1_000.0), 1.0);
    }

    #[test]
    fn test_renewable_score_from_components() {
        let n = NormalizedIndices::from_components(0.6, 0.3, 0.9667);
        assert_relative_eq!(n.renewable_score, 0.6222, epsilon = 1e-4);
    }

    #[test]
    fn test_degenerate_distribution() {
        let bounds = PercentileBounds::from_values(vec![4.0; 20], 5.0, 95.0);
        assert!(bounds.is_degenerate());
        assert_eq!(bounds.normalize(4.0), DEGENERATE_VALUE);
        assert_eq!(bounds.normalize(-100.0), DEGENERATE_VALUE);

        let empty = PercentileBounds::from_values(vec![f64::NAN], 5.0, 95.0);
        assert!(empty.is_degenerate());
    }
}
