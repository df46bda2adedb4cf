use crate::config::PipelineConfig;
use crate::error::ExclusionReason;
use crate::models::{CityKey, MonthPeriod, MonthlyIndexPoint};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A (city, month) that passed the completeness rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub period: MonthPeriod,
    pub count: usize,
    pub solar: f64,
    pub wind: f64,
    pub hydro: f64,
    pub renewable_score: f64,
}

/// Valid months of one city in time order. Missing months are holes, never filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySeries {
    pub city: CityKey,
    pub points: Vec<MonthlyPoint>,
}

impl CitySeries {
    pub fn point(&self, period: MonthPeriod) -> Option<&MonthlyPoint> {
        self.points.iter().find(|p| p.period == period)
    }

    /// Year-months between the first and last valid month that have no point
    pub fn missing_periods(&self) -> Vec<MonthPeriod> {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Vec::new();
        };

        let mut missing = Vec::new();
        let mut cursor = first.period.next();
        while let Some(period) = cursor {
            if period >= last.period {
                break;
            }
            if self.point(period).is_none() {
                missing.push(period);
            }
            cursor = period.next();
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub evaluated: usize,
    pub accepted: usize,
    pub insufficient_samples: usize,
    pub missing_index: usize,
}

pub struct GapFilter {
    min_samples: usize,
}

impl GapFilter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_samples: config.min_month_samples,
        }
    }

    pub fn check(&self, point: &MonthlyIndexPoint) -> Result<MonthlyPoint, ExclusionReason> {
        if point.aggregate.count < self.min_samples {
            return Err(ExclusionReason::InsufficientSamples);
        }
        let defined = |v: Option<f64>| v.filter(|x| x.is_finite());

        match (
            defined(point.solar),
            defined(point.wind),
            defined(point.hydro),
            defined(point.renewable_score),
        ) {
            (Some(solar), Some(wind), Some(hydro), Some(renewable_score)) => Ok(MonthlyPoint {
                period: point.aggregate.period,
                count: point.aggregate.count,
                solar,
                wind,
                hydro,
                renewable_score,
            }),
            _ => Err(ExclusionReason::MissingIndex),
        }
    }

    /// Split monthly points into per-city series of valid months. Every city present in the
    /// input gets a series, possibly empty.
    pub fn filter(&self, points: &[MonthlyIndexPoint]) -> (Vec<CitySeries>, GapReport) {
        let mut report = GapReport::default();
        let mut by_city: BTreeMap<CityKey, Vec<MonthlyPoint>> = BTreeMap::new();

        for point in points {
            report.evaluated += 1;
            let series = by_city.entry(point.aggregate.city.clone()).or_default();
            match self.check(point) {
                Ok(valid) => {
                    report.accepted += 1;
                    series.push(valid);
                }
                Err(ExclusionReason::InsufficientSamples) => report.insufficient_samples += 1,
                Err(ExclusionReason::MissingIndex) => report.missing_index += 1,
            }
        }

        debug!(
            "Gap filter kept {}/{} months ({} under {} samples, {} with missing indices)",
            report.accepted,
            report.evaluated,
            report.insufficient_samples,
            self.min_samples,
            report.missing_index
        );

        let series = by_city
            .into_iter()
            .map(|(city, mut points)| {
                points.sort_by_key(|p| p.period);
                CitySeries { city, points }
            })
            .collect();

        (series, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthlyCityAggregate;

    fn point(month: u32, count: usize, hydro: Option<f64>) -> MonthlyIndexPoint {
        MonthlyIndexPoint {
            aggregate: MonthlyCityAggregate {
                city: CityKey::new("Regina", "Saskatchewan"),
                period: MonthPeriod { year: Some(2021), month },
                prcp_sum: 10.0,
                snow_sum: 0.0,
                snwd_mean: 0.0,
                count,
            },
            hydro_raw: 20.0,
            solar: Some(0.5),
            wind: Some(0.4),
            hydro,
            renewable_score: hydro.map(|h| (0.5 + 0.4 + h) / 3.0),
        }
    }

    #[test]
    fn test_sparse_and_incomplete_months_excluded() {
        let filter = GapFilter::new(&PipelineConfig::default());
        let points = vec![
            point(1, 3, Some(0.2)),
            point(2, 2, Some(0.2)),
            point(3, 30, None),
            point(5, 31, Some(0.7)),
        ];
        let (series, report) = filter.filter(&points);

        assert_eq!(series.len(), 1);
        let months: Vec<u32> = series[0].points.iter().map(|p| p.period.month).collect();
        assert_eq!(months, vec![1, 5]);
        assert_eq!(report.insufficient_samples, 1);
        assert_eq!(report.missing_index, 1);
        assert!(series[0].points.iter().all(|p| p.count >= 3));
    }

    #[test]
    fn test_holes_are_listed_not_filled() {
        let filter = GapFilter::new(&PipelineConfig::default());
        let (series, _) = filter.filter(&[point(1, 10, Some(0.1)), point(4, 10, Some(0.1))]);

        assert_eq!(series[0].points.len(), 2);
        let missing: Vec<String> = series[0].missing_periods().iter().map(|p| p.to_string()).collect();
        assert_eq!(missing, vec!["2021-02", "2021-03"]);
    }

    #[test]
    fn test_city_with_no_valid_month_keeps_empty_series() {
        let filter = GapFilter::new(&PipelineConfig::default());
        let (series, report) = filter.filter(&[point(1, 1, Some(0.3))]);
        assert_eq!(series.len(), 1);
        assert!(series[0].points.is_empty());
        assert!(series[0].missing_periods().is_empty());
        assert_eq!(report.accepted, 0);
    }
}
