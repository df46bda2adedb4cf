//! Seasonal forecasting by replication of historical monthly means.
//!
//! For each city a 12-entry pattern table holds the mean of every normalized index over all
//! gap-filter-valid months with that calendar month. A forecast stamps each requested period
//! with the entry of its calendar month. Calendar months without an entry are reported as
//! gaps rather than filled.

use crate::config::PipelineConfig;
use crate::error::ForecastError;
use crate::gap_filter::{CitySeries, MonthlyPoint};
use crate::models::{CityKey, DailyIndexRecord, MonthPeriod, NormalizedIndices};
use chrono::{Datelike, Days, NaiveDate};
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub solar: f64,
    pub wind: f64,
    pub hydro: f64,
    pub renewable_score: f64,
    pub months_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    pub city: CityKey,
    entries: [Option<PatternEntry>; 12],
}

impl SeasonalPattern {
    pub fn from_series(series: &CitySeries) -> Self {
        let mut sums = [(0.0, 0.0, 0.0, 0usize); 12];
        for p in &series.points {
            let slot = (p.period.month as usize).checked_sub(1).and_then(|i| sums.get_mut(i));
            let Some(slot) = slot else {
                continue;
            };
            slot.0 += p.solar;
            slot.1 += p.wind;
            slot.2 += p.hydro;
            slot.3 += 1;
        }

        let mut entries = [None; 12];
        for (entry, (solar, wind, hydro, n)) in entries.iter_mut().zip(sums) {
            if n == 0 {
                continue;
            }
            let n_f = n as f64;
            let indices = NormalizedIndices::from_components(solar / n_f, wind / n_f, hydro / n_f);
            *entry = Some(PatternEntry {
                solar: indices.solar,
                wind: indices.wind,
                hydro: indices.hydro,
                renewable_score: indices.renewable_score,
                months_used: n,
            });
        }

        Self {
            city: series.city.clone(),
            entries,
        }
    }

    /// Entry for calendar month 1-12
    pub fn get(&self, month: u32) -> Option<&PatternEntry> {
        let idx = month.checked_sub(1)? as usize;
        self.entries.get(idx)?.as_ref()
    }

    pub fn available_months(&self) -> Vec<u32> {
        (1..=12).filter(|m| self.get(*m).is_some()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: NaiveDate,
    pub solar: f64,
    pub wind: f64,
    pub hydro: f64,
    pub renewable_score: f64,
    pub is_historical: bool,
}

impl ForecastPoint {
    fn projected(period: NaiveDate, entry: &PatternEntry) -> Self {
        Self {
            period,
            solar: entry.solar,
            wind: entry.wind,
            hydro: entry.hydro,
            renewable_score: entry.renewable_score,
            is_historical: false,
        }
    }

    fn historical(period: NaiveDate, indices: &NormalizedIndices) -> Self {
        Self {
            period,
            solar: indices.solar,
            wind: indices.wind,
            hydro: indices.hydro,
            renewable_score: indices.renewable_score,
            is_historical: true,
        }
    }
}

/// A requested period left empty because its calendar month has no pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastGap {
    pub period: NaiveDate,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub city: CityKey,
    pub horizon_days: u32,
    pub granularity: Granularity,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<ForecastPoint>,
    pub gaps: Vec<ForecastGap>,
}

impl Forecast {
    pub fn historical(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.is_historical)
    }

    pub fn projected(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| !p.is_historical)
    }

    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }

    /// One error per distinct calendar month that could not be projected
    pub fn errors(&self) -> Vec<ForecastError> {
        let mut seen = HashSet::new();
        self.gaps
            .iter()
            .filter(|g| seen.insert(g.month))
            .map(|g| ForecastError::NoHistoricalPattern {
                city: self.city.clone(),
                month: g.month,
            })
            .collect()
    }

    pub fn mean_projected_score(&self) -> Option<f64> {
        let (sum, n) = self
            .projected()
            .fold((0.0, 0usize), |(s, n), p| (s + p.renewable_score, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRequest {
    pub city: CityKey,
    pub horizon_days: u32,
    /// First projected day; defaults to the day after the city's latest record
    pub start: Option<NaiveDate>,
}

impl ForecastRequest {
    pub fn new(city: &str, province: &str, horizon_days: u32) -> Self {
        Self {
            city: CityKey::new(city, province),
            horizon_days,
            start: None,
        }
    }

    pub fn starting(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }
}

pub struct SeasonalForecaster {
    daily_horizon_limit: u32,
    history_days: u64,
    history_months: usize,
    patterns: HashMap<CityKey, SeasonalPattern>,
    monthly_history: HashMap<CityKey, Vec<MonthlyPoint>>,
    daily_history: HashMap<CityKey, Vec<(NaiveDate, NormalizedIndices)>>,
    last_observed: HashMap<CityKey, NaiveDate>,
}

impl SeasonalForecaster {
    pub fn new(config: &PipelineConfig, series: &[CitySeries], daily: &[DailyIndexRecord]) -> Self {
        let valid: HashSet<(&CityKey, MonthPeriod)> = series
            .iter()
            .flat_map(|s| s.points.iter().map(move |p| (&s.city, p.period)))
            .collect();

        let mut last_observed: HashMap<CityKey, NaiveDate> = HashMap::new();
        let mut daily_history: HashMap<CityKey, Vec<(NaiveDate, NormalizedIndices)>> = HashMap::new();
        for d in daily {
            let city = &d.record.city;
            let date = d.record.date;
            last_observed
                .entry(city.clone())
                .and_modify(|last| *last = (*last).max(date))
                .or_insert(date);

            if let Some(n) = d.indices.normalized() {
                if valid.contains(&(city, MonthPeriod::year_month(date))) {
                    daily_history.entry(city.clone()).or_default().push((date, *n));
                }
            }
        }
        for points in daily_history.values_mut() {
            points.sort_by_key(|(date, _)| *date);
        }

        Self {
            daily_horizon_limit: config.daily_horizon_limit_days,
            history_days: u64::from(config.history_context_days),
            history_months: config.history_context_months,
            patterns: series
                .iter()
                .map(|s| (s.city.clone(), SeasonalPattern::from_series(s)))
                .collect(),
            monthly_history: series.iter().map(|s| (s.city.clone(), s.points.clone())).collect(),
            daily_history,
            last_observed,
        }
    }

    pub fn pattern(&self, city: &CityKey) -> Option<&SeasonalPattern> {
        self.patterns.get(city)
    }

    pub fn cities(&self) -> Vec<&CityKey> {
        let mut cities: Vec<&CityKey> = self.patterns.keys().collect();
        cities.sort();
        cities
    }

    pub fn granularity(&self, horizon_days: u32) -> Granularity {
        if horizon_days <= self.daily_horizon_limit {
            Granularity::Daily
        } else {
            Granularity::Monthly
        }
    }

    /// Forecast with any unavailable calendar months listed as gaps
    pub fn forecast(&self, city: &str, province: &str, horizon_days: u32) -> Result<Forecast, ForecastError> {
        self.forecast_from(&ForecastRequest::new(city, province, horizon_days))
    }

    /// Like `forecast`, but the first unavailable calendar month is an error
    pub fn forecast_strict(&self, request: &ForecastRequest) -> Result<Forecast, ForecastError> {
        let forecast = self.forecast_from(request)?;
        match forecast.errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(forecast),
        }
    }

    pub fn forecast_from(&self, request: &ForecastRequest) -> Result<Forecast, ForecastError> {
        if request.horizon_days == 0 {
            return Err(ForecastError::EmptyHorizon);
        }
        let city = &request.city;
        let pattern = self
            .patterns
            .get(city)
            .ok_or_else(|| ForecastError::UnknownCity(city.clone()))?;

        let start = request
            .start
            .or_else(|| self.last_observed.get(city).and_then(|d| d.succ_opt()))
            .ok_or_else(|| ForecastError::UnknownCity(city.clone()))?;
        let end = start
            .checked_add_days(Days::new(u64::from(request.horizon_days) - 1))
            .unwrap_or(NaiveDate::MAX);
        let granularity = self.granularity(request.horizon_days);

        let mut points = match granularity {
            Granularity::Daily => self.daily_context(city, start),
            Granularity::Monthly => self.monthly_context(city, start),
        };
        let mut gaps = Vec::new();

        let periods: Vec<NaiveDate> = match granularity {
            Granularity::Daily => start.iter_days().take(request.horizon_days as usize).collect(),
            Granularity::Monthly => month_starts(start, end),
        };
        for period in periods {
            match pattern.get(period.month()) {
                Some(entry) => points.push(ForecastPoint::projected(period, entry)),
                None => gaps.push(ForecastGap {
                    period,
                    month: period.month(),
                }),
            }
        }

        let forecast = Forecast {
            city: city.clone(),
            horizon_days: request.horizon_days,
            granularity,
            start,
            end,
            points,
            gaps,
        };
        if !forecast.is_complete() {
            let months: BTreeSet<u32> = forecast.gaps.iter().map(|g| g.month).collect();
            warn!(
                "Forecast for {} over {} days has {} unavailable periods (months without history: {:?})",
                city,
                request.horizon_days,
                forecast.gaps.len(),
                months
            );
        }
        Ok(forecast)
    }

    /// Forecast every known city at one horizon; cities that cannot be forecast are skipped
    pub fn forecast_all(&self, horizon_days: u32) -> Vec<Forecast> {
        self.cities()
            .into_par_iter()
            .filter_map(|city| {
                let request = ForecastRequest {
                    city: city.clone(),
                    horizon_days,
                    start: None,
                };
                self.forecast_from(&request).ok()
            })
            .collect()
    }

    fn daily_context(&self, city: &CityKey, start: NaiveDate) -> Vec<ForecastPoint> {
        let from = start
            .checked_sub_days(Days::new(self.history_days))
            .unwrap_or(NaiveDate::MIN);
        self.daily_history
            .get(city)
            .map(|days| {
                days.iter()
                    .filter(|(date, _)| *date >= from && *date < start)
                    .map(|(date, n)| ForecastPoint::historical(*date, n))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn monthly_context(&self, city: &CityKey, start: NaiveDate) -> Vec<ForecastPoint> {
        let start_period = MonthPeriod::year_month(start);
        let Some(history) = self.monthly_history.get(city) else {
            return Vec::new();
        };
        let earlier: Vec<&MonthlyPoint> = history.iter().filter(|p| p.period < start_period).collect();
        let skip = earlier.len().saturating_sub(self.history_months);

        earlier
            .into_iter()
            .skip(skip)
            .filter_map(|p| {
                let indices = NormalizedIndices {
                    solar: p.solar,
                    wind: p.wind,
                    hydro: p.hydro,
                    renewable_score: p.renewable_score,
                };
                Some(ForecastPoint::historical(p.period.first_day()?, &indices))
            })
            .collect()
    }
}

/// First day of every calendar month touched by [start, end]
fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let last = MonthPeriod::year_month(end);
    let mut months = Vec::new();
    let mut cursor = Some(MonthPeriod::year_month(start));
    while let Some(period) = cursor {
        if period > last {
            break;
        }
        if let Some(day) = period.first_day() {
            months.push(day);
        }
        cursor = period.next();
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly(year: i32, month: u32, score: f64) -> MonthlyPoint {
        MonthlyPoint {
            period: MonthPeriod { year: Some(year), month },
            count: 28,
            solar: score,
            wind: score,
            hydro: score,
            renewable_score: score,
        }
    }

    fn forecaster(points: Vec<MonthlyPoint>) -> SeasonalForecaster {
        let series = vec![CitySeries {
            city: CityKey::new("Winnipeg", "Manitoba"),
            points,
        }];
        SeasonalForecaster::new(&PipelineConfig::default(), &series, &[])
    }

    #[test]
    fn test_pattern_averages_across_years() {
        let f = forecaster(vec![monthly(2020, 7, 0.4), monthly(2021, 7, 0.8)]);
        let pattern = f.pattern(&CityKey::new("Winnipeg", "Manitoba")).unwrap();
        let july = pattern.get(7).unwrap();
        assert!((july.solar - 0.6).abs() < 1e-12);
        assert_eq!(july.months_used, 2);
        assert_eq!(pattern.available_months(), vec![7]);
        assert!(pattern.get(0).is_none());
        assert!(pattern.get(13).is_none());
    }

    #[test]
    fn test_short_horizon_is_daily() {
        let f = forecaster((1..=12).map(|m| monthly(2022, m, m as f64 / 12.0)).collect());
        let request = ForecastRequest::new("Winnipeg", "Manitoba", 10)
            .starting(NaiveDate::from_ymd_opt(2023, 1, 28).unwrap());
        let forecast = f.forecast_from(&request).unwrap();

        assert_eq!(forecast.granularity, Granularity::Daily);
        let projected: Vec<_> = forecast.projected().collect();
        assert_eq!(projected.len(), 10);
        assert_eq!(projected[3].period, NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
        assert_eq!(projected[4].renewable_score, projected[9].renewable_score);
        assert!(projected[3].renewable_score < projected[4].renewable_score);
    }

    #[test]
    fn test_long_horizon_is_monthly() {
        let f = forecaster((1..=12).map(|m| monthly(2022, m, 0.5)).collect());
        let request = ForecastRequest::new("Winnipeg", "Manitoba", 365)
            .starting(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let forecast = f.forecast_from(&request).unwrap();

        assert_eq!(forecast.granularity, Granularity::Monthly);
        assert_eq!(forecast.projected().count(), 12);
        assert_eq!(forecast.historical().count(), 12);
        assert!(forecast.is_complete());
    }

    #[test]
    fn test_errors() {
        let f = forecaster(vec![monthly(2022, 1, 0.5)]);
        assert_eq!(f.forecast("Winnipeg", "Manitoba", 0), Err(ForecastError::EmptyHorizon));
        assert!(matches!(
            f.forecast("Brandon", "Manitoba", 30),
            Err(ForecastError::UnknownCity(_))
        ));

        let request = ForecastRequest::new("Winnipeg", "Manitoba", 60)
            .starting(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(
            f.forecast_strict(&request),
            Err(ForecastError::NoHistoricalPattern {
                city: CityKey::new("Winnipeg", "Manitoba"),
                month: 2
            })
        );
    }

    #[test]
    fn test_month_starts_span() {
        let months = month_starts(
            NaiveDate::from_ymd_opt(2023, 11, 20).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        assert_eq!(months.len(), 4);
        assert_eq!(months[0], NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
        assert_eq!(months[3], NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }
}
