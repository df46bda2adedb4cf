use crate::accumulator::{MonthGrouping, MonthlyAccumulator};
use crate::models::{
    CityDateRecord, CityKey, DailyIndexRecord, IndexSet, MonthPeriod, MonthlyCityAggregate,
    MonthlyIndexRecord, RawIndices, TemporalFields, Weather,
};
use rayon::prelude::*;
use std::collections::HashMap;

pub const HYDRO_PRCP_WEIGHT: f64 = 2.0;
pub const HYDRO_SNOW_WEIGHT: f64 = 1.5;
pub const HYDRO_SNWD_WEIGHT: f64 = 0.5;

/// Warm, dry days score high
pub fn solar_raw(weather: &Weather) -> f64 {
    weather.tavg - weather.prcp / 10.0
}

pub fn wind_raw(weather: &Weather) -> f64 {
    (weather.awnd + weather.wsf2) / 2.0
}

/// Hydro potential depends on what a month accumulates, not on a single day
pub fn hydro_raw(aggregate: &MonthlyCityAggregate) -> f64 {
    HYDRO_PRCP_WEIGHT * aggregate.prcp_sum
        + HYDRO_SNOW_WEIGHT * aggregate.snow_sum
        + HYDRO_SNWD_WEIGHT * aggregate.snwd_mean
}

/// Raw (un-normalized) index tables at daily and monthly granularity
#[derive(Debug, Clone)]
pub struct RawIndexTables {
    pub daily: Vec<DailyIndexRecord>,
    pub monthly: Vec<MonthlyIndexRecord>,
}

pub struct IndexCalculator {
    accumulator: MonthlyAccumulator,
}

impl IndexCalculator {
    pub fn new() -> Self {
        Self {
            accumulator: MonthlyAccumulator::new(MonthGrouping::YearMonth),
        }
    }

    /// Compute raw indices. Each daily record carries the hydro value of its own
    /// (city, year-month) accumulation.
    pub fn calculate(&self, records: Vec<CityDateRecord>) -> RawIndexTables {
        let monthly: Vec<MonthlyIndexRecord> = self
            .accumulator
            .accumulate(&records)
            .into_iter()
            .map(|aggregate| MonthlyIndexRecord {
                hydro_raw: hydro_raw(&aggregate),
                aggregate,
            })
            .collect();

        let hydro_by_month: HashMap<(CityKey, MonthPeriod), f64> = monthly
            .iter()
            .map(|m| ((m.aggregate.city.clone(), m.aggregate.period), m.hydro_raw))
            .collect();

        let daily: Vec<DailyIndexRecord> = records
            .into_par_iter()
            .map(|record| {
                let period = self.accumulator.period_of(&record);
                // every record contributed to exactly one aggregate above
                let hydro = hydro_by_month
                    .get(&(record.city.clone(), period))
                    .copied()
                    .unwrap_or(0.0);
                let raw = RawIndices {
                    solar: solar_raw(&record.weather),
                    wind: wind_raw(&record.weather),
                    hydro,
                };
                DailyIndexRecord {
                    temporal: TemporalFields::from_date(record.date),
                    indices: IndexSet::new(raw),
                    record,
                }
            })
            .collect();

        RawIndexTables { daily, monthly }
    }
}

impl Default for IndexCalculator {
    fn default() -> Self {
        Self::new()
    }
}
