use crate::models::{CityDateRecord, CityKey, MonthPeriod, MonthlyCityAggregate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthGrouping {
    /// One aggregate per (city, year, month)
    YearMonth,
    /// One aggregate per (city, calendar month) across all years
    CalendarMonth,
}

#[derive(Default)]
struct Accumulation {
    prcp_sum: f64,
    snow_sum: f64,
    snwd_sum: f64,
    count: usize,
}

pub struct MonthlyAccumulator {
    grouping: MonthGrouping,
}

impl MonthlyAccumulator {
    pub fn new(grouping: MonthGrouping) -> Self {
        Self { grouping }
    }

    pub fn period_of(&self, record: &CityDateRecord) -> MonthPeriod {
        match self.grouping {
            MonthGrouping::YearMonth => MonthPeriod::year_month(record.date),
            MonthGrouping::CalendarMonth => MonthPeriod::calendar(record.date),
        }
    }

    /// Emits an aggregate for every group, however few records it holds. Sparse months are
    /// rejected later by the gap filter using `count`.
    pub fn accumulate(&self, records: &[CityDateRecord]) -> Vec<MonthlyCityAggregate> {
        let mut groups: BTreeMap<(CityKey, MonthPeriod), Accumulation> = BTreeMap::new();

        for record in records {
            let acc = groups
                .entry((record.city.clone(), self.period_of(record)))
                .or_default();
            acc.prcp_sum += record.weather.prcp;
            acc.snow_sum += record.weather.snow;
            acc.snwd_sum += record.weather.snwd;
            acc.count += 1;
        }

        groups
            .into_iter()
            .map(|((city, period), acc)| MonthlyCityAggregate {
                city,
                period,
                prcp_sum: acc.prcp_sum,
                snow_sum: acc.snow_sum,
                snwd_mean: acc.snwd_sum / acc.count as f64,
                count: acc.count,
            })
            .collect()
    }
}
