use crate::models::{StationObservation, Variable};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One row of the geocoded long-format observation file
#[derive(Debug, Deserialize)]
struct ObservationRow {
    station: String,
    date: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    elevation: Option<f64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    city_province: Option<String>,
    observation: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    value: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: usize,
    pub loaded: usize,
    pub unknown_variable: usize,
    pub invalid_value: usize,
    pub invalid_date: usize,
}

impl LoadSummary {
    fn merge(mut self, other: LoadSummary) -> LoadSummary {
        self.rows += other.rows;
        self.loaded += other.loaded;
        self.unknown_variable += other.unknown_variable;
        self.invalid_value += other.invalid_value;
        self.invalid_date += other.invalid_date;
        self
    }
}

pub struct DataLoader {
    strict_variables: bool,
}

impl DataLoader {
    /// With `strict_variables`, an observation outside the known variable set fails the
    /// load instead of being skipped
    pub fn new(strict_variables: bool) -> Self {
        Self { strict_variables }
    }

    pub fn load_observations(&self, path: &Path) -> Result<(Vec<StationObservation>, LoadSummary)> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let (observations, summary) = self
            .read_observations(file)
            .with_context(|| format!("Failed to read observations from {:?}", path))?;

        info!(
            "Loaded {} observations from {:?} ({} rows, {} unknown variables, {} bad values, {} bad dates)",
            summary.loaded,
            path,
            summary.rows,
            summary.unknown_variable,
            summary.invalid_value,
            summary.invalid_date
        );
        Ok((observations, summary))
    }

    pub fn read_observations<R: Read>(&self, reader: R) -> Result<(Vec<StationObservation>, LoadSummary)> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut observations = Vec::new();
        let mut summary = LoadSummary::default();

        for row in csv_reader.deserialize::<ObservationRow>() {
            let row = row?;
            summary.rows += 1;

            let variable = match row.observation.parse::<Variable>() {
                Ok(v) => v,
                Err(e) if self.strict_variables => anyhow::bail!(e),
                Err(_) => {
                    summary.unknown_variable += 1;
                    continue;
                }
            };
            let Some(value) = row.value else {
                summary.invalid_value += 1;
                continue;
            };
            let Some(date) = parse_date(&row.date) else {
                summary.invalid_date += 1;
                continue;
            };

            observations.push(StationObservation {
                station: row.station,
                date,
                latitude: row.latitude,
                longitude: row.longitude,
                elevation: row.elevation,
                name: row.name.filter(|s| !s.is_empty()),
                city: row.city.filter(|s| !s.is_empty()),
                province: row.city_province.filter(|s| !s.is_empty()),
                variable,
                value,
            });
            summary.loaded += 1;
        }

        Ok((observations, summary))
    }

    /// Load several files in parallel. Files that fail to load are logged and skipped.
    pub fn load_many(&self, paths: &[PathBuf]) -> (Vec<StationObservation>, LoadSummary) {
        let loaded: Vec<(Vec<StationObservation>, LoadSummary)> = paths
            .par_iter()
            .filter_map(|path| match self.load_observations(path) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Skipping {:?}: {:#}", path, e);
                    None
                }
            })
            .collect();

        let mut observations = Vec::new();
        let mut summary = LoadSummary::default();
        for (obs, s) in loaded {
            observations.extend(obs);
            summary = summary.merge(s);
        }
        (observations, summary)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, and timestamps whose first ten characters are a date
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
station,date,latitude,longitude,elevation,name,city,city_province,observation,value
CA006158355,2023-01-05,43.67,-79.63,173.4,TORONTO INTL A,Toronto,Ontario,TAVG,-3.2
CA006158355,2023-01-05,43.67,-79.63,173.4,TORONTO INTL A,Toronto,Ontario,PRCP,1.8
CA006158355,20230106,43.67,-79.63,173.4,TORONTO INTL A,Toronto,Ontario,TOBS,2.0
CA006158355,2023-01-07 00:00:00,43.67,-79.63,,TORONTO INTL A,Toronto,Ontario,SNWD,12
CA006158355,not-a-date,43.67,-79.63,173.4,TORONTO INTL A,Toronto,Ontario,SNOW,1
CA006158355,2023-01-08,43.67,-79.63,173.4,TORONTO INTL A,,,PRCP,n/a
";

    #[test]
    fn test_read_sample() {
        let loader = DataLoader::new(false);
        let (observations, summary) = loader.read_observations(SAMPLE.as_bytes()).unwrap();

        assert_eq!(summary.rows, 6);
        assert_eq!(summary.loaded, 3);
        assert_eq!(summary.unknown_variable, 1);
        assert_eq!(summary.invalid_date, 1);
        assert_eq!(summary.invalid_value, 1);

        assert_eq!(observations[0].variable, Variable::Tavg);
        assert_eq!(observations[0].province.as_deref(), Some("Ontario"));
        assert_eq!(observations[2].elevation, None);
        assert_eq!(observations[2].date, NaiveDate::from_ymd_opt(2023, 1, 7).unwrap());
    }

    #[test]
    fn test_strict_rejects_unknown_variable() {
        let loader = DataLoader::new(true);
        assert!(loader.read_observations(SAMPLE.as_bytes()).is_err());
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date("20240229"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("2024-02-29T00:00:00"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("2023-02-29"), None);
    }
}
