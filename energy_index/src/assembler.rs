use crate::config::PipelineConfig;
use crate::error::DropReason;
use crate::inference::{CorpusMeans, InferenceStats, VariableInferenceEngine};
use crate::models::{CityDateRecord, CityKey, PartialWeather, StationDay, StationObservation, Weather};
use chrono::NaiveDate;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub observations: usize,
    pub station_days: usize,
    pub duplicates_ignored: usize,
    pub non_finite_values: usize,
    pub missing_city: usize,
    pub missing_province: usize,
    pub invalid_coordinates: usize,
    pub city_dates: usize,
}

impl AssemblyReport {
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingCity => self.missing_city += 1,
            DropReason::MissingProvince => self.missing_province += 1,
            DropReason::InvalidCoordinates => self.invalid_coordinates += 1,
        }
    }

    pub fn dropped(&self) -> usize {
        self.missing_city + self.missing_province + self.invalid_coordinates
    }
}

/// Complete city-date vectors plus the bookkeeping of how they were produced
#[derive(Debug, Clone)]
pub struct AssembledCorpus {
    pub records: Vec<CityDateRecord>,
    pub report: AssemblyReport,
    pub inference: InferenceStats,
    pub means: CorpusMeans,
}

/// Station metadata of the first observation seen for a (station, date)
struct PivotEntry {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    city: Option<String>,
    province: Option<String>,
    weather: PartialWeather,
}

pub struct WideRecordAssembler {
    config: PipelineConfig,
}

impl WideRecordAssembler {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Long-to-wide pivot. Keeps the first value of duplicate (station, date, variable)
    /// triples and drops station-days whose location cannot be resolved.
    pub fn pivot(&self, observations: &[StationObservation]) -> (Vec<StationDay>, AssemblyReport) {
        let mut report = AssemblyReport {
            observations: observations.len(),
            ..Default::default()
        };
        let mut entries: BTreeMap<(String, NaiveDate), PivotEntry> = BTreeMap::new();

        for obs in observations {
            if !obs.value.is_finite() {
                report.non_finite_values += 1;
                continue;
            }
            let value = if self.config.tenths_units && obs.variable.reported_in_tenths() {
                obs.value / 10.0
            } else {
                obs.value
            };

            let entry = entries
                .entry((obs.station.clone(), obs.date))
                .or_insert_with(|| PivotEntry {
                    latitude: obs.latitude,
                    longitude: obs.longitude,
                    elevation: obs.elevation,
                    city: obs.city.clone(),
                    province: obs.province.clone(),
                    weather: PartialWeather::default(),
                });

            if !entry.weather.set_if_absent(obs.variable, value) {
                report.duplicates_ignored += 1;
            }
        }

        let mut days = Vec::with_capacity(entries.len());
        for ((station, date), entry) in entries {
            match validate_location(&entry) {
                Ok((city, latitude, longitude)) => days.push(StationDay {
                    station,
                    date,
                    latitude,
                    longitude,
                    elevation: entry.elevation.filter(|e| e.is_finite()),
                    city,
                    weather: entry.weather,
                }),
                Err(reason) => {
                    debug!("Dropping {} on {}: {:?}", station, date, reason);
                    report.record_drop(reason);
                }
            }
        }
        report.station_days = days.len();

        (days, report)
    }

    /// Pivot, infer every missing variable, and collapse stations into one record per
    /// (city, date)
    pub fn assemble(&self, observations: &[StationObservation]) -> AssembledCorpus {
        let (days, mut report) = self.pivot(observations);

        let means = CorpusMeans::from_station_days(&days);
        let engine = VariableInferenceEngine::new(&self.config, means);

        let completed: Vec<(&StationDay, Weather, InferenceStats)> = days
            .par_iter()
            .map(|day| {
                let (weather, stats) = engine.complete(day);
                (day, weather, stats)
            })
            .collect();

        let mut inference = InferenceStats::default();
        let mut by_city_date: BTreeMap<(CityKey, NaiveDate), Vec<(&StationDay, Weather)>> =
            BTreeMap::new();
        for (day, weather, stats) in completed {
            inference += stats;
            by_city_date
                .entry((day.city.clone(), day.date))
                .or_default()
                .push((day, weather));
        }

        let records: Vec<CityDateRecord> = by_city_date
            .into_iter()
            .filter_map(|((city, date), stations)| collapse(city, date, &stations))
            .collect();
        report.city_dates = records.len();

        info!(
            "Assembled {} city-date records from {} station-days ({} dropped, {} duplicate values ignored)",
            report.city_dates,
            report.station_days,
            report.dropped(),
            report.duplicates_ignored
        );

        AssembledCorpus {
            records,
            report,
            inference,
            means,
        }
    }
}

fn validate_location(entry: &PivotEntry) -> Result<(CityKey, f64, f64), DropReason> {
    let non_blank = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let city = non_blank(&entry.city).ok_or(DropReason::MissingCity)?;
    let province = non_blank(&entry.province).ok_or(DropReason::MissingProvince)?;

    match (entry.latitude, entry.longitude) {
        (Some(lat), Some(lon))
            if lat.is_finite()
                && lon.is_finite()
                && (-90.0..=90.0).contains(&lat)
                && (-180.0..=180.0).contains(&lon) =>
        {
            Ok((CityKey { city, province }, lat, lon))
        }
        _ => Err(DropReason::InvalidCoordinates),
    }
}

/// Average the completed station vectors of one city on one date
fn collapse(city: CityKey, date: NaiveDate, stations: &[(&StationDay, Weather)]) -> Option<CityDateRecord> {
    let weathers: Vec<Weather> = stations.iter().map(|(_, w)| *w).collect();
    let weather = Weather::mean(&weathers)?;

    let n = stations.len() as f64;
    let latitude = stations.iter().map(|(d, _)| d.latitude).sum::<f64>() / n;
    let longitude = stations.iter().map(|(d, _)| d.longitude).sum::<f64>() / n;
    let elevations: Vec<f64> = stations.iter().filter_map(|(d, _)| d.elevation).collect();
    let elevation = if elevations.is_empty() {
        0.0
    } else {
        elevations.iter().sum::<f64>() / elevations.len() as f64
    };

    Some(CityDateRecord {
        city,
        date,
        latitude,
        longitude,
        elevation,
        station_count: stations.len(),
        weather,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Variable;

    fn obs(station: &str, day: u32, variable: Variable, value: f64) -> StationObservation {
        StationObservation {
            station: station.to_string(),
            date: NaiveDate::from_ymd_opt(2022, 6, day).unwrap(),
            latitude: Some(53.5),
            longitude: Some(-113.5),
            elevation: Some(670.0),
            name: Some("EDMONTON INTL A".to_string()),
            city: Some("Edmonton".to_string()),
            province: Some("Alberta".to_string()),
            variable,
            value,
        }
    }

    #[test]
    fn test_pivot_keeps_first_duplicate() {
        let assembler = WideRecordAssembler::new(PipelineConfig::default());
        let observations = vec![
            obs("CA003012205", 1, Variable::Prcp, 3.0),
            obs("CA003012205", 1, Variable::Prcp, 7.0),
            obs("CA003012205", 1, Variable::Tavg, 15.0),
        ];
        let (days, report) = assembler.pivot(&observations);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].weather.prcp, Some(3.0));
        assert_eq!(days[0].weather.tavg, Some(15.0));
        assert_eq!(report.duplicates_ignored, 1);
    }

    #[test]
    fn test_unresolved_metadata_is_dropped() {
        let assembler = WideRecordAssembler::new(PipelineConfig::default());
        let mut no_city = obs("A", 1, Variable::Prcp, 1.0);
        no_city.city = Some("  ".to_string());
        let mut no_province = obs("B", 1, Variable::Prcp, 1.0);
        no_province.province = None;
        let mut bad_lat = obs("C", 1, Variable::Prcp, 1.0);
        bad_lat.latitude = Some(123.0);
        let good = obs("D", 1, Variable::Prcp, 1.0);

        let (days, report) = assembler.pivot(&[no_city, no_province, bad_lat, good]);
        assert_eq!(days.len(), 1);
        assert_eq!(report.missing_city, 1);
        assert_eq!(report.missing_province, 1);
        assert_eq!(report.invalid_coordinates, 1);
        assert_eq!(report.dropped(), 3);
    }

    #[test]
    fn test_tenths_conversion() {
        let config = PipelineConfig {
            tenths_units: true,
            ..PipelineConfig::default()
        };
        let assembler = WideRecordAssembler::new(config);
        let (days, _) = assembler.pivot(&[
            obs("A", 1, Variable::Tavg, 125.0),
            obs("A", 1, Variable::Awnd, 3.5),
        ]);
        assert_eq!(days[0].weather.tavg, Some(12.5));
        assert_eq!(days[0].weather.awnd, Some(3.5));
    }

    #[test]
    fn test_stations_collapse_per_city_date() {
        let assembler = WideRecordAssembler::new(PipelineConfig::default());
        let observations = vec![
            obs("A", 1, Variable::Tavg, 10.0),
            obs("A", 1, Variable::Prcp, 2.0),
            obs("B", 1, Variable::Tavg, 14.0),
            obs("B", 1, Variable::Prcp, 4.0),
            obs("A", 2, Variable::Tavg, 11.0),
        ];
        let corpus = assembler.assemble(&observations);

        assert_eq!(corpus.records.len(), 2);
        let first = &corpus.records[0];
        assert_eq!(first.station_count, 2);
        assert_eq!(first.weather.tavg, 12.0);
        assert_eq!(first.weather.prcp, 3.0);
        assert_eq!(corpus.means.tavg_samples, 3);
        assert!(corpus.records.iter().all(|r| r.weather.wsf2 > 0.0));
    }
}
