use approx::assert_relative_eq;
use chrono::NaiveDate;
use energy_index::models::NormalizedIndices;
use energy_index::{
    CityDateRecord, CityKey, IndexCalculator, PercentileBounds, PipelineConfig, StationObservation,
    Variable, Weather, WideRecordAssembler,
};

fn observation(elevation: f64, latitude: f64, variable: Variable, value: f64) -> StationObservation {
    StationObservation {
        station: "CA004016560".to_string(),
        date: NaiveDate::from_ymd_opt(2023, 5, 2).unwrap(),
        latitude: Some(latitude),
        longitude: Some(-104.7),
        elevation: Some(elevation),
        name: None,
        city: Some("Regina".to_string()),
        province: Some("Saskatchewan".to_string()),
        variable,
        value,
    }
}

#[test]
fn test_wind_estimated_from_elevation_precipitation_and_latitude() {
    let corpus = WideRecordAssembler::new(PipelineConfig::default()).assemble(&[
        observation(200.0, 49.0, Variable::Prcp, 5.0),
        observation(200.0, 49.0, Variable::Tavg, 12.0),
    ]);

    let weather = &corpus.records[0].weather;
    assert_relative_eq!(weather.awnd, 1.124, epsilon = 1e-9);
    assert_relative_eq!(weather.wsf2, 1.686, epsilon = 1e-9);
}

#[test]
fn test_extremes_spread_around_tavg() {
    let corpus = WideRecordAssembler::new(PipelineConfig::default())
        .assemble(&[observation(800.0, 60.0, Variable::Tavg, 10.0)]);

    let weather = &corpus.records[0].weather;
    assert_relative_eq!(weather.tmax, 12.75, epsilon = 1e-9);
    assert_relative_eq!(weather.tmin, 7.25, epsilon = 1e-9);
}

#[test]
fn test_monthly_hydro_and_its_normalization() {
    let records: Vec<CityDateRecord> = (1..=4)
        .map(|day| CityDateRecord {
            city: CityKey::new("Kelowna", "British Columbia"),
            date: NaiveDate::from_ymd_opt(2023, 4, day).unwrap(),
            latitude: 49.9,
            longitude: -119.5,
            elevation: 430.0,
            station_count: 1,
            weather: Weather {
                prcp: 30.0,
                tavg: 8.0,
                tmax: 13.0,
                tmin: 3.0,
                snow: 10.0,
                snwd: 80.0,
                awnd: 3.0,
                wsf2: 4.5,
            },
        })
        .collect();

    let tables = IndexCalculator::new().calculate(records);
    assert_eq!(tables.monthly.len(), 1);
    let hydro_raw = tables.monthly[0].hydro_raw;
    assert_relative_eq!(hydro_raw, 340.0, epsilon = 1e-9);
    assert!(tables.daily.iter().all(|d| d.indices.raw.hydro == hydro_raw));

    let bounds = PercentileBounds::new(50.0, 350.0);
    assert_relative_eq!(bounds.normalize(hydro_raw), 0.9667, epsilon = 1e-4);
}

#[test]
fn test_renewable_score_is_component_mean() {
    let indices = NormalizedIndices::from_components(0.6, 0.3, 0.9667);
    assert_relative_eq!(indices.renewable_score, 0.6222, epsilon = 1e-4);
}
