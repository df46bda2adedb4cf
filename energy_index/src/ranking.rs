use crate::forecaster::Forecast;
use crate::models::DailyIndexRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRanking {
    pub province: String,
    pub city: String,
    pub horizon_days: u32,
    pub rank: usize,
    pub avg_forecast: f64,
    pub projected_points: usize,
}

/// Top `top_n` cities per (province, horizon) by mean projected Renewable_Score.
/// Forecasts without a single projected point are not ranked.
pub fn rank_top_cities(forecasts: &[Forecast], top_n: usize) -> Vec<CityRanking> {
    let mut groups: BTreeMap<(&str, u32), Vec<(&Forecast, f64)>> = BTreeMap::new();
    for forecast in forecasts {
        if let Some(avg) = forecast.mean_projected_score() {
            groups
                .entry((forecast.city.province.as_str(), forecast.horizon_days))
                .or_default()
                .push((forecast, avg));
        }
    }

    let mut rankings = Vec::new();
    for ((province, horizon_days), mut entries) in groups {
        entries.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.city.city.cmp(&b.0.city.city))
        });

        for (i, (forecast, avg)) in entries.into_iter().take(top_n).enumerate() {
            rankings.push(CityRanking {
                province: province.to_string(),
                city: forecast.city.city.clone(),
                horizon_days,
                rank: i + 1,
                avg_forecast: avg,
                projected_points: forecast.projected().count(),
            });
        }
    }

    rankings
}

/// Provinces with their sorted cities
pub fn city_catalogue(daily: &[DailyIndexRecord]) -> BTreeMap<String, Vec<String>> {
    let mut catalogue: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for d in daily {
        catalogue
            .entry(d.record.city.province.clone())
            .or_default()
            .insert(d.record.city.city.clone());
    }
    catalogue
        .into_iter()
        .map(|(province, cities)| (province, cities.into_iter().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecaster::{ForecastPoint, Granularity};
    use crate::models::CityKey;
    use chrono::NaiveDate;

    fn forecast(city: &str, province: &str, horizon_days: u32, scores: &[f64]) -> Forecast {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Forecast {
            city: CityKey::new(city, province),
            horizon_days,
            granularity: Granularity::Daily,
            start,
            end: start,
            points: scores
                .iter()
                .map(|s| ForecastPoint {
                    period: start,
                    solar: *s,
                    wind: *s,
                    hydro: *s,
                    renewable_score: *s,
                    is_historical: false,
                })
                .collect(),
            gaps: Vec::new(),
        }
    }

    #[test]
    fn test_top_three_per_province_and_horizon() {
        let forecasts = vec![
            forecast("Calgary", "Alberta", 30, &[0.7, 0.9]),
            forecast("Edmonton", "Alberta", 30, &[0.6]),
            forecast("Red Deer", "Alberta", 30, &[0.4]),
            forecast("Lethbridge", "Alberta", 30, &[0.95]),
            forecast("Calgary", "Alberta", 365, &[0.2]),
            forecast("Victoria", "British Columbia", 30, &[]),
        ];
        let rankings = rank_top_cities(&forecasts, 3);

        let alberta_30: Vec<&str> = rankings
            .iter()
            .filter(|r| r.province == "Alberta" && r.horizon_days == 30)
            .map(|r| r.city.as_str())
            .collect();
        assert_eq!(alberta_30, vec!["Lethbridge", "Calgary", "Edmonton"]);
        assert!(rankings.iter().any(|r| r.horizon_days == 365 && r.rank == 1));
        assert!(rankings.iter().all(|r| r.province != "British Columbia"));
    }
}
