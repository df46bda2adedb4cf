use anyhow::{Context, Result};
use energy_index::{city_catalogue, CitySeries, PipelineOutput};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DASHBOARD_FILE: &str = "dashboard_data.json";

/// Monthly series of one city, one array per index, aligned by position
#[derive(Debug, Default, Serialize)]
pub struct CityDashboard {
    pub months: Vec<String>,
    pub solar: Vec<f64>,
    pub wind: Vec<f64>,
    pub hydro: Vec<f64>,
    pub renewable_score: Vec<f64>,
    pub missing_months: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub provinces: BTreeMap<String, Vec<String>>,
    pub series: BTreeMap<String, BTreeMap<String, CityDashboard>>,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl CityDashboard {
    fn from_series(series: &CitySeries) -> Self {
        let mut dashboard = CityDashboard::default();
        for p in &series.points {
            dashboard.months.push(p.period.to_string());
            dashboard.solar.push(round3(p.solar));
            dashboard.wind.push(round3(p.wind));
            dashboard.hydro.push(round3(p.hydro));
            dashboard.renewable_score.push(round3(p.renewable_score));
        }
        dashboard.missing_months = series.missing_periods().iter().map(|p| p.to_string()).collect();
        dashboard
    }
}

pub fn build_dashboard(output: &PipelineOutput) -> DashboardData {
    let mut series: BTreeMap<String, BTreeMap<String, CityDashboard>> = BTreeMap::new();
    for s in output.series.iter().filter(|s| !s.points.is_empty()) {
        series
            .entry(s.city.province.clone())
            .or_default()
            .insert(s.city.city.clone(), CityDashboard::from_series(s));
    }

    DashboardData {
        provinces: city_catalogue(&output.daily),
        series,
    }
}

pub fn export_dashboard(output: &PipelineOutput, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(DASHBOARD_FILE);

    let data = build_dashboard(output);
    let json = serde_json::to_string_pretty(&data)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    let cities: usize = data.series.values().map(|c| c.len()).sum();
    println!("  📈 Dashboard data for {} cities in {} provinces", cities, data.series.len());
    Ok(path)
}
