use crate::index_processor::write_table;
use anyhow::Result;
use energy_index::{rank_top_cities, CityRanking, Forecast, PipelineConfig, SeasonalForecaster};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub const FORECAST_TABLE: &str = "renewable_forecasts";
pub const GAP_TABLE: &str = "forecast_gaps";
pub const RANKING_TABLE: &str = "top_cities_by_province";

pub struct ForecastProcessor<'a> {
    forecaster: &'a SeasonalForecaster,
    horizons: Vec<u32>,
    top_n: usize,
    output_dir: PathBuf,
}

impl<'a> ForecastProcessor<'a> {
    pub fn new(forecaster: &'a SeasonalForecaster, config: &PipelineConfig, output_dir: &Path) -> Self {
        Self {
            forecaster,
            horizons: config.forecast_horizons.clone(),
            top_n: config.top_cities_per_province,
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Forecast every city at every configured horizon
    pub fn forecast_all(&self) -> Vec<Forecast> {
        let mut forecasts = Vec::new();
        for &horizon in &self.horizons {
            let batch = self.forecaster.forecast_all(horizon);
            let incomplete = batch.iter().filter(|f| !f.is_complete()).count();
            println!(
                "  🔮 {}-day horizon: {} cities forecast, {} with unavailable months",
                horizon,
                batch.len(),
                incomplete
            );
            forecasts.extend(batch);
        }
        forecasts
    }

    pub fn write_forecasts(&self, forecasts: &[Forecast]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let mut cities = Vec::new();
        let mut provinces = Vec::new();
        let mut horizons = Vec::new();
        let mut granularities = Vec::new();
        let mut periods = Vec::new();
        let mut solar = Vec::new();
        let mut wind = Vec::new();
        let mut hydro = Vec::new();
        let mut scores = Vec::new();
        let mut historical = Vec::new();

        let mut gap_cities = Vec::new();
        let mut gap_provinces = Vec::new();
        let mut gap_horizons = Vec::new();
        let mut gap_periods = Vec::new();
        let mut gap_months = Vec::new();

        for f in forecasts {
            let granularity = format!("{:?}", f.granularity).to_lowercase();
            for p in &f.points {
                cities.push(f.city.city.clone());
                provinces.push(f.city.province.clone());
                horizons.push(f.horizon_days);
                granularities.push(granularity.clone());
                periods.push(p.period.format("%Y-%m-%d").to_string());
                solar.push(p.solar);
                wind.push(p.wind);
                hydro.push(p.hydro);
                scores.push(p.renewable_score);
                historical.push(p.is_historical);
            }
            for g in &f.gaps {
                gap_cities.push(f.city.city.clone());
                gap_provinces.push(f.city.province.clone());
                gap_horizons.push(f.horizon_days);
                gap_periods.push(g.period.format("%Y-%m-%d").to_string());
                gap_months.push(g.month);
            }
        }

        let mut df = DataFrame::new(vec![
            Series::new("City", cities),
            Series::new("Province", provinces),
            Series::new("Horizon_Days", horizons),
            Series::new("Granularity", granularities),
            Series::new("Period", periods),
            Series::new("Solar", solar),
            Series::new("Wind", wind),
            Series::new("Hydro", hydro),
            Series::new("Renewable_Score", scores),
            Series::new("Is_Historical", historical),
        ])?;
        write_table(&self.output_dir, FORECAST_TABLE, &mut df)?;

        let mut gaps = DataFrame::new(vec![
            Series::new("City", gap_cities),
            Series::new("Province", gap_provinces),
            Series::new("Horizon_Days", gap_horizons),
            Series::new("Period", gap_periods),
            Series::new("Missing_Month", gap_months),
        ])?;
        write_table(&self.output_dir, GAP_TABLE, &mut gaps)?;

        println!(
            "  💾 Saved {} forecast points and {} unavailable periods",
            df.height(),
            gaps.height()
        );
        Ok(())
    }

    pub fn rank(&self, forecasts: &[Forecast]) -> Vec<CityRanking> {
        rank_top_cities(forecasts, self.top_n)
    }

    pub fn write_rankings(&self, rankings: &[CityRanking]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let mut df = DataFrame::new(vec![
            Series::new("Province", rankings.iter().map(|r| r.province.clone()).collect::<Vec<_>>()),
            Series::new("City", rankings.iter().map(|r| r.city.clone()).collect::<Vec<_>>()),
            Series::new("Horizon_Days", rankings.iter().map(|r| r.horizon_days).collect::<Vec<_>>()),
            Series::new("Rank", rankings.iter().map(|r| r.rank as u32).collect::<Vec<_>>()),
            Series::new("Avg_Forecast", rankings.iter().map(|r| r.avg_forecast).collect::<Vec<_>>()),
            Series::new(
                "Projected_Points",
                rankings.iter().map(|r| r.projected_points as u32).collect::<Vec<_>>(),
            ),
        ])?;
        write_table(&self.output_dir, RANKING_TABLE, &mut df)?;

        println!("\n🏆 Top cities by province:");
        for r in rankings {
            println!(
                "  {} ({}-day) #{} {} {:.3}",
                r.province, r.horizon_days, r.rank, r.city, r.avg_forecast
            );
        }
        Ok(())
    }
}
