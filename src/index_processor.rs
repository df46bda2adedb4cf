use anyhow::{Context, Result};
use energy_index::{
    CityDateRecord, DataLoader, IndexPipeline, MonthGrouping, MonthlyAccumulator, PipelineConfig,
    PipelineOutput, StationObservation,
};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DAILY_TABLE: &str = "daily_renewable_indices";
pub const MONTHLY_TABLE: &str = "monthly_renewable_indices";
pub const CLIMATOLOGY_TABLE: &str = "monthly_climatology";

pub struct IndexProcessor {
    input_dir: PathBuf,
    output_dir: PathBuf,
    config: PipelineConfig,
    strict_variables: bool,
}

impl IndexProcessor {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf, config: PipelineConfig) -> Self {
        Self {
            input_dir,
            output_dir,
            config,
            strict_variables: false,
        }
    }

    /// Skip whole files that contain unknown observation codes
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every observation CSV below the input directory
    pub fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.input_dir.join("**").join("*.csv");
        let pattern = pattern
            .to_str()
            .with_context(|| format!("Input path is not valid UTF-8: {:?}", self.input_dir))?;

        let mut files: Vec<PathBuf> = glob(pattern)?.filter_map(Result::ok).collect();
        files.sort();
        Ok(files)
    }

    fn load_observations(&self, files: &[PathBuf]) -> Result<Vec<StationObservation>> {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?,
        );

        let loader = DataLoader::new(self.strict_variables);
        let batches: Vec<Vec<StationObservation>> = files
            .par_iter()
            .filter_map(|file| {
                pb.inc(1);
                match loader.load_observations(file) {
                    Ok((observations, _)) => Some(observations),
                    Err(e) => {
                        warn!("Skipping {}: {:#}", file.display(), e);
                        None
                    }
                }
            })
            .collect();
        pb.finish_with_message("Observations loaded");

        Ok(batches.into_iter().flatten().collect())
    }

    /// Load every input file and run the full index pipeline over the combined corpus
    pub fn run_pipeline(&self) -> Result<(IndexPipeline, PipelineOutput)> {
        println!("🌦️  Renewable Energy Index Processor");
        println!("Using {} CPU cores", rayon::current_num_threads());
        println!("{}", "=".repeat(60));

        let files = self.discover_inputs()?;
        if files.is_empty() {
            anyhow::bail!("No observation CSV files found under {}", self.input_dir.display());
        }
        println!("📁 Found {} observation files", files.len());

        let observations = self.load_observations(&files)?;
        if observations.is_empty() {
            anyhow::bail!("Input files under {} carry no usable observations", self.input_dir.display());
        }
        println!("📊 Loaded {} observations", observations.len());

        let start = Instant::now();
        let pipeline = IndexPipeline::new(self.config.clone());
        let output = pipeline.run(&observations);

        let assembly = &output.report.assembly;
        println!("  🧩 {} station-days, {} city-dates", assembly.station_days, assembly.city_dates);
        println!(
            "  🚫 Dropped {} station-days ({} no city, {} no province, {} bad coordinates)",
            assembly.dropped(),
            assembly.missing_city,
            assembly.missing_province,
            assembly.invalid_coordinates
        );
        let inference = &output.report.inference;
        println!(
            "  🔧 {} values derived, {} fallbacks, {} clamped",
            inference.derived, inference.fallbacks, inference.clamped
        );
        let gaps = &output.report.gaps;
        println!(
            "  📅 {}/{} city-months valid ({} sparse, {} incomplete)",
            gaps.accepted, gaps.evaluated, gaps.insufficient_samples, gaps.missing_index
        );
        println!("  ⏱️  Pipeline completed in {:?}", start.elapsed());

        Ok((pipeline, output))
    }

    pub fn write_index_tables(&self, output: &PipelineOutput) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let mut daily = daily_frame(output)?;
        write_table(&self.output_dir, DAILY_TABLE, &mut daily)?;
        println!("  💾 Saved {} daily rows to {}", daily.height(), DAILY_TABLE);

        let mut monthly = monthly_frame(output)?;
        write_table(&self.output_dir, MONTHLY_TABLE, &mut monthly)?;
        println!("  💾 Saved {} monthly rows to {}", monthly.height(), MONTHLY_TABLE);

        let mut climatology = climatology_frame(output)?;
        write_table(&self.output_dir, CLIMATOLOGY_TABLE, &mut climatology)?;
        println!("  💾 Saved {} calendar-month rows to {}", climatology.height(), CLIMATOLOGY_TABLE);

        Ok(())
    }
}

/// Write a table as both CSV and Parquet under `dir`
pub fn write_table(dir: &Path, name: &str, df: &mut DataFrame) -> Result<()> {
    let csv_path = dir.join(format!("{}.csv", name));
    CsvWriter::new(fs::File::create(&csv_path)?).finish(df)?;

    let parquet_path = dir.join(format!("{}.parquet", name));
    ParquetWriter::new(fs::File::create(&parquet_path)?).finish(df)?;
    Ok(())
}

fn daily_frame(output: &PipelineOutput) -> Result<DataFrame> {
    let n = output.daily.len();
    let mut cities = Vec::with_capacity(n);
    let mut provinces = Vec::with_capacity(n);
    let mut dates = Vec::with_capacity(n);
    let mut years = Vec::with_capacity(n);
    let mut months = Vec::with_capacity(n);
    let mut days_of_year = Vec::with_capacity(n);
    let mut seasons = Vec::with_capacity(n);
    let mut latitudes = Vec::with_capacity(n);
    let mut longitudes = Vec::with_capacity(n);
    let mut elevations = Vec::with_capacity(n);
    let mut station_counts = Vec::with_capacity(n);
    let mut prcp = Vec::with_capacity(n);
    let mut tavg = Vec::with_capacity(n);
    let mut tmax = Vec::with_capacity(n);
    let mut tmin = Vec::with_capacity(n);
    let mut snow = Vec::with_capacity(n);
    let mut snwd = Vec::with_capacity(n);
    let mut awnd = Vec::with_capacity(n);
    let mut wsf2 = Vec::with_capacity(n);
    let mut solar_raw = Vec::with_capacity(n);
    let mut wind_raw = Vec::with_capacity(n);
    let mut hydro_raw = Vec::with_capacity(n);
    let mut solar = Vec::with_capacity(n);
    let mut wind = Vec::with_capacity(n);
    let mut hydro = Vec::with_capacity(n);
    let mut scores = Vec::with_capacity(n);

    for d in &output.daily {
        let r = &d.record;
        cities.push(r.city.city.clone());
        provinces.push(r.city.province.clone());
        dates.push(r.date.format("%Y-%m-%d").to_string());
        years.push(d.temporal.year);
        months.push(d.temporal.month);
        days_of_year.push(d.temporal.day_of_year);
        seasons.push(d.temporal.season.as_str());
        latitudes.push(r.latitude);
        longitudes.push(r.longitude);
        elevations.push(r.elevation);
        station_counts.push(r.station_count as u32);
        prcp.push(r.weather.prcp);
        tavg.push(r.weather.tavg);
        tmax.push(r.weather.tmax);
        tmin.push(r.weather.tmin);
        snow.push(r.weather.snow);
        snwd.push(r.weather.snwd);
        awnd.push(r.weather.awnd);
        wsf2.push(r.weather.wsf2);
        solar_raw.push(d.indices.raw.solar);
        wind_raw.push(d.indices.raw.wind);
        hydro_raw.push(d.indices.raw.hydro);
        let normalized = d.indices.normalized();
        solar.push(normalized.map(|n| n.solar));
        wind.push(normalized.map(|n| n.wind));
        hydro.push(normalized.map(|n| n.hydro));
        scores.push(normalized.map(|n| n.renewable_score));
    }

    let df = DataFrame::new(vec![
        Series::new("City", cities),
        Series::new("Province", provinces),
        Series::new("Date", dates),
        Series::new("Year", years),
        Series::new("Month", months),
        Series::new("Day_of_Year", days_of_year),
        Series::new("Season", seasons),
        Series::new("Latitude", latitudes),
        Series::new("Longitude", longitudes),
        Series::new("Elevation", elevations),
        Series::new("Station_Count", station_counts),
        Series::new("PRCP", prcp),
        Series::new("TAVG", tavg),
        Series::new("TMAX", tmax),
        Series::new("TMIN", tmin),
        Series::new("SNOW", snow),
        Series::new("SNWD", snwd),
        Series::new("AWND", awnd),
        Series::new("WSF2", wsf2),
        Series::new("Solar_Raw", solar_raw),
        Series::new("Wind_Raw", wind_raw),
        Series::new("Hydro_Raw", hydro_raw),
        Series::new("Solar", solar),
        Series::new("Wind", wind),
        Series::new("Hydro", hydro),
        Series::new("Renewable_Score", scores),
    ])?;
    Ok(df)
}

fn monthly_frame(output: &PipelineOutput) -> Result<DataFrame> {
    let n = output.monthly.len();
    let mut cities = Vec::with_capacity(n);
    let mut provinces = Vec::with_capacity(n);
    let mut periods = Vec::with_capacity(n);
    let mut prcp_sums = Vec::with_capacity(n);
    let mut snow_sums = Vec::with_capacity(n);
    let mut snwd_means = Vec::with_capacity(n);
    let mut counts = Vec::with_capacity(n);
    let mut hydro_raw = Vec::with_capacity(n);
    let mut solar = Vec::with_capacity(n);
    let mut wind = Vec::with_capacity(n);
    let mut hydro = Vec::with_capacity(n);
    let mut scores = Vec::with_capacity(n);

    for m in &output.monthly {
        let agg = &m.aggregate;
        cities.push(agg.city.city.clone());
        provinces.push(agg.city.province.clone());
        periods.push(agg.period.to_string());
        prcp_sums.push(agg.prcp_sum);
        snow_sums.push(agg.snow_sum);
        snwd_means.push(agg.snwd_mean);
        counts.push(agg.count as u32);
        hydro_raw.push(m.hydro_raw);
        solar.push(m.solar);
        wind.push(m.wind);
        hydro.push(m.hydro);
        scores.push(m.renewable_score);
    }

    let df = DataFrame::new(vec![
        Series::new("City", cities),
        Series::new("Province", provinces),
        Series::new("Month", periods),
        Series::new("PRCP_Sum", prcp_sums),
        Series::new("SNOW_Sum", snow_sums),
        Series::new("SNWD_Mean", snwd_means),
        Series::new("Count", counts),
        Series::new("Hydro_Raw", hydro_raw),
        Series::new("Solar", solar),
        Series::new("Wind", wind),
        Series::new("Hydro", hydro),
        Series::new("Renewable_Score", scores),
    ])?;
    Ok(df)
}

/// Precipitation and snow per (city, calendar month), pooled over every year of the corpus
fn climatology_frame(output: &PipelineOutput) -> Result<DataFrame> {
    let records: Vec<CityDateRecord> = output.daily.iter().map(|d| d.record.clone()).collect();
    let aggregates = MonthlyAccumulator::new(MonthGrouping::CalendarMonth).accumulate(&records);

    let df = DataFrame::new(vec![
        Series::new("City", aggregates.iter().map(|a| a.city.city.clone()).collect::<Vec<_>>()),
        Series::new("Province", aggregates.iter().map(|a| a.city.province.clone()).collect::<Vec<_>>()),
        Series::new("Month", aggregates.iter().map(|a| a.period.month).collect::<Vec<_>>()),
        Series::new("PRCP_Sum", aggregates.iter().map(|a| a.prcp_sum).collect::<Vec<_>>()),
        Series::new("SNOW_Sum", aggregates.iter().map(|a| a.snow_sum).collect::<Vec<_>>()),
        Series::new("SNWD_Mean", aggregates.iter().map(|a| a.snwd_mean).collect::<Vec<_>>()),
        Series::new("Days", aggregates.iter().map(|a| a.count as u32).collect::<Vec<_>>()),
    ])?;
    Ok(df)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Two years of daily observations for two cities, without any February for the second
    pub(crate) fn write_sample_inputs(dir: &Path) {
        let mut file = fs::File::create(dir.join("observations.csv")).unwrap();
        writeln!(
            file,
            "station,date,latitude,longitude,elevation,name,city,city_province,observation,value"
        )
        .unwrap();

        let start = chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        for (station, city, province, lat, skip_feb) in [
            ("CA003012205", "Edmonton", "Alberta", 53.3, false),
            ("CA001108395", "Vancouver", "British Columbia", 49.2, true),
        ] {
            for (i, date) in start.iter_days().take(730).enumerate() {
                if skip_feb && chrono::Datelike::month(&date) == 2 {
                    continue;
                }
                let seasonal = (i as f64 / 365.0 * std::f64::consts::TAU).cos();
                for (variable, value) in [
                    ("TAVG", 6.0 - 12.0 * seasonal),
                    ("PRCP", (i % 8) as f64),
                    ("SNWD", (20.0 * seasonal).max(0.0)),
                    ("AWND", 2.0 + (i % 4) as f64),
                ] {
                    writeln!(
                        file,
                        "{},{},{},-115.0,200.0,{} A,{},{},{},{}",
                        station, date, lat, city, city, province, variable, value
                    )
                    .unwrap();
                }
            }
        }
    }

    #[test]
    fn test_process_writes_tables() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_inputs(input.path());

        let processor = IndexProcessor::new(
            input.path().to_path_buf(),
            output.path().to_path_buf(),
            PipelineConfig::default(),
        );
        assert_eq!(processor.discover_inputs().unwrap().len(), 1);

        let (_, result) = processor.run_pipeline().unwrap();
        processor.write_index_tables(&result).unwrap();

        for name in [DAILY_TABLE, MONTHLY_TABLE, CLIMATOLOGY_TABLE] {
            assert!(output.path().join(format!("{}.csv", name)).exists());
            assert!(output.path().join(format!("{}.parquet", name)).exists());
        }

        let daily_path = output.path().join(format!("{}.parquet", DAILY_TABLE));
        let daily = LazyFrame::scan_parquet(daily_path, Default::default())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(daily.height(), 730 + 730 - 56);

        let climatology_path = output.path().join(format!("{}.parquet", CLIMATOLOGY_TABLE));
        let climatology = LazyFrame::scan_parquet(climatology_path, Default::default())
            .unwrap()
            .collect()
            .unwrap();
        // twelve calendar months for Edmonton, eleven for Vancouver
        assert_eq!(climatology.height(), 23);
        let january = climatology
            .clone()
            .lazy()
            .filter(col("City").eq(lit("Edmonton")).and(col("Month").eq(lit(1u32))))
            .collect()
            .unwrap();
        assert_eq!(january.column("Days").unwrap().u32().unwrap().get(0), Some(62));
    }

    #[test]
    fn test_strict_variables_skips_files_with_unknown_codes() {
        let input = tempfile::tempdir().unwrap();
        write_sample_inputs(input.path());
        let mut file = fs::File::create(input.path().join("calgary.csv")).unwrap();
        writeln!(
            file,
            "station,date,latitude,longitude,elevation,name,city,city_province,observation,value"
        )
        .unwrap();
        writeln!(file, "CA003031093,2022-03-01,51.1,-114.0,1084.1,CALGARY,Calgary,Alberta,TAVG,-2.0").unwrap();
        writeln!(file, "CA003031093,2022-03-01,51.1,-114.0,1084.1,CALGARY,Calgary,Alberta,TOBS,-4.0").unwrap();

        let has_calgary = |strict: bool| {
            let processor = IndexProcessor::new(
                input.path().to_path_buf(),
                input.path().join("out"),
                PipelineConfig::default(),
            )
            .with_strict_variables(strict);
            let (_, result) = processor.run_pipeline().unwrap();
            result.daily.iter().any(|d| d.record.city.city == "Calgary")
        };

        assert!(has_calgary(false));
        assert!(!has_calgary(true));
    }

    #[test]
    fn test_empty_input_dir_is_an_error() {
        let input = tempfile::tempdir().unwrap();
        let processor = IndexProcessor::new(
            input.path().to_path_buf(),
            input.path().join("out"),
            PipelineConfig::default(),
        );
        assert!(processor.run_pipeline().is_err());
    }
}
