use anyhow::Result;
use energy_index::PipelineConfig;
use glob::glob;
use polars::prelude::*;
use std::path::{Path, PathBuf};

mod dashboard_export;
mod forecast_processor;
mod index_processor;

use forecast_processor::ForecastProcessor;
use index_processor::IndexProcessor;

const DEFAULT_INPUT_DIR: &str = "data/observations";
const DEFAULT_OUTPUT_DIR: &str = "renewable_output";

/// Columns that together identify a row in any table this tool writes
const KEY_COLUMNS: [&str; 7] = ["City", "Province", "Date", "Month", "Horizon_Days", "Period", "Rank"];

fn check_unit_range(df: &DataFrame, column: &str) -> Result<usize> {
    let values = df.column(column)?.f64()?;
    Ok(values
        .into_iter()
        .flatten()
        .filter(|v| !(0.0..=1.0).contains(v))
        .count())
}

fn check_score_identity(df: &DataFrame) -> Result<usize> {
    let solar = df.column("Solar")?.f64()?;
    let wind = df.column("Wind")?.f64()?;
    let hydro = df.column("Hydro")?.f64()?;
    let score = df.column("Renewable_Score")?.f64()?;

    let mut mismatches = 0;
    for (((s, w), h), r) in solar.into_iter().zip(wind).zip(hydro).zip(score) {
        if let (Some(s), Some(w), Some(h), Some(r)) = (s, w, h, r) {
            if ((s + w + h) / 3.0 - r).abs() > 1e-9 {
                mismatches += 1;
            }
        }
    }
    Ok(mismatches)
}

/// Re-read every written table and check index ranges, the Renewable_Score identity and
/// duplicate keys. Returns the number of issues found.
fn verify_results(dir: &Path) -> Result<usize> {
    println!("\n🔍 Result Verification");
    println!("{}", "=".repeat(60));

    let pattern = dir.join("*.parquet");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Output path is not valid UTF-8: {:?}", dir))?;
    let mut files: Vec<PathBuf> = glob(pattern)?.filter_map(Result::ok).collect();
    files.sort();

    let mut total_issues = 0;
    for file in files {
        println!("\n  Verifying: {}", file.display());
        let df = LazyFrame::scan_parquet(&file, Default::default())?.collect()?;
        let columns = df.get_column_names();

        for index in ["Solar", "Wind", "Hydro", "Renewable_Score"] {
            if !columns.contains(&index) {
                continue;
            }
            let out_of_range = check_unit_range(&df, index)?;
            if out_of_range > 0 {
                println!("    ❌ {} values of {} outside [0, 1]", out_of_range, index);
                total_issues += out_of_range;
            }
        }

        if ["Solar", "Wind", "Hydro", "Renewable_Score"]
            .iter()
            .all(|c| columns.contains(c))
        {
            let mismatches = check_score_identity(&df)?;
            if mismatches > 0 {
                println!(
                    "    ❌ {} rows where Renewable_Score is not the mean of its components",
                    mismatches
                );
                total_issues += mismatches;
            } else {
                println!("    ✅ Renewable_Score identity holds");
            }
        }

        let keys: Vec<Expr> = KEY_COLUMNS
            .iter()
            .filter(|k| columns.contains(k))
            .map(|k| col(k))
            .collect();
        if !keys.is_empty() {
            let duplicates = df
                .clone()
                .lazy()
                .group_by(keys)
                .agg([count().alias("count")])
                .filter(col("count").gt(1))
                .collect()?;

            if duplicates.height() > 0 {
                println!("    ❌ Found {} duplicate keys", duplicates.height());
                total_issues += duplicates.height();
            } else {
                println!("    ✅ No duplicates found");
            }
        }

        println!("    📊 Total records: {}", df.height());
    }

    println!("\n{}", "=".repeat(60));
    if total_issues == 0 {
        println!("✅ Result verification passed! No issues found.");
    } else {
        println!("⚠️  Result verification found {} issues", total_issues);
    }
    Ok(total_issues)
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<()> {
    env_logger::init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()?;

    let args: Vec<String> = std::env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("--all");

    let input_dir = arg_value(&args, "--input").unwrap_or_else(|| DEFAULT_INPUT_DIR.to_string());
    let output_dir = arg_value(&args, "--output").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
    let (input_dir, output_dir) = (PathBuf::from(input_dir), PathBuf::from(output_dir));
    let config = match arg_value(&args, "--config") {
        Some(path) => PipelineConfig::load(Path::new(&path))?,
        None => PipelineConfig::default(),
    };

    if mode == "--verify-results" {
        verify_results(&output_dir)?;
        return Ok(());
    }

    let modes = [
        "--process",
        "--forecast",
        "--rank",
        "--export-dashboard",
        "--all",
    ];
    if !modes.contains(&mode) {
        println!(
            "Usage: renewable_processor <mode> [--input <dir>] [--output <dir>] [--config <file>] \
             [--strict-variables]"
        );
        println!("Modes: --process, --forecast, --rank, --export-dashboard, --verify-results, --all");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let strict_variables = args.iter().any(|a| a == "--strict-variables");
    let processor =
        IndexProcessor::new(input_dir, output_dir, config).with_strict_variables(strict_variables);
    let (pipeline, output) = processor.run_pipeline()?;
    let all = mode == "--all";

    if all || mode == "--process" {
        processor.write_index_tables(&output)?;
    }

    if all || mode == "--forecast" || mode == "--rank" {
        let forecaster = pipeline.forecaster(&output);
        let forecasts = ForecastProcessor::new(&forecaster, processor.config(), processor.output_dir());
        let results = forecasts.forecast_all();
        if all || mode == "--forecast" {
            forecasts.write_forecasts(&results)?;
        }
        if all || mode == "--rank" {
            let rankings = forecasts.rank(&results);
            forecasts.write_rankings(&rankings)?;
        }
    }

    if all || mode == "--export-dashboard" {
        dashboard_export::export_dashboard(&output, processor.output_dir())?;
    }

    if all {
        verify_results(processor.output_dir())?;
    }

    println!("\n✅ Processing complete in {:?}!", start.elapsed());
    Ok(())
}
