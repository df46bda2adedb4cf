use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use energy_index::{DataLoader, ForecastRequest, IndexPipeline, PipelineConfig};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "energy_index")]
#[command(about = "Compute renewable energy indices from station observations and forecast a city")]
struct Args {
    /// Geocoded long-format observation CSV files
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Pipeline configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    city: String,

    #[arg(long)]
    province: String,

    /// Forecast horizon in days
    #[arg(long, default_value = "30")]
    horizon: u32,

    /// First forecast day (YYYY-MM-DD); defaults to the day after the city's last record
    #[arg(long)]
    start: Option<String>,

    /// Fail when any calendar month in the horizon has no history
    #[arg(long)]
    strict: bool,

    /// Reject input files containing unknown observation codes
    #[arg(long)]
    strict_variables: bool,

    /// Input values are in tenths of their unit
    #[arg(long)]
    tenths: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.tenths_units |= args.tenths;

    let (observations, summary) = DataLoader::new(args.strict_variables).load_many(&args.input);
    if observations.is_empty() {
        anyhow::bail!("No usable observations in {} input files", args.input.len());
    }
    info!("Loaded {} of {} observation rows", summary.loaded, summary.rows);

    let pipeline = IndexPipeline::new(config);
    let output = pipeline.run(&observations);
    let forecaster = pipeline.forecaster(&output);

    let mut request = ForecastRequest::new(&args.city, &args.province, args.horizon);
    if let Some(start) = &args.start {
        request = request.starting(NaiveDate::parse_from_str(start, "%Y-%m-%d")?);
    }
    let forecast = if args.strict {
        forecaster.forecast_strict(&request)?
    } else {
        forecaster.forecast_from(&request)?
    };

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&forecast)?);
        }
        OutputFormat::Csv => {
            println!("Period,Solar,Wind,Hydro,RenewableScore,IsHistorical");
            for p in &forecast.points {
                println!(
                    "{},{:.4},{:.4},{:.4},{:.4},{}",
                    p.period, p.solar, p.wind, p.hydro, p.renewable_score, p.is_historical
                );
            }
        }
        OutputFormat::Summary => {
            println!("Renewable Energy Forecast");
            println!("=========================");
            println!("City: {}", forecast.city);
            println!(
                "Horizon: {} days ({} to {}, {:?})",
                forecast.horizon_days, forecast.start, forecast.end, forecast.granularity
            );
            println!("Historical points: {}", forecast.historical().count());
            println!("Projected points: {}", forecast.projected().count());
            if let Some(avg) = forecast.mean_projected_score() {
                println!("Mean projected Renewable_Score: {:.4}", avg);
            }
            for err in forecast.errors() {
                println!("  {}", err);
            }
        }
    }

    Ok(())
}
