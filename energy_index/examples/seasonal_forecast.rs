use chrono::{Datelike, NaiveDate};
use energy_index::{ForecastRequest, IndexPipeline, PipelineConfig, StationObservation, Variable};

fn main() {
    let mut observations = vec![];

    // One station in Kamloops with two years of daily data, but no record for any October
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    for date in start.iter_days().take_while(|d| *d <= end) {
        if date.month() == 10 {
            continue;
        }
        let seasonal = (f64::from(date.ordinal()) / 365.0 * std::f64::consts::TAU).cos();
        for (variable, value) in [
            (Variable::Tavg, 9.0 - 13.0 * seasonal),   // cold January, warm July
            (Variable::Prcp, f64::from(date.day() % 6)),
            (Variable::Snwd, (25.0 * seasonal).max(0.0)),
        ] {
            observations.push(StationObservation {
                station: "CA001163780".to_string(),
                date,
                latitude: Some(50.70),
                longitude: Some(-120.44),
                elevation: Some(345.3),
                name: Some("KAMLOOPS A".to_string()),
                city: Some("Kamloops".to_string()),
                province: Some("British Columbia".to_string()),
                variable,
                value,
            });
        }
    }

    let pipeline = IndexPipeline::new(PipelineConfig::default());
    let output = pipeline.run(&observations);
    let forecaster = pipeline.forecaster(&output);

    let request = ForecastRequest::new("Kamloops", "British Columbia", 365);
    let forecast = match forecaster.forecast_from(&request) {
        Ok(forecast) => forecast,
        Err(e) => {
            eprintln!("Forecast failed: {}", e);
            return;
        }
    };

    println!("Seasonal Forecast");
    println!("=================");
    println!("City: {}", forecast.city);
    println!("Window: {} to {}", forecast.start, forecast.end);
    println!();
    for point in forecast.projected() {
        println!(
            "  {}  solar {:.3}  wind {:.3}  hydro {:.3}  score {:.3}",
            point.period, point.solar, point.wind, point.hydro, point.renewable_score
        );
    }
    for err in forecast.errors() {
        println!("  {}", err);
    }
}
