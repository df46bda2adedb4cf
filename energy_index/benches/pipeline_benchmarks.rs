use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use energy_index::{IndexPipeline, PipelineConfig, StationObservation, Variable};

fn synthetic_observations(cities: usize, days: u64) -> Vec<StationObservation> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut obs = Vec::new();

    for c in 0..cities {
        let latitude = 43.0 + c as f64 * 0.7;
        for (i, date) in start.iter_days().take(days as usize).enumerate() {
            let seasonal = (i as f64 / 365.0 * std::f64::consts::TAU).cos();
            let values = [
                (Variable::Tavg, 4.0 - 14.0 * seasonal),
                (Variable::Prcp, (i % 9) as f64),
                (Variable::Snwd, (30.0 * seasonal).max(0.0)),
            ];
            for (variable, value) in values {
                obs.push(StationObservation {
                    station: format!("CA{:09}", c),
                    date,
                    latitude: Some(latitude),
                    longitude: Some(-80.0 - c as f64),
                    elevation: Some(100.0 + 25.0 * c as f64),
                    name: None,
                    city: Some(format!("City{}", c)),
                    province: Some(format!("Province{}", c % 4)),
                    variable,
                    value,
                });
            }
        }
    }
    obs
}

fn benchmark_pipeline(c: &mut Criterion) {
    let observations = synthetic_observations(20, 730);
    let pipeline = IndexPipeline::new(PipelineConfig::default());

    c.bench_function("pipeline_20_cities_2_years", |b| {
        b.iter(|| black_box(pipeline.run(black_box(&observations))));
    });
}

fn benchmark_forecast(c: &mut Criterion) {
    let observations = synthetic_observations(20, 730);
    let pipeline = IndexPipeline::new(PipelineConfig::default());
    let output = pipeline.run(&observations);
    let forecaster = pipeline.forecaster(&output);

    c.bench_function("forecast_all_365_days", |b| {
        b.iter(|| black_box(forecaster.forecast_all(black_box(365))));
    });
}

criterion_group!(benches, benchmark_pipeline, benchmark_forecast);
criterion_main!(benches);
