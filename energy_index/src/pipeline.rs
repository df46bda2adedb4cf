use crate::assembler::{AssemblyReport, WideRecordAssembler};
use crate::calculator::IndexCalculator;
use crate::config::PipelineConfig;
use crate::forecaster::SeasonalForecaster;
use crate::gap_filter::{CitySeries, GapFilter, GapReport};
use crate::inference::{CorpusMeans, InferenceStats};
use crate::models::{DailyIndexRecord, MonthlyIndexPoint, StationObservation};
use crate::normalizer::{NormalizationBounds, PercentileNormalizer};
use log::info;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub assembly: AssemblyReport,
    pub inference: InferenceStats,
    pub means: CorpusMeans,
    pub gaps: GapReport,
}

/// Everything a run produces: normalized daily and monthly tables, the gap-filtered
/// historical series, and the bounds they were normalized with
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub daily: Vec<DailyIndexRecord>,
    pub monthly: Vec<MonthlyIndexPoint>,
    pub series: Vec<CitySeries>,
    pub bounds: NormalizationBounds,
    pub report: PipelineReport,
}

pub struct IndexPipeline {
    config: PipelineConfig,
}

impl IndexPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, observations: &[StationObservation]) -> PipelineOutput {
        let start = Instant::now();

        let corpus = WideRecordAssembler::new(self.config.clone()).assemble(observations);
        let tables = IndexCalculator::new().calculate(corpus.records);

        let normalizer = PercentileNormalizer::new(&self.config);
        let bounds = normalizer.fit(&tables.daily);
        let mut daily = tables.daily;
        let written = normalizer.apply(&bounds, &mut daily);
        let monthly = normalizer.normalize_monthly(&bounds, &tables.monthly, &daily);

        let (series, gaps) = GapFilter::new(&self.config).filter(&monthly);

        info!(
            "Pipeline finished in {:.2?}: {} daily records ({} normalized), {} monthly points, {}/{} months valid across {} cities",
            start.elapsed(),
            daily.len(),
            written,
            monthly.len(),
            gaps.accepted,
            gaps.evaluated,
            series.len()
        );

        PipelineOutput {
            daily,
            monthly,
            series,
            bounds,
            report: PipelineReport {
                assembly: corpus.report,
                inference: corpus.inference,
                means: corpus.means,
                gaps,
            },
        }
    }

    pub fn forecaster(&self, output: &PipelineOutput) -> SeasonalForecaster {
        SeasonalForecaster::new(&self.config, &output.series, &output.daily)
    }
}
