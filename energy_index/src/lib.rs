pub mod accumulator;
pub mod assembler;
pub mod calculator;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod forecaster;
pub mod gap_filter;
pub mod inference;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod ranking;

pub use accumulator::{MonthGrouping, MonthlyAccumulator};
pub use assembler::{AssembledCorpus, AssemblyReport, WideRecordAssembler};
pub use calculator::{IndexCalculator, RawIndexTables};
pub use config::PipelineConfig;
pub use data_loader::{DataLoader, LoadSummary};
pub use error::{DropReason, ExclusionReason, ForecastError};
pub use forecaster::{Forecast, ForecastPoint, ForecastRequest, Granularity, SeasonalForecaster, SeasonalPattern};
pub use gap_filter::{CitySeries, GapFilter, GapReport, MonthlyPoint};
pub use inference::{CorpusMeans, InferenceStats, VariableInferenceEngine};
pub use models::{CityDateRecord, CityKey, DailyIndexRecord, MonthPeriod, StationObservation, Variable, Weather};
pub use normalizer::{NormalizationBounds, PercentileBounds, PercentileNormalizer};
pub use pipeline::{IndexPipeline, PipelineOutput, PipelineReport};
pub use ranking::{city_catalogue, rank_top_cities, CityRanking};
