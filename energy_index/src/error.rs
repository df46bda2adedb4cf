use crate::models::CityKey;
use thiserror::Error;

/// Failures a forecast caller has to handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    #[error("No historical data for {0}")]
    UnknownCity(CityKey),

    #[error("Forecast horizon must be at least one day")]
    EmptyHorizon,

    #[error("Forecast unavailable for {city}: no valid historical month {month:02} to build a pattern from")]
    NoHistoricalPattern { city: CityKey, month: u32 },
}

/// Why a station-day was dropped during assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    MissingCity,
    MissingProvince,
    InvalidCoordinates,
}

/// Why a (city, month) was left out of the historical series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    InsufficientSamples,
    MissingIndex,
}
