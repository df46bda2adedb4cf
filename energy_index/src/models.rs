use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weather variables reported by the station network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    Prcp,
    Tavg,
    Tmax,
    Tmin,
    Snow,
    Snwd,
    Awnd,
    Wsf2,
}

impl Variable {
    pub const ALL: [Variable; 8] = [
        Variable::Prcp,
        Variable::Tavg,
        Variable::Tmax,
        Variable::Tmin,
        Variable::Snow,
        Variable::Snwd,
        Variable::Awnd,
        Variable::Wsf2,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Variable::Prcp => "PRCP",
            Variable::Tavg => "TAVG",
            Variable::Tmax => "TMAX",
            Variable::Tmin => "TMIN",
            Variable::Snow => "SNOW",
            Variable::Snwd => "SNWD",
            Variable::Awnd => "AWND",
            Variable::Wsf2 => "WSF2",
        }
    }

    /// GHCN daily files store these in tenths of the unit
    pub fn reported_in_tenths(&self) -> bool {
        !matches!(self, Variable::Awnd | Variable::Wsf2)
    }
}

impl FromStr for Variable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Variable::ALL
            .iter()
            .copied()
            .find(|v| v.code() == code)
            .ok_or_else(|| format!("unknown observation variable '{}'", s.trim()))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single measurement as delivered by the geocoding step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub station: String,
    pub date: NaiveDate,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub variable: Variable,
    pub value: f64,
}

/// Weather vector with explicit holes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialWeather {
    pub prcp: Option<f64>,
    pub tavg: Option<f64>,
    pub tmax: Option<f64>,
    pub tmin: Option<f64>,
    pub snow: Option<f64>,
    pub snwd: Option<f64>,
    pub awnd: Option<f64>,
    pub wsf2: Option<f64>,
}

impl PartialWeather {
    pub fn get(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::Prcp => self.prcp,
            Variable::Tavg => self.tavg,
            Variable::Tmax => self.tmax,
            Variable::Tmin => self.tmin,
            Variable::Snow => self.snow,
            Variable::Snwd => self.snwd,
            Variable::Awnd => self.awnd,
            Variable::Wsf2 => self.wsf2,
        }
    }

    fn slot(&mut self, variable: Variable) -> &mut Option<f64> {
        match variable {
            Variable::Prcp => &mut self.prcp,
            Variable::Tavg => &mut self.tavg,
            Variable::Tmax => &mut self.tmax,
            Variable::Tmin => &mut self.tmin,
            Variable::Snow => &mut self.snow,
            Variable::Snwd => &mut self.snwd,
            Variable::Awnd => &mut self.awnd,
            Variable::Wsf2 => &mut self.wsf2,
        }
    }

    /// Stores `value` unless the variable already has one. Returns false for duplicates.
    pub fn set_if_absent(&mut self, variable: Variable, value: f64) -> bool {
        let slot = self.slot(variable);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn missing(&self) -> Vec<Variable> {
        Variable::ALL
            .iter()
            .copied()
            .filter(|v| self.get(*v).is_none())
            .collect()
    }
}

/// Fully populated weather vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub prcp: f64,
    pub tavg: f64,
    pub tmax: f64,
    pub tmin: f64,
    pub snow: f64,
    pub snwd: f64,
    pub awnd: f64,
    pub wsf2: f64,
}

impl Weather {
    pub fn get(&self, variable: Variable) -> f64 {
        match variable {
            Variable::Prcp => self.prcp,
            Variable::Tavg => self.tavg,
            Variable::Tmax => self.tmax,
            Variable::Tmin => self.tmin,
            Variable::Snow => self.snow,
            Variable::Snwd => self.snwd,
            Variable::Awnd => self.awnd,
            Variable::Wsf2 => self.wsf2,
        }
    }

    /// Component-wise arithmetic mean. Returns None for an empty slice.
    pub fn mean(values: &[Weather]) -> Option<Weather> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let avg = |f: fn(&Weather) -> f64| values.iter().map(f).sum::<f64>() / n;
        Some(Weather {
            prcp: avg(|w| w.prcp),
            tavg: avg(|w| w.tavg),
            tmax: avg(|w| w.tmax),
            tmin: avg(|w| w.tmin),
            snow: avg(|w| w.snow),
            snwd: avg(|w| w.snwd),
            awnd: avg(|w| w.awnd),
            wsf2: avg(|w| w.wsf2),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CityKey {
    pub city: String,
    pub province: String,
}

impl CityKey {
    pub fn new(city: &str, province: &str) -> Self {
        Self {
            city: city.to_string(),
            province: province.to_string(),
        }
    }
}

impl fmt::Display for CityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.province)
    }
}

/// One (station, date) after pivoting, before inference
#[derive(Debug, Clone, PartialEq)]
pub struct StationDay {
    pub station: String,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub city: CityKey,
    pub weather: PartialWeather,
}

/// Complete feature vector for one city on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityDateRecord {
    pub city: CityKey,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub station_count: usize,
    pub weather: Weather,
}

/// Grouping key for monthly accumulation. `year` is None when grouping by calendar month
/// across all years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthPeriod {
    pub year: Option<i32>,
    pub month: u32,
}

impl MonthPeriod {
    pub fn year_month(date: NaiveDate) -> Self {
        Self {
            year: Some(date.year()),
            month: date.month(),
        }
    }

    pub fn calendar(date: NaiveDate) -> Self {
        Self {
            year: None,
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month, 1)
    }

    /// The following year-month; calendar periods wrap December to January
    pub fn next(&self) -> Option<Self> {
        match self.year {
            Some(_) => {
                let next = self.first_day()?.checked_add_months(Months::new(1))?;
                Some(Self::year_month(next))
            }
            None => Some(Self {
                year: None,
                month: self.month % 12 + 1,
            }),
        }
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{:04}-{:02}", year, self.month),
            None => write!(f, "M{:02}", self.month),
        }
    }
}

/// Per (city, month) accumulation used for hydro potential and gap filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCityAggregate {
    pub city: CityKey,
    pub period: MonthPeriod,
    pub prcp_sum: f64,
    pub snow_sum: f64,
    pub snwd_mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawIndices {
    pub solar: f64,
    pub wind: f64,
    pub hydro: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIndices {
    pub solar: f64,
    pub wind: f64,
    pub hydro: f64,
    pub renewable_score: f64,
}

impl NormalizedIndices {
    /// The combined score is always the plain mean of the three normalized components
    pub fn from_components(solar: f64, wind: f64, hydro: f64) -> Self {
        Self {
            solar,
            wind,
            hydro,
            renewable_score: (solar + wind + hydro) / 3.0,
        }
    }
}

/// Raw indices plus their normalized form, which is written exactly once
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexSet {
    pub raw: RawIndices,
    normalized: Option<NormalizedIndices>,
}

impl IndexSet {
    pub fn new(raw: RawIndices) -> Self {
        Self {
            raw,
            normalized: None,
        }
    }

    pub fn normalized(&self) -> Option<&NormalizedIndices> {
        self.normalized.as_ref()
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized.is_some()
    }

    /// Returns false and leaves the set untouched if it was already normalized
    pub(crate) fn set_normalized(&mut self, normalized: NormalizedIndices) -> bool {
        if self.normalized.is_some() {
            return false;
        }
        self.normalized = Some(normalized);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFields {
    pub year: i32,
    pub month: u32,
    pub day_of_year: u32,
    pub season: Season,
}

impl TemporalFields {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day_of_year: date.ordinal(),
            season: Season::from_month(date.month()),
        }
    }
}

/// Daily row of the final index table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyIndexRecord {
    pub record: CityDateRecord,
    pub temporal: TemporalFields,
    pub indices: IndexSet,
}

/// Monthly aggregate joined with its hydro raw value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyIndexRecord {
    pub aggregate: MonthlyCityAggregate,
    pub hydro_raw: f64,
}

/// Monthly aggregate joined with its normalized indices; any index may be undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyIndexPoint {
    pub aggregate: MonthlyCityAggregate,
    pub hydro_raw: f64,
    pub solar: Option<f64>,
    pub wind: Option<f64>,
    pub hydro: Option<f64>,
    pub renewable_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_parsing() {
        assert_eq!("prcp".parse::<Variable>(), Ok(Variable::Prcp));
        assert_eq!(" WSF2 ".parse::<Variable>(), Ok(Variable::Wsf2));
        assert!("TOBS".parse::<Variable>().is_err());
        assert!(Variable::Tavg.reported_in_tenths());
        assert!(!Variable::Awnd.reported_in_tenths());
    }

    #[test]
    fn test_first_value_wins() {
        let mut weather = PartialWeather::default();
        assert!(weather.set_if_absent(Variable::Prcp, 4.0));
        assert!(!weather.set_if_absent(Variable::Prcp, 9.0));
        assert_eq!(weather.prcp, Some(4.0));
        assert_eq!(weather.missing().len(), 7);
    }

    #[test]
    fn test_month_period_sequence() {
        let dec = MonthPeriod::year_month(NaiveDate::from_ymd_opt(2023, 12, 14).unwrap());
        let jan = dec.next().unwrap();
        assert_eq!(jan, MonthPeriod { year: Some(2024), month: 1 });
        assert_eq!(jan.to_string(), "2024-01");

        let calendar = MonthPeriod { year: None, month: 12 };
        assert_eq!(calendar.next().unwrap().month, 1);
        assert!(calendar.first_day().is_none());
    }

    #[test]
    fn test_index_set_written_once() {
        let mut set = IndexSet::new(RawIndices { solar: 1.0, wind: 2.0, hydro: 3.0 });
        assert!(set.set_normalized(NormalizedIndices::from_components(0.6, 0.3, 0.9)));
        assert!(!set.set_normalized(NormalizedIndices::from_components(0.0, 0.0, 0.0)));
        assert_eq!(set.normalized().unwrap().solar, 0.6);
    }

    #[test]
    fn test_temporal_fields() {
        let fields = TemporalFields::from_date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(fields.day_of_year, 366);
        assert_eq!(fields.season, Season::Winter);
        assert_eq!(Season::from_month(10).as_str(), "fall");
    }
}
