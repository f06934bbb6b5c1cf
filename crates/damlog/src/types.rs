//! Core data types for reservoir observations.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical text form of an observation timestamp.
///
/// This is the dedupe key compared against the store and the value written
/// to the store's timestamp column, so both paths must go through
/// [`Observation::timestamp_key`].
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Number of measurement fields carried by every observation.
pub const MEASUREMENT_COUNT: usize = 9;

/// One rendered table row: cell texts in document order.
pub type RawRow = Vec<String>;

/// All rendered table rows in document order.
pub type RawGrid = Vec<RawRow>;

/// One normalized, timestamped reading.
///
/// Measurements are kept exactly as rendered (locale formatting and
/// placeholders such as `--` included); nothing downstream does arithmetic
/// on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub water_level: String,
    pub storage_volume: String,
    pub utilization_rate: String,
    pub effective_rate: String,
    pub flood_rate: String,
    pub inflow: String,
    pub outflow: String,
    pub rain_10min: String,
    pub rain_accum: String,
}

impl Observation {
    /// Build an observation from a timestamp and the nine measurement cells,
    /// in store column order.
    pub fn from_cells(timestamp: NaiveDateTime, cells: &[String]) -> Option<Self> {
        if cells.len() < MEASUREMENT_COUNT {
            return None;
        }
        let cell = |i: usize| cells[i].trim().to_string();
        Some(Self {
            timestamp,
            water_level: cell(0),
            storage_volume: cell(1),
            utilization_rate: cell(2),
            effective_rate: cell(3),
            flood_rate: cell(4),
            inflow: cell(5),
            outflow: cell(6),
            rain_10min: cell(7),
            rain_accum: cell(8),
        })
    }

    /// The formatted timestamp used as the store's dedupe key.
    pub fn timestamp_key(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// The nine measurements in store column order.
    pub fn measurements(&self) -> [&str; MEASUREMENT_COUNT] {
        [
            &self.water_level,
            &self.storage_volume,
            &self.utilization_rate,
            &self.effective_rate,
            &self.flood_rate,
            &self.inflow,
            &self.outflow,
            &self.rain_10min,
            &self.rain_accum,
        ]
    }
}

/// Why a single row was left out of the normalized output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The row had fewer cells than the configured minimum.
    TooFewCells { found: usize, required: usize },
    /// The date cell was blank and no earlier row set a date.
    NoDate,
    /// The time cell was blank.
    NoTime,
    /// Date and time did not assemble into a valid calendar instant.
    InvalidTimestamp { date: String, time: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooFewCells { found, required } => {
                write!(f, "{found} cells, need at least {required}")
            }
            SkipReason::NoDate => write!(f, "no date cell seen yet"),
            SkipReason::NoTime => write!(f, "time cell is blank"),
            SkipReason::InvalidTimestamp { date, time } => {
                write!(f, "{date:?} {time:?} is not a valid timestamp")
            }
        }
    }
}

/// A row dropped during normalization, with its position in the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSkip {
    pub row: usize,
    pub reason: SkipReason,
}

/// Result of normalizing one grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized {
    /// Observations in source-row order.
    pub observations: Vec<Observation>,
    pub skipped: Vec<RowSkip>,
}
