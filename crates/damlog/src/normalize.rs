//! Row normalization: raw table rows → timestamped observations.
//!
//! The upstream table renders one row per reading but paints the date cell
//! only on the first row of each day, leaving it blank on the rows that
//! follow. The last reading of a day is written as `24:00` against that
//! day. [`Normalizer`] walks the rows in order, carrying the most recent
//! date forward and resolving both conventions.
//!
//! Row problems are local: the row is recorded as skipped and the scan
//! continues. Only [`check_shape`] can fail a whole run.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{ContentShapeError, ParseError};
use crate::types::{
    Normalized, Observation, RawGrid, RawRow, RowSkip, SkipReason, MEASUREMENT_COUNT,
};

/// Cells a row needs to hold a date, a time and every measurement.
pub const REQUIRED_COLUMNS: usize = FIRST_MEASUREMENT + MEASUREMENT_COUNT;

/// Canonical minimum number of cells in a data row.
pub const DEFAULT_MIN_COLUMNS: usize = REQUIRED_COLUMNS;

/// Day zero of spreadsheet serial dates.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial accepted (9999-12-31).
const MAX_SERIAL: u64 = 2_958_465;

/// Cell index of the date column.
const DATE_CELL: usize = 0;
/// Cell index of the time column.
const TIME_CELL: usize = 1;
/// Cell index of the first measurement.
const FIRST_MEASUREMENT: usize = 2;

/// The points on which observed page variants differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Calendar year combined with every `month/day` date cell. Read once
    /// from the run clock by the caller.
    pub year: i32,
    /// Rows with fewer cells are dropped. Values below [`REQUIRED_COLUMNS`]
    /// act as [`REQUIRED_COLUMNS`].
    pub min_columns: usize,
    /// Interpret all-digit date cells as serial day counts.
    pub serial_dates: bool,
}

impl NormalizeConfig {
    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            min_columns: DEFAULT_MIN_COLUMNS,
            serial_dates: true,
        }
    }
}

/// Convert a spreadsheet serial day count into a `MM/DD` string.
///
/// Returns `None` if the text is not a positive integer in range, or
/// contains anything other than ASCII digits.
pub fn serial_to_month_day(text: &str) -> Option<String> {
    let date = serial_to_date(text)?;
    Some(date.format("%m/%d").to_string())
}

fn serial_to_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let days: u64 = text.parse().ok()?;
    if days == 0 || days > MAX_SERIAL {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(days))
}

/// Parse a `month/day` string against a year.
fn parse_month_day(year: i32, text: &str) -> Option<NaiveDate> {
    let (month, day) = text.split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// A time cell after the `24:MM` rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedTime {
    text: String,
    next_day: bool,
}

fn resolve_time(raw: &str) -> Option<ResolvedTime> {
    if raw.is_empty() {
        return None;
    }
    match raw.strip_prefix("24:") {
        Some(minutes) => Some(ResolvedTime {
            text: format!("00:{minutes}"),
            next_day: true,
        }),
        None => Some(ResolvedTime {
            text: raw.to_string(),
            next_day: false,
        }),
    }
}

/// Stateful left-to-right scanner over raw rows.
///
/// The only state is the date carried forward from the last row that had a
/// non-blank date cell.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizeConfig,
    current_date: Option<String>,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self {
            config,
            current_date: None,
        }
    }

    /// Normalize one row. Rows are expected in document order.
    pub fn push(&mut self, row: &RawRow) -> Result<Observation, SkipReason> {
        let required = self.config.min_columns.max(REQUIRED_COLUMNS);
        if row.len() < required {
            return Err(SkipReason::TooFewCells {
                found: row.len(),
                required,
            });
        }

        let date_cell = row[DATE_CELL].trim();
        if !date_cell.is_empty() {
            let resolved = if self.config.serial_dates {
                serial_to_month_day(date_cell)
            } else {
                None
            };
            self.current_date = Some(resolved.unwrap_or_else(|| date_cell.to_string()));
        }
        let date = self.current_date.clone().ok_or(SkipReason::NoDate)?;

        let time = resolve_time(row[TIME_CELL].trim()).ok_or(SkipReason::NoTime)?;

        let invalid = || SkipReason::InvalidTimestamp {
            date: date.clone(),
            time: row[TIME_CELL].trim().to_string(),
        };
        let day = parse_month_day(self.config.year, &date).ok_or_else(invalid)?;
        let clock = NaiveTime::parse_from_str(&time.text, "%H:%M").map_err(|_| invalid())?;
        let mut timestamp = NaiveDateTime::new(day, clock);
        if time.next_day {
            timestamp = timestamp
                .checked_add_days(Days::new(1))
                .ok_or_else(invalid)?;
        }

        Observation::from_cells(timestamp, &row[FIRST_MEASUREMENT..]).ok_or(
            SkipReason::TooFewCells {
                found: row.len(),
                required: REQUIRED_COLUMNS,
            },
        )
    }
}

/// Normalize a whole grid, collecting observations and skipped rows.
pub fn normalize(grid: &RawGrid, config: &NormalizeConfig) -> Normalized {
    let mut normalizer = Normalizer::new(config.clone());
    let mut out = Normalized::default();

    for (index, row) in grid.iter().enumerate() {
        match normalizer.push(row) {
            Ok(observation) => out.observations.push(observation),
            Err(reason) => {
                let err = ParseError {
                    row: index,
                    reason: reason.to_string(),
                };
                tracing::debug!("{err}");
                out.skipped.push(RowSkip { row: index, reason });
            }
        }
    }

    tracing::debug!(
        observations = out.observations.len(),
        skipped = out.skipped.len(),
        "grid normalized"
    );
    out
}

/// Reject content that is not the expected page.
///
/// `marker` is a string that must appear somewhere in the page's rendered
/// text; an empty marker disables the identity check.
pub fn check_shape(grid: &RawGrid, page_text: &str, marker: &str) -> Result<(), ContentShapeError> {
    if !marker.is_empty() && !page_text.contains(marker) {
        return Err(ContentShapeError::MarkerMissing {
            marker: marker.to_string(),
        });
    }
    if grid.is_empty() {
        return Err(ContentShapeError::EmptyGrid);
    }
    Ok(())
}
