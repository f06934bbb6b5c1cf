//! Normalize a saved page offline, without a browser or a store.

use crate::acquisition::table;
use crate::config::{Config, SourceConfig};
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use damlog::{check_shape, normalize, Normalized};
use std::path::Path;
use tracing::warn;

/// Parse `html` with the configured row selector and normalize it for `year`.
///
/// A shape mismatch is only warned about here: a saved page is often a
/// fragment, and the rows are still worth seeing.
pub fn normalize_page(html: &str, source: &SourceConfig, year: i32) -> Result<Normalized> {
    let grid = table::parse_grid(html, &source.row_selector)?;
    if let Err(e) = check_shape(&grid, &table::document_text(html), &source.page_marker) {
        warn!("{e}");
    }
    Ok(normalize(&grid, &source.normalize_config(year)))
}

pub fn run(config: &Config, file: &Path, year: Option<i32>) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let year = year.unwrap_or_else(|| Utc::now().with_timezone(&config.utc_offset).year());

    let normalized = normalize_page(&html, &config.source, year)?;
    super::print_json(&normalized)
}
