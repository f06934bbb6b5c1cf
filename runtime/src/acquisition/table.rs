//! Extract raw table cells from rendered HTML.

use anyhow::{anyhow, Result};
use damlog::RawGrid;
use scraper::{ElementRef, Html, Selector};

/// Elements whose text content is never rendered.
const HIDDEN_TEXT: &[&str] = &["script", "style", "noscript", "template"];

/// Cell texts of every element matching `row_selector`, one row per match.
///
/// Cell text is whitespace-collapsed and trimmed, the way a browser's
/// `innerText` reads for a single-line cell. Rows are kept even when they
/// have no cells; the normalizer decides what a usable row is.
pub fn parse_grid(html: &str, row_selector: &str) -> Result<RawGrid> {
    let rows = Selector::parse(row_selector)
        .map_err(|e| anyhow!("invalid row selector {row_selector:?}: {e}"))?;
    let cells = Selector::parse("td").map_err(|e| anyhow!("invalid cell selector: {e}"))?;

    let document = Html::parse_document(html);
    let grid = document
        .select(&rows)
        .map(|row| {
            row.select(&cells)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect()
        })
        .collect();
    Ok(grid)
}

/// Visible text of a document's body, whitespace-collapsed. Text inside
/// script, style and similar non-rendered elements is left out.
pub fn document_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let parts: Vec<&str> = body
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().filter_map(ElementRef::wrap).any(|element| {
                HIDDEN_TEXT.contains(&element.value().name())
            });
            (!hidden).then_some(&**text)
        })
        .collect();
    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
