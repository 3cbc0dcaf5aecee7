//! Bulk fill inputs: dataset parsing and the slot order a dataset is poured into.

use std::path::Path;

use tracing::info;

use crate::content::{CellContent, SourceItem};
use crate::errors::StudioError;
use crate::generation::request::PRODUCT_IMAGE;
use crate::layout::{CellAddress, LayoutModel, MergeMap};

/// Variation count used when regeneration is not given one.
pub const DEFAULT_REGEN_VARIATIONS: u32 = 2;

/// Parses a CSV dataset with a header row into one item per data row.
///
/// Headers and values are trimmed, quoted fields may contain commas, blank lines are
/// skipped, and a row shorter than the header simply lacks the trailing keys.
pub fn parse_dataset(text: &str) -> Result<Vec<SourceItem>, StudioError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut items = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let item: SourceItem = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        items.push(item);
    }

    Ok(items)
}

pub async fn load_dataset(path: &Path) -> Result<Vec<SourceItem>, StudioError> {
    let text = tokio::fs::read_to_string(path).await?;
    let items = parse_dataset(&text)?;
    info!("Loaded {} dataset row(s) from {}", items.len(), path.display());
    Ok(items)
}

/// Cells a dataset fills, row-major: every non-hidden cell of every offer row.
pub fn available_slots(layout: &LayoutModel, merges: &MergeMap) -> Vec<CellAddress> {
    layout
        .addresses()
        .filter(|addr| {
            layout.row(addr.row).is_some_and(|row| !row.is_banner()) && !merges.is_hidden(*addr)
        })
        .collect()
}

/// True when the cell holds a source item that can be regenerated from.
pub fn has_regenerable_item(content: &CellContent) -> bool {
    content
        .product_data
        .as_ref()
        .is_some_and(|item| item.text(PRODUCT_IMAGE).is_some())
}
