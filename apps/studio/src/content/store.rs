//! Cell Content Store — per-cell generation state and the source item bound to it.
//!
//! Entries are keyed by address and are independent of each other, so completions
//! may be applied in any order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StudioError;
use crate::layout::CellAddress;

/// Source item name bound to a directly uploaded image.
pub const UPLOAD_ITEM_NAME: &str = "Custom Banner";

// ────────────────────────────────────────────────────────────────────────────
// Source items
// ────────────────────────────────────────────────────────────────────────────

/// A loosely typed field of an imported dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemValue {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Text(s) => f.write_str(s),
            ItemValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One dataset row: opaque column names mapped to their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceItem(pub BTreeMap<String, ItemValue>);

impl SourceItem {
    pub fn get(&self, key: &str) -> Option<&ItemValue> {
        self.0.get(key)
    }

    /// Field rendered as text; `None` when absent or blank.
    pub fn text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(ToString::to_string)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), ItemValue::Text(value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SourceItem {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        SourceItem(
            iter.into_iter()
                .map(|(k, v)| (k.into(), ItemValue::Text(v.into())))
                .collect(),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cell content
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Idle,
    Loading,
    Ready,
    Errored,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellContent {
    pub loading: bool,
    pub image: Option<String>,
    pub variations: Vec<String>,
    pub error: bool,
    pub product_data: Option<SourceItem>,
}

impl CellContent {
    /// Loading wins over error, error over a resolved image.
    pub fn status(&self) -> CellStatus {
        if self.loading {
            CellStatus::Loading
        } else if self.error {
            CellStatus::Errored
        } else if self.image.is_some() {
            CellStatus::Ready
        } else {
            CellStatus::Idle
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellContentStore {
    cells: BTreeMap<CellAddress, CellContent>,
}

impl CellContentStore {
    pub fn get(&self, addr: CellAddress) -> Option<&CellContent> {
        self.cells.get(&addr)
    }

    pub fn entries(&self) -> &BTreeMap<CellAddress, CellContent> {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn status(&self, addr: CellAddress) -> CellStatus {
        self.cells
            .get(&addr)
            .map(CellContent::status)
            .unwrap_or(CellStatus::Idle)
    }

    /// Marks the cell loading and binds `item`. A previously resolved image is kept
    /// so it can be shown until the new result lands.
    pub fn set_loading(&mut self, addr: CellAddress, item: SourceItem) {
        let cell = self.cells.entry(addr).or_default();
        cell.loading = true;
        cell.error = false;
        cell.product_data = Some(item);
    }

    /// Applies a successful generation result.
    ///
    /// With an existing primary image every incoming image becomes a variation (copies
    /// of the primary dropped); otherwise the first becomes primary and the rest
    /// variations. An empty result is treated as a failure.
    pub fn resolve(&mut self, addr: CellAddress, images: Vec<String>) -> CellStatus {
        if images.is_empty() {
            self.fail(addr);
            return CellStatus::Errored;
        }

        let cell = self.cells.entry(addr).or_default();
        if let Some(current) = cell.image.clone() {
            cell.variations = images.into_iter().filter(|img| *img != current).collect();
        } else {
            let mut images = images.into_iter();
            cell.image = images.next();
            cell.variations = images.collect();
        }
        cell.loading = false;
        cell.error = false;
        debug!("Cell {addr} ready with {} variation(s)", cell.variations.len());
        CellStatus::Ready
    }

    /// Flags the cell errored. Any prior image survives.
    pub fn fail(&mut self, addr: CellAddress) {
        let cell = self.cells.entry(addr).or_default();
        cell.loading = false;
        cell.error = true;
    }

    /// Promotes one of the cell's variations to primary and discards the rest.
    pub fn select_variation(&mut self, addr: CellAddress, image: &str) -> Result<(), StudioError> {
        let cell = self
            .cells
            .get_mut(&addr)
            .ok_or_else(|| StudioError::NotFound(format!("Cell {addr} has no content")))?;
        if !cell.variations.iter().any(|v| v == image) {
            return Err(StudioError::validation(format!(
                "Image is not a variation of cell {addr}"
            )));
        }
        cell.image = Some(image.to_string());
        cell.variations.clear();
        Ok(())
    }

    pub fn clear(&mut self, addr: CellAddress) -> Option<CellContent> {
        self.cells.remove(&addr)
    }

    pub fn clear_all(&mut self) {
        self.cells.clear();
    }

    /// Exchanges the content of two cells; an absent side moves as absence.
    pub fn swap(&mut self, a: CellAddress, b: CellAddress) {
        if a == b {
            return;
        }
        let first = self.cells.remove(&a);
        let second = self.cells.remove(&b);
        if let Some(content) = first {
            self.cells.insert(b, content);
        }
        if let Some(content) = second {
            self.cells.insert(a, content);
        }
    }

    /// Sets an uploaded image as the cell's primary, replacing whatever was there.
    pub fn set_uploaded(&mut self, addr: CellAddress, image: String) {
        let mut item = SourceItem::default();
        item.insert("name", UPLOAD_ITEM_NAME);
        self.cells.insert(
            addr,
            CellContent {
                loading: false,
                image: Some(image),
                variations: Vec::new(),
                error: false,
                product_data: Some(item),
            },
        );
    }

    pub fn insert(&mut self, addr: CellAddress, content: CellContent) {
        self.cells.insert(addr, content);
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(CellAddress) -> bool) {
        self.cells.retain(|addr, _| keep(*addr));
    }
}
