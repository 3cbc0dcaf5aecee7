//! Layout Model: page configuration, row descriptors, and the cell address space they define.

use serde::{Deserialize, Serialize};

use crate::errors::StudioError;
use crate::layout::address::CellAddress;

pub const MIN_COLUMNS: usize = 1;
pub const MAX_COLUMNS: usize = 12;

const NEW_ROW_COLUMNS: usize = 3;
const NEW_ROW_HEIGHT: u32 = 180;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Page-level layout configuration. Field names follow the project document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub page_width: u32,
    pub page_height: u32,
    pub num_rows: usize,
    pub border_color: String,
    pub background_color: String,
    pub cell_padding: u32,
    /// Vertical gap between rows, in pixels. Counted when a merge spans rows.
    pub gap: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 555,
            page_height: 728,
            num_rows: 6,
            border_color: "#ffffff".to_string(),
            background_color: "#bfdbfe".to_string(),
            cell_padding: 0,
            gap: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    /// Regular product row, one card per column.
    #[default]
    Offer,
    /// Full-width row. Always one logical column, excluded from bulk fill.
    Banner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDescriptor {
    pub cols: usize,
    #[serde(rename = "type")]
    pub kind: RowKind,
    pub height: u32,
    pub scale: f64,
    /// Auto-fit the card image inside the cell.
    pub auto: bool,
}

impl Default for RowDescriptor {
    fn default() -> Self {
        Self {
            cols: NEW_ROW_COLUMNS,
            kind: RowKind::Offer,
            height: NEW_ROW_HEIGHT,
            scale: 1.0,
            auto: true,
        }
    }
}

impl RowDescriptor {
    /// Number of addressable columns. A banner row always has exactly one.
    pub fn effective_columns(&self) -> usize {
        match self.kind {
            RowKind::Banner => 1,
            RowKind::Offer => self.cols,
        }
    }

    pub fn is_banner(&self) -> bool {
        self.kind == RowKind::Banner
    }
}

/// A single-field row edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowUpdate {
    Columns(usize),
    Kind(RowKind),
    Height(u32),
    Scale(f64),
    AutoFit(bool),
}

impl RowUpdate {
    /// True when the edit can change which columns of the row are addressable.
    pub fn reshapes(&self) -> bool {
        matches!(self, RowUpdate::Columns(_) | RowUpdate::Kind(_))
    }
}

/// A single-field page configuration edit. Row count goes through `set_row_count`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    PageSize { width: u32, height: u32 },
    Gap(u32),
    CellPadding(u32),
    BorderColor(String),
    BackgroundColor(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Layout model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutModel {
    config: LayoutConfig,
    rows: Vec<RowDescriptor>,
}

impl Default for LayoutModel {
    fn default() -> Self {
        let config = LayoutConfig::default();
        let rows = vec![RowDescriptor::default(); config.num_rows];
        Self { config, rows }
    }
}

impl LayoutModel {
    /// Builds a model with `config.num_rows` default rows.
    pub fn new(config: LayoutConfig) -> Result<Self, StudioError> {
        if config.num_rows == 0 {
            return Err(StudioError::validation("A layout needs at least one row"));
        }
        let rows = vec![RowDescriptor::default(); config.num_rows];
        Ok(Self { config, rows })
    }

    /// Rebuilds a model from persisted parts, validating every row.
    pub fn from_parts(config: LayoutConfig, rows: Vec<RowDescriptor>) -> Result<Self, StudioError> {
        if rows.is_empty() {
            return Err(StudioError::validation("A layout needs at least one row"));
        }
        if config.num_rows != rows.len() {
            return Err(StudioError::validation(format!(
                "numRows is {} but {} rows were supplied",
                config.num_rows,
                rows.len()
            )));
        }
        for (index, row) in rows.iter().enumerate() {
            check_columns(row.cols).map_err(|e| prefix_row(index, e))?;
            check_height(row.height).map_err(|e| prefix_row(index, e))?;
            check_scale(row.scale).map_err(|e| prefix_row(index, e))?;
        }
        Ok(Self { config, rows })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn rows(&self) -> &[RowDescriptor] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RowDescriptor> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when `addr` names an addressable cell of the current layout.
    pub fn contains(&self, addr: CellAddress) -> bool {
        self.rows
            .get(addr.row)
            .is_some_and(|row| addr.col < row.effective_columns())
    }

    /// Every addressable cell, row-major. Hidden cells are included.
    pub fn addresses(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            (0..row.effective_columns()).map(move |c| CellAddress::new(r, c))
        })
    }

    /// Grows or shrinks the row sequence. Existing rows are preserved; new rows are defaults.
    pub fn set_row_count(&mut self, count: usize) -> Result<(), StudioError> {
        if count == 0 {
            return Err(StudioError::validation("Row count must be at least 1"));
        }
        self.rows.resize_with(count, RowDescriptor::default);
        self.config.num_rows = count;
        Ok(())
    }

    /// Applies a single-field edit to row `index`.
    ///
    /// Out-of-range values are rejected, never clamped. Callers that change the row's
    /// shape (`RowUpdate::reshapes`) must also purge the merges rooted in it.
    pub fn update_row(&mut self, index: usize, update: RowUpdate) -> Result<(), StudioError> {
        let row = self
            .rows
            .get_mut(index)
            .ok_or_else(|| StudioError::validation(format!("Row {index} does not exist")))?;

        match update {
            RowUpdate::Columns(cols) => {
                check_columns(cols)?;
                row.cols = cols;
            }
            RowUpdate::Kind(kind) => row.kind = kind,
            RowUpdate::Height(height) => {
                check_height(height)?;
                row.height = height;
            }
            RowUpdate::Scale(scale) => {
                check_scale(scale)?;
                row.scale = scale;
            }
            RowUpdate::AutoFit(auto) => row.auto = auto,
        }
        Ok(())
    }

    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<(), StudioError> {
        match update {
            ConfigUpdate::PageSize { width, height } => {
                if width == 0 || height == 0 {
                    return Err(StudioError::validation("Page size must be non-zero"));
                }
                self.config.page_width = width;
                self.config.page_height = height;
            }
            ConfigUpdate::Gap(gap) => self.config.gap = gap,
            ConfigUpdate::CellPadding(padding) => self.config.cell_padding = padding,
            ConfigUpdate::BorderColor(color) => self.config.border_color = color,
            ConfigUpdate::BackgroundColor(color) => self.config.background_color = color,
        }
        Ok(())
    }

    /// The effective column count `row` would have after `update`.
    pub(crate) fn columns_after(&self, index: usize, update: RowUpdate) -> Option<usize> {
        let mut row = self.rows.get(index)?.clone();
        match update {
            RowUpdate::Columns(cols) => row.cols = cols,
            RowUpdate::Kind(kind) => row.kind = kind,
            _ => {}
        }
        Some(row.effective_columns())
    }
}

fn check_columns(cols: usize) -> Result<(), StudioError> {
    if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&cols) {
        return Err(StudioError::validation(format!(
            "Column count {cols} is out of range ({MIN_COLUMNS}-{MAX_COLUMNS})"
        )));
    }
    Ok(())
}

fn check_height(height: u32) -> Result<(), StudioError> {
    if height == 0 {
        return Err(StudioError::validation("Row height must be non-zero"));
    }
    Ok(())
}

fn check_scale(scale: f64) -> Result<(), StudioError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(StudioError::validation(format!(
            "Row scale {scale} must be a positive number"
        )));
    }
    Ok(())
}

fn prefix_row(index: usize, err: StudioError) -> StudioError {
    match err {
        StudioError::Validation(msg) => StudioError::Validation(format!("Row {index}: {msg}")),
        other => other,
    }
}
