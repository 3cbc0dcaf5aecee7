//! Project Document Codec: the portable JSON snapshot of a whole grid.
//!
//! Decoding and validation are separate: `from_json_str` only checks shape, and
//! `validate` rebuilds the layout and merge state, rejecting anything inconsistent
//! before the caller touches live state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::content::CellContent;
use crate::errors::StudioError;
use crate::generation::prompts::DEFAULT_DESIGN_MODEL;
use crate::generation::{CustomModel, ServerVersion};
use crate::layout::{CellAddress, LayoutConfig, LayoutModel, MergeMap, MergeSpan, RowDescriptor};

pub const DOCUMENT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub config: LayoutConfig,
    pub rows: Vec<RowDescriptor>,
    #[serde(default)]
    pub merges: BTreeMap<CellAddress, MergeSpan>,
    #[serde(default)]
    pub hidden_cells: Vec<CellAddress>,
    #[serde(default)]
    pub cell_data: BTreeMap<CellAddress, CellContent>,
    #[serde(default = "default_design_model")]
    pub design_model: String,
    #[serde(default)]
    pub server_version: ServerVersion,
    #[serde(default)]
    pub custom_models: Vec<CustomModel>,
}

fn legacy_version() -> u32 {
    1
}

fn default_design_model() -> String {
    DEFAULT_DESIGN_MODEL.to_string()
}

impl ProjectDocument {
    pub fn from_json_str(json: &str) -> Result<Self, StudioError> {
        serde_json::from_str(json)
            .map_err(|e| StudioError::Document(format!("Malformed project document: {e}")))
    }

    pub fn to_json_string(&self) -> Result<String, StudioError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StudioError::Document(format!("Could not encode project document: {e}")))
    }

    /// Rebuilds layout and merge state, failing on any inconsistency.
    pub fn validate(&self) -> Result<(LayoutModel, MergeMap), StudioError> {
        if self.version > DOCUMENT_VERSION {
            return Err(StudioError::Document(format!(
                "Project document version {} is newer than supported version {DOCUMENT_VERSION}",
                self.version
            )));
        }
        if self.design_model.trim().is_empty() {
            return Err(StudioError::Document("Design model must not be empty".to_string()));
        }

        let layout = LayoutModel::from_parts(self.config.clone(), self.rows.clone())
            .map_err(invalid_document)?;

        let hidden: BTreeSet<CellAddress> = self.hidden_cells.iter().copied().collect();
        if hidden.len() != self.hidden_cells.len() {
            return Err(StudioError::Document(
                "hiddenCells lists the same cell twice".to_string(),
            ));
        }
        let merges =
            MergeMap::from_parts(self.merges.clone(), hidden, &layout).map_err(invalid_document)?;

        Ok((layout, merges))
    }

    pub async fn save(&self, path: &Path) -> Result<(), StudioError> {
        let json = self.to_json_string()?;
        tokio::fs::write(path, json).await?;
        info!(
            "Saved project ({} rows, {} cells) to {}",
            self.rows.len(),
            self.cell_data.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, StudioError> {
        let json = tokio::fs::read_to_string(path).await?;
        let document = Self::from_json_str(&json)?;
        info!("Loaded project document v{} from {}", document.version, path.display());
        Ok(document)
    }
}

fn invalid_document(err: StudioError) -> StudioError {
    match err {
        StudioError::Validation(msg) => StudioError::Document(format!("Invalid project document: {msg}")),
        other => other,
    }
}
