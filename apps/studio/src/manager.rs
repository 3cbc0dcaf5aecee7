//! Layout manager, the single owned aggregate behind the interaction surface.
//!
//! Owns the layout, merge state, content store, selections, and model selectors.
//! Every mutation goes through a method here; each one validates before mutating,
//! so an `Err` leaves the aggregate exactly as it was.
//!
//! The content epoch advances whenever content is replaced wholesale (bulk import,
//! document import). Generation completions and replay steps carry the epoch they
//! were planned under and are dropped if it is stale.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::content::{CellContent, CellContentStore, SourceItem};
use crate::document::{resolve_content, AssetResolver, ProjectDocument, ReplayStep, StaggeredReplay, DOCUMENT_VERSION};
use crate::errors::StudioError;
use crate::generation::bulk::{available_slots, has_regenerable_item, DEFAULT_REGEN_VARIATIONS};
use crate::generation::prompts::{background_for, house_style, DEFAULT_DESIGN_MODEL};
use crate::generation::{
    build_request, Completion, CustomModel, GenerationBatch, GenerationJob, GenerationParams,
    GenerationRequest, JobTarget, ServerVersion,
};
use crate::layout::{
    target_size, Bounds, CellAddress, ConfigUpdate, LayoutConfig, LayoutModel, MergeMap, MergeSpan,
    MultiSelect, RectSelection, RowUpdate, SelectionMode,
};

#[derive(Debug, Clone)]
pub struct LayoutManager {
    layout: LayoutModel,
    merges: MergeMap,
    content: CellContentStore,
    selection: RectSelection,
    multi: MultiSelect,
    mode: SelectionMode,
    design_model: String,
    server_version: ServerVersion,
    custom_models: Vec<CustomModel>,
    epoch: u64,
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::with_layout(LayoutModel::default())
    }
}

impl LayoutManager {
    pub fn new(config: LayoutConfig) -> Result<Self, StudioError> {
        Ok(Self::with_layout(LayoutModel::new(config)?))
    }

    fn with_layout(layout: LayoutModel) -> Self {
        let mut manager = Self {
            layout,
            merges: MergeMap::default(),
            content: CellContentStore::default(),
            selection: RectSelection::default(),
            multi: MultiSelect::default(),
            mode: SelectionMode::default(),
            design_model: DEFAULT_DESIGN_MODEL.to_string(),
            server_version: ServerVersion::default(),
            custom_models: Vec::new(),
            epoch: 0,
        };
        manager.apply_model_background();
        manager
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn layout(&self) -> &LayoutModel {
        &self.layout
    }

    pub fn merges(&self) -> &MergeMap {
        &self.merges
    }

    pub fn content(&self) -> &CellContentStore {
        &self.content
    }

    pub fn multi_select(&self) -> &MultiSelect {
        &self.multi
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn design_model(&self) -> &str {
        &self.design_model
    }

    pub fn server_version(&self) -> ServerVersion {
        self.server_version
    }

    pub fn custom_models(&self) -> &[CustomModel] {
        &self.custom_models
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Root of the merge covering `addr`, if any.
    pub fn owner_of(&self, addr: CellAddress) -> Option<CellAddress> {
        self.merges.owner_of(addr)
    }

    // ── Selection ───────────────────────────────────────────────────────────

    /// Starts a drag rectangle. Ignored while multi-select mode is active.
    pub fn begin_selection(&mut self, addr: CellAddress) {
        if self.mode == SelectionMode::Rectangle {
            self.selection.begin(addr);
        }
    }

    pub fn extend_selection(&mut self, addr: CellAddress) {
        if self.mode == SelectionMode::Rectangle {
            self.selection.extend(addr);
        }
    }

    pub fn end_selection(&mut self) {
        self.selection.end();
    }

    pub fn cancel_selection(&mut self) {
        self.selection.cancel();
    }

    pub fn selection_bounds(&self) -> Option<Bounds> {
        self.selection.bounds()
    }

    /// Switches the pointer gesture. Entering multi-select drops any drag rectangle.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        if mode == SelectionMode::Multi {
            self.selection.cancel();
        }
        self.mode = mode;
    }

    /// Toggles a cell in the multi-select set. Returns whether it is now selected.
    pub fn toggle_cell(&mut self, addr: CellAddress) -> Result<bool, StudioError> {
        self.check_addressable(addr)?;
        Ok(self.multi.toggle(addr))
    }

    pub fn clear_multi_select(&mut self) {
        self.multi.clear();
    }

    // ── Merges ──────────────────────────────────────────────────────────────

    /// Merges the current selection rectangle and clears the selection.
    pub fn merge_selection(&mut self) -> Result<CellAddress, StudioError> {
        let bounds = self
            .selection
            .bounds()
            .ok_or_else(|| StudioError::validation("Nothing is selected"))?;
        let root = self.merges.merge(bounds, &self.layout)?;
        self.selection.cancel();
        self.multi.retain(|addr| addr == root || !bounds.contains(addr));
        Ok(root)
    }

    pub fn unmerge(&mut self, root: CellAddress) -> Result<MergeSpan, StudioError> {
        self.merges.unmerge(root)
    }

    // ── Layout edits ────────────────────────────────────────────────────────

    /// Grows or truncates the row sequence.
    ///
    /// Merges wholly inside removed rows are dropped. A merge straddling the new
    /// last row blocks the edit. Cell content is left in place.
    pub fn set_row_count(&mut self, count: usize) -> Result<(), StudioError> {
        if count == 0 {
            return Err(StudioError::validation("Row count must be at least 1"));
        }
        self.merges.check_truncate(count)?;
        self.layout.set_row_count(count)?;

        let purged = self.merges.purge_rows_from(count);
        if !purged.is_empty() {
            debug!("Dropped {} merge(s) below row {count}", purged.len());
        }
        self.prune_selection();
        Ok(())
    }

    /// Applies a single-field row edit. Shape changes purge merges rooted in the row.
    pub fn update_row(&mut self, index: usize, update: RowUpdate) -> Result<(), StudioError> {
        if !update.reshapes() {
            return self.layout.update_row(index, update);
        }

        let new_cols = self
            .layout
            .columns_after(index, update)
            .ok_or_else(|| StudioError::validation(format!("Row {index} does not exist")))?;
        self.merges.check_reshape(index, new_cols)?;
        self.layout.update_row(index, update)?;

        let purged = self.merges.purge_row(index);
        if !purged.is_empty() {
            debug!("Row {index} reshaped; dropped {} merge(s)", purged.len());
        }
        self.prune_selection();
        Ok(())
    }

    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<(), StudioError> {
        self.layout.update_config(update)
    }

    // ── Model selection ─────────────────────────────────────────────────────

    /// Selects a built-in or custom design model. Built-in styles also set the page background.
    pub fn set_design_model(&mut self, model: &str) -> Result<(), StudioError> {
        let known = house_style(model).is_some() || self.custom_models.iter().any(|m| m.name == model);
        if !known {
            return Err(StudioError::validation(format!("Unknown design model '{model}'")));
        }
        self.design_model = model.to_string();
        self.apply_model_background();
        info!("Design model set to {model}");
        Ok(())
    }

    pub fn set_server_version(&mut self, version: ServerVersion) {
        self.server_version = version;
    }

    /// Adds a custom model, replacing any existing one with the same name.
    pub fn add_custom_model(&mut self, model: CustomModel) -> Result<(), StudioError> {
        if model.name.trim().is_empty() || model.prompt.trim().is_empty() {
            return Err(StudioError::validation("Custom model needs a name and a prompt"));
        }
        if house_style(&model.name).is_some() {
            return Err(StudioError::validation(format!(
                "'{}' is a built-in design model",
                model.name
            )));
        }
        self.custom_models.retain(|m| m.name != model.name);
        self.custom_models.push(model);
        Ok(())
    }

    // ── Content edits ───────────────────────────────────────────────────────

    /// Exchanges the content of two visible cells (drag-swap).
    pub fn swap_cells(&mut self, a: CellAddress, b: CellAddress) -> Result<(), StudioError> {
        self.check_addressable(a)?;
        self.check_addressable(b)?;
        self.content.swap(a, b);
        Ok(())
    }

    /// Places an uploaded image directly into a cell.
    pub fn upload_image(&mut self, addr: CellAddress, image: String) -> Result<(), StudioError> {
        self.check_addressable(addr)?;
        if image.trim().is_empty() {
            return Err(StudioError::validation("Uploaded image is empty"));
        }
        self.content.set_uploaded(addr, image);
        Ok(())
    }

    pub fn clear_cell(&mut self, addr: CellAddress) -> Option<CellContent> {
        self.content.clear(addr)
    }

    pub fn select_variation(&mut self, addr: CellAddress, image: &str) -> Result<(), StudioError> {
        self.content.select_variation(addr, image)
    }

    // ── Generation planning ─────────────────────────────────────────────────

    /// Pours dataset rows into the available slots and returns the resulting batch.
    ///
    /// Starts a new content epoch: every cell except banner cells is cleared, and the
    /// filled slots are marked loading. Extra rows are dropped; extra slots stay empty.
    pub fn plan_bulk_import(&mut self, items: Vec<SourceItem>) -> GenerationBatch {
        let slots = available_slots(&self.layout, &self.merges);
        let available = slots.len();
        let total = items.len();

        let layout = &self.layout;
        self.content
            .retain(|addr| addr.col == 0 && layout.row(addr.row).is_some_and(|row| row.is_banner()));
        self.epoch += 1;

        let jobs: Vec<(CellAddress, SourceItem)> = slots.into_iter().zip(items).collect();
        for (addr, item) in &jobs {
            self.content.set_loading(*addr, item.clone());
        }

        if total > available {
            warn!("Dataset has {total} rows but only {available} slots; dropping {}", total - available);
        }
        info!("Bulk import: {} job(s) planned (epoch {})", jobs.len(), self.epoch);

        GenerationBatch {
            id: Uuid::new_v4(),
            epoch: self.epoch,
            params: Arc::new(self.params(self.design_model.clone(), 1)),
            jobs,
        }
    }

    /// Plans regeneration of the multi-selected cells that hold a usable source item.
    ///
    /// Clears the multi-select set on success.
    pub fn plan_regeneration(
        &mut self,
        model: Option<String>,
        variations: Option<u32>,
    ) -> Result<GenerationBatch, StudioError> {
        if self.multi.is_empty() {
            return Err(StudioError::validation("Select cells to regenerate first"));
        }
        let variations = variations.unwrap_or(DEFAULT_REGEN_VARIATIONS);
        if variations == 0 {
            return Err(StudioError::validation("Variation count must be at least 1"));
        }
        let model = model.unwrap_or_else(|| self.design_model.clone());

        let jobs: Vec<(CellAddress, SourceItem)> = self
            .multi
            .iter()
            .filter_map(|addr| {
                let cell = self.content.get(addr)?;
                if !has_regenerable_item(cell) {
                    return None;
                }
                cell.product_data.clone().map(|item| (addr, item))
            })
            .collect();
        if jobs.is_empty() {
            return Err(StudioError::validation(
                "None of the selected cells has a product image to regenerate from",
            ));
        }

        self.multi.clear();
        info!("Regeneration: {} job(s) with model {model} (n={variations})", jobs.len());
        Ok(GenerationBatch {
            id: Uuid::new_v4(),
            epoch: self.epoch,
            params: Arc::new(self.params(model, variations)),
            jobs,
        })
    }

    /// Applies a finished job. Returns false if it belonged to a superseded epoch.
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        if completion.epoch != self.epoch {
            debug!(
                "Discarding result for {} from epoch {} (current {})",
                completion.addr, completion.epoch, self.epoch
            );
            return false;
        }
        match completion.outcome {
            Ok(images) => {
                self.content.resolve(completion.addr, images);
            }
            Err(e) => {
                warn!("Generation failed for cell {}: {e}", completion.addr);
                self.content.fail(completion.addr);
            }
        }
        true
    }

    // ── Documents ───────────────────────────────────────────────────────────

    pub fn export_document(&self) -> ProjectDocument {
        ProjectDocument {
            version: DOCUMENT_VERSION,
            timestamp: Some(chrono::Utc::now()),
            config: self.layout.config().clone(),
            rows: self.layout.rows().to_vec(),
            merges: self.merges.merges().clone(),
            hidden_cells: self.merges.hidden().iter().copied().collect(),
            cell_data: self.content.entries().clone(),
            design_model: self.design_model.clone(),
            server_version: self.server_version,
            custom_models: self.custom_models.clone(),
        }
    }

    /// Replaces the grid with a document's contents.
    ///
    /// Layout, merges, and selectors are swapped in synchronously. Cell content is
    /// cleared and returned as a staggered replay for the caller to drive. A document
    /// that fails validation is rejected before anything changes.
    pub fn import_document(
        &mut self,
        document: ProjectDocument,
        resolver: &dyn AssetResolver,
        delay: Duration,
    ) -> Result<StaggeredReplay, StudioError> {
        let (layout, merges) = document.validate()?;

        self.layout = layout;
        self.merges = merges;
        self.design_model = document.design_model;
        self.server_version = document.server_version;
        self.custom_models = document.custom_models;
        self.selection.cancel();
        self.multi.clear();
        self.mode = SelectionMode::Rectangle;
        self.content.clear_all();
        self.epoch += 1;

        let entries: Vec<(CellAddress, CellContent)> = document
            .cell_data
            .into_iter()
            .map(|(addr, mut content)| {
                // No job backs a persisted loading flag.
                content.loading = false;
                (addr, resolve_content(content, resolver))
            })
            .collect();

        info!(
            "Imported project: {} rows, {} merges, {} cells to replay (epoch {})",
            self.layout.row_count(),
            self.merges.merges().len(),
            entries.len(),
            self.epoch
        );
        Ok(StaggeredReplay::new(self.epoch, entries, delay))
    }

    /// Applies one replayed cell. Returns false if the replay was superseded.
    pub fn apply_replay_step(&mut self, step: ReplayStep) -> bool {
        if step.epoch != self.epoch {
            return false;
        }
        self.content.insert(step.addr, step.content);
        true
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn params(&self, model: String, variations: u32) -> GenerationParams {
        GenerationParams {
            model,
            variations,
            server_version: self.server_version,
            custom_models: self.custom_models.clone(),
        }
    }

    fn apply_model_background(&mut self) {
        if let Some(color) = background_for(&self.design_model) {
            // Colour updates cannot fail.
            let _ = self
                .layout
                .update_config(ConfigUpdate::BackgroundColor(color.to_string()));
        }
    }

    fn check_addressable(&self, addr: CellAddress) -> Result<(), StudioError> {
        if !self.layout.contains(addr) {
            return Err(StudioError::validation(format!("Cell {addr} is outside the grid")));
        }
        if self.merges.is_hidden(addr) {
            return Err(StudioError::validation(format!(
                "Cell {addr} is hidden by a merge"
            )));
        }
        Ok(())
    }

    fn prune_selection(&mut self) {
        let layout = &self.layout;
        let merges = &self.merges;
        self.multi
            .retain(|addr| layout.contains(addr) && !merges.is_hidden(addr));
        if let Some(bounds) = self.selection.bounds() {
            if bounds.cells().any(|addr| !layout.contains(addr)) {
                self.selection.cancel();
            }
        }
    }
}

impl JobTarget for LayoutManager {
    fn begin_job(&mut self, job: &GenerationJob) -> Result<GenerationRequest, StudioError> {
        if job.epoch != self.epoch {
            return Err(StudioError::validation(format!(
                "Job for {} belongs to superseded epoch {}",
                job.addr, job.epoch
            )));
        }
        let Some(size) = target_size(&self.layout, &self.merges, job.addr) else {
            self.content.fail(job.addr);
            return Err(StudioError::NotFound(format!(
                "Cell {} is no longer part of the grid",
                job.addr
            )));
        };
        self.content.set_loading(job.addr, job.item.clone());
        Ok(build_request(&job.params, &job.item, size))
    }

    fn finish_job(&mut self, completion: Completion) {
        self.apply_completion(completion);
    }
}
