//! Session: wires the layout manager to the generation scheduler and document replay.
//!
//! Everything runs on the caller's task. `step` waits for whichever comes first, a
//! finished generation job or the next replay tick, applies it to the manager, and
//! refills the worker pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::content::{CellStatus, SourceItem};
use crate::document::{AssetResolver, ProjectDocument, ReplayStep, RetrievalEndpointResolver, StaggeredReplay};
use crate::errors::StudioError;
use crate::generation::bulk::load_dataset;
use crate::generation::scheduler::Completion;
use crate::generation::{HttpImageGenerator, ImageGenerator, Scheduler};
use crate::manager::LayoutManager;

enum Event {
    Completion(Completion),
    Replay(ReplayStep),
    Drained,
}

/// Tally of cell states, reported when a session settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub ready: usize,
    pub errored: usize,
    pub loading: usize,
    pub idle: usize,
}

pub struct Session {
    manager: LayoutManager,
    scheduler: Scheduler,
    replay: Option<StaggeredReplay>,
    resolver: Arc<dyn AssetResolver>,
    import_delay: Duration,
}

impl Session {
    pub fn new(
        manager: LayoutManager,
        generator: Arc<dyn ImageGenerator>,
        resolver: Arc<dyn AssetResolver>,
        capacity: usize,
        import_delay: Duration,
    ) -> Self {
        Self {
            manager,
            scheduler: Scheduler::new(generator, capacity),
            replay: None,
            resolver,
            import_delay,
        }
    }

    /// Builds a session backed by the HTTP generator and the retrieval endpoint resolver.
    pub fn from_config(config: &Config, manager: LayoutManager) -> Result<Self, StudioError> {
        let generator = HttpImageGenerator::new(config.generation_url.clone(), config.request_timeout)?;
        let resolver = RetrievalEndpointResolver::new(&config.asset_endpoint)?;
        info!(
            "Session ready (generator: {}, capacity: {})",
            config.generation_url, config.max_concurrent_requests
        );
        Ok(Self::new(
            manager,
            Arc::new(generator),
            Arc::new(resolver),
            config.max_concurrent_requests,
            config.import_delay,
        ))
    }

    pub fn manager(&self) -> &LayoutManager {
        &self.manager
    }

    /// Direct access for interactive edits (selection, merges, row edits, uploads).
    pub fn manager_mut(&mut self) -> &mut LayoutManager {
        &mut self.manager
    }

    // ── Generation ──────────────────────────────────────────────────────────

    /// Replaces the grid's content with one job per dataset row. Any queued jobs from an
    /// earlier batch are dropped; results still in flight are discarded on arrival.
    pub fn bulk_import(&mut self, items: Vec<SourceItem>) -> usize {
        if let Some(mut replay) = self.replay.take() {
            let dropped = replay.cancel();
            if dropped > 0 {
                info!("Bulk import cancelled a replay with {dropped} pending cell(s)");
            }
        }
        self.scheduler.supersede();
        let batch = self.manager.plan_bulk_import(items);
        let queued = self.scheduler.submit(batch);
        self.scheduler.pump(&mut self.manager);
        queued
    }

    pub async fn bulk_import_csv(&mut self, path: &Path) -> Result<usize, StudioError> {
        let items = load_dataset(path).await?;
        Ok(self.bulk_import(items))
    }

    /// Regenerates the multi-selected cells. Queued behind any running batch.
    pub fn regenerate_selected(
        &mut self,
        model: Option<String>,
        variations: Option<u32>,
    ) -> Result<usize, StudioError> {
        let batch = self.manager.plan_regeneration(model, variations)?;
        let queued = self.scheduler.submit(batch);
        self.scheduler.pump(&mut self.manager);
        Ok(queued)
    }

    // ── Documents ───────────────────────────────────────────────────────────

    /// Imports a document and starts its content replay, cancelling any replay and
    /// queued jobs from before. Nothing changes if the document is rejected.
    pub fn import_document(&mut self, document: ProjectDocument) -> Result<usize, StudioError> {
        let replay = self
            .manager
            .import_document(document, self.resolver.as_ref(), self.import_delay)?;

        if let Some(mut previous) = self.replay.take() {
            let dropped = previous.cancel();
            if dropped > 0 {
                info!("Cancelled previous replay with {dropped} pending cell(s)");
            }
        }
        self.scheduler.supersede();

        let pending = replay.remaining();
        self.replay = Some(replay);
        Ok(pending)
    }

    pub async fn load_project(&mut self, path: &Path) -> Result<usize, StudioError> {
        let document = ProjectDocument::load(path).await?;
        self.import_document(document)
    }

    pub fn export_document(&self) -> ProjectDocument {
        self.manager.export_document()
    }

    pub async fn save_project(&self, path: &Path) -> Result<(), StudioError> {
        self.export_document().save(path).await
    }

    // ── Event loop ──────────────────────────────────────────────────────────

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle() && self.replay.as_ref().map_or(true, StaggeredReplay::is_finished)
    }

    /// Processes one event. Returns false once there is nothing left to wait for.
    pub async fn step(&mut self) -> bool {
        let replay_active = self.replay.as_ref().is_some_and(|r| !r.is_finished());
        let jobs_active = !self.scheduler.is_idle();
        if !replay_active && !jobs_active {
            self.replay = None;
            return false;
        }

        let event = tokio::select! {
            Some(step) = next_replay_step(&mut self.replay), if replay_active => Event::Replay(step),
            completion = self.scheduler.next_completion(), if jobs_active => match completion {
                Some(completion) => Event::Completion(completion),
                None => Event::Drained,
            },
            else => Event::Drained,
        };

        match event {
            Event::Completion(completion) => {
                let addr = completion.addr;
                if !self.manager.apply_completion(completion) {
                    debug!("Result for {addr} arrived after its batch was superseded");
                }
            }
            Event::Replay(step) => {
                self.manager.apply_replay_step(step);
            }
            Event::Drained => {}
        }
        self.scheduler.pump(&mut self.manager);
        true
    }

    /// Runs until every admitted job has finished and the replay has drained.
    pub async fn settle(&mut self) -> SessionSummary {
        while self.step().await {}
        let summary = self.summary();
        info!(
            "Session settled: {} ready, {} errored, {} idle",
            summary.ready, summary.errored, summary.idle
        );
        summary
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary::default();
        for cell in self.manager.content().entries().values() {
            match cell.status() {
                CellStatus::Ready => summary.ready += 1,
                CellStatus::Errored => summary.errored += 1,
                CellStatus::Loading => summary.loading += 1,
                CellStatus::Idle => summary.idle += 1,
            }
        }
        summary
    }
}

async fn next_replay_step(replay: &mut Option<StaggeredReplay>) -> Option<ReplayStep> {
    match replay {
        Some(replay) => replay.next_step().await,
        None => None,
    }
}
