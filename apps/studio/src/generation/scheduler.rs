//! Generation Scheduler: a bounded-concurrency worker pool over an ordered job queue.
//!
//! `WorkerPool` is the pure admission state (queue, in-flight count, capacity).
//! `Scheduler` drives it on the current runtime: admitted jobs are spawned into a
//! `JoinSet`, and every completion frees a slot that the caller refills with `pump`.
//! All state lives on the caller's task, so no locking is needed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::content::SourceItem;
use crate::errors::StudioError;
use crate::generation::client::{GenerationError, ImageGenerator};
use crate::generation::request::{GenerationParams, GenerationRequest};
use crate::layout::CellAddress;

/// Default in-flight cap for generation requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 4;

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

/// An ordered set of (cell, item) pairs sharing model parameters.
#[derive(Debug, Clone)]
pub struct GenerationBatch {
    pub id: Uuid,
    /// Content epoch the batch was planned against. Results from an older epoch are discarded.
    pub epoch: u64,
    pub params: Arc<GenerationParams>,
    pub jobs: Vec<(CellAddress, SourceItem)>,
}

#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub addr: CellAddress,
    pub item: SourceItem,
    pub params: Arc<GenerationParams>,
    pub epoch: u64,
    pub batch: Uuid,
}

/// Result of one finished job.
#[derive(Debug)]
pub struct Completion {
    pub addr: CellAddress,
    pub epoch: u64,
    pub batch: Uuid,
    pub outcome: Result<Vec<String>, GenerationError>,
}

/// The state a scheduler reads from and writes back to.
pub trait JobTarget {
    /// Marks the job's cell loading and builds its request.
    ///
    /// On error the target must leave the cell in a terminal state itself; the
    /// scheduler only logs it and moves on to the next job.
    fn begin_job(&mut self, job: &GenerationJob) -> Result<GenerationRequest, StudioError>;

    fn finish_job(&mut self, completion: Completion);
}

// ────────────────────────────────────────────────────────────────────────────
// Worker pool
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct WorkerPool {
    queue: VecDeque<GenerationJob>,
    in_flight: usize,
    capacity: usize,
}

impl WorkerPool {
    /// A zero capacity is raised to one so the queue always drains.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn enqueue(&mut self, jobs: impl IntoIterator<Item = GenerationJob>) {
        self.queue.extend(jobs);
    }

    /// Admits the next queued job if a slot is free.
    pub fn next_admission(&mut self) -> Option<GenerationJob> {
        if self.in_flight >= self.capacity {
            return None;
        }
        let job = self.queue.pop_front()?;
        self.in_flight += 1;
        Some(job)
    }

    /// Frees the slot held by a finished (or never started) job.
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Drops every job not yet admitted. In-flight jobs are untouched.
    pub fn drain_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.queue.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scheduler
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    addr: CellAddress,
    epoch: u64,
    batch: Uuid,
}

impl Ticket {
    fn aborted(self, reason: String) -> Completion {
        Completion {
            addr: self.addr,
            epoch: self.epoch,
            batch: self.batch,
            outcome: Err(GenerationError::Aborted(reason)),
        }
    }
}

pub struct Scheduler {
    pool: WorkerPool,
    generator: Arc<dyn ImageGenerator>,
    tasks: JoinSet<Completion>,
    /// Jobs spawned but not yet reported, so a lost task still yields a completion.
    outstanding: HashMap<Id, Ticket>,
    recovered: VecDeque<Completion>,
}

impl Scheduler {
    pub fn new(generator: Arc<dyn ImageGenerator>, capacity: usize) -> Self {
        Self {
            pool: WorkerPool::new(capacity),
            generator,
            tasks: JoinSet::new(),
            outstanding: HashMap::new(),
            recovered: VecDeque::new(),
        }
    }

    /// Queues every job of `batch` behind whatever is already queued.
    pub fn submit(&mut self, batch: GenerationBatch) -> usize {
        let GenerationBatch {
            id,
            epoch,
            params,
            jobs,
        } = batch;
        let count = jobs.len();
        self.pool.enqueue(jobs.into_iter().map(|(addr, item)| GenerationJob {
            addr,
            item,
            params: Arc::clone(&params),
            epoch,
            batch: id,
        }));
        info!("Queued {count} generation job(s) for batch {id} (model: {})", params.model);
        count
    }

    /// Stops admitting queued jobs. In-flight jobs still run to completion.
    pub fn supersede(&mut self) -> usize {
        let dropped = self.pool.drain_queue();
        if dropped > 0 || self.pool.in_flight() > 0 {
            info!(
                "Superseded queue: {dropped} job(s) dropped, {} still in flight",
                self.pool.in_flight()
            );
        }
        dropped
    }

    /// Admits jobs while slots are free. Returns how many were started.
    pub fn pump<T: JobTarget + ?Sized>(&mut self, target: &mut T) -> usize {
        let mut started = 0;
        while let Some(job) = self.pool.next_admission() {
            let request = match target.begin_job(&job) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Job for cell {} could not start: {e}", job.addr);
                    self.pool.complete();
                    continue;
                }
            };

            let ticket = Ticket {
                addr: job.addr,
                epoch: job.epoch,
                batch: job.batch,
            };
            let generator = Arc::clone(&self.generator);
            let handle = self.tasks.spawn(async move {
                let outcome = generator.generate(&request).await;
                Completion {
                    addr: ticket.addr,
                    epoch: ticket.epoch,
                    batch: ticket.batch,
                    outcome,
                }
            });
            self.outstanding.insert(handle.id(), ticket);
            started += 1;
            debug!(
                "Started job for cell {} ({} in flight, {} queued)",
                job.addr,
                self.pool.in_flight(),
                self.pool.queued()
            );
        }
        started
    }

    /// Waits for the next finished job and frees its slot.
    ///
    /// Returns `None` once nothing is in flight. Cancel safe.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        loop {
            if let Some(completion) = self.recovered.pop_front() {
                return Some(completion);
            }
            match self.tasks.join_next_with_id().await {
                Some(Ok((id, completion))) => {
                    self.pool.complete();
                    self.outstanding.remove(&id);
                    return Some(completion);
                }
                Some(Err(e)) => {
                    self.pool.complete();
                    error!("Generation task lost: {e}");
                    if let Some(ticket) = self.outstanding.remove(&e.id()) {
                        return Some(ticket.aborted(e.to_string()));
                    }
                }
                None => {
                    if self.outstanding.is_empty() {
                        return None;
                    }
                    self.recover_lost("task set drained".to_string());
                }
            }
        }
    }

    /// Admits, waits, and applies until queue and in-flight set are both empty.
    pub async fn run_to_idle<T: JobTarget + ?Sized>(&mut self, target: &mut T) {
        self.pump(target);
        while let Some(completion) = self.next_completion().await {
            target.finish_job(completion);
            self.pump(target);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pool.is_idle()
            && self.recovered.is_empty()
            && self.tasks.is_empty()
            && self.outstanding.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    pub fn queued(&self) -> usize {
        self.pool.queued()
    }

    fn recover_lost(&mut self, reason: String) {
        for (_, ticket) in self.outstanding.drain() {
            self.recovered.push_back(ticket.aborted(reason.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::generation::request::{build_request, ServerVersion};
    use crate::layout::TargetSize;

    /// Sleeps a per-item duration, tracks peak concurrency, fails on demand.
    struct MockGenerator {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_name: Option<String>,
    }

    impl MockGenerator {
        fn new(fail_name: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail_name: fail_name.map(str::to_string),
            })
        }
    }

    #[async_trait]
    impl ImageGenerator for MockGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let name = request.product_name.clone().unwrap_or_default();
            let idx: u64 = name.trim_start_matches("item-").parse().unwrap_or(0);
            // Uneven durations so completions arrive out of order.
            tokio::time::sleep(Duration::from_millis(10 + (idx * 37) % 50)).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.fail_name.as_deref() == Some(name.as_str()) {
                return Err(GenerationError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(vec![format!("{name}.png")])
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        started: Vec<CellAddress>,
        finished: BTreeMap<CellAddress, bool>,
        reject: Option<CellAddress>,
    }

    impl JobTarget for RecordingTarget {
        fn begin_job(&mut self, job: &GenerationJob) -> Result<GenerationRequest, StudioError> {
            if self.reject == Some(job.addr) {
                self.finished.insert(job.addr, false);
                return Err(StudioError::validation("cell vanished"));
            }
            self.started.push(job.addr);
            let size = TargetSize {
                width: 100,
                height: 100,
            };
            Ok(build_request(&job.params, &job.item, size))
        }

        fn finish_job(&mut self, completion: Completion) {
            self.finished
                .insert(completion.addr, completion.outcome.is_ok());
        }
    }

    fn batch(count: usize) -> GenerationBatch {
        GenerationBatch {
            id: Uuid::new_v4(),
            epoch: 0,
            params: Arc::new(GenerationParams {
                model: "metro".to_string(),
                variations: 1,
                server_version: ServerVersion::V2,
                custom_models: Vec::new(),
            }),
            jobs: (0..count)
                .map(|i| {
                    let item: SourceItem = [("Product Name", format!("item-{i}"))]
                        .into_iter()
                        .collect();
                    (CellAddress::new(i / 3, i % 3), item)
                })
                .collect(),
        }
    }

    #[test]
    fn test_pool_admits_up_to_capacity_in_order() {
        let mut pool = WorkerPool::new(2);
        let b = batch(3);
        pool.enqueue(b.jobs.into_iter().map(|(addr, item)| GenerationJob {
            addr,
            item,
            params: Arc::clone(&b.params),
            epoch: 0,
            batch: b.id,
        }));

        assert_eq!(pool.next_admission().unwrap().addr, CellAddress::new(0, 0));
        assert_eq!(pool.next_admission().unwrap().addr, CellAddress::new(0, 1));
        assert!(pool.next_admission().is_none());
        assert_eq!(pool.in_flight(), 2);

        pool.complete();
        assert_eq!(pool.next_admission().unwrap().addr, CellAddress::new(0, 2));
        pool.complete();
        pool.complete();
        assert!(pool.is_idle());
    }

    #[test]
    fn test_pool_zero_capacity_is_raised() {
        assert_eq!(WorkerPool::new(0).capacity(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_more_than_capacity_in_flight() {
        let generator = MockGenerator::new(None);
        let mut scheduler = Scheduler::new(generator.clone(), MAX_CONCURRENT_REQUESTS);
        let mut target = RecordingTarget::default();

        scheduler.submit(batch(25));
        scheduler.run_to_idle(&mut target).await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 25);
        assert_eq!(generator.peak.load(Ordering::SeqCst), MAX_CONCURRENT_REQUESTS);
        assert_eq!(target.finished.len(), 25);
        assert!(scheduler.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_is_in_queue_order() {
        let mut scheduler = Scheduler::new(MockGenerator::new(None), 2);
        let mut target = RecordingTarget::default();

        scheduler.submit(batch(7));
        scheduler.run_to_idle(&mut target).await;

        let expected: Vec<_> = (0..7).map(|i| CellAddress::new(i / 3, i % 3)).collect();
        assert_eq!(target.started, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_does_not_affect_siblings() {
        let mut scheduler = Scheduler::new(MockGenerator::new(Some("item-3")), 4);
        let mut target = RecordingTarget::default();

        scheduler.submit(batch(10));
        scheduler.run_to_idle(&mut target).await;

        assert_eq!(target.finished.len(), 10);
        assert_eq!(target.finished.get(&CellAddress::new(1, 0)), Some(&false));
        assert_eq!(target.finished.values().filter(|ok| **ok).count(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_that_cannot_start_frees_its_slot() {
        let mut scheduler = Scheduler::new(MockGenerator::new(None), 1);
        let mut target = RecordingTarget {
            reject: Some(CellAddress::new(0, 0)),
            ..Default::default()
        };

        scheduler.submit(batch(3));
        scheduler.run_to_idle(&mut target).await;

        assert_eq!(target.started.len(), 2);
        assert_eq!(target.finished.len(), 3);
        assert!(scheduler.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersede_stops_admission_but_finishes_in_flight() {
        let generator = MockGenerator::new(None);
        let mut scheduler = Scheduler::new(generator.clone(), 4);
        let mut target = RecordingTarget::default();

        scheduler.submit(batch(10));
        assert_eq!(scheduler.pump(&mut target), 4);
        assert_eq!(scheduler.supersede(), 6);

        let mut finished = 0;
        while let Some(completion) = scheduler.next_completion().await {
            assert!(completion.outcome.is_ok());
            finished += 1;
            assert_eq!(scheduler.pump(&mut target), 0);
        }
        assert_eq!(finished, 4);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_scheduler_has_no_completion() {
        let mut scheduler = Scheduler::new(MockGenerator::new(None), 4);
        assert!(scheduler.next_completion().await.is_none());
        assert!(scheduler.is_idle());
    }
}
