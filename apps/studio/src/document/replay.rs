//! Staggered replay of imported cell content.
//!
//! Entries are released one per tick: the first immediately, then one per `delay`.
//! The whole replay is a single value, so dropping it (or calling `cancel`) discards
//! every pending step at once.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::content::CellContent;
use crate::layout::CellAddress;

/// Default pause between two replayed cells.
pub const IMPORT_DELAY_MS: u64 = 100;

const MIN_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    pub epoch: u64,
    pub addr: CellAddress,
    pub content: CellContent,
}

#[derive(Debug)]
pub struct StaggeredReplay {
    epoch: u64,
    pending: VecDeque<(CellAddress, CellContent)>,
    delay: Duration,
    ticker: Option<Interval>,
}

impl StaggeredReplay {
    pub fn new(
        epoch: u64,
        entries: impl IntoIterator<Item = (CellAddress, CellContent)>,
        delay: Duration,
    ) -> Self {
        Self {
            epoch,
            pending: entries.into_iter().collect(),
            delay: delay.max(MIN_DELAY),
            ticker: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waits for the next tick and releases one entry. `None` once drained.
    ///
    /// Cancel safe: an entry is only taken after its tick has fired.
    pub async fn next_step(&mut self) -> Option<ReplayStep> {
        if self.pending.is_empty() {
            return None;
        }
        let delay = self.delay;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval(delay);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;

        let (addr, content) = self.pending.pop_front()?;
        Some(ReplayStep {
            epoch: self.epoch,
            addr,
            content,
        })
    }

    /// Drops every pending step. Returns how many were discarded.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.ticker = None;
        dropped
    }
}
