use tracing::{debug, warn};

use crate::{clock::DAY_MS, event::Event, store::Store};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 200;
pub const DEFAULT_MAX_EVENTS: usize = 50_000;
pub const MIN_RETENTION_DAYS: i64 = 14;
pub const MAX_RETENTION_DAYS: i64 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention_ms: i64,
    pub max_events: usize,
}

impl RetentionPolicy {
    pub fn new(retention_days: i64, max_events: usize) -> Self {
        Self {
            retention_ms: retention_days.clamp(MIN_RETENTION_DAYS, MAX_RETENTION_DAYS) * DAY_MS,
            max_events: max_events.max(1),
        }
    }

    pub fn horizon(&self, now: i64) -> i64 {
        now - self.retention_ms
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(MIN_RETENTION_DAYS, DEFAULT_MAX_EVENTS)
    }
}

/// Events waiting to be written, in append order.
#[derive(Debug)]
pub struct EventBuffer {
    pending: Vec<Event>,
    threshold: usize,
}

impl EventBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    /// Returns true once the buffer has reached the flush threshold.
    pub fn push(&mut self, event: Event) -> bool {
        self.pending.push(event);
        self.pending.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// Writes everything buffered. On failure the batch goes back in front of
    /// anything appended since, and the error is returned.
    pub fn flush(
        &mut self,
        store: &mut dyn Store,
        policy: &RetentionPolicy,
        now: i64,
    ) -> anyhow::Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(&mut self.pending);
        match store.append_events(&batch, policy.horizon(now), policy.max_events) {
            Ok(()) => {
                debug!(count = batch.len(), "flushed events");
                Ok(batch.len())
            }
            Err(err) => {
                self.restore(batch, policy.max_events);
                Err(err)
            }
        }
    }

    fn restore(&mut self, mut batch: Vec<Event>, cap: usize) {
        batch.append(&mut self.pending);
        if batch.len() > cap {
            let dropped = batch.len() - cap;
            warn!(dropped, "event buffer over capacity, dropping oldest unflushed events");
            batch.drain(..dropped);
        }
        self.pending = batch;
    }
}
