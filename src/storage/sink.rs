//! Persistence adapter contract
//!
//! The pipeline hands complete events to an [`EventSink`] one batch at a
//! time. A sink writes the whole batch or nothing; the pipeline never retries
//! a failed batch.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::error::{AuditError, AuditResult};
use crate::models::{Event, MirrorSet};

/// Destination for assembled events
pub trait EventSink: Send + Sync {
    /// Persist `events` together with the current mirrors
    ///
    /// When `max_age` is given, events older than now minus `max_age` are
    /// dropped in the same write.
    fn write_batch(
        &self,
        events: &[Event],
        mirrors: &MirrorSet,
        max_age: Option<Duration>,
    ) -> AuditResult<()>;
}

/// Oldest creation time kept under `max_age`; `None` when the cutoff
/// falls before the earliest representable time
pub fn retention_cutoff(max_age: Duration) -> Option<DateTime<Utc>> {
    Utc::now().checked_sub_signed(max_age)
}

#[derive(Debug, Default)]
struct MemoryState {
    events: Vec<Event>,
    mirrors: MirrorSet,
    batches: usize,
}

/// Keeps events in memory; for embedding in tests and tools
#[derive(Debug, Default)]
pub struct MemorySink {
    state: RwLock<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state
            .read()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    pub fn mirrors(&self) -> MirrorSet {
        self.state
            .read()
            .map(|s| s.mirrors.clone())
            .unwrap_or_default()
    }

    /// Number of batches written so far
    pub fn batch_count(&self) -> usize {
        self.state.read().map(|s| s.batches).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn write_batch(
        &self,
        events: &[Event],
        mirrors: &MirrorSet,
        max_age: Option<Duration>,
    ) -> AuditResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire sink lock: {}", e)))?;

        if let Some(cutoff) = max_age.and_then(retention_cutoff) {
            state.events.retain(|e| e.created_at >= cutoff);
        }

        state.events.extend_from_slice(events);
        state.mirrors = mirrors.clone();
        state.batches += 1;
        Ok(())
    }
}
