//! Append-only JSONL event store
//!
//! Each line of the event log is one complete [`Event`]. Mirrors live in a
//! separate JSON file that is rewritten atomically with every batch. When a
//! retention age is configured, the batch write becomes a rewrite of the
//! whole log without expired events, done through the same atomic rename.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::config::AuditPaths;
use crate::error::{AuditError, AuditResult};
use crate::models::{Event, MirrorSet};

use super::file_io::{read_json, write_atomic, write_json_atomic};
use super::sink::{retention_cutoff, EventSink};

/// File-backed event store
#[derive(Debug)]
pub struct JsonlStore {
    events_path: PathBuf,
    mirrors_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(events_path: PathBuf, mirrors_path: PathBuf) -> Self {
        Self {
            events_path,
            mirrors_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the standard locations
    pub fn open(paths: &AuditPaths) -> Self {
        Self::new(paths.events_file(), paths.mirrors_file())
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn mirrors_path(&self) -> &Path {
        &self.mirrors_path
    }

    /// Read all events, oldest first
    pub fn read_all(&self) -> AuditResult<Vec<Event>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path)
            .map_err(|e| AuditError::Io(format!("Failed to open event log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AuditError::Io(format!("Failed to read event log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let event: Event = serde_json::from_str(&line).map_err(|e| {
                AuditError::Json(format!(
                    "Failed to parse event at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            events.push(event);
        }

        Ok(events)
    }

    /// Read the most recent `count` events
    pub fn read_recent(&self, count: usize) -> AuditResult<Vec<Event>> {
        let all_events = self.read_all()?;
        let start = all_events.len().saturating_sub(count);
        Ok(all_events[start..].to_vec())
    }

    /// Number of events in the log
    pub fn entry_count(&self) -> AuditResult<usize> {
        if !self.events_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.events_path)
            .map_err(|e| AuditError::Io(format!("Failed to open event log: {}", e)))?;

        let count = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count();

        Ok(count)
    }

    pub fn read_mirrors(&self) -> AuditResult<MirrorSet> {
        read_json(&self.mirrors_path)
    }

    /// Drop events older than `max_age`; returns how many were removed
    pub fn purge(&self, max_age: Duration) -> AuditResult<usize> {
        let _guard = self.lock()?;
        let events = self.read_all()?;
        let before = events.len();
        let kept = retain_recent(events, max_age);
        let removed = before - kept.len();

        if removed > 0 {
            self.rewrite(&kept)?;
        }

        Ok(removed)
    }

    fn lock(&self) -> AuditResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire store lock: {}", e)))
    }

    fn append(&self, events: &[Event]) -> AuditResult<()> {
        if let Some(parent) = self.events_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuditError::Io(format!("Failed to create event directory: {}", e)))?;
        }

        // Serialize everything first so a bad event cannot leave half a batch
        let mut buffer = String::new();
        for event in events {
            let json = serde_json::to_string(event)
                .map_err(|e| AuditError::Json(format!("Failed to serialize event: {}", e)))?;
            buffer.push_str(&json);
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .map_err(|e| AuditError::Io(format!("Failed to open event log: {}", e)))?;

        file.write_all(buffer.as_bytes())
            .map_err(|e| AuditError::Io(format!("Failed to write events: {}", e)))?;

        file.flush()
            .map_err(|e| AuditError::Io(format!("Failed to flush event log: {}", e)))
    }

    fn rewrite(&self, events: &[Event]) -> AuditResult<()> {
        write_atomic(&self.events_path, |writer| {
            for event in events {
                serde_json::to_writer(&mut *writer, event)
                    .map_err(|e| AuditError::Json(format!("Failed to serialize event: {}", e)))?;
                writer
                    .write_all(b"\n")
                    .map_err(|e| AuditError::Io(format!("Failed to write events: {}", e)))?;
            }
            Ok(())
        })
    }
}

fn retain_recent(events: Vec<Event>, max_age: Duration) -> Vec<Event> {
    match retention_cutoff(max_age) {
        Some(cutoff) => events
            .into_iter()
            .filter(|e| e.created_at >= cutoff)
            .collect(),
        None => events,
    }
}

impl EventSink for JsonlStore {
    fn write_batch(
        &self,
        events: &[Event],
        mirrors: &MirrorSet,
        max_age: Option<Duration>,
    ) -> AuditResult<()> {
        let _guard = self.lock()?;

        if !mirrors.is_empty() {
            write_json_atomic(&self.mirrors_path, mirrors)?;
        }

        match max_age {
            None => self.append(events),
            Some(max_age) => {
                let mut kept = retain_recent(self.read_all()?, max_age);
                let expired = kept.len();
                kept.extend_from_slice(events);
                self.rewrite(&kept)?;
                debug!(batch = events.len(), retained = expired, "Rewrote event log");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use crate::models::{EventKind, UnspecifiedEvent};
    use tempfile::TempDir;

    fn create_test_store() -> (JsonlStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(
            temp_dir.path().join("events.jsonl"),
            temp_dir.path().join("mirrors.json"),
        );
        (store, temp_dir)
    }

    fn log_event(message: &str) -> Event {
        Event::new(EventKind::Unspecified(UnspecifiedEvent {
            message: message.to_string(),
            level: LogLevel::Info,
            file: None,
            line: None,
            application: None,
        }))
    }

    #[test]
    fn test_write_and_read() {
        let (store, _temp) = create_test_store();
        let batch = vec![log_event("one"), log_event("two")];

        store.write_batch(&batch, &MirrorSet::default(), None).unwrap();

        let events = store.read_all().unwrap();
        assert_eq!(events, batch);
        assert_eq!(store.entry_count().unwrap(), 2);
        assert!(!store.mirrors_path().exists());
    }

    #[test]
    fn test_empty_store() {
        let (store, _temp) = create_test_store();
        assert!(store.read_all().unwrap().is_empty());
        assert_eq!(store.entry_count().unwrap(), 0);
        assert!(store.read_mirrors().unwrap().is_empty());
    }

    #[test]
    fn test_read_recent() {
        let (store, _temp) = create_test_store();
        for i in 0..5 {
            store
                .write_batch(&[log_event(&format!("event {}", i))], &MirrorSet::default(), None)
                .unwrap();
        }

        let recent = store.read_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].as_unspecified().unwrap().message, "event 4");
    }

    #[test]
    fn test_retention_applied_with_batch() {
        let (store, _temp) = create_test_store();
        let mut old = log_event("old");
        old.created_at = Utc::now() - Duration::days(40);
        store.write_batch(&[old], &MirrorSet::default(), None).unwrap();

        store
            .write_batch(&[log_event("new")], &MirrorSet::default(), Some(Duration::days(30)))
            .unwrap();

        let events = store.read_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_unspecified().unwrap().message, "new");
    }

    #[test]
    fn test_purge() {
        let (store, _temp) = create_test_store();
        let mut old = log_event("old");
        old.created_at = Utc::now() - Duration::days(10);
        store
            .write_batch(&[old, log_event("fresh")], &MirrorSet::default(), None)
            .unwrap();

        assert_eq!(store.purge(Duration::days(5)).unwrap(), 1);
        assert_eq!(store.purge(Duration::days(5)).unwrap(), 0);
        assert_eq!(store.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_mirrors_written() {
        let (store, _temp) = create_test_store();
        let registry = crate::audit::MirrorRegistry::new();
        registry.model(Some("shop"), "Order").unwrap();
        let mirrors = registry.snapshot().unwrap();

        store.write_batch(&[], &mirrors, None).unwrap();
        assert_eq!(store.read_mirrors().unwrap(), mirrors);
    }

    #[test]
    fn test_corrupt_line_reported() {
        let (store, _temp) = create_test_store();
        std::fs::write(store.events_path(), "{broken\n").unwrap();
        assert!(matches!(store.read_all(), Err(AuditError::Json(_))));
    }
}
