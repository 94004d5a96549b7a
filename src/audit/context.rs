//! Unit-of-work context
//!
//! Everything the pipeline remembers between hooks lives here: the acting
//! user, the active call site, call-site overrides, per-entity snapshot
//! metadata and the events waiting to be flushed. A context is owned by one
//! execution context and passed by reference into every hook; nothing is
//! shared with concurrent units of work. [`UnitOfWork::teardown`] clears it
//! so a pooled worker can reuse it.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde_json::{Map, Value};

use crate::models::{EntityKey, Event, Operation};
use crate::scope::OverrideRegistry;

use super::diff::FieldChange;

/// Progress of one entity write through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStage {
    #[default]
    Untouched,
    ScopeChecked,
    Diffed,
}

/// Ephemeral metadata attached to an entity during one write
#[derive(Debug, Default)]
pub struct SnapshotMeta {
    pub stage: WriteStage,
    /// Cached exclusion decisions
    pub exclusion: BTreeMap<Operation, bool>,
    /// Persisted state captured before the write
    pub previous: Option<Map<String, Value>>,
    /// Pending changeset
    pub changes: Vec<FieldChange>,
    /// Start of the write, when performance is measured
    pub started: Option<Instant>,
}

impl SnapshotMeta {
    pub fn cached_exclusion(&self, operation: Operation) -> Option<bool> {
        self.exclusion.get(&operation).copied()
    }

    /// Record an exclusion decision and move to `ScopeChecked`
    pub fn record_exclusion(&mut self, operation: Operation, excluded: bool) {
        self.exclusion.insert(operation, excluded);
        if self.stage == WriteStage::Untouched {
            self.stage = WriteStage::ScopeChecked;
        }
    }
}

/// Request-scoped audit context
#[derive(Debug, Default)]
pub struct UnitOfWork {
    user: Option<String>,
    call_site: Option<String>,
    overrides: OverrideRegistry,
    snapshots: HashMap<EntityKey, SnapshotMeta>,
    pending: Vec<Event>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a unit of work for an authenticated user
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, user: Option<String>) {
        self.user = user;
    }

    /// Make `call_site` the active call site, returning the previous one
    pub fn enter(&mut self, call_site: impl Into<String>) -> Option<String> {
        self.call_site.replace(call_site.into())
    }

    /// Restore the call site returned by [`UnitOfWork::enter`]
    pub fn leave(&mut self, previous: Option<String>) {
        self.call_site = previous;
    }

    pub fn call_site(&self) -> Option<&str> {
        self.call_site.as_deref()
    }

    pub fn overrides(&self) -> &OverrideRegistry {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut OverrideRegistry {
        &mut self.overrides
    }

    pub fn snapshot(&self, key: &EntityKey) -> Option<&SnapshotMeta> {
        self.snapshots.get(key)
    }

    /// Metadata for an entity, created on first touch
    pub fn snapshot_mut(&mut self, key: &EntityKey) -> &mut SnapshotMeta {
        self.snapshots.entry(key.clone()).or_default()
    }

    /// Drop the metadata of a finished write
    pub fn discard(&mut self, key: &EntityKey) -> Option<SnapshotMeta> {
        self.snapshots.remove(key)
    }

    pub fn push_event(&mut self, event: Event) {
        self.pending.push(event);
    }

    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    /// Nothing is left over from previous work
    pub fn is_clean(&self) -> bool {
        self.snapshots.is_empty() && self.pending.is_empty() && self.overrides.is_empty()
    }

    /// Clear all state
    pub fn teardown(&mut self) {
        self.user = None;
        self.call_site = None;
        self.overrides.clear();
        self.snapshots.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ModelOverride;

    fn key() -> EntityKey {
        EntityKey {
            entity_type: "Order".to_string(),
            key: "1".to_string(),
        }
    }

    #[test]
    fn test_snapshot_created_lazily() {
        let mut uow = UnitOfWork::new();
        assert!(uow.snapshot(&key()).is_none());

        let meta = uow.snapshot_mut(&key());
        assert_eq!(meta.stage, WriteStage::Untouched);
        meta.record_exclusion(Operation::Modify, false);

        let meta = uow.snapshot(&key()).unwrap();
        assert_eq!(meta.stage, WriteStage::ScopeChecked);
        assert_eq!(meta.cached_exclusion(Operation::Modify), Some(false));
        assert_eq!(meta.cached_exclusion(Operation::Delete), None);
    }

    #[test]
    fn test_call_site_nesting() {
        let mut uow = UnitOfWork::for_user("alice");
        let outer = uow.enter("shop::checkout");
        let inner = uow.enter("shop::checkout::pay");
        assert_eq!(uow.call_site(), Some("shop::checkout::pay"));

        uow.leave(inner);
        assert_eq!(uow.call_site(), Some("shop::checkout"));
        uow.leave(outer);
        assert_eq!(uow.call_site(), None);
        assert_eq!(uow.user(), Some("alice"));
    }

    #[test]
    fn test_teardown_clears_everything() {
        let mut uow = UnitOfWork::for_user("alice");
        uow.enter("shop::checkout");
        uow.overrides_mut()
            .exclude_model("shop::checkout", ModelOverride::everything());
        uow.snapshot_mut(&key()).started = Some(Instant::now());

        assert!(!uow.is_clean());
        uow.teardown();
        assert!(uow.is_clean());
        assert_eq!(uow.user(), None);
        assert_eq!(uow.call_site(), None);
    }
}
