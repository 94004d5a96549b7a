//! The audit pipeline
//!
//! [`Auditor`] is what the entity and request lifecycles call into. Each hook
//! takes one settings snapshot, runs scope resolution, change detection and
//! assembly for a single occurrence, and queues the resulting event on the
//! [`UnitOfWork`]. [`Auditor::flush`] hands the queued events to the sink as
//! one batch.
//!
//! Hooks never return errors or panic to their caller. Failures are reported
//! through `tracing` at error level and the occurrence is dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::{ConfigHandle, Module, Settings};
use crate::error::AuditResult;
use crate::logging::{self, LogRecord};
use crate::models::{
    EntityKey, EntityLookup, Event, EventKind, Instance, ModelEvent, Operation, UnspecifiedEvent,
};
use crate::scope::ScopeResolver;
use crate::storage::EventSink;

use super::assembler::{EventAssembler, MirrorRegistry, ModelDraft};
use super::context::{SnapshotMeta, UnitOfWork, WriteStage};
use super::diff::{restrict_to, ChangeDetector, REDACTED};
use super::relationship::{RelationshipDelta, RelationshipProcessor};
use super::request::RequestContext;

/// Entry point of the audit engine
pub struct Auditor {
    config: Arc<ConfigHandle>,
    lookup: Arc<dyn EntityLookup>,
    assembler: EventAssembler,
    sink: Arc<dyn EventSink>,
}

impl Auditor {
    pub fn new(
        config: Arc<ConfigHandle>,
        lookup: Arc<dyn EntityLookup>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_mirrors(config, lookup, sink, Arc::new(MirrorRegistry::new()))
    }

    /// Continue with mirrors loaded from an earlier run
    pub fn with_mirrors(
        config: Arc<ConfigHandle>,
        lookup: Arc<dyn EntityLookup>,
        sink: Arc<dyn EventSink>,
        mirrors: Arc<MirrorRegistry>,
    ) -> Self {
        Self {
            config,
            lookup,
            assembler: EventAssembler::new(mirrors),
            sink,
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn mirrors(&self) -> &MirrorRegistry {
        self.assembler.mirrors()
    }

    /// Capture the persisted state of an entity about to be written
    pub fn before_write(&self, uow: &mut UnitOfWork, instance: &Instance) {
        self.guarded("before_write", || {
            let settings = self.config.load();
            if !settings.is_enabled(Module::Model) {
                return Ok(());
            }

            let schema = instance.schema();
            let previous = self.lookup.previous_state(schema.type_name(), instance.key());
            let operation = if previous.is_some() {
                Operation::Modify
            } else {
                Operation::Create
            };

            let resolver = ScopeResolver::new(Arc::clone(&settings));
            let sites = ScopeResolver::model_call_sites(uow.call_site(), instance);
            let excluded = resolver.resolve_model(instance, operation, uow.overrides(), &sites);

            let meta = uow.snapshot_mut(&instance.identity());
            *meta = SnapshotMeta::default();
            meta.record_exclusion(operation, excluded);

            if !excluded {
                meta.previous = previous;
                if settings.model.performance {
                    meta.started = Some(Instant::now());
                }
            }
            Ok(())
        })
    }

    /// Diff and queue an event for a completed create or update
    ///
    /// `update_fields` limits the changeset to the fields the write touched.
    pub fn after_write(
        &self,
        uow: &mut UnitOfWork,
        instance: &Instance,
        created: bool,
        update_fields: Option<&[String]>,
    ) {
        self.guarded("after_write", || {
            let settings = self.config.load();
            if !settings.is_enabled(Module::Model) {
                return Ok(());
            }

            let operation = if created {
                Operation::Create
            } else {
                Operation::Modify
            };
            let resolver = ScopeResolver::new(Arc::clone(&settings));
            let sites = ScopeResolver::model_call_sites(uow.call_site(), instance);
            let key = instance.identity();

            if model_excluded(&resolver, uow, instance, operation, &sites) {
                uow.discard(&key);
                debug!(entity = %instance.identity(), %operation, "Write excluded from audit");
                return Ok(());
            }

            let (previous, started) = {
                let meta = uow.snapshot_mut(&key);
                (meta.previous.take(), meta.started.take())
            };

            let detector = ChangeDetector::new(&resolver, uow.overrides(), &sites);
            let mut changes = detector.detect(previous.as_ref(), instance);
            if let Some(fields) = update_fields {
                changes = restrict_to(changes, fields);
            }

            if operation == Operation::Modify && changes.is_empty() {
                uow.discard(&key);
                debug!(entity = %instance.identity(), "No audited field changed");
                return Ok(());
            }

            {
                let meta = uow.snapshot_mut(&key);
                meta.changes = changes;
                meta.stage = WriteStage::Diffed;
            }

            let changes = std::mem::take(&mut uow.snapshot_mut(&key).changes);
            let mut draft = ModelDraft::new(operation, instance);
            draft.user = uow.user();
            draft.changes = changes;
            draft.snapshot = settings
                .model
                .snapshot
                .then(|| masked_snapshot(&resolver, instance.state()));
            draft.performance = started.map(|s| s.elapsed());

            let event = self.assembler.assemble_model(draft)?;
            self.queue_model(&settings, uow, &key, event);
            Ok(())
        })
    }

    /// Queue an event for a deleted entity; every field is reported removed
    pub fn after_delete(&self, uow: &mut UnitOfWork, instance: &Instance) {
        self.guarded("after_delete", || {
            let settings = self.config.load();
            if !settings.is_enabled(Module::Model) {
                return Ok(());
            }

            let resolver = ScopeResolver::new(Arc::clone(&settings));
            let sites = ScopeResolver::model_call_sites(uow.call_site(), instance);
            let key = instance.identity();

            if model_excluded(&resolver, uow, instance, Operation::Delete, &sites) {
                uow.discard(&key);
                return Ok(());
            }

            let (previous, started) = {
                let meta = uow.snapshot_mut(&key);
                (meta.previous.take(), meta.started.take())
            };
            let previous = previous.unwrap_or_else(|| instance.state().clone());

            let detector = ChangeDetector::new(&resolver, uow.overrides(), &sites);
            let mut draft = ModelDraft::new(Operation::Delete, instance);
            draft.user = uow.user();
            draft.changes = detector.detect_removal(&previous, instance);
            draft.snapshot = settings
                .model
                .snapshot
                .then(|| masked_snapshot(&resolver, &previous));
            draft.performance = started.map(|s| s.elapsed());

            let event = self.assembler.assemble_model(draft)?;
            self.queue_model(&settings, uow, &key, event);
            Ok(())
        })
    }

    /// Queue one event per owning entity whose relationship set changed
    pub fn after_relationship_change(&self, uow: &mut UnitOfWork, delta: &RelationshipDelta) {
        self.guarded("after_relationship_change", || {
            let settings = self.config.load();
            if !settings.is_enabled(Module::Model) {
                return Ok(());
            }

            let resolver = ScopeResolver::new(Arc::clone(&settings));
            let processor = RelationshipProcessor::new(self.lookup.as_ref());
            let call_site = uow.call_site();
            let overrides = uow.overrides();

            let owners = processor.process(delta, |owner, operation| {
                let sites = ScopeResolver::model_call_sites(call_site, owner);
                resolver.resolve_model(owner, operation, overrides, &sites)
            });

            let mut events = Vec::new();
            for owner in owners {
                let sites = ScopeResolver::model_call_sites(call_site, &owner.owner);
                let changes: Vec<_> = owner
                    .changes
                    .into_iter()
                    .filter(|c| !resolver.resolve_field(&c.field, &owner.owner, overrides, &sites))
                    .collect();
                if changes.is_empty() {
                    continue;
                }

                let mut draft = ModelDraft::new(Operation::Modify, &owner.owner);
                draft.user = uow.user();
                draft.relationships = changes;
                events.push(self.assembler.assemble_model(draft)?);
            }

            for event in events {
                if let Some(model) = event.as_model() {
                    log_model_event(&settings, model);
                }
                uow.push_event(event);
            }
            Ok(())
        })
    }

    /// Queue an event for a completed request unless it is excluded
    pub fn record_request(&self, uow: &mut UnitOfWork, request: &RequestContext) {
        self.guarded("record_request", || {
            let settings = self.config.load();
            if !settings.is_enabled(Module::Request) {
                return Ok(());
            }

            let resolver = ScopeResolver::new(Arc::clone(&settings));
            if resolver.resolve_request(request, uow.overrides(), uow.call_site()) {
                debug!(method = %request.method, uri = %request.uri, "Request excluded from audit");
                return Ok(());
            }

            let event = Event::new(EventKind::Request(
                request.to_event(uow.user(), &settings.request),
            ));
            logging::emit(settings.request.loglevel, &event.summary());
            uow.push_event(event);
            Ok(())
        })
    }

    /// Persist a log record right away
    ///
    /// Records below `unspecified.loglevel` are ignored.
    pub fn record_log(&self, record: &LogRecord) {
        self.guarded("record_log", || {
            let settings = self.config.load();
            if !settings.is_enabled(Module::Unspecified)
                || record.level < settings.unspecified.loglevel
            {
                return Ok(());
            }

            let resolver = ScopeResolver::new(Arc::clone(&settings));
            if resolver.resolve_unspecified(record) {
                return Ok(());
            }

            let event = Event::new(EventKind::Unspecified(UnspecifiedEvent {
                message: record.message.clone(),
                level: record.level,
                file: record.file.clone(),
                line: record.line,
                application: record.application().map(str::to_string),
            }));
            let mirrors = self.assembler.mirrors().snapshot()?;
            self.sink
                .write_batch(&[event], &mirrors, settings.retention.max_age())
        })
    }

    /// Write all queued events as one batch
    ///
    /// A failed batch is reported and dropped, never retried.
    pub fn flush(&self, uow: &mut UnitOfWork) {
        self.guarded("flush", || {
            let events = uow.take_pending();
            if events.is_empty() {
                return Ok(());
            }

            let settings = self.config.load();
            let written = self
                .assembler
                .mirrors()
                .snapshot()
                .and_then(|mirrors| self.sink.write_batch(&events, &mirrors, settings.retention.max_age()));

            match written {
                Ok(()) => debug!(count = events.len(), "Persisted audit batch"),
                Err(e) => {
                    error!(dropped = events.len(), error = %e, "Failed to persist audit batch, dropping it")
                }
            }
            Ok(())
        })
    }

    /// Flush and clear the unit of work for reuse
    pub fn finish(&self, uow: &mut UnitOfWork) {
        self.flush(uow);
        uow.teardown();
    }

    fn queue_model(
        &self,
        settings: &Settings,
        uow: &mut UnitOfWork,
        key: &EntityKey,
        event: Event,
    ) {
        if let Some(model) = event.as_model() {
            log_model_event(settings, model);
        }
        uow.discard(key);
        uow.push_event(event);
    }

    /// Run a hook so that neither an error nor a panic reaches the caller
    fn guarded<F>(&self, hook: &'static str, body: F)
    where
        F: FnOnce() -> AuditResult<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(hook, error = %e, "Audit hook failed"),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(hook, panic = %message, "Audit hook panicked");
            }
        }
    }
}

/// Cached exclusion decision for an entity write, resolved on first use
fn model_excluded(
    resolver: &ScopeResolver,
    uow: &mut UnitOfWork,
    instance: &Instance,
    operation: Operation,
    sites: &[String],
) -> bool {
    let key = instance.identity();
    if let Some(cached) = uow
        .snapshot(&key)
        .and_then(|meta| meta.cached_exclusion(operation))
    {
        return cached;
    }

    let excluded = resolver.resolve_model(instance, operation, uow.overrides(), sites);
    uow.snapshot_mut(&key).record_exclusion(operation, excluded);
    excluded
}

/// Entity state with internal keys dropped and masked values redacted
fn masked_snapshot(resolver: &ScopeResolver, state: &Map<String, Value>) -> Value {
    let masked = state
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| {
            let value = if !value.is_null() && resolver.is_masked(key) {
                Value::String(REDACTED.to_string())
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(masked)
}

/// `alice modified shop.Order | Instance: Order #1 | Modifications: ~status`
fn log_model_event(settings: &Settings, event: &ModelEvent) {
    let mut line = event.headline();
    if settings.model.detailed_message && event.operation == Operation::Modify {
        let changes = event.changes_summary();
        if !changes.is_empty() {
            line.push_str(" | Modifications: ");
            line.push_str(&changes);
        }
    }
    logging::emit(settings.model.loglevel, &line);
}
