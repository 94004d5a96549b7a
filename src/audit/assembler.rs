//! Event assembly and mirror bookkeeping
//!
//! The assembler turns detector and relationship output into complete,
//! immutable [`Event`]s. Mirrors are get-or-create by (name, parent), so any
//! number of events about the same type produce one application row, one
//! model row and one row per field. Events themselves are never merged.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::error::{AuditError, AuditResult};
use crate::models::{
    ApplicationId, ApplicationMirror, EntityReference, Event, EventKind, FieldMirror,
    FieldMirrorId, FieldModification, Instance, MirrorSet, ModelEvent, ModelMirror, ModelMirrorId,
    Operation, RelationshipModification,
};

use super::diff::FieldChange;
use super::relationship::{RelatedEntity, RelationshipChange};

#[derive(Debug, Default)]
struct MirrorState {
    set: MirrorSet,
    applications: HashMap<String, ApplicationId>,
    models: HashMap<(Option<ApplicationId>, String), ModelMirrorId>,
    fields: HashMap<(ModelMirrorId, String), FieldMirrorId>,
}

impl MirrorState {
    fn from_set(set: MirrorSet) -> Self {
        let applications = set
            .applications
            .iter()
            .map(|a| (a.name.clone(), a.id))
            .collect();
        let models = set
            .models
            .iter()
            .map(|m| ((m.application, m.name.clone()), m.id))
            .collect();
        let fields = set
            .fields
            .iter()
            .map(|f| ((f.model, f.name.clone()), f.id))
            .collect();

        Self {
            set,
            applications,
            models,
            fields,
        }
    }
}

/// Deduplicating store of application, model and field mirrors
#[derive(Debug, Default)]
pub struct MirrorRegistry {
    state: RwLock<MirrorState>,
}

impl MirrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from previously persisted mirrors
    pub fn from_set(set: MirrorSet) -> Self {
        Self {
            state: RwLock::new(MirrorState::from_set(set)),
        }
    }

    fn write(&self) -> AuditResult<std::sync::RwLockWriteGuard<'_, MirrorState>> {
        self.state
            .write()
            .map_err(|e| AuditError::Storage(format!("Failed to acquire mirror lock: {}", e)))
    }

    /// Get or create the application mirror
    pub fn application(&self, name: &str) -> AuditResult<ApplicationId> {
        let mut state = self.write()?;
        Ok(application_in(&mut state, name))
    }

    /// Get or create the model mirror (and its application, if any)
    pub fn model(&self, application: Option<&str>, model: &str) -> AuditResult<ModelMirrorId> {
        let mut state = self.write()?;
        Ok(model_in(&mut state, application, model))
    }

    /// Get or create the field mirror; the type is recorded on creation only
    pub fn field(
        &self,
        model: ModelMirrorId,
        name: &str,
        type_repr: &str,
    ) -> AuditResult<FieldMirrorId> {
        let mut state = self.write()?;
        let key = (model, name.to_string());
        if let Some(id) = state.fields.get(&key) {
            return Ok(*id);
        }

        let mirror = FieldMirror {
            id: FieldMirrorId::new(),
            name: name.to_string(),
            model,
            type_repr: type_repr.to_string(),
            created_at: Utc::now(),
        };
        let id = mirror.id;
        state.set.fields.push(mirror);
        state.fields.insert(key, id);
        Ok(id)
    }

    /// Copy of all mirrors
    pub fn snapshot(&self) -> AuditResult<MirrorSet> {
        self.state
            .read()
            .map(|state| state.set.clone())
            .map_err(|e| AuditError::Storage(format!("Failed to acquire mirror lock: {}", e)))
    }
}

fn application_in(state: &mut MirrorState, name: &str) -> ApplicationId {
    if let Some(id) = state.applications.get(name) {
        return *id;
    }

    let mirror = ApplicationMirror {
        id: ApplicationId::new(),
        name: name.to_string(),
        created_at: Utc::now(),
    };
    let id = mirror.id;
    state.set.applications.push(mirror);
    state.applications.insert(name.to_string(), id);
    id
}

fn model_in(state: &mut MirrorState, application: Option<&str>, model: &str) -> ModelMirrorId {
    let application = application.map(|name| application_in(state, name));
    let key = (application, model.to_string());
    if let Some(id) = state.models.get(&key) {
        return *id;
    }

    let mirror = ModelMirror {
        id: ModelMirrorId::new(),
        name: model.to_string(),
        application,
        created_at: Utc::now(),
    };
    let id = mirror.id;
    state.set.models.push(mirror);
    state.models.insert(key, id);
    id
}

/// Everything needed to assemble one model event
#[derive(Debug)]
pub struct ModelDraft<'a> {
    pub user: Option<&'a str>,
    pub operation: Operation,
    pub instance: &'a Instance,
    pub changes: Vec<FieldChange>,
    pub relationships: Vec<RelationshipChange>,
    pub snapshot: Option<Value>,
    pub performance: Option<Duration>,
}

impl<'a> ModelDraft<'a> {
    pub fn new(operation: Operation, instance: &'a Instance) -> Self {
        Self {
            user: None,
            operation,
            instance,
            changes: Vec::new(),
            relationships: Vec::new(),
            snapshot: None,
            performance: None,
        }
    }
}

/// Builds events and keeps mirrors deduplicated
#[derive(Debug, Clone)]
pub struct EventAssembler {
    mirrors: Arc<MirrorRegistry>,
}

impl EventAssembler {
    pub fn new(mirrors: Arc<MirrorRegistry>) -> Self {
        Self { mirrors }
    }

    pub fn mirrors(&self) -> &MirrorRegistry {
        &self.mirrors
    }

    /// Reference to an entity through its model mirror
    pub fn reference(
        &self,
        type_name: &str,
        application: Option<&str>,
        key: &str,
        repr: &str,
    ) -> AuditResult<EntityReference> {
        Ok(EntityReference {
            model: self.mirrors.model(application, type_name)?,
            model_name: type_name.to_string(),
            application: application.map(str::to_string),
            primary_key: key.to_string(),
            value: repr.to_string(),
        })
    }

    fn related_reference(&self, related: &RelatedEntity) -> AuditResult<EntityReference> {
        self.reference(
            &related.type_name,
            related.application.as_deref(),
            &related.key,
            &related.repr,
        )
    }

    /// Assemble a model event: field modifications first, then relationship
    /// modifications, each in the order given
    pub fn assemble_model(&self, draft: ModelDraft<'_>) -> AuditResult<Event> {
        let schema = draft.instance.schema();
        let entity = self.reference(
            schema.type_name(),
            schema.application(),
            draft.instance.key(),
            &draft.instance.repr(),
        )?;

        let modifications = draft
            .changes
            .into_iter()
            .map(|change| {
                let field = self
                    .mirrors
                    .field(entity.model, &change.field, &change.field_type)?;
                Ok(FieldModification {
                    operation: change.operation,
                    field,
                    field_name: change.field,
                    field_type: change.field_type,
                    previous: change.previous,
                    current: change.current,
                })
            })
            .collect::<AuditResult<Vec<_>>>()?;

        let relationships = draft
            .relationships
            .into_iter()
            .map(|change| {
                let type_repr = format!("relationship<{}>", change.related.type_name);
                let field = self.mirrors.field(entity.model, &change.field, &type_repr)?;
                Ok(RelationshipModification {
                    operation: change.operation,
                    field,
                    related: self.related_reference(&change.related)?,
                    field_name: change.field,
                })
            })
            .collect::<AuditResult<Vec<_>>>()?;

        Ok(Event::new(EventKind::Model(ModelEvent {
            user: draft.user.map(str::to_string),
            operation: draft.operation,
            entity,
            modifications,
            relationships,
            snapshot: draft.snapshot,
            performance: draft.performance,
        })))
    }
}
