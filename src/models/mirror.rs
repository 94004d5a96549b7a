//! Mirror records describing applications, entity types and fields
//!
//! Events reference mirrors instead of live types so history stays readable
//! after a type is renamed or removed. Each mirror is unique by name and
//! parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApplicationId, FieldMirrorId, ModelMirrorId};

/// An application that owns entity types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMirror {
    pub id: ApplicationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An entity type, unique by (name, application)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMirror {
    pub id: ModelMirrorId,
    pub name: String,
    /// `None` when the owning application could not be determined
    #[serde(default)]
    pub application: Option<ApplicationId>,
    pub created_at: DateTime<Utc>,
}

/// A field of an entity type, unique by (name, model)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMirror {
    pub id: FieldMirrorId,
    pub name: String,
    pub model: ModelMirrorId,
    /// Declared type at the time the field was first recorded
    pub type_repr: String,
    pub created_at: DateTime<Utc>,
}

/// All known mirrors, as persisted next to the event log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSet {
    #[serde(default)]
    pub applications: Vec<ApplicationMirror>,
    #[serde(default)]
    pub models: Vec<ModelMirror>,
    #[serde(default)]
    pub fields: Vec<FieldMirror>,
}

impl MirrorSet {
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.models.is_empty() && self.fields.is_empty()
    }

    pub fn application(&self, id: ApplicationId) -> Option<&ApplicationMirror> {
        self.applications.iter().find(|a| a.id == id)
    }

    pub fn model(&self, id: ModelMirrorId) -> Option<&ModelMirror> {
        self.models.iter().find(|m| m.id == id)
    }

    /// `application.Model` label for a model mirror, or the bare model name
    /// when it has no application
    pub fn model_label(&self, id: ModelMirrorId) -> Option<String> {
        let model = self.model(id)?;
        match model.application {
            Some(application) => {
                let application = self.application(application)?;
                Some(format!("{}.{}", application.name, model.name))
            }
            None => Some(model.name.clone()),
        }
    }
}
