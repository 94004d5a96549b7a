//! Event records
//!
//! Every audited occurrence becomes exactly one immutable [`Event`]: a model
//! change, an HTTP request, or an unspecified log message. Values are stored
//! as text so history does not depend on how the audited types evolve.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{EventId, FieldMirrorId, ModelMirrorId};
use super::operation::Operation;
use crate::logging::LogLevel;

/// Reference to an entity through its model mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReference {
    pub model: ModelMirrorId,
    pub model_name: String,
    #[serde(default)]
    pub application: Option<String>,
    pub primary_key: String,
    /// Human-readable representation at the time of the event
    pub value: String,
}

impl EntityReference {
    /// `application.Model`, or just `Model` without an application
    pub fn label(&self) -> String {
        match self.application {
            Some(ref application) => format!("{}.{}", application, self.model_name),
            None => self.model_name.clone(),
        }
    }
}

/// One changed field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldModification {
    pub operation: Operation,
    pub field: FieldMirrorId,
    pub field_name: String,
    pub field_type: String,
    pub previous: Option<String>,
    pub current: Option<String>,
}

impl FieldModification {
    /// `~status`, `+note`, `-discount`
    pub fn short(&self) -> String {
        format!("{}{}", self.operation.short(), self.field_name)
    }
}

/// One added or removed relationship member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipModification {
    pub operation: Operation,
    pub field: FieldMirrorId,
    pub field_name: String,
    pub related: EntityReference,
}

impl RelationshipModification {
    /// `+tags[Tag #3]`
    pub fn short(&self) -> String {
        format!(
            "{}{}[{}]",
            self.operation.short(),
            self.field_name,
            self.related.value
        )
    }
}

/// Create/modify/delete of an entity, or a change of its relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvent {
    pub user: Option<String>,
    pub operation: Operation,
    pub entity: EntityReference,

    /// Field modifications in detection order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifications: Vec<FieldModification>,

    /// Relationship modifications in detection order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipModification>,

    /// Full entity state, when snapshots are enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,

    /// Time between before-write and after-write, when measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Duration>,
}

impl ModelEvent {
    /// `alice modified shop.Order | Instance: Order #1`
    pub fn headline(&self) -> String {
        format!(
            "{} {} {} | Instance: {}",
            self.user.as_deref().unwrap_or("Anonymous"),
            self.operation.past_tense(),
            self.entity.label(),
            self.entity.value
        )
    }

    /// `~status, +tags[Tag #3]`, empty when nothing changed
    pub fn changes_summary(&self) -> String {
        self.modifications
            .iter()
            .map(FieldModification::short)
            .chain(self.relationships.iter().map(RelationshipModification::short))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// How a captured payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Json,
    Text,
    Base64,
}

/// A captured request or response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub content_type: String,
    pub encoding: PayloadEncoding,
    pub content: Value,
}

/// A completed HTTP request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub user: Option<String>,
    pub method: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub status: u16,
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<PayloadRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<PayloadRecord>,
}

/// A log message from anywhere in the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspecifiedEvent {
    pub message: String,
    pub level: LogLevel,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub application: Option<String>,
}

/// The event payload, exactly one variant per event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventKind {
    Model(ModelEvent),
    Request(RequestEvent),
    Unspecified(UnspecifiedEvent),
}

/// A single persisted audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    /// When the event was assembled (UTC)
    pub created_at: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Wrap a payload with a fresh id and timestamp
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            created_at: Utc::now(),
            kind,
        }
    }

    /// `model`, `request` or `unspecified`
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::Model(_) => "model",
            EventKind::Request(_) => "request",
            EventKind::Unspecified(_) => "unspecified",
        }
    }

    pub fn as_model(&self) -> Option<&ModelEvent> {
        match &self.kind {
            EventKind::Model(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&RequestEvent> {
        match &self.kind {
            EventKind::Request(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_unspecified(&self) -> Option<&UnspecifiedEvent> {
        match &self.kind {
            EventKind::Unspecified(event) => Some(event),
            _ => None,
        }
    }

    /// One-line description without timestamp
    pub fn summary(&self) -> String {
        match &self.kind {
            EventKind::Model(event) => {
                let changes = event.changes_summary();
                if changes.is_empty() {
                    event.headline()
                } else {
                    format!("{} | Modifications: {}", event.headline(), changes)
                }
            }
            EventKind::Request(event) => format!(
                "{} performed {} {} ({})",
                event.user.as_deref().unwrap_or("Anonymous"),
                event.method,
                event.uri,
                event.status
            ),
            EventKind::Unspecified(event) => {
                let location = match (&event.file, event.line) {
                    (Some(file), Some(line)) => format!(" ({}:{})", file, line),
                    (Some(file), None) => format!(" ({})", file),
                    _ => String::new(),
                };
                format!("{} {}{}", event.level, event.message, location)
            }
        }
    }

    /// Format the event for human-readable output
    pub fn format_human_readable(&self) -> String {
        format!(
            "[{}] {} {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.kind_name().to_uppercase(),
            self.summary()
        )
    }
}
