//! Core data models for change-audit
//!
//! This module contains the data structures the audit engine works with:
//! entity descriptors and instances, operations, mirror records and the
//! persisted events themselves.

pub mod entity;
pub mod event;
pub mod ids;
pub mod mirror;
pub mod operation;

pub use entity::{
    EntityDescriptor, EntityKey, EntityLookup, EntitySchema, FieldDescriptor, InMemoryEntities,
    Instance, RelationshipDescriptor,
};
pub use event::{
    EntityReference, Event, EventKind, FieldModification, ModelEvent, PayloadEncoding,
    PayloadRecord, RelationshipModification, RequestEvent, UnspecifiedEvent,
};
pub use ids::{ApplicationId, EventId, FieldMirrorId, ModelMirrorId};
pub use mirror::{ApplicationMirror, FieldMirror, ModelMirror, MirrorSet};
pub use operation::Operation;
