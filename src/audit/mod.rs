//! The audit engine
//!
//! Records create, modify and delete operations on entities, completed
//! requests and log messages as immutable events.
//!
//! # Architecture
//!
//! - `ScopeResolver` (in [`crate::scope`]) decides what is excluded.
//! - `ChangeDetector` compares before and after states field by field.
//! - `RelationshipProcessor` attributes many-to-many membership changes to
//!   the owning entity's field.
//! - `EventAssembler` builds events and deduplicates mirrors.
//! - `Auditor` runs these stages from lifecycle hooks and hands batches to an
//!   [`EventSink`](crate::storage::EventSink).
//!
//! # Example
//!
//! ```rust,ignore
//! use change_audit::audit::{Auditor, UnitOfWork};
//! use change_audit::config::ConfigHandle;
//!
//! let auditor = Auditor::new(Arc::new(ConfigHandle::default()), lookup, sink);
//! let mut uow = UnitOfWork::for_user("alice");
//!
//! auditor.before_write(&mut uow, &order);
//! repository.save(&order)?;
//! auditor.after_write(&mut uow, &order, false, None);
//!
//! auditor.finish(&mut uow);
//! ```

pub mod assembler;
pub mod context;
pub mod diff;
pub mod pipeline;
pub mod relationship;
pub mod request;

pub use assembler::{EventAssembler, MirrorRegistry, ModelDraft};
pub use context::{SnapshotMeta, UnitOfWork, WriteStage};
pub use diff::{describe_change, ChangeDetector, FieldChange, REDACTED};
pub use pipeline::Auditor;
pub use relationship::{RelatedEntity, RelationshipChange, RelationshipDelta, RelationshipProcessor};
pub use request::{Payload, RequestContext};
