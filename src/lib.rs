//! change-audit - change-tracking audit engine
//!
//! This library records what happens to persisted entities as a queryable
//! history: field-level diffs of creates, modifies and deletes, relationship
//! membership changes, HTTP request summaries and plain log messages. Every
//! event source is filtered through wildcard/regex scoping rules that can be
//! overridden per unit of work.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Settings, path management and the reloadable config handle
//! - `error`: Custom error types
//! - `scope`: Search patterns, matchers and per-unit-of-work overrides
//! - `models`: Events, mirrors, entity descriptors and IDs
//! - `audit`: Change detection, event assembly and the auditor pipeline
//! - `storage`: Event sinks and the JSONL event store
//! - `logging`: Tracing setup and the log-capture layer
//! - `display`: Terminal formatting of events and mirrors
//! - `export`: CSV, JSON and YAML export
//! - `cli`: Command handlers for the `change-audit` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use change_audit::config::AuditPaths;
//! use change_audit::storage::Storage;
//!
//! let storage = Storage::new(AuditPaths::new()?)?;
//! for event in storage.events.read_recent(10)? {
//!     println!("{}", event.summary());
//! }
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod scope;
pub mod storage;

pub use error::{AuditError, AuditResult};
