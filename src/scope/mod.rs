//! Exclusion scopes
//!
//! Patterns, the matcher, call-site overrides and the resolver that combines
//! them into include/exclude decisions.

pub mod matcher;
pub mod overrides;
pub mod pattern;
pub mod resolver;

pub use matcher::{matches, matches_any};
pub use overrides::{Directive, ModelOverride, OverrideRegistry, RequestOverride, Selection};
pub use pattern::{PatternKind, SearchPattern};
pub use resolver::ScopeResolver;
