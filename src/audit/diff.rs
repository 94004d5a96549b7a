//! Change detection
//!
//! Compares the persisted state of an entity with its state at write time
//! and produces one [`FieldChange`] per added, removed or changed field.
//! Values are kept as text so events stay meaningful after the audited type
//! changes.
//!
//! Keys starting with `_` are internal and never compared. JSON `null` and a
//! missing key both mean "no value"; a string such as `"None"` is an ordinary
//! value.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::models::{EntityDescriptor, Instance, Operation};
use crate::scope::{OverrideRegistry, ScopeResolver};

/// Replacement text for masked values
pub const REDACTED: &str = "<REDACTED>";

/// Longest value shown by [`describe_change`]
const DESCRIBE_LIMIT: usize = 50;

/// One field-level difference, before mirrors are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub operation: Operation,
    pub field: String,
    pub field_type: String,
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// Text representation of a stored value; `null` has none
pub fn value_repr(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Fallback type name for undeclared fields
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Keys that take part in the comparison
fn tracked_keys(state: &Map<String, Value>) -> BTreeSet<&str> {
    state
        .iter()
        .filter(|(key, value)| !key.starts_with('_') && !value.is_null())
        .map(|(key, _)| key.as_str())
        .collect()
}

fn field_type(schema: &dyn EntityDescriptor, field: &str, value: &Value) -> String {
    schema
        .field_type(field)
        .map(str::to_string)
        .unwrap_or_else(|| json_type(value).to_string())
}

/// Raw differences between two states: additions, then removals, then
/// changes, each group in key order
pub fn diff_states(
    previous: &Map<String, Value>,
    current: &Map<String, Value>,
    schema: &dyn EntityDescriptor,
) -> Vec<FieldChange> {
    let before = tracked_keys(previous);
    let after = tracked_keys(current);
    let mut changes = Vec::new();

    for key in after.difference(&before) {
        let value = &current[*key];
        changes.push(FieldChange {
            operation: Operation::Create,
            field: key.to_string(),
            field_type: field_type(schema, key, value),
            previous: None,
            current: value_repr(value),
        });
    }

    for key in before.difference(&after) {
        let value = &previous[*key];
        changes.push(FieldChange {
            operation: Operation::Delete,
            field: key.to_string(),
            field_type: field_type(schema, key, value),
            previous: value_repr(value),
            current: None,
        });
    }

    for key in before.intersection(&after) {
        let (old, new) = (&previous[*key], &current[*key]);
        if old != new {
            changes.push(FieldChange {
                operation: Operation::Modify,
                field: key.to_string(),
                field_type: field_type(schema, key, new),
                previous: value_repr(old),
                current: value_repr(new),
            });
        }
    }

    changes
}

/// Field-level change detection with exclusion and masking applied
pub struct ChangeDetector<'a> {
    resolver: &'a ScopeResolver,
    overrides: &'a OverrideRegistry,
    call_sites: &'a [String],
}

impl<'a> ChangeDetector<'a> {
    pub fn new(
        resolver: &'a ScopeResolver,
        overrides: &'a OverrideRegistry,
        call_sites: &'a [String],
    ) -> Self {
        Self {
            resolver,
            overrides,
            call_sites,
        }
    }

    /// Changes between `previous` (absent for a first write) and the
    /// instance's current state
    pub fn detect(
        &self,
        previous: Option<&Map<String, Value>>,
        instance: &Instance,
    ) -> Vec<FieldChange> {
        let empty = Map::new();
        let previous = previous.unwrap_or(&empty);
        self.finish(diff_states(previous, instance.state(), instance.schema()), instance)
    }

    /// Every tracked field of `previous` reported as removed
    pub fn detect_removal(
        &self,
        previous: &Map<String, Value>,
        instance: &Instance,
    ) -> Vec<FieldChange> {
        let empty = Map::new();
        self.finish(diff_states(previous, &empty, instance.schema()), instance)
    }

    fn finish(&self, changes: Vec<FieldChange>, instance: &Instance) -> Vec<FieldChange> {
        changes
            .into_iter()
            .filter(|change| {
                !self
                    .resolver
                    .resolve_field(&change.field, instance, self.overrides, self.call_sites)
            })
            .map(|change| self.mask(change))
            .collect()
    }

    fn mask(&self, mut change: FieldChange) -> FieldChange {
        if self.resolver.is_masked(&change.field) {
            change.previous = change.previous.map(|_| REDACTED.to_string());
            change.current = change.current.map(|_| REDACTED.to_string());
        }
        change
    }
}

/// Keep only changes to the given fields
pub fn restrict_to(changes: Vec<FieldChange>, fields: &[String]) -> Vec<FieldChange> {
    changes
        .into_iter()
        .filter(|change| fields.iter().any(|f| f == &change.field))
        .collect()
}

/// Human-readable description of one change, e.g. `status: "new" -> "paid"`
pub fn describe_change(field: &str, previous: Option<&str>, current: Option<&str>) -> String {
    match (previous, current) {
        (None, Some(current)) => format!("{}: (added) -> {}", field, format_value(current)),
        (Some(previous), None) => format!("{}: {} -> (removed)", field, format_value(previous)),
        (Some(previous), Some(current)) => format!(
            "{}: {} -> {}",
            field,
            format_value(previous),
            format_value(current)
        ),
        (None, None) => format!("{}: (unchanged)", field),
    }
}

/// Quote and truncate a value for display
fn format_value(value: &str) -> String {
    if value.chars().count() > DESCRIBE_LIMIT {
        let truncated: String = value.chars().take(DESCRIBE_LIMIT - 3).collect();
        format!("\"{}...\"", truncated)
    } else {
        format!("\"{}\"", value)
    }
}
