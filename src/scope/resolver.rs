//! Exclusion decisions for entities, fields, requests and log records
//!
//! Every entry point answers "is this excluded?" and follows the same
//! precedence: call-site include, call-site exclude, static annotations on the
//! entity type, configured patterns, then the unknown-origin fallback. The
//! resolver holds one settings snapshot and never fails; an unmatched
//! candidate is simply not excluded.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::audit::request::RequestContext;
use crate::config::Settings;
use crate::logging::LogRecord;
use crate::models::{Instance, Operation};

use super::matcher::{matches, matches_any};
use super::overrides::{Directive, OverrideRegistry};

/// Evaluates exclusion scopes against a single settings snapshot
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    settings: Arc<Settings>,
}

impl ScopeResolver {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Call sites consulted for an entity: the active call site of the unit
    /// of work, then the entity's qualified type name
    pub fn model_call_sites(active: Option<&str>, instance: &Instance) -> Vec<String> {
        let mut sites = Vec::with_capacity(2);
        if let Some(active) = active {
            sites.push(active.to_string());
        }
        let qualified = instance.schema().qualified_name();
        if !sites.contains(&qualified) {
            sites.push(qualified);
        }
        sites
    }

    /// Is this operation on this entity excluded?
    pub fn resolve_model(
        &self,
        instance: &Instance,
        operation: Operation,
        overrides: &OverrideRegistry,
        call_sites: &[String],
    ) -> bool {
        if overrides
            .models_for(Directive::Include, call_sites)
            .any(|o| o.operations.contains(&operation))
        {
            return false;
        }

        if overrides
            .models_for(Directive::Exclude, call_sites)
            .any(|o| o.operations.contains(&operation))
        {
            return true;
        }

        let schema = instance.schema();
        if schema.is_ignored() || schema.ignored_operations().contains(&operation) {
            return true;
        }

        let exclude = &self.settings.model.exclude;
        let type_name = schema.type_name();
        let qualified = schema.qualified_name();
        let labelled = schema
            .application()
            .map(|app| format!("{}.{}", app, type_name));

        let mut candidates = vec![type_name, qualified.as_str()];
        if let Some(ref labelled) = labelled {
            candidates.push(labelled.as_str());
        }
        if matches_any(candidates, &exclude.models) {
            return true;
        }

        match schema.application() {
            Some(application) => matches(application, &exclude.applications),
            None => exclude.unknown,
        }
    }

    /// Is this field of this entity excluded?
    pub fn resolve_field(
        &self,
        field: &str,
        instance: &Instance,
        overrides: &OverrideRegistry,
        call_sites: &[String],
    ) -> bool {
        let field_name = field.to_string();

        if overrides
            .models_for(Directive::Include, call_sites)
            .any(|o| o.fields.contains(&field_name))
        {
            return false;
        }

        if overrides
            .models_for(Directive::Exclude, call_sites)
            .any(|o| o.fields.contains(&field_name))
        {
            return true;
        }

        let schema = instance.schema();
        if schema.ignored_fields().contains(field) {
            return true;
        }

        let typed = format!("{}.{}", schema.type_name(), field);
        let qualified = schema
            .application()
            .map(|app| format!("{}.{}", app, typed));

        let mut candidates = vec![field, typed.as_str()];
        if let Some(ref qualified) = qualified {
            candidates.push(qualified.as_str());
        }

        matches_any(candidates, &self.settings.model.exclude.fields)
    }

    /// Is this field's value redacted?
    pub fn is_masked(&self, field: &str) -> bool {
        matches(field, &self.settings.model.mask)
    }

    /// Is this completed request excluded?
    pub fn resolve_request(
        &self,
        request: &RequestContext,
        overrides: &OverrideRegistry,
        call_site: Option<&str>,
    ) -> bool {
        if let Some(site) = call_site {
            if overrides
                .request(Directive::Include, site)
                .is_some_and(|o| o.contains_method(&request.method))
            {
                return false;
            }

            if overrides
                .request(Directive::Exclude, site)
                .is_some_and(|o| o.contains_method(&request.method))
            {
                return true;
            }
        }

        let exclude = &self.settings.request.exclude;
        if exclude.methods.contains(&request.method.to_uppercase()) {
            return true;
        }

        if let Some(ref application) = request.application {
            if matches(application, &exclude.applications) {
                return true;
            }
        }

        if exclude.status.contains(&request.status) {
            return true;
        }

        request.application.is_none() && exclude.unknown
    }

    /// Is this log record excluded?
    pub fn resolve_unspecified(&self, record: &LogRecord) -> bool {
        let exclude = &self.settings.unspecified.exclude;

        if let Some(ref file) = record.file {
            let candidates = file_candidates(file);
            if matches_any(candidates.iter().map(String::as_str), &exclude.files) {
                return true;
            }
        }

        let application = record.application();
        if let Some(application) = application {
            if matches(application, &exclude.applications) {
                return true;
            }
        }

        exclude.unknown && (record.file.is_none() || application.is_none())
    }
}

/// Every form of a source path a `files` pattern may be written against:
/// the path itself, each trailing sub-path (down to the file name), each
/// directory name and each ancestor directory
pub fn file_candidates(path: &str) -> Vec<String> {
    let normalized = path.replace('\\', "/");
    let absolute = normalized.starts_with('/');
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    let mut seen = BTreeSet::new();
    let mut candidates = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && seen.insert(candidate.clone()) {
            candidates.push(candidate);
        }
    };

    push(normalized.clone());

    for start in 0..segments.len() {
        push(segments[start..].join("/"));
    }

    if let Some((_, directories)) = segments.split_last() {
        for directory in directories {
            push(directory.to_string());
        }
        for end in 1..=directories.len() {
            let ancestor = directories[..end].join("/");
            if absolute {
                push(format!("/{}", ancestor));
            }
            push(ancestor);
        }
    }

    candidates
}
