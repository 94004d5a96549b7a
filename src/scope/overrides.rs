//! Call-site override registry
//!
//! Code can register "exclude" and "include" directives under a stable
//! call-site identifier, such as a function path (`shop::checkout::pay`) or
//! an entity's qualified name (`shop::models::Order`). Include directives win
//! over exclude directives at the same call site, and both win over the
//! static configuration. Registering the same call site again merges the new
//! directive into the existing one.
//!
//! A registry belongs to exactly one unit of work and is cleared with it.

use std::collections::{BTreeSet, HashMap};

use crate::models::Operation;

/// Either every member, or an explicit set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    /// An explicit, possibly empty, set
    pub fn only(items: impl IntoIterator<Item = T>) -> Self {
        Selection::Only(items.into_iter().collect())
    }

    /// The empty selection
    pub fn none() -> Self {
        Selection::Only(BTreeSet::new())
    }

    pub fn contains(&self, item: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(items) => items.contains(item),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Only(items) if items.is_empty())
    }

    /// Union of both selections; `All` absorbs everything
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Selection::All, _) | (_, Selection::All) => Selection::All,
            (Selection::Only(mut left), Selection::Only(right)) => {
                left.extend(right);
                Selection::Only(left)
            }
        }
    }
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

/// Directive for model operations and fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOverride {
    pub operations: Selection<Operation>,
    pub fields: Selection<String>,
}

impl ModelOverride {
    /// Every operation and every field
    pub fn everything() -> Self {
        Self {
            operations: Selection::All,
            fields: Selection::All,
        }
    }

    /// Only the given operations, no field-level directive
    pub fn operations(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            operations: Selection::only(operations),
            fields: Selection::none(),
        }
    }

    /// Only the given fields, no operation-level directive
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operations: Selection::none(),
            fields: Selection::only(fields.into_iter().map(Into::into)),
        }
    }

    /// Add field names to the directive
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra = Selection::only(fields.into_iter().map(Into::into));
        self.fields = std::mem::take(&mut self.fields).merge(extra);
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            operations: self.operations.merge(other.operations),
            fields: self.fields.merge(other.fields),
        }
    }
}

/// Directive for HTTP methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOverride {
    /// Upper-cased method names
    pub methods: Selection<String>,
}

impl RequestOverride {
    pub fn all_methods() -> Self {
        Self {
            methods: Selection::All,
        }
    }

    pub fn methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            methods: Selection::only(methods.into_iter().map(|m| m.as_ref().to_uppercase())),
        }
    }

    pub fn contains_method(&self, method: &str) -> bool {
        match &self.methods {
            Selection::All => true,
            Selection::Only(methods) => methods.contains(&method.to_uppercase()),
        }
    }
}

/// Direction of a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Include,
    Exclude,
}

/// Per-unit-of-work override maps
#[derive(Debug, Default, Clone)]
pub struct OverrideRegistry {
    models: HashMap<(Directive, String), ModelOverride>,
    requests: HashMap<(Directive, String), RequestOverride>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_model(&mut self, call_site: impl Into<String>, directive: ModelOverride) {
        self.register_model(Directive::Include, call_site.into(), directive);
    }

    pub fn exclude_model(&mut self, call_site: impl Into<String>, directive: ModelOverride) {
        self.register_model(Directive::Exclude, call_site.into(), directive);
    }

    pub fn include_request(&mut self, call_site: impl Into<String>, directive: RequestOverride) {
        self.register_request(Directive::Include, call_site.into(), directive);
    }

    pub fn exclude_request(&mut self, call_site: impl Into<String>, directive: RequestOverride) {
        self.register_request(Directive::Exclude, call_site.into(), directive);
    }

    fn register_model(&mut self, direction: Directive, call_site: String, directive: ModelOverride) {
        let key = (direction, call_site);
        let merged = match self.models.remove(&key) {
            Some(existing) => existing.merge(directive),
            None => directive,
        };
        self.models.insert(key, merged);
    }

    fn register_request(
        &mut self,
        direction: Directive,
        call_site: String,
        directive: RequestOverride,
    ) {
        let key = (direction, call_site);
        let merged = match self.requests.remove(&key) {
            Some(existing) => RequestOverride {
                methods: existing.methods.merge(directive.methods),
            },
            None => directive,
        };
        self.requests.insert(key, merged);
    }

    pub fn model(&self, direction: Directive, call_site: &str) -> Option<&ModelOverride> {
        self.models.get(&(direction, call_site.to_string()))
    }

    pub fn request(&self, direction: Directive, call_site: &str) -> Option<&RequestOverride> {
        self.requests.get(&(direction, call_site.to_string()))
    }

    /// Model directives registered under any of `call_sites`
    pub fn models_for<'a>(
        &'a self,
        direction: Directive,
        call_sites: &'a [String],
    ) -> impl Iterator<Item = &'a ModelOverride> + 'a {
        call_sites
            .iter()
            .filter_map(move |site| self.model(direction, site))
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty() && self.requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.models.clear();
        self.requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_merge() {
        let left = Selection::only([1, 2]);
        let right = Selection::only([3]);
        assert_eq!(left.merge(right), Selection::only([1, 2, 3]));

        let all: Selection<i32> = Selection::All;
        assert_eq!(all.merge(Selection::only([1])), Selection::All);
        assert!(Selection::<i32>::none().is_empty());
        assert!(!Selection::<i32>::All.is_empty());
    }

    #[test]
    fn test_model_overrides_accumulate() {
        let mut registry = OverrideRegistry::new();
        registry.exclude_model("shop::pay", ModelOverride::operations([Operation::Create]));
        registry.exclude_model("shop::pay", ModelOverride::operations([Operation::Delete]));

        let directive = registry.model(Directive::Exclude, "shop::pay").unwrap();
        assert!(directive.operations.contains(&Operation::Create));
        assert!(directive.operations.contains(&Operation::Delete));
        assert!(!directive.operations.contains(&Operation::Modify));
        assert!(registry.model(Directive::Include, "shop::pay").is_none());
    }

    #[test]
    fn test_with_fields() {
        let directive = ModelOverride::operations([Operation::Modify]).with_fields(["secret"]);
        assert!(directive.fields.contains(&"secret".to_string()));
        assert!(!directive.fields.contains(&"status".to_string()));
    }

    #[test]
    fn test_request_methods_case_insensitive() {
        let mut registry = OverrideRegistry::new();
        registry.include_request("shop::views::list", RequestOverride::methods(["get"]));
        registry.include_request("shop::views::list", RequestOverride::methods(["Post"]));

        let directive = registry.request(Directive::Include, "shop::views::list").unwrap();
        assert!(directive.contains_method("GET"));
        assert!(directive.contains_method("post"));
        assert!(!directive.contains_method("DELETE"));
    }

    #[test]
    fn test_models_for_multiple_call_sites() {
        let mut registry = OverrideRegistry::new();
        registry.include_model("shop::models::Order", ModelOverride::everything());

        let sites = vec!["shop::pay".to_string(), "shop::models::Order".to_string()];
        assert_eq!(registry.models_for(Directive::Include, &sites).count(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
