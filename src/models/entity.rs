//! Entity descriptors and instances
//!
//! The audit engine never reflects over application types. Whatever owns the
//! entities (an ORM, a repository layer) hands the engine a descriptor per
//! entity type and snapshots of instance state as JSON objects.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use super::operation::Operation;

/// A declared, persistent field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared type, recorded as-is in field mirrors
    pub type_name: String,
}

/// A many-to-many relationship declared on the owning type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    /// Field name on the owning type
    pub field: String,
    /// Type name of the related entities
    pub target: String,
    /// Identifier of the association (join table / through model)
    pub through: String,
}

/// Capability interface the entity owner provides for each entity type
pub trait EntityDescriptor: Send + Sync + fmt::Debug {
    /// Type name, e.g. `Order`
    fn type_name(&self) -> &str;

    /// Owning application, `None` when it cannot be determined
    fn application(&self) -> Option<&str>;

    /// Module path of the type, e.g. `shop::models`
    fn module_path(&self) -> &str;

    /// Declared persistent fields
    fn fields(&self) -> &[FieldDescriptor];

    /// Declared many-to-many relationships
    fn relationships(&self) -> &[RelationshipDescriptor] {
        &[]
    }

    /// Complete opt-out from auditing
    fn is_ignored(&self) -> bool {
        false
    }

    /// Operations this type opts out of
    fn ignored_operations(&self) -> BTreeSet<Operation> {
        BTreeSet::new()
    }

    /// Fields this type never records
    fn ignored_fields(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// `module_path` joined with the type name using the module path's own separator
    fn qualified_name(&self) -> String {
        let module = self.module_path();
        if module.is_empty() {
            self.type_name().to_string()
        } else if module.contains("::") {
            format!("{}::{}", module, self.type_name())
        } else {
            format!("{}.{}", module, self.type_name())
        }
    }

    /// Declared type of a field
    fn field_type(&self, name: &str) -> Option<&str> {
        self.fields()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.type_name.as_str())
    }

    /// Relationship declared through the given association
    fn relationship_through(&self, through: &str) -> Option<&RelationshipDescriptor> {
        self.relationships().iter().find(|r| r.through == through)
    }
}

/// Plain descriptor built with a fluent API
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    type_name: String,
    application: Option<String>,
    module_path: String,
    fields: Vec<FieldDescriptor>,
    relationships: Vec<RelationshipDescriptor>,
    ignored: bool,
    ignored_operations: BTreeSet<Operation>,
    ignored_fields: BTreeSet<String>,
}

impl EntitySchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn module_path(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = module_path.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    pub fn relationship(
        mut self,
        field: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        self.relationships.push(RelationshipDescriptor {
            field: field.into(),
            target: target.into(),
            through: through.into(),
        });
        self
    }

    /// Opt the whole type out of auditing
    pub fn ignore_all(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn ignore_operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.ignored_operations.extend(operations);
        self
    }

    pub fn ignore_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn into_arc(self) -> Arc<dyn EntityDescriptor> {
        Arc::new(self)
    }
}

impl EntityDescriptor for EntitySchema {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    fn module_path(&self) -> &str {
        &self.module_path
    }

    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    fn is_ignored(&self) -> bool {
        self.ignored
    }

    fn ignored_operations(&self) -> BTreeSet<Operation> {
        self.ignored_operations.clone()
    }

    fn ignored_fields(&self) -> BTreeSet<String> {
        self.ignored_fields.clone()
    }
}

/// Identity of an entity instance: type name plus primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub entity_type: String,
    pub key: String,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.key)
    }
}

/// An entity instance as seen at one lifecycle hook
#[derive(Debug, Clone)]
pub struct Instance {
    schema: Arc<dyn EntityDescriptor>,
    key: String,
    state: Map<String, Value>,
    repr: Option<String>,
}

impl Instance {
    /// Create an instance; a non-object `state` is treated as empty
    pub fn new(schema: Arc<dyn EntityDescriptor>, key: impl Into<String>, state: Value) -> Self {
        let state = match state {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            schema,
            key: key.into(),
            state,
            repr: None,
        }
    }

    /// Set the human-readable representation
    pub fn with_repr(mut self, repr: impl Into<String>) -> Self {
        self.repr = Some(repr.into());
        self
    }

    pub fn schema(&self) -> &dyn EntityDescriptor {
        self.schema.as_ref()
    }

    pub fn schema_arc(&self) -> Arc<dyn EntityDescriptor> {
        Arc::clone(&self.schema)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Human-readable representation, `Type #key` unless one was given
    pub fn repr(&self) -> String {
        self.repr
            .clone()
            .unwrap_or_else(|| format!("{} #{}", self.schema.type_name(), self.key))
    }

    pub fn identity(&self) -> EntityKey {
        EntityKey {
            entity_type: self.schema.type_name().to_string(),
            key: self.key.clone(),
        }
    }
}

/// Entity lookups the audit engine needs from the entity owner
pub trait EntityLookup: Send + Sync {
    /// Persisted state before the write currently in flight
    fn previous_state(&self, entity_type: &str, key: &str) -> Option<Map<String, Value>>;

    /// Resolve an instance by type and key
    fn fetch(&self, entity_type: &str, key: &str) -> Option<Instance>;
}

/// In-memory entity registry implementing [`EntityLookup`]
///
/// Useful for embedding the engine in tests or in tools that replay writes.
#[derive(Debug, Default)]
pub struct InMemoryEntities {
    data: RwLock<HashMap<EntityKey, Instance>>,
}

impl InMemoryEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the committed state of an instance
    pub fn commit(&self, instance: &Instance) {
        if let Ok(mut data) = self.data.write() {
            data.insert(instance.identity(), instance.clone());
        }
    }

    /// Forget an instance
    pub fn remove(&self, entity_type: &str, key: &str) -> bool {
        let identity = EntityKey {
            entity_type: entity_type.to_string(),
            key: key.to_string(),
        };
        match self.data.write() {
            Ok(mut data) => data.remove(&identity).is_some(),
            Err(_) => false,
        }
    }
}

impl EntityLookup for InMemoryEntities {
    fn previous_state(&self, entity_type: &str, key: &str) -> Option<Map<String, Value>> {
        self.fetch(entity_type, key).map(|i| i.state.clone())
    }

    fn fetch(&self, entity_type: &str, key: &str) -> Option<Instance> {
        let identity = EntityKey {
            entity_type: entity_type.to_string(),
            key: key.to_string(),
        };
        self.data.read().ok()?.get(&identity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_schema() -> Arc<dyn EntityDescriptor> {
        EntitySchema::new("Order")
            .application("shop")
            .module_path("shop::models")
            .field("status", "CharField")
            .relationship("tags", "Tag", "order_tags")
            .into_arc()
    }

    #[test]
    fn test_qualified_name() {
        let schema = order_schema();
        assert_eq!(schema.qualified_name(), "shop::models::Order");

        let dotted = EntitySchema::new("Order").module_path("shop.models");
        assert_eq!(dotted.qualified_name(), "shop.models.Order");

        let bare = EntitySchema::new("Order");
        assert_eq!(bare.qualified_name(), "Order");
    }

    #[test]
    fn test_field_and_relationship_lookup() {
        let schema = order_schema();
        assert_eq!(schema.field_type("status"), Some("CharField"));
        assert_eq!(schema.field_type("missing"), None);
        assert_eq!(schema.relationship_through("order_tags").unwrap().field, "tags");
        assert!(schema.relationship_through("other").is_none());
    }

    #[test]
    fn test_instance_repr_default() {
        let instance = Instance::new(order_schema(), "7", json!({"status": "new"}));
        assert_eq!(instance.repr(), "Order #7");

        let named = instance.with_repr("Order for alice");
        assert_eq!(named.repr(), "Order for alice");
    }

    #[test]
    fn test_non_object_state_is_empty() {
        let instance = Instance::new(order_schema(), "7", json!("oops"));
        assert!(instance.state().is_empty());
    }

    #[test]
    fn test_in_memory_lookup() {
        let entities = InMemoryEntities::new();
        let instance = Instance::new(order_schema(), "1", json!({"status": "new"}));

        assert!(entities.previous_state("Order", "1").is_none());
        entities.commit(&instance);
        assert_eq!(
            entities.previous_state("Order", "1").unwrap().get("status"),
            Some(&json!("new"))
        );
        assert!(entities.remove("Order", "1"));
        assert!(entities.fetch("Order", "1").is_none());
    }
}
