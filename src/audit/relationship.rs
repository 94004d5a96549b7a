//! Many-to-many relationship deltas
//!
//! A membership change can be reported from either side of an association.
//! The field is always taken from the schema that declares the relationship
//! (matched by its `through` identifier), so a change reported from the
//! related side is attributed to each owning entity instead of being guessed
//! from call order.

use tracing::warn;

use crate::models::{EntityLookup, Instance, Operation};

/// Descriptive reference to the other side of a relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedEntity {
    pub type_name: String,
    pub application: Option<String>,
    pub key: String,
    pub repr: String,
}

impl RelatedEntity {
    pub fn from_instance(instance: &Instance) -> Self {
        let schema = instance.schema();
        Self {
            type_name: schema.type_name().to_string(),
            application: schema.application().map(str::to_string),
            key: instance.key().to_string(),
            repr: instance.repr(),
        }
    }
}

/// One added or removed relationship member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipChange {
    /// `Create` for additions, `Delete` for removals
    pub operation: Operation,
    pub field: String,
    pub related: RelatedEntity,
}

/// A membership change as reported by the entity owner
#[derive(Debug, Clone)]
pub struct RelationshipDelta {
    /// Instance whose membership set changed
    pub instance: Instance,
    /// Association identifier (join table / through model)
    pub through: String,
    /// Type of the entities identified by `keys`
    pub related_type: String,
    pub operation: Operation,
    pub keys: Vec<String>,
    /// `instance` is the related side; `keys` identify owners
    pub reverse: bool,
}

impl RelationshipDelta {
    /// Members added on the owning side
    pub fn added<I, S>(instance: Instance, through: &str, related_type: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(instance, through, related_type, Operation::Create, keys)
    }

    /// Members removed on the owning side
    pub fn removed<I, S>(instance: Instance, through: &str, related_type: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(instance, through, related_type, Operation::Delete, keys)
    }

    fn new<I, S>(
        instance: Instance,
        through: &str,
        related_type: &str,
        operation: Operation,
        keys: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instance,
            through: through.to_string(),
            related_type: related_type.to_string(),
            operation,
            keys: keys.into_iter().map(Into::into).collect(),
            reverse: false,
        }
    }

    /// Mark the change as reported from the related side
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Relationship changes attributed to one owning entity
#[derive(Debug, Clone)]
pub struct OwnerChanges {
    pub owner: Instance,
    pub changes: Vec<RelationshipChange>,
}

/// Turns relationship deltas into per-owner relationship changes
pub struct RelationshipProcessor<'a> {
    lookup: &'a dyn EntityLookup,
}

impl<'a> RelationshipProcessor<'a> {
    pub fn new(lookup: &'a dyn EntityLookup) -> Self {
        Self { lookup }
    }

    /// Process a delta; `is_excluded` decides for the authoritative owner
    ///
    /// Owners without any change are left out, so an empty result means no
    /// event.
    pub fn process<F>(&self, delta: &RelationshipDelta, mut is_excluded: F) -> Vec<OwnerChanges>
    where
        F: FnMut(&Instance, Operation) -> bool,
    {
        if !matches!(delta.operation, Operation::Create | Operation::Delete) {
            warn!(
                through = %delta.through,
                operation = %delta.operation,
                "Relationship change must add or remove members, skipping"
            );
            return Vec::new();
        }

        if delta.reverse {
            self.process_reverse(delta, &mut is_excluded)
        } else {
            self.process_forward(delta, &mut is_excluded)
        }
    }

    fn process_forward<F>(&self, delta: &RelationshipDelta, is_excluded: &mut F) -> Vec<OwnerChanges>
    where
        F: FnMut(&Instance, Operation) -> bool,
    {
        let owner = &delta.instance;
        let Some(relationship) = owner.schema().relationship_through(&delta.through) else {
            warn!(
                entity = %owner.identity(),
                through = %delta.through,
                "Cannot resolve relationship field, skipping"
            );
            return Vec::new();
        };

        if is_excluded(owner, delta.operation) {
            return Vec::new();
        }

        let changes: Vec<RelationshipChange> = delta
            .keys
            .iter()
            .map(|key| RelationshipChange {
                operation: delta.operation,
                field: relationship.field.clone(),
                related: self.related(&delta.related_type, key),
            })
            .collect();

        if changes.is_empty() {
            return Vec::new();
        }

        vec![OwnerChanges {
            owner: owner.clone(),
            changes,
        }]
    }

    fn process_reverse<F>(&self, delta: &RelationshipDelta, is_excluded: &mut F) -> Vec<OwnerChanges>
    where
        F: FnMut(&Instance, Operation) -> bool,
    {
        let related = RelatedEntity::from_instance(&delta.instance);
        let mut result = Vec::new();

        for key in &delta.keys {
            let Some(owner) = self.lookup.fetch(&delta.related_type, key) else {
                warn!(
                    entity_type = %delta.related_type,
                    key = %key,
                    through = %delta.through,
                    "Cannot resolve relationship owner, skipping"
                );
                continue;
            };

            let Some(relationship) = owner.schema().relationship_through(&delta.through) else {
                warn!(
                    entity = %owner.identity(),
                    through = %delta.through,
                    "Cannot resolve relationship field, skipping"
                );
                continue;
            };
            let field = relationship.field.clone();

            if is_excluded(&owner, delta.operation) {
                continue;
            }

            result.push(OwnerChanges {
                owner,
                changes: vec![RelationshipChange {
                    operation: delta.operation,
                    field,
                    related: related.clone(),
                }],
            });
        }

        result
    }

    /// Resolve a related entity, falling back to its type and key
    fn related(&self, related_type: &str, key: &str) -> RelatedEntity {
        match self.lookup.fetch(related_type, key) {
            Some(instance) => RelatedEntity::from_instance(&instance),
            None => {
                warn!(
                    entity_type = %related_type,
                    key = %key,
                    "Related entity not found, recording type and key only"
                );
                RelatedEntity {
                    type_name: related_type.to_string(),
                    application: None,
                    key: key.to_string(),
                    repr: format!("{} #{}", related_type, key),
                }
            }
        }
    }
}
