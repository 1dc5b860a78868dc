//! Composite entity decomposition.
//!
//! Splits the free-text value of a composite entity into named sub-entities
//! using the lookup tables, numeric sub-types and nested composite
//! definitions held by a [`SchemaStore`].
//!
//! # Example
//! ```ignore
//! use nlu_compose::{CompositeDecomposer, SchemaStore};
//!
//! let store = SchemaStore::load_from_file("config/schema.yaml")?;
//! let decomposer = CompositeDecomposer::new(store);
//!
//! // {"protein": "chicken", "carbohydrates": "rice"}
//! let value = decomposer.decompose("meal", "rice and chicken");
//! ```

use indexmap::IndexMap;

use crate::entity::{Entity, EntityProcessor, EntityValue};
use crate::numeric::NumericSubType;
use crate::schema::{CompositeDefinition, SchemaStore};

/// Provenance name recorded on decomposed entities.
pub const DECOMPOSER_NAME: &str = "composite_entity_extractor";

type SubEntities = IndexMap<String, EntityValue>;

/// Splits composite entities into sub-entities.
///
/// Resolution goes at most one composite level below the entity's own type:
/// a nested composite only resolves lookup tables and numeric refs. This also
/// makes reference cycles in the schema harmless.
#[derive(Debug, Clone, Default)]
pub struct CompositeDecomposer {
    schema: SchemaStore,
}

impl CompositeDecomposer {
    pub fn new(schema: SchemaStore) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    /// Decompose `text` as an entity of type `entity_type`.
    ///
    /// Returns `None` when no composite definition is named `entity_type`.
    /// Every same-named definition contributes to one mapping; keys set by an
    /// earlier definition or ref are never overwritten.
    pub fn decompose(&self, entity_type: &str, text: &str) -> Option<EntityValue> {
        let definitions = self.schema.composite_definitions_named(entity_type);
        if definitions.is_empty() {
            return None;
        }

        let broad_value = text.to_lowercase();
        let mut output = SubEntities::new();

        for definition in definitions {
            self.split_definition(definition, &broad_value, &mut output);
        }

        tracing::debug!(
            entity = entity_type,
            value = text,
            sub_entities = output.len(),
            "Decomposed composite entity"
        );

        Some(EntityValue::Map(output))
    }

    /// Decompose a single entity in place.
    ///
    /// Returns true if the value was replaced. Values that are already a
    /// mapping are left alone.
    pub fn decompose_entity(&self, entity: &mut Entity) -> bool {
        if !entity.value.is_leaf() {
            return false;
        }

        let text = entity.value.to_string();
        match self.decompose(&entity.entity, &text) {
            Some(value) => {
                entity.value = value;
                entity.add_processor(DECOMPOSER_NAME);
                true
            }
            None => false,
        }
    }

    fn split_definition(
        &self,
        definition: &CompositeDefinition,
        broad_value: &str,
        output: &mut SubEntities,
    ) {
        for child in definition.tagged_refs() {
            self.resolve_leaf(child, broad_value, output);
            self.resolve_nested(child, broad_value, output);
        }
    }

    /// Lookup-table then numeric resolution for one tagged ref.
    fn resolve_leaf(&self, child: &str, broad_value: &str, output: &mut SubEntities) {
        for table in self.schema.lookup_tables_named(child) {
            if let Some(element) = table.find_in(broad_value) {
                insert_first(output, child, EntityValue::text(element));
                break;
            }
        }

        if let Some(kind) = NumericSubType::from_name(child) {
            match kind.extract(broad_value) {
                Some(number) => insert_first(output, child, EntityValue::Int(number)),
                None => tracing::trace!(child, "No numeric value found"),
            }
        }
    }

    /// Resolve `child` as a nested composite, one level deep.
    fn resolve_nested(&self, child: &str, broad_value: &str, output: &mut SubEntities) {
        if output.contains_key(child) {
            return;
        }

        let candidates = self.schema.composite_definitions_named(child);
        let Some(chosen) = most_relevant(candidates, broad_value) else {
            return;
        };

        let mut nested = SubEntities::new();
        for grandchild in chosen.tagged_refs() {
            self.resolve_leaf(grandchild, broad_value, &mut nested);
        }
        output.insert(child.to_string(), EntityValue::Map(nested));
    }
}

impl EntityProcessor for CompositeDecomposer {
    fn name(&self) -> &str {
        DECOMPOSER_NAME
    }

    fn process(&self, entities: &mut [Entity]) {
        for entity in entities.iter_mut() {
            self.decompose_entity(entity);
        }
    }
}

fn insert_first(output: &mut SubEntities, key: &str, value: EntityValue) {
    output.entry(key.to_string()).or_insert(value);
}

/// The candidate with the strictly highest positive relevance.
///
/// A tie for the top score, or no candidate scoring above zero, selects
/// nothing.
pub fn most_relevant<'a>(
    candidates: &'a [CompositeDefinition],
    broad_value: &str,
) -> Option<&'a CompositeDefinition> {
    let mut best: Option<&CompositeDefinition> = None;
    let mut best_score = 0;
    let mut tied = false;

    for candidate in candidates {
        let score = candidate.relevance(broad_value);
        if score > best_score {
            best = Some(candidate);
            best_score = score;
            tied = false;
        } else if score == best_score && score > 0 {
            tied = true;
        }
    }

    if tied {
        None
    } else {
        best
    }
}
