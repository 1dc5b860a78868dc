//! Entity records and the recursive entity value shared by both engines.
//!
//! An upstream recognizer hands over coarse entities whose value is plain
//! text. The decomposer turns that text into a mapping of sub-entities and the
//! synonym normalizer rewrites leaves to their canonical form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of an entity: a leaf or a mapping of named sub-entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    Int(i64),
    Float(f64),
    Map(IndexMap<String, EntityValue>),
}

impl EntityValue {
    pub fn text(value: impl Into<String>) -> Self {
        EntityValue::Text(value.into())
    }

    /// Returns true for a leaf value (anything but a mapping).
    pub fn is_leaf(&self) -> bool {
        !matches!(self, EntityValue::Map(_))
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, EntityValue>> {
        match self {
            EntityValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&EntityValue> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityValue::Text(s) => write!(f, "{}", s),
            EntityValue::Int(i) => write!(f, "{}", i),
            // Debug keeps the fractional part, so 2.0 renders as "2.0"
            EntityValue::Float(fl) => write!(f, "{:?}", fl),
            EntityValue::Map(map) => {
                // Rendered as JSON so nested values stay unambiguous
                let json = serde_json::to_string(map).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

impl From<&str> for EntityValue {
    fn from(value: &str) -> Self {
        EntityValue::Text(value.to_string())
    }
}

impl From<String> for EntityValue {
    fn from(value: String) -> Self {
        EntityValue::Text(value)
    }
}

impl From<i64> for EntityValue {
    fn from(value: i64) -> Self {
        EntityValue::Int(value)
    }
}

impl From<f64> for EntityValue {
    fn from(value: f64) -> Self {
        EntityValue::Float(value)
    }
}

impl From<IndexMap<String, EntityValue>> for EntityValue {
    fn from(value: IndexMap<String, EntityValue>) -> Self {
        EntityValue::Map(value)
    }
}

/// An entity as produced by the upstream recognizer.
///
/// Fields this crate does not know about (confidence, extractor, ...) are
/// kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Entity type, e.g. `meal`
    pub entity: String,

    pub value: EntityValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,

    /// Provenance: names of the stages that modified this entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processors: Vec<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Entity {
    pub fn new(entity: impl Into<String>, value: impl Into<EntityValue>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            start: None,
            end: None,
            processors: Vec::new(),
            extra: IndexMap::new(),
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Record that a stage modified this entity.
    pub fn add_processor(&mut self, name: &str) {
        self.processors.push(name.to_string());
    }

    pub fn was_processed_by(&self, name: &str) -> bool {
        self.processors.iter().any(|p| p == name)
    }
}

/// A user message and the entities recognized in it.
///
/// Used both as an inference record and as an annotated training example,
/// where entity offsets point into `text`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// A stage that rewrites entities in place.
///
/// The surrounding NLU pipeline calls `process` once per message with the
/// entity list of that message. Implementations never fail: anything that
/// cannot be resolved is left as it was.
pub trait EntityProcessor: Send + Sync {
    /// Stage name recorded in [`Entity::processors`].
    fn name(&self) -> &str;

    fn process(&self, entities: &mut [Entity]);
}
