//! # nlu-compose: Composite Entity Decomposition and Synonym Normalization
//!
//! Post-processing for entities produced by an NLU recognizer.
//!
//! ## Features
//!
//! - **Composite decomposition**: split a coarse entity value such as
//!   `"rice and chicken"` into typed sub-entities using lookup tables, numeric
//!   sub-types (`@number`, `@year`) and nested composite definitions
//! - **Relevance disambiguation**: pick between same-named composite
//!   definitions by counting their entries found in the text
//! - **Synonym normalization**: map flat or decomposed values to a canonical
//!   form, exactly or by Levenshtein-based fuzzy match
//! - **Model persistence**: both stores round-trip through a model directory
//!
//! ## Example: Schema
//!
//! ```yaml
//! lookup_tables:
//!   - name: carbohydrates
//!     elements: [noodles, rice, yam]
//!   - name: protein
//!     elements: [chicken, egg, pork]
//! composite_entities:
//!   - name: meal
//!     composites: ["@protein", "@carbohydrates", "@number"]
//! ```
//!
//! ## Example: Pipeline
//!
//! ```ignore
//! use nlu_compose::{CompositeDecomposer, Entity, EntityProcessor, SynonymNormalizer};
//!
//! let mut entities = vec![Entity::new("meal", "rice and chicken")];
//! decomposer.process(&mut entities);
//! normalizer.process(&mut entities);
//! // entities[0].value == {"protein": "chicken", "carbohydrates": "rice"}
//! ```

pub mod config;
pub mod decompose;
pub mod entity;
pub mod error;
pub mod numeric;
pub mod persistence;
pub mod schema;
pub mod serialization;
pub mod synonyms;

pub use config::{EngineConfig, NormalizerConfig};
pub use decompose::{CompositeDecomposer, DECOMPOSER_NAME};
pub use entity::{Entity, EntityProcessor, EntityValue, Message};
pub use error::{Built, Error, Result, Warning};
pub use numeric::NumericSubType;
pub use persistence::ModelDir;
pub use schema::{
    validate_schema, ComponentRef, CompositeDefinition, LookupTable, SchemaDocument, SchemaStore,
};
pub use serialization::{parse_ndjson_line, read_ndjson, NdjsonWriter, SerializationError};
pub use synonyms::{SynonymNormalizer, SynonymTable, NORMALIZER_NAME};
