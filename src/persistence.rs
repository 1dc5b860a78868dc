//! Model directory persistence for the schema store and synonym table.
//!
//! Both artifacts are plain JSON documents written after training and read
//! back unmodified before inference. A missing artifact is not an error: the
//! corresponding store comes back empty together with a warning.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Built, Error, Result, Warning};
use crate::schema::{SchemaDocument, SchemaStore};
use crate::synonyms::SynonymTable;

pub const COMPOSITE_ENTITIES_FILE_NAME: &str = "composite_entities.json";
pub const ENTITY_SYNONYMS_FILE_NAME: &str = "entity_synonyms.json";

/// A directory holding persisted model artifacts.
#[derive(Debug, Clone)]
pub struct ModelDir {
    root: PathBuf,
}

impl ModelDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn schema_path(&self) -> PathBuf {
        self.root.join(COMPOSITE_ENTITIES_FILE_NAME)
    }

    pub fn synonyms_path(&self) -> PathBuf {
        self.root.join(ENTITY_SYNONYMS_FILE_NAME)
    }

    /// Write the schema artifact, creating the directory if needed.
    pub fn persist_schema(&self, store: &SchemaStore) -> Result<PathBuf> {
        let path = self.schema_path();
        self.write_json(&path, &store.to_document())?;
        tracing::info!("Persisted composite schema to {}", path.display());
        Ok(path)
    }

    /// Write the synonym artifact. An empty table is written as `{}` so the
    /// model loads back without a missing-state warning.
    pub fn persist_synonyms(&self, table: &SynonymTable) -> Result<PathBuf> {
        let path = self.synonyms_path();
        self.write_json(&path, table)?;
        tracing::info!("Persisted {} synonyms to {}", table.len(), path.display());
        Ok(path)
    }

    pub fn load_schema(&self) -> Result<Built<SchemaStore>> {
        let built = self.read_json::<SchemaDocument>(&self.schema_path())?;
        Ok(Built::with_warnings(
            built.value.map(SchemaStore::from_document).unwrap_or_default(),
            built.warnings,
        ))
    }

    pub fn load_synonyms(&self) -> Result<Built<SynonymTable>> {
        let built = self.read_json::<SynonymTable>(&self.synonyms_path())?;
        Ok(Built::with_warnings(built.value.unwrap_or_default(), built.warnings))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|source| Error::Io {
            path: self.root.clone(),
            source,
        })?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Built<Option<T>>> {
        if !path.is_file() {
            let warning = Warning::PersistedStateMissing {
                path: path.to_path_buf(),
            };
            tracing::warn!("{}", warning);
            return Ok(Built::with_warnings(None, vec![warning]));
        }

        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value = serde_json::from_str(&contents).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Built::new(Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CompositeDefinition, LookupTable};

    #[test]
    fn test_schema_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path().join("model"));

        let mut store = SchemaStore::new();
        store.add_lookup_table(LookupTable::new("protein", vec!["egg".into(), "chicken".into()]));
        store.add_composite_definitions(vec![CompositeDefinition::from_tokens(
            "meal",
            &["@protein", "@number", "with"],
        )]);

        model_dir.persist_schema(&store).unwrap();
        let loaded = model_dir.load_schema().unwrap();

        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.value, store);
    }

    #[test]
    fn test_synonym_roundtrip_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());

        let table = SynonymTable::train([("nyc", "New York City"), ("chineese", "chinese")], &[]).value;
        assert_eq!(model_dir.persist_synonyms(&table).unwrap(), model_dir.synonyms_path());

        let loaded = model_dir.load_synonyms().unwrap().value;
        assert_eq!(loaded, table);
        assert_eq!(loaded.iter().next(), Some(("nyc", "New York City")));
    }

    #[test]
    fn test_empty_synonyms_load_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());

        model_dir.persist_synonyms(&SynonymTable::new()).unwrap();
        assert_eq!(fs::read_to_string(model_dir.synonyms_path()).unwrap(), "{}");

        let loaded = model_dir.load_synonyms().unwrap();
        assert!(loaded.value.is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_missing_artifacts_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());

        let schema = model_dir.load_schema().unwrap();
        assert!(schema.value.is_empty());
        assert_eq!(
            schema.warnings,
            vec![Warning::PersistedStateMissing {
                path: model_dir.schema_path()
            }]
        );

        let synonyms = model_dir.load_synonyms().unwrap();
        assert!(synonyms.value.is_empty());
        assert_eq!(synonyms.warnings.len(), 1);
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());
        fs::write(model_dir.schema_path(), "[1, 2").unwrap();

        assert!(matches!(model_dir.load_schema(), Err(Error::Parse { .. })));
    }
}
