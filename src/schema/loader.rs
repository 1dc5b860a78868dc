//! Schema file loading and diagnostics.
//!
//! Loads a [`SchemaDocument`] from YAML or JSON and checks composite
//! references for gaps and cycles using a topological sort (Kahn's algorithm).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result, Warning};
use crate::numeric::NumericSubType;
use crate::schema::{SchemaDocument, SchemaStore};

impl SchemaDocument {
    /// Load a schema feed from file.
    ///
    /// `.json` files are read with serde_json, everything else as YAML.
    ///
    /// # Example
    /// ```ignore
    /// use nlu_compose::schema::SchemaDocument;
    ///
    /// let document = SchemaDocument::load_from_file("config/schema.yaml")?;
    /// println!("{} lookup tables", document.lookup_tables.len());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed: std::result::Result<Self, String> = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| Error::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

impl SchemaStore {
    /// Load a schema feed from file and build the store.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let document = SchemaDocument::load_from_file(path)?;
        Ok(Self::from_document(document))
    }
}

/// Report tagged refs that resolve to nothing, and composite reference cycles.
///
/// Diagnostics only: decomposition treats both as "no match".
pub fn validate_schema(store: &SchemaStore) -> Vec<Warning> {
    let mut warnings = Vec::new();

    for definition in store.composite_definitions() {
        for reference in definition.tagged_refs() {
            let resolvable = !store.lookup_tables_named(reference).is_empty()
                || NumericSubType::from_name(reference).is_some()
                || store.has_composite(reference);

            if !resolvable {
                warnings.push(Warning::SchemaGap {
                    composite: definition.name.clone(),
                    reference: reference.to_string(),
                });
            }
        }
    }

    if let Some(names) = find_reference_cycles(store) {
        warnings.push(Warning::ReferenceCycle { names });
    }

    warnings
}

/// Find composite names taking part in (or depending on) a reference cycle.
///
/// Builds the graph of composite-to-composite references and removes nodes
/// with no outstanding references level by level. Whatever is left could not
/// be ordered. Returns `None` when the graph is acyclic.
pub fn find_reference_cycles(store: &SchemaStore) -> Option<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for definition in store.composite_definitions() {
        in_degree.entry(definition.name.as_str()).or_insert(0);
        dependents.entry(definition.name.as_str()).or_default();
    }

    for definition in store.composite_definitions() {
        let references: HashSet<&str> = definition
            .tagged_refs()
            .filter(|r| store.has_composite(r))
            .collect();

        for reference in references {
            *in_degree.entry(definition.name.as_str()).or_insert(0) += 1;
            dependents.entry(reference).or_default().push(definition.name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut ordered: HashSet<&str> = HashSet::new();

    while let Some(name) = queue.pop_front() {
        ordered.insert(name);

        if let Some(waiting) = dependents.get(name) {
            for dependent in waiting {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }
    }

    if ordered.len() == in_degree.len() {
        return None;
    }

    let mut unordered: Vec<String> = in_degree
        .keys()
        .filter(|name| !ordered.contains(*name))
        .map(|name| name.to_string())
        .collect();
    unordered.sort();
    Some(unordered)
}
