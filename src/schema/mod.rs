//! Composite-entity schema: lookup tables and composite definitions.
//!
//! The store is built once from a [`SchemaDocument`] and is read-only while
//! entities are decomposed.

pub mod loader;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use loader::{find_reference_cycles, validate_schema};

/// Marker distinguishing a tagged ref from a literal scoring token.
pub const REF_MARKER: char = '@';

/// Numeric-namespace prefix normalized to a short numeric ref name.
const SYS_NUMBER_PREFIX: &str = "@sys.number";

/// A named list of literal phrases matched by substring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    pub name: String,
    #[serde(default)]
    pub elements: Vec<String>,
}

impl LookupTable {
    pub fn new(name: impl Into<String>, elements: Vec<String>) -> Self {
        Self {
            name: name.into(),
            elements,
        }
    }

    /// First element (longest first once stored) occurring in `lowered_text`.
    ///
    /// `lowered_text` must already be lower-cased. The element is returned
    /// with its original casing.
    pub fn find_in(&self, lowered_text: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|element| lowered_text.contains(&element.to_lowercase()))
            .map(|s| s.as_str())
    }
}

/// One entry of a composite definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentRef {
    /// `@name`: resolved against lookup tables, numeric types and composites
    Tagged(String),
    /// Plain keyword, only counted when scoring relevance
    Literal(String),
}

impl ComponentRef {
    /// Parse one composite token from a schema feed.
    ///
    /// `@sys.number:count` becomes `Tagged("count")`, `@protein:meat` becomes
    /// `Tagged("protein")` and `beer` becomes `Literal("beer")`. Empty tokens
    /// yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Some(rest) = token.strip_prefix(SYS_NUMBER_PREFIX) {
            // The separator after the namespace is dropped along with it
            let mut chars = rest.chars();
            chars.next();
            let name = chars.as_str();
            return (!name.is_empty()).then(|| ComponentRef::Tagged(name.to_string()));
        }

        match token.strip_prefix(REF_MARKER) {
            Some(rest) => {
                let name = rest.split(':').next().unwrap_or_default();
                (!name.is_empty()).then(|| ComponentRef::Tagged(name.to_string()))
            }
            None => Some(ComponentRef::Literal(token.to_string())),
        }
    }

    /// Bare name of a tagged ref, or the text of a literal token.
    pub fn name(&self) -> &str {
        match self {
            ComponentRef::Tagged(name) | ComponentRef::Literal(name) => name,
        }
    }

    pub fn is_tagged(&self) -> bool {
        matches!(self, ComponentRef::Tagged(_))
    }

    /// Render back into feed form.
    pub fn to_token(&self) -> String {
        match self {
            ComponentRef::Tagged(name) => format!("{}{}", REF_MARKER, name),
            ComponentRef::Literal(token) => token.clone(),
        }
    }
}

/// One interpretation of a composite entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeDefinition {
    pub name: String,
    pub composites: Vec<ComponentRef>,
}

impl CompositeDefinition {
    pub fn new(name: impl Into<String>, composites: Vec<ComponentRef>) -> Self {
        Self {
            name: name.into(),
            composites,
        }
    }

    /// Build from feed tokens, skipping empty ones.
    pub fn from_tokens<S: AsRef<str>>(name: impl Into<String>, tokens: &[S]) -> Self {
        Self::new(
            name,
            tokens.iter().filter_map(|t| ComponentRef::parse(t.as_ref())).collect(),
        )
    }

    pub fn tagged_refs(&self) -> impl Iterator<Item = &str> {
        self.composites
            .iter()
            .filter(|r| r.is_tagged())
            .map(|r| r.name())
    }

    /// Number of this definition's entries found literally in `lowered_text`.
    ///
    /// Entries are matched in feed form: a tagged ref only counts when the
    /// text carries its `@name` token, so the bare name of a lookup table or
    /// numeric type in the text scores nothing.
    pub fn relevance(&self, lowered_text: &str) -> usize {
        self.composites
            .iter()
            .filter(|r| lowered_text.contains(&r.to_token().to_lowercase()))
            .count()
    }
}

/// Serialized composite definition, refs kept as raw tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeEntry {
    pub name: String,
    #[serde(default)]
    pub composites: Vec<String>,
}

/// Schema feed and persisted schema artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub lookup_tables: Vec<LookupTable>,
    #[serde(default)]
    pub composite_entities: Vec<CompositeEntry>,
}

/// Lookup tables and composite definitions, keyed by name.
///
/// Several tables or definitions may share a name. Definitions sharing a
/// name are alternative interpretations and are never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaStore {
    lookup_tables: IndexMap<String, Vec<LookupTable>>,
    composites: IndexMap<String, Vec<CompositeDefinition>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: SchemaDocument) -> Self {
        let mut store = Self::new();
        for table in document.lookup_tables {
            store.add_lookup_table(table);
        }
        store.add_composite_definitions(
            document
                .composite_entities
                .iter()
                .map(|entry| CompositeDefinition::from_tokens(entry.name.clone(), &entry.composites)),
        );
        store
    }

    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            lookup_tables: self.lookup_tables().cloned().collect(),
            composite_entities: self
                .composite_definitions()
                .map(|d| CompositeEntry {
                    name: d.name.clone(),
                    composites: d.composites.iter().map(ComponentRef::to_token).collect(),
                })
                .collect(),
        }
    }

    /// Insert a lookup table, longest elements first.
    ///
    /// Ties keep their original order so the broadest phrase always wins a
    /// substring match.
    pub fn add_lookup_table(&mut self, mut table: LookupTable) {
        table.elements.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        self.lookup_tables
            .entry(table.name.clone())
            .or_default()
            .push(table);
    }

    /// Append composite definitions. Reference cycles are not checked here;
    /// see [`find_reference_cycles`].
    pub fn add_composite_definitions<I>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = CompositeDefinition>,
    {
        for definition in definitions {
            self.composites
                .entry(definition.name.clone())
                .or_default()
                .push(definition);
        }
    }

    pub fn lookup_tables_named(&self, name: &str) -> &[LookupTable] {
        self.lookup_tables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn composite_definitions_named(&self, name: &str) -> &[CompositeDefinition] {
        self.composites.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_composite(&self, name: &str) -> bool {
        self.composites.contains_key(name)
    }

    pub fn lookup_tables(&self) -> impl Iterator<Item = &LookupTable> {
        self.lookup_tables.values().flatten()
    }

    pub fn composite_definitions(&self) -> impl Iterator<Item = &CompositeDefinition> {
        self.composites.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup_tables.is_empty() && self.composites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_component_refs() {
        assert_eq!(ComponentRef::parse("@protein"), Some(ComponentRef::Tagged("protein".into())));
        assert_eq!(
            ComponentRef::parse("@protein:meat"),
            Some(ComponentRef::Tagged("protein".into()))
        );
        assert_eq!(
            ComponentRef::parse("@sys.number:number"),
            Some(ComponentRef::Tagged("number".into()))
        );
        assert_eq!(
            ComponentRef::parse("@sys.number-year"),
            Some(ComponentRef::Tagged("year".into()))
        );
        assert_eq!(ComponentRef::parse("beer"), Some(ComponentRef::Literal("beer".into())));
        assert_eq!(ComponentRef::parse("  "), None);
        assert_eq!(ComponentRef::parse("@"), None);
    }

    #[test]
    fn test_lookup_table_sorted_longest_first() {
        let mut store = SchemaStore::new();
        store.add_lookup_table(LookupTable::new(
            "carbohydrates",
            strings(&["rice", "fried rice", "yam", "noodles"]),
        ));

        let tables = store.lookup_tables_named("carbohydrates");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].elements, strings(&["fried rice", "noodles", "rice", "yam"]));
        assert_eq!(tables[0].find_in("fried rice with egg"), Some("fried rice"));
    }

    #[test]
    fn test_lookup_sort_is_stable_for_ties() {
        let mut store = SchemaStore::new();
        store.add_lookup_table(LookupTable::new("protein", strings(&["egg", "pork", "eggs", "ham"])));

        assert_eq!(
            store.lookup_tables_named("protein")[0].elements,
            strings(&["pork", "eggs", "egg", "ham"])
        );
    }

    #[test]
    fn test_find_in_is_case_insensitive() {
        let table = LookupTable::new("city", strings(&["New York"]));
        assert_eq!(table.find_in("flights to new york"), Some("New York"));
        assert_eq!(table.find_in("flights to boston"), None);
    }

    #[test]
    fn test_same_named_definitions_are_kept_apart() {
        let mut store = SchemaStore::new();
        store.add_composite_definitions(vec![
            CompositeDefinition::from_tokens("drink", &["@juice", "@alcohol"]),
            CompositeDefinition::from_tokens("drink", &["@soda"]),
        ]);

        assert_eq!(store.composite_definitions_named("drink").len(), 2);
        assert!(store.composite_definitions_named("food").is_empty());
        assert!(store.lookup_tables_named("drink").is_empty());
    }

    #[test]
    fn test_relevance_counts_entries_in_feed_form() {
        let alcohol = CompositeDefinition::from_tokens("alcohol", &["@number", "beer", "spirit"]);
        assert_eq!(alcohol.relevance("2 bottles of beer"), 1);
        assert_eq!(alcohol.relevance("a number of beers and a spirit"), 2);
        assert_eq!(alcohol.relevance("@number beer"), 2);
        assert_eq!(alcohol.relevance("orange juice"), 0);

        let juice = CompositeDefinition::from_tokens("juice", &["@number", "@fruit", "orange"]);
        assert_eq!(juice.relevance("a number of fruit beers"), 0);
    }

    #[test]
    fn test_document_roundtrip() {
        let document = SchemaDocument {
            lookup_tables: vec![LookupTable::new("protein", strings(&["chicken", "egg"]))],
            composite_entities: vec![CompositeEntry {
                name: "meal".to_string(),
                composites: strings(&["@protein", "@sys.number:number", "with"]),
            }],
        };

        let restored = SchemaStore::from_document(document).to_document();
        assert_eq!(
            restored.composite_entities[0].composites,
            strings(&["@protein", "@number", "with"])
        );
        assert_eq!(restored.lookup_tables[0].elements, strings(&["chicken", "egg"]));
    }
}
