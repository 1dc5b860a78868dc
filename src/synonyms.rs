//! Synonym table and the normalizer that maps entity values to their
//! canonical form, exactly or by fuzzy match.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::config::NormalizerConfig;
use crate::entity::{Entity, EntityProcessor, EntityValue, Message};
use crate::error::{Built, Warning};

/// Provenance name recorded on normalized entities.
pub const NORMALIZER_NAME: &str = "ner_synonyms";

/// Lower-cased surface string → canonical string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymTable {
    entries: IndexMap<String, String>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from explicit synonym pairs, then from the entity spans
    /// of training examples. Conflicts are returned, later sources win.
    pub fn train<I, K, V>(pairs: I, examples: &[Message]) -> Built<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = Self::new();
        let mut warnings = Vec::new();

        for (surface, canonical) in pairs {
            warnings.extend(table.add_synonym(surface.as_ref(), canonical.as_ref()));
        }

        for example in examples {
            for entity in &example.entities {
                let Some(surface) = span_text(&example.text, entity) else {
                    tracing::debug!(
                        entity = %entity.entity,
                        text = %example.text,
                        "Skipping entity without a usable span"
                    );
                    continue;
                };
                warnings.extend(table.add_synonym(&surface, &entity.value.to_string()));
            }
        }

        Built::with_warnings(table, warnings)
    }

    /// Map `surface` to `canonical`.
    ///
    /// Identical strings are not recorded. When the lower-cased key already
    /// maps to a different canonical value it is overwritten and a
    /// [`Warning::SynonymConflict`] is returned.
    pub fn add_synonym(&mut self, surface: &str, canonical: &str) -> Option<Warning> {
        if surface == canonical {
            return None;
        }

        let key = surface.to_lowercase();
        let conflict = match self.entries.get(&key) {
            Some(previous) if previous != canonical => {
                let warning = Warning::SynonymConflict {
                    key: key.clone(),
                    previous: previous.clone(),
                    replacement: canonical.to_string(),
                };
                tracing::warn!("{}", warning);
                Some(warning)
            }
            _ => None,
        };

        self.entries.insert(key, canonical.to_string());
        conflict
    }

    /// Exact lookup by lower-cased surface string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// Best fuzzy match for an already lower-cased value.
    ///
    /// Synonym keys are scanned first, then each distinct canonical value.
    /// The highest similarity at or above `threshold` wins; on a tie the first
    /// candidate scanned is kept.
    pub fn fuzzy_match(&self, lookup_value: &str, threshold: f64) -> Option<&str> {
        let mut best: Option<(f64, &str)> = None;

        let keys = self
            .entries
            .iter()
            .map(|(key, canonical)| (similarity(key, lookup_value), canonical.as_str()));

        let distinct: IndexSet<&str> = self.entries.values().map(|v| v.as_str()).collect();
        let canonicals = distinct
            .into_iter()
            .map(|canonical| (similarity(&canonical.to_lowercase(), lookup_value), canonical));

        for (score, canonical) in keys.chain(canonicals) {
            if score < threshold {
                continue;
            }
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, canonical));
            }
        }

        best.map(|(_, canonical)| canonical)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<IndexMap<String, String>> for SynonymTable {
    /// Wrap an already-trained mapping as is, e.g. a persisted artifact.
    fn from(entries: IndexMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Text covered by an entity's character offsets.
fn span_text(text: &str, entity: &Entity) -> Option<String> {
    let (start, end) = (entity.start?, entity.end?);
    if start > end || end > text.chars().count() {
        return None;
    }
    Some(text.chars().skip(start).take(end - start).collect())
}

/// Similarity in `[0, 1]` derived from the Levenshtein distance:
/// `2 * matches / (len(a) + len(b))` with `matches = max(len) - distance`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    if len_a + len_b == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    let matches = len_a.max(len_b) - distance;
    (2 * matches) as f64 / (len_a + len_b) as f64
}

/// Rewrites entity values to their canonical form.
#[derive(Debug, Clone, Default)]
pub struct SynonymNormalizer {
    synonyms: SynonymTable,
    config: NormalizerConfig,
}

impl SynonymNormalizer {
    pub fn new(synonyms: SynonymTable, config: NormalizerConfig) -> Self {
        Self { synonyms, config }
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Canonical form of a leaf value, if any.
    pub fn canonical(&self, value: &EntityValue) -> Option<&str> {
        let lookup_value = value.to_string().to_lowercase();

        if let Some(canonical) = self.synonyms.get(&lookup_value) {
            return Some(canonical);
        }
        if self.config.fuzzy_matching {
            return self
                .synonyms
                .fuzzy_match(&lookup_value, self.config.fuzzy_threshold);
        }
        None
    }

    /// Normalize one entity in place. Returns true if any value was replaced.
    ///
    /// Mapping values are normalized leaf by leaf; the provenance marker is
    /// added once per entity however many leaves changed.
    pub fn normalize_entity(&self, entity: &mut Entity) -> bool {
        let replaced = match &mut entity.value {
            EntityValue::Map(map) => {
                let mut any = false;
                for value in map.values_mut() {
                    any |= self.replace_leaf(value);
                }
                any
            }
            leaf => self.replace_leaf(leaf),
        };

        if replaced {
            entity.add_processor(NORMALIZER_NAME);
        }
        replaced
    }

    fn replace_leaf(&self, value: &mut EntityValue) -> bool {
        // Nested sub-mappings are not leaves at this level
        if !value.is_leaf() {
            return false;
        }
        match self.canonical(value) {
            Some(canonical) => {
                tracing::debug!(from = %value, to = canonical, "Replaced synonym");
                *value = EntityValue::text(canonical);
                true
            }
            None => false,
        }
    }
}

impl EntityProcessor for SynonymNormalizer {
    fn name(&self) -> &str {
        NORMALIZER_NAME
    }

    fn process(&self, entities: &mut [Entity]) {
        for entity in entities.iter_mut() {
            self.normalize_entity(entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> SynonymTable {
        SynonymTable::train([("chineese", "chinese"), ("nyc", "New York City")], &[]).value
    }

    fn normalizer(fuzzy_matching: bool) -> SynonymNormalizer {
        SynonymNormalizer::new(
            table(),
            NormalizerConfig {
                fuzzy_matching,
                ..NormalizerConfig::default()
            },
        )
    }

    fn values(entities: &[Entity]) -> Vec<serde_json::Value> {
        entities
            .iter()
            .map(|e| serde_json::to_value(&e.value).unwrap())
            .collect()
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // 8 vs 7 chars, one deletion: 2 * 7 / 15
        assert!((similarity("chineese", "chinees") - 14.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let mut table = SynonymTable::new();
        table.add_synonym("abcdefghij", "Letters");

        // One substitution over ten chars: 2 * 9 / 20 == 0.9
        assert_eq!(similarity("abcdefghij", "abcdefghiz"), 0.9);
        assert_eq!(table.fuzzy_match("abcdefghiz", 0.9), Some("Letters"));

        // One substitution over nine chars: 2 * 8 / 18 < 0.89
        let mut short = SynonymTable::new();
        short.add_synonym("abcdefghi", "Letters");
        assert!(similarity("abcdefghi", "abcdefghz") < 0.89);
        assert_eq!(short.fuzzy_match("abcdefghz", 0.9), None);
    }

    #[test]
    fn test_fuzzy_prefers_highest_similarity() {
        let mut table = SynonymTable::new();
        table.add_synonym("colours", "Colors");
        table.add_synonym("colour", "Color");

        // "colours" qualifies first (12/14) but "colour" scores higher (12/13)
        assert_eq!(table.fuzzy_match("colourz", 0.8), Some("Color"));
    }

    #[test]
    fn test_fuzzy_tie_keeps_first_scanned() {
        let mut table = SynonymTable::new();
        table.add_synonym("abcd", "First");
        table.add_synonym("abce", "Second");

        // Both keys are one substitution away from "abcf"
        assert_eq!(table.fuzzy_match("abcf", 0.7), Some("First"));
    }

    #[test]
    fn test_conflict_reported_once_and_last_write_wins() {
        let mut table = SynonymTable::new();
        assert!(table.add_synonym("nyc", "New York City").is_none());
        let conflict = table.add_synonym("NYC", "NYC Metro");

        assert_eq!(
            conflict,
            Some(Warning::SynonymConflict {
                key: "nyc".to_string(),
                previous: "New York City".to_string(),
                replacement: "NYC Metro".to_string(),
            })
        );
        assert_eq!(table.get("nyc"), Some("NYC Metro"));

        // Re-asserting the same mapping is not a conflict
        assert!(table.add_synonym("nyc", "NYC Metro").is_none());
    }

    #[test]
    fn test_identical_pair_is_ignored() {
        let mut table = SynonymTable::new();
        table.add_synonym("chinese", "chinese");
        assert!(table.is_empty());
    }

    #[test]
    fn test_train_from_example_spans() {
        let example: Message = serde_json::from_value(json!({
            "text": "show me chines restaurants in NYC",
            "entities": [
                {"entity": "cuisine", "value": "chinese", "start": 8, "end": 14},
                {"entity": "location", "value": "New York City", "start": 30, "end": 33},
                {"entity": "location", "value": "New York City"},
                {"entity": "location", "value": "Boston", "start": 30, "end": 99}
            ]
        }))
        .unwrap();

        let built = SynonymTable::train(Vec::<(String, String)>::new(), &[example]);

        assert!(built.warnings.is_empty());
        assert_eq!(built.value.get("chines"), Some("chinese"));
        assert_eq!(built.value.get("nyc"), Some("New York City"));
        assert_eq!(built.value.len(), 2);
    }

    #[test]
    fn test_flat_values_exact_match() {
        let mut entities = vec![
            Entity::new("cuisine", "chinese"),
            Entity::new("cuisine", "chineese"),
            Entity::new("cuisine", "Italian"),
        ];

        normalizer(false).process(&mut entities);

        assert_eq!(values(&entities), vec![json!("chinese"), json!("chinese"), json!("Italian")]);
        assert!(entities[0].processors.is_empty());
        assert_eq!(entities[1].processors, vec![NORMALIZER_NAME]);
    }

    #[test]
    fn test_mapping_values_exact_match() {
        let mut entities: Vec<Entity> = serde_json::from_value(json!([
            {"entity": "restaurant", "value": {"cuisine": "chineese", "location": "NYC"}},
            {"entity": "restaurant", "value": {"cuisine": "Chinese", "location": "New York City"}}
        ]))
        .unwrap();

        normalizer(false).process(&mut entities);

        assert_eq!(
            values(&entities),
            vec![
                json!({"cuisine": "chinese", "location": "New York City"}),
                json!({"cuisine": "Chinese", "location": "New York City"}),
            ]
        );
        // Two leaves replaced, one marker
        assert_eq!(entities[0].processors, vec![NORMALIZER_NAME]);
        assert!(entities[1].processors.is_empty());
    }

    #[test]
    fn test_flat_values_fuzzy_match() {
        let mut entities = vec![
            Entity::new("cuisine", "chinese"),
            Entity::new("cuisine", "chinees"),
            Entity::new("cuisine", "china"),
            Entity::new("location", "NewYork City"),
            Entity::new("cuisine", "Italian"),
        ];

        normalizer(true).process(&mut entities);

        assert_eq!(
            values(&entities),
            vec![
                json!("chinese"),
                json!("chinese"),
                json!("china"),
                json!("New York City"),
                json!("Italian"),
            ]
        );
    }

    #[test]
    fn test_mapping_values_fuzzy_match() {
        let mut entities: Vec<Entity> = serde_json::from_value(json!([
            {"entity": "restaurant", "value": {"cuisine": "chinees", "location": "NYC"}},
            {"entity": "restaurant", "value": {"cuisine": "Italian", "location": "NewYork City"}}
        ]))
        .unwrap();

        normalizer(true).process(&mut entities);

        assert_eq!(
            values(&entities),
            vec![
                json!({"cuisine": "chinese", "location": "New York City"}),
                json!({"cuisine": "Italian", "location": "New York City"}),
            ]
        );
    }

    #[test]
    fn test_integer_leaves_are_looked_up_as_text() {
        let mut table = SynonymTable::new();
        table.add_synonym("2", "two");
        let normalizer = SynonymNormalizer::new(table, NormalizerConfig::default());

        let mut entity = Entity::new("alcohol", EntityValue::Int(2));
        assert!(normalizer.normalize_entity(&mut entity));
        assert_eq!(entity.value, EntityValue::text("two"));
    }

    #[test]
    fn test_nested_mappings_are_skipped() {
        let mut entities: Vec<Entity> = serde_json::from_value(json!([
            {"entity": "drink", "value": {"alcohol": {"number": 2}}}
        ]))
        .unwrap();
        let before = entities[0].value.clone();

        normalizer(true).process(&mut entities);

        assert_eq!(entities[0].value, before);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for fuzzy in [false, true] {
            let normalizer = normalizer(fuzzy);
            let mut once = vec![Entity::new("location", "nyc"), Entity::new("cuisine", "chinees")];
            normalizer.process(&mut once);

            let mut twice = once.clone();
            normalizer.process(&mut twice);

            assert_eq!(values(&once), values(&twice));
        }
    }
}
