//! Engine configuration.
//!
//! Loaded from YAML; the fuzzy-matching knobs can be overridden from the
//! environment (`NLU_FUZZY_MATCHING`, `NLU_FUZZY_THRESHOLD`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.9;

/// Synonym normalizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Fall back to fuzzy matching when there is no exact synonym
    #[serde(default)]
    pub fuzzy_matching: bool,

    /// Minimum similarity in `[0, 1]` a fuzzy candidate needs
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            fuzzy_matching: false,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(Error::InvalidConfig(format!(
                "fuzzy_threshold must be within [0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        Ok(())
    }

    /// Apply `NLU_FUZZY_MATCHING` / `NLU_FUZZY_THRESHOLD` if set.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var("NLU_FUZZY_MATCHING") {
            self.fuzzy_matching = parse_bool(&raw).ok_or_else(|| {
                Error::InvalidConfig(format!("NLU_FUZZY_MATCHING is not a boolean: '{}'", raw))
            })?;
        }
        if let Ok(raw) = std::env::var("NLU_FUZZY_THRESHOLD") {
            self.fuzzy_threshold = raw.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("NLU_FUZZY_THRESHOLD is not a number: '{}'", raw))
            })?;
        }
        self.validate()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Top-level configuration file.
///
/// ```yaml
/// model_dir: models/current
/// normalizer:
///   fuzzy_matching: true
///   fuzzy_threshold: 0.85
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the persisted schema and synonym artifacts
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file and validate it.
    ///
    /// Environment overrides are not applied here; see
    /// [`NormalizerConfig::apply_env`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: EngineConfig = serde_yaml::from_str(&contents).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.normalizer.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NormalizerConfig::default();
        assert!(!config.fuzzy_matching);
        assert_eq!(config.fuzzy_threshold, 0.9);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("normalizer:\n  fuzzy_matching: true\n").unwrap();

        assert!(config.normalizer.fuzzy_matching);
        assert_eq!(config.normalizer.fuzzy_threshold, DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(config.model_dir, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model_dir: models/current\nnormalizer:\n  fuzzy_matching: true\n  fuzzy_threshold: 0.85"
        )
        .unwrap();

        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.model_dir, Some(PathBuf::from("models/current")));
        assert_eq!(config.normalizer.fuzzy_threshold, 0.85);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "normalizer:\n  fuzzy_threshold: 1.5").unwrap();

        let result = EngineConfig::load_from_file(file.path());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let config = NormalizerConfig {
            fuzzy_matching: true,
            fuzzy_threshold: f64::NAN,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
