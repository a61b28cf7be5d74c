//! Externalized pattern registry: YAML documents keyed by endpoint ->
//! field -> list of regexes, compiled on load with errors pointing at
//! the offending YAML key.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{ErrorKind, FetchError};

/// The raw, uncompiled registry as deserialized from YAML.
#[derive(Debug, Deserialize)]
struct RawRegistry(HashMap<String, HashMap<String, Vec<String>>>);

/// A field's ordered list of candidate patterns, tried in order until one
/// matches.
pub struct FieldPatterns {
    pub patterns: Vec<Regex>,
}

/// The compiled registry: endpoint -> field -> ordered pattern list.
pub struct PatternRegistry {
    endpoints: HashMap<String, HashMap<String, FieldPatterns>>,
}

impl PatternRegistry {
    /// Compiles a registry from YAML text, failing with the offending
    /// endpoint/field/pattern identified in the error.
    pub fn from_yaml(text: &str) -> Result<Self, FetchError> {
        let raw: RawRegistry = serde_yaml::from_str(text).map_err(|e| {
            FetchError::new(ErrorKind::ConfigError, format!("invalid pattern registry YAML: {e}"))
        })?;

        let mut endpoints = HashMap::new();
        for (endpoint, fields) in raw.0 {
            let mut compiled_fields = HashMap::new();
            for (field, patterns) in fields {
                let mut compiled = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let re = Regex::new(&pattern).map_err(|e| {
                        FetchError::new(
                            ErrorKind::ConfigError,
                            format!(
                                "pattern registry: endpoint={endpoint} field={field} pattern={pattern:?} failed to compile: {e}"
                            ),
                        )
                    })?;
                    compiled.push(re);
                }
                compiled_fields.insert(field, FieldPatterns { patterns: compiled });
            }
            endpoints.insert(endpoint, compiled_fields);
        }
        Ok(Self { endpoints })
    }

    pub fn field_patterns(&self, endpoint: &str, field: &str) -> Option<&FieldPatterns> {
        self.endpoints.get(endpoint)?.get(field)
    }

    pub fn fields_for(&self, endpoint: &str) -> Vec<&str> {
        self.endpoints
            .get(endpoint)
            .map(|f| f.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Tries each pattern for `(endpoint, field)` in order against `text`,
    /// returning the first capture group of the first match.
    pub fn extract<'a>(&self, endpoint: &str, field: &str, text: &'a str) -> Option<&'a str> {
        let field_patterns = self.field_patterns(endpoint, field)?;
        for re in &field_patterns.patterns {
            if let Some(captures) = re.captures(text) {
                if let Some(m) = captures.get(1).or_else(|| captures.get(0)) {
                    return Some(m.as_str());
                }
            }
        }
        None
    }
}

/// The default pattern registry shipped with the crate.
pub const DEFAULT_PATTERNS_YAML: &str = include_str!("../../config/patterns.yaml");

pub fn default_registry() -> Result<PatternRegistry, FetchError> {
    PatternRegistry::from_yaml(DEFAULT_PATTERNS_YAML)
}
