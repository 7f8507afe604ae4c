//! Metric Registry & Resolver
//!
//! The registry is an explicitly constructed, immutable value shared by the
//! resolver and the ranking path. Callers name a metric either by its
//! canonical name or, for older clients, by its numeric legacy code.

use crate::error::{AppError, Result};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    /// Canonical name accepted from callers and embedded in page tokens
    pub name: String,
    /// Storage field read from each player record
    pub field: String,
    /// Numeric code used by legacy clients
    pub legacy_type: i64,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, field: impl Into<String>, legacy_type: i64) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            legacy_type,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry must contain at least one metric")]
    Empty,

    #[error("Duplicate metric name: {0}")]
    DuplicateName(String),

    #[error("Duplicate legacy type: {0}")]
    DuplicateLegacyType(i64),

    #[error("Default metric is not registered: {0}")]
    UnknownDefault(String),
}

#[derive(Debug, Clone)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
    default_index: usize,
}

impl MetricRegistry {
    pub fn new(
        definitions: Vec<MetricDefinition>,
        default_metric: &str,
    ) -> std::result::Result<Self, RegistryError> {
        if definitions.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (i, def) in definitions.iter().enumerate() {
            let earlier = &definitions[..i];
            if earlier.iter().any(|d| d.name == def.name) {
                return Err(RegistryError::DuplicateName(def.name.clone()));
            }
            if earlier.iter().any(|d| d.legacy_type == def.legacy_type) {
                return Err(RegistryError::DuplicateLegacyType(def.legacy_type));
            }
        }
        let default_index = definitions
            .iter()
            .position(|d| d.name == default_metric)
            .ok_or_else(|| RegistryError::UnknownDefault(default_metric.to_string()))?;

        Ok(Self {
            definitions,
            default_index,
        })
    }

    fn standard_definitions() -> Vec<MetricDefinition> {
        vec![
            MetricDefinition::new("trophies", "trophies", 1),
            MetricDefinition::new("careerCoins", "careerCoins", 2),
            MetricDefinition::new("totalWins", "totalWins", 3),
        ]
    }

    /// trophies / careerCoins / totalWins, defaulting to trophies
    pub fn standard() -> Self {
        Self {
            definitions: Self::standard_definitions(),
            default_index: 0,
        }
    }

    /// Standard metrics with a configured default
    pub fn standard_with_default(default_metric: &str) -> std::result::Result<Self, RegistryError> {
        Self::new(Self::standard_definitions(), default_metric)
    }

    pub fn default_metric(&self) -> &MetricDefinition {
        &self.definitions[self.default_index]
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn by_legacy_type(&self, code: f64) -> Option<&MetricDefinition> {
        if !code.is_finite() {
            return None;
        }
        self.definitions
            .iter()
            .find(|d| d.legacy_type as f64 == code)
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    /// Resolve a caller's metric selection.
    ///
    /// An empty name counts as absent. Only when both inputs are absent does
    /// the default apply; any other unmatched input is rejected.
    pub fn resolve(
        &self,
        metric: Option<&str>,
        legacy_type: Option<f64>,
    ) -> Result<&MetricDefinition> {
        let metric = metric.filter(|m| !m.is_empty());

        if let Some(def) = metric.and_then(|m| self.get(m)) {
            return Ok(def);
        }
        if let Some(def) = legacy_type.and_then(|code| self.by_legacy_type(code)) {
            return Ok(def);
        }
        if metric.is_none() && legacy_type.is_none() {
            return Ok(self.default_metric());
        }

        Err(AppError::invalid_argument(format!(
            "metric must be one of {}.",
            self.names().collect::<Vec<_>>().join(", ")
        )))
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
