//! Configuration for layout construction and residual checks

use std::path::Path;

use serde::Deserialize;

use crate::error::LayoutError;

/// Configuration options for a [`Layout`](crate::Layout)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Resolve a constraint's primitive keys when it is added, not only when flattening
    pub eager_validation: bool,

    /// Largest absolute residual component still considered satisfied
    pub residual_tolerance: f64,

    /// Size used when an element cannot be measured (width, height)
    pub missing_measurement: (f64, f64),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            eager_validation: true,
            residual_tolerance: 1e-9,
            missing_measurement: (0.0, 0.0),
        }
    }
}

impl LayoutConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, LayoutError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, LayoutError> {
        Ok(toml::from_str(content)?)
    }

    /// Set whether keys are validated on insertion
    pub fn with_eager_validation(mut self, eager: bool) -> Self {
        self.eager_validation = eager;
        self
    }

    /// Set the residual tolerance
    pub fn with_residual_tolerance(mut self, tolerance: f64) -> Self {
        self.residual_tolerance = tolerance;
        self
    }

    /// Set the fallback size for unmeasurable elements
    pub fn with_missing_measurement(mut self, width: f64, height: f64) -> Self {
        self.missing_measurement = (width, height);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayoutConfig::default();
        assert!(config.eager_validation);
        assert_eq!(config.residual_tolerance, 1e-9);
        assert_eq!(config.missing_measurement, (0.0, 0.0));
    }

    #[test]
    fn test_builder_pattern() {
        let config = LayoutConfig::new()
            .with_eager_validation(false)
            .with_residual_tolerance(1e-6)
            .with_missing_measurement(0.1, 0.2);

        assert!(!config.eager_validation);
        assert_eq!(config.residual_tolerance, 1e-6);
        assert_eq!(config.missing_measurement, (0.1, 0.2));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = LayoutConfig::from_toml_str("residual_tolerance = 0.001\n").unwrap();
        assert_eq!(config.residual_tolerance, 0.001);
        assert!(config.eager_validation);
    }

    #[test]
    fn test_parse_measurement_tuple() {
        let config = LayoutConfig::from_toml_str("missing_measurement = [0.5, 0.25]\n").unwrap();
        assert_eq!(config.missing_measurement, (0.5, 0.25));
    }

    #[test]
    fn test_invalid_toml_error() {
        let result = LayoutConfig::from_toml_str("this is not valid toml {{{{");
        assert!(matches!(result, Err(LayoutError::ConfigParse(_))));
    }
}
