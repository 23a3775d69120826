//! External element measurements
//!
//! Some constraints (axis heights/widths) take their target value from the
//! size of an element rendered outside this crate. The rendering layer
//! implements [`MeasurementProvider`]; the core only asks for `(width, height)`.

use std::collections::HashMap;

use tracing::warn;

/// Supplies the rendered size of named elements
pub trait MeasurementProvider {
    /// Return `(width, height)` of `element_key`, or `None` if it cannot be measured
    fn measure(&self, element_key: &str) -> Option<(f64, f64)>;
}

/// Provider that never measures anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMeasurements;

impl MeasurementProvider for NoMeasurements {
    fn measure(&self, _element_key: &str) -> Option<(f64, f64)> {
        None
    }
}

/// Provider backed by a fixed table of sizes
#[derive(Debug, Clone, Default)]
pub struct StaticMeasurements {
    sizes: HashMap<String, (f64, f64)>,
}

impl StaticMeasurements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the size of an element
    pub fn with(mut self, element_key: impl Into<String>, width: f64, height: f64) -> Self {
        self.sizes.insert(element_key.into(), (width, height));
        self
    }
}

impl MeasurementProvider for StaticMeasurements {
    fn measure(&self, element_key: &str) -> Option<(f64, f64)> {
        self.sizes.get(element_key).copied()
    }
}

/// Context handed to parameter propagation
pub struct SplitContext<'a> {
    provider: &'a dyn MeasurementProvider,
    missing: (f64, f64),
}

impl<'a> SplitContext<'a> {
    pub fn new(provider: &'a dyn MeasurementProvider, missing: (f64, f64)) -> Self {
        Self { provider, missing }
    }

    /// Measure an element, falling back to the configured default
    ///
    /// A missing element or an element the provider cannot measure is not an
    /// error; it degrades to the default size.
    pub fn measure(&self, element_key: Option<&str>) -> (f64, f64) {
        let Some(key) = element_key else {
            return self.missing;
        };
        match self.provider.measure(key) {
            Some(size) => size,
            None => {
                warn!(element = key, "element cannot be measured, using default size");
                self.missing
            }
        }
    }
}

impl Default for SplitContext<'static> {
    fn default() -> Self {
        Self::new(&NoMeasurements, (0.0, 0.0))
    }
}
