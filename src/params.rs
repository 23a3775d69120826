//! Constraint parameters and the rules for propagating them to children

use std::fmt;

use crate::error::LayoutError;

/// A parameter value attached to a constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Scalar(f64),
    /// A fixed-size vector (direction, location) or an array of per-child values
    Vector(Vec<f64>),
    Bool(bool),
    /// Key of an externally measured element; `None` when there is no element
    Element(Option<String>),
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Scalar,
    /// Vector of exactly this many components
    Vector(usize),
    /// Array with one value per generated child
    Array(usize),
    Bool,
    Element,
}

/// A named entry of a constraint's parameter schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind }
    }
}

impl ParamKind {
    /// Whether `param` is a valid value of this kind
    pub fn accepts(&self, param: &Param) -> bool {
        match (self, param) {
            (ParamKind::Scalar, Param::Scalar(_)) => true,
            (ParamKind::Vector(n), Param::Vector(v)) | (ParamKind::Array(n), Param::Vector(v)) => {
                v.len() == *n
            }
            (ParamKind::Bool, Param::Bool(_)) => true,
            (ParamKind::Element, Param::Element(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Scalar => f.write_str("scalar"),
            ParamKind::Vector(n) => write!(f, "vector[{}]", n),
            ParamKind::Array(n) => write!(f, "array[{}]", n),
            ParamKind::Bool => f.write_str("bool"),
            ParamKind::Element => f.write_str("element"),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Scalar(v) => write!(f, "{}", v),
            Param::Vector(v) => write!(f, "{:?}", v),
            Param::Bool(b) => write!(f, "{}", b),
            Param::Element(Some(key)) => write!(f, "element '{}'", key),
            Param::Element(None) => f.write_str("no element"),
        }
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Scalar(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<Vec<f64>> for Param {
    fn from(value: Vec<f64>) -> Self {
        Param::Vector(value)
    }
}

impl From<[f64; 2]> for Param {
    fn from(value: [f64; 2]) -> Self {
        Param::Vector(value.to_vec())
    }
}

impl From<&str> for Param {
    fn from(key: &str) -> Self {
        Param::Element(Some(key.to_string()))
    }
}

/// Check a parameter tuple against a schema
pub fn validate(owner: &str, schema: &[ParamSpec], params: &[Param]) -> Result<(), LayoutError> {
    if schema.len() != params.len() {
        return Err(LayoutError::mismatch(
            format!("{} parameters", owner),
            format!("{} values ({})", schema.len(), describe(schema)),
            format!("{} values", params.len()),
        ));
    }
    for (spec, param) in schema.iter().zip(params) {
        if !spec.kind.accepts(param) {
            return Err(LayoutError::mismatch(
                format!("{} parameter '{}'", owner, spec.name),
                spec.kind.to_string(),
                param.to_string(),
            ));
        }
    }
    Ok(())
}

fn describe(schema: &[ParamSpec]) -> String {
    schema
        .iter()
        .map(|spec| format!("{}: {}", spec.name, spec.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Propagation patterns used by compound constraints
// ============================================================================

/// Every child gets an empty parameter tuple
pub fn empty(children: usize) -> Vec<Vec<Param>> {
    vec![Vec::new(); children]
}

/// Every child gets a copy of `params`
pub fn broadcast(params: &[Param], children: usize) -> Vec<Vec<Param>> {
    vec![params.to_vec(); children]
}

/// Partition an array parameter into one scalar per child, in index order
pub fn partition(param: &Param, children: usize) -> Result<Vec<Vec<Param>>, LayoutError> {
    match param {
        Param::Vector(values) if values.len() == children => Ok(values
            .iter()
            .map(|value| vec![Param::Scalar(*value)])
            .collect()),
        other => Err(LayoutError::mismatch(
            "array parameter split",
            format!("array[{}]", children),
            other.to_string(),
        )),
    }
}

/// Read parameter `index` as a scalar
pub fn scalar(params: &[Param], index: usize) -> Result<f64, LayoutError> {
    match params.get(index) {
        Some(Param::Scalar(value)) => Ok(*value),
        other => Err(unexpected(index, "scalar", other)),
    }
}

/// Read parameter `index` as a 2-vector
pub fn vector2(params: &[Param], index: usize) -> Result<[f64; 2], LayoutError> {
    match params.get(index) {
        Some(Param::Vector(v)) if v.len() == 2 => Ok([v[0], v[1]]),
        other => Err(unexpected(index, "vector[2]", other)),
    }
}

/// Read parameter `index` as a bool
pub fn boolean(params: &[Param], index: usize) -> Result<bool, LayoutError> {
    match params.get(index) {
        Some(Param::Bool(value)) => Ok(*value),
        other => Err(unexpected(index, "bool", other)),
    }
}

/// Read parameter `index` as an element key
pub fn element(params: &[Param], index: usize) -> Result<Option<&str>, LayoutError> {
    match params.get(index) {
        Some(Param::Element(key)) => Ok(key.as_deref()),
        other => Err(unexpected(index, "element", other)),
    }
}

fn unexpected(index: usize, expected: &str, found: Option<&Param>) -> LayoutError {
    LayoutError::mismatch(
        format!("parameter {}", index),
        expected,
        found.map_or_else(|| "nothing".to_string(), |p| p.to_string()),
    )
}
