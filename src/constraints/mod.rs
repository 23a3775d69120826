//! Geometric constraints and their hierarchical expansion
//!
//! Every constraint type is a variant of [`ConstraintKind`]. A kind carries
//! its constants (array sizes, grid shapes, sides) and answers three
//! questions by tag:
//!
//! - [`signature`](ConstraintKind::signature): argument primitive types,
//!   parameter schema and residual length
//! - [`init_children`](ConstraintKind::init_children): child keys, child
//!   kinds and child argument keys relative to this constraint's arguments
//! - [`split_params`](ConstraintKind::split_params): how this constraint's
//!   parameters are handed down to its children
//!
//! Leaf kinds additionally compute a residual (see [`residuals`]).
//! [`Constraint::new`] expands a kind into a [`ConstraintNode`] tree once;
//! the tree is immutable afterwards.

pub mod residuals;
mod tree;

pub use tree::{ArgKeysNode, ParamsNode};

use std::fmt;
use std::str::FromStr;

use crate::containers::Node;
use crate::error::LayoutError;
use crate::keys::{KeyPath, Segment};
use crate::measure::SplitContext;
use crate::params::{self, Param, ParamKind, ParamSpec};
use crate::primitives::{PrimKind, Primitive};

/// A side of a box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    Bottom,
    Top,
}

impl Side {
    pub fn name(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Top => "top",
        }
    }
}

impl FromStr for Side {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            "bottom" => Ok(Side::Bottom),
            "top" => Ok(Side::Top),
            other => Err(LayoutError::construction(
                "side",
                format!("'{}' is not one of left, right, bottom, top", other),
            )),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a constraint contributes to the residual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// No children; computes its residual directly
    Leaf,
    /// Fixed children, no constants
    Static,
    /// Children generated from a size or shape constant
    Array,
    /// Fixed children selected by a non-shape constant
    Compound,
}

/// Every constraint type with its constants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Container for the top-level constraints of a layout
    Root,

    // Points
    Fix,
    DirectedDistance,
    XDistance,
    YDistance,
    Coincident,

    // Lines
    Length,
    DirectedLength,
    XLength,
    YLength,
    Vertical,
    Horizontal,
    RelativeLength,
    MidpointXDistance,
    MidpointYDistance,
    Orthogonal,
    Parallel,
    Angle,
    Collinear,
    CoincidentLines,

    // Points and lines
    PointOnLineDistance,
    PointToLineDistance,
    RelativePointOnLineDistance,

    // Quadrilaterals
    Box,
    AspectRatio,
    OuterMargin { side: Side },
    InnerMargin { side: Side },

    // Arrays
    RelativeLengthArray { size: usize },
    MidpointXDistanceArray { size: usize },
    MidpointYDistanceArray { size: usize },
    CollinearArray { size: usize },
    RectilinearGrid { rows: usize, cols: usize },
    Grid { rows: usize, cols: usize },

    // Axes
    XAxisHeight,
    YAxisWidth,
    PositionXAxis { side: Side },
    PositionYAxis { side: Side },
    PositionXAxisLabel,
    PositionYAxisLabel,
}

/// Static metadata of a constraint instance
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Expected primitive argument types, in order
    pub arg_types: Vec<PrimKind>,
    /// Parameter schema, in order
    pub params: Vec<ParamSpec>,
    /// Length of this constraint's own residual (0 for compounds)
    pub res_size: usize,
}

/// One generated child: its key, kind, and argument keys relative to the parent
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSpec {
    pub key: String,
    pub kind: ConstraintKind,
    pub prim_keys: Vec<KeyPath>,
}

/// Largest number of primitive arguments a generated constraint may take
pub const MAX_ARGUMENTS: usize = 1 << 16;

const DISTANCE: &[ParamSpec] = &[ParamSpec::new("distance", ParamKind::Scalar)];
const LENGTH: &[ParamSpec] = &[ParamSpec::new("length", ParamKind::Scalar)];
const DIRECTED_DISTANCE: &[ParamSpec] = &[
    ParamSpec::new("direction", ParamKind::Vector(2)),
    ParamSpec::new("distance", ParamKind::Scalar),
];
const DIRECTED_LENGTH: &[ParamSpec] = &[
    ParamSpec::new("direction", ParamKind::Vector(2)),
    ParamSpec::new("length", ParamKind::Scalar),
];
const REVERSE_DISTANCE: &[ParamSpec] = &[
    ParamSpec::new("reverse", ParamKind::Bool),
    ParamSpec::new("distance", ParamKind::Scalar),
];

impl ConstraintKind {
    /// Type name, used as the stem of generated keys
    pub fn name(&self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Fix => "Fix",
            Self::DirectedDistance => "DirectedDistance",
            Self::XDistance => "XDistance",
            Self::YDistance => "YDistance",
            Self::Coincident => "Coincident",
            Self::Length => "Length",
            Self::DirectedLength => "DirectedLength",
            Self::XLength => "XLength",
            Self::YLength => "YLength",
            Self::Vertical => "Vertical",
            Self::Horizontal => "Horizontal",
            Self::RelativeLength => "RelativeLength",
            Self::MidpointXDistance => "MidpointXDistance",
            Self::MidpointYDistance => "MidpointYDistance",
            Self::Orthogonal => "Orthogonal",
            Self::Parallel => "Parallel",
            Self::Angle => "Angle",
            Self::Collinear => "Collinear",
            Self::CoincidentLines => "CoincidentLines",
            Self::PointOnLineDistance => "PointOnLineDistance",
            Self::PointToLineDistance => "PointToLineDistance",
            Self::RelativePointOnLineDistance => "RelativePointOnLineDistance",
            Self::Box => "Box",
            Self::AspectRatio => "AspectRatio",
            Self::OuterMargin { .. } => "OuterMargin",
            Self::InnerMargin { .. } => "InnerMargin",
            Self::RelativeLengthArray { .. } => "RelativeLengthArray",
            Self::MidpointXDistanceArray { .. } => "MidpointXDistanceArray",
            Self::MidpointYDistanceArray { .. } => "MidpointYDistanceArray",
            Self::CollinearArray { .. } => "CollinearArray",
            Self::RectilinearGrid { .. } => "RectilinearGrid",
            Self::Grid { .. } => "Grid",
            Self::XAxisHeight => "XAxisHeight",
            Self::YAxisWidth => "YAxisWidth",
            Self::PositionXAxis { .. } => "PositionXAxis",
            Self::PositionYAxis { .. } => "PositionYAxis",
            Self::PositionXAxisLabel => "PositionXAxisLabel",
            Self::PositionYAxisLabel => "PositionYAxisLabel",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Root | Self::OuterMargin { .. } | Self::InnerMargin { .. } => Category::Compound,
            Self::PositionXAxis { .. } | Self::PositionYAxis { .. } => Category::Compound,
            Self::Box
            | Self::XAxisHeight
            | Self::YAxisWidth
            | Self::PositionXAxisLabel
            | Self::PositionYAxisLabel => Category::Static,
            Self::RelativeLengthArray { .. }
            | Self::MidpointXDistanceArray { .. }
            | Self::MidpointYDistanceArray { .. }
            | Self::CollinearArray { .. }
            | Self::RectilinearGrid { .. }
            | Self::Grid { .. } => Category::Array,
            _ => Category::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.category() == Category::Leaf
    }

    /// Reject constants the kind cannot be built from
    pub fn validate_constants(&self) -> Result<(), LayoutError> {
        match self {
            Self::RelativeLengthArray { size }
            | Self::MidpointXDistanceArray { size }
            | Self::MidpointYDistanceArray { size }
            | Self::CollinearArray { size } => {
                if *size == 0 {
                    return Err(LayoutError::construction(
                        format!("{} size", self.name()),
                        "array size must be at least 1",
                    ));
                }
            }
            Self::RectilinearGrid { rows, cols } | Self::Grid { rows, cols } => {
                if *rows == 0 || *cols == 0 {
                    return Err(LayoutError::construction(
                        format!("{} shape", self.name()),
                        format!("shape ({}, {}) must have at least one row and column", rows, cols),
                    ));
                }
            }
            _ => {}
        }

        let arguments = match self {
            Self::RelativeLengthArray { size } => size.checked_add(1),
            Self::MidpointXDistanceArray { size } | Self::MidpointYDistanceArray { size } => {
                size.checked_mul(2)
            }
            Self::CollinearArray { size } => Some(*size),
            Self::RectilinearGrid { rows, cols } | Self::Grid { rows, cols } => {
                rows.checked_mul(*cols)
            }
            _ => Some(0),
        };
        if !arguments.is_some_and(|n| n <= MAX_ARGUMENTS) {
            return Err(LayoutError::construction(
                format!("{} constants", self),
                format!("more than {} primitive arguments", MAX_ARGUMENTS),
            ));
        }

        match self {
            Self::PositionXAxis { side } => {
                if !matches!(side, Side::Bottom | Side::Top) {
                    return Err(LayoutError::construction(
                        "x-axis side",
                        format!("'{}' is not one of bottom, top", side),
                    ));
                }
            }
            Self::PositionYAxis { side } => {
                if !matches!(side, Side::Left | Side::Right) {
                    return Err(LayoutError::construction(
                        "y-axis side",
                        format!("'{}' is not one of left, right", side),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Argument types, parameter schema and residual size for these constants
    ///
    /// Fails with the same errors as [`validate_constants`](Self::validate_constants).
    pub fn signature(&self) -> Result<Signature, LayoutError> {
        use PrimKind::{Axes, Line, Point, Quadrilateral};

        self.validate_constants()?;

        let (arg_types, params, res_size): (Vec<PrimKind>, Vec<ParamSpec>, usize) = match self {
            Self::Root => (vec![], vec![], 0),

            Self::Fix => (
                vec![Point],
                vec![ParamSpec::new("location", ParamKind::Vector(2))],
                2,
            ),
            Self::DirectedDistance => (vec![Point, Point], DIRECTED_DISTANCE.to_vec(), 1),
            Self::XDistance | Self::YDistance => (vec![Point, Point], DISTANCE.to_vec(), 1),
            Self::Coincident => (vec![Point, Point], vec![], 2),

            Self::Length | Self::XLength | Self::YLength => (vec![Line], LENGTH.to_vec(), 1),
            Self::DirectedLength => (vec![Line], DIRECTED_LENGTH.to_vec(), 1),
            Self::Vertical | Self::Horizontal => (vec![Line], vec![], 1),
            Self::RelativeLength => (vec![Line, Line], LENGTH.to_vec(), 1),
            Self::MidpointXDistance | Self::MidpointYDistance => {
                (vec![Line, Line], DISTANCE.to_vec(), 1)
            }
            Self::Orthogonal | Self::Parallel => (vec![Line, Line], vec![], 1),
            Self::Angle => (
                vec![Line, Line],
                vec![ParamSpec::new("angle", ParamKind::Scalar)],
                1,
            ),
            Self::Collinear => (vec![Line, Line], vec![], 2),
            Self::CoincidentLines => (
                vec![Line, Line],
                vec![ParamSpec::new("reverse", ParamKind::Bool)],
                4,
            ),

            Self::PointOnLineDistance
            | Self::PointToLineDistance
            | Self::RelativePointOnLineDistance => (vec![Point, Line], REVERSE_DISTANCE.to_vec(), 1),

            Self::Box => (vec![Quadrilateral], vec![], 0),
            Self::AspectRatio => (
                vec![Quadrilateral],
                vec![ParamSpec::new("ratio", ParamKind::Scalar)],
                1,
            ),
            Self::OuterMargin { .. } | Self::InnerMargin { .. } => (
                vec![Quadrilateral, Quadrilateral],
                vec![ParamSpec::new("margin", ParamKind::Scalar)],
                0,
            ),

            Self::RelativeLengthArray { size } => (
                vec![Line; size + 1],
                vec![ParamSpec::new("lengths", ParamKind::Array(*size))],
                0,
            ),
            Self::MidpointXDistanceArray { size } | Self::MidpointYDistanceArray { size } => (
                vec![Line; 2 * size],
                vec![ParamSpec::new("distances", ParamKind::Array(*size))],
                0,
            ),
            Self::CollinearArray { size } => (vec![Line; *size], vec![], 0),
            Self::RectilinearGrid { rows, cols } => (vec![Quadrilateral; rows * cols], vec![], 0),
            Self::Grid { rows, cols } => (
                vec![Quadrilateral; rows * cols],
                vec![
                    ParamSpec::new("col_widths", ParamKind::Array(cols.saturating_sub(1))),
                    ParamSpec::new("row_heights", ParamKind::Array(rows.saturating_sub(1))),
                    ParamSpec::new("col_margins", ParamKind::Array(cols.saturating_sub(1))),
                    ParamSpec::new("row_margins", ParamKind::Array(rows.saturating_sub(1))),
                ],
                0,
            ),

            Self::XAxisHeight | Self::YAxisWidth => (
                vec![Quadrilateral],
                vec![ParamSpec::new("axis", ParamKind::Element)],
                0,
            ),
            Self::PositionXAxis { .. } | Self::PositionYAxis { .. } => (vec![Axes], vec![], 0),
            Self::PositionXAxisLabel | Self::PositionYAxisLabel => (
                vec![Axes],
                vec![ParamSpec::new("distance", ParamKind::Scalar)],
                0,
            ),
        };

        Ok(Signature {
            arg_types,
            params,
            res_size,
        })
    }

    /// Generate the children of this constraint
    ///
    /// Children are returned in their canonical order; [`split_params`](Self::split_params)
    /// returns parameter tuples in the same order.
    pub fn init_children(&self) -> Result<Vec<ChildSpec>, LayoutError> {
        self.validate_constants()?;

        let children: Vec<ChildSpec> = match self {
            Self::Box => vec![
                child("HorizontalBottom", Self::Horizontal, &["arg0/Line0"])?,
                child("HorizontalTop", Self::Horizontal, &["arg0/Line2"])?,
                child("VerticalLeft", Self::Vertical, &["arg0/Line3"])?,
                child("VerticalRight", Self::Vertical, &["arg0/Line1"])?,
            ],

            // `arg0` is the reference box, `arg1` the other box
            Self::OuterMargin { side } => {
                let (kind, keys) = match side {
                    Side::Left => (Self::MidpointXDistance, ["arg1/Line1", "arg0/Line3"]),
                    Side::Right => (Self::MidpointXDistance, ["arg0/Line1", "arg1/Line3"]),
                    Side::Bottom => (Self::MidpointYDistance, ["arg1/Line2", "arg0/Line0"]),
                    Side::Top => (Self::MidpointYDistance, ["arg0/Line2", "arg1/Line0"]),
                };
                vec![child("Margin", kind, &keys)?]
            }
            // `arg0` is the inner box, `arg1` the outer box
            Self::InnerMargin { side } => {
                let (kind, keys) = match side {
                    Side::Left => (Self::MidpointXDistance, ["arg1/Line3", "arg0/Line3"]),
                    Side::Right => (Self::MidpointXDistance, ["arg0/Line1", "arg1/Line1"]),
                    Side::Bottom => (Self::MidpointYDistance, ["arg1/Line0", "arg0/Line0"]),
                    Side::Top => (Self::MidpointYDistance, ["arg0/Line2", "arg1/Line2"]),
                };
                vec![child("Margin", kind, &keys)?]
            }

            Self::RelativeLengthArray { size } => (0..*size)
                .map(|n| {
                    child(
                        format!("RelativeLength{}", n),
                        Self::RelativeLength,
                        &[format!("arg{}", n), format!("arg{}", size)],
                    )
                })
                .collect::<Result<_, _>>()?,
            Self::MidpointXDistanceArray { size } => (0..*size)
                .map(|n| {
                    child(
                        format!("MidpointXDistance{}", n),
                        Self::MidpointXDistance,
                        &[format!("arg{}", 2 * n), format!("arg{}", 2 * n + 1)],
                    )
                })
                .collect::<Result<_, _>>()?,
            Self::MidpointYDistanceArray { size } => (0..*size)
                .map(|n| {
                    child(
                        format!("MidpointYDistance{}", n),
                        Self::MidpointYDistance,
                        &[format!("arg{}", 2 * n), format!("arg{}", 2 * n + 1)],
                    )
                })
                .collect::<Result<_, _>>()?,
            Self::CollinearArray { size } => (1..*size)
                .map(|n| {
                    child(
                        format!("Collinear[0][{}]", n),
                        Self::Collinear,
                        &["arg0".to_string(), format!("arg{}", n)],
                    )
                })
                .collect::<Result<_, _>>()?,
            Self::RectilinearGrid { rows, cols } => rectilinear_grid_children(*rows, *cols)?,
            Self::Grid { rows, cols } => grid_children(*rows, *cols)?,

            Self::XAxisHeight => vec![child(
                "Height",
                Self::YDistance,
                &["arg0/Line1/Point0", "arg0/Line1/Point1"],
            )?],
            Self::YAxisWidth => vec![child(
                "Width",
                Self::XDistance,
                &["arg0/Line0/Point0", "arg0/Line0/Point1"],
            )?],
            Self::PositionXAxis { side } => {
                let keys = match side {
                    Side::Top => ["arg0/Frame/Line2", "arg0/XAxis/Line0"],
                    _ => ["arg0/Frame/Line0", "arg0/XAxis/Line2"],
                };
                vec![child("CoincidentLines", Self::CoincidentLines, &keys)?]
            }
            Self::PositionYAxis { side } => {
                let keys = match side {
                    Side::Right => ["arg0/Frame/Line1", "arg0/YAxis/Line3"],
                    _ => ["arg0/Frame/Line3", "arg0/YAxis/Line1"],
                };
                vec![child("CoincidentLines", Self::CoincidentLines, &keys)?]
            }
            Self::PositionXAxisLabel => vec![child(
                "RelativePointOnLineDistance",
                Self::RelativePointOnLineDistance,
                &["arg0/XAxisLabel", "arg0/XAxis/Line0"],
            )?],
            Self::PositionYAxisLabel => vec![child(
                "RelativePointOnLineDistance",
                Self::RelativePointOnLineDistance,
                &["arg0/YAxisLabel", "arg0/YAxis/Line1"],
            )?],

            _ => Vec::new(),
        };
        Ok(children)
    }

    /// Split this constraint's parameters into one tuple per child
    ///
    /// `params` must already match [`signature`](Self::signature). The result
    /// has exactly one entry per child returned by
    /// [`init_children`](Self::init_children), in the same order.
    pub fn split_params(
        &self,
        params: &[Param],
        ctx: &SplitContext<'_>,
    ) -> Result<Vec<Vec<Param>>, LayoutError> {
        self.validate_constants()?;
        let split = match self {
            Self::Box => params::empty(4),
            Self::OuterMargin { .. } | Self::InnerMargin { .. } => params::broadcast(params, 1),

            Self::RelativeLengthArray { size }
            | Self::MidpointXDistanceArray { size }
            | Self::MidpointYDistanceArray { size } => params::partition(first(params)?, *size)?,
            Self::CollinearArray { size } => params::empty(size.saturating_sub(1)),
            Self::RectilinearGrid { rows, cols } => params::empty(2 * rows + 2 * cols),
            Self::Grid { rows, cols } => {
                // Dimension children only exist along axes with more than one cell
                let present = [*cols > 1, *rows > 1, *cols > 1, *rows > 1];
                let mut split = vec![Vec::new()];
                split.extend(
                    params
                        .iter()
                        .zip(present)
                        .filter(|(_, present)| *present)
                        .map(|(param, _)| vec![param.clone()]),
                );
                split
            }

            Self::XAxisHeight => {
                let (_, height) = ctx.measure(params::element(params, 0)?);
                vec![vec![Param::Scalar(height)]]
            }
            Self::YAxisWidth => {
                let (width, _) = ctx.measure(params::element(params, 0)?);
                vec![vec![Param::Scalar(width)]]
            }
            Self::PositionXAxis { .. } | Self::PositionYAxis { .. } => {
                vec![vec![Param::Bool(true)]]
            }
            Self::PositionXAxisLabel | Self::PositionYAxisLabel => {
                vec![vec![Param::Bool(false), first(params)?.clone()]]
            }

            _ => Vec::new(),
        };
        Ok(split)
    }

    /// Compute this constraint's own residual
    ///
    /// Compound kinds have no residual of their own and return an empty vector.
    pub fn assem(&self, prims: &[&Primitive], params: &[Param]) -> Result<Vec<f64>, LayoutError> {
        residuals::assem(self, prims, params)
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OuterMargin { side }
            | Self::InnerMargin { side }
            | Self::PositionXAxis { side }
            | Self::PositionYAxis { side } => write!(f, "{}({})", self.name(), side),
            Self::RelativeLengthArray { size }
            | Self::MidpointXDistanceArray { size }
            | Self::MidpointYDistanceArray { size }
            | Self::CollinearArray { size } => write!(f, "{}({})", self.name(), size),
            Self::RectilinearGrid { rows, cols } | Self::Grid { rows, cols } => {
                write!(f, "{}({}, {})", self.name(), rows, cols)
            }
            _ => f.write_str(self.name()),
        }
    }
}

fn first(params: &[Param]) -> Result<&Param, LayoutError> {
    params
        .first()
        .ok_or_else(|| LayoutError::mismatch("parameters", "at least one value", "none"))
}

fn child<S: AsRef<str>>(
    key: impl Into<String>,
    kind: ConstraintKind,
    prim_keys: &[S],
) -> Result<ChildSpec, LayoutError> {
    Ok(ChildSpec {
        key: key.into(),
        kind,
        prim_keys: crate::keys::parse_keys(prim_keys)?,
    })
}

/// Row-major flat index of a grid cell
fn idx(row: usize, col: usize, cols: usize) -> usize {
    row * cols + col
}

fn rectilinear_grid_children(rows: usize, cols: usize) -> Result<Vec<ChildSpec>, LayoutError> {
    let row_keys = |line: &str| -> Vec<Vec<String>> {
        (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| format!("arg{}/{}", idx(row, col, cols), line))
                    .collect()
            })
            .collect()
    };
    let col_keys = |line: &str| -> Vec<Vec<String>> {
        (0..cols)
            .map(|col| {
                (0..rows)
                    .map(|row| format!("arg{}/{}", idx(row, col, cols), line))
                    .collect()
            })
            .collect()
    };

    let mut children = Vec::with_capacity(2 * rows + 2 * cols);
    for (stem, keys) in [
        ("CollinearRowBottom", row_keys("Line0")),
        ("CollinearRowTop", row_keys("Line2")),
    ] {
        for (row, keys) in keys.iter().enumerate() {
            children.push(child(
                format!("{}{}", stem, row),
                ConstraintKind::CollinearArray { size: cols },
                keys,
            )?);
        }
    }
    for (stem, keys) in [
        ("CollinearColumnLeft", col_keys("Line3")),
        ("CollinearColumnRight", col_keys("Line1")),
    ] {
        for (col, keys) in keys.iter().enumerate() {
            children.push(child(
                format!("{}{}", stem, col),
                ConstraintKind::CollinearArray { size: rows },
                keys,
            )?);
        }
    }
    Ok(children)
}

fn grid_children(rows: usize, cols: usize) -> Result<Vec<ChildSpec>, LayoutError> {
    let all: Vec<String> = (0..rows * cols).map(|n| format!("arg{}", n)).collect();
    let mut children = vec![child(
        "RectilinearGrid",
        ConstraintKind::RectilinearGrid { rows, cols },
        &all,
    )?];

    // Widths of columns 1.. relative to column 0 (the last argument is the reference)
    if cols > 1 {
        let keys: Vec<String> = (1..cols)
            .chain([0])
            .map(|col| format!("arg{}/Line0", idx(0, col, cols)))
            .collect();
        children.push(child(
            "ColumnWidths",
            ConstraintKind::RelativeLengthArray { size: cols - 1 },
            &keys,
        )?);
    }
    // Heights of rows 1.. relative to row 0
    if rows > 1 {
        let keys: Vec<String> = (1..rows)
            .chain([0])
            .map(|row| format!("arg{}/Line1", idx(row, 0, cols)))
            .collect();
        children.push(child(
            "RowHeights",
            ConstraintKind::RelativeLengthArray { size: rows - 1 },
            &keys,
        )?);
    }
    // Gap from each column's right edge to the next column's left edge
    if cols > 1 {
        let keys: Vec<String> = (0..cols - 1)
            .flat_map(|col| {
                [
                    format!("arg{}/Line1", idx(0, col, cols)),
                    format!("arg{}/Line3", idx(0, col + 1, cols)),
                ]
            })
            .collect();
        children.push(child(
            "ColumnMargins",
            ConstraintKind::MidpointXDistanceArray { size: cols - 1 },
            &keys,
        )?);
    }
    // Gap from each row's bottom edge down to the next row's top edge
    if rows > 1 {
        let keys: Vec<String> = (0..rows - 1)
            .flat_map(|row| {
                [
                    format!("arg{}/Line2", idx(row + 1, 0, cols)),
                    format!("arg{}/Line0", idx(row, 0, cols)),
                ]
            })
            .collect();
        children.push(child(
            "RowMargins",
            ConstraintKind::MidpointYDistanceArray { size: rows - 1 },
            &keys,
        )?);
    }
    Ok(children)
}

/// Value of a constraint tree node
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    kind: ConstraintKind,
    signature: Signature,
    child_prim_keys: Vec<Vec<KeyPath>>,
}

/// A constraint expanded into its tree of child constraints
pub type ConstraintNode = Node<Constraint>;

impl Constraint {
    /// Expand `kind` into its full constraint tree
    ///
    /// Child argument keys are checked against the parent's argument types
    /// wherever the primitive schema allows, so a mis-declared child fails here
    /// rather than at flatten time.
    pub fn new(kind: ConstraintKind) -> Result<ConstraintNode, LayoutError> {
        let signature = kind.signature()?;
        let specs = kind.init_children()?;

        let mut child_prim_keys = Vec::with_capacity(specs.len());
        let mut children = Vec::with_capacity(specs.len());
        for spec in specs {
            let child_node = Constraint::new(spec.kind.clone())?;
            check_child_keys(&kind, &signature, &spec, child_node.value())?;
            child_prim_keys.push(spec.prim_keys);
            children.push((spec.key, child_node));
        }

        Node::with_children(
            Constraint {
                kind,
                signature,
                child_prim_keys,
            },
            children,
        )
    }

    /// The node used as the root of a layout's constraint tree
    pub fn root() -> ConstraintNode {
        Node::new(Constraint {
            kind: ConstraintKind::Root,
            signature: Signature {
                arg_types: Vec::new(),
                params: Vec::new(),
                res_size: 0,
            },
            child_prim_keys: Vec::new(),
        })
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Argument keys of each child, relative to this constraint's arguments
    pub fn child_prim_keys(&self) -> &[Vec<KeyPath>] {
        &self.child_prim_keys
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

fn check_child_keys(
    parent: &ConstraintKind,
    signature: &Signature,
    spec: &ChildSpec,
    child: &Constraint,
) -> Result<(), LayoutError> {
    let expected = &child.signature.arg_types;
    if spec.prim_keys.len() != expected.len() {
        return Err(LayoutError::construction(
            format!("{} child '{}'", parent.name(), spec.key),
            format!(
                "{} argument keys given, {} takes {}",
                spec.prim_keys.len(),
                child.kind.name(),
                expected.len()
            ),
        ));
    }

    for (key, expected_kind) in spec.prim_keys.iter().zip(expected) {
        let n = key.arg_index().ok_or_else(|| {
            LayoutError::construction(
                format!("{} child '{}'", parent.name(), spec.key),
                format!("argument key '{}' must start with 'argN'", key),
            )
        })?;
        let arg_kind = signature.arg_types.get(n).ok_or_else(|| {
            LayoutError::construction(
                format!("{} child '{}'", parent.name(), spec.key),
                format!("'{}' refers past the {} arguments", key, signature.arg_types.len()),
            )
        })?;
        if let Some(found) = schema_kind(*arg_kind, &key.segments()[1..]) {
            if found != *expected_kind {
                return Err(LayoutError::mismatch(
                    format!("{} child '{}' argument '{}'", parent.name(), spec.key, key),
                    expected_kind.name(),
                    found.name(),
                ));
            }
        }
    }
    Ok(())
}

/// Kind reached by walking `segments` through primitive schemas
///
/// Returns `None` when the walk passes through a schema-free group.
fn schema_kind(start: PrimKind, segments: &[Segment]) -> Option<PrimKind> {
    segments.iter().try_fold(start, |kind, segment| {
        let name = segment.name();
        kind.schema()?
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, child_kind)| *child_kind)
    })
}
