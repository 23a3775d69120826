//! Residual functions of leaf constraints
//!
//! Each leaf receives its resolved argument primitives and its parameter
//! tuple and returns a residual vector that is zero exactly when the
//! constraint holds.

use crate::error::LayoutError;
use crate::params;
use crate::params::Param;
use crate::primitives::{PrimKind, Primitive};

use super::ConstraintKind;

type Vec2 = [f64; 2];

fn sub(a: Vec2, b: Vec2) -> Vec2 {
    [a[0] - b[0], a[1] - b[1]]
}

fn dot(a: Vec2, b: Vec2) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

fn norm(a: Vec2) -> f64 {
    dot(a, a).sqrt()
}

fn unit(a: Vec2) -> Vec2 {
    let n = norm(a);
    [a[0] / n, a[1] / n]
}

/// Start and end coordinates of a line
fn endpoints(line: &Primitive) -> Result<(Vec2, Vec2), LayoutError> {
    let start = line.part("Point0", PrimKind::Point)?.xy()?;
    let end = line.part("Point1", PrimKind::Point)?.xy()?;
    Ok((start, end))
}

/// Direction vector of a line, from `Point0` to `Point1`
fn line_vector(line: &Primitive) -> Result<Vec2, LayoutError> {
    let (start, end) = endpoints(line)?;
    Ok(sub(end, start))
}

fn arg<'a>(prims: &[&'a Primitive], index: usize) -> Result<&'a Primitive, LayoutError> {
    prims.get(index).copied().ok_or_else(|| {
        LayoutError::mismatch(
            "leaf arguments",
            format!("at least {} primitives", index + 1),
            prims.len().to_string(),
        )
    })
}

/// Origin and unit direction of a line, optionally walked end to start
fn oriented(line: &Primitive, reverse: bool) -> Result<(Vec2, Vec2), LayoutError> {
    let (start, end) = endpoints(line)?;
    if reverse {
        Ok((end, unit(sub(start, end))))
    } else {
        Ok((start, unit(sub(end, start))))
    }
}

/// Residual of a leaf constraint; empty for constraints with children
pub fn assem(
    kind: &ConstraintKind,
    prims: &[&Primitive],
    params: &[Param],
) -> Result<Vec<f64>, LayoutError> {
    use ConstraintKind as K;

    let residual = match kind {
        K::Fix => {
            let point = arg(prims, 0)?.xy()?;
            let location = params::vector2(params, 0)?;
            sub(point, location).to_vec()
        }
        K::DirectedDistance => {
            let delta = sub(arg(prims, 1)?.xy()?, arg(prims, 0)?.xy()?);
            let direction = params::vector2(params, 0)?;
            vec![dot(delta, direction) - params::scalar(params, 1)?]
        }
        K::XDistance => {
            let delta = sub(arg(prims, 1)?.xy()?, arg(prims, 0)?.xy()?);
            vec![delta[0] - params::scalar(params, 0)?]
        }
        K::YDistance => {
            let delta = sub(arg(prims, 1)?.xy()?, arg(prims, 0)?.xy()?);
            vec![delta[1] - params::scalar(params, 0)?]
        }
        K::Coincident => sub(arg(prims, 1)?.xy()?, arg(prims, 0)?.xy()?).to_vec(),

        // Squared form keeps the residual smooth at zero length
        K::Length => {
            let v = line_vector(arg(prims, 0)?)?;
            let length = params::scalar(params, 0)?;
            vec![dot(v, v) - length * length]
        }
        K::DirectedLength => {
            let v = line_vector(arg(prims, 0)?)?;
            let direction = params::vector2(params, 0)?;
            vec![dot(v, direction) - params::scalar(params, 1)?]
        }
        K::XLength => vec![line_vector(arg(prims, 0)?)?[0] - params::scalar(params, 0)?],
        K::YLength => vec![line_vector(arg(prims, 0)?)?[1] - params::scalar(params, 0)?],
        K::Vertical => vec![line_vector(arg(prims, 0)?)?[0]],
        K::Horizontal => vec![line_vector(arg(prims, 0)?)?[1]],
        K::RelativeLength => {
            let a = line_vector(arg(prims, 0)?)?;
            let b = line_vector(arg(prims, 1)?)?;
            let length = params::scalar(params, 0)?;
            vec![dot(a, a) - length * length * dot(b, b)]
        }
        K::MidpointXDistance | K::MidpointYDistance => {
            let axis = if matches!(kind, K::MidpointXDistance) { 0 } else { 1 };
            let (start0, end0) = endpoints(arg(prims, 0)?)?;
            let (start1, end1) = endpoints(arg(prims, 1)?)?;
            let distance = 0.5 * (sub(start1, start0)[axis] + sub(end1, end0)[axis]);
            vec![distance - params::scalar(params, 0)?]
        }
        K::Orthogonal => {
            let a = line_vector(arg(prims, 0)?)?;
            let b = line_vector(arg(prims, 1)?)?;
            vec![dot(a, b)]
        }
        K::Parallel => {
            let a = line_vector(arg(prims, 0)?)?;
            let b = line_vector(arg(prims, 1)?)?;
            vec![cross(a, b)]
        }
        K::Angle => {
            let a = unit(line_vector(arg(prims, 0)?)?);
            let b = unit(line_vector(arg(prims, 1)?)?);
            let angle = dot(a, b).clamp(-1.0, 1.0).acos();
            vec![angle - params::scalar(params, 0)?]
        }
        K::Collinear => {
            let (start0, end0) = endpoints(arg(prims, 0)?)?;
            let (start1, _) = endpoints(arg(prims, 1)?)?;
            let a = sub(end0, start0);
            let b = line_vector(arg(prims, 1)?)?;
            // Second line parallel to the first, and its start on the first's carrier
            vec![cross(a, b), cross(a, sub(start0, start1))]
        }
        K::CoincidentLines => {
            let (start0, end0) = endpoints(arg(prims, 0)?)?;
            let (start1, end1) = endpoints(arg(prims, 1)?)?;
            let (first, second) = if params::boolean(params, 0)? {
                (sub(start1, end0), sub(end1, start0))
            } else {
                (sub(start1, start0), sub(end1, end0))
            };
            vec![first[0], first[1], second[0], second[1]]
        }

        K::PointOnLineDistance => {
            let point = arg(prims, 0)?.xy()?;
            let (origin, direction) = oriented(arg(prims, 1)?, params::boolean(params, 0)?)?;
            vec![dot(sub(point, origin), direction) - params::scalar(params, 1)?]
        }
        K::PointToLineDistance => {
            // Positive to the left of the (possibly reversed) line direction
            let point = arg(prims, 0)?.xy()?;
            let (origin, direction) = oriented(arg(prims, 1)?, params::boolean(params, 0)?)?;
            vec![cross(direction, sub(point, origin)) - params::scalar(params, 1)?]
        }
        K::RelativePointOnLineDistance => {
            let point = arg(prims, 0)?.xy()?;
            let line = arg(prims, 1)?;
            let (origin, direction) = oriented(line, params::boolean(params, 0)?)?;
            let length = norm(line_vector(line)?);
            vec![dot(sub(point, origin), direction) - params::scalar(params, 1)? * length]
        }

        K::AspectRatio => {
            let quad = arg(prims, 0)?;
            let width = norm(line_vector(quad.part("Line0", PrimKind::Line)?)?);
            let height = norm(line_vector(quad.part("Line1", PrimKind::Line)?)?);
            vec![width - params::scalar(params, 0)? * height]
        }

        _ => Vec::new(),
    };
    Ok(residual)
}
