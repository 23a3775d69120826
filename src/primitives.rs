//! Geometric primitives
//!
//! Primitives are [`Node`]s whose values carry a [`PrimKind`] tag and a
//! coordinate vector. Only points carry coordinates; composite primitives are
//! defined entirely by their children, whose names and kinds are fixed by the
//! composite's schema.
//!
//! A quadrilateral's lines follow a fixed cyclic order starting at the
//! bottom-left corner:
//!
//! ```text
//!        Line2
//!   P3 <-------- P2
//!   |            ^
//!   | Line3      | Line1
//!   v            |
//!   P0 --------> P1
//!        Line0
//! ```
//!
//! Adjacent lines share their corner point node, so the quadrilateral has
//! four unique points.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::containers::Node;
use crate::error::LayoutError;

/// Type tag of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
    /// Schema-free container (layout roots, argument scopes)
    Group,
    Point,
    Line,
    Quadrilateral,
    /// A plot frame with x/y axis boxes and label anchor points
    Axes,
}

const LINE_SCHEMA: &[(&str, PrimKind)] = &[("Point0", PrimKind::Point), ("Point1", PrimKind::Point)];

const QUAD_SCHEMA: &[(&str, PrimKind)] = &[
    ("Line0", PrimKind::Line),
    ("Line1", PrimKind::Line),
    ("Line2", PrimKind::Line),
    ("Line3", PrimKind::Line),
];

const AXES_SCHEMA: &[(&str, PrimKind)] = &[
    ("Frame", PrimKind::Quadrilateral),
    ("XAxis", PrimKind::Quadrilateral),
    ("YAxis", PrimKind::Quadrilateral),
    ("XAxisLabel", PrimKind::Point),
    ("YAxisLabel", PrimKind::Point),
];

impl PrimKind {
    pub fn name(&self) -> &'static str {
        match self {
            PrimKind::Group => "Group",
            PrimKind::Point => "Point",
            PrimKind::Line => "Line",
            PrimKind::Quadrilateral => "Quadrilateral",
            PrimKind::Axes => "Axes",
        }
    }

    /// Number of coordinates stored on the node itself
    pub fn value_len(&self) -> usize {
        match self {
            PrimKind::Point => 2,
            _ => 0,
        }
    }

    /// Fixed child schema; `None` for schema-free groups
    pub fn schema(&self) -> Option<&'static [(&'static str, PrimKind)]> {
        match self {
            PrimKind::Group => None,
            PrimKind::Point => Some(&[]),
            PrimKind::Line => Some(LINE_SCHEMA),
            PrimKind::Quadrilateral => Some(QUAD_SCHEMA),
            PrimKind::Axes => Some(AXES_SCHEMA),
        }
    }
}

impl fmt::Display for PrimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value carried by a primitive node
#[derive(Debug, Clone, PartialEq)]
pub struct PrimData {
    pub kind: PrimKind,
    pub coords: Vec<f64>,
}

pub type Primitive = Node<PrimData>;

impl Node<PrimData> {
    pub fn kind(&self) -> PrimKind {
        self.value().kind
    }

    pub fn coords(&self) -> &[f64] {
        &self.value().coords
    }

    /// Coordinates of a point as an `[x, y]` pair
    pub fn xy(&self) -> Result<[f64; 2], LayoutError> {
        match (self.kind(), self.coords()) {
            (PrimKind::Point, &[x, y]) => Ok([x, y]),
            (kind, coords) => Err(LayoutError::mismatch(
                "point coordinates",
                "a Point with 2 coordinates",
                format!("{} with {} coordinates", kind, coords.len()),
            )),
        }
    }

    /// Schema child `key`, checked to be of kind `kind`
    pub fn part(&self, key: &str, kind: PrimKind) -> Result<&Primitive, LayoutError> {
        let child = self.get(key)?;
        if child.kind() != kind {
            return Err(LayoutError::mismatch(
                format!("child '{}' of {}", key, self.kind()),
                kind.name(),
                child.kind().name(),
            ));
        }
        Ok(child)
    }
}

/// Build a primitive from parts, validating them against the kind's schema
pub fn from_parts<K, C>(
    kind: PrimKind,
    coords: Vec<f64>,
    children: impl IntoIterator<Item = (K, C)>,
) -> Result<Primitive, LayoutError>
where
    K: Into<String>,
    C: Into<Rc<Primitive>>,
{
    if coords.len() != kind.value_len() {
        return Err(LayoutError::mismatch(
            format!("{} coordinates", kind),
            kind.value_len().to_string(),
            coords.len().to_string(),
        ));
    }

    let node = Node::with_children(PrimData { kind, coords }, children)?;

    if let Some(schema) = kind.schema() {
        let keys: Vec<&str> = node.keys().collect();
        let expected: Vec<&str> = schema.iter().map(|(key, _)| *key).collect();
        if keys != expected {
            return Err(LayoutError::mismatch(
                format!("{} children", kind),
                expected.join(", "),
                keys.join(", "),
            ));
        }
        for ((key, child), (_, child_kind)) in node.children().zip(schema) {
            if child.kind() != *child_kind {
                return Err(LayoutError::mismatch(
                    format!("{} child '{}'", kind, key),
                    child_kind.name(),
                    child.kind().name(),
                ));
            }
        }
    }
    Ok(node)
}

/// An empty schema-free container
pub fn group() -> Primitive {
    Node::new(PrimData {
        kind: PrimKind::Group,
        coords: Vec::new(),
    })
}

pub fn point(xy: [f64; 2]) -> Primitive {
    Node::new(PrimData {
        kind: PrimKind::Point,
        coords: xy.to_vec(),
    })
}

/// A line between two (possibly shared) points
pub fn line(
    point0: impl Into<Rc<Primitive>>,
    point1: impl Into<Rc<Primitive>>,
) -> Result<Primitive, LayoutError> {
    from_parts(
        PrimKind::Line,
        Vec::new(),
        [("Point0", point0.into()), ("Point1", point1.into())],
    )
}

/// A line between two fresh points
pub fn line_from_coords(start: [f64; 2], end: [f64; 2]) -> Primitive {
    Node::with_children(
        PrimData {
            kind: PrimKind::Line,
            coords: Vec::new(),
        },
        [("Point0", point(start)), ("Point1", point(end))],
    )
    .unwrap_or_else(|_| unreachable!("line schema keys are distinct"))
}

/// A quadrilateral from four lines in cyclic order (bottom, right, top, left)
pub fn quadrilateral(lines: [Rc<Primitive>; 4]) -> Result<Primitive, LayoutError> {
    let [line0, line1, line2, line3] = lines;
    from_parts(
        PrimKind::Quadrilateral,
        Vec::new(),
        [
            ("Line0", line0),
            ("Line1", line1),
            ("Line2", line2),
            ("Line3", line3),
        ],
    )
}

/// A quadrilateral whose lines share corner points
///
/// Corners are given counter-clockwise from the bottom-left.
pub fn quadrilateral_from_corners(corners: [[f64; 2]; 4]) -> Result<Primitive, LayoutError> {
    let points: Vec<Rc<Primitive>> = corners.iter().map(|c| Rc::new(point(*c))).collect();
    let lines: Vec<Rc<Primitive>> = (0..4)
        .map(|i| line(points[i].clone(), points[(i + 1) % 4].clone()).map(Rc::new))
        .collect::<Result<_, _>>()?;
    quadrilateral([
        lines[0].clone(),
        lines[1].clone(),
        lines[2].clone(),
        lines[3].clone(),
    ])
}

/// An axis-aligned rectangle with bottom-left corner `(x, y)`
pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Result<Primitive, LayoutError> {
    quadrilateral_from_corners([
        [x, y],
        [x + width, y],
        [x + width, y + height],
        [x, y + height],
    ])
}

/// An axes composite
pub fn axes(
    frame: impl Into<Rc<Primitive>>,
    xaxis: impl Into<Rc<Primitive>>,
    yaxis: impl Into<Rc<Primitive>>,
    xaxis_label: impl Into<Rc<Primitive>>,
    yaxis_label: impl Into<Rc<Primitive>>,
) -> Result<Primitive, LayoutError> {
    from_parts(
        PrimKind::Axes,
        Vec::new(),
        [
            ("Frame", frame.into()),
            ("XAxis", xaxis.into()),
            ("YAxis", yaxis.into()),
            ("XAxisLabel", xaxis_label.into()),
            ("YAxisLabel", yaxis_label.into()),
        ],
    )
}

/// Map from flat primitive paths to indices into a list of unique primitives
pub type PrimGraph = HashMap<String, usize>;

/// Index every path of `root` by the unique primitive it reaches
///
/// Primitives are unique by node identity: a point shared by two lines is
/// listed once and both of its paths map to the same index. Unique primitives
/// are ordered by first occurrence in pre-order.
pub fn build_prim_graph(root: &Primitive) -> (PrimGraph, Vec<Primitive>) {
    let mut graph = PrimGraph::new();
    let mut seen: HashMap<*const Primitive, usize> = HashMap::new();
    let mut prims = Vec::new();

    for (path, node) in root.iter_flat() {
        let index = *seen.entry(node as *const Primitive).or_insert_with(|| {
            prims.push(node.clone());
            prims.len() - 1
        });
        graph.insert(path, index);
    }
    (graph, prims)
}

/// Return a new tree with the same structure as `old` and updated coordinates
///
/// `values[graph[path]]` gives the new coordinates of the primitive at `path`.
/// Paths that shared a node in `old` share a node in the result. `old` is
/// left untouched.
pub fn rebuild_primitives(
    old: &Primitive,
    graph: &PrimGraph,
    values: &[Vec<f64>],
) -> Result<Primitive, LayoutError> {
    let mut built: HashMap<usize, Rc<Primitive>> = HashMap::new();
    let root = rebuild_node(old, "", graph, values, &mut built)?;
    drop(built);
    Ok(Rc::try_unwrap(root).unwrap_or_else(|shared| (*shared).clone()))
}

fn rebuild_node(
    node: &Primitive,
    path: &str,
    graph: &PrimGraph,
    values: &[Vec<f64>],
    built: &mut HashMap<usize, Rc<Primitive>>,
) -> Result<Rc<Primitive>, LayoutError> {
    let index = *graph
        .get(path)
        .ok_or_else(|| LayoutError::missing_segment(path, path, 0..path.len()))?;
    if let Some(done) = built.get(&index) {
        return Ok(done.clone());
    }

    let coords = values.get(index).ok_or_else(|| {
        LayoutError::mismatch(
            format!("new values for '{}'", path),
            format!("at least {} value vectors", index + 1),
            values.len().to_string(),
        )
    })?;
    if coords.len() != node.kind().value_len() {
        return Err(LayoutError::mismatch(
            format!("new coordinates for '{}'", path),
            node.kind().value_len().to_string(),
            coords.len().to_string(),
        ));
    }

    let mut rebuilt = Node::new(PrimData {
        kind: node.kind(),
        coords: coords.clone(),
    });
    for (key, child) in node.children() {
        let child_path = crate::containers::join(path, key);
        let child = rebuild_node(child, &child_path, graph, values, built)?;
        rebuilt.add_child(key, child)?;
    }

    let rebuilt = Rc::new(rebuilt);
    built.insert(index, rebuilt.clone());
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_coords() {
        let p = point([1.0, 2.0]);
        assert_eq!(p.kind(), PrimKind::Point);
        assert_eq!(p.xy().unwrap(), [1.0, 2.0]);
    }

    #[test]
    fn test_line_rejects_non_points() {
        let l = line_from_coords([0.0, 0.0], [1.0, 0.0]);
        let err = line(l.clone(), point([0.0, 0.0])).unwrap_err();
        assert!(matches!(err, LayoutError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_from_parts_rejects_wrong_children() {
        let err = from_parts(
            PrimKind::Line,
            Vec::new(),
            [("Start", point([0.0, 0.0])), ("End", point([1.0, 0.0]))],
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_from_parts_rejects_coords_on_composite() {
        let err = from_parts::<&str, Primitive>(PrimKind::Line, vec![1.0], []).unwrap_err();
        assert!(matches!(err, LayoutError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_quad_shares_corners() {
        let quad = rectangle(0.0, 0.0, 2.0, 1.0).unwrap();
        let a = quad.get("Line0/Point1").unwrap() as *const Primitive;
        let b = quad.get("Line1/Point0").unwrap() as *const Primitive;
        assert_eq!(a, b);
        assert_eq!(quad.get("Line2/Point0").unwrap().xy().unwrap(), [2.0, 1.0]);
    }

    #[test]
    fn test_prim_graph_dedupes_shared_points() {
        let mut root = group();
        root.add_child("quad", rectangle(0.0, 0.0, 1.0, 1.0).unwrap())
            .unwrap();
        let (graph, prims) = build_prim_graph(&root);

        // root + quad + 4 lines + 4 unique points
        assert_eq!(prims.len(), 10);
        assert_eq!(graph["quad/Line0/Point1"], graph["quad/Line1/Point0"]);
        assert_eq!(graph["quad/Line3/Point1"], graph["quad/Line0/Point0"]);
    }

    #[test]
    fn test_rebuild_updates_values_and_keeps_sharing() {
        let mut root = group();
        root.add_child("quad", rectangle(0.0, 0.0, 1.0, 1.0).unwrap())
            .unwrap();
        let (graph, prims) = build_prim_graph(&root);

        let values: Vec<Vec<f64>> = prims
            .iter()
            .map(|p| p.coords().iter().map(|c| c * 3.0).collect())
            .collect();
        let rebuilt = rebuild_primitives(&root, &graph, &values).unwrap();

        assert_eq!(
            rebuilt.get("quad/Line1/Point1").unwrap().xy().unwrap(),
            [3.0, 3.0]
        );
        // Original untouched
        assert_eq!(root.get("quad/Line1/Point1").unwrap().xy().unwrap(), [1.0, 1.0]);

        let (rebuilt_graph, rebuilt_prims) = build_prim_graph(&rebuilt);
        assert_eq!(rebuilt_graph, graph);
        assert_eq!(rebuilt_prims.len(), prims.len());
    }

    #[test]
    fn test_rebuild_rejects_bad_value_length() {
        let mut root = group();
        root.add_child("p", point([0.0, 0.0])).unwrap();
        let (graph, _) = build_prim_graph(&root);
        let err = rebuild_primitives(&root, &graph, &[vec![], vec![1.0]]).unwrap_err();
        assert!(matches!(err, LayoutError::SchemaMismatch { .. }));
    }
}
