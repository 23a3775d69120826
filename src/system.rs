//! Flattening a constraint tree into a residual system
//!
//! The constraint, argument-key and parameter trees are walked together in
//! pre-order. Every leaf constraint becomes one [`FlatConstraint`]: its
//! residual kind, its argument keys resolved against the primitive tree, and
//! its parameters. Concatenating the leaf residuals in that order gives the
//! residual vector of the whole system.

use tracing::{debug, trace};

use crate::constraints::{ArgKeysNode, ConstraintKind, ConstraintNode, ParamsNode};
use crate::containers::join;
use crate::error::LayoutError;
use crate::keys::KeyPath;
use crate::params::{self, Param};
use crate::primitives::{build_prim_graph, PrimGraph, Primitive};

/// One leaf of a flattened constraint tree
#[derive(Debug, Clone, PartialEq)]
pub struct FlatConstraint {
    /// Path of the leaf in the constraint tree
    pub path: String,
    pub kind: ConstraintKind,
    pub arg_keys: Vec<KeyPath>,
    /// Indices of the arguments into the unique primitive list
    pub arg_indices: Vec<usize>,
    pub params: Vec<Param>,
    pub res_size: usize,
}

/// A constraint tree reduced to residual functions over unique primitives
#[derive(Debug, Clone)]
pub struct FlatSystem {
    constraints: Vec<FlatConstraint>,
    graph: PrimGraph,
    prims: Vec<Primitive>,
    res_size: usize,
}

/// Check that three trees have identical key structure
pub fn check_congruence(
    constraint: &ConstraintNode,
    argkeys: &ArgKeysNode,
    params: &ParamsNode,
) -> Result<(), LayoutError> {
    check_congruent_node(constraint, argkeys, params, "")
}

fn check_congruent_node(
    constraint: &ConstraintNode,
    argkeys: &ArgKeysNode,
    params: &ParamsNode,
    path: &str,
) -> Result<(), LayoutError> {
    let keys: Vec<&str> = constraint.keys().collect();
    for (name, other) in [
        ("argument keys", argkeys.keys().collect::<Vec<_>>()),
        ("parameters", params.keys().collect::<Vec<_>>()),
    ] {
        if keys != other {
            return Err(LayoutError::diverged(
                path,
                format!("constraint children {:?}, {} children {:?}", keys, name, other),
            ));
        }
    }

    for ((key, c), (a, p)) in constraint
        .children()
        .zip(argkeys.children().map(|(_, a)| a).zip(params.children().map(|(_, p)| p)))
    {
        check_congruent_node(c, a, p, &join(path, key))?;
    }
    Ok(())
}

/// Flatten the three parallel trees against `root_prim`
///
/// Argument keys are resolved against `root_prim`; each resolved primitive
/// must have the kind the leaf's signature expects.
pub fn flatten_system(
    constraint: &ConstraintNode,
    argkeys: &ArgKeysNode,
    params: &ParamsNode,
    root_prim: &Primitive,
) -> Result<FlatSystem, LayoutError> {
    check_congruence(constraint, argkeys, params)?;
    let (graph, prims) = build_prim_graph(root_prim);

    let mut constraints = Vec::new();
    let walk = constraint
        .iter_flat()
        .zip(argkeys.iter_flat())
        .zip(params.iter_flat());
    for (((path, c), (_, a)), (_, p)) in walk {
        let c = c.value();
        if !c.is_leaf() {
            continue;
        }
        let signature = c.signature();
        let arg_keys = a.value();
        if arg_keys.len() != signature.arg_types.len() {
            return Err(LayoutError::mismatch(
                format!("'{}' arguments", path),
                format!("{} primitive keys", signature.arg_types.len()),
                format!("{} primitive keys", arg_keys.len()),
            ));
        }

        let mut arg_indices = Vec::with_capacity(arg_keys.len());
        for (key, expected) in arg_keys.iter().zip(&signature.arg_types) {
            let prim = key.resolve(root_prim)?;
            if prim.kind() != *expected {
                return Err(LayoutError::mismatch(
                    format!("'{}' argument '{}'", path, key),
                    expected.name(),
                    prim.kind().name(),
                ));
            }
            let index = graph.get(&key.to_string()).copied().ok_or_else(|| {
                LayoutError::mismatch(
                    format!("'{}' argument '{}'", path, key),
                    "a primitive in the graph",
                    "an unindexed primitive",
                )
            })?;
            arg_indices.push(index);
        }

        params::validate(&path, &signature.params, p.value())?;
        trace!(constraint = %path, kind = %c.kind(), "flattened leaf");

        constraints.push(FlatConstraint {
            path,
            kind: c.kind().clone(),
            arg_keys: arg_keys.clone(),
            arg_indices,
            params: p.value().clone(),
            res_size: signature.res_size,
        });
    }

    let res_size = constraints.iter().map(|c| c.res_size).sum();
    debug!(
        leaves = constraints.len(),
        primitives = prims.len(),
        residual = res_size,
        "flattened constraint system"
    );
    Ok(FlatSystem {
        constraints,
        graph,
        prims,
        res_size,
    })
}

impl FlatSystem {
    /// Leaves in residual order
    pub fn constraints(&self) -> &[FlatConstraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.constraints.iter().map(|c| c.path.as_str())
    }

    /// Total residual length
    pub fn res_size(&self) -> usize {
        self.res_size
    }

    /// Flat primitive path to unique primitive index
    pub fn prim_graph(&self) -> &PrimGraph {
        &self.graph
    }

    /// Unique primitives the system was flattened against
    pub fn prims(&self) -> &[Primitive] {
        &self.prims
    }

    /// Argument index tuples of every leaf
    pub fn prim_arg_tuples(&self) -> Vec<&[usize]> {
        self.constraints
            .iter()
            .map(|c| c.arg_indices.as_slice())
            .collect()
    }

    /// Residual at the primitives the system was flattened against
    pub fn residual(&self) -> Result<Vec<f64>, LayoutError> {
        self.evaluate(&self.prims)
    }

    /// Residual at a new list of unique primitives
    ///
    /// `prims` must be indexed like [`prims`](Self::prims), e.g. the list
    /// returned by [`build_prim_graph`] on a tree rebuilt from the same graph.
    pub fn evaluate(&self, prims: &[Primitive]) -> Result<Vec<f64>, LayoutError> {
        let mut residual = Vec::with_capacity(self.res_size);
        for leaf in &self.constraints {
            let args = leaf
                .arg_indices
                .iter()
                .map(|&i| {
                    prims.get(i).ok_or_else(|| {
                        LayoutError::mismatch(
                            format!("'{}' arguments", leaf.path),
                            format!("primitive index {}", i),
                            format!("{} primitives", prims.len()),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let part = leaf.kind.assem(&args, &leaf.params)?;
            if part.len() != leaf.res_size {
                return Err(LayoutError::mismatch(
                    format!("'{}' residual", leaf.path),
                    format!("{} components", leaf.res_size),
                    format!("{} components", part.len()),
                ));
            }
            residual.extend(part);
        }
        Ok(residual)
    }

    /// Residual with every leaf's arguments re-resolved against `root_prim`
    ///
    /// `root_prim` may differ from the tree the system was flattened against,
    /// so argument kinds and residual sizes are checked again.
    pub fn evaluate_tree(&self, root_prim: &Primitive) -> Result<Vec<f64>, LayoutError> {
        let mut residual = Vec::with_capacity(self.res_size);
        for leaf in &self.constraints {
            let signature = leaf.kind.signature()?;
            let mut args = Vec::with_capacity(leaf.arg_keys.len());
            for (key, expected) in leaf.arg_keys.iter().zip(&signature.arg_types) {
                let prim = key.resolve(root_prim)?;
                if prim.kind() != *expected {
                    return Err(LayoutError::mismatch(
                        format!("'{}' argument '{}'", leaf.path, key),
                        expected.name(),
                        prim.kind().name(),
                    ));
                }
                args.push(prim);
            }

            let part = leaf.kind.assem(&args, &leaf.params)?;
            if part.len() != leaf.res_size {
                return Err(LayoutError::mismatch(
                    format!("'{}' residual", leaf.path),
                    format!("{} components", leaf.res_size),
                    format!("{} components", part.len()),
                ));
            }
            residual.extend(part);
        }
        Ok(residual)
    }

    /// Whether every residual component is within `tolerance` of zero
    pub fn is_satisfied(&self, tolerance: f64) -> Result<bool, LayoutError> {
        Ok(self.residual()?.iter().all(|r| r.abs() <= tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::measure::SplitContext;
    use crate::primitives::{self, quadrilateral_from_corners, rectangle};
    use std::rc::Rc;

    fn scope(prims: Vec<(&str, Primitive)>) -> Primitive {
        let mut root = primitives::group();
        for (key, prim) in prims {
            root.add_child(key, Rc::new(prim)).unwrap();
        }
        root
    }

    fn trees(
        kind: ConstraintKind,
        keys: &[&str],
        params: Vec<Param>,
    ) -> (ConstraintNode, ArgKeysNode, ParamsNode) {
        let constraint = Constraint::new(kind).unwrap();
        let argkeys = constraint
            .root_argkeys(&crate::keys::parse_keys(keys).unwrap())
            .unwrap();
        let params = constraint.root_params(params, &SplitContext::default()).unwrap();
        (constraint, argkeys, params)
    }

    #[test]
    fn test_flatten_box_leaves() {
        let (c, a, p) = trees(ConstraintKind::Box, &["quad"], vec![]);
        let root = scope(vec![("quad", rectangle(0.0, 0.0, 2.0, 1.0).unwrap())]);
        let system = flatten_system(&c, &a, &p, &root).unwrap();

        assert_eq!(
            system.paths().collect::<Vec<_>>(),
            vec!["HorizontalBottom", "HorizontalTop", "VerticalLeft", "VerticalRight"]
        );
        assert_eq!(system.res_size(), 4);
        assert!(system.is_satisfied(1e-12).unwrap());
    }

    #[test]
    fn test_shared_points_share_indices() {
        let (c, a, p) = trees(ConstraintKind::Box, &["quad"], vec![]);
        let root = scope(vec![("quad", rectangle(0.0, 0.0, 2.0, 1.0).unwrap())]);
        let system = flatten_system(&c, &a, &p, &root).unwrap();
        let graph = system.prim_graph();
        assert_eq!(graph["quad/Line0/Point1"], graph["quad/Line1/Point0"]);
        // group, quad, 4 lines, 4 corners
        assert_eq!(system.prims().len(), 10);
    }

    #[test]
    fn test_sheared_box_not_satisfied() {
        let (c, a, p) = trees(ConstraintKind::Box, &["quad"], vec![]);
        let sheared =
            quadrilateral_from_corners([[0.0, 0.0], [1.0, 0.0], [1.5, 1.0], [0.5, 1.0]]).unwrap();
        let root = scope(vec![("quad", sheared)]);
        let residual = flatten_system(&c, &a, &p, &root).unwrap().residual().unwrap();
        assert!(residual.iter().any(|r| r.abs() > 1e-6));
    }

    #[test]
    fn test_unresolved_key() {
        let (c, a, p) = trees(ConstraintKind::Box, &["missing"], vec![]);
        let root = scope(vec![("quad", rectangle(0.0, 0.0, 1.0, 1.0).unwrap())]);
        let err = flatten_system(&c, &a, &p, &root).unwrap_err();
        assert!(matches!(err, LayoutError::KeyResolution { .. }));
    }

    #[test]
    fn test_wrong_argument_kind() {
        let (c, a, p) = trees(ConstraintKind::Vertical, &["quad"], vec![]);
        let root = scope(vec![("quad", rectangle(0.0, 0.0, 1.0, 1.0).unwrap())]);
        let err = flatten_system(&c, &a, &p, &root).unwrap_err();
        assert!(matches!(err, LayoutError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_incongruent_trees() {
        let (c, _, p) = trees(ConstraintKind::Box, &["quad"], vec![]);
        let (_, other, _) = trees(ConstraintKind::CollinearArray { size: 2 }, &["a", "b"], vec![]);
        let err = check_congruence(&c, &other, &p).unwrap_err();
        assert!(matches!(err, LayoutError::StructuralCongruence { .. }));
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let (c, a, p) = trees(ConstraintKind::Box, &["quad"], vec![]);
        let sheared =
            quadrilateral_from_corners([[0.0, 0.0], [1.0, 0.2], [1.5, 1.0], [0.5, 1.0]]).unwrap();
        let root = scope(vec![("quad", sheared)]);
        let system = flatten_system(&c, &a, &p, &root).unwrap();
        assert_eq!(system.residual().unwrap(), system.residual().unwrap());
        assert_eq!(system.residual().unwrap(), system.evaluate_tree(&root).unwrap());
    }

    #[test]
    fn test_evaluate_tree_checks_kinds() {
        let (c, a, p) = trees(ConstraintKind::Box, &["quad"], vec![]);
        let root = scope(vec![("quad", rectangle(0.0, 0.0, 2.0, 1.0).unwrap())]);
        let system = flatten_system(&c, &a, &p, &root).unwrap();

        // same keys, but the lines are now points
        let mut quad = primitives::group();
        for key in ["Line0", "Line1", "Line2", "Line3"] {
            quad.add_child(key, Rc::new(primitives::point([0.0, 0.0]))).unwrap();
        }
        let other = scope(vec![("quad", quad)]);
        let err = system.evaluate_tree(&other).unwrap_err();
        assert!(matches!(err, LayoutError::SchemaMismatch { .. }), "{:?}", err);
    }
}
