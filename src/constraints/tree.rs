//! Whole-tree operations on expanded constraints
//!
//! A constraint tree is paired with two trees of the same shape: one holding
//! each node's argument keys against the outermost scope, one holding each
//! node's parameters.

use std::rc::Rc;

use tracing::trace;

use crate::containers::{accumulate, map, Node};
use crate::error::LayoutError;
use crate::keys::KeyPath;
use crate::measure::SplitContext;
use crate::params::{self, Param};
use crate::primitives::{self, Primitive};
use crate::system::flatten_system;

use super::Constraint;

/// Argument keys of every node in a constraint tree
pub type ArgKeysNode = Node<Vec<KeyPath>>;

/// Parameters of every node in a constraint tree
pub type ParamsNode = Node<Vec<Param>>;

impl Node<Constraint> {
    /// Compose argument keys down the tree
    ///
    /// `prim_keys` are this constraint's own argument keys. Each child's keys
    /// are rewritten from `argN/...` to `prim_keys[N]/...`, recursively, so
    /// every node ends up with keys in the scope `prim_keys` live in.
    pub fn root_argkeys(&self, prim_keys: &[KeyPath]) -> Result<ArgKeysNode, LayoutError> {
        let constraint = self.value();
        let expected = constraint.signature().arg_types.len();
        if prim_keys.len() != expected {
            return Err(LayoutError::mismatch(
                format!("{} arguments", constraint.kind()),
                format!("{} primitive keys", expected),
                format!("{} primitive keys", prim_keys.len()),
            ));
        }

        let children = self
            .children()
            .zip(constraint.child_prim_keys())
            .map(|((key, child), child_keys)| {
                let composed = child_keys
                    .iter()
                    .map(|k| k.compose(prim_keys))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((key.to_string(), child.root_argkeys(&composed)?))
            })
            .collect::<Result<Vec<_>, LayoutError>>()?;

        Node::with_children(prim_keys.to_vec(), children)
    }

    /// Propagate parameters down the tree
    ///
    /// `params` are checked against this constraint's schema, then split among
    /// the children; each child's tuple is propagated in turn.
    pub fn root_params(
        &self,
        params: Vec<Param>,
        ctx: &SplitContext<'_>,
    ) -> Result<ParamsNode, LayoutError> {
        let constraint = self.value();
        let kind = constraint.kind();
        params::validate(kind.name(), &constraint.signature().params, &params)?;

        let split = kind.split_params(&params, ctx)?;
        if split.len() != self.len() {
            return Err(LayoutError::construction(
                format!("{} parameters", kind),
                format!("split into {} tuples for {} children", split.len(), self.len()),
            ));
        }
        trace!(constraint = %kind, children = self.len(), "split parameters");

        let children = self
            .children()
            .zip(split)
            .map(|((key, child), child_params)| {
                Ok((key.to_string(), child.root_params(child_params, ctx)?))
            })
            .collect::<Result<Vec<_>, LayoutError>>()?;

        Node::with_children(params, children)
    }

    /// Length of the residual contributed by this whole subtree
    pub fn total_residual_size(&self) -> usize {
        let sizes = map(&|c: &Constraint| c.signature().res_size, self);
        *accumulate(&|a, b| a + b, &sizes, 0).value()
    }

    /// Residual of this constraint applied directly to `prims`
    ///
    /// The primitives are placed in a scope as `arg0..argN`, so the
    /// constraint's own argument keys are simply the positional names.
    pub fn evaluate(
        &self,
        prims: &[&Primitive],
        params: Vec<Param>,
        ctx: &SplitContext<'_>,
    ) -> Result<Vec<f64>, LayoutError> {
        let mut scope = primitives::group();
        for (n, prim) in prims.iter().enumerate() {
            scope.add_child(crate::keys::arg_name(n), Rc::new((*prim).clone()))?;
        }

        let argkeys = self.root_argkeys(&KeyPath::args(prims.len()))?;
        let params = self.root_params(params, ctx)?;
        flatten_system(self, &argkeys, &params, &scope)?.residual()
    }
}
