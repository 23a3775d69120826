//! Layout orchestrator
//!
//! A [`Layout`] owns the root primitive tree and three congruent root trees
//! for constraints, their argument keys and their parameters. Constraints are
//! inserted into all three under the same key; flattening the layout produces
//! the residual system handed to an external solver.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::constraints::{ArgKeysNode, Constraint, ConstraintNode, ParamsNode};
use crate::containers::{KeyCounter, Node, SEPARATOR};
use crate::error::LayoutError;
use crate::keys::{parse_keys, KeyPath};
use crate::measure::{MeasurementProvider, NoMeasurements, SplitContext};
use crate::params::Param;
use crate::primitives::{self, rebuild_primitives, PrimGraph, PrimKind, Primitive};
use crate::system::{flatten_system, FlatSystem};

/// Primitives and constraints of a layout
pub struct Layout {
    root_prim: Primitive,
    root_constraint: ConstraintNode,
    root_argkeys: ArgKeysNode,
    root_params: ParamsNode,
    key_counter: KeyCounter,
    config: LayoutConfig,
    measurer: Rc<dyn MeasurementProvider>,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    /// Create an empty layout with the default configuration
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            root_prim: primitives::group(),
            root_constraint: Constraint::root(),
            root_argkeys: Node::new(Vec::new()),
            root_params: Node::new(Vec::new()),
            key_counter: KeyCounter::new(),
            config,
            measurer: Rc::new(NoMeasurements),
        }
    }

    /// Use `measurer` for constraints that take measured parameters
    pub fn with_measurer(mut self, measurer: Rc<dyn MeasurementProvider>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn root_prim(&self) -> &Primitive {
        &self.root_prim
    }

    pub fn root_constraint(&self) -> &ConstraintNode {
        &self.root_constraint
    }

    pub fn root_argkeys(&self) -> &ArgKeysNode {
        &self.root_argkeys
    }

    pub fn root_params(&self) -> &ParamsNode {
        &self.root_params
    }

    fn split_context(&self) -> SplitContext<'_> {
        SplitContext::new(self.measurer.as_ref(), self.config.missing_measurement)
    }

    /// Insert a primitive at `key` and return the key used
    ///
    /// An empty key is replaced by a generated `{Kind}{n}` name. `key` may be
    /// a path below an existing group, e.g. `figure/axes`; composite
    /// primitives cannot take extra children.
    pub fn add_prim(
        &mut self,
        key: &str,
        prim: impl Into<Rc<Primitive>>,
    ) -> Result<String, LayoutError> {
        let prim = prim.into();
        let key = if key.is_empty() {
            let root = &self.root_prim;
            self.key_counter
                .next_key(prim.kind().name(), |k| root.contains_key(k))
        } else {
            key.to_string()
        };

        // Only groups take arbitrary children; composites keep their schema
        let (parent_path, _) = key.rsplit_once(SEPARATOR).unwrap_or(("", key.as_str()));
        let parent = self.root_prim.get(parent_path)?;
        if parent.kind() != PrimKind::Group {
            return Err(LayoutError::mismatch(
                format!("parent of '{}'", key),
                PrimKind::Group.name(),
                parent.kind().name(),
            ));
        }

        self.root_prim.insert(&key, prim)?;
        debug!(key = %key, "added primitive");
        Ok(key)
    }

    /// Attach a constraint to the primitives at `prim_keys`
    ///
    /// The constraint's argument-key and parameter subtrees are built first;
    /// nothing is inserted unless every step succeeds. With an empty `key` a
    /// name is generated from the constraint type. Returns the key used.
    pub fn add_constraint(
        &mut self,
        constraint: ConstraintNode,
        prim_keys: &[&str],
        params: Vec<Param>,
        key: &str,
    ) -> Result<String, LayoutError> {
        let prim_keys = parse_keys(prim_keys)?;
        if self.config.eager_validation {
            self.check_arguments(&constraint, &prim_keys)?;
        }

        let argkeys = constraint.root_argkeys(&prim_keys)?;
        let params = constraint.root_params(params, &self.split_context())?;

        let key = if key.is_empty() {
            let (c, a, p) = (&self.root_constraint, &self.root_argkeys, &self.root_params);
            self.key_counter.next_key(constraint.value().kind().name(), |k| {
                c.contains_key(k) || a.contains_key(k) || p.contains_key(k)
            })
        } else {
            key.to_string()
        };
        if self.root_constraint.contains_key(&key)
            || self.root_argkeys.contains_key(&key)
            || self.root_params.contains_key(&key)
        {
            return Err(LayoutError::duplicate(key));
        }

        debug!(
            key = %key,
            kind = %constraint.value().kind(),
            residual = constraint.total_residual_size(),
            "added constraint"
        );
        self.root_constraint.add_child(key.as_str(), constraint)?;
        self.root_argkeys
            .add_child(key.as_str(), argkeys)
            .map_err(|e| LayoutError::diverged(&key, e.to_string()))?;
        self.root_params
            .add_child(key.as_str(), params)
            .map_err(|e| LayoutError::diverged(&key, e.to_string()))?;
        Ok(key)
    }

    /// Resolve top-level argument keys and check their kinds
    fn check_arguments(
        &self,
        constraint: &ConstraintNode,
        prim_keys: &[KeyPath],
    ) -> Result<(), LayoutError> {
        let expected = &constraint.value().signature().arg_types;
        for (key, kind) in prim_keys.iter().zip(expected) {
            let prim = key.resolve(&self.root_prim)?;
            if prim.kind() != *kind {
                return Err(LayoutError::mismatch(
                    format!("{} argument '{}'", constraint.value().kind(), key),
                    kind.name(),
                    prim.kind().name(),
                ));
            }
        }
        Ok(())
    }

    /// Replace the parameters of the constraint at `key`
    ///
    /// The constraint's structure is unchanged; its parameter subtree is
    /// propagated again from `params`.
    pub fn set_params(&mut self, key: &str, params: Vec<Param>) -> Result<(), LayoutError> {
        let subtree = self
            .root_constraint
            .get(key)?
            .root_params(params, &self.split_context())?;
        self.replace_params(key, subtree)
    }

    fn replace_params(&mut self, key: &str, subtree: ParamsNode) -> Result<(), LayoutError> {
        let (parent, child) = key.rsplit_once(SEPARATOR).unwrap_or(("", key));
        self.root_params
            .get_mut(parent)
            .and_then(|node| node.replace_child(child, subtree))
            .map_err(|e| LayoutError::diverged(key, e.to_string()))
    }

    /// Re-propagate measured parameters with a new measurement provider
    ///
    /// Every top-level constraint whose parameter subtree holds an element
    /// reference is split again, so measured heights and widths pick up the
    /// new sizes. Returns the number of constraints refreshed.
    pub fn refresh_measurements(
        &mut self,
        measurer: Rc<dyn MeasurementProvider>,
    ) -> Result<usize, LayoutError> {
        self.measurer = measurer;

        let ctx = self.split_context();
        let mut refreshed = Vec::new();
        for ((key, constraint), (_, params)) in
            self.root_constraint.children().zip(self.root_params.children())
        {
            let measured = params
                .iter_flat()
                .any(|(_, node)| node.value().iter().any(|p| matches!(p, Param::Element(_))));
            if measured {
                let subtree = constraint.root_params(params.value().clone(), &ctx)?;
                refreshed.push((key.to_string(), subtree));
            }
        }

        if refreshed.is_empty() {
            warn!("no constraints take measured parameters, nothing to refresh");
        }
        let count = refreshed.len();
        for (key, subtree) in refreshed {
            self.replace_params(&key, subtree)?;
        }
        debug!(count, "refreshed measured constraints");
        Ok(count)
    }

    /// Flatten all constraints into a residual system
    pub fn flatten(&self) -> Result<FlatSystem, LayoutError> {
        flatten_system(
            &self.root_constraint,
            &self.root_argkeys,
            &self.root_params,
            &self.root_prim,
        )
    }

    /// Residual of every constraint at the current primitive values
    pub fn evaluate(&self) -> Result<Vec<f64>, LayoutError> {
        self.flatten()?.residual()
    }

    /// Whether every residual component is within the configured tolerance
    pub fn is_satisfied(&self) -> Result<bool, LayoutError> {
        self.flatten()?.is_satisfied(self.config.residual_tolerance)
    }

    /// Replace the primitive tree with one carrying solver-updated values
    ///
    /// `graph` and `values` are indexed like the unique primitives of a
    /// [`FlatSystem`] flattened from this layout.
    pub fn update_primitives(
        &mut self,
        graph: &PrimGraph,
        values: &[Vec<f64>],
    ) -> Result<(), LayoutError> {
        self.root_prim = rebuild_primitives(&self.root_prim, graph, values)?;
        Ok(())
    }
}
