//! Constrained Layout - hierarchical geometric constraints for figure layout
//!
//! This library models a layout as a tree of geometric primitives (points,
//! lines, quadrilaterals, axes) and a tree of constraints over them. High-level
//! constraints such as a dimensioned grid expand into elementary leaf
//! constraints that address sub-primitives by key path. Flattening a layout
//! yields an ordered residual system for an external numeric solver.
//!
//! # Example
//!
//! ```rust
//! use constrained_layout::{primitives, Constraint, ConstraintKind, Layout};
//!
//! let mut layout = Layout::new();
//! layout.add_prim("box", primitives::rectangle(0.0, 0.0, 2.0, 1.0).unwrap()).unwrap();
//! let rect = Constraint::new(ConstraintKind::Box).unwrap();
//! layout.add_constraint(rect, &["box"], vec![], "").unwrap();
//!
//! assert_eq!(layout.evaluate().unwrap(), vec![0.0; 4]);
//! ```

pub mod config;
pub mod constraints;
pub mod containers;
pub mod error;
pub mod keys;
pub mod layout;
pub mod measure;
pub mod params;
pub mod primitives;
pub mod system;

pub use config::LayoutConfig;
pub use constraints::{ArgKeysNode, Constraint, ConstraintKind, ConstraintNode, ParamsNode, Side};
pub use containers::{flatten, unflatten, FlatNode, Node};
pub use error::LayoutError;
pub use keys::KeyPath;
pub use layout::Layout;
pub use measure::{MeasurementProvider, NoMeasurements, StaticMeasurements};
pub use params::Param;
pub use primitives::{PrimKind, Primitive};
pub use system::{flatten_system, FlatConstraint, FlatSystem};

/// Render the expansion of a constraint as an indented listing
///
/// Each line shows a node's key, kind, composed argument keys and own
/// residual size, in flattening order, followed by the total residual size.
pub fn describe(constraint: &ConstraintNode, prim_keys: &[KeyPath]) -> Result<String, LayoutError> {
    let argkeys = constraint.root_argkeys(prim_keys)?;
    let mut lines = Vec::new();

    for ((path, node), (_, keys)) in constraint.iter_flat().zip(argkeys.iter_flat()) {
        let value = node.value();
        let keys = keys
            .value()
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let res_size = value.signature().res_size;
        if path.is_empty() {
            lines.push(format!("{} ({}) res={}", value.kind(), keys, res_size));
        } else {
            let depth = path.matches(containers::SEPARATOR).count() + 1;
            let key = path.rsplit(containers::SEPARATOR).next().unwrap_or(path.as_str());
            lines.push(format!(
                "{}{}: {} ({}) res={}",
                "  ".repeat(depth),
                key,
                value.kind(),
                keys,
                res_size
            ));
        }
    }
    lines.push(format!("total residual: {}", constraint.total_residual_size()));
    Ok(lines.join("\n"))
}
