//! Integration tests for hierarchical constraints: key composition through
//! nested compounds, parameter propagation, and whole layouts built from
//! grids, margins and axes.

use std::rc::Rc;

use constrained_layout::{
    describe, flatten,
    primitives::{self, point, rectangle},
    unflatten, Constraint, ConstraintKind, KeyPath, Layout, LayoutError, Param, PrimKind, Side,
    StaticMeasurements,
};
use pretty_assertions::assert_eq;

/// Cells of a 2x2 grid: columns of width 1 and 2 with a 0.5 gap, rows of
/// height 1 and 0.5 with a 0.25 gap, row 1 below row 0
fn grid_layout() -> Layout {
    let cells = [
        ("cell00", rectangle(0.0, 2.0, 1.0, 1.0)),
        ("cell01", rectangle(1.5, 2.0, 2.0, 1.0)),
        ("cell10", rectangle(0.0, 1.25, 1.0, 0.5)),
        ("cell11", rectangle(1.5, 1.25, 2.0, 0.5)),
    ];
    let mut layout = Layout::new();
    for (key, cell) in cells {
        layout.add_prim(key, cell.unwrap()).unwrap();
    }
    layout
        .add_constraint(
            Constraint::new(ConstraintKind::Grid { rows: 2, cols: 2 }).unwrap(),
            &["cell00", "cell01", "cell10", "cell11"],
            vec![
                Param::from(vec![2.0]),
                Param::from(vec![0.5]),
                Param::from(vec![0.5]),
                Param::from(vec![0.25]),
            ],
            "grid",
        )
        .unwrap();
    layout
}

#[test]
fn test_grid_layout_satisfied() {
    let layout = grid_layout();
    let system = layout.flatten().unwrap();
    assert_eq!(system.res_size(), 20);
    assert!(system.is_satisfied(1e-12).unwrap(), "{:?}", system.residual());
}

#[test]
fn test_grid_retargeted_width() {
    let mut layout = grid_layout();
    layout
        .set_params(
            "grid",
            vec![
                Param::from(vec![1.0]),
                Param::from(vec![0.5]),
                Param::from(vec![0.5]),
                Param::from(vec![0.25]),
            ],
        )
        .unwrap();

    let system = layout.flatten().unwrap();
    let residual = system.residual().unwrap();
    let mut offset = 0;
    for leaf in system.constraints() {
        let part = &residual[offset..offset + leaf.res_size];
        if leaf.path == "grid/ColumnWidths/RelativeLength0" {
            // |width1|^2 - 1 * |width0|^2
            assert_eq!(part, &[3.0]);
        } else {
            assert!(part.iter().all(|r| r.abs() < 1e-12), "{}: {:?}", leaf.path, part);
        }
        offset += leaf.res_size;
    }
}

#[test]
fn test_nested_keys_match_manual_composition() {
    let grid = Constraint::new(ConstraintKind::Grid { rows: 2, cols: 2 }).unwrap();
    let top: Vec<KeyPath> = ["a", "b", "c", "d"]
        .iter()
        .map(|k| KeyPath::parse(k).unwrap())
        .collect();
    let argkeys = grid.root_argkeys(&top).unwrap();

    // Grid -> RectilinearGrid -> CollinearColumnRight1 -> Collinear[0][1]
    let compose = |keys: &[KeyPath], parent: &[KeyPath]| -> Vec<KeyPath> {
        keys.iter().map(|k| k.compose(parent).unwrap()).collect()
    };
    let rect = grid.get("RectilinearGrid").unwrap();
    let level1 = compose(&grid.value().child_prim_keys()[0], &top);
    let column = rect.get("CollinearColumnRight1").unwrap();
    let index = rect.keys().position(|k| k == "CollinearColumnRight1").unwrap();
    let level2 = compose(&rect.value().child_prim_keys()[index], &level1);
    let level3 = compose(&column.value().child_prim_keys()[0], &level2);

    let deep = argkeys
        .get("RectilinearGrid/CollinearColumnRight1/Collinear[0][1]")
        .unwrap();
    assert_eq!(deep.value(), &level3);
    let strings: Vec<String> = level3.iter().map(|k| k.to_string()).collect();
    assert_eq!(strings, vec!["b/Line1", "d/Line1"]);

    // both compositions land on the same primitives of a concrete tree
    let mut layout = Layout::new();
    for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
        let x = (i % 2) as f64 * 2.0;
        let y = (i / 2) as f64 * -2.0;
        layout.add_prim(key, rectangle(x, y, 1.0, 1.0).unwrap()).unwrap();
    }
    let root = layout.root_prim();
    for (manual, composed) in level3.iter().zip(deep.value()) {
        let manual = manual.resolve(root).unwrap();
        let composed = composed.resolve(root).unwrap();
        assert!(std::ptr::eq(manual, composed));
        assert_eq!(manual.kind(), PrimKind::Line);
    }
    let right_of_b = root.get("b/Line1").unwrap();
    assert!(std::ptr::eq(level3[0].resolve(root).unwrap(), right_of_b));
}

#[test]
fn test_outer_and_inner_margins() {
    let mut layout = Layout::new();
    layout.add_prim("left", rectangle(0.0, 0.0, 1.0, 1.0).unwrap()).unwrap();
    layout.add_prim("right", rectangle(1.25, 0.0, 1.0, 1.0).unwrap()).unwrap();
    layout.add_prim("outer", rectangle(-0.5, -0.5, 3.25, 2.0).unwrap()).unwrap();

    let margins = [
        (ConstraintKind::OuterMargin { side: Side::Right }, ["left", "right"], 0.25),
        (ConstraintKind::InnerMargin { side: Side::Left }, ["left", "outer"], 0.5),
        (ConstraintKind::InnerMargin { side: Side::Right }, ["right", "outer"], 0.5),
        (ConstraintKind::InnerMargin { side: Side::Bottom }, ["left", "outer"], 0.5),
        (ConstraintKind::InnerMargin { side: Side::Top }, ["right", "outer"], 0.5),
    ];
    for (kind, keys, margin) in margins {
        let constraint = Constraint::new(kind).unwrap();
        layout
            .add_constraint(constraint, &keys, vec![Param::from(margin)], "")
            .unwrap();
    }

    assert_eq!(
        layout.root_constraint().keys().collect::<Vec<_>>(),
        vec!["OuterMargin0", "InnerMargin0", "InnerMargin1", "InnerMargin2", "InnerMargin3"]
    );
    let residual = layout.evaluate().unwrap();
    assert_eq!(residual, vec![0.0; 5]);
}

#[test]
fn test_axes_positioning() {
    let frame = rectangle(0.0, 0.0, 4.0, 3.0).unwrap();
    let xaxis = rectangle(0.0, -0.5, 4.0, 0.5).unwrap();
    let yaxis = rectangle(-0.3, 0.0, 0.3, 3.0).unwrap();
    let ax = primitives::axes(frame, xaxis, yaxis, point([2.0, -0.8]), point([-0.6, 1.5])).unwrap();

    let sizes = StaticMeasurements::new()
        .with("ax.xaxis", 4.0, 0.5)
        .with("ax.yaxis", 0.3, 3.0);
    let mut layout = Layout::new().with_measurer(Rc::new(sizes));
    layout.add_prim("ax", ax).unwrap();

    let constraints = [
        (ConstraintKind::PositionXAxis { side: Side::Bottom }, "ax", vec![]),
        (ConstraintKind::PositionYAxis { side: Side::Left }, "ax", vec![]),
        (ConstraintKind::PositionXAxisLabel, "ax", vec![Param::from(0.5)]),
        (ConstraintKind::PositionYAxisLabel, "ax", vec![Param::from(0.5)]),
        (ConstraintKind::XAxisHeight, "ax/XAxis", vec![Param::from("ax.xaxis")]),
        (ConstraintKind::YAxisWidth, "ax/YAxis", vec![Param::from("ax.yaxis")]),
    ];
    for (kind, key, params) in constraints {
        layout
            .add_constraint(Constraint::new(kind).unwrap(), &[key], params, "")
            .unwrap();
    }

    let system = layout.flatten().unwrap();
    // 4 + 4 for the coincident lines, 1 per label, 1 per measured size
    assert_eq!(system.res_size(), 12);
    assert!(layout.is_satisfied().unwrap(), "{:?}", layout.evaluate());
}

#[test]
fn test_unknown_side_literal() {
    let err = "diagonal".parse::<Side>().unwrap_err();
    assert!(matches!(err, LayoutError::Construction { .. }));
}

#[test]
fn test_layout_trees_roundtrip() {
    let layout = grid_layout();

    let prims = layout.root_prim();
    assert_eq!(&unflatten(flatten(prims)).unwrap(), prims);

    let constraints = layout.root_constraint();
    assert_eq!(&unflatten(flatten(constraints)).unwrap(), constraints);

    let argkeys = layout.root_argkeys();
    assert_eq!(&unflatten(flatten(argkeys)).unwrap(), argkeys);

    let params = layout.root_params();
    assert_eq!(&unflatten(flatten(params)).unwrap(), params);
}

#[test]
fn test_unresolved_key_report() {
    let mut layout = Layout::new();
    layout.add_prim("quad", rectangle(0.0, 0.0, 1.0, 1.0).unwrap()).unwrap();
    let err = layout
        .add_constraint(
            Constraint::new(ConstraintKind::Vertical).unwrap(),
            &["quad/Line9"],
            vec![],
            "",
        )
        .unwrap_err();

    match &err {
        LayoutError::KeyResolution { segment, span, .. } => {
            assert_eq!(segment, "Line9");
            assert_eq!(span, &(5..10));
        }
        other => panic!("expected a key resolution error, got {:?}", other),
    }
    assert!(err.format("constraint").contains("Line9"));
}

#[test]
fn test_describe_relative_length_array() {
    let node = Constraint::new(ConstraintKind::RelativeLengthArray { size: 2 }).unwrap();
    let keys = ["a", "b", "ref"].map(|k| KeyPath::parse(k).unwrap());
    let listing = describe(&node, &keys).unwrap();
    insta::assert_snapshot!(listing, @r###"
    RelativeLengthArray(2) (a, b, ref) res=0
      RelativeLength0: RelativeLength (a, ref) res=1
      RelativeLength1: RelativeLength (b, ref) res=1
    total residual: 2
    "###);
}

#[test]
fn test_describe_outer_margin() {
    let node = Constraint::new(ConstraintKind::OuterMargin { side: Side::Bottom }).unwrap();
    let listing = describe(&node, &KeyPath::args(2)).unwrap();
    insta::assert_snapshot!(listing, @r###"
    OuterMargin(bottom) (arg0, arg1) res=0
      Margin: MidpointYDistance (arg1/Line2, arg0/Line0) res=1
    total residual: 1
    "###);
}
