// tests/parametrize.rs
use approx::assert_relative_eq;
use brim::{
    FourBarLinkage, JointTorque, ModelError, ModelTree, ParameterProvider, ParameterTable,
    PrimitiveBodies, RollingDisc, ShapePrimitive, SymbolKind,
};
use glam::Vec3;
use std::collections::HashMap;
use std::f64::consts::PI;

fn four_bar() -> ModelTree {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    tree.define_all().unwrap();
    tree
}

#[test]
fn test_all_symbols_resolve() {
    let tree = four_bar();
    let symbols = tree.get_all_symbols();
    // l, m, izz per link plus the closure anchor.
    assert_eq!(symbols.len(), 11);
    assert!(symbols.iter().all(|s| s.kind() == SymbolKind::Constant));
    assert_eq!(tree.all_symbols_with_state().len(), 17);

    let provider: HashMap<String, f64> = symbols
        .iter()
        .map(|s| (s.name().to_string(), 1.0))
        .collect();
    let values = tree.get_param_values(&provider);
    assert_eq!(values.len(), 11);
    assert!(tree.missing_symbols(&values).is_empty());
}

#[test]
fn test_missing_symbols_are_reported() {
    let tree = four_bar();
    let table = ParameterTable::new()
        .with_value("link1_l", 0.2)
        .with_value("crank", 0.5)
        .with_alias("link2_l", "crank");
    let values = tree.get_param_values(&table);
    assert_eq!(values.len(), 2);
    assert_eq!(values[&tree.symbol("link2", "l").unwrap()], 0.5);

    let missing = tree.missing_symbols(&values);
    assert_eq!(missing.len(), 9);
    assert!(!missing.contains(&tree.symbol("link1", "l").unwrap()));
    assert!(missing.contains(&tree.symbol("closure", "x").unwrap()));
}

#[test]
fn test_table_from_json() {
    let table = ParameterTable::from_json(
        r#"{
            "values": { "wheelbase": 1.02, "closure_y": 0.0 },
            "aliases": { "closure_x": "wheelbase" }
        }"#,
    )
    .unwrap();
    assert_eq!(table.parameter("closure_x"), Some(1.02));
    assert_eq!(table.parameter("closure_y"), Some(0.0));
    assert_eq!(table.parameter("link1_l"), None);

    let empty = ParameterTable::from_json("{}").unwrap();
    assert!(empty.values.is_empty());
    assert!(matches!(ParameterTable::from_json("42"), Err(ModelError::Config(_))));
}

#[test]
fn test_descriptions() {
    let tree = four_bar();
    let length = tree.symbol("link1", "l").unwrap();
    assert_eq!(tree.get_description(&length).unwrap(), "Length of the link");
    let q = tree.symbol("joint2", "q").unwrap();
    assert_eq!(tree.get_description(&q).unwrap(), "Rotation angle of the joint");

    // A symbol of another tree is unknown here.
    let mut other = RollingDisc::build("rolling_disc").unwrap();
    other.define_all().unwrap();
    let foreign = other.symbol("disc", "r").unwrap();
    assert!(matches!(tree.get_description(&foreign), Err(ModelError::Lookup { .. })));
}

#[test]
fn test_primitive_bodies() {
    let bodies = PrimitiveBodies::new()
        .with_part("link1", ShapePrimitive::Box(Vec3::new(0.5, 0.05, 0.025)), 1000.0)
        .with_part(
            "disc",
            ShapePrimitive::Cylinder {
                radius: 0.3,
                height: 0.02,
            },
            500.0,
        );

    let mass = bodies.parameter("link1_m").unwrap();
    assert_relative_eq!(mass, 5.0, max_relative = 1e-5);
    assert_relative_eq!(bodies.parameter("link1_l").unwrap(), 1.0, max_relative = 1e-6);
    assert_relative_eq!(
        bodies.parameter("link1_izz").unwrap(),
        5.0 * (1.0 + 0.01) / 12.0,
        max_relative = 1e-4
    );
    assert_eq!(bodies.parameter("link1_r"), None);
    assert_eq!(bodies.parameter("link1_q"), None);
    assert_eq!(bodies.parameter("link2_m"), None);

    let disc_mass = PI * 0.3 * 0.3 * 0.02 * 500.0;
    assert_relative_eq!(bodies.parameter("disc_m").unwrap(), disc_mass, max_relative = 1e-4);
    assert_relative_eq!(
        bodies.parameter("disc_izz").unwrap(),
        0.5 * disc_mass * 0.09,
        max_relative = 1e-4
    );
    assert_relative_eq!(bodies.parameter("disc_r").unwrap(), 0.3, max_relative = 1e-6);
}

#[test]
fn test_first_provider_wins() {
    let tree = four_bar();
    let measured = ParameterTable::new().with_value("link1_m", 4.2);
    let shapes = PrimitiveBodies::new().with_part(
        "link1",
        ShapePrimitive::Box(Vec3::new(0.5, 0.05, 0.025)),
        1000.0,
    );
    let values = tree.get_param_values(&(measured, shapes));

    assert_eq!(values[&tree.symbol("link1", "m").unwrap()], 4.2);
    assert_relative_eq!(values[&tree.symbol("link1", "l").unwrap()], 1.0, max_relative = 1e-6);
    assert_eq!(values.len(), 3);
}

#[test]
fn test_load_group_symbols_are_parameters() {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    let joint = tree.find("joint1").unwrap();
    tree.attach_load_group(joint, JointTorque::new("motor")).unwrap();
    tree.define_connections().unwrap();
    tree.define_objects().unwrap();
    tree.define_kinematics().unwrap();
    assert_eq!(tree.get_all_symbols().len(), 11, "group symbols appear in the loads stage");
    tree.define_loads().unwrap();
    tree.define_constraints().unwrap();

    let torque = tree.symbol("motor", "T").unwrap();
    assert_eq!(torque.kind(), SymbolKind::Input);
    assert_eq!(tree.get_all_symbols().len(), 12);
    assert_eq!(tree.to_system().unwrap().loads.len(), 2);
}

#[test]
fn test_reactions_are_not_parameters() {
    let mut tree = RollingDisc::build("rolling_disc").unwrap();
    tree.define_all().unwrap();
    let names: Vec<String> = tree
        .get_all_symbols()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(names, ["disc_r", "disc_m", "disc_izz"]);
    assert_eq!(tree.all_symbols_with_state().len(), 9);

    let force = tree.symbol("tire", "f_n").unwrap();
    assert_eq!(force.kind(), SymbolKind::Reaction);
    assert!(!force.kind().is_parameter());
    assert_eq!(
        tree.get_description(&force).unwrap(),
        "Normal force of the ground on the wheel"
    );
}
