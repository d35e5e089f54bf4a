// tests/bicycle.rs
use approx::assert_abs_diff_eq;
use brim::{
    Body, BicycleRider, Contact, ModelError, ModelTree, Partition, PlanarBicycle, PointId,
    Symbol, SystemDescription, UniformGravity,
};
use glam::DVec2;
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

fn elaborated(tree: Result<ModelTree, ModelError>) -> ModelTree {
    let mut tree = tree.unwrap();
    tree.define_all().unwrap();
    tree
}

/// Every symbol at zero, then the given overrides.
fn values(tree: &ModelTree, overrides: &[(&str, &str, f64)]) -> BTreeMap<Symbol, f64> {
    let mut values: BTreeMap<Symbol, f64> = tree
        .all_symbols_with_state()
        .into_iter()
        .map(|s| (s, 0.0))
        .collect();
    for &(owner, key, value) in overrides {
        values.insert(tree.symbol(owner, key).unwrap(), value);
    }
    values
}

const GEOMETRY: [(&str, &str, f64); 4] = [
    ("rear_wheel", "r", 0.3),
    ("front_wheel", "r", 0.3),
    ("rear_frame", "l", 1.0),
    ("front_frame", "l", 0.5),
];

fn body<'a>(tree: &'a ModelTree, name: &str) -> &'a dyn Body {
    tree.model(tree.find(name).unwrap())
        .unwrap()
        .as_body()
        .unwrap()
}

fn contact<'a>(tree: &'a ModelTree, name: &str) -> &'a dyn Contact {
    tree.model(tree.find(name).unwrap())
        .unwrap()
        .as_contact()
        .unwrap()
}

fn names(symbols: &[Symbol]) -> Vec<&str> {
    symbols.iter().map(|s| s.name()).collect()
}

#[test]
fn test_bicycle_counts() {
    let tree = elaborated(PlanarBicycle::build("bicycle"));
    let system = tree.to_system().unwrap();
    system.validate().unwrap();

    assert_eq!(
        names(&system.coordinates),
        [
            "bicycle_q_x",
            "bicycle_q_theta",
            "rear_hub_q",
            "head_q",
            "front_hub_q"
        ]
    );
    assert_eq!(system.bodies.len(), 4);
    assert_eq!(
        system.holonomic_constraints.len(),
        1,
        "only the front contact point can leave the ground"
    );
    assert_eq!(system.nonholonomic_constraints.len(), 2, "one per wheel");
    assert_eq!(system.auxiliary.len(), 2);
}

#[test]
fn test_front_contact_stays_on_the_ground() {
    let tree = elaborated(PlanarBicycle::build("bicycle"));
    let system = tree.to_system().unwrap();

    let straight = values(&tree, &GEOMETRY);
    let residuals = system.evaluate_constraints(&straight).unwrap();
    assert_abs_diff_eq!(residuals[0], 0.0, epsilon = 1e-12);

    // Fork turned straight down: the front wheel sinks by the fork length.
    let mut folded = straight.clone();
    folded.insert(tree.symbol("head", "q").unwrap(), -FRAC_PI_2);
    let residuals = system.evaluate_constraints(&folded).unwrap();
    assert_abs_diff_eq!(residuals[0], -0.5, epsilon = 1e-12);
}

#[test]
fn test_rear_wheel_rolls_without_slip() {
    let tree = elaborated(PlanarBicycle::build("bicycle"));
    let system = tree.to_system().unwrap();

    let mut values = values(&tree, &GEOMETRY);
    values.insert(tree.symbol("bicycle", "u_x").unwrap(), 0.6);
    values.insert(tree.symbol("bicycle", "u_theta").unwrap(), -2.0);
    let rear = system.nonholonomic_constraints[0]
        .eval(&|s: &Symbol| values.get(s).copied())
        .unwrap();
    assert_abs_diff_eq!(rear, 0.0, epsilon = 1e-12);
}

fn assert_partition(system: &SystemDescription, q_dep: &[&str], u_dep: &[&str]) {
    let split = |all: &[Symbol], dep: &[&str]| -> (Vec<Symbol>, Vec<Symbol>) {
        all.iter().cloned().partition(|s| !dep.contains(&s.name()))
    };
    let (q_ind, q_dep) = split(&system.coordinates, q_dep);
    let (u_ind, u_dep) = split(&system.speeds, u_dep);
    let partitioned = system
        .partition(Partition {
            q_ind,
            q_dep,
            u_ind,
            u_dep,
        })
        .unwrap();
    assert_eq!(
        partitioned.partition.u_ind.len(),
        system.speeds.len() - system.holonomic_constraints.len()
            - system.nonholonomic_constraints.len()
    );
}

#[test]
fn test_bicycle_partition() {
    let tree = elaborated(PlanarBicycle::build("bicycle"));
    let system = tree.to_system().unwrap();
    assert_partition(
        &system,
        &["front_hub_q"],
        &["bicycle_u_x", "front_hub_u", "rear_hub_u"],
    );
}

#[test]
fn test_rider_binds_across_subtrees() {
    let mut tree = BicycleRider::build("bicycle_rider").unwrap();
    tree.define_connections().unwrap();

    let seat = tree.find("seat").unwrap();
    let grip = tree.find("hand_grip").unwrap();
    let rear_frame = tree.resolve_path("bicycle.rear_frame").unwrap();
    assert_eq!(tree.find("rear_frame"), Some(rear_frame));
    assert_eq!(tree.bound(seat, "parent").unwrap(), &[rear_frame]);
    assert_eq!(
        tree.bound(seat, "child").unwrap(),
        &[tree.resolve_path("rider.torso").unwrap()]
    );
    assert_eq!(
        tree.bound(grip, "handlebar").unwrap(),
        &[tree.resolve_path("bicycle.front_frame").unwrap()]
    );
    assert_eq!(
        tree.bound(grip, "hand").unwrap(),
        &[tree.resolve_path("rider.arm").unwrap()]
    );
}

#[test]
fn test_bicycle_rider_system() {
    let tree = elaborated(BicycleRider::build("bicycle_rider"));
    let system = tree.to_system().unwrap();
    system.validate().unwrap();

    assert_eq!(system.coordinates.len(), 7);
    assert_eq!(system.bodies.len(), 6);
    assert_eq!(
        system.holonomic_constraints.len(),
        3,
        "front contact plus two for the hand grip"
    );
    assert_eq!(system.nonholonomic_constraints.len(), 2);
    let bodies: Vec<&str> = system.bodies.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        bodies,
        ["rear_wheel", "rear_frame", "front_frame", "front_wheel", "torso", "arm"]
    );

    assert_partition(
        &system,
        &["front_hub_q", "seat_q", "shoulder_q"],
        &[
            "bicycle_u_x",
            "front_hub_u",
            "rear_hub_u",
            "seat_u",
            "shoulder_u",
        ],
    );
}

#[test]
fn test_hand_grip_closes_the_loop() {
    let tree = elaborated(BicycleRider::build("bicycle_rider"));
    let system = tree.to_system().unwrap();

    // Hip at the middle of the rear frame, torso upright, arm reaching down to
    // the head tube.
    let mut values = values(&tree, &GEOMETRY);
    values.insert(tree.symbol("torso", "l").unwrap(), 0.5);
    values.insert(tree.symbol("arm", "l").unwrap(), 0.5f64.sqrt());
    values.insert(tree.symbol("seat", "q").unwrap(), FRAC_PI_2);
    values.insert(tree.symbol("shoulder", "q").unwrap(), -3.0 * FRAC_PI_4);
    let residuals = system.evaluate_constraints(&values).unwrap();
    assert_eq!(residuals.len(), 3);
    for r in residuals {
        assert_abs_diff_eq!(r, 0.0, epsilon = 1e-12);
    }

    // Torso lying along the frame: the hand ends half a unit short and low.
    values.insert(tree.symbol("seat", "q").unwrap(), 0.0);
    let residuals = system.evaluate_constraints(&values).unwrap();
    assert_abs_diff_eq!(residuals[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(residuals[1], -0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(residuals[2], -0.5, epsilon = 1e-12);
}

#[test]
fn test_rider_is_optional() {
    let mut tree = ModelTree::new(BicycleRider::new("bicycle_rider")).unwrap();
    let root = tree.root();
    let bicycle = tree
        .assign(root, "bicycle", PlanarBicycle::new("bicycle"))
        .unwrap();
    PlanarBicycle::assemble(&mut tree, bicycle).unwrap();
    tree.define_all().unwrap();
    let system = tree.to_system().unwrap();
    assert_eq!(system.coordinates.len(), 5);
    assert_eq!(system.bodies.len(), 4);
}

#[test]
fn test_reaction_forces_reach_the_frame() {
    let mut tree = BicycleRider::build("bicycle_rider").unwrap();
    let ground = tree.find("ground").unwrap();
    tree.attach_load_group(ground, UniformGravity::new("gravity"))
        .unwrap();
    tree.define_all().unwrap();
    let system = tree.to_system().unwrap();
    assert_eq!(system.loads.len(), 6, "one weight per body");
    assert_eq!(
        names(&system.auxiliary_speeds()),
        ["rear_tire_uaux_n", "front_tire_uaux_n"]
    );

    let values = BTreeMap::from([
        (tree.symbol("rear_tire", "uaux_n").unwrap(), 1.0),
        (tree.symbol("front_tire", "uaux_n").unwrap(), 10.0),
    ]);
    let mech = tree.mechanics();
    let velocity = |point: PointId| {
        let v = system.auxiliary_velocity(mech, point);
        mech.evaluate(&v, system.inertial_frame, &|s: &Symbol| {
            values.get(s).copied()
        })
        .unwrap()
    };
    // Everything hangs off the rear contact point.
    let torso = body(&tree, "torso").masscenter().unwrap();
    assert_eq!(velocity(torso), DVec2::new(0.0, 1.0));
    let front_wheel = body(&tree, "front_wheel").masscenter().unwrap();
    assert_eq!(velocity(front_wheel), DVec2::new(0.0, 1.0));
    // Only the front contact point itself moves with the front auxiliary speed.
    let front = contact(&tree, "front_tire").contact_point().unwrap();
    assert_eq!(velocity(front), DVec2::new(0.0, 11.0));
}
