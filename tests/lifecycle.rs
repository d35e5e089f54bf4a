// tests/lifecycle.rs
use brim::{
    Capability, Expr, FourBarLinkage, FrameId, JointTorque, LoadGroup, Model, ModelError,
    ModelResult, ModelTree, RigidLink, Stage, StageContext, SymbolKind, Transition,
};

struct LateSymbol {
    name: String,
}

impl Model for LateSymbol {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        ctx.symbol("late", "Created after the objects stage")?;
        Ok(())
    }
}

struct EarlyRelation {
    name: String,
}

impl Model for EarlyRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let a = ctx.new_frame("a")?;
        let b = ctx.new_frame("b")?;
        ctx.orient(b, a, brim::Expr::zero())
    }
}

/// Fails the first time it runs, after creating a symbol.
struct FlakyGroup {
    failed: bool,
}

impl LoadGroup for FlakyGroup {
    fn name(&self) -> &str {
        "flaky"
    }

    fn host_requires(&self) -> &'static [Capability] {
        &[Capability::Joint]
    }

    fn define_loads(&mut self, _host: &dyn Model, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        ctx.dynamic_symbol("k", "Gain of the flaky group", SymbolKind::Input)?;
        if !self.failed {
            self.failed = true;
            return Err(ModelError::Lookup {
                what: "transient".to_string(),
            });
        }
        Ok(())
    }
}

/// Orients a frame and then fails, the first time only.
struct HalfOriented {
    frames: Option<(FrameId, FrameId)>,
    failed: bool,
}

impl Model for HalfOriented {
    fn name(&self) -> &str {
        "half"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        self.frames = Some((ctx.new_frame("a")?, ctx.new_frame("b")?));
        Ok(())
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let Some((a, b)) = self.frames else {
            return Err(ModelError::Lookup {
                what: "frames".to_string(),
            });
        };
        ctx.orient(b, a, Expr::num(0.5))?;
        if !self.failed {
            self.failed = true;
            return Err(ModelError::Lookup {
                what: "transient".to_string(),
            });
        }
        Ok(())
    }
}

#[test]
fn test_transition_function() {
    assert_eq!(Stage::Unbuilt.transition(Stage::ConnectionsDefined), Transition::Advance);
    assert_eq!(Stage::Unbuilt.transition(Stage::ObjectsDefined), Transition::OutOfOrder);
    assert_eq!(Stage::LoadsDefined.transition(Stage::ObjectsDefined), Transition::Done);
    assert_eq!(Stage::ObjectsDefined.transition(Stage::ObjectsDefined), Transition::Done);
    assert_eq!(Stage::ConstraintsDefined.next(), None);
    assert_eq!(Stage::SEQUENCE.len(), 5);
    assert_eq!(Stage::LoadsDefined.operation(), "define_loads");
    assert_eq!(Stage::Unbuilt.operation(), "construct");
}

#[test]
fn test_stage_out_of_order() {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    let err = tree.define_kinematics().unwrap_err();
    assert!(
        matches!(
            err,
            ModelError::Ordering {
                state: Stage::Unbuilt,
                ..
            }
        ),
        "{err}"
    );

    tree.define_connections().unwrap();
    let err = tree.define_kinematics().unwrap_err();
    assert!(matches!(
        err,
        ModelError::Ordering {
            state: Stage::ConnectionsDefined,
            ..
        }
    ));
    let err = tree.define_loads().unwrap_err();
    assert!(matches!(err, ModelError::Ordering { .. }));

    // A failed request leaves the tree untouched.
    assert_eq!(tree.state(tree.root()).unwrap(), Stage::ConnectionsDefined);
    tree.define_objects().unwrap();
    tree.define_kinematics().unwrap();
}

#[test]
fn test_stage_twice_is_noop() {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    tree.define_connections().unwrap();
    tree.define_objects().unwrap();
    let length = tree.symbol("link1", "l").unwrap();
    let created = tree.registry().len();

    tree.define_objects().unwrap();
    tree.define_connections().unwrap();
    assert_eq!(tree.symbol("link1", "l").unwrap(), length);
    assert_eq!(tree.registry().len(), created, "no symbol is recreated");

    tree.define_kinematics().unwrap();
    tree.define_kinematics().unwrap();
    tree.define_loads().unwrap();
    tree.define_constraints().unwrap();
    tree.define_all().unwrap();
    let system = tree.to_system().unwrap();
    assert_eq!(system.coordinates.len(), 3, "coordinates are declared once");
}

#[test]
fn test_export_requires_constraints_stage() {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    assert!(matches!(tree.to_system(), Err(ModelError::Ordering { .. })));

    tree.define_connections().unwrap();
    tree.define_objects().unwrap();
    tree.define_kinematics().unwrap();
    tree.define_loads().unwrap();
    let err = tree.to_system().unwrap_err();
    assert!(
        matches!(
            err,
            ModelError::Ordering {
                state: Stage::LoadsDefined,
                ..
            }
        ),
        "{err}"
    );

    tree.define_constraints().unwrap();
    assert!(tree.to_system().is_ok());
}

#[test]
fn test_tree_freezes_on_first_stage() {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    assert!(!tree.is_frozen());
    tree.define_connections().unwrap();
    assert!(tree.is_frozen());

    let root = tree.root();
    let err = tree.assign(root, "link1", RigidLink::new("spare")).unwrap_err();
    assert!(matches!(err, ModelError::ConstraintViolation { .. }), "{err}");
    assert!(tree.find("spare").is_none());
}

#[test]
fn test_required_slot_checked_at_freeze() {
    let mut tree = ModelTree::new(FourBarLinkage::new("four_bar")).unwrap();
    let err = tree.define_connections().unwrap_err();
    assert!(matches!(err, ModelError::ConstraintViolation { ref node, .. } if node == "four_bar"));
    assert!(!tree.is_frozen());
}

#[test]
fn test_symbols_only_created_in_objects_stage() {
    let mut tree = ModelTree::new(LateSymbol {
        name: "late".to_string(),
    })
    .unwrap();
    tree.define_connections().unwrap();
    tree.define_objects().unwrap();
    let err = tree.define_kinematics().unwrap_err();
    assert!(matches!(err, ModelError::Ordering { .. }), "{err}");
    assert!(tree.registry().is_empty());
    assert!(matches!(tree.symbol("late", "late"), Err(ModelError::Lookup { .. })));
}

#[test]
fn test_relations_only_in_kinematics_stage() {
    let mut tree = ModelTree::new(EarlyRelation {
        name: "early".to_string(),
    })
    .unwrap();
    tree.define_connections().unwrap();
    let err = tree.define_objects().unwrap_err();
    assert!(matches!(err, ModelError::Ordering { .. }), "{err}");
}

#[test]
fn test_traversal_order() {
    let tree = FourBarLinkage::build("four_bar").unwrap();
    let order: Vec<&str> = tree
        .traversal_order()
        .iter()
        .map(|&id| tree.name(id).unwrap())
        .collect();
    assert_eq!(
        order,
        ["ground", "link1", "link2", "link3", "four_bar", "joint1", "joint2", "joint3", "closure"]
    );
    assert_eq!(tree.submodels().len(), 4);
    assert_eq!(tree.connections().len(), 4);
}

#[test]
fn test_failed_load_group_is_rolled_back() {
    let mut tree = FourBarLinkage::build("four_bar").unwrap();
    let joint = tree.find("joint1").unwrap();
    tree.attach_load_group(joint, JointTorque::new("motor")).unwrap();
    tree.attach_load_group(joint, FlakyGroup { failed: false }).unwrap();
    tree.define_connections().unwrap();
    tree.define_objects().unwrap();
    tree.define_kinematics().unwrap();
    let created = tree.registry().len();

    let err = tree.define_loads().unwrap_err();
    assert!(matches!(err, ModelError::Lookup { .. }), "{err}");
    assert_eq!(tree.state(joint).unwrap(), Stage::KinematicsDefined);
    assert!(tree.contribution(joint).unwrap().loads.is_empty());
    assert_eq!(tree.registry().len(), created);
    assert_eq!(tree.registry().owned_by("flaky").count(), 0);
    assert!(matches!(tree.symbol("motor", "T"), Err(ModelError::Lookup { .. })));

    tree.define_loads().unwrap();
    tree.define_constraints().unwrap();
    assert_eq!(tree.contribution(joint).unwrap().loads.len(), 2);
    assert_eq!(tree.registry().owned_by("flaky").count(), 1);
    assert_eq!(tree.symbol("motor", "T").unwrap().kind(), SymbolKind::Input);
    assert_eq!(tree.to_system().unwrap().loads.len(), 2, "one motor, two torques");
}

#[test]
fn test_failed_kinematics_can_be_retried() {
    let mut tree = ModelTree::new(HalfOriented {
        frames: None,
        failed: false,
    })
    .unwrap();
    tree.define_connections().unwrap();
    tree.define_objects().unwrap();

    assert!(tree.define_kinematics().is_err());
    assert_eq!(tree.state(tree.root()).unwrap(), Stage::ObjectsDefined);
    tree.define_kinematics().unwrap();
    assert_eq!(tree.state(tree.root()).unwrap(), Stage::KinematicsDefined);
}
