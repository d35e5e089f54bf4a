use super::{FlatGround, KnifeEdgeWheel, LoopClosure, PinJoint, RigidLink, RollingContact, created};
use crate::context::{ConnectionContext, StageContext};
use crate::error::ModelResult;
use crate::expr::{Symbol, SymbolKind};
use crate::model::{Capability, Model, SlotSpec};
use crate::tree::ModelTree;

const FOUR_BAR_SLOTS: &[SlotSpec] = &[
    SlotSpec::model("ground", &[Capability::Ground], "Fixed bar of the linkage"),
    SlotSpec::model("link1", &[Capability::Link], "Crank, pinned to the ground"),
    SlotSpec::model("link2", &[Capability::Link], "Coupler"),
    SlotSpec::model("link3", &[Capability::Link], "Rocker, closing onto the ground"),
    SlotSpec::connection("joint1", &[Capability::Joint], "Ground to crank"),
    SlotSpec::connection("joint2", &[Capability::Joint], "Crank to coupler"),
    SlotSpec::connection("joint3", &[Capability::Joint], "Coupler to rocker"),
    SlotSpec::connection("closure", &[Capability::Closure], "Rocker to ground"),
];

/// Planar four-bar linkage: an open chain of three links pinned to the ground,
/// closed onto the ground by a loop closure.
pub struct FourBarLinkage {
    name: String,
}

impl FourBarLinkage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// A tree with the default parts: `ground`, `link1..3`, `joint1..3` and
    /// `closure`.
    pub fn build(name: impl Into<String>) -> ModelResult<ModelTree> {
        let mut tree = ModelTree::new(Self::new(name))?;
        let root = tree.root();
        tree.assign(root, "ground", FlatGround::new("ground"))?;
        for i in 1..=3 {
            tree.assign(root, &format!("link{i}"), RigidLink::new(format!("link{i}")))?;
            tree.assign(root, &format!("joint{i}"), PinJoint::new(format!("joint{i}")))?;
        }
        tree.assign(root, "closure", LoopClosure::new("closure"))?;
        Ok(tree)
    }
}

impl Model for FourBarLinkage {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Assembly]
    }

    fn slots(&self) -> &'static [SlotSpec] {
        FOUR_BAR_SLOTS
    }

    fn define_connections(&mut self, ctx: &mut ConnectionContext<'_>) -> ModelResult<()> {
        ctx.bind("joint1", "parent", "ground")?;
        ctx.bind("joint1", "child", "link1")?;
        ctx.bind("joint2", "parent", "link1")?;
        ctx.bind("joint2", "child", "link2")?;
        ctx.bind("joint3", "parent", "link2")?;
        ctx.bind("joint3", "child", "link3")?;
        ctx.bind("closure", "base", "ground")?;
        ctx.bind("closure", "end", "link3")
    }
}

const ROLLING_DISC_SLOTS: &[SlotSpec] = &[
    SlotSpec::model("ground", &[Capability::Ground], "Ground the disc rolls on"),
    SlotSpec::model("disc", &[Capability::Wheel, Capability::Body], "The disc"),
    SlotSpec::connection("tire", &[Capability::Contact], "Contact between disc and ground"),
];

/// A disc rolling without slip on flat ground.
///
/// Coordinates: the position `x` of the contact point along the ground and
/// the rotation `theta` of the disc.
pub struct RollingDisc {
    name: String,
    state: Option<[(Symbol, Symbol); 2]>,
}

impl RollingDisc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: None,
        }
    }

    /// A tree with `ground`, a knife-edge `disc` and a rolling `tire`.
    pub fn build(name: impl Into<String>) -> ModelResult<ModelTree> {
        let mut tree = ModelTree::new(Self::new(name))?;
        let root = tree.root();
        tree.assign(root, "ground", FlatGround::new("ground"))?;
        tree.assign(root, "disc", KnifeEdgeWheel::new("disc"))?;
        tree.assign(root, "tire", RollingContact::new("tire"))?;
        Ok(tree)
    }
}

impl Model for RollingDisc {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Assembly]
    }

    fn slots(&self) -> &'static [SlotSpec] {
        ROLLING_DISC_SLOTS
    }

    fn define_connections(&mut self, ctx: &mut ConnectionContext<'_>) -> ModelResult<()> {
        ctx.bind_by_name("tire")?;
        ctx.bind("tire", "wheel", "disc")
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let q_x = ctx.dynamic_symbol(
            "q_x",
            "Position of the contact point along the ground",
            SymbolKind::Coordinate,
        )?;
        let u_x = ctx.dynamic_symbol(
            "u_x",
            "Speed of the contact point along the ground",
            SymbolKind::Speed,
        )?;
        let q_theta = ctx.dynamic_symbol(
            "q_theta",
            "Rotation angle of the disc",
            SymbolKind::Coordinate,
        )?;
        let u_theta = ctx.dynamic_symbol(
            "u_theta",
            "Angular speed of the disc",
            SymbolKind::Speed,
        )?;
        self.state = Some([(q_x, u_x), (q_theta, u_theta)]);
        Ok(())
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let ground = ctx.ground("ground")?;
        let disc = ctx.body("disc")?;
        let tire = ctx.contact("tire")?;
        let [(q_x, u_x), (q_theta, u_theta)] = created(&self.state, &self.name)?.clone();

        ctx.orient(disc.frame()?, ground.frame()?, q_theta.expr())?;
        let along = ground.tangent()?.scale(q_x.expr());
        ctx.set_pos(tire.contact_point()?, ground.origin()?, along)?;
        ctx.add_coordinate(&q_x, &u_x)?;
        ctx.add_coordinate(&q_theta, &u_theta)
    }
}
