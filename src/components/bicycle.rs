use super::{
    FlatGround, HandGrip, KnifeEdgeWheel, PinJoint, RigidLink, RollingContact, created,
};
use crate::context::{ConnectionContext, StageContext};
use crate::error::ModelResult;
use crate::expr::{Symbol, SymbolKind};
use crate::model::{Anchor, Capability, Model, SlotSpec};
use crate::tree::{ModelTree, NodeId};

const BICYCLE_SLOTS: &[SlotSpec] = &[
    SlotSpec::model("ground", &[Capability::Ground], "Ground both wheels roll on"),
    SlotSpec::model(
        "rear_wheel",
        &[Capability::Wheel, Capability::Body],
        "Rear wheel",
    ),
    SlotSpec::model(
        "rear_frame",
        &[Capability::Link],
        "Rear frame, from the rear hub to the head tube",
    ),
    SlotSpec::model(
        "front_frame",
        &[Capability::Link],
        "Fork, from the head tube to the front hub",
    ),
    SlotSpec::model(
        "front_wheel",
        &[Capability::Wheel, Capability::Body],
        "Front wheel",
    ),
    SlotSpec::connection("rear_tire", &[Capability::Contact], "Rear wheel on the ground"),
    SlotSpec::connection("rear_hub", &[Capability::Joint], "Rear wheel to rear frame"),
    SlotSpec::connection("head", &[Capability::Joint], "Rear frame to fork"),
    SlotSpec::connection("front_hub", &[Capability::Joint], "Fork to front wheel"),
    SlotSpec::connection("front_tire", &[Capability::Contact], "Front wheel on the ground"),
];

/// A bicycle moving in its own plane, both wheels rolling on one ground.
///
/// Coordinates of its own: the position `x` of the rear contact point along
/// the ground and the rotation `theta` of the rear wheel. The hubs and the
/// head tube add one coordinate each. The front contact point must stay on
/// the ground, which leaves one holonomic constraint.
pub struct PlanarBicycle {
    name: String,
    state: Option<[(Symbol, Symbol); 2]>,
}

impl PlanarBicycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: None,
        }
    }

    /// Fills the slots of the bicycle at `bicycle` with the default parts,
    /// named after the slots.
    pub fn assemble(tree: &mut ModelTree, bicycle: NodeId) -> ModelResult<()> {
        tree.assign(bicycle, "ground", FlatGround::new("ground"))?;
        tree.assign(bicycle, "rear_wheel", KnifeEdgeWheel::new("rear_wheel"))?;
        tree.assign(bicycle, "rear_frame", RigidLink::new("rear_frame"))?;
        tree.assign(bicycle, "front_frame", RigidLink::new("front_frame"))?;
        tree.assign(bicycle, "front_wheel", KnifeEdgeWheel::new("front_wheel"))?;
        tree.assign(bicycle, "rear_tire", RollingContact::new("rear_tire"))?;
        let rear_hub = PinJoint::new("rear_hub").with_anchors(Anchor::Center, Anchor::Proximal);
        tree.assign(bicycle, "rear_hub", rear_hub)?;
        tree.assign(bicycle, "head", PinJoint::new("head"))?;
        let front_hub = PinJoint::new("front_hub").with_anchors(Anchor::Distal, Anchor::Center);
        tree.assign(bicycle, "front_hub", front_hub)?;
        tree.assign(bicycle, "front_tire", RollingContact::new("front_tire"))?;
        Ok(())
    }

    /// A tree holding a bicycle with the default parts.
    pub fn build(name: impl Into<String>) -> ModelResult<ModelTree> {
        let mut tree = ModelTree::new(Self::new(name))?;
        let root = tree.root();
        Self::assemble(&mut tree, root)?;
        Ok(tree)
    }
}

impl Model for PlanarBicycle {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Assembly]
    }

    fn slots(&self) -> &'static [SlotSpec] {
        BICYCLE_SLOTS
    }

    fn define_connections(&mut self, ctx: &mut ConnectionContext<'_>) -> ModelResult<()> {
        for tire in ["rear_tire", "front_tire"] {
            ctx.bind(tire, "ground", "ground")?;
        }
        ctx.bind("rear_tire", "wheel", "rear_wheel")?;
        ctx.bind("front_tire", "wheel", "front_wheel")?;
        ctx.bind("rear_hub", "parent", "rear_wheel")?;
        ctx.bind("rear_hub", "child", "rear_frame")?;
        ctx.bind("head", "parent", "rear_frame")?;
        ctx.bind("head", "child", "front_frame")?;
        ctx.bind("front_hub", "parent", "front_frame")?;
        ctx.bind("front_hub", "child", "front_wheel")
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let q_x = ctx.dynamic_symbol(
            "q_x",
            "Position of the rear contact point along the ground",
            SymbolKind::Coordinate,
        )?;
        let u_x = ctx.dynamic_symbol(
            "u_x",
            "Speed of the rear contact point along the ground",
            SymbolKind::Speed,
        )?;
        let q_theta = ctx.dynamic_symbol(
            "q_theta",
            "Rotation angle of the rear wheel",
            SymbolKind::Coordinate,
        )?;
        let u_theta = ctx.dynamic_symbol(
            "u_theta",
            "Angular speed of the rear wheel",
            SymbolKind::Speed,
        )?;
        self.state = Some([(q_x, u_x), (q_theta, u_theta)]);
        Ok(())
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let ground = ctx.ground("ground")?;
        let rear_wheel = ctx.body("rear_wheel")?;
        let rear_tire = ctx.contact("rear_tire")?;
        let [(q_x, u_x), (q_theta, u_theta)] = created(&self.state, &self.name)?.clone();

        ctx.orient(rear_wheel.frame()?, ground.frame()?, q_theta.expr())?;
        let along = ground.tangent()?.scale(q_x.expr());
        ctx.set_pos(rear_tire.contact_point()?, ground.origin()?, along)?;
        ctx.add_coordinate(&q_x, &u_x)?;
        ctx.add_coordinate(&q_theta, &u_theta)
    }
}

const RIDER_SLOTS: &[SlotSpec] = &[
    SlotSpec::model(
        "torso",
        &[Capability::Link],
        "Torso, from the hip to the shoulder",
    ),
    SlotSpec::model(
        "arm",
        &[Capability::Link],
        "Arm, from the shoulder to the hand",
    ),
    SlotSpec::connection("shoulder", &[Capability::Joint], "Torso to arm"),
];

/// A planar rider: a torso and one arm pinned at the shoulder.
///
/// The rider has no ground of its own; a host attaches it to a bicycle.
pub struct PlanarRider {
    name: String,
}

impl PlanarRider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Fills the slots of the rider at `rider` with the default parts.
    pub fn assemble(tree: &mut ModelTree, rider: NodeId) -> ModelResult<()> {
        tree.assign(rider, "torso", RigidLink::new("torso"))?;
        tree.assign(rider, "arm", RigidLink::new("arm"))?;
        tree.assign(rider, "shoulder", PinJoint::new("shoulder"))?;
        Ok(())
    }
}

impl Model for PlanarRider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Assembly]
    }

    fn slots(&self) -> &'static [SlotSpec] {
        RIDER_SLOTS
    }

    fn define_connections(&mut self, ctx: &mut ConnectionContext<'_>) -> ModelResult<()> {
        ctx.bind("shoulder", "parent", "torso")?;
        ctx.bind("shoulder", "child", "arm")
    }
}

const BICYCLE_RIDER_SLOTS: &[SlotSpec] = &[
    SlotSpec::model("bicycle", &[Capability::Assembly], "The bicycle"),
    SlotSpec::model("rider", &[Capability::Assembly], "The rider").optional(),
    SlotSpec::connection("seat", &[Capability::Joint], "Rear frame to the rider's hip")
        .optional(),
    SlotSpec::connection(
        "hand_grip",
        &[Capability::Closure],
        "Rider's hand on the handlebar",
    )
    .optional(),
];

/// A bicycle, optionally extended with a rider sitting on the rear frame and
/// holding the fork.
///
/// The seat and the hand grip reach into both subtrees by path
/// (`bicycle.rear_frame`, `rider.torso`, ...). Without the rider and its two
/// connections the tree is the bare bicycle.
pub struct BicycleRider {
    name: String,
}

impl BicycleRider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// A tree with a default bicycle, a default rider, a pin at the seat and a
    /// hand grip.
    pub fn build(name: impl Into<String>) -> ModelResult<ModelTree> {
        let mut tree = ModelTree::new(Self::new(name))?;
        let root = tree.root();
        let bicycle = tree.assign(root, "bicycle", PlanarBicycle::new("bicycle"))?;
        PlanarBicycle::assemble(&mut tree, bicycle)?;
        let rider = tree.assign(root, "rider", PlanarRider::new("rider"))?;
        PlanarRider::assemble(&mut tree, rider)?;
        let seat = PinJoint::new("seat").with_anchors(Anchor::Center, Anchor::Proximal);
        tree.assign(root, "seat", seat)?;
        tree.assign(root, "hand_grip", HandGrip::new("hand_grip"))?;
        Ok(tree)
    }
}

impl Model for BicycleRider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Assembly]
    }

    fn slots(&self) -> &'static [SlotSpec] {
        BICYCLE_RIDER_SLOTS
    }

    fn define_connections(&mut self, ctx: &mut ConnectionContext<'_>) -> ModelResult<()> {
        ctx.bind("seat", "parent", "bicycle.rear_frame")?;
        ctx.bind("seat", "child", "rider.torso")?;
        ctx.bind("hand_grip", "handlebar", "bicycle.front_frame")?;
        ctx.bind("hand_grip", "hand", "rider.arm")
    }
}
