use super::created;
use crate::context::StageContext;
use crate::error::ModelResult;
use crate::expr::{Symbol, SymbolKind};
use crate::mechanics::{Axis, FrameId};
use crate::model::{Anchor, Capability, Joint, Model, Role, SlotSpec};

const PIN_USES: &[SlotSpec] = &[
    SlotSpec::model("parent", &[Capability::Body], "Body the joint is mounted on"),
    SlotSpec::model("child", &[Capability::Body], "Body rotated by the joint"),
];

/// Revolute joint about the plane normal.
///
/// The child frame is rotated by `q` relative to the parent frame and the
/// child anchor coincides with the parent anchor.
pub struct PinJoint {
    name: String,
    parent_anchor: Anchor,
    child_anchor: Anchor,
    coordinates: Vec<Symbol>,
    speeds: Vec<Symbol>,
    frames: Option<(FrameId, FrameId)>,
}

impl PinJoint {
    /// A joint from the distal end of the parent to the proximal end of the child.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_anchor: Anchor::Distal,
            child_anchor: Anchor::Proximal,
            coordinates: Vec::new(),
            speeds: Vec::new(),
            frames: None,
        }
    }

    pub fn with_anchors(mut self, parent: Anchor, child: Anchor) -> Self {
        self.parent_anchor = parent;
        self.child_anchor = child;
        self
    }
}

impl Model for PinJoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Joint]
    }

    fn role(&self) -> Role {
        Role::Connection
    }

    fn uses(&self) -> &'static [SlotSpec] {
        PIN_USES
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let q = ctx.dynamic_symbol(
            "q",
            "Rotation angle of the joint",
            SymbolKind::Coordinate,
        )?;
        let u = ctx.dynamic_symbol("u", "Angular speed of the joint", SymbolKind::Speed)?;
        self.coordinates = vec![q];
        self.speeds = vec![u];
        Ok(())
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let parent = ctx.body("parent")?;
        let child = ctx.body("child")?;
        let (q, u) = (self.coordinates[0].clone(), self.speeds[0].clone());
        let (parent_frame, child_frame) = (parent.frame()?, child.frame()?);

        ctx.orient(child_frame, parent_frame, q.expr())?;
        let offset = ctx
            .mechanics()
            .pos_from(child.masscenter()?, child.anchor(self.child_anchor)?)?;
        ctx.set_pos(child.masscenter()?, parent.anchor(self.parent_anchor)?, offset)?;
        ctx.add_coordinate(&q, &u)?;
        self.frames = Some((parent_frame, child_frame));
        Ok(())
    }

    fn as_joint(&self) -> Option<&dyn Joint> {
        Some(self)
    }
}

impl Joint for PinJoint {
    fn coordinates(&self) -> &[Symbol] {
        &self.coordinates
    }

    fn speeds(&self) -> &[Symbol] {
        &self.speeds
    }

    fn parent_frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.frames, &self.name)?.0)
    }

    fn child_frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.frames, &self.name)?.1)
    }
}

const CLOSURE_USES: &[SlotSpec] = &[
    SlotSpec::model("base", &[Capability::Ground], "Ground the loop is closed on"),
    SlotSpec::model("end", &[Capability::Body], "Last body of the open chain"),
];

/// Pins an anchor of a body to a fixed point `(x, y)` of the ground, closing a
/// kinematic loop with two holonomic constraints.
pub struct LoopClosure {
    name: String,
    end_anchor: Anchor,
    offset: Option<(Symbol, Symbol)>,
}

impl LoopClosure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            end_anchor: Anchor::Distal,
            offset: None,
        }
    }

    pub fn with_end_anchor(mut self, anchor: Anchor) -> Self {
        self.end_anchor = anchor;
        self
    }
}

impl Model for LoopClosure {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Closure]
    }

    fn role(&self) -> Role {
        Role::Connection
    }

    fn uses(&self) -> &'static [SlotSpec] {
        CLOSURE_USES
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let x = ctx.symbol(
            "x",
            "Distance of the closing point from the ground origin along the ground",
        )?;
        let y = ctx.symbol("y", "Height of the closing point above the ground origin")?;
        self.offset = Some((x, y));
        Ok(())
    }

    fn define_constraints(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let ground = ctx.ground("base")?;
        let end = ctx.body("end")?;
        let (x, y) = created(&self.offset, &self.name)?.clone();
        let (frame, tangent, normal) = (ground.frame()?, ground.tangent()?, ground.normal()?);

        let mech = ctx.mechanics();
        let gap = mech.pos_from(end.anchor(self.end_anchor)?, ground.origin()?)?
            - (tangent.scale(x.expr()) + normal.scale(y.expr()));
        let along = mech.dot(&gap, &tangent, frame)?;
        let across = mech.dot(&gap, &normal, frame)?;
        ctx.add_holonomic(along)?;
        ctx.add_holonomic(across)
    }
}

const GRIP_USES: &[SlotSpec] = &[
    SlotSpec::model("hand", &[Capability::Body], "Body holding on"),
    SlotSpec::model("handlebar", &[Capability::Body], "Body being held"),
];

/// Holds an anchor of one body onto an anchor of another, with one holonomic
/// constraint per in-plane axis of the held body's frame.
///
/// Unlike a [`PinJoint`] it introduces no coordinate, so it can close a loop
/// between two otherwise independent chains.
pub struct HandGrip {
    name: String,
    hand_anchor: Anchor,
    handlebar_anchor: Anchor,
}

impl HandGrip {
    /// Grips the proximal end of the handlebar with the distal end of the hand.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hand_anchor: Anchor::Distal,
            handlebar_anchor: Anchor::Proximal,
        }
    }

    pub fn with_anchors(mut self, hand: Anchor, handlebar: Anchor) -> Self {
        self.hand_anchor = hand;
        self.handlebar_anchor = handlebar;
        self
    }
}

impl Model for HandGrip {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Closure]
    }

    fn role(&self) -> Role {
        Role::Connection
    }

    fn uses(&self) -> &'static [SlotSpec] {
        GRIP_USES
    }

    fn define_constraints(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let hand = ctx.body("hand")?;
        let handlebar = ctx.body("handlebar")?;
        let frame = handlebar.frame()?;

        let mech = ctx.mechanics();
        let gap = mech.pos_from(
            hand.anchor(self.hand_anchor)?,
            handlebar.anchor(self.handlebar_anchor)?,
        )?;
        let along = mech.component(&gap, frame, Axis::X)?;
        let across = mech.component(&gap, frame, Axis::Y)?;
        ctx.add_holonomic(along)?;
        ctx.add_holonomic(across)
    }
}
