//! Model nodes, slots and capabilities.
//!
//! A [`Model`] is the unit of composition. It declares owned slots
//! ([`Model::slots`]) for child submodels and connections, and, when it is a
//! connection, the slots it *uses* ([`Model::uses`]) without owning them.
//! Slot constraints are sets of [`Capability`] tags; a tag that carries an
//! interface is reached through the matching accessor (`as_body`, `as_wheel`, ...).

use crate::context::{ConnectionContext, StageContext};
use crate::error::ModelResult;
use crate::expr::{Expr, Symbol};
use crate::mechanics::{FrameId, PointId, Vector};
use serde::{Deserialize, Serialize};

/// Build stage of a node.
///
/// Stages are totally ordered; a node only ever moves to the next one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Unbuilt,
    ConnectionsDefined,
    ObjectsDefined,
    KinematicsDefined,
    LoadsDefined,
    ConstraintsDefined,
}

/// Outcome of asking a node to enter a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The node already reached the stage; nothing to do.
    Done,
    /// The stage directly follows the current one.
    Advance,
    /// The stage would skip (or re-enter) a stage.
    OutOfOrder,
}

impl Stage {
    /// The five build stages in execution order.
    pub const SEQUENCE: [Stage; 5] = [
        Stage::ConnectionsDefined,
        Stage::ObjectsDefined,
        Stage::KinematicsDefined,
        Stage::LoadsDefined,
        Stage::ConstraintsDefined,
    ];

    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Unbuilt => Some(Self::ConnectionsDefined),
            Self::ConnectionsDefined => Some(Self::ObjectsDefined),
            Self::ObjectsDefined => Some(Self::KinematicsDefined),
            Self::KinematicsDefined => Some(Self::LoadsDefined),
            Self::LoadsDefined => Some(Self::ConstraintsDefined),
            Self::ConstraintsDefined => None,
        }
    }

    pub fn previous(self) -> Option<Stage> {
        match self {
            Self::Unbuilt => None,
            Self::ConnectionsDefined => Some(Self::Unbuilt),
            Self::ObjectsDefined => Some(Self::ConnectionsDefined),
            Self::KinematicsDefined => Some(Self::ObjectsDefined),
            Self::LoadsDefined => Some(Self::KinematicsDefined),
            Self::ConstraintsDefined => Some(Self::LoadsDefined),
        }
    }

    /// The transition function: the only way a node's stage changes.
    pub fn transition(self, target: Stage) -> Transition {
        if self >= target {
            Transition::Done
        } else if self.next() == Some(target) {
            Transition::Advance
        } else {
            Transition::OutOfOrder
        }
    }

    /// Name of the operation that produces this stage.
    pub fn operation(self) -> &'static str {
        match self {
            Self::Unbuilt => "construct",
            Self::ConnectionsDefined => "define_connections",
            Self::ObjectsDefined => "define_objects",
            Self::KinematicsDefined => "define_kinematics",
            Self::LoadsDefined => "define_loads",
            Self::ConstraintsDefined => "define_constraints",
        }
    }
}

/// Capability tags a slot can require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Inertial ground; exposes [`Ground`].
    Ground,
    /// Anything with a frame and a mass center; exposes [`Body`].
    Body,
    /// A slender rigid link; exposes [`Body`].
    Link,
    /// A wheel; exposes [`Wheel`].
    Wheel,
    /// A joint connection; exposes [`Joint`].
    Joint,
    /// A wheel/ground contact connection; exposes [`Contact`].
    Contact,
    /// A loop-closing connection.
    Closure,
    /// A composite model.
    Assembly,
}

impl Capability {
    /// Whether `model` exposes the interface this tag promises.
    pub fn is_exposed_by(self, model: &dyn Model) -> bool {
        match self {
            Self::Ground => model.as_ground().is_some(),
            Self::Body | Self::Link => model.as_body().is_some(),
            Self::Wheel => model.as_wheel().is_some(),
            Self::Joint => model.as_joint().is_some(),
            Self::Contact => model.as_contact().is_some(),
            Self::Closure | Self::Assembly => true,
        }
    }
}

/// How many children a slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    ExactlyOne,
    ZeroOrOne,
    Many,
}

/// Whether a node (or a slot) is a plain model or a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Model,
    Connection,
}

/// Declaration of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    /// Every tag listed here must be carried by the child.
    pub requires: &'static [Capability],
    pub cardinality: Cardinality,
    pub role: Role,
    pub description: &'static str,
}

impl SlotSpec {
    /// A required slot holding a submodel.
    pub const fn model(
        name: &'static str,
        requires: &'static [Capability],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            requires,
            cardinality: Cardinality::ExactlyOne,
            role: Role::Model,
            description,
        }
    }

    /// A required slot holding a connection.
    pub const fn connection(
        name: &'static str,
        requires: &'static [Capability],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            requires,
            cardinality: Cardinality::ExactlyOne,
            role: Role::Connection,
            description,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.cardinality = Cardinality::ZeroOrOne;
        self
    }

    pub const fn many(mut self) -> Self {
        self.cardinality = Cardinality::Many;
        self
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::ExactlyOne
    }

    /// Whether a child carrying `capabilities` fits this slot.
    pub fn accepts(&self, capabilities: &[Capability]) -> bool {
        self.requires.iter().all(|c| capabilities.contains(c))
    }
}

/// Named attachment point of a body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Base end of a link.
    #[default]
    Proximal,
    /// Tip end of a link.
    Distal,
    /// The mass center.
    Center,
}

/// The polymorphic unit of composition.
///
/// Stage hooks default to doing nothing. The lifecycle controller calls them in
/// traversal order; a node never calls them itself.
pub trait Model {
    /// Tree-wide unique name; symbols and backend objects are named after it.
    fn name(&self) -> &str;

    fn capabilities(&self) -> &'static [Capability];

    fn role(&self) -> Role {
        Role::Model
    }

    /// Owned slots in declaration order.
    fn slots(&self) -> &'static [SlotSpec] {
        &[]
    }

    /// Referenced (not owned) slots of a connection.
    fn uses(&self) -> &'static [SlotSpec] {
        &[]
    }

    /// Binds the uses-slots of this node's connections.
    fn define_connections(&mut self, _ctx: &mut ConnectionContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Creates symbols, frames, points and bodies. No relations yet.
    fn define_objects(&mut self, _ctx: &mut StageContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    /// Relates previously created objects.
    fn define_kinematics(&mut self, _ctx: &mut StageContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn define_loads(&mut self, _ctx: &mut StageContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn define_constraints(&mut self, _ctx: &mut StageContext<'_>) -> ModelResult<()> {
        Ok(())
    }

    fn as_body(&self) -> Option<&dyn Body> {
        None
    }

    fn as_ground(&self) -> Option<&dyn Ground> {
        None
    }

    fn as_wheel(&self) -> Option<&dyn Wheel> {
        None
    }

    fn as_joint(&self) -> Option<&dyn Joint> {
        None
    }

    fn as_contact(&self) -> Option<&dyn Contact> {
        None
    }
}

/// A rigid body with named attachment points.
pub trait Body {
    fn frame(&self) -> ModelResult<FrameId>;

    fn masscenter(&self) -> ModelResult<PointId>;

    fn anchor(&self, anchor: Anchor) -> ModelResult<PointId>;
}

/// The inertial ground.
pub trait Ground {
    fn frame(&self) -> ModelResult<FrameId>;

    fn origin(&self) -> ModelResult<PointId>;

    /// Unit normal of the ground plane.
    fn normal(&self) -> ModelResult<Vector>;

    /// Unit in-plane tangent, perpendicular to [`normal`](Ground::normal).
    fn tangent(&self) -> ModelResult<Vector>;
}

pub trait Wheel {
    fn center(&self) -> ModelResult<PointId>;

    /// Distance from the wheel center to the contact point.
    fn rolling_radius(&self) -> ModelResult<Expr>;
}

/// A connection that introduces generalized coordinates between two bodies.
pub trait Joint {
    fn coordinates(&self) -> &[Symbol];

    fn speeds(&self) -> &[Symbol];

    fn parent_frame(&self) -> ModelResult<FrameId>;

    fn child_frame(&self) -> ModelResult<FrameId>;
}

pub trait Contact {
    fn contact_point(&self) -> ModelResult<PointId>;
}

/// An attachable bundle of loads.
///
/// A group is attached to exactly one host node and contributes to the host's
/// share of the exported system. Its symbols belong to the group's own name.
pub trait LoadGroup {
    fn name(&self) -> &str;

    /// Tags the host must carry.
    fn host_requires(&self) -> &'static [Capability];

    fn define_loads(&mut self, host: &dyn Model, ctx: &mut StageContext<'_>) -> ModelResult<()>;
}
