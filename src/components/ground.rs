use super::created;
use crate::context::StageContext;
use crate::error::{ModelError, ModelResult};
use crate::expr::Expr;
use crate::mechanics::{Axis, FrameId, PointId, Vector};
use crate::model::{Anchor, Body, Capability, Ground, Model};

/// Direction of the ground normal in the ground frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalDirection {
    pub axis: Axis,
    pub positive: bool,
}

impl Default for NormalDirection {
    fn default() -> Self {
        Self {
            axis: Axis::Y,
            positive: true,
        }
    }
}

impl NormalDirection {
    /// Parses `"+x"`, `"-x"`, `"x"`, `"+y"`, `"-y"` or `"y"`.
    pub fn parse(text: &str) -> Option<Self> {
        let (positive, axis) = match text.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, text.strip_prefix('+').unwrap_or(text)),
        };
        let axis = match axis {
            "x" => Axis::X,
            "y" => Axis::Y,
            _ => return None,
        };
        Some(Self { axis, positive })
    }

    fn sign(self) -> f64 {
        if self.positive { 1.0 } else { -1.0 }
    }

    fn normal(self, frame: FrameId) -> Vector {
        Vector::unit(frame, self.axis).scale(Expr::num(self.sign()))
    }

    /// The normal turned a quarter turn clockwise.
    fn tangent(self, frame: FrameId) -> Vector {
        match self.axis {
            Axis::Y => Vector::unit(frame, Axis::X).scale(Expr::num(self.sign())),
            Axis::X => Vector::unit(frame, Axis::Y).scale(Expr::num(-self.sign())),
        }
    }
}

struct GroundObjects {
    frame: FrameId,
    origin: PointId,
}

/// A flat, inertial ground. It owns the Newtonian frame and the fixed point.
pub struct FlatGround {
    name: String,
    normal: NormalDirection,
    objects: Option<GroundObjects>,
}

impl FlatGround {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            normal: NormalDirection::default(),
            objects: None,
        }
    }

    pub fn with_normal(mut self, direction: &str) -> ModelResult<Self> {
        self.normal = NormalDirection::parse(direction).ok_or_else(|| {
            ModelError::violation(&self.name, format!("'{direction}' is not a normal direction"))
        })?;
        Ok(self)
    }

    pub fn normal_direction(&self) -> NormalDirection {
        self.normal
    }
}

impl Model for FlatGround {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Ground, Capability::Body]
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let frame = ctx.new_frame("frame")?;
        let origin = ctx.new_point("origin")?;
        ctx.declare_newtonian(frame, origin)?;
        self.objects = Some(GroundObjects { frame, origin });
        Ok(())
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }

    fn as_ground(&self) -> Option<&dyn Ground> {
        Some(self)
    }
}

impl Body for FlatGround {
    fn frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.objects, &self.name)?.frame)
    }

    fn masscenter(&self) -> ModelResult<PointId> {
        self.origin()
    }

    /// Every anchor of the ground is its origin.
    fn anchor(&self, _anchor: Anchor) -> ModelResult<PointId> {
        self.origin()
    }
}

impl Ground for FlatGround {
    fn frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.objects, &self.name)?.frame)
    }

    fn origin(&self) -> ModelResult<PointId> {
        Ok(created(&self.objects, &self.name)?.origin)
    }

    fn normal(&self) -> ModelResult<Vector> {
        Ok(self.normal.normal(created(&self.objects, &self.name)?.frame))
    }

    fn tangent(&self) -> ModelResult<Vector> {
        Ok(self.normal.tangent(created(&self.objects, &self.name)?.frame))
    }
}
