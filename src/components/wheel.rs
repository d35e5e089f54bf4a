use super::created;
use crate::context::StageContext;
use crate::error::ModelResult;
use crate::expr::Expr;
use crate::mechanics::{FrameId, PointId};
use crate::model::{Anchor, Body, Capability, Model, Wheel};

struct WheelObjects {
    frame: FrameId,
    center: PointId,
    rolling_radius: Expr,
}

/// Mass, inertia, frame and center shared by every wheel.
fn wheel_objects(ctx: &mut StageContext<'_>, rolling_radius: Expr) -> ModelResult<WheelObjects> {
    let mass = ctx.symbol("m", "Mass of the wheel")?;
    let izz = ctx.symbol("izz", "Moment of inertia of the wheel about its spin axis")?;
    let frame = ctx.new_frame("frame")?;
    let center = ctx.new_point("center")?;
    ctx.add_body(frame, center, mass.expr(), izz.expr())?;
    Ok(WheelObjects {
        frame,
        center,
        rolling_radius,
    })
}

/// A thin disc touching the ground with its rim.
pub struct KnifeEdgeWheel {
    name: String,
    objects: Option<WheelObjects>,
}

impl KnifeEdgeWheel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: None,
        }
    }
}

impl Model for KnifeEdgeWheel {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Body, Capability::Wheel]
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let radius = ctx.symbol("r", "Radius of the wheel")?;
        self.objects = Some(wheel_objects(ctx, radius.expr())?);
        Ok(())
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }

    fn as_wheel(&self) -> Option<&dyn Wheel> {
        Some(self)
    }
}

impl Body for KnifeEdgeWheel {
    fn frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.objects, &self.name)?.frame)
    }

    fn masscenter(&self) -> ModelResult<PointId> {
        Ok(created(&self.objects, &self.name)?.center)
    }

    fn anchor(&self, _anchor: Anchor) -> ModelResult<PointId> {
        self.masscenter()
    }
}

impl Wheel for KnifeEdgeWheel {
    fn center(&self) -> ModelResult<PointId> {
        Ok(created(&self.objects, &self.name)?.center)
    }

    fn rolling_radius(&self) -> ModelResult<Expr> {
        Ok(created(&self.objects, &self.name)?.rolling_radius.clone())
    }
}

/// A wheel with a tire of circular cross-section; it rolls on radius `r + tr`.
pub struct ToroidalWheel {
    name: String,
    objects: Option<WheelObjects>,
}

impl ToroidalWheel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: None,
        }
    }
}

impl Model for ToroidalWheel {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Body, Capability::Wheel]
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let radius = ctx.symbol("r", "Radius of the wheel up to the center of the tire tube")?;
        let tube = ctx.symbol("tr", "Radius of the tire tube")?;
        self.objects = Some(wheel_objects(ctx, radius.expr() + tube.expr())?);
        Ok(())
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }

    fn as_wheel(&self) -> Option<&dyn Wheel> {
        Some(self)
    }
}

impl Body for ToroidalWheel {
    fn frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.objects, &self.name)?.frame)
    }

    fn masscenter(&self) -> ModelResult<PointId> {
        Ok(created(&self.objects, &self.name)?.center)
    }

    fn anchor(&self, _anchor: Anchor) -> ModelResult<PointId> {
        self.masscenter()
    }
}

impl Wheel for ToroidalWheel {
    fn center(&self) -> ModelResult<PointId> {
        Ok(created(&self.objects, &self.name)?.center)
    }

    fn rolling_radius(&self) -> ModelResult<Expr> {
        Ok(created(&self.objects, &self.name)?.rolling_radius.clone())
    }
}
