use super::created;
use crate::context::StageContext;
use crate::error::ModelResult;
use crate::expr::{Expr, Symbol};
use crate::mechanics::{Axis, FrameId, PointId, Vector};
use crate::model::{Anchor, Body, Capability, Model};

struct LinkObjects {
    frame: FrameId,
    masscenter: PointId,
    proximal: PointId,
    distal: PointId,
    length: Symbol,
}

/// A slender rigid link of length `l` along its frame's x axis, with the mass
/// center halfway between its ends.
pub struct RigidLink {
    name: String,
    objects: Option<LinkObjects>,
}

impl RigidLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: None,
        }
    }

    pub fn length(&self) -> ModelResult<&Symbol> {
        Ok(&created(&self.objects, &self.name)?.length)
    }
}

impl Model for RigidLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Body, Capability::Link]
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let length = ctx.symbol("l", "Length of the link")?;
        let mass = ctx.symbol("m", "Mass of the link")?;
        let izz = ctx.symbol(
            "izz",
            "Central moment of inertia of the link about the plane normal",
        )?;
        let frame = ctx.new_frame("frame")?;
        let masscenter = ctx.new_point("masscenter")?;
        let proximal = ctx.new_point("proximal")?;
        let distal = ctx.new_point("distal")?;
        ctx.add_body(frame, masscenter, mass.expr(), izz.expr())?;
        self.objects = Some(LinkObjects {
            frame,
            masscenter,
            proximal,
            distal,
            length,
        });
        Ok(())
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let o = created(&self.objects, &self.name)?;
        let half = Vector::unit(o.frame, Axis::X).scale(Expr::num(0.5) * o.length.expr());
        ctx.set_pos(o.proximal, o.masscenter, -half.clone())?;
        ctx.set_pos(o.distal, o.masscenter, half)
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }
}

impl Body for RigidLink {
    fn frame(&self) -> ModelResult<FrameId> {
        Ok(created(&self.objects, &self.name)?.frame)
    }

    fn masscenter(&self) -> ModelResult<PointId> {
        Ok(created(&self.objects, &self.name)?.masscenter)
    }

    fn anchor(&self, anchor: Anchor) -> ModelResult<PointId> {
        let o = created(&self.objects, &self.name)?;
        Ok(match anchor {
            Anchor::Proximal => o.proximal,
            Anchor::Distal => o.distal,
            Anchor::Center => o.masscenter,
        })
    }
}
