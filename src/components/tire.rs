use super::created;
use crate::context::StageContext;
use crate::error::ModelResult;
use crate::expr::{Symbol, SymbolKind};
use crate::mechanics::{Mechanics, PointId};
use crate::model::{Capability, Contact, Model, Role, SlotSpec};

const CONTACT_USES: &[SlotSpec] = &[
    SlotSpec::model("ground", &[Capability::Ground], "Ground the wheel rolls on"),
    SlotSpec::model(
        "wheel",
        &[Capability::Wheel, Capability::Body],
        "Rolling wheel",
    ),
];

/// Pure rolling of a wheel on the ground.
///
/// When the host has already placed the contact point, the wheel center is
/// put one rolling radius above it. Otherwise the contact point is hung one
/// rolling radius below the wheel center. Either way the contact point must
/// stay on the ground (one holonomic constraint, trivially satisfied in the
/// first case) and must not slip along it (one nonholonomic constraint).
///
/// By default the normal force is exposed as a noncontributing force at the
/// contact point, with auxiliary speed `uaux_n` and magnitude `f_n`.
pub struct RollingContact {
    name: String,
    normal_force: bool,
    contact_point: Option<PointId>,
    reaction: Option<(Symbol, Symbol)>,
}

impl RollingContact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            normal_force: true,
            contact_point: None,
            reaction: None,
        }
    }

    /// Skips the auxiliary speed and normal-force symbols.
    pub fn without_normal_force(mut self) -> Self {
        self.normal_force = false;
        self
    }
}

impl Model for RollingContact {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Contact]
    }

    fn role(&self) -> Role {
        Role::Connection
    }

    fn uses(&self) -> &'static [SlotSpec] {
        CONTACT_USES
    }

    fn define_objects(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        self.contact_point = Some(ctx.new_point("contact_point")?);
        if self.normal_force {
            let speed = ctx.dynamic_symbol(
                "uaux_n",
                "Auxiliary speed of the contact point along the ground normal",
                SymbolKind::AuxiliarySpeed,
            )?;
            let force = ctx.dynamic_symbol(
                "f_n",
                "Normal force of the ground on the wheel",
                SymbolKind::Reaction,
            )?;
            self.reaction = Some((speed, force));
        }
        Ok(())
    }

    fn define_kinematics(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let ground = ctx.ground("ground")?;
        let wheel = ctx.wheel("wheel")?;
        let contact_point = *created(&self.contact_point, &self.name)?;
        let radius = ground.normal()?.scale(wheel.rolling_radius()?);
        if ctx.mechanics().is_located(contact_point) {
            ctx.set_pos(wheel.center()?, contact_point, radius)
        } else {
            ctx.set_pos(contact_point, wheel.center()?, -radius)
        }
    }

    fn define_loads(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let Some((speed, force)) = &self.reaction else {
            return Ok(());
        };
        let ground = ctx.ground("ground")?;
        let contact_point = *created(&self.contact_point, &self.name)?;
        ctx.add_auxiliary(contact_point, ground.normal()?, speed, force)
    }

    fn define_constraints(&mut self, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let ground = ctx.ground("ground")?;
        let wheel = ctx.wheel("wheel")?;
        let body = ctx.body("wheel")?;
        let contact_point = *created(&self.contact_point, &self.name)?;
        let frame = ground.frame()?;

        let mech = ctx.mechanics();
        let position = mech.pos_from(contact_point, ground.origin()?)?;
        let height = mech.dot(&position, &ground.normal()?, frame)?;

        let omega = mech.ang_vel(body.frame()?, frame)?;
        let center_velocity = mech.vel(wheel.center()?, ground.origin()?, frame)?;
        let lever = mech.pos_from(contact_point, wheel.center()?)?;
        let slip = center_velocity + Mechanics::cross_normal(&omega, &lever);
        let longitudinal = mech.dot(&slip, &ground.tangent()?, frame)?;
        ctx.add_holonomic(height)?;
        ctx.add_nonholonomic(longitudinal)
    }

    fn as_contact(&self) -> Option<&dyn Contact> {
        Some(self)
    }
}

impl Contact for RollingContact {
    fn contact_point(&self) -> ModelResult<PointId> {
        Ok(*created(&self.contact_point, &self.name)?)
    }
}
