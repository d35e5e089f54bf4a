use crate::context::StageContext;
use crate::error::{ModelError, ModelResult};
use crate::expr::{Expr, SymbolKind};
use crate::model::{Capability, Joint, LoadGroup, Model};
use crate::system::Load;

fn host_joint<'m>(host: &'m dyn Model, group: &str) -> ModelResult<&'m dyn Joint> {
    host.as_joint().ok_or_else(|| {
        ModelError::violation(group, format!("host '{}' is not a joint", host.name()))
    })
}

/// Applies the pair `T` / `-T` to the child and parent frame of a joint.
pub struct JointTorque {
    name: String,
}

impl JointTorque {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LoadGroup for JointTorque {
    fn name(&self) -> &str {
        &self.name
    }

    fn host_requires(&self) -> &'static [Capability] {
        &[Capability::Joint]
    }

    fn define_loads(&mut self, host: &dyn Model, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let joint = host_joint(host, &self.name)?;
        let torque = ctx.dynamic_symbol(
            "T",
            "Torque applied by the joint actuator",
            SymbolKind::Input,
        )?;
        ctx.add_load(Load::Torque {
            frame: joint.child_frame()?,
            magnitude: torque.expr(),
        })?;
        ctx.add_load(Load::Torque {
            frame: joint.parent_frame()?,
            magnitude: -torque.expr(),
        })
    }
}

/// Linear torsional spring and damper across a joint:
/// `T = -k (q - q_ref) - c u`.
pub struct JointSpringDamper {
    name: String,
}

impl JointSpringDamper {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LoadGroup for JointSpringDamper {
    fn name(&self) -> &str {
        &self.name
    }

    fn host_requires(&self) -> &'static [Capability] {
        &[Capability::Joint]
    }

    fn define_loads(&mut self, host: &dyn Model, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let joint = host_joint(host, &self.name)?;
        let (Some(q), Some(u)) = (joint.coordinates().first(), joint.speeds().first()) else {
            return Err(ModelError::lookup(format!("joint '{}' has no coordinate", host.name())));
        };
        let k = ctx.symbol("k", "Torsional stiffness")?;
        let c = ctx.symbol("c", "Torsional damping")?;
        let q_ref = ctx.symbol("q_ref", "Rest angle of the spring")?;
        let torque = -(k.expr() * (q.expr() - q_ref.expr())) - c.expr() * u.expr();
        ctx.add_load(Load::Torque {
            frame: joint.child_frame()?,
            magnitude: torque.clone(),
        })?;
        ctx.add_load(Load::Torque {
            frame: joint.parent_frame()?,
            magnitude: -torque,
        })
    }
}

/// Weight `m g` of every body in the tree, pointing against the ground normal.
pub struct UniformGravity {
    name: String,
}

impl UniformGravity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LoadGroup for UniformGravity {
    fn name(&self) -> &str {
        &self.name
    }

    fn host_requires(&self) -> &'static [Capability] {
        &[Capability::Ground]
    }

    fn define_loads(&mut self, host: &dyn Model, ctx: &mut StageContext<'_>) -> ModelResult<()> {
        let ground = host.as_ground().ok_or_else(|| {
            ModelError::violation(&self.name, format!("host '{}' is not a ground", host.name()))
        })?;
        let g = ctx.symbol("g", "Gravitational acceleration")?;
        let normal = ground.normal()?;
        let weights: Vec<Load> = ctx
            .mechanics()
            .bodies()
            .iter()
            .map(|body| Load::Force {
                point: body.masscenter,
                vector: normal.scale(Expr::num(-1.0) * body.mass.clone() * g.expr()),
            })
            .collect();
        for weight in weights {
            ctx.add_load(weight)?;
        }
        Ok(())
    }
}
