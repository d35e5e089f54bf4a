//! Handles passed to stage hooks.
//!
//! A [`StageContext`] is the only way a node touches the symbol registry and
//! the mechanics backend. Every operation checks that it belongs to the stage
//! being run: symbols and objects are created in the objects stage (load-group
//! symbols in the loads stage), relations in the kinematics stage, and so on.

use crate::auxiliary::AuxiliaryData;
use crate::error::{ModelError, ModelResult};
use crate::expr::{Expr, Symbol, SymbolKind};
use crate::mechanics::{BodyId, FrameId, Mechanics, PointId, RigidBody, Vector};
use crate::model::{Body, Cardinality, Contact, Ground, Joint, Model, Role, Stage, Wheel};
use crate::symbols::{SymbolRegistry, synthesize_name};
use crate::system::Load;
use crate::tree::{Bindings, NodeEntry, NodeId, TreeConfig};

/// What a node (and its load groups) adds to the exported system.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contribution {
    pub coordinates: Vec<Symbol>,
    pub speeds: Vec<Symbol>,
    pub kinematic_equations: Vec<Expr>,
    pub bodies: Vec<BodyId>,
    pub loads: Vec<Load>,
    pub auxiliary: Vec<AuxiliaryData>,
    pub holonomic: Vec<Expr>,
    pub nonholonomic: Vec<Expr>,
}

impl Contribution {
    pub(crate) fn append(&mut self, other: Contribution) {
        self.coordinates.extend(other.coordinates);
        self.speeds.extend(other.speeds);
        self.kinematic_equations.extend(other.kinematic_equations);
        self.bodies.extend(other.bodies);
        self.loads.extend(other.loads);
        self.auxiliary.extend(other.auxiliary);
        self.holonomic.extend(other.holonomic);
        self.nonholonomic.extend(other.nonholonomic);
    }
}

/// Who is running a hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnerKind {
    Node,
    LoadGroup,
}

/// Looks `slot` up among the owned slots and then the uses-slots of `node`.
fn slot_children<'n>(
    nodes: &'n [NodeEntry],
    bindings: &'n [Bindings],
    node: NodeId,
    slot: &str,
) -> ModelResult<&'n [NodeId]> {
    let entry = &nodes[node.index()];
    if let Some(i) = entry.slots.iter().position(|s| s.name == slot) {
        return Ok(&entry.children[i]);
    }
    if let Some(i) = entry.uses.iter().position(|s| s.name == slot) {
        return Ok(&bindings[node.index()][i]);
    }
    Err(ModelError::lookup(format!("'{}' has no slot named '{slot}'", entry.name)))
}

fn model_at(nodes: &[NodeEntry], id: NodeId) -> ModelResult<&dyn Model> {
    let entry = &nodes[id.index()];
    entry.model.as_deref().ok_or_else(|| {
        ModelError::lookup(format!("'{}' is not reachable from its own hooks", entry.name))
    })
}

/// Context of the objects, kinematics, loads and constraints stages.
pub struct StageContext<'a> {
    pub(crate) stage: Stage,
    pub(crate) owner: String,
    pub(crate) kind: OwnerKind,
    pub(crate) node: NodeId,
    pub(crate) nodes: &'a [NodeEntry],
    pub(crate) bindings: &'a [Bindings],
    pub(crate) mechanics: &'a mut Mechanics,
    pub(crate) registry: &'a mut SymbolRegistry,
    pub(crate) out: &'a mut Contribution,
    pub(crate) config: &'a TreeConfig,
}

impl<'a> StageContext<'a> {
    /// The stage being run.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Name that symbols and objects created here are scoped to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    fn state(&self) -> Stage {
        self.stage.previous().unwrap_or(Stage::Unbuilt)
    }

    fn require(&self, stage: Stage, operation: &str) -> ModelResult<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(ModelError::ordering(&self.owner, operation, self.state()))
        }
    }

    fn may_create(&self) -> bool {
        match self.kind {
            OwnerKind::Node => self.stage == Stage::ObjectsDefined,
            OwnerKind::LoadGroup => self.stage == Stage::LoadsDefined,
        }
    }

    /// A constant owned by this node, created on first request.
    pub fn symbol(&mut self, key: &str, description: &str) -> ModelResult<Symbol> {
        self.dynamic_symbol(key, description, SymbolKind::Constant)
    }

    /// A symbol of any kind owned by this node.
    ///
    /// Outside the creating stage only symbols that already exist are returned.
    pub fn dynamic_symbol(
        &mut self,
        key: &str,
        description: &str,
        kind: SymbolKind,
    ) -> ModelResult<Symbol> {
        if self.may_create() {
            return self.registry.get_or_create(&self.owner, key, description, kind);
        }
        self.registry.get(&self.owner, key).map_err(|_| {
            ModelError::ordering(&self.owner, format!("create symbol '{key}'"), self.state())
        })
    }

    /// An existing symbol of this node.
    pub fn get_symbol(&self, key: &str) -> ModelResult<Symbol> {
        self.registry.get(&self.owner, key)
    }

    pub fn new_frame(&mut self, key: &str) -> ModelResult<FrameId> {
        self.require(Stage::ObjectsDefined, "create a frame")?;
        Ok(self.mechanics.new_frame(&synthesize_name(&self.owner, key))?)
    }

    pub fn new_point(&mut self, key: &str) -> ModelResult<PointId> {
        self.require(Stage::ObjectsDefined, "create a point")?;
        Ok(self.mechanics.new_point(&synthesize_name(&self.owner, key))?)
    }

    /// Registers a rigid body named after the owner.
    pub fn add_body(
        &mut self,
        frame: FrameId,
        masscenter: PointId,
        mass: Expr,
        izz: Expr,
    ) -> ModelResult<BodyId> {
        self.require(Stage::ObjectsDefined, "create a body")?;
        let id = self.mechanics.add_body(RigidBody {
            name: self.owner.clone(),
            frame,
            masscenter,
            mass,
            izz,
        });
        self.out.bodies.push(id);
        Ok(id)
    }

    /// Declares the inertial frame and its fixed point.
    pub fn declare_newtonian(&mut self, frame: FrameId, origin: PointId) -> ModelResult<()> {
        self.require(Stage::ObjectsDefined, "declare the inertial frame")?;
        Ok(self.mechanics.set_newtonian(frame, origin)?)
    }

    pub fn orient(&mut self, child: FrameId, parent: FrameId, angle: Expr) -> ModelResult<()> {
        self.require(Stage::KinematicsDefined, "orient a frame")?;
        Ok(self.mechanics.orient(child, parent, angle)?)
    }

    pub fn set_pos(&mut self, point: PointId, origin: PointId, offset: Vector) -> ModelResult<()> {
        self.require(Stage::KinematicsDefined, "locate a point")?;
        Ok(self.mechanics.set_pos(point, origin, offset)?)
    }

    /// Declares a generalized coordinate and its speed, with `q' - u = 0`.
    pub fn add_coordinate(&mut self, coordinate: &Symbol, speed: &Symbol) -> ModelResult<()> {
        self.require(Stage::KinematicsDefined, "declare a coordinate")?;
        if coordinate.kind() != SymbolKind::Coordinate || speed.kind() != SymbolKind::Speed {
            return Err(ModelError::violation(
                &self.owner,
                format!("'{coordinate}' and '{speed}' are not a coordinate/speed pair"),
            ));
        }
        self.mechanics.add_kinematic_pair(coordinate.clone(), speed.clone());
        self.out.coordinates.push(coordinate.clone());
        self.out.speeds.push(speed.clone());
        self.out.kinematic_equations.push(coordinate.dt() - speed.expr());
        Ok(())
    }

    pub fn add_load(&mut self, load: Load) -> ModelResult<()> {
        self.require(Stage::LoadsDefined, "add a load")?;
        self.out.loads.push(load);
        Ok(())
    }

    /// Registers a noncontributing force at `point` along `direction`.
    ///
    /// `speed` must be an auxiliary speed and `force` a reaction symbol.
    pub fn add_auxiliary(
        &mut self,
        point: PointId,
        direction: Vector,
        speed: &Symbol,
        force: &Symbol,
    ) -> ModelResult<()> {
        self.require(Stage::LoadsDefined, "add a noncontributing force")?;
        if speed.kind() != SymbolKind::AuxiliarySpeed || force.kind() != SymbolKind::Reaction {
            return Err(ModelError::violation(
                &self.owner,
                format!("'{speed}' and '{force}' are not an auxiliary speed/reaction pair"),
            ));
        }
        self.out.auxiliary.push(AuxiliaryData {
            point,
            direction,
            speed: speed.clone(),
            force: force.clone(),
        });
        Ok(())
    }

    pub fn add_holonomic(&mut self, constraint: Expr) -> ModelResult<()> {
        self.require(Stage::ConstraintsDefined, "add a holonomic constraint")?;
        if self.prune(&constraint) {
            return Ok(());
        }
        self.out.holonomic.push(constraint);
        Ok(())
    }

    pub fn add_nonholonomic(&mut self, constraint: Expr) -> ModelResult<()> {
        self.require(Stage::ConstraintsDefined, "add a nonholonomic constraint")?;
        if self.prune(&constraint) {
            return Ok(());
        }
        self.out.nonholonomic.push(constraint);
        Ok(())
    }

    fn prune(&self, constraint: &Expr) -> bool {
        let prune = self.config.prune_trivial_constraints && constraint.is_zero();
        if prune {
            log::debug!("{}: dropped a constraint that is identically zero", self.owner);
        }
        prune
    }

    /// Read-only access to the backend.
    pub fn mechanics(&self) -> &Mechanics {
        &*self.mechanics
    }

    /// The single child assigned (or bound) to `slot`.
    pub fn child(&self, slot: &str) -> ModelResult<&'a dyn Model> {
        let nodes = self.nodes;
        let ids = slot_children(nodes, self.bindings, self.node, slot)?;
        match ids {
            [id] => model_at(nodes, *id),
            [] => Err(ModelError::lookup(format!(
                "slot '{slot}' of '{}' is empty",
                nodes[self.node.index()].name
            ))),
            _ => Err(ModelError::lookup(format!(
                "slot '{slot}' of '{}' holds {} models",
                nodes[self.node.index()].name,
                ids.len()
            ))),
        }
    }

    /// Every child assigned (or bound) to `slot`, in assignment order.
    pub fn children(&self, slot: &str) -> ModelResult<Vec<&'a dyn Model>> {
        let nodes = self.nodes;
        slot_children(nodes, self.bindings, self.node, slot)?
            .iter()
            .map(|id| model_at(nodes, *id))
            .collect()
    }

    pub fn body(&self, slot: &str) -> ModelResult<&'a dyn Body> {
        let model = self.child(slot)?;
        model.as_body().ok_or_else(|| missing(model, "a body"))
    }

    pub fn ground(&self, slot: &str) -> ModelResult<&'a dyn Ground> {
        let model = self.child(slot)?;
        model.as_ground().ok_or_else(|| missing(model, "a ground"))
    }

    pub fn wheel(&self, slot: &str) -> ModelResult<&'a dyn Wheel> {
        let model = self.child(slot)?;
        model.as_wheel().ok_or_else(|| missing(model, "a wheel"))
    }

    pub fn joint(&self, slot: &str) -> ModelResult<&'a dyn Joint> {
        let model = self.child(slot)?;
        model.as_joint().ok_or_else(|| missing(model, "a joint"))
    }

    pub fn contact(&self, slot: &str) -> ModelResult<&'a dyn Contact> {
        let model = self.child(slot)?;
        model.as_contact().ok_or_else(|| missing(model, "a contact"))
    }
}

fn missing(model: &dyn Model, what: &str) -> ModelError {
    ModelError::lookup(format!("'{}' is not {what}", model.name()))
}

/// Context of the connections stage.
///
/// The host binds the uses-slots of the connections it owns to models it can
/// reach through its own slots.
pub struct ConnectionContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) nodes: &'a [NodeEntry],
    pub(crate) bindings: &'a mut [Bindings],
}

impl ConnectionContext<'_> {
    fn host_name(&self) -> &str {
        &self.nodes[self.node.index()].name
    }

    /// Resolves a dotted path of owned slots starting at the host.
    ///
    /// Returns `None` when a slot on the way is empty.
    fn resolve(&self, path: &str) -> ModelResult<Option<NodeId>> {
        let mut current = self.node;
        for segment in path.split('.') {
            let entry = &self.nodes[current.index()];
            let i = entry
                .slots
                .iter()
                .position(|s| s.name == segment)
                .ok_or_else(|| {
                    ModelError::lookup(format!("'{}' has no slot named '{segment}'", entry.name))
                })?;
            match entry.children[i].as_slice() {
                [] => return Ok(None),
                [id] => current = *id,
                _ => {
                    return Err(ModelError::violation(
                        &entry.name,
                        format!("path '{path}' crosses '{segment}', which holds several models"),
                    ));
                }
            }
        }
        Ok(Some(current))
    }

    /// Binds `uses_slot` of every connection in `connection_slot` to the model at `path`.
    pub fn bind(&mut self, connection_slot: &str, uses_slot: &str, path: &str) -> ModelResult<()> {
        let nodes = self.nodes;
        let host = &nodes[self.node.index()];
        let slot_index = host
            .slots
            .iter()
            .position(|s| s.name == connection_slot && s.role == Role::Connection)
            .ok_or_else(|| {
                ModelError::lookup(format!(
                    "'{}' has no connection slot named '{connection_slot}'",
                    host.name
                ))
            })?;
        let connections = &host.children[slot_index];
        if connections.is_empty() {
            log::trace!(
                "{}: connection slot '{connection_slot}' is empty, nothing to bind",
                host.name
            );
            return Ok(());
        }

        let target = self.resolve(path)?;
        for &connection in connections {
            let entry = &nodes[connection.index()];
            let uses_index = entry
                .uses
                .iter()
                .position(|s| s.name == uses_slot)
                .ok_or_else(|| {
                    ModelError::lookup(format!(
                        "'{}' does not use a slot named '{uses_slot}'",
                        entry.name
                    ))
                })?;
            let spec = entry.uses[uses_index];

            let Some(target) = target else {
                if spec.is_required() {
                    return Err(ModelError::violation(
                        &entry.name,
                        format!("'{uses_slot}' references '{path}', which is not assigned"),
                    ));
                }
                continue;
            };

            let target_entry = &nodes[target.index()];
            if !spec.accepts(target_entry.capabilities) {
                return Err(ModelError::violation(
                    &entry.name,
                    format!(
                        "'{}' lacks the capabilities {:?} required by '{uses_slot}'",
                        target_entry.name, spec.requires
                    ),
                ));
            }
            let bound = &mut self.bindings[connection.index()][uses_index];
            if spec.cardinality != Cardinality::Many && !bound.is_empty() {
                return Err(ModelError::violation(
                    &entry.name,
                    format!("'{uses_slot}' is already bound"),
                ));
            }
            bound.push(target);
            log::trace!("{}.{uses_slot} -> {}", entry.name, target_entry.name);
        }
        Ok(())
    }

    /// Binds every uses-slot that has a same-named slot on the host.
    pub fn bind_by_name(&mut self, connection_slot: &str) -> ModelResult<()> {
        let nodes = self.nodes;
        let host = &nodes[self.node.index()];
        let Some(i) = host.slots.iter().position(|s| s.name == connection_slot) else {
            return Err(ModelError::lookup(format!(
                "'{}' has no connection slot named '{connection_slot}'",
                self.host_name()
            )));
        };
        let mut pairs = Vec::new();
        for connection in &host.children[i] {
            for spec in nodes[connection.index()].uses {
                if host.slots.iter().any(|s| s.name == spec.name) && !pairs.contains(&spec.name) {
                    pairs.push(spec.name);
                }
            }
        }
        for name in pairs {
            self.bind(connection_slot, name, name)?;
        }
        Ok(())
    }
}
