//! The model tree and its lifecycle controller.
//!
//! The tree owns every node in an arena indexed by [`NodeId`]. The user builds
//! it with [`ModelTree::assign`] and [`ModelTree::attach_load_group`], then
//! drives the five stages in order. The first stage freezes the tree: the
//! traversal order and the flattened submodel/connection lists are computed
//! once and slot assignment is refused from then on.

use crate::context::{ConnectionContext, Contribution, OwnerKind, StageContext};
use crate::error::{ModelError, ModelResult};
use crate::expr::Symbol;
use crate::mechanics::Mechanics;
use crate::model::{Capability, Cardinality, LoadGroup, Model, Role, SlotSpec, Stage, Transition};
use crate::symbols::SymbolRegistry;
use crate::system::SystemDescription;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// Handle of a node inside one [`ModelTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Bound models per uses-slot of a connection.
pub(crate) type Bindings = Vec<Vec<NodeId>>;

/// Configuration of the lifecycle controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum slot nesting below the root.
    pub max_depth: usize,
    /// Drop constraint expressions that simplify to zero.
    pub prune_trivial_constraints: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            prune_trivial_constraints: true,
        }
    }
}

impl TreeConfig {
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub(crate) struct NodeEntry {
    pub(crate) name: String,
    /// Taken out while the node runs its own hook.
    pub(crate) model: Option<Box<dyn Model>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: usize,
    pub(crate) capabilities: &'static [Capability],
    pub(crate) role: Role,
    pub(crate) slots: &'static [SlotSpec],
    pub(crate) uses: &'static [SlotSpec],
    /// Assigned children, parallel to `slots`.
    pub(crate) children: Vec<Vec<NodeId>>,
    pub(crate) groups: Vec<usize>,
    pub(crate) state: Stage,
}

impl NodeEntry {
    fn new(model: Box<dyn Model>, parent: Option<NodeId>, depth: usize) -> Self {
        let slots = model.slots();
        Self {
            name: model.name().to_string(),
            parent,
            depth,
            capabilities: model.capabilities(),
            role: model.role(),
            slots,
            uses: model.uses(),
            children: vec![Vec::new(); slots.len()],
            groups: Vec::new(),
            state: Stage::Unbuilt,
            model: Some(model),
        }
    }
}

struct GroupEntry {
    name: String,
    host: NodeId,
    group: Box<dyn LoadGroup>,
}

#[derive(Clone, Copy, Debug)]
enum NameOwner {
    Node(NodeId),
    Group,
}

struct Frozen {
    order: Vec<NodeId>,
    submodels: Vec<NodeId>,
    connections: Vec<NodeId>,
}

/// Node names become symbol prefixes, so they must be identifiers.
fn check_name(name: &str) -> ModelResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidName { name: name.to_string() })
    }
}

fn check_exposed(model: &dyn Model) -> ModelResult<()> {
    for &capability in model.capabilities() {
        if !capability.is_exposed_by(model) {
            return Err(ModelError::violation(
                model.name(),
                format!("declares {capability:?} but does not expose its interface"),
            ));
        }
    }
    Ok(())
}

fn visit(nodes: &[NodeEntry], id: NodeId, out: &mut Vec<NodeId>) {
    let entry = &nodes[id.index()];
    for (spec, children) in entry.slots.iter().zip(&entry.children) {
        if spec.role == Role::Model {
            for &child in children {
                visit(nodes, child, out);
            }
        }
    }
    out.push(id);
    for (spec, children) in entry.slots.iter().zip(&entry.children) {
        if spec.role == Role::Connection {
            for &child in children {
                visit(nodes, child, out);
            }
        }
    }
}

/// A composed model and its build state.
pub struct ModelTree {
    nodes: Vec<NodeEntry>,
    bindings: Vec<Bindings>,
    contributions: Vec<Contribution>,
    groups: Vec<GroupEntry>,
    names: HashMap<String, NameOwner>,
    registry: SymbolRegistry,
    mechanics: Mechanics,
    config: TreeConfig,
    frozen: Option<Frozen>,
}

impl ModelTree {
    pub fn new(root: impl Model + 'static) -> ModelResult<Self> {
        Self::with_config(root, TreeConfig::default())
    }

    pub fn with_config(root: impl Model + 'static, config: TreeConfig) -> ModelResult<Self> {
        let root: Box<dyn Model> = Box::new(root);
        check_name(root.name())?;
        check_exposed(root.as_ref())?;
        let mut tree = Self {
            nodes: Vec::new(),
            bindings: Vec::new(),
            contributions: Vec::new(),
            groups: Vec::new(),
            names: HashMap::new(),
            registry: SymbolRegistry::new(),
            mechanics: Mechanics::new(),
            config,
            frozen: None,
        };
        tree.push(root, None, 0);
        Ok(tree)
    }

    fn push(&mut self, model: Box<dyn Model>, parent: Option<NodeId>, depth: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let entry = NodeEntry::new(model, parent, depth);
        self.names.insert(entry.name.clone(), NameOwner::Node(id));
        self.bindings.push(vec![Vec::new(); entry.uses.len()]);
        self.contributions.push(Contribution::default());
        self.nodes.push(entry);
        id
    }

    fn entry(&self, id: NodeId) -> ModelResult<&NodeEntry> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| {
                ModelError::lookup(format!("node #{} does not belong to this tree", id.0))
            })
    }

    fn check_mutable(&self, node: &str) -> ModelResult<()> {
        if self.frozen.is_some() {
            return Err(ModelError::violation(
                node,
                "the tree is frozen once the first stage has run",
            ));
        }
        Ok(())
    }

    fn claim_name(&self, name: &str) -> ModelResult<()> {
        check_name(name)?;
        if self.names.contains_key(name) {
            return Err(ModelError::NameCollision { name: name.to_string() });
        }
        Ok(())
    }

    /// Assigns `child` into `slot` of `parent` and returns its handle.
    pub fn assign(
        &mut self,
        parent: NodeId,
        slot: &str,
        child: impl Model + 'static,
    ) -> ModelResult<NodeId> {
        self.assign_boxed(parent, slot, Box::new(child))
    }

    pub fn assign_boxed(
        &mut self,
        parent: NodeId,
        slot: &str,
        child: Box<dyn Model>,
    ) -> ModelResult<NodeId> {
        let entry = self.entry(parent)?;
        self.check_mutable(&entry.name)?;
        let index = entry
            .slots
            .iter()
            .position(|s| s.name == slot)
            .ok_or_else(|| {
                ModelError::lookup(format!("'{}' has no slot named '{slot}'", entry.name))
            })?;
        let spec = entry.slots[index];

        if child.role() != spec.role {
            return Err(ModelError::violation(
                &entry.name,
                format!(
                    "slot '{slot}' holds {:?} nodes, '{}' is a {:?}",
                    spec.role,
                    child.name(),
                    child.role()
                ),
            ));
        }
        if !spec.accepts(child.capabilities()) {
            return Err(ModelError::violation(
                &entry.name,
                format!(
                    "'{}' carries {:?}, slot '{slot}' requires {:?}",
                    child.name(),
                    child.capabilities(),
                    spec.requires
                ),
            ));
        }
        check_exposed(child.as_ref())?;
        if spec.cardinality != Cardinality::Many && !entry.children[index].is_empty() {
            return Err(ModelError::violation(
                &entry.name,
                format!("slot '{slot}' is already filled"),
            ));
        }
        let depth = entry.depth + 1;
        if depth > self.config.max_depth {
            return Err(ModelError::violation(
                &entry.name,
                format!(
                    "assigning into '{slot}' exceeds the maximum depth of {}",
                    self.config.max_depth
                ),
            ));
        }
        self.claim_name(child.name())?;

        log::trace!("assign {}.{slot} <- {}", entry.name, child.name());
        let id = self.push(child, Some(parent), depth);
        self.nodes[parent.0].children[index].push(id);
        Ok(id)
    }

    /// Attaches a load group to `host`.
    pub fn attach_load_group(
        &mut self,
        host: NodeId,
        group: impl LoadGroup + 'static,
    ) -> ModelResult<()> {
        let entry = self.entry(host)?;
        self.check_mutable(&entry.name)?;
        let missing: Vec<Capability> = group
            .host_requires()
            .iter()
            .copied()
            .filter(|c| !entry.capabilities.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(ModelError::violation(
                &entry.name,
                format!("load group '{}' needs a host carrying {missing:?}", group.name()),
            ));
        }
        self.claim_name(group.name())?;

        let name = group.name().to_string();
        log::trace!("attach load group {name} to {}", entry.name);
        self.names.insert(name.clone(), NameOwner::Group);
        self.nodes[host.0].groups.push(self.groups.len());
        self.groups.push(GroupEntry {
            name,
            host,
            group: Box::new(group),
        });
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The node named `name`, anywhere in the tree.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        match self.names.get(name) {
            Some(NameOwner::Node(id)) => Some(*id),
            _ => None,
        }
    }

    /// Follows a dotted slot path from the root, e.g. `"bicycle.rear_frame"`.
    pub fn resolve_path(&self, path: &str) -> ModelResult<NodeId> {
        let mut current = self.root();
        for segment in path.split('.') {
            current = self.child(current, segment)?;
        }
        Ok(current)
    }

    pub fn model(&self, id: NodeId) -> Option<&dyn Model> {
        self.nodes.get(id.0).and_then(|e| e.model.as_deref())
    }

    pub fn name(&self, id: NodeId) -> ModelResult<&str> {
        Ok(&self.entry(id)?.name)
    }

    pub fn parent(&self, id: NodeId) -> ModelResult<Option<NodeId>> {
        Ok(self.entry(id)?.parent)
    }

    pub fn state(&self, id: NodeId) -> ModelResult<Stage> {
        Ok(self.entry(id)?.state)
    }

    /// Children assigned to `slot` of `parent`, in assignment order.
    pub fn slot(&self, parent: NodeId, slot: &str) -> ModelResult<&[NodeId]> {
        let entry = self.entry(parent)?;
        entry
            .slots
            .iter()
            .position(|s| s.name == slot)
            .map(|i| entry.children[i].as_slice())
            .ok_or_else(|| {
                ModelError::lookup(format!("'{}' has no slot named '{slot}'", entry.name))
            })
    }

    /// The single child assigned to `slot`; fails while the slot is empty.
    pub fn child(&self, parent: NodeId, slot: &str) -> ModelResult<NodeId> {
        match self.slot(parent, slot)? {
            [id] => Ok(*id),
            [] => Err(ModelError::lookup(format!(
                "slot '{slot}' of '{}' has not been assigned",
                self.nodes[parent.0].name
            ))),
            ids => Err(ModelError::lookup(format!(
                "slot '{slot}' of '{}' holds {} models",
                self.nodes[parent.0].name,
                ids.len()
            ))),
        }
    }

    /// Models bound to `uses_slot` of `connection`.
    pub fn bound(&self, connection: NodeId, uses_slot: &str) -> ModelResult<&[NodeId]> {
        let entry = self.entry(connection)?;
        entry
            .uses
            .iter()
            .position(|s| s.name == uses_slot)
            .map(|i| self.bindings[connection.0][i].as_slice())
            .ok_or_else(|| {
                ModelError::lookup(format!(
                    "'{}' does not use a slot named '{uses_slot}'",
                    entry.name
                ))
            })
    }

    /// Names of the load groups attached to `host`, in attachment order.
    pub fn load_groups(&self, host: NodeId) -> ModelResult<Vec<&str>> {
        Ok(self
            .entry(host)?
            .groups
            .iter()
            .map(|&g| self.groups[g].name.as_str())
            .collect())
    }

    /// The symbol `key` of the node (or load group) named `owner`.
    pub fn symbol(&self, owner: &str, key: &str) -> ModelResult<Symbol> {
        self.registry.get(owner, key)
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn mechanics(&self) -> &Mechanics {
        &self.mechanics
    }

    pub fn contribution(&self, id: NodeId) -> ModelResult<&Contribution> {
        self.entry(id)?;
        Ok(&self.contributions[id.0])
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Stage order: owned submodels in slot order, the node, its load groups,
    /// then its connections in slot order.
    pub fn traversal_order(&self) -> Cow<'_, [NodeId]> {
        match &self.frozen {
            Some(frozen) => Cow::Borrowed(&frozen.order),
            None => {
                let mut order = Vec::with_capacity(self.nodes.len());
                visit(&self.nodes, self.root(), &mut order);
                Cow::Owned(order)
            }
        }
    }

    /// Every non-connection node below the root, in traversal order.
    pub fn submodels(&self) -> Cow<'_, [NodeId]> {
        match &self.frozen {
            Some(frozen) => Cow::Borrowed(&frozen.submodels),
            None => Cow::Owned(
                self.filter_order(|id, e| id != self.root() && e.role == Role::Model),
            ),
        }
    }

    /// Every connection in the tree, in traversal order.
    pub fn connections(&self) -> Cow<'_, [NodeId]> {
        match &self.frozen {
            Some(frozen) => Cow::Borrowed(&frozen.connections),
            None => Cow::Owned(self.filter_order(|_, e| e.role == Role::Connection)),
        }
    }

    fn filter_order(&self, keep: impl Fn(NodeId, &NodeEntry) -> bool) -> Vec<NodeId> {
        self.traversal_order()
            .iter()
            .copied()
            .filter(|&id| keep(id, &self.nodes[id.0]))
            .collect()
    }

    fn freeze(&mut self) -> ModelResult<()> {
        if self.frozen.is_some() {
            return Ok(());
        }
        for entry in &self.nodes {
            for (spec, children) in entry.slots.iter().zip(&entry.children) {
                if spec.is_required() && children.is_empty() {
                    return Err(ModelError::violation(
                        &entry.name,
                        format!("required slot '{}' is not assigned", spec.name),
                    ));
                }
            }
        }
        let order = self.traversal_order().into_owned();
        let submodels = self.submodels().into_owned();
        let connections = self.connections().into_owned();
        log::debug!(
            "froze '{}': {} nodes, {} connections",
            self.nodes[0].name,
            order.len(),
            connections.len()
        );
        self.frozen = Some(Frozen {
            order,
            submodels,
            connections,
        });
        Ok(())
    }

    /// Fails unless every node is either done with `target` or directly before it.
    fn precheck(&self, target: Stage, order: &[NodeId]) -> ModelResult<()> {
        for &id in order {
            let entry = &self.nodes[id.0];
            if entry.state.transition(target) == Transition::OutOfOrder {
                return Err(ModelError::ordering(&entry.name, target.operation(), entry.state));
            }
        }
        Ok(())
    }

    fn check_bound(&self, id: NodeId) -> ModelResult<()> {
        let entry = &self.nodes[id.0];
        for (spec, bound) in entry.uses.iter().zip(&self.bindings[id.0]) {
            if spec.is_required() && bound.is_empty() {
                return Err(ModelError::violation(
                    &entry.name,
                    format!("'{}' was never bound to an assigned model", spec.name),
                ));
            }
        }
        Ok(())
    }

    /// Freezes the tree and lets every host bind its connections.
    ///
    /// A host whose hook fails leaves no binding behind.
    pub fn define_connections(&mut self) -> ModelResult<()> {
        self.freeze()?;
        let target = Stage::ConnectionsDefined;
        let order = self.traversal_order().into_owned();
        self.precheck(target, &order)?;

        for id in order {
            if self.nodes[id.0].state.transition(target) == Transition::Done {
                log::trace!("{}: already {:?}", self.nodes[id.0].name, target);
                continue;
            }
            let snapshot = self.bindings.clone();
            if let Err(err) = self.bind_node(id) {
                let name = &self.nodes[id.0].name;
                log::debug!("{name}: define_connections failed, bindings restored");
                self.bindings = snapshot;
                return Err(err);
            }
            self.nodes[id.0].state = target;
        }
        Ok(())
    }

    fn bind_node(&mut self, id: NodeId) -> ModelResult<()> {
        let mut model = self.take_model(id)?;
        log::debug!("{}: define_connections", self.nodes[id.0].name);
        let result = {
            let mut ctx = ConnectionContext {
                node: id,
                nodes: &self.nodes,
                bindings: &mut self.bindings,
            };
            model.define_connections(&mut ctx)
        };
        self.nodes[id.0].model = Some(model);
        result?;
        if self.nodes[id.0].role == Role::Connection {
            self.check_bound(id)?;
        }
        Ok(())
    }

    pub fn define_objects(&mut self) -> ModelResult<()> {
        self.run_stage(Stage::ObjectsDefined)
    }

    pub fn define_kinematics(&mut self) -> ModelResult<()> {
        self.run_stage(Stage::KinematicsDefined)
    }

    pub fn define_loads(&mut self) -> ModelResult<()> {
        self.run_stage(Stage::LoadsDefined)
    }

    pub fn define_constraints(&mut self) -> ModelResult<()> {
        self.run_stage(Stage::ConstraintsDefined)
    }

    /// Runs the five stages in order.
    pub fn define_all(&mut self) -> ModelResult<()> {
        self.define_connections()?;
        self.define_objects()?;
        self.define_kinematics()?;
        self.define_loads()?;
        self.define_constraints()
    }

    fn take_model(&mut self, id: NodeId) -> ModelResult<Box<dyn Model>> {
        let entry = &mut self.nodes[id.0];
        entry
            .model
            .take()
            .ok_or_else(|| {
                ModelError::lookup(format!("'{}' is already running a stage", entry.name))
            })
    }

    /// Runs `target` on every node that has not reached it yet.
    ///
    /// Each node (with its load groups) writes into a scratch contribution that
    /// is merged only on success. On failure the backend and the registry are
    /// rolled back to their state before the node ran, so calling the stage
    /// again starts the node from scratch.
    fn run_stage(&mut self, target: Stage) -> ModelResult<()> {
        let order = self.traversal_order().into_owned();
        self.precheck(target, &order)?;

        for id in order {
            if self.nodes[id.0].state.transition(target) == Transition::Done {
                log::trace!("{}: already {:?}", self.nodes[id.0].name, target);
                continue;
            }
            let mechanics = self.mechanics.clone();
            let symbols = self.registry.len();
            let mut scratch = Contribution::default();
            if let Err(err) = self.run_node(id, target, &mut scratch) {
                let name = &self.nodes[id.0].name;
                log::debug!("{name}: {} failed, rolled back", target.operation());
                self.mechanics = mechanics;
                self.registry.truncate(symbols);
                return Err(err);
            }
            self.contributions[id.0].append(scratch);
            self.nodes[id.0].state = target;
        }
        Ok(())
    }

    fn run_node(&mut self, id: NodeId, target: Stage, out: &mut Contribution) -> ModelResult<()> {
        let mut model = self.take_model(id)?;
        log::debug!("{}: {}", self.nodes[id.0].name, target.operation());
        let result = {
            let mut ctx = StageContext {
                stage: target,
                owner: self.nodes[id.0].name.clone(),
                kind: OwnerKind::Node,
                node: id,
                nodes: &self.nodes,
                bindings: &self.bindings,
                mechanics: &mut self.mechanics,
                registry: &mut self.registry,
                out: &mut *out,
                config: &self.config,
            };
            match target {
                Stage::ObjectsDefined => model.define_objects(&mut ctx),
                Stage::KinematicsDefined => model.define_kinematics(&mut ctx),
                Stage::LoadsDefined => model.define_loads(&mut ctx),
                Stage::ConstraintsDefined => model.define_constraints(&mut ctx),
                Stage::Unbuilt | Stage::ConnectionsDefined => Ok(()),
            }
        };
        self.nodes[id.0].model = Some(model);
        result?;

        if target == Stage::LoadsDefined {
            self.run_load_groups(id, out)?;
        }
        Ok(())
    }

    fn run_load_groups(&mut self, host: NodeId, out: &mut Contribution) -> ModelResult<()> {
        let groups = self.nodes[host.0].groups.clone();
        for g in groups {
            let GroupEntry {
                name,
                host: owner,
                group,
            } = &mut self.groups[g];
            debug_assert_eq!(*owner, host);
            log::debug!("{name}: define_loads on {}", self.nodes[host.0].name);
            let host_model = self.nodes[host.0]
                .model
                .as_deref()
                .ok_or_else(|| ModelError::lookup(format!("host of '{name}' is unavailable")))?;
            let mut ctx = StageContext {
                stage: Stage::LoadsDefined,
                owner: name.clone(),
                kind: OwnerKind::LoadGroup,
                node: host,
                nodes: &self.nodes,
                bindings: &self.bindings,
                mechanics: &mut self.mechanics,
                registry: &mut self.registry,
                out: &mut *out,
                config: &self.config,
            };
            group.define_loads(host_model, &mut ctx)?;
        }
        Ok(())
    }

    /// Flattens the finished tree into a [`SystemDescription`].
    ///
    /// Fails with an ordering error unless every node has run
    /// `define_constraints`.
    pub fn to_system(&self) -> ModelResult<SystemDescription> {
        let order = self.traversal_order();
        for &id in order.iter() {
            let entry = &self.nodes[id.0];
            if entry.state != Stage::ConstraintsDefined {
                return Err(ModelError::ordering(&entry.name, "export the system", entry.state));
            }
        }
        let (inertial_frame, fixed_point) = self
            .mechanics
            .newtonian()
            .ok_or_else(|| ModelError::lookup("no node declared an inertial frame"))?;

        let mut system = SystemDescription {
            inertial_frame,
            fixed_point,
            coordinates: Vec::new(),
            speeds: Vec::new(),
            kinematic_equations: Vec::new(),
            bodies: Vec::new(),
            loads: Vec::new(),
            auxiliary: Vec::new(),
            holonomic_constraints: Vec::new(),
            nonholonomic_constraints: Vec::new(),
        };
        for &id in order.iter() {
            let c = &self.contributions[id.0];
            system.coordinates.extend(c.coordinates.iter().cloned());
            system.speeds.extend(c.speeds.iter().cloned());
            system.kinematic_equations.extend(c.kinematic_equations.iter().cloned());
            system
                .bodies
                .extend(c.bodies.iter().map(|&b| self.mechanics.body(b).clone()));
            system.loads.extend(c.loads.iter().cloned());
            system.auxiliary.extend(c.auxiliary.iter().cloned());
            system.holonomic_constraints.extend(c.holonomic.iter().cloned());
            system.nonholonomic_constraints.extend(c.nonholonomic.iter().cloned());
        }
        Ok(system)
    }
}
