//! Flattened multibody description handed to an equation-formation engine.

use crate::auxiliary::AuxiliaryData;
use crate::error::{ModelError, ModelResult};
use crate::expr::{Expr, Symbol};
use crate::mechanics::{FrameId, PointId, RigidBody, Vector};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// A force or torque contribution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Load {
    /// Force acting at a point.
    Force { point: PointId, vector: Vector },
    /// Torque about the plane normal acting on a frame.
    Torque { frame: FrameId, magnitude: Expr },
}

/// The generic multibody description of a fully elaborated tree.
///
/// Every list follows the tree's traversal order, so two exports of the same
/// tree are equal element by element.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemDescription {
    pub inertial_frame: FrameId,
    pub fixed_point: PointId,
    pub coordinates: Vec<Symbol>,
    pub speeds: Vec<Symbol>,
    /// One `q' - u` expression per coordinate.
    pub kinematic_equations: Vec<Expr>,
    pub bodies: Vec<RigidBody>,
    pub loads: Vec<Load>,
    /// Noncontributing forces; their auxiliary speeds are not part of the state.
    pub auxiliary: Vec<AuxiliaryData>,
    pub holonomic_constraints: Vec<Expr>,
    pub nonholonomic_constraints: Vec<Expr>,
}

/// Split of coordinates and speeds into independent and dependent sets.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Partition {
    pub q_ind: Vec<Symbol>,
    pub q_dep: Vec<Symbol>,
    pub u_ind: Vec<Symbol>,
    pub u_dep: Vec<Symbol>,
}

/// A description together with a partition consistent with its constraints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartitionedSystem {
    pub system: SystemDescription,
    pub partition: Partition,
}

/// The consumed equation-formation interface.
pub trait DynamicsEngine {
    type Equations;
    type Error;

    fn form_equations(&self, system: &PartitionedSystem) -> Result<Self::Equations, Self::Error>;
}

fn check_unique(kind: &str, symbols: &[Symbol]) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for s in symbols {
        if !seen.insert(s) {
            return Err(ModelError::violation("system", format!("{kind} '{s}' is declared twice")));
        }
    }
    Ok(())
}

/// `subset_a ∪ subset_b` must be exactly `all`, without repetition.
fn check_split(kind: &str, all: &[Symbol], a: &[Symbol], b: &[Symbol]) -> ModelResult<()> {
    if a.len() + b.len() != all.len() {
        return Err(ModelError::partition(format!(
            "{} {kind} given, the system has {}",
            a.len() + b.len(),
            all.len()
        )));
    }
    let mut seen = HashSet::new();
    for s in a.iter().chain(b) {
        if !all.contains(s) {
            return Err(ModelError::partition(format!("'{s}' is not one of the system {kind}")));
        }
        if !seen.insert(s) {
            return Err(ModelError::partition(format!("'{s}' appears twice")));
        }
    }
    Ok(())
}

impl SystemDescription {
    /// Checks that every coordinate has exactly one kinematic equation and one
    /// speed, that nothing is declared twice, and that auxiliary speeds stay
    /// out of the state.
    pub fn validate(&self) -> ModelResult<()> {
        if self.kinematic_equations.len() != self.coordinates.len() {
            return Err(ModelError::violation(
                "system",
                format!(
                    "{} kinematic equations for {} coordinates",
                    self.kinematic_equations.len(),
                    self.coordinates.len()
                ),
            ));
        }
        if self.speeds.len() != self.coordinates.len() {
            return Err(ModelError::violation(
                "system",
                format!("{} speeds for {} coordinates", self.speeds.len(), self.coordinates.len()),
            ));
        }
        check_unique("coordinate", &self.coordinates)?;
        check_unique("speed", &self.speeds)?;
        let auxiliary = self.auxiliary_speeds();
        check_unique("auxiliary speed", &auxiliary)?;
        if let Some(s) = auxiliary.iter().find(|s| self.speeds.contains(s)) {
            return Err(ModelError::violation(
                "system",
                format!("'{s}' is both a speed and an auxiliary speed"),
            ));
        }
        Ok(())
    }

    /// Pairs the description with `partition` after checking the counts.
    ///
    /// Each dependent coordinate needs one holonomic constraint and each
    /// dependent speed one constraint of either kind.
    pub fn partition(&self, partition: Partition) -> ModelResult<PartitionedSystem> {
        self.validate()?;
        check_split("coordinates", &self.coordinates, &partition.q_ind, &partition.q_dep)?;
        check_split("speeds", &self.speeds, &partition.u_ind, &partition.u_dep)?;

        let holonomic = self.holonomic_constraints.len();
        let nonholonomic = self.nonholonomic_constraints.len();
        if partition.q_dep.len() != holonomic {
            return Err(ModelError::partition(format!(
                "{} dependent coordinates for {holonomic} holonomic constraints",
                partition.q_dep.len()
            )));
        }
        if partition.u_dep.len() != holonomic + nonholonomic {
            return Err(ModelError::partition(format!(
                "{} dependent speeds for {} constraints",
                partition.u_dep.len(),
                holonomic + nonholonomic
            )));
        }
        Ok(PartitionedSystem {
            system: self.clone(),
            partition,
        })
    }

    /// Numeric residuals of the holonomic constraints.
    pub fn evaluate_constraints(&self, values: &BTreeMap<Symbol, f64>) -> ModelResult<Vec<f64>> {
        let lookup = |s: &Symbol| values.get(s).copied();
        self.holonomic_constraints
            .iter()
            .map(|c| c.eval(&lookup).map_err(ModelError::from))
            .collect()
    }

    /// Constants and inputs appearing anywhere in the description.
    pub fn free_parameters(&self) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = Vec::new();
        let mut push = |e: &Expr| {
            for s in e.free_symbols() {
                if s.kind().is_parameter() && !out.contains(&s) {
                    out.push(s);
                }
            }
        };
        for body in &self.bodies {
            push(&body.mass);
            push(&body.izz);
        }
        for load in &self.loads {
            match load {
                Load::Force { vector, .. } => {
                    for (_, x, y) in vector.terms() {
                        push(x);
                        push(y);
                    }
                }
                Load::Torque { magnitude, .. } => push(magnitude),
            }
        }
        for c in self.holonomic_constraints.iter().chain(&self.nonholonomic_constraints) {
            push(c);
        }
        out
    }
}
