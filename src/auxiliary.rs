//! Noncontributing forces through auxiliary speeds.
//!
//! A reaction force does no work in the motion, so it never shows up in the
//! equations of motion. To compute it anyway, an auxiliary speed is added
//! along the force direction at the point where it acts. The auxiliary speed
//! is zero in the actual motion; its partial velocity exposes the force.

use crate::expr::Symbol;
use crate::mechanics::{Mechanics, PointId, Vector};
use crate::system::{Load, SystemDescription};
use serde::Serialize;

/// A noncontributing force of magnitude `force` along `direction`, acting at
/// `point`, exposed through the auxiliary speed `speed`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuxiliaryData {
    pub point: PointId,
    /// Unit direction of both the auxiliary velocity and the force.
    pub direction: Vector,
    pub speed: Symbol,
    pub force: Symbol,
}

impl AuxiliaryData {
    /// `speed * direction`.
    pub fn velocity(&self) -> Vector {
        self.direction.scale(self.speed.expr())
    }

    /// `force * direction` applied at the point.
    pub fn load(&self) -> Load {
        Load::Force {
            point: self.point,
            vector: self.direction.scale(self.force.expr()),
        }
    }
}

impl SystemDescription {
    /// Auxiliary speeds in export order.
    pub fn auxiliary_speeds(&self) -> Vec<Symbol> {
        self.auxiliary.iter().map(|a| a.speed.clone()).collect()
    }

    /// The reaction forces, one per auxiliary speed.
    pub fn noncontributing_loads(&self) -> Vec<Load> {
        self.auxiliary.iter().map(AuxiliaryData::load).collect()
    }

    /// Auxiliary velocity of `point`.
    ///
    /// Every auxiliary speed registered at `point`, or at a point `point` is
    /// located from, moves `point` along with it.
    pub fn auxiliary_velocity(&self, mechanics: &Mechanics, point: PointId) -> Vector {
        self.auxiliary
            .iter()
            .filter(|a| mechanics.is_located_from(point, a.point))
            .fold(Vector::zero(), |acc, a| acc + a.velocity())
    }
}
