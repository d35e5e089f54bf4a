//! Planar symbolic mechanics backend.
//!
//! All frames share a common normal axis; a frame's orientation is an angle
//! about that axis relative to its parent frame, and a point's position is a
//! [`Vector`] relative to its parent point. Relations form two forests (frames
//! and points) and every query walks them up to the lowest common ancestor.

use crate::error::MechanicsError;
use crate::expr::{Expr, Symbol};
use glam::DVec2;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::{Add, Neg, Sub};

/// Handle of a reference frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameId(usize);

/// Handle of a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PointId(usize);

/// Handle of a rigid body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BodyId(usize);

/// In-plane axis of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
}

/// A planar vector as a sum of `(frame, x, y)` components.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Vector {
    terms: Vec<(FrameId, Expr, Expr)>,
}

impl Vector {
    pub fn zero() -> Self {
        Self::default()
    }

    /// `x * frame.x + y * frame.y`.
    pub fn new(frame: FrameId, x: impl Into<Expr>, y: impl Into<Expr>) -> Self {
        Self::default().plus(frame, x.into(), y.into())
    }

    /// Unit vector along `axis` of `frame`.
    pub fn unit(frame: FrameId, axis: Axis) -> Self {
        match axis {
            Axis::X => Self::new(frame, Expr::one(), Expr::zero()),
            Axis::Y => Self::new(frame, Expr::zero(), Expr::one()),
        }
    }

    fn plus(mut self, frame: FrameId, x: Expr, y: Expr) -> Self {
        match self.terms.iter_mut().find(|(f, _, _)| *f == frame) {
            Some((_, tx, ty)) => {
                *tx = std::mem::take(tx) + x;
                *ty = std::mem::take(ty) + y;
            }
            None => self.terms.push((frame, x, y)),
        }
        self.terms.retain(|(_, x, y)| !(x.is_zero() && y.is_zero()));
        self
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Scales every component by `factor`.
    pub fn scale(&self, factor: impl Into<Expr>) -> Self {
        let factor = factor.into();
        let mut out = Self::zero();
        for (frame, x, y) in &self.terms {
            let (x, y) = (factor.clone() * x.clone(), factor.clone() * y.clone());
            out = out.plus(*frame, x, y);
        }
        out
    }

    /// Components per frame.
    pub fn terms(&self) -> &[(FrameId, Expr, Expr)] {
        &self.terms
    }

    /// Applies `replace` to every component.
    pub fn xreplace(&self, replace: &dyn Fn(&Expr) -> Option<Expr>) -> Self {
        let mut out = Self::zero();
        for (frame, x, y) in &self.terms {
            out = out.plus(*frame, x.xreplace(replace), y.xreplace(replace));
        }
        out
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        let mut out = self;
        for (frame, x, y) in rhs.terms {
            out = out.plus(frame, x, y);
        }
        out
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        self + (-rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        self.scale(Expr::num(-1.0))
    }
}

/// A rigid body known to the backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RigidBody {
    pub name: String,
    pub frame: FrameId,
    pub masscenter: PointId,
    pub mass: Expr,
    /// Central inertia about the plane normal.
    pub izz: Expr,
}

#[derive(Clone, Debug)]
struct FrameData {
    name: String,
    parent: Option<(FrameId, Expr)>,
}

#[derive(Clone, Debug)]
struct PointData {
    name: String,
    parent: Option<(PointId, Vector)>,
}

/// Arena of frames, points and bodies plus the kinematic map `q' -> u`.
#[derive(Clone, Debug, Default)]
pub struct Mechanics {
    frames: Vec<FrameData>,
    points: Vec<PointData>,
    bodies: Vec<RigidBody>,
    names: HashSet<String>,
    newtonian: Option<(FrameId, PointId)>,
    kinematic_map: Vec<(Symbol, Symbol)>,
}

impl Mechanics {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_name(&mut self, name: &str) -> Result<(), MechanicsError> {
        if !self.names.insert(name.to_string()) {
            return Err(MechanicsError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    pub fn new_frame(&mut self, name: &str) -> Result<FrameId, MechanicsError> {
        self.claim_name(name)?;
        self.frames.push(FrameData {
            name: name.to_string(),
            parent: None,
        });
        Ok(FrameId(self.frames.len() - 1))
    }

    pub fn new_point(&mut self, name: &str) -> Result<PointId, MechanicsError> {
        self.claim_name(name)?;
        self.points.push(PointData {
            name: name.to_string(),
            parent: None,
        });
        Ok(PointId(self.points.len() - 1))
    }

    /// Orients `child` by `angle` about the plane normal relative to `parent`.
    pub fn orient(
        &mut self,
        child: FrameId,
        parent: FrameId,
        angle: Expr,
    ) -> Result<(), MechanicsError> {
        if self.frames[child.0].parent.is_some() {
            return Err(MechanicsError::AlreadyOriented(self.frames[child.0].name.clone()));
        }
        if self.frame_chain(parent).iter().any(|(f, _)| *f == child) {
            return Err(MechanicsError::Cycle(
                self.frames[child.0].name.clone(),
                self.frames[parent.0].name.clone(),
            ));
        }
        self.frames[child.0].parent = Some((parent, angle));
        Ok(())
    }

    /// Places `point` at `offset` from `origin`.
    pub fn set_pos(
        &mut self,
        point: PointId,
        origin: PointId,
        offset: Vector,
    ) -> Result<(), MechanicsError> {
        if self.points[point.0].parent.is_some() {
            return Err(MechanicsError::AlreadyLocated(self.points[point.0].name.clone()));
        }
        if self.point_chain(origin).iter().any(|(p, _)| *p == point) {
            return Err(MechanicsError::Cycle(
                self.points[point.0].name.clone(),
                self.points[origin.0].name.clone(),
            ));
        }
        self.points[point.0].parent = Some((origin, offset));
        Ok(())
    }

    /// Whether `point` has been placed relative to another point.
    pub fn is_located(&self, point: PointId) -> bool {
        self.points[point.0].parent.is_some()
    }

    /// Whether `point` is `origin` or is placed, through any chain of
    /// offsets, relative to `origin`.
    pub fn is_located_from(&self, point: PointId, origin: PointId) -> bool {
        self.point_chain(point).iter().any(|(p, _)| *p == origin)
    }

    /// `frame` and every ancestor, each with the accumulated angle relative to
    /// `frame`'s root.
    fn frame_chain(&self, frame: FrameId) -> Vec<(FrameId, Expr)> {
        let mut chain = vec![(frame, Expr::zero())];
        let mut current = frame;
        let mut angle = Expr::zero();
        while let Some((parent, a)) = &self.frames[current.0].parent {
            angle = angle + a.clone();
            chain.push((*parent, angle.clone()));
            current = *parent;
        }
        chain
    }

    fn point_chain(&self, point: PointId) -> Vec<(PointId, Vector)> {
        let mut chain = vec![(point, Vector::zero())];
        let mut current = point;
        let mut offset = Vector::zero();
        while let Some((parent, v)) = &self.points[current.0].parent {
            offset = offset + v.clone();
            chain.push((*parent, offset.clone()));
            current = *parent;
        }
        chain
    }

    /// Angle of `frame` relative to `base`.
    pub fn angle(&self, frame: FrameId, base: FrameId) -> Result<Expr, MechanicsError> {
        if frame == base {
            return Ok(Expr::zero());
        }
        let up = self.frame_chain(frame);
        let down = self.frame_chain(base);
        for (ancestor, a) in &up {
            if let Some((_, b)) = down.iter().find(|(f, _)| f == ancestor) {
                return Ok(a.clone() - b.clone());
            }
        }
        Err(MechanicsError::Disconnected(
            self.frames[frame.0].name.clone(),
            self.frames[base.0].name.clone(),
        ))
    }

    /// Components of `vector` in `frame`.
    pub fn express(
        &self,
        vector: &Vector,
        frame: FrameId,
    ) -> Result<(Expr, Expr), MechanicsError> {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (source, vx, vy) in vector.terms() {
            if *source == frame {
                x.push(vx.clone());
                y.push(vy.clone());
                continue;
            }
            let theta = self.angle(*source, frame)?;
            let (c, s) = (theta.clone().cos(), theta.sin());
            x.push(c.clone() * vx.clone() - s.clone() * vy.clone());
            y.push(s * vx.clone() + c * vy.clone());
        }
        Ok((Expr::sum(x), Expr::sum(y)))
    }

    /// Component of `vector` along `axis` of `frame`.
    pub fn component(
        &self,
        vector: &Vector,
        frame: FrameId,
        axis: Axis,
    ) -> Result<Expr, MechanicsError> {
        let (x, y) = self.express(vector, frame)?;
        Ok(match axis {
            Axis::X => x,
            Axis::Y => y,
        })
    }

    /// Scalar projection of `vector` on `direction`.
    pub fn dot(
        &self,
        vector: &Vector,
        direction: &Vector,
        frame: FrameId,
    ) -> Result<Expr, MechanicsError> {
        let (ax, ay) = self.express(vector, frame)?;
        let (bx, by) = self.express(direction, frame)?;
        Ok(ax * bx + ay * by)
    }

    /// Position of `point` relative to `origin`.
    pub fn pos_from(&self, point: PointId, origin: PointId) -> Result<Vector, MechanicsError> {
        if point == origin {
            return Ok(Vector::zero());
        }
        let up = self.point_chain(point);
        let down = self.point_chain(origin);
        for (ancestor, a) in &up {
            if let Some((_, b)) = down.iter().find(|(p, _)| p == ancestor) {
                return Ok(a.clone() - b.clone());
            }
        }
        Err(MechanicsError::Disconnected(
            self.points[point.0].name.clone(),
            self.points[origin.0].name.clone(),
        ))
    }

    /// Records that the time derivative of `coordinate` is `speed`.
    pub fn add_kinematic_pair(&mut self, coordinate: Symbol, speed: Symbol) {
        self.kinematic_map.push((coordinate, speed));
    }

    /// Replaces coordinate derivatives by their speeds.
    pub fn substitute_speeds(&self, expr: &Expr) -> Expr {
        expr.xreplace(&|e| match e {
            Expr::Deriv(s, 1) => self
                .kinematic_map
                .iter()
                .find(|(q, _)| q == s)
                .map(|(_, u)| u.expr()),
            _ => None,
        })
    }

    /// Time derivative of `vector` as seen from `frame`, in terms of speeds.
    pub fn dt(&self, vector: &Vector, frame: FrameId) -> Result<Vector, MechanicsError> {
        let (x, y) = self.express(vector, frame)?;
        Ok(Vector::new(
            frame,
            self.substitute_speeds(&x.dt()?),
            self.substitute_speeds(&y.dt()?),
        ))
    }

    /// Angular velocity of `frame` in `base`, about the plane normal.
    pub fn ang_vel(&self, frame: FrameId, base: FrameId) -> Result<Expr, MechanicsError> {
        Ok(self.substitute_speeds(&self.angle(frame, base)?.dt()?))
    }

    /// Velocity of `point` in `frame`, where `fixed` is a point fixed in `frame`.
    pub fn vel(
        &self,
        point: PointId,
        fixed: PointId,
        frame: FrameId,
    ) -> Result<Vector, MechanicsError> {
        self.dt(&self.pos_from(point, fixed)?, frame)
    }

    /// Planar cross product `(omega * n) x vector`.
    pub fn cross_normal(omega: &Expr, vector: &Vector) -> Vector {
        let mut out = Vector::zero();
        for (frame, x, y) in vector.terms() {
            let (vx, vy) = (omega.clone() * y.clone(), omega.clone() * x.clone());
            out = out + Vector::new(*frame, -vx, vy);
        }
        out
    }

    /// Numeric value of `vector` in `frame`.
    pub fn evaluate(
        &self,
        vector: &Vector,
        frame: FrameId,
        lookup: &dyn Fn(&Symbol) -> Option<f64>,
    ) -> Result<DVec2, MechanicsError> {
        let (x, y) = self.express(vector, frame)?;
        Ok(DVec2::new(x.eval(lookup)?, y.eval(lookup)?))
    }

    pub fn add_body(&mut self, body: RigidBody) -> BodyId {
        self.bodies.push(body);
        BodyId(self.bodies.len() - 1)
    }

    pub fn body(&self, id: BodyId) -> &RigidBody {
        &self.bodies[id.0]
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Declares the inertial frame and its fixed point.
    pub fn set_newtonian(&mut self, frame: FrameId, origin: PointId) -> Result<(), MechanicsError> {
        if let Some((existing, _)) = self.newtonian {
            let name = self.frames[existing.0].name.clone();
            return Err(MechanicsError::NewtonianRedefined(name));
        }
        self.newtonian = Some((frame, origin));
        Ok(())
    }

    pub fn newtonian(&self) -> Option<(FrameId, PointId)> {
        self.newtonian
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SymbolKind;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_express_rotated_vector() {
        let mut mech = Mechanics::new();
        let n = mech.new_frame("n").unwrap();
        let a = mech.new_frame("a").unwrap();
        mech.orient(a, n, Expr::num(FRAC_PI_2)).unwrap();
        let v = Vector::unit(a, Axis::X);
        let value = mech.evaluate(&v, n, &|_| None).unwrap();
        assert!((value - DVec2::new(0.0, 1.0)).length() < 1e-12);
    }

    #[test]
    fn test_pos_from_uses_common_ancestor() {
        let mut mech = Mechanics::new();
        let n = mech.new_frame("n").unwrap();
        let o = mech.new_point("o").unwrap();
        let p = mech.new_point("p").unwrap();
        let c = mech.new_point("c").unwrap();
        let r = Symbol::new(0, "wheel_r", SymbolKind::Constant);
        let x = Symbol::new(1, "disc_q_x", SymbolKind::Coordinate);
        mech.set_pos(p, o, Vector::new(n, x.expr(), Expr::zero())).unwrap();
        mech.set_pos(c, p, Vector::new(n, Expr::zero(), r.expr())).unwrap();
        let rel = mech.pos_from(p, c).unwrap();
        assert_eq!(rel, Vector::new(n, Expr::zero(), -r.expr()));
    }

    #[test]
    fn test_velocity_uses_kinematic_map() {
        let mut mech = Mechanics::new();
        let n = mech.new_frame("n").unwrap();
        let o = mech.new_point("o").unwrap();
        let p = mech.new_point("p").unwrap();
        let q = Symbol::new(0, "j_q", SymbolKind::Coordinate);
        let u = Symbol::new(1, "j_u", SymbolKind::Speed);
        mech.add_kinematic_pair(q.clone(), u.clone());
        mech.set_pos(p, o, Vector::new(n, q.expr(), Expr::zero())).unwrap();
        assert_eq!(
            mech.vel(p, o, n).unwrap(),
            Vector::new(n, u.expr(), Expr::zero())
        );
    }

    #[test]
    fn test_component_and_placement_chain() {
        let mut mech = Mechanics::new();
        let n = mech.new_frame("n").unwrap();
        let a = mech.new_frame("a").unwrap();
        mech.orient(a, n, Expr::num(FRAC_PI_2)).unwrap();
        let v = Vector::new(n, Expr::num(2.0), Expr::num(3.0));
        let along = mech.component(&v, a, Axis::X).unwrap();
        let across = mech.component(&v, a, Axis::Y).unwrap();
        assert!((along.eval(&|_| None).unwrap() - 3.0).abs() < 1e-12);
        assert!((across.eval(&|_| None).unwrap() + 2.0).abs() < 1e-12);

        let o = mech.new_point("o").unwrap();
        let p = mech.new_point("p").unwrap();
        let c = mech.new_point("c").unwrap();
        assert!(!mech.is_located(p));
        mech.set_pos(p, o, Vector::unit(n, Axis::X)).unwrap();
        mech.set_pos(c, p, Vector::unit(n, Axis::Y)).unwrap();
        assert!(mech.is_located(p));
        assert!(mech.is_located_from(c, o));
        assert!(mech.is_located_from(p, p));
        assert!(!mech.is_located_from(o, c));
    }

    #[test]
    fn test_relations_are_write_once() {
        let mut mech = Mechanics::new();
        let n = mech.new_frame("n").unwrap();
        let a = mech.new_frame("a").unwrap();
        mech.orient(a, n, Expr::zero()).unwrap();
        assert!(matches!(
            mech.orient(a, n, Expr::one()),
            Err(MechanicsError::AlreadyOriented(_))
        ));
        assert!(matches!(
            mech.orient(n, a, Expr::one()),
            Err(MechanicsError::Cycle(..))
        ));
        assert!(matches!(
            mech.new_frame("a"),
            Err(MechanicsError::DuplicateName(_))
        ));
        let b = mech.new_frame("b").unwrap();
        assert!(matches!(
            mech.angle(b, n),
            Err(MechanicsError::Disconnected(..))
        ));
    }
}
