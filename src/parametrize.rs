//! Mapping symbols back onto numbers.
//!
//! A [`ParameterProvider`] answers "what is the value of the quantity called
//! `name`", where `name` follows the synthesized `<owner>_<key>` convention.
//! The tree asks a provider for every symbol it knows; anything the provider
//! cannot answer is reported by [`ModelTree::missing_symbols`], never guessed.

use crate::error::ModelResult;
use crate::expr::Symbol;
use crate::tree::ModelTree;
use bevy_heavy::ComputeMassProperties3d;
use bevy_math::primitives::{Capsule3d, Cuboid, Cylinder, Sphere};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Any source of named physical quantities.
pub trait ParameterProvider {
    fn parameter(&self, name: &str) -> Option<f64>;
}

impl<P: ParameterProvider + ?Sized> ParameterProvider for &P {
    fn parameter(&self, name: &str) -> Option<f64> {
        (**self).parameter(name)
    }
}

impl ParameterProvider for HashMap<String, f64> {
    fn parameter(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl ParameterProvider for BTreeMap<String, f64> {
    fn parameter(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// The first provider that knows a name wins.
impl<A: ParameterProvider, B: ParameterProvider> ParameterProvider for (A, B) {
    fn parameter(&self, name: &str) -> Option<f64> {
        self.0.parameter(name).or_else(|| self.1.parameter(name))
    }
}

/// Measured values plus aliases from symbol names to measured names.
///
/// ```json
/// { "values": { "wheelbase": 1.02, "ground_x": 0.0 },
///   "aliases": { "closure_x": "wheelbase" } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterTable {
    pub values: BTreeMap<String, f64>,
    pub aliases: BTreeMap<String, String>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_alias(
        mut self,
        symbol_name: impl Into<String>,
        measured: impl Into<String>,
    ) -> Self {
        self.aliases.insert(symbol_name.into(), measured.into());
        self
    }
}

impl ParameterProvider for ParameterTable {
    fn parameter(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().or_else(|| {
            self.aliases
                .get(name)
                .and_then(|measured| self.values.get(measured))
                .copied()
        })
    }
}

/// Geometric primitive approximating a part.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapePrimitive {
    /// A box defined by half-extents (x, y, z); a link lies along x.
    Box(Vec3),
    /// A cylinder defined by radius and height (aligned along Y axis). A wheel
    /// spins about that axis.
    Cylinder { radius: f32, height: f32 },
    Sphere(f32),
    /// A capsule defined by radius and segment height (aligned along Y axis).
    Capsule { radius: f32, height: f32 },
}

#[derive(Clone, Copy, Debug)]
enum BevyPrimitive {
    Cuboid(Cuboid),
    Cylinder(Cylinder),
    Sphere(Sphere),
    Capsule(Capsule3d),
}

impl ComputeMassProperties3d for BevyPrimitive {
    fn mass(&self, density: f32) -> f32 {
        match self {
            Self::Cuboid(s) => s.mass(density),
            Self::Cylinder(s) => s.mass(density),
            Self::Sphere(s) => s.mass(density),
            Self::Capsule(s) => s.mass(density),
        }
    }

    fn unit_principal_angular_inertia(&self) -> Vec3 {
        match self {
            Self::Cuboid(s) => s.unit_principal_angular_inertia(),
            Self::Cylinder(s) => s.unit_principal_angular_inertia(),
            Self::Sphere(s) => s.unit_principal_angular_inertia(),
            Self::Capsule(s) => s.unit_principal_angular_inertia(),
        }
    }

    fn center_of_mass(&self) -> Vec3 {
        match self {
            Self::Cuboid(s) => s.center_of_mass(),
            Self::Cylinder(s) => s.center_of_mass(),
            Self::Sphere(s) => s.center_of_mass(),
            Self::Capsule(s) => s.center_of_mass(),
        }
    }
}

impl ShapePrimitive {
    fn to_bevy_primitive(self) -> BevyPrimitive {
        match self {
            Self::Box(half_extents) => BevyPrimitive::Cuboid(Cuboid {
                half_size: half_extents,
            }),
            Self::Cylinder { radius, height } => {
                BevyPrimitive::Cylinder(Cylinder::new(radius, height))
            }
            Self::Sphere(r) => BevyPrimitive::Sphere(Sphere::new(r)),
            Self::Capsule { radius, height } => {
                BevyPrimitive::Capsule(Capsule3d::new(radius, height))
            }
        }
    }

    /// Principal inertia about the axis normal to the plane of motion.
    fn spin_inertia(self, unit: Vec3) -> f32 {
        match self {
            Self::Box(_) | Self::Capsule { .. } => unit.z,
            Self::Cylinder { .. } => unit.y,
            Self::Sphere(_) => unit.x,
        }
    }

    fn length(self) -> Option<f32> {
        match self {
            Self::Box(half) => Some(2.0 * half.x),
            Self::Cylinder { height, .. } | Self::Capsule { height, .. } => Some(height),
            Self::Sphere(_) => None,
        }
    }

    fn radius(self) -> Option<f32> {
        match self {
            Self::Box(_) => None,
            Self::Cylinder { radius, .. } | Self::Capsule { radius, .. } => Some(radius),
            Self::Sphere(r) => Some(r),
        }
    }
}

/// A part described by its shape and density.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrimitivePart {
    pub shape: ShapePrimitive,
    /// kg/m^3.
    pub density: f32,
}

impl PrimitivePart {
    pub fn mass(&self) -> f32 {
        self.shape.to_bevy_primitive().mass(self.density)
    }

    /// Central inertia about the plane normal.
    pub fn izz(&self) -> f32 {
        let unit = self.shape.to_bevy_primitive().unit_principal_angular_inertia();
        self.mass() * self.shape.spin_inertia(unit)
    }
}

/// Derives `<node>_m`, `<node>_izz`, `<node>_l` and `<node>_r` from primitive
/// shapes, keyed by node name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveBodies {
    parts: BTreeMap<String, PrimitivePart>,
}

impl PrimitiveBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(
        mut self,
        node: impl Into<String>,
        shape: ShapePrimitive,
        density: f32,
    ) -> Self {
        self.parts.insert(node.into(), PrimitivePart { shape, density });
        self
    }

    pub fn part(&self, node: &str) -> Option<&PrimitivePart> {
        self.parts.get(node)
    }
}

impl ParameterProvider for PrimitiveBodies {
    fn parameter(&self, name: &str) -> Option<f64> {
        self.parts.iter().find_map(|(node, part)| {
            let key = name.strip_prefix(node.as_str())?.strip_prefix('_')?;
            let value = match key {
                "m" => part.mass(),
                "izz" => part.izz(),
                "l" => part.shape.length()?,
                "r" => part.shape.radius()?,
                _ => return None,
            };
            Some(f64::from(value))
        })
    }
}

impl ModelTree {
    /// Every parameter symbol of the tree: constants and inputs, without the
    /// state, the auxiliary speeds and the reaction forces.
    pub fn get_all_symbols(&self) -> Vec<Symbol> {
        self.registry()
            .entries()
            .iter()
            .filter(|e| e.symbol.kind().is_parameter())
            .map(|e| e.symbol.clone())
            .collect()
    }

    /// Every symbol of the tree, state included.
    pub fn all_symbols_with_state(&self) -> Vec<Symbol> {
        self.registry().entries().iter().map(|e| e.symbol.clone()).collect()
    }

    /// Values for every parameter symbol `provider` knows by name.
    pub fn get_param_values(&self, provider: &dyn ParameterProvider) -> BTreeMap<Symbol, f64> {
        let values: BTreeMap<Symbol, f64> = self
            .get_all_symbols()
            .into_iter()
            .filter_map(|s| provider.parameter(s.name()).map(|v| (s, v)))
            .collect();
        log::debug!(
            "resolved {} of {} parameters",
            values.len(),
            self.get_all_symbols().len()
        );
        values
    }

    /// Parameter symbols absent from `values`.
    pub fn missing_symbols(&self, values: &BTreeMap<Symbol, f64>) -> Vec<Symbol> {
        self.get_all_symbols()
            .into_iter()
            .filter(|s| !values.contains_key(s))
            .collect()
    }

    pub fn get_description(&self, symbol: &Symbol) -> ModelResult<&str> {
        self.registry().describe(symbol)
    }
}
