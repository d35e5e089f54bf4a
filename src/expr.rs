//! Scalar symbolic expressions.
//!
//! [`Expr`] is the scalar half of the planar mechanics backend. Expressions are
//! lightly canonicalized when they are built: nested sums and products are
//! flattened, numeric constants are folded, like terms of a sum are merged, and
//! zero/unit terms disappear. Nothing beyond that is attempted.

use crate::error::MechanicsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// What a symbol stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    /// A time-invariant parameter (length, mass, stiffness, ...).
    Constant,
    /// A time-varying exogenous quantity (an actuator torque, ...).
    Input,
    /// A generalized coordinate.
    Coordinate,
    /// A generalized speed.
    Speed,
    /// A speed that is zero in the motion; it only exposes a noncontributing force.
    AuxiliarySpeed,
    /// Magnitude of a noncontributing (reaction) force.
    Reaction,
}

impl SymbolKind {
    /// Whether the symbol is a function of time.
    pub fn is_dynamic(self) -> bool {
        !matches!(self, Self::Constant)
    }

    /// Whether the symbol is part of the state (coordinate or speed).
    pub fn is_state(self) -> bool {
        matches!(self, Self::Coordinate | Self::Speed)
    }

    /// Whether the caller has to supply a value or signal for the symbol.
    pub fn is_parameter(self) -> bool {
        matches!(self, Self::Constant | Self::Input)
    }
}

/// A named symbolic quantity.
///
/// Symbols are only created by the [`SymbolRegistry`](crate::SymbolRegistry);
/// the `id` is the interned id of the synthesized name, so ordering follows
/// creation order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol {
    id: u16,
    name: String,
    kind: SymbolKind,
}

impl Symbol {
    pub(crate) fn new(id: u16, name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    /// Interned id of the synthesized name.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Synthesized name (`<owner>_<key>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Shorthand for `Expr::from(self)`.
    pub fn expr(&self) -> Expr {
        Expr::Sym(self.clone())
    }

    /// First time derivative, `d(self)/dt`.
    pub fn dt(&self) -> Expr {
        if self.kind.is_dynamic() {
            Expr::Deriv(self.clone(), 1)
        } else {
            Expr::zero()
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A scalar symbolic expression.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// A symbol.
    Sym(Symbol),
    /// Time derivative of a dynamic symbol, with its order (1 or 2).
    Deriv(Symbol, u8),
    /// Sum of terms.
    Add(Vec<Expr>),
    /// Product of factors.
    Mul(Vec<Expr>),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
}

impl Default for Expr {
    fn default() -> Self {
        Self::zero()
    }
}

impl Expr {
    pub fn zero() -> Self {
        Self::Num(0.0)
    }

    pub fn one() -> Self {
        Self::Num(1.0)
    }

    pub fn num(value: f64) -> Self {
        Self::Num(value)
    }

    /// Returns `true` for the literal zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Num(v) if *v == 0.0)
    }

    /// Returns the literal value, if the expression is a number.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// Builds a canonical sum.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        let mut constant = 0.0;
        // (coefficient, rest) pairs; rest == None means a bare constant.
        let mut merged: Vec<(f64, Expr)> = Vec::new();
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Self::Add(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        for term in flat {
            if let Self::Num(v) = term {
                constant += v;
                continue;
            }
            let (coefficient, rest) = term.split_coefficient();
            match merged.iter_mut().find(|(_, r)| *r == rest) {
                Some((c, _)) => *c += coefficient,
                None => merged.push((coefficient, rest)),
            }
        }

        let mut out: Vec<Expr> = merged
            .into_iter()
            .filter(|(c, _)| *c != 0.0)
            .map(|(c, rest)| Self::product([Self::Num(c), rest]))
            .collect();
        if constant != 0.0 {
            out.push(Self::Num(constant));
        }
        match out.len() {
            0 => Self::zero(),
            1 => out.pop().unwrap_or_default(),
            _ => Self::Add(out),
        }
    }

    /// Builds a canonical product.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        let mut coefficient = 1.0;
        let mut out = Vec::new();
        for factor in factors {
            match factor {
                Self::Num(v) => coefficient *= v,
                Self::Mul(inner) => {
                    for f in inner {
                        match f {
                            Self::Num(v) => coefficient *= v,
                            other => out.push(other),
                        }
                    }
                }
                other => out.push(other),
            }
        }
        if coefficient == 0.0 {
            return Self::zero();
        }
        if coefficient != 1.0 || out.is_empty() {
            out.insert(0, Self::Num(coefficient));
        }
        match out.len() {
            1 => out.pop().unwrap_or_default(),
            _ => Self::Mul(out),
        }
    }

    pub fn sin(self) -> Self {
        match self {
            Self::Num(v) => Self::Num(v.sin()),
            other => Self::Sin(Box::new(other)),
        }
    }

    pub fn cos(self) -> Self {
        match self {
            Self::Num(v) => Self::Num(v.cos()),
            other => Self::Cos(Box::new(other)),
        }
    }

    /// Splits a leading numeric factor off a term.
    fn split_coefficient(self) -> (f64, Expr) {
        match self {
            Self::Mul(mut factors) => {
                if let Some(Self::Num(c)) = factors.first() {
                    let c = *c;
                    factors.remove(0);
                    let rest = if factors.len() == 1 {
                        factors.pop().unwrap_or_default()
                    } else {
                        Self::Mul(factors)
                    };
                    (c, rest)
                } else {
                    (1.0, Self::Mul(factors))
                }
            }
            other => (1.0, other),
        }
    }

    /// Total time derivative.
    ///
    /// Constants differentiate to zero; dynamic symbols become [`Expr::Deriv`].
    pub fn dt(&self) -> Result<Expr, MechanicsError> {
        Ok(match self {
            Self::Num(_) => Self::zero(),
            Self::Sym(s) => s.dt(),
            Self::Deriv(s, order) => {
                if *order >= 2 {
                    return Err(MechanicsError::DerivativeOrder {
                        name: s.name().to_string(),
                        order: order + 1,
                    });
                }
                Self::Deriv(s.clone(), order + 1)
            }
            Self::Add(terms) => {
                Self::sum(terms.iter().map(Expr::dt).collect::<Result<Vec<_>, _>>()?)
            }
            Self::Mul(factors) => {
                let mut terms = Vec::with_capacity(factors.len());
                for (i, factor) in factors.iter().enumerate() {
                    let d = factor.dt()?;
                    if d.is_zero() {
                        continue;
                    }
                    let others = factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, f)| f.clone());
                    terms.push(Self::product(std::iter::once(d).chain(others)));
                }
                Self::sum(terms)
            }
            Self::Sin(arg) => Self::product([arg.as_ref().clone().cos(), arg.dt()?]),
            Self::Cos(arg) => {
                Self::product([Self::Num(-1.0), arg.as_ref().clone().sin(), arg.dt()?])
            }
        })
    }

    /// Rebuilds the expression, replacing every sub-expression for which
    /// `replace` returns `Some`.
    pub fn xreplace(&self, replace: &dyn Fn(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replacement) = replace(self) {
            return replacement;
        }
        match self {
            Self::Num(_) | Self::Sym(_) | Self::Deriv(..) => self.clone(),
            Self::Add(terms) => Self::sum(terms.iter().map(|t| t.xreplace(replace))),
            Self::Mul(factors) => Self::product(factors.iter().map(|f| f.xreplace(replace))),
            Self::Sin(arg) => arg.xreplace(replace).sin(),
            Self::Cos(arg) => arg.xreplace(replace).cos(),
        }
    }

    /// Symbols appearing in the expression, in order of first appearance.
    pub fn free_symbols(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<Symbol>) {
        match self {
            Self::Num(_) => {}
            Self::Sym(s) | Self::Deriv(s, _) => {
                if !out.contains(s) {
                    out.push(s.clone());
                }
            }
            Self::Add(items) | Self::Mul(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            }
            Self::Sin(arg) | Self::Cos(arg) => arg.collect_symbols(out),
        }
    }

    /// Numeric evaluation; `lookup` supplies symbol values.
    pub fn eval(&self, lookup: &dyn Fn(&Symbol) -> Option<f64>) -> Result<f64, MechanicsError> {
        Ok(match self {
            Self::Num(v) => *v,
            Self::Sym(s) => {
                lookup(s).ok_or_else(|| MechanicsError::Unresolved(s.name().to_string()))?
            }
            Self::Deriv(s, order) => {
                let primes = "'".repeat(*order as usize);
                return Err(MechanicsError::Unresolved(format!("{}{primes}", s.name())));
            }
            Self::Add(terms) => {
                let mut acc = 0.0;
                for t in terms {
                    acc += t.eval(lookup)?;
                }
                acc
            }
            Self::Mul(factors) => {
                let mut acc = 1.0;
                for f in factors {
                    acc *= f.eval(lookup)?;
                }
                acc
            }
            Self::Sin(arg) => arg.eval(lookup)?.sin(),
            Self::Cos(arg) => arg.eval(lookup)?.cos(),
        })
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Self::Sym(symbol)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Self::Sym(symbol.clone())
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, -rhs])
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::product([Expr::Num(-1.0), self])
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(v) => write!(f, "{v}"),
            Self::Sym(s) => write!(f, "{s}"),
            Self::Deriv(s, order) => write!(f, "{s}{}", "'".repeat(*order as usize)),
            Self::Add(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            Self::Mul(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    match factor {
                        Self::Add(_) => write!(f, "({factor})")?,
                        _ => write!(f, "{factor}")?,
                    }
                }
                Ok(())
            }
            Self::Sin(arg) => write!(f, "sin({arg})"),
            Self::Cos(arg) => write!(f, "cos({arg})"),
        }
    }
}
