//! Solver-independent optimization model.
//!
//! A [`Problem`] is a flat list of scalar variables, a flat list of named
//! constraints and a linear objective. Constraint generation only ever
//! appends; the solver backend only ever reads.
//!
//! Two constraint shapes exist:
//!
//! ```text
//! Linear:  a·x + c  (=, ≤, ≥)  0
//! Cone:    Σ (aᵢ·x + cᵢ)²  ≤  a₀·x + c₀
//! ```
//!
//! The cone shape covers both the fitted fuel curves and the voltage product
//! surrogate, so backends only need second-order cones.

pub mod collection;

use serde::Serialize;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

pub use collection::{BoundFn, BoundPolicy, Slot, VariableCollection};

/// Index of a scalar variable in its [`Problem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarInfo {
    pub name: String,
    pub kind: VarKind,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Affine expression `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn term(var: VarId, coef: f64) -> Self {
        Self {
            terms: vec![(var, coef)],
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// `Σ coef·var` over a series of variables sharing one coefficient.
    pub fn sum(vars: &[VarId], coef: f64) -> Self {
        let mut e = Self::new();
        for &v in vars {
            e.add_term(v, coef);
        }
        e
    }

    /// True when no variable has a nonzero coefficient.
    pub fn is_constant(&self) -> bool {
        self.terms.iter().all(|(_, c)| *c == 0.0)
    }

    /// Merges repeated variables and drops zero coefficients.
    pub fn compressed(&self) -> Self {
        let mut terms: Vec<(VarId, f64)> = Vec::with_capacity(self.terms.len());
        let mut sorted = self.terms.clone();
        sorted.sort_by_key(|(v, _)| *v);
        for (v, c) in sorted {
            match terms.last_mut() {
                Some((last, acc)) if *last == v => *acc += c,
                _ => terms.push((v, c)),
            }
        }
        terms.retain(|(_, c)| *c != 0.0);
        Self {
            terms,
            constant: self.constant,
        }
    }

    pub fn eval(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
                .sum::<f64>()
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        LinExpr::term(var, 1.0)
    }
}

impl AddAssign for LinExpr {
    fn add_assign(&mut self, rhs: LinExpr) {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl SubAssign for LinExpr {
    fn sub_assign(&mut self, rhs: LinExpr) {
        self.terms.extend(rhs.terms.into_iter().map(|(v, c)| (v, -c)));
        self.constant -= rhs.constant;
    }
}

impl Add for LinExpr {
    type Output = LinExpr;
    fn add(mut self, rhs: LinExpr) -> LinExpr {
        self += rhs;
        self
    }
}

impl Sub for LinExpr {
    type Output = LinExpr;
    fn sub(mut self, rhs: LinExpr) -> LinExpr {
        self -= rhs;
        self
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;
    fn mul(mut self, rhs: f64) -> LinExpr {
        for (_, c) in &mut self.terms {
            *c *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;
    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

/// Relation of a linear expression to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sense {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::Eq => "==",
            Sense::Le => "<=",
            Sense::Ge => ">=",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintBody {
    /// `expr (sense) 0`
    Linear { expr: LinExpr, sense: Sense },
    /// `Σ squares² ≤ bound`
    Cone { squares: Vec<LinExpr>, bound: LinExpr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub body: ConstraintBody,
}

impl Constraint {
    /// Largest violation at `values`, zero when satisfied.
    pub fn violation(&self, values: &[f64]) -> f64 {
        match &self.body {
            ConstraintBody::Linear { expr, sense } => {
                let v = expr.eval(values);
                match sense {
                    Sense::Eq => v.abs(),
                    Sense::Le => v.max(0.0),
                    Sense::Ge => (-v).max(0.0),
                }
            }
            ConstraintBody::Cone { squares, bound } => {
                let lhs: f64 = squares.iter().map(|s| s.eval(values).powi(2)).sum();
                (lhs - bound.eval(values)).max(0.0)
            }
        }
    }
}

/// A complete mixed-integer second-order cone program, minimized.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    vars: Vec<VarInfo>,
    constraints: Vec<Constraint>,
    objective: LinExpr,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, info: VarInfo) -> VarId {
        self.vars.push(info);
        VarId(self.vars.len() - 1)
    }

    pub fn vars(&self) -> &[VarInfo] {
        &self.vars
    }

    pub fn var(&self, id: VarId) -> &VarInfo {
        &self.vars[id.0]
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Linear lookup by generated name, for diagnostics and tests.
    pub fn find_var(&self, name: &str) -> Option<VarId> {
        self.vars.iter().position(|v| v.name == name).map(VarId)
    }

    pub fn binaries(&self) -> impl Iterator<Item = VarId> + '_ {
        self.vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind == VarKind::Binary)
            .map(|(i, _)| VarId(i))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn find_constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn set_objective(&mut self, objective: LinExpr) {
        self.objective = objective;
    }

    pub fn add_linear(&mut self, name: impl Into<String>, expr: LinExpr, sense: Sense) {
        self.constraints.push(Constraint {
            name: name.into(),
            body: ConstraintBody::Linear { expr, sense },
        });
    }

    /// `lhs == rhs`
    pub fn add_eq(&mut self, name: impl Into<String>, lhs: LinExpr, rhs: LinExpr) {
        self.add_linear(name, lhs - rhs, Sense::Eq);
    }

    /// `lhs <= rhs`
    pub fn add_le(&mut self, name: impl Into<String>, lhs: LinExpr, rhs: LinExpr) {
        self.add_linear(name, lhs - rhs, Sense::Le);
    }

    /// `lhs >= rhs`
    pub fn add_ge(&mut self, name: impl Into<String>, lhs: LinExpr, rhs: LinExpr) {
        self.add_linear(name, lhs - rhs, Sense::Ge);
    }

    /// `Σ squares² ≤ bound`. Squares that carry no variable and no constant
    /// are dropped, and with none left the constraint is stored as the
    /// linear `bound ≥ 0`.
    pub fn add_cone(&mut self, name: impl Into<String>, squares: Vec<LinExpr>, bound: LinExpr) {
        let squares: Vec<LinExpr> = squares
            .into_iter()
            .map(|s| s.compressed())
            .filter(|s| !(s.is_constant() && s.constant == 0.0))
            .collect();
        let name = name.into();
        if squares.is_empty() {
            self.add_linear(name, bound, Sense::Ge);
        } else {
            self.constraints.push(Constraint {
                name,
                body: ConstraintBody::Cone { squares, bound },
            });
        }
    }

    /// Worst constraint violation at `values`, with the constraint's name.
    pub fn max_violation(&self, values: &[f64]) -> Option<(&str, f64)> {
        self.constraints
            .iter()
            .map(|c| (c.name.as_str(), c.violation(values)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous(name: &str) -> VarInfo {
        VarInfo {
            name: name.into(),
            kind: VarKind::Continuous,
            lower: Some(0.0),
            upper: None,
        }
    }

    #[test]
    fn expression_arithmetic() {
        let mut p = Problem::new();
        let a = p.add_var(continuous("a"));
        let b = p.add_var(continuous("b"));
        let e = (LinExpr::from(a) * 2.0 - LinExpr::from(b) + LinExpr::constant(1.0)) * 0.5;
        assert_eq!(e.eval(&[3.0, 4.0]), 1.5);
        let n = -(LinExpr::from(a) + LinExpr::from(a));
        assert_eq!(n.compressed().terms, vec![(a, -2.0)]);
    }

    #[test]
    fn compressed_merges_and_drops_zeros() {
        let mut p = Problem::new();
        let a = p.add_var(continuous("a"));
        let b = p.add_var(continuous("b"));
        let e = LinExpr::from(b) + LinExpr::from(a) - LinExpr::from(b);
        assert_eq!(e.compressed().terms, vec![(a, 1.0)]);
    }

    #[test]
    fn empty_cone_becomes_linear() {
        let mut p = Problem::new();
        let y = p.add_var(continuous("y"));
        let x = p.add_var(continuous("x"));
        p.add_cone(
            "fuel",
            vec![LinExpr::new(), LinExpr::term(x, 0.0)],
            LinExpr::from(y) - LinExpr::term(x, 2.0),
        );
        match &p.constraints()[0].body {
            ConstraintBody::Linear { sense, .. } => assert_eq!(*sense, Sense::Ge),
            other => panic!("expected linear, got {other:?}"),
        }
    }

    #[test]
    fn violation_by_shape() {
        let mut p = Problem::new();
        let x = p.add_var(continuous("x"));
        let t = p.add_var(continuous("t"));
        p.add_le("cap", LinExpr::from(x), LinExpr::constant(1.0));
        p.add_cone("soc", vec![LinExpr::from(x)], LinExpr::from(t));
        let values = [2.0, 3.0];
        assert_eq!(p.constraints()[0].violation(&values), 1.0);
        assert_eq!(p.constraints()[1].violation(&values), 1.0);
        let (name, worst) = p.max_violation(&values).unwrap();
        assert_eq!(worst, 1.0);
        assert!(name == "cap" || name == "soc");
        assert_eq!(p.find_var("t"), Some(t));
    }
}
