//! Expressions over bounded integer and Boolean variables.
//!
//! Predicates, guards and update right-hand sides are all [`Expr`]s. The
//! language is deliberately small: Boolean connectives, comparisons and
//! linear-ish integer arithmetic. The operations the refinement engine
//! relies on are substitution (weakest preconditions), simplification and
//! evaluation under a concrete valuation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;
use std::rc::Rc;

use crate::error::EvalError;

/// A concrete value of a variable or expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Values of program variables, by name.
pub type Valuation = BTreeMap<String, Value>;

/// A simultaneous assignment: each variable is replaced by an expression.
pub type Assignment = BTreeMap<String, Expr>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    /// The relation with swapped operands: `a op b <=> b op' a`.
    pub fn flip(self) -> Self {
        match self {
            RelOp::Eq => RelOp::Eq,
            RelOp::Ne => RelOp::Ne,
            RelOp::Lt => RelOp::Gt,
            RelOp::Le => RelOp::Ge,
            RelOp::Gt => RelOp::Lt,
            RelOp::Ge => RelOp::Le,
        }
    }

    /// The complementary relation: `!(a op b) <=> a op' b`.
    pub fn negate(self) -> Self {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Le => RelOp::Gt,
            RelOp::Gt => RelOp::Le,
            RelOp::Ge => RelOp::Lt,
        }
    }

    fn holds<T: Ord>(self, a: T, b: T) -> bool {
        match self {
            RelOp::Eq => a == b,
            RelOp::Ne => a != b,
            RelOp::Lt => a < b,
            RelOp::Le => a <= b,
            RelOp::Gt => a > b,
            RelOp::Ge => a >= b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            RelOp::Eq => "=",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Bool(bool),
    Int(i64),
    Var(String),
    Not(Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Implies(Expr, Expr),
    Iff(Expr, Expr),
    Ite(Expr, Expr, Expr),
    Rel(RelOp, Expr, Expr),
    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    Neg(Expr),
}

/// An immutable, structurally shared expression.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Expr(Rc<ExprKind>);

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Int(value))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Var(name.into()))
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        Self::new(ExprKind::And(self, other.into()))
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        Self::new(ExprKind::Or(self, other.into()))
    }

    pub fn implies(self, other: impl Into<Expr>) -> Self {
        Self::new(ExprKind::Implies(self, other.into()))
    }

    pub fn iff(self, other: impl Into<Expr>) -> Self {
        Self::new(ExprKind::Iff(self, other.into()))
    }

    pub fn ite(self, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Self {
        Self::new(ExprKind::Ite(self, then.into(), otherwise.into()))
    }

    pub fn rel(op: RelOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::new(ExprKind::Rel(op, lhs.into(), rhs.into()))
    }

    pub fn equals(self, other: impl Into<Expr>) -> Self {
        Self::rel(RelOp::Eq, self, other)
    }

    pub fn not_equals(self, other: impl Into<Expr>) -> Self {
        Self::rel(RelOp::Ne, self, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        Self::rel(RelOp::Lt, self, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        Self::rel(RelOp::Le, self, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        Self::rel(RelOp::Gt, self, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        Self::rel(RelOp::Ge, self, other)
    }

    /// Conjunction of all expressions; `true` for none.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        exprs
            .into_iter()
            .reduce(|acc, e| acc.and(e))
            .unwrap_or_else(|| Expr::bool(true))
    }

    /// Disjunction of all expressions; `false` for none.
    pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        exprs
            .into_iter()
            .reduce(|acc, e| acc.or(e))
            .unwrap_or_else(|| Expr::bool(false))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ExprKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind() {
            ExprKind::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind(), ExprKind::Bool(_) | ExprKind::Int(_))
    }

    /// Names of all variables occurring in the expression.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            match e.kind() {
                ExprKind::Bool(_) | ExprKind::Int(_) => {}
                ExprKind::Var(name) => {
                    vars.insert(name.clone());
                }
                ExprKind::Not(a) | ExprKind::Neg(a) => stack.push(a),
                ExprKind::And(a, b)
                | ExprKind::Or(a, b)
                | ExprKind::Implies(a, b)
                | ExprKind::Iff(a, b)
                | ExprKind::Rel(_, a, b)
                | ExprKind::Add(a, b)
                | ExprKind::Sub(a, b)
                | ExprKind::Mul(a, b) => {
                    stack.push(a);
                    stack.push(b);
                }
                ExprKind::Ite(c, a, b) => {
                    stack.push(c);
                    stack.push(a);
                    stack.push(b);
                }
            }
        }
        vars
    }

    /// Replaces every variable bound by `assignment`, simultaneously.
    pub fn substitute(&self, assignment: &Assignment) -> Expr {
        self.rebuild(&|name| assignment.get(name).cloned())
    }

    fn rebuild(&self, replace: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        let kind = match self.kind() {
            ExprKind::Bool(_) | ExprKind::Int(_) => return self.clone(),
            ExprKind::Var(name) => return replace(name).unwrap_or_else(|| self.clone()),
            ExprKind::Not(a) => ExprKind::Not(a.rebuild(replace)),
            ExprKind::Neg(a) => ExprKind::Neg(a.rebuild(replace)),
            ExprKind::And(a, b) => ExprKind::And(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Or(a, b) => ExprKind::Or(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Implies(a, b) => ExprKind::Implies(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Iff(a, b) => ExprKind::Iff(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Rel(op, a, b) => ExprKind::Rel(*op, a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Add(a, b) => ExprKind::Add(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Sub(a, b) => ExprKind::Sub(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Mul(a, b) => ExprKind::Mul(a.rebuild(replace), b.rebuild(replace)),
            ExprKind::Ite(c, a, b) => ExprKind::Ite(
                c.rebuild(replace),
                a.rebuild(replace),
                b.rebuild(replace),
            ),
        };
        Expr::new(kind)
    }

    /// Evaluates the expression under a valuation binding all of its variables.
    pub fn evaluate(&self, valuation: &Valuation) -> Result<Value, EvalError> {
        let value = match self.kind() {
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Int(i) => Value::Int(*i),
            ExprKind::Var(name) => *valuation
                .get(name)
                .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?,
            ExprKind::Not(a) => Value::Bool(!a.evaluate_bool(valuation)?),
            ExprKind::And(a, b) => {
                Value::Bool(a.evaluate_bool(valuation)? && b.evaluate_bool(valuation)?)
            }
            ExprKind::Or(a, b) => {
                Value::Bool(a.evaluate_bool(valuation)? || b.evaluate_bool(valuation)?)
            }
            ExprKind::Implies(a, b) => {
                Value::Bool(!a.evaluate_bool(valuation)? || b.evaluate_bool(valuation)?)
            }
            ExprKind::Iff(a, b) => {
                Value::Bool(a.evaluate_bool(valuation)? == b.evaluate_bool(valuation)?)
            }
            ExprKind::Ite(c, a, b) => {
                if c.evaluate_bool(valuation)? {
                    a.evaluate(valuation)?
                } else {
                    b.evaluate(valuation)?
                }
            }
            ExprKind::Rel(op, a, b) => match (a.evaluate(valuation)?, b.evaluate(valuation)?) {
                (Value::Int(x), Value::Int(y)) => Value::Bool(op.holds(x, y)),
                (Value::Bool(x), Value::Bool(y)) if matches!(op, RelOp::Eq | RelOp::Ne) => {
                    Value::Bool(op.holds(x, y))
                }
                _ => return Err(self.type_mismatch("comparable operands")),
            },
            ExprKind::Add(a, b) => {
                let (x, y) = (a.evaluate_int(valuation)?, b.evaluate_int(valuation)?);
                Value::Int(x.checked_add(y).ok_or_else(|| self.overflow())?)
            }
            ExprKind::Sub(a, b) => {
                let (x, y) = (a.evaluate_int(valuation)?, b.evaluate_int(valuation)?);
                Value::Int(x.checked_sub(y).ok_or_else(|| self.overflow())?)
            }
            ExprKind::Mul(a, b) => {
                let (x, y) = (a.evaluate_int(valuation)?, b.evaluate_int(valuation)?);
                Value::Int(x.checked_mul(y).ok_or_else(|| self.overflow())?)
            }
            ExprKind::Neg(a) => {
                let x = a.evaluate_int(valuation)?;
                Value::Int(x.checked_neg().ok_or_else(|| self.overflow())?)
            }
        };
        Ok(value)
    }

    pub fn evaluate_bool(&self, valuation: &Valuation) -> Result<bool, EvalError> {
        match self.evaluate(valuation)? {
            Value::Bool(b) => Ok(b),
            Value::Int(_) => Err(self.type_mismatch("a Boolean")),
        }
    }

    pub fn evaluate_int(&self, valuation: &Valuation) -> Result<i64, EvalError> {
        match self.evaluate(valuation)? {
            Value::Int(i) => Ok(i),
            Value::Bool(_) => Err(self.type_mismatch("an integer")),
        }
    }

    fn type_mismatch(&self, expected: &'static str) -> EvalError {
        EvalError::TypeMismatch {
            expr: self.to_string(),
            expected,
        }
    }

    fn overflow(&self) -> EvalError {
        EvalError::Overflow(self.to_string())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::bool(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::int(value as i64)
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::new(ExprKind::Not(self))
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Self::Output {
        Expr::new(ExprKind::Neg(self))
    }
}

impl<T: Into<Expr>> ops::Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Self::Output {
        Expr::new(ExprKind::Add(self, rhs.into()))
    }
}

impl<T: Into<Expr>> ops::Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Self::Output {
        Expr::new(ExprKind::Sub(self, rhs.into()))
    }
}

impl<T: Into<Expr>> ops::Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Self::Output {
        Expr::new(ExprKind::Mul(self, rhs.into()))
    }
}

// ============================================================================
// Simplification
// ============================================================================

/// `Σ coeffs[x]·x + constant`
#[derive(Debug, Clone, Default, PartialEq)]
struct Linear {
    coeffs: BTreeMap<String, i64>,
    constant: i64,
}

impl Linear {
    fn constant(value: i64) -> Self {
        Linear {
            coeffs: BTreeMap::new(),
            constant: value,
        }
    }

    fn scale(&self, factor: i64) -> Option<Linear> {
        let mut coeffs = BTreeMap::new();
        for (name, &c) in &self.coeffs {
            coeffs.insert(name.clone(), c.checked_mul(factor)?);
        }
        Some(Linear {
            coeffs,
            constant: self.constant.checked_mul(factor)?,
        })
    }

    fn plus(&self, other: &Linear) -> Option<Linear> {
        let mut res = self.clone();
        for (name, &c) in &other.coeffs {
            let entry = res.coeffs.entry(name.clone()).or_insert(0);
            *entry = entry.checked_add(c)?;
        }
        res.coeffs.retain(|_, c| *c != 0);
        res.constant = res.constant.checked_add(other.constant)?;
        Some(res)
    }

    fn of(e: &Expr) -> Option<Linear> {
        match e.kind() {
            ExprKind::Int(i) => Some(Linear::constant(*i)),
            ExprKind::Var(name) => Some(Linear {
                coeffs: BTreeMap::from([(name.clone(), 1)]),
                constant: 0,
            }),
            ExprKind::Add(a, b) => Linear::of(a)?.plus(&Linear::of(b)?),
            ExprKind::Sub(a, b) => Linear::of(a)?.plus(&Linear::of(b)?.scale(-1)?),
            ExprKind::Neg(a) => Linear::of(a)?.scale(-1),
            ExprKind::Mul(a, b) => {
                let (la, lb) = (Linear::of(a)?, Linear::of(b)?);
                if la.coeffs.is_empty() {
                    lb.scale(la.constant)
                } else if lb.coeffs.is_empty() {
                    la.scale(lb.constant)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn to_expr(&self) -> Expr {
        let mut res: Option<Expr> = None;
        for (name, &c) in &self.coeffs {
            let var = Expr::var(name.as_str());
            res = Some(match (res, c) {
                (None, 1) => var,
                (None, -1) => -var,
                (None, c) => Expr::int(c) * var,
                (Some(acc), 1) => acc + var,
                (Some(acc), -1) => acc - var,
                (Some(acc), c) if c < 0 => acc - Expr::int(-c) * var,
                (Some(acc), c) => acc + Expr::int(c) * var,
            });
        }
        res.unwrap_or_else(|| Expr::int(self.constant))
    }
}

fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    -div_floor(-a, b)
}

fn is_arithmetic(e: &Expr) -> bool {
    matches!(
        e.kind(),
        ExprKind::Int(_) | ExprKind::Add(..) | ExprKind::Sub(..) | ExprKind::Mul(..) | ExprKind::Neg(_)
    )
}

/// Normalizes `lhs op rhs` over integers to `Σ cᵢ·xᵢ op k`.
///
/// Strict bounds become non-strict (`x > 1` is `x >= 2`), the leading
/// coefficient is made positive, and a single-variable relation is divided by
/// its coefficient.
fn normalize_relation(op: RelOp, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    let diff = Linear::of(lhs)?.plus(&Linear::of(rhs)?.scale(-1)?)?;
    // Σ c·x + d op 0  <=>  Σ c·x op -d
    let mut terms = Linear {
        coeffs: diff.coeffs,
        constant: 0,
    };
    let mut op = op;
    let mut k = diff.constant.checked_neg()?;

    if terms.coeffs.is_empty() {
        return Some(Expr::bool(op.holds(0, k)));
    }

    if terms.coeffs.values().next().is_some_and(|&c| c < 0) {
        terms = terms.scale(-1)?;
        k = k.checked_neg()?;
        op = op.flip();
    }

    match op {
        RelOp::Gt => {
            op = RelOp::Ge;
            k = k.checked_add(1)?;
        }
        RelOp::Lt => {
            op = RelOp::Le;
            k = k.checked_sub(1)?;
        }
        _ => {}
    }

    if terms.coeffs.len() == 1 {
        let (name, c) = terms.coeffs.iter().next().map(|(n, &c)| (n.clone(), c))?;
        if c != 1 {
            // c > 0 here
            match op {
                RelOp::Ge => k = div_ceil(k, c),
                RelOp::Le => k = div_floor(k, c),
                RelOp::Eq | RelOp::Ne => {
                    if k % c != 0 {
                        return Some(Expr::bool(op == RelOp::Ne));
                    }
                    k /= c;
                }
                RelOp::Gt | RelOp::Lt => unreachable!("strict relations were normalized"),
            }
            terms = Linear {
                coeffs: BTreeMap::from([(name, 1)]),
                constant: 0,
            };
        }
    }

    Some(Expr::rel(op, terms.to_expr(), Expr::int(k)))
}

impl Expr {
    /// Constant folding, Boolean identities and normalization of integer comparisons.
    pub fn simplify(&self) -> Expr {
        match self.kind() {
            ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Var(_) => self.clone(),
            ExprKind::Not(a) => {
                let a = a.simplify();
                match a.kind() {
                    ExprKind::Bool(b) => Expr::bool(!b),
                    ExprKind::Not(inner) => inner.clone(),
                    ExprKind::Rel(op, x, y) => Expr::rel(op.negate(), x, y).simplify(),
                    _ => !a,
                }
            }
            ExprKind::And(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_bool(), b.as_bool()) {
                    (Some(false), _) | (_, Some(false)) => Expr::bool(false),
                    (Some(true), _) => b,
                    (_, Some(true)) => a,
                    _ if a == b => a,
                    _ => a.and(b),
                }
            }
            ExprKind::Or(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_bool(), b.as_bool()) {
                    (Some(true), _) | (_, Some(true)) => Expr::bool(true),
                    (Some(false), _) => b,
                    (_, Some(false)) => a,
                    _ if a == b => a,
                    _ => a.or(b),
                }
            }
            ExprKind::Implies(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_bool(), b.as_bool()) {
                    (Some(false), _) | (_, Some(true)) => Expr::bool(true),
                    (Some(true), _) => b,
                    (_, Some(false)) => (!a).simplify(),
                    _ if a == b => Expr::bool(true),
                    _ => a.implies(b),
                }
            }
            ExprKind::Iff(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_bool(), b.as_bool()) {
                    (Some(x), Some(y)) => Expr::bool(x == y),
                    (Some(true), _) => b,
                    (_, Some(true)) => a,
                    (Some(false), _) => (!b).simplify(),
                    (_, Some(false)) => (!a).simplify(),
                    _ if a == b => Expr::bool(true),
                    _ => a.iff(b),
                }
            }
            ExprKind::Ite(c, a, b) => {
                let (c, a, b) = (c.simplify(), a.simplify(), b.simplify());
                match c.as_bool() {
                    Some(true) => a,
                    Some(false) => b,
                    None if a == b => a,
                    None => c.ite(a, b),
                }
            }
            ExprKind::Rel(op, a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                if let (Some(x), Some(y)) = (a.as_bool(), b.as_bool()) {
                    if matches!(op, RelOp::Eq | RelOp::Ne) {
                        return Expr::bool(op.holds(x, y));
                    }
                }
                let ordering = !matches!(op, RelOp::Eq | RelOp::Ne);
                if ordering || is_arithmetic(&a) || is_arithmetic(&b) {
                    if let Some(res) = normalize_relation(*op, &a, &b) {
                        return res;
                    }
                }
                Expr::rel(*op, a, b)
            }
            ExprKind::Add(..) | ExprKind::Sub(..) | ExprKind::Mul(..) | ExprKind::Neg(_) => {
                match Linear::of(self) {
                    Some(lin) if lin.coeffs.is_empty() => Expr::int(lin.constant),
                    _ => self.simplify_children(),
                }
            }
        }
    }

    fn simplify_children(&self) -> Expr {
        let kind = match self.kind() {
            ExprKind::Add(a, b) => ExprKind::Add(a.simplify(), b.simplify()),
            ExprKind::Sub(a, b) => ExprKind::Sub(a.simplify(), b.simplify()),
            ExprKind::Mul(a, b) => ExprKind::Mul(a.simplify(), b.simplify()),
            ExprKind::Neg(a) => ExprKind::Neg(a.simplify()),
            _ => return self.clone(),
        };
        Expr::new(kind)
    }
}

// ============================================================================
// Display
// ============================================================================

impl Expr {
    fn precedence(&self) -> u8 {
        match self.kind() {
            ExprKind::Ite(..) => 0,
            ExprKind::Iff(..) => 1,
            ExprKind::Implies(..) => 2,
            ExprKind::Or(..) => 3,
            ExprKind::And(..) => 4,
            ExprKind::Not(_) => 5,
            ExprKind::Rel(..) => 6,
            ExprKind::Add(..) | ExprKind::Sub(..) => 7,
            ExprKind::Mul(..) => 8,
            ExprKind::Neg(_) => 9,
            ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Var(_) => 10,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let prec = self.precedence();
        if prec < min {
            write!(f, "(")?;
        }
        match self.kind() {
            ExprKind::Bool(b) => write!(f, "{}", b)?,
            ExprKind::Int(i) => write!(f, "{}", i)?,
            ExprKind::Var(name) => write!(f, "{}", name)?,
            ExprKind::Not(a) => {
                write!(f, "!")?;
                a.fmt_prec(f, prec + 1)?;
            }
            ExprKind::Neg(a) => {
                write!(f, "-")?;
                a.fmt_prec(f, prec + 1)?;
            }
            ExprKind::And(a, b) => self.fmt_binary(f, a, "&", b, true)?,
            ExprKind::Or(a, b) => self.fmt_binary(f, a, "|", b, true)?,
            ExprKind::Implies(a, b) => self.fmt_binary(f, a, "=>", b, false)?,
            ExprKind::Iff(a, b) => self.fmt_binary(f, a, "<=>", b, false)?,
            ExprKind::Rel(op, a, b) => self.fmt_binary(f, a, op.symbol(), b, false)?,
            ExprKind::Add(a, b) => self.fmt_binary(f, a, "+", b, true)?,
            ExprKind::Sub(a, b) => self.fmt_binary(f, a, "-", b, true)?,
            ExprKind::Mul(a, b) => self.fmt_binary(f, a, "*", b, true)?,
            ExprKind::Ite(c, a, b) => {
                c.fmt_prec(f, 1)?;
                write!(f, " ? ")?;
                a.fmt_prec(f, 1)?;
                write!(f, " : ")?;
                b.fmt_prec(f, 1)?;
            }
        }
        if prec < min {
            write!(f, ")")?;
        }
        Ok(())
    }

    fn fmt_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        lhs: &Expr,
        symbol: &str,
        rhs: &Expr,
        left_assoc: bool,
    ) -> fmt::Result {
        let prec = self.precedence();
        lhs.fmt_prec(f, if left_assoc { prec } else { prec + 1 })?;
        write!(f, " {} ", symbol)?;
        rhs.fmt_prec(f, prec + 1)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self)
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// The bounded domain of a program variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Domain {
    Bool,
    /// Integers in `lo..=hi`.
    Int { lo: i64, hi: i64 },
}

impl Domain {
    /// Number of values in the domain.
    pub fn size(&self) -> u128 {
        match *self {
            Domain::Bool => 2,
            Domain::Int { lo, hi } => {
                if hi < lo {
                    0
                } else {
                    (hi as i128 - lo as i128 + 1) as u128
                }
            }
        }
    }

    pub fn contains(&self, value: Value) -> bool {
        match (*self, value) {
            (Domain::Bool, Value::Bool(_)) => true,
            (Domain::Int { lo, hi }, Value::Int(v)) => lo <= v && v <= hi,
            _ => false,
        }
    }

    fn first(&self) -> Value {
        match *self {
            Domain::Bool => Value::Bool(false),
            Domain::Int { lo, .. } => Value::Int(lo),
        }
    }

    fn next(&self, value: Value) -> Option<Value> {
        match (*self, value) {
            (Domain::Bool, Value::Bool(false)) => Some(Value::Bool(true)),
            (Domain::Int { hi, .. }, Value::Int(v)) if v < hi => Some(Value::Int(v + 1)),
            _ => None,
        }
    }
}

/// Variable declarations of a program.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    domains: BTreeMap<String, Domain>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_bool(&mut self, name: impl Into<String>) -> &mut Self {
        self.domains.insert(name.into(), Domain::Bool);
        self
    }

    pub fn declare_int(&mut self, name: impl Into<String>, lo: i64, hi: i64) -> &mut Self {
        self.domains.insert(name.into(), Domain::Int { lo, hi });
        self
    }

    pub fn domain(&self, name: &str) -> Option<Domain> {
        self.domains.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Domain)> + '_ {
        self.domains.iter().map(|(name, &d)| (name.as_str(), d))
    }

    /// Number of valuations of all declared variables, saturating.
    pub fn space_size(&self) -> u128 {
        self.domains
            .values()
            .fold(1u128, |acc, d| acc.saturating_mul(d.size()))
    }
}

/// Enumerates all valuations of a list of variables, last variable fastest.
#[derive(Debug, Clone)]
pub struct Valuations {
    vars: Vec<(String, Domain)>,
    current: Option<Vec<Value>>,
}

impl Valuations {
    pub fn new(vars: Vec<(String, Domain)>) -> Self {
        let current = if vars.iter().any(|(_, d)| d.size() == 0) {
            None
        } else {
            Some(vars.iter().map(|(_, d)| d.first()).collect())
        };
        Self { vars, current }
    }
}

impl Iterator for Valuations {
    type Item = Valuation;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.as_mut()?;
        let res = self
            .vars
            .iter()
            .zip(current.iter())
            .map(|((name, _), &v)| (name.clone(), v))
            .collect();

        // Advance the odometer.
        let mut pos = self.vars.len();
        loop {
            if pos == 0 {
                self.current = None;
                break;
            }
            pos -= 1;
            let domain = self.vars[pos].1;
            match domain.next(current[pos]) {
                Some(v) => {
                    current[pos] = v;
                    break;
                }
                None => current[pos] = domain.first(),
            }
        }

        Some(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var("x")
    }

    fn y() -> Expr {
        Expr::var("y")
    }

    #[test]
    fn test_display() {
        let e = x().ge(1).and(y().equals(0)).or(!Expr::var("b"));
        assert_eq!(e.to_string(), "x >= 1 & y = 0 | !b");
        let e = (x() + 1) * 2;
        assert_eq!(e.to_string(), "(x + 1) * 2");
        let e = x() - (y() - 1);
        assert_eq!(e.to_string(), "x - (y - 1)");
    }

    #[test]
    fn test_weakest_precondition_normalization() {
        let pred = x().ge(1);
        let update = Assignment::from([("x".to_string(), x() - 1)]);
        let wp = pred.substitute(&update).simplify();
        assert_eq!(wp, x().ge(2));
        assert_eq!(wp.to_string(), "x >= 2");
    }

    #[test]
    fn test_relation_normalization() {
        assert_eq!(x().gt(1).simplify(), x().ge(2));
        assert_eq!(Expr::int(3).le(x()).simplify(), x().ge(3));
        assert_eq!((-x()).ge(-4).simplify(), x().le(4));
        assert_eq!((x() * 2).ge(3).simplify(), x().ge(2));
        assert_eq!((x() * 2).equals(3).simplify(), Expr::bool(false));
        assert_eq!((x() + y()).lt(y() + 5).simplify(), x().le(4));
        assert_eq!(Expr::int(1).lt(2).simplify(), Expr::bool(true));
        assert_eq!(x().equals(y()).simplify(), x().equals(y()));
    }

    #[test]
    fn test_boolean_identities() {
        let b = Expr::var("b");
        assert_eq!(b.clone().and(true).simplify(), b);
        assert_eq!(b.clone().or(true).simplify(), Expr::bool(true));
        assert_eq!((!!b.clone()).simplify(), b);
        assert_eq!((!x().ge(2)).simplify(), x().le(1));
        assert_eq!(Expr::bool(false).implies(b.clone()).simplify(), Expr::bool(true));
    }

    #[test]
    fn test_evaluate() {
        let valuation = Valuation::from([
            ("x".to_string(), Value::Int(3)),
            ("b".to_string(), Value::Bool(true)),
        ]);
        let e = (x() * 2 - 1).equals(5).and(Expr::var("b"));
        assert_eq!(e.evaluate(&valuation), Ok(Value::Bool(true)));
        assert_eq!(
            y().ge(0).evaluate(&valuation),
            Err(EvalError::UnboundVariable("y".to_string()))
        );
        assert!(matches!(
            Expr::var("b").ge(0).evaluate(&valuation),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_variables() {
        let e = x().ge(1).and(y().equals(Expr::var("z") + x()));
        let vars: Vec<_> = e.variables().into_iter().collect();
        assert_eq!(vars, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_valuations() {
        let all: Vec<_> = Valuations::new(vec![
            ("b".to_string(), Domain::Bool),
            ("x".to_string(), Domain::Int { lo: 0, hi: 2 }),
        ])
        .collect();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0]["b"], Value::Bool(false));
        assert_eq!(all[1]["x"], Value::Int(1));
        assert_eq!(all[5]["b"], Value::Bool(true));
        assert_eq!(Valuations::new(vec![]).count(), 1);
    }
}
