//! Splitting predicates into the atomic formulas they are built from.

use std::collections::HashSet;

use crate::expr::{Expr, ExprKind};

/// Splits predicates into their atoms.
///
/// An atom is a maximal subformula whose top-level operator is not a Boolean
/// connective: a comparison or a Boolean variable. Constants carry no
/// information and are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct PredicateSplitter;

impl PredicateSplitter {
    pub fn new() -> Self {
        PredicateSplitter
    }

    /// Atoms of `expr` in left-to-right order, without structural duplicates.
    pub fn split(&self, expr: &Expr) -> Vec<Expr> {
        let mut atoms = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![expr];
        while let Some(e) = stack.pop() {
            match e.kind() {
                ExprKind::Bool(_) => {}
                ExprKind::Not(a) => stack.push(a),
                ExprKind::And(a, b)
                | ExprKind::Or(a, b)
                | ExprKind::Implies(a, b)
                | ExprKind::Iff(a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
                ExprKind::Ite(c, a, b) => {
                    stack.push(b);
                    stack.push(a);
                    stack.push(c);
                }
                _ => {
                    if seen.insert(e.clone()) {
                        atoms.push(e.clone());
                    }
                }
            }
        }
        atoms
    }

    /// Atoms of all expressions, in order, without structural duplicates.
    pub fn split_all<'a>(&self, exprs: impl IntoIterator<Item = &'a Expr>) -> Vec<Expr> {
        let mut atoms = Vec::new();
        for expr in exprs {
            for atom in self.split(expr) {
                if !atoms.contains(&atom) {
                    atoms.push(atom);
                }
            }
        }
        atoms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_conjunction() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        let b = Expr::var("b");
        let e = x.clone().ge(1).and(!y.clone().equals(0)).or(b.clone().and(true));
        assert_eq!(
            PredicateSplitter::new().split(&e),
            vec![x.ge(1), y.equals(0), b]
        );
    }

    #[test]
    fn test_split_removes_duplicates() {
        let x = Expr::var("x");
        let e = x.clone().ge(1).implies(x.clone().ge(1).iff(x.clone().le(5)));
        assert_eq!(PredicateSplitter::new().split(&e), vec![x.clone().ge(1), x.le(5)]);
    }

    #[test]
    fn test_split_constant() {
        assert!(PredicateSplitter::new().split(&Expr::bool(true)).is_empty());
    }
}
