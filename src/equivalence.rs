use log::trace;

use crate::error::EquivalenceError;
use crate::expr::{Declarations, Expr, Valuations};

/// Decides logical equivalence of two predicates.
pub trait EquivalenceChecker {
    fn are_equivalent(&self, a: &Expr, b: &Expr) -> Result<bool, EquivalenceError>;
}

impl<T: EquivalenceChecker + ?Sized> EquivalenceChecker for &T {
    fn are_equivalent(&self, a: &Expr, b: &Expr) -> Result<bool, EquivalenceError> {
        (**self).are_equivalent(a, b)
    }
}

/// Checks `a <=> b` by enumerating all valuations of the variables occurring in either side.
#[derive(Debug, Clone)]
pub struct EnumerativeEquivalenceChecker {
    declarations: Declarations,
    limit: u128,
}

impl EnumerativeEquivalenceChecker {
    pub const DEFAULT_LIMIT: u128 = 1 << 20;

    pub fn new(declarations: Declarations) -> Self {
        Self {
            declarations,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Sets the largest number of valuations a single check may enumerate.
    pub fn with_limit(mut self, limit: u128) -> Self {
        self.limit = limit;
        self
    }
}

impl EquivalenceChecker for EnumerativeEquivalenceChecker {
    fn are_equivalent(&self, a: &Expr, b: &Expr) -> Result<bool, EquivalenceError> {
        if a == b {
            return Ok(true);
        }

        let mut names = a.variables();
        names.extend(b.variables());
        let vars = names
            .into_iter()
            .map(|name| match self.declarations.domain(&name) {
                Some(domain) => Ok((name, domain)),
                None => Err(EquivalenceError::UndeclaredVariable(name)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = vars
            .iter()
            .fold(1u128, |acc, (_, d)| acc.saturating_mul(d.size()));
        if count > self.limit {
            return Err(EquivalenceError::TooManyAssignments {
                count,
                limit: self.limit,
            });
        }

        for valuation in Valuations::new(vars) {
            if a.evaluate_bool(&valuation)? != b.evaluate_bool(&valuation)? {
                trace!("{} and {} differ at {:?}", a, b, valuation);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> EnumerativeEquivalenceChecker {
        let mut decls = Declarations::new();
        decls.declare_int("x", 0, 5).declare_bool("b");
        EnumerativeEquivalenceChecker::new(decls)
    }

    #[test]
    fn test_equivalent_forms() {
        let x = Expr::var("x");
        let checker = checker();
        assert_eq!(checker.are_equivalent(&x.clone().gt(1), &x.clone().ge(2)), Ok(true));
        assert_eq!(checker.are_equivalent(&x.clone().ge(1), &x.clone().ge(2)), Ok(false));
        // Equivalent only because of the bounded domain.
        assert_eq!(checker.are_equivalent(&x.clone().le(5), &Expr::bool(true)), Ok(true));
    }

    #[test]
    fn test_undeclared_variable() {
        let res = checker().are_equivalent(&Expr::var("y").ge(0), &Expr::bool(true));
        assert_eq!(res, Err(EquivalenceError::UndeclaredVariable("y".to_string())));
    }

    #[test]
    fn test_limit() {
        let x = Expr::var("x");
        let res = checker()
            .with_limit(3)
            .are_equivalent(&x.clone().ge(1), &x.le(0));
        assert!(matches!(res, Err(EquivalenceError::TooManyAssignments { count: 6, .. })));
    }
}
