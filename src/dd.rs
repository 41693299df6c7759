//! The decision-diagram algebra consumed by the refinement engine.
//!
//! All refinement algorithms are written against [`DdManager`], a manager-centric
//! interface: handles are immutable values, and every operation goes through the
//! manager and returns a fresh handle. Two implementations are provided:
//!
//! - [`BddManager`][crate::bdd::BddManager]: hash-consed decision diagrams with
//!   complement edges (BDDs) and real-valued terminals (ADDs).
//! - [`ExplicitManager`][crate::explicit::ExplicitManager]: truth tables over the
//!   support of each function; exponential, intended for small games and cross-checks.
//!
//! # Representatives
//!
//! [`exists_representative`][DdManager::exists_representative] and
//! [`add_max_abstract_representative`][DdManager::add_max_abstract_representative]
//! pick, for every assignment of the non-abstracted variables, exactly one assignment
//! of the abstracted variables. Among the candidates, the one that sets the earliest
//! variables to `false` wins. Both backends implement this rule, so they pick the
//! same pivot states and choices.

use std::fmt::Debug;

use num_bigint::BigUint;

use crate::types::{Var, VarSet};

/// Binary operations on ADDs, applied pointwise.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AddOp {
    Plus,
    Minus,
    Times,
    Max,
    Min,
    /// `1` where the left operand is strictly greater, `0` elsewhere.
    Greater,
}

impl AddOp {
    pub fn eval(self, a: f64, b: f64) -> f64 {
        match self {
            AddOp::Plus => a + b,
            AddOp::Minus => a - b,
            AddOp::Times => a * b,
            AddOp::Max => a.max(b),
            AddOp::Min => a.min(b),
            AddOp::Greater => {
                if a > b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

pub trait DdManager {
    /// Handle to a Boolean function.
    type Bdd: Clone + Eq + Debug;
    /// Handle to a real-valued function.
    type Add: Clone + Debug;

    // ========================================================================
    // Variables
    // ========================================================================

    /// Allocates a fresh variable at the bottom of the current order.
    fn new_variable(&self) -> Var;

    fn num_variables(&self) -> usize;

    // ========================================================================
    // Boolean functions
    // ========================================================================

    fn zero(&self) -> Self::Bdd;
    fn one(&self) -> Self::Bdd;
    fn is_zero(&self, f: &Self::Bdd) -> bool;
    fn is_one(&self, f: &Self::Bdd) -> bool;

    /// The projection function of an allocated variable.
    fn mk_var(&self, var: Var) -> Self::Bdd;

    fn apply_not(&self, f: &Self::Bdd) -> Self::Bdd;

    /// `ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)`
    fn apply_ite(&self, f: &Self::Bdd, g: &Self::Bdd, h: &Self::Bdd) -> Self::Bdd;

    fn apply_and(&self, f: &Self::Bdd, g: &Self::Bdd) -> Self::Bdd {
        self.apply_ite(f, g, &self.zero())
    }

    fn apply_or(&self, f: &Self::Bdd, g: &Self::Bdd) -> Self::Bdd {
        self.apply_ite(f, &self.one(), g)
    }

    fn apply_xor(&self, f: &Self::Bdd, g: &Self::Bdd) -> Self::Bdd {
        self.apply_ite(f, &self.apply_not(g), g)
    }

    fn apply_imply(&self, f: &Self::Bdd, g: &Self::Bdd) -> Self::Bdd {
        self.apply_ite(f, g, &self.one())
    }

    /// `∃vars. f`
    fn exists_abstract(&self, f: &Self::Bdd, vars: &VarSet) -> Self::Bdd;

    /// `∀vars. f`
    fn forall_abstract(&self, f: &Self::Bdd, vars: &VarSet) -> Self::Bdd {
        self.apply_not(&self.exists_abstract(&self.apply_not(f), vars))
    }

    /// `∃vars. f ∧ g`
    fn and_exists(&self, f: &Self::Bdd, g: &Self::Bdd, vars: &VarSet) -> Self::Bdd {
        self.exists_abstract(&self.apply_and(f, g), vars)
    }

    /// Restricts `f` to a single assignment of `vars` per assignment of the other variables.
    fn exists_representative(&self, f: &Self::Bdd, vars: &VarSet) -> Self::Bdd;

    /// Exchanges the variables of every pair.
    fn swap_variables(&self, f: &Self::Bdd, pairs: &[(Var, Var)]) -> Self::Bdd;

    /// The set of variables `f` depends on.
    fn support(&self, f: &Self::Bdd) -> VarSet;

    /// Number of satisfying assignments over `vars`, which must cover the support of `f`.
    fn non_zero_count(&self, f: &Self::Bdd, vars: &VarSet) -> BigUint;

    /// All satisfying assignments over `vars` (which must cover the support of `f`),
    /// in lexicographic order with `false < true`.
    fn minterms(&self, f: &Self::Bdd, vars: &VarSet) -> Vec<Vec<bool>>;

    // ========================================================================
    // Real-valued functions
    // ========================================================================

    fn add_constant(&self, value: f64) -> Self::Add;

    /// Lifts a Boolean function to the `0/1`-valued ADD.
    fn to_add(&self, f: &Self::Bdd) -> Self::Add;

    /// The support of the non-zero values.
    fn add_to_bdd(&self, f: &Self::Add) -> Self::Bdd;

    fn add_apply(&self, op: AddOp, f: &Self::Add, g: &Self::Add) -> Self::Add;

    fn add_ite(&self, cond: &Self::Bdd, f: &Self::Add, g: &Self::Add) -> Self::Add {
        let c = self.to_add(cond);
        let not_c = self.to_add(&self.apply_not(cond));
        let then_part = self.add_apply(AddOp::Times, &c, f);
        let else_part = self.add_apply(AddOp::Times, &not_c, g);
        self.add_apply(AddOp::Plus, &then_part, &else_part)
    }

    fn add_greater(&self, f: &Self::Add, g: &Self::Add) -> Self::Bdd {
        self.add_to_bdd(&self.add_apply(AddOp::Greater, f, g))
    }

    fn add_sum_abstract(&self, f: &Self::Add, vars: &VarSet) -> Self::Add;

    fn add_max_abstract(&self, f: &Self::Add, vars: &VarSet) -> Self::Add;

    /// For every assignment of the other variables, the assignment of `vars` achieving
    /// the maximal value of `f`.
    fn add_max_abstract_representative(&self, f: &Self::Add, vars: &VarSet) -> Self::Bdd;

    fn add_swap_variables(&self, f: &Self::Add, pairs: &[(Var, Var)]) -> Self::Add;

    /// The largest value `f` takes.
    fn add_max_value(&self, f: &Self::Add) -> f64;

    fn add_is_zero(&self, f: &Self::Add) -> bool;

    // ========================================================================
    // Provided operations
    // ========================================================================

    /// The conjunction of literals `vars[i] = values[i]`.
    fn cube(&self, vars: &[Var], values: &[bool]) -> Self::Bdd {
        assert_eq!(vars.len(), values.len(), "Cube arity mismatch");
        let mut res = self.one();
        for (&var, &value) in vars.iter().zip(values) {
            let lit = self.mk_var(var);
            let lit = if value { lit } else { self.apply_not(&lit) };
            res = self.apply_and(&res, &lit);
        }
        res
    }

    fn apply_and_many<'a>(&self, nodes: impl IntoIterator<Item = &'a Self::Bdd>) -> Self::Bdd
    where
        Self::Bdd: 'a,
    {
        let mut res = self.one();
        for node in nodes {
            res = self.apply_and(&res, node);
        }
        res
    }

    /// Successors of `states` (over row variables) along `relation` (over row and
    /// column variables), expressed over row variables again.
    ///
    /// Row and column variables are paired positionally.
    fn relational_product(
        &self,
        states: &Self::Bdd,
        relation: &Self::Bdd,
        row_vars: &VarSet,
        col_vars: &VarSet,
    ) -> Self::Bdd {
        let image = self.and_exists(states, relation, row_vars);
        self.swap_variables(&image, &variable_pairs(row_vars, col_vars))
    }

    /// Predecessors of `states` (over row variables) along `relation`.
    fn inverse_relational_product(
        &self,
        states: &Self::Bdd,
        relation: &Self::Bdd,
        row_vars: &VarSet,
        col_vars: &VarSet,
    ) -> Self::Bdd {
        let targets = self.swap_variables(states, &variable_pairs(row_vars, col_vars));
        self.and_exists(&targets, relation, col_vars)
    }

    /// All states reachable from `initial` along `relation` (least fixpoint).
    fn reachable_states(
        &self,
        initial: &Self::Bdd,
        relation: &Self::Bdd,
        row_vars: &VarSet,
        col_vars: &VarSet,
    ) -> Self::Bdd {
        let mut reached = initial.clone();
        let mut frontier = initial.clone();
        while !self.is_zero(&frontier) {
            let image = self.relational_product(&frontier, relation, row_vars, col_vars);
            frontier = self.apply_and(&image, &self.apply_not(&reached));
            reached = self.apply_or(&reached, &frontier);
        }
        reached
    }
}

/// Pairs row and column variables positionally.
///
/// # Panics
///
/// Panics if the sets have different sizes.
pub fn variable_pairs(row_vars: &VarSet, col_vars: &VarSet) -> Vec<(Var, Var)> {
    assert_eq!(
        row_vars.len(),
        col_vars.len(),
        "Row and column variables must be order-isomorphic"
    );
    row_vars.iter().zip(col_vars.iter()).collect()
}
