//! Explicit truth-table backend.
//!
//! Every function is stored as a table of values over its support, with the
//! support reduced to the variables the function actually depends on. Reduced
//! tables are canonical, so structural equality is semantic equality.
//!
//! Table size is exponential in the support, so this backend is only suitable
//! for small games, and for cross-checking [`BddManager`][crate::bdd::BddManager].

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

use num_bigint::BigUint;
use num_traits::One;

use crate::dd::{AddOp, DdManager};
use crate::types::{Var, VarSet};

/// Largest support a single table may have.
pub const MAX_TABLE_VARIABLES: usize = 24;

/// A function over a sorted list of variables.
///
/// The value of the assignment `(b0, .., bk)` of `vars` is stored at the index
/// whose binary expansion is `b0 .. bk`, with the first variable as the most
/// significant bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruthTable<T> {
    vars: Rc<[Var]>,
    values: Rc<[T]>,
}

pub type ExplicitBdd = TruthTable<bool>;
pub type ExplicitAdd = TruthTable<f64>;

/// Bit of `index` for the variable at `pos` in a list of `width` variables.
fn bit(index: usize, pos: usize, width: usize) -> bool {
    (index >> (width - 1 - pos)) & 1 == 1
}

/// Index over a sub-list of variables, given their positions in the wider list.
fn sub_index(index: usize, width: usize, positions: &[usize]) -> usize {
    let mut res = 0;
    for &pos in positions {
        res = (res << 1) | (bit(index, pos, width) as usize);
    }
    res
}

/// Positions of `sub` inside the sorted `full`.
fn positions(sub: &[Var], full: &[Var]) -> Vec<usize> {
    sub.iter()
        .map(|v| {
            full.binary_search(v)
                .unwrap_or_else(|_| panic!("Variable {} is not in the table domain", v))
        })
        .collect()
}

fn merge(a: &[Var], b: &[Var]) -> Vec<Var> {
    let set: VarSet = a.iter().chain(b).copied().collect();
    set.as_slice().to_vec()
}

fn table_len(width: usize) -> usize {
    assert!(
        width <= MAX_TABLE_VARIABLES,
        "Explicit tables are limited to {} variables, got {}",
        MAX_TABLE_VARIABLES,
        width
    );
    1 << width
}

impl<T: Copy + PartialEq> TruthTable<T> {
    pub fn constant(value: T) -> Self {
        Self {
            vars: Rc::from(Vec::new()),
            values: Rc::from(vec![value]),
        }
    }

    /// Builds a table over `vars` (sorted) and drops the variables it does not depend on.
    fn build(vars: Vec<Var>, f: impl FnMut(usize) -> T) -> Self {
        let values: Vec<T> = (0..table_len(vars.len())).map(f).collect();
        Self::reduced(vars, values)
    }

    fn reduced(mut vars: Vec<Var>, mut values: Vec<T>) -> Self {
        let mut pos = vars.len();
        while pos > 0 {
            pos -= 1;
            let width = vars.len();
            let mask = 1 << (width - 1 - pos);
            let independent = (0..values.len())
                .filter(|idx| idx & mask == 0)
                .all(|idx| values[idx] == values[idx | mask]);
            if independent {
                values = (0..values.len())
                    .filter(|idx| idx & mask == 0)
                    .map(|idx| values[idx])
                    .collect();
                vars.remove(pos);
            }
        }
        Self {
            vars: Rc::from(vars),
            values: Rc::from(values),
        }
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    /// The single value of a constant table.
    pub fn as_constant(&self) -> Option<T> {
        if self.vars.is_empty() {
            Some(self.values[0])
        } else {
            None
        }
    }

    /// Value at the assignment `index` over `domain`, which must contain the support.
    fn value_in(&self, domain_width: usize, own_positions: &[usize], index: usize) -> T {
        self.values[sub_index(index, domain_width, own_positions)]
    }

    fn map<U: Copy + PartialEq>(&self, f: impl Fn(T) -> U) -> TruthTable<U> {
        TruthTable::reduced(self.vars.to_vec(), self.values.iter().map(|&v| f(v)).collect())
    }

    fn combine<U: Copy + PartialEq, R: Copy + PartialEq>(
        &self,
        other: &TruthTable<U>,
        op: impl Fn(T, U) -> R,
    ) -> TruthTable<R> {
        let domain = merge(&self.vars, &other.vars);
        let width = domain.len();
        let pos_a = positions(&self.vars, &domain);
        let pos_b = positions(&other.vars, &domain);
        TruthTable::build(domain, |idx| {
            op(
                self.value_in(width, &pos_a, idx),
                other.value_in(width, &pos_b, idx),
            )
        })
    }

    /// Folds away `removed`, combining the values of each group with `fold`.
    fn project(&self, removed: &VarSet, fold: impl Fn(T, T) -> T) -> Self {
        let keep: Vec<Var> = self.vars.iter().copied().filter(|&v| !removed.contains(v)).collect();
        let width = self.vars.len();
        let keep_pos = positions(&keep, &self.vars);
        let mut acc: Vec<Option<T>> = vec![None; table_len(keep.len())];
        for (idx, &value) in self.values.iter().enumerate() {
            let key = sub_index(idx, width, &keep_pos);
            acc[key] = Some(match acc[key] {
                Some(prev) => fold(prev, value),
                None => value,
            });
        }
        let values = acc.into_iter().flatten().collect();
        Self::reduced(keep, values)
    }

    fn rename(&self, perm: &HashMap<Var, Var>) -> Self {
        let renamed: Vec<Var> = self
            .vars
            .iter()
            .map(|v| perm.get(v).copied().unwrap_or(*v))
            .collect();
        let domain = merge(&renamed, &[]);
        let width = domain.len();
        let old_pos = positions(&renamed, &domain);
        Self::build(domain, |idx| self.values[sub_index(idx, width, &old_pos)])
    }

    /// Picks one index per assignment of the variables outside `vars`.
    ///
    /// Indices are visited in increasing order, which is the lexicographic
    /// order of the abstracted assignment; `better(candidate, incumbent)`
    /// decides whether a later index replaces an earlier one.
    fn choose(&self, vars: &VarSet, better: impl Fn(T, Option<T>) -> bool) -> TruthTable<bool> {
        let domain = merge(&self.vars, vars.as_slice());
        let width = domain.len();
        let keep: Vec<Var> = domain.iter().copied().filter(|&v| !vars.contains(v)).collect();
        let keep_pos = positions(&keep, &domain);
        let own_pos = positions(&self.vars, &domain);

        let mut best: Vec<Option<(T, usize)>> = vec![None; table_len(keep.len())];
        for idx in 0..table_len(width) {
            let value = self.value_in(width, &own_pos, idx);
            let key = sub_index(idx, width, &keep_pos);
            if better(value, best[key].map(|(v, _)| v)) {
                best[key] = Some((value, idx));
            }
        }

        TruthTable::build(domain, |idx| {
            let key = sub_index(idx, width, &keep_pos);
            matches!(best[key], Some((_, chosen)) if chosen == idx)
        })
    }
}

fn permutation(pairs: &[(Var, Var)]) -> HashMap<Var, Var> {
    let mut perm = HashMap::new();
    for &(a, b) in pairs {
        perm.insert(a, b);
        perm.insert(b, a);
    }
    perm
}

#[derive(Debug, Default)]
pub struct ExplicitManager {
    num_vars: Cell<u32>,
}

impl ExplicitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(n: usize) -> Self {
        let manager = Self::new();
        for _ in 0..n {
            manager.new_variable();
        }
        manager
    }

    fn assert_support_covered(&self, f: &ExplicitBdd, vars: &VarSet) {
        assert!(
            f.vars().iter().all(|&v| vars.contains(v)),
            "Support {:?} is not covered by {}",
            f.vars(),
            vars
        );
    }
}

impl DdManager for ExplicitManager {
    type Bdd = ExplicitBdd;
    type Add = ExplicitAdd;

    fn new_variable(&self) -> Var {
        let id = self.num_vars.get();
        self.num_vars.set(id + 1);
        Var::new(id)
    }

    fn num_variables(&self) -> usize {
        self.num_vars.get() as usize
    }

    fn zero(&self) -> ExplicitBdd {
        TruthTable::constant(false)
    }

    fn one(&self) -> ExplicitBdd {
        TruthTable::constant(true)
    }

    fn is_zero(&self, f: &ExplicitBdd) -> bool {
        f.as_constant() == Some(false)
    }

    fn is_one(&self, f: &ExplicitBdd) -> bool {
        f.as_constant() == Some(true)
    }

    fn mk_var(&self, var: Var) -> ExplicitBdd {
        assert!(
            var.id() < self.num_vars.get(),
            "Variable {} is not allocated",
            var
        );
        TruthTable {
            vars: Rc::from(vec![var]),
            values: Rc::from(vec![false, true]),
        }
    }

    fn apply_not(&self, f: &ExplicitBdd) -> ExplicitBdd {
        f.map(|v| !v)
    }

    fn apply_ite(&self, f: &ExplicitBdd, g: &ExplicitBdd, h: &ExplicitBdd) -> ExplicitBdd {
        let domain = merge(&merge(f.vars(), g.vars()), h.vars());
        let width = domain.len();
        let pf = positions(f.vars(), &domain);
        let pg = positions(g.vars(), &domain);
        let ph = positions(h.vars(), &domain);
        TruthTable::build(domain, |idx| {
            if f.value_in(width, &pf, idx) {
                g.value_in(width, &pg, idx)
            } else {
                h.value_in(width, &ph, idx)
            }
        })
    }

    fn apply_and(&self, f: &ExplicitBdd, g: &ExplicitBdd) -> ExplicitBdd {
        f.combine(g, |a, b| a && b)
    }

    fn apply_or(&self, f: &ExplicitBdd, g: &ExplicitBdd) -> ExplicitBdd {
        f.combine(g, |a, b| a || b)
    }

    fn apply_xor(&self, f: &ExplicitBdd, g: &ExplicitBdd) -> ExplicitBdd {
        f.combine(g, |a, b| a != b)
    }

    fn exists_abstract(&self, f: &ExplicitBdd, vars: &VarSet) -> ExplicitBdd {
        f.project(vars, |a, b| a || b)
    }

    fn exists_representative(&self, f: &ExplicitBdd, vars: &VarSet) -> ExplicitBdd {
        f.choose(vars, |value, incumbent| value && incumbent.is_none())
    }

    fn swap_variables(&self, f: &ExplicitBdd, pairs: &[(Var, Var)]) -> ExplicitBdd {
        f.rename(&permutation(pairs))
    }

    fn support(&self, f: &ExplicitBdd) -> VarSet {
        f.vars().iter().copied().collect()
    }

    fn non_zero_count(&self, f: &ExplicitBdd, vars: &VarSet) -> BigUint {
        self.assert_support_covered(f, vars);
        let ones = f.values.iter().filter(|&&v| v).count();
        BigUint::from(ones) * (BigUint::one() << (vars.len() - f.vars().len()))
    }

    fn minterms(&self, f: &ExplicitBdd, vars: &VarSet) -> Vec<Vec<bool>> {
        self.assert_support_covered(f, vars);
        let width = vars.len();
        let own_pos = positions(f.vars(), vars.as_slice());
        (0..table_len(width))
            .filter(|&idx| f.value_in(width, &own_pos, idx))
            .map(|idx| (0..width).map(|pos| bit(idx, pos, width)).collect())
            .collect()
    }

    fn add_constant(&self, value: f64) -> ExplicitAdd {
        // Normalize -0.0, so that tables compare equal.
        TruthTable::constant(if value == 0.0 { 0.0 } else { value })
    }

    fn to_add(&self, f: &ExplicitBdd) -> ExplicitAdd {
        f.map(|v| if v { 1.0 } else { 0.0 })
    }

    fn add_to_bdd(&self, f: &ExplicitAdd) -> ExplicitBdd {
        f.map(|v| v != 0.0)
    }

    fn add_apply(&self, op: AddOp, f: &ExplicitAdd, g: &ExplicitAdd) -> ExplicitAdd {
        f.combine(g, |a, b| op.eval(a, b))
    }

    fn add_sum_abstract(&self, f: &ExplicitAdd, vars: &VarSet) -> ExplicitAdd {
        let missing = vars.iter().filter(|v| !f.vars().contains(v)).count();
        let factor = 2f64.powi(missing as i32);
        f.project(vars, |a, b| a + b).map(|v| v * factor)
    }

    fn add_max_abstract(&self, f: &ExplicitAdd, vars: &VarSet) -> ExplicitAdd {
        f.project(vars, f64::max)
    }

    fn add_max_abstract_representative(&self, f: &ExplicitAdd, vars: &VarSet) -> ExplicitBdd {
        f.choose(vars, |value, incumbent| match incumbent {
            None => true,
            Some(best) => value > best,
        })
    }

    fn add_swap_variables(&self, f: &ExplicitAdd, pairs: &[(Var, Var)]) -> ExplicitAdd {
        f.rename(&permutation(pairs))
    }

    fn add_max_value(&self, f: &ExplicitAdd) -> f64 {
        f.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    fn add_is_zero(&self, f: &ExplicitAdd) -> bool {
        f.as_constant() == Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn vars(ids: &[u32]) -> VarSet {
        ids.iter().map(|&i| Var::new(i)).collect()
    }

    #[test]
    fn test_tables_are_reduced() {
        let dd = ExplicitManager::with_variables(2);
        let x = dd.mk_var(Var::new(0));
        let y = dd.mk_var(Var::new(1));
        let f = dd.apply_or(&dd.apply_and(&x, &y), &dd.apply_and(&x, &dd.apply_not(&y)));
        assert_eq!(f, x);
        assert_eq!(dd.support(&f), vars(&[0]));
        assert!(dd.is_one(&dd.apply_or(&x, &dd.apply_not(&x))));
    }

    #[test]
    fn test_quantification() {
        let dd = ExplicitManager::with_variables(3);
        let x = dd.mk_var(Var::new(0));
        let y = dd.mk_var(Var::new(1));
        let z = dd.mk_var(Var::new(2));
        let f = dd.apply_and(&x, &dd.apply_or(&y, &z));

        assert_eq!(dd.exists_abstract(&f, &vars(&[1, 2])), x);
        assert_eq!(dd.forall_abstract(&f, &vars(&[1])), dd.apply_and(&x, &z));
        assert_eq!(
            dd.and_exists(&x, &dd.apply_xor(&x, &y), &vars(&[0])),
            dd.apply_not(&y)
        );
    }

    #[test]
    fn test_exists_representative_prefers_false() {
        let dd = ExplicitManager::with_variables(3);
        let x = dd.mk_var(Var::new(0));
        let y = dd.mk_var(Var::new(1));
        let z = dd.mk_var(Var::new(2));
        let f = dd.apply_and(&x, &dd.apply_xor(&y, &z));
        let rep = dd.exists_representative(&f, &vars(&[1, 2]));
        assert_eq!(
            rep,
            dd.cube(&[Var::new(0), Var::new(1), Var::new(2)], &[true, false, true])
        );
    }

    #[test]
    fn test_swap_and_minterms() {
        let dd = ExplicitManager::with_variables(3);
        let x = dd.mk_var(Var::new(0));
        let z = dd.mk_var(Var::new(2));
        let f = dd.apply_and(&x, &dd.apply_not(&z));
        let g = dd.swap_variables(&f, &[(Var::new(0), Var::new(2))]);
        assert_eq!(g, dd.apply_and(&z, &dd.apply_not(&x)));

        assert_eq!(
            dd.minterms(&f, &vars(&[0, 1, 2])),
            vec![vec![true, false, false], vec![true, true, false]]
        );
        assert_eq!(dd.non_zero_count(&f, &vars(&[0, 1, 2])), BigUint::from(2u32));
    }

    #[test]
    fn test_add_max_representative() {
        let dd = ExplicitManager::with_variables(2);
        let a = dd.mk_var(Var::new(1));
        let values = dd.add_ite(&a, &dd.add_constant(0.7), &dd.add_constant(0.2));
        let rep = dd.add_max_abstract_representative(&values, &vars(&[1]));
        assert_eq!(rep, a);
        assert_eq!(dd.add_max_value(&values), 0.7);
        let sum = dd.add_sum_abstract(&values, &vars(&[0, 1]));
        assert!((dd.add_max_value(&sum) - 1.8).abs() < 1e-12);
    }
}
