//! Hash-consed decision diagrams: BDDs with complement edges and ADDs with real terminals.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use log::debug;
use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::cache::{Cache, OpKey};
use crate::dd::{AddOp, DdManager};
use crate::node::{AddNode, BddNode};
use crate::reference::{AddRef, Ref};
use crate::types::{Var, VarSet};

/// Variable of the terminal node. Sorts below every real variable.
const TERMINAL_VAR: Var = Var::new(u32::MAX);

pub struct BddManager {
    nodes: RefCell<Vec<BddNode>>,
    unique: RefCell<HashMap<BddNode, u32>>,
    add_nodes: RefCell<Vec<AddNode>>,
    add_unique: RefCell<HashMap<AddNode, AddRef>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    add_cache: RefCell<Cache<OpKey, AddRef>>,
    num_vars: Cell<u32>,
}

impl BddManager {
    pub fn new() -> Self {
        // Node 0 is the terminal `1`.
        let terminal = BddNode {
            variable: TERMINAL_VAR,
            low: Ref::ONE,
            high: Ref::ONE,
        };
        Self {
            nodes: RefCell::new(vec![terminal]),
            unique: RefCell::new(HashMap::new()),
            add_nodes: RefCell::new(Vec::new()),
            add_unique: RefCell::new(HashMap::new()),
            cache: RefCell::new(Cache::new()),
            add_cache: RefCell::new(Cache::new()),
            num_vars: Cell::new(0),
        }
    }

    /// Creates a manager with `n` pre-allocated variables.
    pub fn with_variables(n: usize) -> Self {
        let manager = Self::new();
        for _ in 0..n {
            manager.new_variable();
        }
        manager
    }
}

impl Default for BddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BddManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BddManager")
            .field("variables", &self.num_vars.get())
            .field("bdd_nodes", &self.nodes.borrow().len())
            .field("add_nodes", &self.add_nodes.borrow().len())
            .field("cache_hits", &self.cache.borrow().hits())
            .field("cache_misses", &self.cache.borrow().misses())
            .finish()
    }
}

// ============================================================================
// BDD nodes
// ============================================================================

impl BddManager {
    /// Total number of allocated BDD nodes, including the terminal.
    pub fn size(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Number of distinct nodes reachable from `f`, including the terminal.
    pub fn node_count(&self, f: Ref) -> usize {
        let mut visited = HashSet::new();
        let mut stack = vec![f.regular()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.index()) || node.is_terminal() {
                continue;
            }
            let n = self.nodes.borrow()[node.index()];
            stack.push(n.low.regular());
            stack.push(n.high.regular());
        }
        visited.len()
    }

    pub fn variable(&self, node: Ref) -> Var {
        self.nodes.borrow()[node.index()].variable
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.nodes.borrow()[node.index()].low;
        if node.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.nodes.borrow()[node.index()].high;
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    /// Cofactors of `node` with respect to `v`, which must not be below the top variable of `node`.
    pub fn top_cofactors(&self, node: Ref, v: Var) -> (Ref, Ref) {
        if node.is_terminal() || v < self.variable(node) {
            return (node, node);
        }
        assert_eq!(v, self.variable(node), "Cofactor variable below the top variable");
        (self.low_node(node), self.high_node(node))
    }

    pub fn mk_node(&self, variable: Var, low: Ref, high: Ref) -> Ref {
        if low == high {
            return low;
        }
        if high.is_negated() {
            return -self.mk_node(variable, -low, -high);
        }

        let node = BddNode { variable, low, high };
        if let Some(&index) = self.unique.borrow().get(&node) {
            return Ref::positive(index);
        }

        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len() as u32;
        assert!(index < (1 << 31), "BDD node storage exhausted");
        nodes.push(node);
        self.unique.borrow_mut().insert(node, index);
        Ref::positive(index)
    }

    fn literal(&self, var: Var) -> Ref {
        self.mk_node(var, Ref::ZERO, Ref::ONE)
    }

    /// The cube setting every variable of `vars` to `false`.
    fn negative_cube(&self, vars: &[Var]) -> Ref {
        let mut res = Ref::ONE;
        for &var in vars.iter().rev() {
            res = self.mk_node(var, res, Ref::ZERO);
        }
        res
    }

    fn ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Terminal cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if f == Ref::ONE {
            return g;
        }
        if f == Ref::ZERO {
            return h;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,G,~F) => ite(F,G,1)
        let g = if g == f {
            Ref::ONE
        } else if g == -f {
            Ref::ZERO
        } else {
            g
        };
        let h = if h == f {
            Ref::ZERO
        } else if h == -f {
            Ref::ONE
        } else {
            h
        };

        if g == h {
            return g;
        }
        if g == Ref::ONE && h == Ref::ZERO {
            return f;
        }
        if g == Ref::ZERO && h == Ref::ONE {
            return -f;
        }

        // Canonical form: F and G regular.
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        let (g, h, negate) = if g.is_negated() {
            (-g, -h, true)
        } else {
            (g, h, false)
        };

        let key = OpKey::Ite(f, g, h);
        let cached = self.cache.borrow_mut().get(&key);
        let res = match cached {
            Some(res) => res,
            None => {
                let m = self
                    .variable(f)
                    .min(self.variable(g))
                    .min(self.variable(h));
                let (f0, f1) = self.top_cofactors(f, m);
                let (g0, g1) = self.top_cofactors(g, m);
                let (h0, h1) = self.top_cofactors(h, m);
                let e = self.ite(f0, g0, h0);
                let t = self.ite(f1, g1, h1);
                let res = self.mk_node(m, e, t);
                self.cache.borrow_mut().insert(key, res);
                res
            }
        };

        if negate {
            -res
        } else {
            res
        }
    }

    fn and(&self, f: Ref, g: Ref) -> Ref {
        self.ite(f, g, Ref::ZERO)
    }

    fn or(&self, f: Ref, g: Ref) -> Ref {
        self.ite(f, Ref::ONE, g)
    }
}

// ============================================================================
// Quantification
// ============================================================================

impl BddManager {
    fn exists_(&self, f: Ref, vars: &[Var], cache: &mut HashMap<(Ref, usize), Ref>) -> Ref {
        if f.is_terminal() {
            return f;
        }
        let v = self.variable(f);
        let vars = &vars[vars.partition_point(|&w| w < v)..];
        if vars.is_empty() {
            return f;
        }

        let key = (f, vars.len());
        if let Some(&res) = cache.get(&key) {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, v);
        let res = if vars[0] == v {
            let lo = self.exists_(f0, &vars[1..], cache);
            if lo == Ref::ONE {
                Ref::ONE
            } else {
                let hi = self.exists_(f1, &vars[1..], cache);
                self.or(lo, hi)
            }
        } else {
            let lo = self.exists_(f0, vars, cache);
            let hi = self.exists_(f1, vars, cache);
            self.mk_node(v, lo, hi)
        };

        cache.insert(key, res);
        res
    }

    fn and_exists_(
        &self,
        f: Ref,
        g: Ref,
        vars: &[Var],
        cache: &mut HashMap<(Ref, Ref, usize), Ref>,
        exists_cache: &mut HashMap<(Ref, usize), Ref>,
    ) -> Ref {
        if f == Ref::ZERO || g == Ref::ZERO || f == -g {
            return Ref::ZERO;
        }
        if f == Ref::ONE {
            return self.exists_(g, vars, exists_cache);
        }
        if g == Ref::ONE || f == g {
            return self.exists_(f, vars, exists_cache);
        }

        let m = self.variable(f).min(self.variable(g));
        let vars = &vars[vars.partition_point(|&w| w < m)..];
        if vars.is_empty() {
            return self.and(f, g);
        }

        let (f, g) = if f <= g { (f, g) } else { (g, f) };
        let key = (f, g, vars.len());
        if let Some(&res) = cache.get(&key) {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let res = if vars[0] == m {
            let lo = self.and_exists_(f0, g0, &vars[1..], cache, exists_cache);
            if lo == Ref::ONE {
                Ref::ONE
            } else {
                let hi = self.and_exists_(f1, g1, &vars[1..], cache, exists_cache);
                self.or(lo, hi)
            }
        } else {
            let lo = self.and_exists_(f0, g0, vars, cache, exists_cache);
            let hi = self.and_exists_(f1, g1, vars, cache, exists_cache);
            self.mk_node(m, lo, hi)
        };

        cache.insert(key, res);
        res
    }

    fn exists_representative_(
        &self,
        f: Ref,
        vars: &[Var],
        cache: &mut HashMap<(Ref, usize), Ref>,
        exists_cache: &mut HashMap<(Ref, usize), Ref>,
    ) -> Ref {
        if f == Ref::ZERO {
            return Ref::ZERO;
        }
        if vars.is_empty() {
            return f;
        }
        if f == Ref::ONE {
            return self.negative_cube(vars);
        }

        let key = (f, vars.len());
        if let Some(&res) = cache.get(&key) {
            return res;
        }

        let v = self.variable(f);
        let w = vars[0];
        let res = if w < v {
            // `f` does not depend on `w`: fix it to false.
            let rest = self.exists_representative_(f, &vars[1..], cache, exists_cache);
            self.and(-self.literal(w), rest)
        } else if w == v {
            let (f0, f1) = self.top_cofactors(f, v);
            let lo = self.exists_representative_(f0, &vars[1..], cache, exists_cache);
            let hi = self.exists_representative_(f1, &vars[1..], cache, exists_cache);
            // Take the high branch only where the low one has no witness.
            let has_lo = self.exists_(f0, &vars[1..], exists_cache);
            let hi = self.and(-has_lo, hi);
            self.ite(self.literal(w), hi, lo)
        } else {
            let (f0, f1) = self.top_cofactors(f, v);
            let lo = self.exists_representative_(f0, vars, cache, exists_cache);
            let hi = self.exists_representative_(f1, vars, cache, exists_cache);
            self.mk_node(v, lo, hi)
        };

        cache.insert(key, res);
        res
    }

    fn swap_(&self, f: Ref, perm: &HashMap<Var, Var>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if f.is_terminal() {
            return f;
        }
        let node = f.regular();
        let res = match cache.get(&node) {
            Some(&res) => res,
            None => {
                let v = self.variable(node);
                let lo = self.swap_(self.low_node(node), perm, cache);
                let hi = self.swap_(self.high_node(node), perm, cache);
                let target = perm.get(&v).copied().unwrap_or(v);
                let res = self.ite(self.literal(target), hi, lo);
                cache.insert(node, res);
                res
            }
        };
        if f.is_negated() {
            -res
        } else {
            res
        }
    }

    fn sat_count_(&self, f: Ref, full: &BigUint, cache: &mut HashMap<usize, BigUint>) -> BigUint {
        if f == Ref::ZERO {
            return BigUint::zero();
        }
        if f == Ref::ONE {
            return full.clone();
        }
        if f.is_negated() {
            return full - self.sat_count_(-f, full, cache);
        }
        if let Some(res) = cache.get(&f.index()) {
            return res.clone();
        }
        let low = self.sat_count_(self.low_node(f), full, cache);
        let high = self.sat_count_(self.high_node(f), full, cache);
        let res: BigUint = (low + high) >> 1;
        cache.insert(f.index(), res.clone());
        res
    }

    fn assert_support_covered(&self, f: Ref, vars: &VarSet) {
        let support = self.support(&f);
        assert!(
            support.iter().all(|v| vars.contains(v)),
            "Support {} is not covered by {}",
            support,
            vars
        );
    }
}

// ============================================================================
// ADDs
// ============================================================================

impl BddManager {
    /// Total number of allocated ADD nodes.
    pub fn add_size(&self) -> usize {
        self.add_nodes.borrow().len()
    }

    fn mk_add(&self, node: AddNode) -> AddRef {
        if let Some(&res) = self.add_unique.borrow().get(&node) {
            return res;
        }
        let mut nodes = self.add_nodes.borrow_mut();
        let res = AddRef::new(nodes.len() as u32);
        nodes.push(node);
        self.add_unique.borrow_mut().insert(node, res);
        res
    }

    fn add_terminal(&self, value: f64) -> AddRef {
        self.mk_add(AddNode::terminal(value))
    }

    fn mk_add_node(&self, variable: Var, low: AddRef, high: AddRef) -> AddRef {
        if low == high {
            return low;
        }
        self.mk_add(AddNode::Inner { variable, low, high })
    }

    fn add_node(&self, f: AddRef) -> AddNode {
        self.add_nodes.borrow()[f.index()]
    }

    fn add_variable(&self, f: AddRef) -> Var {
        match self.add_node(f) {
            AddNode::Terminal(_) => TERMINAL_VAR,
            AddNode::Inner { variable, .. } => variable,
        }
    }

    fn add_cofactors(&self, f: AddRef, v: Var) -> (AddRef, AddRef) {
        match self.add_node(f) {
            AddNode::Inner { variable, low, high } if variable == v => (low, high),
            _ => (f, f),
        }
    }

    fn to_add_(&self, f: Ref) -> AddRef {
        if f == Ref::ONE {
            return self.add_terminal(1.0);
        }
        if f == Ref::ZERO {
            return self.add_terminal(0.0);
        }
        let key = OpKey::ToAdd(f);
        let cached = self.add_cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            return res;
        }
        let v = self.variable(f);
        let lo = self.to_add_(self.low_node(f));
        let hi = self.to_add_(self.high_node(f));
        let res = self.mk_add_node(v, lo, hi);
        self.add_cache.borrow_mut().insert(key, res);
        res
    }

    fn add_to_bdd_(&self, f: AddRef) -> Ref {
        let (variable, low, high) = match self.add_node(f) {
            AddNode::Terminal(_) => {
                return match self.add_node(f).value() {
                    Some(value) if value != 0.0 => Ref::ONE,
                    _ => Ref::ZERO,
                };
            }
            AddNode::Inner { variable, low, high } => (variable, low, high),
        };
        let key = OpKey::AddToBdd(f);
        let cached = self.cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            return res;
        }
        let lo = self.add_to_bdd_(low);
        let hi = self.add_to_bdd_(high);
        let res = self.mk_node(variable, lo, hi);
        self.cache.borrow_mut().insert(key, res);
        res
    }

    fn add_apply_(&self, op: AddOp, f: AddRef, g: AddRef) -> AddRef {
        if let (Some(a), Some(b)) = (self.add_node(f).value(), self.add_node(g).value()) {
            return self.add_terminal(op.eval(a, b));
        }
        let key = OpKey::AddApply(op as u8, f, g);
        let cached = self.add_cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            return res;
        }
        let m = self.add_variable(f).min(self.add_variable(g));
        let (f0, f1) = self.add_cofactors(f, m);
        let (g0, g1) = self.add_cofactors(g, m);
        let lo = self.add_apply_(op, f0, g0);
        let hi = self.add_apply_(op, f1, g1);
        let res = self.mk_add_node(m, lo, hi);
        self.add_cache.borrow_mut().insert(key, res);
        res
    }

    fn add_ite_(&self, cond: Ref, f: AddRef, g: AddRef) -> AddRef {
        let c = self.to_add_(cond);
        let not_c = self.to_add_(-cond);
        let then_part = self.add_apply_(AddOp::Times, c, f);
        let else_part = self.add_apply_(AddOp::Times, not_c, g);
        self.add_apply_(AddOp::Plus, then_part, else_part)
    }

    /// Sum- or max-abstraction, depending on `op`.
    fn add_abstract_(
        &self,
        f: AddRef,
        vars: &[Var],
        op: AddOp,
        cache: &mut HashMap<(AddRef, usize), AddRef>,
    ) -> AddRef {
        if vars.is_empty() {
            return f;
        }
        if let Some(value) = self.add_node(f).value() {
            return match op {
                AddOp::Plus => self.add_terminal(value * 2f64.powi(vars.len() as i32)),
                _ => f,
            };
        }

        let key = (f, vars.len());
        if let Some(&res) = cache.get(&key) {
            return res;
        }

        let v = self.add_variable(f);
        let w = vars[0];
        let res = if w < v {
            let rest = self.add_abstract_(f, &vars[1..], op, cache);
            match op {
                AddOp::Plus => self.add_apply_(AddOp::Plus, rest, rest),
                _ => rest,
            }
        } else if w == v {
            let (f0, f1) = self.add_cofactors(f, v);
            let lo = self.add_abstract_(f0, &vars[1..], op, cache);
            let hi = self.add_abstract_(f1, &vars[1..], op, cache);
            self.add_apply_(op, lo, hi)
        } else {
            let (f0, f1) = self.add_cofactors(f, v);
            let lo = self.add_abstract_(f0, vars, op, cache);
            let hi = self.add_abstract_(f1, vars, op, cache);
            self.mk_add_node(v, lo, hi)
        };

        cache.insert(key, res);
        res
    }

    fn add_max_representative_(
        &self,
        f: AddRef,
        vars: &[Var],
        cache: &mut HashMap<(AddRef, usize), Ref>,
    ) -> Ref {
        if vars.is_empty() {
            return Ref::ONE;
        }
        if self.add_node(f).value().is_some() {
            return self.negative_cube(vars);
        }

        let key = (f, vars.len());
        if let Some(&res) = cache.get(&key) {
            return res;
        }

        let v = self.add_variable(f);
        let w = vars[0];
        let res = if w < v {
            let rest = self.add_max_representative_(f, &vars[1..], cache);
            self.and(-self.literal(w), rest)
        } else if w == v {
            let (f0, f1) = self.add_cofactors(f, v);
            let lo = self.add_max_representative_(f0, &vars[1..], cache);
            let hi = self.add_max_representative_(f1, &vars[1..], cache);
            let max0 = self.add_abstract_(f0, &vars[1..], AddOp::Max, &mut HashMap::new());
            let max1 = self.add_abstract_(f1, &vars[1..], AddOp::Max, &mut HashMap::new());
            // Ties go to the low branch.
            let choose_hi = self.add_to_bdd_(self.add_apply_(AddOp::Greater, max1, max0));
            let hi = self.and(choose_hi, hi);
            let lo = self.and(-choose_hi, lo);
            self.ite(self.literal(w), hi, lo)
        } else {
            let (f0, f1) = self.add_cofactors(f, v);
            let lo = self.add_max_representative_(f0, vars, cache);
            let hi = self.add_max_representative_(f1, vars, cache);
            self.mk_node(v, lo, hi)
        };

        cache.insert(key, res);
        res
    }

    fn add_swap_(
        &self,
        f: AddRef,
        perm: &HashMap<Var, Var>,
        cache: &mut HashMap<AddRef, AddRef>,
    ) -> AddRef {
        let (v, low, high) = match self.add_node(f) {
            AddNode::Terminal(_) => return f,
            AddNode::Inner { variable, low, high } => (variable, low, high),
        };
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let lo = self.add_swap_(low, perm, cache);
        let hi = self.add_swap_(high, perm, cache);
        let target = perm.get(&v).copied().unwrap_or(v);
        let res = self.add_ite_(self.literal(target), hi, lo);
        cache.insert(f, res);
        res
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

impl DdManager for BddManager {
    type Bdd = Ref;
    type Add = AddRef;

    fn new_variable(&self) -> Var {
        let id = self.num_vars.get();
        self.num_vars.set(id + 1);
        Var::new(id)
    }

    fn num_variables(&self) -> usize {
        self.num_vars.get() as usize
    }

    fn zero(&self) -> Ref {
        Ref::ZERO
    }

    fn one(&self) -> Ref {
        Ref::ONE
    }

    fn is_zero(&self, f: &Ref) -> bool {
        *f == Ref::ZERO
    }

    fn is_one(&self, f: &Ref) -> bool {
        *f == Ref::ONE
    }

    fn mk_var(&self, var: Var) -> Ref {
        assert!(
            var.id() < self.num_vars.get(),
            "Variable {} is not allocated",
            var
        );
        self.literal(var)
    }

    fn apply_not(&self, f: &Ref) -> Ref {
        -*f
    }

    fn apply_ite(&self, f: &Ref, g: &Ref, h: &Ref) -> Ref {
        self.ite(*f, *g, *h)
    }

    fn exists_abstract(&self, f: &Ref, vars: &VarSet) -> Ref {
        debug!("exists_abstract(f = {}, vars = {})", f, vars);
        self.exists_(*f, vars.as_slice(), &mut HashMap::new())
    }

    fn and_exists(&self, f: &Ref, g: &Ref, vars: &VarSet) -> Ref {
        debug!("and_exists(f = {}, g = {}, vars = {})", f, g, vars);
        self.and_exists_(
            *f,
            *g,
            vars.as_slice(),
            &mut HashMap::new(),
            &mut HashMap::new(),
        )
    }

    fn exists_representative(&self, f: &Ref, vars: &VarSet) -> Ref {
        debug!("exists_representative(f = {}, vars = {})", f, vars);
        self.exists_representative_(*f, vars.as_slice(), &mut HashMap::new(), &mut HashMap::new())
    }

    fn swap_variables(&self, f: &Ref, pairs: &[(Var, Var)]) -> Ref {
        if pairs.is_empty() {
            return *f;
        }
        self.swap_(*f, &permutation(pairs), &mut HashMap::new())
    }

    fn support(&self, f: &Ref) -> VarSet {
        let mut support = VarSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![f.regular()];
        while let Some(node) = stack.pop() {
            if node.is_terminal() || !visited.insert(node.index()) {
                continue;
            }
            support.insert(self.variable(node));
            stack.push(self.low_node(node).regular());
            stack.push(self.high_node(node).regular());
        }
        support
    }

    fn non_zero_count(&self, f: &Ref, vars: &VarSet) -> BigUint {
        self.assert_support_covered(*f, vars);
        let full = BigUint::one() << vars.len();
        self.sat_count_(*f, &full, &mut HashMap::new())
    }

    fn minterms(&self, f: &Ref, vars: &VarSet) -> Vec<Vec<bool>> {
        self.assert_support_covered(*f, vars);
        let vars = vars.as_slice();
        let mut result = Vec::new();
        let mut stack = vec![(*f, Vec::with_capacity(vars.len()))];
        while let Some((node, assignment)) = stack.pop() {
            if node == Ref::ZERO {
                continue;
            }
            let depth = assignment.len();
            if depth == vars.len() {
                result.push(assignment);
                continue;
            }
            let (lo, hi) = self.top_cofactors(node, vars[depth]);
            // High first, so that the low branch is popped first.
            let mut high_assignment = assignment.clone();
            high_assignment.push(true);
            stack.push((hi, high_assignment));
            let mut low_assignment = assignment;
            low_assignment.push(false);
            stack.push((lo, low_assignment));
        }
        result
    }

    fn add_constant(&self, value: f64) -> AddRef {
        self.add_terminal(value)
    }

    fn to_add(&self, f: &Ref) -> AddRef {
        self.to_add_(*f)
    }

    fn add_to_bdd(&self, f: &AddRef) -> Ref {
        self.add_to_bdd_(*f)
    }

    fn add_apply(&self, op: AddOp, f: &AddRef, g: &AddRef) -> AddRef {
        self.add_apply_(op, *f, *g)
    }

    fn add_ite(&self, cond: &Ref, f: &AddRef, g: &AddRef) -> AddRef {
        self.add_ite_(*cond, *f, *g)
    }

    fn add_sum_abstract(&self, f: &AddRef, vars: &VarSet) -> AddRef {
        self.add_abstract_(*f, vars.as_slice(), AddOp::Plus, &mut HashMap::new())
    }

    fn add_max_abstract(&self, f: &AddRef, vars: &VarSet) -> AddRef {
        self.add_abstract_(*f, vars.as_slice(), AddOp::Max, &mut HashMap::new())
    }

    fn add_max_abstract_representative(&self, f: &AddRef, vars: &VarSet) -> Ref {
        debug!("add_max_abstract_representative(f = {}, vars = {})", f, vars);
        self.add_max_representative_(*f, vars.as_slice(), &mut HashMap::new())
    }

    fn add_swap_variables(&self, f: &AddRef, pairs: &[(Var, Var)]) -> AddRef {
        if pairs.is_empty() {
            return *f;
        }
        self.add_swap_(*f, &permutation(pairs), &mut HashMap::new())
    }

    fn add_max_value(&self, f: &AddRef) -> f64 {
        let mut max = f64::NEG_INFINITY;
        let mut visited = HashSet::new();
        let mut stack = vec![*f];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            match self.add_node(node) {
                AddNode::Terminal(_) => {
                    if let Some(value) = self.add_node(node).value() {
                        max = max.max(value);
                    }
                }
                AddNode::Inner { low, high, .. } => {
                    stack.push(low);
                    stack.push(high);
                }
            }
        }
        max
    }

    fn add_is_zero(&self, f: &AddRef) -> bool {
        self.add_node(*f).value() == Some(0.0)
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
    fn test_ite_basics() {
        let bdd = BddManager::with_variables(3);
        let x = bdd.mk_var(Var::new(0));
        let y = bdd.mk_var(Var::new(1));
        let z = bdd.mk_var(Var::new(2));

        let f = bdd.apply_ite(&x, &y, &z);
        let x_and_y = bdd.apply_and(&x, &y);
        let not_x_and_z = bdd.apply_and(&-x, &z);
        assert_eq!(f, bdd.apply_or(&x_and_y, &not_x_and_z));

        assert_eq!(bdd.apply_and(&x, &-x), Ref::ZERO);
        assert_eq!(bdd.apply_or(&x, &-x), Ref::ONE);
        assert_eq!(bdd.apply_xor(&x, &x), Ref::ZERO);
        assert_eq!(bdd.apply_imply(&x, &x), Ref::ONE);
    }

    #[test]
    #[should_panic(expected = "is not allocated")]
    fn test_unallocated_variable() {
        let bdd = BddManager::with_variables(1);
        bdd.mk_var(Var::new(5));
    }

    #[test]
    fn test_exists_and_forall() {
        let bdd = BddManager::with_variables(3);
        let x = bdd.mk_var(Var::new(0));
        let y = bdd.mk_var(Var::new(1));
        let z = bdd.mk_var(Var::new(2));
        let f = bdd.apply_and(&x, &bdd.apply_or(&y, &z));

        assert_eq!(bdd.exists_abstract(&f, &vars(&[1, 2])), x);
        assert_eq!(bdd.exists_abstract(&f, &vars(&[0])), bdd.apply_or(&y, &z));
        assert_eq!(bdd.forall_abstract(&f, &vars(&[1])), bdd.apply_and(&x, &z));
    }

    #[test]
    fn test_and_exists_matches_composition() {
        let bdd = BddManager::with_variables(4);
        let v: Vec<Ref> = (0..4).map(|i| bdd.mk_var(Var::new(i))).collect();
        let f = bdd.apply_or(&bdd.apply_and(&v[0], &v[1]), &v[3]);
        let g = bdd.apply_xor(&v[1], &v[2]);

        for set in [vars(&[1]), vars(&[0, 2]), vars(&[1, 3]), vars(&[0, 1, 2, 3])] {
            let fused = bdd.and_exists(&f, &g, &set);
            let composed = bdd.exists_abstract(&bdd.apply_and(&f, &g), &set);
            assert_eq!(fused, composed, "vars = {}", set);
        }
    }

    #[test]
    fn test_exists_representative_prefers_false() {
        let bdd = BddManager::with_variables(3);
        let x = bdd.mk_var(Var::new(0));
        let y = bdd.mk_var(Var::new(1));
        let z = bdd.mk_var(Var::new(2));

        // For x: both y=0,z=1 and y=1,z=0 are possible; pick y=0,z=1.
        let f = bdd.apply_and(&x, &bdd.apply_xor(&y, &z));
        let rep = bdd.exists_representative(&f, &vars(&[1, 2]));
        assert_eq!(rep, bdd.cube(&[Var::new(0), Var::new(1), Var::new(2)], &[true, false, true]));

        // Abstracted variables that f does not mention are fixed to false.
        let rep = bdd.exists_representative(&x, &vars(&[1]));
        assert_eq!(rep, bdd.apply_and(&x, &-y));

        assert_eq!(bdd.exists_representative(&Ref::ZERO, &vars(&[0])), Ref::ZERO);
    }

    #[test]
    fn test_swap_variables() {
        let bdd = BddManager::with_variables(4);
        let a = bdd.mk_var(Var::new(0));
        let b = bdd.mk_var(Var::new(1));
        let c = bdd.mk_var(Var::new(2));
        let d = bdd.mk_var(Var::new(3));
        let f = bdd.apply_and(&a, &-b);
        let g = bdd.swap_variables(&f, &[(Var::new(0), Var::new(2)), (Var::new(1), Var::new(3))]);
        assert_eq!(g, bdd.apply_and(&c, &-d));
    }

    #[test]
    fn test_counting_and_minterms() {
        let bdd = BddManager::with_variables(3);
        let x = bdd.mk_var(Var::new(0));
        let z = bdd.mk_var(Var::new(2));
        let f = bdd.apply_or(&x, &z);
        let all = vars(&[0, 1, 2]);

        assert_eq!(bdd.non_zero_count(&f, &all), BigUint::from(6u32));
        assert_eq!(bdd.non_zero_count(&Ref::ONE, &all), BigUint::from(8u32));

        let minterms = bdd.minterms(&f, &vars(&[0, 2]));
        assert_eq!(minterms, vec![vec![false, true], vec![true, false], vec![true, true]]);
        assert_eq!(bdd.support(&f), vars(&[0, 2]));
        assert_eq!(bdd.node_count(f), 3);
        assert_eq!(bdd.node_count(-f), 3);
    }

    #[test]
    fn test_reachability() {
        // A 2-bit counter: row bits (0, 1), column bits (2, 3).
        let bdd = BddManager::with_variables(4);
        let row = vars(&[0, 1]);
        let col = vars(&[2, 3]);
        let rv = [Var::new(0), Var::new(1)];
        let cv = [Var::new(2), Var::new(3)];
        let state = |b0, b1| bdd.cube(&rv, &[b0, b1]);
        let next = |b0, b1| bdd.cube(&cv, &[b0, b1]);
        // 00 -> 01 -> 10, 11 is unreachable
        let relation = bdd.apply_or(
            &bdd.apply_and(&state(false, false), &next(false, true)),
            &bdd.apply_and(&state(false, true), &next(true, false)),
        );

        let succ = bdd.relational_product(&state(false, false), &relation, &row, &col);
        assert_eq!(succ, state(false, true));
        let pred = bdd.inverse_relational_product(&state(true, false), &relation, &row, &col);
        assert_eq!(pred, state(false, true));

        let reached = bdd.reachable_states(&state(false, false), &relation, &row, &col);
        assert_eq!(reached, -state(true, true));
    }

    #[test]
    fn test_add_arithmetic() {
        let bdd = BddManager::with_variables(2);
        let x = bdd.mk_var(Var::new(0));
        let y = bdd.mk_var(Var::new(1));

        let half = bdd.add_constant(0.5);
        let f = bdd.add_ite(&x, &half, &bdd.add_constant(0.25));
        let g = bdd.add_apply(AddOp::Times, &f, &bdd.to_add(&y));

        let sum = bdd.add_sum_abstract(&g, &vars(&[0, 1]));
        assert_eq!(bdd.add_max_value(&sum), 0.75);
        let max = bdd.add_max_abstract(&g, &vars(&[0]));
        assert_eq!(bdd.add_to_bdd(&max), y);
        assert_eq!(bdd.add_greater(&f, &bdd.add_constant(0.3)), x);

        // Summing over a variable the function does not mention doubles it.
        let doubled = bdd.add_sum_abstract(&half, &vars(&[1]));
        assert_eq!(bdd.add_max_value(&doubled), 1.0);

        let zero = bdd.add_apply(AddOp::Minus, &f, &f);
        assert!(bdd.add_is_zero(&zero));

        // Terminals are shared.
        let size = bdd.add_size();
        bdd.add_constant(0.5);
        bdd.add_constant(0.25);
        assert_eq!(bdd.add_size(), size);
    }

    #[test]
    fn test_add_max_representative() {
        let bdd = BddManager::with_variables(3);
        let s = bdd.mk_var(Var::new(0));
        let a = bdd.mk_var(Var::new(1));

        // s=0: a=1 has value 0.7, a=0 has 0.2; s=1: both 0.4 (tie -> a=0).
        let values = bdd.add_ite(
            &s,
            &bdd.add_constant(0.4),
            &bdd.add_ite(&a, &bdd.add_constant(0.7), &bdd.add_constant(0.2)),
        );
        let rep = bdd.add_max_abstract_representative(&values, &vars(&[1, 2]));
        let expected = bdd.apply_and(
            &bdd.apply_ite(&s, &-a, &a),
            &-bdd.mk_var(Var::new(2)),
        );
        assert_eq!(rep, expected);
    }

    #[test]
    fn test_add_swap() {
        let bdd = BddManager::with_variables(2);
        let x = bdd.mk_var(Var::new(0));
        let y = bdd.mk_var(Var::new(1));
        let f = bdd.add_ite(&x, &bdd.add_constant(3.0), &bdd.add_constant(1.0));
        let g = bdd.add_swap_variables(&f, &[(Var::new(0), Var::new(1))]);
        assert_eq!(bdd.add_greater(&g, &bdd.add_constant(2.0)), y);
    }
}
