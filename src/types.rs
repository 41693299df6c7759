//! Type-safe wrappers for diagram variables and variable sets.
//!
//! Variables are identified by their allocation index, which is also their
//! position in the (fixed) variable ordering: a smaller id is closer to the root.
use std::fmt;

/// A diagram variable identifier (0-indexed, equal to its level).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given id.
    pub const fn new(id: u32) -> Self {
        Var(id)
    }

    /// Returns the raw variable id.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the raw variable id as an index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// An ordered set of variables.
///
/// # Invariants
///
/// - Variables are stored sorted by id (that is, by level)
/// - There are no duplicates
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct VarSet(Vec<Var>);

impl VarSet {
    pub fn new() -> Self {
        VarSet(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, var: Var) -> bool {
        self.0.binary_search(&var).is_ok()
    }

    /// Inserts a variable, keeping the set sorted. Returns true if it was not present.
    pub fn insert(&mut self, var: Var) -> bool {
        match self.0.binary_search(&var) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, var);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Var> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Var] {
        &self.0
    }

    /// Position of the variable inside the set, if present.
    pub fn position(&self, var: Var) -> Option<usize> {
        self.0.binary_search(&var).ok()
    }

    pub fn union(&self, other: &VarSet) -> VarSet {
        let mut result = self.clone();
        result.extend(other.iter());
        result
    }

    pub fn difference(&self, other: &VarSet) -> VarSet {
        self.iter().filter(|&v| !other.contains(v)).collect()
    }

    pub fn is_disjoint(&self, other: &VarSet) -> bool {
        self.iter().all(|v| !other.contains(v))
    }

    pub fn extend(&mut self, vars: impl IntoIterator<Item = Var>) {
        for var in vars {
            self.insert(var);
        }
    }
}

impl FromIterator<Var> for VarSet {
    fn from_iter<I: IntoIterator<Item = Var>>(iter: I) -> Self {
        let mut vars: Vec<Var> = iter.into_iter().collect();
        vars.sort();
        vars.dedup();
        VarSet(vars)
    }
}

impl<'a> IntoIterator for &'a VarSet {
    type Item = &'a Var;
    type IntoIter = std::slice::Iter<'a, Var>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for VarSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, var) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", var)?;
        }
        write!(f, "}}")
    }
}

/// The optimization direction of a player strategy.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OptimizationDirection {
    Minimize,
    Maximize,
}

impl fmt::Display for OptimizationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationDirection::Minimize => write!(f, "min"),
            OptimizationDirection::Maximize => write!(f, "max"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_creation() {
        let v1 = Var::new(1);
        let v2 = Var::new(2);
        assert_eq!(v1.id(), 1);
        assert_eq!(v2.index(), 2);
        assert!(v1 < v2);
        assert_eq!(format!("{}", v1), "x1");
    }

    #[test]
    fn test_var_set_is_sorted() {
        let set: VarSet = [Var::new(5), Var::new(1), Var::new(3), Var::new(1)].into_iter().collect();
        assert_eq!(set.as_slice(), &[Var::new(1), Var::new(3), Var::new(5)]);
        assert_eq!(set.position(Var::new(3)), Some(1));
        assert!(!set.contains(Var::new(2)));
    }

    #[test]
    fn test_var_set_algebra() {
        let a: VarSet = [Var::new(0), Var::new(2)].into_iter().collect();
        let b: VarSet = [Var::new(1), Var::new(2)].into_iter().collect();
        assert_eq!(a.union(&b).len(), 3);
        assert_eq!(a.difference(&b).as_slice(), &[Var::new(0)]);
        assert!(!a.is_disjoint(&b));
        assert!(a.difference(&b).is_disjoint(&b));
    }
}
