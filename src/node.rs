use crate::reference::{AddRef, Ref};
use crate::types::Var;

/// An inner BDD node.
///
/// # Invariants
///
/// - The `high` edge is never negated (canonical complement-edge form)
/// - `low != high`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BddNode {
    pub variable: Var,
    pub low: Ref,
    pub high: Ref,
}

/// An ADD node: either a terminal carrying a value or an inner decision node.
///
/// Terminal values are stored as raw bits so that nodes can be hash-consed;
/// `-0.0` is normalized to `0.0` on construction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AddNode {
    Terminal(u64),
    Inner { variable: Var, low: AddRef, high: AddRef },
}

impl AddNode {
    pub fn terminal(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        AddNode::Terminal(value.to_bits())
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            AddNode::Terminal(bits) => Some(f64::from_bits(*bits)),
            AddNode::Inner { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_zero_is_normalized() {
        assert_eq!(AddNode::terminal(-0.0), AddNode::terminal(0.0));
        assert_eq!(AddNode::terminal(0.5).value(), Some(0.5));
    }
}
