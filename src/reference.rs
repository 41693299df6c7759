use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A reference to a BDD node, potentially negated (complement edge).
///
/// Uses a 32-bit representation where the least significant bit indicates negation
/// and the remaining bits store the node index. Node 0 is the terminal `1`,
/// hence the terminal `0` is its negation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    pub const ONE: Self = Self(0);
    pub const ZERO: Self = Self(1);

    /// Creates a new reference with the given node index and negation flag.
    pub const fn new(index: u32, negated: bool) -> Self {
        Self((index << 1) | (negated as u32))
    }

    /// Creates a positive (non-negated) reference.
    pub const fn positive(index: u32) -> Self {
        Self::new(index, false)
    }

    /// Returns the index of the node this reference points to.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    /// Returns true if this reference is negated.
    #[inline]
    pub const fn is_negated(self) -> bool {
        (self.0 & 1) != 0
    }

    /// Returns the reference with the negation flag cleared.
    #[inline]
    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    /// Returns true if this reference points to the terminal node.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        self.index() == 0
    }

    /// Returns the raw underlying value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// -Ref
impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_negated() {
            write!(f, "~@{}", self.index())
        } else {
            write!(f, "@{}", self.index())
        }
    }
}

/// A reference to an ADD (algebraic decision diagram) node.
///
/// ADD nodes are never complemented, so the handle is the plain node index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct AddRef(u32);

impl AddRef {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for AddRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
