//! Seek positions: the only node-independent handle into a sequence tree.

use std::hash::{Hash, Hasher};

use bv::{Bits, BitVec};

/// Which end of a breakpoint a reference node stands at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakendTag {
    Low,
    High,
}

impl BreakendTag {
    pub fn flipped(self) -> BreakendTag {
        match self {
            BreakendTag::Low => BreakendTag::High,
            BreakendTag::High => BreakendTag::Low,
        }
    }
}

/// The branch choices taken since leaving the reference path: one bit per
/// low-breakend event, `1` for the alternate edge, `0` for the reference edge.
/// High-breakend events replay deterministically and carry no bit.
#[derive(Debug, Clone, Default)]
pub struct AlternatePath {
    bits: BitVec<u64>,
}

impl AlternatePath {
    pub fn push(&mut self, took_alt: bool) {
        self.bits.push(took_alt);
    }

    pub fn len(&self) -> usize {
        self.bits.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bits.len()).map(move |i| self.bits.get_bit(i))
    }
}

impl PartialEq for AlternatePath {
    fn eq(&self, other: &AlternatePath) -> bool {
        self.bits.len() == other.bits.len() && self.iter().eq(other.iter())
    }
}

impl Eq for AlternatePath {}

impl Hash for AlternatePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.len().hash(state);
        let mut word = 0u64;
        for (i, bit) in self.iter().enumerate() {
            word = word << 1 | bit as u64;
            if i % 64 == 63 {
                word.hash(state);
                word = 0;
            }
        }
        word.hash(state);
    }
}

/// Identifies a node independently of its lifetime, see the tree's `seek`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeekPosition {
    /// A reference node, keyed by the breakend event it ends at: `variant`'s
    /// low breakend (the next bifurcation) or its high breakend (the next
    /// coverage regain). The sink carries the variant count with a low tag.
    Reference { variant: usize, tag: BreakendTag },
    /// An alternate-path node: the variant whose alternate edge left the
    /// reference, plus the branch choices taken since.
    Alternate {
        head: usize,
        path: AlternatePath,
    },
}

impl SeekPosition {
    pub fn is_alternate(&self) -> bool {
        matches!(self, SeekPosition::Alternate { .. })
    }

    /// The variant index anchoring this position.
    pub fn variant(&self) -> usize {
        match self {
            SeekPosition::Reference { variant, .. } => *variant,
            SeekPosition::Alternate { head, .. } => *head,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(position: &SeekPosition) -> u64 {
        let mut hasher = DefaultHasher::new();
        position.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn alternate_paths_compare_bitwise() {
        let mut a = AlternatePath::default();
        a.push(true);
        a.push(false);
        let mut b = AlternatePath::default();
        b.push(true);
        b.push(false);
        assert_eq!(a, b);
        b.push(true);
        assert_ne!(a, b);
    }

    #[test]
    fn positions_hash_consistently() {
        let mut path = AlternatePath::default();
        path.push(true);
        let a = SeekPosition::Alternate {
            head: 3,
            path: path.clone(),
        };
        let b = SeekPosition::Alternate { head: 3, path };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(
            a,
            SeekPosition::Reference {
                variant: 3,
                tag: BreakendTag::Low
            }
        );
    }
}
