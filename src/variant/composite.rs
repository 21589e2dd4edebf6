//! The composite record list: SNV and generic packings behind one merged,
//! sort-ordered index space.

use std::cmp::Ordering;

use itertools::Itertools;

use crate::variant::generic::GenericRecords;
use crate::variant::snv::SnvRecords;
use crate::variant::{compare_keys, Breakpoint};

/// Which packing a slot of the merged order refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handle {
    Snv(usize),
    Generic(usize),
}

/// All variant records of a store, iterable in composite-key order.
///
/// `order` is the single source of truth for variant indices: slot `i` of the
/// merged order is what the rest of the crate calls variant `i`.
#[derive(Debug, Default, Clone)]
pub(crate) struct CompositeRecords {
    snvs: SnvRecords,
    generics: GenericRecords,
    order: Vec<Handle>,
}

impl CompositeRecords {
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn breakpoint(&self, slot: usize) -> Breakpoint {
        match self.order[slot] {
            Handle::Snv(i) => {
                let position = self.snvs.position(i);
                Breakpoint::new(position, position + 1)
            }
            Handle::Generic(i) => self.generics.breakpoint(i),
        }
    }

    pub(crate) fn low(&self, slot: usize) -> usize {
        self.breakpoint(slot).low()
    }

    pub(crate) fn high(&self, slot: usize) -> usize {
        self.breakpoint(slot).high()
    }

    pub(crate) fn alt(&self, slot: usize) -> &[u8] {
        match self.order[slot] {
            Handle::Snv(i) => self.snvs.alt(i),
            Handle::Generic(i) => self.generics.alt(i),
        }
    }

    fn key(&self, slot: usize) -> (usize, usize, &[u8]) {
        let breakpoint = self.breakpoint(slot);
        (breakpoint.low(), breakpoint.high(), self.alt(slot))
    }

    /// The slot a new record with this key belongs to; `O(log M)` probes.
    pub(crate) fn insertion_slot(&self, low: usize, high: usize, alt: &[u8]) -> usize {
        lower_bound(self.len(), |slot| {
            compare_keys(self.key(slot), (low, high, alt)) == Ordering::Less
        })
    }

    /// Insert a record at its ordered slot and return that slot.
    pub(crate) fn insert(&mut self, breakpoint: Breakpoint, alt: &[u8]) -> usize {
        let slot = self.insertion_slot(breakpoint.low(), breakpoint.high(), alt);
        let handle = if breakpoint.span() == 1 && alt.len() == 1 {
            Handle::Snv(self.snvs.push(breakpoint.low(), alt[0]))
        } else {
            Handle::Generic(self.generics.push(breakpoint, alt))
        };
        self.order.insert(slot, handle);
        slot
    }

    /// First slot whose low breakend is `>= position`.
    pub(crate) fn first_slot_at(&self, position: usize) -> usize {
        lower_bound(self.len(), |slot| self.low(slot) < position)
    }

    /// Is the whole order sorted by the composite key? Used on load.
    pub(crate) fn is_sorted(&self) -> bool {
        (0..self.len())
            .tuple_windows()
            .all(|(a, b)| compare_keys(self.key(a), self.key(b)) != Ordering::Greater)
    }
}

// Binary search for the first index in `0..len` where `pred` turns false;
// `pred` must be monotone (true prefix, false suffix).
fn lower_bound<P: Fn(usize) -> bool>(len: usize, pred: P) -> usize {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_order_interleaves_packings() {
        let mut records = CompositeRecords::default();
        records.insert(Breakpoint::new(10, 11), b"G"); // SNV
        records.insert(Breakpoint::new(4, 8), b""); // deletion
        records.insert(Breakpoint::new(4, 4), b"XXX"); // insertion
        records.insert(Breakpoint::new(2, 3), b"T"); // SNV

        let lows: Vec<_> = (0..records.len()).map(|s| records.low(s)).collect();
        assert_eq!(lows, vec![2, 4, 4, 10]);
        // deletion before the co-located insertion
        assert_eq!(records.alt(1), b"");
        assert_eq!(records.alt(2), b"XXX");
        assert!(records.is_sorted());
    }

    #[test]
    fn first_slot_at_finds_the_branch_prefix() {
        let mut records = CompositeRecords::default();
        records.insert(Breakpoint::new(4, 8), b"");
        records.insert(Breakpoint::new(4, 4), b"XX");
        records.insert(Breakpoint::new(9, 10), b"C");

        assert_eq!(records.first_slot_at(0), 0);
        assert_eq!(records.first_slot_at(4), 0);
        assert_eq!(records.first_slot_at(5), 2);
        assert_eq!(records.first_slot_at(11), 3);
    }

    #[test]
    fn equal_length_insertions_order_lexicographically() {
        let mut records = CompositeRecords::default();
        records.insert(Breakpoint::new(4, 4), b"TT");
        records.insert(Breakpoint::new(4, 4), b"AA");
        assert_eq!(records.alt(0), b"AA");
        assert_eq!(records.alt(1), b"TT");
    }
}
