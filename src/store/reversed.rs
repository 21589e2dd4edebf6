//! The reversed view of a store: same records, mirrored coordinates.
//!
//! A variant `[low, high)` with alternate `alt` appears in the reversed view
//! as `[L - high, L - low)` with `alt` reversed, where `L` is the reference
//! length. The view borrows the store and never copies record payloads; only
//! the iteration order is materialized, because with whole-variant records
//! and coverage-disjoint overlapping variants the reversed composite order is
//! not a plain index reversal.

use crate::coverage::Coverage;
use crate::store::{Pangenome, SequenceView};
use crate::tree::SeekPosition;

/// Non-owning reversed counterpart of a [`Pangenome`].
pub struct ReversedPangenome<'a> {
    store: &'a Pangenome,
    /// reversed slot -> forward slot, sorted by the reversed composite key
    order: Vec<usize>,
    /// forward slot -> reversed slot
    inverse: Vec<usize>,
}

impl<'a> ReversedPangenome<'a> {
    pub(crate) fn new(store: &'a Pangenome) -> Self {
        let ref_len = store.source().len();
        let mut order: Vec<usize> = (0..store.variant_count()).collect();
        order.sort_by(|&a, &b| {
            let key = |slot: usize| {
                let breakpoint = store.records().breakpoint(slot);
                (ref_len - breakpoint.high(), ref_len - breakpoint.low())
            };
            let (a_low, a_high) = key(a);
            let (b_low, b_high) = key(b);
            a_low
                .cmp(&b_low)
                .then_with(|| b_high.cmp(&a_high))
                .then_with(|| {
                    let a_alt = store.records().alt(a);
                    let b_alt = store.records().alt(b);
                    b_alt
                        .len()
                        .cmp(&a_alt.len())
                        .then_with(|| a_alt.iter().rev().cmp(b_alt.iter().rev()))
                })
        });
        let mut inverse = vec![0; order.len()];
        for (reversed_slot, &forward_slot) in order.iter().enumerate() {
            inverse[forward_slot] = reversed_slot;
        }
        ReversedPangenome {
            store,
            order,
            inverse,
        }
    }

    pub fn store(&self) -> &'a Pangenome {
        self.store
    }

    /// Forward slot of a reversed slot.
    pub fn forward_slot(&self, reversed_slot: usize) -> usize {
        self.order[reversed_slot]
    }

    /// Reversed slot of a forward slot.
    pub fn reversed_slot(&self, forward_slot: usize) -> usize {
        self.inverse[forward_slot]
    }

    /// Map a forward reference boundary onto the reversed axis (involution).
    pub fn mirror_position(&self, position: usize) -> usize {
        self.store.source().len() - position
    }

    /// Map a forward seek position onto the reversed tree. Together with
    /// [`to_forward_position`](ReversedPangenome::to_forward_position) this
    /// is an involution; it links a seed found in the forward walk to its
    /// left extension in the reversed walk.
    pub fn to_reverse_position(&self, position: &SeekPosition) -> SeekPosition {
        let count = self.store.variant_count();
        match position {
            SeekPosition::Reference { variant, tag } => {
                if *variant == count {
                    // the sink boundary mirrors onto itself
                    SeekPosition::Reference {
                        variant: count,
                        tag: *tag,
                    }
                } else {
                    SeekPosition::Reference {
                        variant: self.reversed_slot(*variant),
                        tag: tag.flipped(),
                    }
                }
            }
            SeekPosition::Alternate { head, path } => SeekPosition::Alternate {
                head: self.reversed_slot(*head),
                path: path.clone(),
            },
        }
    }

    /// Map a reversed seek position back onto the forward tree.
    pub fn to_forward_position(&self, position: &SeekPosition) -> SeekPosition {
        let count = self.store.variant_count();
        match position {
            SeekPosition::Reference { variant, tag } => {
                if *variant == count {
                    SeekPosition::Reference {
                        variant: count,
                        tag: *tag,
                    }
                } else {
                    SeekPosition::Reference {
                        variant: self.forward_slot(*variant),
                        tag: tag.flipped(),
                    }
                }
            }
            SeekPosition::Alternate { head, path } => SeekPosition::Alternate {
                head: self.forward_slot(*head),
                path: path.clone(),
            },
        }
    }
}

impl<'a, 'b> SequenceView for &'b ReversedPangenome<'a> {
    fn reference_len(&self) -> usize {
        self.store.source().len()
    }

    fn reference_at(&self, position: usize) -> u8 {
        let source = self.store.source();
        source[source.len() - 1 - position]
    }

    fn member_count(&self) -> usize {
        self.store.size()
    }

    fn variant_count(&self) -> usize {
        self.order.len()
    }

    fn low(&self, variant: usize) -> usize {
        self.reference_len() - self.store.records().high(self.order[variant])
    }

    fn high(&self, variant: usize) -> usize {
        self.reference_len() - self.store.records().low(self.order[variant])
    }

    fn alt_len(&self, variant: usize) -> usize {
        self.store.records().alt(self.order[variant]).len()
    }

    fn alt_at(&self, variant: usize, offset: usize) -> u8 {
        let alt = self.store.records().alt(self.order[variant]);
        alt[alt.len() - 1 - offset]
    }

    fn coverage(&self, variant: usize) -> &Coverage {
        self.store.coverage_at(self.order[variant])
    }

    fn first_variant_at(&self, position: usize) -> usize {
        let (mut lo, mut hi) = (0, self.order.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.low(mid) < position {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{Breakpoint, Variant};

    fn store() -> Pangenome {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::new(
                Breakpoint::new(6, 7),
                b"T".to_vec(),
                Coverage::from_members(vec![1], 2),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(12, 12),
                b"ACG".to_vec(),
                Coverage::from_members(vec![0], 2),
            ))
            .unwrap();
        store
    }

    #[test]
    fn coordinates_are_mirrored() {
        let store = store();
        let reversed = store.reversed();
        let view = &reversed;
        // forward order: [6,7) then [12,12); reversed order flips them
        assert_eq!(view.low(0), 4);
        assert_eq!(view.high(0), 4);
        assert_eq!(view.low(1), 9);
        assert_eq!(view.high(1), 10);
        assert_eq!(reversed.forward_slot(0), 1);
        assert_eq!(reversed.reversed_slot(1), 0);
    }

    #[test]
    fn alternate_bytes_are_reversed() {
        let store = store();
        let reversed = store.reversed();
        let view = &reversed;
        let alt: Vec<u8> = (0..view.alt_len(0)).map(|i| view.alt_at(0, i)).collect();
        assert_eq!(alt, b"GCA");
    }

    #[test]
    fn reversed_reference_reads_backwards() {
        let store = store();
        let reversed = store.reversed();
        let view = &reversed;
        let seq: Vec<u8> = (0..view.reference_len())
            .map(|i| view.reference_at(i))
            .collect();
        assert_eq!(seq, b"TTTTGGGGCCCCAAAA");
    }

    #[test]
    fn mirror_position_is_an_involution() {
        let store = store();
        let reversed = store.reversed();
        for position in 0..=16 {
            assert_eq!(
                reversed.mirror_position(reversed.mirror_position(position)),
                position
            );
        }
    }
}
