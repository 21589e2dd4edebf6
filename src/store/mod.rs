// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The referentially compressed multi-sequence store: one reference sequence
//! plus a positionally indexed, coverage-annotated variant catalog.

use log::debug;

use crate::coverage::Coverage;
use crate::errors::{Error, Result};
use crate::journal::Journal;
use crate::variant::composite::CompositeRecords;
use crate::variant::{Breakpoint, Variant, VariantKind};

pub(crate) mod io;
pub(crate) mod reversed;

pub use self::reversed::ReversedPangenome;

/// Direction-abstracted read access to a store.
///
/// The sequence tree, the journal and the search pipeline are generic over
/// this view so that the forward store and its reversed counterpart share one
/// monomorphized label path.
pub trait SequenceView: Copy {
    fn reference_len(&self) -> usize;
    fn reference_at(&self, position: usize) -> u8;
    fn member_count(&self) -> usize;
    fn variant_count(&self) -> usize;
    fn low(&self, variant: usize) -> usize;
    fn high(&self, variant: usize) -> usize;
    fn alt_len(&self, variant: usize) -> usize;
    fn alt_at(&self, variant: usize, offset: usize) -> u8;
    fn coverage(&self, variant: usize) -> &Coverage;
    /// Index of the first variant whose low breakend is `>= position`.
    fn first_variant_at(&self, position: usize) -> usize;

    fn span(&self, variant: usize) -> usize {
        self.high(variant) - self.low(variant)
    }

    fn is_insertion(&self, variant: usize) -> bool {
        self.span(variant) == 0
    }

    fn kind(&self, variant: usize) -> VariantKind {
        VariantKind::of(self.span(variant), self.alt_len(variant))
    }
}

/// One reference sequence and the catalog of structural differences observed
/// across a population of `size()` member sequences.
///
/// The store is the exclusive owner of the reference bytes, the variant
/// packings and the coverage domain; trees, views and journals borrow from it.
pub struct Pangenome {
    reference: Vec<u8>,
    records: CompositeRecords,
    coverages: Vec<Coverage>,
    members: usize,
}

impl Pangenome {
    /// An empty catalog over the given reference and population size.
    pub fn new(reference: Vec<u8>, members: usize) -> Self {
        assert!(members > 0, "bug: pan-genome without members");
        Pangenome {
            reference,
            records: CompositeRecords::default(),
            coverages: Vec::new(),
            members,
        }
    }

    /// The reference sequence.
    pub fn source(&self) -> &[u8] {
        &self.reference
    }

    /// Population size `N`.
    pub fn size(&self) -> usize {
        self.members
    }

    pub fn variant_count(&self) -> usize {
        self.records.len()
    }

    /// Insert a variant at its ordered slot and return that slot.
    ///
    /// Rejects records whose coverage has the wrong domain, whose breakpoint
    /// leaves the reference, and — with [`Error::CoverageConflict`] — records
    /// that strictly overlap an existing variant on a shared member.
    pub fn insert(&mut self, variant: Variant) -> Result<usize> {
        let (breakpoint, alt, coverage) = variant.into_parts();
        if coverage.domain_size() != self.members {
            return Err(Error::DomainMismatch {
                left: self.members,
                right: coverage.domain_size(),
            });
        }
        if breakpoint.high() > self.reference.len() {
            return Err(Error::malformed(format!(
                "breakpoint [{}, {}) outside the reference of length {}",
                breakpoint.low(),
                breakpoint.high(),
                self.reference.len()
            )));
        }
        if breakpoint.span() == 0 && alt.is_empty() {
            return Err(Error::malformed(format!(
                "variant at {} with empty span and empty alternate",
                breakpoint.low()
            )));
        }
        if let Some(slot) = self.find_conflict(&breakpoint, &coverage) {
            debug!(
                "rejecting variant [{}, {}): conflict with slot {}",
                breakpoint.low(),
                breakpoint.high(),
                slot
            );
            return Err(Error::CoverageConflict {
                low: breakpoint.low(),
                high: breakpoint.high(),
            });
        }
        let slot = self.records.insert(breakpoint, &alt);
        self.coverages.insert(slot, coverage);
        Ok(slot)
    }

    fn find_conflict(&self, breakpoint: &Breakpoint, coverage: &Coverage) -> Option<usize> {
        // every conflicting slot has low < breakpoint.high
        let end = self.records.first_slot_at(breakpoint.high());
        (0..end).find(|&slot| {
            self.records.breakpoint(slot).overlaps(breakpoint)
                && self.coverages[slot].intersects(coverage)
        })
    }

    /// Borrow variant `slot` of the composite order.
    pub fn variant(&self, slot: usize) -> VariantRef<'_> {
        VariantRef { store: self, slot }
    }

    /// Iterate all variants in composite-key order.
    pub fn iter(&self) -> impl Iterator<Item = VariantRef<'_>> + '_ {
        (0..self.variant_count()).map(move |slot| self.variant(slot))
    }

    /// The non-owning reversed view of this store.
    pub fn reversed(&self) -> ReversedPangenome<'_> {
        ReversedPangenome::new(self)
    }

    /// Materialize member `member`'s full sequence through a journal.
    ///
    /// Applies the member's variants left to right with the traversal rules:
    /// a variant consumed at a pivot shadows co-located insertions, and
    /// variants inside a deleted span are skipped.
    pub fn member_sequence(&self, member: usize) -> Vec<u8> {
        let journal = self.member_journal(member);
        journal.symbols(self, 0, journal.len()).collect()
    }

    pub(crate) fn member_journal(&self, member: usize) -> Journal {
        assert!(member < self.members, "bug: member outside the domain");
        let mut journal = Journal::new(self.reference.len());
        let mut offset = 0isize;
        let mut skip_until = 0;
        let mut last_pivot = None;
        for slot in 0..self.variant_count() {
            if !self.coverages[slot].get(member) {
                continue;
            }
            let breakpoint = self.records.breakpoint(slot);
            let alt_len = self.records.alt(slot).len();
            if breakpoint.low() < skip_until
                || (breakpoint.span() == 0 && last_pivot == Some(breakpoint.low()))
            {
                continue;
            }
            let at = (breakpoint.low() as isize + offset) as usize;
            journal
                .record_variant(at, slot, breakpoint.span(), alt_len)
                .expect("bug: member journal edits arrive in order");
            offset += alt_len as isize - breakpoint.span() as isize;
            skip_until = breakpoint.high();
            last_pivot = Some(breakpoint.low());
        }
        journal
    }

    /// Project a reference coordinate onto member `member`'s coordinates.
    ///
    /// Adds the effective length changes of all of the member's expressed
    /// variants that end at or before `ref_position`.
    pub fn member_position(&self, member: usize, ref_position: usize) -> usize {
        let mut offset = 0isize;
        let mut skip_until = 0;
        let mut last_pivot = None;
        for slot in 0..self.variant_count() {
            let breakpoint = self.records.breakpoint(slot);
            if breakpoint.low() > ref_position {
                break;
            }
            if !self.coverages[slot].get(member) {
                continue;
            }
            if breakpoint.low() < skip_until
                || (breakpoint.span() == 0 && last_pivot == Some(breakpoint.low()))
            {
                continue;
            }
            if breakpoint.high() <= ref_position {
                offset += self.records.alt(slot).len() as isize - breakpoint.span() as isize;
            }
            skip_until = breakpoint.high();
            last_pivot = Some(breakpoint.low());
        }
        (ref_position as isize + offset) as usize
    }

    pub(crate) fn records(&self) -> &CompositeRecords {
        &self.records
    }

    pub(crate) fn coverage_at(&self, slot: usize) -> &Coverage {
        &self.coverages[slot]
    }
}

/// A borrowed variant record of the composite order.
#[derive(Clone, Copy)]
pub struct VariantRef<'a> {
    store: &'a Pangenome,
    slot: usize,
}

impl<'a> VariantRef<'a> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.store.records.breakpoint(self.slot)
    }

    pub fn low(&self) -> usize {
        self.breakpoint().low()
    }

    pub fn high(&self) -> usize {
        self.breakpoint().high()
    }

    pub fn alt(&self) -> &'a [u8] {
        self.store.records.alt(self.slot)
    }

    pub fn coverage(&self) -> &'a Coverage {
        &self.store.coverages[self.slot]
    }

    pub fn kind(&self) -> VariantKind {
        VariantKind::of(self.breakpoint().span(), self.alt().len())
    }

    pub fn effective_len_change(&self) -> isize {
        self.alt().len() as isize - self.breakpoint().span() as isize
    }
}

impl<'a> SequenceView for &'a Pangenome {
    fn reference_len(&self) -> usize {
        self.reference.len()
    }

    fn reference_at(&self, position: usize) -> u8 {
        self.reference[position]
    }

    fn member_count(&self) -> usize {
        self.members
    }

    fn variant_count(&self) -> usize {
        self.records.len()
    }

    fn low(&self, variant: usize) -> usize {
        self.records.low(variant)
    }

    fn high(&self, variant: usize) -> usize {
        self.records.high(variant)
    }

    fn alt_len(&self, variant: usize) -> usize {
        self.records.alt(variant).len()
    }

    fn alt_at(&self, variant: usize, offset: usize) -> u8 {
        self.records.alt(variant)[offset]
    }

    fn coverage(&self, variant: usize) -> &Coverage {
        &self.coverages[variant]
    }

    fn first_variant_at(&self, position: usize) -> usize {
        self.records.first_slot_at(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(members: Vec<usize>, n: usize) -> Coverage {
        Coverage::from_members(members, n)
    }

    #[test]
    fn insert_keeps_composite_order() {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::snv(10, b'A', coverage(vec![0], 2)))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(4, 8),
                vec![],
                coverage(vec![0, 1], 2),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(4, 4),
                b"XXX".to_vec(),
                coverage(vec![1], 2),
            ))
            .unwrap();

        let lows: Vec<_> = store.iter().map(|v| v.low()).collect();
        assert_eq!(lows, vec![4, 4, 10]);
        assert_eq!(store.variant(0).kind(), VariantKind::Deletion);
        assert_eq!(store.variant(1).kind(), VariantKind::Insertion);
        assert_eq!(store.variant(2).kind(), VariantKind::Replacement);
    }

    #[test]
    fn conflicting_insert_is_rejected() {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::new(
                Breakpoint::new(4, 8),
                vec![],
                coverage(vec![0], 2),
            ))
            .unwrap();
        // shared member 0, overlapping span
        let err = store
            .insert(Variant::snv(5, b'T', coverage(vec![0], 2)))
            .unwrap_err();
        assert!(matches!(err, Error::CoverageConflict { low: 5, high: 6 }));
        // disjoint members may overlap
        store
            .insert(Variant::snv(5, b'T', coverage(vec![1], 2)))
            .unwrap();
        assert_eq!(store.variant_count(), 2);
    }

    #[test]
    fn wrong_domain_is_rejected() {
        let mut store = Pangenome::new(b"ACGT".to_vec(), 2);
        let err = store
            .insert(Variant::snv(0, b'T', coverage(vec![0], 3)))
            .unwrap_err();
        assert!(matches!(err, Error::DomainMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn member_sequences_apply_the_shadowing_rule() {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::new(
                Breakpoint::new(4, 8),
                vec![],
                coverage(vec![0, 1], 2),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(4, 4),
                b"XXX".to_vec(),
                coverage(vec![1], 2),
            ))
            .unwrap();
        // the deletion shadows the co-located insertion for member 1
        assert_eq!(store.member_sequence(0), b"AAAAGGGGTTTT");
        assert_eq!(store.member_sequence(1), b"AAAAGGGGTTTT");
    }

    #[test]
    fn member_position_projects_through_indels() {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::new(
                Breakpoint::new(4, 8),
                vec![],
                coverage(vec![1], 2),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(12, 12),
                b"GG".to_vec(),
                coverage(vec![1], 2),
            ))
            .unwrap();
        assert_eq!(store.member_position(0, 10), 10);
        assert_eq!(store.member_position(1, 2), 2);
        assert_eq!(store.member_position(1, 8), 4);
        assert_eq!(store.member_position(1, 14), 12);
    }
}
