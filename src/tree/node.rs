// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use crate::coverage::Coverage;
use crate::journal::Journal;
use crate::store::SequenceView;
use crate::tree::adaptors::Capabilities;
use crate::tree::seek::{AlternatePath, BreakendTag, SeekPosition};

/// A still-regained coverage slice: members that left the reference path at a
/// variant's low breakend and return at its high breakend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pending {
    pub(crate) at: usize,
    pub(crate) phase: u8,
    pub(crate) slot: usize,
    pub(crate) lost: Coverage,
}

impl Pending {
    pub(crate) fn key(&self) -> (usize, u8, usize) {
        (self.at, self.phase, self.slot)
    }
}

/// The next breakend event ahead of a node.
///
/// At one reference position, high breakends of deletions and replacements
/// come first (members whose edit window expired regain before new branches
/// open), then low breakends in composite order, then high breakends of
/// insertions (so that a co-located later insertion still sees the members of
/// an earlier one subtracted, which is what shadows it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Low { slot: usize, at: usize },
    High { at: usize },
    Sink,
}

pub(crate) fn high_phase<V: SequenceView>(view: V, slot: usize) -> u8 {
    if view.is_insertion(slot) {
        2
    } else {
        0
    }
}

/// A partial walk over the pan-genome.
///
/// The node's label is the journal slice `[first, min(next, last))`; `next`
/// always sits on the journal coordinate of the next breakend event, `last`
/// bounds alternate branches. Nodes are plain values: the traversal keeps them
/// on its stack and cargos refer to them by borrow, so no handle cycles arise.
#[derive(Debug, Clone)]
pub struct Node {
    journal: Journal,
    coverage: Coverage,
    pendings: Vec<Pending>,
    next_variant: usize,
    first: usize,
    next: usize,
    last: usize,
    offset: isize,
    on_alternate: bool,
    alt_seek: Option<(usize, AlternatePath)>,
    // regains inside the trailing label window; a q-gram reaching left across
    // such a coordinate must not claim the members regained there
    recent_regains: Vec<(usize, Coverage)>,
}

impl Node {
    pub(crate) fn root<V: SequenceView>(view: V) -> Node {
        let coverage = Coverage::with_domain(view.member_count(), true);
        let mut node = Node {
            journal: Journal::new(view.reference_len()),
            coverage,
            pendings: Vec::new(),
            next_variant: 0,
            first: 0,
            next: 0,
            last: usize::MAX,
            offset: 0,
            on_alternate: false,
            alt_seek: None,
            recent_regains: Vec::new(),
        };
        node.refresh_next(view);
        node
    }

    /// Journal coordinates of this node's label.
    pub fn label_range(&self) -> (usize, usize) {
        (self.first, self.label_end())
    }

    pub(crate) fn label_end(&self) -> usize {
        self.next.min(self.last).min(self.journal.len())
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    pub fn on_alternate_path(&self) -> bool {
        self.on_alternate
    }

    pub(crate) fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Move the label start (used when rooting an extension at a hit).
    pub(crate) fn set_label_start(&mut self, first: usize) {
        self.first = first;
    }

    /// Override the branch bound (used by extension trees).
    pub(crate) fn set_label_bound(&mut self, last: usize) {
        self.last = last;
    }

    pub(crate) fn set_coverage(&mut self, coverage: Coverage) {
        self.coverage = coverage;
    }

    pub(crate) fn clear_pendings(&mut self) {
        self.pendings.clear();
        self.recent_regains.clear();
    }

    /// The members safe to seed a match whose q-gram starts at journal
    /// coordinate `from`: the node's coverage minus everything regained
    /// strictly right of `from` (those members joined this path later).
    pub fn seed_coverage(&self, from: usize) -> Coverage {
        let mut coverage = self.coverage.clone();
        for (coord, lost) in &self.recent_regains {
            if *coord > from {
                coverage.difference_with(lost);
            }
        }
        coverage
    }

    pub(crate) fn next_event<V: SequenceView>(&self, view: V) -> Event {
        let low = if self.next_variant < view.variant_count() {
            Some((view.low(self.next_variant), 1u8, self.next_variant))
        } else {
            None
        };
        let high = self.pendings.first().map(|pending| pending.key());
        match (low, high) {
            (None, None) => Event::Sink,
            (Some((at, _, slot)), None) => Event::Low { slot, at },
            (None, Some((at, _, _))) => Event::High { at },
            (Some(low_key), Some(high_key)) => {
                if high_key < low_key {
                    Event::High { at: high_key.0 }
                } else {
                    Event::Low {
                        slot: low_key.2,
                        at: low_key.0,
                    }
                }
            }
        }
    }

    /// Is this node the end of its branch (nothing to bifurcate into)?
    pub fn is_terminal<V: SequenceView>(&self, view: V) -> bool {
        self.next >= self.last || matches!(self.next_event(view), Event::Sink)
    }

    /// The node-independent handle identifying this node, see the tree's
    /// `seek`. Requires the `seekable` capability for alternate-path nodes.
    pub fn seek_position<V: SequenceView>(&self, view: V) -> SeekPosition {
        if let Some((head, path)) = &self.alt_seek {
            return SeekPosition::Alternate {
                head: *head,
                path: path.clone(),
            };
        }
        assert!(
            !self.on_alternate,
            "bug: seek position requested from a pipeline without the seek capability"
        );
        match self.next_event(view) {
            Event::Low { slot, .. } => SeekPosition::Reference {
                variant: slot,
                tag: BreakendTag::Low,
            },
            Event::High { .. } => SeekPosition::Reference {
                variant: self.pendings[0].slot,
                tag: BreakendTag::High,
            },
            Event::Sink => SeekPosition::Reference {
                variant: view.variant_count(),
                tag: BreakendTag::Low,
            },
        }
    }

    /// Split this node at its next event.
    ///
    /// Returns `(alternate child, reference child)`; either may be pruned
    /// away. At a high breakend there is nothing to branch into and the
    /// reference child only regains coverage.
    pub fn bifurcate<V: SequenceView>(
        mut self,
        view: V,
        capabilities: &Capabilities,
    ) -> (Option<Node>, Option<Node>) {
        match self.next_event(view) {
            Event::Sink => (None, None),
            Event::High { .. } => {
                let pending = self.pendings.remove(0);
                if capabilities.coloured {
                    self.coverage.union_with(&pending.lost);
                    self.recent_regains.push((self.next, pending.lost));
                }
                // regains replay deterministically but still advance the
                // descriptor, so nodes before and after stay distinguishable
                if let Some((_, path)) = &mut self.alt_seek {
                    path.push(false);
                }
                self.first = self.next;
                self.refresh_next(view);
                self.prune_stale_regains(capabilities);
                (None, Some(self))
            }
            Event::Low { slot, .. } => {
                let alt = self.alternate_child(view, capabilities, slot);
                let reference = self.into_reference_child(view, capabilities, slot);
                (alt, reference)
            }
        }
    }

    fn alternate_child<V: SequenceView>(
        &self,
        view: V,
        capabilities: &Capabilities,
        slot: usize,
    ) -> Option<Node> {
        let coverage = if capabilities.coloured {
            self.coverage.intersect(view.coverage(slot))
        } else {
            self.coverage.clone()
        };
        if capabilities.pruned && coverage.none() {
            return None;
        }

        let branch_point = self.next;
        let alt_len = view.alt_len(slot);
        let span = view.span(slot);

        let mut journal = self.journal.clone();
        journal
            .record_variant(branch_point, slot, span, alt_len)
            .expect("bug: branch edits arrive in order");

        let last = if self.on_alternate {
            self.last
        } else {
            branch_point + alt_len + capabilities.branch_budget()
        };
        let alt_seek = if capabilities.seekable {
            Some(match &self.alt_seek {
                None => (slot, AlternatePath::default()),
                Some((head, path)) => {
                    let mut path = path.clone();
                    path.push(true);
                    (*head, path)
                }
            })
        } else {
            None
        };

        let mut child = Node {
            journal,
            coverage,
            // members pending a regain never re-enter an alternate branch:
            // they do not share the branch's context across the edit
            pendings: Vec::new(),
            next_variant: advance_past(view, slot),
            first: branch_point,
            next: 0,
            last,
            offset: self.offset + alt_len as isize - span as isize,
            on_alternate: true,
            alt_seek,
            recent_regains: self.recent_regains.clone(),
        };
        child.refresh_next(view);
        Some(child)
    }

    fn into_reference_child<V: SequenceView>(
        mut self,
        view: V,
        capabilities: &Capabilities,
        slot: usize,
    ) -> Option<Node> {
        if capabilities.coloured {
            let lost = self.coverage.intersect(view.coverage(slot));
            self.coverage.difference_with(view.coverage(slot));
            if capabilities.merged && lost.any() {
                let pending = Pending {
                    at: view.high(slot),
                    phase: high_phase(view, slot),
                    slot,
                    lost,
                };
                let at = self
                    .pendings
                    .binary_search_by_key(&pending.key(), Pending::key)
                    .unwrap_or_else(|insertion| insertion);
                self.pendings.insert(at, pending);
            }
        }
        if capabilities.pruned && self.coverage.none() && self.pendings.is_empty() {
            return None;
        }
        if let Some((_, path)) = &mut self.alt_seek {
            path.push(false);
        }
        self.next_variant = slot + 1;
        self.first = self.next;
        self.refresh_next(view);
        self.prune_stale_regains(capabilities);
        Some(self)
    }

    // Regains further back than one label window can no longer fall inside a
    // q-gram; drop them so branch clones stay small.
    fn prune_stale_regains(&mut self, capabilities: &Capabilities) {
        let horizon = (self.next + 1).saturating_sub(capabilities.window);
        self.recent_regains.retain(|(coord, _)| *coord > horizon);
    }

    /// A free-standing alternate node expressing exactly one variant, used to
    /// root an extension inside that variant's alternate sequence.
    pub(crate) fn alternate_root<V: SequenceView>(
        view: V,
        slot: usize,
        coverage: Coverage,
        label_start: usize,
        bound: usize,
    ) -> Node {
        let mut journal = Journal::new(view.reference_len());
        let frontier = view.low(slot);
        journal
            .record_variant(frontier, slot, view.span(slot), view.alt_len(slot))
            .expect("bug: single edit cannot violate journal order");
        let mut node = Node {
            journal,
            coverage,
            pendings: Vec::new(),
            next_variant: advance_past(view, slot),
            first: label_start,
            next: 0,
            last: bound,
            offset: view.alt_len(slot) as isize - view.span(slot) as isize,
            on_alternate: true,
            alt_seek: None,
            recent_regains: Vec::new(),
        };
        node.refresh_next(view);
        node
    }

    // Teleport this (root) node to a reconstructed reference-path state; the
    // already-emitted label prefix is not restored.
    pub(crate) fn restore_reference_state<V: SequenceView>(
        &mut self,
        view: V,
        coverage: Coverage,
        pendings: Vec<Pending>,
        next_variant: usize,
    ) {
        self.coverage = coverage;
        self.pendings = pendings;
        self.next_variant = next_variant;
        self.refresh_next(view);
        self.first = self.next;
    }

    pub(crate) fn refresh_next<V: SequenceView>(&mut self, view: V) {
        self.next = match self.next_event(view) {
            Event::Sink => self.journal.len(),
            Event::Low { at, .. } | Event::High { at } => (at as isize + self.offset) as usize,
        };
    }

    /// Two nodes are the same walk state when everything but the label prefix
    /// they already emitted agrees; `seek` reconstructs exactly this.
    pub(crate) fn same_state(&self, other: &Node) -> bool {
        self.coverage == other.coverage
            && self.pendings == other.pendings
            && self.next_variant == other.next_variant
            && self.next == other.next
            && self.offset == other.offset
            && self.on_alternate == other.on_alternate
            && self.journal == other.journal
            && self.alt_seek == other.alt_seek
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.same_state(other)
    }
}

// The first variant a branch can bifurcate into after taking `slot`:
// co-located insertions are shadowed, and everything inside a deleted
// span is consumed by the deletion.
fn advance_past<V: SequenceView>(view: V, slot: usize) -> usize {
    let low = view.low(slot);
    let mut next = slot + 1;
    while next < view.variant_count() && view.low(next) == low && view.is_insertion(next) {
        next += 1;
    }
    let high = view.high(slot);
    if next < view.variant_count() && view.low(next) < high {
        next = view.first_variant_at(high);
    }
    next
}
