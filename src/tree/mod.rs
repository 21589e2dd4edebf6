// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The sequence tree: a branching walk over the reference that produces every
//! distinct contextual window of every member sequence exactly once.
//!
//! Nodes advance between *breakend events*. A low breakend bifurcates the
//! walk into an alternate child (variant taken, coverage intersected) and a
//! reference child (variant passed, coverage subtracted); a high breakend
//! regains the members whose edit window has expired onto the reference path.
//! Alternate branches carry their edit plus a bounded context window and then
//! merge back by ending, which keeps the enumeration free of duplicates.

use crate::coverage::Coverage;
use crate::store::SequenceView;

pub(crate) mod adaptors;
pub(crate) mod cargo;
pub(crate) mod node;
pub(crate) mod seek;

pub use self::adaptors::{Capabilities, TreePipeline};
pub use self::cargo::Cargo;
pub use self::node::Node;
pub use self::seek::{AlternatePath, BreakendTag, SeekPosition};

use self::node::{high_phase, Event, Pending};

/// A configured walk over one store view; assembled by a [`TreePipeline`].
pub struct SequenceTree<V> {
    view: V,
    capabilities: Capabilities,
}

impl<V: SequenceView> SequenceTree<V> {
    pub(crate) fn new(view: V, capabilities: Capabilities) -> Self {
        SequenceTree { view, capabilities }
    }

    pub fn view(&self) -> V {
        self.view
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The initial node: the reference walk before the first branch, with
    /// full coverage.
    pub fn root(&self) -> Node {
        Node::root(self.view)
    }

    /// Borrow a node's cargo.
    pub fn cargo<'a>(&'a self, node: &'a Node) -> Cargo<'a, V> {
        Cargo::new(node, self)
    }

    /// A reference-path node teleported to `frontier` with its coverage and
    /// label bound overridden; the root shape of extension walks.
    pub(crate) fn rooted_at(&self, frontier: usize, coverage: Coverage, bound: usize) -> Node {
        let mut node = self.root();
        let next_variant = self.view.first_variant_at(frontier);
        node.restore_reference_state(self.view, coverage, Vec::new(), next_variant);
        node.set_label_start(frontier);
        node.set_label_bound(bound);
        node
    }

    /// Reconstruct the node a seek position identifies, in `O(depth)` replay
    /// steps plus the active-variant scan at the anchoring breakend.
    pub fn seek(&self, position: &SeekPosition) -> Node {
        match position {
            SeekPosition::Reference { variant, tag } => self.seek_reference(*variant, *tag),
            SeekPosition::Alternate { head, path } => self.seek_alternate(*head, path),
        }
    }

    // The reference node ending at the event `(variant, tag)`. The walk state
    // at a reference position is a function of that position alone, so the
    // node is rebuilt by replaying the breakend events up to (excluding) the
    // anchoring one, without touching any labels.
    fn seek_reference(&self, variant: usize, tag: BreakendTag) -> Node {
        let view = self.view;
        let mut node = self.root();
        let event_key = match tag {
            BreakendTag::Low => {
                let at = if variant < view.variant_count() {
                    view.low(variant)
                } else {
                    view.reference_len()
                };
                (at, 1u8, variant)
            }
            BreakendTag::High => (view.high(variant), high_phase(view, variant), variant),
        };

        let mut next_variant = 0;
        while next_variant < view.variant_count()
            && (view.low(next_variant), 1u8, next_variant) < event_key
        {
            next_variant += 1;
        }

        let mut coverage = Coverage::with_domain(view.member_count(), true);
        let mut pendings: Vec<Pending> = Vec::new();
        if self.capabilities.coloured {
            // low and high events of all passed variants, in walk order
            let mut events: Vec<(usize, u8, usize)> = (0..next_variant)
                .map(|slot| (view.low(slot), 1u8, slot))
                .collect();
            events.extend((0..next_variant).map(|slot| {
                (view.high(slot), high_phase(view, slot), slot)
            }));
            events.sort();
            for event in events.into_iter().filter(|event| *event < event_key) {
                let (_, phase, slot) = event;
                if phase == 1 {
                    let lost = coverage.intersect(view.coverage(slot));
                    coverage.difference_with(view.coverage(slot));
                    if self.capabilities.merged && lost.any() {
                        pendings.push(Pending {
                            at: view.high(slot),
                            phase: high_phase(view, slot),
                            slot,
                            lost,
                        });
                    }
                } else if let Some(found) =
                    pendings.iter().position(|pending| pending.slot == slot)
                {
                    let pending = pendings.remove(found);
                    coverage.union_with(&pending.lost);
                }
            }
            pendings.sort_by_key(Pending::key);
        }

        node.restore_reference_state(view, coverage, pendings, next_variant);
        node
    }

    fn seek_alternate(&self, head: usize, path: &AlternatePath) -> Node {
        let base = self.seek_reference(head, BreakendTag::Low);
        let (alt, _) = base.bifurcate(self.view, &self.capabilities);
        let mut node = alt.expect("bug: seek into a pruned alternate branch");
        // one descriptor bit per event: a choice at low breakends, a
        // deterministic step at high breakends
        for bit in path.iter() {
            match node.next_event(self.view) {
                Event::High { .. } => {
                    assert!(!bit, "bug: alternate edge recorded at a high breakend");
                    let (_, reference) = node.bifurcate(self.view, &self.capabilities);
                    node = reference.expect("bug: regain never prunes a branch");
                }
                Event::Low { .. } => {
                    let (alt, reference) = node.bifurcate(self.view, &self.capabilities);
                    node = if bit { alt } else { reference }
                        .expect("bug: seek replay into a pruned child");
                }
                Event::Sink => panic!("bug: seek replay walked past the sink"),
            }
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    use crate::search::driver::{Traversal, TreeAlgorithm};
    use crate::store::Pangenome;
    use crate::variant::{Breakpoint, Variant};

    struct Collector {
        labels: Vec<(String, Vec<usize>)>,
        nodes: Vec<(SeekPosition, Node)>,
    }

    impl Collector {
        fn new() -> Self {
            Collector {
                labels: Vec::new(),
                nodes: Vec::new(),
            }
        }
    }

    impl<V: SequenceView> TreeAlgorithm<V> for Collector {
        fn visit(&mut self, cargo: &Cargo<'_, V>) -> ControlFlow<()> {
            let label: Vec<u8> = cargo.stream_label().collect();
            if !label.is_empty() {
                self.labels.push((
                    String::from_utf8(label).unwrap(),
                    cargo.coverage().members().collect(),
                ));
            }
            self.nodes.push((cargo.position(), cargo.node().clone()));
            ControlFlow::Continue(())
        }

        fn on_push(&mut self) {}

        fn on_pop(&mut self) {}
    }

    fn collect(tree: &SequenceTree<&Pangenome>) -> Collector {
        let mut collector = Collector::new();
        let _ = Traversal::new(tree).run(tree.root(), &mut collector);
        collector
    }

    fn pipeline(store: &Pangenome, window: usize) -> SequenceTree<&Pangenome> {
        TreePipeline::new(store)
            .labelled(window)
            .coloured()
            .merged()
            .pruned()
            .seekable()
            .build()
    }

    fn snv_store() -> Pangenome {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::new(
                Breakpoint::new(6, 7),
                b"T".to_vec(),
                Coverage::from_members(vec![1], 2),
            ))
            .unwrap();
        store
    }

    fn deletion_shadow_store() -> Pangenome {
        let mut store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 2);
        store
            .insert(Variant::new(
                Breakpoint::new(4, 8),
                vec![],
                Coverage::from_members(vec![0, 1], 2),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(4, 4),
                b"XXX".to_vec(),
                Coverage::from_members(vec![1], 2),
            ))
            .unwrap();
        store
    }

    #[test]
    fn plain_reference_is_one_label() {
        let store = Pangenome::new(b"ACGTACGT".to_vec(), 1);
        let tree = pipeline(&store, 4);
        let collector = collect(&tree);
        assert_eq!(collector.labels, vec![("ACGTACGT".to_string(), vec![0])]);
    }

    #[test]
    fn substitution_branches_and_regains() {
        let store = snv_store();
        let tree = pipeline(&store, 8);
        let collector = collect(&tree);
        assert_eq!(
            collector.labels,
            vec![
                ("AAAACC".to_string(), vec![0, 1]),
                ("TCGGGGTT".to_string(), vec![1]),
                ("C".to_string(), vec![0]),
                ("CGGGGTTTT".to_string(), vec![0, 1]),
            ]
        );
    }

    #[test]
    fn deletion_shadows_colocated_insertion() {
        let store = deletion_shadow_store();
        let tree = pipeline(&store, 8);
        let collector = collect(&tree);
        // no label carries the shadowed insertion
        assert!(collector.labels.iter().all(|(label, _)| !label.contains('X')));
        assert_eq!(
            collector.labels,
            vec![
                ("AAAA".to_string(), vec![0, 1]),
                ("GGGGTTT".to_string(), vec![0, 1]),
                ("CCCC".to_string(), vec![]),
                ("GGGGTTTT".to_string(), vec![0, 1]),
            ]
        );
    }

    #[test]
    fn unmerged_walk_stops_at_the_branch_window() {
        let store = deletion_shadow_store();
        let tree = TreePipeline::new(&store)
            .labelled(8)
            .coloured()
            .pruned()
            .seekable()
            .build();
        let collector = collect(&tree);
        assert_eq!(
            collector.labels,
            vec![
                ("AAAA".to_string(), vec![0, 1]),
                ("GGGGTTT".to_string(), vec![0, 1]),
            ]
        );
    }

    #[test]
    fn every_window_of_every_member_is_enumerated() {
        let store = deletion_shadow_store();
        let window = 8;
        let tree = pipeline(&store, window);
        let collector = collect(&tree);

        // reassemble the per-path streams member by member via brute force
        for member in 0..store.size() {
            let sequence = store.member_sequence(member);
            for offset in 0..=sequence.len().saturating_sub(window) {
                let expected = &sequence[offset..offset + window];
                let occurrences: usize = collector
                    .nodes
                    .iter()
                    .filter(|(_, node)| node.coverage().get(member))
                    .map(|(_, node)| {
                        let (first, end) = node.label_range();
                        let path: Vec<u8> = node.journal().symbols(&store, 0, end).collect();
                        // windows ending inside this node's own label
                        (first.max(window - 1)..end)
                            .filter(|&at| {
                                at + 1 >= window && &path[at + 1 - window..=at] == expected
                            })
                            .count()
                    })
                    .sum();
                assert!(
                    occurrences >= 1,
                    "window {:?} of member {} missing",
                    String::from_utf8_lossy(expected),
                    member
                );
            }
        }
    }

    #[test]
    fn seek_round_trips_every_node() {
        for store in vec![snv_store(), deletion_shadow_store()] {
            let tree = pipeline(&store, 8);
            let collector = collect(&tree);
            for (position, node) in &collector.nodes {
                let reconstructed = tree.seek(position);
                assert_eq!(&reconstructed, node, "seek mismatch at {:?}", position);
            }
        }
    }

    #[test]
    fn forward_reverse_positions_are_an_involution() {
        let store = snv_store();
        let reversed = store.reversed();
        let tree = pipeline(&store, 8);
        let collector = collect(&tree);
        for (position, _) in &collector.nodes {
            let there = reversed.to_reverse_position(position);
            let back = reversed.to_forward_position(&there);
            assert_eq!(&back, position);
        }
    }

    #[test]
    fn coverage_intersection_across_two_sites() {
        let mut store = Pangenome::new(b"AAAAAAAAAACCCCCCCCCCGGGGGGGGGG".to_vec(), 3);
        store
            .insert(Variant::new(
                Breakpoint::new(10, 11),
                b"T".to_vec(),
                Coverage::from_members(vec![0, 2], 3),
            ))
            .unwrap();
        store
            .insert(Variant::new(
                Breakpoint::new(20, 21),
                b"T".to_vec(),
                Coverage::from_members(vec![1, 2], 3),
            ))
            .unwrap();
        let tree = pipeline(&store, 12);
        let collector = collect(&tree);
        // the doubly-alternate continuation is carried by member 2 alone
        assert!(collector
            .labels
            .iter()
            .any(|(label, members)| label == "TG" && members == &vec![2]));
        // and nobody else ever rides a doubly-alternate node
        let nested_nodes: Vec<_> = collector
            .nodes
            .iter()
            .filter(|(position, _)| {
                matches!(
                    position,
                    SeekPosition::Alternate { path, .. } if path.iter().any(|bit| bit)
                )
            })
            .collect();
        assert!(!nested_nodes.is_empty());
        for (_, node) in nested_nodes {
            assert!(!node.coverage().get(0) && !node.coverage().get(1));
        }
    }
}

