// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Bidirectional verification of seed hits.
//!
//! Every seed pins an error-free q-gram. The remaining query suffix is
//! matched rightwards on an extension walk of the forward store; for every
//! surviving right branch the reversed query prefix is matched leftwards on
//! an extension walk of the reversed store, rooted at the journal-projected
//! q-gram start. Extensions use strict coverage semantics (no merging): a
//! member reported by a leaf shares the walked context over the whole
//! extension window.

use std::ops::ControlFlow;

use crate::coverage::Coverage;
use crate::journal::Location;
use crate::search::driver::{Traversal, TreeAlgorithm};
use crate::search::filter::SeedHit;
use crate::search::myers::{MyersState, RestorableMyers};
use crate::store::{Pangenome, ReversedPangenome, SequenceView};
use crate::tree::{Cargo, Node, SeekPosition, TreePipeline};

/// One qualified extension: the best error count seen on the branch, the
/// number of haystack symbols consumed at that optimum, and the members
/// still on the branch when the extension window closed.
#[derive(Debug, Clone)]
pub(crate) struct ExtensionOutcome {
    pub(crate) errors: usize,
    pub(crate) steps: usize,
    pub(crate) coverage: Coverage,
}

#[derive(Debug, Clone)]
struct ExtensionState {
    myers: MyersState,
    step: usize,
    best_errors: usize,
    best_step: usize,
}

/// Runs the resumable prefix matcher over an extension walk and collects an
/// outcome per branch that reaches the full extension window within budget.
struct ExtensionMatcher<'m> {
    myers: &'m RestorableMyers,
    max_step: usize,
    budget: usize,
    states: Vec<ExtensionState>,
    outcomes: Vec<ExtensionOutcome>,
}

impl<'m> ExtensionMatcher<'m> {
    fn new(myers: &'m RestorableMyers, budget: usize) -> Self {
        ExtensionMatcher {
            myers,
            max_step: myers.len() + budget,
            budget,
            states: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn into_outcomes(self) -> Vec<ExtensionOutcome> {
        self.outcomes
    }
}

impl<'m, V: SequenceView> TreeAlgorithm<V> for ExtensionMatcher<'m> {
    fn visit(&mut self, cargo: &Cargo<'_, V>) -> ControlFlow<()> {
        let max_step = self.max_step;
        let budget = self.budget;
        let ExtensionMatcher {
            myers,
            states,
            outcomes,
            ..
        } = self;
        let state = states
            .last_mut()
            .expect("bug: extension visited without a state");
        if state.step >= max_step {
            return ControlFlow::Continue(());
        }
        let target = myers.len();
        let anchor_distance = |step: usize| (step as isize - target as isize).abs();
        for symbol in cargo.stream_label() {
            let score = myers.step(&mut state.myers, symbol);
            state.step += 1;
            // among equally good alignments prefer the one closest to the
            // plain substitution span, it anchors the reported position
            if score < state.best_errors
                || (score == state.best_errors
                    && anchor_distance(state.step) < anchor_distance(state.best_step))
            {
                state.best_errors = score;
                state.best_step = state.step;
            }
            if state.step == max_step {
                if state.best_errors <= budget {
                    outcomes.push(ExtensionOutcome {
                        errors: state.best_errors,
                        steps: state.best_step,
                        coverage: cargo.coverage().clone(),
                    });
                }
                break;
            }
        }
        ControlFlow::Continue(())
    }

    fn on_push(&mut self) {
        let state = self.states.last().cloned().unwrap_or(ExtensionState {
            myers: self.myers.start(),
            step: 0,
            best_errors: usize::MAX,
            best_step: 0,
        });
        self.states.push(state);
    }

    fn on_pop(&mut self) {
        self.states.pop();
    }
}

/// Everything a seed verification needs besides the seed itself.
pub(crate) struct Verifier<'s> {
    store: &'s Pangenome,
    reversed: ReversedPangenome<'s>,
    shape: usize,
}

/// A qualified match before per-member expansion.
pub(crate) struct VerifiedHit {
    pub(crate) query: usize,
    pub(crate) member: usize,
    pub(crate) position: usize,
    pub(crate) errors: usize,
    pub(crate) seed: SeekPosition,
}

impl<'s> Verifier<'s> {
    pub(crate) fn new(store: &'s Pangenome, shape: usize) -> Self {
        Verifier {
            store,
            reversed: store.reversed(),
            shape,
        }
    }

    /// Verify one seed hit and emit a [`VerifiedHit`] per covered member.
    pub(crate) fn verify<F>(
        &self,
        seed_node: &Node,
        hit: SeedHit,
        query: &[u8],
        error_count: usize,
        mut emit: F,
    ) -> ControlFlow<()>
    where
        F: FnMut(VerifiedHit) -> ControlFlow<()>,
    {
        let h_end = hit.end;
        let h_start = h_end - self.shape;
        let coverage = seed_node.seed_coverage(h_start);
        if coverage.none() {
            return ControlFlow::Continue(());
        }
        let seed_position = seed_node.seek_position(self.store);

        let suffix = &query[hit.query_offset + self.shape..];
        let prefix = &query[..hit.query_offset];

        let right_outcomes = if suffix.is_empty() {
            vec![ExtensionOutcome {
                errors: 0,
                steps: 0,
                coverage,
            }]
        } else {
            self.extend_right(seed_node, coverage, h_end, suffix, error_count)
        };

        for right in right_outcomes {
            let remaining = error_count - right.errors;
            let left_outcomes = if prefix.is_empty() {
                vec![ExtensionOutcome {
                    errors: 0,
                    steps: 0,
                    coverage: right.coverage.clone(),
                }]
            } else {
                self.extend_left(seed_node, right.coverage.clone(), h_start, prefix, remaining)
            };

            for left in left_outcomes {
                let errors = right.errors + left.errors;
                debug_assert!(errors <= error_count);
                for member in left.coverage.members() {
                    let anchor = self.member_coordinate(seed_node, member, h_start);
                    let hit = VerifiedHit {
                        query: hit.query,
                        member,
                        position: anchor - left.steps,
                        errors,
                        seed: seed_position.clone(),
                    };
                    if let ControlFlow::Break(()) = emit(hit) {
                        return ControlFlow::Break(());
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    // Match the query suffix rightwards from the q-gram end.
    fn extend_right(
        &self,
        seed_node: &Node,
        coverage: Coverage,
        h_end: usize,
        suffix: &[u8],
        error_count: usize,
    ) -> Vec<ExtensionOutcome> {
        let budget = suffix.len() + error_count;
        let tree = TreePipeline::new(self.store)
            .labelled(1)
            .coloured()
            .pruned()
            .trim(budget)
            .volatile()
            .build();

        let mut root = seed_node.clone();
        root.clear_pendings();
        root.set_coverage(coverage);
        root.set_label_start(h_end);
        root.set_label_bound(h_end + budget);

        let myers = RestorableMyers::new(suffix);
        let mut matcher = ExtensionMatcher::new(&myers, error_count);
        let _ = Traversal::new(&tree).run(root, &mut matcher);
        matcher.into_outcomes()
    }

    // Match the reversed query prefix leftwards from the q-gram start.
    fn extend_left(
        &self,
        seed_node: &Node,
        coverage: Coverage,
        h_start: usize,
        prefix: &[u8],
        error_count: usize,
    ) -> Vec<ExtensionOutcome> {
        let budget = prefix.len() + error_count;
        let view = &self.reversed;
        let tree = TreePipeline::new(view)
            .labelled(1)
            .coloured()
            .pruned()
            .trim(budget)
            .volatile()
            .build();

        let ref_len = self.store.source().len();
        let root = match seed_node.journal().locate(h_start) {
            Location::Reference { position } => {
                let frontier = ref_len - position;
                tree.rooted_at(frontier, coverage, frontier + budget)
            }
            Location::Alternate { variant, offset } => {
                let slot = self.reversed.reversed_slot(variant);
                let frontier = view.low(slot);
                let alt_len = view.alt_len(slot);
                let label_start = frontier + (alt_len - offset);
                Node::alternate_root(view, slot, coverage, label_start, label_start + budget)
            }
        };

        let reversed_prefix: Vec<u8> = prefix.iter().rev().cloned().collect();
        let myers = RestorableMyers::new(&reversed_prefix);
        let mut matcher = ExtensionMatcher::new(&myers, error_count);
        let _ = Traversal::new(&tree).run(root, &mut matcher);
        matcher.into_outcomes()
    }

    // Member coordinate of a journal coordinate of the seed path.
    fn member_coordinate(&self, seed_node: &Node, member: usize, at: usize) -> usize {
        match seed_node.journal().locate(at) {
            Location::Reference { position } => self.store.member_position(member, position),
            Location::Alternate { variant, offset } => {
                let record = self.store.variant(variant);
                let base = self.store.member_position(member, record.low());
                if record.breakpoint().span() == 0 {
                    // an insertion at its own anchor already counted itself
                    base - record.alt().len() + offset
                } else {
                    base + offset
                }
            }
        }
    }
}
