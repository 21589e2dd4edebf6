// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The pigeonhole q-gram filter.
//!
//! Queries are cut into pieces of stride `delta = ⌊|q| / (errors + 1)⌋`; by
//! the pigeonhole principle at least one piece of every match within the
//! error budget occurs without errors, so probing a q-gram index of the
//! pieces against the label stream never loses a true match. A rolling hash
//! walks the stream; its three-word state is saved at every branch fork and
//! restored when the fork resumes.

use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;

use lazy_static::lazy_static;
use log::debug;

use crate::search::driver::TreeAlgorithm;
use crate::store::SequenceView;
use crate::tree::{Cargo, Node};

/// Symbol ranks are 3 bits wide: the DNA letters map to 0..4, everything
/// else folds deterministically into the remaining codes. Rank collisions
/// between exotic symbols can only produce extra seeds, never lose one.
const SYMBOL_BITS: u32 = 3;
const SIGMA: u64 = 1 << SYMBOL_BITS;
/// Longest shape a 64 bit rolling hash can hold.
const MAX_SHAPE: usize = (64 / SYMBOL_BITS) as usize;
/// Shapes shorter than this produce more seeds than they save; queries whose
/// own stride falls below it do not lower the global stride.
const MIN_DELTA: usize = 3;

lazy_static! {
    static ref RANKS: [u8; 256] = {
        let mut ranks = [0u8; 256];
        for (byte, rank) in ranks.iter_mut().enumerate() {
            *rank = match byte as u8 {
                b'A' | b'a' => 0,
                b'C' | b'c' => 1,
                b'G' | b'g' => 2,
                b'T' | b't' => 3,
                byte => 4 + (byte & 3),
            };
        }
        ranks
    };
}

fn rank(symbol: u8) -> u64 {
    RANKS[symbol as usize] as u64
}

/// A q-gram occurrence in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryQGram {
    pub query: usize,
    pub offset: usize,
}

/// A candidate match emitted by the filter: query `query` may match such
/// that its q-gram at `query_offset` aligns with the label stream ending at
/// journal coordinate `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHit {
    pub query: usize,
    pub query_offset: usize,
    pub end: usize,
}

/// The q-gram index over a query collection.
pub struct QGramIndex {
    shape: usize,
    step: usize,
    directory: HashMap<u64, Vec<QueryQGram>>,
}

impl QGramIndex {
    /// Build the index for the given maximum error rate.
    ///
    /// The stride is the smallest per-query `delta` of at least
    /// `MIN_DELTA`; if no query qualifies, the index is disabled (stride
    /// beyond every query, directory empty).
    pub fn build<S: AsRef<[u8]>>(queries: &[S], error_rate: f64) -> Self {
        let mut max_len = 0usize;
        let mut min_delta = usize::MAX;
        let mut max_delta = MIN_DELTA;
        for query in queries {
            let len = query.as_ref().len();
            if len == 0 {
                continue;
            }
            max_len = max_len.max(len);
            let errors = (error_rate * len as f64).floor() as usize;
            let delta = len / (errors + 1);
            if delta >= MIN_DELTA {
                min_delta = min_delta.min(delta);
                max_delta = max_delta.max(delta);
            }
        }
        if min_delta < MIN_DELTA {
            min_delta = max_delta;
        }
        if min_delta == usize::MAX {
            // disable: the stride outruns every query
            min_delta = max_len + 1;
        }
        let shape = min_delta.min(MAX_SHAPE);
        let step = min_delta;

        let mut directory: HashMap<u64, Vec<QueryQGram>> = HashMap::new();
        for (query_index, query) in queries.iter().enumerate() {
            let query = query.as_ref();
            let mut offset = 0;
            while offset + shape <= query.len() {
                let hash = hash_qgram(&query[offset..offset + shape]);
                directory.entry(hash).or_default().push(QueryQGram {
                    query: query_index,
                    offset,
                });
                offset += step;
            }
        }
        debug!(
            "q-gram index: shape {}, step {}, {} distinct hashes",
            shape,
            step,
            directory.len()
        );
        QGramIndex {
            shape,
            step,
            directory,
        }
    }

    pub fn shape(&self) -> usize {
        self.shape
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Can this query contribute seeds at all?
    pub fn covers(&self, query_len: usize) -> bool {
        query_len >= self.shape
    }

    fn occurrences(&self, hash: u64) -> &[QueryQGram] {
        self.directory
            .get(&hash)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn hash_qgram(qgram: &[u8]) -> u64 {
    qgram
        .iter()
        .fold(0, |hash, &symbol| hash * SIGMA + rank(symbol))
}

/// Rolling-hash state of one branch.
#[derive(Debug, Clone)]
struct FilterState {
    hash: u64,
    steps: usize,
    recent: VecDeque<u8>,
}

impl FilterState {
    fn fresh() -> Self {
        FilterState {
            hash: 0,
            steps: 0,
            recent: VecDeque::new(),
        }
    }
}

/// Streams tree labels through the rolling hash and reports seed hits.
pub struct PigeonholeFilter<'a, F> {
    index: &'a QGramIndex,
    left_factor: u64,
    states: Vec<FilterState>,
    on_hit: F,
}

impl<'a, F> PigeonholeFilter<'a, F> {
    pub fn new(index: &'a QGramIndex, on_hit: F) -> Self {
        PigeonholeFilter {
            index,
            left_factor: SIGMA.pow(index.shape() as u32 - 1),
            states: Vec::new(),
            on_hit,
        }
    }
}

impl<'a, V, F> TreeAlgorithm<V> for PigeonholeFilter<'a, F>
where
    V: SequenceView,
    F: FnMut(SeedHit, &Node) -> ControlFlow<()>,
{
    fn visit(&mut self, cargo: &Cargo<'_, V>) -> ControlFlow<()> {
        let left_factor = self.left_factor;
        let PigeonholeFilter {
            index,
            states,
            on_hit,
            ..
        } = self;
        let shape = index.shape();
        let state = states
            .last_mut()
            .expect("bug: filter visited without a state");
        let start = cargo.label_start();

        for (i, symbol) in cargo.stream_label().enumerate() {
            if state.steps >= shape {
                let left = state
                    .recent
                    .pop_front()
                    .expect("bug: rolling window drained");
                state.hash = (state.hash - rank(left) * left_factor) * SIGMA + rank(symbol);
            } else {
                state.hash = state.hash * SIGMA + rank(symbol);
                state.steps += 1;
            }
            state.recent.push_back(symbol);

            if state.steps == shape && !cargo.coverage().none() {
                let end = start + i + 1;
                for &occurrence in index.occurrences(state.hash) {
                    let hit = SeedHit {
                        query: occurrence.query,
                        query_offset: occurrence.offset,
                        end,
                    };
                    if let ControlFlow::Break(()) = (on_hit)(hit, cargo.node()) {
                        return ControlFlow::Break(());
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_push(&mut self) {
        let state = self
            .states
            .last()
            .cloned()
            .unwrap_or_else(FilterState::fresh);
        self.states.push(state);
    }

    fn on_pop(&mut self) {
        self.states.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_follows_the_smallest_eligible_delta() {
        let queries: Vec<&[u8]> = vec![b"ACGTACGTACGT", b"ACGTACGT"];
        // 12 / (1 + 1) = 6 and 8 / (1 + 1) = 4 at 12.5% errors
        let index = QGramIndex::build(&queries, 0.125);
        assert_eq!(index.step(), 4);
        assert_eq!(index.shape(), 4);
    }

    #[test]
    fn ineligible_deltas_do_not_lower_the_stride() {
        let queries: Vec<&[u8]> = vec![b"ACGTACGT", b"ACG"];
        // delta of the short query is 1 at a 34% error rate; the long one
        // contributes 8 / 3 = 2 -> also ineligible -> disabled
        let index = QGramIndex::build(&queries, 0.34);
        assert!(index.step() > 8);
        assert!(index.is_empty());
    }

    #[test]
    fn exact_queries_index_one_piece_per_stride() {
        let queries: Vec<&[u8]> = vec![b"CCCCGGGG"];
        let index = QGramIndex::build(&queries, 0.0);
        assert_eq!(index.step(), 8);
        assert_eq!(index.shape(), 8);
        let hash = hash_qgram(b"CCCCGGGG");
        assert_eq!(
            index.occurrences(hash),
            &[QueryQGram {
                query: 0,
                offset: 0
            }]
        );
    }

    #[test]
    fn rolling_hash_equals_direct_hash() {
        let text = b"ACGTTGCAACGT";
        let shape = 5;
        let left_factor = SIGMA.pow(shape as u32 - 1);
        let mut hash = hash_qgram(&text[..shape]);
        for i in shape..text.len() {
            hash = (hash - rank(text[i - shape]) * left_factor) * SIGMA + rank(text[i]);
            assert_eq!(hash, hash_qgram(&text[i + 1 - shape..i + 1]));
        }
    }
}
