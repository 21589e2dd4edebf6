// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The filter-and-verify search pipeline: pigeonhole q-gram filter over the
//! sequence tree, bidirectional Myers verification around every seed.

use std::collections::HashSet;
use std::ops::ControlFlow;

use derive_builder::Builder;
use derive_new::new;
use getset::{CopyGetters, Getters};
use log::{debug, warn};

use crate::errors::Result;
use crate::search::myers::MAX_PATTERN_LEN;
use crate::search::verify::Verifier;
use crate::store::Pangenome;
use crate::tree::TreePipeline;

pub(crate) mod driver;
pub(crate) mod filter;
pub(crate) mod myers;
pub(crate) mod verify;

pub use self::driver::{Traversal, TreeAlgorithm};
pub use self::filter::{PigeonholeFilter, QGramIndex, SeedHit};
pub use self::myers::{MyersState, RestorableMyers};

/// One query sequence with its external id.
#[derive(new, Debug, Clone, Getters)]
pub struct Query {
    #[getset(get = "pub")]
    id: String,
    #[getset(get = "pub")]
    sequence: Vec<u8>,
}

/// One reported match.
#[derive(new, Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct MatchRecord {
    #[getset(get = "pub")]
    query_id: String,
    #[getset(get_copy = "pub")]
    member: usize,
    #[getset(get_copy = "pub")]
    position: usize,
    #[getset(get_copy = "pub")]
    errors: usize,
}

/// Search parameters supplied by the caller.
#[derive(Debug, Clone, Builder, CopyGetters)]
pub struct SearchConfig {
    /// Maximum error rate per query, in `[0, 1]`.
    #[getset(get_copy = "pub")]
    error_rate: f64,
    /// Expected context width; queries longer than this are skipped.
    /// `0` means every query brings its own width.
    #[builder(default)]
    #[getset(get_copy = "pub")]
    context_size: usize,
    /// Number of query batches processed independently (the unit an outer
    /// scheduler may distribute; the core runs them sequentially).
    #[builder(default = "1")]
    #[getset(get_copy = "pub")]
    bin_count: usize,
}

/// Map every query against every member sequence of the store.
///
/// Matches stream to `on_match` in traversal order; returning
/// `ControlFlow::Break` cancels the search after the current node, keeping
/// everything already delivered. Empty and unindexable queries are recovered
/// locally (skipped with a log line), never failing the batch.
pub fn search<F>(
    store: &Pangenome,
    queries: &[Query],
    config: &SearchConfig,
    mut on_match: F,
) -> Result<()>
where
    F: FnMut(MatchRecord) -> ControlFlow<()>,
{
    assert!(
        (0.0..=1.0).contains(&config.error_rate()),
        "bug: error rate outside [0, 1]"
    );
    assert!(config.bin_count() >= 1, "bug: bin count of zero");

    let mut seen: HashSet<(usize, usize, usize)> = HashSet::new();
    let bin_len = (queries.len() + config.bin_count() - 1) / config.bin_count();
    if bin_len == 0 {
        return Ok(());
    }

    for (bin, chunk) in queries.chunks(bin_len).enumerate() {
        let bin_start = bin * bin_len;
        let sequences: Vec<&[u8]> = chunk.iter().map(|q| q.sequence().as_slice()).collect();
        let index = QGramIndex::build(&sequences, config.error_rate());
        if index.is_empty() {
            debug!("bin {}: filter disabled, no query yields a stride", bin);
            continue;
        }

        // per-query admission: recovered locally, the bin keeps running
        let usable: Vec<bool> = chunk
            .iter()
            .map(|query| {
                let len = query.sequence().len();
                if len == 0 {
                    debug!("query {} is empty, skipped", query.id());
                    return false;
                }
                if config.context_size() > 0 && len > config.context_size() {
                    warn!(
                        "query {} exceeds the context width ({} > {}), skipped",
                        query.id(),
                        len,
                        config.context_size()
                    );
                    return false;
                }
                if len.saturating_sub(index.shape()) > MAX_PATTERN_LEN {
                    warn!(
                        "query {} exceeds the verification word ({} > {} + {}), skipped",
                        query.id(),
                        len,
                        MAX_PATTERN_LEN,
                        index.shape()
                    );
                    return false;
                }
                if !index.covers(len) {
                    debug!(
                        "query {} is shorter than the shape ({} < {}), filter disabled for it",
                        query.id(),
                        len,
                        index.shape()
                    );
                }
                true
            })
            .collect();

        let error_counts: Vec<usize> = chunk
            .iter()
            .map(|query| (config.error_rate() * query.sequence().len() as f64).floor() as usize)
            .collect();

        let tree = TreePipeline::new(store)
            .labelled(index.shape())
            .coloured()
            .merged()
            .pruned()
            .seekable()
            .volatile()
            .build();
        let verifier = Verifier::new(store, index.shape());

        let seen = &mut seen;
        let on_match = &mut on_match;
        let mut filter = PigeonholeFilter::new(&index, |hit: SeedHit, node: &crate::tree::Node| {
            if !usable[hit.query] {
                return ControlFlow::Continue(());
            }
            let global = bin_start + hit.query;
            let query = &chunk[hit.query];
            verifier.verify(
                node,
                hit,
                query.sequence(),
                error_counts[hit.query],
                |verified| {
                    if !seen.insert((global, verified.member, verified.position)) {
                        return ControlFlow::Continue(());
                    }
                    debug!(
                        "query {}: member {} at {} with {} errors (seed {:?})",
                        query.id(),
                        verified.member,
                        verified.position,
                        verified.errors,
                        verified.seed
                    );
                    on_match(MatchRecord::new(
                        query.id().clone(),
                        verified.member,
                        verified.position,
                        verified.errors,
                    ))
                },
            )
        });

        if let ControlFlow::Break(()) = Traversal::new(&tree).run(tree.root(), &mut filter) {
            debug!("search cancelled by the caller");
            return Ok(());
        }
    }
    Ok(())
}
