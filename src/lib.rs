// Copyright 2016-2021 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for approximate read mapping on referentially compressed
//! pan-genomes.
//!
//! A pan-genome is stored as one reference sequence plus a positionally
//! indexed, coverage-annotated catalog of structural differences
//! (substitutions, insertions, deletions, replacements) observed across a
//! population of member sequences. The [`tree`] module enumerates every
//! distinct contextual window of every member exactly once without ever
//! materializing the members; the [`search`] module rides a pigeonhole
//! q-gram filter and a bidirectional bit-parallel verifier on top of that
//! enumeration to answer approximate mapping queries.
//!
//! ```
//! use std::ops::ControlFlow;
//! use pantree::{search, Pangenome, Query, SearchConfigBuilder};
//!
//! let store = Pangenome::new(b"AAAACCCCGGGGTTTT".to_vec(), 1);
//! let queries = vec![Query::new("read-1".into(), b"CCCCGGGG".to_vec())];
//! let config = SearchConfigBuilder::default()
//!     .error_rate(0.0)
//!     .build()
//!     .unwrap();
//!
//! let mut matches = Vec::new();
//! search(&store, &queries, &config, |record| {
//!     matches.push(record);
//!     ControlFlow::Continue(())
//! })
//! .unwrap();
//!
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].member(), 0);
//! assert_eq!(matches[0].position(), 4);
//! assert_eq!(matches[0].errors(), 0);
//! ```

pub mod coverage;
pub mod errors;
pub mod journal;
pub mod search;
pub mod store;
pub mod tree;
pub mod variant;

pub use crate::coverage::Coverage;
pub use crate::errors::{Error, Result};
pub use crate::journal::{Journal, Location};
pub use crate::search::{
    search, MatchRecord, Query, SearchConfig, SearchConfigBuilder,
};
pub use crate::store::{Pangenome, ReversedPangenome, SequenceView, VariantRef};
pub use crate::tree::{
    BreakendTag, Cargo, Node, SeekPosition, SequenceTree, TreePipeline,
};
pub use crate::variant::{Breakpoint, Variant, VariantKind};
