//! Composable tree capabilities.
//!
//! The original adaptor stack wrapped trees in layers, each widening the node
//! interface. Here the composition is a pipeline of values: every adaptor
//! call on [`TreePipeline`] adds one capability, and the assembled
//! [`Capabilities`] steer one monomorphized node implementation. An adaptor
//! never changes which labels the tree produces — only their shape (length),
//! their coverage, or their multiplicity.

use crate::store::SequenceView;
use crate::tree::SequenceTree;

/// The capability set assembled by a [`TreePipeline`].
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Label window: alternate branches carry `window - 1` symbols of context
    /// past their edit, so every window crossing the edit is emitted.
    pub(crate) window: usize,
    /// Propagate coverage along edges (`∧ cov` on alternate, `∧ ¬cov` on
    /// reference edges).
    pub(crate) coloured: bool,
    /// Collapse branches back into the reference path: regain coverage at
    /// high breakends and end alternate branches at their label bound. This
    /// is what makes every distinct context appear exactly once.
    pub(crate) merged: bool,
    /// Drop children whose coverage became empty (children that still hold
    /// pending regains keep walking, they only look empty).
    pub(crate) pruned: bool,
    /// Bound each alternate subtree's label to `|alt| + trim` symbols,
    /// overriding the labelled window.
    pub(crate) trim: Option<usize>,
    /// Widen emitted cargo labels by up to this many parent-path symbols.
    pub(crate) left_extension: usize,
    /// Maintain seek descriptors on alternate paths.
    pub(crate) seekable: bool,
    /// Single-pass contract: node iterators are invalidated by each advance.
    /// Statically guaranteed by the borrow rules; kept as a marker so that
    /// pipelines read like the adaptor stacks they replace.
    pub(crate) volatile: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            window: 1,
            coloured: false,
            merged: false,
            pruned: false,
            trim: None,
            left_extension: 0,
            seekable: false,
            volatile: false,
        }
    }
}

impl Capabilities {
    /// Symbols an alternate branch may emit past its recorded edit.
    pub(crate) fn branch_budget(&self) -> usize {
        self.trim.unwrap_or_else(|| self.window.saturating_sub(1))
    }
}

/// Builder pipeline over a store view; `build` yields the configured tree.
///
/// ```
/// use pantree::{Pangenome, TreePipeline};
///
/// let store = Pangenome::new(b"ACGTACGT".to_vec(), 1);
/// let tree = TreePipeline::new(&store)
///     .labelled(8)
///     .coloured()
///     .merged()
///     .pruned()
///     .seekable()
///     .build();
/// // without variants the root walks the whole reference in one label
/// assert_eq!(tree.root().label_range(), (0, 8));
/// ```
pub struct TreePipeline<V> {
    view: V,
    capabilities: Capabilities,
}

impl<V: SequenceView> TreePipeline<V> {
    pub fn new(view: V) -> Self {
        TreePipeline {
            view,
            capabilities: Capabilities::default(),
        }
    }

    /// Attach label emission with the given context window.
    pub fn labelled(mut self, window: usize) -> Self {
        assert!(window > 0, "bug: label window of zero");
        self.capabilities.window = window;
        self
    }

    /// Attach coverage propagation.
    pub fn coloured(mut self) -> Self {
        self.capabilities.coloured = true;
        self
    }

    /// Collapse redundant reference continuations (context uniqueness).
    pub fn merged(mut self) -> Self {
        self.capabilities.merged = true;
        self
    }

    /// Drop subtrees whose coverage became empty.
    pub fn pruned(mut self) -> Self {
        self.capabilities.pruned = true;
        self
    }

    /// Bound alternate subtree labels to `|alt| + k` symbols.
    pub fn trim(mut self, k: usize) -> Self {
        self.capabilities.trim = Some(k);
        self
    }

    /// Prepend up to `k` parent-path symbols to each cargo label.
    pub fn left_extend(mut self, k: usize) -> Self {
        self.capabilities.left_extension = k;
        self
    }

    /// Maintain seek positions for every node.
    pub fn seekable(mut self) -> Self {
        self.capabilities.seekable = true;
        self
    }

    /// Mark the tree single-pass.
    pub fn volatile(mut self) -> Self {
        self.capabilities.volatile = true;
        self
    }

    pub fn build(self) -> SequenceTree<V> {
        SequenceTree::new(self.view, self.capabilities)
    }
}
