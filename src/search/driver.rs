//! The traversal driver: a stack-based scheduler pairing tree nodes with
//! algorithm snapshots.
//!
//! The driver owns the only active control flow of a search. It keeps the
//! node stack; the algorithm keeps a parallel snapshot stack which it grows
//! and shrinks in its `on_push`/`on_pop` hooks. A reference child replaces
//! the stack top and the algorithm sees a straight continuation; an alternate
//! child is pushed on top together with a snapshot copy and is exhausted
//! first, so labels stream in depth-first pre-order, alternate before
//! reference, stable across runs.

use std::ops::ControlFlow;

use crate::store::SequenceView;
use crate::tree::{Cargo, Node, SequenceTree};

/// A resumable tree algorithm (filter or verifier).
///
/// `visit` consumes one node's label and may report through its own channel;
/// returning `ControlFlow::Break` cancels the traversal. Cancellation is only
/// observed at node granularity, i.e. at push/pop boundaries; results already
/// delivered stay valid.
pub trait TreeAlgorithm<V: SequenceView> {
    fn visit(&mut self, cargo: &Cargo<'_, V>) -> ControlFlow<()>;
    /// A branch forked: save the current state.
    fn on_push(&mut self);
    /// A branch was exhausted: restore the fork state.
    fn on_pop(&mut self);
}

/// Drives one algorithm over one tree.
pub struct Traversal<'a, V> {
    tree: &'a SequenceTree<V>,
    stack: Vec<Node>,
    spent: bool,
}

impl<'a, V: SequenceView> Traversal<'a, V> {
    pub fn new(tree: &'a SequenceTree<V>) -> Self {
        Traversal {
            tree,
            stack: Vec::new(),
            spent: false,
        }
    }

    /// Walk the subtree under `root`, feeding every label to `algorithm`.
    pub fn run<A>(&mut self, root: Node, algorithm: &mut A) -> ControlFlow<()>
    where
        A: TreeAlgorithm<V>,
    {
        let view = self.tree.view();
        let capabilities = *self.tree.capabilities();
        assert!(
            !(capabilities.volatile && self.spent),
            "bug: volatile tree traversed twice"
        );
        self.spent = true;

        self.stack.clear();
        self.stack.push(root);
        algorithm.on_push();

        loop {
            let terminal = match self.stack.last() {
                None => break,
                Some(top) => {
                    let cargo = self.tree.cargo(top);
                    if let ControlFlow::Break(()) = algorithm.visit(&cargo) {
                        return ControlFlow::Break(());
                    }
                    top.is_terminal(view)
                }
            };

            if terminal {
                self.stack.pop();
                algorithm.on_pop();
                continue;
            }

            let node = self.stack.pop().expect("bug: traversal stack underflow");
            match node.bifurcate(view, &capabilities) {
                (Some(alt), Some(reference)) => {
                    self.stack.push(reference);
                    self.stack.push(alt);
                    algorithm.on_push();
                }
                (None, Some(reference)) => self.stack.push(reference),
                // the reference continuation died, the branch takes over the
                // running state without a fork
                (Some(alt), None) => self.stack.push(alt),
                (None, None) => algorithm.on_pop(),
            }
        }
        ControlFlow::Continue(())
    }
}
