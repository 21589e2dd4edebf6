use crate::coverage::Coverage;
use crate::journal::Symbols;
use crate::store::SequenceView;
use crate::tree::node::Node;
use crate::tree::seek::SeekPosition;
use crate::tree::SequenceTree;

/// The observable payload of a node: its label, the path sequence leading to
/// it, its coverage and its seek position.
///
/// A cargo borrows the node on the traversal stack and the tree it came from;
/// it never outlives either. Seek positions are the only handle that survives
/// the node.
pub struct Cargo<'a, V> {
    node: &'a Node,
    tree: &'a SequenceTree<V>,
}

impl<'a, V: SequenceView> Cargo<'a, V> {
    pub(crate) fn new(node: &'a Node, tree: &'a SequenceTree<V>) -> Self {
        Cargo { node, tree }
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// Journal coordinate where this node's own label starts.
    pub fn label_start(&self) -> usize {
        let (start, _) = self.node.label_range();
        start
    }

    /// Journal coordinate one past this node's label.
    pub fn label_end(&self) -> usize {
        let (_, end) = self.node.label_range();
        end
    }

    /// This node's label, widened to the left by the pipeline's
    /// left-extension capability.
    pub fn label(&self) -> Symbols<'a, V> {
        let (start, end) = self.node.label_range();
        let start = start.saturating_sub(self.tree.capabilities().left_extension);
        self.node.journal().symbols(self.tree.view(), start, end)
    }

    /// The raw streaming label: exactly the node's fresh symbols, the shape
    /// resumable algorithms consume across branch forks.
    pub fn stream_label(&self) -> Symbols<'a, V> {
        let (start, end) = self.node.label_range();
        self.node.journal().symbols(self.tree.view(), start, end)
    }

    /// The label plus everything on the path from the root.
    pub fn path_sequence(&self) -> Symbols<'a, V> {
        self.node
            .journal()
            .symbols(self.tree.view(), 0, self.label_end())
    }

    /// Members currently on this path.
    pub fn coverage(&self) -> &'a Coverage {
        self.node.coverage()
    }

    /// The node's seek position.
    pub fn position(&self) -> SeekPosition {
        self.node.seek_position(self.tree.view())
    }
}
