use binary_heap_plus::BinaryHeap;
use compare::Compare;
use crate::tree_node::NodeId;

/// Entry of the open-node queue.
/// Only carries what the comparator needs, the node itself stays in the arena.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuedNode {
    pub id: NodeId,
    pub depth: u32,
    pub quality: f64,
    pub solution_estimate: f64,
}

#[derive(Clone, Copy, Debug)]
/// Orders open nodes.
/// Without an incumbent the deepest node comes first (find a solution quickly),
/// with an incumbent the node with the lowest bound comes first.
pub struct NodeComparator {
    has_bound: bool,
}

impl NodeComparator {
    pub fn with_bound() -> Self {
        Self { has_bound: true }
    }

    pub fn without_bound() -> Self {
        Self { has_bound: false }
    }
}

impl Compare<QueuedNode> for NodeComparator {
    // greater -> popped earlier
    fn compare(&self, l: &QueuedNode, r: &QueuedNode) -> core::cmp::Ordering {
        if self.has_bound {
            r.quality.total_cmp(&l.quality)
                .then(l.depth.cmp(&r.depth))
                .then(r.id.0.cmp(&l.id.0))
        } else {
            l.depth.cmp(&r.depth)
                .then(r.solution_estimate.total_cmp(&l.solution_estimate))
                .then(r.id.0.cmp(&l.id.0))
        }
    }
}

/// Open nodes of the sequential search.
pub struct NodeQueue {
    queue: BinaryHeap<QueuedNode, NodeComparator>,
    did_swap_priority: bool,
}

impl NodeQueue {
    /// Create empty queue, ordered depth first
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::from_vec_cmp(vec![], NodeComparator::without_bound()),
            did_swap_priority: false,
        }
    }

    /// Switch to best-bound ordering once an incumbent exists
    pub fn now_has_bound(&mut self) {
        // only swap if not previously
        if !self.did_swap_priority {
            self.did_swap_priority = true;
            self.queue.replace_cmp(NodeComparator::with_bound());
        }
    }

    pub fn push(&mut self, node: QueuedNode) {
        self.queue.push(node);
    }

    pub fn pop(&mut self) -> Option<QueuedNode> {
        self.queue.pop()
    }

    /// Drop all open nodes, returning them
    pub fn flush(&mut self) -> Vec<QueuedNode> {
        self.queue.drain().collect()
    }

    pub fn lowest_bound(&self) -> Option<f64> {
        self.queue.iter().map(|i| i.quality).min_by(f64::total_cmp)
    }

    /// return number of elements in queue
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for NodeQueue {
    fn default() -> Self {
        Self::new()
    }
}
