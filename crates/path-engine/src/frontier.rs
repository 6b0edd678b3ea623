use crate::graph::NodeIndex;
use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Heap entry ordered as a min-heap on (distance, node index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrontierEntry {
    distance: OrderedFloat<f64>,
    node: NodeIndex,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the smallest distance first.
        // Equal distances pop the lower index, i.e. the node declared first.
        Reverse((self.distance, self.node)).cmp(&Reverse((other.distance, other.node)))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority frontier with lazy deletion.
///
/// A decrease-key pushes a fresh entry; the superseded one stays in the heap
/// and is skipped on extraction because its node is already finalized.
#[derive(Debug)]
pub(crate) struct Frontier {
    heap: BinaryHeap<FrontierEntry>,
    finalized: Vec<bool>,
}

impl Frontier {
    pub(crate) fn new(num_nodes: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            finalized: vec![false; num_nodes],
        }
    }

    /// Insert `node` or lower its key. Finalized nodes are ignored.
    pub(crate) fn push_or_decrease(&mut self, node: NodeIndex, distance: f64) {
        if self.is_finalized(node) {
            return;
        }
        self.heap.push(FrontierEntry {
            distance: OrderedFloat(distance),
            node,
        });
    }

    /// Pop the unfinalized node with the smallest key and finalize it.
    pub(crate) fn pop_min(&mut self) -> Option<(NodeIndex, f64)> {
        while let Some(FrontierEntry { distance, node }) = self.heap.pop() {
            let Some(done) = self.finalized.get_mut(node as usize) else {
                continue;
            };
            if *done {
                continue; // stale
            }
            *done = true;
            return Some((node, distance.into_inner()));
        }
        None
    }

    pub(crate) fn is_finalized(&self, node: NodeIndex) -> bool {
        self.finalized.get(node as usize).copied().unwrap_or(false)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap
            .iter()
            .all(|entry| self.is_finalized(entry.node))
    }
}
