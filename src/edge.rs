use crate::graph::NodeID;
use crate::max_flow::FlowValue;

/// Stable locator of an edge: the node whose adjacency list owns it, plus the
/// position within that list. Adjacency lists only grow, so a slot stays valid
/// for the lifetime of the store even when edge storage reallocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeSlot {
    pub node: NodeID,
    pub offset: usize,
}

impl EdgeSlot {
    pub fn new(node: NodeID, offset: usize) -> EdgeSlot {
        EdgeSlot { node, offset }
    }
}

/// One direction of a paired residual edge. Forward edges carry the supplied
/// capacity; their reverses are created alongside with capacity zero. Flow may
/// be negative on a reverse edge, the pair always satisfies
/// `flow(e) + flow(reverse(e)) = 0`.
#[derive(Clone, Copy, Debug)]
pub struct ResidualEdge<T> {
    pub source: NodeID,
    pub target: NodeID,
    pub capacity: T,
    pub flow: T,
    /// Locator of the paired reverse edge, owned by `target`.
    pub reversed: EdgeSlot,
}

impl<T: FlowValue> ResidualEdge<T> {
    #[inline]
    pub fn residual_capacity(&self) -> T {
        self.capacity - self.flow
    }
}

#[test]
fn residual_capacity_subtracts_flow() {
    let edge = ResidualEdge {
        source: 0,
        target: 1,
        capacity: 7,
        flow: 3,
        reversed: EdgeSlot::new(1, 0),
    };
    assert_eq!(4, edge.residual_capacity());
}
