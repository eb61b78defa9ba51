//! Edmonds-Karp max-flow over the shared residual store: shortest augmenting
//! paths found by BFS from the source, pushed one bottleneck at a time. Kept
//! as the independent reference the randomized tests and benches compare the
//! push-relabel engine against.
use std::collections::VecDeque;
use std::time::Instant;

use bitvec::vec::BitVec;
use log::debug;

use crate::edge::EdgeSlot;
use crate::graph::{INVALID_NODE_ID, NodeID, NodeName};
use crate::max_flow::{FlowError, FlowValue, MaxFlow};
use crate::residual_graph::ResidualGraph;

pub struct EdmondsKarp<T> {
    graph: ResidualGraph<T>,
    source: NodeID,
    sink: NodeID,
    max_flow: T,
    finished: bool,
}

impl<T: FlowValue> EdmondsKarp<T> {
    pub fn new(
        graph: ResidualGraph<T>,
        source_name: NodeName,
        sink_name: NodeName,
    ) -> Result<Self, FlowError> {
        let source = graph
            .node_by_name(source_name)
            .ok_or(FlowError::UnknownNode(source_name))?;
        let sink = graph
            .node_by_name(sink_name)
            .ok_or(FlowError::UnknownNode(sink_name))?;
        if source == sink {
            return Err(FlowError::InvalidParameter(
                "source and sink must be distinct".to_string(),
            ));
        }

        Ok(Self {
            graph,
            source,
            sink,
            max_flow: T::zero(),
            finished: false,
        })
    }

    pub fn graph(&self) -> &ResidualGraph<T> {
        &self.graph
    }

    /// BFS for a shortest residual path from source to sink. `parents` records
    /// the incoming edge slot per discovered node; the return value is the
    /// bottleneck residual capacity of the found path.
    fn augmenting_path(&self, parents: &mut Vec<EdgeSlot>) -> Option<T> {
        parents.clear();
        parents.resize(
            self.graph.number_of_nodes(),
            EdgeSlot::new(INVALID_NODE_ID, 0),
        );
        let mut queue = VecDeque::with_capacity(self.graph.number_of_nodes());
        queue.push_back(self.source);

        while let Some(node) = queue.pop_front() {
            for (offset, edge) in self.graph.out_edges(node).iter().enumerate() {
                let target = edge.target;
                if target == self.source
                    || parents[target].node != INVALID_NODE_ID
                    || edge.residual_capacity() <= T::zero()
                {
                    continue;
                }
                parents[target] = EdgeSlot::new(node, offset);
                if target == self.sink {
                    // unwind once to find the bottleneck
                    let mut bottleneck = T::max_value();
                    let mut current = self.sink;
                    while current != self.source {
                        let slot = parents[current];
                        let residual = self.graph.edge(slot).residual_capacity();
                        if residual < bottleneck {
                            bottleneck = residual;
                        }
                        current = slot.node;
                    }
                    return Some(bottleneck);
                }
                queue.push_back(target);
            }
        }
        None
    }
}

impl<T: FlowValue> MaxFlow<T> for EdmondsKarp<T> {
    fn run(&mut self) -> Result<T, FlowError> {
        let start = Instant::now();
        self.graph.reset_flows();
        for index in 0..self.graph.number_of_nodes() {
            self.graph.node_mut(index).excess = T::zero();
        }

        let mut parents: Vec<EdgeSlot> = Vec::new();
        let mut augmentations = 0usize;
        while let Some(bottleneck) = self.augmenting_path(&mut parents) {
            let mut current = self.sink;
            while current != self.source {
                let slot = parents[current];
                self.graph.push_flow(slot, bottleneck);
                current = slot.node;
            }
            augmentations += 1;
        }

        self.max_flow = self.graph.node(self.sink).excess;
        self.finished = true;
        debug!(
            "Edmonds-Karp finished after {} augmentations in {:?}",
            augmentations,
            start.elapsed()
        );
        Ok(self.max_flow)
    }

    fn max_flow(&self) -> Result<T, FlowError> {
        if !self.finished {
            return Err(FlowError::FlowNotComputed);
        }
        Ok(self.max_flow)
    }

    fn sink_partition(&self) -> Result<BitVec, FlowError> {
        if !self.finished {
            return Err(FlowError::FlowNotComputed);
        }
        Ok(self.graph.reachable_from_sink(self.sink, T::zero()))
    }
}
