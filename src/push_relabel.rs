//! A max-flow computation implementing Goldberg-Tarjan push-relabel with the
//! highest-label selection rule. Active nodes are kept in per-height buckets
//! and discharged from the topmost non-empty bucket; two heuristics keep the
//! height function tight:
//! 1) The gap heuristic hoists every node above an emptied height to `n`.
//! 2) Periodic global relabeling recomputes heights as exact BFS distances
//!    from the sink in the residual graph.
//!
//! The computed preflow saturates the sink, so the flow value is read off as
//! the sink's excess; the min-cut partition is extracted afterwards by one
//! more reverse-residual BFS.
use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;

use bitvec::vec::BitVec;
use itertools::{Either, Itertools};
use log::debug;

use crate::edge::EdgeSlot;
use crate::graph::{NodeID, NodeName};
use crate::max_flow::{FlowError, FlowValue, MaxFlow, is_positive};
use crate::residual_graph::ResidualGraph;

/// Global-relabel frequency used by [`MaxFlow::run`]; `max_preflow` takes an
/// explicit value. The per-run threshold is `(n + m) / frequency` units of
/// work, counted as `n` per relabel.
pub const DEFAULT_GLOBAL_RELABEL_FREQUENCY: u32 = 2;

pub struct PushRelabel<T> {
    graph: ResidualGraph<T>,
    source: NodeID,
    sink: NodeID,

    flow_value: T,
    finished: bool,
    reachable_from_sink: BitVec,
    tol: T,

    // per-height buckets; within a bucket nodes are popped from the tail
    active: Vec<Vec<NodeID>>,
    inactive: Vec<Vec<NodeID>>,
    max_height: usize,

    global_relabel_counter: usize,
    global_relabel_threshold: usize,
    discharge_count: usize,
    global_relabel_count: usize,
}

impl<T: FlowValue> PushRelabel<T> {
    /// Takes ownership of the graph and designates source and sink by name.
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
            flow_value: T::zero(),
            finished: false,
            reachable_from_sink: BitVec::new(),
            tol: T::zero(),
            active: Vec::new(),
            inactive: Vec::new(),
            max_height: 0,
            global_relabel_counter: 0,
            global_relabel_threshold: usize::MAX,
            discharge_count: 0,
            global_relabel_count: 0,
        })
    }

    pub fn graph(&self) -> &ResidualGraph<T> {
        &self.graph
    }

    /// Computes the maximum preflow and returns its value, `excess(sink)` at
    /// termination. A frequency of `0` disables global relabeling; `tol` is
    /// the comparison tolerance of every residual/excess test and must be
    /// non-negative (`0` for integer flow types). All transient state is
    /// re-initialized on entry, so repeated runs are idempotent.
    pub fn max_preflow(&mut self, global_relabel_frequency: u32, tol: T) -> Result<T, FlowError> {
        if tol < T::zero() {
            return Err(FlowError::InvalidParameter(
                "tolerance must be non-negative".to_string(),
            ));
        }
        let start = Instant::now();
        self.tol = tol;
        self.finished = false;
        self.discharge_count = 0;
        self.global_relabel_count = 0;
        self.global_relabel_counter = 0;
        self.global_relabel_threshold = if global_relabel_frequency == 0 {
            usize::MAX
        } else {
            (self.graph.number_of_nodes() + self.graph.number_of_edges())
                / global_relabel_frequency as usize
        };

        self.init_buckets();
        self.init_nodes();
        self.graph.reset_flows();

        // saturate every residual out-edge of the source
        for offset in 0..self.graph.out_degree(self.source) {
            let slot = EdgeSlot::new(self.source, offset);
            let residual = self.graph.edge(slot).residual_capacity();
            if is_positive(residual, self.tol) {
                self.push(slot, residual);
            }
        }

        loop {
            if self.global_relabel_counter > self.global_relabel_threshold {
                self.global_relabeling();
                self.global_relabel_counter = 0;
            }
            let Some(node) = self.pop_highest_active() else {
                break;
            };
            self.discharge(node);
        }

        self.finished = true;
        self.flow_value = self.graph.node(self.sink).excess;
        debug!(
            "max preflow {} after {} discharges and {} global relabels in {:?}",
            self.flow_value,
            self.discharge_count,
            self.global_relabel_count,
            start.elapsed()
        );
        Ok(self.flow_value)
    }

    /// Extracts the min s-t cut from the residual graph of the preceding
    /// [`Self::max_preflow`] run. The sink side is the set of nodes that
    /// reach the sink over residual edges; the returned partition carries
    /// node names.
    #[allow(clippy::type_complexity)]
    pub fn min_cut(
        &mut self,
    ) -> Result<(T, (BTreeSet<NodeName>, BTreeSet<NodeName>)), FlowError> {
        if !self.finished {
            return Err(FlowError::FlowNotComputed);
        }
        let start = Instant::now();
        self.reachable_from_sink = self.graph.reachable_from_sink(self.sink, self.tol);
        let (source_side, sink_side): (BTreeSet<NodeName>, BTreeSet<NodeName>) =
            self.graph.nodes().iter().partition_map(|node| {
                if self.reachable_from_sink[node.index] {
                    Either::Right(node.name)
                } else {
                    Either::Left(node.name)
                }
            });
        debug!("min cut extracted in {:?}", start.elapsed());
        Ok((self.flow_value, (source_side, sink_side)))
    }

    fn is_inner(&self, node: NodeID) -> bool {
        node != self.source && node != self.sink
    }

    fn init_buckets(&mut self) {
        let n = self.graph.number_of_nodes();
        self.active.clear();
        self.active.resize_with(n, Vec::new);
        self.inactive.clear();
        self.inactive.resize_with(n, Vec::new);
    }

    fn init_nodes(&mut self) {
        let n = self.graph.number_of_nodes();
        for index in 0..n {
            let height = if index == self.source {
                n
            } else if index == self.sink {
                0
            } else {
                1
            };
            let node = self.graph.node_mut(index);
            node.height = height;
            node.excess = T::zero();
            node.current_edge_idx = 0;
            if height < n {
                self.inactive[height].push(index);
            }
        }
        self.max_height = 0;
    }

    /// Moves `amount` along the edge at `slot`. A destination holding no
    /// excess so far becomes active.
    fn push(&mut self, slot: EdgeSlot, amount: T) {
        let target = self.graph.edge(slot).target;
        if self.is_inner(target) && !is_positive(self.graph.node(target).excess, self.tol) {
            let height = self.graph.node(target).height;
            if let Some(position) = self.inactive[height].iter().position(|&w| w == target) {
                self.inactive[height].remove(position);
            }
            self.active[height].push(target);
            self.max_height = self.max_height.max(height);
        }
        self.graph.push_flow(slot, amount);
    }

    /// Pushes excess out of `node` along admissible edges, resuming at the
    /// node's current-edge cursor, relabeling whenever the out-edge list is
    /// exhausted. Stops when the excess is gone or the node's height reaches
    /// `n`; any leftover excess re-buckets the node as active.
    fn discharge(&mut self, node: NodeID) {
        self.discharge_count += 1;
        loop {
            let slot = EdgeSlot::new(node, self.graph.node(node).current_edge_idx);
            let edge = self.graph.edge(slot);
            let residual = edge.residual_capacity();
            if is_positive(residual, self.tol) {
                let target = edge.target;
                if self.graph.node(target).height < self.graph.node(node).height {
                    let excess = self.graph.node(node).excess;
                    let amount = if excess < residual { excess } else { residual };
                    self.push(slot, amount);
                    if !is_positive(self.graph.node(node).excess, self.tol) {
                        break;
                    }
                }
            }
            if self.graph.node(node).current_edge_idx == self.graph.out_degree(node) - 1 {
                if !self.relabel(node) {
                    break;
                }
            } else {
                self.graph.node_mut(node).current_edge_idx += 1;
            }
        }

        let n = self.graph.number_of_nodes();
        let height = self.graph.node(node).height;
        if height < n {
            if is_positive(self.graph.node(node).excess, self.tol) {
                self.active[height].push(node);
                self.max_height = self.max_height.max(height);
            } else {
                self.inactive[height].push(node);
            }
        }
    }

    /// Raises `node` to one above the lowest residual neighbor and points the
    /// current-edge cursor at it. Returns `false` when the node is done for
    /// this run: either the gap heuristic fired at its old height, or no
    /// residual neighbor keeps it below `n` (such a node cannot reach the
    /// sink anymore).
    fn relabel(&mut self, node: NodeID) -> bool {
        let n = self.graph.number_of_nodes();
        self.global_relabel_counter += n;

        let old_height = self.graph.node(node).height;
        if self.active[old_height].is_empty() && self.inactive[old_height].is_empty() {
            // node was the last occupant of its height
            self.gap_heuristic(old_height);
            self.graph.node_mut(node).height = n;
            return false;
        }

        let mut min_height = 2 * n;
        let mut min_edge_idx = 0;
        for (offset, edge) in self.graph.out_edges(node).iter().enumerate() {
            if !is_positive(edge.residual_capacity(), self.tol) {
                continue;
            }
            let target_height = self.graph.node(edge.target).height;
            if target_height < min_height {
                min_height = target_height;
                min_edge_idx = offset;
            }
        }
        let entry = self.graph.node_mut(node);
        entry.current_edge_idx = min_edge_idx;
        entry.height = min_height + 1;
        entry.height < n
    }

    /// No node lives at `height` anymore: everything in `[height, max_height]`
    /// is disconnected from the sink and gets hoisted to `n`.
    fn gap_heuristic(&mut self, height: usize) {
        let n = self.graph.number_of_nodes();
        for h in height..=self.max_height {
            for &node in &self.active[h] {
                self.graph.node_mut(node).height = n;
            }
            self.active[h].clear();
            for &node in &self.inactive[h] {
                self.graph.node_mut(node).height = n;
            }
            self.inactive[h].clear();
        }
        self.max_height = height - 1;
    }

    /// Recomputes every height as the exact BFS distance from the sink in the
    /// residual graph and rebuilds the buckets. Inner nodes the BFS does not
    /// reach are hoisted to `n`; every inner node's current-edge cursor is
    /// rewound.
    fn global_relabeling(&mut self) {
        self.global_relabel_count += 1;
        let start = Instant::now();
        let n = self.graph.number_of_nodes();
        let mut visited: BitVec = BitVec::repeat(false, n);
        let mut queue = VecDeque::with_capacity(n);

        self.init_buckets();
        visited.set(self.sink, true);
        queue.push_back(self.sink);

        while let Some(node) = queue.pop_front() {
            let next_height = self.graph.node(node).height + 1;
            for offset in 0..self.graph.out_degree(node) {
                let edge = self.graph.edge(EdgeSlot::new(node, offset));
                let reverse = self.graph.edge(edge.reversed);
                if !is_positive(reverse.residual_capacity(), self.tol) || visited[edge.target] {
                    continue;
                }
                let next = edge.target;
                visited.set(next, true);
                self.graph.node_mut(next).height = next_height;
                if is_positive(self.graph.node(next).excess, self.tol) && self.is_inner(next) {
                    self.active[next_height].push(next);
                    self.max_height = self.max_height.max(next_height);
                } else {
                    self.inactive[next_height].push(next);
                }
                queue.push_back(next);
            }
        }

        for index in 0..n {
            if self.is_inner(index) {
                let node = self.graph.node_mut(index);
                node.current_edge_idx = 0;
                if !visited[index] {
                    node.height = n;
                }
            }
        }
        debug!(
            "global relabeling #{} took {:?}",
            self.global_relabel_count,
            start.elapsed()
        );
    }

    fn pop_highest_active(&mut self) -> Option<NodeID> {
        loop {
            if let Some(node) = self.active[self.max_height].pop() {
                return Some(node);
            }
            if self.max_height == 0 {
                return None;
            }
            self.max_height -= 1;
        }
    }
}

impl<T: FlowValue> MaxFlow<T> for PushRelabel<T> {
    fn run(&mut self) -> Result<T, FlowError> {
        self.max_preflow(DEFAULT_GLOBAL_RELABEL_FREQUENCY, T::zero())
    }

    fn max_flow(&self) -> Result<T, FlowError> {
        if !self.finished {
            return Err(FlowError::FlowNotComputed);
        }
        Ok(self.flow_value)
    }

    fn sink_partition(&self) -> Result<BitVec, FlowError> {
        if !self.finished {
            return Err(FlowError::FlowNotComputed);
        }
        Ok(self.graph.reachable_from_sink(self.sink, self.tol))
    }
}
