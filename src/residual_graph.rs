use std::collections::VecDeque;
use std::fmt::{self, Display};

use bitvec::vec::BitVec;
use log::debug;
use rustc_hash::FxHashMap;

use crate::edge::{EdgeSlot, ResidualEdge};
use crate::graph::{NodeID, NodeName};
use crate::max_flow::{FlowError, FlowValue, is_positive};

/// A vertex of the residual graph. `name` is the externally supplied label,
/// `index` the dense internal index assigned in insertion order. The remaining
/// fields are per-run state of the push-relabel engine and are reset on every
/// run.
#[derive(Clone, Debug)]
pub struct Node<T> {
    pub name: NodeName,
    pub index: NodeID,
    pub height: usize,
    pub excess: T,
    pub current_edge_idx: usize,
}

/// Arena of nodes and paired forward/reverse edges with a per-node adjacency
/// index. Nodes and edges are never deleted; growth is append-only, so node
/// indices and [`EdgeSlot`]s stay valid for the lifetime of the store.
pub struct ResidualGraph<T> {
    name_map: FxHashMap<NodeName, NodeID>,
    nodes: Vec<Node<T>>,
    adjacency: Vec<Vec<ResidualEdge<T>>>,
    number_of_edges: usize,
}

impl<T: FlowValue> Default for ResidualGraph<T> {
    fn default() -> Self {
        Self {
            name_map: FxHashMap::default(),
            nodes: Vec::new(),
            adjacency: Vec::new(),
            number_of_edges: 0,
        }
    }
}

impl<T: FlowValue> ResidualGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_capacity(node_count: usize) -> Self {
        let mut graph = Self::new();
        graph.nodes.reserve(node_count);
        graph.adjacency.reserve(node_count);
        graph
    }

    /// Returns the store to its defined empty state. Allocations are kept.
    pub fn reset(&mut self) {
        self.name_map.clear();
        self.nodes.clear();
        self.adjacency.clear();
        self.number_of_edges = 0;
    }

    /// Populates a store from `(u, v, capacity)` triples. With `dedup` set,
    /// repeated `(u, v)` pairs collapse into a single forward edge by summing
    /// capacities; otherwise they become parallel edges. Antiparallel inputs
    /// are never merged into one another's reverses.
    pub fn from_triples(
        triples: &[(NodeName, NodeName, T)],
        dedup: bool,
    ) -> Result<Self, FlowError> {
        let mut graph = Self::new();
        // forward edges created by this ingest, so merging never touches a
        // zero-capacity reverse
        let mut forward_slots: FxHashMap<(NodeID, NodeID), EdgeSlot> = FxHashMap::default();

        for &(u_name, v_name, capacity) in triples {
            if capacity.partial_cmp(&T::zero()).is_none() {
                return Err(FlowError::MalformedInput(format!(
                    "capacity of edge ({u_name}, {v_name}) is not a number"
                )));
            }
            let u = graph.add_node(u_name);
            let v = graph.add_node(v_name);

            if dedup {
                if let Some(&slot) = forward_slots.get(&(u, v)) {
                    if capacity < T::zero() {
                        return Err(FlowError::NegativeCapacity {
                            edge_source: u_name,
                            target: v_name,
                        });
                    }
                    graph.edge_mut(slot).capacity += capacity;
                    continue;
                }
            }
            let slot = graph.add_edge_pair(u, v, capacity)?;
            if dedup {
                forward_slots.insert((u, v), slot);
            }
        }

        debug!(
            "ingested {} triples into {} nodes and {} edges",
            triples.len(),
            graph.number_of_nodes(),
            graph.number_of_edges()
        );
        Ok(graph)
    }

    /// Adds a node with the given name and returns its internal index. Adding
    /// an existing name returns the index assigned on first insertion.
    pub fn add_node(&mut self, name: NodeName) -> NodeID {
        if let Some(&index) = self.name_map.get(&name) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            name,
            index,
            height: 0,
            excess: T::zero(),
            current_edge_idx: 0,
        });
        self.adjacency.push(Vec::new());
        self.name_map.insert(name, index);
        index
    }

    /// Appends a forward edge `u -> v` with the given capacity and its paired
    /// reverse `v -> u` with capacity zero, cross-linked through stable slots.
    /// Returns the forward slot.
    pub fn add_edge_pair(
        &mut self,
        u: NodeID,
        v: NodeID,
        capacity: T,
    ) -> Result<EdgeSlot, FlowError> {
        if capacity < T::zero() {
            return Err(FlowError::NegativeCapacity {
                edge_source: self.nodes[u].name,
                target: self.nodes[v].name,
            });
        }

        let forward = EdgeSlot::new(u, self.adjacency[u].len());
        self.adjacency[u].push(ResidualEdge {
            source: u,
            target: v,
            capacity,
            flow: T::zero(),
            reversed: forward, // patched below
        });
        let reverse = EdgeSlot::new(v, self.adjacency[v].len());
        self.adjacency[v].push(ResidualEdge {
            source: v,
            target: u,
            capacity: T::zero(),
            flow: T::zero(),
            reversed: forward,
        });
        self.adjacency[forward.node][forward.offset].reversed = reverse;
        self.number_of_edges += 2;
        Ok(forward)
    }

    pub fn node_by_name(&self, name: NodeName) -> Option<NodeID> {
        self.name_map.get(&name).copied()
    }

    pub fn node(&self, index: NodeID) -> &Node<T> {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: NodeID) -> &mut Node<T> {
        &mut self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Count of stored directed edges, reverses included. A dedup merge adds
    /// capacity to an existing edge and leaves this count unchanged.
    pub fn number_of_edges(&self) -> usize {
        self.number_of_edges
    }

    pub fn out_edges(&self, node: NodeID) -> &[ResidualEdge<T>] {
        &self.adjacency[node]
    }

    pub fn out_degree(&self, node: NodeID) -> usize {
        self.adjacency[node].len()
    }

    pub fn edge(&self, slot: EdgeSlot) -> &ResidualEdge<T> {
        &self.adjacency[slot.node][slot.offset]
    }

    pub fn edge_mut(&mut self, slot: EdgeSlot) -> &mut ResidualEdge<T> {
        &mut self.adjacency[slot.node][slot.offset]
    }

    pub fn reverse_edge(&self, slot: EdgeSlot) -> &ResidualEdge<T> {
        self.edge(self.edge(slot).reversed)
    }

    /// Moves `amount` units of flow along the edge at `slot`: the edge and its
    /// reverse are updated together, as are the excesses of both endpoints, so
    /// the pair invariant `flow(e) + flow(reverse(e)) = 0` holds at every
    /// observable moment.
    pub fn push_flow(&mut self, slot: EdgeSlot, amount: T) {
        let (source, target, reversed) = {
            let edge = &mut self.adjacency[slot.node][slot.offset];
            edge.flow += amount;
            (edge.source, edge.target, edge.reversed)
        };
        self.adjacency[reversed.node][reversed.offset].flow -= amount;
        self.nodes[source].excess -= amount;
        self.nodes[target].excess += amount;
    }

    /// Zeroes the flow on every stored edge.
    pub fn reset_flows(&mut self) {
        for edges in &mut self.adjacency {
            for edge in edges {
                edge.flow = T::zero();
            }
        }
    }

    /// BFS from the sink over edges whose reverse has positive residual
    /// capacity, i.e. along residual edges pointing towards the sink. The
    /// returned mask marks the sink side of the induced cut.
    pub fn reachable_from_sink(&self, sink: NodeID, tol: T) -> BitVec {
        let mut reachable: BitVec = BitVec::repeat(false, self.number_of_nodes());
        let mut queue = VecDeque::with_capacity(self.number_of_nodes());
        reachable.set(sink, true);
        queue.push_back(sink);

        while let Some(node) = queue.pop_front() {
            for edge in self.out_edges(node) {
                let reverse = self.edge(edge.reversed);
                if !is_positive(reverse.residual_capacity(), tol) || reachable[edge.target] {
                    continue;
                }
                reachable.set(edge.target, true);
                queue.push_back(edge.target);
            }
        }
        reachable
    }
}

/// Edge-list serialization in the NetworkX style, one stored edge per line in
/// adjacency order, reverses included. Diagnostic surface only.
impl<T: FlowValue> Display for ResidualGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for edges in &self.adjacency {
            for edge in edges {
                writeln!(
                    f,
                    "{} {} {{ 'capacity': {}, 'flow': {} }}",
                    self.nodes[edge.source].name, self.nodes[edge.target].name, edge.capacity, edge.flow
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ResidualGraph;
    use crate::edge::EdgeSlot;
    use crate::max_flow::FlowError;

    #[test]
    fn add_node_is_idempotent() {
        let mut graph: ResidualGraph<i64> = ResidualGraph::new();
        let a = graph.add_node(42);
        let b = graph.add_node(-7);
        assert_eq!(a, graph.add_node(42));
        assert_eq!(b, graph.add_node(-7));
        assert_eq!(2, graph.number_of_nodes());
    }

    #[test]
    fn names_need_not_be_dense() {
        let graph: ResidualGraph<i64> =
            ResidualGraph::from_triples(&[(100, 7, 1), (7, -3, 2)], false).unwrap();
        assert_eq!(3, graph.number_of_nodes());
        assert_eq!(Some(0), graph.node_by_name(100));
        assert_eq!(Some(1), graph.node_by_name(7));
        assert_eq!(Some(2), graph.node_by_name(-3));
        assert_eq!(None, graph.node_by_name(0));
    }

    #[test]
    fn edge_pairs_are_cross_linked() {
        let mut graph: ResidualGraph<i64> = ResidualGraph::new();
        let u = graph.add_node(0);
        let v = graph.add_node(1);
        let forward = graph.add_edge_pair(u, v, 9).unwrap();

        let edge = graph.edge(forward);
        assert_eq!(u, edge.source);
        assert_eq!(v, edge.target);
        assert_eq!(9, edge.capacity);

        let reverse = graph.reverse_edge(forward);
        assert_eq!(v, reverse.source);
        assert_eq!(u, reverse.target);
        assert_eq!(0, reverse.capacity);
        // reverse of the reverse is the original edge
        assert_eq!(forward, graph.edge(graph.edge(forward).reversed).reversed);
    }

    #[test]
    fn negative_capacity_is_rejected() {
        let mut graph: ResidualGraph<i64> = ResidualGraph::new();
        let u = graph.add_node(0);
        let v = graph.add_node(1);
        assert_eq!(
            Err(FlowError::NegativeCapacity {
                edge_source: 0,
                target: 1
            }),
            graph.add_edge_pair(u, v, -1)
        );
        assert!(matches!(
            ResidualGraph::from_triples(&[(0, 1, 2), (0, 1, -3)], true),
            Err(FlowError::NegativeCapacity { .. })
        ));
    }

    #[test]
    fn nan_capacity_is_rejected() {
        assert!(matches!(
            ResidualGraph::from_triples(&[(0, 1, f64::NAN)], false),
            Err(FlowError::MalformedInput(_))
        ));
    }

    #[test]
    fn dedup_sums_parallel_capacities() {
        let graph: ResidualGraph<i64> =
            ResidualGraph::from_triples(&[(1, 2, 3), (1, 2, 4)], true).unwrap();
        let u = graph.node_by_name(1).unwrap();
        assert_eq!(1, graph.out_degree(u));
        assert_eq!(7, graph.edge(EdgeSlot::new(u, 0)).capacity);
        // the paired reverse keeps capacity zero
        assert_eq!(0, graph.reverse_edge(EdgeSlot::new(u, 0)).capacity);
        assert_eq!(2, graph.number_of_edges());
    }

    #[test]
    fn parallel_edges_without_dedup() {
        let graph: ResidualGraph<i64> =
            ResidualGraph::from_triples(&[(1, 2, 3), (1, 2, 4)], false).unwrap();
        let u = graph.node_by_name(1).unwrap();
        assert_eq!(2, graph.out_degree(u));
        assert_eq!(4, graph.number_of_edges());
    }

    #[test]
    fn antiparallel_edges_stay_independent() {
        let graph: ResidualGraph<i64> =
            ResidualGraph::from_triples(&[(0, 1, 5), (1, 0, 5)], true).unwrap();
        let u = graph.node_by_name(0).unwrap();
        let v = graph.node_by_name(1).unwrap();
        // each node owns one forward edge and the other pair's reverse
        assert_eq!(2, graph.out_degree(u));
        assert_eq!(2, graph.out_degree(v));
        assert_eq!(5, graph.edge(EdgeSlot::new(u, 0)).capacity);
        assert_eq!(5, graph.edge(EdgeSlot::new(v, 1)).capacity);
        assert_eq!(0, graph.edge(EdgeSlot::new(u, 1)).capacity);
        assert_eq!(0, graph.edge(EdgeSlot::new(v, 0)).capacity);
    }

    #[test]
    fn push_flow_keeps_the_pair_antisymmetric() {
        let mut graph: ResidualGraph<i64> = ResidualGraph::new();
        let u = graph.add_node(0);
        let v = graph.add_node(1);
        let forward = graph.add_edge_pair(u, v, 10).unwrap();

        graph.push_flow(forward, 4);
        assert_eq!(4, graph.edge(forward).flow);
        assert_eq!(-4, graph.reverse_edge(forward).flow);
        assert_eq!(6, graph.edge(forward).residual_capacity());
        assert_eq!(4, graph.reverse_edge(forward).residual_capacity());
        assert_eq!(-4, graph.node(u).excess);
        assert_eq!(4, graph.node(v).excess);
    }

    #[test]
    fn reset_returns_to_the_empty_state() {
        let mut graph: ResidualGraph<i64> =
            ResidualGraph::from_triples(&[(0, 1, 1)], false).unwrap();
        graph.reset();
        assert_eq!(0, graph.number_of_nodes());
        assert_eq!(0, graph.number_of_edges());
        assert_eq!(None, graph.node_by_name(0));
    }

    #[test]
    fn capacity_hint_does_not_change_behavior() {
        let mut graph: ResidualGraph<i64> = ResidualGraph::with_node_capacity(16);
        assert_eq!(0, graph.number_of_nodes());
        let u = graph.add_node(3);
        let v = graph.add_node(4);
        graph.add_edge_pair(u, v, 1).unwrap();
        assert_eq!(2, graph.number_of_nodes());
        assert_eq!(2, graph.number_of_edges());
    }

    #[test]
    fn edge_list_serialization() {
        let graph: ResidualGraph<i64> =
            ResidualGraph::from_triples(&[(1, 2, 3)], false).unwrap();
        assert_eq!(
            "1 2 { 'capacity': 3, 'flow': 0 }\n2 1 { 'capacity': 0, 'flow': 0 }\n",
            graph.to_string()
        );
    }
}
