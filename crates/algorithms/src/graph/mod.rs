//! Network graph model
//!
//! An arena of nodes and edges addressed by stable integer ids.
//! Incidence lists store ids, not references, so the cross-referenced
//! structure has no ownership cycles while keeping O(1) neighbor
//! lookup.
//!
//! Node identity is exact 2D coordinate equality — no floating
//! tolerance. Upstream geometry construction must guarantee vertex
//! snapping before a graph is built from its output.

use geo_types::{Coord, LineString};
use hydronet_core::geom::CoordKey;
use hydronet_core::model::{DirectionState, EdgeRecord, EdgeType, FeatureId};
use hydronet_core::{Error, Result};
use std::collections::HashMap;

/// Stable index of a node within its network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable index of an edge within its network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A unique coordinate where one or more edges terminate
#[derive(Debug)]
pub struct Node {
    coord: Coord<f64>,
    edges: Vec<EdgeId>,
}

impl Node {
    pub fn coord(&self) -> Coord<f64> {
        self.coord
    }

    /// Incident edges in insertion order
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// One flow-path segment between two nodes.
///
/// The geometry is kept aligned with the `from -> to` orientation: a
/// flip reverses both, and `is_flipped` records whether the current
/// orientation disagrees with the source record.
#[derive(Debug)]
pub struct Edge {
    from: NodeId,
    to: NodeId,
    geometry: LineString<f64>,
    edge_type: EdgeType,
    direction: DirectionState,
    feature_id: FeatureId,
    length: f64,
    resolved: bool,
    flipped: bool,
}

impl Edge {
    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    /// The endpoint opposite `n`
    pub fn other(&self, n: NodeId) -> NodeId {
        if self.from == n {
            self.to
        } else {
            self.from
        }
    }

    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn direction_state(&self) -> DirectionState {
        self.direction
    }

    pub fn feature_id(&self) -> FeatureId {
        self.feature_id
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Has a flow direction been established for this edge?
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Does the established direction reverse the source geometry?
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Coordinate adjacent to the `from` node
    pub fn second(&self) -> Coord<f64> {
        self.geometry.0[1.min(self.geometry.0.len() - 1)]
    }

    /// Coordinate adjacent to the `to` node
    pub fn second_last(&self) -> Coord<f64> {
        let n = self.geometry.0.len();
        self.geometry.0[n.saturating_sub(2)]
    }
}

/// The in-memory network graph.
#[derive(Debug)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    lookup: HashMap<CoordKey, NodeId>,
}

impl Network {
    /// Build a graph from an edge list, grouping endpoints into nodes
    /// by exact coordinate equality.
    ///
    /// Fails with [`Error::MalformedNetwork`] on degenerate edges
    /// (fewer than two coordinates, identical endpoints, or zero
    /// length); these are surfaced, not silently dropped.
    pub fn build(records: Vec<EdgeRecord>) -> Result<Self> {
        let mut network = Self {
            nodes: Vec::new(),
            edges: Vec::with_capacity(records.len()),
            lookup: HashMap::new(),
        };
        for record in records {
            if record.geometry.0.len() < 2 || record.start() == record.end() || record.length <= 0.0
            {
                return Err(Error::MalformedNetwork(format!(
                    "degenerate edge {} at ({}, {})",
                    record.feature_id,
                    record.start().x,
                    record.start().y
                )));
            }
            let from = network.intern_node(record.start());
            let to = network.intern_node(record.end());
            let id = EdgeId(network.edges.len());
            network.edges.push(Edge {
                from,
                to,
                geometry: record.geometry,
                edge_type: record.edge_type,
                direction: record.direction,
                feature_id: record.feature_id,
                length: record.length,
                resolved: record.direction == DirectionState::Known,
                flipped: false,
            });
            network.nodes[from.index()].edges.push(id);
            network.nodes[to.index()].edges.push(id);
        }
        Ok(network)
    }

    fn intern_node(&mut self, coord: Coord<f64>) -> NodeId {
        let key = CoordKey::new(coord);
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            coord,
            edges: Vec::new(),
        });
        self.lookup.insert(key, id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len()).map(EdgeId)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// The node at this exact coordinate, if any.
    pub fn node_at(&self, coord: Coord<f64>) -> Option<NodeId> {
        self.lookup.get(&CoordKey::new(coord)).copied()
    }

    /// Incident edges at a node, in insertion order.
    pub fn edges_at(&self, n: NodeId) -> &[EdgeId] {
        &self.nodes[n.index()].edges
    }

    /// Out-edges of a node under the current orientation. Only
    /// meaningful once the incident edges are resolved.
    pub fn out_edges(&self, n: NodeId) -> Vec<EdgeId> {
        self.nodes[n.index()]
            .edges
            .iter()
            .copied()
            .filter(|&e| self.edges[e.index()].from == n)
            .collect()
    }

    /// In-edges of a node under the current orientation.
    pub fn in_edges(&self, n: NodeId) -> Vec<EdgeId> {
        self.nodes[n.index()]
            .edges
            .iter()
            .copied()
            .filter(|&e| self.edges[e.index()].to == n)
            .collect()
    }

    pub fn out_degree(&self, n: NodeId) -> usize {
        self.nodes[n.index()]
            .edges
            .iter()
            .filter(|&&e| self.edges[e.index()].from == n)
            .count()
    }

    pub fn in_degree(&self, n: NodeId) -> usize {
        self.nodes[n.index()]
            .edges
            .iter()
            .filter(|&&e| self.edges[e.index()].to == n)
            .count()
    }

    /// Fix an unresolved edge so it points into `downstream`,
    /// flipping the stored geometry when needed.
    pub(crate) fn resolve_toward(&mut self, e: EdgeId, downstream: NodeId) {
        let edge = &mut self.edges[e.index()];
        if edge.to != downstream {
            std::mem::swap(&mut edge.from, &mut edge.to);
            edge.geometry.0.reverse();
            edge.flipped = !edge.flipped;
        }
        edge.resolved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;
    use hydronet_core::model::{DirectionState, EdgeType};

    fn rec(fid: u64, coords: &[(f64, f64)]) -> EdgeRecord {
        EdgeRecord::new(
            LineString::from(coords.to_vec()),
            EdgeType::Normal,
            DirectionState::Unknown,
            FeatureId(fid),
        )
    }

    #[test]
    fn test_build_dedups_nodes_by_coordinate() {
        let network = Network::build(vec![
            rec(1, &[(0.0, 0.0), (5.0, 5.0)]),
            rec(2, &[(5.0, 5.0), (10.0, 0.0)]),
            rec(3, &[(5.0, 5.0), (5.0, 10.0)]),
        ])
        .unwrap();

        assert_eq!(network.node_count(), 4);
        assert_eq!(network.edge_count(), 3);
        let confluence = network.node_at(Coord { x: 5.0, y: 5.0 }).unwrap();
        assert_eq!(network.node(confluence).degree(), 3);
    }

    #[test]
    fn test_self_loop_rejected() {
        let result = Network::build(vec![rec(
            9,
            &[(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)],
        )]);
        assert!(matches!(result, Err(Error::MalformedNetwork(_))));
    }

    #[test]
    fn test_zero_length_rejected() {
        let result = Network::build(vec![EdgeRecord::new(
            line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0)],
            EdgeType::Normal,
            DirectionState::Unknown,
            FeatureId(4),
        )]);
        assert!(matches!(result, Err(Error::MalformedNetwork(_))));
    }

    #[test]
    fn test_in_out_edges_after_resolve() {
        let mut network = Network::build(vec![
            rec(1, &[(0.0, 0.0), (5.0, 0.0)]),
            rec(2, &[(10.0, 0.0), (5.0, 0.0)]),
        ])
        .unwrap();
        let mid = network.node_at(Coord { x: 5.0, y: 0.0 }).unwrap();
        let right = network.node_at(Coord { x: 10.0, y: 0.0 }).unwrap();

        // Point edge 1 into the middle node, edge 2 out to the right
        network.resolve_toward(EdgeId(0), mid);
        network.resolve_toward(EdgeId(1), right);

        assert_eq!(network.in_edges(mid), vec![EdgeId(0)]);
        assert_eq!(network.out_edges(mid), vec![EdgeId(1)]);
        assert!(!network.edge(EdgeId(0)).is_flipped());
        assert!(network.edge(EdgeId(1)).is_flipped());
        // Flipping reverses the stored geometry as well
        assert_eq!(
            network.edge(EdgeId(1)).geometry().0[0],
            Coord { x: 5.0, y: 0.0 }
        );
    }

    #[test]
    fn test_exact_coordinate_identity() {
        // Nearby but not identical coordinates stay separate nodes
        let network = Network::build(vec![
            rec(1, &[(0.0, 0.0), (5.0, 5.0)]),
            rec(2, &[(5.0 + 1e-12, 5.0), (10.0, 0.0)]),
        ])
        .unwrap();
        assert_eq!(network.node_count(), 4);
    }
}
