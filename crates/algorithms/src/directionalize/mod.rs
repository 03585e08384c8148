//! Directionalization engine
//!
//! Assigns a downstream direction to every `Unknown` edge so the
//! whole network drains toward its sinks, then validates the result.
//!
//! Already-`Known` edges are fixed constraints: the sink-seeded
//! traversal respects them and never flips them. Bank edges are
//! excluded from the main solve and resolved afterwards by checking
//! which endpoint touches the directed network. The batch either
//! completes and emits a valid network or fails fast and emits
//! nothing.

use geo_types::{Coord, LineString};
use hydronet_core::layers::CoastlineLayer;
use hydronet_core::model::{
    DirectionState, EdgeRecord, EdgeType, FeatureId, FlowDirection, TerminalPoint,
};
use hydronet_core::{Algorithm, Error, Result};
use log::{debug, info};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{Network, NodeId};
use hydronet_core::geom::CoordKey;

mod cycle;

pub use cycle::{CycleChecker, DirectedSegment};

/// Everything the engine consumes, fully materialized up front.
#[derive(Debug)]
pub struct DirectionalizeInput {
    /// All flow-path records, bank edges included
    pub edges: Vec<EdgeRecord>,
    /// Boundary terminal points with their flow annotations
    pub terminals: Vec<TerminalPoint>,
    /// Coastline dataset; coastline vertices are sinks
    pub coastlines: CoastlineLayer,
    /// Designated construction-output coordinates
    pub construction_outputs: Vec<Coord<f64>>,
}

/// What gets handed back to the persistence adapter.
#[derive(Debug, Clone)]
pub struct DirectionalizeOutcome {
    /// Features whose stored geometry direction must be reversed
    pub flipped: Vec<FeatureId>,
    /// Every feature the engine processed
    pub processed: Vec<FeatureId>,
    /// The sink coordinates that seeded the traversal, in seed order
    pub sinks: Vec<Coord<f64>>,
}

/// The directed network together with its outcome.
#[derive(Debug)]
pub struct DirectionalizedNetwork {
    pub network: Network,
    pub outcome: DirectionalizeOutcome,
}

/// Directionalization algorithm
#[derive(Debug, Clone, Default)]
pub struct Directionalize;

impl Algorithm for Directionalize {
    type Input = DirectionalizeInput;
    type Output = DirectionalizedNetwork;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Directionalize"
    }

    fn description(&self) -> &'static str {
        "Assign a downstream direction to every edge of the network"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        directionalize(
            input.edges,
            &input.terminals,
            &input.coastlines,
            &input.construction_outputs,
        )
    }
}

/// Run the full directionalization batch.
///
/// Pipeline: partition bank edges out, build the graph, resolve the
/// banks by attachment, locate sinks, traverse upstream from each
/// sink, then re-check the finalized segment set for cycles and sink
/// reachability.
pub fn directionalize(
    records: Vec<EdgeRecord>,
    terminals: &[TerminalPoint],
    coastlines: &CoastlineLayer,
    construction_outputs: &[Coord<f64>],
) -> Result<DirectionalizedNetwork> {
    let (banks, main): (Vec<EdgeRecord>, Vec<EdgeRecord>) = records
        .into_iter()
        .partition(|r| r.edge_type == EdgeType::Bank);

    info!("building graph from {} edges", main.len());
    let mut network = Network::build(main)?;

    info!("resolving {} bank edges", banks.len());
    let bank_flips = resolve_bank_edges(&network, &banks)?;

    info!("locating sink nodes");
    let sinks = find_sinks(&network, terminals, coastlines, construction_outputs)?;
    debug!("{} sink nodes found", sinks.len());

    info!("directionalizing network");
    assign_directions(&mut network, &sinks)?;

    let mut flipped = Vec::new();
    let mut processed = Vec::new();
    for edge in network.edges() {
        if edge.is_flipped() {
            flipped.push(edge.feature_id());
        }
        processed.push(edge.feature_id());
    }
    for (bank, flip) in banks.iter().zip(&bank_flips) {
        if *flip {
            flipped.push(bank.feature_id);
        }
        processed.push(bank.feature_id);
    }

    info!("checking output for cycles");
    let segments = directed_segments(&network, &banks, &bank_flips);
    CycleChecker::new().check(&segments, &sinks)?;

    Ok(DirectionalizedNetwork {
        network,
        outcome: DirectionalizeOutcome {
            flipped,
            processed,
            sinks,
        },
    })
}

/// A bank edge must touch the main network with exactly its
/// downstream end. Returns, per bank record, whether its geometry
/// needs flipping.
fn resolve_bank_edges(network: &Network, banks: &[EdgeRecord]) -> Result<Vec<bool>> {
    let mut flips = Vec::with_capacity(banks.len());
    for bank in banks {
        if network.node_at(bank.end()).is_some() {
            flips.push(false);
        } else if network.node_at(bank.start()).is_some() {
            flips.push(true);
        } else {
            return Err(Error::MalformedNetwork(format!(
                "bank edge {} does not intersect the flow network at ({}, {})",
                bank.feature_id,
                bank.start().x,
                bank.start().y
            )));
        }
    }
    Ok(flips)
}

/// Locate the sink coordinates that seed directionalization:
/// boundary terminals annotated `Output`, coastline-touching nodes,
/// nodes whose known edges all flow inward, and degree-1 nodes at
/// designated construction-output points. The returned order is the
/// tie-break authority for contested edges.
fn find_sinks(
    network: &Network,
    terminals: &[TerminalPoint],
    coastlines: &CoastlineLayer,
    construction_outputs: &[Coord<f64>],
) -> Result<Vec<Coord<f64>>> {
    let mut annotations: HashMap<CoordKey, FlowDirection> = HashMap::new();
    for t in terminals {
        let key = CoordKey::new(t.coord);
        if let Some(prev) = annotations.insert(key, t.direction) {
            if prev != t.direction {
                return Err(Error::AmbiguousConstruction(format!(
                    "terminal point at ({}, {}) is annotated both inflow and outflow",
                    t.coord.x, t.coord.y
                )));
            }
        }
    }

    let mut sinks: Vec<Coord<f64>> = Vec::new();
    let mut seen: HashSet<CoordKey> = HashSet::new();
    let mut push = |c: Coord<f64>, sinks: &mut Vec<Coord<f64>>| {
        if seen.insert(CoordKey::new(c)) {
            sinks.push(c);
        }
    };

    for t in terminals {
        if t.direction == FlowDirection::Output {
            push(t.coord, &mut sinks);
        }
    }

    // One pass over the nodes: coastline coincidence, or every
    // incident edge already known and flowing inward.
    for n in network.node_ids() {
        let coord = network.node(n).coord();
        let is_sink = if coastlines.contains_vertex(coord) {
            true
        } else {
            network.edges_at(n).iter().all(|&e| {
                let edge = network.edge(e);
                edge.direction_state() != DirectionState::Unknown && edge.to() == n
            })
        };
        if is_sink {
            push(coord, &mut sinks);
        }
    }

    let outputs: HashSet<CoordKey> = construction_outputs
        .iter()
        .map(|&c| CoordKey::new(c))
        .collect();
    for n in network.node_ids() {
        let node = network.node(n);
        if node.degree() == 1 && outputs.contains(&CoordKey::new(node.coord())) {
            push(node.coord(), &mut sinks);
        }
    }

    Ok(sinks)
}

/// Breadth-first upstream from each sink in seed order, fixing every
/// `Unknown` edge encountered to point toward the already-visited
/// (more-downstream) node. The first traversal to reach an edge wins.
fn assign_directions(network: &mut Network, sinks: &[Coord<f64>]) -> Result<()> {
    let mut visited = vec![false; network.node_count()];
    let mut queue: VecDeque<NodeId> = VecDeque::new();

    for sink in sinks {
        let Some(start) = network.node_at(*sink) else {
            debug!("sink ({}, {}) is not a network node", sink.x, sink.y);
            continue;
        };
        if visited[start.index()] {
            continue;
        }
        visited[start.index()] = true;
        queue.push_back(start);

        while let Some(n) = queue.pop_front() {
            let incident = network.edges_at(n).to_vec();
            for eid in incident {
                let edge = network.edge(eid);
                if edge.is_resolved() {
                    // A resolved edge is only walked against its flow
                    if edge.to() == n {
                        let up = edge.from();
                        if !visited[up.index()] {
                            visited[up.index()] = true;
                            queue.push_back(up);
                        }
                    }
                } else {
                    network.resolve_toward(eid, n);
                    let up = network.edge(eid).from();
                    if !visited[up.index()] {
                        visited[up.index()] = true;
                        queue.push_back(up);
                    }
                }
            }
        }
    }

    for e in network.edge_ids() {
        let edge = network.edge(e);
        if !edge.is_resolved() {
            return Err(Error::MalformedNetwork(format!(
                "edge {} has no reachable sink: {}",
                edge.feature_id(),
                render_line(edge.geometry())
            )));
        }
    }
    Ok(())
}

/// The finalized directed segment set, banks included, as the cycle
/// checker's independent view of the output.
fn directed_segments(
    network: &Network,
    banks: &[EdgeRecord],
    bank_flips: &[bool],
) -> Vec<DirectedSegment> {
    let mut segments: Vec<DirectedSegment> = network
        .edges()
        .map(|edge| DirectedSegment {
            feature_id: edge.feature_id(),
            from: network.node(edge.from()).coord(),
            to: network.node(edge.to()).coord(),
        })
        .collect();
    for (bank, flip) in banks.iter().zip(bank_flips) {
        let (from, to) = if *flip {
            (bank.end(), bank.start())
        } else {
            (bank.start(), bank.end())
        };
        segments.push(DirectedSegment {
            feature_id: bank.feature_id,
            from,
            to,
        });
    }
    segments
}

/// Apply a directionalization outcome to the source records: reverse
/// the geometry of every flipped feature and mark everything `Known`.
///
/// This is the in-memory analogue of persisting the flips and
/// re-reading the dataset; the result is what the rank engine and the
/// query graph are built from.
pub fn apply_outcome(
    mut records: Vec<EdgeRecord>,
    outcome: &DirectionalizeOutcome,
) -> Vec<EdgeRecord> {
    let flipped: HashSet<FeatureId> = outcome.flipped.iter().copied().collect();
    for record in &mut records {
        if flipped.contains(&record.feature_id) {
            record.geometry.0.reverse();
        }
        record.direction = DirectionState::Known;
    }
    records
}

fn render_line(ls: &LineString<f64>) -> String {
    let coords: Vec<String> = ls.0.iter().map(|c| format!("{} {}", c.x, c.y)).collect();
    format!("LINESTRING({})", coords.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;

    fn unknown(fid: u64, coords: &[(f64, f64)]) -> EdgeRecord {
        EdgeRecord::new(
            LineString::from(coords.to_vec()),
            EdgeType::Normal,
            DirectionState::Unknown,
            FeatureId(fid),
        )
    }

    fn known(fid: u64, coords: &[(f64, f64)]) -> EdgeRecord {
        EdgeRecord::new(
            LineString::from(coords.to_vec()),
            EdgeType::Normal,
            DirectionState::Known,
            FeatureId(fid),
        )
    }

    fn bank(fid: u64, coords: &[(f64, f64)]) -> EdgeRecord {
        EdgeRecord::new(
            LineString::from(coords.to_vec()),
            EdgeType::Bank,
            DirectionState::Unknown,
            FeatureId(fid),
        )
    }

    fn outlet(x: f64, y: f64) -> TerminalPoint {
        TerminalPoint::new(Coord { x, y }, FlowDirection::Output)
    }

    fn run(
        records: Vec<EdgeRecord>,
        terminals: &[TerminalPoint],
    ) -> Result<DirectionalizedNetwork> {
        directionalize(records, terminals, &CoastlineLayer::empty(), &[])
    }

    #[test]
    fn test_y_network_drains_to_outlet() {
        // Two headwaters feed a confluence at (5, 5); the outlet is at
        // (5, 0). Stored orientations deliberately disagree with flow.
        let records = vec![
            unknown(1, &[(5.0, 5.0), (0.0, 10.0)]), // stored pointing upstream
            unknown(2, &[(10.0, 10.0), (5.0, 5.0)]),
            unknown(3, &[(5.0, 0.0), (5.0, 5.0)]), // stored pointing upstream
        ];
        let result = run(records, &[outlet(5.0, 0.0)]).unwrap();
        let network = &result.network;

        let confluence = network.node_at(Coord { x: 5.0, y: 5.0 }).unwrap();
        let outlet_node = network.node_at(Coord { x: 5.0, y: 0.0 }).unwrap();
        assert_eq!(network.in_degree(confluence), 2);
        assert_eq!(network.out_degree(confluence), 1);
        assert_eq!(network.in_degree(outlet_node), 1);
        assert_eq!(network.out_degree(outlet_node), 0);

        // Edges 1 and 3 were stored against the flow
        assert_eq!(result.outcome.flipped, vec![FeatureId(1), FeatureId(3)]);
        assert_eq!(result.outcome.processed.len(), 3);
    }

    #[test]
    fn test_known_direction_never_altered() {
        // Known edge B -> A feeds the sink-adjacent node A; the
        // traversal walks through it without touching it.
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),  // sink edge
            known(2, &[(10.0, 0.0), (5.0, 0.0)]),   // fixed toward A
            unknown(3, &[(15.0, 0.0), (10.0, 0.0)]),
        ];
        let result = run(records, &[outlet(0.0, 0.0)]).unwrap();
        let network = &result.network;

        let known_edge = network
            .edges()
            .find(|e| e.feature_id() == FeatureId(2))
            .unwrap();
        assert!(!known_edge.is_flipped());
        assert_eq!(
            network.node(known_edge.from()).coord(),
            Coord { x: 10.0, y: 0.0 }
        );
        assert!(!result.outcome.flipped.contains(&FeatureId(2)));
        // Only the sink edge was stored against the flow
        assert_eq!(result.outcome.flipped, vec![FeatureId(1)]);
    }

    #[test]
    fn test_contested_edge_first_sink_wins() {
        // A single chain between two sinks: the middle edge is claimed
        // by whichever sink is seeded first.
        let records = || {
            vec![
                unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
                unknown(2, &[(5.0, 0.0), (10.0, 0.0)]),
            ]
        };

        let a = run(records(), &[outlet(0.0, 0.0), outlet(10.0, 0.0)]).unwrap();
        let edge2 = a
            .network
            .edges()
            .find(|e| e.feature_id() == FeatureId(2))
            .unwrap();
        // First sink (0,0) claims everything upstream of itself
        assert_eq!(a.network.node(edge2.to()).coord(), Coord { x: 5.0, y: 0.0 });

        let b = run(records(), &[outlet(10.0, 0.0), outlet(0.0, 0.0)]).unwrap();
        let edge1 = b
            .network
            .edges()
            .find(|e| e.feature_id() == FeatureId(1))
            .unwrap();
        assert_eq!(b.network.node(edge1.to()).coord(), Coord { x: 5.0, y: 0.0 });
    }

    #[test]
    fn test_unreachable_component_is_fatal() {
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
            unknown(2, &[(100.0, 100.0), (105.0, 100.0)]),
        ];
        let result = run(records, &[outlet(0.0, 0.0)]);
        assert!(matches!(result, Err(Error::MalformedNetwork(_))));
    }

    #[test]
    fn test_self_loop_rejected_before_directionalizing() {
        let records = vec![unknown(1, &[(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)])];
        let result = run(records, &[outlet(1.0, 1.0)]);
        assert!(matches!(result, Err(Error::MalformedNetwork(_))));
    }

    #[test]
    fn test_bank_edge_flipped_when_start_attached() {
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
            // Attached to the network at its start: must flip
            bank(2, &[(5.0, 0.0), (5.0, 3.0)]),
            // Attached at its end: kept as stored
            bank(3, &[(7.0, 3.0), (0.0, 0.0)]),
        ];
        let result = run(records, &[outlet(0.0, 0.0)]).unwrap();
        assert!(result.outcome.flipped.contains(&FeatureId(2)));
        assert!(!result.outcome.flipped.contains(&FeatureId(3)));
        assert!(result.outcome.processed.contains(&FeatureId(2)));
        assert!(result.outcome.processed.contains(&FeatureId(3)));
    }

    #[test]
    fn test_detached_bank_edge_is_fatal() {
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
            bank(2, &[(50.0, 50.0), (60.0, 60.0)]),
        ];
        let result = run(records, &[outlet(0.0, 0.0)]);
        assert!(matches!(result, Err(Error::MalformedNetwork(_))));
    }

    #[test]
    fn test_conflicting_terminal_annotations_are_fatal() {
        let records = vec![unknown(1, &[(0.0, 0.0), (5.0, 0.0)])];
        let terminals = vec![
            outlet(0.0, 0.0),
            TerminalPoint::new(Coord { x: 0.0, y: 0.0 }, FlowDirection::Input),
        ];
        let result = run(records, &terminals);
        assert!(matches!(result, Err(Error::AmbiguousConstruction(_))));
    }

    #[test]
    fn test_coastline_vertex_seeds_sink() {
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
            unknown(2, &[(5.0, 0.0), (10.0, 0.0)]),
        ];
        let coastlines = CoastlineLayer::new(vec![line_string![
            (x: 10.0, y: -5.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 5.0),
        ]]);
        let result = directionalize(records, &[], &coastlines, &[]).unwrap();
        assert_eq!(result.outcome.sinks, vec![Coord { x: 10.0, y: 0.0 }]);
        // Flow runs toward the coast
        let edge1 = result
            .network
            .edges()
            .find(|e| e.feature_id() == FeatureId(1))
            .unwrap();
        assert_eq!(
            result.network.node(edge1.to()).coord(),
            Coord { x: 5.0, y: 0.0 }
        );
    }

    #[test]
    fn test_known_inflow_node_inferred_as_sink() {
        // Both known edges flow into (5, 0): the node is a sink even
        // with no terminal annotation.
        let records = vec![
            known(1, &[(0.0, 0.0), (5.0, 0.0)]),
            known(2, &[(10.0, 0.0), (5.0, 0.0)]),
            unknown(3, &[(0.0, 5.0), (0.0, 0.0)]),
        ];
        let result = run(records, &[]).unwrap();
        assert!(result.outcome.sinks.contains(&Coord { x: 5.0, y: 0.0 }));
        let edge3 = result
            .network
            .edges()
            .find(|e| e.feature_id() == FeatureId(3))
            .unwrap();
        assert_eq!(
            result.network.node(edge3.to()).coord(),
            Coord { x: 0.0, y: 0.0 }
        );
    }

    #[test]
    fn test_degree_one_construction_output_seeds_sink() {
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
            unknown(2, &[(5.0, 0.0), (10.0, 0.0)]),
        ];
        let outputs = vec![Coord { x: 10.0, y: 0.0 }];
        let result = directionalize(records, &[], &CoastlineLayer::empty(), &outputs).unwrap();
        assert_eq!(result.outcome.sinks, vec![Coord { x: 10.0, y: 0.0 }]);
    }

    #[test]
    fn test_known_cycle_fails_post_check() {
        // A known triangle cycle hanging off the sink chain survives
        // traversal but must be caught by the cycle checker.
        let records = vec![
            unknown(1, &[(0.0, 0.0), (5.0, 0.0)]),
            known(2, &[(5.0, 0.0), (5.0, 5.0)]),
            known(3, &[(5.0, 5.0), (8.0, 3.0)]),
            known(4, &[(8.0, 3.0), (5.0, 0.0)]),
        ];
        let result = run(records, &[outlet(0.0, 0.0)]);
        assert!(matches!(result, Err(Error::CycleDetected { .. })));
    }
}
