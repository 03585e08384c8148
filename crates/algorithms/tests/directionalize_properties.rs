//! Randomized properties of the directionalization engine.
//!
//! Random tree-shaped drainage networks (every node has one parent,
//! the root is the outlet) must always directionalize cleanly, honor
//! known directions, and drain every edge to the outlet. Randomly
//! oriented rings of known edges must always be rejected by the
//! cycle checker.

use geo_types::{Coord, LineString};
use hydronet_algorithms::directionalize::{directionalize, CycleChecker, DirectedSegment};
use hydronet_core::layers::CoastlineLayer;
use hydronet_core::model::{
    DirectionState, EdgeRecord, EdgeType, FeatureId, FlowDirection, TerminalPoint,
};
use proptest::prelude::*;

/// Deterministic, collision-free coordinate for tree node `i`.
fn node_coord(i: usize) -> Coord<f64> {
    Coord {
        x: i as f64 * 3.0,
        y: ((i * 7919) % 13) as f64,
    }
}

/// Build tree edges from a parent choice per non-root node. Edges
/// marked known are stored child-to-parent (with the flow); unknown
/// edges get an arbitrary stored orientation.
fn tree_records(parents: &[usize], known: &[bool], reversed: &[bool]) -> Vec<EdgeRecord> {
    parents
        .iter()
        .enumerate()
        .map(|(idx, &parent)| {
            let child = idx + 1;
            let (a, b) = (node_coord(child), node_coord(parent));
            let is_known = known[idx];
            let coords = if !is_known && reversed[idx] {
                vec![(b.x, b.y), (a.x, a.y)]
            } else {
                vec![(a.x, a.y), (b.x, b.y)]
            };
            EdgeRecord::new(
                LineString::from(coords),
                EdgeType::Normal,
                if is_known {
                    DirectionState::Known
                } else {
                    DirectionState::Unknown
                },
                FeatureId(child as u64),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_random_trees_directionalize(
        parent_picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..29),
        seed_known in proptest::collection::vec(any::<bool>(), 29),
        seed_rev in proptest::collection::vec(any::<bool>(), 29),
    ) {
        // Node i + 1 attaches to some earlier node, keeping the
        // graph a tree rooted at the outlet node 0.
        let n = parent_picks.len() + 1;
        let parents: Vec<usize> = parent_picks
            .iter()
            .enumerate()
            .map(|(i, pick)| pick.index(i + 1))
            .collect();

        let records = tree_records(&parents, &seed_known, &seed_rev);
        let terminals = vec![TerminalPoint::new(node_coord(0), FlowDirection::Output)];
        let result = directionalize(records, &terminals, &CoastlineLayer::empty(), &[])
            .expect("tree networks always directionalize");

        // Every edge processed, outlet seeded
        prop_assert_eq!(result.outcome.processed.len(), n - 1);
        prop_assert_eq!(result.outcome.sinks[0], node_coord(0));

        // Known directions are immutable
        for (idx, &is_known) in seed_known.iter().take(n - 1).enumerate() {
            if is_known {
                let fid = FeatureId(idx as u64 + 1);
                prop_assert!(!result.outcome.flipped.contains(&fid));
            }
        }

        // The finalized segment set independently passes both checks
        let segments: Vec<DirectedSegment> = result
            .network
            .edges()
            .map(|e| DirectedSegment {
                feature_id: e.feature_id(),
                from: result.network.node(e.from()).coord(),
                to: result.network.node(e.to()).coord(),
            })
            .collect();
        prop_assert!(CycleChecker::new()
            .check(&segments, &result.outcome.sinks)
            .is_ok());

        // Sink reachability: every edge drains to the root within
        // edge-count hops
        for e in result.network.edge_ids() {
            let mut node = result.network.edge(e).to();
            let mut hops = 0usize;
            while result.network.out_degree(node) > 0 {
                let outs = result.network.out_edges(node);
                node = result.network.edge(outs[0]).to();
                hops += 1;
                prop_assert!(hops < n, "walk did not terminate");
            }
            prop_assert_eq!(result.network.node(node).coord(), node_coord(0));
        }
    }

    #[test]
    fn prop_known_rings_always_rejected(m in 3usize..12) {
        // A ring of known edges attached to an outlet by one unknown
        // edge: traversal succeeds, the cycle check must not.
        let mut records: Vec<EdgeRecord> = (0..m)
            .map(|i| {
                let a = ring_coord(i, m);
                let b = ring_coord((i + 1) % m, m);
                EdgeRecord::new(
                    LineString::from(vec![(a.x, a.y), (b.x, b.y)]),
                    EdgeType::Normal,
                    DirectionState::Known,
                    FeatureId(i as u64 + 1),
                )
            })
            .collect();
        let outlet = Coord { x: -50.0, y: 0.0 };
        let anchor = ring_coord(0, m);
        records.push(EdgeRecord::new(
            LineString::from(vec![(anchor.x, anchor.y), (outlet.x, outlet.y)]),
            EdgeType::Normal,
            DirectionState::Unknown,
            FeatureId(99),
        ));

        let terminals = vec![TerminalPoint::new(outlet, FlowDirection::Output)];
        let result = directionalize(records, &terminals, &CoastlineLayer::empty(), &[]);
        let is_cycle = matches!(
            result,
            Err(hydronet_core::Error::CycleDetected { .. })
        );
        prop_assert!(is_cycle);
    }
}

/// Vertices of a regular ring, rounded to keep coordinates exact
/// across recomputation.
fn ring_coord(i: usize, m: usize) -> Coord<f64> {
    let angle = (i as f64) * std::f64::consts::TAU / (m as f64);
    Coord {
        x: (100.0 * angle.cos()).round(),
        y: (100.0 * angle.sin()).round(),
    }
}
