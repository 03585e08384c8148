//! Rank engine
//!
//! At every node with more than one out-edge, exactly one outgoing
//! edge continues the main channel (`Primary`); the rest are
//! `Secondary`, and the secondary rank follows each side channel
//! downstream until it rejoins or re-branches.
//!
//! The primary out-edge is the straightest continuation of the
//! inflow. When every out-edge is a skeleton and their deflection
//! scores sit mutually inside the ambiguity threshold, angle geometry
//! is not discriminating and the narrowest channel wins instead.
//!
//! The engine consumes a fully directed, cycle-free network.

use geo_types::LineString;
use hydronet_core::config::ConstructionParams;
use hydronet_core::geom::AngleComputer;
use hydronet_core::layers::{CoastlineLayer, WaterbodyLayer};
use hydronet_core::model::{EdgeType, FeatureId, Rank};
use hydronet_core::{Algorithm, Error, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::graph::{EdgeId, Network, NodeId};

mod width;

/// Everything the rank algorithm consumes.
#[derive(Debug)]
pub struct RankInput {
    /// The directed network, banks included
    pub network: Network,
    pub waterbodies: WaterbodyLayer,
    pub coastlines: CoastlineLayer,
}

/// The network handed back along with the computed ranks.
#[derive(Debug)]
pub struct RankOutput {
    pub network: Network,
    pub ranks: HashMap<FeatureId, Rank>,
}

/// Rank computation algorithm
#[derive(Debug, Clone, Default)]
pub struct RankCompute;

impl Algorithm for RankCompute {
    type Input = RankInput;
    type Output = RankOutput;
    type Params = ConstructionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Rank"
    }

    fn description(&self) -> &'static str {
        "Classify out-edges at branching nodes into primary and secondary channels"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let computer = RankComputer::new(&input.waterbodies, &input.coastlines, params);
        let ranks = computer.compute(&input.network)?;
        Ok(RankOutput {
            network: input.network,
            ranks,
        })
    }
}

/// Per-out-edge selection score. Any measured width outranks any
/// angle fallback; within a kind, smaller wins.
#[derive(Debug, Clone, Copy)]
enum Score {
    Width(f64),
    Angle(f64),
}

impl Score {
    fn ranks_before(self, other: Self) -> bool {
        match (self, other) {
            (Self::Width(a), Self::Width(b)) => a < b,
            (Self::Width(_), Self::Angle(_)) => true,
            (Self::Angle(_), Self::Width(_)) => false,
            (Self::Angle(a), Self::Angle(b)) => a < b,
        }
    }
}

/// Computes primary/secondary ranks over a directed network.
pub struct RankComputer<'a> {
    angles: AngleComputer,
    waterbodies: &'a WaterbodyLayer,
    coastlines: &'a CoastlineLayer,
    params: ConstructionParams,
}

impl<'a> RankComputer<'a> {
    pub fn new(
        waterbodies: &'a WaterbodyLayer,
        coastlines: &'a CoastlineLayer,
        params: ConstructionParams,
    ) -> Self {
        Self {
            angles: AngleComputer::new(params.coord_mode),
            waterbodies,
            coastlines,
            params,
        }
    }

    /// Rank every edge of the network. Edges keep `Primary` unless a
    /// branching node or downstream propagation demotes them.
    pub fn compute(&self, network: &Network) -> Result<HashMap<FeatureId, Rank>> {
        self.params.validate()?;
        let mut ranks = vec![Rank::Primary; network.edge_count()];

        info!("computing ranks");
        for node in network.node_ids() {
            let outs = network.out_edges(node);
            if outs.len() > 1 {
                self.rank_node(network, node, &outs, &mut ranks)?;
            }
        }

        Ok(network
            .edge_ids()
            .map(|e| (network.edge(e).feature_id(), ranks[e.index()]))
            .collect())
    }

    fn rank_node(
        &self,
        network: &Network,
        node: NodeId,
        outs: &[EdgeId],
        ranks: &mut [Rank],
    ) -> Result<()> {
        let node_coord = network.node(node).coord();
        let ins = network.in_edges(node);

        // Deflection score: the worst deviation-from-straight this
        // out-edge forces on any inflow.
        let deflections: Vec<(EdgeId, f64)> = outs
            .iter()
            .map(|&out| {
                let out_adj = network.edge(out).second();
                let mut deflection: f64 = 0.0;
                for &in_e in &ins {
                    let in_adj = network.edge(in_e).second_last();
                    let a = self.angles.angle(in_adj, node_coord, out_adj);
                    deflection = deflection.max(PI - a);
                }
                (out, deflection)
            })
            .collect();

        let min = deflections.iter().map(|(_, d)| *d).fold(f64::MAX, f64::min);
        let max = deflections.iter().map(|(_, d)| *d).fold(f64::MIN, f64::max);
        let all_skeleton = outs
            .iter()
            .all(|&e| network.edge(e).edge_type() == EdgeType::Skeleton);

        let scores: Vec<(EdgeId, Score)> =
            if all_skeleton && max - min < self.params.angle_ambiguity_rad() {
                debug!(
                    "angles not discriminating at ({}, {}), measuring channel widths",
                    node_coord.x, node_coord.y
                );
                self.width_scores(network, node, &deflections)?
            } else {
                deflections
                    .into_iter()
                    .map(|(e, d)| (e, Score::Angle(d)))
                    .collect()
            };

        // First strictly-best score in incident enumeration order
        let mut primary = scores[0].0;
        let mut best = scores[0].1;
        for &(e, s) in &scores[1..] {
            if s.ranks_before(best) {
                primary = e;
                best = s;
            }
        }

        for &(e, _) in &scores {
            if e != primary {
                self.demote(network, e, ranks);
            }
        }
        Ok(())
    }

    /// Width scores for the out-edges of an angle-ambiguous node.
    /// Edges with no valid width keep their angle score as fallback.
    fn width_scores(
        &self,
        network: &Network,
        node: NodeId,
        deflections: &[(EdgeId, f64)],
    ) -> Result<Vec<(EdgeId, Score)>> {
        let node_coord = network.node(node).coord();
        let wb = self.waterbodies.containing(node_coord).ok_or_else(|| {
            Error::AmbiguousConstruction(format!(
                "no waterbody contains the branching node at ({}, {})",
                node_coord.x, node_coord.y
            ))
        })?;
        let fragments = width::ring_fragments(wb, self.waterbodies, self.coastlines);

        Ok(deflections
            .iter()
            .map(|&(e, deflection)| {
                let chain = self.chained_geometry(network, e);
                let score = match width::channel_width(
                    &wb.polygon,
                    &fragments,
                    &chain,
                    self.params.width_escape_tolerance,
                ) {
                    Some(w) => Score::Width(w),
                    None => Score::Angle(deflection),
                };
                (e, score)
            })
            .collect())
    }

    /// The out-edge's effective geometry for width measurement:
    /// extended forward through skeleton single-in/single-out nodes
    /// and bank-tolerant single-out nodes, so width is measured on a
    /// representative channel segment rather than a short stub.
    fn chained_geometry(&self, network: &Network, first: EdgeId) -> LineString<f64> {
        let mut coords = network.edge(first).geometry().0.clone();
        let mut current = first;
        loop {
            let to = network.edge(current).to();
            let ins = network.in_edges(to);
            let outs = network.out_edges(to);
            let next = if outs.len() == 1 && ins.len() == 1 {
                let cand = outs[0];
                (network.edge(cand).edge_type() == EdgeType::Skeleton).then_some(cand)
            } else if outs.len() == 1 {
                let banks = ins
                    .iter()
                    .filter(|&&e| network.edge(e).edge_type() == EdgeType::Bank)
                    .count();
                (banks >= 1 && ins.len() - banks == 1).then_some(outs[0])
            } else {
                None
            };
            match next {
                Some(e) => {
                    coords.extend_from_slice(&network.edge(e).geometry().0[1..]);
                    current = e;
                }
                None => break,
            }
        }
        LineString::new(coords)
    }

    /// Mark an out-edge secondary and carry the rank downstream:
    /// through single-in/single-out nodes, and through single-out
    /// nodes fed by exactly one non-bank edge, until the side channel
    /// rejoins or re-branches.
    fn demote(&self, network: &Network, first: EdgeId, ranks: &mut [Rank]) {
        ranks[first.index()] = Rank::Secondary;
        let mut node = network.edge(first).to();
        loop {
            let outs = network.out_edges(node);
            let ins = network.in_edges(node);
            if outs.len() == 1 && ins.len() == 1 {
                ranks[outs[0].index()] = Rank::Secondary;
                node = network.edge(outs[0]).to();
            } else if outs.len() == 1 {
                let banks = ins
                    .iter()
                    .filter(|&&e| network.edge(e).edge_type() == EdgeType::Bank)
                    .count();
                if banks >= 1 && ins.len() - banks == 1 {
                    ranks[outs[0].index()] = Rank::Secondary;
                    node = network.edge(outs[0]).to();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }
}
