//! Post-direction network validation
//!
//! Directionalization is an all-or-nothing batch operation: after
//! every edge has a direction, the finalized segment set is checked
//! for directed cycles and for sink reachability. Any failure aborts
//! the run before results are committed; nothing is auto-corrected.

use geo_types::Coord;
use hydronet_core::geom::CoordKey;
use hydronet_core::model::FeatureId;
use hydronet_core::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// One finalized directed edge, reduced to its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct DirectedSegment {
    pub feature_id: FeatureId,
    pub from: Coord<f64>,
    pub to: Coord<f64>,
}

const WHITE: u8 = 0;
const GREY: u8 = 1;
const BLACK: u8 = 2;

/// Validates a finalized directed network.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleChecker;

impl CycleChecker {
    pub fn new() -> Self {
        Self
    }

    /// Full validation: cycle freedom, then sink reachability.
    pub fn check(&self, segments: &[DirectedSegment], sinks: &[Coord<f64>]) -> Result<()> {
        self.check_cycles(segments)?;
        self.check_sink_reachability(segments, sinks)
    }

    /// Depth-first search with white/grey/black coloring over the
    /// whole graph; a grey-to-grey edge is a directed cycle.
    pub fn check_cycles(&self, segments: &[DirectedSegment]) -> Result<()> {
        let (coords, out, _) = build_adjacency(segments);
        let mut color = vec![WHITE; coords.len()];
        // (node, next out-neighbor to expand)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..coords.len() {
            if color[start] != WHITE {
                continue;
            }
            color[start] = GREY;
            stack.push((start, 0));
            while let Some(&mut (u, ref mut next)) = stack.last_mut() {
                if *next < out[u].len() {
                    let v = out[u][*next];
                    *next += 1;
                    match color[v] {
                        WHITE => {
                            color[v] = GREY;
                            stack.push((v, 0));
                        }
                        GREY => {
                            return Err(Error::CycleDetected {
                                x: coords[v].x,
                                y: coords[v].y,
                            });
                        }
                        _ => {}
                    }
                } else {
                    color[u] = BLACK;
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    /// Every edge, followed forward, must reach a sink node.
    pub fn check_sink_reachability(
        &self,
        segments: &[DirectedSegment],
        sinks: &[Coord<f64>],
    ) -> Result<()> {
        let (_, _, index) = build_adjacency(segments);
        let n = index.len();
        let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut to_node = Vec::with_capacity(segments.len());
        for seg in segments {
            let from = index[&CoordKey::new(seg.from)];
            let to = index[&CoordKey::new(seg.to)];
            rev[to].push(from);
            to_node.push(to);
        }

        // Reverse breadth-first from the sinks marks every node with a
        // forward path to one.
        let mut reaches = vec![false; n];
        let mut queue = VecDeque::new();
        for sink in sinks {
            if let Some(&s) = index.get(&CoordKey::new(*sink)) {
                if !reaches[s] {
                    reaches[s] = true;
                    queue.push_back(s);
                }
            }
        }
        while let Some(u) = queue.pop_front() {
            for &v in &rev[u] {
                if !reaches[v] {
                    reaches[v] = true;
                    queue.push_back(v);
                }
            }
        }

        for (seg, &to) in segments.iter().zip(&to_node) {
            if !reaches[to] {
                return Err(Error::MalformedNetwork(format!(
                    "edge {} cannot reach a sink from ({}, {})",
                    seg.feature_id, seg.to.x, seg.to.y
                )));
            }
        }
        Ok(())
    }
}

type Adjacency = (Vec<Coord<f64>>, Vec<Vec<usize>>, HashMap<CoordKey, usize>);

fn build_adjacency(segments: &[DirectedSegment]) -> Adjacency {
    let mut index: HashMap<CoordKey, usize> = HashMap::new();
    let mut coords: Vec<Coord<f64>> = Vec::new();
    let mut out: Vec<Vec<usize>> = Vec::new();
    let mut intern = |c: Coord<f64>, coords: &mut Vec<Coord<f64>>, out: &mut Vec<Vec<usize>>| {
        *index.entry(CoordKey::new(c)).or_insert_with(|| {
            coords.push(c);
            out.push(Vec::new());
            coords.len() - 1
        })
    };
    for seg in segments {
        let from = intern(seg.from, &mut coords, &mut out);
        let to = intern(seg.to, &mut coords, &mut out);
        out[from].push(to);
    }
    (coords, out, index)
}
