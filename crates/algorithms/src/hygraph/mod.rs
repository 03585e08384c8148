//! HyGraph spatial query graph
//!
//! The finalized directed, ranked network loaded once into immutable
//! entity arenas (`Nexus`, `EFlowpath`, `ECatchment`) with an R-tree
//! per entity class. After construction nothing mutates, so the graph
//! is safe for unlimited concurrent readers.
//!
//! Query misses are a normal outcome: every point query returns an
//! `Option` or an empty collection, never an error.

use geo::{BoundingRect, Intersects};
use geo_types::{Coord, LineString, Point, Polygon, Rect};
use hydronet_core::geom::{closest_on_line, point_distance, CoordKey};
use hydronet_core::model::{EdgeType, FeatureId, Rank};
use hydronet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

mod index;

use index::{entry, SpatialIndex};

/// Stable index of a nexus within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NexusId(usize);

impl NexusId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable index of a flowpath within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowpathId(usize);

impl FlowpathId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable index of a catchment within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatchmentId(usize);

impl CatchmentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Elementary catchment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatchmentType {
    /// Catchment draining through its own flowpath reach
    Reach,
    /// Bank catchment draining directly over the waterbody edge
    Bank,
    /// Open-water catchment
    Water,
}

/// One finalized flowpath as loaded into the graph. The geometry is
/// oriented in flow direction.
#[derive(Debug, Clone)]
pub struct FlowpathRecord {
    pub feature_id: FeatureId,
    pub geometry: LineString<f64>,
    pub edge_type: EdgeType,
    pub rank: Rank,
}

/// One catchment polygon with references to its bounding flowpaths
/// (by feature id) and nexuses (by exact coordinate).
#[derive(Debug, Clone)]
pub struct CatchmentRecord {
    pub feature_id: FeatureId,
    pub polygon: Polygon<f64>,
    pub catchment_type: CatchmentType,
    pub flowpaths: Vec<FeatureId>,
    pub nexuses: Vec<Coord<f64>>,
}

/// A node of the finalized directed network.
#[derive(Debug)]
pub struct Nexus {
    id: NexusId,
    coord: Coord<f64>,
    up_flows: Vec<FlowpathId>,
    down_flows: Vec<FlowpathId>,
}

impl Nexus {
    pub fn id(&self) -> NexusId {
        self.id
    }

    pub fn coord(&self) -> Coord<f64> {
        self.coord
    }

    /// Flowpaths arriving at this nexus
    pub fn up_flows(&self) -> &[FlowpathId] {
        &self.up_flows
    }

    /// Flowpaths leaving this nexus
    pub fn down_flows(&self) -> &[FlowpathId] {
        &self.down_flows
    }
}

/// A directed flowpath edge with its geometry.
#[derive(Debug)]
pub struct EFlowpath {
    id: FlowpathId,
    feature_id: FeatureId,
    geometry: LineString<f64>,
    edge_type: EdgeType,
    rank: Rank,
    from_nexus: NexusId,
    to_nexus: NexusId,
    catchment: Option<CatchmentId>,
}

impl EFlowpath {
    pub fn id(&self) -> FlowpathId {
        self.id
    }

    pub fn feature_id(&self) -> FeatureId {
        self.feature_id
    }

    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn from_nexus(&self) -> NexusId {
        self.from_nexus
    }

    pub fn to_nexus(&self) -> NexusId {
        self.to_nexus
    }

    pub fn catchment(&self) -> Option<CatchmentId> {
        self.catchment
    }

    /// True distance from the flowpath geometry to a point
    pub fn distance(&self, c: Coord<f64>) -> f64 {
        closest_on_line(&self.geometry, c).map_or(f64::INFINITY, |(_, d)| d)
    }
}

/// An elementary catchment polygon.
#[derive(Debug)]
pub struct ECatchment {
    id: CatchmentId,
    feature_id: FeatureId,
    polygon: Polygon<f64>,
    catchment_type: CatchmentType,
    flowpaths: Vec<FlowpathId>,
    up_nexuses: Vec<NexusId>,
    down_nexuses: Vec<NexusId>,
}

impl ECatchment {
    pub fn id(&self) -> CatchmentId {
        self.id
    }

    pub fn feature_id(&self) -> FeatureId {
        self.feature_id
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn catchment_type(&self) -> CatchmentType {
        self.catchment_type
    }

    pub fn flowpaths(&self) -> &[FlowpathId] {
        &self.flowpaths
    }

    pub fn up_nexuses(&self) -> &[NexusId] {
        &self.up_nexuses
    }

    pub fn down_nexuses(&self) -> &[NexusId] {
        &self.down_nexuses
    }

    /// True distance from the catchment to a point: zero inside or on
    /// the boundary, ring distance outside.
    pub fn distance(&self, c: Coord<f64>) -> f64 {
        if self.polygon.intersects(&Point::from(c)) {
            return 0.0;
        }
        let mut d = closest_on_line(self.polygon.exterior(), c).map_or(f64::INFINITY, |(_, d)| d);
        for ring in self.polygon.interiors() {
            if let Some((_, rd)) = closest_on_line(ring, c) {
                d = d.min(rd);
            }
        }
        d
    }
}

/// The immutable, spatially indexed query graph.
#[derive(Debug)]
pub struct HyGraph {
    nexuses: Vec<Nexus>,
    flowpaths: Vec<EFlowpath>,
    catchments: Vec<ECatchment>,
    nexus_index: SpatialIndex<NexusId>,
    flowpath_index: SpatialIndex<FlowpathId>,
    catchment_index: SpatialIndex<CatchmentId>,
}

impl HyGraph {
    /// Build the graph once from finalized flowpath and catchment
    /// records. Flowpath endpoints are grouped into nexuses by exact
    /// coordinate equality; catchment references are resolved against
    /// the result.
    pub fn build(
        flowpath_records: Vec<FlowpathRecord>,
        catchment_records: Vec<CatchmentRecord>,
    ) -> Result<Self> {
        let mut nexuses: Vec<Nexus> = Vec::new();
        let mut nexus_lookup: HashMap<CoordKey, NexusId> = HashMap::new();
        let mut intern = |c: Coord<f64>, nexuses: &mut Vec<Nexus>| -> NexusId {
            *nexus_lookup.entry(CoordKey::new(c)).or_insert_with(|| {
                let id = NexusId(nexuses.len());
                nexuses.push(Nexus {
                    id,
                    coord: c,
                    up_flows: Vec::new(),
                    down_flows: Vec::new(),
                });
                id
            })
        };

        let mut flowpaths: Vec<EFlowpath> = Vec::with_capacity(flowpath_records.len());
        let mut by_feature: HashMap<FeatureId, FlowpathId> = HashMap::new();
        for record in flowpath_records {
            let coords = &record.geometry.0;
            if coords.len() < 2 || coords[0] == coords[coords.len() - 1] {
                return Err(Error::MalformedNetwork(format!(
                    "degenerate flowpath {}",
                    record.feature_id
                )));
            }
            let id = FlowpathId(flowpaths.len());
            let from_nexus = intern(coords[0], &mut nexuses);
            let to_nexus = intern(coords[coords.len() - 1], &mut nexuses);
            nexuses[from_nexus.index()].down_flows.push(id);
            nexuses[to_nexus.index()].up_flows.push(id);
            by_feature.insert(record.feature_id, id);
            flowpaths.push(EFlowpath {
                id,
                feature_id: record.feature_id,
                geometry: record.geometry,
                edge_type: record.edge_type,
                rank: record.rank,
                from_nexus,
                to_nexus,
                catchment: None,
            });
        }

        let mut catchments: Vec<ECatchment> = Vec::with_capacity(catchment_records.len());
        for record in catchment_records {
            let id = CatchmentId(catchments.len());
            let mut members = Vec::with_capacity(record.flowpaths.len());
            for feature in &record.flowpaths {
                let &fp = by_feature.get(feature).ok_or_else(|| {
                    Error::MalformedNetwork(format!(
                        "catchment {} references unknown flowpath {}",
                        record.feature_id, feature
                    ))
                })?;
                flowpaths[fp.index()].catchment = Some(id);
                members.push(fp);
            }

            let mut up_nexuses = Vec::new();
            let mut down_nexuses = Vec::new();
            for &coord in &record.nexuses {
                let &nexus = nexus_lookup.get(&CoordKey::new(coord)).ok_or_else(|| {
                    Error::MalformedNetwork(format!(
                        "catchment {} references a nexus at ({}, {}) that is not on the network",
                        record.feature_id, coord.x, coord.y
                    ))
                })?;
                if members.is_empty() {
                    // A bank catchment drains out through its nexus
                    down_nexuses.push(nexus);
                } else if members
                    .iter()
                    .any(|&f| flowpaths[f.index()].from_nexus == nexus)
                {
                    up_nexuses.push(nexus);
                } else if members
                    .iter()
                    .any(|&f| flowpaths[f.index()].to_nexus == nexus)
                {
                    down_nexuses.push(nexus);
                }
            }

            catchments.push(ECatchment {
                id,
                feature_id: record.feature_id,
                polygon: record.polygon,
                catchment_type: record.catchment_type,
                flowpaths: members,
                up_nexuses,
                down_nexuses,
            });
        }

        let nexus_index = SpatialIndex::bulk_load(
            nexuses
                .iter()
                .map(|n| entry(Rect::new(n.coord, n.coord), n.id))
                .collect(),
        );
        let flowpath_index = SpatialIndex::bulk_load(
            flowpaths
                .iter()
                .filter_map(|f| f.geometry.bounding_rect().map(|r| entry(r, f.id)))
                .collect(),
        );
        let catchment_index = SpatialIndex::bulk_load(
            catchments
                .iter()
                .filter_map(|c| c.polygon.bounding_rect().map(|r| entry(r, c.id)))
                .collect(),
        );

        Ok(Self {
            nexuses,
            flowpaths,
            catchments,
            nexus_index,
            flowpath_index,
            catchment_index,
        })
    }

    pub fn nexus(&self, id: NexusId) -> &Nexus {
        &self.nexuses[id.index()]
    }

    pub fn flowpath(&self, id: FlowpathId) -> &EFlowpath {
        &self.flowpaths[id.index()]
    }

    pub fn catchment(&self, id: CatchmentId) -> &ECatchment {
        &self.catchments[id.index()]
    }

    pub fn nexus_count(&self) -> usize {
        self.nexuses.len()
    }

    pub fn flowpath_count(&self) -> usize {
        self.flowpaths.len()
    }

    pub fn catchment_count(&self) -> usize {
        self.catchments.len()
    }

    /// The catchment containing the point, boundary inclusive;
    /// `None` outside coverage.
    pub fn catchment_at(&self, point: Coord<f64>) -> Option<&ECatchment> {
        self.catchment_index
            .candidates_at(point)
            .into_iter()
            .map(|id| &self.catchments[id.index()])
            .find(|c| c.polygon.intersects(&Point::from(point)))
    }

    /// The flowpath the point would drain into, located through its
    /// containing catchment; `None` outside coverage.
    pub fn flowpath_at(&self, point: Coord<f64>) -> Option<&EFlowpath> {
        let catchment = self.catchment_at(point)?;
        match catchment.flowpaths.len() {
            0 => {
                if catchment.catchment_type == CatchmentType::Bank
                    && catchment.down_nexuses.len() == 1
                {
                    let nexus = &self.nexuses[catchment.down_nexuses[0].index()];
                    nexus
                        .down_flows
                        .first()
                        .map(|&f| &self.flowpaths[f.index()])
                } else {
                    None
                }
            }
            1 => Some(&self.flowpaths[catchment.flowpaths[0].index()]),
            _ => {
                // Multiple flowpaths: geometrically nearest wins
                let mut nearest = None;
                let mut dist = f64::INFINITY;
                for &f in &catchment.flowpaths {
                    let flowpath = &self.flowpaths[f.index()];
                    let d = flowpath.distance(point);
                    if d < dist {
                        nearest = Some(flowpath);
                        dist = d;
                    }
                }
                nearest
            }
        }
    }

    /// Up to `max_results` flowpaths upstream of the point, in
    /// breadth-first discovery order; empty outside coverage.
    pub fn upstream_flowpaths(&self, point: Coord<f64>, max_results: usize) -> Vec<&EFlowpath> {
        self.expand_flowpaths(point, max_results, true)
    }

    /// Up to `max_results` flowpaths downstream of the point, in
    /// breadth-first discovery order; empty outside coverage.
    pub fn downstream_flowpaths(&self, point: Coord<f64>, max_results: usize) -> Vec<&EFlowpath> {
        self.expand_flowpaths(point, max_results, false)
    }

    /// Breadth-first expansion where the growing result list doubles
    /// as the frontier queue.
    fn expand_flowpaths(
        &self,
        point: Coord<f64>,
        max_results: usize,
        upstream: bool,
    ) -> Vec<&EFlowpath> {
        let Some(start) = self.flowpath_at(point).map(EFlowpath::id) else {
            return Vec::new();
        };
        if max_results == 0 {
            return Vec::new();
        }
        let mut results: Vec<FlowpathId> = vec![start];
        let mut seen: HashSet<FlowpathId> = HashSet::from([start]);
        let mut i = 0;
        'expand: while i < results.len() {
            let flowpath = &self.flowpaths[results[i].index()];
            let flows = if upstream {
                &self.nexuses[flowpath.from_nexus.index()].up_flows
            } else {
                &self.nexuses[flowpath.to_nexus.index()].down_flows
            };
            for &next in flows {
                if results.len() >= max_results {
                    break 'expand;
                }
                if seen.insert(next) {
                    results.push(next);
                }
            }
            i += 1;
        }
        results
            .into_iter()
            .map(|id| &self.flowpaths[id.index()])
            .collect()
    }

    /// Up to `max_results` catchments upstream of the point's
    /// catchment, linked through nexus up-flows.
    pub fn upstream_catchments(&self, point: Coord<f64>, max_results: usize) -> Vec<&ECatchment> {
        self.expand_catchments(point, max_results, true)
    }

    /// Up to `max_results` catchments downstream of the point's
    /// catchment, linked through nexus down-flows.
    pub fn downstream_catchments(&self, point: Coord<f64>, max_results: usize) -> Vec<&ECatchment> {
        self.expand_catchments(point, max_results, false)
    }

    fn expand_catchments(
        &self,
        point: Coord<f64>,
        max_results: usize,
        upstream: bool,
    ) -> Vec<&ECatchment> {
        let Some(start) = self.catchment_at(point) else {
            return Vec::new();
        };
        if max_results == 0 {
            return Vec::new();
        }
        let mut results: Vec<CatchmentId> = vec![start.id];
        let mut seen: HashSet<CatchmentId> = HashSet::from([start.id]);
        let mut i = 0;
        'expand: while i < results.len() {
            let catchment = &self.catchments[results[i].index()];
            let nexuses = if upstream {
                &catchment.up_nexuses
            } else {
                &catchment.down_nexuses
            };
            for &n in nexuses {
                let nexus = &self.nexuses[n.index()];
                let flows = if upstream {
                    &nexus.up_flows
                } else {
                    &nexus.down_flows
                };
                for &f in flows {
                    let Some(next) = self.flowpaths[f.index()].catchment else {
                        continue;
                    };
                    if results.len() >= max_results {
                        break 'expand;
                    }
                    if seen.insert(next) {
                        results.push(next);
                    }
                }
            }
            i += 1;
        }
        results
            .into_iter()
            .map(|id| &self.catchments[id.index()])
            .collect()
    }

    /// The `max_results` flowpaths nearest the point by true
    /// geometric distance, optionally bounded by `max_distance`.
    pub fn find_flowpaths(
        &self,
        point: Coord<f64>,
        max_results: usize,
        max_distance: Option<f64>,
    ) -> Vec<&EFlowpath> {
        self.flowpath_index
            .k_nearest(point, max_results, max_distance, |id| {
                self.flowpaths[id.index()].distance(point)
            })
            .into_iter()
            .map(|id| &self.flowpaths[id.index()])
            .collect()
    }

    /// The `max_results` nexuses nearest the point.
    pub fn find_nexuses(
        &self,
        point: Coord<f64>,
        max_results: usize,
        max_distance: Option<f64>,
    ) -> Vec<&Nexus> {
        self.nexus_index
            .k_nearest(point, max_results, max_distance, |id| {
                point_distance(self.nexuses[id.index()].coord, point)
            })
            .into_iter()
            .map(|id| &self.nexuses[id.index()])
            .collect()
    }

    /// The `max_results` catchments nearest the point.
    pub fn find_catchments(
        &self,
        point: Coord<f64>,
        max_results: usize,
        max_distance: Option<f64>,
    ) -> Vec<&ECatchment> {
        self.catchment_index
            .k_nearest(point, max_results, max_distance, |id| {
                self.catchments[id.index()].distance(point)
            })
            .into_iter()
            .map(|id| &self.catchments[id.index()])
            .collect()
    }
}
