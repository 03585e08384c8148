//! Materialized input layers
//!
//! Waterbody polygons and coastline lines are fully loaded in memory
//! before any traversal begins, and are queryable by bounding
//! envelope through bulk-loaded R-trees. The trees are built once and
//! never rebalanced.

use crate::geom::{segment_key, CoordKey};
use crate::model::FeatureId;
use geo::{BoundingRect, Intersects};
use geo_types::{Coord, LineString, Polygon, Rect};
use log::warn;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use std::collections::HashSet;

type IndexedRect = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn rect_to_aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// A waterbody polygon with its stable feature identifier.
#[derive(Debug, Clone)]
pub struct Waterbody {
    pub feature_id: FeatureId,
    pub polygon: Polygon<f64>,
}

/// Envelope-indexed waterbody polygon dataset.
#[derive(Debug)]
pub struct WaterbodyLayer {
    items: Vec<Waterbody>,
    tree: RTree<IndexedRect>,
}

impl WaterbodyLayer {
    pub fn new(items: Vec<Waterbody>) -> Self {
        let entries: Vec<IndexedRect> = items
            .iter()
            .enumerate()
            .filter_map(|(i, wb)| match wb.polygon.bounding_rect() {
                Some(rect) => Some(GeomWithData::new(
                    Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    i,
                )),
                None => {
                    warn!("waterbody {} has no extent, skipping", wb.feature_id);
                    None
                }
            })
            .collect();
        let tree = RTree::bulk_load(entries);
        Self { items, tree }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waterbody> {
        self.items.iter()
    }

    /// All waterbodies whose envelope intersects `rect`, in stable
    /// dataset order.
    pub fn query_envelope(&self, rect: Rect<f64>) -> Vec<&Waterbody> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&rect_to_aabb(rect))
            .map(|e| e.data)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.items[i]).collect()
    }

    /// The first waterbody (in dataset order) containing `c`,
    /// boundary inclusive.
    pub fn containing(&self, c: Coord<f64>) -> Option<&Waterbody> {
        let probe = AABB::from_point([c.x, c.y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&probe)
            .map(|e| e.data)
            .collect();
        hits.sort_unstable();
        hits.into_iter()
            .map(|i| &self.items[i])
            .find(|wb| wb.polygon.intersects(&geo_types::Point::from(c)))
    }
}

/// Envelope-indexed coastline dataset.
///
/// Also exposes the exact vertex and segment identity sets the
/// directionalization and rank engines match against; both rely on
/// the upstream vertex-snapping contract.
#[derive(Debug)]
pub struct CoastlineLayer {
    items: Vec<LineString<f64>>,
    tree: RTree<IndexedRect>,
    vertices: HashSet<CoordKey>,
    segments: HashSet<(CoordKey, CoordKey)>,
}

impl CoastlineLayer {
    pub fn new(items: Vec<LineString<f64>>) -> Self {
        let mut vertices = HashSet::new();
        let mut segments = HashSet::new();
        for ls in &items {
            for &c in &ls.0 {
                vertices.insert(CoordKey::new(c));
            }
            for pair in ls.0.windows(2) {
                segments.insert(segment_key(pair[0], pair[1]));
            }
        }
        let entries: Vec<IndexedRect> = items
            .iter()
            .enumerate()
            .filter_map(|(i, ls)| {
                ls.bounding_rect().map(|rect| {
                    GeomWithData::new(
                        Rectangle::from_corners(
                            [rect.min().x, rect.min().y],
                            [rect.max().x, rect.max().y],
                        ),
                        i,
                    )
                })
            })
            .collect();
        let tree = RTree::bulk_load(entries);
        Self {
            items,
            tree,
            vertices,
            segments,
        }
    }

    /// An empty layer (datasets without a shoreline).
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All coastlines whose envelope intersects `rect`, in stable
    /// dataset order.
    pub fn query_envelope(&self, rect: Rect<f64>) -> Vec<&LineString<f64>> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&rect_to_aabb(rect))
            .map(|e| e.data)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.items[i]).collect()
    }

    /// Does any coastline pass through this exact vertex?
    pub fn contains_vertex(&self, c: Coord<f64>) -> bool {
        self.vertices.contains(&CoordKey::new(c))
    }

    /// Is the segment `a`-`b` part of a coastline (in either
    /// direction)?
    pub fn contains_segment(&self, a: Coord<f64>, b: Coord<f64>) -> bool {
        self.segments.contains(&segment_key(a, b))
    }
}
