//! Entity spatial indices
//!
//! Each entity class is indexed by bounding rectangle in an R-tree
//! bulk-loaded once at graph construction. Envelope distance is a
//! lower bound on true distance, so nearest searches walk the tree in
//! envelope order and refine with the caller's true-distance measure.

use geo_types::{Coord, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

type Entry<T> = GeomWithData<Rectangle<[f64; 2]>, T>;

pub(crate) fn entry<T>(rect: Rect<f64>, data: T) -> Entry<T> {
    GeomWithData::new(
        Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        data,
    )
}

/// Bounding-rectangle index over entity ids.
#[derive(Debug)]
pub(crate) struct SpatialIndex<T: Copy> {
    tree: RTree<Entry<T>>,
}

impl<T: Copy + Ord> SpatialIndex<T> {
    pub(crate) fn bulk_load(entries: Vec<Entry<T>>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Ids whose envelope contains the point, in stable id order.
    pub(crate) fn candidates_at(&self, c: Coord<f64>) -> Vec<T> {
        let mut hits: Vec<T> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([c.x, c.y]))
            .map(|e| e.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// The `k` nearest entities by true distance, optionally bounded
    /// by `max_distance`. `dist` supplies the exact entity-to-point
    /// distance; candidates arrive in envelope order, and the walk
    /// stops once no remaining envelope can beat the kept set.
    pub(crate) fn k_nearest<F>(
        &self,
        c: Coord<f64>,
        k: usize,
        max_distance: Option<f64>,
        dist: F,
    ) -> Vec<T>
    where
        F: Fn(T) -> f64,
    {
        if k == 0 {
            return Vec::new();
        }
        let mut best: Vec<(T, f64)> = Vec::new();
        for (entry, envelope_d2) in self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[c.x, c.y])
        {
            let envelope_d = envelope_d2.sqrt();
            if let Some(max) = max_distance {
                if envelope_d > max {
                    break;
                }
            }
            if best.len() >= k {
                if let Some(&(_, worst)) = best.last() {
                    if envelope_d > worst {
                        break;
                    }
                }
            }
            let d = dist(entry.data);
            if max_distance.is_some_and(|max| d > max) {
                continue;
            }
            let pos = best
                .iter()
                .position(|&(_, bd)| d < bd)
                .unwrap_or(best.len());
            best.insert(pos, (entry.data, d));
            best.truncate(k);
        }
        best.into_iter().map(|(t, _)| t).collect()
    }
}
