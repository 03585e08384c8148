//! Geometry helpers: exact coordinate keys, node angles, nearest
//! points between polylines.
//!
//! Node identity in the network is exact 2D coordinate equality (no
//! floating tolerance); upstream geometry construction must guarantee
//! vertex snapping before these helpers are used. `CoordKey` encodes
//! that contract as a hashable bitwise key.

use geo::{Closest, ClosestPoint};
use geo_types::{Coord, LineString, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Hashable exact-equality key for a 2D coordinate.
///
/// Built from the raw f64 bit patterns, so `0.0` and `-0.0` are
/// distinct keys; snapped input never produces both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    x: u64,
    y: u64,
}

impl CoordKey {
    pub fn new(c: Coord<f64>) -> Self {
        Self {
            x: c.x.to_bits(),
            y: c.y.to_bits(),
        }
    }
}

impl From<Coord<f64>> for CoordKey {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c)
    }
}

/// Undirected identity of a segment between two snapped vertices.
pub fn segment_key(a: Coord<f64>, b: Coord<f64>) -> (CoordKey, CoordKey) {
    let (ka, kb) = (CoordKey::new(a), CoordKey::new(b));
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

/// How coordinates are interpreted when measuring angles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordMode {
    /// Projected planar coordinates
    #[default]
    Planar,
    /// Longitude/latitude degrees; displacements are projected into a
    /// local planar frame about the vertex latitude
    Geographic,
}

/// Computes the interior angle at a shared vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngleComputer {
    mode: CoordMode,
}

impl AngleComputer {
    pub fn new(mode: CoordMode) -> Self {
        Self { mode }
    }

    /// Angle at `c1` between the rays `c1 -> c0` and `c1 -> c2`,
    /// normalized to `[0, PI]`.
    pub fn angle(&self, c0: Coord<f64>, c1: Coord<f64>, c2: Coord<f64>) -> f64 {
        let (mut dx0, dy0) = (c0.x - c1.x, c0.y - c1.y);
        let (mut dx2, dy2) = (c2.x - c1.x, c2.y - c1.y);
        if self.mode == CoordMode::Geographic {
            let scale = c1.y.to_radians().cos();
            dx0 *= scale;
            dx2 *= scale;
        }
        let mut a = dy2.atan2(dx2) - dy0.atan2(dx0);
        if a < 0.0 {
            a += 2.0 * PI;
        }
        if a > PI {
            a = 2.0 * PI - a;
        }
        a
    }
}

/// Closest point on `ls` to `c`, with the distance between them.
///
/// Returns `None` for degenerate geometry where no closest point is
/// defined.
pub fn closest_on_line(ls: &LineString<f64>, c: Coord<f64>) -> Option<(Coord<f64>, f64)> {
    let p = Point::from(c);
    let closest = match ls.closest_point(&p) {
        Closest::SinglePoint(q) | Closest::Intersection(q) => q,
        Closest::Indeterminate => return None,
    };
    Some((closest.into(), point_distance(closest.into(), c)))
}

/// Euclidean distance between two coordinates.
pub fn point_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx.hypot(dy)
}

/// Nearest pair of points between two polylines, as
/// `(point_on_a, point_on_b, distance)`.
///
/// For non-crossing polylines the minimum distance is attained at a
/// vertex of one of them, so projecting each vertex onto the other
/// line is exact.
pub fn nearest_points(
    a: &LineString<f64>,
    b: &LineString<f64>,
) -> Option<(Coord<f64>, Coord<f64>, f64)> {
    let mut best: Option<(Coord<f64>, Coord<f64>, f64)> = None;
    for &v in &a.0 {
        if let Some((q, d)) = closest_on_line(b, v) {
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((v, q, d));
            }
        }
    }
    for &w in &b.0 {
        if let Some((q, d)) = closest_on_line(a, w) {
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((q, w, d));
            }
        }
    }
    best
}
