//! Channel-width measurement for angle-ambiguous branching nodes
//!
//! When deflection angles cannot separate the out-edges of a node
//! inside a waterbody, the narrowest channel identifies the main
//! one. Width is measured between the two waterbody-boundary
//! fragments nearest the midpoint of each out-edge's chained
//! geometry; boundary rings are split first where they meet a
//! neighboring waterbody or the coastline, so each channel side is
//! its own fragment.

use geo::{BooleanOps, BoundingRect, Euclidean, Intersects, Length, LineInterpolatePoint};
use geo_types::{Coord, LineString, MultiLineString, Polygon};
use hydronet_core::geom::{closest_on_line, nearest_points, point_distance};
use hydronet_core::layers::{CoastlineLayer, Waterbody, WaterbodyLayer};

/// Boundary fragments of the waterbody's rings, split against
/// intersecting neighbor waterbodies and the coastline.
pub(crate) fn ring_fragments(
    wb: &Waterbody,
    waterbodies: &WaterbodyLayer,
    coastlines: &CoastlineLayer,
) -> Vec<LineString<f64>> {
    let mut parts: Vec<LineString<f64>> = Vec::new();
    parts.push(wb.polygon.exterior().clone());
    parts.extend(wb.polygon.interiors().iter().cloned());

    let Some(envelope) = wb.polygon.bounding_rect() else {
        return parts;
    };

    for neighbor in waterbodies.query_envelope(envelope) {
        if neighbor.feature_id == wb.feature_id {
            continue;
        }
        parts = parts
            .into_iter()
            .flat_map(|part| {
                if part.intersects(&neighbor.polygon) {
                    let outside = neighbor
                        .polygon
                        .clip(&MultiLineString::new(vec![part]), true);
                    outside.0.into_iter().filter(|ls| ls.0.len() >= 2).collect()
                } else {
                    vec![part]
                }
            })
            .collect();
    }

    if !coastlines.is_empty() {
        parts = parts
            .into_iter()
            .flat_map(|part| subtract_coastline(part, coastlines))
            .collect();
    }

    parts
}

/// Remove the ring segments that are themselves coastline linework,
/// splitting the ring into the runs that remain. Relies on the
/// upstream vertex-snapping contract: shared linework shares exact
/// vertices.
fn subtract_coastline(ring: LineString<f64>, coastlines: &CoastlineLayer) -> Vec<LineString<f64>> {
    let mut out: Vec<LineString<f64>> = Vec::new();
    let mut run: Vec<Coord<f64>> = Vec::new();
    for pair in ring.0.windows(2) {
        if coastlines.contains_segment(pair[0], pair[1]) {
            if run.len() >= 2 {
                out.push(LineString::new(std::mem::take(&mut run)));
            } else {
                run.clear();
            }
        } else {
            if run.is_empty() {
                run.push(pair[0]);
            }
            run.push(pair[1]);
        }
    }
    if run.len() >= 2 {
        out.push(LineString::new(run));
    }
    // A closed ring split mid-sequence leaves two runs meeting at the
    // ring's start vertex; merge them into one fragment.
    if out.len() >= 2 && out[0].0.first() == out[out.len() - 1].0.last() {
        let first = out.remove(0);
        if let Some(last) = out.last_mut() {
            last.0.extend_from_slice(&first.0[1..]);
        }
    }
    out
}

/// Cross-channel width at the midpoint of `chain`.
///
/// Returns `None` when no valid width exists: fewer than two boundary
/// fragments near the channel (the single-lake case), or a connecting
/// segment that strays outside the waterbody by more than
/// `escape_tolerance` of its length.
pub(crate) fn channel_width(
    polygon: &Polygon<f64>,
    fragments: &[LineString<f64>],
    chain: &LineString<f64>,
    escape_tolerance: f64,
) -> Option<f64> {
    let mid: Coord<f64> = chain.line_interpolate_point(0.5)?.into();

    // Two nearest distinct fragments to the chain midpoint
    let mut first: Option<(f64, &LineString<f64>)> = None;
    let mut second: Option<(f64, &LineString<f64>)> = None;
    for frag in fragments {
        let Some((_, d)) = closest_on_line(frag, mid) else {
            continue;
        };
        if first.map_or(true, |(d1, _)| d < d1) {
            second = first;
            first = Some((d, frag));
        } else if second.map_or(true, |(d2, _)| d < d2) {
            second = Some((d, frag));
        }
    }
    let (_, f1) = first?;
    let (_, f2) = second?;

    // Width runs between each side's nearest approach to the channel
    let (p1, _, _) = nearest_points(f1, chain)?;
    let (p2, _, _) = nearest_points(f2, chain)?;
    let width = point_distance(p1, p2);

    let connector = LineString::new(vec![p1, p2]);
    let outside = polygon.clip(&MultiLineString::new(vec![connector]), true);
    let outside_len: f64 = outside.0.iter().map(|ls| ls.length::<Euclidean>()).sum();
    if outside_len > width * escape_tolerance {
        return None;
    }

    Some(width)
}
