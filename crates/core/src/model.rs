//! Model types for the hydrographic network
//!
//! The tagged enums here carry exactly the fields each edge kind
//! needs; there is no untyped per-feature attachment.

use geo::{Euclidean, Length};
use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a source feature, preserved through
/// directionalization and ranking so results can be written back
/// in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fid:{}", self.0)
    }
}

/// Flow-path edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// An observed channel segment
    Normal,
    /// A waterbody-boundary connector, directed by post-hoc
    /// attachment check rather than the main traversal
    Bank,
    /// A medial-line segment through open water
    Skeleton,
}

/// Direction knowledge carried by the source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectionState {
    /// Direction fixed by source data; never altered
    Known,
    /// Direction to be resolved by the directionalization engine
    Unknown,
}

/// Primary/secondary channel rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Primary,
    Secondary,
}

/// Flow annotation on a boundary terminal point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDirection {
    /// Water enters the drainage area here
    Input,
    /// Water leaves the drainage area here; seeds directionalization
    Output,
}

/// One flow-path segment as consumed from the external edge list.
///
/// The geometry is stored in its source orientation; whether that
/// orientation is the flow direction is answered by `direction`.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub geometry: LineString<f64>,
    pub edge_type: EdgeType,
    pub direction: DirectionState,
    pub feature_id: FeatureId,
    pub length: f64,
}

impl EdgeRecord {
    /// Create a record, deriving the length from the geometry.
    pub fn new(
        geometry: LineString<f64>,
        edge_type: EdgeType,
        direction: DirectionState,
        feature_id: FeatureId,
    ) -> Self {
        let length = geometry.length::<Euclidean>();
        Self {
            geometry,
            edge_type,
            direction,
            feature_id,
            length,
        }
    }

    /// First coordinate of the geometry
    pub fn start(&self) -> Coord<f64> {
        self.geometry.0[0]
    }

    /// Last coordinate of the geometry
    pub fn end(&self) -> Coord<f64> {
        self.geometry.0[self.geometry.0.len() - 1]
    }

    /// Coordinate adjacent to the start (drives angle computation)
    pub fn second(&self) -> Coord<f64> {
        self.geometry.0[1.min(self.geometry.0.len() - 1)]
    }

    /// Coordinate adjacent to the end (drives angle computation)
    pub fn second_last(&self) -> Coord<f64> {
        let n = self.geometry.0.len();
        self.geometry.0[n.saturating_sub(2)]
    }
}

/// A designated boundary point with its flow annotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalPoint {
    pub coord: Coord<f64>,
    pub direction: FlowDirection,
}

impl TerminalPoint {
    pub fn new(coord: Coord<f64>, direction: FlowDirection) -> Self {
        Self { coord, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::line_string;

    #[test]
    fn test_edge_record_length() {
        let rec = EdgeRecord::new(
            line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0)],
            EdgeType::Normal,
            DirectionState::Unknown,
            FeatureId(1),
        );
        assert!((rec.length - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_edge_record_end_coordinates() {
        let rec = EdgeRecord::new(
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 3.0, y: 0.0)],
            EdgeType::Skeleton,
            DirectionState::Known,
            FeatureId(2),
        );
        assert_eq!(rec.start(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(rec.second(), Coord { x: 1.0, y: 1.0 });
        assert_eq!(rec.second_last(), Coord { x: 2.0, y: 1.0 });
        assert_eq!(rec.end(), Coord { x: 3.0, y: 0.0 });
    }

    #[test]
    fn test_edge_record_two_point_line() {
        let rec = EdgeRecord::new(
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            EdgeType::Normal,
            DirectionState::Unknown,
            FeatureId(3),
        );
        // On a two-point line the adjacent coordinates are the opposite ends
        assert_eq!(rec.second(), rec.end());
        assert_eq!(rec.second_last(), rec.start());
    }
}
