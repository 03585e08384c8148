//! Construction parameters
//!
//! The tunables of the rank engine, gathered in one deserializable
//! struct so adapters can load them from a properties file.

use crate::error::{Error, Result};
use crate::geom::CoordMode;
use serde::{Deserialize, Serialize};

/// Parameters controlling network construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionParams {
    /// When the deflection scores of all out-edges at a branching node
    /// fall mutually within this many degrees, angle geometry is not
    /// discriminating and channel width is used instead.
    pub angle_ambiguity_deg: f64,
    /// A measured channel-width segment may stray outside its
    /// waterbody by at most this fraction of its length.
    pub width_escape_tolerance: f64,
    /// Coordinate interpretation for angle measurement.
    pub coord_mode: CoordMode,
}

impl Default for ConstructionParams {
    fn default() -> Self {
        Self {
            angle_ambiguity_deg: 30.0,
            width_escape_tolerance: 0.1,
            coord_mode: CoordMode::Planar,
        }
    }
}

impl ConstructionParams {
    /// Ambiguity threshold in radians.
    pub fn angle_ambiguity_rad(&self) -> f64 {
        self.angle_ambiguity_deg.to_radians()
    }

    /// Check the parameters for nonsensical values.
    pub fn validate(&self) -> Result<()> {
        if !self.angle_ambiguity_deg.is_finite()
            || self.angle_ambiguity_deg < 0.0
            || self.angle_ambiguity_deg > 180.0
        {
            return Err(Error::InvalidParameter {
                name: "angle_ambiguity_deg",
                value: self.angle_ambiguity_deg.to_string(),
                reason: "must be within [0, 180]".to_string(),
            });
        }
        if !self.width_escape_tolerance.is_finite() || self.width_escape_tolerance < 0.0 {
            return Err(Error::InvalidParameter {
                name: "width_escape_tolerance",
                value: self.width_escape_tolerance.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}
