//! # Hydronet Core
//!
//! Core types, errors and geometry helpers for the hydronet
//! hydrographic network library.
//!
//! This crate provides:
//! - The edge/terminal-point model types shared by all engines
//! - The error taxonomy for batch network construction
//! - Angle and distance helpers for planar and geographic data
//! - Envelope-indexed waterbody and coastline input layers
//! - Algorithm traits for consistent API

pub mod config;
pub mod error;
pub mod geom;
pub mod layers;
pub mod model;

pub use config::ConstructionParams;
pub use error::{Error, Result};
pub use geom::{AngleComputer, CoordKey, CoordMode};
pub use model::{DirectionState, EdgeRecord, EdgeType, FeatureId, FlowDirection, Rank};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ConstructionParams;
    pub use crate::error::{Error, Result};
    pub use crate::geom::{AngleComputer, CoordKey, CoordMode};
    pub use crate::layers::{CoastlineLayer, WaterbodyLayer};
    pub use crate::model::{
        DirectionState, EdgeRecord, EdgeType, FeatureId, FlowDirection, Rank, TerminalPoint,
    };
    pub use crate::Algorithm;
}

/// Core trait for all engines in hydronet.
///
/// Engines are batch computations that transform input data according
/// to parameters; they either run to completion or fail as a whole.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
