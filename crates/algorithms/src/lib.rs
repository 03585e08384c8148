//! # Hydronet Algorithms
//!
//! Network construction and query engines for hydronet.
//!
//! ## Available engines
//!
//! - **graph**: undirected-to-directed network model built by exact
//!   coordinate-equality node dedup
//! - **directionalize**: sink-seeded direction assignment, bank-edge
//!   resolution, and the post-direction cycle checker
//! - **rank**: primary/secondary channel classification by deflection
//!   angle with channel-width disambiguation
//! - **hygraph**: the immutable, spatially indexed query graph

pub mod directionalize;
pub mod graph;
pub mod hygraph;
pub mod rank;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::directionalize::{
        apply_outcome, directionalize, CycleChecker, DirectedSegment, Directionalize,
        DirectionalizeInput, DirectionalizeOutcome, DirectionalizedNetwork,
    };
    pub use crate::graph::{Edge, EdgeId, Network, Node, NodeId};
    pub use crate::hygraph::{
        CatchmentId, CatchmentRecord, CatchmentType, ECatchment, EFlowpath, FlowpathId,
        FlowpathRecord, HyGraph, Nexus, NexusId,
    };
    pub use crate::rank::{RankCompute, RankComputer, RankInput, RankOutput};
    pub use hydronet_core::prelude::*;
}
