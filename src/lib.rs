//! # graphgen
//!
//! Communication-free distributed generation of massive random graphs: each
//! process of an SPMD group deterministically emits exactly its share of a
//! globally well-defined random graph, using only the shared seed, its rank,
//! and the generator's mathematical structure. No process ever materializes
//! the global graph, and no data is exchanged during sampling.
//!
//! ## Design contract
//!
//! - **Every random decision has a coordinate**: a tuple naming the decision
//!   (edge cell, tree node, vertex/attempt) is hashed with the seed, and that
//!   hash alone seeds the decision's variate. Any process can replay any
//!   decision.
//! - **Determinism is the product, not an option**: for fixed parameters the
//!   union of all ranks' outputs equals the single-process reference output,
//!   for every process count.
//! - **Communication only after generation**: statistics, the undirected
//!   symmetry check, mirror-edge routing, and file output are collective
//!   post-passes behind the [`comm::Communicator`] seam.
//!
//! ## References (what motivated the implementations/tests)
//!
//! - Funke et al. (2019): *Communication-free massively distributed graph
//!   generation* — the recursive-subdivision blueprint for G(n,m), the
//!   chunked geometric samplers, and the statistics pass.
//! - Batagelj & Brandes (2005): linear-time preferential attachment via the
//!   implicit degree-sequence array.
//! - Krioukov et al. (2010): hyperbolic geometry of complex networks; the
//!   expected-degree calibration of the disk radius.
//! - Chakrabarti, Zhan, Faloutsos (2004): R-MAT recursive quadrant walks.
//! - Jenkins: SpookyHash short-input mixing rounds.

pub mod ba;
mod bisect;
pub mod chunks;
pub mod comm;
pub mod csr;
pub mod generator;
pub mod gnm;
pub mod gnp;
pub mod grid;
pub mod hash;
pub mod io;
pub mod kronecker;
pub mod rgg;
pub mod rhg;
pub mod split;
pub mod stats;
pub mod variates;

pub use comm::{Communicator, MemoryFabric, NoComm};
pub use csr::{build_csr, vertex_distribution, Csr};
pub use generator::{Generator, GeneratorConfig, GraphResult, GraphResult2D, GraphResult3D};
pub use io::OutputFormat;
pub use stats::{AdvancedStatistics, BasicStatistics, SymmetryReport};

/// Global vertex id.
pub type VId = u64;

/// Directed edge, or one orientation of an undirected edge.
pub type Edge = (VId, VId);

/// Half-open interval `[first, last)` of vertex ids owned by a process.
pub type VertexRange = (VId, VId);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("chunk count {k} cannot tile a {dims}D domain")]
    NotDecomposable { k: u64, dims: usize },
    #[error("64-bit overflow: {0}")]
    Overflow(String),
    #[error("edge buffer limit exceeded: {0} local edges")]
    EdgeLimit(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
