//! Generation facade bound to a process group.
//!
//! [`Generator`] is the SPMD entry point: it
//! holds a communicator and a configuration, and exposes one method per
//! model. Every rank of the group constructs its own `Generator` with the
//! same configuration and calls the same methods; the returned edges and
//! vertex range are the caller's local share of the global graph.
//!
//! The optional post-passes (statistics, undirected verification, edge-list
//! output) are collective: with any of them enabled, all ranks must make
//! the same sequence of generation calls.

use std::path::PathBuf;

use crate::comm::Communicator;
use crate::io::{OutputFormat, WriterConfig};
use crate::{ba, gnm, gnp, grid, io, kronecker, rgg, rhg, stats};
use crate::{Edge, Error, Result, VId, VertexRange};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Chunk count; 0 picks one chunk per rank (linear models) or the
    /// smallest square/cube covering the group (spatial models).
    pub chunks: u64,
    pub use_hp_floats: bool,
    pub self_loops: bool,
    pub periodic: bool,
    pub output_path: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub output_header: bool,
    pub output_single_file: bool,
    pub enable_undirected_verification: bool,
    pub enable_basic_stats: bool,
    pub enable_advanced_stats: bool,
    /// Cap on the local edge buffer; exceeding it is a fatal error.
    pub edge_limit: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            chunks: 0,
            use_hp_floats: false,
            self_loops: false,
            periodic: false,
            output_path: None,
            output_format: OutputFormat::EdgeList,
            output_header: true,
            output_single_file: false,
            enable_undirected_verification: false,
            enable_basic_stats: false,
            enable_advanced_stats: false,
            edge_limit: None,
        }
    }
}

/// Local share of a generated graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphResult {
    pub edges: Vec<Edge>,
    pub vertex_range: VertexRange,
}

/// Local share plus 2D positions of the local vertices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphResult2D {
    pub edges: Vec<Edge>,
    pub vertex_range: VertexRange,
    pub coordinates: Vec<[f64; 2]>,
}

/// Local share plus 3D positions of the local vertices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphResult3D {
    pub edges: Vec<Edge>,
    pub vertex_range: VertexRange,
    pub coordinates: Vec<[f64; 3]>,
}

pub struct Generator<C: Communicator> {
    comm: C,
    config: GeneratorConfig,
}

impl<C: Communicator> Generator<C> {
    pub fn new(comm: C) -> Self {
        Self { comm, config: GeneratorConfig::default() }
    }

    pub fn with_config(comm: C, config: GeneratorConfig) -> Self {
        Self { comm, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn set_seed(&mut self, seed: u64) -> &mut Self {
        self.config.seed = seed;
        self
    }

    pub fn set_chunk_count(&mut self, k: u64) -> &mut Self {
        self.config.chunks = k;
        self
    }

    pub fn use_hp_floats(&mut self, state: bool) -> &mut Self {
        self.config.use_hp_floats = state;
        self
    }

    pub fn set_self_loops(&mut self, state: bool) -> &mut Self {
        self.config.self_loops = state;
        self
    }

    pub fn set_periodic(&mut self, state: bool) -> &mut Self {
        self.config.periodic = state;
        self
    }

    /// Write generated graphs to `path` (plus a `_<rank>` suffix unless
    /// single-file output is on), with or without the `p N M` header.
    pub fn enable_output(&mut self, path: impl Into<PathBuf>, header: bool) -> &mut Self {
        self.config.output_path = Some(path.into());
        self.config.output_header = header;
        self
    }

    pub fn set_output_format(&mut self, format: OutputFormat) -> &mut Self {
        self.config.output_format = format;
        self
    }

    pub fn set_output_single_file(&mut self, state: bool) -> &mut Self {
        self.config.output_single_file = state;
        self
    }

    pub fn enable_undirected_verification(&mut self) -> &mut Self {
        self.config.enable_undirected_verification = true;
        self
    }

    pub fn enable_basic_statistics(&mut self) -> &mut Self {
        self.config.enable_basic_stats = true;
        self
    }

    pub fn enable_advanced_statistics(&mut self) -> &mut Self {
        self.config.enable_advanced_stats = true;
        self
    }

    pub fn set_edge_limit(&mut self, limit: u64) -> &mut Self {
        self.config.edge_limit = Some(limit);
        self
    }

    fn rank(&self) -> u64 {
        self.comm.rank() as u64
    }

    fn size(&self) -> u64 {
        self.comm.size() as u64
    }

    fn linear_chunks(&self) -> u64 {
        if self.config.chunks == 0 { self.size() } else { self.config.chunks }
    }

    fn spatial_chunks<const D: usize>(&self) -> u64 {
        if self.config.chunks != 0 {
            return self.config.chunks;
        }
        let mut per_dim = 1u64;
        while per_dim.pow(D as u32) < self.size() {
            per_dim += 1;
        }
        per_dim.pow(D as u32)
    }

    /// Post-generation passes shared by every model.
    fn post(&self, edges: &mut Vec<Edge>, vertex_range: VertexRange, undirected: bool) -> Result<()> {
        if let Some(cap) = self.config.edge_limit {
            if edges.len() as u64 > cap {
                return Err(Error::EdgeLimit(edges.len() as u64));
            }
        }
        if self.config.enable_basic_stats {
            let basic = stats::basic(edges, vertex_range, &self.comm);
            if self.comm.rank() == 0 {
                tracing::info!(
                    nodes = basic.global_nodes,
                    edges = basic.global_edges,
                    edge_imbalance = basic.edge_imbalance,
                    "basic statistics"
                );
            }
        }
        if self.config.enable_advanced_stats {
            let adv = stats::advanced(edges, vertex_range, &self.comm);
            if self.comm.rank() == 0 {
                tracing::info!(
                    density = adv.density,
                    degree_min = adv.degrees.min,
                    degree_mean = adv.degrees.mean,
                    degree_max = adv.degrees.max,
                    edge_locality = adv.edge_locality,
                    ghost_nodes = adv.ghost_nodes,
                    "advanced statistics"
                );
            }
        }
        if undirected && self.config.enable_undirected_verification {
            stats::verify_undirected(edges, vertex_range, &self.comm);
        }
        if let Some(path) = &self.config.output_path {
            let writer = WriterConfig {
                path: path.clone(),
                format: self.config.output_format,
                header: self.config.output_header,
                single_file: self.config.output_single_file,
            };
            let global_n = self.comm.allreduce_sum(vertex_range.1 - vertex_range.0);
            io::write_edges(&writer, global_n, edges, &self.comm)?;
        }
        Ok(())
    }

    fn finish(
        &self,
        (mut edges, vertex_range): (Vec<Edge>, VertexRange),
        undirected: bool,
    ) -> Result<GraphResult> {
        self.post(&mut edges, vertex_range, undirected)?;
        Ok(GraphResult { edges, vertex_range })
    }

    // Erdős–Rényi ----------------------------------------------------------

    pub fn gnm_directed(&self, n: u64, m: u64) -> Result<GraphResult> {
        tracing::info!(n, m, "generating directed G(n,m)");
        let cfg = self.gnm_config(n, m);
        self.finish(gnm::directed(&cfg, self.rank(), self.size())?, false)
    }

    pub fn gnm_undirected(&self, n: u64, m: u64) -> Result<GraphResult> {
        tracing::info!(n, m, "generating undirected G(n,m)");
        let cfg = self.gnm_config(n, m);
        self.finish(gnm::undirected(&cfg, self.rank(), self.size())?, true)
    }

    fn gnm_config(&self, n: u64, m: u64) -> gnm::GnmConfig {
        gnm::GnmConfig {
            n,
            m,
            self_loops: self.config.self_loops,
            seed: self.config.seed,
            chunks: self.linear_chunks(),
        }
    }

    pub fn gnp_directed(&self, n: u64, p: f64) -> Result<GraphResult> {
        tracing::info!(n, p, "generating directed G(n,p)");
        let cfg = self.gnp_config(n, p);
        self.finish(gnp::directed(&cfg, self.rank(), self.size())?, false)
    }

    pub fn gnp_undirected(&self, n: u64, p: f64) -> Result<GraphResult> {
        tracing::info!(n, p, "generating undirected G(n,p)");
        let cfg = self.gnp_config(n, p);
        self.finish(gnp::undirected(&cfg, self.rank(), self.size())?, true)
    }

    fn gnp_config(&self, n: u64, p: f64) -> gnp::GnpConfig {
        gnp::GnpConfig {
            n,
            p,
            self_loops: self.config.self_loops,
            seed: self.config.seed,
            chunks: self.linear_chunks(),
        }
    }

    // Random geometric graphs ---------------------------------------------

    fn rgg_config<const D: usize>(&self, n: u64, r: f64) -> rgg::RggConfig<D> {
        rgg::RggConfig {
            n,
            r,
            periodic: self.config.periodic,
            seed: self.config.seed,
            chunks: self.spatial_chunks::<D>(),
        }
    }

    pub fn rgg_2d(&self, n: u64, r: f64) -> Result<GraphResult> {
        tracing::info!(n, r, "generating 2D random geometric graph");
        let cfg = self.rgg_config::<2>(n, r);
        self.finish(rgg::generate(&cfg, self.rank(), self.size())?, true)
    }

    pub fn rgg_2d_m(&self, n: u64, m: u64) -> Result<GraphResult> {
        let r = rgg::radius_for_edges::<2>(n, m, self.config.periodic)?;
        self.rgg_2d(n, r)
    }

    pub fn rgg_2d_mr(&self, m: u64, r: f64) -> Result<GraphResult> {
        let n = rgg::vertices_for_edges::<2>(m, r, self.config.periodic)?;
        self.rgg_2d(n, r)
    }

    pub fn rgg_2d_coordinates(&self, n: u64, r: f64) -> Result<GraphResult2D> {
        tracing::info!(n, r, "generating 2D random geometric graph with coordinates");
        let cfg = self.rgg_config::<2>(n, r);
        let coordinates = rgg::coordinates(&cfg, self.rank(), self.size())?;
        let graph = self.finish(rgg::generate(&cfg, self.rank(), self.size())?, true)?;
        Ok(GraphResult2D { edges: graph.edges, vertex_range: graph.vertex_range, coordinates })
    }

    pub fn rgg_3d(&self, n: u64, r: f64) -> Result<GraphResult> {
        tracing::info!(n, r, "generating 3D random geometric graph");
        let cfg = self.rgg_config::<3>(n, r);
        self.finish(rgg::generate(&cfg, self.rank(), self.size())?, true)
    }

    pub fn rgg_3d_m(&self, n: u64, m: u64) -> Result<GraphResult> {
        let r = rgg::radius_for_edges::<3>(n, m, self.config.periodic)?;
        self.rgg_3d(n, r)
    }

    pub fn rgg_3d_mr(&self, m: u64, r: f64) -> Result<GraphResult> {
        let n = rgg::vertices_for_edges::<3>(m, r, self.config.periodic)?;
        self.rgg_3d(n, r)
    }

    pub fn rgg_3d_coordinates(&self, n: u64, r: f64) -> Result<GraphResult3D> {
        tracing::info!(n, r, "generating 3D random geometric graph with coordinates");
        let cfg = self.rgg_config::<3>(n, r);
        let coordinates = rgg::coordinates(&cfg, self.rank(), self.size())?;
        let graph = self.finish(rgg::generate(&cfg, self.rank(), self.size())?, true)?;
        Ok(GraphResult3D { edges: graph.edges, vertex_range: graph.vertex_range, coordinates })
    }

    // Barabási–Albert ------------------------------------------------------

    fn ba_config(&self, n: u64, d: u64, target_m: Option<u64>, directed: bool) -> ba::BaConfig {
        ba::BaConfig {
            n,
            d,
            target_m,
            directed,
            self_loops: self.config.self_loops,
            seed: self.config.seed,
            chunks: self.linear_chunks(),
        }
    }

    pub fn ba(&self, n: u64, d: u64, directed: bool) -> Result<GraphResult> {
        tracing::info!(n, d, directed, "generating preferential-attachment graph");
        let cfg = self.ba_config(n, d, None, directed);
        self.finish(ba::generate(&cfg, &self.comm)?, !directed)
    }

    pub fn ba_nm(&self, n: u64, m: u64, directed: bool) -> Result<GraphResult> {
        tracing::info!(n, m, directed, "generating preferential-attachment graph");
        let cfg = self.ba_config(n, 0, Some(m), directed);
        self.finish(ba::generate(&cfg, &self.comm)?, !directed)
    }

    pub fn ba_md(&self, m: u64, d: u64, directed: bool) -> Result<GraphResult> {
        if d == 0 {
            return Err(Error::InvalidParameter("attachment degree must be >= 1".into()));
        }
        let n = m / d + if self.config.self_loops { 0 } else { d };
        self.ba_nm(n, m, directed)
    }

    // Random hyperbolic graphs --------------------------------------------

    fn rhg_config(&self, gamma: f64, n: u64, avg_degree: f64) -> rhg::RhgConfig {
        rhg::RhgConfig {
            n,
            gamma,
            avg_degree,
            hp_floats: self.config.use_hp_floats,
            seed: self.config.seed,
            chunks: self.linear_chunks(),
        }
    }

    pub fn rhg(&self, gamma: f64, n: u64, avg_degree: f64) -> Result<GraphResult> {
        tracing::info!(gamma, n, avg_degree, "generating random hyperbolic graph");
        let cfg = self.rhg_config(gamma, n, avg_degree);
        self.finish(rhg::generate(&cfg, self.rank(), self.size())?, true)
    }

    pub fn rhg_nm(&self, gamma: f64, n: u64, m: u64) -> Result<GraphResult> {
        self.rhg(gamma, n, 2.0 * m as f64 / n as f64)
    }

    pub fn rhg_md(&self, gamma: f64, m: u64, avg_degree: f64) -> Result<GraphResult> {
        if !(avg_degree > 0.0) {
            return Err(Error::InvalidParameter("average degree must be positive".into()));
        }
        let n = (2.0 * m as f64 / avg_degree).round().max(1.0) as u64;
        self.rhg(gamma, n, avg_degree)
    }

    pub fn rhg_coordinates(&self, gamma: f64, n: u64, avg_degree: f64) -> Result<GraphResult2D> {
        tracing::info!(gamma, n, avg_degree, "generating random hyperbolic graph with coordinates");
        let cfg = self.rhg_config(gamma, n, avg_degree);
        let coordinates = rhg::coordinates(&cfg, self.rank(), self.size())?;
        let graph = self.finish(rhg::generate(&cfg, self.rank(), self.size())?, true)?;
        Ok(GraphResult2D { edges: graph.edges, vertex_range: graph.vertex_range, coordinates })
    }

    pub fn rhg_coordinates_nm(&self, gamma: f64, n: u64, m: u64) -> Result<GraphResult2D> {
        self.rhg_coordinates(gamma, n, 2.0 * m as f64 / n as f64)
    }

    pub fn rhg_coordinates_md(&self, gamma: f64, m: u64, avg_degree: f64) -> Result<GraphResult2D> {
        if !(avg_degree > 0.0) {
            return Err(Error::InvalidParameter("average degree must be positive".into()));
        }
        let n = (2.0 * m as f64 / avg_degree).round().max(1.0) as u64;
        self.rhg_coordinates(gamma, n, avg_degree)
    }

    // Grids ----------------------------------------------------------------

    fn grid_config<const D: usize>(&self, dims: [u64; D], p: f64) -> grid::GridConfig<D> {
        grid::GridConfig {
            dims,
            p,
            periodic: self.config.periodic,
            seed: self.config.seed,
            chunks: self.spatial_chunks::<D>(),
        }
    }

    pub fn grid_2d(&self, x: u64, y: u64, p: f64) -> Result<GraphResult> {
        tracing::info!(x, y, p, "generating 2D lattice graph");
        let cfg = self.grid_config([x, y], p);
        self.finish(grid::generate(&cfg, self.rank(), self.size())?, true)
    }

    pub fn grid_2d_n(&self, n: u64, p: f64) -> Result<GraphResult> {
        let [x, y] = grid::near_square(n);
        self.grid_2d(x, y, p)
    }

    pub fn grid_2d_coordinates(&self, x: u64, y: u64, p: f64) -> Result<GraphResult2D> {
        tracing::info!(x, y, p, "generating 2D lattice graph with coordinates");
        let cfg = self.grid_config([x, y], p);
        let coordinates = grid::coordinates(&cfg, self.rank(), self.size())?;
        let graph = self.finish(grid::generate(&cfg, self.rank(), self.size())?, true)?;
        Ok(GraphResult2D { edges: graph.edges, vertex_range: graph.vertex_range, coordinates })
    }

    pub fn grid_3d(&self, x: u64, y: u64, z: u64, p: f64) -> Result<GraphResult> {
        tracing::info!(x, y, z, p, "generating 3D lattice graph");
        let cfg = self.grid_config([x, y, z], p);
        self.finish(grid::generate(&cfg, self.rank(), self.size())?, true)
    }

    pub fn grid_3d_n(&self, n: u64, p: f64) -> Result<GraphResult> {
        let [x, y, z] = grid::near_cube(n);
        self.grid_3d(x, y, z, p)
    }

    pub fn grid_3d_coordinates(&self, x: u64, y: u64, z: u64, p: f64) -> Result<GraphResult3D> {
        tracing::info!(x, y, z, p, "generating 3D lattice graph with coordinates");
        let cfg = self.grid_config([x, y, z], p);
        let coordinates = grid::coordinates(&cfg, self.rank(), self.size())?;
        let graph = self.finish(grid::generate(&cfg, self.rank(), self.size())?, true)?;
        Ok(GraphResult3D { edges: graph.edges, vertex_range: graph.vertex_range, coordinates })
    }

    // Kronecker / R-MAT ----------------------------------------------------

    /// Graph500 Kronecker parameterization. Simple-graph mode: duplicate
    /// walks are deduplicated locally (cross-rank duplicates can survive).
    pub fn kronecker(&self, n: u64, m: u64, directed: bool) -> Result<GraphResult> {
        let (a, b, c) = kronecker::KRONECKER_INITIATOR;
        self.rmat(n, m, a, b, c, directed)
    }

    /// R-MAT sampler; see [`Self::kronecker`] for the duplicate policy.
    pub fn rmat(&self, n: u64, m: u64, a: f64, b: f64, c: f64, directed: bool) -> Result<GraphResult> {
        tracing::info!(n, m, a, b, c, directed, "generating R-MAT graph");
        let cfg = kronecker::RmatConfig {
            n,
            m,
            a,
            b,
            c,
            directed,
            self_loops: self.config.self_loops,
            multigraph: false,
            seed: self.config.seed,
            chunks: self.linear_chunks(),
        };
        // Edge indices, not vertices, are partitioned here; the symmetry
        // check does not apply.
        self.finish(kronecker::generate(&cfg, self.rank(), self.size())?, false)
    }

    // Post-pass helpers ----------------------------------------------------

    /// Global vertex distribution of a generated graph (`p + 1` entries).
    pub fn vertex_distribution(&self, graph: &GraphResult) -> Vec<VId> {
        crate::csr::vertex_distribution(graph.vertex_range, &self.comm)
    }
}
