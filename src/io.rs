//! Edge-list writers.
//!
//! Two on-disk forms, both 1-based: a text edge list (`p N M` header, then
//! one `e u v` line per edge) and a packed binary list (optional `[N, M]`
//! u64 header, then `[u, v]` pairs, little-endian). Output goes either to
//! one file per rank (suffix `_<rank>`) or to a single root-written file,
//! in which case the edges are gathered, sorted, and deduplicated first.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::comm::{gather_edges, Communicator};
use crate::{Edge, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputFormat {
    #[default]
    EdgeList,
    BinaryEdgeList,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterConfig {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub header: bool,
    pub single_file: bool,
}

fn write_to<W: Write>(
    out: &mut W,
    format: OutputFormat,
    header: Option<(u64, u64)>,
    edges: &[Edge],
) -> Result<()> {
    match format {
        OutputFormat::EdgeList => {
            if let Some((n, m)) = header {
                writeln!(out, "p {n} {m}")?;
            }
            for &(u, v) in edges {
                writeln!(out, "e {} {}", u + 1, v + 1)?;
            }
        }
        OutputFormat::BinaryEdgeList => {
            if let Some((n, m)) = header {
                out.write_all(&n.to_le_bytes())?;
                out.write_all(&m.to_le_bytes())?;
            }
            for &(u, v) in edges {
                out.write_all(&(u + 1).to_le_bytes())?;
                out.write_all(&(v + 1).to_le_bytes())?;
            }
        }
    }
    Ok(())
}

/// Write the group's edges according to `cfg`. Collective: every rank must
/// call this, even those that end up writing nothing.
pub fn write_edges<C: Communicator>(
    cfg: &WriterConfig,
    global_n: u64,
    edges: &[Edge],
    comm: &C,
) -> Result<()> {
    if cfg.single_file {
        let gathered = gather_edges(comm, edges, 0);
        if let Some(mut all) = gathered {
            all.sort_unstable();
            all.dedup();
            tracing::info!(path = %cfg.path.display(), edges = all.len(), "writing edge list");
            let mut out = BufWriter::new(File::create(&cfg.path)?);
            let header = cfg.header.then_some((global_n, all.len() as u64));
            write_to(&mut out, cfg.format, header, &all)?;
            out.flush()?;
        }
        return Ok(());
    }

    let global_m = comm.allreduce_sum(edges.len() as u64);
    let path = rank_path(&cfg.path, comm.rank());
    let mut out = BufWriter::new(File::create(&path)?);
    let header = cfg.header.then_some((global_n, global_m));
    write_to(&mut out, cfg.format, header, edges)?;
    out.flush()?;
    Ok(())
}

fn rank_path(path: &Path, rank: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!("_{rank}"));
    PathBuf::from(name)
}
