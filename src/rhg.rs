//! Random hyperbolic graphs.
//!
//! Points live on a hyperbolic disk of radius `R` with radial density
//! proportional to `sinh(alpha * r)`, `alpha = (gamma - 1) / 2`; two points
//! are adjacent iff their hyperbolic distance is at most `R`. The disk
//! radius is calibrated from the target average degree with the Krioukov
//! expected-degree formula, so degree targets are met in expectation.
//!
//! The disk is cut into concentric annulus bands, each split into the same
//! `k` angular segments; a rank owns a contiguous wedge of segments. Cell
//! point counts come from the weighted splitter (band masses are unequal),
//! positions from per-cell streams, so ghost cells are rebuilt on demand
//! exactly as in the Euclidean geometric sampler. Candidate segments for a
//! neighbor query are bounded through the hyperbolic law of cosines taken
//! at the band's inner radius, which over-approximates the reachable angle
//! and therefore never misses an edge.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::chunks::chunk_range;
use crate::hash::hash2;
use crate::split::WeightedSplitter;
use crate::variates::HashRng;
use crate::{Edge, Error, Result, VId, VertexRange};

const SALT: u64 = 0x7268_6721; // "rhg!"

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RhgConfig {
    pub n: u64,
    /// Power-law exponent; must exceed 2.
    pub gamma: f64,
    /// Target average degree.
    pub avg_degree: f64,
    /// Compare distances through `acosh` instead of raw `cosh` values
    /// (slower, steadier at the connection threshold).
    pub hp_floats: bool,
    pub seed: u64,
    /// Number of angular segments per band; also the ownership granularity.
    pub chunks: u64,
}

/// Disk radius yielding the configured average degree.
///
/// Expected degree under the sinh density is `(2/pi) * n * xi^2 * exp(-R/2)`
/// with `xi = alpha / (alpha - 1/2)` (Krioukov et al. 2010); solving for `R`
/// gives the calibration in closed form.
pub fn target_radius(n: u64, gamma: f64, avg_degree: f64) -> Result<f64> {
    if gamma <= 2.0 || !gamma.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "power-law exponent {gamma} must exceed 2"
        )));
    }
    if !(avg_degree > 0.0) || avg_degree >= n as f64 {
        return Err(Error::InvalidParameter(format!(
            "average degree {avg_degree} outside (0, n)"
        )));
    }
    let alpha = (gamma - 1.0) / 2.0;
    let xi = alpha / (alpha - 0.5);
    let arg = 2.0 * xi * xi * n as f64 / (PI * avg_degree);
    if arg <= 1.0 {
        return Err(Error::InvalidParameter(format!(
            "average degree {avg_degree} too high for n = {n}"
        )));
    }
    Ok(2.0 * arg.ln())
}

struct Point {
    r: f64,
    theta: f64,
    cosh_r: f64,
    sinh_r: f64,
}

struct CellPoints {
    first_id: VId,
    points: Vec<Point>,
}

struct Layout {
    n: u64,
    alpha: f64,
    radius: f64,
    cosh_radius: f64,
    bands: u64,
    segments: u64,
    /// `cosh(alpha * r_i)` at each band boundary, length `bands + 1`.
    boundary_cosh: Vec<f64>,
    /// Band boundary radii, length `bands + 1`.
    boundaries: Vec<f64>,
    /// Mass prefix over segment-major cells, length `segments * bands + 1`.
    mass_prefix: Vec<f64>,
    base: u64,
}

fn build(cfg: &RhgConfig) -> Result<Layout> {
    if cfg.chunks == 0 {
        return Err(Error::InvalidParameter("chunk count must be >= 1".into()));
    }
    let radius = target_radius(cfg.n, cfg.gamma, cfg.avg_degree)?;
    let alpha = (cfg.gamma - 1.0) / 2.0;
    if alpha * radius > 700.0 {
        return Err(Error::Overflow(format!(
            "sinh density exponent {:.1} exceeds f64 range",
            alpha * radius
        )));
    }
    let bands = ((cfg.n as f64).log2().ceil() as u64).max(1);
    let boundaries: Vec<f64> = (0..=bands).map(|i| radius * i as f64 / bands as f64).collect();
    let boundary_cosh: Vec<f64> = boundaries.iter().map(|r| (alpha * r).cosh()).collect();
    let total_mass = boundary_cosh[bands as usize] - 1.0;

    let segments = cfg.chunks;
    let mut mass_prefix = Vec::with_capacity((segments * bands + 1) as usize);
    mass_prefix.push(0.0);
    for _ in 0..segments {
        for b in 0..bands as usize {
            let band_mass = (boundary_cosh[b + 1] - boundary_cosh[b]) / total_mass;
            let last = *mass_prefix.last().unwrap();
            mass_prefix.push(last + band_mass / segments as f64);
        }
    }

    Ok(Layout {
        n: cfg.n,
        alpha,
        radius,
        cosh_radius: radius.cosh(),
        bands,
        segments,
        boundary_cosh,
        boundaries,
        mass_prefix,
        base: hash2(cfg.seed, SALT, 0),
    })
}

impl Layout {
    fn cell(&self, segment: u64, band: u64) -> u64 {
        segment * self.bands + band
    }

    fn splitter(&self) -> WeightedSplitter<'_> {
        WeightedSplitter::new(self.base, &self.mass_prefix, self.n)
    }

    fn cell_points(&self, segment: u64, band: u64) -> CellPoints {
        let cell = self.cell(segment, band);
        let (count, before) = self.splitter().count_and_offset(cell);
        let mut rng = HashRng::new(hash2(self.base, cell, 1));
        let (clo, chi) = (self.boundary_cosh[band as usize], self.boundary_cosh[band as usize + 1]);
        let width = 2.0 * PI / self.segments as f64;
        let points = (0..count)
            .map(|_| {
                // Inverse CDF of the sinh density restricted to the band.
                let r = (clo + rng.unit() * (chi - clo)).acosh() / self.alpha;
                let theta = (segment as f64 + rng.unit()) * width;
                Point { r, theta, cosh_r: r.cosh(), sinh_r: r.sinh() }
            })
            .collect();
        CellPoints { first_id: before, points }
    }

    /// True iff the hyperbolic distance between the points is at most `R`.
    fn connected(&self, a: &Point, b: &Point, hp: bool) -> bool {
        let mut dt = (a.theta - b.theta).abs();
        if dt > PI {
            dt = 2.0 * PI - dt;
        }
        if hp {
            let arg = (a.r.cosh() * b.r.cosh() - a.r.sinh() * b.r.sinh() * dt.cos()).max(1.0);
            arg.acosh() <= self.radius
        } else {
            a.cosh_r * b.cosh_r - a.sinh_r * b.sinh_r * dt.cos() <= self.cosh_radius
        }
    }

    /// Angular half-width within which a point at radius `r` can reach any
    /// point of the band starting at inner radius `inner`; `None` when the
    /// whole band is out of range.
    fn reach(&self, r: f64, inner: f64) -> Option<f64> {
        if r + inner <= self.radius {
            return Some(PI);
        }
        let denom = r.sinh() * inner.sinh();
        if denom <= 0.0 {
            return Some(PI);
        }
        let cos_dt = (r.cosh() * inner.cosh() - self.cosh_radius) / denom;
        if cos_dt >= 1.0 {
            None
        } else if cos_dt <= -1.0 {
            Some(PI)
        } else {
            Some(cos_dt.acos())
        }
    }
}

/// Hyperbolic sampler bound to the configured wedge decomposition.
pub fn streaming<F>(cfg: &RhgConfig, rank: u64, size: u64, mut emit: F) -> Result<VertexRange>
where
    F: FnMut(VId, VId),
{
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    let layout = build(cfg)?;
    tracing::debug!(
        n = cfg.n,
        gamma = cfg.gamma,
        avg_degree = cfg.avg_degree,
        radius = layout.radius,
        rank,
        size,
        "sampling random hyperbolic graph"
    );
    let segments = chunk_range(layout.segments, size, rank);
    let my = (
        layout.splitter().count_and_offset(segments.start * layout.bands).1,
        layout.splitter().count_and_offset(segments.end * layout.bands).1,
    );
    let width = 2.0 * PI / layout.segments as f64;
    let mut cache: HashMap<u64, CellPoints> = HashMap::new();

    for segment in segments.clone() {
        for band in 0..layout.bands {
            let own = layout.cell_points(segment, band);
            for (j, point) in own.points.iter().enumerate() {
                let u = own.first_id + j as u64;
                for other_band in 0..layout.bands {
                    let Some(dt) = layout.reach(point.r, layout.boundaries[other_band as usize])
                    else {
                        continue;
                    };
                    let span = (dt / width).ceil() as u64;
                    let all = 2 * span + 1 >= layout.segments;
                    let candidates: Vec<u64> = if all {
                        (0..layout.segments).collect()
                    } else {
                        (0..=2 * span)
                            .map(|i| {
                                (segment + layout.segments + i - span) % layout.segments
                            })
                            .collect()
                    };
                    for other_segment in candidates {
                        let cell = layout.cell(other_segment, other_band);
                        let other: &CellPoints = if other_segment == segment && other_band == band {
                            &own
                        } else {
                            &*cache
                                .entry(cell)
                                .or_insert_with(|| layout.cell_points(other_segment, other_band))
                        };
                        for (j2, q) in other.points.iter().enumerate() {
                            let v = other.first_id + j2 as u64;
                            if v == u {
                                continue;
                            }
                            let v_local = (my.0..my.1).contains(&v);
                            if (!v_local || u < v) && layout.connected(point, q, cfg.hp_floats) {
                                emit(u, v);
                            }
                        }
                    }
                }
            }
            cache.insert(layout.cell(segment, band), own);
        }
    }
    Ok(my)
}

/// Buffered variant of [`streaming`].
pub fn generate(cfg: &RhgConfig, rank: u64, size: u64) -> Result<(Vec<Edge>, VertexRange)> {
    let mut edges = Vec::new();
    let range = streaming(cfg, rank, size, |u, v| edges.push((u, v)))?;
    Ok((edges, range))
}

/// Polar coordinates `(r, theta)` of the local vertices, in vertex-id order.
pub fn coordinates(cfg: &RhgConfig, rank: u64, size: u64) -> Result<Vec<[f64; 2]>> {
    if size == 0 || rank >= size {
        return Err(Error::InvalidParameter(format!(
            "rank {rank} out of range for {size} processes"
        )));
    }
    let layout = build(cfg)?;
    let segments = chunk_range(layout.segments, size, rank);
    let mut coords = Vec::new();
    for segment in segments {
        for band in 0..layout.bands {
            coords.extend(
                layout
                    .cell_points(segment, band)
                    .points
                    .iter()
                    .map(|p| [p.r, p.theta]),
            );
        }
    }
    Ok(coords)
}
