//! Chunk partitioning.
//!
//! A chunk is a contiguous, independently samplable slice of the vertex space
//! (or of an auxiliary sampling space). Chunks are virtual: everything here is
//! closed-form arithmetic on `(n, k)` and never materializes per-chunk state,
//! so any process can reason about any chunk.

use crate::{Error, Result, VId, VertexRange};

/// Block distribution of `n` indices over `k` chunks: chunk `c` holds
/// `n/k + (c < n % k)` indices, offsets are the cumulative sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDistribution {
    n: u64,
    k: u64,
}

impl ChunkDistribution {
    pub fn new(n: u64, k: u64) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidParameter("chunk count must be >= 1".into()));
        }
        Ok(Self { n, k })
    }

    #[must_use]
    pub fn universe(&self) -> u64 {
        self.n
    }

    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.k
    }

    /// Number of indices in chunk `c`.
    #[must_use]
    pub fn size(&self, c: u64) -> u64 {
        debug_assert!(c < self.k);
        self.n / self.k + u64::from(c < self.n % self.k)
    }

    /// First global index of chunk `c`; `offset(k) == n`.
    #[must_use]
    pub fn offset(&self, c: u64) -> u64 {
        debug_assert!(c <= self.k);
        c * (self.n / self.k) + c.min(self.n % self.k)
    }

    /// Chunk containing global index `v`.
    #[must_use]
    pub fn chunk_of(&self, v: u64) -> u64 {
        debug_assert!(v < self.n);
        let q = self.n / self.k;
        let r = self.n % self.k;
        let fat = (q + 1) * r;
        if v < fat {
            v / (q + 1)
        } else {
            r + (v - fat) / q
        }
    }
}

/// Contiguous range of chunk ids owned by `rank` out of `size` processes.
/// The first `k % size` ranks absorb one extra chunk each.
#[must_use]
pub fn chunk_range(k: u64, size: u64, rank: u64) -> std::ops::Range<u64> {
    debug_assert!(rank < size);
    let per = k / size;
    let leftover = k % size;
    let start = rank * per + rank.min(leftover);
    start..start + per + u64::from(rank < leftover)
}

/// Rank owning chunk `c` under the distribution of [`chunk_range`].
#[must_use]
pub fn owner_of_chunk(k: u64, size: u64, c: u64) -> u64 {
    debug_assert!(c < k);
    let per = k / size;
    let leftover = k % size;
    let fat = (per + 1) * leftover;
    if c < fat {
        c / (per + 1)
    } else {
        leftover + (c - fat) / per
    }
}

/// Vertex range `[first, last)` owned by `rank` when the vertex space is cut
/// into `k` chunks distributed by [`chunk_range`].
#[must_use]
pub fn vertex_range(dist: &ChunkDistribution, size: u64, rank: u64) -> VertexRange {
    let chunks = chunk_range(dist.num_chunks(), size, rank);
    (dist.offset(chunks.start), dist.offset(chunks.end))
}

/// `k` chunks reshaped into a `per_dim^D` grid over a `D`-dimensional index
/// box, with remainder-balanced per-axis extents. Vertex ids are assigned
/// chunk-blocked: all of chunk 0's vertices, then chunk 1's, in chunk-encode
/// order; within a chunk the first axis varies fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridTopology<const D: usize> {
    dims: [u64; D],
    per_dim: u64,
}

impl<const D: usize> GridTopology<D> {
    /// Fails unless `k` is a perfect `D`-th power whose root does not exceed
    /// any axis length.
    pub fn new(dims: [u64; D], k: u64) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidParameter("chunk count must be >= 1".into()));
        }
        let per_dim = integer_root(k, D as u32);
        if per_dim.pow(D as u32) != k {
            return Err(Error::NotDecomposable { k, dims: D });
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(Error::InvalidParameter("grid axis length must be >= 1".into()));
        }
        if dims.iter().any(|&d| per_dim > d) {
            return Err(Error::NotDecomposable { k, dims: D });
        }
        Ok(Self { dims, per_dim })
    }

    #[must_use]
    pub fn dims(&self) -> [u64; D] {
        self.dims
    }

    #[must_use]
    pub fn chunks_per_dim(&self) -> u64 {
        self.per_dim
    }

    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.per_dim.pow(D as u32)
    }

    #[must_use]
    pub fn total_vertices(&self) -> u64 {
        self.dims.iter().product()
    }

    /// Chunk coordinates of chunk id `c` (first axis fastest).
    #[must_use]
    pub fn decode(&self, c: u64) -> [u64; D] {
        debug_assert!(c < self.num_chunks());
        let mut coords = [0u64; D];
        let mut rest = c;
        for coord in &mut coords {
            *coord = rest % self.per_dim;
            rest /= self.per_dim;
        }
        coords
    }

    /// Chunk id of chunk coordinates (inverse of [`Self::decode`]).
    #[must_use]
    pub fn encode(&self, coords: [u64; D]) -> u64 {
        let mut c = 0;
        for axis in (0..D).rev() {
            debug_assert!(coords[axis] < self.per_dim);
            c = c * self.per_dim + coords[axis];
        }
        c
    }

    /// Extent of a chunk along `axis` at chunk coordinate `coord`.
    #[must_use]
    pub fn extent(&self, axis: usize, coord: u64) -> u64 {
        self.dims[axis] / self.per_dim + u64::from(coord < self.dims[axis] % self.per_dim)
    }

    /// First index covered along `axis` by chunk coordinate `coord`.
    #[must_use]
    pub fn axis_offset(&self, axis: usize, coord: u64) -> u64 {
        coord * (self.dims[axis] / self.per_dim) + coord.min(self.dims[axis] % self.per_dim)
    }

    /// Chunk coordinate covering index `x` along `axis`.
    #[must_use]
    pub fn axis_chunk_of(&self, axis: usize, x: u64) -> u64 {
        debug_assert!(x < self.dims[axis]);
        let q = self.dims[axis] / self.per_dim;
        let r = self.dims[axis] % self.per_dim;
        let fat = (q + 1) * r;
        if x < fat {
            x / (q + 1)
        } else {
            r + (x - fat) / q
        }
    }

    /// Per-axis extents of chunk `c`.
    #[must_use]
    pub fn extents(&self, c: u64) -> [u64; D] {
        let coords = self.decode(c);
        std::array::from_fn(|a| self.extent(a, coords[a]))
    }

    /// Number of vertices in chunk `c`.
    #[must_use]
    pub fn chunk_size(&self, c: u64) -> u64 {
        self.extents(c).iter().product()
    }

    /// First vertex id of chunk `c` under chunk-blocked numbering;
    /// `vertex_offset(num_chunks())` is the total vertex count.
    ///
    /// Counts the vertices of all chunks preceding `c` in encode order: full
    /// hyperplanes below the chunk on each axis, then the partial rows inside.
    #[must_use]
    pub fn vertex_offset(&self, c: u64) -> u64 {
        if c == self.num_chunks() {
            return self.total_vertices();
        }
        let coords = self.decode(c);
        let mut total = 0u64;
        for axis in (0..D).rev() {
            let mut term = self.axis_offset(axis, coords[axis]);
            for lower in 0..axis {
                term *= self.dims[lower];
            }
            for upper in axis + 1..D {
                term *= self.extent(upper, coords[upper]);
            }
            total += term;
        }
        total
    }

    /// Vertex id at in-chunk coordinates `local` of chunk `c`.
    #[must_use]
    pub fn vertex_at(&self, c: u64, local: [u64; D]) -> VId {
        let extents = self.extents(c);
        let mut idx = 0u64;
        for axis in (0..D).rev() {
            debug_assert!(local[axis] < extents[axis]);
            idx = idx * extents[axis] + local[axis];
        }
        self.vertex_offset(c) + idx
    }

    /// Chunk-blocked index of the lattice point at global `coords`: the
    /// owning chunk's [`Self::vertex_offset`] plus the point's in-chunk
    /// position.
    #[must_use]
    pub fn blocked_index(&self, coords: [u64; D]) -> u64 {
        let chunk_coords = std::array::from_fn(|a| self.axis_chunk_of(a, coords[a]));
        let chunk = self.encode(chunk_coords);
        let local = std::array::from_fn(|a| coords[a] - self.axis_offset(a, chunk_coords[a]));
        self.vertex_at(chunk, local)
    }

    /// In-chunk coordinates of the `local_idx`-th vertex of chunk `c`.
    #[must_use]
    pub fn local_coords(&self, c: u64, local_idx: u64) -> [u64; D] {
        let extents = self.extents(c);
        let mut rest = local_idx;
        std::array::from_fn(|axis| {
            let v = rest % extents[axis];
            rest /= extents[axis];
            v
        })
    }
}

/// Largest integer `r` with `r^d <= k`.
fn integer_root(k: u64, d: u32) -> u64 {
    if k == 0 {
        return 0;
    }
    let mut r = (k as f64).powf(1.0 / f64::from(d)).round() as u64;
    while r.checked_pow(d).is_none_or(|p| p > k) {
        r -= 1;
    }
    while (r + 1).checked_pow(d).is_some_and(|p| p <= k) {
        r += 1;
    }
    r
}
