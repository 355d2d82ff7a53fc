//! End-to-end scenarios over the generation facade, single- and multi-rank.
//!
//! Generation itself needs no communicator, so multi-rank cases either call
//! the samplers with explicit `(rank, size)` pairs or run a real group on
//! [`MemoryFabric`] threads when a post-pass is involved.

use std::collections::{HashMap, HashSet};

use graphgen::comm::MemoryFabric;
use graphgen::{build_csr, Edge, Generator, NoComm};
use proptest::prelude::*;

fn canonical(edges: &[Edge]) -> HashSet<Edge> {
    edges.iter().map(|&(u, v)| (u.min(v), u.max(v))).collect()
}

#[test]
fn gnm_undirected_reference_scenario() {
    // seed = 1: exactly 15 distinct edges, each u < v, endpoints in [0, 10).
    let generator = Generator::new(NoComm);
    let graph = generator.gnm_undirected(10, 15).unwrap();
    assert_eq!(graph.vertex_range, (0, 10));
    assert_eq!(graph.edges.len(), 15);
    assert_eq!(canonical(&graph.edges).len(), 15);
    for &(u, v) in &graph.edges {
        assert!(u < v && v < 10);
    }
}

#[test]
fn gnp_directed_four_ranks_match_reference() {
    let reference = {
        let mut edges = Generator::new(NoComm).gnp_directed(8, 0.5).unwrap().edges;
        edges.sort_unstable();
        edges
    };
    let mut union: Vec<Edge> = MemoryFabric::run(4, |comm| {
        Generator::new(comm).gnp_directed(8, 0.5).unwrap().edges
    })
    .into_iter()
    .flatten()
    .collect();
    union.sort_unstable();
    assert_eq!(union, reference);
}

#[test]
fn grid_scenario_counts() {
    let generator = Generator::new(NoComm);
    assert_eq!(generator.grid_2d(4, 4, 1.0).unwrap().edges.len(), 24);

    let mut periodic = Generator::new(NoComm);
    periodic.set_periodic(true);
    assert_eq!(periodic.grid_2d(4, 4, 1.0).unwrap().edges.len(), 32);
}

#[test]
fn rgg_scenario_is_process_count_invariant_and_bounded() {
    let mut reference_gen = Generator::new(NoComm);
    reference_gen.set_chunk_count(4);
    let reference = reference_gen.rgg_2d_coordinates(100, 0.1).unwrap();

    let union: Vec<Edge> = MemoryFabric::run(2, |comm| {
        let mut g = Generator::new(comm);
        g.set_chunk_count(4);
        g.rgg_2d(100, 0.1).unwrap().edges
    })
    .into_iter()
    .flatten()
    .collect();
    assert_eq!(canonical(&union), canonical(&reference.edges));

    for &(u, v) in &reference.edges {
        let (a, b) = (reference.coordinates[u as usize], reference.coordinates[v as usize]);
        let dist = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
        assert!(dist <= 0.1 + 1e-12, "({u}, {v}) at distance {dist}");
    }
}

#[test]
fn ba_scenario_out_degrees() {
    let graph = Generator::new(NoComm).ba(16, 2, false).unwrap();
    let mut out = HashMap::new();
    for &(v, p) in &graph.edges {
        assert!(p < v);
        *out.entry(v).or_insert(0u32) += 1;
    }
    assert!(!out.contains_key(&0) && !out.contains_key(&1));
    for v in 2..16u64 {
        assert_eq!(out[&v], 2, "vertex {v}");
    }
}

#[test]
fn csr_of_gnm_scenario() {
    let graph = Generator::new(NoComm).gnm_undirected(10, 15).unwrap();
    let mut edges = graph.edges;
    let csr = build_csr(&mut edges, graph.vertex_range);
    assert_eq!(csr.xadj.len(), 11);
    assert_eq!(csr.xadj[10], 15);
    assert_eq!(csr.adjncy.len(), 15);
}

#[test]
fn exact_edge_counts_across_ranks() {
    for p in [1usize, 2, 4] {
        let results = MemoryFabric::run(p, |comm| {
            let g = Generator::new(comm);
            (
                g.gnm_undirected(60, 500).unwrap().edges.len(),
                g.gnm_directed(60, 900).unwrap().edges.len(),
                g.ba_nm(40, 111, true).unwrap().edges.len(),
            )
        });
        let gnm_u: usize = results.iter().map(|r| r.0).sum();
        let gnm_d: usize = results.iter().map(|r| r.1).sum();
        let ba: usize = results.iter().map(|r| r.2).sum();
        // Undirected cross-rank edges are double-counted by design.
        let canonical_gnm_u = MemoryFabric::run(p, |comm| {
            Generator::new(comm).gnm_undirected(60, 500).unwrap()
        })
        .iter()
        .flat_map(|g| g.edges.iter().map(|&(u, v)| (u.min(v), u.max(v))))
        .collect::<HashSet<_>>()
        .len();
        assert_eq!(canonical_gnm_u, 500, "p = {p}");
        assert!(gnm_u >= 500);
        assert_eq!(gnm_d, 900, "p = {p}");
        assert_eq!(ba, 111, "p = {p}");
    }
}

#[test]
fn vertex_ranges_partition_every_model() {
    let results = MemoryFabric::run(3, |comm| {
        let g = Generator::new(comm);
        vec![
            g.gnm_directed(97, 300).unwrap().vertex_range,
            g.gnp_undirected(83, 0.05).unwrap().vertex_range,
            g.ba(50, 2, true).unwrap().vertex_range,
            g.rhg(2.8, 120, 4.0).unwrap().vertex_range,
        ]
    });
    let totals = [97u64, 83, 50, 120];
    for (model, &total) in totals.iter().enumerate() {
        let mut covered = 0;
        for rank_result in &results {
            let (first, last) = rank_result[model];
            assert_eq!(first, covered, "model {model}");
            covered = last;
        }
        assert_eq!(covered, total, "model {model}");
    }
}

#[test]
fn self_loop_flag_is_respected() {
    let mut with_loops = Generator::new(NoComm);
    with_loops.set_self_loops(true);
    let graph = with_loops.gnm_directed(12, 144).unwrap();
    assert!(graph.edges.iter().any(|&(u, v)| u == v));

    let without = Generator::new(NoComm);
    for graph in [
        without.gnm_directed(30, 200).unwrap(),
        without.gnp_directed(30, 0.4).unwrap(),
        without.kronecker(32, 200, true).unwrap(),
        without.ba(30, 3, true).unwrap(),
    ] {
        assert!(graph.edges.iter().all(|&(u, v)| u != v));
    }
}

#[test]
fn byte_identical_reruns() {
    for _ in 0..2 {
        let a = Generator::new(NoComm).gnm_undirected(64, 300).unwrap();
        let b = Generator::new(NoComm).gnm_undirected(64, 300).unwrap();
        assert_eq!(a, b);
    }
    let results: Vec<_> = (0..2)
        .map(|_| {
            MemoryFabric::run(3, |comm| Generator::new(comm).rhg(2.9, 150, 4.0).unwrap())
        })
        .collect();
    assert_eq!(results[0], results[1]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn gnm_union_always_matches_reference(
        seed in 1u64..50,
        n in 10u64..80,
        density in 0.05f64..0.5,
        p in 1usize..5,
    ) {
        let m = (density * (n * (n - 1) / 2) as f64) as u64;
        let make = |comm| {
            let mut g = Generator::new(comm);
            g.set_seed(seed);
            g.gnm_undirected(n, m).unwrap().edges
        };
        let reference = canonical(&{
            let mut g = Generator::new(NoComm);
            g.set_seed(seed);
            g.gnm_undirected(n, m).unwrap().edges
        });
        prop_assert_eq!(reference.len() as u64, m);
        let union: Vec<Edge> =
            MemoryFabric::run(p, make).into_iter().flatten().collect();
        prop_assert_eq!(canonical(&union), reference);
    }

    #[test]
    fn gnp_direct_sampling_is_rank_stable(
        seed in 1u64..50,
        n in 8u64..60,
        prob in 0.0f64..1.0,
    ) {
        let reference = {
            let mut g = Generator::new(NoComm);
            g.set_seed(seed);
            let mut e = g.gnp_directed(n, prob).unwrap().edges;
            e.sort_unstable();
            e
        };
        let mut union: Vec<Edge> = MemoryFabric::run(3, |comm| {
            let mut g = Generator::new(comm);
            g.set_seed(seed);
            g.gnp_directed(n, prob).unwrap().edges
        })
        .into_iter()
        .flatten()
        .collect();
        union.sort_unstable();
        prop_assert_eq!(union, reference);
    }
}
