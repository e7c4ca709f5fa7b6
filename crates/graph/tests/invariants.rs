use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stochex_graph::{Dtmc, EdgeKey, GraphError, NodeId};

const LABELS: [&str; 4] = ["", "a", "b", "c"];

/// Builds a random chain with `n` nodes; roughly a quarter of the non-initial
/// nodes are final and the others get up to three outgoing edges.
fn random_chain(n: usize, seed: u64) -> Dtmc {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dtmc = Dtmc::new();
    let mut ids = vec![dtmc.initial()];
    for _ in 1..n {
        ids.push(dtmc.add_node());
    }
    let finals: Vec<NodeId> = ids[1..]
        .iter()
        .copied()
        .filter(|_| rng.random_bool(0.25))
        .collect();
    for &from in &ids {
        if finals.contains(&from) {
            continue;
        }
        let fanout = rng.random_range(1..=3);
        let weights: Vec<f64> = (0..fanout).map(|_| rng.random_range(0.1..1.0)).collect();
        let total: f64 = weights.iter().sum();
        for w in weights {
            let to = ids[rng.random_range(0..ids.len())];
            let label = LABELS[rng.random_range(0..LABELS.len())];
            // Collisions are skipped: they exercise the duplicate check.
            let _ = dtmc.add_edge(from, to, label, w / total);
        }
    }
    for f in finals {
        dtmc.make_final(f).unwrap();
    }
    dtmc
}

fn strings_up_to(len: usize) -> Vec<String> {
    let mut out = vec![String::new()];
    let mut frontier = vec![String::new()];
    for _ in 0..len {
        let mut next = Vec::new();
        for s in &frontier {
            for c in ["a", "b", "c"] {
                next.push(format!("{s}{c}"));
            }
        }
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

// ---------------------------------------------------------------------------
// 1. edge_uniqueness
// ---------------------------------------------------------------------------
#[test]
fn edge_uniqueness() {
    for seed in 0..20 {
        let dtmc = random_chain(8, seed);
        let mut seen = std::collections::BTreeSet::new();
        for (key, _) in dtmc.edges() {
            assert!(seen.insert(key.clone()), "duplicate {key}");
        }
        for (key, p) in dtmc.edges() {
            let mut copy = dtmc.clone();
            let result = copy.add_edge(key.from, key.to, key.label.clone(), p);
            assert!(matches!(result, Err(GraphError::DuplicateEdge { .. })));
        }
    }
}

// ---------------------------------------------------------------------------
// 2. final_node_exclusivity
// ---------------------------------------------------------------------------
#[test]
fn final_node_exclusivity() {
    for seed in 0..20 {
        let mut dtmc = random_chain(8, seed);
        for f in dtmc.finals().clone() {
            assert_eq!(dtmc.out_degree(f), 0);
            let result = dtmc.add_edge(f, dtmc.initial(), "a", 1.0);
            assert!(matches!(result, Err(GraphError::FinalSource { .. })));
        }
        let nodes: Vec<NodeId> = dtmc.nodes().collect();
        for n in nodes {
            if dtmc.out_degree(n) > 0 {
                assert!(dtmc.make_final(n).is_err());
            }
        }
        dtmc.simplify();
        for &f in dtmc.finals() {
            assert_eq!(dtmc.out_degree(f), 0);
        }
    }
}

// ---------------------------------------------------------------------------
// 3. simplify_is_idempotent
// ---------------------------------------------------------------------------
#[test]
fn simplify_is_idempotent() {
    for seed in 0..30 {
        let mut dtmc = random_chain(10, seed);
        dtmc.simplify();
        let once = dtmc.to_string();
        dtmc.simplify();
        assert_eq!(dtmc.to_string(), once, "seed {seed}");
    }
}

// ---------------------------------------------------------------------------
// 4. simplify_preserves_string_probabilities
// ---------------------------------------------------------------------------
#[test]
fn simplify_preserves_string_probabilities() {
    let strings = strings_up_to(3);
    for seed in 0..30 {
        let original = random_chain(7, seed);
        let mut simplified = original.clone();
        simplified.simplify();
        for s in &strings {
            assert_abs_diff_eq!(
                original.string_probability(s),
                simplified.string_probability(s),
                epsilon = 1e-9
            );
        }
    }
}

// ---------------------------------------------------------------------------
// 5. clone_preserves_topology
// ---------------------------------------------------------------------------
#[test]
fn clone_preserves_topology() {
    let dtmc = random_chain(9, 3);
    let copy = dtmc.clone();
    assert_eq!(copy.to_string(), dtmc.to_string());
    for (key, p) in dtmc.edges() {
        assert_eq!(copy.probability(key), Some(p));
    }
    let missing = EdgeKey::new(dtmc.initial(), dtmc.initial(), "zz");
    assert_eq!(copy.probability(&missing), None);
}
