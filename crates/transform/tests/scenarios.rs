use approx::assert_abs_diff_eq;
use stochex_graph::{EdgeKey, GraphChange, RestrictedGraphDelta};
use stochex_text::{parse_dtmc, parse_sre};
use stochex_transform::{DtmcToSre, TransformConfig, Transformer, to_dtmc, to_sre};

// ---------------------------------------------------------------------------
// 1. expression_survives_chain_round_trip
// ---------------------------------------------------------------------------
#[test]
fn expression_survives_chain_round_trip() {
    let config = TransformConfig::new();
    let sre = parse_sre("((a:b)*0.2)[1]+c[2]").unwrap();
    let dtmc = to_dtmc(&sre, &config).unwrap();
    let back = to_dtmc(&to_sre(&dtmc, &config).unwrap(), &config).unwrap();

    assert!(back.string_probability("ab") > 0.0);
    assert_abs_diff_eq!(back.string_probability("x"), 0.0);
    // (1/3) * 0.2 * 0.8 for one repetition, 2/3 for c.
    assert_abs_diff_eq!(back.string_probability("ab"), 0.16 / 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(back.string_probability("c"), 2.0 / 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(back.string_probability(""), 0.8 / 3.0, epsilon = 1e-6);
}

// ---------------------------------------------------------------------------
// 2. listing_parses_and_eliminates
// ---------------------------------------------------------------------------
#[test]
fn listing_parses_and_eliminates() {
    let dtmc = parse_dtmc("0 \n 1 \n 0 1 0.23 a \n 0 1 0.77 b").unwrap();
    assert_eq!(dtmc.node_count(), 2);
    let sre = to_sre(&dtmc, &TransformConfig::new()).unwrap();
    let back = to_dtmc(&sre, &TransformConfig::new()).unwrap();
    assert_abs_diff_eq!(back.string_probability("a"), 0.23, epsilon = 1e-6);
    assert_abs_diff_eq!(back.string_probability("b"), 0.77, epsilon = 1e-6);
}

// ---------------------------------------------------------------------------
// 3. refining_one_edge_leaves_the_others
// ---------------------------------------------------------------------------
#[test]
fn refining_one_edge_leaves_the_others() {
    // Two `a` edges; only the one from 0 to 1 is refined.
    let outer = parse_dtmc("0\n2\n0 1 1 a\n1 2 0.5 a\n1 2 0.5 b").unwrap();
    let n = |name: &str| outer.node_by_name(name).unwrap();
    let refined = EdgeKey::new(n("0"), n("1"), "a");
    let other = EdgeKey::new(n("1"), n("2"), "a");
    let sub = parse_dtmc("s\nt\ns t 1 x").unwrap();

    let mut t = DtmcToSre::new(outer.clone()).unwrap();
    let refined_leaf = t.leaf(&refined).unwrap().id();
    let other_leaf = t.leaf(&other).unwrap().id();

    let mut refine = RestrictedGraphDelta::new();
    refine.add_change(refined.clone(), sub);
    let delta = t.apply_delta(&GraphChange::Refine(refine)).unwrap();

    assert_eq!(delta.len(), 1);
    let replacement = delta.replacement(refined_leaf).unwrap();
    let replaced = to_dtmc(replacement, &TransformConfig::new()).unwrap();
    assert_abs_diff_eq!(replaced.string_probability("x"), 1.0, epsilon = 1e-9);

    let ids = t.target().ids();
    assert!(!ids.contains(&refined_leaf));
    assert!(ids.contains(&other_leaf));
    assert_eq!(t.leaf(&other).unwrap().id(), other_leaf);

    let chain = to_dtmc(t.target(), &TransformConfig::new()).unwrap();
    assert_abs_diff_eq!(chain.string_probability("xa"), 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(chain.string_probability("xb"), 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(chain.string_probability("aa"), 0.0);
}
