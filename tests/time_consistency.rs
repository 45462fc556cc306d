use std::collections::HashMap;

use lineage_tree::prelude::*;
use proptest::prelude::*;

/// `time(v) == time(u) + length(u, v)` on every edge, to fp tolerance.
fn assert_time_invariant(tree: &LineageTree) {
    for (u, v) in tree.edges().unwrap() {
        let lhs = tree.get_time(&v).unwrap();
        let rhs = tree.get_time(&u).unwrap() + tree.get_branch_length(&u, &v).unwrap();
        assert!(
            (lhs - rhs).abs() < 1e-9,
            "invariant broken on ({u}, {v}): {lhs} vs {rhs}"
        );
    }
}

fn build_tree() -> LineageTree {
    let mut tree = LineageTree::default();
    tree.populate_tree(&RawTopology::from_weighted_edges([
        ("root", "p", 1.0),
        ("p", "a", 1.0),
        ("p", "b", 2.0),
        ("root", "c", 3.0),
    ]))
    .unwrap();
    tree
}

#[test]
fn ingestion_derives_times_from_lengths() -> Result<(), Box<dyn std::error::Error>> {
    let tree = build_tree();
    assert_eq!(tree.get_time("root")?, 0.0);
    assert_eq!(tree.get_time("a")?, 2.0);
    assert_eq!(tree.get_time("b")?, 3.0);
    assert_eq!(tree.get_time("c")?, 3.0);
    assert_time_invariant(&tree);
    Ok(())
}

#[test]
fn set_time_rewrites_adjacent_lengths() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = build_tree();
    tree.set_time("p", 1.5)?;
    assert_eq!(tree.get_branch_length("root", "p")?, 1.5);
    assert_eq!(tree.get_branch_length("p", "a")?, 0.5);
    assert_eq!(tree.get_branch_length("p", "b")?, 1.5);
    // children keep their own times
    assert_eq!(tree.get_time("a")?, 2.0);
    assert_time_invariant(&tree);
    Ok(())
}

#[test]
fn set_time_enforces_monotonicity() {
    let mut tree = build_tree();
    // below the parent's time
    assert!(matches!(
        tree.set_time("a", -0.5),
        Err(LineageTreeError::NonMonotonicTime { .. })
    ));
    // above a child's time
    assert!(matches!(
        tree.set_time("p", 2.5),
        Err(LineageTreeError::NonMonotonicTime { .. })
    ));
    assert_time_invariant(&tree);
}

#[test]
fn set_branch_length_rederives_descendants() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = build_tree();
    tree.set_branch_length("root", "p", 4.0)?;
    // both grandchildren shift by the same +3
    assert_eq!(tree.get_time("p")?, 4.0);
    assert_eq!(tree.get_time("a")?, 5.0);
    assert_eq!(tree.get_time("b")?, 6.0);
    // untouched subtree is untouched
    assert_eq!(tree.get_time("c")?, 3.0);
    assert_time_invariant(&tree);
    Ok(())
}

#[test]
fn set_branch_length_validations() {
    let mut tree = build_tree();
    assert!(matches!(
        tree.set_branch_length("root", "a", 1.0),
        Err(LineageTreeError::EdgeNotFound(_, _))
    ));
    assert!(matches!(
        tree.set_branch_length("root", "p", -1.0),
        Err(LineageTreeError::NegativeBranchLength(_))
    ));
}

#[test]
fn bulk_lengths_validate_before_mutating() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = build_tree();
    let mut lengths = HashMap::new();
    lengths.insert(("root".to_string(), "p".to_string()), 10.0);
    lengths.insert(("root".to_string(), "ghost".to_string()), 1.0);
    assert!(matches!(
        tree.set_branch_lengths(&lengths),
        Err(LineageTreeError::EdgeNotFound(_, _))
    ));
    // the valid entry must not have been applied
    assert_eq!(tree.get_branch_length("root", "p")?, 1.0);
    assert_time_invariant(&tree);
    Ok(())
}

#[test]
fn bulk_times_validate_every_supplied_edge() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = build_tree();
    let bad = HashMap::from([("root".to_string(), 1.0), ("p".to_string(), 0.5)]);
    assert!(matches!(
        tree.set_times(&bad),
        Err(LineageTreeError::NonMonotonicTime { .. })
    ));
    assert_eq!(tree.get_time("p")?, 1.0);

    let good = HashMap::from([
        ("root".to_string(), 0.0),
        ("p".to_string(), 2.0),
        ("a".to_string(), 4.0),
        ("b".to_string(), 4.0),
        ("c".to_string(), 4.0),
    ]);
    tree.set_times(&good)?;
    assert_eq!(tree.get_branch_length("root", "p")?, 2.0);
    assert_eq!(tree.get_branch_length("p", "a")?, 2.0);
    assert_time_invariant(&tree);
    Ok(())
}

#[test]
fn partial_time_mapping_leaves_other_edges_stale() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = build_tree();
    // only the root-p edge has both endpoints supplied
    let partial = HashMap::from([("root".to_string(), 0.0), ("p".to_string(), 0.5)]);
    tree.set_times(&partial)?;
    assert_eq!(tree.get_branch_length("root", "p")?, 0.5);
    // edges with an absent endpoint keep their previous length
    assert_eq!(tree.get_branch_length("p", "a")?, 1.0);
    Ok(())
}

#[test]
fn time_changes_invalidate_cached_distances() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = build_tree();
    assert_eq!(tree.get_distance("a", "b")?, 3.0);
    tree.set_branch_length("p", "a", 5.0)?;
    assert_eq!(tree.get_distance("a", "b")?, 7.0);
    tree.set_time("b", 5.0)?;
    assert_eq!(tree.get_distance("a", "b")?, 9.0);
    Ok(())
}

proptest! {
    #[test]
    fn invariant_survives_random_bulk_lengths(
        lengths in proptest::collection::vec(0.0f64..10.0, 4)
    ) {
        let mut tree = build_tree();
        let edges = tree.edges().unwrap();
        let mapping: HashMap<(String, String), f64> = edges
            .into_iter()
            .zip(lengths.iter().copied())
            .collect();
        tree.set_branch_lengths(&mapping).unwrap();
        assert_time_invariant(&tree);
    }

    #[test]
    fn invariant_survives_random_single_lengths(
        length in 0.0f64..10.0
    ) {
        let mut tree = build_tree();
        tree.set_branch_length("root", "p", length).unwrap();
        assert_time_invariant(&tree);
        prop_assert!((tree.get_time("a").unwrap() - (length + 1.0)).abs() < 1e-9);
    }
}
