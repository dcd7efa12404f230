//! Custom assertions for sort sequences and lifecycle outcomes

use record_model::api::{LifecycleOutcome, MutationSummary, RelationStatus};

/// Assert that positions are exactly 1..=N
pub fn assert_dense(positions: &[i64]) {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    let expected: Vec<i64> = (1..=positions.len() as i64).collect();
    assert_eq!(
        sorted, expected,
        "Expected a dense sequence 1..={}, got {:?}",
        positions.len(),
        positions
    );
}

/// Assert that positions strictly increase (a scoped view of a dense sequence)
pub fn assert_ascending(positions: &[i64]) {
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "Expected strictly ascending positions, got {:?}",
        positions
    );
}

/// Unwrap a completed outcome
pub fn assert_completed(outcome: &LifecycleOutcome) -> &MutationSummary {
    match outcome {
        LifecycleOutcome::Completed(summary) => summary,
        other => panic!("Expected a completed operation, got {:?}", other),
    }
}

/// Rows changed by a relation that must have been applied
pub fn applied(summary: &MutationSummary, relation: &str) -> usize {
    match summary.cascade.get(relation).map(|r| &r.status) {
        Some(RelationStatus::Applied { affected, .. }) => *affected,
        other => panic!("Expected relation {} to be applied, got {:?}", relation, other),
    }
}
