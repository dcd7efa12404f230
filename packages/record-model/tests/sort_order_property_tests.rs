//! Property-based tests for the sort sequence
//!
//! Invariants that must hold after ANY sequence of operations:
//! - Density: positions over all rows (deleted included) are exactly 1..=N
//! - Order: every category/visibility view reads in ascending positions
//! - Swap: moving a row up trades places with its predecessor in the view

mod common;

use common::*;
use proptest::prelude::*;
use record_model::api::{Model, QueryOptions};
use record_model::domain::{Row, Value};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
enum Op {
    Insert(i64),
    MoveUp(usize, Option<i64>),
    MoveDown(usize, Option<i64>),
    Delete(usize),
    Undelete(usize),
    Purge(usize),
}

fn category() -> impl Strategy<Value = i64> {
    1..=3i64
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => category().prop_map(Op::Insert),
        2 => (any::<usize>(), prop::option::of(category())).prop_map(|(k, c)| Op::MoveUp(k, c)),
        2 => (any::<usize>(), prop::option::of(category())).prop_map(|(k, c)| Op::MoveDown(k, c)),
        1 => any::<usize>().prop_map(Op::Delete),
        1 => any::<usize>().prop_map(Op::Undelete),
        1 => any::<usize>().prop_map(Op::Purge),
    ]
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn scope(category: Option<i64>) -> QueryOptions {
    match category {
        Some(category) => QueryOptions::new().category(category),
        None => QueryOptions::new(),
    }
}

/// Keys are drawn from everything ever inserted, so purged rows come up too
fn pick(index: usize, inserted: i64) -> Option<Value> {
    (inserted > 0).then(|| Value::Integer((index % inserted as usize) as i64 + 1))
}

async fn apply(items: &Model, op: &Op, inserted: &mut i64) {
    match op {
        Op::Insert(category) => {
            items.insert(Row::new().with("category_id", *category)).await.unwrap();
            *inserted += 1;
        }
        Op::MoveUp(index, category) => {
            if let Some(key) = pick(*index, *inserted) {
                items.move_up(&key, &scope(*category)).await.unwrap();
            }
        }
        Op::MoveDown(index, category) => {
            if let Some(key) = pick(*index, *inserted) {
                items.move_down(&key, &scope(*category)).await.unwrap();
            }
        }
        Op::Delete(index) => {
            if let Some(key) = pick(*index, *inserted) {
                items.delete(Some(&[key]), &QueryOptions::new()).await.unwrap();
            }
        }
        Op::Undelete(index) => {
            if let Some(key) = pick(*index, *inserted) {
                items.undelete(Some(&[key]), &QueryOptions::new()).await.unwrap();
            }
        }
        Op::Purge(index) => {
            if let Some(key) = pick(*index, *inserted) {
                items
                    .delete(Some(&[key]), &QueryOptions::new().hard_delete(true))
                    .await
                    .unwrap();
            }
        }
    }
}

async fn check_invariants(items: &Model) {
    let all: Vec<i64> = sequence(items, &QueryOptions::new().with_deleted())
        .await
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    assert_dense(&all);

    for category in [None, Some(1), Some(2), Some(3)] {
        for options in [scope(category), scope(category).only_deleted()] {
            let view: Vec<i64> = sequence(items, &options)
                .await
                .into_iter()
                .map(|(_, position)| position)
                .collect();
            assert_ascending(&view);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sequence_stays_dense(ops in prop::collection::vec(op(), 1..40)) {
        runtime().block_on(async {
            let items = registry().model("items").unwrap();
            let mut inserted = 0;
            for op in &ops {
                apply(&items, op, &mut inserted).await;
                check_invariants(&items).await;
            }
        });
    }

    #[test]
    fn prop_move_up_swaps_within_view(
        ops in prop::collection::vec(op(), 1..30),
        index in any::<usize>(),
        category in prop::option::of(category()),
    ) {
        runtime().block_on(async {
            let items = registry().model("items").unwrap();
            let mut inserted = 0;
            for op in &ops {
                apply(&items, op, &mut inserted).await;
            }
            let Some(key) = pick(index, inserted) else {
                return;
            };
            let Some(target) = key.as_i64() else {
                return;
            };

            let mut expected = keys(&items, &scope(category)).await;
            let Some(at) = expected.iter().position(|k| *k == target) else {
                return;
            };

            let moved = items.move_up(&key, &scope(category)).await.unwrap();
            assert_eq!(moved, at > 0);
            if at > 0 {
                expected.swap(at - 1, at);
            }
            assert_eq!(keys(&items, &scope(category)).await, expected);
        });
    }
}
