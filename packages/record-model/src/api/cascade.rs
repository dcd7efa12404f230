//! Cascade engine
//!
//! After a model deletes or undeletes rows, every relation in its `cascade`
//! list receives the same intent. Each relation is attempted on its own: a
//! failing or vetoed relation is recorded in the [`CascadeReport`] and never
//! stops the others or undoes the owner's mutation.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use super::model::{LifecycleOutcome, Model};
use super::options::QueryOptions;
use crate::domain::{Filter, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleOp {
    Delete,
    Undelete,
}

impl LifecycleOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Delete => "delete",
            LifecycleOp::Undelete => "undelete",
        }
    }
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one relation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RelationStatus {
    /// Dependent rows changed (possibly zero), with their own cascade
    Applied { affected: usize, nested: CascadeReport },
    /// A hook on the dependent model vetoed
    Vetoed,
    Failed(String),
    /// No key values to match, an undelete through a hard relation, or the
    /// operation is unsupported on the dependent
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationReport {
    pub relation: String,
    pub model: String,
    pub status: RelationStatus,
}

/// Per-relation outcomes of one propagation, nested for dependent cascades
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadeReport {
    pub relations: Vec<RelationReport>,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn get(&self, relation: &str) -> Option<&RelationReport> {
        self.relations.iter().find(|r| r.relation == relation)
    }

    /// Rows changed across the whole tree
    pub fn total_affected(&self) -> usize {
        self.relations
            .iter()
            .map(|r| match &r.status {
                RelationStatus::Applied { affected, nested } => affected + nested.total_affected(),
                _ => 0,
            })
            .sum()
    }

    /// Every failed relation in the tree, depth first
    pub fn failures(&self) -> Vec<&RelationReport> {
        let mut out = Vec::new();
        self.collect_failures(&mut out);
        out
    }

    fn collect_failures<'a>(&'a self, out: &mut Vec<&'a RelationReport>) {
        for report in &self.relations {
            match &report.status {
                RelationStatus::Failed(_) => out.push(report),
                RelationStatus::Applied { nested, .. } => nested.collect_failures(out),
                _ => {}
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }
}

/// Rows already handled during one propagation, keyed by
/// (table, operation, primary key)
///
/// Cycles in the relation graph end once every reachable row has been
/// visited; self-referencing trees still recurse level by level because
/// each level resolves new rows.
#[derive(Debug, Default)]
pub struct PropagationContext {
    visited: HashSet<(String, LifecycleOp, String)>,
}

impl PropagationContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(table: &str, op: LifecycleOp, key: &Value) -> (String, LifecycleOp, String) {
        // Debug form keeps Integer(1) and Text("1") apart
        (table.to_string(), op, format!("{:?}", key))
    }

    pub fn is_visited(&self, table: &str, op: LifecycleOp, key: &Value) -> bool {
        self.visited.contains(&Self::entry(table, op, key))
    }

    pub fn mark(&mut self, table: &str, op: LifecycleOp, keys: &[Value]) {
        for key in keys {
            self.visited.insert(Self::entry(table, op, key));
        }
    }
}

/// Predicate selecting dependent rows of `rows`
///
/// `keys` pairs owner columns with dependent columns. One pair becomes an
/// `IN` list, several an OR of per-row conjunctions. Owner rows with a NULL
/// key value are skipped; `None` when nothing is left to match.
pub fn dependent_filter(keys: &[(String, String)], rows: &[Row]) -> Option<Filter> {
    match keys {
        [] => None,
        [(local, foreign)] => {
            let mut values: Vec<Value> = Vec::new();
            for value in rows.iter().filter_map(|r| r.get(local)) {
                if !value.is_null() && !values.iter().any(|v| v.sql_eq(value)) {
                    values.push(value.clone());
                }
            }
            (!values.is_empty()).then(|| Filter::is_in(foreign, values))
        }
        pairs => {
            let branches: Vec<Filter> = rows
                .iter()
                .filter_map(|row| {
                    pairs
                        .iter()
                        .map(|(local, foreign)| {
                            let value = row.get(local).filter(|v| !v.is_null())?;
                            Some(Filter::eq(foreign, value.clone()))
                        })
                        .collect::<Option<Vec<_>>>()
                        .map(Filter::all_of)
                })
                .collect();
            (!branches.is_empty()).then_some(Filter::Or(branches))
        }
    }
}

/// Apply `op` to every relation of `owner` for the rows it just changed
pub(crate) async fn propagate(
    owner: &Model,
    rows: &[Row],
    op: LifecycleOp,
    ctx: &mut PropagationContext,
) -> CascadeReport {
    let mut report = CascadeReport::default();

    for relation in &owner.config().cascade {
        let resolved = match relation.resolve(owner.config()) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(model = %owner.name(), relation = %relation.name, error = %err, "Cascade relation misconfigured");
                report.relations.push(RelationReport {
                    relation: relation.name.clone(),
                    model: relation.model.clone().unwrap_or_default(),
                    status: RelationStatus::Failed(err.to_string()),
                });
                continue;
            }
        };
        let target_name = resolved.target_model(owner.config()).to_string();

        // rows a hard relation removed cannot come back, and rows it did not
        // remove were deleted by someone else
        let filter = match op {
            LifecycleOp::Undelete if resolved.hard_delete => None,
            _ => dependent_filter(&resolved.keys, rows),
        };
        let status = match filter {
            None => RelationStatus::Skipped,
            Some(filter) => match owner.registry().model(&target_name) {
                Err(err) => RelationStatus::Failed(err.to_string()),
                Ok(dependent) => {
                    let options = QueryOptions::new()
                        .filter(filter)
                        .hard_delete(resolved.hard_delete);
                    match dependent.run_lifecycle(op, None, &options, ctx).await {
                        Ok(LifecycleOutcome::Completed(summary)) => RelationStatus::Applied {
                            affected: summary.affected,
                            nested: summary.cascade,
                        },
                        Ok(LifecycleOutcome::Vetoed) => RelationStatus::Vetoed,
                        Ok(LifecycleOutcome::Unsupported) => RelationStatus::Skipped,
                        Err(err) => RelationStatus::Failed(err.to_string()),
                    }
                }
            },
        };

        match &status {
            RelationStatus::Failed(message) => warn!(
                model = %owner.name(),
                relation = %resolved.name,
                target = %target_name,
                %op,
                error = %message,
                "Cascade relation failed"
            ),
            other => debug!(
                model = %owner.name(),
                relation = %resolved.name,
                target = %target_name,
                %op,
                status = ?other,
                "Cascade relation done"
            ),
        }

        report.relations.push(RelationReport {
            relation: resolved.name,
            model: target_name,
            status,
        });
    }

    report
}
