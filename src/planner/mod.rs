//! Query planner - turns a resolved spec into a [`QueryPlan`].
//!
//! Two independent pieces feed plan assembly:
//! 1. Join planning: resolved join edges → ordered left-deep join steps
//! 2. Projection: `select` mapping → ordered output columns
//!
//! [`assemble`] then folds filter, grouping, having and sort around them.

pub mod join_planner;
pub mod projection;

pub use join_planner::{JoinPlan, JoinPlanner};
pub use projection::ProjectionBuilder;

use thiserror::Error;

use crate::plan::{Aggregation, Operand, Predicate, ProjectionItem, QueryPlan, SortKey};
use crate::resolver::ResolvedConfig;

/// Errors that can occur during planning.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("Join graph is disconnected: {} not reachable from '{root}'", .unreached.join(", "))]
    DisconnectedGraph { root: String, unreached: Vec<String> },

    #[error("Duplicate join between '{left}' and '{right}'")]
    DuplicateJoin { left: String, right: String },

    #[error("Table '{alias}' is not part of any join condition")]
    UnjoinedTable { alias: String },

    #[error("Table '{alias}' is joined to itself")]
    SelfJoin { alias: String },

    #[error("Invalid join: {0}")]
    InvalidJoin(String),

    #[error("Aggregate '{aggregate}' used in filter_condition; use having_condition")]
    AggregateInFilter { aggregate: String },

    #[error("having_condition requires group_condition or an aggregate")]
    HavingWithoutGrouping,

    #[error("Column '{column}' in having_condition is not in group_condition")]
    UngroupedColumn { column: String },
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while building the projection list.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Duplicate output column '{name}'")]
    DuplicateOutputName { name: String },

    #[error(
        "Ambiguous output column '{name}' from {}; \
         qualify the source and give it an explicit output name",
        .sources.join(", ")
    )]
    AmbiguousOutput { name: String, sources: Vec<String> },

    #[error("Column '{column}' is selected but not in group_condition")]
    UngroupedColumn { column: String },
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Assemble the final plan.
///
/// Residual join conditions are ANDed in front of the filter.
pub fn assemble(
    resolved: &ResolvedConfig,
    joins: JoinPlan,
    projection: Vec<ProjectionItem>,
    sort: Vec<SortKey>,
) -> PlanResult<QueryPlan> {
    if let Some(filter) = &resolved.filter {
        if let Some(agg) = filter.aggregates().first() {
            return Err(PlanError::AggregateInFilter {
                aggregate: agg.label(),
            });
        }
    }

    let aggregation = resolved.is_aggregated().then(|| Aggregation {
        group_by: resolved.group_by.clone(),
        aggregates: resolved.aggregates(),
    });

    if let Some(having) = &resolved.having {
        if aggregation.is_none() {
            return Err(PlanError::HavingWithoutGrouping);
        }
        for operand in having.operands() {
            if let Operand::Column(col) = operand {
                if !resolved.group_by.contains(col) {
                    return Err(PlanError::UngroupedColumn {
                        column: col.to_string(),
                    });
                }
            }
        }
    }

    let mut conditions: Vec<Predicate> = joins.residual.iter().map(|e| e.as_predicate()).collect();
    conditions.extend(resolved.filter.clone());

    Ok(QueryPlan {
        name: resolved.name.clone(),
        root: joins.root,
        tables: resolved.tables.clone(),
        joins: joins.steps,
        filter: Predicate::conjunction(conditions),
        aggregation,
        having: resolved.having.clone(),
        projection,
        sort,
    })
}
