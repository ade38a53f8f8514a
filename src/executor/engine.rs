//! The engine seam the plan executor drives.

use std::error::Error;

use crate::plan::{AggregateExpr, JoinType, Predicate, SortKey};

/// A tabular backend.
///
/// Column names passed in are engine-facing names: `alias.column` for source
/// columns and [`AggregateExpr::label`] for aggregate results. Operations
/// never mutate their inputs; each returns a new handle.
pub trait ExecutionEngine {
    /// Reference to a dataset held by the engine.
    type Handle: Clone;
    type Error: Error + Send + Sync + 'static;

    /// Column names of a dataset, in order.
    fn columns(&self, dataset: &Self::Handle) -> Result<Vec<String>, Self::Error>;

    /// Equi-join `left.left_key = right.right_key`. The result carries the
    /// left columns followed by the right columns.
    fn join(
        &self,
        left: &Self::Handle,
        right: &Self::Handle,
        left_key: &str,
        right_key: &str,
        join_type: JoinType,
    ) -> Result<Self::Handle, Self::Error>;

    /// Keep rows for which the predicate is true.
    fn filter(
        &self,
        dataset: &Self::Handle,
        predicate: &Predicate,
    ) -> Result<Self::Handle, Self::Error>;

    /// Group by `group_columns` and compute `aggregates`. The result has the
    /// group columns followed by one column per aggregate, named by label.
    /// With no group columns the whole input is one group.
    fn group_aggregate(
        &self,
        dataset: &Self::Handle,
        group_columns: &[String],
        aggregates: &[AggregateExpr],
    ) -> Result<Self::Handle, Self::Error>;

    /// Select `(source, output)` columns in order, renaming each.
    fn project(
        &self,
        dataset: &Self::Handle,
        columns: &[(String, String)],
    ) -> Result<Self::Handle, Self::Error>;

    /// Stable sort, primary key first.
    fn sort(&self, dataset: &Self::Handle, keys: &[SortKey]) -> Result<Self::Handle, Self::Error>;
}
