//! Query plan types.
//!
//! A [`QueryPlan`] is the output of compilation: a flat, immutable description
//! of the steps the executor drives. It is built once from a spec file and
//! can be executed any number of times.

mod explain;
pub mod expr;

pub use expr::{
    AggregateExpr, AggregateFunc, ColumnRef, CompareOp, Literal, Operand, Predicate,
};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Tables
// =============================================================================

/// Where a table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// A raw input dataset.
    Source,
    /// The output of another spec.
    Model,
}

impl FromStr for TableKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Self::Source),
            "model" => Ok(Self::Model),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Source => write!(f, "source"),
            TableKind::Model => write!(f, "model"),
        }
    }
}

/// A table declared under `dependencies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub alias: String,
    pub physical_name: String,
    pub kind: TableKind,
    /// Optional `source` hint carried through untouched.
    pub origin: Option<String>,
}

// =============================================================================
// Joins
// =============================================================================

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// The same join seen from the other side.
    pub fn mirrored(self) -> Self {
        match self {
            JoinType::Left => JoinType::Right,
            JoinType::Right => JoinType::Left,
            other => other,
        }
    }
}

impl FromStr for JoinType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" | "left_outer" => Ok(JoinType::Left),
            "right" | "right_outer" => Ok(JoinType::Right),
            "full" | "full_outer" | "outer" => Ok(JoinType::Full),
            _ => Err(()),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "inner"),
            JoinType::Left => write!(f, "left"),
            JoinType::Right => write!(f, "right"),
            JoinType::Full => write!(f, "full"),
        }
    }
}

/// One pairwise join between two aliases.
///
/// In a [`QueryPlan`] the edge is oriented: everything joined so far is on the
/// left and `right_alias` is the table being brought in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub left_alias: String,
    pub right_alias: String,
    pub left_key: ColumnRef,
    pub right_key: ColumnRef,
    pub join_type: JoinType,
}

impl JoinEdge {
    /// Swap sides, mirroring the join type.
    pub fn reversed(&self) -> Self {
        Self {
            left_alias: self.right_alias.clone(),
            right_alias: self.left_alias.clone(),
            left_key: self.right_key.clone(),
            right_key: self.left_key.clone(),
            join_type: self.join_type.mirrored(),
        }
    }

    /// The equality this edge asserts, as a predicate.
    pub fn as_predicate(&self) -> Predicate {
        Predicate::compare(
            Operand::Column(self.left_key.clone()),
            CompareOp::Eq,
            Operand::Column(self.right_key.clone()),
        )
    }
}

// =============================================================================
// Projection and sort
// =============================================================================

/// What a projected column reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionSource {
    Column(ColumnRef),
    Aggregate(AggregateExpr),
}

impl ProjectionSource {
    /// Engine column name the projection reads.
    pub fn column_name(&self) -> String {
        match self {
            ProjectionSource::Column(col) => col.qualified_name(),
            ProjectionSource::Aggregate(agg) => agg.label(),
        }
    }
}

/// One output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionItem {
    pub source: ProjectionSource,
    pub output_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            _ => Err(()),
        }
    }
}

/// Sort key over an output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

// =============================================================================
// Query plan
// =============================================================================

/// Grouping step: group columns plus every aggregate the plan needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub group_by: Vec<ColumnRef>,
    pub aggregates: Vec<AggregateExpr>,
}

/// A compiled, immutable query plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Name of the constructed table.
    pub name: String,
    /// Alias the join sequence starts from.
    pub root: String,
    /// Declared tables, in declaration order.
    pub tables: Vec<TableSpec>,
    /// Join steps in execution order, left-accumulating.
    pub joins: Vec<JoinEdge>,
    pub filter: Option<Predicate>,
    pub aggregation: Option<Aggregation>,
    pub having: Option<Predicate>,
    pub projection: Vec<ProjectionItem>,
    pub sort: Vec<SortKey>,
}

impl QueryPlan {
    /// Look up a declared table by alias.
    pub fn table(&self, alias: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.alias == alias)
    }

    /// Output column names in order.
    pub fn output_columns(&self) -> Vec<&str> {
        self.projection
            .iter()
            .map(|item| item.output_name.as_str())
            .collect()
    }
}
