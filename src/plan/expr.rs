//! Expression types shared by filters, having clauses and projections.
//!
//! Column references start out as written in the spec file (alias optional)
//! and are rewritten in place by the resolver so that every reference in a
//! finished [`QueryPlan`](super::QueryPlan) carries its alias.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Column references
// =============================================================================

/// Reference to a column, optionally qualified by a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub alias: Option<String>,
    pub column: String,
}

impl ColumnRef {
    /// Create a qualified reference (`alias.column`).
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            column: column.into(),
        }
    }

    /// Create an unqualified reference.
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            alias: None,
            column: column.into(),
        }
    }

    /// Parse `alias.column` or `column`.
    ///
    /// Only the first dot separates the alias; column names themselves may
    /// not contain dots.
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((alias, column)) => Self::new(alias.trim(), column.trim()),
            None => Self::bare(text.trim()),
        }
    }

    /// Name of this column inside the engine once sources are qualified.
    pub fn qualified_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}.{}", alias, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

// =============================================================================
// Literals
// =============================================================================

/// Literal value appearing in a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Number(f64),
    /// Quoted string of the form `YYYY-MM-DD`.
    Date(NaiveDate),
    Bool(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    /// Look up an aggregate by (case-insensitive) function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" | "mean" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// An aggregate call such as `sum(emp.salary)` or `count(*)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub func: AggregateFunc,
    /// `None` means `*` (only valid for `count`).
    pub arg: Option<ColumnRef>,
}

impl AggregateExpr {
    pub fn new(func: AggregateFunc, arg: Option<ColumnRef>) -> Self {
        Self { func, arg }
    }

    /// Canonical column name of the aggregate's result.
    ///
    /// Two spellings of the same aggregate (`SUM(salary)` and
    /// `sum(emp.salary)`) share a label once resolved.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(col) => write!(f, "{}({})", self.func.name(), col),
            None => write!(f, "{}(*)", self.func.name()),
        }
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// Leaf value of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Column(ColumnRef),
    Literal(Literal),
    Aggregate(AggregateExpr),
}

impl Operand {
    /// Name of the engine column this operand reads, if any.
    pub fn column_name(&self) -> Option<String> {
        match self {
            Operand::Column(col) => Some(col.qualified_name()),
            Operand::Aggregate(agg) => Some(agg.label()),
            Operand::Literal(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(col) => write!(f, "{}", col),
            Operand::Literal(lit) => write!(f, "{}", lit),
            Operand::Aggregate(agg) => write!(f, "{}", agg),
        }
    }
}

/// Boolean expression tree evaluated by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
}

impl Predicate {
    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Predicate::Compare { left, op, right }
    }

    /// Conjunction of `clauses`, flattening nested ANDs.
    ///
    /// Returns `None` for an empty list and the clause itself for a single one.
    pub fn conjunction(clauses: Vec<Predicate>) -> Option<Predicate> {
        let mut flat = Vec::with_capacity(clauses.len());
        for clause in clauses {
            match clause {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Predicate::And(flat)),
        }
    }

    /// Visit every operand in the tree.
    pub fn operands(&self) -> Vec<&Operand> {
        let mut out = Vec::new();
        self.collect_operands(&mut out);
        out
    }

    fn collect_operands<'a>(&'a self, out: &mut Vec<&'a Operand>) {
        match self {
            Predicate::And(items) | Predicate::Or(items) => {
                for item in items {
                    item.collect_operands(out);
                }
            }
            Predicate::Not(inner) => inner.collect_operands(out),
            Predicate::Compare { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Predicate::IsNull { operand, .. } => out.push(operand),
        }
    }

    /// Rebuild the tree with every operand passed through `f`.
    pub fn try_map_operands<E>(
        &self,
        f: &mut impl FnMut(&Operand) -> Result<Operand, E>,
    ) -> Result<Predicate, E> {
        Ok(match self {
            Predicate::And(items) => Predicate::And(
                items
                    .iter()
                    .map(|p| p.try_map_operands(f))
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Or(items) => Predicate::Or(
                items
                    .iter()
                    .map(|p| p.try_map_operands(f))
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Not(inner) => Predicate::Not(Box::new(inner.try_map_operands(f)?)),
            Predicate::Compare { left, op, right } => Predicate::Compare {
                left: f(left)?,
                op: *op,
                right: f(right)?,
            },
            Predicate::IsNull { operand, negated } => Predicate::IsNull {
                operand: f(operand)?,
                negated: *negated,
            },
        })
    }

    /// Aggregate calls referenced anywhere in the tree.
    pub fn aggregates(&self) -> Vec<&AggregateExpr> {
        self.operands()
            .into_iter()
            .filter_map(|op| match op {
                Operand::Aggregate(agg) => Some(agg),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::And(items) | Predicate::Or(items) => {
                let joiner = if matches!(self, Predicate::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", joiner)?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Predicate::Not(inner) => write!(f, "NOT {}", inner),
            Predicate::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Predicate::IsNull { operand, negated } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", operand)
                } else {
                    write!(f, "{} IS NULL", operand)
                }
            }
        }
    }
}
