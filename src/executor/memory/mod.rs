//! In-memory execution engine.
//!
//! Tables are row-major and immutable; every operation returns a new
//! `Arc<Table>`. Intended for tests, the CLI and small datasets.

mod value;

pub use value::Value;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use super::ExecutionEngine;
use crate::plan::{
    AggregateExpr, AggregateFunc, CompareOp, JoinType, Operand, Predicate, SortDirection, SortKey,
};
use value::ValueKey;

/// Errors raised by the in-memory engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoryEngineError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Cannot compute {func} over value '{value}'")]
    TypeMismatch { func: &'static str, value: String },

    #[error("Invalid table data: {0}")]
    InvalidData(String),
}

pub type MemoryResult<T> = Result<T, MemoryEngineError>;

/// A materialized table.
///
/// Fields are public; engine operations re-check row widths before
/// indexing, so a hand-built ragged table is an error rather than a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table, checking column names and row widths.
    pub fn new<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> MemoryResult<Self> {
        let table = Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> MemoryResult<()> {
        for (i, name) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(name) {
                return Err(MemoryEngineError::DuplicateColumn(name.clone()));
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(MemoryEngineError::RowWidth {
                    row: i,
                    found: row.len(),
                    expected: self.columns.len(),
                });
            }
        }
        Ok(())
    }

    /// Load a set of named tables from JSON:
    /// `{"employee": {"columns": [...], "rows": [[...], ...]}, ...}`.
    pub fn load_json(text: &str) -> MemoryResult<BTreeMap<String, Table>> {
        let tables: BTreeMap<String, Table> =
            serde_json::from_str(text).map_err(|e| MemoryEngineError::InvalidData(e.to_string()))?;
        for table in tables.values() {
            table.validate()?;
        }
        Ok(tables)
    }

    pub fn index_of(&self, column: &str) -> MemoryResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MemoryEngineError::UnknownColumn(column.to_string()))
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, column: &str) -> MemoryResult<Vec<&Value>> {
        let idx = self.index_of(column)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Plain-text rendering with a header row.
    pub fn render(&self) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let line = |out: &mut String, values: &[String]| {
            let padded: Vec<String> = values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<width$}", v, width = *w))
                .collect();
            let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
        };
        line(&mut out, &self.columns);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "{}", rule.join("-+-"));
        for row in &cells {
            line(&mut out, row);
        }
        out
    }
}

/// Engine over [`Table`]s held in `Arc`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEngine;

impl MemoryEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionEngine for MemoryEngine {
    type Handle = Arc<Table>;
    type Error = MemoryEngineError;

    fn columns(&self, dataset: &Arc<Table>) -> MemoryResult<Vec<String>> {
        dataset.validate()?;
        Ok(dataset.columns.clone())
    }

    fn join(
        &self,
        left: &Arc<Table>,
        right: &Arc<Table>,
        left_key: &str,
        right_key: &str,
        join_type: JoinType,
    ) -> MemoryResult<Arc<Table>> {
        left.validate()?;
        right.validate()?;
        let li = left.index_of(left_key)?;
        let ri = right.index_of(right_key)?;

        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().cloned());

        let mut index: HashMap<ValueKey, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if !row[ri].is_null() {
                index.entry(row[ri].key()).or_default().push(i);
            }
        }

        let left_nulls = vec![Value::Null; left.columns.len()];
        let right_nulls = vec![Value::Null; right.columns.len()];
        let keep_left = matches!(join_type, JoinType::Left | JoinType::Full);
        let keep_right = matches!(join_type, JoinType::Right | JoinType::Full);

        let mut matched_right = vec![false; right.rows.len()];
        let mut rows = Vec::new();

        for lrow in &left.rows {
            let matches = if lrow[li].is_null() {
                None
            } else {
                index.get(&lrow[li].key())
            };
            match matches {
                Some(hits) => {
                    for &r in hits {
                        matched_right[r] = true;
                        rows.push(concat(lrow, &right.rows[r]));
                    }
                }
                None if keep_left => rows.push(concat(lrow, &right_nulls)),
                None => {}
            }
        }

        if keep_right {
            for (r, rrow) in right.rows.iter().enumerate() {
                if !matched_right[r] {
                    rows.push(concat(&left_nulls, rrow));
                }
            }
        }

        trace!(%join_type, rows = rows.len(), "memory join");
        Ok(Arc::new(Table::new(columns, rows)?))
    }

    fn filter(&self, dataset: &Arc<Table>, predicate: &Predicate) -> MemoryResult<Arc<Table>> {
        dataset.validate()?;
        for operand in predicate.operands() {
            if let Some(name) = operand.column_name() {
                dataset.index_of(&name)?;
            }
        }

        let rows = dataset
            .rows
            .iter()
            .filter(|row| evaluate(predicate, &dataset.columns, row) == Some(true))
            .cloned()
            .collect();

        Ok(Arc::new(Table {
            columns: dataset.columns.clone(),
            rows,
        }))
    }

    fn group_aggregate(
        &self,
        dataset: &Arc<Table>,
        group_columns: &[String],
        aggregates: &[AggregateExpr],
    ) -> MemoryResult<Arc<Table>> {
        dataset.validate()?;
        let group_idx = group_columns
            .iter()
            .map(|c| dataset.index_of(c))
            .collect::<MemoryResult<Vec<_>>>()?;
        let agg_idx = aggregates
            .iter()
            .map(|a| a.arg.as_ref().map(|c| dataset.index_of(&c.qualified_name())).transpose())
            .collect::<MemoryResult<Vec<_>>>()?;

        // Groups in first-seen order.
        let mut slots: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
        for (i, row) in dataset.rows.iter().enumerate() {
            let key: Vec<ValueKey> = group_idx.iter().map(|&g| row[g].key()).collect();
            let slot = *slots.entry(key).or_insert_with(|| {
                groups.push((group_idx.iter().map(|&g| row[g].clone()).collect(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(i);
        }
        // A global aggregate over no rows still yields one row.
        if group_idx.is_empty() && groups.is_empty() {
            groups.push((Vec::new(), Vec::new()));
        }

        let mut columns: Vec<String> = group_columns.to_vec();
        columns.extend(aggregates.iter().map(|a| a.label()));

        let mut rows = Vec::with_capacity(groups.len());
        for (keys, members) in groups {
            let mut row = keys;
            for (agg, idx) in aggregates.iter().zip(&agg_idx) {
                let value = match idx {
                    Some(c) => {
                        let values: Vec<&Value> =
                            members.iter().map(|&m| &dataset.rows[m][*c]).collect();
                        aggregate(agg.func, &values)?
                    }
                    // count(*)
                    None => Value::Int(members.len() as i64),
                };
                row.push(value);
            }
            rows.push(row);
        }

        Ok(Arc::new(Table::new(columns, rows)?))
    }

    fn project(
        &self,
        dataset: &Arc<Table>,
        columns: &[(String, String)],
    ) -> MemoryResult<Arc<Table>> {
        dataset.validate()?;
        let idx = columns
            .iter()
            .map(|(source, _)| dataset.index_of(source))
            .collect::<MemoryResult<Vec<_>>>()?;
        let rows = dataset
            .rows
            .iter()
            .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Arc::new(Table::new(
            columns.iter().map(|(_, output)| output.clone()),
            rows,
        )?))
    }

    fn sort(&self, dataset: &Arc<Table>, keys: &[SortKey]) -> MemoryResult<Arc<Table>> {
        dataset.validate()?;
        let idx = keys
            .iter()
            .map(|k| Ok((dataset.index_of(&k.column)?, k.direction)))
            .collect::<MemoryResult<Vec<_>>>()?;

        let mut rows = dataset.rows.clone();
        rows.sort_by(|a, b| {
            for &(i, direction) in &idx {
                let ord = sort_order(&a[i], &b[i], direction);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        Ok(Arc::new(Table {
            columns: dataset.columns.clone(),
            rows,
        }))
    }
}

fn concat(left: &[Value], right: &[Value]) -> Vec<Value> {
    let mut row = Vec::with_capacity(left.len() + right.len());
    row.extend_from_slice(left);
    row.extend_from_slice(right);
    row
}

/// Nulls sort last in both directions.
fn sort_order(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.compare(b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

/// Three-valued predicate evaluation; `None` is SQL unknown.
fn evaluate(predicate: &Predicate, columns: &[String], row: &[Value]) -> Option<bool> {
    match predicate {
        Predicate::And(items) => {
            let mut result = Some(true);
            for item in items {
                match evaluate(item, columns, row) {
                    Some(false) => return Some(false),
                    None => result = None,
                    Some(true) => {}
                }
            }
            result
        }
        Predicate::Or(items) => {
            let mut result = Some(false);
            for item in items {
                match evaluate(item, columns, row) {
                    Some(true) => return Some(true),
                    None => result = None,
                    Some(false) => {}
                }
            }
            result
        }
        Predicate::Not(inner) => evaluate(inner, columns, row).map(|b| !b),
        Predicate::Compare { left, op, right } => {
            let left = operand_value(left, columns, row);
            let ord = left.compare(&operand_value(right, columns, row))?;
            Some(match op {
                CompareOp::Eq => ord == Ordering::Equal,
                CompareOp::NotEq => ord != Ordering::Equal,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::LtEq => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::GtEq => ord != Ordering::Less,
            })
        }
        Predicate::IsNull { operand, negated } => {
            Some(operand_value(operand, columns, row).is_null() != *negated)
        }
    }
}

fn operand_value(operand: &Operand, columns: &[String], row: &[Value]) -> Value {
    match operand {
        Operand::Literal(lit) => Value::from(lit),
        other => other
            .column_name()
            .and_then(|name| columns.iter().position(|c| *c == name))
            .map(|i| row[i].clone())
            .unwrap_or(Value::Null),
    }
}

fn aggregate(func: AggregateFunc, values: &[&Value]) -> MemoryResult<Value> {
    if func == AggregateFunc::Count {
        let n = values.iter().filter(|v| !v.is_null()).count();
        return Ok(Value::Int(n as i64));
    }

    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        return Ok(Value::Null);
    }

    match func {
        AggregateFunc::Sum | AggregateFunc::Avg => {
            let mut int_sum: i64 = 0;
            let mut float_sum = 0.0;
            let mut all_int = true;
            for v in &present {
                match v {
                    Value::Int(i) => {
                        int_sum = int_sum.wrapping_add(*i);
                        float_sum += *i as f64;
                    }
                    Value::Float(f) => {
                        all_int = false;
                        float_sum += f;
                    }
                    other => {
                        return Err(MemoryEngineError::TypeMismatch {
                            func: func.name(),
                            value: other.to_string(),
                        })
                    }
                }
            }
            Ok(match func {
                AggregateFunc::Sum if all_int => Value::Int(int_sum),
                AggregateFunc::Sum => Value::Float(float_sum),
                _ => Value::Float(float_sum / present.len() as f64),
            })
        }
        AggregateFunc::Min | AggregateFunc::Max => {
            let mut best = present[0];
            for v in &present[1..] {
                let ord = v.compare(best).ok_or_else(|| MemoryEngineError::TypeMismatch {
                    func: func.name(),
                    value: v.to_string(),
                })?;
                let better = match func {
                    AggregateFunc::Min => ord == Ordering::Less,
                    _ => ord == Ordering::Greater,
                };
                if better {
                    best = v;
                }
            }
            Ok(best.clone())
        }
        AggregateFunc::Count => unreachable!("count handled above"),
    }
}
