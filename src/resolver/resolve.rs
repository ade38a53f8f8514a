//! Resolution of aliases and column references.

use std::collections::BTreeMap;

use tracing::debug;

use super::{ResolutionError, ResolutionResult, SchemaProvider};
use crate::config::{ConfigModel, SortCondition};
use crate::plan::{
    AggregateExpr, ColumnRef, JoinEdge, JoinType, Operand, Predicate, ProjectionItem,
    ProjectionSource, SortKey, TableSpec,
};
use crate::predicate::CompiledClauses;

/// A select source after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectRef {
    Resolved(ProjectionSource),
    /// Unqualified column present in several tables; left for the projection
    /// builder to reject.
    Ambiguous { column: String, aliases: Vec<String> },
}

/// A `select` entry after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelect {
    pub raw: String,
    pub source: SelectRef,
    pub output_name: Option<String>,
}

/// A spec with every alias and column reference resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub name: String,
    pub tables: Vec<TableSpec>,
    /// Join edges in declaration order, keys qualified, join type defaulted.
    pub joins: Vec<JoinEdge>,
    pub select: Vec<ResolvedSelect>,
    pub filter: Option<Predicate>,
    pub group_by: Vec<ColumnRef>,
    pub having: Option<Predicate>,
    pub sort: Vec<SortCondition>,
    /// Columns per alias.
    pub columns: BTreeMap<String, Vec<String>>,
}

impl ResolvedConfig {
    /// Every aggregate referenced by `select` or `having`, first use first.
    pub fn aggregates(&self) -> Vec<AggregateExpr> {
        let mut out: Vec<AggregateExpr> = Vec::new();
        let from_select = self.select.iter().filter_map(|s| match &s.source {
            SelectRef::Resolved(ProjectionSource::Aggregate(agg)) => Some(agg),
            _ => None,
        });
        let from_having = self.having.iter().flat_map(|h| h.aggregates());

        for agg in from_select.chain(from_having) {
            if !out.contains(agg) {
                out.push(agg.clone());
            }
        }
        out
    }

    /// True when the plan needs a grouping step.
    pub fn is_aggregated(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates().is_empty()
    }
}

/// Resolves a [`ConfigModel`] against table schemas.
pub struct AliasResolver<'a> {
    config: &'a ConfigModel,
    schemas: &'a dyn SchemaProvider,
    default_join_type: JoinType,
}

impl<'a> AliasResolver<'a> {
    pub fn new(config: &'a ConfigModel, schemas: &'a dyn SchemaProvider) -> Self {
        Self {
            config,
            schemas,
            default_join_type: JoinType::Inner,
        }
    }

    /// Join type for join conditions that do not name one.
    pub fn with_default_join_type(mut self, join_type: JoinType) -> Self {
        self.default_join_type = join_type;
        self
    }

    pub fn resolve(&self, clauses: CompiledClauses) -> ResolutionResult<ResolvedConfig> {
        let columns = self.build_inventory()?;
        let scope = Scope {
            columns: &columns,
            order: self.config.dependencies.iter().map(|t| t.alias.as_str()).collect(),
        };

        let joins = self.resolve_joins(&scope)?;

        let select = clauses
            .select
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let context = format!("select[{}] '{}'", i, entry.raw);
                let source = match entry.source {
                    ProjectionSource::Column(col) if col.alias.is_none() => {
                        let owners = scope.owners(&col.column);
                        if owners.len() > 1 {
                            SelectRef::Ambiguous {
                                column: col.column,
                                aliases: owners.into_iter().map(String::from).collect(),
                            }
                        } else {
                            SelectRef::Resolved(ProjectionSource::Column(
                                scope.column(&col, &context)?,
                            ))
                        }
                    }
                    ProjectionSource::Column(col) => {
                        SelectRef::Resolved(ProjectionSource::Column(scope.column(&col, &context)?))
                    }
                    ProjectionSource::Aggregate(agg) => {
                        SelectRef::Resolved(ProjectionSource::Aggregate(
                            scope.aggregate(&agg, &context)?,
                        ))
                    }
                };
                Ok(ResolvedSelect {
                    raw: entry.raw,
                    source,
                    output_name: entry.output_name,
                })
            })
            .collect::<ResolutionResult<Vec<_>>>()?;

        let filter = clauses
            .filter
            .map(|p| p.try_map_operands(&mut |op| scope.operand(op, "filter_condition")))
            .transpose()?;

        let group_by = self
            .config
            .group_condition
            .iter()
            .enumerate()
            .map(|(i, text)| {
                scope.column(&ColumnRef::parse(text), &format!("group_condition[{}]", i))
            })
            .collect::<ResolutionResult<Vec<_>>>()?;

        let having = clauses
            .having
            .map(|p| {
                p.try_map_operands(&mut |op| match op {
                    Operand::Column(col) if col.alias.is_none() => {
                        match output_alias(&select, &col.column) {
                            Some(source) => Ok(source),
                            None => scope.operand(op, "having_condition"),
                        }
                    }
                    _ => scope.operand(op, "having_condition"),
                })
            })
            .transpose()?;

        debug!(
            name = %self.config.constructed_table_name,
            tables = self.config.dependencies.len(),
            joins = joins.len(),
            "resolved spec"
        );

        Ok(ResolvedConfig {
            name: self.config.constructed_table_name.clone(),
            tables: self.config.dependencies.clone(),
            joins,
            select,
            filter,
            group_by,
            having,
            sort: self.config.sort_condition.clone(),
            columns,
        })
    }

    fn build_inventory(&self) -> ResolutionResult<BTreeMap<String, Vec<String>>> {
        self.config
            .dependencies
            .iter()
            .map(|table| {
                let cols = self.schemas.columns(&table.physical_name).ok_or_else(|| {
                    ResolutionError::MissingSchema {
                        alias: table.alias.clone(),
                        table_name: table.physical_name.clone(),
                    }
                })?;
                Ok((table.alias.clone(), cols))
            })
            .collect()
    }

    fn resolve_joins(&self, scope: &Scope<'_>) -> ResolutionResult<Vec<JoinEdge>> {
        self.config
            .join_conditions
            .iter()
            .enumerate()
            .map(|(i, cond)| {
                let context = format!("join_conditions[{}]", i);
                for alias in [&cond.left_alias, &cond.right_alias] {
                    scope.require_alias(alias, &context)?;
                }

                let left_key = scope.join_key(&cond.left_key, &cond.left_alias, &context)?;
                let right_key = scope.join_key(&cond.right_key, &cond.right_alias, &context)?;

                Ok(JoinEdge {
                    left_alias: cond.left_alias.clone(),
                    right_alias: cond.right_alias.clone(),
                    left_key,
                    right_key,
                    join_type: cond.join_type.unwrap_or(self.default_join_type),
                })
            })
            .collect()
    }
}

/// Source of the select entry whose output name is `name`.
fn output_alias(select: &[ResolvedSelect], name: &str) -> Option<Operand> {
    select.iter().find_map(|entry| {
        if entry.output_name.as_deref() != Some(name) {
            return None;
        }
        match &entry.source {
            SelectRef::Resolved(ProjectionSource::Aggregate(agg)) => {
                Some(Operand::Aggregate(agg.clone()))
            }
            SelectRef::Resolved(ProjectionSource::Column(col)) => {
                Some(Operand::Column(col.clone()))
            }
            SelectRef::Ambiguous { .. } => None,
        }
    })
}

/// Aliases in declaration order plus their columns.
struct Scope<'a> {
    columns: &'a BTreeMap<String, Vec<String>>,
    order: Vec<&'a str>,
}

impl<'a> Scope<'a> {
    fn require_alias(&self, alias: &str, context: &str) -> ResolutionResult<()> {
        if self.columns.contains_key(alias) {
            Ok(())
        } else {
            Err(ResolutionError::UnknownAlias {
                alias: alias.to_string(),
                context: context.to_string(),
            })
        }
    }

    /// Aliases whose table has `column`, in declaration order.
    fn owners(&self, column: &str) -> Vec<&'a str> {
        self.order
            .iter()
            .copied()
            .filter(|alias| {
                self.columns
                    .get(*alias)
                    .is_some_and(|cols| cols.iter().any(|c| c == column))
            })
            .collect()
    }

    fn column(&self, col: &ColumnRef, context: &str) -> ResolutionResult<ColumnRef> {
        match &col.alias {
            Some(alias) => {
                self.require_alias(alias, context)?;
                let known = self.columns[alias.as_str()].iter().any(|c| *c == col.column);
                if known {
                    Ok(col.clone())
                } else {
                    Err(ResolutionError::UnknownColumn {
                        column: col.to_string(),
                        context: context.to_string(),
                    })
                }
            }
            None => {
                let owners = self.owners(&col.column);
                match owners.as_slice() {
                    [alias] => Ok(ColumnRef::new(*alias, &col.column)),
                    [] => Err(ResolutionError::UnknownColumn {
                        column: col.column.clone(),
                        context: context.to_string(),
                    }),
                    _ => Err(ResolutionError::AmbiguousColumn {
                        column: col.column.clone(),
                        aliases: owners.iter().map(|a| a.to_string()).collect(),
                        context: context.to_string(),
                    }),
                }
            }
        }
    }

    fn aggregate(&self, agg: &AggregateExpr, context: &str) -> ResolutionResult<AggregateExpr> {
        let arg = agg
            .arg
            .as_ref()
            .map(|col| self.column(col, context))
            .transpose()?;
        Ok(AggregateExpr::new(agg.func, arg))
    }

    fn operand(&self, op: &Operand, context: &str) -> ResolutionResult<Operand> {
        match op {
            Operand::Column(col) => Ok(Operand::Column(self.column(col, context)?)),
            Operand::Aggregate(agg) => Ok(Operand::Aggregate(self.aggregate(agg, context)?)),
            Operand::Literal(_) => Ok(op.clone()),
        }
    }

    /// Join keys belong to their side; an unqualified key takes that side's alias.
    fn join_key(&self, text: &str, side_alias: &str, context: &str) -> ResolutionResult<ColumnRef> {
        let parsed = ColumnRef::parse(text);
        if let Some(alias) = &parsed.alias {
            if alias != side_alias {
                self.require_alias(alias, context)?;
                return Err(ResolutionError::KeyAliasMismatch {
                    key: text.to_string(),
                    expected_alias: side_alias.to_string(),
                    context: context.to_string(),
                });
            }
        }
        self.column(&ColumnRef::new(side_alias, parsed.column), context)
    }
}

/// Map the sort conditions of `resolved` onto output column names.
///
/// A sort column may name an output column directly or reference the source
/// (`alias.column`) of a projected item; that alias must be declared.
pub fn resolve_sort(
    resolved: &ResolvedConfig,
    projection: &[ProjectionItem],
) -> ResolutionResult<Vec<SortKey>> {
    resolved
        .sort
        .iter()
        .enumerate()
        .map(|(i, cond)| {
            if projection.iter().any(|p| p.output_name == cond.column) {
                return Ok(SortKey {
                    column: cond.column.clone(),
                    direction: cond.direction,
                });
            }

            let wanted = ColumnRef::parse(&cond.column);
            let found = projection.iter().find(|p| match &p.source {
                ProjectionSource::Column(col) => wanted.alias.is_some() && *col == wanted,
                ProjectionSource::Aggregate(agg) => agg.label() == cond.column,
            });
            if let Some(item) = found {
                return Ok(SortKey {
                    column: item.output_name.clone(),
                    direction: cond.direction,
                });
            }

            match &wanted.alias {
                Some(alias)
                    if is_plain_ref(&cond.column) && !resolved.columns.contains_key(alias) =>
                {
                    Err(ResolutionError::UnknownAlias {
                        alias: alias.clone(),
                        context: format!("sort_condition[{}]", i),
                    })
                }
                _ => Err(ResolutionError::UnknownSortColumn {
                    column: cond.column.clone(),
                }),
            }
        })
        .collect()
}

/// `alias.column` made of identifier characters only.
fn is_plain_ref(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
