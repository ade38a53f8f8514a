//! Plan execution.
//!
//! The [`PlanExecutor`] walks a [`QueryPlan`] and drives an
//! [`ExecutionEngine`] through it:
//!
//! ```text
//! datasets → qualify → join* → filter → aggregate → having → project → sort
//! ```
//!
//! Every source is first projected to `alias.column` names so that joined
//! tables never collide. The plan is only read; caller handles are never
//! mutated and nothing partial is returned on failure.

mod engine;
pub mod memory;

pub use engine::ExecutionEngine;
pub use memory::{MemoryEngine, MemoryEngineError, Table, Value};

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::plan::QueryPlan;
use crate::resolver::SchemaProvider;

// ============================================================================
// Error Types
// ============================================================================

/// Execution stage, reported with engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Qualify,
    Join,
    Filter,
    Aggregate,
    Having,
    Project,
    Sort,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Qualify => "qualify",
            Step::Join => "join",
            Step::Filter => "filter",
            Step::Aggregate => "aggregate",
            Step::Having => "having",
            Step::Project => "project",
            Step::Sort => "sort",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No dataset named '{table_name}' for alias '{alias}'")]
    MissingDataset { alias: String, table_name: String },

    #[error("Execution failed at {step} step: {source}")]
    StepFailed {
        step: Step,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl ExecutionError {
    fn step<E: Error + Send + Sync + 'static>(step: Step) -> impl FnOnce(E) -> Self {
        move |e| ExecutionError::StepFailed {
            step,
            source: Box::new(e),
        }
    }
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

// ============================================================================
// Executor
// ============================================================================

/// Final dataset of a plan, named after the constructed table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable<H> {
    pub name: String,
    pub handle: H,
}

pub struct PlanExecutor<'a, E: ExecutionEngine> {
    engine: &'a E,
}

impl<'a, E: ExecutionEngine> PlanExecutor<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Run `plan` over datasets keyed by physical table name.
    pub fn execute(
        &self,
        plan: &QueryPlan,
        datasets: &HashMap<String, E::Handle>,
    ) -> ExecutionResult<ResultTable<E::Handle>> {
        let engine = self.engine;
        debug!(name = %plan.name, "executing plan");

        let mut inputs: HashMap<&str, E::Handle> = HashMap::with_capacity(plan.tables.len());
        for table in &plan.tables {
            let handle = datasets
                .get(&table.physical_name)
                .ok_or_else(|| ExecutionError::MissingDataset {
                    alias: table.alias.clone(),
                    table_name: table.physical_name.clone(),
                })?;
            inputs.insert(table.alias.as_str(), self.qualify(&table.alias, handle)?);
        }

        let mut current = take(&mut inputs, &plan.root)?;
        for edge in &plan.joins {
            let right = take(&mut inputs, &edge.right_alias)?;
            debug!(step = "join", right = %edge.right_alias, join_type = %edge.join_type);
            current = engine
                .join(
                    &current,
                    &right,
                    &edge.left_key.qualified_name(),
                    &edge.right_key.qualified_name(),
                    edge.join_type,
                )
                .map_err(ExecutionError::step(Step::Join))?;
        }

        if let Some(filter) = &plan.filter {
            debug!(step = "filter", predicate = %filter);
            current = engine
                .filter(&current, filter)
                .map_err(ExecutionError::step(Step::Filter))?;
        }

        if let Some(aggregation) = &plan.aggregation {
            let group_columns: Vec<String> =
                aggregation.group_by.iter().map(|c| c.qualified_name()).collect();
            debug!(
                step = "aggregate",
                groups = group_columns.len(),
                aggregates = aggregation.aggregates.len()
            );
            current = engine
                .group_aggregate(&current, &group_columns, &aggregation.aggregates)
                .map_err(ExecutionError::step(Step::Aggregate))?;

            if let Some(having) = &plan.having {
                debug!(step = "having", predicate = %having);
                current = engine
                    .filter(&current, having)
                    .map_err(ExecutionError::step(Step::Having))?;
            }
        }

        let columns: Vec<(String, String)> = plan
            .projection
            .iter()
            .map(|item| (item.source.column_name(), item.output_name.clone()))
            .collect();
        debug!(step = "project", columns = columns.len());
        current = engine
            .project(&current, &columns)
            .map_err(ExecutionError::step(Step::Project))?;

        if !plan.sort.is_empty() {
            debug!(step = "sort", keys = plan.sort.len());
            current = engine
                .sort(&current, &plan.sort)
                .map_err(ExecutionError::step(Step::Sort))?;
        }

        info!(name = %plan.name, "plan executed");
        Ok(ResultTable {
            name: plan.name.clone(),
            handle: current,
        })
    }

    /// Rename every column of a source to `alias.column`.
    fn qualify(&self, alias: &str, handle: &E::Handle) -> ExecutionResult<E::Handle> {
        let columns: Vec<(String, String)> = self
            .engine
            .columns(handle)
            .map_err(ExecutionError::step(Step::Qualify))?
            .into_iter()
            .map(|c| {
                let qualified = format!("{}.{}", alias, c);
                (c, qualified)
            })
            .collect();
        self.engine
            .project(handle, &columns)
            .map_err(ExecutionError::step(Step::Qualify))
    }
}

fn take<H>(inputs: &mut HashMap<&str, H>, alias: &str) -> ExecutionResult<H> {
    inputs.remove(alias).ok_or_else(|| ExecutionError::StepFailed {
        step: Step::Join,
        source: format!("alias '{}' is not available to join", alias).into(),
    })
}

/// Execute `plan` with `engine`.
pub fn execute<E: ExecutionEngine>(
    engine: &E,
    plan: &QueryPlan,
    datasets: &HashMap<String, E::Handle>,
) -> ExecutionResult<ResultTable<E::Handle>> {
    PlanExecutor::new(engine).execute(plan, datasets)
}

// ============================================================================
// Schemas from datasets
// ============================================================================

/// Serves column lists straight from an engine's datasets, so a spec can be
/// compiled against the data it will run on.
pub struct EngineSchemas<'a, E: ExecutionEngine> {
    engine: &'a E,
    datasets: &'a HashMap<String, E::Handle>,
}

impl<'a, E: ExecutionEngine> EngineSchemas<'a, E> {
    pub fn new(engine: &'a E, datasets: &'a HashMap<String, E::Handle>) -> Self {
        Self { engine, datasets }
    }
}

impl<E: ExecutionEngine> SchemaProvider for EngineSchemas<'_, E> {
    fn columns(&self, table_name: &str) -> Option<Vec<String>> {
        let handle = self.datasets.get(table_name)?;
        self.engine.columns(handle).ok()
    }
}
