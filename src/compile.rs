//! End-to-end compilation from spec text to a query plan.
//!
//! ```text
//! YAML → ConfigModel → conditions → resolution → joins → projection → QueryPlan
//! ```
//!
//! Compilation is pure: it only reads the spec and the supplied schemas and
//! fails on the first problem found.
//!
//! # Example
//!
//! ```
//! use tablesmith::compile::compile;
//! use tablesmith::resolver::Catalog;
//!
//! let yaml = r#"
//! constructed_table_name: staff
//! dependencies:
//!   emp: {table_name: employee, type: source}
//! select:
//!   emp.name: employee_name
//! "#;
//!
//! let catalog = Catalog::new().with_table("employee", ["employee_id", "name"]);
//! let plan = compile(yaml, &catalog).unwrap();
//! assert_eq!(plan.output_columns(), vec!["employee_name"]);
//! ```

use tracing::{debug, info};

use crate::config::{ConfigError, ConfigModel};
use crate::plan::{JoinType, QueryPlan};
use crate::planner::{self, JoinPlanner, PlanError, ProjectionBuilder, ProjectionError};
use crate::predicate::{PredicateCompiler, PredicateError};
use crate::resolver::{resolve_sort, AliasResolver, ResolutionError, SchemaProvider};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Condition error: {0}")]
    Predicate(#[from] PredicateError),
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileOptions {
    /// Join type for join conditions that do not name one.
    pub default_join_type: JoinType,
}

impl CompileOptions {
    /// Set the default join type.
    pub fn with_default_join_type(mut self, join_type: JoinType) -> Self {
        self.default_join_type = join_type;
        self
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Compile spec text into a plan with default options.
pub fn compile(yaml: &str, schemas: &dyn SchemaProvider) -> CompileResult<QueryPlan> {
    compile_with_options(yaml, schemas, &CompileOptions::default())
}

/// Compile spec text into a plan.
pub fn compile_with_options(
    yaml: &str,
    schemas: &dyn SchemaProvider,
    options: &CompileOptions,
) -> CompileResult<QueryPlan> {
    let config = ConfigModel::from_yaml_str(yaml)?;
    compile_config(&config, schemas, options)
}

/// Compile an already-loaded spec.
pub fn compile_config(
    config: &ConfigModel,
    schemas: &dyn SchemaProvider,
    options: &CompileOptions,
) -> CompileResult<QueryPlan> {
    debug!(name = %config.constructed_table_name, "compiling spec");

    let clauses = PredicateCompiler::compile_config(config)?;

    let resolved = AliasResolver::new(config, schemas)
        .with_default_join_type(options.default_join_type)
        .resolve(clauses)?;

    let joins = JoinPlanner::new(&resolved).plan()?;
    let projection = ProjectionBuilder::new(&resolved).build()?;
    let sort = resolve_sort(&resolved, &projection)?;

    let plan = planner::assemble(&resolved, joins, projection, sort)?;

    info!(
        name = %plan.name,
        joins = plan.joins.len(),
        columns = plan.projection.len(),
        "compiled plan"
    );
    Ok(plan)
}
