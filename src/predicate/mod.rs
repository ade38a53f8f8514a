//! Condition compiler: filter/having strings and select keys → expression trees.
//!
//! Every entry of `filter_condition` (and `having_condition`) is one
//! independent clause; the compiled condition is the AND of all of them.
//!
//! ```text
//! ["emp.status == 'active'", "emp.age >= 18"]
//!     → And[Compare(emp.status == 'active'), Compare(emp.age >= 18)]
//! ```
//!
//! Column references come out unresolved (alias optional); the resolver
//! fills in aliases afterwards.

mod parser;

use thiserror::Error;
use tracing::trace;

use crate::config::ConfigModel;
use crate::plan::{Predicate, ProjectionSource};

/// Errors raised while compiling a condition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredicateError {
    #[error("Cannot parse condition '{clause}': {message}")]
    ParseFailure { clause: String, message: String },

    #[error("Unsupported {feature} in condition '{clause}'")]
    Unsupported { clause: String, feature: String },
}

impl PredicateError {
    /// The offending clause, verbatim.
    pub fn clause(&self) -> &str {
        match self {
            PredicateError::ParseFailure { clause, .. }
            | PredicateError::Unsupported { clause, .. } => clause,
        }
    }
}

pub type PredicateResult<T> = Result<T, PredicateError>;

/// A `select` entry with its key parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelect {
    /// Key as written in the spec.
    pub raw: String,
    pub source: ProjectionSource,
    pub output_name: Option<String>,
}

/// Everything in a spec that is written as expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledClauses {
    pub select: Vec<CompiledSelect>,
    pub filter: Option<Predicate>,
    pub having: Option<Predicate>,
}

/// Stateless condition compiler.
pub struct PredicateCompiler;

impl PredicateCompiler {
    /// Compile a list of clauses into their conjunction.
    ///
    /// Returns `None` for an empty list.
    pub fn compile(clauses: &[String]) -> PredicateResult<Option<Predicate>> {
        let compiled = clauses
            .iter()
            .map(|clause| Self::compile_clause(clause))
            .collect::<PredicateResult<Vec<_>>>()?;
        Ok(Predicate::conjunction(compiled))
    }

    /// Compile a single clause.
    pub fn compile_clause(clause: &str) -> PredicateResult<Predicate> {
        let predicate = parser::parse_clause(clause)?;
        trace!(clause, predicate = %predicate, "compiled clause");
        Ok(predicate)
    }

    /// Parse a `select` key into a column or aggregate source.
    pub fn compile_select_source(text: &str) -> PredicateResult<ProjectionSource> {
        parser::parse_select_source(text)
    }

    /// Compile every expression-bearing section of a spec.
    pub fn compile_config(config: &ConfigModel) -> PredicateResult<CompiledClauses> {
        let select = config
            .select
            .iter()
            .map(|entry| {
                Ok(CompiledSelect {
                    raw: entry.source.clone(),
                    source: Self::compile_select_source(&entry.source)?,
                    output_name: entry.output_name.clone(),
                })
            })
            .collect::<PredicateResult<Vec<_>>>()?;

        Ok(CompiledClauses {
            select,
            filter: Self::compile(&config.filter_condition)?,
            having: Self::compile(&config.having_condition)?,
        })
    }
}
