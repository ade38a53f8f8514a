//! Alias and column resolution.
//!
//! Maps every alias used in a spec to its declared table and every column
//! reference to the table that owns it, using caller-supplied schemas.

mod resolve;
mod schema;

pub use resolve::{resolve_sort, AliasResolver, ResolvedConfig, ResolvedSelect, SelectRef};
pub use schema::{Catalog, SchemaProvider};

use thiserror::Error;

/// Errors that can occur during resolution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Unknown alias '{alias}' in {context}")]
    UnknownAlias { alias: String, context: String },

    #[error("Unknown column '{column}' in {context}")]
    UnknownColumn { column: String, context: String },

    #[error("Ambiguous column '{column}' in {context}: found in {}", .aliases.join(", "))]
    AmbiguousColumn {
        column: String,
        aliases: Vec<String>,
        context: String,
    },

    #[error("No schema available for table '{table_name}' (alias '{alias}')")]
    MissingSchema { alias: String, table_name: String },

    #[error("Join key '{key}' in {context} must reference alias '{expected_alias}'")]
    KeyAliasMismatch {
        key: String,
        expected_alias: String,
        context: String,
    },

    #[error("Unknown sort column '{column}': not an output column")]
    UnknownSortColumn { column: String },
}

pub type ResolutionResult<T> = Result<T, ResolutionError>;
