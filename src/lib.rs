//! # Tablesmith
//!
//! Compiles declarative table-construction specs into query plans and runs
//! them against a pluggable tabular engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Spec (YAML document)                     │
//! │  (dependencies, joins, select, filter, group, sort)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [config]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ConfigModel                          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [predicate + resolver]
//! ┌─────────────────────────────────────────────────────────┐
//! │     ResolvedConfig (every column bound to an alias)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      QueryPlan                           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │             ExecutionEngine → ResultTable                │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod config;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod predicate;
pub mod resolver;

pub use compile::{compile, compile_with_options, CompileError, CompileOptions};
pub use config::{ConfigModel, Settings};
pub use executor::{execute, EngineSchemas, ExecutionEngine, ExecutionError, ResultTable};
pub use plan::QueryPlan;
pub use resolver::{Catalog, SchemaProvider};
