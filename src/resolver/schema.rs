//! Column inventories for physical tables.
//!
//! Spec files name tables and columns but never declare schemas, so the
//! caller supplies column names per physical table at compile time.

use std::collections::{BTreeMap, HashMap};

/// Source of column names per physical table.
pub trait SchemaProvider {
    /// Columns of `table_name`, or `None` if the table is unknown.
    fn columns(&self, table_name: &str) -> Option<Vec<String>>;
}

impl SchemaProvider for HashMap<String, Vec<String>> {
    fn columns(&self, table_name: &str) -> Option<Vec<String>> {
        self.get(table_name).cloned()
    }
}

impl SchemaProvider for BTreeMap<String, Vec<String>> {
    fn columns(&self, table_name: &str) -> Option<Vec<String>> {
        self.get(table_name).cloned()
    }
}

/// In-memory schema catalog.
///
/// ```
/// use tablesmith::resolver::{Catalog, SchemaProvider};
///
/// let catalog = Catalog::new()
///     .with_table("employee", ["employee_id", "name"])
///     .with_table("department", ["department_id", "name"]);
/// assert_eq!(catalog.columns("employee").unwrap().len(), 2);
/// assert!(catalog.columns("payroll").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    tables: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table.
    pub fn with_table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_table(name, columns);
        self
    }

    pub fn add_table<I, S>(&mut self, name: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(name.into(), columns.into_iter().map(Into::into).collect());
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl SchemaProvider for Catalog {
    fn columns(&self, table_name: &str) -> Option<Vec<String>> {
        self.tables.get(table_name).cloned()
    }
}
