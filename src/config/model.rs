//! Typed representation of one YAML transformation spec.
//!
//! Parsing goes through `serde_yaml::Value` rather than a derived
//! `Deserialize` so every failure can name the exact path that is wrong
//! (`dependencies.emp.type`, `join_conditions[1][2]`, ...).
//!
//! Example spec:
//! ```yaml
//! constructed_table_name: staff
//! dependencies:
//!   emp: {table_name: employee, type: source}
//!   dep: {table_name: department, type: source}
//! join_conditions:
//!   - [emp, dep, emp.department_id, dep.department_id]
//! select:
//!   emp.name: employee_name
//!   dep.name: dept_name
//! filter_condition:
//!   - "emp.status == 'active'"
//! sort_condition:
//!   - [employee_name, asc]
//! ```

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::plan::{JoinType, SortDirection, TableKind, TableSpec};

const TOP_LEVEL_KEYS: &[&str] = &[
    "constructed_table_name",
    "dependencies",
    "join_conditions",
    "select",
    "filter_condition",
    "group_condition",
    "having_condition",
    "sort_condition",
];

const DEPENDENCY_KEYS: &[&str] = &["table_name", "type", "source"];

/// Errors raised while loading a spec.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required field '{path}'")]
    MissingField { path: String },

    #[error("Invalid type for '{path}': expected {expected}, found {found}")]
    InvalidType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid value for '{path}': {message}")]
    InvalidValue { path: String, message: String },

    #[error("Unknown field '{path}'")]
    UnknownField { path: String },
}

impl ConfigError {
    /// Path of the offending field, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ConfigError::Yaml(_) => None,
            ConfigError::MissingField { path }
            | ConfigError::InvalidType { path, .. }
            | ConfigError::InvalidValue { path, .. }
            | ConfigError::UnknownField { path } => Some(path),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One entry of `join_conditions`, exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    pub left_alias: String,
    pub right_alias: String,
    pub left_key: String,
    pub right_key: String,
    /// Optional fifth tuple element.
    pub join_type: Option<JoinType>,
}

/// One entry of `select`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectEntry {
    /// Key as written: `alias.column`, `column`, or an aggregate call.
    pub source: String,
    /// `None` when the value is null, meaning "keep the column name".
    pub output_name: Option<String>,
}

/// One entry of `sort_condition`, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCondition {
    pub column: String,
    pub direction: SortDirection,
}

/// A validated transformation spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigModel {
    pub constructed_table_name: String,
    /// Declared tables in declaration order.
    pub dependencies: Vec<TableSpec>,
    pub join_conditions: Vec<JoinCondition>,
    /// Select entries in declaration order; order defines output column order.
    pub select: Vec<SelectEntry>,
    pub filter_condition: Vec<String>,
    pub group_condition: Vec<String>,
    pub having_condition: Vec<String>,
    pub sort_condition: Vec<SortCondition>,
}

impl ConfigModel {
    /// Parse and validate a spec from YAML text.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let raw: Value = serde_yaml::from_str(text)?;
        Self::parse(&raw)
    }

    /// Validate an already-parsed YAML document.
    pub fn parse(raw: &Value) -> ConfigResult<Self> {
        let root = expect_mapping(raw, "<root>")?;
        reject_unknown_keys(root, TOP_LEVEL_KEYS, None)?;

        let constructed_table_name =
            non_empty_string(required(root, "constructed_table_name")?, "constructed_table_name")?;

        let dependencies = parse_dependencies(required(root, "dependencies")?)?;
        let join_conditions = match optional(root, "join_conditions") {
            Some(value) => parse_join_conditions(value)?,
            None => Vec::new(),
        };
        let select = parse_select(required(root, "select")?)?;

        let filter_condition = string_list(optional(root, "filter_condition"), "filter_condition")?;
        let group_condition = string_list(optional(root, "group_condition"), "group_condition")?;
        let having_condition = string_list(optional(root, "having_condition"), "having_condition")?;
        let sort_condition = match optional(root, "sort_condition") {
            Some(value) => parse_sort(value)?,
            None => Vec::new(),
        };

        Ok(ConfigModel {
            constructed_table_name,
            dependencies,
            join_conditions,
            select,
            filter_condition,
            group_condition,
            having_condition,
            sort_condition,
        })
    }

    /// Look up a declared table by alias.
    pub fn table(&self, alias: &str) -> Option<&TableSpec> {
        self.dependencies.iter().find(|t| t.alias == alias)
    }
}

// ============================================================================
// Sections
// ============================================================================

fn parse_dependencies(value: &Value) -> ConfigResult<Vec<TableSpec>> {
    let mapping = expect_mapping(value, "dependencies")?;
    if mapping.is_empty() {
        return Err(ConfigError::InvalidValue {
            path: "dependencies".into(),
            message: "at least one table must be declared".into(),
        });
    }

    let mut tables = Vec::with_capacity(mapping.len());
    for (key, entry) in mapping {
        let alias = key_string(key, "dependencies")?;
        let path = format!("dependencies.{}", alias);
        if alias.is_empty() {
            return Err(ConfigError::InvalidValue {
                path,
                message: "alias must not be empty".into(),
            });
        }
        if alias.contains('.') {
            return Err(ConfigError::InvalidValue {
                path,
                message: "alias must not contain '.'".into(),
            });
        }

        let fields = expect_mapping(entry, &path)?;
        reject_unknown_keys(fields, DEPENDENCY_KEYS, Some(&path))?;

        let table_path = format!("{}.table_name", path);
        let physical_name = non_empty_string(
            fields
                .get("table_name")
                .ok_or_else(|| ConfigError::MissingField { path: table_path.clone() })?,
            &table_path,
        )?;

        let type_path = format!("{}.type", path);
        let kind_text = expect_string(
            fields
                .get("type")
                .ok_or_else(|| ConfigError::MissingField { path: type_path.clone() })?,
            &type_path,
        )?;
        let kind = kind_text
            .parse::<TableKind>()
            .map_err(|_| ConfigError::InvalidValue {
                path: type_path,
                message: format!("expected 'source' or 'model', found '{}'", kind_text),
            })?;

        let origin = match fields.get("source") {
            None | Some(Value::Null) => None,
            Some(v) => Some(expect_string(v, &format!("{}.source", path))?.to_string()),
        };

        tables.push(TableSpec {
            alias,
            physical_name,
            kind,
            origin,
        });
    }

    Ok(tables)
}

fn parse_join_conditions(value: &Value) -> ConfigResult<Vec<JoinCondition>> {
    let items = expect_sequence(value, "join_conditions")?;
    let mut joins = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let path = format!("join_conditions[{}]", i);
        let parts = expect_sequence(item, &path)?;
        if parts.len() != 4 && parts.len() != 5 {
            return Err(ConfigError::InvalidValue {
                path,
                message: format!(
                    "expected [left_alias, right_alias, left_key, right_key], found {} elements",
                    parts.len()
                ),
            });
        }

        let mut strings = Vec::with_capacity(parts.len());
        for (j, part) in parts.iter().enumerate() {
            strings.push(non_empty_string(part, &format!("{}[{}]", path, j))?);
        }

        let join_type = match strings.get(4) {
            Some(text) => Some(text.parse::<JoinType>().map_err(|_| {
                ConfigError::InvalidValue {
                    path: format!("{}[4]", path),
                    message: format!("unknown join type '{}'", text),
                }
            })?),
            None => None,
        };

        joins.push(JoinCondition {
            left_alias: strings[0].clone(),
            right_alias: strings[1].clone(),
            left_key: strings[2].clone(),
            right_key: strings[3].clone(),
            join_type,
        });
    }

    Ok(joins)
}

fn parse_select(value: &Value) -> ConfigResult<Vec<SelectEntry>> {
    let mapping = expect_mapping(value, "select")?;
    if mapping.is_empty() {
        return Err(ConfigError::InvalidValue {
            path: "select".into(),
            message: "at least one column must be selected".into(),
        });
    }

    mapping
        .iter()
        .map(|(key, output)| {
            let source = key_string(key, "select")?;
            let path = format!("select.{}", source);
            let output_name = match output {
                Value::Null => None,
                other => Some(non_empty_string(other, &path)?),
            };
            Ok(SelectEntry {
                source,
                output_name,
            })
        })
        .collect()
}

fn parse_sort(value: &Value) -> ConfigResult<Vec<SortCondition>> {
    let items = expect_sequence(value, "sort_condition")?;
    let mut keys = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let path = format!("sort_condition[{}]", i);
        let key = match item {
            Value::String(column) => SortCondition {
                column: column.trim().to_string(),
                direction: SortDirection::Asc,
            },
            Value::Sequence(parts) if parts.len() == 2 => {
                let column = non_empty_string(&parts[0], &format!("{}[0]", path))?;
                let dir_path = format!("{}[1]", path);
                let dir_text = expect_string(&parts[1], &dir_path)?;
                let direction =
                    dir_text
                        .parse::<SortDirection>()
                        .map_err(|_| ConfigError::InvalidValue {
                            path: dir_path,
                            message: format!("expected 'asc' or 'desc', found '{}'", dir_text),
                        })?;
                SortCondition { column, direction }
            }
            Value::Sequence(parts) => {
                return Err(ConfigError::InvalidValue {
                    path,
                    message: format!(
                        "expected [column, direction], found {} elements",
                        parts.len()
                    ),
                })
            }
            other => {
                return Err(ConfigError::InvalidType {
                    path,
                    expected: "sequence",
                    found: type_name(other),
                })
            }
        };
        keys.push(key);
    }

    Ok(keys)
}

fn string_list(value: Option<&Value>, path: &str) -> ConfigResult<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    expect_sequence(value, path)?
        .iter()
        .enumerate()
        .map(|(i, item)| non_empty_string(item, &format!("{}[{}]", path, i)))
        .collect()
}

// ============================================================================
// Value helpers
// ============================================================================

fn required<'a>(mapping: &'a Mapping, key: &str) -> ConfigResult<&'a Value> {
    match mapping.get(key) {
        Some(Value::Null) | None => Err(ConfigError::MissingField { path: key.into() }),
        Some(value) => Ok(value),
    }
}

fn optional<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    match mapping.get(key) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

fn reject_unknown_keys(
    mapping: &Mapping,
    allowed: &[&str],
    prefix: Option<&str>,
) -> ConfigResult<()> {
    for key in mapping.keys() {
        let name = key_string(key, prefix.unwrap_or("<root>"))?;
        if !allowed.contains(&name.as_str()) {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name,
            };
            return Err(ConfigError::UnknownField { path });
        }
    }
    Ok(())
}

fn key_string(key: &Value, path: &str) -> ConfigResult<String> {
    match key {
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(ConfigError::InvalidType {
            path: path.into(),
            expected: "string key",
            found: type_name(other),
        }),
    }
}

fn expect_mapping<'a>(value: &'a Value, path: &str) -> ConfigResult<&'a Mapping> {
    match value {
        Value::Mapping(m) => Ok(m),
        other => Err(ConfigError::InvalidType {
            path: path.into(),
            expected: "mapping",
            found: type_name(other),
        }),
    }
}

fn expect_sequence<'a>(value: &'a Value, path: &str) -> ConfigResult<&'a [Value]> {
    match value {
        Value::Sequence(s) => Ok(s),
        other => Err(ConfigError::InvalidType {
            path: path.into(),
            expected: "sequence",
            found: type_name(other),
        }),
    }
}

fn expect_string<'a>(value: &'a Value, path: &str) -> ConfigResult<&'a str> {
    match value {
        Value::String(s) => Ok(s.trim()),
        other => Err(ConfigError::InvalidType {
            path: path.into(),
            expected: "string",
            found: type_name(other),
        }),
    }
}

fn non_empty_string(value: &Value, path: &str) -> ConfigResult<String> {
    let s = expect_string(value, path)?;
    if s.is_empty() {
        return Err(ConfigError::InvalidValue {
            path: path.into(),
            message: "must not be empty".into(),
        });
    }
    Ok(s.to_string())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
