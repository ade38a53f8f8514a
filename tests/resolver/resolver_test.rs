//! Tests for alias and column resolution.

use std::collections::HashMap;

use tablesmith::config::ConfigModel;
use tablesmith::plan::{ColumnRef, JoinType, Operand, Predicate, ProjectionSource};
use tablesmith::predicate::PredicateCompiler;
use tablesmith::resolver::{
    AliasResolver, Catalog, ResolutionError, ResolutionResult, ResolvedConfig, SchemaProvider,
    SelectRef,
};

fn catalog() -> Catalog {
    Catalog::new()
        .with_table("employee", ["employee_id", "name", "department_id", "status", "salary"])
        .with_table("department", ["department_id", "name", "budget"])
}

fn resolve_with(yaml: &str, schemas: &dyn SchemaProvider) -> ResolutionResult<ResolvedConfig> {
    let config = ConfigModel::from_yaml_str(yaml).unwrap();
    let clauses = PredicateCompiler::compile_config(&config).unwrap();
    AliasResolver::new(&config, schemas).resolve(clauses)
}

fn resolve(yaml: &str) -> ResolutionResult<ResolvedConfig> {
    resolve_with(yaml, &catalog())
}

const HEADER: &str = r#"
constructed_table_name: t
dependencies:
  emp: {table_name: employee, type: source}
  dep: {table_name: department, type: source}
join_conditions:
  - [emp, dep, emp.department_id, dep.department_id]
"#;

fn spec(rest: &str) -> String {
    format!("{}{}", HEADER, rest)
}

// ============================================================================
// Aliases
// ============================================================================

#[test]
fn test_unknown_alias_in_select() {
    let err = resolve(&spec("select:\n  xyz.name: n\n")).unwrap_err();
    assert!(matches!(err, ResolutionError::UnknownAlias { ref alias, .. } if alias == "xyz"));
    assert!(err.to_string().contains("xyz"));
}

#[test]
fn test_unknown_alias_in_join() {
    let yaml = r#"
constructed_table_name: t
dependencies:
  emp: {table_name: employee, type: source}
join_conditions:
  - [emp, xyz, emp.department_id, xyz.department_id]
select:
  emp.name: n
"#;
    let err = resolve(yaml).unwrap_err();
    match err {
        ResolutionError::UnknownAlias { alias, context } => {
            assert_eq!(alias, "xyz");
            assert_eq!(context, "join_conditions[0]");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_alias_in_filter() {
    let yaml = spec("select:\n  emp.name: n\nfilter_condition:\n  - \"xyz.status = 'a'\"\n");
    let err = resolve(&yaml).unwrap_err();
    assert!(matches!(err, ResolutionError::UnknownAlias { ref alias, .. } if alias == "xyz"));
}

// ============================================================================
// Columns
// ============================================================================

#[test]
fn test_unknown_qualified_column() {
    let err = resolve(&spec("select:\n  emp.budget: b\n")).unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::UnknownColumn { ref column, .. } if column == "emp.budget"
    ));
}

#[test]
fn test_unqualified_filter_column_binds_to_owner() {
    let yaml = spec("select:\n  emp.name: n\nfilter_condition:\n  - \"budget > 10\"\n");
    let resolved = resolve(&yaml).unwrap();
    let Some(Predicate::Compare { left, .. }) = resolved.filter else {
        panic!("expected comparison");
    };
    assert_eq!(left, Operand::Column(ColumnRef::new("dep", "budget")));
}

#[test]
fn test_ambiguous_filter_column() {
    let yaml = spec("select:\n  emp.name: n\nfilter_condition:\n  - \"name = 'Bob'\"\n");
    let err = resolve(&yaml).unwrap_err();
    match err {
        ResolutionError::AmbiguousColumn { column, aliases, .. } => {
            assert_eq!(column, "name");
            assert_eq!(aliases, vec!["emp", "dep"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_ambiguous_select_is_deferred() {
    let resolved = resolve(&spec("select:\n  name: ~\n")).unwrap();
    assert!(matches!(
        &resolved.select[0].source,
        SelectRef::Ambiguous { column, aliases } if column == "name" && aliases.len() == 2
    ));
}

#[test]
fn test_group_columns_resolve() {
    let resolved = resolve(&spec(
        "select:\n  status: status\n  sum(salary): total\ngroup_condition:\n  - status\n",
    ))
    .unwrap();
    assert_eq!(resolved.group_by, vec![ColumnRef::new("emp", "status")]);
    assert!(resolved.is_aggregated());
    assert_eq!(
        resolved.select[1].source,
        SelectRef::Resolved(ProjectionSource::Aggregate(
            tablesmith::plan::AggregateExpr::new(
                tablesmith::plan::AggregateFunc::Sum,
                Some(ColumnRef::new("emp", "salary"))
            )
        ))
    );
}

#[test]
fn test_having_reads_select_output_names() {
    let resolved = resolve(&spec(
        "select:\n  emp.status: status\n  count(*): headcount\n\
         group_condition:\n  - emp.status\nhaving_condition:\n  - \"headcount > 2\"\n",
    ))
    .unwrap();
    let Some(Predicate::Compare { left, .. }) = resolved.having else {
        panic!("expected comparison");
    };
    assert_eq!(left.column_name().as_deref(), Some("count(*)"));
}

// ============================================================================
// Joins and schemas
// ============================================================================

#[test]
fn test_join_key_alias_mismatch() {
    let yaml = r#"
constructed_table_name: t
dependencies:
  emp: {table_name: employee, type: source}
  dep: {table_name: department, type: source}
join_conditions:
  - [emp, dep, dep.department_id, emp.department_id]
select:
  emp.name: n
"#;
    let err = resolve(yaml).unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::KeyAliasMismatch { ref expected_alias, .. } if expected_alias == "emp"
    ));
}

#[test]
fn test_unqualified_join_keys_take_side_alias() {
    let yaml = r#"
constructed_table_name: t
dependencies:
  emp: {table_name: employee, type: source}
  dep: {table_name: department, type: source}
join_conditions:
  - [emp, dep, department_id, department_id, right]
select:
  emp.name: n
"#;
    let resolved = resolve(yaml).unwrap();
    assert_eq!(resolved.joins[0].left_key, ColumnRef::new("emp", "department_id"));
    assert_eq!(resolved.joins[0].right_key, ColumnRef::new("dep", "department_id"));
    assert_eq!(resolved.joins[0].join_type, JoinType::Right);
}

#[test]
fn test_default_join_type_from_resolver() {
    let config = ConfigModel::from_yaml_str(&spec("select:\n  emp.name: n\n")).unwrap();
    let clauses = PredicateCompiler::compile_config(&config).unwrap();
    let catalog = catalog();
    let resolved = AliasResolver::new(&config, &catalog)
        .with_default_join_type(JoinType::Full)
        .resolve(clauses)
        .unwrap();
    assert_eq!(resolved.joins[0].join_type, JoinType::Full);
}

#[test]
fn test_missing_schema() {
    let mut schemas: HashMap<String, Vec<String>> = HashMap::new();
    schemas.insert("employee".into(), vec!["department_id".into(), "name".into()]);

    let err = resolve_with(&spec("select:\n  emp.name: n\n"), &schemas).unwrap_err();
    assert_eq!(
        err,
        ResolutionError::MissingSchema {
            alias: "dep".into(),
            table_name: "department".into(),
        }
    );
}

// ============================================================================
// Sort columns
// ============================================================================

fn compile_error(yaml: &str) -> ResolutionError {
    match tablesmith::compile(yaml, &catalog()).unwrap_err() {
        tablesmith::CompileError::Resolution(e) => e,
        other => panic!("expected resolution error, got {other}"),
    }
}

#[test]
fn test_sort_with_undeclared_alias() {
    let yaml = spec("select:\n  emp.name: n\nsort_condition:\n  - [xyz.name, asc]\n");
    let err = compile_error(&yaml);
    assert_eq!(
        err,
        ResolutionError::UnknownAlias {
            alias: "xyz".into(),
            context: "sort_condition[0]".into(),
        }
    );
}

#[test]
fn test_sort_with_declared_alias_but_unprojected_column() {
    let err = compile_error(&spec("select:\n  emp.name: n\nsort_condition:\n  - dep.budget\n"));
    assert_eq!(
        err,
        ResolutionError::UnknownSortColumn {
            column: "dep.budget".into()
        }
    );
}

#[test]
fn test_sort_by_aggregate_label() {
    let yaml = spec(
        "select:\n  emp.status: s\n  count(*): c\n\
         group_condition:\n  - emp.status\n\
         sort_condition:\n  - [count(*), desc]\n",
    );
    let plan = tablesmith::compile(&yaml, &catalog()).unwrap();
    assert_eq!(plan.sort[0].column, "c");
}
