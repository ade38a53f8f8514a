//! Tests for projection building and plan assembly checks.

use tablesmith::compile::{compile, CompileError};
use tablesmith::plan::{ColumnRef, ProjectionSource, SortDirection};
use tablesmith::planner::{PlanError, ProjectionError};
use tablesmith::resolver::{Catalog, ResolutionError};

fn catalog() -> Catalog {
    Catalog::new()
        .with_table("employee", ["employee_id", "name", "department_id", "status", "salary"])
        .with_table("department", ["department_id", "name", "budget"])
}

fn spec(select_and_rest: &str) -> String {
    format!(
        r#"
constructed_table_name: t
dependencies:
  emp: {{table_name: employee, type: source}}
  dep: {{table_name: department, type: source}}
join_conditions:
  - [emp, dep, emp.department_id, dep.department_id]
{}"#,
        select_and_rest
    )
}

fn projection_error(yaml: &str) -> ProjectionError {
    match compile(yaml, &catalog()).unwrap_err() {
        CompileError::Projection(e) => e,
        other => panic!("expected projection error, got {other}"),
    }
}

// ============================================================================
// Ordering and naming
// ============================================================================

#[test]
fn test_output_order_follows_select() {
    let plan = compile(&spec("select:\n  emp.status: y\n  dep.budget: x\n"), &catalog()).unwrap();
    assert_eq!(plan.output_columns(), vec!["y", "x"]);

    let plan = compile(&spec("select:\n  dep.budget: x\n  emp.status: y\n"), &catalog()).unwrap();
    assert_eq!(plan.output_columns(), vec!["x", "y"]);
}

#[test]
fn test_null_output_name_uses_column_name() {
    let plan = compile(&spec("select:\n  emp.status: ~\n  dep.budget: ~\n"), &catalog()).unwrap();
    assert_eq!(plan.output_columns(), vec!["status", "budget"]);
    assert_eq!(
        plan.projection[0].source,
        ProjectionSource::Column(ColumnRef::new("emp", "status"))
    );
}

#[test]
fn test_null_output_name_for_aggregate_uses_label() {
    let plan = compile(
        &spec("select:\n  emp.status: ~\n  sum(emp.salary): ~\ngroup_condition:\n  - emp.status\n"),
        &catalog(),
    )
    .unwrap();
    assert_eq!(plan.output_columns(), vec!["status", "sum(emp.salary)"]);
}

// ============================================================================
// Conflicts
// ============================================================================

#[test]
fn test_ambiguous_unqualified_name() {
    let err = projection_error(&spec("select:\n  name: ~\n"));
    match err {
        ProjectionError::AmbiguousOutput { name, sources } => {
            assert_eq!(name, "name");
            assert_eq!(sources, vec!["emp.name", "dep.name"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_defaulted_names_collide() {
    let err = projection_error(&spec("select:\n  emp.name: ~\n  dep.name: ~\n"));
    assert!(matches!(err, ProjectionError::AmbiguousOutput { ref name, .. } if name == "name"));
}

#[test]
fn test_explicit_duplicate_output_name() {
    let err = projection_error(&spec("select:\n  emp.name: n\n  dep.name: n\n"));
    assert_eq!(err, ProjectionError::DuplicateOutputName { name: "n".into() });
}

#[test]
fn test_qualified_names_disambiguate() {
    let plan = compile(
        &spec("select:\n  emp.name: employee_name\n  dep.name: dept_name\n"),
        &catalog(),
    )
    .unwrap();
    assert_eq!(plan.output_columns(), vec!["employee_name", "dept_name"]);
}

#[test]
fn test_ungrouped_select_column() {
    let err = projection_error(&spec(
        "select:\n  emp.name: n\n  count(*): c\ngroup_condition:\n  - emp.status\n",
    ));
    assert_eq!(
        err,
        ProjectionError::UngroupedColumn {
            column: "emp.name".into()
        }
    );
}

// ============================================================================
// Assembly checks
// ============================================================================

#[test]
fn test_aggregate_in_filter_rejected() {
    let err = compile(
        &spec(
            "select:\n  emp.status: s\ngroup_condition:\n  - emp.status\n\
             filter_condition:\n  - \"count(*) > 1\"\n",
        ),
        &catalog(),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Plan(PlanError::AggregateInFilter { .. })));
}

#[test]
fn test_having_without_grouping() {
    let err = compile(
        &spec("select:\n  emp.status: s\nhaving_condition:\n  - \"emp.status = 'a'\"\n"),
        &catalog(),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Plan(PlanError::HavingWithoutGrouping)));
}

#[test]
fn test_sort_by_source_maps_to_output_name() {
    let plan = compile(
        &spec("select:\n  emp.name: employee_name\nsort_condition:\n  - [emp.name, desc]\n"),
        &catalog(),
    )
    .unwrap();
    assert_eq!(plan.sort[0].column, "employee_name");
    assert_eq!(plan.sort[0].direction, SortDirection::Desc);
}

#[test]
fn test_sort_by_unknown_column() {
    let err = compile(
        &spec("select:\n  emp.name: employee_name\nsort_condition:\n  - dep.budget\n"),
        &catalog(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Resolution(ResolutionError::UnknownSortColumn { ref column })
            if column == "dep.budget"
    ));
}
