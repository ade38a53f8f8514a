//! End-to-end execution tests over the in-memory engine.

use std::collections::HashMap;
use std::sync::Arc;

use tablesmith::compile::{compile, compile_with_options, CompileOptions};
use tablesmith::executor::{
    execute, EngineSchemas, ExecutionError, MemoryEngine, Step, Table, Value,
};
use tablesmith::plan::{JoinType, QueryPlan};

fn employee(id: i64, name: &str, department: Value, status: &str, salary: i64) -> Vec<Value> {
    vec![
        Value::Int(id),
        Value::str(name),
        department,
        Value::str(status),
        Value::Int(salary),
    ]
}

fn datasets() -> HashMap<String, Arc<Table>> {
    let mut map = HashMap::new();
    map.insert(
        "employee".to_string(),
        Arc::new(
            Table::new(
                ["employee_id", "name", "department_id", "status", "salary"],
                vec![
                    employee(1, "Bob", Value::Int(10), "active", 100),
                    employee(2, "Amy", Value::Int(10), "inactive", 80),
                    employee(3, "Cal", Value::Int(20), "active", 120),
                    employee(4, "Dee", Value::Null, "active", 90),
                ],
            )
            .unwrap(),
        ),
    );
    map.insert(
        "department".to_string(),
        Arc::new(
            Table::new(
                ["department_id", "name"],
                vec![
                    vec![Value::Int(10), Value::str("Eng")],
                    vec![Value::Int(30), Value::str("Ops")],
                ],
            )
            .unwrap(),
        ),
    );
    map
}

fn plan_for(yaml: &str, data: &HashMap<String, Arc<Table>>) -> QueryPlan {
    let engine = MemoryEngine::new();
    compile(yaml, &EngineSchemas::new(&engine, data)).unwrap()
}

fn rows(table: &Table) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect()
}

const STAFF: &str = r#"
constructed_table_name: active_staff
dependencies:
  emp: {table_name: employee, type: source}
  dep: {table_name: department, type: source}
join_conditions:
  - [emp, dep, emp.department_id, dep.department_id]
select:
  emp.name: employee_name
  dep.name: dept_name
filter_condition:
  - "emp.status == 'active'"
"#;

// ============================================================================
// Joins and filters
// ============================================================================

#[test]
fn test_active_staff_with_department() {
    let mut data = HashMap::new();
    data.insert(
        "employee".to_string(),
        Arc::new(
            Table::new(
                ["employee_id", "name", "department_id", "status"],
                vec![
                    vec![Value::Int(1), Value::str("Bob"), Value::Int(10), Value::str("active")],
                    vec![Value::Int(2), Value::str("Amy"), Value::Int(10), Value::str("inactive")],
                ],
            )
            .unwrap(),
        ),
    );
    data.insert(
        "department".to_string(),
        Arc::new(
            Table::new(
                ["department_id", "name"],
                vec![vec![Value::Int(10), Value::str("Eng")]],
            )
            .unwrap(),
        ),
    );

    let engine = MemoryEngine::new();
    let plan = plan_for(STAFF, &data);
    let result = execute(&engine, &plan, &data).unwrap();

    assert_eq!(result.name, "active_staff");
    assert_eq!(result.handle.columns, vec!["employee_name", "dept_name"]);
    assert_eq!(rows(&result.handle), vec![vec!["Bob", "Eng"]]);
}

#[test]
fn test_left_join_keeps_unmatched_and_null_keys() {
    let data = datasets();
    let engine = MemoryEngine::new();
    let options = CompileOptions::default().with_default_join_type(JoinType::Left);
    let plan = compile_with_options(STAFF, &EngineSchemas::new(&engine, &data), &options).unwrap();

    let result = execute(&engine, &plan, &data).unwrap();
    assert_eq!(
        rows(&result.handle),
        vec![vec!["Bob", "Eng"], vec!["Cal", "NULL"], vec!["Dee", "NULL"]]
    );
}

#[test]
fn test_full_join_appends_unmatched_right() {
    let yaml = STAFF.replace("dep.department_id]", "dep.department_id, full]").replace(
        "filter_condition:\n  - \"emp.status == 'active'\"\n",
        "",
    );
    let data = datasets();
    let engine = MemoryEngine::new();
    let result = execute(&engine, &plan_for(&yaml, &data), &data).unwrap();
    assert_eq!(result.handle.rows.len(), 5);
    assert_eq!(rows(&result.handle)[4], vec!["NULL", "Ops"]);
}

#[test]
fn test_filter_with_or_and_null_test() {
    let yaml = r#"
constructed_table_name: picked
dependencies:
  emp: {table_name: employee, type: source}
select:
  emp.name: ~
filter_condition:
  - "emp.salary >= 100 OR emp.department_id IS NULL"
  - "NOT emp.name = 'Cal'"
"#;
    let data = datasets();
    let engine = MemoryEngine::new();
    let result = execute(&engine, &plan_for(yaml, &data), &data).unwrap();
    assert_eq!(rows(&result.handle), vec![vec!["Bob"], vec!["Dee"]]);
}

// ============================================================================
// Grouping and sorting
// ============================================================================

#[test]
fn test_group_having_sort() {
    let yaml = r#"
constructed_table_name: by_status
dependencies:
  emp: {table_name: employee, type: source}
select:
  emp.status: status
  count(*): headcount
  sum(emp.salary): payroll
group_condition:
  - emp.status
having_condition:
  - "headcount >= 1"
  - "max(emp.salary) > 90"
sort_condition:
  - [payroll, desc]
"#;
    let data = datasets();
    let engine = MemoryEngine::new();
    let result = execute(&engine, &plan_for(yaml, &data), &data).unwrap();

    assert_eq!(result.handle.columns, vec!["status", "headcount", "payroll"]);
    assert_eq!(rows(&result.handle), vec![vec!["active", "3", "310"]]);
}

#[test]
fn test_sort_multiple_keys() {
    let yaml = r#"
constructed_table_name: sorted
dependencies:
  emp: {table_name: employee, type: source}
select:
  emp.status: status
  emp.name: name
sort_condition:
  - [status, desc]
  - name
"#;
    let data = datasets();
    let engine = MemoryEngine::new();
    let result = execute(&engine, &plan_for(yaml, &data), &data).unwrap();
    let names: Vec<String> = result.handle.rows.iter().map(|r| r[1].to_string()).collect();
    assert_eq!(names, vec!["Amy", "Bob", "Cal", "Dee"]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_dataset_names_alias() {
    let data = datasets();
    let plan = plan_for(STAFF, &data);

    let mut partial = data.clone();
    partial.remove("department");
    let err = execute(&MemoryEngine::new(), &plan, &partial).unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::MissingDataset { ref alias, ref table_name }
            if alias == "dep" && table_name == "department"
    ));
}

#[test]
fn test_type_error_is_step_failure() {
    let yaml = r#"
constructed_table_name: bad
dependencies:
  emp: {table_name: employee, type: source}
select:
  sum(emp.name): total
"#;
    let data = datasets();
    let err = execute(&MemoryEngine::new(), &plan_for(yaml, &data), &data).unwrap_err();
    match err {
        ExecutionError::StepFailed { step, source } => {
            assert_eq!(step, Step::Aggregate);
            assert!(source.to_string().contains("sum"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_plan_is_reusable() {
    let data = datasets();
    let engine = MemoryEngine::new();
    let plan = plan_for(STAFF, &data);
    let first = execute(&engine, &plan, &data).unwrap();
    let second = execute(&engine, &plan, &data).unwrap();
    assert_eq!(first, second);
}
