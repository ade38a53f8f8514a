//! Tests for condition parsing and lowering.

use chrono::NaiveDate;
use tablesmith::plan::{
    AggregateExpr, AggregateFunc, ColumnRef, CompareOp, Literal, Operand, Predicate,
    ProjectionSource,
};
use tablesmith::predicate::{PredicateCompiler, PredicateError};

fn col(alias: &str, column: &str) -> Operand {
    Operand::Column(ColumnRef::new(alias, column))
}

fn clauses(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Comparisons
// ============================================================================

#[test]
fn test_equality_forms() {
    for text in ["emp.status == 'active'", "emp.status = 'active'"] {
        let p = PredicateCompiler::compile_clause(text).unwrap();
        assert_eq!(
            p,
            Predicate::compare(
                col("emp", "status"),
                CompareOp::Eq,
                Operand::Literal(Literal::String("active".into()))
            ),
            "clause: {}",
            text
        );
    }
}

#[test]
fn test_not_equal_forms() {
    for text in ["x != 1", "x <> 1"] {
        let p = PredicateCompiler::compile_clause(text).unwrap();
        assert!(matches!(p, Predicate::Compare { op: CompareOp::NotEq, .. }));
    }
}

#[test]
fn test_number_and_sign() {
    let p = PredicateCompiler::compile_clause("dep.budget >= -2.5").unwrap();
    assert_eq!(
        p,
        Predicate::compare(
            col("dep", "budget"),
            CompareOp::GtEq,
            Operand::Literal(Literal::Number(-2.5))
        )
    );
}

#[test]
fn test_date_literal() {
    let p = PredicateCompiler::compile_clause("emp.hired < '2024-01-31'").unwrap();
    let Predicate::Compare { right, .. } = p else {
        panic!("expected comparison");
    };
    assert_eq!(
        right,
        Operand::Literal(Literal::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()))
    );
}

#[test]
fn test_double_quoted_text_is_a_string() {
    let p = PredicateCompiler::compile_clause(r#"emp.status == "active""#).unwrap();
    assert_eq!(
        p,
        Predicate::compare(
            col("emp", "status"),
            CompareOp::Eq,
            Operand::Literal(Literal::String("active".into()))
        )
    );
}

// ============================================================================
// Connectives and null tests
// ============================================================================

#[test]
fn test_connectives_and_parentheses() {
    let p =
        PredicateCompiler::compile_clause("(a = 1 OR b = 2) AND NOT c IS NULL AND d IS NOT NULL")
            .unwrap();
    let Predicate::And(items) = p else {
        panic!("expected AND");
    };
    assert_eq!(items.len(), 3);
    assert!(matches!(&items[0], Predicate::Or(inner) if inner.len() == 2));
    assert!(matches!(&items[1], Predicate::Not(_)));
    assert!(matches!(&items[2], Predicate::IsNull { negated: true, .. }));
}

#[test]
fn test_clauses_are_conjoined() {
    assert_eq!(PredicateCompiler::compile(&[]).unwrap(), None);

    let single = PredicateCompiler::compile(&clauses(&["a = 1"])).unwrap().unwrap();
    assert!(matches!(single, Predicate::Compare { .. }));

    let many = PredicateCompiler::compile(&clauses(&["a = 1", "b = 2 AND c = 3"]))
        .unwrap()
        .unwrap();
    let Predicate::And(items) = many else {
        panic!("expected AND");
    };
    assert_eq!(items.len(), 3);
}

#[test]
fn test_display_round_trip_is_stable() {
    let p = PredicateCompiler::compile_clause("emp.status == 'active' AND emp.id > 3").unwrap();
    assert_eq!(p.to_string(), "(emp.status == 'active' AND emp.id > 3)");
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_aggregate_operands() {
    let p = PredicateCompiler::compile_clause("COUNT(*) > 1 AND sum(emp.salary) < 1000").unwrap();
    let aggs: Vec<String> = p.aggregates().iter().map(|a| a.label()).collect();
    assert_eq!(aggs, vec!["count(*)", "sum(emp.salary)"]);
}

#[test]
fn test_select_sources() {
    assert_eq!(
        PredicateCompiler::compile_select_source("emp.name").unwrap(),
        ProjectionSource::Column(ColumnRef::new("emp", "name"))
    );
    assert_eq!(
        PredicateCompiler::compile_select_source("name").unwrap(),
        ProjectionSource::Column(ColumnRef::bare("name"))
    );
    assert_eq!(
        PredicateCompiler::compile_select_source("max(emp.salary)").unwrap(),
        ProjectionSource::Aggregate(AggregateExpr::new(
            AggregateFunc::Max,
            Some(ColumnRef::new("emp", "salary"))
        ))
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_parse_failure_names_clause() {
    let err = PredicateCompiler::compile(&clauses(&["a = 1", "b =="])).unwrap_err();
    assert!(matches!(err, PredicateError::ParseFailure { .. }));
    assert_eq!(err.clause(), "b ==");
}

#[test]
fn test_trailing_input_rejected() {
    let err = PredicateCompiler::compile_clause("a = 1 b").unwrap_err();
    assert!(matches!(err, PredicateError::ParseFailure { .. }));
}

#[test]
fn test_unsupported_function() {
    let err = PredicateCompiler::compile_clause("upper(emp.name) = 'BOB'").unwrap_err();
    match err {
        PredicateError::Unsupported { clause, feature } => {
            assert_eq!(clause, "upper(emp.name) = 'BOB'");
            assert!(feature.contains("upper"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_arithmetic_is_unsupported() {
    let err = PredicateCompiler::compile_clause("a + 1 > 2").unwrap_err();
    assert!(matches!(err, PredicateError::Unsupported { .. }));
}
