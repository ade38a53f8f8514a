//! Lowers sqlparser's AST into our predicate tree.
//!
//! Condition text is handed to sqlparser's `GenericDialect` expression parser
//! and the result is walked into [`Predicate`]. Only comparisons, boolean
//! connectives, null tests, column references, literals and the five
//! aggregate calls survive lowering; anything else is rejected with the
//! clause text attached.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use sqlparser::ast as sql;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use super::{PredicateError, PredicateResult};
use crate::plan::{
    AggregateExpr, AggregateFunc, ColumnRef, CompareOp, Literal, Operand, Predicate,
    ProjectionSource,
};

/// `column` or `alias.column`, taken verbatim without going through sqlparser.
static PLAIN_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap());

/// Date-like string literal.
static DATE_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Parse one boolean clause.
pub(super) fn parse_clause(clause: &str) -> PredicateResult<Predicate> {
    let expr = parse_expr(clause)?;
    Lowering { clause }.predicate(&expr)
}

/// Parse a `select` key: a column reference or an aggregate call.
pub(super) fn parse_select_source(text: &str) -> PredicateResult<ProjectionSource> {
    let trimmed = text.trim();
    if PLAIN_REF.is_match(trimmed) {
        return Ok(ProjectionSource::Column(ColumnRef::parse(trimmed)));
    }

    let expr = parse_expr(trimmed)?;
    let lowering = Lowering { clause: text };
    match lowering.operand(&expr)? {
        Operand::Column(col) => Ok(ProjectionSource::Column(col)),
        Operand::Aggregate(agg) => Ok(ProjectionSource::Aggregate(agg)),
        Operand::Literal(_) => Err(lowering.unsupported("literal select source")),
    }
}

fn parse_expr(clause: &str) -> PredicateResult<sql::Expr> {
    let dialect = GenericDialect {};
    let failure = |message: String| PredicateError::ParseFailure {
        clause: clause.to_string(),
        message,
    };

    let mut parser = Parser::new(&dialect)
        .try_with_sql(clause)
        .map_err(|e| failure(e.to_string()))?;
    let expr = parser.parse_expr().map_err(|e| failure(e.to_string()))?;

    let next = parser.peek_token().token;
    if next != Token::EOF {
        return Err(failure(format!("unexpected trailing input at '{}'", next)));
    }

    Ok(expr)
}

struct Lowering<'a> {
    clause: &'a str,
}

impl Lowering<'_> {
    fn predicate(&self, expr: &sql::Expr) -> PredicateResult<Predicate> {
        match expr {
            sql::Expr::Nested(inner) => self.predicate(inner),

            sql::Expr::BinaryOp { left, op, right } => match op {
                sql::BinaryOperator::And => Ok(Predicate::And(self.connective(expr, true)?)),
                sql::BinaryOperator::Or => Ok(Predicate::Or(self.connective(expr, false)?)),
                _ => {
                    let cmp = compare_op(op)
                        .ok_or_else(|| self.unsupported(&format!("operator '{}'", op)))?;
                    Ok(Predicate::compare(self.operand(left)?, cmp, self.operand(right)?))
                }
            },

            sql::Expr::UnaryOp {
                op: sql::UnaryOperator::Not,
                expr: inner,
            } => Ok(Predicate::Not(Box::new(self.predicate(inner)?))),

            sql::Expr::IsNull(inner) => Ok(Predicate::IsNull {
                operand: self.operand(inner)?,
                negated: false,
            }),
            sql::Expr::IsNotNull(inner) => Ok(Predicate::IsNull {
                operand: self.operand(inner)?,
                negated: true,
            }),

            // A bare boolean column reads as `column == TRUE`.
            sql::Expr::Identifier(_) | sql::Expr::CompoundIdentifier(_) => {
                match self.operand(expr)? {
                    col @ Operand::Column(_) => Ok(Predicate::compare(
                        col,
                        CompareOp::Eq,
                        Operand::Literal(Literal::Bool(true)),
                    )),
                    _ => Err(self.unsupported("non-boolean expression")),
                }
            }

            other => Err(self.unsupported(&format!("expression '{}'", other))),
        }
    }

    /// Flatten a chain of the same connective into one list.
    fn connective(&self, expr: &sql::Expr, is_and: bool) -> PredicateResult<Vec<Predicate>> {
        let wanted = if is_and {
            sql::BinaryOperator::And
        } else {
            sql::BinaryOperator::Or
        };

        let mut out = Vec::new();
        let mut stack = vec![expr];
        while let Some(next) = stack.pop() {
            match next {
                sql::Expr::BinaryOp { left, op, right } if *op == wanted => {
                    stack.push(right);
                    stack.push(left);
                }
                other => out.push(self.predicate(other)?),
            }
        }
        Ok(out)
    }

    fn operand(&self, expr: &sql::Expr) -> PredicateResult<Operand> {
        match expr {
            sql::Expr::Nested(inner) => self.operand(inner),

            // Double quotes delimit identifiers in SQL but strings in spec files.
            sql::Expr::Identifier(ident) if ident.quote_style == Some('"') => {
                Ok(Operand::Literal(string_literal(&ident.value)))
            }
            sql::Expr::Identifier(ident) => Ok(Operand::Column(ColumnRef::bare(&ident.value))),

            sql::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                [alias, column] => Ok(Operand::Column(ColumnRef::new(&alias.value, &column.value))),
                _ => Err(self.unsupported(&format!("column reference '{}'", expr))),
            },

            sql::Expr::Value(value) => Ok(Operand::Literal(self.literal(value)?)),

            sql::Expr::UnaryOp {
                op: op @ (sql::UnaryOperator::Minus | sql::UnaryOperator::Plus),
                expr: inner,
            } => match self.operand(inner)? {
                Operand::Literal(Literal::Number(n)) => {
                    let n = if matches!(op, sql::UnaryOperator::Minus) { -n } else { n };
                    Ok(Operand::Literal(Literal::Number(n)))
                }
                _ => Err(self.unsupported("sign on non-numeric operand")),
            },

            sql::Expr::Function(func) => Ok(Operand::Aggregate(self.aggregate(func)?)),

            other => Err(self.unsupported(&format!("operand '{}'", other))),
        }
    }

    fn literal(&self, value: &sql::Value) -> PredicateResult<Literal> {
        match value {
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => {
                Ok(string_literal(s))
            }
            sql::Value::Number(text, _) => text.parse::<f64>().map(Literal::Number).map_err(|_| {
                PredicateError::ParseFailure {
                    clause: self.clause.to_string(),
                    message: format!("invalid number '{}'", text),
                }
            }),
            sql::Value::Boolean(b) => Ok(Literal::Bool(*b)),
            sql::Value::Null => Ok(Literal::Null),
            other => Err(self.unsupported(&format!("literal '{}'", other))),
        }
    }

    fn aggregate(&self, func: &sql::Function) -> PredicateResult<AggregateExpr> {
        let name = func.name.to_string();
        let agg = AggregateFunc::from_name(&name)
            .ok_or_else(|| self.unsupported(&format!("function '{}'", name)))?;

        if func.over.is_some() {
            return Err(self.unsupported("window function"));
        }

        let list = match &func.args {
            sql::FunctionArguments::List(list) => list,
            _ => return Err(self.unsupported(&format!("arguments of '{}'", name))),
        };
        if list.duplicate_treatment.is_some() {
            return Err(self.unsupported("DISTINCT aggregate"));
        }

        match list.args.as_slice() {
            [sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard)] => {
                if agg == AggregateFunc::Count {
                    Ok(AggregateExpr::new(agg, None))
                } else {
                    Err(self.unsupported(&format!("'*' argument to '{}'", name)))
                }
            }
            [sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(arg))] => {
                match self.operand(arg)? {
                    Operand::Column(col) => Ok(AggregateExpr::new(agg, Some(col))),
                    _ => Err(self.unsupported(&format!("non-column argument to '{}'", name))),
                }
            }
            _ => Err(self.unsupported(&format!("argument list of '{}'", name))),
        }
    }

    fn unsupported(&self, feature: &str) -> PredicateError {
        PredicateError::Unsupported {
            clause: self.clause.to_string(),
            feature: feature.to_string(),
        }
    }
}

fn compare_op(op: &sql::BinaryOperator) -> Option<CompareOp> {
    match op {
        sql::BinaryOperator::Eq => Some(CompareOp::Eq),
        sql::BinaryOperator::NotEq => Some(CompareOp::NotEq),
        sql::BinaryOperator::Lt => Some(CompareOp::Lt),
        sql::BinaryOperator::LtEq => Some(CompareOp::LtEq),
        sql::BinaryOperator::Gt => Some(CompareOp::Gt),
        sql::BinaryOperator::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}

fn string_literal(text: &str) -> Literal {
    if DATE_LITERAL.is_match(text) {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Literal::Date(date);
        }
    }
    Literal::String(text.to_string())
}
