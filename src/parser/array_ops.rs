//! Array-operation sub-parser and expression scope checks.
//!
//! Every expression in a mapping is parsed here so that scope is checked in one
//! place: an expression may read the mapping's root scope plus the params of
//! any lambda it sits inside. Shadowing a root name with a lambda param is
//! allowed; a lambda param referenced outside its lambda is a scope violation.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use edl_types::{
    ArrayOperation, ComputeExpression, FilterOperation, FlatMapOperation, LambdaBody,
    LambdaExpression, Literal, MapOperation, ReduceOperation, SafeExpression, SliceOperation,
};

use super::context::{get, get_str, ParseContext};
use super::source_map::{child_path, index_path};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::expr::{free_identifiers, operation_free_identifiers, parse_expression};

const OPERATION_KEYS: &[&str] = &[
    "op",
    "array",
    "transform",
    "predicate",
    "reducer",
    "initial",
    "start",
    "end",
    "step",
];

const LAMBDA_KEYS: &[&str] = &["param", "params", "body"];

/// `x => body` or `(acc, x) => body`
static ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\(([^)]*)\)|([A-Za-z_$][A-Za-z0-9_$]*))\s*=>\s*(.+)$")
        .expect("arrow regex is valid")
});

/// Names an expression at some mapping position may read
#[derive(Debug, Clone, Default)]
pub struct Scope {
    names: BTreeSet<String>,
}

impl Scope {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn describe(&self) -> String {
        self.names.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// True when `value` is a mapping describing an array operation
pub fn is_array_operation(map: &Mapping) -> bool {
    get(map, "op").is_some()
}

/// Parse `text` as a safe expression; failures become an `InvalidExpression` error
pub fn parse_safe_expression(
    ctx: &mut ParseContext,
    text: &str,
    path: &str,
    what: &str,
) -> SafeExpression {
    match parse_expression(text) {
        Ok(expr) => SafeExpression::new(text, Some(expr)),
        Err(e) => {
            ctx.error(
                DiagnosticCode::InvalidExpression,
                path,
                format!("invalid {} expression '{}': {}", what, text, e),
            );
            SafeExpression::new(text, None)
        }
    }
}

/// Report identifiers of `expr` that `scope` does not provide
pub fn check_expression_scope(
    ctx: &mut ParseContext,
    expr: &ComputeExpression,
    scope: &Scope,
    path: &str,
) {
    report_out_of_scope(ctx, free_identifiers(expr), scope, path, "expression");
}

fn report_out_of_scope(
    ctx: &mut ParseContext,
    names: BTreeSet<String>,
    scope: &Scope,
    path: &str,
    what: &str,
) {
    for name in names.into_iter().filter(|n| !scope.contains(n)) {
        let diag = Diagnostic::error(
            DiagnosticCode::ScopeViolation,
            ctx.location(path),
            format!("'{}' is not in scope in this {}", name, what),
        )
        .with_hint(format!("available names: {}", scope.describe()));
        ctx.push(diag);
    }
}

/// Parse an array-operation mapping and check it against `scope`
pub fn parse_array_operation(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    scope: &Scope,
) -> Option<ArrayOperation> {
    let op = parse_operation(ctx, map, path)?;
    report_out_of_scope(
        ctx,
        operation_free_identifiers(&op),
        scope,
        path,
        &format!("{} operation", op.name()),
    );
    debug!(path, op = op.name(), "parsed array operation");
    Some(op)
}

fn parse_operation(ctx: &mut ParseContext, map: &Mapping, path: &str) -> Option<ArrayOperation> {
    ctx.check_keys(map, path, OPERATION_KEYS);
    let location = ctx.location(path);

    let Some(name) = get_str(map, "op") else {
        ctx.error(
            DiagnosticCode::InvalidArrayOperation,
            path,
            "array operation 'op' must be a string",
        );
        return None;
    };
    let array = parse_array_source(ctx, map, path)?;

    let op = match name {
        "map" | "each" => ArrayOperation::Map(MapOperation {
            array,
            transform: required_lambda(ctx, map, path, "transform")?,
            location,
        }),
        "flatMap" => ArrayOperation::FlatMap(FlatMapOperation {
            array,
            transform: required_lambda(ctx, map, path, "transform")?,
            location,
        }),
        "filter" => ArrayOperation::Filter(FilterOperation {
            array,
            predicate: required_lambda(ctx, map, path, "predicate")?,
            location,
        }),
        "reduce" => {
            let reducer = required_lambda(ctx, map, path, "reducer")?;
            if reducer.params.len() < 2 {
                ctx.error(
                    DiagnosticCode::InvalidArrayOperation,
                    &child_path(path, "reducer"),
                    "reducer must declare accumulator and item params",
                );
            }
            let initial = match get(map, "initial") {
                Some(node) => Some(yaml_to_expression(ctx, node, &child_path(path, "initial"))?),
                None => None,
            };
            ArrayOperation::Reduce(ReduceOperation {
                array,
                reducer,
                initial,
                location,
            })
        }
        "slice" => {
            let start = slice_bound(ctx, map, path, "start");
            let end = slice_bound(ctx, map, path, "end");
            let step = slice_bound(ctx, map, path, "step");
            if step == Some(0) {
                ctx.error(
                    DiagnosticCode::InvalidArrayOperation,
                    &child_path(path, "step"),
                    "slice step cannot be zero",
                );
            }
            ArrayOperation::Slice(SliceOperation {
                array,
                start,
                end,
                step,
                location,
            })
        }
        other => {
            ctx.error(
                DiagnosticCode::InvalidArrayOperation,
                &child_path(path, "op"),
                format!(
                    "unknown array operation '{}', expected map, each, filter, reduce, slice or flatMap",
                    other
                ),
            );
            return None;
        }
    };
    Some(op)
}

fn parse_array_source(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
) -> Option<ComputeExpression> {
    let array_path = child_path(path, "array");
    match get(map, "array") {
        Some(Value::String(text)) => parse_safe_expression(ctx, text, &array_path, "array").parsed,
        Some(other) => {
            ctx.type_error(&array_path, "an expression string", other);
            None
        }
        None => {
            ctx.error(
                DiagnosticCode::MissingField,
                path,
                "array operation requires an 'array' expression",
            );
            None
        }
    }
}

fn slice_bound(ctx: &mut ParseContext, map: &Mapping, path: &str, key: &str) -> Option<i64> {
    let node = get(map, key)?;
    match node.as_i64() {
        Some(n) => Some(n),
        None if node.is_null() => None,
        None => {
            ctx.type_error(&child_path(path, key), "an integer", node);
            None
        }
    }
}

fn required_lambda(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    key: &str,
) -> Option<LambdaExpression> {
    let lambda_path = child_path(path, key);
    match get(map, key) {
        Some(node) => parse_lambda(ctx, node, &lambda_path),
        None => {
            ctx.error(
                DiagnosticCode::MissingField,
                path,
                format!("array operation requires '{}'", key),
            );
            None
        }
    }
}

/// `{param|params, body}` mapping or an arrow string
fn parse_lambda(ctx: &mut ParseContext, node: &Value, path: &str) -> Option<LambdaExpression> {
    match node {
        Value::String(text) => {
            let Some(caps) = ARROW.captures(text) else {
                ctx.error(
                    DiagnosticCode::InvalidArrayOperation,
                    path,
                    format!("lambda '{}' must have the form 'x => expression'", text),
                );
                return None;
            };
            let params: Vec<String> = match (caps.get(1), caps.get(2)) {
                (Some(list), _) => list
                    .as_str()
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
                (None, Some(single)) => vec![single.as_str().to_string()],
                (None, None) => Vec::new(),
            };
            let body = caps.get(3).map_or("", |m| m.as_str());
            let expr = parse_safe_expression(ctx, body, path, "lambda").parsed?;
            lambda_with_params(ctx, params, LambdaBody::Expression { expr }, path)
        }
        Value::Mapping(map) => {
            ctx.check_keys(map, path, LAMBDA_KEYS);
            let params = lambda_params(ctx, map, path);
            let body_path = child_path(path, "body");
            let body = match get(map, "body") {
                Some(Value::String(text)) => LambdaBody::Expression {
                    expr: parse_safe_expression(ctx, text, &body_path, "lambda").parsed?,
                },
                Some(Value::Mapping(inner)) if is_array_operation(inner) => LambdaBody::Operation {
                    operation: Box::new(parse_operation(ctx, inner, &body_path)?),
                },
                Some(other) => {
                    ctx.type_error(&body_path, "an expression or array operation", other);
                    return None;
                }
                None => {
                    ctx.error(DiagnosticCode::MissingField, path, "lambda requires a 'body'");
                    return None;
                }
            };
            lambda_with_params(ctx, params, body, path)
        }
        other => {
            ctx.type_error(path, "a lambda mapping or 'x => expression' string", other);
            None
        }
    }
}

fn lambda_params(ctx: &mut ParseContext, map: &Mapping, path: &str) -> Vec<String> {
    if let Some(single) = get_str(map, "param") {
        return vec![single.to_string()];
    }
    match get(map, "params") {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(other) => {
            ctx.type_error(&child_path(path, "params"), "a list of names", other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn lambda_with_params(
    ctx: &mut ParseContext,
    params: Vec<String>,
    body: LambdaBody,
    path: &str,
) -> Option<LambdaExpression> {
    if params.is_empty() {
        ctx.error(
            DiagnosticCode::InvalidArrayOperation,
            path,
            "lambda must declare at least one param",
        );
        return None;
    }
    let mut seen = BTreeSet::new();
    for p in &params {
        if !seen.insert(p.as_str()) {
            ctx.error(
                DiagnosticCode::InvalidArrayOperation,
                path,
                format!("lambda param '{}' is declared twice", p),
            );
        }
    }
    Some(LambdaExpression { params, body })
}

/// Scalars and lists of scalars become literals; strings are parsed as expressions
fn yaml_to_expression(
    ctx: &mut ParseContext,
    node: &Value,
    path: &str,
) -> Option<ComputeExpression> {
    let literal = |value| ComputeExpression::Literal { value };
    match node {
        Value::Null => Some(literal(Literal::Null)),
        Value::Bool(b) => Some(literal(Literal::Bool(*b))),
        Value::Number(n) => n.as_f64().map(ComputeExpression::number),
        Value::String(text) => parse_safe_expression(ctx, text, path, "initial value").parsed,
        Value::Sequence(seq) => {
            let elements = seq
                .iter()
                .enumerate()
                .map(|(i, item)| yaml_to_expression(ctx, item, &index_path(path, i)))
                .collect::<Option<Vec<_>>>()?;
            Some(ComputeExpression::Array { elements })
        }
        other => {
            ctx.type_error(path, "a scalar, list or expression", other);
            None
        }
    }
}
