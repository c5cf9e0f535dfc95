//! Lowering of document expressions into code AST.
//!
//! Safe expressions become plain host expressions (`Math.*`, string methods,
//! `typeof` checks); array operations become `.map/.filter/.reduce/.flatMap`
//! chains; field mappings become `this.safeX(data, 'key')` accessors wrapped by
//! their transform chain.

use std::collections::BTreeSet;

use edl_types::{
    ArrayOperation, BinaryOp, ComputeExpression, FieldMapping, LambdaBody, LambdaExpression,
    Literal, SafeFunction, UnaryOp,
};

use super::ast::{ArrowBody, Expr, Param};
use super::transforms::{is_accessor, transform_helper};
use crate::error::GenerationError;

/// Name the payload is bound to inside generated mapping code
pub const DATA_VAR: &str = "data";
/// Object the mapped fields are written to
pub const RESULT_VAR: &str = "result";
/// Request object that `params` refers to in response expressions
pub const REQUEST_VAR: &str = "request";

/// Names visible to a lowered expression
#[derive(Debug, Clone, Default)]
pub struct LowerEnv {
    /// Fields already mapped; read back from the result object
    fields: BTreeSet<String>,
    /// Lambda parameters, innermost last
    locals: Vec<String>,
    /// Whether `params` is bound to the request object
    request_in_scope: bool,
}

impl LowerEnv {
    /// Scope of an endpoint response mapping
    pub fn response() -> Self {
        Self {
            request_in_scope: true,
            ..Default::default()
        }
    }

    /// Scope of the transaction parser
    pub fn transaction() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: &str) {
        self.fields.insert(field.to_string());
    }

    fn resolve(&self, name: &str) -> Expr {
        if self.locals.iter().any(|l| l == name) {
            return Expr::ident(name);
        }
        if self.fields.contains(name) {
            return Expr::ident(RESULT_VAR).index(Expr::str(name));
        }
        if name == "params" && self.request_in_scope {
            return Expr::ident(REQUEST_VAR);
        }
        Expr::ident(name)
    }

    fn with_locals(&self, params: &[String]) -> Self {
        let mut env = self.clone();
        env.locals.extend(params.iter().cloned());
        env
    }
}

// =============================================================================
// SAFE EXPRESSIONS
// =============================================================================

pub fn lower_expr(expr: &ComputeExpression, env: &LowerEnv) -> Expr {
    match expr {
        ComputeExpression::Literal { value } => lower_literal(value),
        ComputeExpression::Identifier { name } => env.resolve(name),
        ComputeExpression::Member { object, property } => lower_expr(object, env).member(property),
        ComputeExpression::Index { object, index } => {
            lower_expr(object, env).index(lower_expr(index, env))
        }
        ComputeExpression::Unary { op, operand } => {
            let op = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            Expr::unary(op, lower_expr(operand, env))
        }
        ComputeExpression::Binary { op, left, right } => {
            Expr::binary(binary_symbol(*op), lower_expr(left, env), lower_expr(right, env))
        }
        ComputeExpression::Conditional {
            test,
            consequent,
            alternate,
        } => Expr::conditional(
            lower_expr(test, env),
            lower_expr(consequent, env),
            lower_expr(alternate, env),
        ),
        ComputeExpression::Call { function, args } => {
            let args: Vec<Expr> = args.iter().map(|a| lower_expr(a, env)).collect();
            lower_call(*function, args)
        }
        ComputeExpression::Array { elements } => {
            Expr::Array(elements.iter().map(|e| lower_expr(e, env)).collect())
        }
    }
}

fn lower_literal(value: &Literal) -> Expr {
    match value {
        Literal::Number(n) => Expr::Num(*n),
        Literal::String(s) => Expr::str(s.clone()),
        Literal::Bool(b) => Expr::Bool(*b),
        Literal::Null => Expr::Null,
        Literal::Undefined => Expr::Undefined,
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNe => "!==",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Coalesce => "??",
    }
}

fn math(name: &str, args: Vec<Expr>) -> Expr {
    Expr::ident("Math").method_call(name, args)
}

fn fold(op: &'static str, args: Vec<Expr>) -> Expr {
    let mut iter = args.into_iter();
    let first = iter.next().unwrap_or(Expr::Num(0.0));
    iter.fold(first, |acc, next| Expr::binary(op, acc, next))
}

fn type_is(value: Expr, name: &str) -> Expr {
    Expr::binary("===", Expr::unary("typeof", value), Expr::str(name))
}

/// Arity is checked by the parser; missing args lower to `undefined`
fn lower_call(function: SafeFunction, args: Vec<Expr>) -> Expr {
    let mut it = args.clone().into_iter();
    let mut next = || it.next().unwrap_or(Expr::Undefined);

    match function {
        SafeFunction::Abs => math("abs", args),
        SafeFunction::Ceil => math("ceil", args),
        SafeFunction::Floor => math("floor", args),
        SafeFunction::Round => math("round", args),
        SafeFunction::Sqrt => math("sqrt", args),
        SafeFunction::Pow => math("pow", args),
        SafeFunction::Min | SafeFunction::Max => {
            let name = if function == SafeFunction::Min { "min" } else { "max" };
            if args.len() == 1 {
                math(name, vec![Expr::Spread(Box::new(next()))])
            } else {
                math(name, args)
            }
        }
        SafeFunction::Add => fold("+", args),
        SafeFunction::Multiply => fold("*", args),
        SafeFunction::Concat => Expr::Array(args).method_call("join", vec![Expr::str("")]),
        SafeFunction::Length => next().member("length"),
        SafeFunction::ToLowerCase
        | SafeFunction::ToUpperCase
        | SafeFunction::Trim
        | SafeFunction::Substring
        | SafeFunction::StartsWith
        | SafeFunction::EndsWith
        | SafeFunction::Includes
        | SafeFunction::ReplaceAll
        | SafeFunction::IndexOf
        | SafeFunction::LastIndexOf
        | SafeFunction::Slice => {
            let target = next();
            let rest: Vec<Expr> = args.into_iter().skip(1).collect();
            target.method_call(function.name(), rest)
        }
        SafeFunction::ToString => Expr::ident("String").call(args),
        SafeFunction::ToNumber => Expr::ident("Number").call(args),
        SafeFunction::ToBoolean => Expr::ident("Boolean").call(args),
        SafeFunction::ParseInt => Expr::ident("parseInt").call(args),
        SafeFunction::ParseFloat => Expr::ident("parseFloat").call(args),
        SafeFunction::ToFixed => {
            let value = next();
            let digits = next();
            Expr::ident("Number")
                .call(vec![value])
                .method_call("toFixed", vec![digits])
        }
        SafeFunction::IsNull => Expr::binary("===", next(), Expr::Null),
        SafeFunction::IsUndefined => Expr::binary("===", next(), Expr::Undefined),
        SafeFunction::IsNumber => type_is(next(), "number"),
        SafeFunction::IsString => type_is(next(), "string"),
        SafeFunction::IsArray => Expr::ident("Array").method_call("isArray", vec![next()]),
        SafeFunction::IsObject => {
            let value = next();
            Expr::binary(
                "&&",
                Expr::binary(
                    "&&",
                    type_is(value.clone(), "object"),
                    Expr::binary("!==", value.clone(), Expr::Null),
                ),
                Expr::unary("!", Expr::ident("Array").method_call("isArray", vec![value])),
            )
        }
    }
}

// =============================================================================
// ARRAY OPERATIONS
// =============================================================================

pub fn lower_operation(op: &ArrayOperation, env: &LowerEnv) -> Expr {
    match op {
        ArrayOperation::Map(map) => {
            lower_expr(&map.array, env).method_call("map", vec![lower_lambda(&map.transform, env)])
        }
        ArrayOperation::Filter(filter) => lower_expr(&filter.array, env)
            .method_call("filter", vec![lower_lambda(&filter.predicate, env)]),
        ArrayOperation::FlatMap(flat) => lower_expr(&flat.array, env)
            .method_call("flatMap", vec![lower_lambda(&flat.transform, env)]),
        ArrayOperation::Reduce(reduce) => {
            let mut args = vec![lower_lambda(&reduce.reducer, env)];
            if let Some(initial) = &reduce.initial {
                args.push(lower_expr(initial, env));
            }
            lower_expr(&reduce.array, env).method_call("reduce", args)
        }
        ArrayOperation::Slice(slice) => {
            let array = lower_expr(&slice.array, env);
            let bound = |b: Option<i64>| b.map(|v| Expr::Num(v as f64)).unwrap_or(Expr::Undefined);
            match slice.step {
                None | Some(1) => {
                    let mut args = Vec::new();
                    if slice.start.is_some() || slice.end.is_some() {
                        args.push(slice.start.map(|v| Expr::Num(v as f64)).unwrap_or(Expr::Num(0.0)));
                    }
                    if let Some(end) = slice.end {
                        args.push(Expr::Num(end as f64));
                    }
                    array.method_call("slice", args)
                }
                Some(step) => Expr::this_call(
                    "sliceWithStep",
                    vec![array, bound(slice.start), bound(slice.end), Expr::Num(step as f64)],
                ),
            }
        }
    }
}

fn lower_lambda(lambda: &LambdaExpression, env: &LowerEnv) -> Expr {
    let inner = env.with_locals(&lambda.params);
    let body = match &lambda.body {
        LambdaBody::Expression { expr } => lower_expr(expr, &inner),
        LambdaBody::Operation { operation } => lower_operation(operation, &inner),
    };
    Expr::Arrow {
        params: lambda
            .params
            .iter()
            .map(|p| Param {
                name: p.clone(),
                ty: None,
                default: None,
            })
            .collect(),
        body: ArrowBody::Expr(Box::new(body)),
    }
}

// =============================================================================
// PATHS AND FIELD MAPPINGS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

impl PathSegment {
    fn to_expr(&self) -> Expr {
        match self {
            PathSegment::Key(k) => Expr::str(k.clone()),
            PathSegment::Index(i) => Expr::Num(*i as f64),
        }
    }
}

/// Split `result[0].price` or `a['b'].c` into segments
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    let flush = |current: &mut String, segments: &mut Vec<PathSegment>| {
        if !current.is_empty() {
            segments.push(PathSegment::Key(std::mem::take(current)));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let inner = inner.trim();
                let unquoted = inner.trim_matches(|c| c == '\'' || c == '"');
                match inner.parse::<i64>() {
                    Ok(i) => segments.push(PathSegment::Index(i)),
                    Err(_) => segments.push(PathSegment::Key(unquoted.to_string())),
                }
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

/// Raw value at `path` below `base`: `this.safeValue(base, 'a')?.['b']`
pub fn path_access(base: Expr, segments: &[PathSegment]) -> Expr {
    let Some((first, rest)) = segments.split_first() else {
        return base;
    };
    rest.iter().fold(
        Expr::this_call("safeValue", vec![base, first.to_expr()]),
        |acc, seg| acc.optional_index(seg.to_expr()),
    )
}

/// Value of one mapped field
pub fn lower_field(field: &FieldMapping, env: &LowerEnv) -> Result<Expr, GenerationError> {
    if let Some(op) = &field.operation {
        return Ok(lower_operation(op, env));
    }

    let value = if let Some(compute) = &field.compute {
        let parsed = compute
            .parsed
            .as_ref()
            .ok_or_else(|| GenerationError::UnparsedExpression {
                context: format!("field '{}'", field.field),
                source_text: compute.source.clone(),
            })?;
        apply_transforms(lower_expr(parsed, env), &field.transform_chain())
    } else if let Some(literal) = &field.literal {
        return Ok(Expr::from_json(literal));
    } else if let Some(path) = &field.path {
        lower_path_field(path, &field.transform_chain())
    } else {
        Expr::Undefined
    };

    Ok(match &field.default {
        Some(default) => Expr::binary("??", value, Expr::from_json(default)),
        None => value,
    })
}

/// The first accessor transform reads the key; the rest wrap the value
fn lower_path_field(path: &str, chain: &[&str]) -> Expr {
    let segments = parse_path(path);
    let data = Expr::ident(DATA_VAR);
    let chain: Vec<&str> = chain.iter().copied().filter(|t| !t.is_empty()).collect();

    let accessor = chain
        .first()
        .and_then(|t| transform_helper(t))
        .filter(|helper| is_accessor(helper));

    match (accessor, segments.split_last()) {
        (Some(helper), Some((last, parents))) => {
            let container = if parents.is_empty() {
                data
            } else {
                path_access(data, parents)
            };
            let read = Expr::this_call(helper, vec![container, last.to_expr()]);
            apply_transforms(read, &chain[1..])
        }
        _ => apply_transforms(path_access(data, &segments), &chain),
    }
}

fn apply_transforms(value: Expr, chain: &[&str]) -> Expr {
    chain
        .iter()
        .filter(|t| !t.is_empty())
        .fold(value, |acc, name| {
            let helper = transform_helper(name).unwrap_or(*name);
            Expr::this_call(helper, vec![acc])
        })
}
