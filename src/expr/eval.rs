//! Interpreter for parsed safe expressions over JSON values.
//!
//! Values follow JavaScript semantics closely enough that an expression gives
//! the same answer here as in the generated client. Internally a result is
//! `Option<Value>`: `None` is `undefined`, which JSON cannot represent.
//! Non-finite numbers (division by zero) surface as `null` for the same reason.

use serde_json::{Map, Number, Value};

use edl_types::expr::{FORBIDDEN_IDENTIFIERS, MAX_EXPRESSION_DEPTH};
use edl_types::{ArrayOperation, BinaryOp, ComputeExpression, Literal, SafeFunction, UnaryOp};

use crate::error::EvalError;

/// Scoped variable bindings introduced by lambdas, innermost last
pub(super) type Locals = Vec<(String, Value)>;

/// Evaluates expressions against a set of named JSON variables.
#[derive(Debug, Clone)]
pub struct Evaluator {
    variables: Map<String, Value>,
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            variables: Map::new(),
            max_depth: MAX_EXPRESSION_DEPTH * 4,
        }
    }

    pub fn with_variables(variables: Map<String, Value>) -> Self {
        Self {
            variables,
            ..Self::new()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Evaluate to JSON; `undefined` becomes `null`
    pub fn evaluate(&self, expr: &ComputeExpression) -> Result<Value, EvalError> {
        let mut locals = Locals::new();
        Ok(self.eval(expr, &mut locals, 0)?.unwrap_or(Value::Null))
    }

    /// Evaluate an array operation; the result is always an array except for `reduce`
    pub fn evaluate_operation(&self, op: &ArrayOperation) -> Result<Value, EvalError> {
        let mut locals = Locals::new();
        self.apply_operation(op, &mut locals, 0)
    }

    fn lookup(&self, name: &str, locals: &Locals) -> Result<Value, EvalError> {
        if FORBIDDEN_IDENTIFIERS.contains(&name) {
            return Err(EvalError::Forbidden(name.to_string()));
        }
        if let Some((_, value)) = locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    pub(super) fn eval(
        &self,
        expr: &ComputeExpression,
        locals: &mut Locals,
        depth: usize,
    ) -> Result<Option<Value>, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::DepthExceeded(self.max_depth));
        }
        let depth = depth + 1;

        match expr {
            ComputeExpression::Literal { value } => Ok(literal(value)),
            ComputeExpression::Identifier { name } => self.lookup(name, locals).map(Some),
            ComputeExpression::Member { object, property } => {
                let target = self.eval(object, locals, depth)?;
                member(target, property)
            }
            ComputeExpression::Index { object, index } => {
                let target = self.eval(object, locals, depth)?;
                let key = self.eval(index, locals, depth)?;
                index_into(target, key)
            }
            ComputeExpression::Unary { op, operand } => {
                let value = self.eval(operand, locals, depth)?;
                Ok(Some(match op {
                    UnaryOp::Neg => number_value(-to_number(&value)),
                    UnaryOp::Not => Value::Bool(!truthy(&value)),
                }))
            }
            ComputeExpression::Binary { op, left, right } => {
                self.binary(*op, left, right, locals, depth)
            }
            ComputeExpression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval(test, locals, depth)?) {
                    self.eval(consequent, locals, depth)
                } else {
                    self.eval(alternate, locals, depth)
                }
            }
            ComputeExpression::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, locals, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                call(*function, values)
            }
            ComputeExpression::Array { elements } => {
                let values = elements
                    .iter()
                    .map(|e| Ok(self.eval(e, locals, depth)?.unwrap_or(Value::Null)))
                    .collect::<Result<Vec<_>, EvalError>>()?;
                Ok(Some(Value::Array(values)))
            }
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &ComputeExpression,
        right: &ComputeExpression,
        locals: &mut Locals,
        depth: usize,
    ) -> Result<Option<Value>, EvalError> {
        let lhs = self.eval(left, locals, depth)?;
        // Short-circuiting operators return an operand, not a boolean
        match op {
            BinaryOp::And if !truthy(&lhs) => return Ok(lhs),
            BinaryOp::Or if truthy(&lhs) => return Ok(lhs),
            BinaryOp::Coalesce if !is_nullish(&lhs) => return Ok(lhs),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => {
                return self.eval(right, locals, depth)
            }
            _ => {}
        }
        let rhs = self.eval(right, locals, depth)?;

        let value = match op {
            BinaryOp::Add => match (&lhs, &rhs) {
                (Some(Value::String(_)), _) | (_, Some(Value::String(_))) => {
                    Value::String(format!("{}{}", to_display(&lhs), to_display(&rhs)))
                }
                _ => number_value(to_number(&lhs) + to_number(&rhs)),
            },
            BinaryOp::Sub => number_value(to_number(&lhs) - to_number(&rhs)),
            BinaryOp::Mul => number_value(to_number(&lhs) * to_number(&rhs)),
            BinaryOp::Div => number_value(to_number(&lhs) / to_number(&rhs)),
            BinaryOp::Mod => number_value(to_number(&lhs) % to_number(&rhs)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                Value::Bool(compare(op, &lhs, &rhs))
            }
            BinaryOp::Eq => Value::Bool(loose_equals(&lhs, &rhs)),
            BinaryOp::Ne => Value::Bool(!loose_equals(&lhs, &rhs)),
            BinaryOp::StrictEq => Value::Bool(strict_equals(&lhs, &rhs)),
            BinaryOp::StrictNe => Value::Bool(!strict_equals(&lhs, &rhs)),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => unreachable!("handled above"),
        };
        Ok(Some(value))
    }
}

// ============================================================================
// Value semantics
// ============================================================================

fn literal(value: &Literal) -> Option<Value> {
    match value {
        Literal::Number(n) => Some(number_value(*n)),
        Literal::String(s) => Some(Value::String(s.clone())),
        Literal::Bool(b) => Some(Value::Bool(*b)),
        Literal::Null => Some(Value::Null),
        Literal::Undefined => None,
    }
}

/// 2^53: above this not every integer is representable
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Integral numbers are stored as integers so `3.0` compares equal to `json!(3)`
pub(super) fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub(super) fn kind(value: &Option<Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

pub(super) fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn is_nullish(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn to_number(value: &Option<Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // exponent form, with an explicit sign on positive exponents
        let formatted = format!("{:e}", n);
        match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        }
    } else {
        format!("{}", n)
    }
}

/// String conversion as JavaScript's `String(x)`
fn to_display(value: &Option<Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display(&Some(other.clone())),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn compare(op: BinaryOp, lhs: &Option<Value>, rhs: &Option<Value>) -> bool {
    if let (Some(Value::String(a)), Some(Value::String(b))) = (lhs, rhs) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (to_number(lhs), to_number(rhs));
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

pub(super) fn strict_equals(lhs: &Option<Value>, rhs: &Option<Value>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(Value::Array(_)), Some(Value::Array(_)))
        | (Some(Value::Object(_)), Some(Value::Object(_))) => false,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn loose_equals(lhs: &Option<Value>, rhs: &Option<Value>) -> bool {
    if is_nullish(lhs) || is_nullish(rhs) {
        return is_nullish(lhs) && is_nullish(rhs);
    }
    match (lhs, rhs) {
        (Some(Value::Number(_)), Some(Value::String(_)))
        | (Some(Value::String(_)), Some(Value::Number(_)))
        | (Some(Value::Bool(_)), _)
        | (_, Some(Value::Bool(_))) => to_number(lhs) == to_number(rhs),
        _ => strict_equals(lhs, rhs),
    }
}

fn member(target: Option<Value>, property: &str) -> Result<Option<Value>, EvalError> {
    if FORBIDDEN_IDENTIFIERS.contains(&property) {
        return Err(EvalError::Forbidden(property.to_string()));
    }
    match target {
        None | Some(Value::Null) => Err(EvalError::PropertyAccess {
            property: property.to_string(),
            target: kind(&target).to_string(),
        }),
        Some(Value::Object(mut map)) => Ok(map.remove(property)),
        Some(Value::Array(items)) if property == "length" => {
            Ok(Some(Value::from(items.len())))
        }
        Some(Value::String(s)) if property == "length" => {
            Ok(Some(Value::from(s.chars().count())))
        }
        Some(_) => Ok(None),
    }
}

fn index_into(target: Option<Value>, key: Option<Value>) -> Result<Option<Value>, EvalError> {
    if let Some(Value::String(k)) = &key {
        if FORBIDDEN_IDENTIFIERS.contains(&k.as_str()) {
            return Err(EvalError::Forbidden(k.clone()));
        }
    }
    match target {
        None | Some(Value::Null) => Err(EvalError::IndexAccess {
            target: kind(&target).to_string(),
        }),
        Some(Value::Array(mut items)) => match key.as_ref().and_then(position) {
            Some(i) if i < items.len() => Ok(Some(items.swap_remove(i))),
            Some(_) => Ok(None),
            None => member(Some(Value::Array(items)), &to_display(&key)),
        },
        Some(Value::String(s)) => match key.as_ref().and_then(position) {
            Some(i) => Ok(s.chars().nth(i).map(|c| Value::String(c.to_string()))),
            None => member(Some(Value::String(s)), &to_display(&key)),
        },
        Some(Value::Object(mut map)) => Ok(map.remove(&to_display(&key))),
        Some(_) => Ok(None),
    }
}

/// Non-negative integral index, from a number or a numeric string
fn position(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

// ============================================================================
// Whitelisted functions
// ============================================================================

fn arg(args: &[Option<Value>], i: usize) -> &Option<Value> {
    static UNDEFINED: Option<Value> = None;
    args.get(i).unwrap_or(&UNDEFINED)
}

fn string_arg(function: SafeFunction, value: &Option<Value>) -> Result<String, EvalError> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(_)) | Some(Value::Bool(_)) => Ok(to_display(value)),
        other => Err(EvalError::TypeMismatch {
            function: function.name().to_string(),
            expected: "string".to_string(),
            found: kind(other).to_string(),
        }),
    }
}

/// Numeric arguments, flattening a single array argument (`max([1, 2])`)
fn numbers(args: &[Option<Value>]) -> Vec<f64> {
    match args {
        [Some(Value::Array(items))] => items.iter().map(|v| to_number(&Some(v.clone()))).collect(),
        _ => args.iter().map(to_number).collect(),
    }
}

/// JavaScript-style relative index clamp used by `slice`
fn relative(index: f64, len: usize) -> usize {
    let len_f = len as f64;
    let i = if index.is_nan() { 0.0 } else { index.trunc() };
    let resolved = if i < 0.0 { (len_f + i).max(0.0) } else { i.min(len_f) };
    resolved as usize
}

fn js_slice<T: Clone>(items: &[T], start: &Option<Value>, end: &Option<Value>) -> Vec<T> {
    let len = items.len();
    let from = relative(to_number(start), len);
    let to = match end {
        None => len,
        some => relative(to_number(some), len),
    };
    if from >= to {
        Vec::new()
    } else {
        items[from..to].to_vec()
    }
}

fn parse_int(text: &str, radix: u32) -> f64 {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = if radix == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };
    let valid: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    let magnitude = valid
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = trimmed.as_bytes();
    while end < bytes.len() {
        let c = bytes[end] as char;
        let ok = match c {
            '0'..='9' => true,
            '+' | '-' => end == 0 || matches!(bytes[end - 1] as char, 'e' | 'E'),
            '.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            'e' | 'E' if !seen_exp && end > 0 => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        end += 1;
    }
    // Back off a dangling exponent or sign
    let mut candidate = &trimmed[..end];
    while !candidate.is_empty() && candidate.parse::<f64>().is_err() {
        candidate = &candidate[..candidate.len() - 1];
    }
    candidate.parse().unwrap_or(f64::NAN)
}

fn call(function: SafeFunction, args: Vec<Option<Value>>) -> Result<Option<Value>, EvalError> {
    use SafeFunction as F;

    let first = arg(&args, 0);
    let value = match function {
        F::Abs => number_value(to_number(first).abs()),
        F::Ceil => number_value(to_number(first).ceil()),
        F::Floor => number_value(to_number(first).floor()),
        F::Round => number_value((to_number(first) + 0.5).floor()),
        F::Sqrt => number_value(to_number(first).sqrt()),
        F::Pow => number_value(to_number(first).powf(to_number(arg(&args, 1)))),
        F::Min => number_value(numbers(&args).into_iter().fold(f64::INFINITY, f64::min)),
        F::Max => number_value(numbers(&args).into_iter().fold(f64::NEG_INFINITY, f64::max)),
        F::Add => number_value(numbers(&args).into_iter().sum()),
        F::Multiply => number_value(numbers(&args).into_iter().product()),
        F::Concat => Value::String(args.iter().map(to_display).collect()),

        F::Substring => {
            let chars: Vec<char> = string_arg(function, first)?.chars().collect();
            let clamp = |v: &Option<Value>| {
                let n = to_number(v);
                if n.is_nan() { 0 } else { n.max(0.0).min(chars.len() as f64) as usize }
            };
            let start = clamp(arg(&args, 1));
            let end = match arg(&args, 2) {
                None => chars.len(),
                some => clamp(some),
            };
            let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
            Value::String(chars[lo..hi].iter().collect())
        }
        F::ToLowerCase => Value::String(string_arg(function, first)?.to_lowercase()),
        F::ToUpperCase => Value::String(string_arg(function, first)?.to_uppercase()),
        F::Trim => Value::String(string_arg(function, first)?.trim().to_string()),
        F::Length => match first {
            Some(Value::String(s)) => Value::from(s.chars().count()),
            Some(Value::Array(items)) => Value::from(items.len()),
            Some(Value::Object(map)) => Value::from(map.len()),
            other => {
                return Err(EvalError::TypeMismatch {
                    function: function.name().to_string(),
                    expected: "string or array".to_string(),
                    found: kind(other).to_string(),
                })
            }
        },
        F::StartsWith => {
            let s = string_arg(function, first)?;
            Value::Bool(s.starts_with(&to_display(arg(&args, 1))))
        }
        F::EndsWith => {
            let s = string_arg(function, first)?;
            Value::Bool(s.ends_with(&to_display(arg(&args, 1))))
        }
        F::Includes => match first {
            Some(Value::Array(items)) => {
                let needle = arg(&args, 1);
                Value::Bool(items.iter().any(|item| strict_equals(&Some(item.clone()), needle)))
            }
            other => Value::Bool(string_arg(function, other)?.contains(&to_display(arg(&args, 1)))),
        },
        F::ReplaceAll => {
            let s = string_arg(function, first)?;
            Value::String(s.replace(&to_display(arg(&args, 1)), &to_display(arg(&args, 2))))
        }
        F::IndexOf | F::LastIndexOf => {
            let needle = arg(&args, 1);
            let found = match first {
                Some(Value::Array(items)) => {
                    let matches = |item: &Value| strict_equals(&Some(item.clone()), needle);
                    if function == F::IndexOf {
                        items.iter().position(matches)
                    } else {
                        items.iter().rposition(matches)
                    }
                }
                other => {
                    let s = string_arg(function, other)?;
                    let n = to_display(needle);
                    let byte = if function == F::IndexOf { s.find(&n) } else { s.rfind(&n) };
                    byte.map(|b| s[..b].chars().count())
                }
            };
            found.map_or(Value::from(-1), Value::from)
        }
        F::Slice => match first {
            Some(Value::Array(items)) => Value::Array(js_slice(items, arg(&args, 1), arg(&args, 2))),
            other => {
                let chars: Vec<char> = string_arg(function, other)?.chars().collect();
                Value::String(js_slice(&chars, arg(&args, 1), arg(&args, 2)).into_iter().collect())
            }
        },

        F::ToString => Value::String(to_display(first)),
        F::ToNumber => number_value(to_number(first)),
        F::ToBoolean => Value::Bool(truthy(first)),
        F::ParseInt => {
            let radix = match arg(&args, 1) {
                None => 10,
                some => to_number(some) as u32,
            };
            if !(2..=36).contains(&radix) {
                Value::Null
            } else {
                number_value(parse_int(&to_display(first), radix))
            }
        }
        F::ParseFloat => number_value(parse_float(&to_display(first))),
        F::ToFixed => {
            let digits = to_number(arg(&args, 1)).max(0.0).min(100.0) as usize;
            Value::String(format!("{:.*}", digits, to_number(first)))
        }
        F::IsNull => Value::Bool(matches!(first, Some(Value::Null))),
        F::IsUndefined => Value::Bool(first.is_none()),
        F::IsNumber => Value::Bool(matches!(first, Some(Value::Number(_)))),
        F::IsString => Value::Bool(matches!(first, Some(Value::String(_)))),
        F::IsArray => Value::Bool(matches!(first, Some(Value::Array(_)))),
        F::IsObject => Value::Bool(matches!(first, Some(Value::Object(_)))),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eval_with(src: &str, vars: Value) -> Result<Value, EvalError> {
        let expr = parse_expression(src).unwrap();
        let vars = match vars {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Evaluator::with_variables(vars).evaluate(&expr)
    }

    fn eval(src: &str) -> Value {
        eval_with(src, json!({})).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), json!(7));
        assert_eq!(eval("(1 + 2) * 3"), json!(9));
        assert_eq!(eval("10 % 3"), json!(1));
        assert_eq!(eval("7 / 2"), json!(3.5));
        assert_eq!(eval("-5 + 2"), json!(-3));
        assert_eq!(eval("'a' + 1"), json!("a1"));
    }

    #[test]
    fn test_division_by_zero_is_null() {
        assert_eq!(eval("10 / 0"), Value::Null);
    }

    #[test]
    fn test_variables_and_paths() {
        let vars = json!({"data": {"price": "42.5", "items": [{"qty": 2}, {"qty": 3}]}});
        assert_eq!(eval_with("toNumber(data.price) * 2", vars.clone()).unwrap(), json!(85));
        assert_eq!(eval_with("data.items[1].qty", vars.clone()).unwrap(), json!(3));
        assert_eq!(eval_with("data.items.length", vars.clone()).unwrap(), json!(2));
        assert_eq!(eval_with("data.missing", vars).unwrap(), Value::Null);
    }

    #[test]
    fn test_undefined_variable() {
        let err = eval_with("missing + 1", json!({})).unwrap_err();
        assert_eq!(err, EvalError::UndefinedVariable("missing".to_string()));
        assert!(err.to_string().contains("undefined variable"));
    }

    #[test]
    fn test_property_access_on_null() {
        let err = eval_with("data.price", json!({"data": null})).unwrap_err();
        assert!(err.to_string().contains("cannot access property"));
        let err = eval_with("data[0]", json!({"data": null})).unwrap_err();
        assert!(err.to_string().contains("cannot access index"));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        // The right side would fail if evaluated
        assert_eq!(eval_with("false && missing", json!({})).unwrap(), json!(false));
        assert_eq!(eval_with("true || missing", json!({})).unwrap(), json!(true));
        assert_eq!(eval_with("1 ?? missing", json!({})).unwrap(), json!(1));
        assert_eq!(eval("null ?? 'fallback'"), json!("fallback"));
        assert_eq!(eval("0 ?? 5"), json!(0));
        assert_eq!(eval("0 || 5"), json!(5));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("1 < 2"), json!(true));
        assert_eq!(eval("'b' > 'a'"), json!(true));
        assert_eq!(eval("1 == '1'"), json!(true));
        assert_eq!(eval("1 === '1'"), json!(false));
        assert_eq!(eval("null == undefined"), json!(true));
        assert_eq!(eval("null === undefined"), json!(false));
    }

    #[test]
    fn test_conditional() {
        assert_eq!(
            eval_with("side == 'buy' ? 1 : -1", json!({"side": "sell"})).unwrap(),
            json!(-1)
        );
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(eval("abs(-3)"), json!(3));
        assert_eq!(eval("round(2.5)"), json!(3));
        assert_eq!(eval("floor(2.7)"), json!(2));
        assert_eq!(eval("min(4, 2, 8)"), json!(2));
        assert_eq!(eval("max([1, 9, 3])"), json!(9));
        assert_eq!(eval("add(1, 2, 3)"), json!(6));
        assert_eq!(eval("multiply(2, 3, 4)"), json!(24));
        assert_eq!(eval("pow(2, 10)"), json!(1024));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval("toUpperCase('btc')"), json!("BTC"));
        assert_eq!(eval("concat('BTC', '/', 'USDT')"), json!("BTC/USDT"));
        assert_eq!(eval("substring('exchange', 0, 4)"), json!("exch"));
        assert_eq!(eval("slice('BTCUSDT', -4)"), json!("USDT"));
        assert_eq!(eval("replaceAll('a-b-c', '-', '_')"), json!("a_b_c"));
        assert_eq!(eval("indexOf('hello', 'l')"), json!(2));
        assert_eq!(eval("lastIndexOf('hello', 'l')"), json!(3));
        assert_eq!(eval("includes('BTC-PERP', 'PERP')"), json!(true));
        assert_eq!(eval("length('abc')"), json!(3));
    }

    #[test]
    fn test_number_to_string_conversion() {
        assert_eq!(eval("'' + 100000000000000000000"), json!("100000000000000000000"));
        assert_eq!(eval("'' + 9007199254740993"), json!("9007199254740992"));
        assert_eq!(eval("'' + 1000000000000000000000"), json!("1e+21"));
        assert_eq!(eval("'' + 0.0000001"), json!("1e-7"));
        assert_eq!(eval("'' + 2.5"), json!("2.5"));
        assert_eq!(eval("'' + -42"), json!("-42"));
    }

    #[test]
    fn test_type_functions() {
        assert_eq!(eval("parseInt('42px')"), json!(42));
        assert_eq!(eval("parseInt('ff', 16)"), json!(255));
        assert_eq!(eval("parseInt('3.99')"), json!(3));
        assert_eq!(eval("parseFloat('3.14abc')"), json!(3.14));
        assert_eq!(eval("toFixed(3.14159, 2)"), json!("3.14"));
        assert_eq!(eval("toString(12)"), json!("12"));
        assert_eq!(eval("toBoolean('')"), json!(false));
        assert_eq!(eval("isNull(null)"), json!(true));
        assert_eq!(eval("isUndefined(undefined)"), json!(true));
        assert_eq!(eval("isArray([1])"), json!(true));
        assert_eq!(eval("isObject([1])"), json!(false));
    }

    #[test]
    fn test_forbidden_index_at_runtime() {
        let err = eval_with("data[key]", json!({"data": {}, "key": "__proto__"})).unwrap_err();
        assert_eq!(err, EvalError::Forbidden("__proto__".to_string()));
    }

    #[test]
    fn test_depth_limit() {
        let expr = parse_expression("1 + (2 + (3 + (4 + 5)))").unwrap();
        let err = Evaluator::new().with_max_depth(2).evaluate(&expr).unwrap_err();
        assert_eq!(err, EvalError::DepthExceeded(2));
    }
}
