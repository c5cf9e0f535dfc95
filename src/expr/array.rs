//! Array-operation interpreter: map, filter, reduce, slice and flatMap.

use serde_json::Value;

use edl_types::{ArrayOperation, LambdaBody, LambdaExpression};

use super::eval::{kind, truthy, Evaluator, Locals};
use crate::error::EvalError;

/// Python slice semantics: indices of `len` elements selected by `start:end:step`
pub fn slice_indices(
    len: usize,
    start: Option<i64>,
    end: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, EvalError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::ZeroStep);
    }
    let len = len as i64;
    let resolve = |index: i64, lower: i64, upper: i64| {
        let index = if index < 0 { index + len } else { index };
        index.clamp(lower, upper)
    };

    let mut indices = Vec::new();
    if step > 0 {
        let from = start.map_or(0, |s| resolve(s, 0, len));
        let to = end.map_or(len, |e| resolve(e, 0, len));
        let mut i = from;
        while i < to {
            indices.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    } else {
        let from = start.map_or(len - 1, |s| resolve(s, -1, len - 1));
        let to = end.map_or(-1, |e| resolve(e, -1, len - 1));
        let mut i = from;
        while i > to {
            indices.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }
    Ok(indices)
}

impl Evaluator {
    pub(super) fn apply_operation(
        &self,
        op: &ArrayOperation,
        locals: &mut Locals,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let items = match self.eval(op.array(), locals, depth)? {
            Some(Value::Array(items)) => items,
            other => {
                return Err(EvalError::ExpectedArray {
                    operation: op.name().to_string(),
                    found: kind(&other).to_string(),
                })
            }
        };

        match op {
            ArrayOperation::Map(map) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.apply_lambda(&map.transform, &[item, Value::from(i)], locals, depth)?);
                }
                Ok(Value::Array(out))
            }
            ArrayOperation::Filter(filter) => {
                let mut out = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    let keep = self.apply_lambda(
                        &filter.predicate,
                        &[item.clone(), Value::from(i)],
                        locals,
                        depth,
                    )?;
                    if truthy(&Some(keep)) {
                        out.push(item);
                    }
                }
                Ok(Value::Array(out))
            }
            ArrayOperation::Reduce(reduce) => {
                let mut iter = items.into_iter().enumerate();
                let mut acc = match &reduce.initial {
                    Some(initial) => self.eval(initial, locals, depth)?.unwrap_or(Value::Null),
                    None => match iter.next() {
                        Some((_, first)) => first,
                        None => return Err(EvalError::EmptyReduce),
                    },
                };
                for (i, item) in iter {
                    acc = self.apply_lambda(&reduce.reducer, &[acc, item, Value::from(i)], locals, depth)?;
                }
                Ok(acc)
            }
            ArrayOperation::Slice(slice) => {
                let indices = slice_indices(items.len(), slice.start, slice.end, slice.step)?;
                Ok(Value::Array(indices.into_iter().map(|i| items[i].clone()).collect()))
            }
            ArrayOperation::FlatMap(flat_map) => {
                let mut out = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    match self.apply_lambda(&flat_map.transform, &[item, Value::from(i)], locals, depth)? {
                        Value::Array(inner) => out.extend(inner),
                        other => out.push(other),
                    }
                }
                Ok(Value::Array(out))
            }
        }
    }

    /// Bind `args` to the lambda's params, evaluate, then unbind
    fn apply_lambda(
        &self,
        lambda: &LambdaExpression,
        args: &[Value],
        locals: &mut Locals,
        depth: usize,
    ) -> Result<Value, EvalError> {
        if lambda.params.is_empty() || lambda.params.len() > args.len() {
            return Err(EvalError::LambdaArity {
                expected: args.len(),
                found: lambda.params.len(),
            });
        }
        let mark = locals.len();
        locals.extend(
            lambda
                .params
                .iter()
                .zip(args.iter())
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        let result = match &lambda.body {
            LambdaBody::Expression { expr } => self
                .eval(expr, locals, depth + 1)
                .map(|v| v.unwrap_or(Value::Null)),
            LambdaBody::Operation { operation } => self.apply_operation(operation, locals, depth + 1),
        };
        locals.truncate(mark);
        result
    }
}
