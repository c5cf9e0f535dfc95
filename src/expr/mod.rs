//! Safe expression sub-language
//!
//! Expressions appear in `compute:` and `requiredIf:` entries and as lambda
//! bodies of array operations. They are parsed into
//! [`edl_types::ComputeExpression`], checked for scope by the parser, lowered
//! to target code by the generator, and can be evaluated here for testing
//! mappings against sample payloads.
//!
//! There is no assignment, no user-defined function and no access to
//! `constructor`, `prototype` or `__proto__`.

mod array;
mod eval;
mod parser;

use std::collections::BTreeSet;

use edl_types::{ArrayOperation, ComputeExpression, LambdaBody};

pub use array::slice_indices;
pub use eval::Evaluator;
pub use parser::{parse_expression, parse_expression_with_depth};

/// Evaluate `op` against the evaluator's variables
pub fn evaluate_array_operation(
    op: &ArrayOperation,
    evaluator: &Evaluator,
) -> Result<serde_json::Value, crate::error::EvalError> {
    evaluator.evaluate_operation(op)
}

/// Identifiers an expression reads, excluding member property names
pub fn free_identifiers(expr: &ComputeExpression) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_identifiers(expr, &mut names);
    names
}

fn collect_identifiers(expr: &ComputeExpression, names: &mut BTreeSet<String>) {
    match expr {
        ComputeExpression::Literal { .. } => {}
        ComputeExpression::Identifier { name } => {
            names.insert(name.clone());
        }
        ComputeExpression::Member { object, .. } => collect_identifiers(object, names),
        ComputeExpression::Index { object, index } => {
            collect_identifiers(object, names);
            collect_identifiers(index, names);
        }
        ComputeExpression::Unary { operand, .. } => collect_identifiers(operand, names),
        ComputeExpression::Binary { left, right, .. } => {
            collect_identifiers(left, names);
            collect_identifiers(right, names);
        }
        ComputeExpression::Conditional {
            test,
            consequent,
            alternate,
        } => {
            collect_identifiers(test, names);
            collect_identifiers(consequent, names);
            collect_identifiers(alternate, names);
        }
        ComputeExpression::Call { args, .. } => {
            for arg in args {
                collect_identifiers(arg, names);
            }
        }
        ComputeExpression::Array { elements } => {
            for element in elements {
                collect_identifiers(element, names);
            }
        }
    }
}

/// Identifiers an array operation reads from its enclosing scope.
///
/// Lambda params are bound only inside their own body, so a param name used
/// after the operation counts as free again.
pub fn operation_free_identifiers(op: &ArrayOperation) -> BTreeSet<String> {
    let mut names = free_identifiers(op.array());
    if let ArrayOperation::Reduce(reduce) = op {
        if let Some(initial) = &reduce.initial {
            names.extend(free_identifiers(initial));
        }
    }
    if let Some(lambda) = op.lambda() {
        let body = match &lambda.body {
            LambdaBody::Expression { expr } => free_identifiers(expr),
            LambdaBody::Operation { operation } => operation_free_identifiers(operation),
        };
        names.extend(body.into_iter().filter(|n| !lambda.params.contains(n)));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use edl_types::{LambdaExpression, MapOperation, SourceLocation};

    #[test]
    fn test_free_identifiers_skip_properties() {
        let expr = parse_expression("data.price * qty + max(fee, data.fee)").unwrap();
        let names: Vec<_> = free_identifiers(&expr).into_iter().collect();
        assert_eq!(names, vec!["data", "fee", "qty"]);
    }

    #[test]
    fn test_operation_free_identifiers_exclude_lambda_params() {
        let op = ArrayOperation::Map(MapOperation {
            array: parse_expression("data.trades").unwrap(),
            transform: LambdaExpression::new(
                vec!["t".to_string()],
                parse_expression("t.price * multiplier").unwrap(),
            ),
            location: SourceLocation::unknown(),
        });
        let names: Vec<_> = operation_free_identifiers(&op).into_iter().collect();
        assert_eq!(names, vec!["data", "multiplier"]);
    }
}
