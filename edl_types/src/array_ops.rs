//! Array-iteration operations used in response mappings
//!
//! Each operation takes an input array expression and, except `slice`, a lambda
//! built from the safe expression language.

use serde::{Deserialize, Serialize};

use crate::expr::{ComputeExpression, LambdaExpression};
use crate::location::SourceLocation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ArrayOperation {
    Map(MapOperation),
    Filter(FilterOperation),
    Reduce(ReduceOperation),
    Slice(SliceOperation),
    FlatMap(FlatMapOperation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOperation {
    pub array: ComputeExpression,
    pub transform: LambdaExpression,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOperation {
    pub array: ComputeExpression,
    pub predicate: LambdaExpression,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceOperation {
    pub array: ComputeExpression,
    /// Lambda over `(accumulator, item)`
    pub reducer: LambdaExpression,
    /// Without an initial value the first element seeds the accumulator
    pub initial: Option<ComputeExpression>,
    pub location: SourceLocation,
}

/// Python-style slice: negative indices count from the end, step may be negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceOperation {
    pub array: ComputeExpression,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step: Option<i64>,
    pub location: SourceLocation,
}

/// Map followed by a one-level flatten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatMapOperation {
    pub array: ComputeExpression,
    pub transform: LambdaExpression,
    pub location: SourceLocation,
}

impl ArrayOperation {
    pub fn name(&self) -> &'static str {
        match self {
            ArrayOperation::Map(_) => "map",
            ArrayOperation::Filter(_) => "filter",
            ArrayOperation::Reduce(_) => "reduce",
            ArrayOperation::Slice(_) => "slice",
            ArrayOperation::FlatMap(_) => "flatMap",
        }
    }

    pub fn array(&self) -> &ComputeExpression {
        match self {
            ArrayOperation::Map(op) => &op.array,
            ArrayOperation::Filter(op) => &op.array,
            ArrayOperation::Reduce(op) => &op.array,
            ArrayOperation::Slice(op) => &op.array,
            ArrayOperation::FlatMap(op) => &op.array,
        }
    }

    pub fn lambda(&self) -> Option<&LambdaExpression> {
        match self {
            ArrayOperation::Map(op) => Some(&op.transform),
            ArrayOperation::Filter(op) => Some(&op.predicate),
            ArrayOperation::Reduce(op) => Some(&op.reducer),
            ArrayOperation::Slice(_) => None,
            ArrayOperation::FlatMap(op) => Some(&op.transform),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            ArrayOperation::Map(op) => &op.location,
            ArrayOperation::Filter(op) => &op.location,
            ArrayOperation::Reduce(op) => &op.location,
            ArrayOperation::Slice(op) => &op.location,
            ArrayOperation::FlatMap(op) => &op.location,
        }
    }
}
