//! Safe expression AST
//!
//! `compute` fields, `required_if` guards and array-operation bodies are written
//! in a small expression language. Its AST is a closed set of node kinds and
//! function calls can only target a [`SafeFunction`], so nothing in a document
//! can reach arbitrary code.

use serde::{Deserialize, Serialize};

use crate::array_ops::ArrayOperation;

/// Identifiers and property names that are never accepted
pub const FORBIDDEN_IDENTIFIERS: &[&str] = &["constructor", "prototype", "__proto__"];

/// Maximum nesting depth accepted by the expression parser and evaluator
pub const MAX_EXPRESSION_DEPTH: usize = 64;

// ============================================================================
// EXPRESSION NODES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
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

    /// Binding power, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Coalesce => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::StrictEq | BinaryOp::StrictNe => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 7,
        }
    }
}

/// A parsed safe expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputeExpression {
    Literal {
        value: Literal,
    },
    Identifier {
        name: String,
    },
    Member {
        object: Box<ComputeExpression>,
        property: String,
    },
    Index {
        object: Box<ComputeExpression>,
        index: Box<ComputeExpression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ComputeExpression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ComputeExpression>,
        right: Box<ComputeExpression>,
    },
    Conditional {
        test: Box<ComputeExpression>,
        consequent: Box<ComputeExpression>,
        alternate: Box<ComputeExpression>,
    },
    Call {
        function: SafeFunction,
        args: Vec<ComputeExpression>,
    },
    Array {
        elements: Vec<ComputeExpression>,
    },
}

impl ComputeExpression {
    pub fn identifier(name: impl Into<String>) -> Self {
        ComputeExpression::Identifier { name: name.into() }
    }

    pub fn number(value: f64) -> Self {
        ComputeExpression::Literal {
            value: Literal::Number(value),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        ComputeExpression::Literal {
            value: Literal::String(value.into()),
        }
    }

    /// Build `a.b.c` from a dotted path rooted at an identifier
    pub fn path(root: &str, segments: &[&str]) -> Self {
        segments
            .iter()
            .fold(Self::identifier(root), |object, segment| {
                ComputeExpression::Member {
                    object: Box::new(object),
                    property: (*segment).to_string(),
                }
            })
    }
}

/// Source text of an expression together with its parse, when it parsed.
///
/// The parser keeps the raw text so the linter can report expressions that
/// fail to parse; later stages only ever read `parsed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeExpression {
    pub source: String,
    pub parsed: Option<ComputeExpression>,
}

impl SafeExpression {
    pub fn new(source: impl Into<String>, parsed: Option<ComputeExpression>) -> Self {
        Self {
            source: source.into(),
            parsed,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }
}

// ============================================================================
// LAMBDAS
// ============================================================================

/// Body of an array-operation lambda: an expression, or a nested operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LambdaBody {
    Expression { expr: ComputeExpression },
    Operation { operation: Box<ArrayOperation> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpression {
    /// Parameters introduced into scope for the body
    pub params: Vec<String>,
    pub body: LambdaBody,
}

impl LambdaExpression {
    pub fn new(params: Vec<String>, expr: ComputeExpression) -> Self {
        Self {
            params,
            body: LambdaBody::Expression { expr },
        }
    }
}

// ============================================================================
// FUNCTION WHITELIST
// ============================================================================

/// The complete set of callable functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SafeFunction {
    // Math
    Abs,
    Ceil,
    Floor,
    Round,
    Min,
    Max,
    Pow,
    Sqrt,
    Add,
    Multiply,
    // String
    Concat,
    Substring,
    ToLowerCase,
    ToUpperCase,
    Trim,
    Length,
    StartsWith,
    EndsWith,
    Includes,
    ReplaceAll,
    IndexOf,
    LastIndexOf,
    Slice,
    // Type
    ToString,
    ToNumber,
    ToBoolean,
    ParseInt,
    ParseFloat,
    ToFixed,
    IsNull,
    IsUndefined,
    IsNumber,
    IsString,
    IsArray,
    IsObject,
}

impl SafeFunction {
    pub const ALL: &'static [SafeFunction] = &[
        SafeFunction::Abs,
        SafeFunction::Ceil,
        SafeFunction::Floor,
        SafeFunction::Round,
        SafeFunction::Min,
        SafeFunction::Max,
        SafeFunction::Pow,
        SafeFunction::Sqrt,
        SafeFunction::Add,
        SafeFunction::Multiply,
        SafeFunction::Concat,
        SafeFunction::Substring,
        SafeFunction::ToLowerCase,
        SafeFunction::ToUpperCase,
        SafeFunction::Trim,
        SafeFunction::Length,
        SafeFunction::StartsWith,
        SafeFunction::EndsWith,
        SafeFunction::Includes,
        SafeFunction::ReplaceAll,
        SafeFunction::IndexOf,
        SafeFunction::LastIndexOf,
        SafeFunction::Slice,
        SafeFunction::ToString,
        SafeFunction::ToNumber,
        SafeFunction::ToBoolean,
        SafeFunction::ParseInt,
        SafeFunction::ParseFloat,
        SafeFunction::ToFixed,
        SafeFunction::IsNull,
        SafeFunction::IsUndefined,
        SafeFunction::IsNumber,
        SafeFunction::IsString,
        SafeFunction::IsArray,
        SafeFunction::IsObject,
    ];

    /// Name as written in EDL source
    pub fn name(&self) -> &'static str {
        match self {
            SafeFunction::Abs => "abs",
            SafeFunction::Ceil => "ceil",
            SafeFunction::Floor => "floor",
            SafeFunction::Round => "round",
            SafeFunction::Min => "min",
            SafeFunction::Max => "max",
            SafeFunction::Pow => "pow",
            SafeFunction::Sqrt => "sqrt",
            SafeFunction::Add => "add",
            SafeFunction::Multiply => "multiply",
            SafeFunction::Concat => "concat",
            SafeFunction::Substring => "substring",
            SafeFunction::ToLowerCase => "toLowerCase",
            SafeFunction::ToUpperCase => "toUpperCase",
            SafeFunction::Trim => "trim",
            SafeFunction::Length => "length",
            SafeFunction::StartsWith => "startsWith",
            SafeFunction::EndsWith => "endsWith",
            SafeFunction::Includes => "includes",
            SafeFunction::ReplaceAll => "replaceAll",
            SafeFunction::IndexOf => "indexOf",
            SafeFunction::LastIndexOf => "lastIndexOf",
            SafeFunction::Slice => "slice",
            SafeFunction::ToString => "toString",
            SafeFunction::ToNumber => "toNumber",
            SafeFunction::ToBoolean => "toBoolean",
            SafeFunction::ParseInt => "parseInt",
            SafeFunction::ParseFloat => "parseFloat",
            SafeFunction::ToFixed => "toFixed",
            SafeFunction::IsNull => "isNull",
            SafeFunction::IsUndefined => "isUndefined",
            SafeFunction::IsNumber => "isNumber",
            SafeFunction::IsString => "isString",
            SafeFunction::IsArray => "isArray",
            SafeFunction::IsObject => "isObject",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Accepted argument count as `(min, max)`; `None` means variadic
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            SafeFunction::Min | SafeFunction::Max => (1, None),
            SafeFunction::Add | SafeFunction::Multiply => (1, None),
            SafeFunction::Concat => (1, None),
            SafeFunction::Pow
            | SafeFunction::StartsWith
            | SafeFunction::EndsWith
            | SafeFunction::Includes
            | SafeFunction::IndexOf
            | SafeFunction::LastIndexOf
            | SafeFunction::ToFixed => (2, Some(2)),
            SafeFunction::Substring | SafeFunction::Slice => (2, Some(3)),
            SafeFunction::ReplaceAll => (3, Some(3)),
            SafeFunction::ParseInt => (1, Some(2)),
            _ => (1, Some(1)),
        }
    }
}

impl std::fmt::Display for SafeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
