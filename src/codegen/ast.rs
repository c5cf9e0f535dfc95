//! Code AST for the generated TypeScript module.
//!
//! A closed set of declarations, statements and expressions: enough for a class
//! skeleton, method bodies and the literal tables of `describe()`. The emitter
//! is the only consumer.

// =============================================================================
// FILE AND DECLARATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TsFile {
    pub header: Vec<String>,
    pub imports: Vec<Import>,
    pub class: ClassDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub names: Vec<String>,
    pub from: String,
    pub type_only: bool,
}

impl Import {
    pub fn new(names: &[&str], from: &str) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            from: from.to_string(),
            type_only: false,
        }
    }

    pub fn types(names: &[&str], from: &str) -> Self {
        Self {
            type_only: true,
            ..Self::new(names, from)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub extends: Option<String>,
    pub methods: Vec<MethodDecl>,
}

/// JSDoc block: description lines, then `@param` / `@returns` tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsDoc {
    pub description: Vec<String>,
    pub params: Vec<(String, String, Option<String>)>,
    pub returns: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub is_async: bool,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Stmt>,
    pub doc: Option<JsDoc>,
    /// Source comments emitted as `//` lines above the method
    pub comments: Vec<String>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_async: false,
            params: Vec::new(),
            return_type: None,
            body: Vec::new(),
            doc: None,
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<String>,
    pub default: Option<Expr>,
}

impl Param {
    pub fn typed(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty.into()),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

// =============================================================================
// STATEMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Const {
        name: String,
        ty: Option<String>,
        value: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Expr(Expr),
    If {
        test: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Comment(String),
}

impl Stmt {
    pub fn constant(name: &str, ty: Option<&str>, value: Expr) -> Self {
        Stmt::Const {
            name: name.to_string(),
            ty: ty.map(str::to_string),
            value,
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    This,
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
    Array(Vec<Expr>),
    /// Keys are always emitted quoted
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Spread(Box<Expr>),
    Await(Box<Expr>),
    /// Prefix operator: `-`, `!`, `typeof`
    Unary {
        op: &'static str,
        operand: Box<Expr>,
    },
    Binary {
        op: &'static str,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Arrow {
        params: Vec<Param>,
        body: ArrowBody,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    pub fn member(self, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(self),
            property: property.into(),
            optional: false,
        }
    }

    pub fn index(self, index: Expr) -> Self {
        Expr::Index {
            object: Box::new(self),
            index: Box::new(index),
            optional: false,
        }
    }

    pub fn optional_index(self, index: Expr) -> Self {
        Expr::Index {
            object: Box::new(self),
            index: Box::new(index),
            optional: true,
        }
    }

    pub fn call(self, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(self),
            args,
        }
    }

    /// `this.<method>(args)`
    pub fn this_call(method: &str, args: Vec<Expr>) -> Self {
        Expr::This.member(method).call(args)
    }

    pub fn method_call(self, method: &str, args: Vec<Expr>) -> Self {
        self.member(method).call(args)
    }

    pub fn awaited(self) -> Self {
        Expr::Await(Box::new(self))
    }

    pub fn unary(op: &'static str, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: &'static str, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn conditional(test: Expr, consequent: Expr, alternate: Expr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }
    }

    /// Literal for a JSON value from the document
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Expr::Null,
            serde_json::Value::Bool(b) => Expr::Bool(*b),
            serde_json::Value::Number(n) => Expr::Num(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Expr::Str(s.clone()),
            serde_json::Value::Array(items) => Expr::Array(items.iter().map(Expr::from_json).collect()),
            serde_json::Value::Object(map) => Expr::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Expr::from_json(v)))
                    .collect(),
            ),
        }
    }
}
