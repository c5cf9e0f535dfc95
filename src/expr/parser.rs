//! nom parser for the safe expression language.
//!
//! Parsing happens in two steps. The nom grammar accepts any identifier in
//! call position and produces a private syntax tree; [`lower`] then resolves
//! calls against the [`SafeFunction`] whitelist, checks arity and rejects
//! forbidden names. Keeping the whitelist out of the grammar lets the error say
//! which function was refused instead of "unexpected input".
//!
//! ```text
//! expression := coalesce ( '?' expression ':' expression )?
//! binary     := unary ( op unary )*          precedence climbing
//! unary      := ('!' | '-') unary | postfix
//! postfix    := primary ( '.' ident | '[' expression ']' )*
//! primary    := number | string | keyword | ident ( '(' args ')' )?
//!             | '(' expression ')' | '[' elements ']'
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, cut, map, opt, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError as NomParseError, VerboseError, VerboseErrorKind},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use edl_types::expr::{FORBIDDEN_IDENTIFIERS, MAX_EXPRESSION_DEPTH};
use edl_types::{BinaryOp, ComputeExpression, Literal, SafeFunction, UnaryOp};

use crate::error::ExprError;

// ============================================================================
// Public API
// ============================================================================

/// Parse a safe expression with the default nesting limit
pub fn parse_expression(source: &str) -> Result<ComputeExpression, ExprError> {
    parse_expression_with_depth(source, MAX_EXPRESSION_DEPTH)
}

/// Parse a safe expression rejecting bracket nesting deeper than `max_depth`
pub fn parse_expression_with_depth(
    source: &str,
    max_depth: usize,
) -> Result<ComputeExpression, ExprError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(ExprError::Empty);
    }
    if nesting_depth(trimmed) > max_depth {
        return Err(ExprError::DepthExceeded(max_depth));
    }

    match all_consuming(delimited(
        multispace0,
        expression::<VerboseError<&str>>,
        multispace0,
    ))(trimmed)
    {
        Ok((_, node)) => lower(node),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(trimmed, e)),
        Err(nom::Err::Incomplete(_)) => Err(ExprError::Syntax {
            offset: trimmed.len(),
            message: "incomplete input".to_string(),
        }),
    }
}

fn syntax_error(input: &str, e: VerboseError<&str>) -> ExprError {
    let offset = e
        .errors
        .first()
        .map(|(rest, _)| input.len() - rest.len())
        .unwrap_or(0);
    let expected = e.errors.iter().find_map(|(_, kind)| match kind {
        VerboseErrorKind::Context(ctx) => Some(format!("expected {}", ctx)),
        VerboseErrorKind::Char(c) => Some(format!("expected '{}'", c)),
        VerboseErrorKind::Nom(_) => None,
    });
    let near: String = input[offset..].chars().take(12).collect();
    let message = match (expected, near.is_empty()) {
        (Some(expected), true) => format!("{} at end of input", expected),
        (Some(expected), false) => format!("{} near '{}'", expected, near),
        (None, true) => "unexpected end of input".to_string(),
        (None, false) => format!("unexpected input near '{}'", near),
    };
    ExprError::Syntax { offset, message }
}

/// Upper bound on the depth of the tree `source` parses into.
///
/// Brackets open a level. Prefix `!`/`-` and every operator or suffix in a
/// chain nest one deeper within their level, so `!!!x` and `a + b + c` count
/// like brackets do. Computed on the raw text so the recursive descent never
/// starts on input it cannot finish.
fn nesting_depth(source: &str) -> usize {
    let mut levels: Vec<usize> = vec![0];
    let mut max = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_operator = false;
    for c in source.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            continue;
        }
        let operator_char = matches!(
            c,
            '+' | '*' | '/' | '%' | '<' | '>' | '=' | '&' | '|' | '?' | '.'
        );
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => levels.push(0),
            '[' => {
                // index suffix on the current level, then its own level
                if let Some(level) = levels.last_mut() {
                    *level += 1;
                }
                levels.push(0);
            }
            ')' | ']' => {
                if levels.len() > 1 {
                    levels.pop();
                }
            }
            '!' | '-' => {
                if let Some(level) = levels.last_mut() {
                    *level += 1;
                }
            }
            _ if operator_char && !in_operator => {
                if let Some(level) = levels.last_mut() {
                    *level += 1;
                }
            }
            _ => {}
        }
        in_operator = operator_char;
        let depth = levels.len() - 1 + levels.iter().sum::<usize>();
        max = max.max(depth);
    }
    max
}

// ============================================================================
// Syntax tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Lit(Literal),
    Ident(String),
    Member(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Cond(Box<Node>, Box<Node>, Box<Node>),
    Call(String, Vec<Node>),
    Array(Vec<Node>),
}

fn check_name(name: &str) -> Result<(), ExprError> {
    if FORBIDDEN_IDENTIFIERS.contains(&name) {
        Err(ExprError::Forbidden(name.to_string()))
    } else {
        Ok(())
    }
}

/// Resolve calls and reject forbidden names
fn lower(node: Node) -> Result<ComputeExpression, ExprError> {
    Ok(match node {
        Node::Lit(value) => ComputeExpression::Literal { value },
        Node::Ident(name) => {
            check_name(&name)?;
            ComputeExpression::Identifier { name }
        }
        Node::Member(object, property) => {
            check_name(&property)?;
            ComputeExpression::Member {
                object: Box::new(lower(*object)?),
                property,
            }
        }
        Node::Index(object, index) => {
            if let Node::Lit(Literal::String(key)) = index.as_ref() {
                check_name(key)?;
            }
            ComputeExpression::Index {
                object: Box::new(lower(*object)?),
                index: Box::new(lower(*index)?),
            }
        }
        Node::Unary(UnaryOp::Neg, operand) => match *operand {
            Node::Lit(Literal::Number(n)) => ComputeExpression::Literal {
                value: Literal::Number(-n),
            },
            other => ComputeExpression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(lower(other)?),
            },
        },
        Node::Unary(op, operand) => ComputeExpression::Unary {
            op,
            operand: Box::new(lower(*operand)?),
        },
        Node::Binary(op, left, right) => ComputeExpression::Binary {
            op,
            left: Box::new(lower(*left)?),
            right: Box::new(lower(*right)?),
        },
        Node::Cond(test, consequent, alternate) => ComputeExpression::Conditional {
            test: Box::new(lower(*test)?),
            consequent: Box::new(lower(*consequent)?),
            alternate: Box::new(lower(*alternate)?),
        },
        Node::Call(name, args) => {
            check_name(&name)?;
            let function =
                SafeFunction::from_name(&name).ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            let (min, max) = function.arity();
            if args.len() < min || max.map_or(false, |max| args.len() > max) {
                let expected = match max {
                    Some(max) if max == min => min.to_string(),
                    Some(max) => format!("{}-{}", min, max),
                    None => format!("at least {}", min),
                };
                return Err(ExprError::Arity {
                    function: name,
                    expected,
                    found: args.len(),
                });
            }
            ComputeExpression::Call {
                function,
                args: args.into_iter().map(lower).collect::<Result<_, _>>()?,
            }
        }
        Node::Array(elements) => ComputeExpression::Array {
            elements: elements.into_iter().map(lower).collect::<Result<_, _>>()?,
        },
    })
}

// ============================================================================
// Grammar
// ============================================================================

fn ws<'a, O, E: NomParseError<&'a str>, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

fn expression<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Node, E> {
    let (input, test) = binary(input, 0)?;
    let (input, branches) = opt(pair(
        preceded(ws(char('?')), cut(expression)),
        preceded(
            cut(context("':' of conditional", ws(char(':')))),
            cut(expression),
        ),
    ))(input)?;
    match branches {
        Some((consequent, alternate)) => Ok((
            input,
            Node::Cond(Box::new(test), Box::new(consequent), Box::new(alternate)),
        )),
        None => Ok((input, test)),
    }
}

fn binary_op<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, BinaryOp, E> {
    alt((
        value(BinaryOp::StrictEq, tag("===")),
        value(BinaryOp::StrictNe, tag("!==")),
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::And, tag("&&")),
        value(BinaryOp::Or, tag("||")),
        value(BinaryOp::Coalesce, tag("??")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Add, tag("+")),
        value(BinaryOp::Sub, tag("-")),
        value(BinaryOp::Mul, tag("*")),
        value(BinaryOp::Div, tag("/")),
        value(BinaryOp::Mod, tag("%")),
    ))(input)
}

/// Precedence climbing over left-associative binary operators
fn binary<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    min_prec: u8,
) -> IResult<&'a str, Node, E> {
    let (mut input, mut lhs) = unary(input)?;
    loop {
        let (rest, op) = match preceded(multispace0, binary_op::<E>)(input) {
            Ok(found) => found,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        };
        let prec = op.precedence();
        if prec < min_prec {
            break;
        }
        let (rest, rhs) = cut(context("operand", |i| binary::<E>(i, prec + 1)))(rest)?;
        lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        input = rest;
    }
    Ok((input, lhs))
}

fn unary<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Node, E> {
    preceded(
        multispace0,
        alt((
            map(preceded(char('!'), cut(unary)), |n| {
                Node::Unary(UnaryOp::Not, Box::new(n))
            }),
            map(preceded(char('-'), cut(unary)), |n| {
                Node::Unary(UnaryOp::Neg, Box::new(n))
            }),
            postfix,
        )),
    )(input)
}

enum Suffix {
    Member(String),
    Index(Node),
}

fn postfix<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Node, E> {
    let (mut input, mut node) = primary(input)?;
    loop {
        let suffix = alt((
            map(
                preceded(ws(char('.')), cut(context("property name", identifier))),
                |name: &str| Suffix::Member(name.to_string()),
            ),
            map(
                delimited(
                    ws(char('[')),
                    cut(expression),
                    cut(context("closing bracket", ws(char(']')))),
                ),
                Suffix::Index,
            ),
        ))(input);
        match suffix {
            Ok((rest, Suffix::Member(name))) => {
                node = Node::Member(Box::new(node), name);
                input = rest;
            }
            Ok((rest, Suffix::Index(index))) => {
                node = Node::Index(Box::new(node), Box::new(index));
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, node))
}

fn primary<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Node, E> {
    context(
        "value",
        alt((
            map(number, |n| Node::Lit(Literal::Number(n))),
            map(string_literal, |s| Node::Lit(Literal::String(s))),
            name_or_call,
            delimited(
                char('('),
                cut(ws(expression)),
                cut(context("closing parenthesis", char(')'))),
            ),
            map(
                delimited(
                    char('['),
                    separated_list0(char(','), ws(expression)),
                    cut(context("closing bracket", preceded(multispace0, char(']')))),
                ),
                Node::Array,
            ),
        )),
    )(input)
}

fn name_or_call<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Node, E> {
    let (input, name) = identifier(input)?;
    match name {
        "true" => return Ok((input, Node::Lit(Literal::Bool(true)))),
        "false" => return Ok((input, Node::Lit(Literal::Bool(false)))),
        "null" => return Ok((input, Node::Lit(Literal::Null))),
        "undefined" => return Ok((input, Node::Lit(Literal::Undefined))),
        _ => {}
    }
    let (input, args) = opt(delimited(
        preceded(multispace0, char('(')),
        separated_list0(char(','), ws(expression)),
        cut(context("closing parenthesis", preceded(multispace0, char(')')))),
    ))(input)?;
    Ok((
        input,
        match args {
            Some(args) => Node::Call(name.to_string(), args),
            None => Node::Ident(name.to_string()),
        },
    ))
}

fn identifier<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn number<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, f64, E> {
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Float))),
    }
}

/// Single- or double-quoted string with `\n \r \t \\ \' \"` escapes
fn string_literal<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, String, E> {
    let (body, quote) = one_of("\"'")(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c if c == quote => return Ok((&body[idx + c.len_utf8()..], out)),
            c => out.push(c),
        }
    }
    Err(nom::Err::Failure(E::add_context(
        input,
        "closing quote",
        E::from_error_kind(input, ErrorKind::Char),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> ComputeExpression {
        ComputeExpression::identifier(name)
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            ComputeExpression::Binary {
                op: BinaryOp::Add,
                left: Box::new(ComputeExpression::number(1.0)),
                right: Box::new(ComputeExpression::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(ComputeExpression::number(2.0)),
                    right: Box::new(ComputeExpression::number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_member_index_and_call() {
        let expr = parse_expression("toNumber(data.items[0].price)").unwrap();
        match expr {
            ComputeExpression::Call { function, args } => {
                assert_eq!(function, SafeFunction::ToNumber);
                assert_eq!(args.len(), 1);
                match &args[0] {
                    ComputeExpression::Member { property, .. } => assert_eq!(property, "price"),
                    other => panic!("expected member access, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_ternary_is_right_associative() {
        let expr = parse_expression("a ? 1 : b ? 2 : 3").unwrap();
        match expr {
            ComputeExpression::Conditional { test, alternate, .. } => {
                assert_eq!(*test, ident("a"));
                assert!(matches!(*alternate, ComputeExpression::Conditional { .. }));
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse_expression("'it\\'s'").unwrap(),
            ComputeExpression::string("it's")
        );
        assert_eq!(parse_expression("\"\"").unwrap(), ComputeExpression::string(""));
        assert_eq!(parse_expression("-5").unwrap(), ComputeExpression::number(-5.0));
        assert_eq!(
            parse_expression("undefined").unwrap(),
            ComputeExpression::Literal {
                value: Literal::Undefined
            }
        );
        assert_eq!(parse_expression("trueValue").unwrap(), ident("trueValue"));
    }

    #[test]
    fn test_coalesce_chain() {
        let expr = parse_expression("x ?? y ?? 100").unwrap();
        assert!(matches!(
            expr,
            ComputeExpression::Binary {
                op: BinaryOp::Coalesce,
                ..
            }
        ));
    }

    #[test]
    fn test_forbidden_names_rejected() {
        for src in ["obj.constructor", "obj.prototype", "obj.__proto__", "obj[\"constructor\"]", "constructor"] {
            let err = parse_expression(src).unwrap_err();
            assert!(err.to_string().contains("not allowed"), "{}: {}", src, err);
        }
    }

    #[test]
    fn test_unknown_function_rejected() {
        assert_eq!(
            parse_expression("eval('1')").unwrap_err(),
            ExprError::UnknownFunction("eval".to_string())
        );
    }

    #[test]
    fn test_arity_checked() {
        let err = parse_expression("pow(2)").unwrap_err();
        assert!(matches!(err, ExprError::Arity { found: 1, .. }));
        assert!(parse_expression("min(1, 2, 3, 4)").is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let deep = "((((((((((1 + 1) + 1) + 1) + 1) + 1) + 1) + 1) + 1) + 1) + 1)";
        assert_eq!(
            parse_expression_with_depth(deep, 5).unwrap_err(),
            ExprError::DepthExceeded(5)
        );
        assert!(parse_expression_with_depth("(1 + (2 * (3 + (4 - 5))))", 100).is_ok());
    }

    #[test]
    fn test_prefix_chain_hits_depth_limit() {
        let nots = format!("{}data", "!".repeat(10_000));
        assert_eq!(
            parse_expression(&nots).unwrap_err(),
            ExprError::DepthExceeded(MAX_EXPRESSION_DEPTH)
        );
        let negs = format!("{}1", "- ".repeat(10_000));
        assert_eq!(
            parse_expression(&negs).unwrap_err(),
            ExprError::DepthExceeded(MAX_EXPRESSION_DEPTH)
        );
        assert!(parse_expression("!!ok && -(-x) > 0").is_ok());
    }

    #[test]
    fn test_long_operator_chain_hits_depth_limit() {
        let chain = vec!["a"; 5_000].join(" + ");
        assert_eq!(
            parse_expression(&chain).unwrap_err(),
            ExprError::DepthExceeded(MAX_EXPRESSION_DEPTH)
        );
        let members = format!("data{}", ".x".repeat(5_000));
        assert!(matches!(
            parse_expression(&members).unwrap_err(),
            ExprError::DepthExceeded(_)
        ));
        assert!(parse_expression("a.b.c + d.e * f - g / 2").is_ok());
    }

    #[test]
    fn test_operators_inside_strings_do_not_count() {
        let text = format!("'{}' + x", "!".repeat(500));
        assert!(parse_expression(&text).is_ok());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_expression("1 +").unwrap_err(),
            ExprError::Syntax { .. }
        ));
        assert!(matches!(
            parse_expression("(1 + 2").unwrap_err(),
            ExprError::Syntax { .. }
        ));
        assert!(matches!(
            parse_expression("a = 1").unwrap_err(),
            ExprError::Syntax { .. }
        ));
        assert_eq!(parse_expression("   ").unwrap_err(), ExprError::Empty);
    }
}
