//! Pretty-printer for the code AST.
//!
//! Deterministic: 4-space indentation, `\n` line endings, single-quoted
//! strings, quoted object keys, and a trailing newline. Parentheses are
//! inserted from operator precedence only.

use super::ast::{ArrowBody, ClassDecl, Expr, Import, JsDoc, MethodDecl, Param, Stmt, TsFile};

const INDENT: &str = "    ";

/// Render a whole file
pub fn emit(file: &TsFile) -> String {
    let mut printer = Printer::default();
    for line in &file.header {
        printer.line_comment(line);
    }
    if !file.header.is_empty() {
        printer.blank();
    }
    for import in &file.imports {
        printer.import(import);
    }
    if !file.imports.is_empty() {
        printer.blank();
    }
    printer.class(&file.class);
    printer.out
}

/// Render one expression at indentation level zero
pub fn emit_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, 0);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn line(&mut self, text: &str) {
        self.pad();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// `//` comment, one per source line so embedded newlines stay commented
    fn line_comment(&mut self, text: &str) {
        if text.is_empty() {
            self.line("//");
        }
        for part in text.lines() {
            self.line(format!("// {}", part).trim_end());
        }
    }

    /// ` * ` line inside a block comment
    fn doc_line(&mut self, text: &str) {
        for part in text.lines() {
            self.line(format!(" * {}", escape_block_comment(part)).trim_end());
        }
    }

    // ===== DECLARATIONS =====

    fn import(&mut self, import: &Import) {
        let keyword = if import.type_only { "import type" } else { "import" };
        let line = format!(
            "{} {{ {} }} from {};",
            keyword,
            import.names.join(", "),
            quote(&import.from)
        );
        self.line(&line);
    }

    fn class(&mut self, class: &ClassDecl) {
        let mut head = format!("export default class {}", class.name);
        if let Some(base) = &class.extends {
            head.push_str(" extends ");
            head.push_str(base);
        }
        head.push_str(" {");
        self.line(&head);
        self.indent += 1;
        for (i, method) in class.methods.iter().enumerate() {
            if i > 0 {
                self.blank();
            }
            self.method(method);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn jsdoc(&mut self, doc: &JsDoc) {
        self.line("/**");
        for line in &doc.description {
            self.doc_line(line);
        }
        for (name, ty, description) in &doc.params {
            match description {
                Some(d) => self.doc_line(&format!("@param {{{}}} {} {}", ty, name, d)),
                None => self.doc_line(&format!("@param {{{}}} {}", ty, name)),
            }
        }
        if let Some(returns) = &doc.returns {
            self.doc_line(&format!("@returns {{{}}}", returns));
        }
        self.line(" */");
    }

    fn method(&mut self, method: &MethodDecl) {
        if let Some(doc) = &method.doc {
            self.jsdoc(doc);
        }
        for comment in &method.comments {
            self.line_comment(comment);
        }
        self.pad();
        if method.is_async {
            self.out.push_str("async ");
        }
        self.out.push_str(&method.name);
        self.params(&method.params);
        if let Some(ty) = &method.return_type {
            self.out.push_str(": ");
            self.out.push_str(ty);
        }
        self.out.push_str(" {\n");
        self.block_body(&method.body);
        self.line("}");
    }

    fn params(&mut self, params: &[Param]) {
        self.out.push('(');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name);
            if let Some(ty) = &param.ty {
                self.out.push_str(": ");
                self.out.push_str(ty);
            }
            if let Some(default) = &param.default {
                self.out.push_str(" = ");
                self.expr(default, 2);
            }
        }
        self.out.push(')');
    }

    // ===== STATEMENTS =====

    fn block_body(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for stmt in stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Const { name, ty, value } => {
                self.pad();
                self.out.push_str("const ");
                self.out.push_str(name);
                if let Some(ty) = ty {
                    self.out.push_str(": ");
                    self.out.push_str(ty);
                }
                self.out.push_str(" = ");
                self.expr(value, 2);
                self.out.push_str(";\n");
            }
            Stmt::Assign { target, value } => {
                self.pad();
                self.expr(target, 17);
                self.out.push_str(" = ");
                self.expr(value, 2);
                self.out.push_str(";\n");
            }
            Stmt::Expr(expr) => {
                self.pad();
                self.expr(expr, 0);
                self.out.push_str(";\n");
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                self.pad();
                self.out.push_str("if (");
                self.expr(test, 0);
                self.out.push_str(") {\n");
                self.block_body(then);
                match otherwise {
                    Some(other) => {
                        self.line("} else {");
                        self.block_body(other);
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            Stmt::Return(value) => {
                self.pad();
                match value {
                    Some(value) => {
                        self.out.push_str("return ");
                        self.expr(value, 0);
                        self.out.push_str(";\n");
                    }
                    None => self.out.push_str("return;\n"),
                }
            }
            Stmt::Throw(value) => {
                self.pad();
                self.out.push_str("throw ");
                self.expr(value, 0);
                self.out.push_str(";\n");
            }
            Stmt::Comment(text) => self.line_comment(text),
        }
    }

    // ===== EXPRESSIONS =====

    fn expr(&mut self, expr: &Expr, min_prec: u8) {
        let needs_parens = precedence(expr) < min_prec;
        if needs_parens {
            self.out.push('(');
        }
        self.expr_inner(expr);
        if needs_parens {
            self.out.push(')');
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => self.out.push_str(name),
            Expr::This => self.out.push_str("this"),
            Expr::Str(s) => self.out.push_str(&quote(s)),
            Expr::Num(n) => self.out.push_str(&format_number(*n)),
            Expr::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Expr::Null => self.out.push_str("null"),
            Expr::Undefined => self.out.push_str("undefined"),
            Expr::Array(items) => {
                self.out.push('[');
                self.list(items);
                self.out.push(']');
            }
            Expr::Object(entries) => self.object(entries),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                self.member_object(object);
                self.out.push_str(if *optional { "?." } else { "." });
                self.out.push_str(property);
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                self.member_object(object);
                if *optional {
                    self.out.push_str("?.");
                }
                self.out.push('[');
                self.expr(index, 0);
                self.out.push(']');
            }
            Expr::Call { callee, args } => {
                self.member_object(callee);
                self.out.push('(');
                self.list(args);
                self.out.push(')');
            }
            Expr::New { callee, args } => {
                self.out.push_str("new ");
                self.expr(callee, 18);
                self.out.push('(');
                self.list(args);
                self.out.push(')');
            }
            Expr::Spread(inner) => {
                self.out.push_str("...");
                self.expr(inner, 2);
            }
            Expr::Await(inner) => {
                self.out.push_str("await ");
                self.expr(inner, 14);
            }
            Expr::Unary { op, operand } => {
                self.out.push_str(op);
                if op.chars().all(|c| c.is_ascii_alphabetic()) {
                    self.out.push(' ');
                }
                self.expr(operand, 14);
            }
            Expr::Binary { op, left, right } => {
                let prec = binary_precedence(op);
                self.binary_operand(op, left, prec);
                self.out.push(' ');
                self.out.push_str(op);
                self.out.push(' ');
                self.binary_operand(op, right, prec + 1);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test, 3);
                self.out.push_str(" ? ");
                self.expr(consequent, 2);
                self.out.push_str(" : ");
                self.expr(alternate, 2);
            }
            Expr::Arrow { params, body } => {
                self.params(params);
                self.out.push_str(" => ");
                match body {
                    ArrowBody::Expr(inner) => {
                        if matches!(**inner, Expr::Object(_)) {
                            self.out.push('(');
                            self.expr(inner, 0);
                            self.out.push(')');
                        } else {
                            self.expr(inner, 2);
                        }
                    }
                    ArrowBody::Block(stmts) => {
                        self.out.push_str("{\n");
                        self.block_body(stmts);
                        self.pad();
                        self.out.push('}');
                    }
                }
            }
        }
    }

    /// `??` cannot be mixed with `&&`/`||` without parentheses
    fn binary_operand(&mut self, parent: &str, operand: &Expr, min_prec: u8) {
        let mixes_coalesce = match operand {
            Expr::Binary { op, .. } => {
                (parent == "??" && matches!(*op, "&&" | "||"))
                    || (matches!(parent, "&&" | "||") && *op == "??")
            }
            _ => false,
        };
        if mixes_coalesce {
            self.out.push('(');
            self.expr(operand, 0);
            self.out.push(')');
        } else {
            self.expr(operand, min_prec);
        }
    }

    /// Number literals need parentheses before `.`
    fn member_object(&mut self, object: &Expr) {
        if matches!(object, Expr::Num(_)) {
            self.out.push('(');
            self.expr(object, 0);
            self.out.push(')');
        } else {
            self.expr(object, 17);
        }
    }

    fn list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(item, 2);
        }
    }

    fn object(&mut self, entries: &[(String, Expr)]) {
        if entries.is_empty() {
            self.out.push_str("{}");
            return;
        }
        if entries.len() <= 2 && entries.iter().all(|(_, v)| is_simple(v)) {
            self.out.push_str("{ ");
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.out.push_str(&quote(key));
                self.out.push_str(": ");
                self.expr(value, 2);
            }
            self.out.push_str(" }");
            return;
        }
        self.out.push_str("{\n");
        self.indent += 1;
        for (key, value) in entries {
            self.pad();
            self.out.push_str(&quote(key));
            self.out.push_str(": ");
            self.expr(value, 2);
            self.out.push_str(",\n");
        }
        self.indent -= 1;
        self.pad();
        self.out.push('}');
    }
}

fn is_simple(expr: &Expr) -> bool {
    match expr {
        Expr::Object(entries) => entries.is_empty(),
        Expr::Arrow { .. } => false,
        Expr::Array(items) => items.iter().all(is_simple),
        _ => true,
    }
}

fn binary_precedence(op: &str) -> u8 {
    match op {
        "??" | "||" => 3,
        "&&" => 4,
        "==" | "!=" | "===" | "!==" => 8,
        "<" | "<=" | ">" | ">=" | "instanceof" | "in" => 9,
        "+" | "-" => 11,
        "*" | "/" | "%" => 12,
        _ => 2,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Spread(_) => 1,
        Expr::Arrow { .. } | Expr::Conditional { .. } => 2,
        Expr::Binary { op, .. } => binary_precedence(op),
        Expr::Unary { .. } | Expr::Await(_) => 14,
        Expr::Num(n) if *n < 0.0 => 14,
        Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } | Expr::New { .. } => 17,
        _ => 18,
    }
}

/// Single-quoted string literal
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Integers without a decimal point; non-finite values as `undefined`
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "undefined".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// `*/` would close the surrounding block comment
fn escape_block_comment(text: &str) -> String {
    text.replace("*/", "*\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_precedence_parens() {
        let sum = Expr::binary("+", Expr::ident("a"), Expr::ident("b"));
        let product = Expr::binary("*", sum.clone(), Expr::ident("c"));
        assert_eq!(emit_expr(&product), "(a + b) * c");

        let right = Expr::binary("-", Expr::ident("a"), sum);
        assert_eq!(emit_expr(&right), "a - (a + b)");
    }

    #[test]
    fn test_coalesce_mixing_forces_parens() {
        let and = Expr::binary("&&", Expr::ident("a"), Expr::ident("b"));
        let mixed = Expr::binary("??", and, Expr::ident("c"));
        assert_eq!(emit_expr(&mixed), "(a && b) ?? c");
    }

    #[test]
    fn test_literals() {
        assert_eq!(quote("it's\n"), "'it\\'s\\n'");
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-3.0), "-3");
        let obj = Expr::Object(vec![("cost".into(), Expr::Num(2.0))]);
        assert_eq!(emit_expr(&obj), "{ 'cost': 2 }");
    }

    #[test]
    fn test_optional_chain_and_call() {
        let expr = Expr::this_call("safeValue", vec![Expr::ident("data"), Expr::str("a")])
            .optional_index(Expr::Num(0.0));
        assert_eq!(emit_expr(&expr), "this.safeValue(data, 'a')?.[0]");
    }

    #[test]
    fn test_file_layout() {
        let mut method = MethodDecl::new("fetchTicker");
        method.is_async = true;
        method.return_type = Some("Promise<any>".into());
        method.body.push(Stmt::ret(Expr::Undefined));
        let file = TsFile {
            header: vec!["generated".into()],
            imports: vec![Import::new(&["Exchange"], "./base/Exchange.js")],
            class: ClassDecl {
                name: "Ex1".into(),
                extends: Some("Exchange".into()),
                methods: vec![method],
            },
        };
        assert_eq!(
            emit(&file),
            "// generated\n\nimport { Exchange } from './base/Exchange.js';\n\nexport default class Ex1 extends Exchange {\n    async fetchTicker(): Promise<any> {\n        return undefined;\n    }\n}\n"
        );
    }

    #[test]
    fn test_comment_text_cannot_close_block_or_escape_line() {
        let mut method = MethodDecl::new("fetchTicker");
        method.doc = Some(JsDoc {
            description: vec!["x */ y".into(), "two\nlines".into()],
            params: vec![("symbol".into(), "string".into(), Some("a */ b".into()))],
            returns: None,
        });
        method.comments = vec!["first\nreturn 1;".into()];
        method.body.push(Stmt::Comment("note */ here".into()));
        let file = TsFile {
            header: Vec::new(),
            imports: Vec::new(),
            class: ClassDecl {
                name: "Ex1".into(),
                extends: None,
                methods: vec![method],
            },
        };
        assert_eq!(
            emit(&file),
            "export default class Ex1 {\n    /**\n     * x *\\/ y\n     * two\n     * lines\n     * @param {string} symbol a *\\/ b\n     */\n    // first\n    // return 1;\n    fetchTicker() {\n        // note */ here\n    }\n}\n"
        );
    }
}
