//! Rules for document names that become identifiers in generated code.
//!
//! Endpoint and interface names become class methods. Param names become
//! function parameters, so they also share a scope with the locals every
//! generated method declares.

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier regex is valid"));

/// Reserved and strict-mode words of the target language
pub const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield", "arguments",
    "eval", "undefined",
];

/// Locals declared by generated method bodies
pub const GENERATED_LOCALS: &[&str] = &["request", "response", "data", "result", "selected"];

/// Class members the generated exchange defines or dispatches through
pub const GENERATED_MEMBERS: &[&str] = &["constructor", "describe", "request"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Method,
    Param,
}

/// Why `name` cannot be emitted as a `kind` identifier, or `None` when it can
pub fn identifier_problem(name: &str, kind: NameKind) -> Option<&'static str> {
    if !IDENTIFIER.is_match(name) {
        return Some("is not a valid identifier");
    }
    if RESERVED_WORDS.contains(&name) {
        return Some("is a reserved word");
    }
    match kind {
        NameKind::Method if GENERATED_MEMBERS.contains(&name) => {
            Some("collides with a generated class member")
        }
        NameKind::Param if GENERATED_LOCALS.contains(&name) => {
            Some("collides with a local of the generated method")
        }
        _ => None,
    }
}

pub fn is_valid_identifier(name: &str, kind: NameKind) -> bool {
    identifier_problem(name, kind).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_syntax() {
        assert!(is_valid_identifier("fetchTicker", NameKind::Method));
        assert!(is_valid_identifier("_since", NameKind::Param));
        assert!(is_valid_identifier("$x1", NameKind::Param));
        assert_eq!(
            identifier_problem("fetch-ticker", NameKind::Method),
            Some("is not a valid identifier")
        );
        assert!(!is_valid_identifier("1day", NameKind::Param));
        assert!(!is_valid_identifier("", NameKind::Param));
        assert!(!is_valid_identifier("end time", NameKind::Param));
    }

    #[test]
    fn test_reserved_and_generated_names() {
        assert_eq!(identifier_problem("class", NameKind::Param), Some("is a reserved word"));
        assert!(!is_valid_identifier("delete", NameKind::Method));
        assert!(!is_valid_identifier("describe", NameKind::Method));
        assert!(!is_valid_identifier("response", NameKind::Param));
        // locals only shadow params; a method may use the name
        assert!(is_valid_identifier("result", NameKind::Method));
    }
}
