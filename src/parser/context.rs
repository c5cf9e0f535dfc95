//! Shared state threaded through the sub-parsers.

use edl_types::{DocumentVersion, SourceLocation};
use serde_yaml::{Mapping, Sequence, Value};

use super::source_map::SourceMap;
use crate::diagnostics::{Diagnostic, DiagnosticCode};

/// Collects structural diagnostics and resolves node paths to locations.
///
/// Sub-parsers never fail: they push a diagnostic and return the best partial
/// value they can build.
pub struct ParseContext {
    source_map: SourceMap,
    pub version: DocumentVersion,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseContext {
    pub fn new(source_map: SourceMap, version: DocumentVersion) -> Self {
        Self {
            source_map,
            version,
            diagnostics: Vec::new(),
        }
    }

    pub fn location(&self, path: &str) -> SourceLocation {
        self.source_map.location(path)
    }

    pub fn comments(&self, path: &str) -> Vec<String> {
        self.source_map.comments(path).to_vec()
    }

    pub fn error(&mut self, code: DiagnosticCode, path: &str, message: impl Into<String>) {
        let diag = Diagnostic::error(code, self.location(path), message);
        self.diagnostics.push(diag);
    }

    pub fn warning(&mut self, code: DiagnosticCode, path: &str, message: impl Into<String>) {
        let diag = Diagnostic::warning(code, self.location(path), message);
        self.diagnostics.push(diag);
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    /// Warn about keys of `map` outside `known`
    pub fn check_keys(&mut self, map: &Mapping, path: &str, known: &[&str]) {
        for key in map.keys() {
            match key.as_str() {
                Some(k) if known.contains(&k) => {}
                Some(k) => {
                    let child = super::source_map::child_path(path, k);
                    let diag = Diagnostic::warning(
                        DiagnosticCode::UnknownKey,
                        self.location(&child),
                        format!("unknown key '{}' in {}", k, describe_path(path)),
                    )
                    .with_hint(format!("expected one of: {}", known.join(", ")));
                    self.diagnostics.push(diag);
                }
                None => self.error(
                    DiagnosticCode::InvalidType,
                    path,
                    format!("non-string key in {}", describe_path(path)),
                ),
            }
        }
    }

    /// Error for a node of the wrong YAML type
    pub fn type_error(&mut self, path: &str, expected: &str, found: &Value) {
        self.error(
            DiagnosticCode::InvalidType,
            path,
            format!(
                "{} must be {}, found {}",
                describe_path(path),
                expected,
                yaml_kind(found)
            ),
        );
    }
}

fn describe_path(path: &str) -> String {
    if path.is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", path)
    }
}

/// Human name of a YAML node kind
pub fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(Value::String(key.into()))
}

pub fn get_str<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    get(map, key)?.as_str()
}

pub fn get_map<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    get(map, key)?.as_mapping()
}

pub fn get_seq<'a>(map: &'a Mapping, key: &str) -> Option<&'a Sequence> {
    get(map, key)?.as_sequence()
}

pub fn get_bool(map: &Mapping, key: &str) -> Option<bool> {
    get(map, key)?.as_bool()
}

pub fn get_f64(map: &Mapping, key: &str) -> Option<f64> {
    get(map, key)?.as_f64()
}

/// Scalar rendered as a string (`id: 123` is accepted as `"123"`)
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a YAML node into JSON for literal tables (defaults, enums, urls)
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(seq) => serde_json::Value::Array(seq.iter().map(to_json).collect()),
        Value::Mapping(map) => {
            let obj = map
                .iter()
                .filter_map(|(k, v)| scalar_string(k).map(|k| (k, to_json(v))))
                .collect();
            serde_json::Value::Object(obj)
        }
        Value::Tagged(tagged) => to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_for(src: &str) -> ParseContext {
        ParseContext::new(SourceMap::build(src, None), DocumentVersion::V0)
    }

    #[test]
    fn test_check_keys_reports_unknown() {
        let src = "id: x\nbogus: 1\n";
        let root: Value = serde_yaml::from_str(src).unwrap();
        let mut ctx = ctx_for(src);
        ctx.check_keys(root.as_mapping().unwrap(), "", &["id"]);

        assert_eq!(ctx.diagnostics.len(), 1);
        let diag = &ctx.diagnostics[0];
        assert_eq!(diag.code, DiagnosticCode::UnknownKey);
        assert!(diag.is_warning());
        assert_eq!(diag.location.line, 2);
    }

    #[test]
    fn test_to_json_preserves_numbers() {
        let value: Value = serde_yaml::from_str("{a: 1, b: 2.5, c: [x, true]}").unwrap();
        assert_eq!(
            to_json(&value),
            serde_json::json!({"a": 1, "b": 2.5, "c": ["x", true]})
        );
    }
}
