//! YAML front end
//!
//! [`parse`] turns EDL source into a [`ParsedDocument`] plus structural
//! diagnostics. Malformed YAML (or a non-mapping root) is the only fatal case:
//! it yields no document and exactly one diagnostic. Every other problem is
//! recorded and parsing continues, so the analyzer and linter still see as much
//! of the document as could be built.
//!
//! The version is probed once, here, and carried on the document:
//!
//! | probe | version |
//! |-------|---------|
//! | root `interface:` mapping | v2 |
//! | root `api:` category tree | v1 |
//! | otherwise | v0 |

pub mod array_ops;
pub mod context;
pub mod document;
pub mod fragments;
pub mod has_flags;
pub mod interface;
pub mod rate_limits;
pub mod source_map;
pub mod transactions;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use edl_types::{
    DocumentVersion, EdlDocument, EnhancedEdlDocument, InterfaceDefinition, ParsedDocument,
    SourceLocation,
};

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use context::{get, ParseContext};
use source_map::SourceMap;

/// Root keys the parser understands
pub const ROOT_KEYS: &[&str] = &[
    "id",
    "name",
    "version",
    "countries",
    "urls",
    "description",
    "exchange",
    "endpoints",
    "api",
    "fragments",
    "has",
    "rateLimits",
    "wallet",
    "transactions",
    "interface",
];

/// Result of [`parse`]
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// `None` only after a fatal diagnostic
    pub document: Option<ParsedDocument>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    fn fatal(diagnostic: Diagnostic) -> Self {
        Self {
            document: None,
            diagnostics: vec![diagnostic],
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.document.is_none()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Probe the root mapping for its schema generation
pub fn detect_version(root: &Mapping) -> DocumentVersion {
    if matches!(get(root, "interface"), Some(Value::Mapping(_))) {
        DocumentVersion::V2
    } else if matches!(get(root, "api"), Some(Value::Mapping(_))) {
        DocumentVersion::V1
    } else {
        DocumentVersion::V0
    }
}

/// Parse EDL source text
pub fn parse(source: &str, source_name: Option<&str>) -> ParseOutcome {
    let at = |line: usize, column: usize| match source_name {
        Some(name) => SourceLocation::with_source(line, column, name),
        None => SourceLocation::new(line, column),
    };

    let root: Value = match serde_yaml::from_str(source) {
        Ok(value) => value,
        Err(e) => {
            let location = e
                .location()
                .map(|l| at(l.line(), l.column()))
                .unwrap_or_else(|| at(1, 1));
            return ParseOutcome::fatal(Diagnostic::error(
                DiagnosticCode::YamlSyntax,
                location,
                format!("malformed YAML: {}", e),
            ));
        }
    };
    let Some(root) = root.as_mapping() else {
        let found = context::yaml_kind(&root);
        return ParseOutcome::fatal(
            Diagnostic::error(
                DiagnosticCode::InvalidRoot,
                at(1, 1),
                format!("document root must be a mapping, found {}", found),
            )
            .with_hint("an EDL document starts with keys such as 'exchange:' and 'endpoints:'"),
        );
    };

    let version = detect_version(root);
    let mut ctx = ParseContext::new(SourceMap::build(source, source_name), version);
    debug!(source = source_name.unwrap_or("<inline>"), %version, "parsing EDL document");

    let document = parse_root(&mut ctx, root, source_name);
    let interface = match (version, get(root, "interface")) {
        (DocumentVersion::V2, Some(Value::Mapping(map))) => {
            Some(interface::parse_interface(&mut ctx, map, "interface"))
        }
        _ => None,
    };

    info!(
        exchange = %document.exchange.id,
        %version,
        endpoints = document.endpoints.len(),
        fragments = document.fragments.len(),
        diagnostics = ctx.diagnostics.len(),
        "parsed EDL document"
    );

    let parsed = match interface {
        Some(interface) => ParsedDocument::Enhanced(EnhancedEdlDocument { document, interface }),
        None if version == DocumentVersion::V2 => ParsedDocument::Enhanced(EnhancedEdlDocument {
            document,
            interface: InterfaceDefinition::default(),
        }),
        None => ParsedDocument::Legacy(document),
    };
    ParseOutcome {
        document: Some(parsed),
        diagnostics: ctx.diagnostics,
    }
}

fn parse_root(ctx: &mut ParseContext, root: &Mapping, source_name: Option<&str>) -> EdlDocument {
    ctx.check_keys(root, "", ROOT_KEYS);

    let mut doc = EdlDocument::new(ctx.version);
    doc.source_name = source_name.map(String::from);
    doc.exchange = document::parse_exchange_info(ctx, root);

    if let Some(fragments) = get(root, "fragments") {
        doc.fragments = fragments::parse_fragments(ctx, fragments, "fragments");
    }

    if let Some(endpoints) = get(root, "endpoints") {
        doc.endpoints = document::parse_endpoint_list(ctx, endpoints, "endpoints");
    }
    match get(root, "api") {
        Some(Value::Mapping(api)) => {
            let legacy = document::parse_api_tree(ctx, api, "api");
            doc.endpoints.extend(legacy);
        }
        Some(other) => ctx.type_error("api", "a mapping of categories", other),
        None => {}
    }

    match get(root, "has") {
        Some(Value::Mapping(has)) => doc.has = has_flags::parse_has_flags(ctx, has, "has"),
        Some(other) => ctx.type_error("has", "a mapping", other),
        None => {}
    }
    match get(root, "rateLimits") {
        Some(Value::Mapping(limits)) => {
            doc.rate_limits = Some(rate_limits::parse_rate_limits(ctx, limits, "rateLimits"))
        }
        Some(other) => ctx.type_error("rateLimits", "a mapping", other),
        None => {}
    }
    match get(root, "transactions") {
        Some(Value::Mapping(tx)) => {
            doc.transactions = Some(transactions::parse_transactions(ctx, tx, "transactions"))
        }
        Some(other) => ctx.type_error("transactions", "a mapping", other),
        None => {}
    }
    match get(root, "wallet") {
        Some(Value::Mapping(wallet)) => doc.wallet = transactions::parse_wallet(ctx, wallet, "wallet"),
        Some(other) => ctx.type_error("wallet", "a mapping", other),
        None => {}
    }
    if let Some(interface) = get(root, "interface") {
        if !interface.is_mapping() {
            ctx.type_error("interface", "a mapping of methods", interface);
        }
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_document() {
        let outcome = parse("id: ex1\nendpoints:\n  - name: fetchTicker\n    params: []\n", None);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        let doc = outcome.document.unwrap();
        assert_eq!(doc.version(), DocumentVersion::V0);
        assert_eq!(doc.document().id(), "ex1");
        assert_eq!(doc.document().endpoints[0].name, "fetchTicker");
        assert!(doc.document().endpoints[0].params.is_empty());
    }

    #[test]
    fn test_version_probe_order() {
        let v2 = "id: x\napi:\n  public:\n    get: [a]\ninterface:\n  fetchA: publicGetA\n";
        let v1 = "id: x\napi:\n  public:\n    get: [a]\n";
        let v0 = "id: x\nendpoints: []\n";
        assert_eq!(parse(v2, None).document.unwrap().version(), DocumentVersion::V2);
        assert_eq!(parse(v1, None).document.unwrap().version(), DocumentVersion::V1);
        assert_eq!(parse(v0, None).document.unwrap().version(), DocumentVersion::V0);
    }

    #[test]
    fn test_malformed_yaml_is_single_fatal_diagnostic() {
        let outcome = parse("id: [unclosed\nendpoints: {\n", Some("bad.yaml"));
        assert!(outcome.is_fatal());
        assert_eq!(outcome.diagnostics.len(), 1);
        let diag = &outcome.diagnostics[0];
        assert_eq!(diag.code, DiagnosticCode::YamlSyntax);
        assert_eq!(diag.location.source_name.as_deref(), Some("bad.yaml"));
    }

    #[test]
    fn test_non_mapping_root() {
        let outcome = parse("- a\n- b\n", None);
        assert!(outcome.is_fatal());
        assert_eq!(outcome.diagnostics[0].code, DiagnosticCode::InvalidRoot);
    }

    #[test]
    fn test_unknown_root_key_is_recoverable() {
        let outcome = parse("id: ex1\nendpionts: []\n", None);
        assert!(!outcome.is_fatal());
        assert!(!outcome.has_errors());
        let warning = outcome.warnings().next().unwrap();
        assert_eq!(warning.code, DiagnosticCode::UnknownKey);
        assert_eq!(warning.location.line, 2);
    }

    #[test]
    fn test_exchange_block_overrides_root_id() {
        let outcome = parse("id: old\nexchange:\n  id: binance\n  name: Binance\n  countries: [JP, MT]\n", None);
        let doc = outcome.document.unwrap();
        assert_eq!(doc.document().exchange.id, "binance");
        assert_eq!(doc.document().exchange.countries, vec!["JP", "MT"]);
    }
}
