//! Has-table consistency and derivation.

use std::collections::BTreeSet;

use edl_types::{HasFlag, HasFlagValue, ParsedDocument};

use crate::diagnostics::{Diagnostic, DiagnosticCode};

/// Prefixes of capability names that correspond to a client method
const METHOD_PREFIXES: &[&str] = &[
    "fetch", "create", "cancel", "edit", "watch", "set", "add", "reduce", "close", "borrow",
    "repay", "transfer", "withdraw",
];

pub fn is_method_like(name: &str) -> bool {
    METHOD_PREFIXES.iter().any(|p| {
        name.strip_prefix(p)
            .map(|rest| rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_uppercase()))
            .unwrap_or(false)
    })
}

/// Every client method the generated class will define
pub fn implemented_methods(parsed: &ParsedDocument) -> BTreeSet<String> {
    let doc = parsed.document();
    let mut names: BTreeSet<String> = doc.endpoints.iter().map(|e| e.name.clone()).collect();
    if let Some(interface) = parsed.interface() {
        names.extend(interface.methods.iter().map(|m| m.name.clone()));
    }
    names.extend(
        doc.wallet
            .operations()
            .map(|op| op.operation.method_name().to_string()),
    );
    names
}

/// Declared entries first, in declaration order, then `true` for every
/// implemented method the table does not mention, in sorted order
pub fn derive_has_table(parsed: &ParsedDocument) -> Vec<(String, HasFlag)> {
    let doc = parsed.document();
    let mut table: Vec<(String, HasFlag)> = doc
        .has
        .iter()
        .map(|entry| (entry.name.clone(), entry.flag.clone()))
        .collect();

    for name in implemented_methods(parsed) {
        if doc.has_flag(&name).is_none() {
            table.push((
                name,
                HasFlag::Simple {
                    value: HasFlagValue::Bool(true),
                },
            ));
        }
    }
    table
}

fn claims_native_support(flag: &HasFlag) -> bool {
    match flag {
        HasFlag::Simple { value } => *value == HasFlagValue::Bool(true),
        HasFlag::Market { markets } => markets
            .entries()
            .iter()
            .any(|(_, v)| *v == HasFlagValue::Bool(true)),
    }
}

pub fn check_has_flags(parsed: &ParsedDocument, diags: &mut Vec<Diagnostic>) {
    let doc = parsed.document();
    let implemented = implemented_methods(parsed);

    for entry in &doc.has {
        // H1: a supported method needs something implementing it
        if claims_native_support(&entry.flag)
            && is_method_like(&entry.name)
            && !implemented.contains(&entry.name)
        {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::HasFlagWithoutEndpoint,
                    entry.location.clone(),
                    format!("has flag '{}' is true but no endpoint implements it", entry.name),
                )
                .with_hint("declare the endpoint, or mark the flag 'emulated' or false"),
            );
        }

        // H2: a declared endpoint disabled in the table
        if entry.flag.is_disabled() && implemented.contains(&entry.name) {
            diags.push(Diagnostic::warning(
                DiagnosticCode::HasFlagDisabled,
                entry.location.clone(),
                format!("endpoint '{}' is declared but its has flag is false", entry.name),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edl_types::{
        DocumentVersion, EdlDocument, EndpointDefinition, HasFlagEntry, MarketHasOverride,
        MarketType, SourceLocation,
    };

    fn simple(name: &str, value: HasFlagValue) -> HasFlagEntry {
        HasFlagEntry {
            name: name.into(),
            flag: HasFlag::Simple { value },
            location: SourceLocation::unknown(),
        }
    }

    fn parsed(has: Vec<HasFlagEntry>, endpoints: &[&str]) -> ParsedDocument {
        let mut doc = EdlDocument::new(DocumentVersion::V0);
        doc.exchange.id = "ex".into();
        doc.has = has;
        doc.endpoints = endpoints.iter().map(|n| EndpointDefinition::new(*n)).collect();
        ParsedDocument::Legacy(doc)
    }

    #[test]
    fn test_method_like_names() {
        assert!(is_method_like("fetchTicker"));
        assert!(is_method_like("withdraw"));
        assert!(!is_method_like("CORS"));
        assert!(!is_method_like("fetchingStuff"));
        assert!(!is_method_like("spot"));
    }

    #[test]
    fn test_true_without_endpoint() {
        let doc = parsed(
            vec![
                simple("fetchTicker", HasFlagValue::Bool(true)),
                simple("fetchOHLCV", HasFlagValue::Emulated),
                simple("CORS", HasFlagValue::Bool(true)),
            ],
            &[],
        );
        let mut diags = Vec::new();
        check_has_flags(&doc, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::HasFlagWithoutEndpoint);
    }

    #[test]
    fn test_market_override_without_endpoint() {
        let mut markets = MarketHasOverride::default();
        markets.set(MarketType::Swap, HasFlagValue::Bool(true));
        let doc = parsed(
            vec![HasFlagEntry {
                name: "fetchFundingRate".into(),
                flag: HasFlag::Market { markets },
                location: SourceLocation::unknown(),
            }],
            &[],
        );
        let mut diags = Vec::new();
        check_has_flags(&doc, &mut diags);
        assert_eq!(diags[0].code, DiagnosticCode::HasFlagWithoutEndpoint);
    }

    #[test]
    fn test_disabled_declared_endpoint_warns() {
        let doc = parsed(vec![simple("fetchTrades", HasFlagValue::Bool(false))], &["fetchTrades"]);
        let mut diags = Vec::new();
        check_has_flags(&doc, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_warning());
    }

    #[test]
    fn test_derived_table_order() {
        let doc = parsed(
            vec![simple("fetchTrades", HasFlagValue::Bool(false))],
            &["fetchTrades", "fetchTicker", "fetchBalance"],
        );
        let names: Vec<_> = derive_has_table(&doc).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["fetchTrades", "fetchBalance", "fetchTicker"]);
    }
}
