//! Semantic analysis.
//!
//! [`analyze_edl`] runs every whole-document check in one pass and returns all
//! findings. It never stops at the first error, so a single compile reports
//! everything wrong with a document.

pub mod fragments;
pub mod has_flags;
pub mod rate_limits;

use std::collections::{BTreeSet, HashMap};

use edl_types::{EdlDocument, HttpMethod, ParamDefinition, ParsedDocument, SourceLocation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::{partition, Diagnostic, DiagnosticCode};
use crate::expr::free_identifiers;
use crate::names::{identifier_problem, NameKind};

pub use fragments::{effective_cost_config, effective_params, effective_requires_auth};
pub use has_flags::derive_has_table;
pub use rate_limits::{resolve_effective_cost, resolve_endpoint_cost};

/// Analyzer output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a parsed document. Returns all errors and warnings found.
pub fn analyze_edl(parsed: &ParsedDocument) -> ValidationResult {
    let doc = parsed.document();
    let mut diags = Vec::new();

    // A1: Exchange id is present
    if doc.exchange.id.trim().is_empty() {
        diags.push(
            Diagnostic::error(
                DiagnosticCode::MissingExchangeId,
                doc.exchange.location.clone(),
                "document does not declare an exchange id",
            )
            .with_hint("add a top-level 'id' or 'exchange.id'"),
        );
    }

    // A2: Endpoint names are unique
    let mut seen: HashMap<&str, &SourceLocation> = HashMap::new();
    for endpoint in &doc.endpoints {
        match seen.get(endpoint.name.as_str()) {
            Some(first) => diags.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateEndpoint,
                    endpoint.location.clone(),
                    format!("endpoint '{}' is declared more than once", endpoint.name),
                )
                .with_related("first declared here", (*first).clone()),
            ),
            None => {
                seen.insert(&endpoint.name, &endpoint.location);
            }
        }
    }

    // A3: Param names are unique within an endpoint
    for endpoint in &doc.endpoints {
        check_duplicate_params(&endpoint.params, &format!("endpoint '{}'", endpoint.name), &mut diags);
    }
    for fragment in doc.fragments.iter() {
        check_duplicate_params(&fragment.params, &format!("fragment '{}'", fragment.name), &mut diags);
    }

    // A4: Fragment references, cycles, unused fragments
    fragments::check_fragments(doc, &mut diags);

    // A5: Costs resolve against the rate-limit schema
    rate_limits::check_rate_limits(doc, &mut diags);

    // A6: Has table agrees with declared endpoints
    has_flags::check_has_flags(parsed, &mut diags);

    // A7: required_if guards only name effective params
    check_required_if(doc, &mut diags);

    // A8: Interface methods target declared endpoints
    check_interface(parsed, &mut diags);

    // A9: Wallet schemas name an endpoint and a supported HTTP method
    check_wallet(doc, &mut diags);

    // A10: Names that become identifiers are emittable and do not collide
    check_identifiers(parsed, &mut diags);
    check_generated_collisions(parsed, &mut diags);

    let (errors, warnings) = partition(diags);
    debug!(
        "Analyzed '{}': {} error(s), {} warning(s)",
        doc.exchange.id,
        errors.len(),
        warnings.len()
    );
    ValidationResult { errors, warnings }
}

fn check_duplicate_params(params: &[ParamDefinition], owner: &str, diags: &mut Vec<Diagnostic>) {
    let mut seen: HashMap<&str, &SourceLocation> = HashMap::new();
    for param in params {
        if let Some(first) = seen.get(param.name.as_str()) {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateParam,
                    param.location.clone(),
                    format!("{} declares param '{}' more than once", owner, param.name),
                )
                .with_related("first declared here", (*first).clone()),
            );
        } else {
            seen.insert(&param.name, &param.location);
        }
    }
}

fn check_required_if(doc: &EdlDocument, diags: &mut Vec<Diagnostic>) {
    // Inherited params are checked once per endpoint; report each miss once
    let mut reported: BTreeSet<(SourceLocation, String)> = BTreeSet::new();

    for endpoint in &doc.endpoints {
        let params = effective_params(doc, endpoint);
        let names: BTreeSet<&str> = params.iter().map(|p| p.name.as_str()).collect();
        for param in &params {
            let Some(guard) = param.required_if.as_ref().and_then(|g| g.parsed.as_ref()) else {
                continue;
            };
            for ident in free_identifiers(guard) {
                if names.contains(ident.as_str()) {
                    continue;
                }
                if reported.insert((param.location.clone(), ident.clone())) {
                    diags.push(
                        Diagnostic::error(
                            DiagnosticCode::UnknownRequiredIfParam,
                            param.location.clone(),
                            format!(
                                "required_if of '{}' in endpoint '{}' references unknown param '{}'",
                                param.name, endpoint.name, ident
                            ),
                        )
                        .with_hint(format!(
                            "available params: {}",
                            names.iter().copied().collect::<Vec<_>>().join(", ")
                        )),
                    );
                }
            }
        }
    }
}

fn check_interface(parsed: &ParsedDocument, diags: &mut Vec<Diagnostic>) {
    let Some(interface) = parsed.interface() else {
        return;
    };
    let doc = parsed.document();

    for method in &interface.methods {
        if let Some(endpoint) = doc.endpoint(&method.name) {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateEndpoint,
                    method.location.clone(),
                    format!("interface method '{}' collides with an endpoint of the same name", method.name),
                )
                .with_related("endpoint declared here", endpoint.location.clone()),
            );
        }

        for target in method.endpoints() {
            if doc.endpoint(target).is_none() {
                diags.push(Diagnostic::error(
                    DiagnosticCode::UnknownInterfaceEndpoint,
                    method.location.clone(),
                    format!("interface method '{}' targets unknown endpoint '{}'", method.name, target),
                ));
            }
        }

        if let Some(default) = method.selection.as_ref().and_then(|s| s.default.as_ref()) {
            if !method.variants.iter().any(|v| &v.name == default) {
                let variants: Vec<&str> = method.variants.iter().map(|v| v.name.as_str()).collect();
                diags.push(
                    Diagnostic::error(
                        DiagnosticCode::InvalidSelectionDefault,
                        method
                            .selection
                            .as_ref()
                            .map(|s| s.location.clone())
                            .unwrap_or_else(|| method.location.clone()),
                        format!(
                            "selection default '{}' of '{}' is not a variant",
                            default, method.name
                        ),
                    )
                    .with_hint(format!("variants: {}", variants.join(", "))),
                );
            }
        }
    }
}

fn check_identifiers(parsed: &ParsedDocument, diags: &mut Vec<Diagnostic>) {
    let doc = parsed.document();
    let mut check = |name: &str, kind: NameKind, what: &str, location: &SourceLocation| {
        if let Some(reason) = identifier_problem(name, kind) {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::InvalidIdentifier,
                    location.clone(),
                    format!("{} '{}' {}", what, name, reason),
                )
                .with_hint("names must match [A-Za-z_$][A-Za-z0-9_$]* and not be reserved"),
            );
        }
    };

    let id = doc.exchange.id.trim();
    if !id.is_empty() && !id.chars().any(|c| c.is_ascii_alphanumeric()) {
        check(id, NameKind::Method, "exchange id", &doc.exchange.location);
    }
    for endpoint in &doc.endpoints {
        check(&endpoint.name, NameKind::Method, "endpoint", &endpoint.location);
        for param in &endpoint.params {
            check(&param.name, NameKind::Param, "param", &param.location);
        }
    }
    for fragment in doc.fragments.iter() {
        for param in &fragment.params {
            check(&param.name, NameKind::Param, "param", &param.location);
        }
    }
    if let Some(interface) = parsed.interface() {
        for method in &interface.methods {
            check(&method.name, NameKind::Method, "interface method", &method.location);
            for param in &method.params {
                check(&param.name, NameKind::Param, "param", &param.location);
            }
            if let Some(selection) = &method.selection {
                check(&selection.param, NameKind::Param, "selection param", &selection.location);
            }
        }
    }
}

/// Endpoint or interface names equal to a wallet or transaction method
fn check_generated_collisions(parsed: &ParsedDocument, diags: &mut Vec<Diagnostic>) {
    let doc = parsed.document();
    let mut generated: Vec<&str> = doc
        .wallet
        .operations()
        .map(|op| op.operation.method_name())
        .collect();
    if doc.transactions.is_some() {
        generated.extend(["parseTransaction", "parseTransactionStatus", "parseTransactionType"]);
    }

    let interface_methods = parsed.interface().map(|i| i.methods.as_slice()).unwrap_or(&[]);
    let names = doc
        .endpoints
        .iter()
        .map(|e| (e.name.as_str(), &e.location))
        .chain(interface_methods.iter().map(|m| (m.name.as_str(), &m.location)));
    for (name, location) in names {
        if generated.contains(&name) {
            diags.push(Diagnostic::error(
                DiagnosticCode::DuplicateEndpoint,
                location.clone(),
                format!("'{}' collides with the generated method of the same name", name),
            ));
        }
    }
}

fn check_wallet(doc: &EdlDocument, diags: &mut Vec<Diagnostic>) {
    for op in doc.wallet.operations() {
        if op.endpoint.trim().is_empty() {
            diags.push(Diagnostic::error(
                DiagnosticCode::InvalidWalletEndpoint,
                op.location.clone(),
                format!("wallet operation '{}' has an empty endpoint", op.operation.as_str()),
            ));
        }
        if HttpMethod::from_name(&op.method).is_none() {
            diags.push(
                Diagnostic::error(
                    DiagnosticCode::InvalidWalletEndpoint,
                    op.location.clone(),
                    format!(
                        "wallet operation '{}' uses unsupported HTTP method '{}'",
                        op.operation.as_str(),
                        op.method
                    ),
                )
                .with_hint("use GET, POST, PUT, DELETE or PATCH"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze(src: &str) -> ValidationResult {
        let outcome = parse(src, None);
        let doc = outcome.document.expect("document");
        analyze_edl(&doc)
    }

    fn codes(diags: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diags.iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_valid_document() {
        let result = analyze(
            r#"
id: ex1
fragments:
  paging:
    params:
      - name: limit
        type: integer
        optional: true
endpoints:
  - name: fetchTrades
    uses: [paging]
    params:
      - name: symbol
        type: string
"#,
        );
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_id_and_duplicates() {
        let result = analyze(
            r#"
endpoints:
  - name: fetchTicker
    params: [symbol, symbol]
  - name: fetchTicker
"#,
        );
        assert_eq!(
            codes(&result.errors),
            vec![
                DiagnosticCode::MissingExchangeId,
                DiagnosticCode::DuplicateEndpoint,
                DiagnosticCode::DuplicateParam,
            ]
        );
        assert_eq!(result.errors[1].related.len(), 1);
    }

    #[test]
    fn test_cycle_reported_once() {
        let result = analyze(
            r#"
id: ex1
fragments:
  a: { uses: [b] }
  b: { uses: [a] }
endpoints:
  - name: fetchTicker
    uses: [a]
"#,
        );
        let cycles: Vec<_> = result
            .errors
            .iter()
            .filter(|d| d.code == DiagnosticCode::FragmentCycle)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].message.contains('a') && cycles[0].message.contains('b'));
    }

    #[test]
    fn test_required_if_unknown_param() {
        let result = analyze(
            r#"
id: ex1
endpoints:
  - name: createOrder
    params:
      - name: price
        type: number
        required_if: "type === 'limit'"
"#,
        );
        assert_eq!(codes(&result.errors), vec![DiagnosticCode::UnknownRequiredIfParam]);
    }

    #[test]
    fn test_rate_limit_findings() {
        let result = analyze(
            r#"
id: ex1
rateLimits:
  global: { capacity: 10, refillRate: 1, interval: 1000 }
  groups:
    orders: 2
  endpoints:
    fetchTicker: 20
    fetchGhost: 1
endpoints:
  - name: fetchTicker
  - name: createOrder
    cost: missing
"#,
        );
        assert_eq!(
            codes(&result.errors),
            vec![DiagnosticCode::InvalidCost, DiagnosticCode::UnresolvedCostGroup]
        );
        assert_eq!(codes(&result.warnings), vec![DiagnosticCode::UnknownRateLimitEndpoint]);
    }

    #[test]
    fn test_interface_checks() {
        let result = analyze(
            r#"
id: ex1
endpoints:
  - name: spotTicker
  - name: fetchTicker
interface:
  fetchTicker:
    endpoint: spotTicker
  fetchTrades:
    selection: { param: type, default: margin }
    variants:
      spot: spotTrades
"#,
        );
        assert_eq!(
            codes(&result.errors),
            vec![
                DiagnosticCode::DuplicateEndpoint,
                DiagnosticCode::UnknownInterfaceEndpoint,
                DiagnosticCode::InvalidSelectionDefault,
            ]
        );
    }

    #[test]
    fn test_wallet_method_checked() {
        let result = analyze(
            r#"
id: ex1
wallet:
  withdraw:
    endpoint: sapi/withdraw
    method: FETCH
"#,
        );
        assert_eq!(codes(&result.errors), vec![DiagnosticCode::InvalidWalletEndpoint]);
    }

    #[test]
    fn test_names_must_be_identifiers() {
        let result = analyze(
            r#"
id: ex1
endpoints:
  - name: fetch-ticker
    params:
      - name: end-time
        type: integer
  - name: fetchTrades
    params: [class, response]
"#,
        );
        assert_eq!(
            codes(&result.errors),
            vec![DiagnosticCode::InvalidIdentifier; 4]
        );
        assert!(result.errors[0].message.contains("'fetch-ticker' is not a valid identifier"));
        assert!(result.errors[2].message.contains("'class' is a reserved word"));
    }

    #[test]
    fn test_interface_names_checked() {
        let result = analyze(
            r#"
id: ex1
endpoints:
  - name: spotBalance
interface:
  fetch balance:
    endpoint: spotBalance
  fetchBalance:
    selection: { param: selected }
    variants:
      spot: spotBalance
"#,
        );
        assert_eq!(
            codes(&result.errors),
            vec![DiagnosticCode::InvalidIdentifier; 2]
        );
    }

    #[test]
    fn test_endpoint_colliding_with_wallet_method() {
        let result = analyze(
            r#"
id: ex1
endpoints:
  - name: withdraw
wallet:
  withdraw:
    endpoint: withdraw
"#,
        );
        assert_eq!(codes(&result.errors), vec![DiagnosticCode::DuplicateEndpoint]);
    }
}
