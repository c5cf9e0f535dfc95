//! Endpoint naming rules.

use std::collections::HashMap;

use edl_types::Severity;

use super::{LintContext, LintRule};
use crate::lint::diagnostic::LintError;

pub struct EndpointCaseCollision;

impl LintRule for EndpointCaseCollision {
    fn id(&self) -> &'static str {
        "endpoint-case-collision"
    }

    fn description(&self) -> &'static str {
        "Two endpoint names that differ only in letter case"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let mut first_by_folded: HashMap<String, &str> = HashMap::new();
        let mut out = Vec::new();
        for endpoint in ctx.endpoints() {
            let folded = endpoint.name.to_ascii_lowercase();
            match first_by_folded.get(&folded) {
                // Exact duplicates are an analyzer error, not a case problem
                Some(first) if *first != endpoint.name => out.push(
                    self.finding(
                        endpoint.location.clone(),
                        format!(
                            "endpoint '{}' differs from '{}' only in case",
                            endpoint.name, first
                        ),
                    )
                    .with_element(format!("endpoint '{}'", endpoint.name)),
                ),
                Some(_) => {}
                None => {
                    first_by_folded.insert(folded, &endpoint.name);
                }
            }
        }
        out
    }
}

pub struct InconsistentEndpointCase;

impl LintRule for InconsistentEndpointCase {
    fn id(&self) -> &'static str {
        "inconsistent-endpoint-case"
    }

    fn description(&self) -> &'static str {
        "Endpoint name that is not camelCase"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        ctx.endpoints()
            .iter()
            .filter(|e| !is_camel_case(&e.name))
            .map(|e| {
                self.finding(
                    e.location.clone(),
                    format!("endpoint name '{}' is not camelCase", e.name),
                )
                .with_element(format!("endpoint '{}'", e.name))
                .with_hint(format!("rename to '{}'", to_camel_case(&e.name)))
            })
            .collect()
    }
}

pub struct HasFlagCaseMismatch;

impl LintRule for HasFlagCaseMismatch {
    fn id(&self) -> &'static str {
        "has-flag-case-mismatch"
    }

    fn description(&self) -> &'static str {
        "Has-flag key matching an endpoint name only when case is ignored"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let mut out = Vec::new();
        for entry in &ctx.document().has {
            if ctx.endpoints().iter().any(|e| e.name == entry.name) {
                continue;
            }
            if let Some(endpoint) = ctx
                .endpoints()
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
            {
                out.push(
                    self.finding(
                        entry.location.clone(),
                        format!(
                            "has flag '{}' matches endpoint '{}' only ignoring case",
                            entry.name, endpoint.name
                        ),
                    )
                    .with_hint(format!("rename the flag to '{}'", endpoint.name)),
                );
            }
        }
        out
    }
}

fn is_camel_case(name: &str) -> bool {
    name.chars().next().map_or(false, |c| c.is_ascii_lowercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if c == '_' || c == '-' {
            upper_next = true;
        } else if i == 0 || out.is_empty() {
            out.push(c.to_ascii_lowercase());
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(rule: &dyn LintRule, src: &str) -> Vec<LintError> {
        let doc = parse(src, None).document.unwrap();
        rule.check(&LintContext::new(&doc))
    }

    #[test]
    fn test_case_helpers() {
        assert!(is_camel_case("fetchTicker"));
        assert!(!is_camel_case("fetch_ticker"));
        assert!(!is_camel_case("FetchTicker"));
        assert_eq!(to_camel_case("fetch_order_book"), "fetchOrderBook");
        assert_eq!(to_camel_case("FetchTicker"), "fetchTicker");
    }

    #[test]
    fn test_case_collision() {
        let found = run(
            &EndpointCaseCollision,
            "id: ex\nendpoints:\n  - name: fetchOHLCV\n  - name: fetchOhlcv\n  - name: fetchOHLCV\n",
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("'fetchOhlcv'"));
    }

    #[test]
    fn test_inconsistent_case() {
        let found = run(
            &InconsistentEndpointCase,
            "id: ex\nendpoints:\n  - name: fetch_ticker\n  - name: fetchTrades\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hint.as_deref(), Some("rename to 'fetchTicker'"));
    }

    #[test]
    fn test_has_flag_case() {
        let found = run(
            &HasFlagCaseMismatch,
            "id: ex\nhas:\n  fetchOhlcv: true\n  fetchTicker: true\nendpoints:\n  - name: fetchOHLCV\n  - name: fetchTicker\n",
        );
        assert_eq!(found.len(), 1);
    }
}
