//! Runs a rule set over a document.

use edl_types::ParsedDocument;
use tracing::debug;

use super::diagnostic::{LintError, LintResult};
use super::rules::{get_all_rules, LintContext, LintRule};

/// Lint with every registered rule
pub fn lint(parsed: &ParsedDocument) -> LintResult {
    lint_with_rules(parsed, &get_all_rules())
}

/// Lint with an explicit rule set; output is sorted by location, rule, message
pub fn lint_with_rules(parsed: &ParsedDocument, rules: &[&dyn LintRule]) -> LintResult {
    let ctx = LintContext::new(parsed);
    let mut errors: Vec<LintError> = rules.iter().flat_map(|rule| rule.check(&ctx)).collect();
    errors.sort_by(|a, b| {
        a.location
            .cmp(&b.location)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.message.cmp(&b.message))
    });
    debug!(
        "Linted '{}' with {} rule(s): {} finding(s)",
        parsed.document().exchange.id,
        rules.len(),
        errors.len()
    );
    LintResult { errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::rules::{get_critical_rules, get_rule};
    use crate::parser::parse;

    const BAD: &str = r#"
id: ex
endpoints:
  - name: fetch_order
    path: orders/{id
    response:
      mapping:
        price: { path: data..price, transform: "parseNumber|" }
"#;

    #[test]
    fn test_output_sorted_by_location() {
        let doc = parse(BAD, None).document.unwrap();
        let result = lint(&doc);
        assert!(result.has_errors());
        let keys: Vec<_> = result
            .errors
            .iter()
            .map(|e| (e.location.clone(), e.rule_id.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_rule_order_does_not_matter() {
        let doc = parse(BAD, None).document.unwrap();
        let mut rules = get_all_rules();
        let forward = lint_with_rules(&doc, &rules);
        rules.reverse();
        let backward = lint_with_rules(&doc, &rules);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_reduced_rule_set() {
        let doc = parse(BAD, None).document.unwrap();
        let only = [get_rule("inconsistent-endpoint-case").unwrap()];
        let result = lint_with_rules(&doc, &only);
        assert_eq!(result.errors.len(), 1);

        let critical = lint_with_rules(&doc, &get_critical_rules());
        assert!(critical.by_rule("inconsistent-endpoint-case").next().is_none());
        assert!(critical.by_rule("unterminated-placeholder").next().is_some());
    }

    #[test]
    fn test_clean_document() {
        let src = r#"
id: ex
endpoints:
  - name: fetchOrder
    path: orders/{id}
    params: [id]
    response:
      mapping:
        price: { path: data.price, transform: parseNumber }
"#;
        let doc = parse(src, None).document.unwrap();
        assert!(lint(&doc).is_clean());
    }
}
