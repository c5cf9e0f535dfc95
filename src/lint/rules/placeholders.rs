//! Placeholder syntax in endpoint paths, mapping paths and transforms.

use std::collections::BTreeSet;

use edl_types::{Severity, SourceLocation};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{LintContext, LintRule};
use crate::analyzer::effective_params;
use crate::lint::diagnostic::LintError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

/// Text fields that may carry placeholders, with their location and owner
fn placeholder_sites<'a>(ctx: &LintContext<'a>) -> Vec<(&'a str, SourceLocation, String, &'static str)> {
    let mut sites = Vec::new();
    for endpoint in ctx.endpoints() {
        sites.push((
            endpoint.path.as_str(),
            endpoint.location.clone(),
            format!("endpoint '{}'", endpoint.name),
            "path",
        ));
    }
    for site in ctx.mappings() {
        if let Some(path) = &site.field.path {
            sites.push((path.as_str(), site.field.location.clone(), site.owner.clone(), "mapping path"));
        }
        if let Some(transform) = &site.field.transform {
            sites.push((transform.as_str(), site.field.location.clone(), site.owner, "transform"));
        }
    }
    sites
}

/// Whether some `{` is never closed
fn has_unclosed_brace(text: &str) -> bool {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth > 0
}

pub struct UnterminatedPlaceholder;

impl LintRule for UnterminatedPlaceholder {
    fn id(&self) -> &'static str {
        "unterminated-placeholder"
    }

    fn description(&self) -> &'static str {
        "A '{' or '${' placeholder is never closed"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        placeholder_sites(ctx)
            .into_iter()
            .filter(|(text, ..)| has_unclosed_brace(text))
            .map(|(text, location, owner, what)| {
                self.finding(location, format!("unterminated placeholder in {} '{}'", what, text))
                    .with_element(owner)
                    .with_hint("close the placeholder with '}'")
            })
            .collect()
    }
}

pub struct AmbiguousPlaceholder;

impl LintRule for AmbiguousPlaceholder {
    fn id(&self) -> &'static str {
        "ambiguous-placeholder"
    }

    fn description(&self) -> &'static str {
        "Double-brace placeholders, or '{x}' mixed with '${x}' in one string"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let mut out = Vec::new();
        for (text, location, owner, what) in placeholder_sites(ctx) {
            let doubled = text.contains("{{") || text.contains("}}");
            let dollar = PLACEHOLDER
                .find_iter(text)
                .filter(|m| m.as_str().starts_with('$'))
                .count();
            let plain = PLACEHOLDER.find_iter(text).count() - dollar;
            if doubled || (dollar > 0 && plain > 0) {
                out.push(
                    self.finding(location, format!("ambiguous placeholder syntax in {} '{}'", what, text))
                        .with_element(owner)
                        .with_hint("use a single '{name}' style throughout"),
                );
            }
        }
        out
    }
}

pub struct UnknownPathPlaceholder;

impl LintRule for UnknownPathPlaceholder {
    fn id(&self) -> &'static str {
        "unknown-path-placeholder"
    }

    fn description(&self) -> &'static str {
        "Endpoint path placeholder that is not a declared param"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let doc = ctx.document();
        let mut out = Vec::new();
        for endpoint in ctx.endpoints() {
            let params: BTreeSet<String> = effective_params(doc, endpoint)
                .into_iter()
                .map(|p| p.name)
                .collect();
            for caps in PLACEHOLDER.captures_iter(&endpoint.path) {
                let name = &caps[1];
                if !params.contains(name) {
                    out.push(
                        self.finding(
                            endpoint.location.clone(),
                            format!(
                                "path '{}' of '{}' uses placeholder '{}' which is not a declared param",
                                endpoint.path, endpoint.name, name
                            ),
                        )
                        .with_element(format!("endpoint '{}'", endpoint.name)),
                    );
                }
            }
        }
        out
    }
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
    fn test_unclosed_brace() {
        assert!(has_unclosed_brace("orders/{id"));
        assert!(has_unclosed_brace("${symbol"));
        assert!(!has_unclosed_brace("orders/{id}/fills"));
        assert!(!has_unclosed_brace("plain/path"));
    }

    #[test]
    fn test_unterminated_in_path() {
        let found = run(
            &UnterminatedPlaceholder,
            "id: ex\nendpoints:\n  - name: fetchOrder\n    path: orders/{id\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Error);
    }

    #[test]
    fn test_ambiguous_mixed_styles() {
        let found = run(
            &AmbiguousPlaceholder,
            "id: ex\nendpoints:\n  - name: fetchOrder\n    path: '{market}/${id}'\n    params: [market, id]\n",
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_unknown_path_placeholder_uses_inherited_params() {
        let src = r#"
id: ex
fragments:
  byId:
    params: [id]
endpoints:
  - name: fetchOrder
    path: orders/{id}/{extra}
    uses: [byId]
"#;
        let found = run(&UnknownPathPlaceholder, src);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("'extra'"));
    }
}
