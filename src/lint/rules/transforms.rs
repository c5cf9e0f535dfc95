//! Transform chain rules.

use edl_types::Severity;

use super::{LintContext, LintRule};
use crate::codegen::transforms::is_known_transform;
use crate::lint::diagnostic::LintError;

pub struct MalformedTransformChain;

impl LintRule for MalformedTransformChain {
    fn id(&self) -> &'static str {
        "malformed-transform-chain"
    }

    fn description(&self) -> &'static str {
        "Transform chain with an empty segment or a dangling '|'"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        ctx.mappings()
            .into_iter()
            .filter_map(|site| {
                let chain = site.field.transform.as_ref()?;
                let segments = site.field.transform_chain();
                if !segments.iter().any(|s| s.is_empty()) {
                    return None;
                }
                Some(
                    self.finding(
                        site.field.location.clone(),
                        format!(
                            "transform chain '{}' of field '{}' has an empty segment",
                            chain, site.field.field
                        ),
                    )
                    .with_element(site.owner)
                    .with_hint("separate transform names with a single '|'"),
                )
            })
            .collect()
    }
}

pub struct UnknownTransform;

impl LintRule for UnknownTransform {
    fn id(&self) -> &'static str {
        "unknown-transform"
    }

    fn description(&self) -> &'static str {
        "Transform name outside the known transform set"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let mut out = Vec::new();
        for site in ctx.mappings() {
            for name in site.field.transform_chain() {
                if name.is_empty() || is_known_transform(name) {
                    continue;
                }
                out.push(
                    self.finding(
                        site.field.location.clone(),
                        format!("unknown transform '{}' on field '{}'", name, site.field.field),
                    )
                    .with_element(site.owner.clone()),
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const DOC: &str = r#"
id: ex
endpoints:
  - name: fetchTicker
    response:
      mapping:
        last: { path: data.last, transform: "parseNumber|" }
        bid: { path: data.bid, transform: "parseNumber|frobnicate" }
        ask: { path: data.ask, transform: "parseNumber | omitZero" }
"#;

    #[test]
    fn test_malformed_chain() {
        let doc = parse(DOC, None).document.unwrap();
        let found = MalformedTransformChain.check(&LintContext::new(&doc));
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("'last'"));
    }

    #[test]
    fn test_unknown_transform() {
        let doc = parse(DOC, None).document.unwrap();
        let found = UnknownTransform.check(&LintContext::new(&doc));
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("frobnicate"));
    }
}
