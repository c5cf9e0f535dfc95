use edl_types::Severity;

use super::{LintContext, LintRule};
use crate::expr::parse_expression;
use crate::lint::diagnostic::LintError;

pub struct InvalidComputeExpression;

impl LintRule for InvalidComputeExpression {
    fn id(&self) -> &'static str {
        "invalid-compute-expression"
    }

    fn description(&self) -> &'static str {
        "compute or required_if expression that does not parse"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let mut out = Vec::new();
        for site in ctx.mappings() {
            let Some(compute) = &site.field.compute else { continue };
            if compute.is_valid() {
                continue;
            }
            out.push(
                self.finding(
                    site.field.location.clone(),
                    format!(
                        "compute expression of field '{}' does not parse: {}",
                        site.field.field,
                        reason(&compute.source)
                    ),
                )
                .with_element(site.owner),
            );
        }
        for site in ctx.params() {
            let Some(guard) = &site.param.required_if else { continue };
            if guard.is_valid() {
                continue;
            }
            out.push(
                self.finding(
                    site.param.location.clone(),
                    format!(
                        "required_if of param '{}' does not parse: {}",
                        site.param.name,
                        reason(&guard.source)
                    ),
                )
                .with_element(site.owner),
            );
        }
        out
    }
}

fn reason(source: &str) -> String {
    match parse_expression(source) {
        Err(err) => err.to_string(),
        Ok(_) => "rejected".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_reports_compute_and_guard() {
        let src = r#"
id: ex
endpoints:
  - name: createOrder
    params:
      - name: price
        type: number
        required_if: "type ==="
    response:
      mapping:
        total: { compute: "price * (amount" }
"#;
        let doc = parse(src, None).document.unwrap();
        let found = InvalidComputeExpression.check(&LintContext::new(&doc));
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.severity == Severity::Error));
    }
}
