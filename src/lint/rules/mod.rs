//! Lint rules and the process-wide rule registry.
//!
//! Rules are stateless and independent: each one reads the document through a
//! [`LintContext`] and returns its own findings. The engine merges and sorts,
//! so registration order never changes a result.

mod expressions;
mod naming;
mod paths;
mod placeholders;
mod transforms;

use edl_types::{
    EdlDocument, EndpointDefinition, FieldMapping, ParamDefinition, ParsedDocument, ResponseMapping,
    Severity,
};
use once_cell::sync::Lazy;

use super::diagnostic::LintError;

pub use expressions::InvalidComputeExpression;
pub use naming::{EndpointCaseCollision, HasFlagCaseMismatch, InconsistentEndpointCase};
pub use paths::MalformedMappingPath;
pub use placeholders::{AmbiguousPlaceholder, UnknownPathPlaceholder, UnterminatedPlaceholder};
pub use transforms::{MalformedTransformChain, UnknownTransform};

/// A single lint check
pub trait LintRule: Send + Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn severity(&self) -> Severity;
    /// Part of the fast pre-check subset
    fn is_critical(&self) -> bool {
        false
    }
    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError>;

    /// Finding at this rule's id and severity
    fn finding(&self, location: edl_types::SourceLocation, message: String) -> LintError {
        LintError::new(self.id(), self.severity(), location, message)
    }
}

impl std::fmt::Debug for dyn LintRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LintRule")
            .field("id", &self.id())
            .field("severity", &self.severity())
            .finish()
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// A field mapping together with the element that owns it
pub struct MappingSite<'a> {
    pub owner: String,
    pub field: &'a FieldMapping,
}

/// A param together with the element that declares it
pub struct ParamSite<'a> {
    pub owner: String,
    pub param: &'a ParamDefinition,
}

/// Read-only view of a document shared by all rules
pub struct LintContext<'a> {
    pub parsed: &'a ParsedDocument,
}

impl<'a> LintContext<'a> {
    pub fn new(parsed: &'a ParsedDocument) -> Self {
        Self { parsed }
    }

    pub fn document(&self) -> &'a EdlDocument {
        self.parsed.document()
    }

    pub fn endpoints(&self) -> &'a [EndpointDefinition] {
        &self.document().endpoints
    }

    /// Every response mapping with its owner
    pub fn responses(&self) -> Vec<(String, &'a ResponseMapping)> {
        let doc = self.document();
        let mut out = Vec::new();
        for endpoint in &doc.endpoints {
            if let Some(response) = &endpoint.response {
                out.push((format!("endpoint '{}'", endpoint.name), response));
            }
        }
        if let Some(interface) = self.parsed.interface() {
            for method in &interface.methods {
                for variant in &method.variants {
                    if let Some(response) = &variant.response {
                        out.push((
                            format!("variant '{}' of '{}'", variant.name, method.name),
                            response,
                        ));
                    }
                }
            }
        }
        for op in doc.wallet.operations() {
            if let Some(response) = &op.response {
                out.push((format!("wallet '{}'", op.operation.as_str()), response));
            }
        }
        out
    }

    /// Every field mapping: responses first, then the transaction mapping
    pub fn mappings(&self) -> Vec<MappingSite<'a>> {
        let mut out: Vec<MappingSite<'a>> = self
            .responses()
            .into_iter()
            .flat_map(|(owner, response)| {
                response.fields.iter().map(move |field| MappingSite {
                    owner: owner.clone(),
                    field,
                })
            })
            .collect();
        if let Some(transactions) = &self.document().transactions {
            out.extend(transactions.mapping.iter().map(|field| MappingSite {
                owner: "transactions".to_string(),
                field,
            }));
        }
        out
    }

    /// Every declared param: endpoints, fragments, interface methods
    pub fn params(&self) -> Vec<ParamSite<'a>> {
        let doc = self.document();
        let mut out = Vec::new();
        for endpoint in &doc.endpoints {
            for param in &endpoint.params {
                out.push(ParamSite {
                    owner: format!("endpoint '{}'", endpoint.name),
                    param,
                });
            }
        }
        for fragment in doc.fragments.iter() {
            for param in &fragment.params {
                out.push(ParamSite {
                    owner: format!("fragment '{}'", fragment.name),
                    param,
                });
            }
        }
        if let Some(interface) = self.parsed.interface() {
            for method in &interface.methods {
                for param in &method.params {
                    out.push(ParamSite {
                        owner: format!("method '{}'", method.name),
                        param,
                    });
                }
            }
        }
        out
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

static REGISTRY: Lazy<Vec<Box<dyn LintRule>>> = Lazy::new(|| {
    vec![
        Box::new(UnterminatedPlaceholder),
        Box::new(AmbiguousPlaceholder),
        Box::new(UnknownPathPlaceholder),
        Box::new(MalformedTransformChain),
        Box::new(UnknownTransform),
        Box::new(EndpointCaseCollision),
        Box::new(InconsistentEndpointCase),
        Box::new(InvalidComputeExpression),
        Box::new(MalformedMappingPath),
        Box::new(HasFlagCaseMismatch),
    ]
});

/// Every registered rule
pub fn get_all_rules() -> Vec<&'static dyn LintRule> {
    REGISTRY.iter().map(|rule| rule.as_ref()).collect()
}

/// Rules used for fast pre-checks
pub fn get_critical_rules() -> Vec<&'static dyn LintRule> {
    REGISTRY
        .iter()
        .filter(|rule| rule.is_critical())
        .map(|rule| rule.as_ref())
        .collect()
}

pub fn get_rule(id: &str) -> Option<&'static dyn LintRule> {
    REGISTRY.iter().find(|rule| rule.id() == id).map(|rule| rule.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_ids_unique() {
        let rules = get_all_rules();
        let ids: HashSet<_> = rules.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), rules.len());
        assert_eq!(rules.len(), 10);
    }

    #[test]
    fn test_critical_subset() {
        let critical: Vec<_> = get_critical_rules().iter().map(|r| r.id()).collect();
        assert_eq!(
            critical,
            vec![
                "unterminated-placeholder",
                "unknown-path-placeholder",
                "malformed-transform-chain",
                "endpoint-case-collision",
                "invalid-compute-expression",
            ]
        );
        assert!(get_critical_rules()
            .iter()
            .all(|r| r.severity() == Severity::Error));
    }

    #[test]
    fn test_get_rule() {
        let rule = get_rule("unknown-transform").unwrap();
        assert_eq!(rule.severity(), Severity::Warning);
        assert!(get_rule("no-such-rule").is_none());
    }
}
