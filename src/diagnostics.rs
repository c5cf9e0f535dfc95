//! Unified Diagnostics Module
//!
//! Single diagnostic type for parse-level (structural) and analyzer (semantic)
//! findings. Lint findings use [`crate::lint::LintError`] and are merged into the
//! same string lists by the compile driver.

use serde::{Deserialize, Serialize};

pub use edl_types::Severity;
use edl_types::SourceLocation;

/// Diagnostic codes for categorizing issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // =========================================================================
    // Fatal parse errors
    // =========================================================================
    YamlSyntax,
    InvalidRoot,

    // =========================================================================
    // Structural errors (parser, recoverable)
    // =========================================================================
    UnknownKey,
    InvalidType,
    MissingField,
    InvalidValue,
    InvalidExpression,
    InvalidArrayOperation,
    ScopeViolation,
    DuplicateFragment,

    // =========================================================================
    // Semantic errors (analyzer)
    // =========================================================================
    MissingExchangeId,
    DuplicateEndpoint,
    DuplicateParam,
    UnresolvedFragment,
    FragmentCycle,
    UnresolvedCostGroup,
    IncompatibleCostUnit,
    InvalidCost,
    HasFlagWithoutEndpoint,
    UnknownInterfaceEndpoint,
    InvalidSelectionDefault,
    InvalidWalletEndpoint,
    UnknownRequiredIfParam,
    InvalidIdentifier,

    // =========================================================================
    // Semantic warnings (analyzer)
    // =========================================================================
    UnusedFragment,
    UnknownRateLimitEndpoint,
    HasFlagDisabled,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::YamlSyntax => "yaml-syntax",
            DiagnosticCode::InvalidRoot => "invalid-root",
            DiagnosticCode::UnknownKey => "unknown-key",
            DiagnosticCode::InvalidType => "invalid-type",
            DiagnosticCode::MissingField => "missing-field",
            DiagnosticCode::InvalidValue => "invalid-value",
            DiagnosticCode::InvalidExpression => "invalid-expression",
            DiagnosticCode::InvalidArrayOperation => "invalid-array-operation",
            DiagnosticCode::ScopeViolation => "scope-violation",
            DiagnosticCode::DuplicateFragment => "duplicate-fragment",
            DiagnosticCode::MissingExchangeId => "missing-exchange-id",
            DiagnosticCode::DuplicateEndpoint => "duplicate-endpoint",
            DiagnosticCode::DuplicateParam => "duplicate-param",
            DiagnosticCode::UnresolvedFragment => "unresolved-fragment",
            DiagnosticCode::FragmentCycle => "fragment-cycle",
            DiagnosticCode::UnresolvedCostGroup => "unresolved-cost-group",
            DiagnosticCode::IncompatibleCostUnit => "incompatible-cost-unit",
            DiagnosticCode::InvalidCost => "invalid-cost",
            DiagnosticCode::HasFlagWithoutEndpoint => "has-flag-without-endpoint",
            DiagnosticCode::UnknownInterfaceEndpoint => "unknown-interface-endpoint",
            DiagnosticCode::InvalidSelectionDefault => "invalid-selection-default",
            DiagnosticCode::InvalidWalletEndpoint => "invalid-wallet-endpoint",
            DiagnosticCode::UnknownRequiredIfParam => "unknown-required-if-param",
            DiagnosticCode::InvalidIdentifier => "invalid-identifier",
            DiagnosticCode::UnusedFragment => "unused-fragment",
            DiagnosticCode::UnknownRateLimitEndpoint => "unknown-rate-limit-endpoint",
            DiagnosticCode::HasFlagDisabled => "has-flag-disabled",
        }
    }

    /// Codes that abort parsing outright
    pub fn is_fatal(&self) -> bool {
        matches!(self, DiagnosticCode::YamlSyntax | DiagnosticCode::InvalidRoot)
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Related information for multi-location diagnostics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInfo {
    pub message: String,
    pub location: SourceLocation,
}

/// A parse or analyzer finding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub location: SourceLocation,
    pub related: Vec<RelatedInfo>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(
        code: DiagnosticCode,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location,
            related: Vec::new(),
            hint: None,
        }
    }

    pub fn warning(
        code: DiagnosticCode,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            location,
            related: Vec::new(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, message: impl Into<String>, location: SourceLocation) -> Self {
        self.related.push(RelatedInfo {
            message: message.into(),
            location,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}[{}]: {}",
            self.location, self.severity, self.code, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// Split diagnostics into (errors, warnings); info findings count as warnings
pub fn partition(diagnostics: Vec<Diagnostic>) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
    diagnostics.into_iter().partition(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let d = Diagnostic::error(
            DiagnosticCode::DuplicateEndpoint,
            SourceLocation::new(7, 5),
            "endpoint 'fetchTicker' is declared twice",
        );
        assert!(d.is_error());
        assert!(!d.is_warning());
        assert_eq!(
            d.to_string(),
            "7:5 error[duplicate-endpoint]: endpoint 'fetchTicker' is declared twice"
        );
    }

    #[test]
    fn test_diagnostic_with_hint() {
        let d = Diagnostic::warning(
            DiagnosticCode::UnusedFragment,
            SourceLocation::new(2, 3),
            "fragment 'paging' is never used",
        )
        .with_hint("remove it or reference it from an endpoint's uses");
        assert!(d.to_string().ends_with("(hint: remove it or reference it from an endpoint's uses)"));
    }

    #[test]
    fn test_partition() {
        let diags = vec![
            Diagnostic::warning(DiagnosticCode::UnknownKey, SourceLocation::unknown(), "w"),
            Diagnostic::error(DiagnosticCode::InvalidType, SourceLocation::unknown(), "e"),
        ];
        let (errors, warnings) = partition(diags);
        assert_eq!(errors.len(), 1);
        assert_eq!(warnings.len(), 1);
    }
}
