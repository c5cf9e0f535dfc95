//! Lint findings.

use serde::{Deserialize, Serialize};

use edl_types::{Severity, SourceLocation};

/// One finding of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintError {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    /// Document element the finding is about, e.g. `endpoint 'fetchTicker'`
    pub element: Option<String>,
    pub hint: Option<String>,
}

impl LintError {
    pub fn new(
        rule_id: &str,
        severity: Severity,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.into(),
            location,
            element: None,
            hint: None,
        }
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for LintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}[{}]: {}",
            self.location, self.severity, self.rule_id, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// Sorted findings of a lint pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResult {
    pub errors: Vec<LintError>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(LintError::is_error)
    }

    pub fn by_rule<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a LintError> {
        self.errors.iter().filter(move |e| e.rule_id == rule_id)
    }
}
