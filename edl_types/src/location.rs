//! Source locations and severities
//!
//! Every parsed node carries a [`SourceLocation`]; diagnostics from all stages
//! are ranked with [`Severity`].

use serde::{Deserialize, Serialize};

// ============================================================================
// SOURCE LOCATION AND POSITIONING
// ============================================================================

/// Source location in EDL content for error reporting.
///
/// Field order matters: the derived `Ord` sorts by line, then column, which is
/// what the linter relies on for stable diagnostic ordering.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SourceLocation {
    /// Line number (1-based, 0 when unknown)
    pub line: usize,
    /// Column number (1-based, 0 when unknown)
    pub column: usize,
    /// Optional filename or identifier for the source
    pub source_name: Option<String>,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            source_name: None,
        }
    }

    /// Create a source location with source name
    pub fn with_source(line: usize, column: usize, source_name: impl Into<String>) -> Self {
        Self {
            line,
            column,
            source_name: Some(source_name.into()),
        }
    }

    /// Location for nodes synthesized without a source position
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }

    /// Get a human-readable description of the location
    pub fn description(&self) -> String {
        match &self.source_name {
            Some(name) => format!("{}:{}:{}", name, self.line, self.column),
            None => format!("{}:{}", self.line, self.column),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// SEVERITY
// ============================================================================

/// Severity shared by parse, analyzer and lint diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message (never fails a compilation)
    Info,
    /// Warning (never fails a compilation)
    Warning,
    /// Error (fails a compilation unless downgraded by policy)
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_description() {
        assert_eq!(SourceLocation::new(3, 5).description(), "3:5");
        assert_eq!(
            SourceLocation::with_source(3, 5, "binance.edl.yaml").to_string(),
            "binance.edl.yaml:3:5"
        );
        assert!(!SourceLocation::unknown().is_known());
    }

    #[test]
    fn test_location_ordering() {
        let mut locs = vec![
            SourceLocation::new(4, 1),
            SourceLocation::new(2, 9),
            SourceLocation::new(2, 3),
        ];
        locs.sort();
        assert_eq!(locs[0], SourceLocation::new(2, 3));
        assert_eq!(locs[2], SourceLocation::new(4, 1));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
