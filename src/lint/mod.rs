//! Authoring linter.
//!
//! Independent of the analyzer: rules look for patterns that are valid YAML and
//! valid EDL but are known to break the generated client (placeholder typos,
//! malformed transform chains, case collisions).

pub mod diagnostic;
pub mod engine;
pub mod rules;

pub use diagnostic::{LintError, LintResult};
pub use engine::{lint, lint_with_rules};
pub use rules::{get_all_rules, get_critical_rules, get_rule, LintContext, LintRule};
