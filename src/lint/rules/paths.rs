use edl_types::{Severity, SourceLocation};

use super::{LintContext, LintRule};
use crate::lint::diagnostic::LintError;

pub struct MalformedMappingPath;

impl LintRule for MalformedMappingPath {
    fn id(&self) -> &'static str {
        "malformed-mapping-path"
    }

    fn description(&self) -> &'static str {
        "Mapping path with an empty segment or unbalanced brackets"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &LintContext<'_>) -> Vec<LintError> {
        let mut sites: Vec<(&str, SourceLocation, String)> = Vec::new();
        for (owner, response) in ctx.responses() {
            if let Some(path) = &response.path {
                sites.push((path.as_str(), response.location.clone(), owner));
            }
        }
        for site in ctx.mappings() {
            if let Some(path) = &site.field.path {
                sites.push((path.as_str(), site.field.location.clone(), site.owner));
            }
        }

        sites
            .into_iter()
            .filter_map(|(path, location, owner)| {
                let problem = path_problem(path)?;
                Some(
                    self.finding(location, format!("mapping path '{}' {}", path, problem))
                        .with_element(owner),
                )
            })
            .collect()
    }
}

/// Describe what is wrong with a dotted path, if anything
pub(crate) fn path_problem(path: &str) -> Option<&'static str> {
    if path.starts_with('.') || path.ends_with('.') {
        return Some("starts or ends with '.'");
    }
    if path.contains("..") {
        return Some("contains an empty segment");
    }
    let mut depth = 0i32;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Some("has an unmatched ']'");
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Some("has an unclosed '['");
    }
    if path.contains("[]") {
        return Some("has an empty index");
    }
    None
}
