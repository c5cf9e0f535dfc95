//! `fragments:` sub-parser.
//!
//! Fragments may be declared as a mapping keyed by name or as a list of
//! mappings with a `name` key. Only the list form can repeat a name; the second
//! declaration is reported and dropped.

use edl_types::{FragmentDefinition, FragmentRegistry, RegistryError};
use serde_yaml::{Mapping, Value};

use super::context::{get, get_bool, get_str, scalar_string, ParseContext};
use super::document::{parse_params, parse_uses};
use super::rate_limits::parse_cost_config;
use super::source_map::{child_path, index_path};
use crate::diagnostics::{Diagnostic, DiagnosticCode};

const FRAGMENT_KEYS: &[&str] = &["name", "params", "uses", "cost", "auth", "description"];

pub fn parse_fragments(ctx: &mut ParseContext, node: &Value, path: &str) -> FragmentRegistry {
    let mut registry = FragmentRegistry::new();

    let entries: Vec<(Option<String>, &Value, String)> = match node {
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(k, v)| {
                let name = scalar_string(k)?;
                let entry_path = child_path(path, &name);
                Some((Some(name), v, entry_path))
            })
            .collect(),
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .map(|(i, v)| (None, v, index_path(path, i)))
            .collect(),
        other => {
            ctx.type_error(path, "a mapping of fragments", other);
            return registry;
        }
    };

    for (name, value, entry_path) in entries {
        let fragment = match value {
            Value::Mapping(map) => parse_fragment(ctx, name, map, &entry_path),
            Value::Null => name.map(|name| {
                let mut fragment = FragmentDefinition::new(name);
                fragment.location = ctx.location(&entry_path);
                fragment
            }),
            other => {
                ctx.type_error(&entry_path, "a fragment mapping", other);
                None
            }
        };
        let Some(fragment) = fragment else { continue };

        if let Err(RegistryError::DuplicateFragment { name, first }) = registry.insert(fragment) {
            let diag = Diagnostic::error(
                DiagnosticCode::DuplicateFragment,
                ctx.location(&entry_path),
                format!("fragment '{}' is declared more than once", name),
            )
            .with_related("first declared here", first);
            ctx.push(diag);
        }
    }
    registry
}

fn parse_fragment(
    ctx: &mut ParseContext,
    name_hint: Option<String>,
    map: &Mapping,
    path: &str,
) -> Option<FragmentDefinition> {
    ctx.check_keys(map, path, FRAGMENT_KEYS);
    let Some(name) = get_str(map, "name").map(String::from).or(name_hint) else {
        ctx.error(DiagnosticCode::MissingField, path, "fragment is missing 'name'");
        return None;
    };

    let mut fragment = FragmentDefinition::new(name);
    fragment.location = ctx.location(path);
    if let Some(params) = get(map, "params") {
        fragment.params = parse_params(ctx, params, &child_path(path, "params"));
    }
    if let Some(uses) = get(map, "uses") {
        fragment.uses = parse_uses(ctx, uses, &child_path(path, "uses"));
    }
    if let Some(cost) = get(map, "cost") {
        fragment.cost = parse_cost_config(ctx, cost, &child_path(path, "cost"));
    }
    fragment.requires_auth = get_bool(map, "auth");
    fragment.description = get_str(map, "description").map(String::from);
    Some(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source_map::SourceMap;
    use edl_types::DocumentVersion;

    fn parse(src: &str) -> (FragmentRegistry, ParseContext) {
        let root: Value = serde_yaml::from_str(src).unwrap();
        let mut ctx = ParseContext::new(SourceMap::build(src, None), DocumentVersion::V0);
        let registry = parse_fragments(&mut ctx, &root, "fragments");
        (registry, ctx)
    }

    #[test]
    fn test_repeated_use_is_dropped_with_warning() {
        let src = "A:\n  uses: [B]\nB:\n  uses: [A, A]\n";
        let (registry, ctx) = parse(src);
        assert_eq!(registry.get("B").unwrap().uses.len(), 1);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::DuplicateFragment);
        assert!(ctx.diagnostics[0].is_warning());
    }

    #[test]
    fn test_mapping_form() {
        let src = r#"
paging:
  params:
    - name: limit
      type: integer
      optional: true
  uses: [symbolParam]
symbolParam:
  params: [symbol]
"#;
        let (registry, ctx) = parse(src);
        assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics);
        assert_eq!(registry.len(), 2);
        let paging = registry.get("paging").unwrap();
        assert_eq!(paging.params[0].name, "limit");
        assert_eq!(paging.uses[0].name, "symbolParam");
    }

    #[test]
    fn test_duplicate_in_list_form() {
        let src = "- name: paging\n- name: paging\n";
        let (registry, ctx) = parse(src);
        assert_eq!(registry.len(), 1);
        assert_eq!(ctx.diagnostics.len(), 1);
        let diag = &ctx.diagnostics[0];
        assert_eq!(diag.code, DiagnosticCode::DuplicateFragment);
        assert_eq!(diag.related.len(), 1);
    }
}
