//! v2 `interface:` sub-parser.

use edl_types::{InterfaceDefinition, InterfaceMethod, MethodSelection, MethodVariant};
use serde_yaml::{Mapping, Value};

use super::array_ops::Scope;
use super::context::{get, get_str, scalar_string, ParseContext};
use super::document::{parse_params, parse_response, RESPONSE_ROOT_SCOPE};
use super::source_map::child_path;
use crate::diagnostics::DiagnosticCode;

const METHOD_KEYS: &[&str] = &[
    "endpoint",
    "params",
    "returns",
    "selection",
    "variants",
    "description",
];
const SELECTION_KEYS: &[&str] = &["param", "default"];
const VARIANT_KEYS: &[&str] = &["endpoint", "response"];

pub fn parse_interface(ctx: &mut ParseContext, map: &Mapping, path: &str) -> InterfaceDefinition {
    let mut interface = InterfaceDefinition::default();
    for (key, value) in map {
        let Some(name) = scalar_string(key) else { continue };
        let method_path = child_path(path, &name);
        let method = match value {
            // `fetchTicker: publicGetTicker`
            Value::String(endpoint) => Some(InterfaceMethod {
                name,
                endpoint: Some(endpoint.clone()),
                params: Vec::new(),
                returns: None,
                selection: None,
                variants: Vec::new(),
                description: None,
                location: ctx.location(&method_path),
            }),
            Value::Mapping(body) => parse_method(ctx, name, body, &method_path),
            other => {
                ctx.type_error(&method_path, "an interface method mapping", other);
                None
            }
        };
        interface.methods.extend(method);
    }
    interface
}

fn parse_method(
    ctx: &mut ParseContext,
    name: String,
    map: &Mapping,
    path: &str,
) -> Option<InterfaceMethod> {
    ctx.check_keys(map, path, METHOD_KEYS);
    let mut method = InterfaceMethod {
        name,
        endpoint: get(map, "endpoint").and_then(scalar_string),
        params: Vec::new(),
        returns: get_str(map, "returns").map(String::from),
        selection: None,
        variants: Vec::new(),
        description: get_str(map, "description").map(String::from),
        location: ctx.location(path),
    };

    if let Some(params) = get(map, "params") {
        method.params = parse_params(ctx, params, &child_path(path, "params"));
    }

    let selection_path = child_path(path, "selection");
    method.selection = match get(map, "selection") {
        Some(Value::String(param)) => Some(MethodSelection {
            param: param.clone(),
            default: None,
            location: ctx.location(&selection_path),
        }),
        Some(Value::Mapping(selection)) => {
            ctx.check_keys(selection, &selection_path, SELECTION_KEYS);
            match get_str(selection, "param") {
                Some(param) => Some(MethodSelection {
                    param: param.to_string(),
                    default: get(selection, "default").and_then(scalar_string),
                    location: ctx.location(&selection_path),
                }),
                None => {
                    ctx.error(
                        DiagnosticCode::MissingField,
                        &selection_path,
                        "selection requires a 'param'",
                    );
                    None
                }
            }
        }
        Some(other) => {
            ctx.type_error(&selection_path, "a param name or {param, default}", other);
            None
        }
        None => None,
    };

    match get(map, "variants") {
        Some(Value::Mapping(variants)) => {
            let variants_path = child_path(path, "variants");
            for (key, value) in variants {
                let Some(variant_name) = scalar_string(key) else { continue };
                let variant_path = child_path(&variants_path, &variant_name);
                method.variants.extend(parse_variant(ctx, variant_name, value, &variant_path));
            }
        }
        Some(other) => ctx.type_error(&child_path(path, "variants"), "a mapping", other),
        None => {}
    }

    if method.endpoint.is_none() && method.variants.is_empty() {
        ctx.error(
            DiagnosticCode::MissingField,
            path,
            format!("interface method '{}' needs an 'endpoint' or 'variants'", method.name),
        );
        return None;
    }
    if !method.variants.is_empty() && method.selection.is_none() {
        ctx.error(
            DiagnosticCode::MissingField,
            path,
            format!("interface method '{}' has variants but no 'selection'", method.name),
        );
    }
    Some(method)
}

fn parse_variant(
    ctx: &mut ParseContext,
    name: String,
    node: &Value,
    path: &str,
) -> Option<MethodVariant> {
    match node {
        Value::String(endpoint) => Some(MethodVariant {
            name,
            endpoint: endpoint.clone(),
            response: None,
            location: ctx.location(path),
        }),
        Value::Mapping(map) => {
            ctx.check_keys(map, path, VARIANT_KEYS);
            let Some(endpoint) = get(map, "endpoint").and_then(scalar_string) else {
                ctx.error(DiagnosticCode::MissingField, path, "variant requires an 'endpoint'");
                return None;
            };
            let response = match get(map, "response") {
                Some(Value::Mapping(response)) => Some(parse_response(
                    ctx,
                    response,
                    &child_path(path, "response"),
                    Scope::new(RESPONSE_ROOT_SCOPE.iter().copied()),
                )),
                Some(other) => {
                    ctx.type_error(&child_path(path, "response"), "a mapping", other);
                    None
                }
                None => None,
            };
            Some(MethodVariant {
                name,
                endpoint,
                response,
                location: ctx.location(path),
            })
        }
        other => {
            ctx.type_error(path, "an endpoint name or variant mapping", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source_map::SourceMap;
    use edl_types::DocumentVersion;

    fn parse(src: &str) -> (InterfaceDefinition, ParseContext) {
        let root: Value = serde_yaml::from_str(src).unwrap();
        let mut ctx = ParseContext::new(SourceMap::build(src, None), DocumentVersion::V2);
        let interface = parse_interface(&mut ctx, root.as_mapping().unwrap(), "interface");
        (interface, ctx)
    }

    #[test]
    fn test_methods_and_variants() {
        let src = r#"
fetchTicker: publicGetTicker
fetchBalance:
  params:
    - name: type
      optional: true
  selection: { param: type, default: spot }
  variants:
    spot: privateGetAccount
    swap:
      endpoint: privateGetFuturesAccount
"#;
        let (interface, ctx) = parse(src);
        assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics);
        assert_eq!(interface.methods.len(), 2);
        let balance = interface.method("fetchBalance").unwrap();
        assert_eq!(balance.selection.as_ref().unwrap().default.as_deref(), Some("spot"));
        assert_eq!(balance.endpoints(), vec!["privateGetAccount", "privateGetFuturesAccount"]);
    }

    #[test]
    fn test_method_without_target() {
        let (interface, ctx) = parse("fetchTicker:\n  returns: Ticker\n");
        assert!(interface.is_empty());
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::MissingField);
    }
}
