//! Endpoint, parameter and response-mapping sub-parsers plus the exchange
//! identity block.

use edl_types::{
    EndpointDefinition, ExchangeInfo, FieldMapping, FragmentReference, HttpMethod,
    ParamDefinition, ParamType, ResponseMapping,
};
use serde_yaml::{Mapping, Value};

use super::array_ops::{
    check_expression_scope, is_array_operation, parse_array_operation, parse_safe_expression,
    Scope,
};
use super::context::{get, get_bool, get_map, get_str, scalar_string, to_json, ParseContext};
use super::rate_limits::parse_cost_config;
use super::source_map::{child_path, index_path};
use crate::diagnostics::DiagnosticCode;

const EXCHANGE_KEYS: &[&str] = &[
    "id",
    "name",
    "countries",
    "version",
    "rateLimit",
    "certified",
    "pro",
    "urls",
];

const ENDPOINT_KEYS: &[&str] = &[
    "name",
    "path",
    "method",
    "category",
    "params",
    "uses",
    "cost",
    "auth",
    "response",
    "description",
];

const PARAM_KEYS: &[&str] = &[
    "name",
    "type",
    "required",
    "optional",
    "default",
    "enum",
    "description",
    "required_if",
    "requiredIf",
];

const RESPONSE_KEYS: &[&str] = &["path", "isArray", "mapping"];

const FIELD_KEYS: &[&str] = &["path", "transform", "default", "literal", "compute"];

/// Names readable by response mapping expressions before any field is mapped
pub const RESPONSE_ROOT_SCOPE: &[&str] = &["data", "response", "params"];

// =============================================================================
// EXCHANGE IDENTITY
// =============================================================================

/// Identity from the `exchange:` block, falling back to root-level shorthands
pub fn parse_exchange_info(ctx: &mut ParseContext, root: &Mapping) -> ExchangeInfo {
    let mut info = ExchangeInfo {
        location: ctx.location(""),
        ..Default::default()
    };

    // Root shorthands first so the exchange block can override them
    apply_identity(ctx, root, "", &mut info);
    match get(root, "exchange") {
        Some(Value::Mapping(block)) => {
            ctx.check_keys(block, "exchange", EXCHANGE_KEYS);
            info.location = ctx.location("exchange");
            apply_identity(ctx, block, "exchange", &mut info);
            if let Some(rate_limit) = get(block, "rateLimit") {
                match rate_limit.as_f64() {
                    Some(ms) => info.rate_limit = Some(ms),
                    None => ctx.type_error(&child_path("exchange", "rateLimit"), "a number", rate_limit),
                }
            }
            info.certified = get_bool(block, "certified").unwrap_or(false);
            info.pro = get_bool(block, "pro").unwrap_or(false);
        }
        Some(other) => ctx.type_error("exchange", "a mapping", other),
        None => {}
    }
    info
}

fn apply_identity(ctx: &mut ParseContext, map: &Mapping, path: &str, info: &mut ExchangeInfo) {
    if let Some(id) = get(map, "id") {
        match scalar_string(id) {
            Some(id) => info.id = id,
            None => ctx.type_error(&child_path(path, "id"), "a string", id),
        }
    }
    if let Some(name) = get_str(map, "name") {
        info.name = Some(name.to_string());
    }
    if let Some(version) = get(map, "version").and_then(scalar_string) {
        info.version = Some(version);
    }
    match get(map, "countries") {
        Some(Value::Sequence(seq)) => {
            info.countries = seq.iter().filter_map(scalar_string).collect();
        }
        Some(Value::String(single)) => info.countries = vec![single.clone()],
        Some(other) => ctx.type_error(&child_path(path, "countries"), "a list of strings", other),
        None => {}
    }
    match get(map, "urls") {
        Some(Value::Mapping(urls)) => {
            for (key, value) in urls {
                if let Some(key) = scalar_string(key) {
                    info.urls.insert(key, to_json(value));
                }
            }
        }
        Some(other) => ctx.type_error(&child_path(path, "urls"), "a mapping", other),
        None => {}
    }
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Values an endpoint inherits from where it is declared (api tree position)
#[derive(Debug, Clone, Default)]
pub struct EndpointDefaults {
    pub name: Option<String>,
    pub path: Option<String>,
    pub category: Option<String>,
    pub method: Option<HttpMethod>,
}

/// `endpoints:` as a list of endpoint mappings or a mapping name -> endpoint
pub fn parse_endpoint_list(ctx: &mut ParseContext, node: &Value, path: &str) -> Vec<EndpointDefinition> {
    match node {
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let item_path = index_path(path, i);
                match item {
                    Value::Mapping(map) => {
                        parse_endpoint(ctx, map, &item_path, EndpointDefaults::default())
                    }
                    Value::String(name) => {
                        let mut endpoint = EndpointDefinition::new(name.clone());
                        endpoint.location = ctx.location(&item_path);
                        endpoint.comments = ctx.comments(&item_path);
                        Some(endpoint)
                    }
                    other => {
                        ctx.type_error(&item_path, "an endpoint mapping", other);
                        None
                    }
                }
            })
            .collect(),
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(key, value)| {
                let name = scalar_string(key)?;
                let item_path = child_path(path, &name);
                let defaults = EndpointDefaults {
                    name: Some(name),
                    ..Default::default()
                };
                match value {
                    Value::Mapping(map) => parse_endpoint(ctx, map, &item_path, defaults),
                    Value::Null => parse_endpoint(ctx, &Mapping::new(), &item_path, defaults),
                    other => {
                        ctx.type_error(&item_path, "an endpoint mapping", other);
                        None
                    }
                }
            })
            .collect(),
        other => {
            ctx.type_error(path, "a list of endpoints", other);
            Vec::new()
        }
    }
}

pub fn parse_endpoint(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    defaults: EndpointDefaults,
) -> Option<EndpointDefinition> {
    ctx.check_keys(map, path, ENDPOINT_KEYS);

    let name = match get(map, "name") {
        Some(node) => match scalar_string(node) {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                ctx.error(
                    DiagnosticCode::InvalidValue,
                    &child_path(path, "name"),
                    "endpoint name must be a non-empty string",
                );
                return None;
            }
        },
        None => match defaults.name {
            Some(name) => name,
            None => {
                ctx.error(DiagnosticCode::MissingField, path, "endpoint is missing 'name'");
                return None;
            }
        },
    };

    let mut endpoint = EndpointDefinition::new(name);
    endpoint.location = ctx.location(path);
    endpoint.comments = ctx.comments(path);

    endpoint.path = match get(map, "path") {
        Some(node) => scalar_string(node).unwrap_or_else(|| {
            ctx.type_error(&child_path(path, "path"), "a string", node);
            endpoint.name.clone()
        }),
        None => defaults.path.unwrap_or_else(|| endpoint.name.clone()),
    };

    endpoint.method = match get(map, "method") {
        Some(node) => match node.as_str().and_then(HttpMethod::from_name) {
            Some(method) => method,
            None => {
                ctx.error(
                    DiagnosticCode::InvalidValue,
                    &child_path(path, "method"),
                    format!(
                        "unsupported HTTP method {}, expected GET, POST, PUT, DELETE or PATCH",
                        scalar_string(node).unwrap_or_default()
                    ),
                );
                HttpMethod::Get
            }
        },
        None => defaults.method.unwrap_or_default(),
    };

    let auth = get_bool(map, "auth");
    let category = get_str(map, "category").map(String::from).or(defaults.category);
    endpoint.category = match (&category, auth) {
        (Some(c), _) => c.clone(),
        (None, Some(true)) => "private".to_string(),
        (None, _) => "public".to_string(),
    };
    endpoint.requires_auth = auth.unwrap_or(endpoint.category != "public");

    if let Some(params) = get(map, "params") {
        endpoint.params = parse_params(ctx, params, &child_path(path, "params"));
    }
    if let Some(uses) = get(map, "uses") {
        endpoint.uses = parse_uses(ctx, uses, &child_path(path, "uses"));
    }
    if let Some(cost) = get(map, "cost") {
        endpoint.cost = parse_cost_config(ctx, cost, &child_path(path, "cost"));
    }
    endpoint.description = get_str(map, "description").map(String::from);

    match get(map, "response") {
        Some(Value::Mapping(response)) => {
            let scope = Scope::new(RESPONSE_ROOT_SCOPE.iter().copied());
            endpoint.response = Some(parse_response(ctx, response, &child_path(path, "response"), scope));
        }
        Some(Value::Null) | None => {}
        Some(other) => ctx.type_error(&child_path(path, "response"), "a mapping", other),
    }

    Some(endpoint)
}

/// Fragment references: a name, a list of names, or `{$ref|fragment: name}` entries
pub fn parse_uses(ctx: &mut ParseContext, node: &Value, path: &str) -> Vec<FragmentReference> {
    let single = |ctx: &mut ParseContext, node: &Value, path: &str| -> Option<FragmentReference> {
        let name = match node {
            Value::String(name) => Some(name.clone()),
            Value::Mapping(map) => get_str(map, "$ref")
                .or_else(|| get_str(map, "fragment"))
                .map(String::from),
            _ => None,
        };
        match name {
            Some(name) => Some(FragmentReference::new(name, ctx.location(path))),
            None => {
                ctx.type_error(path, "a fragment name", node);
                None
            }
        }
    };

    match node {
        Value::Sequence(seq) => {
            let mut refs: Vec<FragmentReference> = Vec::with_capacity(seq.len());
            for (i, item) in seq.iter().enumerate() {
                let item_path = index_path(path, i);
                let Some(reference) = single(ctx, item, &item_path) else { continue };
                if refs.iter().any(|r| r.name == reference.name) {
                    ctx.warning(
                        DiagnosticCode::DuplicateFragment,
                        &item_path,
                        format!("fragment '{}' is listed more than once", reference.name),
                    );
                    continue;
                }
                refs.push(reference);
            }
            refs
        }
        other => single(ctx, other, path).into_iter().collect(),
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Params as a list (mappings or bare names) or a mapping name -> type | param
pub fn parse_params(ctx: &mut ParseContext, node: &Value, path: &str) -> Vec<ParamDefinition> {
    match node {
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .filter_map(|(i, item)| parse_param(ctx, None, item, &index_path(path, i)))
            .collect(),
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(key, value)| {
                let name = scalar_string(key)?;
                let param_path = child_path(path, &name);
                parse_param(ctx, Some(name), value, &param_path)
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            ctx.type_error(path, "a list of params", other);
            Vec::new()
        }
    }
}

fn parse_param(
    ctx: &mut ParseContext,
    name_hint: Option<String>,
    node: &Value,
    path: &str,
) -> Option<ParamDefinition> {
    let map = match node {
        Value::Mapping(map) => map,
        // `- symbol` in a list, or `symbol: string` in a mapping
        Value::String(text) => {
            let (name, type_name) = match name_hint {
                Some(name) => (name, Some(text.as_str())),
                None => (text.clone(), None),
            };
            let param_type = match type_name {
                Some(t) => param_type(ctx, t, path),
                None => ParamType::String,
            };
            let mut param = ParamDefinition::new(name, param_type);
            param.location = ctx.location(path);
            return Some(param);
        }
        Value::Null if name_hint.is_some() => {
            let mut param = ParamDefinition::new(name_hint.unwrap_or_default(), ParamType::String);
            param.location = ctx.location(path);
            return Some(param);
        }
        other => {
            ctx.type_error(path, "a param mapping or name", other);
            return None;
        }
    };

    ctx.check_keys(map, path, PARAM_KEYS);
    let name = match get_str(map, "name").map(String::from).or(name_hint) {
        Some(name) if !name.is_empty() => name,
        _ => {
            ctx.error(DiagnosticCode::MissingField, path, "param is missing 'name'");
            return None;
        }
    };
    let param_type = match get_str(map, "type") {
        Some(t) => param_type(ctx, t, &child_path(path, "type")),
        None => ParamType::String,
    };

    let mut param = ParamDefinition::new(name, param_type);
    param.location = ctx.location(path);
    param.default = get(map, "default").map(to_json);
    param.description = get_str(map, "description").map(String::from);
    param.required = match (get_bool(map, "required"), get_bool(map, "optional")) {
        (Some(required), _) => required,
        (None, Some(optional)) => !optional,
        (None, None) => param.default.is_none(),
    };

    match get(map, "enum") {
        Some(Value::Sequence(values)) => param.enum_values = values.iter().map(to_json).collect(),
        Some(other) => ctx.type_error(&child_path(path, "enum"), "a list", other),
        None => {}
    }

    let (guard_key, guard) = match get(map, "required_if") {
        Some(node) => ("required_if", Some(node)),
        None => ("requiredIf", get(map, "requiredIf")),
    };
    if let Some(guard) = guard {
        let guard_path = child_path(path, guard_key);
        match guard {
            Value::String(text) => {
                param.required_if = Some(parse_safe_expression(ctx, text, &guard_path, "required_if"));
            }
            other => ctx.type_error(&guard_path, "an expression string", other),
        }
    }

    Some(param)
}

fn param_type(ctx: &mut ParseContext, name: &str, path: &str) -> ParamType {
    ParamType::from_name(name).unwrap_or_else(|| {
        ctx.error(
            DiagnosticCode::InvalidValue,
            path,
            format!("unknown param type '{}'", name),
        );
        ParamType::Any
    })
}

// =============================================================================
// RESPONSE MAPPINGS
// =============================================================================

/// `{path, isArray, mapping}`; each mapped field joins the scope of later fields
pub fn parse_response(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    scope: Scope,
) -> ResponseMapping {
    ctx.check_keys(map, path, RESPONSE_KEYS);
    let mut response = ResponseMapping {
        path: get(map, "path").and_then(scalar_string),
        is_array: get_bool(map, "isArray").unwrap_or(false),
        fields: Vec::new(),
        location: ctx.location(path),
    };
    if let Some(mapping) = get_map(map, "mapping") {
        response.fields = parse_field_mappings(ctx, mapping, &child_path(path, "mapping"), scope);
    } else if let Some(other) = get(map, "mapping") {
        ctx.type_error(&child_path(path, "mapping"), "a mapping", other);
    }
    response
}

/// Ordered field mappings; fields are visible to the fields after them
pub fn parse_field_mappings(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    mut scope: Scope,
) -> Vec<FieldMapping> {
    let mut fields = Vec::new();
    for (key, value) in map {
        let Some(field) = scalar_string(key) else {
            ctx.type_error(path, "string field names", key);
            continue;
        };
        let field_path = child_path(path, &field);
        if let Some(mapping) = parse_field_mapping(ctx, &field, value, &field_path, &scope) {
            fields.push(mapping);
        }
        scope.insert(field);
    }
    fields
}

pub fn parse_field_mapping(
    ctx: &mut ParseContext,
    field: &str,
    node: &Value,
    path: &str,
    scope: &Scope,
) -> Option<FieldMapping> {
    let mut mapping = FieldMapping {
        field: field.to_string(),
        path: None,
        transform: None,
        default: None,
        literal: None,
        compute: None,
        operation: None,
        location: ctx.location(path),
    };

    let map = match node {
        Value::String(source) => {
            mapping.path = Some(source.clone());
            return Some(mapping);
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {
            mapping.literal = Some(to_json(node));
            return Some(mapping);
        }
        Value::Mapping(map) => map,
        other => {
            ctx.type_error(path, "a path string or field mapping", other);
            return None;
        }
    };

    if is_array_operation(map) {
        mapping.operation = Some(parse_array_operation(ctx, map, path, scope)?);
        return Some(mapping);
    }

    ctx.check_keys(map, path, FIELD_KEYS);
    mapping.path = get(map, "path").and_then(scalar_string);
    mapping.default = get(map, "default").map(to_json);
    mapping.literal = get(map, "literal").map(to_json);
    match get(map, "transform") {
        Some(Value::String(chain)) => mapping.transform = Some(chain.clone()),
        Some(other) => ctx.type_error(&child_path(path, "transform"), "a transform chain string", other),
        None => {}
    }
    match get(map, "compute") {
        Some(Value::String(text)) => {
            let compute_path = child_path(path, "compute");
            let expr = parse_safe_expression(ctx, text, &compute_path, "compute");
            if let Some(parsed) = &expr.parsed {
                check_expression_scope(ctx, parsed, scope, &compute_path);
            }
            mapping.compute = Some(expr);
        }
        Some(other) => ctx.type_error(&child_path(path, "compute"), "an expression string", other),
        None => {}
    }

    if mapping.path.is_none() && mapping.literal.is_none() && mapping.compute.is_none() {
        ctx.error(
            DiagnosticCode::MissingField,
            path,
            format!("field '{}' needs one of 'path', 'literal', 'compute' or 'op'", field),
        );
        return None;
    }
    Some(mapping)
}

// =============================================================================
// LEGACY API TREE
// =============================================================================

/// `api: {category: {method: [paths] | {path: endpoint | cost}}}`
pub fn parse_api_tree(ctx: &mut ParseContext, api: &Mapping, path: &str) -> Vec<EndpointDefinition> {
    let mut endpoints = Vec::new();
    for (category_key, category_node) in api {
        let Some(category) = scalar_string(category_key) else {
            ctx.type_error(path, "string category names", category_key);
            continue;
        };
        let category_path = child_path(path, &category);
        let Some(methods) = category_node.as_mapping() else {
            ctx.type_error(&category_path, "a mapping of HTTP methods", category_node);
            continue;
        };

        for (method_key, list) in methods {
            let method_name = scalar_string(method_key).unwrap_or_default();
            let method_path = child_path(&category_path, &method_name);
            let Some(method) = HttpMethod::from_name(&method_name) else {
                ctx.error(
                    DiagnosticCode::InvalidValue,
                    &method_path,
                    format!("'{}' is not an HTTP method", method_name),
                );
                continue;
            };
            endpoints.extend(parse_api_method(ctx, list, &method_path, &category, method));
        }
    }
    endpoints
}

fn parse_api_method(
    ctx: &mut ParseContext,
    node: &Value,
    path: &str,
    category: &str,
    method: HttpMethod,
) -> Vec<EndpointDefinition> {
    let defaults_for = |api_path: &str| EndpointDefaults {
        name: Some(api_method_name(category, method, api_path)),
        path: Some(api_path.to_string()),
        category: Some(category.to_string()),
        method: Some(method),
    };

    let mut endpoints = Vec::new();
    match node {
        Value::Sequence(seq) => {
            for (i, item) in seq.iter().enumerate() {
                let item_path = index_path(path, i);
                match item {
                    Value::String(api_path) => {
                        let mut endpoint = EndpointDefinition::new(api_method_name(category, method, api_path));
                        endpoint.path = api_path.clone();
                        endpoint.category = category.to_string();
                        endpoint.method = method;
                        endpoint.requires_auth = category != "public";
                        endpoint.location = ctx.location(&item_path);
                        endpoint.comments = ctx.comments(&item_path);
                        endpoints.push(endpoint);
                    }
                    Value::Mapping(map) => {
                        let defaults = match get_str(map, "path") {
                            Some(api_path) => defaults_for(api_path),
                            None => EndpointDefaults {
                                category: Some(category.to_string()),
                                method: Some(method),
                                ..Default::default()
                            },
                        };
                        endpoints.extend(parse_endpoint(ctx, map, &item_path, defaults));
                    }
                    other => ctx.type_error(&item_path, "an endpoint path", other),
                }
            }
        }
        Value::Mapping(map) => {
            for (key, value) in map {
                let Some(api_path) = scalar_string(key) else {
                    continue;
                };
                let item_path = child_path(path, &api_path);
                match value {
                    Value::Mapping(inner) => {
                        endpoints.extend(parse_endpoint(ctx, inner, &item_path, defaults_for(&api_path)));
                    }
                    Value::Null | Value::Number(_) => {
                        let mut endpoint = parse_endpoint(ctx, &Mapping::new(), &item_path, defaults_for(&api_path));
                        if let (Some(endpoint), Some(cost)) = (endpoint.as_mut(), value.as_f64()) {
                            endpoint.cost = Some(edl_types::RawCostConfig::Fixed(cost));
                        }
                        endpoints.extend(endpoint);
                    }
                    other => ctx.type_error(&item_path, "an endpoint mapping or cost", other),
                }
            }
        }
        other => ctx.type_error(path, "a list or mapping of endpoint paths", other),
    }
    endpoints
}

/// `public` + `GET` + `ticker/price` -> `publicGetTickerPrice`
pub fn api_method_name(category: &str, method: HttpMethod, api_path: &str) -> String {
    let mut name = category.to_string();
    name.push_str(&capitalize(&method.as_str().to_ascii_lowercase()));
    for segment in api_path.split(|c: char| !c.is_ascii_alphanumeric()) {
        name.push_str(&capitalize(segment));
    }
    name
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source_map::SourceMap;
    use edl_types::DocumentVersion;
    use pretty_assertions::assert_eq;

    fn ctx_and_root(src: &str) -> (ParseContext, Mapping) {
        let root: Value = serde_yaml::from_str(src).unwrap();
        (
            ParseContext::new(SourceMap::build(src, None), DocumentVersion::V0),
            root.as_mapping().cloned().unwrap(),
        )
    }

    #[test]
    fn test_api_method_name() {
        assert_eq!(api_method_name("public", HttpMethod::Get, "ticker/price"), "publicGetTickerPrice");
        assert_eq!(api_method_name("private", HttpMethod::Post, "order"), "privatePostOrder");
        assert_eq!(
            api_method_name("public", HttpMethod::Get, "markets/{symbol}/trades"),
            "publicGetMarketsSymbolTrades"
        );
    }

    #[test]
    fn test_param_forms() {
        let src = r#"
params:
  - symbol
  - name: limit
    type: integer
    default: 100
  - name: since
    type: timestamp
    optional: true
  - name: side
    enum: [buy, sell]
"#;
        let (mut ctx, root) = ctx_and_root(src);
        let params = parse_params(&mut ctx, get(&root, "params").unwrap(), "params");
        assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics);

        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["symbol", "limit", "since", "side"]);
        assert!(params[0].required);
        assert!(!params[1].required);
        assert_eq!(params[1].default, Some(serde_json::json!(100)));
        assert!(!params[2].required);
        assert_eq!(params[2].param_type, ParamType::Timestamp);
        assert_eq!(params[3].enum_values.len(), 2);
        assert_eq!(params[1].location.line, 4);
    }

    #[test]
    fn test_params_as_mapping() {
        let (mut ctx, root) = ctx_and_root("params:\n  symbol: string\n  limit:\n    type: int\n    required: false\n");
        let params = parse_params(&mut ctx, get(&root, "params").unwrap(), "params");
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].param_type, ParamType::Integer);
        assert!(!params[1].required);
    }

    #[test]
    fn test_unknown_param_type() {
        let (mut ctx, root) = ctx_and_root("params:\n  - name: x\n    type: decimal\n");
        let params = parse_params(&mut ctx, get(&root, "params").unwrap(), "params");
        assert_eq!(params[0].param_type, ParamType::Any);
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::InvalidValue);
    }

    #[test]
    fn test_endpoint_defaults_and_auth() {
        let (mut ctx, root) = ctx_and_root("name: fetchBalance\nauth: true\nmethod: post\n");
        let endpoint = parse_endpoint(&mut ctx, &root, "", EndpointDefaults::default()).unwrap();
        assert_eq!(endpoint.path, "fetchBalance");
        assert_eq!(endpoint.category, "private");
        assert_eq!(endpoint.method, HttpMethod::Post);
        assert!(endpoint.requires_auth);
    }

    #[test]
    fn test_endpoint_missing_name() {
        let (mut ctx, root) = ctx_and_root("path: /ticker\n");
        assert!(parse_endpoint(&mut ctx, &root, "", EndpointDefaults::default()).is_none());
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::MissingField);
    }

    #[test]
    fn test_response_fields_see_earlier_fields() {
        let src = r#"
path: result
mapping:
  bid: { path: bidPrice, transform: parseNumber }
  ask: { path: askPrice, transform: parseNumber }
  spread: { compute: "ask - bid" }
  mid: { compute: "(ask + bid) / 2 + later" }
  later: 1
"#;
        let (mut ctx, root) = ctx_and_root(src);
        let response = parse_response(&mut ctx, &root, "", Scope::new(RESPONSE_ROOT_SCOPE.iter().copied()));
        assert_eq!(response.fields.len(), 5);
        assert_eq!(response.path.as_deref(), Some("result"));
        // Only `later` is out of scope where `mid` reads it
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::ScopeViolation);
        assert!(ctx.diagnostics[0].message.contains("'later'"));
    }

    #[test]
    fn test_invalid_compute_is_kept_unparsed() {
        let (mut ctx, root) = ctx_and_root("mapping:\n  x: { compute: \"data.a +\" }\n");
        let response = parse_response(&mut ctx, &root, "", Scope::new(["data"]));
        let compute = response.fields[0].compute.as_ref().unwrap();
        assert!(!compute.is_valid());
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::InvalidExpression);
    }

    #[test]
    fn test_api_tree() {
        let src = r#"
api:
  public:
    get:
      - ticker/price
      - depth
  private:
    post:
      order: 5
"#;
        let (mut ctx, root) = ctx_and_root(src);
        let endpoints = parse_api_tree(&mut ctx, get_map(&root, "api").unwrap(), "api");
        assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics);
        let names: Vec<_> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["publicGetTickerPrice", "publicGetDepth", "privatePostOrder"]);
        assert_eq!(endpoints[0].path, "ticker/price");
        assert!(endpoints[2].requires_auth);
        assert_eq!(endpoints[2].cost, Some(edl_types::RawCostConfig::Fixed(5.0)));
    }
}
