//! Lowers a validated document into a [`TsFile`].
//!
//! The generator reads only the document model. Anything it cannot lower is a
//! [`GenerationError`]: the analyzer should have rejected the document first.

use edl_types::{
    CostSource, EdlDocument, EndpointDefinition, HasFlag, HasFlagValue, ParamDefinition,
    ParamType, ParsedDocument, RateLimitSchema, ResponseMapping,
};
use tracing::debug;

use super::ast::{ArrowBody, ClassDecl, Expr, Import, JsDoc, MethodDecl, Param, Stmt, TsFile};
use super::lower::{lower_expr, lower_field, parse_path, path_access, LowerEnv, DATA_VAR, REQUEST_VAR, RESULT_VAR};
use super::{transactions, v2};
use crate::analyzer::{derive_has_table, effective_params, effective_requires_auth, resolve_endpoint_cost};
use crate::config::CompileOptions;
use crate::error::{CostResolutionError, GenerationError};
use crate::names::{identifier_problem, NameKind};

/// Generator settings taken from [`CompileOptions`]
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    pub include_comments: bool,
    pub base_class: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::from(&CompileOptions::default())
    }
}

impl From<&CompileOptions> for GeneratorOptions {
    fn from(options: &CompileOptions) -> Self {
        Self {
            include_comments: options.include_comments,
            base_class: options.base_class.clone(),
        }
    }
}

pub fn generate_exchange(
    parsed: &ParsedDocument,
    options: &GeneratorOptions,
) -> Result<TsFile, GenerationError> {
    let doc = parsed.document();
    if doc.exchange.id.trim().is_empty() {
        return Err(GenerationError::MissingExchangeId);
    }
    let name = class_name(&doc.exchange.id);
    if name.is_empty() {
        return Err(GenerationError::InvalidIdentifier {
            name: doc.exchange.id.clone(),
            reason: "has no letters or digits to form a class name".to_string(),
        });
    }

    let mut methods = vec![generate_describe(parsed)?];
    for endpoint in &doc.endpoints {
        methods.push(generate_endpoint_method(doc, endpoint, options)?);
    }
    let interface_methods = v2::generate_interface_methods(parsed, options)?;
    let dispatches = interface_methods.iter().any(|(_, dispatch)| *dispatch);
    methods.extend(interface_methods.into_iter().map(|(method, _)| method));
    methods.extend(transactions::generate_wallet_methods(doc, options)?);
    methods.extend(transactions::generate_transaction_methods(doc, options)?);

    let mut imports = vec![
        Import::new(&[options.base_class.as_str()], "./base/Exchange.js"),
        Import::types(&["Dict", "Int", "Num", "Str"], "./base/types.js"),
    ];
    if dispatches {
        imports.push(Import::new(&["NotSupported"], "./base/errors.js"));
    }

    let header = match &doc.source_name {
        Some(name) => vec![
            format!("Generated by edl-compiler from {}.", name),
            "Do not edit by hand.".to_string(),
        ],
        None => vec!["Generated by edl-compiler.".to_string(), "Do not edit by hand.".to_string()],
    };

    debug!(
        "Generated class for '{}' with {} method(s)",
        doc.exchange.id,
        methods.len()
    );

    Ok(TsFile {
        header,
        imports,
        class: ClassDecl {
            name,
            extends: Some(options.base_class.clone()),
            methods,
        },
    })
}

/// Reject names the emitted code cannot declare
pub(super) fn check_identifier(name: &str, kind: NameKind) -> Result<(), GenerationError> {
    match identifier_problem(name, kind) {
        Some(reason) => Err(GenerationError::InvalidIdentifier {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// `binance-us` -> `BinanceUs`
pub fn class_name(id: &str) -> String {
    let mut name: String = id
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

// =============================================================================
// DESCRIBE
// =============================================================================

fn generate_describe(parsed: &ParsedDocument) -> Result<MethodDecl, GenerationError> {
    let doc = parsed.document();
    let exchange = &doc.exchange;

    let mut props: Vec<(String, Expr)> = vec![("id".into(), Expr::str(exchange.id.clone()))];
    if let Some(name) = &exchange.name {
        props.push(("name".into(), Expr::str(name.clone())));
    }
    if !exchange.countries.is_empty() {
        props.push((
            "countries".into(),
            Expr::Array(exchange.countries.iter().map(|c| Expr::str(c.clone())).collect()),
        ));
    }
    if let Some(rate_limit) = exchange.rate_limit {
        props.push(("rateLimit".into(), Expr::Num(rate_limit)));
    }
    if let Some(version) = &exchange.version {
        props.push(("version".into(), Expr::str(version.clone())));
    }
    if exchange.certified {
        props.push(("certified".into(), Expr::Bool(true)));
    }
    if exchange.pro {
        props.push(("pro".into(), Expr::Bool(true)));
    }
    if !exchange.urls.is_empty() {
        props.push((
            "urls".into(),
            Expr::Object(
                exchange
                    .urls
                    .iter()
                    .map(|(k, v)| (k.clone(), Expr::from_json(v)))
                    .collect(),
            ),
        ));
    }
    if !doc.endpoints.is_empty() {
        props.push(("api".into(), api_table(doc)?));
    }
    props.push(("has".into(), has_table(parsed)));
    if let Some(schema) = &doc.rate_limits {
        props.push(("rateLimits".into(), rate_limit_table(doc, schema)?));
    }

    let mut method = MethodDecl::new("describe");
    method.return_type = Some("any".into());
    method.body.push(Stmt::ret(Expr::this_call(
        "deepExtend",
        vec![
            Expr::ident("super").method_call("describe", vec![]),
            Expr::Object(props),
        ],
    )));
    Ok(method)
}

fn cost_error(err: CostResolutionError, endpoint: &str) -> GenerationError {
    GenerationError::UnresolvedCost {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    }
}

/// `{category: {method: {path: cost}}}` in first-seen order
fn api_table(doc: &EdlDocument) -> Result<Expr, GenerationError> {
    let mut categories: Vec<(String, Vec<(String, Vec<(String, Expr)>)>)> = Vec::new();
    for endpoint in &doc.endpoints {
        let cost = resolve_endpoint_cost(doc, endpoint).map_err(|e| cost_error(e, &endpoint.name))?;
        let method = endpoint.method.as_str().to_ascii_lowercase();

        let ci = match categories.iter().position(|(c, _)| *c == endpoint.category) {
            Some(i) => i,
            None => {
                categories.push((endpoint.category.clone(), Vec::new()));
                categories.len() - 1
            }
        };
        let methods = &mut categories[ci].1;
        let mi = match methods.iter().position(|(m, _)| *m == method) {
            Some(i) => i,
            None => {
                methods.push((method, Vec::new()));
                methods.len() - 1
            }
        };
        let paths = &mut methods[mi].1;
        if !paths.iter().any(|(p, _)| *p == endpoint.path) {
            paths.push((endpoint.path.clone(), Expr::Num(cost.cost)));
        }
    }

    Ok(Expr::Object(
        categories
            .into_iter()
            .map(|(category, methods)| {
                let methods = methods
                    .into_iter()
                    .map(|(method, paths)| (method, Expr::Object(paths)))
                    .collect();
                (category, Expr::Object(methods))
            })
            .collect(),
    ))
}

fn flag_value(value: HasFlagValue) -> Expr {
    match value {
        HasFlagValue::Bool(b) => Expr::Bool(b),
        HasFlagValue::Emulated => Expr::str("emulated"),
    }
}

fn has_table(parsed: &ParsedDocument) -> Expr {
    Expr::Object(
        derive_has_table(parsed)
            .into_iter()
            .map(|(name, flag)| {
                let value = match flag {
                    HasFlag::Simple { value } => flag_value(value),
                    HasFlag::Market { markets } => Expr::Object(
                        markets
                            .entries()
                            .into_iter()
                            .map(|(market, value)| (market.as_str().to_string(), flag_value(value)))
                            .collect(),
                    ),
                };
                (name, value)
            })
            .collect(),
    )
}

fn rate_limit_table(doc: &EdlDocument, schema: &RateLimitSchema) -> Result<Expr, GenerationError> {
    let mut props = vec![("unit".to_string(), Expr::str(schema.unit.as_str()))];
    if let Some(global) = &schema.global {
        let t = &global.throttle;
        props.push((
            "global".into(),
            Expr::Object(vec![
                ("capacity".into(), Expr::Num(t.capacity)),
                ("refillRate".into(), Expr::Num(t.refill_rate)),
                ("interval".into(), Expr::Num(t.interval)),
                ("unit".into(), Expr::str(t.unit.as_str())),
            ]),
        ));
    }
    if !schema.groups.is_empty() {
        let groups = schema
            .groups
            .iter()
            .map(|g| {
                let mut entry = vec![("cost".to_string(), Expr::Num(g.cost))];
                if let Some(unit) = g.unit {
                    entry.push(("unit".into(), Expr::str(unit.as_str())));
                }
                (g.name.clone(), Expr::Object(entry))
            })
            .collect();
        props.push(("groups".into(), Expr::Object(groups)));
    }
    let mut endpoints = Vec::new();
    for endpoint in &doc.endpoints {
        let cost = resolve_endpoint_cost(doc, endpoint).map_err(|e| cost_error(e, &endpoint.name))?;
        endpoints.push((
            endpoint.name.clone(),
            Expr::Object(vec![
                ("cost".into(), Expr::Num(cost.cost)),
                ("unit".into(), Expr::str(cost.unit.as_str())),
            ]),
        ));
    }
    if !endpoints.is_empty() {
        props.push(("endpoints".into(), Expr::Object(endpoints)));
    }
    Ok(Expr::Object(props))
}

// =============================================================================
// ENDPOINT METHODS
// =============================================================================

pub(super) fn ts_type(param: &ParamDefinition) -> &'static str {
    let optional = !param.required;
    match param.param_type {
        ParamType::String if optional => "Str",
        ParamType::String => "string",
        ParamType::Number if optional => "Num",
        ParamType::Number => "number",
        ParamType::Integer | ParamType::Timestamp => "Int",
        ParamType::Boolean => "boolean",
        ParamType::Object => "Dict",
        ParamType::Array => "any[]",
        ParamType::Any => "any",
    }
}

/// Signature parameter: `name: T`, `name: T = default`, or `name: T = undefined`
pub(super) fn signature_param(param: &ParamDefinition) -> Param {
    let decl = Param::typed(param.name.clone(), ts_type(param));
    match &param.default {
        Some(default) => decl.with_default(Expr::from_json(default)),
        None if !param.required => decl.with_default(Expr::Undefined),
        None => decl,
    }
}

/// Params whose value is always defined inside the method
fn always_defined(param: &ParamDefinition) -> bool {
    param.required || param.default.is_some()
}

fn check_argument(method: &str, param: &ParamDefinition, with_enum: bool) -> Stmt {
    let mut args = vec![
        Expr::str(method),
        Expr::ident(param.name.clone()),
        Expr::str(param.name.clone()),
    ];
    if with_enum && !param.enum_values.is_empty() {
        args.push(Expr::Array(param.enum_values.iter().map(Expr::from_json).collect()));
    }
    Stmt::Expr(Expr::this_call("checkRequiredArgument", args))
}

pub(super) fn validation_statements(
    method: &str,
    params: &[ParamDefinition],
) -> Result<Vec<Stmt>, GenerationError> {
    let guard_env = LowerEnv::default();
    let mut stmts = Vec::new();
    for param in params {
        if param.required {
            stmts.push(check_argument(method, param, true));
        } else if !param.enum_values.is_empty() {
            stmts.push(Stmt::If {
                test: Expr::binary("!==", Expr::ident(param.name.clone()), Expr::Undefined),
                then: vec![check_argument(method, param, true)],
                otherwise: None,
            });
        }
        if let Some(guard) = &param.required_if {
            let parsed = guard
                .parsed
                .as_ref()
                .ok_or_else(|| GenerationError::UnparsedExpression {
                    context: format!("required_if of '{}'", param.name),
                    source_text: guard.source.clone(),
                })?;
            stmts.push(Stmt::If {
                test: lower_expr(parsed, &guard_env),
                then: vec![check_argument(method, param, false)],
                otherwise: None,
            });
        }
    }
    Ok(stmts)
}

/// `const request: Dict = {...}` plus conditional assignments for optional params
pub(super) fn request_statements(params: &[(String, &ParamDefinition)]) -> Vec<Stmt> {
    let mut entries = Vec::new();
    let mut optional = Vec::new();
    for (key, param) in params {
        let value = Expr::ident(param.name.clone());
        if always_defined(param) {
            entries.push((key.clone(), value));
        } else {
            optional.push(Stmt::If {
                test: Expr::binary("!==", value.clone(), Expr::Undefined),
                then: vec![Stmt::Assign {
                    target: Expr::ident(REQUEST_VAR).index(Expr::str(key.clone())),
                    value,
                }],
                otherwise: None,
            });
        }
    }
    let mut stmts = vec![Stmt::constant(REQUEST_VAR, Some("Dict"), Expr::Object(entries))];
    stmts.extend(optional);
    stmts
}

/// `const response = await this.request(path, category, METHOD, request[, config])`
pub(super) fn request_call(path: &str, category: &str, method: &str, config: Vec<(String, Expr)>) -> Stmt {
    let mut args = vec![
        Expr::str(path),
        Expr::str(category),
        Expr::str(method),
        Expr::ident(REQUEST_VAR),
    ];
    if !config.is_empty() {
        args.push(Expr::Object(config));
    }
    Stmt::constant("response", None, Expr::this_call("request", args).awaited())
}

/// Statements shaping `response` into the method result
pub(super) fn response_statements(
    response: Option<&ResponseMapping>,
) -> Result<Vec<Stmt>, GenerationError> {
    let raw = Expr::ident("response");
    let Some(mapping) = response else {
        return Ok(vec![Stmt::ret(raw)]);
    };
    let payload = match &mapping.path {
        Some(path) => path_access(raw, &parse_path(path)),
        None => raw,
    };

    let mut env = LowerEnv::response();
    let mut body = vec![Stmt::constant(RESULT_VAR, Some("Dict"), Expr::Object(Vec::new()))];
    for field in &mapping.fields {
        body.push(Stmt::Assign {
            target: Expr::ident(RESULT_VAR).index(Expr::str(field.field.clone())),
            value: lower_field(field, &env)?,
        });
        env.add_field(&field.field);
    }
    body.push(Stmt::ret(Expr::ident(RESULT_VAR)));

    if mapping.is_array {
        let mapper = Expr::Arrow {
            params: vec![Param::typed(DATA_VAR, "Dict")],
            body: ArrowBody::Block(body),
        };
        return Ok(vec![Stmt::ret(
            Expr::this_call("toArray", vec![payload]).method_call("map", vec![mapper]),
        )]);
    }

    let mut stmts = vec![Stmt::constant(DATA_VAR, None, payload)];
    stmts.extend(body);
    Ok(stmts)
}

fn endpoint_doc(endpoint: &EndpointDefinition, params: &[ParamDefinition]) -> JsDoc {
    let description = endpoint.description.clone().unwrap_or_else(|| {
        format!(
            "Calls the {} {} {} endpoint",
            endpoint.category, endpoint.method, endpoint.path
        )
    });
    JsDoc {
        description: description.lines().map(str::to_string).collect(),
        params: params
            .iter()
            .map(|p| (p.name.clone(), ts_type(p).to_string(), p.description.clone()))
            .collect(),
        returns: Some("Promise<any>".into()),
    }
}

fn generate_endpoint_method(
    doc: &EdlDocument,
    endpoint: &EndpointDefinition,
    options: &GeneratorOptions,
) -> Result<MethodDecl, GenerationError> {
    if let Some(missing) = endpoint.uses.iter().find(|r| doc.fragments.resolve(r).is_none()) {
        return Err(GenerationError::UnresolvedFragment {
            endpoint: endpoint.name.clone(),
            fragment: missing.name.clone(),
        });
    }

    let params = effective_params(doc, endpoint);
    check_identifier(&endpoint.name, NameKind::Method)?;
    for param in &params {
        check_identifier(&param.name, NameKind::Param)?;
    }
    let cost = resolve_endpoint_cost(doc, endpoint).map_err(|e| cost_error(e, &endpoint.name))?;

    let mut config = Vec::new();
    if cost.source != CostSource::Default {
        config.push(("cost".to_string(), Expr::Num(cost.cost)));
    }
    if effective_requires_auth(doc, endpoint) && endpoint.category == "public" {
        config.push(("auth".to_string(), Expr::Bool(true)));
    }

    let mut method = MethodDecl::new(endpoint.name.clone());
    method.is_async = true;
    method.params = params.iter().map(signature_param).collect();
    method.return_type = Some("Promise<any>".into());

    method.body = validation_statements(&endpoint.name, &params)?;
    let keyed: Vec<(String, &ParamDefinition)> = params.iter().map(|p| (p.name.clone(), p)).collect();
    method.body.extend(request_statements(&keyed));
    method.body.push(request_call(
        &endpoint.path,
        &endpoint.category,
        endpoint.method.as_str(),
        config,
    ));
    method.body.extend(response_statements(endpoint.response.as_ref())?);

    if options.include_comments {
        method.doc = Some(endpoint_doc(endpoint, &params));
        method.comments = endpoint.comments.clone();
    }
    Ok(method)
}
