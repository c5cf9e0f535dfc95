//! Interface methods of v2 documents.
//!
//! A method either forwards to one endpoint or dispatches between variants on
//! its selection parameter. Arguments are passed by name: an endpoint param the
//! method does not declare receives `undefined`.

use edl_types::{
    EdlDocument, EndpointDefinition, InterfaceMethod, ParamDefinition, ParamType, ParsedDocument,
};

use super::ast::{Expr, JsDoc, MethodDecl, Stmt};
use super::generator::{
    check_identifier, response_statements, signature_param, ts_type, validation_statements,
    GeneratorOptions,
};
use crate::analyzer::effective_params;
use crate::error::GenerationError;
use crate::names::NameKind;

const SELECTED_VAR: &str = "selected";

/// Interface methods paired with whether they dispatch (and so need `NotSupported`)
pub fn generate_interface_methods(
    parsed: &ParsedDocument,
    options: &GeneratorOptions,
) -> Result<Vec<(MethodDecl, bool)>, GenerationError> {
    let Some(interface) = parsed.interface() else {
        return Ok(Vec::new());
    };
    let doc = parsed.document();
    interface
        .methods
        .iter()
        .map(|method| {
            let dispatches = !method.variants.is_empty();
            generate_interface_method(doc, method, options).map(|decl| (decl, dispatches))
        })
        .collect()
}

fn target<'a>(
    doc: &'a EdlDocument,
    method: &InterfaceMethod,
    endpoint: &str,
) -> Result<&'a EndpointDefinition, GenerationError> {
    doc.endpoint(endpoint).ok_or_else(|| GenerationError::UnknownEndpoint {
        method: method.name.clone(),
        endpoint: endpoint.to_string(),
    })
}

/// Declared params, else the first target's; the selection param is always present
pub fn interface_params(
    doc: &EdlDocument,
    method: &InterfaceMethod,
) -> Result<Vec<ParamDefinition>, GenerationError> {
    let mut params = if method.params.is_empty() {
        match method.endpoints().first() {
            Some(first) => effective_params(doc, target(doc, method, first)?),
            None => Vec::new(),
        }
    } else {
        method.params.clone()
    };
    if let Some(selection) = &method.selection {
        if !params.iter().any(|p| p.name == selection.param) {
            params.push(ParamDefinition::new(selection.param.clone(), ParamType::String).optional());
        }
    }
    Ok(params)
}

/// `this.endpoint(a, undefined, c)` with trailing `undefined`s dropped
fn forward_call(doc: &EdlDocument, endpoint: &EndpointDefinition, params: &[ParamDefinition]) -> Expr {
    let mut args: Vec<Expr> = effective_params(doc, endpoint)
        .iter()
        .map(|p| {
            if params.iter().any(|own| own.name == p.name) {
                Expr::ident(p.name.clone())
            } else {
                Expr::Undefined
            }
        })
        .collect();
    while matches!(args.last(), Some(Expr::Undefined)) {
        args.pop();
    }
    Expr::this_call(&endpoint.name, args).awaited()
}

fn generate_interface_method(
    doc: &EdlDocument,
    method: &InterfaceMethod,
    options: &GeneratorOptions,
) -> Result<MethodDecl, GenerationError> {
    let params = interface_params(doc, method)?;
    check_identifier(&method.name, NameKind::Method)?;
    for param in &params {
        check_identifier(&param.name, NameKind::Param)?;
    }

    let mut decl = MethodDecl::new(method.name.clone());
    decl.is_async = true;
    decl.params = params.iter().map(signature_param).collect();
    decl.return_type = Some("Promise<any>".into());
    decl.body = validation_statements(&method.name, &params)?;

    match (&method.selection, method.variants.is_empty()) {
        (Some(selection), false) => {
            let chosen = Expr::ident(selection.param.clone());
            let value = match &selection.default {
                Some(default) => Expr::conditional(
                    Expr::binary("!==", chosen.clone(), Expr::Undefined),
                    chosen,
                    Expr::str(default.clone()),
                ),
                None => chosen,
            };
            decl.body.push(Stmt::constant(SELECTED_VAR, None, value));

            for variant in &method.variants {
                let endpoint = target(doc, method, &variant.endpoint)?;
                let call = forward_call(doc, endpoint, &params);
                let then = match &variant.response {
                    Some(response) => {
                        let mut stmts = vec![Stmt::constant("response", None, call)];
                        stmts.extend(response_statements(Some(response))?);
                        stmts
                    }
                    None => vec![Stmt::ret(call)],
                };
                decl.body.push(Stmt::If {
                    test: Expr::binary(
                        "===",
                        Expr::ident(SELECTED_VAR),
                        Expr::str(variant.name.clone()),
                    ),
                    then,
                    otherwise: None,
                });
            }

            let message = Expr::binary(
                "+",
                Expr::binary(
                    "+",
                    Expr::This.member("id"),
                    Expr::str(format!(" {}() does not support ", method.name)),
                ),
                Expr::ident(SELECTED_VAR),
            );
            decl.body.push(Stmt::Throw(Expr::New {
                callee: Box::new(Expr::ident("NotSupported")),
                args: vec![message],
            }));
        }
        _ => {
            let endpoint_name = method.endpoint.as_deref().unwrap_or_default();
            let endpoint = target(doc, method, endpoint_name)?;
            decl.body.push(Stmt::ret(forward_call(doc, endpoint, &params)));
        }
    }

    if options.include_comments {
        let mut description: Vec<String> = method
            .description
            .as_deref()
            .map(|d| d.lines().map(str::to_string).collect())
            .unwrap_or_default();
        if description.is_empty() {
            description.push(format!("Calls {}", method.endpoints().join(" or ")));
        }
        decl.doc = Some(JsDoc {
            description,
            params: params
                .iter()
                .map(|p| (p.name.clone(), ts_type(p).to_string(), p.description.clone()))
                .collect(),
            returns: Some(match &method.returns {
                Some(returns) => format!("Promise<{}>", returns),
                None => "Promise<any>".into(),
            }),
        });
    }
    Ok(decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::emitter::emit;
    use crate::codegen::generator::generate_exchange;
    use crate::parser::parse;

    const V2_DOC: &str = r#"
id: ex2
endpoints:
  - name: publicGetTicker
    path: ticker
    params:
      - name: symbol
  - name: privateGetAccount
    category: private
    path: account
  - name: privateGetFuturesAccount
    category: private
    path: futures/account
    params:
      - name: settle
        optional: true
interface:
  fetchTicker: publicGetTicker
  fetchBalance:
    selection: { param: type, default: spot }
    variants:
      spot: privateGetAccount
      swap:
        endpoint: privateGetFuturesAccount
"#;

    fn generate(src: &str) -> String {
        let parsed = parse(src, None).document.unwrap();
        let options = GeneratorOptions {
            include_comments: false,
            base_class: "Exchange".into(),
        };
        emit(&generate_exchange(&parsed, &options).unwrap())
    }

    #[test]
    fn test_single_endpoint_forwarding() {
        let code = generate(V2_DOC);
        assert!(code.contains(
            "    async fetchTicker(symbol: string): Promise<any> {\n        this.checkRequiredArgument('fetchTicker', symbol, 'symbol');\n        return await this.publicGetTicker(symbol);\n    }\n"
        ), "{}", code);
    }

    #[test]
    fn test_variant_dispatch() {
        let code = generate(V2_DOC);
        let expected = "\
    async fetchBalance(type: Str = undefined): Promise<any> {
        const selected = type !== undefined ? type : 'spot';
        if (selected === 'spot') {
            return await this.privateGetAccount();
        }
        if (selected === 'swap') {
            return await this.privateGetFuturesAccount();
        }
        throw new NotSupported(this.id + ' fetchBalance() does not support ' + selected);
    }
";
        assert!(code.contains(expected), "{}", code);
        assert!(code.contains("import { NotSupported } from './base/errors.js';"));
    }

    #[test]
    fn test_unknown_target_is_generation_error() {
        let src = "id: ex2\ninterface:\n  fetchTicker: publicGetTicker\n";
        let parsed = parse(src, None).document.unwrap();
        let err = generate_exchange(&parsed, &GeneratorOptions::default()).unwrap_err();
        assert_eq!(
            err,
            GenerationError::UnknownEndpoint {
                method: "fetchTicker".into(),
                endpoint: "publicGetTicker".into(),
            }
        );
    }
}
