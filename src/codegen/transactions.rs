//! Wallet methods and the canonical transaction parser.

use edl_types::{
    EdlDocument, RateLimitSchema, TransactionParsingConfig, WalletEndpointSchema, WalletOperation,
};

use super::ast::{Expr, JsDoc, MethodDecl, Param, Stmt};
use super::generator::{request_call, response_statements, GeneratorOptions};
use super::lower::{lower_field, LowerEnv, DATA_VAR, REQUEST_VAR, RESULT_VAR};
use crate::analyzer::resolve_effective_cost;
use crate::error::GenerationError;

/// Signature type of a canonical wallet argument
fn argument_type(name: &str) -> &'static str {
    match name {
        "amount" => "number",
        "tag" => "Str",
        _ => "string",
    }
}

fn is_optional_argument(name: &str) -> bool {
    name == "tag"
}

// =============================================================================
// WALLET
// =============================================================================

pub fn generate_wallet_methods(
    doc: &EdlDocument,
    options: &GeneratorOptions,
) -> Result<Vec<MethodDecl>, GenerationError> {
    doc.wallet
        .operations()
        .map(|op| generate_wallet_method(doc, op, options))
        .collect()
}

fn generate_wallet_method(
    doc: &EdlDocument,
    op: &WalletEndpointSchema,
    options: &GeneratorOptions,
) -> Result<MethodDecl, GenerationError> {
    let method_name = op.operation.method_name();

    let mut method = MethodDecl::new(method_name);
    method.is_async = true;
    method.return_type = Some("Promise<any>".into());
    method.params = op
        .operation
        .arguments()
        .iter()
        .map(|arg| {
            let param = Param::typed(*arg, argument_type(arg));
            if is_optional_argument(arg) {
                param.with_default(Expr::Undefined)
            } else {
                param
            }
        })
        .collect();

    // A declared endpoint supplies path and category; otherwise the name is the path
    let (path, category) = match doc.endpoint(&op.endpoint) {
        Some(endpoint) => (endpoint.path.clone(), endpoint.category.clone()),
        None if op.requires_auth => (op.endpoint.clone(), "private".to_string()),
        None => (op.endpoint.clone(), "public".to_string()),
    };

    let mut entries = Vec::new();
    let mut optional = Vec::new();
    for param in &op.params {
        let value = Expr::ident(param.source.clone());
        if is_optional_argument(&param.source) {
            optional.push(Stmt::If {
                test: Expr::binary("!==", value.clone(), Expr::Undefined),
                then: vec![Stmt::Assign {
                    target: Expr::ident(REQUEST_VAR).index(Expr::str(param.name.clone())),
                    value,
                }],
                otherwise: None,
            });
        } else {
            entries.push((param.name.clone(), value));
        }
    }
    method.body.push(Stmt::constant(REQUEST_VAR, Some("Dict"), Expr::Object(entries)));
    method.body.extend(optional);

    let mut config = Vec::new();
    if let Some(cost) = &op.cost {
        let default_schema = RateLimitSchema::default();
        let schema = doc.rate_limits.as_ref().unwrap_or(&default_schema);
        let resolved = resolve_effective_cost(schema, method_name, Some(cost)).map_err(|e| {
            GenerationError::UnresolvedCost {
                endpoint: method_name.to_string(),
                reason: e.to_string(),
            }
        })?;
        config.push(("cost".to_string(), Expr::Num(resolved.cost)));
    }
    let http_method = op.method.to_ascii_uppercase();
    method.body.push(request_call(&path, &category, &http_method, config));

    match (&op.response, &doc.transactions) {
        (Some(response), _) => method.body.extend(response_statements(Some(response))?),
        (None, Some(_)) if op.operation != WalletOperation::Deposit => {
            method.body.push(Stmt::ret(Expr::this_call(
                "parseTransaction",
                vec![Expr::ident("response")],
            )));
        }
        _ => method.body.extend(response_statements(None)?),
    }

    if options.include_comments {
        method.doc = Some(JsDoc {
            description: vec![format!(
                "{} via {} {}",
                op.operation.as_str(),
                http_method,
                path
            )],
            params: op
                .operation
                .arguments()
                .iter()
                .map(|arg| (arg.to_string(), argument_type(arg).to_string(), None))
                .collect(),
            returns: Some("Promise<any>".into()),
        });
    }
    Ok(method)
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

pub fn generate_transaction_methods(
    doc: &EdlDocument,
    options: &GeneratorOptions,
) -> Result<Vec<MethodDecl>, GenerationError> {
    let Some(config) = &doc.transactions else {
        return Ok(Vec::new());
    };
    let mut methods = vec![parse_transaction(config, options)?];
    if !config.status_map.is_empty() {
        let table = config
            .status_map
            .iter()
            .map(|(raw, status)| (raw.clone(), Expr::str(status.as_str())))
            .collect();
        methods.push(lookup_method("parseTransactionStatus", "status", "statuses", table));
    }
    if !config.type_map.is_empty() {
        let table = config
            .type_map
            .iter()
            .map(|(raw, ty)| (raw.clone(), Expr::str(ty.as_str())))
            .collect();
        methods.push(lookup_method("parseTransactionType", "type", "types", table));
    }
    Ok(methods)
}

fn parse_transaction(
    config: &TransactionParsingConfig,
    options: &GeneratorOptions,
) -> Result<MethodDecl, GenerationError> {
    let mut method = MethodDecl::new("parseTransaction");
    method.params = vec![Param::typed(DATA_VAR, "Dict")];
    method.return_type = Some("Dict".into());

    method.body.push(Stmt::constant(
        RESULT_VAR,
        Some("Dict"),
        Expr::Object(vec![("info".to_string(), Expr::ident(DATA_VAR))]),
    ));

    let mut env = LowerEnv::transaction();
    for field in &config.mapping {
        let mut value = lower_field(field, &env)?;
        if field.field == "status" && !config.status_map.is_empty() {
            value = Expr::this_call("parseTransactionStatus", vec![value]);
        } else if field.field == "type" && !config.type_map.is_empty() {
            value = Expr::this_call("parseTransactionType", vec![value]);
        }
        method.body.push(Stmt::Assign {
            target: Expr::ident(RESULT_VAR).index(Expr::str(field.field.clone())),
            value,
        });
        env.add_field(&field.field);
    }
    method.body.push(Stmt::ret(Expr::ident(RESULT_VAR)));

    if options.include_comments {
        method.doc = Some(JsDoc {
            description: vec!["Maps a raw deposit, withdrawal or transfer record".into()],
            params: vec![(DATA_VAR.to_string(), "Dict".to_string(), None)],
            returns: Some("Dict".into()),
        });
    }
    Ok(method)
}

/// `name(arg: Str): Str` looking `arg` up in a literal table, falling back to `arg`
fn lookup_method(name: &str, arg: &str, table_var: &str, table: Vec<(String, Expr)>) -> MethodDecl {
    let mut method = MethodDecl::new(name);
    method.params = vec![Param::typed(arg, "Str")];
    method.return_type = Some("Str".into());
    method.body = vec![
        Stmt::constant(table_var, Some("Dict"), Expr::Object(table)),
        Stmt::ret(Expr::this_call(
            "safeString",
            vec![Expr::ident(table_var), Expr::ident(arg), Expr::ident(arg)],
        )),
    ];
    method
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::emitter::emit;
    use crate::codegen::generator::generate_exchange;
    use crate::parser::parse;

    fn generate(src: &str) -> String {
        let doc = parse(src, None).document.unwrap();
        let options = GeneratorOptions {
            include_comments: false,
            base_class: "Exchange".into(),
        };
        emit(&generate_exchange(&doc, &options).unwrap())
    }

    const WALLET_DOC: &str = r#"
id: ex1
transactions:
  mapping:
    id: txId
    amount: { path: amount, transform: parseNumber }
    status: state
  statusMap:
    SUCCESS: ok
    PROCESSING: pending
wallet:
  deposit: privateGetDepositAddress
  withdraw:
    endpoint: privatePostWithdraw
    params:
      coin: code
      quantity: amount
      addr: address
      memo: tag
"#;

    #[test]
    fn test_withdraw_method() {
        let code = generate(WALLET_DOC);
        assert!(code.contains(
            "async withdraw(code: string, amount: number, address: string, tag: Str = undefined): Promise<any> {"
        ));
        assert!(code.contains("if (tag !== undefined) {\n            request['memo'] = tag;\n        }"));
        assert!(code.contains(
            "const response = await this.request('privatePostWithdraw', 'private', 'POST', request);"
        ));
        assert!(code.contains("return this.parseTransaction(response);"));
    }

    #[test]
    fn test_deposit_returns_raw_response() {
        let code = generate(WALLET_DOC);
        assert!(code.contains("async fetchDepositAddress(code: string): Promise<any> {"));
        assert!(code.contains(
            "this.request('privateGetDepositAddress', 'private', 'GET', request);\n        return response;"
        ));
    }

    #[test]
    fn test_parse_transaction() {
        let code = generate(WALLET_DOC);
        let expected = "\
    parseTransaction(data: Dict): Dict {
        const result: Dict = { 'info': data };
        result['id'] = this.safeValue(data, 'txId');
        result['amount'] = this.safeNumber(data, 'amount');
        result['status'] = this.parseTransactionStatus(this.safeValue(data, 'state'));
        return result;
    }
";
        assert!(code.contains(expected), "{}", code);
        assert!(code.contains("return this.safeString(statuses, status, status);"));
        assert!(!code.contains("parseTransactionType"));
    }
}
