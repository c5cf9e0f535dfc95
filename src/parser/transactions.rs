//! `transactions:` and `wallet:` sub-parsers.

use std::collections::BTreeMap;

use edl_types::{
    TransactionParsingConfig, TransactionStatus, TransactionType, WalletEndpointSchema,
    WalletOperation, WalletParam, WalletSchema, CANONICAL_TRANSACTION_FIELDS,
};
use serde_yaml::{Mapping, Value};

use super::array_ops::Scope;
use super::context::{get, get_bool, get_map, get_str, scalar_string, ParseContext};
use super::document::{parse_field_mappings, parse_response, RESPONSE_ROOT_SCOPE};
use super::rate_limits::parse_cost_config;
use super::source_map::child_path;
use crate::diagnostics::DiagnosticCode;

const TRANSACTION_KEYS: &[&str] = &["mapping", "statusMap", "typeMap"];
const WALLET_KEYS: &[&str] = &["deposit", "withdraw", "transfer"];
const WALLET_ENDPOINT_KEYS: &[&str] = &[
    "endpoint",
    "method",
    "params",
    "response",
    "requiresAuth",
    "cost",
];

/// Names readable by transaction mapping expressions before any field is mapped
pub const TRANSACTION_ROOT_SCOPE: &[&str] = &["data"];

// =============================================================================
// TRANSACTIONS
// =============================================================================

pub fn parse_transactions(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
) -> TransactionParsingConfig {
    ctx.check_keys(map, path, TRANSACTION_KEYS);
    let mut config = TransactionParsingConfig {
        location: ctx.location(path),
        ..Default::default()
    };

    match get(map, "mapping") {
        Some(Value::Mapping(mapping)) => {
            let mapping_path = child_path(path, "mapping");
            ctx.check_keys(mapping, &mapping_path, CANONICAL_TRANSACTION_FIELDS);
            config.mapping = parse_field_mappings(
                ctx,
                mapping,
                &mapping_path,
                Scope::new(TRANSACTION_ROOT_SCOPE.iter().copied()),
            )
            .into_iter()
            .filter(|m| CANONICAL_TRANSACTION_FIELDS.contains(&m.field.as_str()))
            .collect();
        }
        Some(other) => ctx.type_error(&child_path(path, "mapping"), "a mapping", other),
        None => ctx.error(
            DiagnosticCode::MissingField,
            path,
            "transactions block requires a 'mapping'",
        ),
    }

    config.status_map = parse_value_map(
        ctx,
        map,
        path,
        "statusMap",
        TransactionStatus::from_name,
        "pending, ok, failed or canceled",
    );
    config.type_map = parse_value_map(
        ctx,
        map,
        path,
        "typeMap",
        TransactionType::from_name,
        "deposit, withdrawal or transfer",
    );
    config
}

/// Raw exchange string -> canonical enum table
fn parse_value_map<T>(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    key: &str,
    lookup: fn(&str) -> Option<T>,
    expected: &str,
) -> BTreeMap<String, T> {
    let mut out = BTreeMap::new();
    let table_path = child_path(path, key);
    let Some(table) = get(map, key) else {
        return out;
    };
    let Some(table) = table.as_mapping() else {
        ctx.type_error(&table_path, "a mapping", table);
        return out;
    };
    for (raw, canonical) in table {
        let Some(raw) = scalar_string(raw) else { continue };
        let entry_path = child_path(&table_path, &raw);
        match canonical.as_str().and_then(lookup) {
            Some(value) => {
                out.insert(raw, value);
            }
            None => ctx.error(
                DiagnosticCode::InvalidValue,
                &entry_path,
                format!(
                    "'{}' maps to {}, expected {}",
                    raw,
                    scalar_string(canonical).unwrap_or_else(|| "a non-string".into()),
                    expected
                ),
            ),
        }
    }
    out
}

// =============================================================================
// WALLET
// =============================================================================

pub fn parse_wallet(ctx: &mut ParseContext, map: &Mapping, path: &str) -> WalletSchema {
    ctx.check_keys(map, path, WALLET_KEYS);
    let mut wallet = WalletSchema::default();
    for operation in [
        WalletOperation::Deposit,
        WalletOperation::Withdraw,
        WalletOperation::Transfer,
    ] {
        let op_path = child_path(path, operation.as_str());
        let schema = match get(map, operation.as_str()) {
            Some(Value::Mapping(op_map)) => parse_wallet_endpoint(ctx, operation, op_map, &op_path),
            Some(Value::String(endpoint)) => Some(WalletEndpointSchema {
                operation,
                endpoint: endpoint.clone(),
                method: operation.default_http_method().to_string(),
                params: Vec::new(),
                response: None,
                requires_auth: true,
                cost: None,
                location: ctx.location(&op_path),
            }),
            Some(other) => {
                ctx.type_error(&op_path, "a wallet endpoint mapping", other);
                None
            }
            None => None,
        };
        match operation {
            WalletOperation::Deposit => wallet.deposit = schema,
            WalletOperation::Withdraw => wallet.withdraw = schema,
            WalletOperation::Transfer => wallet.transfer = schema,
        }
    }
    wallet
}

fn parse_wallet_endpoint(
    ctx: &mut ParseContext,
    operation: WalletOperation,
    map: &Mapping,
    path: &str,
) -> Option<WalletEndpointSchema> {
    ctx.check_keys(map, path, WALLET_ENDPOINT_KEYS);
    let endpoint = get(map, "endpoint").and_then(scalar_string).unwrap_or_default();
    if get(map, "endpoint").is_none() {
        ctx.error(
            DiagnosticCode::MissingField,
            path,
            format!("wallet {} requires an 'endpoint'", operation.as_str()),
        );
    }

    let mut params = Vec::new();
    if let Some(param_map) = get_map(map, "params") {
        let params_path = child_path(path, "params");
        for (key, value) in param_map {
            let Some(name) = scalar_string(key) else { continue };
            let param_path = child_path(&params_path, &name);
            let Some(source) = value.as_str() else {
                ctx.type_error(&param_path, "an argument name", value);
                continue;
            };
            if !operation.arguments().contains(&source) {
                ctx.error(
                    DiagnosticCode::InvalidValue,
                    &param_path,
                    format!(
                        "'{}' is not an argument of {}; expected one of: {}",
                        source,
                        operation.method_name(),
                        operation.arguments().join(", ")
                    ),
                );
                continue;
            }
            params.push(WalletParam {
                name,
                source: source.to_string(),
            });
        }
    } else if let Some(other) = get(map, "params") {
        ctx.type_error(&child_path(path, "params"), "a mapping of request keys", other);
    }

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

    let cost = match get(map, "cost") {
        Some(node) => parse_cost_config(ctx, node, &child_path(path, "cost")),
        None => None,
    };

    Some(WalletEndpointSchema {
        operation,
        endpoint,
        method: get_str(map, "method")
            .unwrap_or(operation.default_http_method())
            .to_string(),
        params,
        response,
        requires_auth: get_bool(map, "requiresAuth").unwrap_or(true),
        cost,
        location: ctx.location(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source_map::SourceMap;
    use edl_types::DocumentVersion;

    fn ctx_and_root(src: &str) -> (ParseContext, Mapping) {
        let root: Value = serde_yaml::from_str(src).unwrap();
        (
            ParseContext::new(SourceMap::build(src, None), DocumentVersion::V0),
            root.as_mapping().cloned().unwrap(),
        )
    }

    #[test]
    fn test_transactions_block() {
        let src = r#"
mapping:
  id: txId
  amount: { path: amount, transform: parseNumber }
  status: state
  fee: { compute: "toNumber(data.fee) + 0" }
statusMap:
  SUCCESS: ok
  PROCESSING: pending
typeMap:
  DEPOSIT: deposit
"#;
        let (mut ctx, root) = ctx_and_root(src);
        let config = parse_transactions(&mut ctx, &root, "");
        assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics);
        assert_eq!(config.mapping.len(), 4);
        assert_eq!(config.status_map.get("SUCCESS"), Some(&TransactionStatus::Ok));
        assert_eq!(config.type_map.get("DEPOSIT"), Some(&TransactionType::Deposit));
    }

    #[test]
    fn test_transactions_reject_unknown_status_and_field() {
        let src = "mapping:\n  nonce: n\nstatusMap:\n  DONE: finished\n";
        let (mut ctx, root) = ctx_and_root(src);
        let config = parse_transactions(&mut ctx, &root, "");
        assert!(config.mapping.is_empty());
        assert!(config.status_map.is_empty());
        let codes: Vec<_> = ctx.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![DiagnosticCode::UnknownKey, DiagnosticCode::InvalidValue]);
    }

    #[test]
    fn test_wallet_block() {
        let src = r#"
withdraw:
  endpoint: privatePostWithdraw
  params:
    coin: code
    quantity: amount
    addr: address
transfer:
  endpoint: privatePostTransfer
  params:
    asset: currency
deposit: privateGetDepositAddress
"#;
        let (mut ctx, root) = ctx_and_root(src);
        let wallet = parse_wallet(&mut ctx, &root, "");
        let withdraw = wallet.withdraw.as_ref().unwrap();
        assert_eq!(withdraw.method, "POST");
        assert_eq!(withdraw.params.len(), 3);
        assert_eq!(wallet.deposit.as_ref().unwrap().method, "GET");
        // `currency` is not a transfer argument
        assert_eq!(wallet.transfer.as_ref().unwrap().params.len(), 0);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::InvalidValue);
    }
}
