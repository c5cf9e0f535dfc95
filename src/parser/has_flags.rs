//! `has:` sub-parser.

use edl_types::{HasFlag, HasFlagEntry, HasFlagValue, MarketHasOverride, MarketType};
use serde_yaml::{Mapping, Value};

use super::context::{scalar_string, ParseContext};
use super::source_map::child_path;
use crate::diagnostics::DiagnosticCode;

pub fn parse_has_flags(ctx: &mut ParseContext, map: &Mapping, path: &str) -> Vec<HasFlagEntry> {
    let mut entries = Vec::new();
    for (key, value) in map {
        let Some(name) = scalar_string(key) else {
            ctx.type_error(path, "string flag names", key);
            continue;
        };
        let flag_path = child_path(path, &name);
        let flag = match value {
            Value::Mapping(markets) => parse_market_override(ctx, markets, &flag_path)
                .map(|markets| HasFlag::Market { markets }),
            other => parse_flag_value(ctx, other, &flag_path).map(|value| HasFlag::Simple { value }),
        };
        if let Some(flag) = flag {
            entries.push(HasFlagEntry {
                name,
                flag,
                location: ctx.location(&flag_path),
            });
        }
    }
    entries
}

fn parse_flag_value(ctx: &mut ParseContext, node: &Value, path: &str) -> Option<HasFlagValue> {
    match node {
        Value::Bool(b) => Some(HasFlagValue::Bool(*b)),
        Value::String(s) if s == "emulated" => Some(HasFlagValue::Emulated),
        Value::String(s) => {
            ctx.error(
                DiagnosticCode::InvalidValue,
                path,
                format!("has-flag value '{}' must be true, false or 'emulated'", s),
            );
            None
        }
        other => {
            ctx.type_error(path, "true, false or 'emulated'", other);
            None
        }
    }
}

fn parse_market_override(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
) -> Option<MarketHasOverride> {
    let mut markets = MarketHasOverride::default();
    for (key, value) in map {
        let market_name = scalar_string(key).unwrap_or_default();
        let market_path = child_path(path, &market_name);
        let Some(market) = MarketType::from_name(&market_name) else {
            ctx.error(
                DiagnosticCode::InvalidValue,
                &market_path,
                format!(
                    "unknown market type '{}', expected one of: {}",
                    market_name,
                    MarketType::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
                ),
            );
            continue;
        };
        if let Some(value) = parse_flag_value(ctx, value, &market_path) {
            markets.set(market, value);
        }
    }
    if markets.entries().is_empty() {
        ctx.error(
            DiagnosticCode::InvalidValue,
            path,
            "per-market has-flag declares no valid market",
        );
        return None;
    }
    Some(markets)
}
