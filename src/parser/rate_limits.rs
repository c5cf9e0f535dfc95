//! `rateLimits:` sub-parser and inline `cost:` configs.

use edl_types::{
    CostUnit, EndpointRateLimitSchema, GlobalRateLimitSchema, RateLimitGroupSchema,
    RateLimitSchema, RawCostConfig, ThrottleConfig,
};
use serde_yaml::{Mapping, Value};

use super::context::{get, get_str, scalar_string, ParseContext};
use super::source_map::child_path;
use crate::diagnostics::DiagnosticCode;

const SCHEMA_KEYS: &[&str] = &["unit", "global", "groups", "endpoints"];
const THROTTLE_KEYS: &[&str] = &["capacity", "refillRate", "interval", "unit"];
const GROUP_KEYS: &[&str] = &["cost", "unit"];
const COST_KEYS: &[&str] = &["cost", "group", "unit"];

pub fn parse_rate_limits(ctx: &mut ParseContext, map: &Mapping, path: &str) -> RateLimitSchema {
    ctx.check_keys(map, path, SCHEMA_KEYS);
    let mut schema = RateLimitSchema {
        location: ctx.location(path),
        ..Default::default()
    };

    if let Some(unit) = get(map, "unit") {
        schema.unit = parse_unit(ctx, unit, &child_path(path, "unit")).unwrap_or_default();
    }

    match get(map, "global") {
        Some(Value::Mapping(global)) => {
            let global_path = child_path(path, "global");
            schema.global = Some(parse_global(ctx, global, &global_path, schema.unit));
        }
        Some(other) => ctx.type_error(&child_path(path, "global"), "a mapping", other),
        None => {}
    }

    match get(map, "groups") {
        Some(Value::Mapping(groups)) => {
            let groups_path = child_path(path, "groups");
            for (key, value) in groups {
                let Some(name) = scalar_string(key) else { continue };
                let group_path = child_path(&groups_path, &name);
                if let Some(group) = parse_group(ctx, name, value, &group_path) {
                    schema.groups.push(group);
                }
            }
        }
        Some(other) => ctx.type_error(&child_path(path, "groups"), "a mapping", other),
        None => {}
    }

    match get(map, "endpoints") {
        Some(Value::Mapping(endpoints)) => {
            let endpoints_path = child_path(path, "endpoints");
            for (key, value) in endpoints {
                let Some(endpoint) = scalar_string(key) else { continue };
                let entry_path = child_path(&endpoints_path, &endpoint);
                if let Some(config) = parse_cost_config(ctx, value, &entry_path) {
                    schema.endpoints.push(EndpointRateLimitSchema {
                        endpoint,
                        config,
                        location: ctx.location(&entry_path),
                    });
                }
            }
        }
        Some(other) => ctx.type_error(&child_path(path, "endpoints"), "a mapping", other),
        None => {}
    }

    schema
}

fn parse_global(
    ctx: &mut ParseContext,
    map: &Mapping,
    path: &str,
    schema_unit: CostUnit,
) -> GlobalRateLimitSchema {
    ctx.check_keys(map, path, THROTTLE_KEYS);
    let defaults = ThrottleConfig::default();
    let mut number = |key: &str, fallback: f64| match get(map, key) {
        Some(node) => match node.as_f64() {
            Some(n) if n > 0.0 => n,
            Some(_) => {
                ctx.error(
                    DiagnosticCode::InvalidValue,
                    &child_path(path, key),
                    format!("'{}' must be positive", key),
                );
                fallback
            }
            None => {
                ctx.type_error(&child_path(path, key), "a number", node);
                fallback
            }
        },
        None => fallback,
    };
    let capacity = number("capacity", defaults.capacity);
    let refill_rate = number("refillRate", defaults.refill_rate);
    let interval = number("interval", defaults.interval);

    let unit = match get(map, "unit") {
        Some(unit) => parse_unit(ctx, unit, &child_path(path, "unit")).unwrap_or(schema_unit),
        None => schema_unit,
    };

    GlobalRateLimitSchema {
        throttle: ThrottleConfig {
            capacity,
            refill_rate,
            interval,
            unit,
        },
        location: ctx.location(path),
    }
}

/// `name: 5` or `name: {cost, unit}`
fn parse_group(
    ctx: &mut ParseContext,
    name: String,
    node: &Value,
    path: &str,
) -> Option<RateLimitGroupSchema> {
    let (cost, unit) = match node {
        Value::Number(n) => (n.as_f64(), None),
        Value::Mapping(map) => {
            ctx.check_keys(map, path, GROUP_KEYS);
            let unit = match get(map, "unit") {
                Some(unit) => parse_unit(ctx, unit, &child_path(path, "unit")),
                None => None,
            };
            (get(map, "cost").and_then(Value::as_f64), unit)
        }
        other => {
            ctx.type_error(path, "a cost or {cost, unit} mapping", other);
            return None;
        }
    };
    let Some(cost) = cost else {
        ctx.error(
            DiagnosticCode::MissingField,
            path,
            format!("rate-limit group '{}' needs a numeric 'cost'", name),
        );
        return None;
    };
    Some(RateLimitGroupSchema {
        name,
        cost,
        unit,
        location: ctx.location(path),
    })
}

/// Cost as a number, a group name, or `{cost, group, unit}`
pub fn parse_cost_config(ctx: &mut ParseContext, node: &Value, path: &str) -> Option<RawCostConfig> {
    match node {
        Value::Number(n) => n.as_f64().map(RawCostConfig::Fixed),
        Value::String(group) => Some(RawCostConfig::Group(group.clone())),
        Value::Mapping(map) => {
            ctx.check_keys(map, path, COST_KEYS);
            let cost = match get(map, "cost") {
                Some(node) => match node.as_f64() {
                    Some(cost) => Some(cost),
                    None => {
                        ctx.type_error(&child_path(path, "cost"), "a number", node);
                        None
                    }
                },
                None => None,
            };
            let unit = match get(map, "unit") {
                Some(unit) => parse_unit(ctx, unit, &child_path(path, "unit")),
                None => None,
            };
            Some(RawCostConfig::Detailed {
                cost,
                group: get_str(map, "group").map(String::from),
                unit,
            })
        }
        other => {
            ctx.type_error(path, "a cost, group name or {cost, group, unit}", other);
            None
        }
    }
}

fn parse_unit(ctx: &mut ParseContext, node: &Value, path: &str) -> Option<CostUnit> {
    let unit = node.as_str().and_then(CostUnit::from_name);
    if unit.is_none() {
        ctx.error(
            DiagnosticCode::InvalidValue,
            path,
            format!(
                "unknown cost unit {}, expected weight, requests or points",
                scalar_string(node).unwrap_or_default()
            ),
        );
    }
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source_map::SourceMap;
    use edl_types::DocumentVersion;

    fn parse(src: &str) -> (RateLimitSchema, ParseContext) {
        let root: Value = serde_yaml::from_str(src).unwrap();
        let mut ctx = ParseContext::new(SourceMap::build(src, None), DocumentVersion::V0);
        let schema = parse_rate_limits(&mut ctx, root.as_mapping().unwrap(), "");
        (schema, ctx)
    }

    #[test]
    fn test_full_schema() {
        let src = r#"
unit: weight
global:
  capacity: 1200
  refillRate: 20
  interval: 1000
groups:
  orders: { cost: 10 }
  market: 2
endpoints:
  fetchTicker: 1
  createOrder: orders
  fetchOrderBook: { cost: 5, unit: weight }
"#;
        let (schema, ctx) = parse(src);
        assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics);
        let global = schema.global.as_ref().unwrap();
        assert_eq!(global.throttle.capacity, 1200.0);
        assert_eq!(global.throttle.unit, CostUnit::Weight);
        assert_eq!(schema.groups.len(), 2);
        assert_eq!(schema.group("market").unwrap().cost, 2.0);
        assert_eq!(
            schema.endpoint("createOrder").unwrap().config,
            RawCostConfig::Group("orders".into())
        );
        assert_eq!(
            schema.endpoint("fetchOrderBook").unwrap().config.explicit_cost(),
            Some(5.0)
        );
    }

    #[test]
    fn test_unknown_unit() {
        let (schema, ctx) = parse("unit: tokens\n");
        assert_eq!(schema.unit, CostUnit::Weight);
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::InvalidValue);
    }

    #[test]
    fn test_group_without_cost() {
        let (schema, ctx) = parse("groups:\n  orders: { unit: points }\n");
        assert!(schema.groups.is_empty());
        assert_eq!(ctx.diagnostics[0].code, DiagnosticCode::MissingField);
    }
}
