//! Rate-limit cost resolution.
//!
//! Precedence for the cost: group override, then explicit cost (rate-limit
//! table before inline `cost`), then `1`. Precedence for the unit: explicit
//! unit, then group unit, then schema unit.

use edl_types::{CostSource, EdlDocument, EffectiveCost, RateLimitSchema, RawCostConfig};

use super::fragments::effective_cost_config;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::CostResolutionError;

pub const DEFAULT_COST: f64 = 1.0;

/// Resolve one endpoint's cost against the schema
pub fn resolve_effective_cost(
    schema: &RateLimitSchema,
    endpoint: &str,
    inline: Option<&RawCostConfig>,
) -> Result<EffectiveCost, CostResolutionError> {
    let table = schema.endpoint(endpoint).map(|e| &e.config);
    let configs: Vec<&RawCostConfig> = table.into_iter().chain(inline).collect();

    let group_name = configs.iter().find_map(|c| c.group());
    let explicit_unit = configs.iter().find_map(|c| c.unit());

    let (cost, group_unit, source) = match group_name {
        Some(name) => {
            let group = schema
                .group(name)
                .ok_or_else(|| CostResolutionError::UnknownGroup {
                    endpoint: endpoint.to_string(),
                    group: name.to_string(),
                })?;
            (group.cost, group.unit, CostSource::Group(name.to_string()))
        }
        None => match configs.iter().find_map(|c| c.explicit_cost()) {
            Some(cost) => (cost, None, CostSource::Explicit),
            None => (DEFAULT_COST, None, CostSource::Default),
        },
    };

    let unit = explicit_unit.or(group_unit).unwrap_or(schema.unit);

    if !cost.is_finite() || cost <= 0.0 {
        return Err(CostResolutionError::NonPositive {
            endpoint: endpoint.to_string(),
            cost,
        });
    }

    if let Some(global) = &schema.global {
        if unit != global.throttle.unit {
            return Err(CostResolutionError::IncompatibleUnit {
                endpoint: endpoint.to_string(),
                unit: unit.to_string(),
                expected: global.throttle.unit.to_string(),
            });
        }
        if cost > global.throttle.capacity {
            return Err(CostResolutionError::ExceedsCapacity {
                endpoint: endpoint.to_string(),
                cost,
                capacity: global.throttle.capacity,
            });
        }
    }

    Ok(EffectiveCost { cost, unit, source })
}

/// Resolve an endpoint of `doc`, using fragment-inherited cost when it has none
pub fn resolve_endpoint_cost(
    doc: &EdlDocument,
    endpoint: &edl_types::EndpointDefinition,
) -> Result<EffectiveCost, CostResolutionError> {
    let default_schema = RateLimitSchema::default();
    let schema = doc.rate_limits.as_ref().unwrap_or(&default_schema);
    resolve_effective_cost(schema, &endpoint.name, effective_cost_config(doc, endpoint))
}

pub fn check_rate_limits(doc: &EdlDocument, diags: &mut Vec<Diagnostic>) {
    // R1: every endpoint cost resolves
    for endpoint in &doc.endpoints {
        if let Err(err) = resolve_endpoint_cost(doc, endpoint) {
            let location = doc
                .rate_limits
                .as_ref()
                .and_then(|s| s.endpoint(&endpoint.name))
                .map(|e| e.location.clone())
                .unwrap_or_else(|| endpoint.location.clone());
            diags.push(cost_diagnostic(&err, location));
        }
    }

    // R2: wallet costs resolve too
    for op in doc.wallet.operations() {
        if let Some(cost) = &op.cost {
            let default_schema = RateLimitSchema::default();
            let schema = doc.rate_limits.as_ref().unwrap_or(&default_schema);
            if let Err(err) = resolve_effective_cost(schema, op.operation.method_name(), Some(cost)) {
                diags.push(cost_diagnostic(&err, op.location.clone()));
            }
        }
    }

    let Some(schema) = &doc.rate_limits else {
        return;
    };

    // R3: table rows name declared endpoints
    for row in &schema.endpoints {
        if doc.endpoint(&row.endpoint).is_none() {
            diags.push(Diagnostic::warning(
                DiagnosticCode::UnknownRateLimitEndpoint,
                row.location.clone(),
                format!("rate limit declared for unknown endpoint '{}'", row.endpoint),
            ));
        }
    }
}

fn cost_diagnostic(err: &CostResolutionError, location: edl_types::SourceLocation) -> Diagnostic {
    let code = match err {
        CostResolutionError::UnknownGroup { .. } => DiagnosticCode::UnresolvedCostGroup,
        CostResolutionError::IncompatibleUnit { .. } => DiagnosticCode::IncompatibleCostUnit,
        CostResolutionError::NonPositive { .. } | CostResolutionError::ExceedsCapacity { .. } => {
            DiagnosticCode::InvalidCost
        }
    };
    let diag = Diagnostic::error(code, location, err.to_string());
    match err {
        CostResolutionError::IncompatibleUnit { expected, .. } => {
            diag.with_hint(format!("express the cost in '{}'", expected))
        }
        _ => diag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edl_types::{
        CostUnit, EndpointRateLimitSchema, GlobalRateLimitSchema, RateLimitGroupSchema, SourceLocation,
        ThrottleConfig,
    };

    fn schema() -> RateLimitSchema {
        RateLimitSchema {
            global: Some(GlobalRateLimitSchema {
                throttle: ThrottleConfig {
                    capacity: 20.0,
                    refill_rate: 10.0,
                    interval: 1000.0,
                    unit: CostUnit::Weight,
                },
                location: SourceLocation::unknown(),
            }),
            groups: vec![RateLimitGroupSchema {
                name: "orders".into(),
                cost: 4.0,
                unit: None,
                location: SourceLocation::unknown(),
            }],
            endpoints: vec![EndpointRateLimitSchema {
                endpoint: "fetchTrades".into(),
                config: RawCostConfig::Fixed(5.0),
                location: SourceLocation::unknown(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_explicit_cost_in_schema_unit() {
        let cost = resolve_effective_cost(&schema(), "fetchTrades", None).unwrap();
        assert_eq!(cost.cost, 5.0);
        assert_eq!(cost.unit, CostUnit::Weight);
        assert_eq!(cost.source, CostSource::Explicit);
    }

    #[test]
    fn test_group_overrides_explicit() {
        let inline = RawCostConfig::Detailed {
            cost: Some(9.0),
            group: Some("orders".into()),
            unit: None,
        };
        let cost = resolve_effective_cost(&schema(), "createOrder", Some(&inline)).unwrap();
        assert_eq!(cost.cost, 4.0);
        assert_eq!(cost.source, CostSource::Group("orders".into()));
    }

    #[test]
    fn test_table_cost_beats_inline() {
        let inline = RawCostConfig::Fixed(2.0);
        let cost = resolve_effective_cost(&schema(), "fetchTrades", Some(&inline)).unwrap();
        assert_eq!(cost.cost, 5.0);
    }

    #[test]
    fn test_default_cost() {
        let cost = resolve_effective_cost(&schema(), "fetchTime", None).unwrap();
        assert_eq!(cost.cost, DEFAULT_COST);
        assert_eq!(cost.source, CostSource::Default);
    }

    #[test]
    fn test_resolution_errors() {
        let unknown = RawCostConfig::Group("missing".into());
        assert!(matches!(
            resolve_effective_cost(&schema(), "x", Some(&unknown)),
            Err(CostResolutionError::UnknownGroup { .. })
        ));

        let wrong_unit = RawCostConfig::Detailed {
            cost: Some(1.0),
            group: None,
            unit: Some(CostUnit::Points),
        };
        assert!(matches!(
            resolve_effective_cost(&schema(), "x", Some(&wrong_unit)),
            Err(CostResolutionError::IncompatibleUnit { .. })
        ));

        assert!(matches!(
            resolve_effective_cost(&schema(), "x", Some(&RawCostConfig::Fixed(0.0))),
            Err(CostResolutionError::NonPositive { .. })
        ));
        assert!(matches!(
            resolve_effective_cost(&schema(), "x", Some(&RawCostConfig::Fixed(50.0))),
            Err(CostResolutionError::ExceedsCapacity { .. })
        ));
    }

    #[test]
    fn test_no_global_skips_unit_and_capacity() {
        let schema = RateLimitSchema::default();
        let inline = RawCostConfig::Detailed {
            cost: Some(500.0),
            group: None,
            unit: Some(CostUnit::Points),
        };
        let cost = resolve_effective_cost(&schema, "x", Some(&inline)).unwrap();
        assert_eq!(cost.unit, CostUnit::Points);
        assert_eq!(cost.cost, 500.0);
    }
}
