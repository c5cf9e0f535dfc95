//! Rate-limit schema
//!
//! Endpoint costs are expressed in a [`CostUnit`] and must reconcile with the
//! global throttle (token bucket: `capacity` tokens, refilled at `refill_rate`
//! tokens per `interval` milliseconds).

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostUnit {
    #[default]
    Weight,
    Requests,
    Points,
}

impl CostUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostUnit::Weight => "weight",
            CostUnit::Requests => "requests",
            CostUnit::Points => "points",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "weight" => Some(CostUnit::Weight),
            "requests" => Some(CostUnit::Requests),
            "points" => Some(CostUnit::Points),
            _ => None,
        }
    }
}

impl std::fmt::Display for CostUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token-bucket throttle parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub capacity: f64,
    pub refill_rate: f64,
    /// Refill interval in milliseconds
    pub interval: f64,
    pub unit: CostUnit,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            capacity: 1.0,
            refill_rate: 1.0,
            interval: 1000.0,
            unit: CostUnit::Weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRateLimitSchema {
    pub throttle: ThrottleConfig,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitGroupSchema {
    pub name: String,
    pub cost: f64,
    pub unit: Option<CostUnit>,
    pub location: SourceLocation,
}

/// Cost as written in the document, before resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCostConfig {
    /// `cost: 5`
    Fixed(f64),
    /// `cost: orders` naming a group
    Group(String),
    /// `{cost, group, unit}`
    Detailed {
        cost: Option<f64>,
        group: Option<String>,
        unit: Option<CostUnit>,
    },
}

impl RawCostConfig {
    pub fn explicit_cost(&self) -> Option<f64> {
        match self {
            RawCostConfig::Fixed(c) => Some(*c),
            RawCostConfig::Group(_) => None,
            RawCostConfig::Detailed { cost, .. } => *cost,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            RawCostConfig::Group(g) => Some(g),
            RawCostConfig::Detailed { group, .. } => group.as_deref(),
            RawCostConfig::Fixed(_) => None,
        }
    }

    pub fn unit(&self) -> Option<CostUnit> {
        match self {
            RawCostConfig::Detailed { unit, .. } => *unit,
            _ => None,
        }
    }
}

/// Per-endpoint row of `rateLimits.endpoints`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRateLimitSchema {
    pub endpoint: String,
    pub config: RawCostConfig,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSchema {
    /// Unit assumed when neither endpoint nor group names one
    pub unit: CostUnit,
    pub global: Option<GlobalRateLimitSchema>,
    pub groups: Vec<RateLimitGroupSchema>,
    pub endpoints: Vec<EndpointRateLimitSchema>,
    pub location: SourceLocation,
}

impl Default for RateLimitSchema {
    fn default() -> Self {
        Self {
            unit: CostUnit::Weight,
            global: None,
            groups: Vec::new(),
            endpoints: Vec::new(),
            location: SourceLocation::unknown(),
        }
    }
}

impl RateLimitSchema {
    pub fn group(&self, name: &str) -> Option<&RateLimitGroupSchema> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointRateLimitSchema> {
        self.endpoints.iter().find(|e| e.endpoint == name)
    }

    /// Unit of the global throttle, falling back to the schema unit
    pub fn global_unit(&self) -> CostUnit {
        self.global
            .as_ref()
            .map(|g| g.throttle.unit)
            .unwrap_or(self.unit)
    }
}

/// Where a resolved cost came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum CostSource {
    Group(String),
    Explicit,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveCost {
    pub cost: f64,
    pub unit: CostUnit,
    pub source: CostSource,
}
