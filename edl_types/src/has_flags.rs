//! Capability flags (`has:` table)

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;

/// A simple flag value: supported, unsupported, or emulated client-side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasFlagValue {
    Bool(bool),
    Emulated,
}

impl HasFlagValue {
    pub fn is_supported(&self) -> bool {
        match self {
            HasFlagValue::Bool(b) => *b,
            HasFlagValue::Emulated => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Margin,
    Swap,
    Future,
    Option,
}

impl MarketType {
    pub const ALL: &'static [MarketType] = &[
        MarketType::Spot,
        MarketType::Margin,
        MarketType::Swap,
        MarketType::Future,
        MarketType::Option,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Margin => "margin",
            MarketType::Swap => "swap",
            MarketType::Future => "future",
            MarketType::Option => "option",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == name)
    }
}

/// Per-market values; markets left out are unspecified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketHasOverride {
    pub spot: Option<HasFlagValue>,
    pub margin: Option<HasFlagValue>,
    pub swap: Option<HasFlagValue>,
    pub future: Option<HasFlagValue>,
    pub option: Option<HasFlagValue>,
}

impl MarketHasOverride {
    pub fn get(&self, market: MarketType) -> Option<HasFlagValue> {
        match market {
            MarketType::Spot => self.spot,
            MarketType::Margin => self.margin,
            MarketType::Swap => self.swap,
            MarketType::Future => self.future,
            MarketType::Option => self.option,
        }
    }

    pub fn set(&mut self, market: MarketType, value: HasFlagValue) {
        let slot = match market {
            MarketType::Spot => &mut self.spot,
            MarketType::Margin => &mut self.margin,
            MarketType::Swap => &mut self.swap,
            MarketType::Future => &mut self.future,
            MarketType::Option => &mut self.option,
        };
        *slot = Some(value);
    }

    /// Declared `(market, value)` pairs in canonical market order
    pub fn entries(&self) -> Vec<(MarketType, HasFlagValue)> {
        MarketType::ALL
            .iter()
            .filter_map(|m| self.get(*m).map(|v| (*m, v)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HasFlag {
    Simple { value: HasFlagValue },
    Market { markets: MarketHasOverride },
}

impl HasFlag {
    /// Supported in at least one form
    pub fn is_supported(&self) -> bool {
        match self {
            HasFlag::Simple { value } => value.is_supported(),
            HasFlag::Market { markets } => markets.entries().iter().any(|(_, v)| v.is_supported()),
        }
    }

    /// Explicitly `false` everywhere it is declared
    pub fn is_disabled(&self) -> bool {
        match self {
            HasFlag::Simple { value } => *value == HasFlagValue::Bool(false),
            HasFlag::Market { markets } => {
                let entries = markets.entries();
                !entries.is_empty() && entries.iter().all(|(_, v)| !v.is_supported())
            }
        }
    }
}

pub fn is_simple_has_flag(flag: &HasFlag) -> bool {
    matches!(flag, HasFlag::Simple { .. })
}

pub fn is_market_has_override(flag: &HasFlag) -> bool {
    matches!(flag, HasFlag::Market { .. })
}

/// One row of the declared `has:` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasFlagEntry {
    pub name: String,
    pub flag: HasFlag,
    pub location: SourceLocation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_override_support() {
        let mut markets = MarketHasOverride::default();
        markets.set(MarketType::Spot, HasFlagValue::Bool(true));
        markets.set(MarketType::Swap, HasFlagValue::Bool(false));
        let flag = HasFlag::Market { markets };

        assert!(is_market_has_override(&flag));
        assert!(!is_simple_has_flag(&flag));
        assert!(flag.is_supported());
        assert!(!flag.is_disabled());
    }

    #[test]
    fn test_simple_flags() {
        let emulated = HasFlag::Simple {
            value: HasFlagValue::Emulated,
        };
        let off = HasFlag::Simple {
            value: HasFlagValue::Bool(false),
        };
        assert!(emulated.is_supported());
        assert!(off.is_disabled());
        assert!(is_simple_has_flag(&off));
    }
}
