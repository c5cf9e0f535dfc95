//! Fragments: named, reusable partial endpoint definitions
//!
//! Fragments live in exactly one [`FragmentRegistry`]. Endpoints and other
//! fragments refer to them by name through a [`FragmentReference`]; nothing
//! owns a fragment except the registry, which keeps cycle detection a plain
//! graph walk over names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::ParamDefinition;
use crate::location::SourceLocation;
use crate::rate_limits::RawCostConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub params: Vec<ParamDefinition>,
    /// Other fragments this fragment builds on
    pub uses: Vec<FragmentReference>,
    pub cost: Option<RawCostConfig>,
    pub requires_auth: Option<bool>,
    pub description: Option<String>,
    pub location: SourceLocation,
}

impl FragmentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            uses: Vec::new(),
            cost: None,
            requires_auth: None,
            description: None,
            location: SourceLocation::unknown(),
        }
    }
}

/// A by-name reference to a fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentReference {
    pub name: String,
    pub location: SourceLocation,
}

impl FragmentReference {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("fragment '{name}' is already defined at {first}")]
    DuplicateFragment { name: String, first: SourceLocation },
}

/// Owning store of fragments keyed by unique name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentRegistry {
    fragments: BTreeMap<String, FragmentDefinition>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fragment; names are unique
    pub fn insert(&mut self, fragment: FragmentDefinition) -> Result<(), RegistryError> {
        if let Some(existing) = self.fragments.get(&fragment.name) {
            return Err(RegistryError::DuplicateFragment {
                name: fragment.name,
                first: existing.location.clone(),
            });
        }
        self.fragments.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.get(name)
    }

    /// Resolve a reference against this registry
    pub fn resolve(&self, reference: &FragmentReference) -> Option<&FragmentDefinition> {
        self.get(&reference.name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Fragment names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.fragments.values()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_fragment_rejected() {
        let mut registry = FragmentRegistry::new();
        let mut first = FragmentDefinition::new("paging");
        first.location = SourceLocation::new(4, 3);
        registry.insert(first).unwrap();

        let err = registry
            .insert(FragmentDefinition::new("paging"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "fragment 'paging' is already defined at 4:3"
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_by_reference() {
        let mut registry = FragmentRegistry::new();
        registry.insert(FragmentDefinition::new("symbol")).unwrap();

        let hit = FragmentReference::new("symbol", SourceLocation::unknown());
        let miss = FragmentReference::new("paging", SourceLocation::unknown());
        assert!(registry.resolve(&hit).is_some());
        assert!(registry.resolve(&miss).is_none());
    }
}
