//! v2 `interface:` declarations
//!
//! An interface method is the public client method; it either forwards to one
//! endpoint or dispatches between variants on a selection parameter.

use serde::{Deserialize, Serialize};

use crate::document::{ParamDefinition, ResponseMapping};
use crate::location::SourceLocation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub methods: Vec<InterfaceMethod>,
}

impl InterfaceDefinition {
    pub fn method(&self, name: &str) -> Option<&InterfaceMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: String,
    /// Target endpoint for single-variant methods
    pub endpoint: Option<String>,
    pub params: Vec<ParamDefinition>,
    pub returns: Option<String>,
    pub selection: Option<MethodSelection>,
    pub variants: Vec<MethodVariant>,
    pub description: Option<String>,
    pub location: SourceLocation,
}

impl InterfaceMethod {
    /// Every endpoint this method may call
    pub fn endpoints(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.endpoint.iter().map(String::as_str).collect();
        out.extend(self.variants.iter().map(|v| v.endpoint.as_str()));
        out
    }
}

/// Which argument picks the variant, and the fallback variant name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSelection {
    pub param: String,
    pub default: Option<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodVariant {
    pub name: String,
    pub endpoint: String,
    pub response: Option<ResponseMapping>,
    pub location: SourceLocation,
}
