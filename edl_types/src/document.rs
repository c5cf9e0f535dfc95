//! Root document model
//!
//! [`EdlDocument`] is the version 0/1 root; [`EnhancedEdlDocument`] adds the
//! v2 `interface` block. Downstream stages take a [`ParsedDocument`] so the
//! version is decided exactly once, by the parser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::array_ops::ArrayOperation;
use crate::expr::SafeExpression;
use crate::fragments::{FragmentReference, FragmentRegistry};
use crate::has_flags::HasFlagEntry;
use crate::interface::InterfaceDefinition;
use crate::location::SourceLocation;
use crate::rate_limits::{RateLimitSchema, RawCostConfig};
use crate::transactions::{TransactionParsingConfig, WalletSchema};

// ============================================================================
// VERSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentVersion {
    /// Flat `endpoints:` list
    V0,
    /// Legacy `api:` category tree
    V1,
    /// `interface:` declarations on top of endpoints
    V2,
}

impl DocumentVersion {
    pub fn as_u8(&self) -> u8 {
        match self {
            DocumentVersion::V0 => 0,
            DocumentVersion::V1 => 1,
            DocumentVersion::V2 => 2,
        }
    }
}

impl std::fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

// ============================================================================
// ENDPOINTS AND PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Case-insensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Timestamp,
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Timestamp => "timestamp",
            ParamType::Any => "any",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" | "str" => Some(ParamType::String),
            "number" | "float" => Some(ParamType::Number),
            "integer" | "int" => Some(ParamType::Integer),
            "boolean" | "bool" => Some(ParamType::Boolean),
            "object" => Some(ParamType::Object),
            "array" => Some(ParamType::Array),
            "timestamp" => Some(ParamType::Timestamp),
            "any" => Some(ParamType::Any),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDefinition {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub enum_values: Vec<serde_json::Value>,
    pub description: Option<String>,
    /// Guard making the param required when it evaluates truthy
    pub required_if: Option<SafeExpression>,
    pub location: SourceLocation,
}

impl ParamDefinition {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            enum_values: Vec::new(),
            description: None,
            required_if: None,
            location: SourceLocation::unknown(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// One output field of a response or transaction mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Output field name
    pub field: String,
    /// Dotted source path, e.g. `data.result[0].price`
    pub path: Option<String>,
    /// `|`-separated transform chain as written
    pub transform: Option<String>,
    pub default: Option<serde_json::Value>,
    pub literal: Option<serde_json::Value>,
    pub compute: Option<SafeExpression>,
    pub operation: Option<ArrayOperation>,
    pub location: SourceLocation,
}

impl FieldMapping {
    pub fn path(field: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            path: Some(path.into()),
            transform: None,
            default: None,
            literal: None,
            compute: None,
            operation: None,
            location: SourceLocation::unknown(),
        }
    }

    /// Transform names in chain order; empty segments are preserved
    pub fn transform_chain(&self) -> Vec<&str> {
        match &self.transform {
            Some(chain) => chain.split('|').map(str::trim).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMapping {
    /// Path of the payload inside the raw response
    pub path: Option<String>,
    pub is_array: bool,
    pub fields: Vec<FieldMapping>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    pub name: String,
    /// `public`, `private`, or any exchange-specific category
    pub category: String,
    pub method: HttpMethod,
    pub path: String,
    /// Params declared on the endpoint itself, in declaration order
    pub params: Vec<ParamDefinition>,
    pub cost: Option<RawCostConfig>,
    pub uses: Vec<FragmentReference>,
    pub response: Option<ResponseMapping>,
    pub requires_auth: bool,
    pub description: Option<String>,
    /// YAML comments found directly above the endpoint
    pub comments: Vec<String>,
    pub location: SourceLocation,
}

impl EndpointDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            category: "public".to_string(),
            method: HttpMethod::Get,
            params: Vec::new(),
            cost: None,
            uses: Vec::new(),
            response: None,
            requires_auth: false,
            description: None,
            comments: Vec::new(),
            location: SourceLocation::unknown(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamDefinition> {
        self.params.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// ROOT DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub id: String,
    pub name: Option<String>,
    pub countries: Vec<String>,
    pub version: Option<String>,
    /// Legacy per-request delay in milliseconds
    pub rate_limit: Option<f64>,
    pub certified: bool,
    pub pro: bool,
    pub urls: BTreeMap<String, serde_json::Value>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdlDocument {
    pub version: DocumentVersion,
    pub exchange: ExchangeInfo,
    pub endpoints: Vec<EndpointDefinition>,
    pub fragments: FragmentRegistry,
    pub has: Vec<HasFlagEntry>,
    pub rate_limits: Option<RateLimitSchema>,
    pub transactions: Option<TransactionParsingConfig>,
    pub wallet: WalletSchema,
    pub source_name: Option<String>,
}

impl EdlDocument {
    pub fn new(version: DocumentVersion) -> Self {
        Self {
            version,
            exchange: ExchangeInfo::default(),
            endpoints: Vec::new(),
            fragments: FragmentRegistry::new(),
            has: Vec::new(),
            rate_limits: None,
            transactions: None,
            wallet: WalletSchema::default(),
            source_name: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.exchange.id
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointDefinition> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn has_flag(&self, name: &str) -> Option<&HasFlagEntry> {
        self.has.iter().find(|h| h.name == name)
    }
}

/// v2 root: a v0/v1 document plus interface declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedEdlDocument {
    pub document: EdlDocument,
    pub interface: InterfaceDefinition,
}

/// Parser output, tagged by detected version family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ParsedDocument {
    Legacy(EdlDocument),
    Enhanced(EnhancedEdlDocument),
}

impl ParsedDocument {
    pub fn document(&self) -> &EdlDocument {
        match self {
            ParsedDocument::Legacy(doc) => doc,
            ParsedDocument::Enhanced(doc) => &doc.document,
        }
    }

    pub fn interface(&self) -> Option<&InterfaceDefinition> {
        match self {
            ParsedDocument::Legacy(_) => None,
            ParsedDocument::Enhanced(doc) => Some(&doc.interface),
        }
    }

    pub fn version(&self) -> DocumentVersion {
        self.document().version
    }
}
