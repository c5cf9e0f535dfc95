//! EDL Types - Level 1 Foundation Types
//!
//! This crate contains the pure data structures of the Exchange Definition
//! Language (EDL): the typed document model produced by the parser and consumed
//! by the analyzer, the linter and the code generator.
//!
//! ## Architecture Level: LEVEL 1 (Foundation)
//!
//! This is the bottom layer of the compiler's dependency hierarchy. The compiler
//! crate depends on this crate, but this crate depends on nothing else in the
//! workspace.
//!
//! ## Contents
//!
//! - Source location tracking and severities
//! - Document model (`EdlDocument`, `EnhancedEdlDocument`, endpoints, params)
//! - Sub-schemas: fragments, has-flags, rate limits, transactions/wallet
//! - Safe expression AST and array-operation AST
//! - v2 interface declarations
//!
//! ## Rules
//!
//! 1. **NO COMPILER LOGIC** - Only data structures plus small queries
//! 2. **NO WORKSPACE DEPENDENCIES**
//! 3. **SERIALIZABLE** - All types support serde
//! 4. **IMMUTABLE AFTER PARSE** - Stages borrow the model, they never rewrite it

pub mod array_ops;
pub mod document;
pub mod expr;
pub mod fragments;
pub mod has_flags;
pub mod interface;
pub mod location;
pub mod rate_limits;
pub mod transactions;

pub use array_ops::{
    ArrayOperation, FilterOperation, FlatMapOperation, MapOperation, ReduceOperation,
    SliceOperation,
};
pub use document::{
    DocumentVersion, EdlDocument, EndpointDefinition, EnhancedEdlDocument, ExchangeInfo,
    FieldMapping, HttpMethod, ParamDefinition, ParamType, ParsedDocument, ResponseMapping,
};
pub use expr::{
    BinaryOp, ComputeExpression, LambdaBody, LambdaExpression, Literal, SafeExpression,
    SafeFunction, UnaryOp,
};
pub use fragments::{FragmentDefinition, FragmentReference, FragmentRegistry, RegistryError};
pub use has_flags::{
    is_market_has_override, is_simple_has_flag, HasFlag, HasFlagEntry, HasFlagValue,
    MarketHasOverride, MarketType,
};
pub use interface::{InterfaceDefinition, InterfaceMethod, MethodSelection, MethodVariant};
pub use location::{Severity, SourceLocation};
pub use rate_limits::{
    CostSource, CostUnit, EffectiveCost, EndpointRateLimitSchema, GlobalRateLimitSchema,
    RateLimitGroupSchema, RateLimitSchema, RawCostConfig, ThrottleConfig,
};
pub use transactions::{
    TransactionDefinition, TransactionParsingConfig, TransactionStatus, TransactionType,
    WalletEndpointSchema, WalletOperation, WalletParam, WalletSchema, CANONICAL_TRANSACTION_FIELDS,
};
