//! Canonical transactions and wallet operations
//!
//! Exchange-specific deposit/withdrawal/transfer records are mapped into one
//! [`TransactionDefinition`] shape by a declarative
//! [`TransactionParsingConfig`]. The config is a table of field mappings, never
//! code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{FieldMapping, ResponseMapping};
use crate::location::SourceLocation;
use crate::rate_limits::RawCostConfig;

/// Field names of the canonical transaction, in emission order
pub const CANONICAL_TRANSACTION_FIELDS: &[&str] = &[
    "id",
    "txid",
    "type",
    "currency",
    "amount",
    "status",
    "address",
    "tag",
    "network",
    "fee",
    "timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Ok,
    Failed,
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Ok => "ok",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Canceled => "canceled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(TransactionStatus::Pending),
            "ok" => Some(TransactionStatus::Ok),
            "failed" => Some(TransactionStatus::Failed),
            "canceled" => Some(TransactionStatus::Canceled),
            _ => None,
        }
    }
}

/// The canonical transaction record produced by a parsing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionDefinition {
    pub id: Option<String>,
    pub txid: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub currency: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<TransactionStatus>,
    pub address: Option<String>,
    pub tag: Option<String>,
    pub network: Option<String>,
    pub fee: Option<f64>,
    pub timestamp: Option<i64>,
}

/// `transactions:` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionParsingConfig {
    /// Canonical field -> source mapping, keyed by canonical field name
    pub mapping: Vec<FieldMapping>,
    /// Raw exchange status string -> canonical status
    pub status_map: BTreeMap<String, TransactionStatus>,
    /// Raw exchange type string -> canonical type
    pub type_map: BTreeMap<String, TransactionType>,
    pub location: SourceLocation,
}

impl TransactionParsingConfig {
    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.mapping.iter().find(|m| m.field == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletOperation {
    Deposit,
    Withdraw,
    Transfer,
}

impl WalletOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletOperation::Deposit => "deposit",
            WalletOperation::Withdraw => "withdraw",
            WalletOperation::Transfer => "transfer",
        }
    }

    /// Name of the generated client method
    pub fn method_name(&self) -> &'static str {
        match self {
            WalletOperation::Deposit => "fetchDepositAddress",
            WalletOperation::Withdraw => "withdraw",
            WalletOperation::Transfer => "transfer",
        }
    }

    /// Canonical arguments of the generated method, in signature order
    pub fn arguments(&self) -> &'static [&'static str] {
        match self {
            WalletOperation::Deposit => &["code"],
            WalletOperation::Withdraw => &["code", "amount", "address", "tag"],
            WalletOperation::Transfer => &["code", "amount", "fromAccount", "toAccount"],
        }
    }

    /// HTTP method assumed when the schema does not name one
    pub fn default_http_method(&self) -> &'static str {
        match self {
            WalletOperation::Deposit => "GET",
            WalletOperation::Withdraw | WalletOperation::Transfer => "POST",
        }
    }
}

/// Maps an exchange request key to a canonical method argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletParam {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEndpointSchema {
    pub operation: WalletOperation,
    pub endpoint: String,
    /// HTTP method as written; checked by the analyzer
    pub method: String,
    pub params: Vec<WalletParam>,
    pub response: Option<ResponseMapping>,
    pub requires_auth: bool,
    pub cost: Option<RawCostConfig>,
    pub location: SourceLocation,
}

/// `wallet:` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSchema {
    pub deposit: Option<WalletEndpointSchema>,
    pub withdraw: Option<WalletEndpointSchema>,
    pub transfer: Option<WalletEndpointSchema>,
}

impl WalletSchema {
    pub fn operations(&self) -> impl Iterator<Item = &WalletEndpointSchema> {
        [&self.deposit, &self.withdraw, &self.transfer]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.operations().next().is_none()
    }
}
