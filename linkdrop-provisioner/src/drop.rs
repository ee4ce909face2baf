//! Drop parameters as the drop contract expects them on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Identifier the drop contract assigns to each drop.
///
/// The contract counts drops in a `u128`, but JSON numbers only carry `u64`
/// without loss, so ids are bounded to `u64` and always sent as numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DropId(pub u64);

impl DropId {
    /// Read a drop id returned by the contract, either as a JSON number or a
    /// decimal string. Ids beyond `u64` are rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(DropId),
            Value::String(s) => s.parse().ok().map(DropId),
            _ => None,
        }
    }

    /// JSON form for view arguments.
    pub fn to_json(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for DropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which claim methods the drop's access keys may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPermission {
    Claim,
    CreateAccountAndClaim,
}

impl FromStr for ClaimPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claim" => Ok(ClaimPermission::Claim),
            "create_account_and_claim" => Ok(ClaimPermission::CreateAccountAndClaim),
            other => Err(format!("unknown claim permission: {}", other)),
        }
    }
}

/// Per-drop configuration passed to `create_drop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropConfig {
    /// Claims allowed per key; always at least 1.
    pub uses_per_key: u64,
    pub on_claim_refund_deposit: bool,
    /// Root account new accounts are created under when claiming.
    pub drop_root: String,
    /// Earliest block timestamp (ns) at which keys may be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<u64>,
    /// Minimum interval (ns) between uses of one key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_permission: Option<ClaimPermission>,
}

/// Human-readable drop description. The contract stores metadata as an
/// opaque string, so this is sent JSON-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropMetadata {
    pub title: String,
    pub description: String,
}

impl DropMetadata {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Fungible token payout attached to every key use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FungibleTokenSpec {
    pub contract_id: String,
    pub sender_id: String,
    /// Amount per use, in the token's smallest unit.
    pub balance_per_use: u128,
}

impl FungibleTokenSpec {
    /// The `ft_data` argument of `create_drop`.
    pub fn to_args(&self) -> Value {
        json!({
            "contract_id": self.contract_id,
            "sender_id": self.sender_id,
            "balance_per_use": self.balance_per_use.to_string(),
        })
    }
}
