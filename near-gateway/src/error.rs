//! Error types for gateway operations.

use thiserror::Error;

/// Errors surfaced by a [`ContractGateway`](crate::ContractGateway).
///
/// Contract-side rejections are reported verbatim; nothing here decides
/// whether a failure is fatal.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP request could not be completed.
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The RPC node answered with a JSON-RPC error object.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The transaction executed but its outcome is a failure.
    #[error("Transaction failed: {0}")]
    ExecutionFailed(String),

    /// The view query was rejected by the node or the contract.
    #[error("View call failed: {0}")]
    ViewFailed(String),

    /// No signing key is registered for the acting account.
    #[error("No signer registered for account {0}")]
    UnknownSigner(String),

    /// The RPC response did not have the expected shape.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// Arguments or transactions could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}
