//! Error types for the provisioner.

use linkdrop_keys::KeyError;
use near_gateway::GatewayError;
use thiserror::Error;

use crate::amount::AmountError;
use crate::config::ConfigError;
use crate::output::OutputError;

/// Errors that abort the run.
///
/// Everything here happens either before the first remote call or after the
/// last one; stage failures in between are logged and never surface here.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credentials error: {0}")]
    Credentials(#[from] KeyError),

    #[error("Funding amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Gateway setup failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// Why a single pipeline stage failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Views failed: {}", .0.join(", "))]
    ViewsFailed(Vec<&'static str>),

    /// An earlier stage did not produce a value this stage needs.
    #[error("Missing input: {0}")]
    MissingInput(&'static str),
}
