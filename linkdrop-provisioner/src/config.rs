//! Provisioning configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::drop::{ClaimPermission, DropConfig, DropMetadata, FungibleTokenSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything one provisioning run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Network name, used to locate credential files.
    pub network_id: String,
    /// NEAR RPC URL.
    pub rpc_url: String,
    /// Wallet base URL used in redemption links.
    pub wallet_url: String,
    /// Drop (proxy) contract account.
    pub contract_id: String,
    /// Account that pays for and owns the drop.
    pub funding_account_id: String,
    /// `root_account` passed to the contract's `new`.
    pub root_account: String,
    /// `owner_id` passed to the contract's `new`.
    pub owner_id: String,
    /// NEAR deposited per key use.
    pub deposit_per_use: Decimal,
    /// Number of keys to generate.
    pub num_keys: u64,
    pub drop_config: DropConfig,
    pub metadata: DropMetadata,
    /// Fungible token payout; `None` skips the FT funding stage.
    pub ft: Option<FungibleTokenSpec>,
    /// Directory holding `<network>/<account>.json` key files.
    pub credentials_dir: PathBuf,
    /// Where `views.json` and `links.json` are written.
    pub output_dir: PathBuf,
    /// HTTP timeout for each RPC request.
    pub rpc_timeout: Duration,
}

impl ProvisionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
        };
        let or_default = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let funding_account_id = required("FUNDING_ACCOUNT_ID")?;
        let deposit_per_use = parse_near_amount("NEAR_AMOUNT", &required("NEAR_AMOUNT")?)?;

        let num_keys = parse_count("NUM_KEYS", &or_default("NUM_KEYS", "1"))?;
        let uses_per_key = parse_count("USES_PER_KEY", &or_default("USES_PER_KEY", "1"))?;
        let root_account = or_default("ROOT_ACCOUNT", "testnet");

        let drop_config = DropConfig {
            uses_per_key,
            on_claim_refund_deposit: parse_bool(
                "ON_CLAIM_REFUND_DEPOSIT",
                &or_default("ON_CLAIM_REFUND_DEPOSIT", "false"),
            )?,
            drop_root: or_default("DROP_ROOT", &root_account),
            start_timestamp: optional("DROP_START_TIMESTAMP")
                .map(|v| parse_number("DROP_START_TIMESTAMP", &v))
                .transpose()?,
            throttle_timestamp: optional("DROP_THROTTLE_TIMESTAMP")
                .map(|v| parse_number("DROP_THROTTLE_TIMESTAMP", &v))
                .transpose()?,
            claim_permission: optional("DROP_CLAIM_PERMISSION")
                .map(|v| {
                    ClaimPermission::from_str(&v)
                        .map_err(|e| ConfigError::Invalid(format!("DROP_CLAIM_PERMISSION: {}", e)))
                })
                .transpose()?,
        };

        let metadata = DropMetadata {
            title: or_default("DROP_TITLE", "Linkdrop demo"),
            description: or_default("DROP_DESCRIPTION", "Native and fungible token linkdrop"),
        };

        // An explicitly empty FT_CONTRACT_ID disables the token payout.
        let ft = match lookup("FT_CONTRACT_ID").map(|v| v.trim().to_string()) {
            Some(contract_id) if contract_id.is_empty() => None,
            contract_id => Some(FungibleTokenSpec {
                contract_id: contract_id
                    .unwrap_or_else(|| "ft.predeployed.examples.testnet".to_string()),
                sender_id: funding_account_id.clone(),
                balance_per_use: parse_number(
                    "FT_BALANCE_PER_USE",
                    &or_default("FT_BALANCE_PER_USE", "1"),
                )?,
            }),
        };

        let credentials_dir = optional("CREDENTIALS_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".near-credentials")))
            .unwrap_or_else(|| PathBuf::from(".near-credentials"));

        Ok(Self {
            network_id: or_default("NEAR_NETWORK_ID", "testnet"),
            rpc_url: or_default("NEAR_RPC_URL", "https://rpc.testnet.near.org"),
            wallet_url: or_default("WALLET_URL", "https://wallet.testnet.near.org"),
            contract_id: or_default("CONTRACT_ID", "linkdrop-proxy.testnet"),
            owner_id: or_default("OWNER_ID", &funding_account_id),
            funding_account_id,
            root_account,
            deposit_per_use,
            num_keys,
            drop_config,
            metadata,
            ft,
            credentials_dir,
            output_dir: PathBuf::from(or_default("OUTPUT_DIR", ".")),
            rpc_timeout: Duration::from_secs(parse_number(
                "RPC_TIMEOUT_SECS",
                &or_default("RPC_TIMEOUT_SECS", "30"),
            )?),
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{}={}", key, value)))
}

/// Counts must be at least 1; zero is rejected rather than defaulted.
fn parse_count(key: &str, value: &str) -> Result<u64, ConfigError> {
    match parse_number::<u64>(key, value)? {
        0 => Err(ConfigError::Invalid(format!("{} must be at least 1", key))),
        n => Ok(n),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{}={}", key, value))),
    }
}

fn parse_near_amount(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    let amount = Decimal::from_str(value)
        .map_err(|e| ConfigError::Invalid(format!("{}={}: {}", key, value, e)))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ConfigError::Invalid(format!("{} must not be negative", key)));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![("FUNDING_ACCOUNT_ID", "funder.testnet"), ("NEAR_AMOUNT", "1")]
    }

    #[test]
    fn test_defaults() {
        let config = ProvisionConfig::from_lookup(lookup(&minimal())).unwrap();
        assert_eq!(config.funding_account_id, "funder.testnet");
        assert_eq!(config.owner_id, "funder.testnet");
        assert_eq!(config.deposit_per_use, Decimal::ONE);
        assert_eq!(config.num_keys, 1);
        assert_eq!(config.drop_config.uses_per_key, 1);
        assert_eq!(config.drop_config.drop_root, "testnet");
        assert!(!config.drop_config.on_claim_refund_deposit);
        assert_eq!(config.network_id, "testnet");
        assert_eq!(config.rpc_url, "https://rpc.testnet.near.org");
        assert_eq!(config.rpc_timeout, Duration::from_secs(30));

        let ft = config.ft.unwrap();
        assert_eq!(ft.sender_id, "funder.testnet");
        assert_eq!(ft.balance_per_use, 1);
    }

    #[test]
    fn test_missing_funding_account() {
        let result = ProvisionConfig::from_lookup(lookup(&[("NEAR_AMOUNT", "1")]));
        assert!(matches!(result, Err(ConfigError::MissingEnv(ref k)) if k == "FUNDING_ACCOUNT_ID"));
    }

    #[test]
    fn test_missing_near_amount() {
        let result =
            ProvisionConfig::from_lookup(lookup(&[("FUNDING_ACCOUNT_ID", "funder.testnet")]));
        assert!(matches!(result, Err(ConfigError::MissingEnv(ref k)) if k == "NEAR_AMOUNT"));
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let result = ProvisionConfig::from_lookup(lookup(&[
            ("FUNDING_ACCOUNT_ID", "  "),
            ("NEAR_AMOUNT", "1"),
        ]));
        assert!(matches!(result, Err(ConfigError::MissingEnv(_))));
    }

    #[test]
    fn test_zero_uses_per_key_rejected() {
        let mut vars = minimal();
        vars.push(("USES_PER_KEY", "0"));
        let result = ProvisionConfig::from_lookup(lookup(&vars));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_keys_rejected() {
        let mut vars = minimal();
        vars.push(("NUM_KEYS", "0"));
        assert!(ProvisionConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_invalid_amount() {
        let result = ProvisionConfig::from_lookup(lookup(&[
            ("FUNDING_ACCOUNT_ID", "funder.testnet"),
            ("NEAR_AMOUNT", "lots"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = ProvisionConfig::from_lookup(lookup(&[
            ("FUNDING_ACCOUNT_ID", "funder.testnet"),
            ("NEAR_AMOUNT", "-2"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_ft_contract_disables_ft() {
        let mut vars = minimal();
        vars.push(("FT_CONTRACT_ID", ""));
        let config = ProvisionConfig::from_lookup(lookup(&vars)).unwrap();
        assert!(config.ft.is_none());
    }

    #[test]
    fn test_drop_options() {
        let mut vars = minimal();
        vars.extend([
            ("ROOT_ACCOUNT", "near"),
            ("ON_CLAIM_REFUND_DEPOSIT", "true"),
            ("DROP_START_TIMESTAMP", "1700000000000000000"),
            ("DROP_CLAIM_PERMISSION", "claim"),
            ("FT_CONTRACT_ID", "token.testnet"),
            ("FT_BALANCE_PER_USE", "1000000"),
        ]);
        let config = ProvisionConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.root_account, "near");
        assert_eq!(config.drop_config.drop_root, "near");
        assert!(config.drop_config.on_claim_refund_deposit);
        assert_eq!(config.drop_config.start_timestamp, Some(1_700_000_000_000_000_000));
        assert_eq!(config.drop_config.throttle_timestamp, None);
        assert_eq!(config.drop_config.claim_permission, Some(ClaimPermission::Claim));

        let ft = config.ft.unwrap();
        assert_eq!(ft.contract_id, "token.testnet");
        assert_eq!(ft.balance_per_use, 1_000_000);
    }
}
