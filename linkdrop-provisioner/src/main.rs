//! Linkdrop provisioner
//!
//! Creates a demo linkdrop on NEAR: generates a batch of claim keys, funds
//! and creates the drop on the proxy contract, tops it up with fungible
//! tokens and saves a snapshot of the contract views together with one
//! redemption link per key.

mod amount;
mod config;
mod drop;
mod error;
mod output;
mod pipeline;

use linkdrop_keys::{credentials_path, generate_key_batch, InMemorySigner, LinkdropKeypair};
use near_gateway::{ContractGateway, JsonRpcGateway};

use amount::{required_funding, yocto_to_near, FeeSchedule};
use config::ProvisionConfig;
use error::ProvisionError;
use output::{build_redemption_links, write_results};
use pipeline::{Provisioner, ProvisioningRun};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();
    log::info!("Starting linkdrop provisioner...");

    run().await?;
    Ok(())
}

async fn run() -> Result<(), ProvisionError> {
    let config = ProvisionConfig::from_env()?;
    log::info!(
        "Loaded configuration: network={}, contract={}, funder={}",
        config.network_id,
        config.contract_id,
        config.funding_account_id
    );

    let path = credentials_path(
        &config.credentials_dir,
        &config.network_id,
        &config.funding_account_id,
    );
    let signer = InMemorySigner::from_credentials_file(&config.funding_account_id, &path)?;
    log::info!("Loaded signer {} from {}", signer.public_key(), path.display());

    let gateway = JsonRpcGateway::new(&config.rpc_url, config.rpc_timeout)?.with_signer(signer);

    let keys = generate_key_batch(config.num_keys as usize);
    log::info!("Generated {} claim keys", keys.len());

    let run = provision(&config, &gateway, &keys).await?;

    let links = build_redemption_links(&config.wallet_url, &config.contract_id, &keys);
    write_results(&config.output_dir, &run.snapshot, &links)?;

    if run.snapshot.is_empty() {
        log::warn!("No contract views were collected");
    }
    match run.drop_id {
        Some(id) => log::info!("Drop {} provisioned", id),
        None => log::warn!("Drop id unknown; drop views were not collected"),
    }
    run.report.log_summary();
    Ok(())
}

/// Compute the funding amount, then drive every stage.
///
/// An amount error is fatal and happens before any remote call.
async fn provision<G: ContractGateway>(
    config: &ProvisionConfig,
    gateway: &G,
    keys: &[LinkdropKeypair],
) -> Result<ProvisioningRun, ProvisionError> {
    let funding = required_funding(
        config.deposit_per_use,
        config.num_keys,
        config.drop_config.uses_per_key,
        &FeeSchedule::default(),
    )?;
    log::info!(
        "Required funding: {} NEAR ({} yocto)",
        yocto_to_near(funding.yocto),
        funding.yocto
    );

    Ok(Provisioner::new(config, gateway).run(keys, &funding).await)
}
