//! The provisioning pipeline.
//!
//! Five stages run strictly in order against one [`ContractGateway`]:
//!
//! 1. `initialize`: call `new` on the drop contract
//! 2. `fund_balance`: `add_to_balance` with the computed funding amount
//! 3. `create_drop`: predict the drop id, then `create_drop`
//! 4. `fund_fungible_token`: `storage_deposit` then `ft_transfer_call`
//! 5. `collect_views`: a fixed list of view queries
//!
//! A failed stage is logged and recorded; the next stage runs regardless,
//! so reruns against a partially provisioned contract go as far as they can.
//! Values later stages depend on (the drop id) are returned by the stage
//! that produces them and threaded through by [`Provisioner::run`].

use std::fmt;
use std::future::Future;

use linkdrop_keys::LinkdropKeypair;
use near_gateway::{ContractGateway, FunctionCall, ONE_YOCTO};
use serde_json::{json, Value};

use crate::amount::{ft_transfer_amount, near_to_yocto, yocto_to_near, FundingAmount};
use crate::config::ProvisionConfig;
use crate::drop::{DropId, FungibleTokenSpec};
use crate::error::StageError;
use crate::output::ViewSnapshot;

/// Deposit attached to `storage_deposit` on the token contract (0.1 NEAR).
pub const FT_STORAGE_DEPOSIT: u128 = 100_000_000_000_000_000_000_000;

/// Page size for the `get_keys` view.
pub const KEYS_PAGE_LIMIT: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialize,
    FundBalance,
    CreateDrop,
    FundFungibleToken,
    CollectViews,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Initialize => "initialize",
            Stage::FundBalance => "fund_balance",
            Stage::CreateDrop => "create_drop",
            Stage::FundFungibleToken => "fund_fungible_token",
            Stage::CollectViews => "collect_views",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Outcome of every stage of one run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    records: Vec<StageRecord>,
}

impl StageReport {
    fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        self.records.push(StageRecord { stage, outcome });
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    pub fn failure_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, StageOutcome::Failed(_)))
            .count()
    }

    pub fn log_summary(&self) {
        for record in &self.records {
            match &record.outcome {
                StageOutcome::Completed => log::info!("  {:<22} completed", record.stage),
                StageOutcome::Failed(e) => log::info!("  {:<22} FAILED: {}", record.stage, e),
                StageOutcome::Skipped(why) => log::info!("  {:<22} skipped: {}", record.stage, why),
            }
        }
        log::info!(
            "{} of {} stages failed",
            self.failure_count(),
            self.records.len()
        );
    }
}

/// Run one stage, record its outcome and log a failure with the raw error.
///
/// The result is handed back so the driver can pick out whatever the next
/// stage needs.
async fn run_stage<T, E, F>(report: &mut StageReport, stage: Stage, work: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    log::info!("Stage {}: starting", stage);
    let result = work.await;
    match &result {
        Ok(_) => {
            log::info!("Stage {}: completed", stage);
            report.record(stage, StageOutcome::Completed);
        }
        Err(e) => {
            log::error!("Stage {}: failed: {}", stage, e);
            report.record(stage, StageOutcome::Failed(e.to_string()));
        }
    }
    result
}

/// `create_drop` failure that still carries the predicted drop id, so
/// later stages can work with it.
#[derive(Debug)]
pub struct CreateDropFailure {
    pub predicted: Option<DropId>,
    pub error: StageError,
}

impl fmt::Display for CreateDropFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.predicted {
            Some(id) => write!(f, "{} (predicted drop id {})", self.error, id),
            None => write!(f, "{}", self.error),
        }
    }
}

/// A view query in the final snapshot. `args` is `Err` when an input from
/// an earlier stage is missing.
struct ViewRequest {
    method: &'static str,
    args: Result<Option<Value>, &'static str>,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct ProvisioningRun {
    pub report: StageReport,
    pub drop_id: Option<DropId>,
    pub snapshot: ViewSnapshot,
}

/// Drives the stages for one configuration against one gateway.
pub struct Provisioner<'a, G> {
    config: &'a ProvisionConfig,
    gateway: &'a G,
}

impl<'a, G: ContractGateway> Provisioner<'a, G> {
    pub fn new(config: &'a ProvisionConfig, gateway: &'a G) -> Self {
        Self { config, gateway }
    }

    /// Run all stages for `keys`, funding the drop with `funding`.
    pub async fn run(&self, keys: &[LinkdropKeypair], funding: &FundingAmount) -> ProvisioningRun {
        let mut report = StageReport::default();

        let _ = run_stage(&mut report, Stage::Initialize, self.initialize()).await;
        let _ = run_stage(&mut report, Stage::FundBalance, self.fund_balance(funding)).await;

        let drop_id = match run_stage(&mut report, Stage::CreateDrop, self.create_drop(keys)).await {
            Ok(id) => Some(id),
            Err(failure) => failure.predicted,
        };

        match &self.config.ft {
            Some(ft) => {
                let _ = run_stage(
                    &mut report,
                    Stage::FundFungibleToken,
                    self.fund_fungible_token(ft, drop_id),
                )
                .await;
            }
            None => {
                log::info!("Stage {}: skipped, no fungible token configured", Stage::FundFungibleToken);
                report.record(
                    Stage::FundFungibleToken,
                    StageOutcome::Skipped("no fungible token configured".to_string()),
                );
            }
        }

        let mut snapshot = ViewSnapshot::default();
        let _ = run_stage(
            &mut report,
            Stage::CollectViews,
            self.collect_views(keys, drop_id, &mut snapshot),
        )
        .await;

        ProvisioningRun {
            report,
            drop_id,
            snapshot,
        }
    }

    fn funder(&self) -> &str {
        &self.config.funding_account_id
    }

    async fn initialize(&self) -> Result<(), StageError> {
        let call = FunctionCall::new(&self.config.contract_id, "new").args(json!({
            "root_account": self.config.root_account,
            "owner_id": self.config.owner_id,
        }));
        let outcome = self.gateway.call(self.funder(), call).await?;
        log::info!("Contract {} initialized in {}", self.config.contract_id, outcome.transaction_hash);
        Ok(())
    }

    async fn fund_balance(&self, funding: &FundingAmount) -> Result<(), StageError> {
        log::info!(
            "Adding {} NEAR to the balance of {}",
            yocto_to_near(funding.yocto),
            self.funder()
        );
        let call = FunctionCall::new(&self.config.contract_id, "add_to_balance")
            .deposit(funding.yocto);
        self.gateway.call(self.funder(), call).await?;
        Ok(())
    }

    /// Predict the drop id, then create the drop.
    ///
    /// `get_next_drop_id` is only a prediction: a drop created concurrently
    /// by someone else takes that id. When `create_drop` returns the id it
    /// actually assigned, that value wins. A failed prediction is logged and
    /// the drop is created anyway.
    async fn create_drop(&self, keys: &[LinkdropKeypair]) -> Result<DropId, CreateDropFailure> {
        let predicted = match self
            .gateway
            .view(self.funder(), &self.config.contract_id, "get_next_drop_id", None)
            .await
        {
            Ok(next) => {
                let id = DropId::from_value(&next);
                match id {
                    Some(id) => log::info!("Next drop id: {}", id),
                    None => log::warn!("get_next_drop_id returned no drop id: {}", next),
                }
                id
            }
            Err(e) => {
                log::warn!("get_next_drop_id failed: {}", e);
                None
            }
        };
        let failure = move |error: StageError| CreateDropFailure { predicted, error };

        let args = self.create_drop_args(keys).map_err(failure)?;
        let call = FunctionCall::new(&self.config.contract_id, "create_drop").args(args);
        let outcome = self
            .gateway
            .call(self.funder(), call)
            .await
            .map_err(|e| failure(e.into()))?;

        let returned = outcome.return_value.as_ref().and_then(DropId::from_value);
        match (returned, predicted) {
            (Some(actual), Some(predicted)) if actual != predicted => {
                log::warn!(
                    "create_drop assigned drop id {} but {} was predicted; using {}",
                    actual,
                    predicted,
                    actual
                );
                Ok(actual)
            }
            (Some(actual), _) => Ok(actual),
            (None, Some(predicted)) => Ok(predicted),
            (None, None) => Err(failure(StageError::MissingInput(
                "drop id neither predicted nor returned by create_drop",
            ))),
        }
    }

    fn create_drop_args(&self, keys: &[LinkdropKeypair]) -> Result<Value, StageError> {
        let public_keys: Vec<&str> = keys.iter().map(|k| k.public_key.as_str()).collect();
        let deposit_per_use = near_to_yocto(self.config.deposit_per_use)?;

        Ok(json!({
            "public_keys": public_keys,
            "deposit_per_use": deposit_per_use.to_string(),
            "ft_data": self.config.ft.as_ref().map(FungibleTokenSpec::to_args),
            "config": serde_json::to_value(&self.config.drop_config)?,
            "metadata": self.config.metadata.to_json_string()?,
        }))
    }

    async fn fund_fungible_token(
        &self,
        ft: &FungibleTokenSpec,
        drop_id: Option<DropId>,
    ) -> Result<(), StageError> {
        let storage = FunctionCall::new(&ft.contract_id, "storage_deposit")
            .args(json!({ "account_id": self.config.contract_id }))
            .deposit(FT_STORAGE_DEPOSIT);
        self.gateway.call(self.funder(), storage).await?;

        let drop_id = drop_id.ok_or(StageError::MissingInput("drop id unknown"))?;
        let amount = ft_transfer_amount(
            ft.balance_per_use,
            self.config.num_keys,
            self.config.drop_config.uses_per_key,
        )?;
        log::info!(
            "Transferring {} of {} to {} for drop {}",
            amount,
            ft.contract_id,
            self.config.contract_id,
            drop_id
        );

        let transfer = FunctionCall::new(&ft.contract_id, "ft_transfer_call")
            .args(json!({
                "receiver_id": self.config.contract_id,
                "amount": amount.to_string(),
                "msg": drop_id.to_string(),
            }))
            .deposit(ONE_YOCTO);
        self.gateway.call(self.funder(), transfer).await?;
        Ok(())
    }

    fn view_requests(&self, keys: &[LinkdropKeypair], drop_id: Option<DropId>) -> Vec<ViewRequest> {
        let owner = json!({ "account_id": self.config.funding_account_id });
        let first_key = keys
            .first()
            .map(|k| Some(json!({ "key": k.public_key })))
            .ok_or("no keys generated");
        let for_drop = drop_id
            .map(|id| Some(json!({ "drop_id": id.to_json() })))
            .ok_or("drop id unknown");

        vec![
            ViewRequest {
                method: "get_key_total_supply",
                args: Ok(None),
            },
            ViewRequest {
                method: "get_keys",
                args: Ok(Some(json!({ "from_index": "0", "limit": KEYS_PAGE_LIMIT }))),
            },
            ViewRequest {
                method: "get_key_information",
                args: first_key,
            },
            ViewRequest {
                method: "get_drop_information",
                args: for_drop.clone(),
            },
            ViewRequest {
                method: "get_keys_for_drop",
                args: for_drop,
            },
            ViewRequest {
                method: "get_key_supply_for_owner",
                args: Ok(Some(owner.clone())),
            },
            ViewRequest {
                method: "get_drop_supply_for_owner",
                args: Ok(Some(owner.clone())),
            },
            ViewRequest {
                method: "get_drops_for_owner",
                args: Ok(Some(owner)),
            },
        ]
    }

    /// Issue every view one after another. A failure drops only its own
    /// field from `snapshot`; the stage fails listing every such view.
    async fn collect_views(
        &self,
        keys: &[LinkdropKeypair],
        drop_id: Option<DropId>,
        snapshot: &mut ViewSnapshot,
    ) -> Result<(), StageError> {
        let mut failed = Vec::new();

        for request in self.view_requests(keys, drop_id) {
            let args = match request.args {
                Ok(args) => args,
                Err(missing) => {
                    log::warn!("View {} not attempted: {}", request.method, missing);
                    failed.push(request.method);
                    continue;
                }
            };

            match self
                .gateway
                .view(self.funder(), &self.config.contract_id, request.method, args)
                .await
            {
                Ok(value) => {
                    log::debug!("View {}: {}", request.method, value);
                    snapshot.insert(request.method, value);
                }
                Err(e) => {
                    log::warn!("View {} failed: {}", request.method, e);
                    failed.push(request.method);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(StageError::ViewsFailed(failed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{required_funding, FeeSchedule};
    use crate::drop::DropConfig;
    use linkdrop_keys::generate_key_batch;
    use near_gateway::{MockGateway, RecordedRequest};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    const ALL_VIEWS: [&str; 8] = [
        "get_key_total_supply",
        "get_keys",
        "get_key_information",
        "get_drop_information",
        "get_keys_for_drop",
        "get_key_supply_for_owner",
        "get_drop_supply_for_owner",
        "get_drops_for_owner",
    ];

    fn config() -> ProvisionConfig {
        let vars: HashMap<&str, &str> = [
            ("FUNDING_ACCOUNT_ID", "funder.testnet"),
            ("NEAR_AMOUNT", "1"),
            ("CONTRACT_ID", "proxy.testnet"),
            ("FT_CONTRACT_ID", "token.testnet"),
            ("FT_BALANCE_PER_USE", "5"),
        ]
        .into_iter()
        .collect();
        ProvisionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
    }

    fn funding(config: &ProvisionConfig) -> FundingAmount {
        required_funding(
            config.deposit_per_use,
            config.num_keys,
            config.drop_config.uses_per_key,
            &FeeSchedule::default(),
        )
        .unwrap()
    }

    fn healthy_gateway() -> MockGateway {
        let mut gateway = MockGateway::new().respond("get_next_drop_id", json!(0));
        for view in ALL_VIEWS {
            gateway = gateway.respond(view, json!({ "view": view }));
        }
        gateway
    }

    #[tokio::test]
    async fn test_single_key_end_to_end() {
        let config = config();
        let gateway = healthy_gateway();
        let keys = generate_key_batch(1);
        let funding = funding(&config);
        assert_eq!(funding.near, Decimal::new(4005, 3));

        let run = Provisioner::new(&config, &gateway).run(&keys, &funding).await;

        assert_eq!(run.report.failure_count(), 0);
        assert_eq!(run.drop_id, Some(DropId(0)));
        assert_eq!(run.snapshot.len(), ALL_VIEWS.len());
        for view in ALL_VIEWS {
            assert!(run.snapshot.contains(view), "missing {}", view);
        }

        let mut expected = vec![
            "new",
            "add_to_balance",
            "get_next_drop_id",
            "create_drop",
            "storage_deposit",
            "ft_transfer_call",
        ];
        expected.extend(ALL_VIEWS);
        assert_eq!(gateway.methods(), expected);
    }

    #[tokio::test]
    async fn test_call_arguments() {
        let mut config = config();
        config.num_keys = 2;
        let gateway = healthy_gateway();
        let keys = generate_key_batch(2);
        let funding = funding(&config);

        Provisioner::new(&config, &gateway).run(&keys, &funding).await;

        let new = gateway.find_call("new").unwrap();
        assert_eq!(new.contract_id, "proxy.testnet");
        assert_eq!(
            new.args,
            json!({ "root_account": "testnet", "owner_id": "funder.testnet" })
        );

        let add = gateway.find_call("add_to_balance").unwrap();
        assert_eq!(add.deposit, funding.yocto);

        let create = gateway.find_call("create_drop").unwrap();
        assert_eq!(
            create.args["public_keys"],
            json!([keys[0].public_key, keys[1].public_key])
        );
        assert_eq!(create.args["deposit_per_use"], json!("1000000000000000000000000"));
        assert_eq!(create.args["ft_data"]["contract_id"], json!("token.testnet"));
        assert_eq!(create.args["config"]["uses_per_key"], json!(1));
        assert!(create.args["metadata"].is_string());

        let storage = gateway.find_call("storage_deposit").unwrap();
        assert_eq!(storage.contract_id, "token.testnet");
        assert_eq!(storage.deposit, FT_STORAGE_DEPOSIT);
        assert_eq!(storage.args, json!({ "account_id": "proxy.testnet" }));

        let transfer = gateway.find_call("ft_transfer_call").unwrap();
        assert_eq!(transfer.deposit, ONE_YOCTO);
        assert_eq!(
            transfer.args,
            json!({ "receiver_id": "proxy.testnet", "amount": "10", "msg": "0" })
        );

        // Every call is signed by the funding account
        for request in gateway.requests() {
            if let RecordedRequest::Call { signer_id, .. } = request {
                assert_eq!(signer_id, "funder.testnet");
            }
        }
    }

    #[tokio::test]
    async fn test_failed_funding_still_creates_drop() {
        let config = config();
        let gateway = healthy_gateway().fail("add_to_balance");
        let keys = generate_key_batch(1);

        let run = Provisioner::new(&config, &gateway)
            .run(&keys, &funding(&config))
            .await;

        let methods = gateway.methods();
        let add = methods.iter().position(|m| m == "add_to_balance").unwrap();
        let create = methods.iter().position(|m| m == "create_drop").unwrap();
        assert!(create > add);

        assert!(matches!(
            run.report.outcome(Stage::FundBalance),
            Some(StageOutcome::Failed(_))
        ));
        assert_eq!(run.report.outcome(Stage::CreateDrop), Some(&StageOutcome::Completed));
        assert_eq!(run.report.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_initialize_failure_is_not_fatal() {
        let config = config();
        let gateway = healthy_gateway().fail("new");

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert_eq!(run.report.records().len(), 5);
        assert_eq!(run.report.failure_count(), 1);
        assert!(gateway.find_call("ft_transfer_call").is_some());
    }

    #[tokio::test]
    async fn test_failing_view_leaves_field_absent() {
        let config = config();
        let gateway = healthy_gateway().fail("get_keys");

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert!(!run.snapshot.contains("get_keys"));
        assert_eq!(run.snapshot.len(), ALL_VIEWS.len() - 1);
        for view in ALL_VIEWS.iter().filter(|v| **v != "get_keys") {
            assert_eq!(run.snapshot.get(view), Some(&json!({ "view": view })));
        }
        assert!(matches!(
            run.report.outcome(Stage::CollectViews),
            Some(StageOutcome::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_create_keeps_predicted_id() {
        let config = config();
        let gateway = healthy_gateway()
            .respond("get_next_drop_id", json!(9))
            .fail("create_drop");

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert_eq!(run.drop_id, Some(DropId(9)));
        let transfer = gateway.find_call("ft_transfer_call").unwrap();
        assert_eq!(transfer.args["msg"], json!("9"));
    }

    #[tokio::test]
    async fn test_returned_drop_id_overrides_prediction() {
        let config = config();
        let gateway = healthy_gateway()
            .respond("get_next_drop_id", json!(3))
            .respond("create_drop", json!("4"));

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert_eq!(run.drop_id, Some(DropId(4)));
        let transfer = gateway.find_call("ft_transfer_call").unwrap();
        assert_eq!(transfer.args["msg"], json!("4"));

        let drop_view = gateway.requests().into_iter().find_map(|r| match r {
            RecordedRequest::View { method, args, .. } if method == "get_drop_information" => args,
            _ => None,
        });
        assert_eq!(drop_view, Some(json!({ "drop_id": 4 })));
    }

    #[tokio::test]
    async fn test_failed_prediction_still_creates_drop() {
        let config = config();
        let gateway = healthy_gateway()
            .fail("get_next_drop_id")
            .respond("create_drop", json!(5));

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert!(gateway.find_call("create_drop").is_some());
        assert_eq!(run.drop_id, Some(DropId(5)));
        assert_eq!(run.report.outcome(Stage::CreateDrop), Some(&StageOutcome::Completed));
        assert_eq!(run.report.failure_count(), 0);

        let transfer = gateway.find_call("ft_transfer_call").unwrap();
        assert_eq!(transfer.args["msg"], json!("5"));
        assert!(run.snapshot.contains("get_drop_information"));
    }

    #[tokio::test]
    async fn test_unknown_drop_id_propagates_as_missing_state() {
        let config = config();
        // No prediction and create_drop returns nothing
        let gateway = healthy_gateway().fail("get_next_drop_id");

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert_eq!(run.drop_id, None);
        assert!(gateway.find_call("create_drop").is_some());
        assert!(matches!(
            run.report.outcome(Stage::CreateDrop),
            Some(StageOutcome::Failed(_))
        ));
        // The token storage deposit still goes out before the transfer is abandoned
        assert!(gateway.find_call("storage_deposit").is_some());
        assert!(gateway.find_call("ft_transfer_call").is_none());
        assert!(!run.snapshot.contains("get_drop_information"));
        assert!(!run.snapshot.contains("get_keys_for_drop"));
        assert!(run.snapshot.contains("get_drops_for_owner"));
        assert_eq!(run.report.failure_count(), 3);
    }

    #[test]
    fn test_stage_names_pad_for_summary() {
        assert_eq!(format!("[{:<22}]", Stage::Initialize), format!("[initialize{}]", " ".repeat(12)));
        assert_eq!(format!("{:>9}", Stage::CreateDrop), "create_drop");
        assert_eq!(Stage::FundFungibleToken.to_string(), "fund_fungible_token");
    }

    #[tokio::test]
    async fn test_no_fungible_token_skips_stage() {
        let mut config = config();
        config.ft = None;
        config.drop_config = DropConfig {
            uses_per_key: 2,
            ..config.drop_config.clone()
        };
        let gateway = healthy_gateway();

        let run = Provisioner::new(&config, &gateway)
            .run(&generate_key_batch(1), &funding(&config))
            .await;

        assert!(matches!(
            run.report.outcome(Stage::FundFungibleToken),
            Some(StageOutcome::Skipped(_))
        ));
        assert!(gateway.find_call("storage_deposit").is_none());
        let create = gateway.find_call("create_drop").unwrap();
        assert_eq!(create.args["ft_data"], Value::Null);
        assert_eq!(create.args["config"]["uses_per_key"], json!(2));
    }
}
