//! NEAR JSON-RPC implementation of [`ContractGateway`].

use std::collections::HashMap;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use futures::FutureExt;
use linkdrop_keys::InMemorySigner;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::gateway::{CallOutcome, ContractGateway, FunctionCall};
use crate::transaction::{Action, Ed25519PublicKey, FunctionCallAction, Transaction};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<Value>,
}

/// Gateway talking to a NEAR RPC node.
///
/// Signing keys are registered per account with [`with_signer`](Self::with_signer);
/// views need no key.
pub struct JsonRpcGateway {
    client: reqwest::Client,
    rpc_url: String,
    signers: HashMap<String, InMemorySigner>,
}

impl JsonRpcGateway {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            signers: HashMap::new(),
        })
    }

    pub fn with_signer(mut self, signer: InMemorySigner) -> Self {
        self.signers.insert(signer.account_id().to_string(), signer);
        self
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "method": method,
            "params": params,
        });
        log::debug!("RPC {} -> {}", method, self.rpc_url);

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(GatewayError::Rpc(error.to_string()));
        }
        response
            .result
            .ok_or_else(|| GatewayError::InvalidResponse(format!("{} returned no result", method)))
    }

    async fn view_function(
        &self,
        contract_id: &str,
        method: &str,
        args: Option<Value>,
    ) -> Result<Value, GatewayError> {
        let args = serde_json::to_vec(&args.unwrap_or_else(|| json!({})))?;
        let result = self
            .rpc(
                "query",
                json!({
                    "request_type": "call_function",
                    "finality": "final",
                    "account_id": contract_id,
                    "method_name": method,
                    "args_base64": STANDARD.encode(args),
                }),
            )
            .await?;

        // Older nodes report contract panics inside a successful query result.
        if let Some(error) = result.get("error") {
            return Err(GatewayError::ViewFailed(error_text(error)));
        }

        let bytes: Vec<u8> = result
            .get("result")
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse("query result has no bytes".to_string()))
            .and_then(|v| serde_json::from_value(v).map_err(GatewayError::from))?;
        decode_json_bytes(&bytes)
    }

    async fn submit(&self, signer_id: &str, call: FunctionCall) -> Result<CallOutcome, GatewayError> {
        let signer = self
            .signers
            .get(signer_id)
            .ok_or_else(|| GatewayError::UnknownSigner(signer_id.to_string()))?;

        let access_key = self
            .rpc(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": signer_id,
                    "public_key": signer.public_key(),
                }),
            )
            .await?;
        let transaction = build_transaction(signer, &access_key, call)?;
        let signed = transaction.sign(signer)?;
        log::debug!("Broadcasting transaction {}", signed.hash_base58());

        let encoded = STANDARD.encode(borsh::to_vec(&signed)?);
        let outcome = self.rpc("broadcast_tx_commit", json!([encoded])).await?;
        parse_execution_outcome(&outcome, signed.hash_base58())
    }
}

impl ContractGateway for JsonRpcGateway {
    fn call<'a>(
        &'a self,
        signer_id: &'a str,
        call: FunctionCall,
    ) -> BoxFuture<'a, Result<CallOutcome, GatewayError>> {
        self.submit(signer_id, call).boxed()
    }

    fn view<'a>(
        &'a self,
        _account_id: &'a str,
        contract_id: &'a str,
        method: &'a str,
        args: Option<Value>,
    ) -> BoxFuture<'a, Result<Value, GatewayError>> {
        self.view_function(contract_id, method, args).boxed()
    }
}

/// Build the transaction for `call` on top of the signer's access key
/// state as returned by `view_access_key`.
fn build_transaction(
    signer: &InMemorySigner,
    access_key: &Value,
    call: FunctionCall,
) -> Result<Transaction, GatewayError> {
    if let Some(error) = access_key.get("error") {
        return Err(GatewayError::Rpc(error_text(error)));
    }

    let nonce = access_key
        .get("nonce")
        .and_then(Value::as_u64)
        .ok_or_else(|| GatewayError::InvalidResponse("access key has no nonce".to_string()))?;
    let block_hash = access_key
        .get("block_hash")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse("access key has no block_hash".to_string()))
        .and_then(decode_block_hash)?;

    Ok(Transaction {
        signer_id: signer.account_id().to_string(),
        public_key: Ed25519PublicKey(signer.public_key_bytes()),
        nonce: nonce + 1,
        receiver_id: call.contract_id,
        block_hash,
        actions: vec![Action::FunctionCall(FunctionCallAction {
            method_name: call.method,
            args: serde_json::to_vec(&call.args)?,
            gas: call.gas,
            deposit: call.deposit,
        })],
    })
}

fn error_text(error: &Value) -> String {
    match error.as_str() {
        Some(text) => text.to_string(),
        None => error.to_string(),
    }
}

fn decode_block_hash(encoded: &str) -> Result<[u8; 32], GatewayError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| GatewayError::InvalidResponse(format!("block hash: {}", e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        GatewayError::InvalidResponse(format!("block hash has {} bytes", bytes.len()))
    })
}

/// Contract return values are raw bytes; every method we talk to returns
/// JSON, and `()` returns nothing.
fn decode_json_bytes(bytes: &[u8]) -> Result<Value, GatewayError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        GatewayError::InvalidResponse(format!(
            "return value is not JSON ({}): {}",
            e,
            String::from_utf8_lossy(bytes)
        ))
    })
}

/// Map a `FinalExecutionOutcome` to a [`CallOutcome`].
fn parse_execution_outcome(outcome: &Value, fallback_hash: String) -> Result<CallOutcome, GatewayError> {
    let transaction_hash = outcome
        .pointer("/transaction/hash")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback_hash);

    let status = outcome
        .get("status")
        .ok_or_else(|| GatewayError::InvalidResponse("outcome has no status".to_string()))?;

    if let Some(failure) = status.get("Failure") {
        return Err(GatewayError::ExecutionFailed(failure.to_string()));
    }

    let encoded = status
        .get("SuccessValue")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("unexpected status {}", status)))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| GatewayError::InvalidResponse(format!("SuccessValue: {}", e)))?;

    let return_value = match decode_json_bytes(&bytes)? {
        Value::Null => None,
        value => Some(value),
    };

    Ok(CallOutcome {
        transaction_hash,
        return_value,
    })
}
