//! The gateway trait and the request/outcome types shared by implementations.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::GatewayError;

/// Gas units.
pub type Gas = u64;

/// One teragas.
pub const TGAS: Gas = 1_000_000_000_000;

/// Maximum gas a single function call may attach.
pub const MAX_GAS: Gas = 300 * TGAS;

/// Smallest attachable deposit; NEP-141 transfers require exactly this.
pub const ONE_YOCTO: u128 = 1;

/// A state-changing function call on a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub contract_id: String,
    pub method: String,
    pub args: Value,
    pub gas: Gas,
    /// Attached deposit in yoctoNEAR.
    pub deposit: u128,
}

impl FunctionCall {
    /// A call with empty arguments, [`MAX_GAS`] and no deposit.
    pub fn new(contract_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            method: method.into(),
            args: Value::Object(Default::default()),
            gas: MAX_GAS,
            deposit: 0,
        }
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn deposit(mut self, deposit: u128) -> Self {
        self.deposit = deposit;
        self
    }
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub transaction_hash: String,
    /// JSON return value of the called method, if it returned one.
    pub return_value: Option<Value>,
}

/// Call and view access to contracts on one network.
///
/// Each invocation is independent. Implementations must not retry calls;
/// retry policy belongs to the caller.
pub trait ContractGateway: Send + Sync {
    /// Sign and submit `call` as `signer_id`.
    fn call<'a>(
        &'a self,
        signer_id: &'a str,
        call: FunctionCall,
    ) -> BoxFuture<'a, Result<CallOutcome, GatewayError>>;

    /// Query a view method. `account_id` is the account on whose behalf the
    /// query is made; it carries no authority. `None` args are sent as `{}`.
    fn view<'a>(
        &'a self,
        account_id: &'a str,
        contract_id: &'a str,
        method: &'a str,
        args: Option<Value>,
    ) -> BoxFuture<'a, Result<Value, GatewayError>>;
}
