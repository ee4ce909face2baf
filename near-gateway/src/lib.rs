//! NEAR Contract Gateway
//!
//! A thin adapter for invoking NEAR smart contracts.
//!
//! # Overview
//!
//! Two operations are exposed through the [`ContractGateway`] trait:
//!
//! - `call`: a signed, fee-bearing transaction carrying one function call
//! - `view`: a read-only `call_function` query
//!
//! [`JsonRpcGateway`] implements both against a NEAR JSON-RPC endpoint. It
//! never retries and never interprets contract failures; they come back as
//! [`GatewayError`] for the caller to handle.
//!
//! With the `testing` feature, `MockGateway` records requests in order and
//! answers from canned responses.

mod error;
mod gateway;
#[cfg(any(test, feature = "testing"))]
mod mock;
mod rpc;
mod transaction;

pub use error::GatewayError;
pub use gateway::{CallOutcome, ContractGateway, FunctionCall, Gas, MAX_GAS, ONE_YOCTO, TGAS};
#[cfg(any(test, feature = "testing"))]
pub use mock::{MockGateway, RecordedRequest};
pub use rpc::JsonRpcGateway;
pub use transaction::{Action, FunctionCallAction, SignedTransaction, Transaction};
