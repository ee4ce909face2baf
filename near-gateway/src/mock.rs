//! In-memory gateway for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::error::GatewayError;
use crate::gateway::{CallOutcome, ContractGateway, FunctionCall};

/// A request observed by [`MockGateway`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Call {
        signer_id: String,
        call: FunctionCall,
    },
    View {
        account_id: String,
        contract_id: String,
        method: String,
        args: Option<Value>,
    },
}

impl RecordedRequest {
    pub fn method(&self) -> &str {
        match self {
            RecordedRequest::Call { call, .. } => &call.method,
            RecordedRequest::View { method, .. } => method,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, RecordedRequest::Call { .. })
    }
}

/// Gateway that answers from canned responses keyed by method name.
///
/// Calls to a method with a response get it as their return value; views
/// without one return `null`. Methods marked with [`fail`](Self::fail)
/// always error.
#[derive(Default)]
pub struct MockGateway {
    responses: HashMap<String, Value>,
    failing: HashSet<String>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, method: &str, value: Value) -> Self {
        self.responses.insert(method.to_string(), value);
        self
    }

    pub fn fail(mut self, method: &str) -> Self {
        self.failing.insert(method.to_string());
        self
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().clone()
    }

    /// Method names of every request seen so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.method().to_string()).collect()
    }

    /// The first recorded call to `method`.
    pub fn find_call(&self, method: &str) -> Option<FunctionCall> {
        self.lock().iter().find_map(|r| match r {
            RecordedRequest::Call { call, .. } if call.method == method => Some(call.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContractGateway for MockGateway {
    fn call<'a>(
        &'a self,
        signer_id: &'a str,
        call: FunctionCall,
    ) -> BoxFuture<'a, Result<CallOutcome, GatewayError>> {
        let method = call.method.clone();
        let mut requests = self.lock();
        requests.push(RecordedRequest::Call {
            signer_id: signer_id.to_string(),
            call,
        });
        let count = requests.len();
        drop(requests);

        let result = if self.failing.contains(&method) {
            Err(GatewayError::ExecutionFailed(format!("mock failure: {}", method)))
        } else {
            Ok(CallOutcome {
                transaction_hash: format!("mock-tx-{}", count),
                return_value: self.responses.get(&method).cloned(),
            })
        };
        future::ready(result).boxed()
    }

    fn view<'a>(
        &'a self,
        account_id: &'a str,
        contract_id: &'a str,
        method: &'a str,
        args: Option<Value>,
    ) -> BoxFuture<'a, Result<Value, GatewayError>> {
        self.lock().push(RecordedRequest::View {
            account_id: account_id.to_string(),
            contract_id: contract_id.to_string(),
            method: method.to_string(),
            args,
        });

        let result = if self.failing.contains(method) {
            Err(GatewayError::ViewFailed(format!("mock failure: {}", method)))
        } else {
            Ok(self.responses.get(method).cloned().unwrap_or(Value::Null))
        };
        future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_records_in_order() {
        let gateway = MockGateway::new().respond("get_next_drop_id", json!(4));

        gateway
            .call("funder.testnet", FunctionCall::new("proxy.testnet", "new"))
            .await
            .unwrap();
        let id = gateway
            .view("funder.testnet", "proxy.testnet", "get_next_drop_id", None)
            .await
            .unwrap();

        assert_eq!(id, json!(4));
        assert_eq!(gateway.methods(), vec!["new", "get_next_drop_id"]);
        assert!(gateway.requests()[0].is_call());
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let gateway = MockGateway::new().fail("add_to_balance").fail("get_keys");

        let call = gateway
            .call("funder.testnet", FunctionCall::new("proxy.testnet", "add_to_balance"))
            .await;
        let view = gateway
            .view("funder.testnet", "proxy.testnet", "get_keys", None)
            .await;

        assert!(matches!(call, Err(GatewayError::ExecutionFailed(_))));
        assert!(matches!(view, Err(GatewayError::ViewFailed(_))));
        assert_eq!(gateway.methods().len(), 2);
    }
}
