//! In-memory stand-ins for the RPC client, used by unit and router tests.
//! Responses are scripted per (target, method) pair and handed out in FIFO
//! order; every call is recorded so tests can assert on call counts.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{Connector, OdooRpc};
use crate::error::RpcError;
use crate::xmlrpc::Value;

/// One observed call: the model name for object calls, or the service name
/// (`common`, `db`, `start`) for the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub target: String,
    pub method: String,
}

#[derive(Default)]
struct Inner {
    calls: Vec<RecordedCall>,
    authenticate_ret: Option<Value>,
    responses: Vec<(String, String, Value)>,
}

#[derive(Clone, Default)]
pub struct MockRpc {
    inner: Arc<Mutex<Inner>>,
}

impl MockRpc {
    pub fn new() -> MockRpc {
        MockRpc::default()
    }

    /// Script a successful authentication with the given session handle.
    pub fn with_uid(self, uid: i64) -> Self {
        self.inner.lock().unwrap().authenticate_ret = Some(Value::Int(uid));
        self
    }

    /// Script the raw authenticate return; the default is the remote's
    /// `false` rejection.
    pub fn with_auth(self, value: Value) -> Self {
        self.inner.lock().unwrap().authenticate_ret = Some(value);
        self
    }

    /// Queue a response for the next call against (target, method).
    pub fn respond(self, target: &str, method: &str, value: Value) -> Self {
        self.inner
            .lock()
            .unwrap()
            .responses
            .push((target.to_owned(), method.to_owned(), value));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, target: &str, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.target == target && call.method == method)
            .count()
    }

    fn record(&self, target: &str, method: &str) {
        self.inner.lock().unwrap().calls.push(RecordedCall {
            target: target.to_owned(),
            method: method.to_owned(),
        });
    }

    fn take_response(&self, target: &str, method: &str) -> Option<Value> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner
            .responses
            .iter()
            .position(|(t, m, _)| t == target && m == method)?;
        Some(inner.responses.remove(index).2)
    }
}

#[async_trait]
impl OdooRpc for MockRpc {
    async fn server_version(&self) -> Result<Value, RpcError> {
        self.record("common", "version");
        Ok(self
            .take_response("common", "version")
            .unwrap_or(Value::Struct(Default::default())))
    }

    async fn list_databases(&self) -> Result<Vec<String>, RpcError> {
        self.record("db", "list");
        let scripted = self
            .take_response("db", "list")
            .unwrap_or(Value::Array(vec![]));
        Ok(scripted
            .as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect())
    }

    async fn probe(&self) -> Result<Value, RpcError> {
        self.record("start", "start");
        Ok(self
            .take_response("start", "start")
            .unwrap_or(Value::Struct(Default::default())))
    }

    async fn authenticate(
        &self,
        _db: &str,
        _login: &str,
        _password: &str,
    ) -> Result<Value, RpcError> {
        self.record("common", "authenticate");
        let ret = self.inner.lock().unwrap().authenticate_ret.clone();
        Ok(ret.unwrap_or(Value::Bool(false)))
    }

    async fn execute_kw(
        &self,
        _db: &str,
        _uid: i64,
        _password: &str,
        model: &str,
        method: &str,
        _args: Vec<Value>,
        _kwargs: Option<Value>,
    ) -> Result<Value, RpcError> {
        self.record(model, method);
        self.take_response(model, method).ok_or_else(|| {
            RpcError::Decode(format!("no scripted response for {model}.{method}"))
        })
    }
}

#[derive(Clone)]
pub struct MockConnector {
    rpc: MockRpc,
}

impl MockConnector {
    pub fn new(rpc: MockRpc) -> MockConnector {
        MockConnector { rpc }
    }
}

impl Connector for MockConnector {
    fn connect(&self, _endpoint: &str) -> Result<Arc<dyn OdooRpc>, RpcError> {
        Ok(Arc::new(self.rpc.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::MockRpc;
    use crate::client::OdooRpc;
    use crate::error::RpcError;
    use crate::xmlrpc::Value;

    #[tokio::test]
    async fn scripted_responses_drain_in_fifo_order_per_target() {
        let rpc = MockRpc::new()
            .respond("project.task.type", "search_read", Value::Int(1))
            .respond("project.task", "search_read", Value::Int(2))
            .respond("project.task.type", "search_read", Value::Int(3));

        let first = rpc
            .execute_kw("db", 1, "pw", "project.task.type", "search_read", vec![], None)
            .await
            .unwrap();
        let second = rpc
            .execute_kw("db", 1, "pw", "project.task.type", "search_read", vec![], None)
            .await
            .unwrap();

        assert_eq!(first, Value::Int(1));
        assert_eq!(second, Value::Int(3));
        assert_eq!(rpc.count("project.task.type", "search_read"), 2);
        assert_eq!(rpc.count("project.task", "search_read"), 0);
    }

    #[tokio::test]
    async fn unscripted_object_calls_error_loudly() {
        let rpc = MockRpc::new();

        let result = rpc
            .execute_kw("db", 1, "pw", "res.partner", "search_read", vec![], None)
            .await;

        assert!(matches!(result, Err(RpcError::Decode(_))));
    }
}
