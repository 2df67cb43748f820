use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use url::Url;

use crate::error::RpcError;
use crate::xmlrpc::{self, Value};

/// Authentication and version calls go to the common service, generic
/// object calls to the object service; the database listing and the
/// availability probe have services of their own.
pub const COMMON_SERVICE: &str = "xmlrpc/2/common";
pub const OBJECT_SERVICE: &str = "xmlrpc/2/object";
pub const DB_SERVICE: &str = "xmlrpc/2/db";
pub const PROBE_SERVICE: &str = "start";

/// The remote server's RPC surface, bound to one endpoint.
#[async_trait]
pub trait OdooRpc: Send + Sync {
    async fn server_version(&self) -> Result<Value, RpcError>;

    async fn list_databases(&self) -> Result<Vec<String>, RpcError>;

    /// Availability probe against the bare `start` service.
    async fn probe(&self) -> Result<Value, RpcError>;

    /// Returns the integer session handle, or the remote's `false` when the
    /// credentials are rejected. Interpreting that falsy handle is the
    /// caller's job.
    async fn authenticate(&self, db: &str, login: &str, password: &str)
        -> Result<Value, RpcError>;

    /// Generic object call: search / read / search_read / write / create.
    /// The protocol has no session token, so the database, handle and raw
    /// password ride along on every call.
    #[allow(clippy::too_many_arguments)]
    async fn execute_kw(
        &self,
        db: &str,
        uid: i64,
        password: &str,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Option<Value>,
    ) -> Result<Value, RpcError>;
}

/// Builds a client for whatever endpoint is currently stored; the endpoint
/// can change between requests, so clients are bound per request.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn OdooRpc>, RpcError>;
}

/// XML-RPC over HTTP, one POST per call.
pub struct XmlRpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl XmlRpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_http(endpoint, http)
    }

    fn with_http(endpoint: &str, http: reqwest::Client) -> Result<Self, RpcError> {
        // Parsed only to reject malformed endpoints up front; service paths
        // are appended to the raw string the way the remote expects.
        Url::parse(endpoint)?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
        })
    }

    async fn call(&self, service: &str, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let url = format!("{}/{}", self.endpoint, service);
        let body = xmlrpc::encode_call(method, params);
        tracing::debug!(url = %url, method, "issuing xml-rpc call");

        let response = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        xmlrpc::decode_response(&text)
    }
}

#[async_trait]
impl OdooRpc for XmlRpcClient {
    async fn server_version(&self) -> Result<Value, RpcError> {
        self.call(COMMON_SERVICE, "version", &[]).await
    }

    async fn list_databases(&self) -> Result<Vec<String>, RpcError> {
        let value = self.call(DB_SERVICE, "list", &[]).await?;
        let items = value
            .as_array()
            .ok_or_else(|| RpcError::Decode("database list is not an array".into()))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| RpcError::Decode("database list holds a non-string".into()))
            })
            .collect()
    }

    async fn probe(&self) -> Result<Value, RpcError> {
        self.call(PROBE_SERVICE, "start", &[]).await
    }

    async fn authenticate(
        &self,
        db: &str,
        login: &str,
        password: &str,
    ) -> Result<Value, RpcError> {
        self.call(
            COMMON_SERVICE,
            "authenticate",
            &[
                db.into(),
                login.into(),
                password.into(),
                Value::Struct(BTreeMap::new()),
            ],
        )
        .await
    }

    async fn execute_kw(
        &self,
        db: &str,
        uid: i64,
        password: &str,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Option<Value>,
    ) -> Result<Value, RpcError> {
        let mut params = vec![
            db.into(),
            Value::Int(uid),
            password.into(),
            model.into(),
            method.into(),
            Value::Array(args),
        ];
        if let Some(kwargs) = kwargs {
            params.push(kwargs);
        }
        self.call(OBJECT_SERVICE, "execute_kw", &params).await
    }
}

/// Production connector: one shared HTTP client, per-request endpoint binding.
pub struct XmlRpcConnector {
    http: reqwest::Client,
}

impl XmlRpcConnector {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to construct reqwest client for xml-rpc connector");
        Self { http }
    }
}

impl Connector for XmlRpcConnector {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn OdooRpc>, RpcError> {
        Ok(Arc::new(XmlRpcClient::with_http(
            endpoint,
            self.http.clone(),
        )?))
    }
}
