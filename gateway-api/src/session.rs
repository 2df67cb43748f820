use std::collections::BTreeMap;
use std::sync::Arc;

use odoo_rpc::{Connector, OdooRpc, RpcError, Value};

use crate::api::ApiError;
use crate::connection::ConnectionContext;

/// An authenticated hold on the remote server for the span of one request.
///
/// The protocol has no session token: the database, the numeric handle and
/// the raw password ride along on every object call, so the session keeps
/// all three. Nothing is cached across requests.
pub struct Session {
    rpc: Arc<dyn OdooRpc>,
    db: String,
    password: String,
    pub uid: i64,
}

impl Session {
    /// Authenticate against the stored context. A falsy handle (the remote
    /// answers `false` or 0 for bad credentials) fails here, before any
    /// object call is attempted.
    pub async fn open(
        connector: &dyn Connector,
        context: &ConnectionContext,
    ) -> Result<Session, ApiError> {
        let rpc = connector.connect(&context.url)?;
        let handle = rpc
            .authenticate(&context.db, &context.username, &context.password)
            .await?;

        let uid = match handle {
            Value::Int(uid) if uid != 0 => uid,
            _ => {
                tracing::warn!(
                    username = %context.username,
                    db = %context.db,
                    "remote rejected the stored credentials"
                );
                return Err(ApiError::AuthenticationFailed);
            }
        };

        Ok(Session {
            rpc,
            db: context.db.clone(),
            password: context.password.clone(),
            uid,
        })
    }

    async fn object_call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Option<Value>,
    ) -> Result<Value, ApiError> {
        Ok(self
            .rpc
            .execute_kw(&self.db, self.uid, &self.password, model, method, args, kwargs)
            .await?)
    }

    pub async fn search(&self, model: &str, domain: Value) -> Result<Vec<i64>, ApiError> {
        let value = self.object_call(model, "search", vec![domain], None).await?;
        let ids = value
            .as_array()
            .ok_or_else(|| decode_error("search result is not an array"))?;
        ids.iter()
            .map(|id| {
                id.as_i64()
                    .ok_or_else(|| decode_error("search result holds a non-integer id"))
            })
            .collect()
    }

    pub async fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<Value>, ApiError> {
        let id_list = Value::Array(ids.iter().copied().map(Value::Int).collect());
        let value = self
            .object_call(model, "read", vec![id_list], Some(fields_kwarg(fields)))
            .await?;
        records_from(value)
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
    ) -> Result<Vec<Value>, ApiError> {
        let value = self
            .object_call(model, "search_read", vec![domain], Some(fields_kwarg(fields)))
            .await?;
        records_from(value)
    }

    /// The remote acknowledges writes with a bare boolean; `false` is a
    /// rejection, not a fault.
    pub async fn write(&self, model: &str, ids: &[i64], values: Value) -> Result<bool, ApiError> {
        let id_list = Value::Array(ids.iter().copied().map(Value::Int).collect());
        let value = self
            .object_call(model, "write", vec![id_list, values], None)
            .await?;
        Ok(value.is_truthy())
    }

    pub async fn create(&self, model: &str, values: Value) -> Result<i64, ApiError> {
        let value = self.object_call(model, "create", vec![values], None).await?;
        value
            .as_i64()
            .ok_or_else(|| decode_error("create did not return a record id"))
    }
}

fn fields_kwarg(fields: &[&str]) -> Value {
    let list = Value::Array(fields.iter().map(|field| Value::from(*field)).collect());
    Value::Struct(BTreeMap::from([("fields".to_string(), list)]))
}

fn records_from(value: Value) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(decode_error("record query result is not an array")),
    }
}

fn decode_error(message: &str) -> ApiError {
    ApiError::Rpc(RpcError::Decode(message.to_owned()))
}
