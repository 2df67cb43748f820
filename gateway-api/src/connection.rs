use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Connection credentials for the remote server. Exactly one context exists
/// per process; the last writer wins and every request reads whatever was
/// stored most recently.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConnectionContext {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// The single mutable slot. Reads clone the whole struct and writes replace
/// it wholesale, so concurrent requests never observe a half-written context.
#[derive(Default)]
pub struct ConnectionStore {
    context: RwLock<ConnectionContext>,
}

impl ConnectionStore {
    pub fn new() -> ConnectionStore {
        ConnectionStore::default()
    }

    /// Overwrite the context unconditionally. Blank fields are accepted and
    /// surface later as authentication failures.
    pub async fn store(&self, context: ConnectionContext) {
        *self.context.write().await = context;
    }

    /// Overwrite only the endpoint, keeping the rest of the context.
    pub async fn store_url(&self, url: String) {
        self.context.write().await.url = url;
    }

    pub async fn snapshot(&self) -> ConnectionContext {
        self.context.read().await.clone()
    }
}
