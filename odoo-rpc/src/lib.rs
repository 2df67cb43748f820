pub mod client;
pub mod error;
pub mod mock;
pub mod xmlrpc;

pub use client::{Connector, OdooRpc, XmlRpcClient, XmlRpcConnector};
pub use error::RpcError;
pub use xmlrpc::Value;
