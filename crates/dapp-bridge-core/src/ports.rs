use alloy::primitives::Bytes;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Account, AccountFilter, ChainConfig, SignOptions};
use crate::event::RelayLink;
use crate::tx::GatewayTransaction;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("document detached")]
    Detached,
}

/// The host wallet's signing capability.
#[async_trait]
pub trait SigningGatewayPort: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>, PortError>;
    async fn request_account(&self, filter: &AccountFilter) -> Result<Account, PortError>;
    async fn sign_and_broadcast_transaction(
        &self,
        account_id: &str,
        tx: &GatewayTransaction,
        options: Option<&SignOptions>,
    ) -> Result<String, PortError>;
    async fn sign_message(&self, account_id: &str, message: &[u8]) -> Result<Bytes, PortError>;
}

/// Key-value store scoped to the host origin.
pub trait PersistencePort: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, PortError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PortError>;
}

/// Origin-scoped channel into the embedded document.
pub trait DocumentChannelPort: Send + Sync {
    /// Fails with [`PortError::Detached`] once the document is gone.
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), PortError>;
}

/// Connection to the node of the active chain.
pub trait RelayPort: Send {
    /// Replaces any previous connection. Node messages and connection
    /// events are reported through `link`.
    fn open(&mut self, chain: &ChainConfig, link: RelayLink) -> Result<(), PortError>;
    fn close(&mut self);
    /// Sends a raw envelope to the node unmodified.
    fn forward(&self, message: Value) -> Result<(), PortError>;
}

pub trait ClockPort: Send + Sync {
    fn now_ms(&self) -> Result<u64, PortError>;
}
