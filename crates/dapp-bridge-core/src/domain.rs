use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::envelope::RequestId;

/// Storage key for the last selected account id.
pub const ACCOUNT_ID_KEY: &str = "accountId";

pub const DEFAULT_DAPP_NAME: &str = "DApp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid dapp url {url}: {reason}")]
    InvalidDappUrl { url: String, reason: String },
    #[error("dapp url {0} has an opaque origin")]
    OpaqueOrigin(String),
    #[error("invalid node url {url}: {reason}")]
    InvalidNodeUrl { url: String, reason: String },
    #[error("unsupported node url scheme {scheme} for {url}")]
    UnsupportedNodeScheme { url: String, scheme: String },
}

/// One supported network and its node endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(rename = "currency", alias = "currencyId")]
    pub currency_id: String,
    #[serde(rename = "nodeURL")]
    pub node_url: String,
    #[serde(rename = "chainID")]
    pub chain_id: u64,
}

impl ChainConfig {
    pub fn new(currency_id: impl Into<String>, node_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            currency_id: currency_id.into(),
            node_url: node_url.into(),
            chain_id,
        }
    }

    /// Chain id as an EIP-695 quantity, e.g. `0x89`.
    pub fn hex_chain_id(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    pub fn node_scheme(&self) -> Result<NodeScheme, DomainError> {
        let url = Url::parse(&self.node_url).map_err(|e| DomainError::InvalidNodeUrl {
            url: self.node_url.clone(),
            reason: e.to_string(),
        })?;
        NodeScheme::from_scheme(url.scheme()).ok_or_else(|| DomainError::UnsupportedNodeScheme {
            url: self.node_url.clone(),
            scheme: url.scheme().to_owned(),
        })
    }
}

/// How forwarded calls reach a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeScheme {
    /// Persistent streaming connection (`wss:`, `ws:`).
    Stream,
    /// Discrete request/response calls (`https:`, `http:`).
    OneShot,
}

impl NodeScheme {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "wss" | "ws" => Some(Self::Stream),
            "https" | "http" => Some(Self::OneShot),
            _ => None,
        }
    }
}

/// Account as listed by the signing gateway. The bridge never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub address: String,
    #[serde(rename = "currency", alias = "currencyId")]
    pub currency_id: String,
    #[serde(default)]
    pub name: String,
}

impl Account {
    pub fn has_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFilter {
    pub currency_ids: Vec<String>,
}

/// Signing context hint forwarded with transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOptions {
    pub hw_app_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub issued_at: TimestampMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceHealth {
    Available,
    Blocked(String),
}

/// Parameters the host supplies when the bridge is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub dapp_url: String,
    pub dapp_name: String,
    pub nano_app: Option<String>,
    pub dependencies: Vec<String>,
    pub networks: Vec<ChainConfig>,
    pub initial_account_id: Option<String>,
    /// Extra query parameters appended verbatim to the dapp URL, repeats included.
    pub dapp_query: Vec<(String, String)>,
}

impl LaunchParams {
    pub fn new(dapp_url: impl Into<String>, networks: Vec<ChainConfig>) -> Self {
        Self {
            dapp_url: dapp_url.into(),
            dapp_name: DEFAULT_DAPP_NAME.to_owned(),
            nano_app: None,
            dependencies: Vec::new(),
            networks,
            initial_account_id: None,
            dapp_query: Vec::new(),
        }
    }

    /// Dapp URL with the pass-through query appended.
    pub fn embedded_url(&self) -> Result<Url, DomainError> {
        let mut url = Url::parse(&self.dapp_url).map_err(|e| DomainError::InvalidDappUrl {
            url: self.dapp_url.clone(),
            reason: e.to_string(),
        })?;
        if !self.dapp_query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.dapp_query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Scheme+host+port of the embedded document.
    pub fn dapp_origin(&self) -> Result<String, DomainError> {
        let url = self.embedded_url()?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(DomainError::OpaqueOrigin(self.dapp_url.clone()));
        }
        Ok(origin.ascii_serialization())
    }

    pub fn sign_options(&self) -> Option<SignOptions> {
        self.nano_app.as_ref().map(|app| SignOptions {
            hw_app_id: app.clone(),
            dependencies: self.dependencies.clone(),
        })
    }
}

/// Capabilities and identity injected into the bridge at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub dapp_name: String,
    pub dapp_origin: String,
    pub sign_options: Option<SignOptions>,
}

impl SessionContext {
    pub fn from_launch(launch: &LaunchParams) -> Result<Self, DomainError> {
        Ok(Self {
            dapp_name: launch.dapp_name.clone(),
            dapp_origin: launch.dapp_origin()?,
            sign_options: launch.sign_options(),
        })
    }
}
