use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Bytes};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use dapp_bridge_core::{
    Account, AccountFilter, GatewayTransaction, PortError, SignOptions, SigningGatewayPort,
};

use crate::AdapterConfig;

/// Signing gateway of the host wallet.
///
/// Talks JSON-RPC to the wallet API when a gateway URL is configured, and
/// otherwise signs deterministically in process (development profile only).
#[derive(Debug, Clone)]
pub struct SigningGatewayAdapter {
    mode: GatewayMode,
    state: Arc<Mutex<GatewayState>>,
}

#[derive(Debug, Clone)]
enum GatewayMode {
    Disabled(String),
    Deterministic,
    Proxy(ProxyRuntime),
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
struct GatewayState {
    accounts: Vec<Account>,
    next_request_id: u64,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            accounts: vec![Account {
                id: "deterministic-1".to_owned(),
                address: "0x1000000000000000000000000000000000000001".to_owned(),
                currency_id: "ethereum".to_owned(),
                name: "Deterministic account".to_owned(),
            }],
            next_request_id: 0,
        }
    }
}

impl Default for SigningGatewayAdapter {
    fn default() -> Self {
        Self::with_config(AdapterConfig::from_env())
    }
}

impl SigningGatewayAdapter {
    pub fn with_config(config: AdapterConfig) -> Self {
        let mode = if let Some(ref base_url) = config.gateway_url {
            match reqwest::Client::builder()
                .timeout(config.http_timeout())
                .build()
            {
                Ok(client) => GatewayMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        GatewayMode::Disabled(format!(
                            "failed to initialize signing gateway client in production profile: {e}"
                        ))
                    } else {
                        GatewayMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            GatewayMode::Disabled(
                "signing gateway URL not configured in production runtime profile".to_owned(),
            )
        } else {
            GatewayMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(GatewayState::default())),
        }
    }

    /// Replaces the deterministic mode's account list.
    pub fn with_accounts(self, accounts: Vec<Account>) -> Self {
        if let Ok(mut g) = self.state.lock() {
            g.accounts = accounts;
        }
        self
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.mode, GatewayMode::Proxy(_))
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let GatewayMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn accounts(&self) -> Result<Vec<Account>, PortError> {
        let g = self
            .state
            .lock()
            .map_err(|e| PortError::Transport(format!("gateway lock poisoned: {e}")))?;
        Ok(g.accounts.clone())
    }

    fn deterministic_account(&self, account_id: &str) -> Result<Account, PortError> {
        self.accounts()?
            .into_iter()
            .find(|a| a.id == account_id)
            .ok_or_else(|| PortError::NotFound(format!("account {account_id}")))
    }

    fn deterministic_signature(&self, account: &Account, message: &[u8]) -> Bytes {
        let mut seed = Vec::new();
        seed.extend_from_slice(b"message.sign");
        seed.extend_from_slice(account.address.to_ascii_lowercase().as_bytes());
        seed.extend_from_slice(message);
        let hash = keccak256(seed);
        let mut sig = Vec::with_capacity(65);
        sig.extend_from_slice(hash.as_slice());
        sig.extend_from_slice(hash.as_slice());
        sig.push(27);
        Bytes::from(sig)
    }

    fn deterministic_hash(&self, account: &Account, tx: &GatewayTransaction) -> String {
        let seed = json!({
            "account": account.address.to_ascii_lowercase(),
            "transaction": transaction_payload(tx),
        });
        let hash = keccak256(seed.to_string().as_bytes());
        format!("0x{}", alloy::hex::encode(hash))
    }

    async fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let proxy = match &self.mode {
            GatewayMode::Proxy(proxy) => proxy,
            GatewayMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            GatewayMode::Deterministic => {
                return Err(PortError::NotImplemented(
                    "signing gateway proxy runtime not enabled",
                ))
            }
        };
        let id = {
            let mut g = self
                .state
                .lock()
                .map_err(|e| PortError::Transport(format!("gateway lock poisoned: {e}")))?;
            g.next_request_id = g.next_request_id.saturating_add(1);
            g.next_request_id
        };

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "signing gateway request");
        let response = proxy
            .client
            .post(&proxy.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("signing gateway request failed: {e}")))?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            PortError::Transport(format!("signing gateway json decode failed: {e}"))
        })?;
        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string());
            return Err(PortError::Rejected(message));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "signing gateway status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("signing gateway missing result".to_owned()))
    }
}

#[async_trait]
impl SigningGatewayPort for SigningGatewayAdapter {
    async fn list_accounts(&self) -> Result<Vec<Account>, PortError> {
        self.check_mode()?;
        if !self.is_proxy() {
            return self.accounts();
        }
        let result = self.proxy_call("account.list", json!({})).await?;
        serde_json::from_value(result)
            .map_err(|e| PortError::Validation(format!("invalid account list: {e}")))
    }

    async fn request_account(&self, filter: &AccountFilter) -> Result<Account, PortError> {
        self.check_mode()?;
        if !self.is_proxy() {
            return self
                .accounts()?
                .into_iter()
                .find(|a| filter.currency_ids.contains(&a.currency_id))
                .ok_or_else(|| {
                    PortError::Rejected(format!(
                        "no account for currencies {}",
                        filter.currency_ids.join(", ")
                    ))
                });
        }
        let params = serde_json::to_value(filter)
            .map_err(|e| PortError::Validation(format!("invalid account filter: {e}")))?;
        let result = self.proxy_call("account.request", params).await?;
        serde_json::from_value(result)
            .map_err(|e| PortError::Validation(format!("invalid account: {e}")))
    }

    async fn sign_and_broadcast_transaction(
        &self,
        account_id: &str,
        tx: &GatewayTransaction,
        options: Option<&SignOptions>,
    ) -> Result<String, PortError> {
        self.check_mode()?;
        if !self.is_proxy() {
            let account = self.deterministic_account(account_id)?;
            return Ok(self.deterministic_hash(&account, tx));
        }
        let mut params = json!({
            "accountId": account_id,
            "transaction": transaction_payload(tx),
        });
        if let Some(options) = options {
            params["options"] = serde_json::to_value(options)
                .map_err(|e| PortError::Validation(format!("invalid sign options: {e}")))?;
        }
        let result = self
            .proxy_call("transaction.signAndBroadcast", params)
            .await?;
        result
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| PortError::Transport("signAndBroadcast must return a hash".to_owned()))
    }

    async fn sign_message(&self, account_id: &str, message: &[u8]) -> Result<Bytes, PortError> {
        self.check_mode()?;
        if !self.is_proxy() {
            let account = self.deterministic_account(account_id)?;
            return Ok(self.deterministic_signature(&account, message));
        }
        let params = json!({
            "accountId": account_id,
            "message": format!("0x{}", alloy::hex::encode(message)),
        });
        let result = self.proxy_call("message.sign", params).await?;
        let raw = result.as_str().ok_or_else(|| {
            PortError::Transport("signature response must be hex string".to_owned())
        })?;
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid signature hex: {e}")))
    }
}

/// Wallet API transaction object; amounts are decimal strings.
pub fn transaction_payload(tx: &GatewayTransaction) -> Value {
    let mut payload = json!({
        "family": GatewayTransaction::FAMILY,
        "amount": tx.amount.to_string(),
    });
    let optional = [
        ("recipient", tx.recipient_checksummed()),
        ("gasLimit", tx.gas_limit.map(|v| v.to_string())),
        ("gasPrice", tx.gas_price.map(|v| v.to_string())),
        ("maxFeePerGas", tx.max_fee_per_gas.map(|v| v.to_string())),
        (
            "maxPriorityFeePerGas",
            tx.max_priority_fee_per_gas.map(|v| v.to_string()),
        ),
        (
            "data",
            tx.data
                .as_ref()
                .map(|d| format!("0x{}", alloy::hex::encode(d))),
        ),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            payload[key] = Value::String(value);
        }
    }
    payload
}
