use serde_json::Value;
use tracing::{debug, warn};

use dapp_bridge_core::{Outbound, PortError, RelayLink, RequestId, RpcError};

/// Request/response node endpoint: every forwarded call is its own HTTP POST.
///
/// Answers come back through the relay link like streaming node messages.
/// A failed POST is answered with a synthesized internal error for the call's id.
#[derive(Debug, Clone)]
pub struct OneShotRelay {
    url: String,
    client: reqwest::Client,
    link: RelayLink,
}

impl OneShotRelay {
    pub fn new(url: String, client: reqwest::Client, link: RelayLink) -> Self {
        Self { url, client, link }
    }

    pub fn send(&self, message: Value) -> Result<(), PortError> {
        if self.link.is_closed() {
            return Err(PortError::Transport("bridge no longer listening".to_owned()));
        }
        let relay = self.clone();
        tokio::spawn(async move {
            let answer = match post(&relay.client, &relay.url, &message).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(node = %relay.url, error = %e, "node request failed");
                    let Some(id) = RequestId::from_message(&message) else {
                        return;
                    };
                    Outbound::error(
                        Some(id),
                        RpcError::internal(format!("Node request failed: {e}")),
                    )
                    .to_message()
                }
            };
            if !relay.link.message(answer) {
                debug!("node answer arrived after the bridge stopped");
            }
        });
        Ok(())
    }
}

async fn post(client: &reqwest::Client, url: &str, message: &Value) -> Result<Value, PortError> {
    let response = client
        .post(url)
        .json(message)
        .send()
        .await
        .map_err(|e| PortError::Transport(format!("node request failed: {e}")))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| PortError::Transport(format!("node json decode failed: {e}")))?;
    if !status.is_success() && body.get("error").is_none() {
        return Err(PortError::Transport(format!("node status {status}")));
    }
    Ok(body)
}
