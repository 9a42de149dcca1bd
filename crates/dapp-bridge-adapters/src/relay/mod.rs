mod oneshot;
mod socket;

pub use oneshot::OneShotRelay;
pub use socket::{ReconnectPolicy, SocketRelay};

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use dapp_bridge_core::{ChainConfig, NodeScheme, PortError, RelayLink, RelayPort};

use crate::AdapterConfig;

/// Node relay for the active chain; picks the transport from the node URL scheme.
#[derive(Debug)]
pub struct NodeRelay {
    client: reqwest::Client,
    policy: ReconnectPolicy,
    active: Option<ActiveRelay>,
}

#[derive(Debug)]
enum ActiveRelay {
    Socket(SocketRelay),
    OneShot(OneShotRelay),
}

impl NodeRelay {
    pub fn with_config(config: &AdapterConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build node http client: {e}")))?;
        Ok(Self {
            client,
            policy: ReconnectPolicy {
                base_delay: Duration::from_millis(config.reconnect_base_delay_ms.max(1)),
                max_delay: Duration::from_millis(
                    config
                        .reconnect_max_delay_ms
                        .max(config.reconnect_base_delay_ms.max(1)),
                ),
            },
            active: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }
}

impl RelayPort for NodeRelay {
    fn open(&mut self, chain: &ChainConfig, link: RelayLink) -> Result<(), PortError> {
        self.close();
        let scheme = chain
            .node_scheme()
            .map_err(|e| PortError::Validation(e.to_string()))?;
        self.active = Some(match scheme {
            NodeScheme::Stream => ActiveRelay::Socket(SocketRelay::spawn(
                chain.node_url.clone(),
                link,
                self.policy,
            )),
            NodeScheme::OneShot => ActiveRelay::OneShot(OneShotRelay::new(
                chain.node_url.clone(),
                self.client.clone(),
                link,
            )),
        });
        Ok(())
    }

    fn close(&mut self) {
        match self.active.take() {
            Some(ActiveRelay::Socket(socket)) => {
                debug!("closing node socket");
                socket.close();
            }
            Some(ActiveRelay::OneShot(_)) | None => {}
        }
    }

    fn forward(&self, message: Value) -> Result<(), PortError> {
        match &self.active {
            Some(ActiveRelay::Socket(socket)) => socket.send(message),
            Some(ActiveRelay::OneShot(oneshot)) => oneshot.send(message),
            None => Err(PortError::Transport("no node connection".to_owned())),
        }
    }
}

impl Drop for NodeRelay {
    fn drop(&mut self) {
        self.close();
    }
}
