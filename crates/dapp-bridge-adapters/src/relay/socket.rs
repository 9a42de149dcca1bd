use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use dapp_bridge_core::{ConnectionAction, PortError, RelayLink};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential backoff between reconnect attempts. Attempts never run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// A streaming node connection kept alive by a background task.
///
/// Calls sent while the socket is down are queued and flushed on reconnect.
/// Dropping the relay stops the task.
#[derive(Debug)]
pub struct SocketRelay {
    outbound: mpsc::UnboundedSender<Value>,
    shutdown: watch::Sender<bool>,
}

impl SocketRelay {
    pub fn spawn(url: String, link: RelayLink, policy: ReconnectPolicy) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(url, link, outbound_rx, shutdown_rx, policy));
        Self { outbound, shutdown }
    }

    pub fn send(&self, message: Value) -> Result<(), PortError> {
        self.outbound
            .send(message)
            .map_err(|_| PortError::Transport("node connection task stopped".to_owned()))
    }

    pub fn close(self) {
        let _ = self.shutdown.send(true);
    }
}

enum Exit {
    Shutdown,
    Dropped,
}

async fn run(
    url: String,
    link: RelayLink,
    mut outbound: mpsc::UnboundedReceiver<Value>,
    mut shutdown: watch::Receiver<bool>,
    policy: ReconnectPolicy,
) {
    let mut backlog = VecDeque::new();
    let mut attempt: u32 = 0;
    loop {
        let connected = tokio::select! {
            _ = shutdown.changed() => return,
            result = connect_async(url.as_str()) => result,
        };
        match connected {
            Ok((socket, _)) => {
                attempt = 0;
                info!(node = %url, epoch = link.epoch(), "node socket open");
                if !link.connection(ConnectionAction::Opened) {
                    return;
                }
                match pump(socket, &link, &mut outbound, &mut backlog, &mut shutdown).await {
                    Exit::Shutdown => return,
                    Exit::Dropped => warn!(node = %url, "node socket dropped"),
                }
            }
            Err(e) => warn!(node = %url, attempt, error = %e, "node socket connect failed"),
        }

        if !link.connection(ConnectionAction::Dropped) {
            return;
        }
        let delay = policy.delay(attempt);
        attempt = attempt.saturating_add(1);
        debug!(node = %url, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    socket: Socket,
    link: &RelayLink,
    outbound: &mut mpsc::UnboundedReceiver<Value>,
    backlog: &mut VecDeque<Value>,
    shutdown: &mut watch::Receiver<bool>,
) -> Exit {
    let (mut sink, mut source) = socket.split();

    while let Some(message) = backlog.pop_front() {
        if let Err(e) = sink.send(Message::Text(message.to_string().into())).await {
            warn!(error = %e, "failed to flush queued node call");
            backlog.push_front(message);
            return Exit::Dropped;
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return Exit::Shutdown;
            }
            next = outbound.recv() => {
                let Some(message) = next else {
                    return Exit::Shutdown;
                };
                if let Err(e) = sink.send(Message::Text(message.to_string().into())).await {
                    warn!(error = %e, "failed to send node call");
                    backlog.push_back(message);
                    return Exit::Dropped;
                }
            }
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Value>(text.as_str()) {
                        Ok(message) => {
                            if !link.message(message) {
                                return Exit::Shutdown;
                            }
                        }
                        Err(e) => debug!(error = %e, "ignoring non-JSON node frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Exit::Dropped,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "node socket read failed");
                    return Exit::Dropped;
                }
            }
        }
    }
}
