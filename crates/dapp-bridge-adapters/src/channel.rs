use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use dapp_bridge_core::{DocumentChannelPort, PortError};

/// A message addressed to the embedded document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedMessage {
    pub target_origin: String,
    pub message: Value,
}

/// Document channel backed by an mpsc queue; the document is detached once
/// the receiving side is dropped.
#[derive(Debug, Clone)]
pub struct ChannelDocument {
    tx: mpsc::UnboundedSender<PostedMessage>,
}

impl ChannelDocument {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PostedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DocumentChannelPort for ChannelDocument {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), PortError> {
        self.tx
            .send(PostedMessage {
                target_origin: target_origin.to_owned(),
                message: message.clone(),
            })
            .map_err(|_| PortError::Detached)
    }
}
