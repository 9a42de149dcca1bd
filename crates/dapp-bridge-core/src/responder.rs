use tracing::{debug, warn};

use crate::envelope::Outbound;
use crate::ports::{DocumentChannelPort, PortError};

/// Delivers envelopes to the embedded document, and only to its origin.
#[derive(Debug)]
pub struct Responder<D> {
    channel: D,
    target_origin: String,
}

impl<D: DocumentChannelPort> Responder<D> {
    pub fn new(channel: D, target_origin: impl Into<String>) -> Self {
        Self {
            channel,
            target_origin: target_origin.into(),
        }
    }

    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }

    /// Returns true when the document accepted the message.
    pub fn send(&self, outbound: &Outbound) -> bool {
        let message = outbound.to_message();
        match self.channel.post_message(&message, &self.target_origin) {
            Ok(()) => {
                debug!(target_origin = %self.target_origin, %message, "sent message to dapp");
                true
            }
            Err(PortError::Detached) => {
                debug!(%message, "dapp document detached; message dropped");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to post message to dapp");
                false
            }
        }
    }
}
