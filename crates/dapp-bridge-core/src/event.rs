use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::Account;
use crate::envelope::{Outbound, RequestId};
use crate::ports::PortError;
use crate::state_machine::ConnectionAction;

pub type EventSender = mpsc::UnboundedSender<BridgeEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<BridgeEvent>;

/// A message posted by some document to the bridge's window.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMessage {
    pub origin: String,
    pub data: Value,
}

/// Everything the bridge loop reacts to.
#[derive(Debug)]
pub enum BridgeEvent {
    Document(DocumentMessage),
    /// Message from the node, or a one-shot answer delivered the same way.
    Node(Value),
    Connection {
        epoch: u64,
        action: ConnectionAction,
    },
    Completed(Completion),
    /// Explicit choice from the host's account picker.
    SelectAccount(Account),
    /// Ask the gateway to let the user pick or add an account.
    RequestAccount,
    Tick,
    Shutdown,
}

/// Outcome of a suspended handler.
#[derive(Debug)]
pub enum Completion {
    Reply(Outbound),
    ChainSwitched {
        id: Option<RequestId>,
        outcome: Result<Account, PortError>,
    },
    AccountRequested(Result<Account, PortError>),
    AccountsRefreshed(Result<Vec<Account>, PortError>),
}

/// Handle a relay uses to report back to the loop that opened it.
#[derive(Debug, Clone)]
pub struct RelayLink {
    epoch: u64,
    events: EventSender,
}

impl RelayLink {
    pub fn new(epoch: u64, events: EventSender) -> Self {
        Self { epoch, events }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns false once the bridge is gone.
    pub fn message(&self, message: Value) -> bool {
        self.events.send(BridgeEvent::Node(message)).is_ok()
    }

    pub fn connection(&self, action: ConnectionAction) -> bool {
        self.events
            .send(BridgeEvent::Connection {
                epoch: self.epoch,
                action,
            })
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
