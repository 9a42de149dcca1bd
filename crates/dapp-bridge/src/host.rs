//! Line protocol between the surrounding application and the bridge.
//!
//! Every stdin line is one JSON object tagged by `type`; every stdout line is
//! one message for the embedded document with its target origin.

use std::ops::ControlFlow;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use dapp_bridge_adapters::PostedMessage;
use dapp_bridge_core::{Account, BridgeHandle, BridgeStatus};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostInput {
    /// A `postMessage` the embedded document sent to the host window.
    Message { origin: String, data: Value },
    SelectAccount { account: Account },
    RequestAccount,
    Status,
    Shutdown,
}

pub fn parse_line(line: &str) -> Result<Option<HostInput>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Hands one input to the bridge. Breaks once the bridge is gone or asked to stop.
pub fn dispatch(handle: &BridgeHandle, input: HostInput) -> ControlFlow<()> {
    let delivered = match input {
        HostInput::Message { origin, data } => handle.post_message(origin, data),
        HostInput::SelectAccount { account } => handle.select_account(account),
        HostInput::RequestAccount => handle.request_account(),
        HostInput::Status => {
            log_status(&handle.status());
            true
        }
        HostInput::Shutdown => {
            handle.shutdown();
            return ControlFlow::Break(());
        }
    };
    if delivered {
        ControlFlow::Continue(())
    } else {
        warn!("bridge stopped; ignoring further input");
        ControlFlow::Break(())
    }
}

pub fn render_output(posted: &PostedMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(posted)
}

pub fn log_status(status: &BridgeStatus) {
    info!(
        loading = status.loading_accounts,
        accounts = status.accounts.len(),
        account = status.selected_account.as_ref().map(|a| a.id.as_str()).unwrap_or("-"),
        chain_id = status.chain.as_ref().map(|c| c.chain_id),
        connection = ?status.connection,
        persistence = ?status.persistence,
        last_error = status.last_error.as_deref().unwrap_or(""),
        "bridge status"
    );
}
