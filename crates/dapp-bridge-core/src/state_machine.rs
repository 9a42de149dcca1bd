use thiserror::Error;

use crate::domain::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    Opened,
    Dropped,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal connection transition {from:?} --{action:?}-->")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub action: ConnectionAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub reason: &'static str,
}

/// Streaming connections only. Drops never close; only teardown does.
pub fn connection_transition(
    from: ConnectionState,
    action: ConnectionAction,
) -> Result<StateTransition, TransitionError> {
    use ConnectionAction as A;
    use ConnectionState as S;

    let (to, reason) = match (from, action) {
        (S::Connecting, A::Opened) => (S::Open, "handshake complete"),
        (S::Connecting, A::Dropped) => (S::Reconnecting, "handshake failed"),
        (S::Open, A::Dropped) => (S::Reconnecting, "connection dropped"),
        (S::Reconnecting, A::Opened) => (S::Open, "reconnected"),
        (S::Reconnecting, A::Dropped) => (S::Reconnecting, "reconnect attempt failed"),
        (S::Connecting | S::Open | S::Reconnecting, A::Closed) => (S::Closed, "torn down"),
        _ => return Err(TransitionError { from, action }),
    };
    Ok(StateTransition { from, to, reason })
}

pub fn initial_connection_state() -> ConnectionState {
    ConnectionState::Connecting
}
