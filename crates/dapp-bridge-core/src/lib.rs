pub mod bridge;
pub mod domain;
pub mod envelope;
pub mod event;
pub mod method;
pub mod ports;
pub mod resolution;
pub mod responder;
pub mod session;
pub mod state_machine;
pub mod tx;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeHandle};
pub use domain::{
    Account, AccountFilter, ChainConfig, ConnectionState, DomainError, LaunchParams, NodeScheme,
    PendingRequest, PersistenceHealth, SessionContext, SignOptions, TimestampMs, ACCOUNT_ID_KEY,
    DEFAULT_DAPP_NAME,
};
pub use envelope::{InboundCall, Outbound, RequestId, RpcError, JSONRPC_VERSION};
pub use event::{BridgeEvent, Completion, DocumentMessage, EventSender, RelayLink};
pub use method::BridgeMethod;
pub use ports::{
    ClockPort, DocumentChannelPort, PersistencePort, PortError, RelayPort, SigningGatewayPort,
};
pub use resolution::{AccountResolver, ResolutionError};
pub use responder::Responder;
pub use session::{BridgeStatus, SessionState};
pub use state_machine::{connection_transition, ConnectionAction, StateTransition, TransitionError};
pub use tx::{GatewayTransaction, TxConversionError, WireTransaction};
