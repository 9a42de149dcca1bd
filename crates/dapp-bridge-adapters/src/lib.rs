pub mod channel;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod launch;
pub mod persistence;
pub mod relay;

pub use channel::{ChannelDocument, PostedMessage};
pub use clock::SystemClock;
pub use config::{AdapterConfig, RuntimeProfile, ENV_PREFIX};
pub use gateway::{transaction_payload, SigningGatewayAdapter};
pub use launch::{parse_launch_query, LaunchError};
pub use persistence::{FileStore, MemoryStore};
pub use relay::{NodeRelay, OneShotRelay, ReconnectPolicy, SocketRelay};
