use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use dapp_bridge_core::BridgeConfig;

pub const ENV_PREFIX: &str = "DAPP_BRIDGE_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeProfile {
    /// Missing runtimes fall back to deterministic in-process adapters.
    #[default]
    Development,
    /// Missing runtimes disable the adapter instead.
    Production,
}

impl RuntimeProfile {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub runtime_profile: RuntimeProfile,
    /// JSON-RPC endpoint of the host wallet's signing gateway.
    pub gateway_url: Option<String>,
    pub http_timeout_ms: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub relay_timeout_ms: u64,
    pub storage_path: Option<PathBuf>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            gateway_url: None,
            http_timeout_ms: 15_000,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            relay_timeout_ms: 30_000,
            storage_path: None,
        }
    }
}

impl AdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `DAPP_BRIDGE_*` values; unparseable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let millis = |name: &str, default: u64| match var(name) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key = %format!("{ENV_PREFIX}{name}"), value = %raw, "ignoring invalid duration");
                default
            }),
            None => default,
        };

        let defaults = Self::default();
        let runtime_profile = match var("RUNTIME_PROFILE") {
            Some(raw) => RuntimeProfile::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown runtime profile; using development");
                RuntimeProfile::Development
            }),
            None => defaults.runtime_profile,
        };

        Self {
            runtime_profile,
            gateway_url: var("GATEWAY_URL"),
            http_timeout_ms: millis("HTTP_TIMEOUT_MS", defaults.http_timeout_ms),
            reconnect_base_delay_ms: millis(
                "RECONNECT_BASE_DELAY_MS",
                defaults.reconnect_base_delay_ms,
            ),
            reconnect_max_delay_ms: millis("RECONNECT_MAX_DELAY_MS", defaults.reconnect_max_delay_ms),
            relay_timeout_ms: millis("RELAY_TIMEOUT_MS", defaults.relay_timeout_ms),
            storage_path: var("STORAGE_PATH").map(PathBuf::from),
        }
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            relay_request_timeout_ms: self.relay_timeout_ms,
            ..BridgeConfig::default()
        }
    }
}
