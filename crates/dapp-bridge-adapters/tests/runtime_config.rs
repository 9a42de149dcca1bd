use std::collections::HashMap;
use std::path::PathBuf;

use dapp_bridge_adapters::{AdapterConfig, RuntimeProfile};

fn from_pairs(pairs: &[(&str, &str)]) -> AdapterConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    AdapterConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn empty_environment_uses_defaults() {
    assert_eq!(from_pairs(&[]), AdapterConfig::default());
    assert!(!AdapterConfig::default().strict_runtime_required());
}

#[test]
fn reads_prefixed_variables() {
    let cfg = from_pairs(&[
        ("DAPP_BRIDGE_RUNTIME_PROFILE", "production"),
        ("DAPP_BRIDGE_GATEWAY_URL", "http://127.0.0.1:7000/rpc"),
        ("DAPP_BRIDGE_HTTP_TIMEOUT_MS", "2500"),
        ("DAPP_BRIDGE_RECONNECT_BASE_DELAY_MS", "100"),
        ("DAPP_BRIDGE_RECONNECT_MAX_DELAY_MS", "1000"),
        ("DAPP_BRIDGE_RELAY_TIMEOUT_MS", "9000"),
        ("DAPP_BRIDGE_STORAGE_PATH", "/tmp/bridge.json"),
    ]);
    assert_eq!(cfg.runtime_profile, RuntimeProfile::Production);
    assert!(cfg.strict_runtime_required());
    assert_eq!(cfg.gateway_url.as_deref(), Some("http://127.0.0.1:7000/rpc"));
    assert_eq!(cfg.http_timeout_ms, 2_500);
    assert_eq!(cfg.reconnect_base_delay_ms, 100);
    assert_eq!(cfg.reconnect_max_delay_ms, 1_000);
    assert_eq!(cfg.storage_path, Some(PathBuf::from("/tmp/bridge.json")));
    assert_eq!(cfg.bridge_config().relay_request_timeout_ms, 9_000);
}

#[test]
fn invalid_values_keep_defaults() {
    let cfg = from_pairs(&[
        ("DAPP_BRIDGE_RUNTIME_PROFILE", "staging"),
        ("DAPP_BRIDGE_HTTP_TIMEOUT_MS", "soon"),
        ("DAPP_BRIDGE_GATEWAY_URL", "   "),
        ("HTTP_TIMEOUT_MS", "1"),
    ]);
    let defaults = AdapterConfig::default();
    assert_eq!(cfg.runtime_profile, RuntimeProfile::Development);
    assert_eq!(cfg.http_timeout_ms, defaults.http_timeout_ms);
    assert_eq!(cfg.gateway_url, None);
}

#[test]
fn profile_names_are_case_insensitive() {
    assert_eq!(RuntimeProfile::parse("PROD"), Some(RuntimeProfile::Production));
    assert_eq!(RuntimeProfile::parse("Development"), Some(RuntimeProfile::Development));
    assert_eq!(RuntimeProfile::parse("qa"), None);
}
