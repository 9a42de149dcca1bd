#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::Bytes;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use dapp_bridge_core::{
    Account, AccountFilter, Bridge, BridgeConfig, BridgeHandle, ChainConfig, ClockPort,
    ConnectionAction, DocumentChannelPort, GatewayTransaction, LaunchParams, PersistencePort,
    PortError, RelayLink, RelayPort, SignOptions, SigningGatewayPort,
};

pub const DAPP_ORIGIN: &str = "https://dapp.example";
pub const SLOW_MESSAGE: &[u8] = b"slow";

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ListAccounts,
    RequestAccount(Vec<String>),
    SignAndBroadcast {
        account_id: String,
        tx: GatewayTransaction,
        options: Option<SignOptions>,
    },
    SignMessage {
        account_id: String,
        message: Vec<u8>,
    },
}

#[derive(Debug, Default)]
struct GatewayState {
    accounts: Vec<Account>,
    requested: Option<Account>,
    reject_signing: bool,
    calls: Vec<GatewayCall>,
}

#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<GatewayState>>,
    release: Arc<Notify>,
}

impl MockGateway {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let gateway = Self::default();
        gateway.state.lock().expect("gateway lock").accounts = accounts;
        gateway
    }

    /// Account the picker hands back on the next `request_account`; `None` means the user cancels.
    pub fn set_requested(&self, account: Option<Account>) {
        self.state.lock().expect("gateway lock").requested = account;
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) {
        self.state.lock().expect("gateway lock").accounts = accounts;
    }

    pub fn reject_signing(&self) {
        self.state.lock().expect("gateway lock").reject_signing = true;
    }

    /// Lets one pending slow signature through.
    pub fn release_slow(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().expect("gateway lock").calls.clone()
    }

    pub fn signing_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    GatewayCall::SignAndBroadcast { .. } | GatewayCall::SignMessage { .. }
                )
            })
            .count()
    }

    fn record(&self, call: GatewayCall) {
        self.state.lock().expect("gateway lock").calls.push(call);
    }

    fn rejects(&self) -> bool {
        self.state.lock().expect("gateway lock").reject_signing
    }
}

#[async_trait]
impl SigningGatewayPort for MockGateway {
    async fn list_accounts(&self) -> Result<Vec<Account>, PortError> {
        self.record(GatewayCall::ListAccounts);
        Ok(self.state.lock().expect("gateway lock").accounts.clone())
    }

    async fn request_account(&self, filter: &AccountFilter) -> Result<Account, PortError> {
        self.record(GatewayCall::RequestAccount(filter.currency_ids.clone()));
        self.state
            .lock()
            .expect("gateway lock")
            .requested
            .clone()
            .ok_or_else(|| PortError::Rejected("user canceled".to_owned()))
    }

    async fn sign_and_broadcast_transaction(
        &self,
        account_id: &str,
        tx: &GatewayTransaction,
        options: Option<&SignOptions>,
    ) -> Result<String, PortError> {
        self.record(GatewayCall::SignAndBroadcast {
            account_id: account_id.to_owned(),
            tx: tx.clone(),
            options: options.cloned(),
        });
        if self.rejects() {
            return Err(PortError::Rejected("user declined".to_owned()));
        }
        Ok(format!("0x{}", "ab".repeat(32)))
    }

    async fn sign_message(&self, account_id: &str, message: &[u8]) -> Result<Bytes, PortError> {
        self.record(GatewayCall::SignMessage {
            account_id: account_id.to_owned(),
            message: message.to_vec(),
        });
        if message == SLOW_MESSAGE {
            self.release.notified().await;
        }
        if self.rejects() {
            return Err(PortError::Rejected("user declined".to_owned()));
        }
        let mut signature = vec![0x11; 64];
        signature.push(27);
        Ok(Bytes::from(signature))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    blocked: bool,
}

impl MemoryStore {
    pub fn with_account_id(id: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .expect("store lock")
            .insert("accountId".to_owned(), id.to_owned());
        store
    }

    pub fn blocked() -> Self {
        Self {
            blocked: true,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().expect("store lock").get(key).cloned()
    }
}

impl PersistencePort for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        if self.blocked {
            return Err(PortError::StorageUnavailable("access denied".to_owned()));
        }
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        if self.blocked {
            return Err(PortError::StorageUnavailable("access denied".to_owned()));
        }
        self.values
            .lock()
            .expect("store lock")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDocument {
    posted: Arc<Mutex<Vec<(Value, String)>>>,
    detached: Arc<Mutex<bool>>,
}

impl RecordingDocument {
    pub fn take(&self) -> Vec<Value> {
        let mut g = self.posted.lock().expect("document lock");
        g.drain(..).map(|(message, _)| message).collect()
    }

    pub fn origins(&self) -> Vec<String> {
        self.posted
            .lock()
            .expect("document lock")
            .iter()
            .map(|(_, origin)| origin.clone())
            .collect()
    }

    pub fn detach(&self) {
        *self.detached.lock().expect("document lock") = true;
    }
}

impl DocumentChannelPort for RecordingDocument {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), PortError> {
        if *self.detached.lock().expect("document lock") {
            return Err(PortError::Detached);
        }
        self.posted
            .lock()
            .expect("document lock")
            .push((message.clone(), target_origin.to_owned()));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RelayLog {
    opened: Vec<ChainConfig>,
    closed: usize,
    forwarded: Vec<Value>,
    link: Option<RelayLink>,
    fail_forward: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingRelay {
    log: Arc<Mutex<RelayLog>>,
}

impl RecordingRelay {
    pub fn opened(&self) -> Vec<ChainConfig> {
        self.log.lock().expect("relay lock").opened.clone()
    }

    pub fn closed(&self) -> usize {
        self.log.lock().expect("relay lock").closed
    }

    pub fn forwarded(&self) -> Vec<Value> {
        self.log.lock().expect("relay lock").forwarded.clone()
    }

    pub fn fail_forward(&self) {
        self.log.lock().expect("relay lock").fail_forward = true;
    }

    pub fn link(&self) -> RelayLink {
        self.log
            .lock()
            .expect("relay lock")
            .link
            .clone()
            .expect("relay opened")
    }

    /// Simulates the node answering over the current connection.
    pub fn node_says(&self, message: Value) {
        assert!(self.link().message(message), "bridge still listening");
    }

    pub fn connection(&self, action: ConnectionAction) {
        assert!(self.link().connection(action), "bridge still listening");
    }
}

impl RelayPort for RecordingRelay {
    fn open(&mut self, chain: &ChainConfig, link: RelayLink) -> Result<(), PortError> {
        let mut g = self.log.lock().expect("relay lock");
        g.opened.push(chain.clone());
        g.link = Some(link);
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().expect("relay lock").closed += 1;
    }

    fn forward(&self, message: Value) -> Result<(), PortError> {
        let mut g = self.log.lock().expect("relay lock");
        if g.fail_forward {
            return Err(PortError::Transport("socket gone".to_owned()));
        }
        g.forwarded.push(message);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.load(Ordering::SeqCst) + 1_739_750_400_000)
    }
}

pub type TestBridge = Bridge<MockGateway, MemoryStore, RecordingDocument, RecordingRelay, ManualClock>;

pub struct Harness {
    pub bridge: TestBridge,
    pub handle: BridgeHandle,
    pub gateway: MockGateway,
    pub store: MemoryStore,
    pub document: RecordingDocument,
    pub relay: RecordingRelay,
    pub clock: ManualClock,
}

impl Harness {
    pub fn post(&self, data: Value) {
        assert!(self.handle.post_message(DAPP_ORIGIN, data));
    }

    /// Posts a call and handles everything until the bridge goes idle.
    pub async fn call(&mut self, data: Value) -> Vec<Value> {
        self.post(data);
        self.settle().await;
        self.document.take()
    }

    /// Drains queued events, giving spawned gateway calls a chance to finish.
    pub async fn settle(&mut self) {
        for _ in 0..8 {
            self.bridge.pump_ready();
            tokio::task::yield_now().await;
        }
        self.bridge.pump_ready();
    }
}

pub fn ethereum() -> ChainConfig {
    ChainConfig::new("ethereum", "wss://eth.node.example/ws", 1)
}

pub fn optimism() -> ChainConfig {
    ChainConfig::new("optimism", "https://optimism.node.example", 10)
}

pub fn chains() -> Vec<ChainConfig> {
    vec![ethereum(), optimism()]
}

pub fn account(id: &str, currency: &str, address: &str) -> Account {
    Account {
        id: id.to_owned(),
        address: address.to_owned(),
        currency_id: currency.to_owned(),
        name: format!("Account {id}"),
    }
}

pub fn account_a() -> Account {
    account("1", "ethereum", "0xAbC0000000000000000000000000000000000001")
}

pub fn account_b() -> Account {
    account("2", "ethereum", "0xAbC0000000000000000000000000000000000002")
}

pub fn account_c() -> Account {
    account("3", "optimism", "0xAbC0000000000000000000000000000000000003")
}

pub fn bitcoin_account() -> Account {
    account("btc", "bitcoin", "bc1qexample")
}

pub fn launch() -> LaunchParams {
    LaunchParams::new(format!("{DAPP_ORIGIN}/swap"), chains())
}

pub fn rpc(id: &str, method: &str, params: Value) -> Value {
    json!({ "id": id, "jsonrpc": "2.0", "method": method, "params": params })
}

pub fn harness_with(launch: LaunchParams, gateway: MockGateway, store: MemoryStore) -> Harness {
    let document = RecordingDocument::default();
    let relay = RecordingRelay::default();
    let clock = ManualClock::default();
    let (bridge, handle) = Bridge::new(
        &launch,
        BridgeConfig {
            relay_request_timeout_ms: 5_000,
            sweep_interval_ms: 100,
        },
        gateway.clone(),
        store.clone(),
        document.clone(),
        relay.clone(),
        clock.clone(),
    )
    .expect("bridge construction");
    Harness {
        bridge,
        handle,
        gateway,
        store,
        document,
        relay,
        clock,
    }
}

/// Started bridge with accounts A, B, C and A selected.
pub async fn started() -> Harness {
    let mut h = harness_with(
        launch(),
        MockGateway::with_accounts(vec![account_a(), account_b(), account_c()]),
        MemoryStore::default(),
    );
    h.bridge.start().await;
    h.document.take();
    h
}
