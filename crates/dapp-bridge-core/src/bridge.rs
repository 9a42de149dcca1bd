use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::{
    Account, AccountFilter, ConnectionState, DomainError, LaunchParams, NodeScheme,
    PersistenceHealth, SessionContext, TimestampMs, ACCOUNT_ID_KEY,
};
use crate::envelope::{InboundCall, Outbound, RequestId, RpcError};
use crate::event::{
    BridgeEvent, Completion, DocumentMessage, EventReceiver, EventSender, RelayLink,
};
use crate::method::BridgeMethod;
use crate::ports::{
    ClockPort, DocumentChannelPort, PersistencePort, PortError, RelayPort, SigningGatewayPort,
};
use crate::resolution::{AccountResolver, ResolutionError};
use crate::responder::Responder;
use crate::session::{BridgeStatus, SessionState};
use crate::state_machine::{connection_transition, initial_connection_state, ConnectionAction};
use crate::tx::{strip_hex_prefix, GatewayTransaction, WireTransaction};

const ANALYTICS_TARGET: &str = "dapp_bridge::analytics";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no networks configured")]
    NoNetworks,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Forwarded requests with no node answer after this long get an error.
    pub relay_request_timeout_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            relay_request_timeout_ms: 30_000,
            sweep_interval_ms: 1_000,
        }
    }
}

/// Host-side handle: feeds the loop and watches its status.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    events: EventSender,
    status: watch::Receiver<BridgeStatus>,
}

impl BridgeHandle {
    pub fn post_message(&self, origin: impl Into<String>, data: Value) -> bool {
        self.events
            .send(BridgeEvent::Document(DocumentMessage {
                origin: origin.into(),
                data,
            }))
            .is_ok()
    }

    pub fn select_account(&self, account: Account) -> bool {
        self.events.send(BridgeEvent::SelectAccount(account)).is_ok()
    }

    pub fn request_account(&self) -> bool {
        self.events.send(BridgeEvent::RequestAccount).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.events.send(BridgeEvent::Shutdown).is_ok()
    }

    pub fn status(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.clone()
    }
}

pub struct Bridge<G, P, D, R, C>
where
    G: SigningGatewayPort + 'static,
    P: PersistencePort,
    D: DocumentChannelPort,
    R: RelayPort,
    C: ClockPort,
{
    context: SessionContext,
    config: BridgeConfig,
    resolver: AccountResolver,
    gateway: Arc<G>,
    persistence: P,
    responder: Responder<D>,
    relay: R,
    clock: C,
    session: SessionState,
    epoch: u64,
    events_tx: EventSender,
    events_rx: EventReceiver,
    status_tx: watch::Sender<BridgeStatus>,
}

impl<G, P, D, R, C> Bridge<G, P, D, R, C>
where
    G: SigningGatewayPort + 'static,
    P: PersistencePort,
    D: DocumentChannelPort,
    R: RelayPort,
    C: ClockPort,
{
    pub fn new(
        launch: &LaunchParams,
        config: BridgeConfig,
        gateway: G,
        persistence: P,
        channel: D,
        relay: R,
        clock: C,
    ) -> Result<(Self, BridgeHandle), BridgeError> {
        if launch.networks.is_empty() {
            return Err(BridgeError::NoNetworks);
        }
        for chain in &launch.networks {
            chain.node_scheme()?;
        }
        let context = SessionContext::from_launch(launch)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = SessionState::new();
        let (status_tx, status_rx) = watch::channel(session.snapshot());

        let handle = BridgeHandle {
            events: events_tx.clone(),
            status: status_rx,
        };
        let bridge = Self {
            responder: Responder::new(channel, context.dapp_origin.clone()),
            context,
            config,
            resolver: AccountResolver::new(
                launch.networks.clone(),
                launch.initial_account_id.clone(),
            ),
            gateway: Arc::new(gateway),
            persistence,
            relay,
            clock,
            session,
            epoch: 0,
            events_tx,
            events_rx,
            status_tx,
        };
        Ok((bridge, handle))
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn responder(&self) -> &Responder<D> {
        &self.responder
    }

    pub fn status(&self) -> BridgeStatus {
        self.session.snapshot()
    }

    /// Loads accounts and resolves the initial selection.
    pub async fn start(&mut self) {
        let listed = self.gateway.list_accounts().await;
        self.adopt_accounts(listed);
        self.publish_status();
    }

    pub async fn run(mut self) {
        self.start().await;
        let mut sweep =
            tokio::time::interval(Duration::from_millis(self.config.sweep_interval_ms.max(1)));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                event = self.events_rx.recv() => event.unwrap_or(BridgeEvent::Shutdown),
                _ = sweep.tick() => BridgeEvent::Tick,
            };
            if self.handle_event(event).is_break() {
                break;
            }
        }
        info!(dapp = %self.context.dapp_name, "bridge stopped");
    }

    /// Waits for the next queued event and handles it. False once the bridge stopped.
    pub async fn pump(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => self.handle_event(event).is_continue(),
            None => false,
        }
    }

    /// Handles whatever is already queued without waiting.
    pub fn pump_ready(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            if self.handle_event(event).is_break() {
                break;
            }
        }
        handled
    }

    pub fn handle_event(&mut self, event: BridgeEvent) -> ControlFlow<()> {
        match event {
            BridgeEvent::Document(message) => self.on_document_message(message),
            BridgeEvent::Node(message) => self.on_node_message(message),
            BridgeEvent::Connection { epoch, action } => self.on_connection(epoch, action),
            BridgeEvent::Completed(completion) => self.on_completion(completion),
            BridgeEvent::SelectAccount(account) => {
                let _ = self.select_explicit(account);
            }
            BridgeEvent::RequestAccount => self.spawn_request_account(),
            BridgeEvent::Tick => self.sweep_pending(),
            BridgeEvent::Shutdown => {
                self.teardown();
                self.publish_status();
                return ControlFlow::Break(());
            }
        }
        self.publish_status();
        ControlFlow::Continue(())
    }

    fn on_document_message(&mut self, message: DocumentMessage) {
        if message.origin != self.context.dapp_origin {
            debug!(origin = %message.origin, "dropping message from foreign origin");
            return;
        }
        let Some(call) = InboundCall::parse(&message.data) else {
            debug!("dropping message without a jsonrpc 2.0 method");
            return;
        };
        debug!(method = %call.method, id = ?call.id, "message from dapp");

        match BridgeMethod::classify(&call.method) {
            BridgeMethod::ChainId => self.reply_chain_id(&call),
            BridgeMethod::Accounts => self.reply_accounts(&call),
            BridgeMethod::SwitchChain => self.switch_chain(&call),
            BridgeMethod::SendTransaction => self.send_transaction(&call),
            BridgeMethod::PersonalSign => self.personal_sign(&call),
            BridgeMethod::SignTypedData => self.sign_typed_data(&call),
            BridgeMethod::Relay => self.relay_call(&call, message.data),
        }
    }

    fn reply_chain_id(&self, call: &InboundCall) {
        let outbound = match &self.session.chain {
            Some(chain) => Outbound::result(call.id.clone(), chain.hex_chain_id()),
            None => Outbound::error(call.id.clone(), RpcError::disconnected()),
        };
        self.responder.send(&outbound);
    }

    fn reply_accounts(&self, call: &InboundCall) {
        let accounts: Vec<Value> = self
            .session
            .selected_address()
            .map(|address| Value::String(address.to_owned()))
            .into_iter()
            .collect();
        self.responder
            .send(&Outbound::result(call.id.clone(), Value::Array(accounts)));
    }

    fn switch_chain(&mut self, call: &InboundCall) {
        let raw = call
            .param(0)
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str);
        let Some((raw, chain_id)) = raw.and_then(|r| parse_hex_chain_id(r).map(|id| (r, id)))
        else {
            self.reply_rejected(call, "Invalid chainId");
            return;
        };
        let Some(chain) = self.resolver.chain_by_id(chain_id) else {
            self.reply_rejected(call, &format!("Chain ID {raw} is not supported"));
            return;
        };

        let filter = AccountFilter {
            currency_ids: vec![chain.currency_id.clone()],
        };
        let gateway = Arc::clone(&self.gateway);
        let id = call.id.clone();
        self.spawn_completion(async move {
            let outcome = gateway.request_account(&filter).await;
            Completion::ChainSwitched { id, outcome }
        });
    }

    fn send_transaction(&mut self, call: &InboundCall) {
        let Some(account) = self.session.selected.clone() else {
            self.reply_rejected(call, "Transaction declined");
            return;
        };
        let wire = match WireTransaction::from_param(call.param(0)) {
            Ok(wire) => wire,
            Err(e) => {
                self.reply_rejected(call, &format!("Invalid transaction: {e}"));
                return;
            }
        };
        if !wire.from.as_deref().is_some_and(|from| account.has_address(from)) {
            warn!(from = ?wire.from, "transaction sender does not match the selected account");
            self.reply_rejected(call, "Transaction sender does not match the selected account");
            return;
        }
        let tx = match GatewayTransaction::try_from(&wire) {
            Ok(tx) => tx,
            Err(e) => {
                self.reply_rejected(call, &format!("Invalid transaction: {e}"));
                return;
            }
        };

        let gateway = Arc::clone(&self.gateway);
        let options = self.context.sign_options.clone();
        let dapp = self.context.dapp_name.clone();
        let id = call.id.clone();
        track(&dapp, "SendTransaction Init");
        self.spawn_completion(async move {
            let outbound = match gateway
                .sign_and_broadcast_transaction(&account.id, &tx, options.as_ref())
                .await
            {
                Ok(hash) => {
                    track(&dapp, "SendTransaction Success");
                    Outbound::result(id, hash)
                }
                Err(e) => {
                    debug!(error = %e, "transaction signing failed");
                    track(&dapp, "SendTransaction Fail");
                    Outbound::error(id, RpcError::rejected("Transaction declined"))
                }
            };
            Completion::Reply(outbound)
        });
    }

    fn personal_sign(&mut self, call: &InboundCall) {
        const DECLINED: &str = "Personal message signed declined";
        let message = call.param(0).and_then(Value::as_str).map(|raw| {
            let stripped = strip_hex_prefix(raw);
            alloy::hex::decode(stripped).unwrap_or_else(|_| raw.as_bytes().to_vec())
        });
        let (Some(account), Some(message)) = (self.session.selected.clone(), message) else {
            self.reply_rejected(call, DECLINED);
            return;
        };
        self.spawn_message_signing(call.id.clone(), account, message, "PersonalSign", DECLINED);
    }

    fn sign_typed_data(&mut self, call: &InboundCall) {
        const DECLINED: &str = "Typed Data message signed declined";
        let message = match call.param(1) {
            Some(Value::String(text)) => Some(text.as_bytes().to_vec()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string().into_bytes()),
        };
        let (Some(account), Some(message)) = (self.session.selected.clone(), message) else {
            self.reply_rejected(call, DECLINED);
            return;
        };
        self.spawn_message_signing(call.id.clone(), account, message, "SignTypedData", DECLINED);
    }

    fn spawn_message_signing(
        &self,
        id: Option<RequestId>,
        account: Account,
        message: Vec<u8>,
        kind: &'static str,
        declined: &'static str,
    ) {
        let gateway = Arc::clone(&self.gateway);
        let dapp = self.context.dapp_name.clone();
        track(&dapp, &format!("{kind} Init"));
        self.spawn_completion(async move {
            let outbound = match gateway.sign_message(&account.id, &message).await {
                Ok(signature) => {
                    track(&dapp, &format!("{kind} Success"));
                    Outbound::result(id, format!("0x{}", alloy::hex::encode(signature)))
                }
                Err(e) => {
                    debug!(error = %e, kind, "message signing failed");
                    track(&dapp, &format!("{kind} Fail"));
                    Outbound::error(id, RpcError::rejected(declined))
                }
            };
            Completion::Reply(outbound)
        });
    }

    fn relay_call(&mut self, call: &InboundCall, raw: Value) {
        if self.session.chain.is_none() {
            self.responder
                .send(&Outbound::error(call.id.clone(), RpcError::disconnected()));
            return;
        }
        if let Some(id) = &call.id {
            let now = self.now();
            if !self.session.track_pending(id.clone(), now) {
                warn!(%id, "request id already pending; forwarding without a new entry");
            }
        }
        if let Err(e) = self.relay.forward(raw) {
            warn!(error = %e, method = %call.method, "failed to forward call to node");
            if let Some(id) = &call.id {
                self.session.settle_pending(id);
            }
            self.responder.send(&Outbound::error(
                call.id.clone(),
                RpcError::internal(format!("Node relay unavailable: {e}")),
            ));
        }
    }

    fn on_node_message(&mut self, message: Value) {
        if let Some(id) = RequestId::from_message(&message) {
            if self.session.settle_pending(&id).is_none() && self.session.take_expired_answer(&id)
            {
                debug!(%id, "discarding late node answer for timed-out request");
                return;
            }
        }
        self.responder.send(&Outbound::Relayed(message));
    }

    fn on_connection(&mut self, epoch: u64, action: ConnectionAction) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, ?action, "ignoring event from replaced connection");
            return;
        }
        let Some(current) = self.session.connection else {
            return;
        };
        match connection_transition(current, action) {
            Ok(transition) => {
                info!(
                    from = ?transition.from,
                    to = ?transition.to,
                    reason = transition.reason,
                    "node connection transition"
                );
                if transition.to == ConnectionState::Reconnecting
                    && transition.from == ConnectionState::Open
                    && self.session.pending_count() > 0
                {
                    warn!(
                        pending = self.session.pending_count(),
                        "node connection dropped with requests in flight"
                    );
                }
                self.session.connection = Some(transition.to);
            }
            Err(e) => warn!(error = %e, "ignoring connection event"),
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Reply(outbound) => {
                self.responder.send(&outbound);
            }
            Completion::ChainSwitched { id, outcome } => {
                let outbound = match outcome
                    .map_err(|e| e.to_string())
                    .and_then(|account| self.select_explicit(account).map_err(|e| e.to_string()))
                {
                    Ok(_) => Outbound::result(id, Value::Null),
                    Err(e) => Outbound::error(
                        id,
                        RpcError::rejected(format!("error switching chain: {e}")),
                    ),
                };
                self.responder.send(&outbound);
            }
            Completion::AccountRequested(Ok(account)) => {
                let had_accounts = !self.session.accounts.is_empty();
                if self.select_explicit(account).is_ok() && !had_accounts {
                    self.spawn_refresh_accounts();
                }
            }
            Completion::AccountRequested(Err(e)) => {
                debug!(error = %e, "account request did not complete");
            }
            Completion::AccountsRefreshed(listed) => self.adopt_accounts(listed),
        }
    }

    fn adopt_accounts(&mut self, listed: Result<Vec<Account>, PortError>) {
        self.session.loading_accounts = false;
        let accounts = match listed {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "failed to list accounts");
                self.session.last_error = Some(e.to_string());
                self.session.resolved = true;
                return;
            }
        };
        self.session.accounts = self.resolver.eligible(accounts);
        let persisted = self.read_persisted_account();
        let candidate = self.resolver.resolve(
            &self.session.accounts,
            self.session.user_selected.as_ref(),
            persisted.as_deref(),
        );
        if let Err(e) = self.apply_selection(candidate) {
            warn!(error = %e, "account resolution failed");
            self.session.last_error = Some(e.to_string());
        }
        self.session.resolved = true;
    }

    fn select_explicit(&mut self, account: Account) -> Result<(), ResolutionError> {
        match self.apply_selection(Some(account.clone())) {
            Ok(()) => {
                if !self.session.accounts.iter().any(|a| a.id == account.id) {
                    self.session.accounts.push(account.clone());
                }
                self.session.user_selected = Some(account);
                self.session.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refusing account selection");
                self.session.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// All-or-nothing: on error the previous account and chain stay active.
    fn apply_selection(
        &mut self,
        next: Option<Account>,
    ) -> Result<(), ResolutionError> {
        let next_chain = match &next {
            Some(account) => Some(self.resolver.chain_for(account)?.clone()),
            None => None,
        };

        // Once the initial resolution is done, gaining an account counts as a change.
        let resolved = self.session.resolved;
        let account_changed = match (&self.session.selected, &next) {
            (Some(prev), Some(next)) => !next.has_address(&prev.address),
            (None, Some(_)) => resolved,
            _ => false,
        };
        let chain_changed = match (&self.session.chain, &next_chain) {
            (Some(prev), Some(next)) => prev.chain_id != next.chain_id,
            (None, Some(_)) => resolved,
            _ => false,
        };
        let relay_rebuilt = self.session.chain != next_chain;

        self.session.selected = next;
        self.session.chain = next_chain;
        if let Some(account) = &self.session.selected {
            info!(
                account = %account.id,
                currency = %account.currency_id,
                "active account resolved"
            );
            let id = account.id.clone();
            self.persist_selection(&id);
        }
        if relay_rebuilt {
            self.rebuild_relay();
        }

        if account_changed {
            if let Some(address) = self.session.selected_address() {
                self.responder.send(&Outbound::accounts_changed(address));
            }
        }
        if chain_changed {
            if let Some(chain) = &self.session.chain {
                self.responder
                    .send(&Outbound::chain_changed(&chain.hex_chain_id()));
            }
        }

        Ok(())
    }

    fn rebuild_relay(&mut self) {
        self.teardown_relay();
        let Some(chain) = self.session.chain.clone() else {
            self.session.connection = None;
            return;
        };
        let link = RelayLink::new(self.epoch, self.events_tx.clone());
        match self.relay.open(&chain, link) {
            Ok(()) => {
                info!(chain_id = chain.chain_id, node = %chain.node_url, "node relay opened");
                self.session.connection = match chain.node_scheme() {
                    Ok(NodeScheme::Stream) => Some(initial_connection_state()),
                    _ => None,
                };
            }
            Err(e) => {
                warn!(error = %e, node = %chain.node_url, "failed to open node relay");
                self.session.connection = None;
                self.session.last_error = Some(e.to_string());
            }
        }
    }

    fn teardown_relay(&mut self) {
        self.relay.close();
        self.epoch = self.epoch.wrapping_add(1);
        let dropped = self.session.drop_pending();
        if dropped > 0 {
            debug!(dropped, "pending node requests dropped with their connection");
        }
        if self.session.connection.is_some() {
            self.session.connection = Some(ConnectionState::Closed);
        }
    }

    fn teardown(&mut self) {
        self.teardown_relay();
        self.events_rx.close();
        info!(dapp = %self.context.dapp_name, "bridge torn down");
    }

    fn sweep_pending(&mut self) {
        let now = match self.clock.now_ms() {
            Ok(now) => TimestampMs(now),
            Err(e) => {
                warn!(error = %e, "clock unavailable; skipping pending sweep");
                return;
            }
        };
        for id in self
            .session
            .expire_pending(now, self.config.relay_request_timeout_ms)
        {
            warn!(%id, "node request timed out");
            self.responder.send(&Outbound::error(
                Some(id),
                RpcError::internal("Node request timed out"),
            ));
        }
    }

    fn spawn_request_account(&self) {
        let gateway = Arc::clone(&self.gateway);
        let filter = self.resolver.filter_all();
        self.spawn_completion(async move {
            Completion::AccountRequested(gateway.request_account(&filter).await)
        });
    }

    fn spawn_refresh_accounts(&self) {
        let gateway = Arc::clone(&self.gateway);
        self.spawn_completion(async move {
            Completion::AccountsRefreshed(gateway.list_accounts().await)
        });
    }

    /// Late completions are dropped once the loop is gone.
    fn spawn_completion<F>(&self, work: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let completion = work.await;
            let _ = events.send(BridgeEvent::Completed(completion));
        });
    }

    fn reply_rejected(&self, call: &InboundCall, message: &str) {
        self.responder
            .send(&Outbound::error(call.id.clone(), RpcError::rejected(message)));
    }

    fn read_persisted_account(&mut self) -> Option<String> {
        match self.persistence.read(ACCOUNT_ID_KEY) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "persisted account unavailable");
                self.session.persistence = Some(PersistenceHealth::Blocked(e.to_string()));
                None
            }
        }
    }

    fn persist_selection(&mut self, account_id: &str) {
        if let Err(e) = self.persistence.write(ACCOUNT_ID_KEY, account_id) {
            warn!(error = %e, "failed to persist selected account");
            self.session.persistence = Some(PersistenceHealth::Blocked(e.to_string()));
        }
    }

    fn now(&self) -> TimestampMs {
        match self.clock.now_ms() {
            Ok(now) => TimestampMs(now),
            Err(e) => {
                // Never expires; the request just waits for its answer.
                warn!(error = %e, "clock unavailable");
                TimestampMs(u64::MAX)
            }
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.session.snapshot());
    }
}

fn parse_hex_chain_id(raw: &str) -> Option<u64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn track(dapp: &str, event: &str) {
    info!(target: ANALYTICS_TARGET, dapp, event = %format!("EVMDAppBrowser {event}"), "track");
}
