use std::collections::HashMap;

use crate::domain::{
    Account, ChainConfig, ConnectionState, PendingRequest, PersistenceHealth, TimestampMs,
};
use crate::envelope::RequestId;

/// Settled view of the session published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub loading_accounts: bool,
    pub accounts: Vec<Account>,
    pub selected_account: Option<Account>,
    pub chain: Option<ChainConfig>,
    /// `None` for one-shot endpoints and while no chain is active.
    pub connection: Option<ConnectionState>,
    pub persistence: PersistenceHealth,
    pub last_error: Option<String>,
}

impl Default for BridgeStatus {
    fn default() -> Self {
        Self {
            loading_accounts: true,
            accounts: Vec::new(),
            selected_account: None,
            chain: None,
            connection: None,
            persistence: PersistenceHealth::Available,
            last_error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub loading_accounts: bool,
    pub accounts: Vec<Account>,
    pub user_selected: Option<Account>,
    pub selected: Option<Account>,
    pub chain: Option<ChainConfig>,
    pub connection: Option<ConnectionState>,
    pub persistence: Option<PersistenceHealth>,
    pub last_error: Option<String>,
    /// Set once the first account listing has been resolved.
    pub resolved: bool,
    pending: HashMap<RequestId, PendingRequest>,
    expired: HashMap<RequestId, TimestampMs>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            loading_accounts: true,
            ..Self::default()
        }
    }

    pub fn selected_address(&self) -> Option<&str> {
        self.selected.as_ref().map(|a| a.address.as_str())
    }

    /// Returns false when a request with this id is already in flight.
    pub fn track_pending(&mut self, request_id: RequestId, issued_at: TimestampMs) -> bool {
        self.expired.remove(&request_id);
        if self.pending.contains_key(&request_id) {
            return false;
        }
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                request_id,
                issued_at,
            },
        );
        true
    }

    pub fn settle_pending(&mut self, request_id: &RequestId) -> Option<PendingRequest> {
        self.pending.remove(request_id)
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Late answers for these ids must be discarded.
    pub fn take_expired_answer(&mut self, request_id: &RequestId) -> bool {
        self.expired.remove(request_id).is_some()
    }

    /// Moves every request older than `timeout_ms` to the expired set.
    pub fn expire_pending(&mut self, now: TimestampMs, timeout_ms: u64) -> Vec<RequestId> {
        let deadline = now.0.saturating_sub(timeout_ms);
        let mut timed_out: Vec<RequestId> = self
            .pending
            .values()
            .filter(|p| p.issued_at.0 <= deadline)
            .map(|p| p.request_id.clone())
            .collect();
        timed_out.sort_by_key(|id| id.to_string());
        for id in &timed_out {
            self.pending.remove(id);
            self.expired.insert(id.clone(), now);
        }
        // Expired markers only need to outlive one more timeout window.
        let horizon = now.0.saturating_sub(timeout_ms.saturating_mul(2));
        self.expired.retain(|_, at| at.0 > horizon);
        timed_out
    }

    /// Pending requests die with the connection they were sent on.
    /// Expired markers stay: a late answer may still arrive from the old connection.
    pub fn drop_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn snapshot(&self) -> BridgeStatus {
        BridgeStatus {
            loading_accounts: self.loading_accounts,
            accounts: self.accounts.clone(),
            selected_account: self.selected.clone(),
            chain: self.chain.clone(),
            connection: self.connection,
            persistence: self
                .persistence
                .clone()
                .unwrap_or(PersistenceHealth::Available),
            last_error: self.last_error.clone(),
        }
    }
}
