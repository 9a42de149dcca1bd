use thiserror::Error;

use crate::domain::{Account, AccountFilter, ChainConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no configured chain for currency {currency_id} of account {account_id}")]
    NoResolvableChain {
        account_id: String,
        currency_id: String,
    },
}

/// Picks the active account and the chain that goes with it.
#[derive(Debug, Clone)]
pub struct AccountResolver {
    chains: Vec<ChainConfig>,
    initial_account_id: Option<String>,
}

impl AccountResolver {
    pub fn new(chains: Vec<ChainConfig>, initial_account_id: Option<String>) -> Self {
        Self {
            chains,
            initial_account_id,
        }
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    /// Accounts whose currency one of the configured chains serves.
    pub fn eligible(&self, accounts: Vec<Account>) -> Vec<Account> {
        accounts
            .into_iter()
            .filter(|account| self.serves(&account.currency_id))
            .collect()
    }

    /// Selection order: explicit user choice, launch account, persisted account, first eligible.
    pub fn resolve(
        &self,
        eligible: &[Account],
        user_choice: Option<&Account>,
        persisted_id: Option<&str>,
    ) -> Option<Account> {
        if let Some(account) = user_choice {
            return Some(account.clone());
        }
        let by_id = |id: &str| eligible.iter().find(|account| account.id == id);

        self.initial_account_id
            .as_deref()
            .and_then(by_id)
            .or_else(|| persisted_id.and_then(by_id))
            .or_else(|| eligible.first())
            .cloned()
    }

    pub fn chain_for(&self, account: &Account) -> Result<&ChainConfig, ResolutionError> {
        self.chains
            .iter()
            .find(|chain| chain.currency_id == account.currency_id)
            .ok_or_else(|| ResolutionError::NoResolvableChain {
                account_id: account.id.clone(),
                currency_id: account.currency_id.clone(),
            })
    }

    pub fn chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|chain| chain.chain_id == chain_id)
    }

    pub fn filter_all(&self) -> AccountFilter {
        AccountFilter {
            currency_ids: self.chains.iter().map(|c| c.currency_id.clone()).collect(),
        }
    }

    fn serves(&self, currency_id: &str) -> bool {
        self.chains.iter().any(|chain| chain.currency_id == currency_id)
    }
}
