//! Account → owning-agent routing map.
//!
//! Populated on every successful full aggregation and deliberately *not*
//! TTL-bound or cleared on refresh: ownership is stable, and a warm map is
//! what lets single-account reads and trade proxies skip the fleet fan-out.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use hedgelink_core::{AccountId, AccountSnapshot};

pub struct AccountAgentMap {
    map: Mutex<HashMap<AccountId, String>>,
}

impl AccountAgentMap {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, String>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record (or overwrite — last writer wins) one account's owner.
    pub fn update(&self, id: AccountId, agent: &str) {
        self.lock().insert(id, agent.to_string());
    }

    /// Record owners for a full aggregation's worth of snapshots.
    pub fn update_bulk(&self, snapshots: &[AccountSnapshot]) {
        let mut map = self.lock();
        for snap in snapshots {
            map.insert(snap.account_id, snap.owner_agent.clone());
        }
        debug!(entries = map.len(), "account-agent map updated");
    }

    pub fn get(&self, id: AccountId) -> Option<String> {
        self.lock().get(&id).cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for AccountAgentMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins() {
        let map = AccountAgentMap::new();
        map.update(100, "vps1");
        map.update(100, "vps2");
        assert_eq!(map.get(100).as_deref(), Some("vps2"));
    }

    #[test]
    fn miss_is_none() {
        let map = AccountAgentMap::new();
        assert!(map.get(42).is_none());
    }
}
