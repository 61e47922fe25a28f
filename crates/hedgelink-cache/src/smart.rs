//! Per-account snapshot cache with TTL and selective invalidation.
//!
//! The distinguishing operation is `invalidate_account`: a trade against one
//! account drops only that entry, so the next collection read still serves
//! the other ninety-nine accounts from memory instead of re-fanning out to
//! every agent. Collection reads are gated on `last_full_refresh` — only a
//! bulk insert makes the cache "fresh" as a whole.
//!
//! Cache operations never fail; they return `None`/`false`. A poisoned
//! mutex is recovered rather than propagated.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use hedgelink_core::{AccountId, AccountSnapshot, AgentStatusReport};

/// Typed per-field update for a cached snapshot, used when a locally
/// persisted overlay changes and a full refresh would be wasteful.
#[derive(Clone, Debug)]
pub enum SnapshotField {
    Phase(String),
    VsGroup(Option<String>),
}

/// Counters exposed by the cache-stats endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    pub account_entries: usize,
    pub status_entries: usize,
    pub last_full_refresh: Option<DateTime<Utc>>,
    pub ttl_seconds: u64,
}

struct Inner {
    accounts: HashMap<AccountId, (AccountSnapshot, Instant)>,
    agent_statuses: HashMap<String, (AgentStatusReport, Instant)>,
    /// Set only by `set_accounts`; carries both the monotonic stamp used
    /// for expiry and the wall-clock time reported in stats.
    last_full_refresh: Option<(DateTime<Utc>, Instant)>,
}

pub struct SmartCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl SmartCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                accounts: HashMap::new(),
                agent_statuses: HashMap::new(),
                last_full_refresh: None,
            }),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, stamp: Instant) -> bool {
        stamp.elapsed() > self.ttl
    }

    /// Snapshot for one account, if present and non-expired. An expired
    /// entry is removed on the way out.
    pub fn get_account(&self, id: AccountId) -> Option<AccountSnapshot> {
        let mut inner = self.lock();
        let fresh = match inner.accounts.get(&id) {
            Some((snap, stamp)) if !self.expired(*stamp) => Some(snap.clone()),
            Some(_) => None, // expired
            None => return None,
        };
        if fresh.is_none() {
            inner.accounts.remove(&id);
        }
        fresh
    }

    /// All non-expired snapshots — but only while the last *full* refresh is
    /// itself within TTL. Selectively-invalidated holes do not flip the
    /// collection stale; a missing or expired full refresh does.
    pub fn get_all_accounts(&self) -> Option<Vec<AccountSnapshot>> {
        let mut inner = self.lock();
        match inner.last_full_refresh {
            Some((_, stamp)) if !self.expired(stamp) => {}
            _ => return None,
        }
        let ttl = self.ttl;
        inner
            .accounts
            .retain(|_, (_, stamp)| stamp.elapsed() <= ttl);
        let mut out: Vec<AccountSnapshot> =
            inner.accounts.values().map(|(s, _)| s.clone()).collect();
        out.sort_by_key(|s| s.account_id);
        Some(out)
    }

    /// Bulk insert from a full aggregation. One shared stamp; establishes
    /// collection freshness.
    pub fn set_accounts(&self, snapshots: Vec<AccountSnapshot>) {
        let now = Instant::now();
        let mut inner = self.lock();
        debug!(count = snapshots.len(), "caching full account refresh");
        inner.accounts = snapshots
            .into_iter()
            .map(|s| (s.account_id, (s, now)))
            .collect();
        inner.last_full_refresh = Some((Utc::now(), now));
    }

    /// Drop one account's entry. Idempotent; leaves `last_full_refresh`
    /// untouched so collection reads stay warm.
    pub fn invalidate_account(&self, id: AccountId) {
        let mut inner = self.lock();
        if inner.accounts.remove(&id).is_some() {
            debug!(account = id, "cache entry invalidated");
        }
    }

    /// Apply a field update in place if the entry exists and is fresh,
    /// refreshing its stamp. Returns whether anything changed.
    pub fn update_account_field(&self, id: AccountId, field: SnapshotField) -> bool {
        let mut inner = self.lock();
        let expired = matches!(inner.accounts.get(&id), Some((_, stamp)) if self.expired(*stamp));
        if expired {
            inner.accounts.remove(&id);
            return false;
        }
        match inner.accounts.get_mut(&id) {
            Some((snap, stamp)) => {
                match field {
                    SnapshotField::Phase(p) => snap.phase = p,
                    SnapshotField::VsGroup(g) => snap.vs_group = g,
                }
                *stamp = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Bulk-replace the per-agent status vector (same stamp semantics as
    /// account entries).
    pub fn set_agent_statuses(&self, statuses: Vec<AgentStatusReport>) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.agent_statuses = statuses
            .into_iter()
            .map(|s| (s.agent_name.clone(), (s, now)))
            .collect();
    }

    /// Non-expired agent statuses, if any.
    pub fn get_agent_statuses(&self) -> Vec<AgentStatusReport> {
        let mut inner = self.lock();
        let ttl = self.ttl;
        inner
            .agent_statuses
            .retain(|_, (_, stamp)| stamp.elapsed() <= ttl);
        let mut out: Vec<AgentStatusReport> = inner
            .agent_statuses
            .values()
            .map(|(s, _)| s.clone())
            .collect();
        out.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
        out
    }

    /// Drop everything, including collection freshness.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.accounts.clear();
        inner.agent_statuses.clear();
        inner.last_full_refresh = None;
        debug!("smart cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            account_entries: inner.accounts.len(),
            status_entries: inner.agent_statuses.len(),
            last_full_refresh: inner.last_full_refresh.map(|(wall, _)| wall),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
