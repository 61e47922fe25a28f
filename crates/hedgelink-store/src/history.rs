//! Incremental trade-history cache, one entry set per account.
//!
//! New fetches merge into the stored set by position id (last wins), totals
//! are recomputed on every merge, and `last_sync_time` advances so the next
//! fetch can be incremental.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use hedgelink_core::{AccountId, HedgeError, TradeHistory, TradeRecord};

use crate::file::{load_or_default, save_atomic};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct AccountHistory {
    trades: Vec<TradeRecord>,
    total_trades: usize,
    total_profit: f64,
    total_commission: f64,
    last_sync_time: Option<DateTime<Utc>>,
}

pub struct TradeHistoryStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, AccountHistory>>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl TradeHistoryStore {
    pub fn open(path: PathBuf) -> Self {
        let cache = load_or_default(&path);
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AccountHistory>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When this account was last synced, if ever.
    pub fn get_last_sync_time(&self, id: AccountId) -> Option<DateTime<Utc>> {
        self.lock()
            .get(&id.to_string())
            .and_then(|h| h.last_sync_time)
    }

    /// The stored merged history, without touching sync state.
    pub fn get_cached_trades(&self, id: AccountId) -> Vec<TradeRecord> {
        self.lock()
            .get(&id.to_string())
            .map(|h| h.trades.clone())
            .unwrap_or_default()
    }

    /// Merge `new_trades` into the stored set (last writer wins per
    /// position id), recompute totals, stamp `last_sync_time = now`,
    /// persist, and return the merged view.
    pub fn update_trades(
        &self,
        id: AccountId,
        new_trades: Vec<TradeRecord>,
    ) -> Result<TradeHistory, HedgeError> {
        let new_count = new_trades.len();
        let mut cache = self.lock();
        let entry = cache.entry(id.to_string()).or_default();

        let mut by_position: HashMap<u64, TradeRecord> = entry
            .trades
            .drain(..)
            .map(|t| (t.position_id, t))
            .collect();
        for trade in new_trades {
            by_position.insert(trade.position_id, trade);
        }

        let mut merged: Vec<TradeRecord> = by_position.into_values().collect();
        merged.sort_by(|a, b| b.exit_time.cmp(&a.exit_time));

        entry.total_profit = round2(merged.iter().map(|t| t.profit).sum());
        entry.total_commission = round2(merged.iter().map(|t| t.commission).sum());
        entry.total_trades = merged.len();
        entry.last_sync_time = Some(Utc::now());
        entry.trades = merged;

        let result = TradeHistory {
            account_id: id,
            trades: entry.trades.clone(),
            total_trades: entry.total_trades,
            total_profit: entry.total_profit,
            total_commission: entry.total_commission,
            new_trades_count: new_count,
        };

        save_atomic(&self.path, &*cache)?;
        info!(
            account = id,
            new = new_count,
            total = result.total_trades,
            "trade history merged"
        );
        Ok(result)
    }

    /// Forget one account's history (used by force refresh). Returns
    /// whether anything was stored.
    pub fn clear_account(&self, id: AccountId) -> Result<bool, HedgeError> {
        let mut cache = self.lock();
        let removed = cache.remove(&id.to_string()).is_some();
        if removed {
            save_atomic(&self.path, &*cache)?;
            info!(account = id, "trade history cleared");
        }
        Ok(removed)
    }
}
