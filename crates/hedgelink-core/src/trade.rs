//! Closed-trade history records, merged incrementally per account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AccountId;

/// One closed trade as reported by an agent's history endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Terminal position id — the merge key.
    pub position_id: u64,
    pub symbol: String,
    /// "BUY" or "SELL" as the terminal reports it.
    pub trade_type: String,
    pub volume: f64,
    #[serde(default)]
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: DateTime<Utc>,
    #[serde(default)]
    pub entry_price: f64,
    #[serde(default)]
    pub exit_price: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub swap: f64,
}

/// Merged history for one account, as served to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeHistory {
    pub account_id: AccountId,
    /// Newest exit first.
    pub trades: Vec<TradeRecord>,
    pub total_trades: usize,
    pub total_profit: f64,
    pub total_commission: f64,
    /// How many records the triggering fetch contributed.
    pub new_trades_count: usize,
}
