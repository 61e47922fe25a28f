//! Versus workflow records — the two-step cross-account hedge.
//!
//! A record moves `pending → congelado → transferido`; any step that fails
//! mid-flight parks it in `error` until an operator deletes or recreates it.
//! Ticket-list invariants per status:
//!   congelado   — `tickets_a == [buy, sell]` (in that order)
//!   transferido — `tickets_a == [remaining]`, `tickets_b` has two legs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HedgeError;
use crate::types::{AccountId, Ticket, VersusId};

// ── Side ─────────────────────────────────────────────────────────────────────

/// Account A's configured opening direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl FromStr for Side {
    type Err = HedgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(HedgeError::InvalidSide),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── VersusStatus ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersusStatus {
    Pending,
    Congelado,
    Transferido,
    Completed,
    Error,
}

impl VersusStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VersusStatus::Pending => "pending",
            VersusStatus::Congelado => "congelado",
            VersusStatus::Transferido => "transferido",
            VersusStatus::Completed => "completed",
            VersusStatus::Error => "error",
        }
    }
}

impl fmt::Display for VersusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── VersusRecord ─────────────────────────────────────────────────────────────

/// Persisted state of one Versus workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersusRecord {
    pub id: VersusId,
    pub account_a: AccountId,
    pub account_b: AccountId,
    /// Always stored uppercased.
    pub symbol: String,
    pub lots: f64,
    pub side: Side,
    pub tp_usd_a: f64,
    pub sl_usd_a: f64,
    pub tp_usd_b: f64,
    pub sl_usd_b: f64,
    pub status: VersusStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_congelar: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_transferir: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tickets_a: Vec<Ticket>,
    #[serde(default)]
    pub tickets_b: Vec<Ticket>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub holder_a: String,
    pub prop_firm_a: String,
    pub holder_b: String,
    pub prop_firm_b: String,
}
