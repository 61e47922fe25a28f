//! Account snapshot and agent status value types.
//!
//! Snapshots are value-like and immutable once produced: the aggregator
//! builds them per refresh, the smart cache holds them for a TTL, and the
//! API serves them verbatim. Fields the agents may omit carry serde
//! defaults so older agent builds keep deserialising without migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AccountId;

// ── Serde default helpers ────────────────────────────────────────────────────

fn default_holder() -> String {
    "Unknown".to_string()
}
fn default_prop_firm() -> String {
    "N/A".to_string()
}
fn default_initial_balance() -> f64 {
    100_000.0
}
pub fn default_phase() -> String {
    "F1".to_string()
}

// ── ConnectionStatus ─────────────────────────────────────────────────────────

/// Terminal-session connectivity as reported by the owning agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    /// Anything the agent reports that is not `connected` collapses here.
    #[serde(other)]
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

// ── Agent wire shape ─────────────────────────────────────────────────────────

/// One account as delivered by an agent's snapshot endpoint, before the
/// backend attaches ownership and overlay data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentAccount {
    pub account_id: AccountId,
    pub display_name: String,
    pub balance: f64,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub days_operating: u32,
    #[serde(default)]
    pub has_open_position: bool,
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_holder")]
    pub holder: String,
    #[serde(default = "default_prop_firm")]
    pub prop_firm: String,
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
}

// ── AccountSnapshot ──────────────────────────────────────────────────────────

/// Point-in-time view of an account as served to clients: the agent-reported
/// fields plus the owning agent and the locally-persisted phase/vs overlays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub display_name: String,
    pub balance: f64,
    pub status: ConnectionStatus,
    pub days_operating: u32,
    pub has_open_position: bool,
    pub owner_agent: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_holder")]
    pub holder: String,
    #[serde(default = "default_prop_firm")]
    pub prop_firm: String,
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
    #[serde(default = "default_phase")]
    pub phase: String,
    #[serde(default)]
    pub vs_group: Option<String>,
}

impl AccountSnapshot {
    /// Join an agent-reported account with its owner and overlay values.
    pub fn from_agent(
        raw: AgentAccount,
        owner_agent: &str,
        phase: String,
        vs_group: Option<String>,
    ) -> Self {
        Self {
            account_id: raw.account_id,
            display_name: raw.display_name,
            balance: raw.balance,
            status: raw.status,
            days_operating: raw.days_operating,
            has_open_position: raw.has_open_position,
            owner_agent: owner_agent.to_string(),
            last_updated: raw.last_updated,
            holder: raw.holder,
            prop_firm: raw.prop_firm,
            initial_balance: raw.initial_balance,
            phase,
            vs_group,
        }
    }
}

// ── Agent health ─────────────────────────────────────────────────────────────

/// Outcome of one aggregation call against one agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    /// HTTP round-trip succeeded (the body may still report disconnected
    /// sessions — that is tracked per account, not per agent).
    Online,
    /// TCP/TLS connection could not be established.
    Offline,
    /// The call exceeded the configured agent timeout.
    Timeout,
    /// Any other failure (bad status, undecodable body).
    Error,
}

/// Per-agent entry of the status vector returned by a full aggregation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub agent_name: String,
    pub agent_url: String,
    pub status: AgentHealth,
    pub accounts_count: usize,
    pub last_checked: DateTime<Utc>,
}

// ── Agent configuration ──────────────────────────────────────────────────────

/// One configured agent: a stable name and the base URL it listens on.
/// Loaded at startup and immutable for the process lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentEndpoint {
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_strings_collapse_to_disconnected() {
        let s: ConnectionStatus = serde_json::from_str("\"rekt\"").unwrap();
        assert_eq!(s, ConnectionStatus::Disconnected);
        let s: ConnectionStatus = serde_json::from_str("\"connected\"").unwrap();
        assert!(s.is_connected());
    }

    #[test]
    fn agent_account_fills_defaults_for_missing_fields() {
        let raw = r#"{
            "account_id": 100,
            "display_name": "FN-100",
            "balance": 10000.0,
            "status": "connected",
            "last_updated": "2026-07-01T12:00:00Z"
        }"#;
        let acc: AgentAccount = serde_json::from_str(raw).unwrap();
        assert_eq!(acc.holder, "Unknown");
        assert_eq!(acc.prop_firm, "N/A");
        assert_eq!(acc.initial_balance, 100_000.0);
        assert_eq!(acc.days_operating, 0);
        assert!(!acc.has_open_position);
    }
}
