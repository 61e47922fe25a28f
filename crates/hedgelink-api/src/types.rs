//! Request/response bodies for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hedgelink_core::{AccountId, AccountSnapshot};

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PhaseUpdateRequest {
    pub phase: String,
}

#[derive(Debug, Deserialize)]
pub struct VsUpdateRequest {
    /// Empty string removes the account from its group.
    #[serde(default)]
    pub vs_group: String,
}

/// The aggregated collection read.
#[derive(Debug, Serialize)]
pub struct AggregatedResponse {
    pub accounts: Vec<AccountSnapshot>,
    pub total_accounts: usize,
    pub connected_accounts: usize,
    pub disconnected_accounts: usize,
    pub total_balance: f64,
    pub last_refresh: DateTime<Utc>,
}

impl AggregatedResponse {
    pub fn build(accounts: Vec<AccountSnapshot>) -> Self {
        let connected = accounts.iter().filter(|a| a.status.is_connected()).count();
        let total_balance = accounts.iter().map(|a| a.balance).sum();
        Self {
            total_accounts: accounts.len(),
            connected_accounts: connected,
            disconnected_accounts: accounts.len() - connected,
            total_balance,
            last_refresh: Utc::now(),
            accounts,
        }
    }
}

/// Side arrives as a raw string so a bad value is a 400 with a clear
/// message rather than a deserialization-shaped rejection.
#[derive(Debug, Deserialize)]
pub struct CreateVersusRequest {
    pub account_a: AccountId,
    pub account_b: AccountId,
    pub symbol: String,
    pub lots: f64,
    pub side: String,
    pub tp_usd_a: f64,
    pub sl_usd_a: f64,
    pub tp_usd_b: f64,
    pub sl_usd_b: f64,
    #[serde(default)]
    pub scheduled_congelar: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_transferir: Option<DateTime<Utc>>,
}
