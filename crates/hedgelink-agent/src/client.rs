//! Typed calls against a single agent's HTTP surface.
//!
//! Every method resolves the agent name through the registry, runs one HTTP
//! round-trip through the shared pool, and returns a `Result` whose error is
//! a closed sum — callers branch on the failure mode instead of parsing
//! exception text. The snapshot endpoint tolerates three body shapes (a bare
//! account object, a bare list, or an `{"accounts": [...]}` wrapper) because
//! single-terminal and multi-terminal agent builds report differently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use hedgelink_core::{AgentAccount, Side, Ticket, TradeRecord};

use crate::pool::{HttpPool, TRADE_TIMEOUT};
use crate::registry::AgentRegistry;

// ── Error sum ────────────────────────────────────────────────────────────────

/// One agent call's failure mode.
#[derive(Debug, Error)]
pub enum AgentCallError {
    #[error("agent call timed out")]
    Timeout,

    #[error("agent unreachable: {0}")]
    Unreachable(String),

    #[error("agent returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("could not decode agent response: {0}")]
    Decode(String),

    #[error("agent rejected the operation: {0}")]
    Rejected(String),

    #[error("no agent named '{0}' in the registry")]
    UnknownAgent(String),

    #[error("{0}")]
    Internal(String),
}

impl AgentCallError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AgentCallError::Timeout
        } else if e.is_connect() {
            AgentCallError::Unreachable(e.to_string())
        } else if e.is_decode() {
            AgentCallError::Decode(e.to_string())
        } else {
            AgentCallError::Internal(e.to_string())
        }
    }

    /// True for the failure modes the positions endpoint downgrades.
    pub fn is_unavailability(&self) -> bool {
        matches!(
            self,
            AgentCallError::Timeout | AgentCallError::Unreachable(_)
        )
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

/// Market quote for one symbol. Fields arrive optional; the Versus engine
/// validates the set it needs before doing any math.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub point: Option<f64>,
    #[serde(default)]
    pub pip_value: Option<f64>,
    #[serde(default)]
    pub trade_tick_value: Option<f64>,
    #[serde(default)]
    pub spread_pips: Option<f64>,
}

/// One open position as reported by an agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionInfo {
    pub ticket: Ticket,
    pub symbol: String,
    #[serde(rename = "type")]
    pub position_type: Side,
    pub volume: f64,
    #[serde(default)]
    pub price_open: f64,
    #[serde(default)]
    pub price_current: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub positions: Vec<PositionInfo>,
    #[serde(default)]
    pub position_count: usize,
}

/// Open a market position. Stops are pip distances; the agent applies the
/// direction. (The modify endpoint takes absolute prices instead — the
/// terminals' API is asymmetric and the contract preserves that.)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenRequest {
    pub symbol: String,
    pub lot: f64,
    pub order_type: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_pips: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl_pips: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenResponse {
    pub success: bool,
    #[serde(default)]
    pub ticket: Option<Ticket>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloseRequest {
    pub ticket: Ticket,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloseResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Modify stops on an open position. Absolute price levels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub ticket: Ticket,
    pub tp: f64,
    pub sl: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifyResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Which window of history to request from the agent.
#[derive(Clone, Copy, Debug)]
pub enum HistoryQuery {
    /// Initial fetch: a trailing window of whole days.
    Days(u32),
    /// Incremental fetch: everything since the last sync.
    FromDate(DateTime<Utc>),
}

#[derive(Clone, Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    trades: Vec<TradeRecord>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

// ── Client ───────────────────────────────────────────────────────────────────

pub struct AgentClient {
    pool: std::sync::Arc<HttpPool>,
    registry: std::sync::Arc<AgentRegistry>,
    /// Timeout for snapshot fetches (configured per deployment; trade,
    /// quote and refresh calls use the fixed `TRADE_TIMEOUT`).
    snapshot_timeout: Duration,
}

impl AgentClient {
    pub fn new(
        pool: std::sync::Arc<HttpPool>,
        registry: std::sync::Arc<AgentRegistry>,
        snapshot_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            registry,
            snapshot_timeout,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    fn base_url(&self, agent: &str) -> Result<String, AgentCallError> {
        self.registry
            .resolve(agent)
            .map(str::to_string)
            .ok_or_else(|| AgentCallError::UnknownAgent(agent.to_string()))
    }

    /// Fetch the agent's account snapshot(s), normalised to a list.
    pub async fn fetch_accounts(&self, agent: &str) -> Result<Vec<AgentAccount>, AgentCallError> {
        let url = format!("{}/accounts", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        let resp = client
            .get(&url)
            .timeout(self.snapshot_timeout)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))?;
        normalize_accounts(body)
    }

    /// Ask the agent to reconnect its terminal session. Best-effort; the
    /// aggregator calls this when an agent keeps reporting disconnected.
    pub async fn refresh(&self, agent: &str) -> Result<(), AgentCallError> {
        let url = format!("{}/refresh", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        let resp = client
            .post(&url)
            .timeout(TRADE_TIMEOUT)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        check_status(resp).await?;
        Ok(())
    }

    /// Closed-trade history, incremental or windowed.
    pub async fn fetch_trade_history(
        &self,
        agent: &str,
        account: u64,
        query: HistoryQuery,
    ) -> Result<Vec<TradeRecord>, AgentCallError> {
        let url = format!("{}/trade-history", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        let mut req = client
            .get(&url)
            .query(&[("account_id", account.to_string())])
            .timeout(TRADE_TIMEOUT);
        req = match query {
            HistoryQuery::Days(days) => req.query(&[("days", days.to_string())]),
            HistoryQuery::FromDate(ts) => req.query(&[("from_date", ts.to_rfc3339())]),
        };
        let resp = req.send().await.map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let body: HistoryResponse = resp
            .json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))?;
        if !body.success {
            return Err(AgentCallError::Rejected(
                body.error.unwrap_or_else(|| "history fetch failed".into()),
            ));
        }
        Ok(body.trades)
    }

    /// Open positions currently held on the agent's terminal.
    pub async fn positions(&self, agent: &str) -> Result<Vec<PositionInfo>, AgentCallError> {
        let url = format!("{}/positions", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        let resp = client
            .get(&url)
            .timeout(TRADE_TIMEOUT)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let body: PositionsResponse = resp
            .json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))?;
        Ok(body.positions)
    }

    /// Open a market position; returns the new ticket.
    pub async fn open_position(
        &self,
        agent: &str,
        req: &OpenRequest,
    ) -> Result<Ticket, AgentCallError> {
        let url = format!("{}/positions/open", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        debug!(agent, symbol = %req.symbol, side = %req.order_type, lot = req.lot, "opening position");
        let resp = client
            .post(&url)
            .json(req)
            .timeout(TRADE_TIMEOUT)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let body: OpenResponse = resp
            .json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))?;
        if !body.success {
            return Err(AgentCallError::Rejected(
                body.message.unwrap_or_else(|| "open refused".into()),
            ));
        }
        body.ticket
            .ok_or_else(|| AgentCallError::Decode("open succeeded but no ticket in body".into()))
    }

    /// Close a position by ticket.
    pub async fn close_position(&self, agent: &str, ticket: Ticket) -> Result<(), AgentCallError> {
        let url = format!("{}/positions/close", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        let resp = client
            .post(&url)
            .json(&CloseRequest { ticket })
            .timeout(TRADE_TIMEOUT)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let body: CloseResponse = resp
            .json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))?;
        if !body.success {
            return Err(AgentCallError::Rejected(
                body.message.unwrap_or_else(|| "close refused".into()),
            ));
        }
        Ok(())
    }

    /// Replace the stops on an open position (absolute prices).
    pub async fn modify_position(
        &self,
        agent: &str,
        req: &ModifyRequest,
    ) -> Result<(), AgentCallError> {
        let url = format!("{}/positions/modify", self.base_url(agent)?);
        let client = self.pool.get_client()?;
        let resp = client
            .put(&url)
            .json(req)
            .timeout(TRADE_TIMEOUT)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let body: ModifyResponse = resp
            .json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))?;
        if !body.success {
            return Err(AgentCallError::Rejected(
                body.message.unwrap_or_else(|| "modify refused".into()),
            ));
        }
        Ok(())
    }

    /// Market quote for a symbol from the agent's terminal.
    pub async fn quote(&self, agent: &str, symbol: &str) -> Result<Quote, AgentCallError> {
        let url = format!("{}/quote/{}", self.base_url(agent)?, symbol);
        let client = self.pool.get_client()?;
        let resp = client
            .get(&url)
            .timeout(TRADE_TIMEOUT)
            .send()
            .await
            .map_err(AgentCallError::from_reqwest)?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| AgentCallError::Decode(e.to_string()))
    }

    /// Raw pass-through for the trade proxy endpoints: the agent's HTTP
    /// status and JSON body are returned verbatim so the API can surface
    /// them to the caller unchanged.
    pub async fn proxy(
        &self,
        agent: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(u16, serde_json::Value), AgentCallError> {
        let url = format!("{}{}", self.base_url(agent)?, path);
        let client = self.pool.get_client()?;
        let mut req = client.request(method, &url).timeout(TRADE_TIMEOUT);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await.map_err(AgentCallError::from_reqwest)?;
        let code = resp.status().as_u16();
        let text = resp.text().await.map_err(AgentCallError::from_reqwest)?;
        let value = serde_json::from_str(&text).unwrap_or_else(|_| {
            warn!(agent, path, "agent returned non-JSON body");
            serde_json::json!({ "detail": text })
        });
        Ok((code, value))
    }
}

/// Turn a non-2xx response into `Status{code, body}`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AgentCallError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AgentCallError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Accept the three snapshot shapes agents produce and flatten to a list.
fn normalize_accounts(body: serde_json::Value) -> Result<Vec<AgentAccount>, AgentCallError> {
    let list = match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("accounts") {
            Some(serde_json::Value::Array(items)) => items,
            Some(other) => {
                // Not the wrapper shape after all; put the field back and
                // treat the object as one account.
                map.insert("accounts".to_string(), other);
                vec![serde_json::Value::Object(map)]
            }
            None => vec![serde_json::Value::Object(map)],
        },
        other => {
            return Err(AgentCallError::Decode(format!(
                "unexpected snapshot shape: {other}"
            )))
        }
    };
    list.into_iter()
        .map(|v| {
            serde_json::from_value::<AgentAccount>(v)
                .map_err(|e| AgentCallError::Decode(e.to_string()))
        })
        .collect()
}
