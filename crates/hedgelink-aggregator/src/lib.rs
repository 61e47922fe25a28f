//! Parallel fan-out to every configured agent, with per-agent failure
//! tracking and best-effort auto-recovery.
//!
//! One unreachable agent never fails the fleet: each agent contributes its
//! own status-vector entry, and its accounts are simply absent from the
//! merged list until it comes back. When an agent keeps reporting a
//! disconnected terminal (or keeps refusing connections), the aggregator
//! POSTs the agent's `/refresh` endpoint once per threshold crossing and
//! resets the counter whether or not the nudge worked, so at most one nudge
//! goes out per crossing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};

use hedgelink_agent::{AgentCallError, AgentClient, HistoryQuery};
use hedgelink_cache::{AccountAgentMap, SmartCache};
use hedgelink_core::{
    AccountId, AccountSnapshot, AgentAccount, AgentHealth, AgentStatusReport, HedgeError,
    TradeHistory,
};
use hedgelink_store::{PhaseStore, TradeHistoryStore, VsStore};

/// Consecutive bad passes before an agent gets a `/refresh` nudge.
pub const DEFAULT_RECOVERY_THRESHOLD: u32 = 2;

/// Settle time between nudging an agent and retrying its snapshot.
const RECOVERY_SETTLE: Duration = Duration::from_secs(2);

/// History window for an account that has never been synced.
const INITIAL_HISTORY_DAYS: u32 = 30;

pub struct Aggregator {
    client: Arc<AgentClient>,
    cache: Arc<SmartCache>,
    routing: Arc<AccountAgentMap>,
    phases: Arc<PhaseStore>,
    vs: Arc<VsStore>,
    history: Arc<TradeHistoryStore>,
    /// Consecutive failure count per agent. Only this module writes it.
    failure_counts: Mutex<HashMap<String, u32>>,
    recovery_threshold: u32,
}

impl Aggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<AgentClient>,
        cache: Arc<SmartCache>,
        routing: Arc<AccountAgentMap>,
        phases: Arc<PhaseStore>,
        vs: Arc<VsStore>,
        history: Arc<TradeHistoryStore>,
        recovery_threshold: u32,
    ) -> Self {
        Self {
            client,
            cache,
            routing,
            phases,
            vs,
            history,
            failure_counts: Mutex::new(HashMap::new()),
            recovery_threshold,
        }
    }

    // ── Failure counters ─────────────────────────────────────────────────────

    fn bump_failures(&self, agent: &str) -> u32 {
        let mut counts = self
            .failure_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(agent.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn reset_failures(&self, agent: &str) {
        self.failure_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent.to_string(), 0);
    }

    /// Best-effort `/refresh` nudge; the counter resets regardless of the
    /// outcome so an agent that is down hard is not hammered every pass.
    async fn nudge_refresh(&self, agent: &str) {
        info!(agent, "failure threshold crossed; requesting agent refresh");
        if let Err(e) = self.client.refresh(agent).await {
            warn!(agent, error = %e, "agent refresh request failed");
        }
        self.reset_failures(agent);
    }

    // ── Fan-out ──────────────────────────────────────────────────────────────

    /// One agent's contribution to an aggregation pass.
    async fn fetch_agent(&self, agent: &str) -> (Vec<AgentAccount>, AgentHealth) {
        match self.client.fetch_accounts(agent).await {
            Ok(accounts) => {
                let any_connected = accounts.iter().any(|a| a.status.is_connected());
                if any_connected {
                    self.reset_failures(agent);
                    return (accounts, AgentHealth::Online);
                }

                // HTTP worked but the terminal session looks dead. Count it,
                // and past the threshold nudge the agent, give the terminal a
                // moment, and take one fresh look.
                let count = self.bump_failures(agent);
                warn!(agent, count, "agent reachable but terminal disconnected");
                if count >= self.recovery_threshold {
                    self.nudge_refresh(agent).await;
                    tokio::time::sleep(RECOVERY_SETTLE).await;
                    match self.client.fetch_accounts(agent).await {
                        Ok(retried) => return (retried, AgentHealth::Online),
                        Err(e) => {
                            warn!(agent, error = %e, "post-refresh retry failed");
                        }
                    }
                }
                (accounts, AgentHealth::Online)
            }
            Err(AgentCallError::Timeout) => {
                let count = self.bump_failures(agent);
                error!(agent, count, "timeout fetching agent snapshot");
                (Vec::new(), AgentHealth::Timeout)
            }
            Err(AgentCallError::Unreachable(reason)) => {
                let count = self.bump_failures(agent);
                error!(agent, count, %reason, "connection error fetching agent snapshot");
                if count >= self.recovery_threshold {
                    // No retry here: an unreachable agent will not answer a
                    // snapshot either; the nudge is fire-and-forget.
                    self.nudge_refresh(agent).await;
                }
                (Vec::new(), AgentHealth::Offline)
            }
            Err(e) => {
                let count = self.bump_failures(agent);
                error!(agent, count, error = %e, "error fetching agent snapshot");
                (Vec::new(), AgentHealth::Error)
            }
        }
    }

    /// Call every agent's snapshot endpoint in parallel. Returns the flat
    /// list of (owner, account) pairs and the per-agent status vector.
    /// Response ordering is not guaranteed; callers must not depend on it.
    pub async fn fetch_all_agents(&self) -> (Vec<(String, AgentAccount)>, Vec<AgentStatusReport>) {
        let endpoints = self.client.registry().endpoints().to_vec();
        info!(agents = endpoints.len(), "fetching snapshots from all agents");

        let results = join_all(
            endpoints
                .iter()
                .map(|ep| async move { (ep, self.fetch_agent(&ep.name).await) }),
        )
        .await;

        let mut accounts = Vec::new();
        let mut statuses = Vec::new();
        for (ep, (agent_accounts, health)) in results {
            statuses.push(AgentStatusReport {
                agent_name: ep.name.clone(),
                agent_url: ep.url.clone(),
                status: health,
                accounts_count: agent_accounts.len(),
                last_checked: Utc::now(),
            });
            for account in agent_accounts {
                accounts.push((ep.name.clone(), account));
            }
        }
        info!(total = accounts.len(), "aggregation pass complete");
        (accounts, statuses)
    }

    /// The full collection read path: fan out, join each account with its
    /// phase/vs overlays and owner, repopulate the routing map, and install
    /// the result as the fresh cache generation.
    pub async fn refresh_accounts(&self) -> (Vec<AccountSnapshot>, Vec<AgentStatusReport>) {
        let (raw, statuses) = self.fetch_all_agents().await;

        let snapshots: Vec<AccountSnapshot> = raw
            .into_iter()
            .map(|(owner, account)| {
                let phase = self.phases.get(account.account_id);
                let vs_group = self.vs.get(account.account_id);
                AccountSnapshot::from_agent(account, &owner, phase, vs_group)
            })
            .collect();

        self.routing.update_bulk(&snapshots);
        self.cache.set_accounts(snapshots.clone());
        self.cache.set_agent_statuses(statuses.clone());
        (snapshots, statuses)
    }

    /// Owning agent for `account`, repopulating the routing map with a full
    /// aggregation on a miss.
    pub async fn resolve_owner(&self, account: AccountId) -> Result<String, HedgeError> {
        if let Some(agent) = self.routing.get(account) {
            return Ok(agent);
        }
        info!(account, "owner not in routing map; running full aggregation");
        self.refresh_accounts().await;
        self.routing
            .get(account)
            .ok_or(HedgeError::AccountNotFound(account))
    }

    // ── Trade history ────────────────────────────────────────────────────────

    /// Fetch and merge closed-trade history for one account: incremental
    /// from the last sync time when one exists, else an initial 30-day
    /// window. `force_refresh` drops the stored set first.
    pub async fn fetch_trade_history(
        &self,
        account: AccountId,
        force_refresh: bool,
    ) -> Result<TradeHistory, HedgeError> {
        if force_refresh {
            self.history.clear_account(account)?;
        }

        let owner = self.resolve_owner(account).await?;
        let query = match self.history.get_last_sync_time(account) {
            Some(since) => {
                info!(account, %since, "incremental trade-history fetch");
                HistoryQuery::FromDate(since)
            }
            None => {
                info!(account, days = INITIAL_HISTORY_DAYS, "initial trade-history fetch");
                HistoryQuery::Days(INITIAL_HISTORY_DAYS)
            }
        };

        let trades = self
            .client
            .fetch_trade_history(&owner, account, query)
            .await
            .map_err(|e| HedgeError::Upstream(e.to_string()))?;

        self.history.update_trades(account, trades)
    }
}
