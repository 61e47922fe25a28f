//! Aggregated and per-account reads, overlay updates, trade history.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use hedgelink_cache::SnapshotField;
use hedgelink_core::{AccountId, AccountSnapshot, AgentStatusReport, TradeHistory};
use hedgelink_store::VsUpdateOutcome;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{AggregatedResponse, PhaseUpdateRequest, RefreshQuery, VsUpdateRequest};

/// The collection read: smart cache first, full fan-out on a miss or when
/// the caller forces it.
pub async fn get_all_accounts(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<AggregatedResponse>, ApiError> {
    if !query.force_refresh {
        if let Some(cached) = state.cache.get_all_accounts() {
            return Ok(Json(AggregatedResponse::build(cached)));
        }
    }
    let (snapshots, _statuses) = state.aggregator.refresh_accounts().await;
    Ok(Json(AggregatedResponse::build(snapshots)))
}

/// Always a fresh pass; never served from cache.
pub async fn get_agents_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentStatusReport>>, ApiError> {
    let (_accounts, statuses) = state.aggregator.fetch_all_agents().await;
    Ok(Json(statuses))
}

/// Single-account read routed through the account→agent map, so only the
/// owning agent is contacted.
pub async fn get_single_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> Result<Json<AccountSnapshot>, ApiError> {
    if let Some(cached) = state.cache.get_account(id) {
        return Ok(Json(cached));
    }

    let owner = state.aggregator.resolve_owner(id).await?;
    let accounts = state
        .client
        .fetch_accounts(&owner)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    let raw = accounts
        .into_iter()
        .find(|a| a.account_id == id)
        .ok_or_else(|| ApiError::NotFound(format!("account {id} not found on agent {owner}")))?;

    let snapshot = AccountSnapshot::from_agent(
        raw,
        &owner,
        state.phases.get(id),
        state.vs.get(id),
    );
    Ok(Json(snapshot))
}

/// Update the persisted phase overlay and patch the cached snapshot in
/// place.
pub async fn update_phase(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(request): Json<PhaseUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    info!(account = id, phase = %request.phase, "phase update requested");
    state.phases.update(id, &request.phase)?;
    state
        .cache
        .update_account_field(id, SnapshotField::Phase(request.phase.clone()));
    Ok(Json(json!({
        "status": "success",
        "message": format!("Phase updated to '{}' for account {id}", request.phase),
        "account_id": id,
        "new_phase": request.phase,
    })))
}

/// Update the VS group overlay; the store enforces the two-per-group cap.
pub async fn update_vs(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(request): Json<VsUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    info!(account = id, vs_group = %request.vs_group, "vs update requested");
    let outcome = state.vs.update(id, &request.vs_group)?;

    let (cached_value, message) = match &outcome {
        VsUpdateOutcome::Set(group) => (Some(group.clone()), format!("VS updated to '{group}'")),
        VsUpdateOutcome::Removed => (None, "VS removed".to_string()),
        VsUpdateOutcome::Unchanged => (None, "No changes made".to_string()),
    };
    if !matches!(outcome, VsUpdateOutcome::Unchanged) {
        state
            .cache
            .update_account_field(id, SnapshotField::VsGroup(cached_value));
    }

    Ok(Json(json!({
        "status": "success",
        "message": message,
        "account_id": id,
        "new_vs": request.vs_group,
    })))
}

/// Incremental trade-history read; `force_refresh` rebuilds from a clean
/// 30-day window.
pub async fn get_trade_history(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<TradeHistory>, ApiError> {
    let history = state
        .aggregator
        .fetch_trade_history(id, query.force_refresh)
        .await?;
    Ok(Json(history))
}
