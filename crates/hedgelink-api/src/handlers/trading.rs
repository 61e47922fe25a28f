//! Trade proxy: resolve the owning agent, forward, surface the agent's
//! response verbatim, and selectively invalidate the account on success.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

use hedgelink_agent::AgentCallError;
use hedgelink_core::AccountId;

use crate::error::ApiError;
use crate::server::AppState;

fn transport_error(e: AgentCallError) -> ApiError {
    match e {
        AgentCallError::Timeout => ApiError::Timeout,
        AgentCallError::Unreachable(reason) => ApiError::Upstream(reason),
        other => ApiError::Internal(other.to_string()),
    }
}

/// Forward one trade call and mirror the agent's status and body back.
/// A body with `success: true` invalidates the account's cached snapshot.
async fn forward(
    state: &AppState,
    account: AccountId,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<Response, ApiError> {
    let owner = state.aggregator.resolve_owner(account).await?;
    info!(account, agent = %owner, path, "forwarding trade call");

    let (code, reply) = state
        .client
        .proxy(&owner, method, path, body.as_ref())
        .await
        .map_err(transport_error)?;

    if reply.get("success").and_then(Value::as_bool) == Some(true) {
        state.cache.invalidate_account(account);
        info!(account, "cache invalidated after successful trade");
    }

    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(reply)).into_response())
}

pub async fn open_position(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(request): Json<Value>,
) -> Result<Response, ApiError> {
    forward(&state, id, Method::POST, "/positions/open", Some(request)).await
}

pub async fn close_position(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(request): Json<Value>,
) -> Result<Response, ApiError> {
    forward(&state, id, Method::POST, "/positions/close", Some(request)).await
}

pub async fn modify_position(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(request): Json<Value>,
) -> Result<Response, ApiError> {
    forward(&state, id, Method::PUT, "/positions/modify", Some(request)).await
}

/// Open-positions listing. UIs poll this endpoint, so timeouts and
/// unreachable agents degrade to an empty list instead of an error page.
pub async fn get_positions(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> Result<Response, ApiError> {
    let owner = state.aggregator.resolve_owner(id).await?;

    match state.client.proxy(&owner, Method::GET, "/positions", None).await {
        Ok((code, reply)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(reply)).into_response())
        }
        Err(e) if e.is_unavailability() => {
            warn!(account = id, agent = %owner, error = %e, "positions unavailable; returning empty list");
            Ok((
                StatusCode::OK,
                Json(json!({ "positions": [], "position_count": 0 })),
            )
                .into_response())
        }
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}
