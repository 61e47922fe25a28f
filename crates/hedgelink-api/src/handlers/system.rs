//! Service info, auth endpoints, and cache administration.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{bearer, mint_token, verify_token};
use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{LoginRequest, LoginResponse};

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "HedgeLink Backend",
        "status": "online",
        "agents": state.client.registry().len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Exchange the shared login password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.password != state.settings.login_password {
        return Err(ApiError::Unauthorized);
    }
    info!("login accepted; token minted");
    Ok(Json(LoginResponse {
        success: true,
        token: mint_token(&state.settings.auth_secret),
        message: "Login successful".into(),
    }))
}

/// Report whether the presented bearer token is currently valid. Public:
/// frontends poll this to decide whether to show the login screen.
pub async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let valid = bearer(&headers)
        .map(|token| {
            verify_token(
                &state.settings.auth_secret,
                token,
                state.settings.token_ttl_hours,
            )
        })
        .unwrap_or(false);
    Json(json!({ "valid": valid }))
}

/// Drop the snapshot cache so the next read re-fans-out. The routing map
/// is left intact.
pub async fn force_refresh(State(state): State<AppState>) -> Json<Value> {
    state.cache.clear();
    Json(json!({
        "status": "success",
        "message": "Cache cleared, next request will fetch fresh data",
    }))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.stats();
    Json(json!({
        "account_entries": stats.account_entries,
        "status_entries": stats.status_entries,
        "last_full_refresh": stats.last_full_refresh,
        "ttl_seconds": stats.ttl_seconds,
        "routing_entries": state.routing.len(),
    }))
}
