//! Shared-secret bearer tokens and the auth gate.
//!
//! A token is `base64("<unix_seconds>.<hex_hmac_sha256(secret, unix_seconds)>")`:
//! self-expiring, stateless, and mintable only by a secret holder. The gate
//! rejects malformed tokens, signature mismatches, and tokens older than
//! the configured TTL — all as a bare 401 so callers learn nothing about
//! which check failed.

use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;
use crate::server::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Paths reachable without a token.
const PUBLIC_PATHS: &[&str] = &["/", "/api/auth/login", "/api/auth/verify", "/docs", "/openapi.json"];

fn sign(secret: &str, timestamp: i64) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Mint a token stamped `now`.
pub fn mint_token(secret: &str) -> String {
    let now = Utc::now().timestamp();
    base64::encode(format!("{now}.{}", hex::encode(sign(secret, now))))
}

/// Check structure, signature (constant-time) and age.
pub fn verify_token(secret: &str, token: &str, max_age_hours: i64) -> bool {
    let Ok(decoded) = base64::decode(token) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((ts_part, sig_part)) = decoded.split_once('.') else {
        return false;
    };
    let Ok(timestamp) = ts_part.parse::<i64>() else {
        return false;
    };
    let Ok(signature) = hex::decode(sig_part) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(ts_part.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        return false;
    }

    let age_seconds = Utc::now().timestamp() - timestamp;
    age_seconds <= max_age_hours * 3600
}

/// Extract the bearer token from an Authorization header value.
pub fn bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Auth gate: everything but the public paths and CORS preflights needs a
/// valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }
    let path = request.uri().path();
    if PUBLIC_PATHS.contains(&path) || path.starts_with("/docs/") {
        return Ok(next.run(request).await);
    }

    let valid = bearer(request.headers())
        .map(|token| {
            verify_token(
                &state.settings.auth_secret,
                token,
                state.settings.token_ttl_hours,
            )
        })
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Feature gate: trading and versus surfaces answer 503 while their flags
/// are off, before any handler logic runs.
pub async fn feature_gates(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();
    if path.starts_with("/api/versus") && !state.settings.versus_enabled {
        return Err(ApiError::FeatureDisabled(
            "Versus feature is disabled. Enable versus_enabled in the backend config.".into(),
        ));
    }
    if path.starts_with("/api/accounts/") && path.contains("/trade/") && !state.settings.trading_enabled
    {
        return Err(ApiError::FeatureDisabled(
            "Trading is currently disabled. Enable trading_enabled in the backend config.".into(),
        ));
    }
    Ok(next.run(request).await)
}
