//! Router assembly and the composition-root state.
//!
//! `AppState` is the one container wired at startup: every handler gets its
//! collaborators from here, and tests build a fresh state per scenario
//! instead of reaching for process globals.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use hedgelink_agent::AgentClient;
use hedgelink_aggregator::Aggregator;
use hedgelink_cache::{AccountAgentMap, SmartCache};
use hedgelink_store::{PhaseStore, TradeHistoryStore, VersusStore, VsStore};
use hedgelink_versus::VersusEngine;

use crate::auth;
use crate::handlers::{accounts, system, trading, versus};

/// Settings the HTTP layer needs at request time.
#[derive(Clone, Debug)]
pub struct ApiSettings {
    pub auth_secret: String,
    pub token_ttl_hours: i64,
    pub login_password: String,
    pub trading_enabled: bool,
    pub versus_enabled: bool,
    /// CORS allow-list; a literal "*" anywhere means permissive.
    pub allowed_origins: Vec<String>,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SmartCache>,
    pub routing: Arc<AccountAgentMap>,
    pub phases: Arc<PhaseStore>,
    pub vs: Arc<VsStore>,
    pub versus_store: Arc<VersusStore>,
    pub history: Arc<TradeHistoryStore>,
    pub client: Arc<AgentClient>,
    pub aggregator: Arc<Aggregator>,
    pub engine: Arc<VersusEngine>,
    pub settings: Arc<ApiSettings>,
}

/// Build the full router: routes, then (outermost last) auth gate, feature
/// gates, and permissive CORS. CORS sits outside everything so even 401/503
/// responses carry the headers browsers need.
pub fn router(state: AppState) -> Router {
    let cors = if state.settings.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = state
            .settings
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(AllowOrigin::list(origins))
            .allow_headers(Any)
    };

    Router::new()
        .route("/", get(system::root))
        .route("/api/auth/login", post(system::login))
        .route("/api/auth/verify", get(system::verify))
        .route("/api/accounts", get(accounts::get_all_accounts))
        .route("/api/agents/status", get(accounts::get_agents_status))
        .route("/api/accounts/{id}", get(accounts::get_single_account))
        .route("/api/accounts/{id}/phase", put(accounts::update_phase))
        .route("/api/accounts/{id}/vs", put(accounts::update_vs))
        .route(
            "/api/accounts/{id}/trade-history",
            get(accounts::get_trade_history),
        )
        .route("/api/refresh", post(system::force_refresh))
        .route("/api/cache/stats", get(system::cache_stats))
        .route("/api/accounts/{id}/trade/open", post(trading::open_position))
        .route(
            "/api/accounts/{id}/trade/close",
            post(trading::close_position),
        )
        .route(
            "/api/accounts/{id}/trade/modify",
            put(trading::modify_position),
        )
        .route("/api/accounts/{id}/positions", get(trading::get_positions))
        .route("/api/versus", get(versus::list_versus).post(versus::create_versus))
        .route("/api/versus/feature-status", get(versus::feature_status))
        .route("/api/versus/{id}", delete(versus::delete_versus))
        .route("/api/versus/{id}/congelar", post(versus::congelar))
        .route("/api/versus/{id}/transferir", post(versus::transferir))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::feature_gates,
        ))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until `shutdown` fires.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
