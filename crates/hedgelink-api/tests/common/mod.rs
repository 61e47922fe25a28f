//! Test harness: in-process mock agents plus a real router on a real port.
//!
//! Each scenario builds a fresh backend (tempdir stores, empty caches) and
//! as many scripted agents as it needs, then drives the API over HTTP
//! exactly the way a frontend would.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use hedgelink_agent::{AgentClient, AgentRegistry, HttpPool};
use hedgelink_aggregator::Aggregator;
use hedgelink_api::auth::mint_token;
use hedgelink_api::server::{router, ApiSettings, AppState};
use hedgelink_cache::{AccountAgentMap, SmartCache};
use hedgelink_core::AgentEndpoint;
use hedgelink_store::{PhaseStore, TradeHistoryStore, VersusStore, VsStore};
use hedgelink_versus::VersusEngine;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "test-password";

// ── Mock agent ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AgentScript {
    /// Body served by GET /accounts.
    pub accounts_body: Value,
    /// Served instead of `accounts_body` once /refresh has been hit.
    pub accounts_after_refresh: Option<Value>,
    pub refresh_hits: usize,
    /// Scripted open outcomes; when empty, opens succeed with tickets
    /// counting up from `next_ticket`.
    pub open_results: VecDeque<Result<u64, String>>,
    pub next_ticket: u64,
    pub open_requests: Vec<Value>,
    pub close_results: VecDeque<Result<(), String>>,
    pub closed_tickets: Vec<u64>,
    pub modify_requests: Vec<Value>,
    pub positions_body: Value,
    pub quote_body: Option<Value>,
    pub history_body: Option<Value>,
}

impl AgentScript {
    fn new() -> Self {
        Self {
            accounts_body: json!([]),
            positions_body: json!({ "positions": [], "position_count": 0 }),
            next_ticket: 1000,
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct MockAgent {
    pub url: String,
    pub script: Arc<Mutex<AgentScript>>,
}

impl MockAgent {
    pub async fn spawn() -> Self {
        let script = Arc::new(Mutex::new(AgentScript::new()));

        let app = Router::new()
            .route("/accounts", get(mock_accounts))
            .route("/refresh", post(mock_refresh))
            .route("/positions", get(mock_positions))
            .route("/positions/open", post(mock_open))
            .route("/positions/close", post(mock_close))
            .route("/positions/modify", put(mock_modify))
            .route("/quote/{symbol}", get(mock_quote))
            .route("/trade-history", get(mock_history))
            .with_state(Arc::clone(&script));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            script,
        }
    }

    pub fn set_accounts(&self, body: Value) {
        self.script.lock().unwrap().accounts_body = body;
    }

    pub fn set_accounts_after_refresh(&self, body: Value) {
        self.script.lock().unwrap().accounts_after_refresh = Some(body);
    }

    pub fn set_quote(&self, body: Value) {
        self.script.lock().unwrap().quote_body = Some(body);
    }

    pub fn set_positions(&self, body: Value) {
        self.script.lock().unwrap().positions_body = body;
    }

    pub fn push_open_result(&self, result: Result<u64, &str>) {
        self.script
            .lock()
            .unwrap()
            .open_results
            .push_back(result.map_err(str::to_string));
    }

    pub fn refresh_hits(&self) -> usize {
        self.script.lock().unwrap().refresh_hits
    }

    pub fn open_requests(&self) -> Vec<Value> {
        self.script.lock().unwrap().open_requests.clone()
    }

    pub fn closed_tickets(&self) -> Vec<u64> {
        self.script.lock().unwrap().closed_tickets.clone()
    }

    pub fn modify_requests(&self) -> Vec<Value> {
        self.script.lock().unwrap().modify_requests.clone()
    }
}

type ScriptState = Arc<Mutex<AgentScript>>;

async fn mock_accounts(State(script): State<ScriptState>) -> Json<Value> {
    let script = script.lock().unwrap();
    if script.refresh_hits > 0 {
        if let Some(after) = &script.accounts_after_refresh {
            return Json(after.clone());
        }
    }
    Json(script.accounts_body.clone())
}

async fn mock_refresh(State(script): State<ScriptState>) -> Json<Value> {
    script.lock().unwrap().refresh_hits += 1;
    Json(json!({ "status": "refreshing" }))
}

async fn mock_positions(State(script): State<ScriptState>) -> Json<Value> {
    Json(script.lock().unwrap().positions_body.clone())
}

async fn mock_open(State(script): State<ScriptState>, Json(body): Json<Value>) -> Json<Value> {
    let mut script = script.lock().unwrap();
    script.open_requests.push(body);
    match script.open_results.pop_front() {
        Some(Ok(ticket)) => Json(json!({ "success": true, "ticket": ticket })),
        Some(Err(message)) => Json(json!({ "success": false, "message": message })),
        None => {
            script.next_ticket += 1;
            let ticket = script.next_ticket;
            Json(json!({ "success": true, "ticket": ticket }))
        }
    }
}

async fn mock_close(State(script): State<ScriptState>, Json(body): Json<Value>) -> Json<Value> {
    let mut script = script.lock().unwrap();
    if let Some(ticket) = body.get("ticket").and_then(Value::as_u64) {
        script.closed_tickets.push(ticket);
    }
    match script.close_results.pop_front() {
        Some(Ok(())) | None => Json(json!({ "success": true })),
        Some(Err(message)) => Json(json!({ "success": false, "message": message })),
    }
}

async fn mock_modify(State(script): State<ScriptState>, Json(body): Json<Value>) -> Json<Value> {
    script.lock().unwrap().modify_requests.push(body);
    Json(json!({ "success": true }))
}

async fn mock_quote(
    State(script): State<ScriptState>,
    Path(_symbol): Path<String>,
) -> Result<Json<Value>, axum::http::StatusCode> {
    match &script.lock().unwrap().quote_body {
        Some(body) => Ok(Json(body.clone())),
        None => Err(axum::http::StatusCode::NOT_FOUND),
    }
}

async fn mock_history(State(script): State<ScriptState>) -> Json<Value> {
    match &script.lock().unwrap().history_body {
        Some(body) => Json(body.clone()),
        None => Json(json!({ "success": true, "trades": [] })),
    }
}

// ── Backend harness ──────────────────────────────────────────────────────────

pub struct TestBackend {
    pub base: String,
    pub http: reqwest::Client,
    pub token: String,
    pub state: AppState,
    _shutdown: CancellationToken,
    _tmp: tempfile::TempDir,
}

pub struct BackendOptions {
    pub trading_enabled: bool,
    pub versus_enabled: bool,
    pub cache_ttl: Duration,
    pub recovery_threshold: u32,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            trading_enabled: true,
            versus_enabled: true,
            cache_ttl: Duration::from_secs(60),
            recovery_threshold: 2,
        }
    }
}

pub async fn spawn_backend(agents: &[(&str, &str)], options: BackendOptions) -> TestBackend {
    let tmp = tempfile::tempdir().unwrap();

    let endpoints: Vec<AgentEndpoint> = agents
        .iter()
        .map(|(name, url)| AgentEndpoint {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect();

    let registry = Arc::new(AgentRegistry::from_config(&endpoints));
    let pool = Arc::new(HttpPool::new());
    let client = Arc::new(AgentClient::new(
        Arc::clone(&pool),
        Arc::clone(&registry),
        Duration::from_secs(2),
    ));
    let cache = Arc::new(SmartCache::new(options.cache_ttl));
    let routing = Arc::new(AccountAgentMap::new());
    let phases = Arc::new(PhaseStore::open(tmp.path().join("phases.json")));
    let vs = Arc::new(VsStore::open(tmp.path().join("vs_groups.json")));
    let versus_store = Arc::new(VersusStore::open(tmp.path().join("versus.json")));
    let history = Arc::new(TradeHistoryStore::open(tmp.path().join("history.json")));

    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&client),
        Arc::clone(&cache),
        Arc::clone(&routing),
        Arc::clone(&phases),
        Arc::clone(&vs),
        Arc::clone(&history),
        options.recovery_threshold,
    ));
    let engine = Arc::new(VersusEngine::new(
        Arc::clone(&client),
        Arc::clone(&versus_store),
        Arc::clone(&cache),
        Arc::clone(&aggregator),
    ));

    let state = AppState {
        cache,
        routing,
        phases,
        vs,
        versus_store,
        history,
        client,
        aggregator,
        engine,
        settings: Arc::new(ApiSettings {
            auth_secret: TEST_SECRET.into(),
            token_ttl_hours: 24,
            login_password: TEST_PASSWORD.into(),
            trading_enabled: options.trading_enabled,
            versus_enabled: options.versus_enabled,
            allowed_origins: vec!["*".into()],
        }),
    };

    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
            .unwrap();
    });

    TestBackend {
        base: format!("http://{addr}"),
        http: reqwest::Client::new(),
        token: mint_token(TEST_SECRET),
        state,
        _shutdown: shutdown,
        _tmp: tmp,
    }
}

impl TestBackend {
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .put(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .delete(format!("{}{path}", self.base))
            .bearer_auth(&self.token)
    }
}

/// A connected account in the agents' wire shape.
pub fn wire_account(id: u64, balance: f64, status: &str) -> Value {
    json!({
        "account_id": id,
        "display_name": format!("ACC-{id}"),
        "balance": balance,
        "status": status,
        "days_operating": 10,
        "has_open_position": false,
        "last_updated": "2026-07-01T12:00:00Z",
        "holder": "J. Trader",
        "prop_firm": "FundedNext",
        "initial_balance": 100000.0
    })
}

/// The reference EURUSD quote used by the engine math scenarios.
pub fn reference_quote() -> Value {
    json!({
        "bid": 1.10000,
        "ask": 1.10010,
        "point": 0.00001,
        "pip_value": 0.0001,
        "trade_tick_value": 1.0,
        "spread_pips": 1.0
    })
}
