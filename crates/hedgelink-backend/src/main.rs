//! hedgelink-backend — the aggregation and trade-orchestration service.
//!
//! Startup sequence:
//!   1. Load configuration and initialise logging
//!   2. Open the persisted stores (phase, vs, versus, trade history)
//!   3. Build the agent registry, HTTP pool and caches
//!   4. Wire the aggregator and Versus engine into one state container
//!   5. Start the Versus scheduler (when the feature is enabled)
//!   6. Serve the HTTP API until ctrl-c, then stop the scheduler and
//!      release pooled connections

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hedgelink_agent::{AgentClient, AgentRegistry, HttpPool};
use hedgelink_aggregator::Aggregator;
use hedgelink_api::{ApiSettings, AppState};
use hedgelink_cache::{AccountAgentMap, SmartCache};
use hedgelink_store::{PhaseStore, TradeHistoryStore, VersusStore, VsStore};
use hedgelink_versus::{Scheduler, VersusEngine};

mod config;
use config::BackendConfig;

#[derive(Parser, Debug)]
#[command(
    name = "hedgelink-backend",
    version,
    about = "Aggregates trading-terminal fleets and orchestrates cross-account hedges"
)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "hedgelink.json")]
    config: PathBuf,

    /// Override the configured listen address.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the configured data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = BackendConfig::load(&args.config)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .init();

    info!(
        agents = config.agents.len(),
        trading = config.trading_enabled,
        versus = config.versus_enabled,
        "HedgeLink backend starting"
    );
    if config.agents.is_empty() {
        warn!("no agents configured; every aggregation will come back empty");
    }
    if config.spreadsheet.is_some() {
        info!("spreadsheet sink settings loaded (sink runs externally)");
    }
    if config.chat.is_some() {
        info!("chat sink settings loaded (sink runs externally)");
    }

    // ── Persisted stores ──────────────────────────────────────────────────────
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let phases = Arc::new(PhaseStore::open(config.phase_path()));
    let vs = Arc::new(VsStore::open(config.vs_path()));
    let versus_store = Arc::new(VersusStore::open(config.versus_path()));
    let history = Arc::new(TradeHistoryStore::open(config.trade_history_path()));

    // ── Agent plumbing and caches ─────────────────────────────────────────────
    let registry = Arc::new(AgentRegistry::from_config(&config.agents));
    let pool = Arc::new(HttpPool::new());
    let client = Arc::new(AgentClient::new(
        Arc::clone(&pool),
        Arc::clone(&registry),
        Duration::from_secs(config.agent_timeout_secs),
    ));
    let cache = Arc::new(SmartCache::new(Duration::from_secs(config.cache_ttl_secs)));
    let routing = Arc::new(AccountAgentMap::new());

    // ── Orchestration ─────────────────────────────────────────────────────────
    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&client),
        Arc::clone(&cache),
        Arc::clone(&routing),
        Arc::clone(&phases),
        Arc::clone(&vs),
        Arc::clone(&history),
        config.recovery_threshold,
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
        versus_store: Arc::clone(&versus_store),
        history,
        client,
        aggregator,
        engine: Arc::clone(&engine),
        settings: Arc::new(ApiSettings {
            auth_secret: config.auth_secret.clone(),
            token_ttl_hours: config.token_ttl_hours,
            login_password: config.login_password.clone(),
            trading_enabled: config.trading_enabled,
            versus_enabled: config.versus_enabled,
            allowed_origins: config.allowed_origins.clone(),
        }),
    };

    // ── Background scheduler ──────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    if config.versus_enabled {
        let scheduler = Scheduler::new(
            engine,
            versus_store,
            hedgelink_versus::scheduler::DEFAULT_INTERVAL,
        );
        tokio::spawn(scheduler.run(shutdown.child_token()));
    } else {
        info!("versus disabled; scheduler not started");
    }

    // ── Serve ─────────────────────────────────────────────────────────────────
    let addr = match args.listen {
        Some(addr) => addr,
        None => format!("{}:{}", config.listen_host, config.listen_port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    config.listen_host, config.listen_port
                )
            })?,
    };

    let shutdown_on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received; shutting down");
            shutdown_on_signal.cancel();
        }
    });

    hedgelink_api::serve(state, addr, shutdown.clone()).await?;

    shutdown.cancel();
    pool.close();
    info!("backend stopped");
    Ok(())
}
