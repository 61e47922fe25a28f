//! Scheduled execution of due Versus transitions.
//!
//! A single cooperative loop: sleep, scan the store for `pending` records
//! whose Congelar time has passed, run them sequentially, then the same for
//! `congelado`/Transferir. The loop shares the engine with the API so both
//! paths run the one implementation; the engine's status precondition makes
//! a race with a manual trigger a logged no-op rather than a double fire.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hedgelink_core::HedgeError;
use hedgelink_store::VersusStore;

use crate::engine::VersusEngine;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

pub struct Scheduler {
    engine: Arc<VersusEngine>,
    store: Arc<VersusStore>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<VersusEngine>, store: Arc<VersusStore>, interval: Duration) -> Self {
        Self {
            engine,
            store,
            interval,
        }
    }

    /// Run until `shutdown` fires. The sleep is interruptible, so shutdown
    /// is observed within one select rather than one full interval.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "versus scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("versus scheduler stopping");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.tick().await;
        }
    }

    /// One scan: due Congelars, then due Transferirs, sequentially.
    /// With nothing due this performs no outbound calls.
    pub async fn tick(&self) {
        let now = Utc::now();

        for record in self.store.due_congelar(now) {
            info!(id = %record.id, "scheduled congelar due");
            match self.engine.congelar(&record.id).await {
                Ok(_) => info!(id = %record.id, "scheduled congelar complete"),
                Err(HedgeError::VersusStatusMismatch { .. }) => {
                    // Someone triggered it between the scan and now; benign.
                    warn!(id = %record.id, "congelar already executed elsewhere");
                }
                Err(e) => warn!(id = %record.id, error = %e, "scheduled congelar failed"),
            }
        }

        for record in self.store.due_transferir(now) {
            info!(id = %record.id, "scheduled transferir due");
            match self.engine.transferir(&record.id).await {
                Ok(_) => info!(id = %record.id, "scheduled transferir complete"),
                Err(HedgeError::VersusStatusMismatch { .. }) => {
                    warn!(id = %record.id, "transferir already executed elsewhere");
                }
                Err(e) => warn!(id = %record.id, error = %e, "scheduled transferir failed"),
            }
        }
    }
}
