//! Per-account phase labels ("F1", "F2", "Funded", …).
//!
//! A flat map keyed by stringified account id, the shape existing data
//! directories already use. No referential check against account
//! existence: a label may outlive its account.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::info;

use hedgelink_core::{AccountId, HedgeError};

use crate::file::{load_or_default, save_atomic};

pub const DEFAULT_PHASE: &str = "F1";

pub struct PhaseStore {
    path: PathBuf,
    phases: Mutex<HashMap<String, String>>,
}

impl PhaseStore {
    pub fn open(path: PathBuf) -> Self {
        let phases = load_or_default(&path);
        Self {
            path,
            phases: Mutex::new(phases),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.phases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored phase for an account, defaulting to `"F1"`.
    pub fn get(&self, id: AccountId) -> String {
        self.lock()
            .get(&id.to_string())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PHASE.to_string())
    }

    /// Overwrite and persist synchronously.
    pub fn update(&self, id: AccountId, phase: &str) -> Result<(), HedgeError> {
        let mut phases = self.lock();
        phases.insert(id.to_string(), phase.to_string());
        save_atomic(&self.path, &*phases)?;
        info!(account = id, phase, "phase updated");
        Ok(())
    }

    pub fn all(&self) -> HashMap<String, String> {
        self.lock().clone()
    }
}
