//! Persisted Versus workflow records.
//!
//! The document is an object keyed by record id. Scan order for the
//! scheduler follows insertion order, which is kept in a side index and
//! rebuilt from `created_at` when an existing file is loaded.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use hedgelink_core::{
    AccountId, HedgeError, Side, Ticket, VersusId, VersusRecord, VersusStatus,
};

use crate::file::{load_or_default, save_atomic};

/// Parameters for a new record; everything else is stamped by the store.
#[derive(Clone, Debug)]
pub struct NewVersus {
    pub account_a: AccountId,
    pub account_b: AccountId,
    pub symbol: String,
    pub lots: f64,
    pub side: Side,
    pub tp_usd_a: f64,
    pub sl_usd_a: f64,
    pub tp_usd_b: f64,
    pub sl_usd_b: f64,
    pub scheduled_congelar: Option<DateTime<Utc>>,
    pub scheduled_transferir: Option<DateTime<Utc>>,
    pub holder_a: String,
    pub prop_firm_a: String,
    pub holder_b: String,
    pub prop_firm_b: String,
}

struct Inner {
    records: HashMap<String, VersusRecord>,
    /// Insertion order of record ids; drives scheduler scan order.
    order: Vec<String>,
}

pub struct VersusStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl VersusStore {
    pub fn open(path: PathBuf) -> Self {
        let records: HashMap<String, VersusRecord> = load_or_default(&path);
        let mut order: Vec<String> = records.keys().cloned().collect();
        order.sort_by_key(|id| records[id].created_at);
        Self {
            path,
            inner: Mutex::new(Inner { records, order }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, inner: &Inner) -> Result<(), HedgeError> {
        save_atomic(&self.path, &inner.records)
    }

    /// Create and persist a fresh `pending` record.
    pub fn create(&self, new: NewVersus) -> Result<VersusRecord, HedgeError> {
        let now = Utc::now();
        let record = VersusRecord {
            id: VersusId::generate(),
            account_a: new.account_a,
            account_b: new.account_b,
            symbol: new.symbol.to_uppercase(),
            lots: new.lots,
            side: new.side,
            tp_usd_a: new.tp_usd_a,
            sl_usd_a: new.sl_usd_a,
            tp_usd_b: new.tp_usd_b,
            sl_usd_b: new.sl_usd_b,
            status: VersusStatus::Pending,
            created_at: now,
            updated_at: now,
            scheduled_congelar: new.scheduled_congelar,
            scheduled_transferir: new.scheduled_transferir,
            tickets_a: Vec::new(),
            tickets_b: Vec::new(),
            error_message: None,
            holder_a: new.holder_a,
            prop_firm_a: new.prop_firm_a,
            holder_b: new.holder_b,
            prop_firm_b: new.prop_firm_b,
        };

        let mut inner = self.lock();
        inner
            .records
            .insert(record.id.as_str().to_string(), record.clone());
        inner.order.push(record.id.as_str().to_string());
        self.persist(&inner)?;
        info!(
            id = %record.id, account_a = record.account_a, account_b = record.account_b,
            side = %record.side, lots = record.lots, symbol = %record.symbol,
            "versus created"
        );
        Ok(record)
    }

    pub fn get(&self, id: &VersusId) -> Option<VersusRecord> {
        self.lock().records.get(id.as_str()).cloned()
    }

    /// All records in insertion order.
    pub fn all(&self) -> Vec<VersusRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Move a record to `status`, optionally replacing ticket lists and the
    /// error message, then persist. Returns the updated record.
    pub fn update_status(
        &self,
        id: &VersusId,
        status: VersusStatus,
        tickets_a: Option<Vec<Ticket>>,
        tickets_b: Option<Vec<Ticket>>,
        error_message: Option<String>,
    ) -> Result<VersusRecord, HedgeError> {
        let mut inner = self.lock();
        let record = inner
            .records
            .get_mut(id.as_str())
            .ok_or_else(|| HedgeError::VersusNotFound(id.as_str().to_string()))?;

        record.status = status;
        record.updated_at = Utc::now();
        if let Some(t) = tickets_a {
            record.tickets_a = t;
        }
        if let Some(t) = tickets_b {
            record.tickets_b = t;
        }
        if error_message.is_some() {
            record.error_message = error_message;
        }
        let updated = record.clone();
        self.persist(&inner)?;
        info!(id = %id, status = %status, "versus status updated");
        Ok(updated)
    }

    pub fn delete(&self, id: &VersusId) -> Result<bool, HedgeError> {
        let mut inner = self.lock();
        if inner.records.remove(id.as_str()).is_none() {
            warn!(id = %id, "versus not found for deletion");
            return Ok(false);
        }
        inner.order.retain(|o| o != id.as_str());
        self.persist(&inner)?;
        info!(id = %id, "versus deleted");
        Ok(true)
    }

    /// Pending records whose Congelar schedule has passed, insertion order.
    pub fn due_congelar(&self, now: DateTime<Utc>) -> Vec<VersusRecord> {
        self.due(now, VersusStatus::Pending, |r| r.scheduled_congelar)
    }

    /// Congelado records whose Transferir schedule has passed, insertion order.
    pub fn due_transferir(&self, now: DateTime<Utc>) -> Vec<VersusRecord> {
        self.due(now, VersusStatus::Congelado, |r| r.scheduled_transferir)
    }

    fn due(
        &self,
        now: DateTime<Utc>,
        status: VersusStatus,
        schedule: impl Fn(&VersusRecord) -> Option<DateTime<Utc>>,
    ) -> Vec<VersusRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|r| r.status == status && schedule(r).is_some_and(|at| at <= now))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }
}
