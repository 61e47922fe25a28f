//! Per-account VS group labels, capped at two accounts per group.
//!
//! A Versus hedge pairs exactly two accounts; the store refuses a third
//! member for any group. Setting an empty value removes membership.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::info;

use hedgelink_core::{AccountId, HedgeError};

use crate::file::{load_or_default, save_atomic};

/// What a `update` call did, for building user-facing messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VsUpdateOutcome {
    Set(String),
    Removed,
    Unchanged,
}

pub struct VsStore {
    path: PathBuf,
    groups: Mutex<HashMap<String, String>>,
}

impl VsStore {
    pub fn open(path: PathBuf) -> Self {
        let groups = load_or_default(&path);
        Self {
            path,
            groups: Mutex::new(groups),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Group label for an account, if any.
    pub fn get(&self, id: AccountId) -> Option<String> {
        self.lock().get(&id.to_string()).cloned()
    }

    /// Set (non-empty value) or remove (empty value) an account's group.
    /// Refuses to add a third account to a group.
    pub fn update(&self, id: AccountId, value: &str) -> Result<VsUpdateOutcome, HedgeError> {
        let value = value.trim();
        let key = id.to_string();
        let mut groups = self.lock();

        if value.is_empty() {
            return if groups.remove(&key).is_some() {
                save_atomic(&self.path, &*groups)?;
                info!(account = id, "vs group removed");
                Ok(VsUpdateOutcome::Removed)
            } else {
                Ok(VsUpdateOutcome::Unchanged)
            };
        }

        let others = groups
            .iter()
            .filter(|(acc, group)| group.as_str() == value && acc.as_str() != key)
            .count();
        if others >= 2 {
            return Err(HedgeError::VsGroupFull {
                group: value.to_string(),
            });
        }

        groups.insert(key, value.to_string());
        save_atomic(&self.path, &*groups)?;
        info!(account = id, group = value, "vs group updated");
        Ok(VsUpdateOutcome::Set(value.to_string()))
    }

    pub fn all(&self) -> HashMap<String, String> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, VsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VsStore::open(dir.path().join("vs.json"));
        (dir, store)
    }

    #[test]
    fn two_accounts_per_group_is_the_ceiling() {
        let (_dir, store) = store();
        store.update(100, "G1").unwrap();
        store.update(200, "G1").unwrap();

        let err = store.update(300, "G1").unwrap_err();
        assert!(matches!(err, HedgeError::VsGroupFull { ref group } if group == "G1"));
        // The refused account gained nothing.
        assert!(store.get(300).is_none());
    }

    #[test]
    fn reassigning_a_member_is_not_a_third_account() {
        let (_dir, store) = store();
        store.update(100, "G1").unwrap();
        store.update(200, "G1").unwrap();
        // 100 already holds G1; re-setting it must not count itself.
        assert_eq!(
            store.update(100, "G1").unwrap(),
            VsUpdateOutcome::Set("G1".into())
        );
    }

    #[test]
    fn empty_value_removes_membership() {
        let (_dir, store) = store();
        store.update(100, "G1").unwrap();
        assert_eq!(store.update(100, "  ").unwrap(), VsUpdateOutcome::Removed);
        assert!(store.get(100).is_none());
        assert_eq!(store.update(100, "").unwrap(), VsUpdateOutcome::Unchanged);
    }

    #[test]
    fn freed_slot_can_be_reused() {
        let (_dir, store) = store();
        store.update(100, "G1").unwrap();
        store.update(200, "G1").unwrap();
        store.update(100, "").unwrap();
        store.update(300, "G1").unwrap();
        assert_eq!(store.get(300).as_deref(), Some("G1"));
        assert_eq!(store.all().len(), 2);
    }
}
