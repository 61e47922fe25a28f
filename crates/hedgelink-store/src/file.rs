//! Read-or-default loading and atomic write-replace of JSON documents.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use hedgelink_core::HedgeError;

/// Load `path` as JSON, or return `T::default()` when the file is missing
/// or unreadable. A corrupt store file is logged and treated as empty.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => {
                info!(path = %path.display(), "loaded store file");
                value
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store file corrupt; starting empty");
                T::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store file unreadable; starting empty");
            T::default()
        }
    }
}

/// Serialise `value` pretty-printed and replace `path` atomically: write a
/// sibling temp file, then rename over the target. Readers never observe a
/// half-written document.
pub fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), HedgeError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| HedgeError::Storage(e.to_string()))?;
        }
    }
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| HedgeError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| HedgeError::Storage(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| HedgeError::Storage(e.to_string()))?;
    Ok(())
}
