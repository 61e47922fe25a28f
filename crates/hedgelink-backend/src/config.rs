//! Strongly-typed backend configuration.
//!
//! Loaded from one JSON document; every field has a default so a minimal
//! deployment only lists its agents. Secrets ship with obviously-unsafe
//! defaults that operators must replace.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use hedgelink_core::AgentEndpoint;

fn default_listen_host() -> String {
    "0.0.0.0".into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_agent_timeout_secs() -> u64 {
    10
}
fn default_cache_ttl_secs() -> u64 {
    60
}
fn default_recovery_threshold() -> u32 {
    2
}
fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_phase_file() -> String {
    "phases.json".into()
}
fn default_vs_file() -> String {
    "vs_groups.json".into()
}
fn default_versus_file() -> String {
    "versus.json".into()
}
fn default_trade_history_file() -> String {
    "trade_history.json".into()
}
fn default_auth_secret() -> String {
    "hedgelink-dev-secret-change-me".into()
}
fn default_token_ttl_hours() -> i64 {
    24
}
fn default_login_password() -> String {
    "change-me".into()
}

/// Settings for the external spreadsheet sink process. The backend only
/// carries them; the sink itself runs elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpreadsheetSinkConfig {
    pub credentials_file: String,
    pub spreadsheet_id: String,
    #[serde(default)]
    pub worksheet: Option<String>,
}

/// Settings for the external chat-notification sink process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSinkConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// The agent fleet. An empty list is legal but serves nothing.
    #[serde(default)]
    pub agents: Vec<AgentEndpoint>,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_phase_file")]
    pub phase_file: String,
    #[serde(default = "default_vs_file")]
    pub vs_file: String,
    #[serde(default = "default_versus_file")]
    pub versus_file: String,
    #[serde(default = "default_trade_history_file")]
    pub trade_history_file: String,

    #[serde(default = "default_auth_secret")]
    pub auth_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_login_password")]
    pub login_password: String,

    #[serde(default)]
    pub trading_enabled: bool,
    #[serde(default)]
    pub versus_enabled: bool,

    #[serde(default)]
    pub spreadsheet: Option<SpreadsheetSinkConfig>,
    #[serde(default)]
    pub chat: Option<ChatSinkConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("all config fields have defaults")
    }
}

impl BackendConfig {
    /// Load from `path`. A missing file yields the defaults; a present but
    /// invalid file is a startup error, not something to limp past.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn phase_path(&self) -> PathBuf {
        self.data_dir.join(&self.phase_file)
    }
    pub fn vs_path(&self) -> PathBuf {
        self.data_dir.join(&self.vs_file)
    }
    pub fn versus_path(&self) -> PathBuf {
        self.data_dir.join(&self.versus_file)
    }
    pub fn trade_history_path(&self) -> PathBuf {
        self.data_dir.join(&self.trade_history_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_a_full_config() {
        let config = BackendConfig::default();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.recovery_threshold, 2);
        assert_eq!(config.token_ttl_hours, 24);
        assert!(!config.trading_enabled);
        assert!(!config.versus_enabled);
        assert!(config.agents.is_empty());
        assert!(config.spreadsheet.is_none());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        std::fs::write(
            &path,
            r#"{
                "listen_port": 9000,
                "versus_enabled": true,
                "agents": [{ "name": "vps1", "url": "http://vps1:9100" }]
            }"#,
        )
        .unwrap();
        let config = BackendConfig::load(&path).unwrap();
        assert_eq!(config.listen_port, 9000);
        assert!(config.versus_enabled);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.listen_host, "0.0.0.0");
    }

    #[test]
    fn missing_file_is_defaults_and_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BackendConfig::load(&dir.path().join("absent.json")).is_ok());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ nope").unwrap();
        assert!(BackendConfig::load(&bad).is_err());
    }

    #[test]
    fn store_paths_land_under_the_data_dir() {
        let config = BackendConfig::default();
        assert_eq!(config.phase_path(), PathBuf::from("data/phases.json"));
        assert_eq!(config.versus_path(), PathBuf::from("data/versus.json"));
    }
}
