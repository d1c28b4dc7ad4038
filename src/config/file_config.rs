use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::notifications::ReloadPolicy;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Connection settings (can override CLI)
    pub base_url: Option<String>,
    pub user_id: Option<String>,
    pub push_url: Option<String>,
    pub notifications_path: Option<String>,
    pub session_cookie: Option<String>,
    pub csrf_cookie_name: Option<String>,
    pub csrf_token: Option<String>,
    pub request_timeout_sec: Option<u64>,

    pub feed: Option<FeedConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub capacity: Option<usize>,
    /// "last_writer_wins" or "preserve_live"
    pub reload_policy: Option<ReloadPolicy>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
