mod file_config;

pub use file_config::{FeedConfig, FileConfig};

use anyhow::{bail, Result};

use crate::client::{
    notifications_socket_url, websocket_base, ApiSettings, PushChannel, DEFAULT_CSRF_COOKIE,
    DEFAULT_NOTIFICATIONS_PATH,
};
use crate::notifications::{FeedSettings, ReloadPolicy, MAX_FEED_SIZE};

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub base_url: Option<String>,
    pub user_id: Option<String>,
    pub push_url: Option<String>,
    pub notifications_path: String,
    pub session_cookie: Option<String>,
    pub csrf_cookie_name: String,
    pub csrf_token: Option<String>,
    pub request_timeout_sec: Option<u64>,
    pub capacity: usize,
    pub reload_policy: ReloadPolicy,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_id: None,
            push_url: None,
            notifications_path: DEFAULT_NOTIFICATIONS_PATH.to_string(),
            session_cookie: None,
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_token: None,
            request_timeout_sec: None,
            capacity: MAX_FEED_SIZE,
            reload_policy: ReloadPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    /// Push channel URL. `None` runs the feed without live updates.
    pub push_url: Option<String>,
    pub notifications_path: String,
    /// `name=value` cookie carrying the authenticated session.
    pub session_cookie: Option<String>,
    pub csrf_cookie_name: String,
    pub csrf_token: Option<String>,
    pub request_timeout_sec: Option<u64>,

    pub feed: FeedSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("base_url must be specified via --base-url or in config file")
            })?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("base_url must be an http(s) URL: {}", base_url);
        }
        let base_url = base_url.trim_end_matches('/').to_string();

        let user_id = file.user_id.or_else(|| cli.user_id.clone());
        let push_url = match file.push_url.or_else(|| cli.push_url.clone()) {
            Some(url) => Some(url),
            None => match user_id {
                Some(user_id) => {
                    let Some(ws_base) = websocket_base(&base_url) else {
                        bail!("Cannot derive a websocket URL from {}", base_url);
                    };
                    Some(notifications_socket_url(&ws_base, &user_id))
                }
                None => None,
            },
        };

        let notifications_path = file
            .notifications_path
            .unwrap_or_else(|| cli.notifications_path.clone());

        let session_cookie = file
            .session_cookie
            .or_else(|| cli.session_cookie.clone());
        if let Some(cookie) = &session_cookie {
            if !cookie.contains('=') {
                bail!("session_cookie must have the form name=value");
            }
        }

        let csrf_cookie_name = file
            .csrf_cookie_name
            .unwrap_or_else(|| cli.csrf_cookie_name.clone());
        let csrf_token = file.csrf_token.or_else(|| cli.csrf_token.clone());
        let request_timeout_sec = file.request_timeout_sec.or(cli.request_timeout_sec);

        // Feed settings - merge file config with CLI values
        let feed_file = file.feed.unwrap_or_default();
        let capacity = feed_file.capacity.unwrap_or(cli.capacity);
        if capacity == 0 {
            bail!("Feed capacity must be at least 1");
        }
        let feed = FeedSettings {
            capacity,
            reload_policy: feed_file.reload_policy.unwrap_or(cli.reload_policy),
        };

        Ok(Self {
            base_url,
            push_url,
            notifications_path,
            session_cookie,
            csrf_cookie_name,
            csrf_token,
            request_timeout_sec,
            feed,
        })
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            notifications_path: self.notifications_path.clone(),
            cookies: self.session_cookie.iter().cloned().collect(),
            csrf_cookie_name: self.csrf_cookie_name.clone(),
            csrf_token: self.csrf_token.clone(),
            request_timeout_sec: self.request_timeout_sec,
        }
    }

    pub fn push_channel(&self) -> Option<PushChannel> {
        self.push_url
            .as_ref()
            .map(|url| PushChannel::new(url.clone(), self.session_cookie.clone()))
    }
}
