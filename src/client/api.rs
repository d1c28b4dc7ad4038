//! REST client for the notifications endpoints of the server of record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::csrf::{CsrfSource, CSRF_HEADER, DEFAULT_CSRF_COOKIE};
use super::error::ApiError;
use crate::notifications::{HistoricalInput, ServerStatus};

pub const DEFAULT_NOTIFICATIONS_PATH: &str = "/notifications/";

/// Server of record operations used by the feed session.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch stored notifications, newest first.
    async fn fetch_notifications(&self) -> Result<Vec<HistoricalInput>, ApiError>;

    /// Mark one notification as read.
    async fn mark_as_read(&self, id: &str) -> Result<ServerStatus, ApiError>;

    /// Mark every notification of the user as read.
    async fn mark_all_as_read(&self) -> Result<ServerStatus, ApiError>;
}

#[derive(Debug, Deserialize)]
struct NotificationsResponse {
    /// Kept raw so each entry is converted on its own.
    #[serde(default)]
    notifications: Vec<Value>,
}

impl NotificationsResponse {
    fn into_inputs(self) -> Vec<HistoricalInput> {
        self.notifications
            .into_iter()
            .map(HistoricalInput::from_value)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: ServerStatus,
}

/// Connection settings for [`HttpNotificationApi`].
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub notifications_path: String,
    /// Cookies to seed the jar with, e.g. `sessionid=...`.
    pub cookies: Vec<String>,
    pub csrf_cookie_name: String,
    pub csrf_token: Option<String>,
    pub request_timeout_sec: Option<u64>,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            notifications_path: DEFAULT_NOTIFICATIONS_PATH.to_string(),
            cookies: Vec::new(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_token: None,
            request_timeout_sec: None,
        }
    }
}

/// HTTP implementation with a cookie jar for session and CSRF cookies.
pub struct HttpNotificationApi {
    client: reqwest::Client,
    jar: Arc<Jar>,
    /// Scope used to look up the CSRF cookie.
    csrf_scope: Url,
    notifications_url: String,
    csrf: CsrfSource,
}

impl HttpNotificationApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base = settings.base_url.trim_end_matches('/').to_string();
        let base_url: Url = base
            .parse()
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;

        let jar = Arc::new(Jar::default());
        for cookie in &settings.cookies {
            jar.add_cookie_str(cookie, &base_url);
        }

        let mut builder = reqwest::Client::builder().cookie_provider(jar.clone());
        if let Some(timeout) = settings.request_timeout_sec {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder.build()?;

        let notifications_url = format!(
            "{}{}",
            base,
            normalize_path(&settings.notifications_path)
        );
        let csrf_scope = notifications_url
            .parse()
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", notifications_url, e)))?;
        Ok(Self {
            client,
            jar,
            csrf_scope,
            notifications_url,
            csrf: CsrfSource::new(settings.csrf_cookie_name, settings.csrf_token),
        })
    }

    pub fn notifications_url(&self) -> &str {
        &self.notifications_url
    }

    /// CSRF token for the next mutating request. Without a token cookie the
    /// notifications page is fetched once so the server can set it.
    async fn csrf_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.csrf.token(&self.jar, &self.csrf_scope) {
            return Ok(token);
        }
        debug!("No CSRF cookie yet, priming from {}", self.notifications_url);
        let response = self.client.get(&self.notifications_url).send().await?;
        check_status(response).await?;
        self.csrf
            .token(&self.jar, &self.csrf_scope)
            .ok_or(ApiError::MissingCsrfToken)
    }

    async fn post_status(&self, url: String) -> Result<ServerStatus, ApiError> {
        let token = self.csrf_token().await?;

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(CSRF_HEADER, token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let body: StatusResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;
        Ok(body.status)
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_notifications(&self) -> Result<Vec<HistoricalInput>, ApiError> {
        debug!("GET {}", self.notifications_url);
        let response = self.client.get(&self.notifications_url).send().await?;
        let body: NotificationsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;
        Ok(body.into_inputs())
    }

    async fn mark_as_read(&self, id: &str) -> Result<ServerStatus, ApiError> {
        let url = format!(
            "{}{}/mark-as-read/",
            self.notifications_url,
            urlencoding::encode(id)
        );
        self.post_status(url).await
    }

    async fn mark_all_as_read(&self) -> Result<ServerStatus, ApiError> {
        let url = format!("{}mark-all-as-read/", self.notifications_url);
        self.post_status(url).await
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Ensure the path has a leading and trailing slash.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
