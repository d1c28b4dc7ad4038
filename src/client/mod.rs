//! Transports to the server of record: the REST endpoints and the push
//! channel.

mod api;
mod csrf;
mod error;
mod push;

pub use api::{ApiSettings, HttpNotificationApi, NotificationApi, DEFAULT_NOTIFICATIONS_PATH};
pub use csrf::{cookie_value, CsrfSource, CSRF_HEADER, DEFAULT_CSRF_COOKIE};
pub use error::{ApiError, PushError};
pub use push::{notifications_socket_url, websocket_base, PushChannel, PushEvent, PushHandle};
