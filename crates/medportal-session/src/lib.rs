//! # MedPortal session core
//!
//! Session lifecycle and role resolution for the MedPortal multi-role medical
//! records API (patient, doctor, laboratory and admin spaces).
//!
//! - [`SessionStore`] persists the token, the identity and the bridge-role
//!   flags across restarts.
//! - [`ProfileLoader`] resolves the role-specific profile for an identity.
//! - [`SessionManager`] runs login, registration, profile loading and logout.
//! - [`route`] maps a [`SessionSnapshot`] to the [`Screen`] to show.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use medportal_session::{
//!     route, ClientOptions, HttpApi, MemoryStorage, Portal, SessionManager, SessionStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = HttpApi::new(ClientOptions {
//!         base_url: "https://records.example.com".into(),
//!         ..Default::default()
//!     });
//!     let store = SessionStore::new(Arc::new(MemoryStorage::new()));
//!     let session = SessionManager::new(Arc::new(api), store);
//!
//!     session.login("jane@example.com", "secret", Portal::Patient).await?;
//!     let screen = route(&session.snapshot().await);
//!     println!("{:?}", screen);
//!     Ok(())
//! }
//! ```

pub mod env;
mod error;
mod profile;
mod role;
mod router;
mod session;
mod storage;
mod transport;
mod types;

pub use error::*;
pub use profile::*;
pub use role::*;
pub use router::*;
pub use session::*;
pub use storage::*;
pub use transport::*;
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;

// ─── Client Options ────────────────────────────────────────────────

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Base URL of the API server (e.g. `https://records.example.com`).
    pub base_url: String,

    /// Base path for API endpoints (default: `/api/v1`).
    pub base_path: String,

    /// HTTP request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            base_path: "/api/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientOptions {
    /// Read options from `MEDPORTAL_API_URL`, `MEDPORTAL_API_BASE_PATH` and
    /// `MEDPORTAL_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::api_url_from_env().unwrap_or(defaults.base_url),
            base_path: std::env::var("MEDPORTAL_API_BASE_PATH").unwrap_or(defaults.base_path),
            timeout_secs: std::env::var("MEDPORTAL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

// ─── HTTP transport ────────────────────────────────────────────────

/// [`ApiTransport`] over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    options: ClientOptions,
}

impl HttpApi {
    pub fn new(options: ClientOptions) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(options.timeout_secs))
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let base_url = format!(
            "{}/{}",
            options.base_url.trim_end_matches('/'),
            options.base_path.trim_matches('/')
        );

        Self {
            http,
            base_url,
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Full base URL (base_url + base_path).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map an HTTP response to a JSON body or a typed error.
    async fn handle_response(resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::network)?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| {
                ClientError::Deserialization(format!(
                    "Failed to deserialize response: {} (body: {})",
                    e,
                    truncate(&body, 200)
                ))
            });
        }

        let (code, message) = error_detail(&body);
        let message = message.or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| truncate(trimmed, 200))
        });
        Err(ClientError::from_status(status.as_u16(), code, message))
    }
}

#[async_trait]
impl ApiTransport for HttpApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let url = self.url(request.endpoint.path());
        tracing::debug!(
            method = %request.endpoint.method(),
            url = %url,
            "sending API request"
        );

        let mut builder = match request.endpoint.method() {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Put => self.http.put(&url),
        };
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(ClientError::network)?;
        Self::handle_response(resp).await
    }
}

/// Extract `(code, message)` from the common error body shapes:
/// `{"error": {"code", "message"}}`, `{"message"}`, `{"detail"}`, `{"error": "..."}`.
fn error_detail(body: &str) -> (Option<String>, Option<String>) {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };
    let as_string = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);

    if let Some(err) = v.get("error").filter(|e| e.is_object()) {
        return (as_string(err.get("code")), as_string(err.get("message")));
    }
    let message = as_string(v.get("message"))
        .or_else(|| as_string(v.get("detail")))
        .or_else(|| as_string(v.get("error")));
    (as_string(v.get("code")), message)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
