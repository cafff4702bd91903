//! Transport adapter: endpoint resolution and the two HTTP calls the
//! workflow makes.
//!
//! The [`Transport`] trait is the seam between the workflow and the network.
//! [`HttpTransport`] is the reqwest implementation; tests plug in their own.
//!
//! ## Endpoint resolution
//!
//! ```text
//! base_url set in config ───────────────▶ base_url
//! host = Browser { "localhost" } ───────▶ http://localhost:8000/
//! host = Browser { other } | Headless ──▶ https://api.emplica.fr/
//! ```
//!
//! The host is read again on every call, never cached at construction.

use crate::config::ClientConfig;
use crate::error::{GonogoError, TransportError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Production service root.
pub const PRODUCTION_BASE_URL: &str = "https://api.emplica.fr/";

/// Local development service root, used when the host is `localhost`.
pub const LOCAL_BASE_URL: &str = "http://localhost:8000/";

/// Submission endpoint, relative to the base URL.
pub const SUBMIT_PATH: &str = "read-file";

/// Document download endpoint, relative to the base URL.
pub const DOWNLOAD_PATH: &str = "download-document";

/// Multipart field carrying the bundle.
pub const UPLOAD_FIELD: &str = "zip_file";

/// Query parameter carrying the document reference.
pub const DOCUMENT_QUERY_KEY: &str = "file_path";

/// Environment variable read by [`HostSource::Environment`].
pub const HOST_ENV_VAR: &str = "GONOGO_HOST";

// ── Host context ─────────────────────────────────────────────────────────

/// The execution context the endpoint is resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostContext {
    /// A host name is available (the page's host in a browser, or the value
    /// of [`HOST_ENV_VAR`] for the CLI).
    Browser { hostname: String },
    /// No host information at all.
    Headless,
}

impl HostContext {
    /// Service root for this context.
    pub fn base_url(&self) -> &'static str {
        match self {
            HostContext::Browser { hostname } if hostname == "localhost" => LOCAL_BASE_URL,
            _ => PRODUCTION_BASE_URL,
        }
    }
}

/// Where [`HttpTransport`] reads the [`HostContext`] from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostSource {
    /// Read [`HOST_ENV_VAR`] on each request; unset or empty means headless.
    #[default]
    Environment,
    /// Always use this context.
    Fixed(HostContext),
}

impl HostSource {
    pub fn resolve(&self) -> HostContext {
        match self {
            HostSource::Fixed(ctx) => ctx.clone(),
            HostSource::Environment => match std::env::var(HOST_ENV_VAR) {
                Ok(h) if !h.trim().is_empty() => HostContext::Browser {
                    hostname: h.trim().to_string(),
                },
                _ => HostContext::Headless,
            },
        }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────────

/// A multipart body with exactly one file field.
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MultipartPayload {
    /// Payload for the submit endpoint (`zip_file` field).
    pub fn bundle(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: UPLOAD_FIELD.to_string(),
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// MIME type of the file part. The body's own `multipart/form-data`
    /// header, boundary included, is always generated by the client.
    pub content_type: Option<String>,
}

impl RequestOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            content_type: Some(config.upload_content_type.clone()),
        }
    }
}

/// Opaque 2xx response of the submit endpoint, handed to the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawServerResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl From<serde_json::Value> for RawServerResponse {
    fn from(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: value.to_string().into_bytes(),
        }
    }
}

/// Body and declared content type of a binary download.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryResponse {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

// ── Trait ────────────────────────────────────────────────────────────────

/// The two network capabilities the workflow needs.
///
/// Implementations do not retry and do not interpret error bodies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a multipart body to `path` (relative to the resolved base URL).
    async fn send(
        &self,
        path: &str,
        payload: MultipartPayload,
        options: &RequestOptions,
    ) -> Result<RawServerResponse, TransportError>;

    /// GET `path` with `query` and return the raw bytes.
    async fn fetch_binary(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<BinaryResponse, TransportError>;
}

// ── reqwest implementation ───────────────────────────────────────────────

/// [`Transport`] over reqwest.
///
/// Session cookies set by the service are stored and sent back on every
/// later request. No `Access-Control-Allow-*` headers are sent: they only
/// mean something coming from the server.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
    host: HostSource,
    timeout_secs: Option<u64>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, GonogoError> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| GonogoError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            host: config.host.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Resolve `path` against the base URL for the current host.
    ///
    /// The base is treated as a directory: `https://gw/gonogo` and
    /// `https://gw/gonogo/` both give `https://gw/gonogo/<path>`.
    pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let mut base = match self.base_url {
            Some(ref url) => url.clone(),
            None => self.host.resolve().base_url().to_string(),
        };
        if !base.ends_with('/') {
            base.push('/');
        }
        let url = Url::parse(&base)
            .and_then(|b| b.join(path))
            .map_err(|e| TransportError::InvalidEndpoint {
                url: format!("{base}{path}"),
                reason: e.to_string(),
            })?;
        debug!("Resolved endpoint: {}", url);
        Ok(url)
    }

    fn map_error(&self, url: &Url, e: reqwest::Error) -> TransportError {
        match self.timeout_secs {
            Some(secs) if e.is_timeout() => TransportError::Timeout {
                url: url.to_string(),
                secs,
            },
            _ => TransportError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        path: &str,
        payload: MultipartPayload,
        options: &RequestOptions,
    ) -> Result<RawServerResponse, TransportError> {
        let url = self.endpoint(path)?;

        let mut part = Part::bytes(payload.bytes).file_name(payload.file_name);
        if let Some(ref mime) = options.content_type {
            part = part
                .mime_str(mime)
                .map_err(|e| TransportError::InvalidEndpoint {
                    url: url.to_string(),
                    reason: format!("content type '{mime}': {e}"),
                })?;
        }
        let form = Form::new().part(payload.field, part);

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&url, e))?;

        Ok(RawServerResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }

    async fn fetch_binary(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<BinaryResponse, TransportError> {
        let url = self.endpoint(path)?;

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_error(&url, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&url, e))?;

        Ok(BinaryResponse {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
