//! Configuration for the upload–analyze–export workflow.
//!
//! Every knob lives in [`ClientConfig`], built via [`ClientConfigBuilder`].
//! Defaults match the production deployment: endpoint resolved from the
//! execution host, no request timeout, no client-side size or format check,
//! PDF exported as `resultfinal.pdf` in the current directory.

use crate::error::GonogoError;
use crate::observer::ObserverRef;
use crate::transport::HostSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// File name of the locally synthesised PDF.
pub const DEFAULT_PDF_FILENAME: &str = "resultfinal.pdf";

/// MIME type attached to the uploaded bundle part.
pub const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "application/zip";

/// Configuration for a [`crate::session::Session`].
///
/// # Example
/// ```rust
/// use gonogo_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8000/")
///     .output_dir("exports")
///     .max_upload_bytes(10 * 1024 * 1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.pdf_filename, "resultfinal.pdf");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Explicit service base URL. Overrides host-based resolution when set.
    pub base_url: Option<String>,

    /// Where the execution host is read from. Re-evaluated on every request.
    pub host: HostSource,

    /// Per-request timeout in seconds. Default: none, a hung request keeps the
    /// workflow in `Submitting` until a new file is selected.
    pub request_timeout_secs: Option<u64>,

    /// Client-side upload limit in bytes. Default: none.
    pub max_upload_bytes: Option<u64>,

    /// Reject payloads that do not start with a ZIP signature. Default: false,
    /// the file is sent as picked.
    pub require_zip: bool,

    /// MIME type of the uploaded file part. Default: `application/zip`.
    pub upload_content_type: String,

    /// Directory exported artifacts are written to. Default: `.`.
    pub output_dir: PathBuf,

    /// File name of the locally synthesised PDF. Default: `resultfinal.pdf`.
    pub pdf_filename: String,

    /// Page geometry used by the PDF synthesiser.
    pub layout: PageLayout,

    /// Workflow event callback.
    pub observer: Option<ObserverRef>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            host: HostSource::default(),
            request_timeout_secs: None,
            max_upload_bytes: None,
            require_zip: false,
            upload_content_type: DEFAULT_UPLOAD_CONTENT_TYPE.to_string(),
            output_dir: PathBuf::from("."),
            pdf_filename: DEFAULT_PDF_FILENAME.to_string(),
            layout: PageLayout::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("require_zip", &self.require_zip)
            .field("upload_content_type", &self.upload_content_type)
            .field("output_dir", &self.output_dir)
            .field("pdf_filename", &self.pdf_filename)
            .field("layout", &self.layout)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn WorkflowObserver>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn host(mut self, host: HostSource) -> Self {
        self.config.host = host;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = Some(bytes);
        self
    }

    pub fn require_zip(mut self, v: bool) -> Self {
        self.config.require_zip = v;
        self
    }

    pub fn upload_content_type(mut self, mime: impl Into<String>) -> Self {
        self.config.upload_content_type = mime.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn pdf_filename(mut self, name: impl Into<String>) -> Self {
        self.config.pdf_filename = name.into();
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn observer(mut self, observer: ObserverRef) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, GonogoError> {
        let c = &self.config;
        if let Some(ref url) = c.base_url {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| GonogoError::InvalidConfig(format!("base URL '{url}': {e}")))?;
            if parsed.cannot_be_a_base() {
                return Err(GonogoError::InvalidConfig(format!(
                    "base URL '{url}' cannot be used as a base"
                )));
            }
        }
        if c.request_timeout_secs == Some(0) {
            return Err(GonogoError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == Some(0) {
            return Err(GonogoError::InvalidConfig(
                "upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.pdf_filename.trim().is_empty()
            || c.pdf_filename.contains(|ch| ch == '/' || ch == '\\')
            || c.pdf_filename == "."
            || c.pdf_filename == ".."
        {
            return Err(GonogoError::InvalidConfig(format!(
                "PDF file name must be a bare file name, got '{}'",
                c.pdf_filename
            )));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

/// Page geometry for the locally synthesised PDF, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    /// Applied to the top, bottom and left edges.
    pub margin: f32,
    pub font_size: f32,
    /// Vertical advance per line.
    pub line_height: f32,
    /// Fixed wrap width, in characters.
    pub wrap_columns: usize,
}

impl Default for PageLayout {
    /// A4 portrait, 11 pt Helvetica.
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin: 40.0,
            font_size: 11.0,
            line_height: 14.0,
            wrap_columns: 90,
        }
    }
}

impl PageLayout {
    /// Number of lines that fit on one page.
    pub fn lines_per_page(&self) -> usize {
        let usable = self.page_height - 2.0 * self.margin;
        (usable / self.line_height).floor().max(1.0) as usize
    }

    fn validate(&self) -> Result<(), GonogoError> {
        if self.wrap_columns == 0 {
            return Err(GonogoError::InvalidConfig("wrap width must be ≥ 1 column".into()));
        }
        if !(self.font_size > 0.0 && self.line_height > 0.0) {
            return Err(GonogoError::InvalidConfig(
                "font size and line height must be positive".into(),
            ));
        }
        if self.page_height - 2.0 * self.margin < self.line_height
            || self.page_width <= 2.0 * self.margin
        {
            return Err(GonogoError::InvalidConfig(format!(
                "page {}x{} with margin {} leaves no room for a line",
                self.page_width, self.page_height, self.margin
            )));
        }
        Ok(())
    }
}
