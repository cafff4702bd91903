//! # gonogo-client
//!
//! Submit a tender bundle (a ZIP of consultation documents) to the go/no-go
//! analysis service, track the submission, interpret the answer and export it.
//!
//! ## Workflow
//!
//! ```text
//! bundle.zip
//!  │
//!  ├─ 1. Select     read the file (optional ZIP-signature and size checks)
//!  ├─ 2. Submit     POST <base>/read-file, multipart field `zip_file`
//!  ├─ 3. Normalize  recognise one of three response shapes
//!  │                  per-file │ per-file + narrative │ structured analysis
//!  └─ 4. Export     narrative  → resultfinal.pdf, synthesised locally
//!                   structured → GET <base>/download-document?file_path=…
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gonogo_client::{ClientConfig, ExportOutcome, Session, WorkflowStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().output_dir("exports").build()?;
//!     let mut session = Session::new(config)?;
//!
//!     if session.analyze_file("dce.zip").await == WorkflowStatus::Succeeded {
//!         if let ExportOutcome::Saved(artifact) = session.export().await {
//!             println!("saved {}", artifact.path().display());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `gonogo` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! gonogo-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod normalize;
pub mod observer;
pub mod render;
pub mod session;
pub mod transport;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, PageLayout};
pub use error::{DecodingError, ExportError, GonogoError, SelectionError, TransportError};
pub use export::{ExportArtifact, ExportStrategy};
pub use normalize::{normalize, AnalysisResult, FileFinding, FindingValue, ResultShape, StructuredAnalysis};
pub use observer::{NoopObserver, ObserverRef, WorkflowObserver};
pub use render::render_text;
pub use session::Session;
pub use transport::{HostContext, HostSource, HttpTransport, Transport};
pub use workflow::{Controller, ExportOutcome, Submission, WorkflowStatus};
