//! One user's workflow: a [`Controller`] bound to a transport and a config.

use crate::config::ClientConfig;
use crate::error::GonogoError;
use crate::transport::{HttpTransport, RequestOptions, Transport};
use crate::workflow::{Controller, ExportOutcome, Submission, WorkflowStatus};
use std::path::Path;
use std::sync::Arc;

/// High-level entry point for the library.
///
/// Calls are sequential: each `analyze*` call supersedes the previous result.
/// Drive the [`Controller`] directly for overlapping submissions.
pub struct Session {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    controller: Controller,
}

impl Session {
    /// Session over HTTP.
    pub fn new(config: ClientConfig) -> Result<Self, GonogoError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Session over any transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let controller = Controller::from_config(&config);
        Self {
            config,
            transport,
            controller,
        }
    }

    /// Read the bundle at `path` and submit it.
    pub async fn analyze_file(&mut self, path: impl AsRef<Path>) -> WorkflowStatus {
        match Submission::from_path(path).await {
            Ok(file) => self.analyze(Some(file)).await,
            Err(e) => {
                self.controller.select_failed(e);
                self.controller.status()
            }
        }
    }

    /// Submit `file`; `None` fails without any request.
    pub async fn analyze(&mut self, file: Option<Submission>) -> WorkflowStatus {
        let options = RequestOptions::from_config(&self.config);
        self.controller
            .upload(self.transport.as_ref(), file, &options)
            .await
    }

    /// Export the current result to `config.output_dir`.
    pub async fn export(&mut self) -> ExportOutcome {
        self.controller
            .export(self.transport.as_ref(), &self.config)
            .await
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }
}
