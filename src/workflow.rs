//! Upload workflow controller.
//!
//! ```text
//!            select(file)
//!  Idle ──▶ Selecting ──▶ Submitting ──┬──▶ Succeeded ◀──┐
//!   ▲           ▲                      │        │        │ finish_export
//!   │           └──── any state ◀──────┴──▶ Failed       │
//!   │                 (re-select)               └──▶ (exporting)
//! ```
//!
//! The controller owns all transient state and exposes it only through
//! derived accessors, so combinations like "succeeded and loading" cannot be
//! represented. Network calls happen outside the controller borrow:
//! [`Controller::select`] hands out a [`PendingSubmission`], the caller sends
//! it, and [`Controller::complete`] applies the outcome. Each selection bumps a
//! generation counter; outcomes carrying an older generation are ignored,
//! which is the only form of cancellation (the request itself keeps running).
//! Exports use the same ticket scheme.

use crate::config::ClientConfig;
use crate::error::{ExportError, GonogoError, SelectionError, TransportError};
use crate::export::{self, ExportArtifact};
use crate::normalize::{normalize, AnalysisResult};
use crate::observer::ObserverRef;
use crate::transport::{MultipartPayload, RawServerResponse, RequestOptions, Transport, SUBMIT_PATH};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Local-file, empty-archive and spanned-archive signatures.
const ZIP_SIGNATURES: [&[u8; 4]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

// ── Submission ───────────────────────────────────────────────────────────

/// The file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    name: String,
    bytes: Vec<u8>,
}

impl Submission {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a bundle from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SelectionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SelectionError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle.zip".to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn is_zip(&self) -> bool {
        self.bytes.len() >= 4 && ZIP_SIGNATURES.iter().any(|sig| self.bytes[..4] == sig[..])
    }
}

/// Checks applied to a file before anything is sent. Both are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub max_bytes: Option<u64>,
    pub require_zip: bool,
}

impl SelectionPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            require_zip: config.require_zip,
        }
    }

    pub fn check(&self, file: &Submission) -> Result<(), SelectionError> {
        if let Some(limit) = self.max_bytes {
            if file.size() > limit {
                return Err(SelectionError::TooLarge {
                    name: file.name.clone(),
                    size: file.size(),
                    limit,
                });
            }
        }
        if self.require_zip && !file.is_zip() {
            return Err(SelectionError::NotAZip {
                name: file.name.clone(),
                magic: file.bytes.iter().take(4).copied().collect(),
            });
        }
        Ok(())
    }
}

// ── Status and tickets ───────────────────────────────────────────────────

/// Externally visible workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Idle,
    Selecting,
    Submitting,
    Succeeded,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Selecting => "selecting",
            WorkflowStatus::Submitting => "submitting",
            WorkflowStatus::Succeeded => "succeeded",
            WorkflowStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identifies the submission an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionTicket {
    generation: u64,
}

/// Identifies an export started from a given `Succeeded` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportTicket {
    generation: u64,
    id: u64,
}

/// A submission ready to be sent. Holds its own copy of the file so the
/// controller can be re-selected while the request is in flight.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    ticket: SubmissionTicket,
    submission: Arc<Submission>,
}

impl PendingSubmission {
    pub fn ticket(&self) -> SubmissionTicket {
        self.ticket
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    /// POST the bundle to the submit endpoint.
    pub async fn send(
        &self,
        transport: &dyn Transport,
        options: &RequestOptions,
    ) -> Result<RawServerResponse, TransportError> {
        let payload =
            MultipartPayload::bundle(self.submission.name(), self.submission.bytes().to_vec());
        transport.send(SUBMIT_PATH, payload, options).await
    }
}

/// What became of an export attempt.
#[derive(Debug)]
pub enum ExportOutcome {
    Saved(ExportArtifact),
    /// The export failed; the workflow is still `Succeeded`.
    Failed(ExportError),
    /// A new file was selected meanwhile; the outcome was dropped.
    Abandoned,
    /// No export could start: not `Succeeded`, already exporting, or nothing
    /// exportable in the result.
    Unavailable,
}

// ── Controller ───────────────────────────────────────────────────────────

enum State {
    Idle,
    Selecting,
    Submitting {
        submission: Option<Arc<Submission>>,
    },
    Succeeded {
        submission: Option<Arc<Submission>>,
        result: AnalysisResult,
        export: Option<u64>,
    },
    Failed {
        submission: Option<Arc<Submission>>,
        error: GonogoError,
    },
}

impl State {
    fn status(&self) -> WorkflowStatus {
        match self {
            State::Idle => WorkflowStatus::Idle,
            State::Selecting => WorkflowStatus::Selecting,
            State::Submitting { .. } => WorkflowStatus::Submitting,
            State::Succeeded { .. } => WorkflowStatus::Succeeded,
            State::Failed { .. } => WorkflowStatus::Failed,
        }
    }
}

/// State machine for one user's upload–analyze–export flow.
pub struct Controller {
    state: State,
    generation: u64,
    next_export: u64,
    policy: SelectionPolicy,
    observer: Option<ObserverRef>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(SelectionPolicy::default())
    }
}

impl Controller {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            state: State::Idle,
            generation: 0,
            next_export: 0,
            policy,
            observer: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut controller = Self::new(SelectionPolicy::from_config(config));
        controller.observer = config.observer.clone();
        controller
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.observer = Some(observer);
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn status(&self) -> WorkflowStatus {
        self.state.status()
    }

    /// True while a submission is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, State::Submitting { .. })
    }

    pub fn is_exporting(&self) -> bool {
        matches!(self.state, State::Succeeded { export: Some(_), .. })
    }

    /// True when the current result can be exported.
    pub fn download_available(&self) -> bool {
        match &self.state {
            State::Succeeded { result, .. } => result.is_exportable(),
            _ => false,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            State::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&GonogoError> {
        match &self.state {
            State::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn submission(&self) -> Option<&Submission> {
        match &self.state {
            State::Submitting { submission }
            | State::Succeeded { submission, .. }
            | State::Failed { submission, .. } => submission.as_deref(),
            State::Idle | State::Selecting => None,
        }
    }

    /// Number of selections so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Start a new submission, discarding everything about the previous one.
    ///
    /// Returns `None` when the file is missing or fails the selection policy;
    /// the controller is then `Failed` and nothing must be sent.
    pub fn select(&mut self, file: Option<Submission>) -> Option<PendingSubmission> {
        let Some(file) = file else {
            self.select_failed(SelectionError::NoFile);
            return None;
        };

        let submission = Arc::new(file);
        self.reset_to_submitting(Some(Arc::clone(&submission)));

        if let Err(e) = self.policy.check(&submission) {
            self.fail(e.into());
            return None;
        }

        info!(
            "Submitting '{}' ({} bytes), submission #{}",
            submission.name(),
            submission.size(),
            self.generation
        );
        Some(PendingSubmission {
            ticket: SubmissionTicket {
                generation: self.generation,
            },
            submission,
        })
    }

    /// Record a selection that produced no usable file (nothing picked, or
    /// the file could not be read).
    pub fn select_failed(&mut self, error: SelectionError) {
        self.reset_to_submitting(None);
        self.fail(error.into());
    }

    /// Apply the outcome of a sent submission.
    ///
    /// Returns `false` when the ticket belongs to a superseded submission and
    /// the outcome was ignored.
    pub fn complete(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<RawServerResponse, TransportError>,
    ) -> bool {
        let submission = match &self.state {
            State::Submitting { submission } if ticket.generation == self.generation => {
                submission.clone()
            }
            _ => {
                warn!(
                    "Ignoring outcome of superseded submission #{} (current #{})",
                    ticket.generation, self.generation
                );
                return false;
            }
        };

        let normalized = outcome
            .map_err(GonogoError::from)
            .and_then(|raw| normalize(&raw).map_err(GonogoError::from));

        match normalized {
            Ok(result) => {
                info!(
                    "Submission #{} succeeded ({:?} response)",
                    self.generation,
                    result.shape()
                );
                self.transition(State::Succeeded {
                    submission,
                    result,
                    export: None,
                });
            }
            Err(e) => self.fail(e),
        }
        true
    }

    /// Select, send and complete in one go.
    ///
    /// Holds `&mut self` across the request, so a caller that needs to
    /// re-select while the request is in flight should drive
    /// [`Controller::select`] / [`PendingSubmission::send`] /
    /// [`Controller::complete`] itself.
    pub async fn upload(
        &mut self,
        transport: &dyn Transport,
        file: Option<Submission>,
        options: &RequestOptions,
    ) -> WorkflowStatus {
        if let Some(pending) = self.select(file) {
            let outcome = pending.send(transport, options).await;
            self.complete(pending.ticket(), outcome);
        }
        self.status()
    }

    // ── Export ───────────────────────────────────────────────────────────

    /// Enter the exporting sub-state.
    ///
    /// Only possible from `Succeeded`, with an exportable result and no
    /// export already running.
    pub fn begin_export(&mut self) -> Option<ExportTicket> {
        if self.is_exporting() || !self.download_available() {
            return None;
        }
        let id = self.next_export;
        self.next_export += 1;
        if let State::Succeeded { export, .. } = &mut self.state {
            *export = Some(id);
        }
        if let Some(ref o) = self.observer {
            o.on_export_start();
        }
        Some(ExportTicket {
            generation: self.generation,
            id,
        })
    }

    /// Leave the exporting sub-state with the export's outcome.
    ///
    /// Failures are logged and returned but never change the status or the
    /// result. Outcomes of abandoned exports are dropped.
    pub fn finish_export(
        &mut self,
        ticket: ExportTicket,
        outcome: Result<ExportArtifact, ExportError>,
    ) -> ExportOutcome {
        let current = ticket.generation == self.generation
            && matches!(self.state, State::Succeeded { export: Some(id), .. } if id == ticket.id);
        if !current {
            warn!("Ignoring outcome of abandoned export #{}", ticket.id);
            return ExportOutcome::Abandoned;
        }

        if let State::Succeeded { export, .. } = &mut self.state {
            *export = None;
        }

        match outcome {
            Ok(artifact) => {
                info!("Exported {}", artifact.path().display());
                if let Some(ref o) = self.observer {
                    o.on_export_complete(artifact.path());
                }
                ExportOutcome::Saved(artifact)
            }
            Err(e) => {
                error!("Export failed: {}", e);
                if let Some(ref o) = self.observer {
                    o.on_export_error(&e.to_string());
                }
                ExportOutcome::Failed(e)
            }
        }
    }

    /// Run the export strategy that fits the current result.
    pub async fn export(&mut self, transport: &dyn Transport, config: &ClientConfig) -> ExportOutcome {
        let Some(ticket) = self.begin_export() else {
            return ExportOutcome::Unavailable;
        };
        let outcome = match self.result() {
            Some(result) => export::export(result, transport, config).await,
            None => Err(ExportError::NothingToExport),
        };
        self.finish_export(ticket, outcome)
    }

    /// Directory-independent path of the artifact the next export would
    /// write, when it can be known without a network call.
    pub fn planned_export_name(&self, config: &ClientConfig) -> Option<PathBuf> {
        let result = self.result()?;
        if result.narrative().is_some() {
            return Some(PathBuf::from(&config.pdf_filename));
        }
        result
            .document_reference()
            .map(|r| PathBuf::from(export::remote::document_filename(r)))
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn reset_to_submitting(&mut self, submission: Option<Arc<Submission>>) {
        self.generation += 1;
        self.transition(State::Selecting);
        self.transition(State::Submitting { submission });
    }

    fn fail(&mut self, error: GonogoError) {
        error!(kind = error.kind(), "Submission #{} failed: {}", self.generation, error);
        let submission = match &self.state {
            State::Submitting { submission } => submission.clone(),
            _ => None,
        };
        self.transition(State::Failed { submission, error });
    }

    fn transition(&mut self, next: State) {
        let from = self.state.status();
        let to = next.status();
        self.state = next;
        if from != to {
            if let Some(ref o) = self.observer {
                o.on_transition(from, to);
            }
        }
    }
}
