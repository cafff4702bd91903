//! Error types for the gonogo-client library.
//!
//! Four families mirror the four places a submission can go wrong:
//!
//! * [`SelectionError`]: no usable file at submit time (nothing is sent).
//! * [`TransportError`]: the request never produced a 2xx response.
//! * [`DecodingError`]: the response matched none of the known shapes.
//! * [`ExportError`]: the secondary download/export action failed.
//!
//! The first three end the workflow in `Failed`; [`ExportError`] is contained
//! by the exporter and never changes the workflow status. End users only ever
//! see [`USER_FACING_ERROR`]; the detailed variants are for logs.

use std::path::PathBuf;
use thiserror::Error;

/// The single message shown to end users whatever went wrong.
pub const USER_FACING_ERROR: &str = "Erreur lors du traitement du fichier. Veuillez réessayer.";

/// All errors that can end a submission, plus configuration errors.
#[derive(Debug, Error)]
pub enum GonogoError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GonogoError {
    /// Stable label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GonogoError::Selection(_) => "selection",
            GonogoError::Transport(_) => "transport",
            GonogoError::Decoding(_) => "decoding",
            GonogoError::Export(_) => "export",
            GonogoError::InvalidConfig(_) => "config",
        }
    }

    /// What the user is told. The taxonomy stays in the logs.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_ERROR
    }
}

/// No usable file when the submission was triggered.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("No file selected")]
    NoFile,

    #[error("Cannot read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload does not start with a ZIP local-file or empty-archive header.
    #[error("'{name}' is not a ZIP archive\nFirst bytes: {magic:?}")]
    NotAZip { name: String, magic: Vec<u8> },

    #[error("'{name}' is {size} bytes, above the {limit}-byte upload limit")]
    TooLarge { name: String, size: u64, limit: u64 },
}

/// The request did not produce a usable 2xx response.
///
/// The body of a failed response is never interpreted here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Request to '{url}' failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// The response matched none of the recognised shapes.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("Response body is not valid JSON: {detail}")]
    Malformed { detail: String },

    #[error("Response body is null")]
    Null,

    /// The service answered 2xx but wrapped an error in its body.
    #[error("Service reported an error: {message}")]
    ServiceReported { message: String },

    /// Fields from more than one response shape are present.
    #[error("Response mixes fields of several shapes: {fields:?}")]
    Ambiguous { fields: Vec<String> },

    #[error("Response matches no known shape (top-level fields: {fields:?})")]
    UnrecognisedShape { fields: Vec<String> },

    #[error("Field '{field}' has the wrong type: expected {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },
}

/// A download/export attempt failed. Never changes the workflow status.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The current result carries neither a narrative nor a document reference.
    #[error("Nothing to export: the result has no narrative and no document reference")]
    NothingToExport,

    #[error("Document download failed: {0}")]
    Transport(#[from] TransportError),

    #[error("PDF generation failed: {0}")]
    Render(String),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
