//! Remote retrieval of the server-generated document.

use super::{persist, ExportArtifact};
use crate::error::ExportError;
use crate::transport::{Transport, DOCUMENT_QUERY_KEY, DOWNLOAD_PATH};
use std::path::Path;
use tracing::info;

/// Saved name when the reference has no usable trailing segment.
pub const DEFAULT_DOCUMENT_NAME: &str = "document.docx";

/// File name for a document reference: its last `/` or `\` separated segment.
pub fn document_filename(reference: &str) -> String {
    reference
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string())
}

/// Download `reference` and save it in `dir`.
pub async fn retrieve(
    transport: &dyn Transport,
    reference: &str,
    dir: &Path,
) -> Result<ExportArtifact, ExportError> {
    let name = document_filename(reference);
    info!("Downloading '{}' as {}", reference, name);

    let response = transport
        .fetch_binary(DOWNLOAD_PATH, &[(DOCUMENT_QUERY_KEY, reference)])
        .await?;
    let path = persist(dir, &name, &response.bytes).await?;

    Ok(ExportArtifact::RemoteDocument {
        path,
        content_type: response.content_type,
        bytes: response.bytes.len(),
    })
}
