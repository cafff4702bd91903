//! Artifact export.
//!
//! | Result shape | Strategy | Network | Saved as |
//! |---|---|---|---|
//! | `Narrative` | [`pdf`] local synthesis | none | `config.pdf_filename` |
//! | `Structured` | [`remote`] retrieval | `GET download-document` | trailing segment of `word_document` |
//! | `PerFile` | none | none | nothing to export |
//!
//! Artifacts are written to a temporary file in the target directory and then
//! renamed, so a failed export never leaves a truncated file behind.

pub mod pdf;
pub mod remote;

use crate::config::ClientConfig;
use crate::error::ExportError;
use crate::normalize::AnalysisResult;
use crate::transport::Transport;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which export path a result takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStrategy {
    LocalSynthesis,
    RemoteRetrieval,
}

impl ExportStrategy {
    /// `None` when the result has nothing exportable.
    pub fn for_result(result: &AnalysisResult) -> Option<Self> {
        if result.narrative().is_some() {
            Some(ExportStrategy::LocalSynthesis)
        } else if result.document_reference().is_some() {
            Some(ExportStrategy::RemoteRetrieval)
        } else {
            None
        }
    }
}

/// A file saved by an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportArtifact {
    /// PDF synthesised from the narrative.
    LocalPdf { path: PathBuf, pages: usize },
    /// Document fetched from the service.
    RemoteDocument {
        path: PathBuf,
        content_type: Option<String>,
        bytes: usize,
    },
}

impl ExportArtifact {
    pub fn path(&self) -> &Path {
        match self {
            ExportArtifact::LocalPdf { path, .. } | ExportArtifact::RemoteDocument { path, .. } => {
                path
            }
        }
    }
}

/// Export `result` into `config.output_dir` with the strategy its shape calls for.
pub async fn export(
    result: &AnalysisResult,
    transport: &dyn Transport,
    config: &ClientConfig,
) -> Result<ExportArtifact, ExportError> {
    match ExportStrategy::for_result(result) {
        Some(ExportStrategy::LocalSynthesis) => {
            let narrative = result.narrative().unwrap_or_default();
            pdf::save_narrative(narrative, &config.output_dir, &config.pdf_filename, &config.layout)
                .await
        }
        Some(ExportStrategy::RemoteRetrieval) => {
            let reference = result.document_reference().unwrap_or_default();
            remote::retrieve(transport, reference, &config.output_dir).await
        }
        None => Err(ExportError::NothingToExport),
    }
}

/// Write `bytes` to `dir/name` atomically, creating `dir` if needed.
pub(crate) async fn persist(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    let path = dir.join(name);
    let write_err = |source: std::io::Error| ExportError::Write {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let dir_owned = dir.to_path_buf();
    let target = path.clone();
    let data = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir_owned)?;
        tmp.write_all(&data)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| write_err(std::io::Error::other(e.to_string())))?
    .map_err(write_err)?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_value;
    use serde_json::json;

    #[test]
    fn strategy_follows_shape() {
        let narrative = normalize_value(json!({
            "results": [], "final_results": "Synthèse"
        }))
        .unwrap();
        assert_eq!(
            ExportStrategy::for_result(&narrative),
            Some(ExportStrategy::LocalSynthesis)
        );

        let structured = normalize_value(json!({
            "message": "ok",
            "chatgpt_analysis": {},
            "word_document": "out/report.docx"
        }))
        .unwrap();
        assert_eq!(
            ExportStrategy::for_result(&structured),
            Some(ExportStrategy::RemoteRetrieval)
        );

        let per_file = normalize_value(json!({ "results": [] })).unwrap();
        assert_eq!(ExportStrategy::for_result(&per_file), None);
    }

    #[tokio::test]
    async fn persist_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("exports").join("today");

        let path = persist(&nested, "out.bin", b"first").await.unwrap();
        assert_eq!(path, nested.join("out.bin"));
        persist(&nested, "out.bin", b"second").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(&nested).unwrap().count();
        assert_eq!(leftovers, 1, "temporary file left behind");
    }

    #[test]
    fn artifact_serialises_with_kind_tag() {
        let artifact = ExportArtifact::LocalPdf {
            path: PathBuf::from("resultfinal.pdf"),
            pages: 2,
        };
        let v = serde_json::to_value(&artifact).unwrap();
        assert_eq!(v["kind"], "local_pdf");
        assert_eq!(v["pages"], 2);
    }
}
