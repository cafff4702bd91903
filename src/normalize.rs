//! Response normalizer: one canonical [`AnalysisResult`] from whichever
//! shape the service answered with.
//!
//! The service contract drifted over time and carries no version marker, so
//! the shape is recognised structurally, once, at this boundary:
//!
//! | Markers present | Variant |
//! |-----------------|---------|
//! | `chatgpt_analysis` (object) + `word_document` (string) | [`AnalysisResult::Structured`] |
//! | `results` (array) + `final_results` (string) | [`AnalysisResult::Narrative`] |
//! | `results` (array) | [`AnalysisResult::PerFile`] |
//!
//! Anything else is a [`DecodingError`]; there is no best-effort result.

use crate::error::DecodingError;
use crate::transport::RawServerResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const STRUCTURED_MARKERS: [&str; 2] = ["chatgpt_analysis", "word_document"];
const PER_FILE_MARKERS: [&str; 2] = ["results", "final_results"];

/// Which response shape a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    PerFile,
    Narrative,
    Structured,
}

/// The value the service attached to one file of the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindingValue {
    Text(String),
    /// Structured record, kept as-is.
    Record(Value),
}

impl FindingValue {
    /// Text for display: strings verbatim, records as indented JSON.
    pub fn display_text(&self) -> String {
        match self {
            FindingValue::Text(s) => s.clone(),
            FindingValue::Record(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
        }
    }
}

/// One `{filename, info}` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFinding {
    pub filename: String,
    pub info: FindingValue,
}

/// The rich multi-section analysis plus the server-generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub message: Option<String>,
    pub fine_tune_id: Option<String>,
    /// Top-level named sections, in the order the service sent them.
    pub sections: Map<String, Value>,
    /// Reference passed back to the download endpoint.
    pub document: String,
}

impl StructuredAnalysis {
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }
}

/// Canonical, shape-independent result of a submission.
///
/// Exactly one shape is populated; the accessors return empty/`None` for
/// anything the active shape does not define.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AnalysisResult {
    PerFile {
        findings: Vec<FileFinding>,
    },
    Narrative {
        findings: Vec<FileFinding>,
        narrative: String,
    },
    Structured(StructuredAnalysis),
}

impl AnalysisResult {
    pub fn shape(&self) -> ResultShape {
        match self {
            AnalysisResult::PerFile { .. } => ResultShape::PerFile,
            AnalysisResult::Narrative { .. } => ResultShape::Narrative,
            AnalysisResult::Structured(_) => ResultShape::Structured,
        }
    }

    pub fn findings(&self) -> &[FileFinding] {
        match self {
            AnalysisResult::PerFile { findings } | AnalysisResult::Narrative { findings, .. } => {
                findings
            }
            AnalysisResult::Structured(_) => &[],
        }
    }

    pub fn narrative(&self) -> Option<&str> {
        match self {
            AnalysisResult::Narrative { narrative, .. } => Some(narrative),
            _ => None,
        }
    }

    pub fn document_reference(&self) -> Option<&str> {
        match self {
            AnalysisResult::Structured(s) => Some(&s.document),
            _ => None,
        }
    }

    pub fn sections(&self) -> Option<&Map<String, Value>> {
        match self {
            AnalysisResult::Structured(s) => Some(&s.sections),
            _ => None,
        }
    }

    /// True when the result carries a narrative or a document reference.
    pub fn is_exportable(&self) -> bool {
        self.narrative().is_some() || self.document_reference().is_some()
    }
}

/// Recognise the shape of `raw` and build the canonical result.
pub fn normalize(raw: &RawServerResponse) -> Result<AnalysisResult, DecodingError> {
    let value: Value =
        serde_json::from_slice(&raw.body).map_err(|e| DecodingError::Malformed {
            detail: e.to_string(),
        })?;
    normalize_value(value)
}

/// Same as [`normalize`] for an already-parsed body.
pub fn normalize_value(value: Value) -> Result<AnalysisResult, DecodingError> {
    if let Some(message) = service_error(&value) {
        return Err(DecodingError::ServiceReported { message });
    }

    let mut object = match value {
        Value::Null => return Err(DecodingError::Null),
        Value::Object(map) => map,
        _ => {
            return Err(DecodingError::UnrecognisedShape {
                fields: Vec::new(),
            })
        }
    };

    let structured = STRUCTURED_MARKERS.iter().any(|k| object.contains_key(*k));
    let per_file = PER_FILE_MARKERS.iter().any(|k| object.contains_key(*k));

    let result = match (structured, per_file) {
        (true, true) => {
            return Err(DecodingError::Ambiguous {
                fields: object.keys().cloned().collect(),
            })
        }
        (true, false) => AnalysisResult::Structured(structured_from(&mut object)?),
        (false, true) => per_file_from(&mut object)?,
        (false, false) => {
            return Err(DecodingError::UnrecognisedShape {
                fields: object.keys().cloned().collect(),
            })
        }
    };

    debug!("Recognised response shape: {:?}", result.shape());
    Ok(result)
}

/// The backend reports failures as `{"error": "..."}`, sometimes wrapped as
/// `[{"error": "..."}, 500]`, with a 2xx status.
fn service_error(value: &Value) -> Option<String> {
    let candidate = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let object = candidate.as_object()?;
    if STRUCTURED_MARKERS
        .iter()
        .chain(PER_FILE_MARKERS.iter())
        .any(|k| object.contains_key(*k))
    {
        return None;
    }
    match object.get("error")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn structured_from(object: &mut Map<String, Value>) -> Result<StructuredAnalysis, DecodingError> {
    let sections = match object.remove("chatgpt_analysis") {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(DecodingError::InvalidField {
                field: "chatgpt_analysis".into(),
                expected: "object",
            })
        }
    };
    let document = match object.remove("word_document") {
        Some(Value::String(s)) => s,
        _ => {
            return Err(DecodingError::InvalidField {
                field: "word_document".into(),
                expected: "string",
            })
        }
    };

    Ok(StructuredAnalysis {
        message: optional_string(object, "message")?,
        fine_tune_id: optional_string(object, "fine_tune_id")?,
        sections,
        document,
    })
}

fn per_file_from(object: &mut Map<String, Value>) -> Result<AnalysisResult, DecodingError> {
    let items = match object.remove("results") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(DecodingError::InvalidField {
                field: "results".into(),
                expected: "array of {filename, info}",
            })
        }
    };

    let findings = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| finding_from(i, item))
        .collect::<Result<Vec<_>, _>>()?;

    match object.remove("final_results") {
        None => Ok(AnalysisResult::PerFile { findings }),
        Some(Value::String(narrative)) => Ok(AnalysisResult::Narrative {
            findings,
            narrative,
        }),
        Some(_) => Err(DecodingError::InvalidField {
            field: "final_results".into(),
            expected: "string",
        }),
    }
}

fn finding_from(index: usize, item: Value) -> Result<FileFinding, DecodingError> {
    let mut object = match item {
        Value::Object(map) => map,
        _ => {
            return Err(DecodingError::InvalidField {
                field: format!("results[{index}]"),
                expected: "object",
            })
        }
    };

    let filename = match object.remove("filename") {
        Some(Value::String(s)) => s,
        _ => {
            return Err(DecodingError::InvalidField {
                field: format!("results[{index}].filename"),
                expected: "string",
            })
        }
    };

    let info = match object.remove("info") {
        Some(Value::String(s)) => FindingValue::Text(s),
        Some(v @ (Value::Object(_) | Value::Array(_))) => FindingValue::Record(v),
        _ => {
            return Err(DecodingError::InvalidField {
                field: format!("results[{index}].info"),
                expected: "string or record",
            })
        }
    };

    Ok(FileFinding { filename, info })
}

fn optional_string(
    object: &mut Map<String, Value>,
    field: &str,
) -> Result<Option<String>, DecodingError> {
    match object.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(DecodingError::InvalidField {
            field: field.to_string(),
            expected: "string",
        }),
    }
}
