//! Plain-text rendering of an [`AnalysisResult`] for terminals.
//!
//! - `PerFile`: one block per file, headed `Résultats pour: <filename>`.
//! - `Narrative`: the per-file blocks followed by a `Synthèse` section.
//! - `Structured`: one heading per top-level section, nested values indented.

use crate::normalize::{AnalysisResult, FileFinding, StructuredAnalysis};
use serde_json::Value;
use std::fmt::Write;

/// Shown in place of `null` values.
const EMPTY_VALUE: &str = "—";

pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    match result {
        AnalysisResult::PerFile { findings } => write_findings(&mut out, findings),
        AnalysisResult::Narrative {
            findings,
            narrative,
        } => {
            write_findings(&mut out, findings);
            write_heading(&mut out, "Synthèse");
            out.push_str(narrative.trim_end());
            out.push('\n');
        }
        AnalysisResult::Structured(analysis) => write_structured(&mut out, analysis),
    }
    out
}

fn write_findings(out: &mut String, findings: &[FileFinding]) {
    for finding in findings {
        let _ = writeln!(out, "Résultats pour: {}", finding.filename);
        out.push_str(finding.info.display_text().trim_end());
        out.push_str("\n\n");
    }
}

fn write_structured(out: &mut String, analysis: &StructuredAnalysis) {
    if let Some(ref message) = analysis.message {
        let _ = writeln!(out, "{message}\n");
    }
    for (name, value) in &analysis.sections {
        write_heading(out, name);
        write_value(out, value, 0);
        out.push('\n');
    }
    let _ = writeln!(out, "Document: {}", analysis.document);
}

fn write_heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}\n{}", "-".repeat(title.chars().count()));
}

fn write_value(out: &mut String, value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Array(items) if items.is_empty() => {
            let _ = writeln!(out, "{pad}{EMPTY_VALUE}");
        }
        Value::Array(items) => {
            for item in items {
                if is_composite(item) {
                    let _ = writeln!(out, "{pad}-");
                    write_value(out, item, indent + 1);
                } else {
                    let _ = writeln!(out, "{pad}- {}", scalar_text(item));
                }
            }
        }
        Value::Object(map) if map.is_empty() => {
            let _ = writeln!(out, "{pad}{EMPTY_VALUE}");
        }
        Value::Object(map) => {
            for (key, item) in map {
                if is_composite(item) {
                    let _ = writeln!(out, "{pad}{key}:");
                    write_value(out, item, indent + 1);
                } else {
                    let _ = writeln!(out, "{pad}{key}: {}", scalar_text(item));
                }
            }
        }
        scalar => {
            let _ = writeln!(out, "{pad}{}", scalar_text(scalar));
        }
    }
}

fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => EMPTY_VALUE.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_value;
    use serde_json::json;

    #[test]
    fn per_file_blocks() {
        let result = normalize_value(json!({
            "results": [
                { "filename": "rc.pdf", "info": "Règlement de consultation" },
                { "filename": "ccap.pdf", "info": { "penalites": true } }
            ]
        }))
        .unwrap();
        let text = render_text(&result);
        assert!(text.starts_with("Résultats pour: rc.pdf\nRèglement de consultation\n\n"));
        assert!(text.contains("Résultats pour: ccap.pdf\n{"));
        assert!(text.contains("\"penalites\": true"));
        assert!(!text.contains("Synthèse"));
    }

    #[test]
    fn narrative_adds_synthesis() {
        let result = normalize_value(json!({
            "results": [{ "filename": "a.txt", "info": "ok" }],
            "final_results": "Résumé\n"
        }))
        .unwrap();
        assert_eq!(
            render_text(&result),
            "Résultats pour: a.txt\nok\n\nSynthèse\n--------\nRésumé\n"
        );
    }

    #[test]
    fn structured_sections_in_order() {
        let result = normalize_value(json!({
            "message": "Analyse terminée",
            "chatgpt_analysis": {
                "BU": "Accueil",
                "Critères d'attribution": [
                    { "critère": "Prix", "pondération": 60 },
                    { "critère": "Technique", "pondération": 40 }
                ],
                "Pénalités": null,
                "Lots": []
            },
            "word_document": "/tmp/out/report_123.docx"
        }))
        .unwrap();
        let text = render_text(&result);
        let expected = "\
Analyse terminée

BU
--
Accueil

Critères d'attribution
----------------------
-
  critère: Prix
  pondération: 60
-
  critère: Technique
  pondération: 40

Pénalités
---------
—

Lots
----
—

Document: /tmp/out/report_123.docx
";
        assert_eq!(text, expected);
    }
}
