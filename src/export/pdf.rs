//! Local PDF synthesis from the narrative summary.
//!
//! ```text
//! narrative ──▶ wrap_lines ──▶ paginate ──▶ render_pdf ──▶ persist
//!               (fixed width)  (y offset)   (lopdf, Helvetica)
//! ```
//!
//! Text is drawn with the standard Helvetica font in `WinAnsiEncoding`, which
//! covers French accents, œ, €, typographic quotes and dashes. Characters
//! outside that set are replaced by `?` before wrapping, so the lines drawn on
//! the pages are exactly the lines [`wrap_lines`] returns.

use super::{persist, ExportArtifact};
use crate::config::PageLayout;
use crate::error::ExportError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use textwrap::{Options, WrapAlgorithm};
use tracing::{debug, info};

/// Code points 0x80–0x9F of WinAnsiEncoding. 0xA0–0xFF match Latin-1.
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

/// A rendered PDF together with the lines drawn on each page.
#[derive(Debug, Clone)]
pub struct SynthesizedPdf {
    pub bytes: Vec<u8>,
    pub pages: Vec<Vec<String>>,
}

// ── Text layout ──────────────────────────────────────────────────────────

/// Wrap `text` to `columns` characters per line.
///
/// Explicit line breaks are kept (blank lines included), trailing whitespace
/// of the whole text is dropped, tabs and control characters become spaces,
/// and characters the PDF font cannot draw become `?`.
pub fn wrap_lines(text: &str, columns: usize) -> Vec<String> {
    let cleaned: String = text
        .trim_end()
        .replace("\r\n", "\n")
        .chars()
        .map(|c| match c {
            '\n' => '\n',
            c if c.is_control() => ' ',
            c if win_ansi_byte(c).is_some() => c,
            _ => '?',
        })
        .collect();

    let options = Options::new(columns.max(1)).wrap_algorithm(WrapAlgorithm::FirstFit);
    cleaned
        .split('\n')
        .flat_map(|paragraph| {
            let wrapped: Vec<String> = textwrap::wrap(paragraph, &options)
                .into_iter()
                .map(|line| line.into_owned())
                .collect();
            if wrapped.is_empty() {
                vec![String::new()]
            } else {
                wrapped
            }
        })
        .collect()
}

/// Split wrapped lines into pages.
///
/// A new page starts when the next line would cross the bottom margin.
/// Always returns at least one page.
pub fn paginate(lines: Vec<String>, layout: &PageLayout) -> Vec<Vec<String>> {
    let bottom = layout.page_height - layout.margin;
    let mut pages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut y = layout.margin;

    for line in lines {
        if y + layout.line_height > bottom && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            y = layout.margin;
        }
        current.push(line);
        y += layout.line_height;
    }
    pages.push(current);
    pages
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Lay out `narrative` and render it.
pub fn synthesize(narrative: &str, layout: &PageLayout) -> Result<SynthesizedPdf, ExportError> {
    let lines = wrap_lines(narrative, layout.wrap_columns);
    let pages = paginate(lines, layout);
    let bytes = render_pdf(&pages, layout)?;
    debug!("Synthesised {} page(s), {} bytes", pages.len(), bytes.len());
    Ok(SynthesizedPdf { bytes, pages })
}

/// Build a PDF with one page per entry of `pages`.
pub fn render_pdf(pages: &[Vec<String>], layout: &PageLayout) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for lines in pages {
        let content = page_content(lines, layout)
            .encode()
            .map_err(|e| ExportError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(layout.page_width),
                Object::Real(layout.page_height),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ExportError::Render(e.to_string()))?;
    Ok(buffer)
}

fn page_content(lines: &[String], layout: &PageLayout) -> Content {
    let first_baseline = layout.page_height - layout.margin - layout.font_size;
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Real(layout.font_size)]),
        Operation::new("TL", vec![Object::Real(layout.line_height)]),
        Operation::new(
            "Td",
            vec![Object::Real(layout.margin), Object::Real(first_baseline)],
        ),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(line))],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

/// Read back the text lines drawn on each page of a PDF produced by
/// [`render_pdf`].
pub fn page_lines(pdf: &[u8]) -> Result<Vec<Vec<String>>, ExportError> {
    let doc = Document::load_mem(pdf).map_err(|e| ExportError::Render(e.to_string()))?;
    let mut pages = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let raw = doc
            .get_page_content(page_id)
            .map_err(|e| ExportError::Render(e.to_string()))?;
        let content = Content::decode(&raw).map_err(|e| ExportError::Render(e.to_string()))?;
        let lines = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(decode_win_ansi(bytes)),
                _ => None,
            })
            .collect();
        pages.push(lines);
    }
    Ok(pages)
}

/// Render `narrative` and save it as `dir/filename`.
pub async fn save_narrative(
    narrative: &str,
    dir: &Path,
    filename: &str,
    layout: &PageLayout,
) -> Result<ExportArtifact, ExportError> {
    let pdf = synthesize(narrative, layout)?;
    let path = persist(dir, filename, &pdf.bytes).await?;
    info!("Saved {}-page PDF to {}", pdf.pages.len(), path.display());
    Ok(ExportArtifact::LocalPdf {
        path,
        pages: pdf.pages.len(),
    })
}

// ── Encoding ─────────────────────────────────────────────────────────────

fn win_ansi_byte(c: char) -> Option<u8> {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(c as u32 as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(_, ch)| *ch == c)
            .map(|(byte, _)| *byte),
    }
}

fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}

fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x7F | 0xA0..=0xFF => char::from(b),
            _ => WIN_ANSI_HIGH
                .iter()
                .find(|(byte, _)| *byte == b)
                .map(|(_, ch)| *ch)
                .unwrap_or('?'),
        })
        .collect()
}
