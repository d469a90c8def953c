use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// A run of text with inline emphasis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineSpan {
    pub text: String,
    pub bold: bool,
}

impl InlineSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: false }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: true }
    }
}

/// Layout blocks handed to the external PDF engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PdfBlock {
    Heading { level: u8, text: String },
    Paragraph { spans: Vec<InlineSpan> },
    Bullets { items: Vec<Vec<InlineSpan>> },
    Numbered { items: Vec<Vec<InlineSpan>> },
    PageBreak,
}

/// Structured document handed to the external PDF layout engine: a cover
/// line, a metadata line, and the body blocks.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct PdfDocumentSpec {
    pub cover: String,
    pub meta_line: String,
    pub blocks: Vec<PdfBlock>,
}

impl PdfDocumentSpec {
    pub fn new(cover: impl Into<String>, meta_line: impl Into<String>) -> Self {
        Self { cover: cover.into(), meta_line: meta_line.into(), blocks: Vec::new() }
    }
}

/// A rendered artifact as returned by the layout engine.
#[derive(Debug, Clone)]
pub struct PdfArtifact {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}
