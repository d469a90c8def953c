mod docx;
mod pdf;
mod text;

use lousa_domain::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// The supported source formats. Selection happens on the declared content
/// type, falling back to the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Plain,
    Markdown,
}

impl DocumentFormat {
    pub fn detect(mime_type: &str, filename: &str) -> Option<Self> {
        match mime_type {
            MIME_PDF => return Some(Self::Pdf),
            MIME_DOCX => return Some(Self::Docx),
            MIME_MARKDOWN => return Some(Self::Markdown),
            MIME_TEXT => return Some(Self::Plain),
            _ => {}
        }

        let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
        match extension.as_deref() {
            Some("pdf") => Some(Self::Pdf),
            Some("docx") => Some(Self::Docx),
            Some("md") | Some("markdown") => Some(Self::Markdown),
            Some("txt") => Some(Self::Plain),
            _ => None,
        }
    }

    /// Extracts the raw text of `bytes` in this format.
    pub fn extract(&self, bytes: &[u8]) -> Result<String, Error> {
        match self {
            Self::Pdf => pdf::extract(bytes),
            Self::Docx => docx::extract(bytes),
            Self::Plain | Self::Markdown => text::extract(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn detects_by_mime_type_first() {
        let actual = DocumentFormat::detect(MIME_PDF, "notes.txt");
        let expected = Some(DocumentFormat::Pdf);
        assert_eq!(actual, expected);
    }

    #[test]
    fn falls_back_to_extension() {
        let actual = DocumentFormat::detect("application/octet-stream", "apostila.DOCX");
        let expected = Some(DocumentFormat::Docx);
        assert_eq!(actual, expected);
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let actual = DocumentFormat::detect("image/png", "foto.png");
        let expected = None;
        assert_eq!(actual, expected);
    }
}
