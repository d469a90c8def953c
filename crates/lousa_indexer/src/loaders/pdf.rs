use lousa_domain::Error;
use tracing::debug;

/// Extracts plain text from a PDF buffer.
///
/// The whole extraction works on the in-memory buffer; nothing is written to
/// disk. pdf-extract may print "Unicode mismatch" notes to stderr for
/// ligature-heavy documents; those are harmless.
pub fn extract(bytes: &[u8]) -> Result<String, Error> {
    if !is_pdf(bytes) {
        return Err(Error::Loader("buffer is not a PDF document".to_string()));
    }

    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::Loader(format!("invalid PDF structure: {e}")))?;
    debug!(pages = document.get_pages().len(), "Extracting PDF text");

    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Loader(format!("PDF extraction failed: {e}")))
}

/// Magic-byte check: `%PDF`.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[0..4] == b"%PDF"
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn magic_bytes_identify_pdfs() {
        let actual = (is_pdf(b"%PDF-1.7 ..."), is_pdf(b"plain text"), is_pdf(b""));
        let expected = (true, false, false);
        assert_eq!(actual, expected);
    }

    #[test]
    fn non_pdf_bytes_fail_with_loader_error() {
        let actual = extract(b"not a pdf at all");
        assert!(matches!(actual, Err(Error::Loader(_))));
    }
}
