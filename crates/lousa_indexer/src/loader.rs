use lousa_domain::Error;
use tracing::debug;

use crate::loaders::DocumentFormat;

/// Turns an uploaded buffer into one flattened UTF-8 string.
///
/// Dispatches on the declared content type (extension fallback) and applies
/// the normalization pipeline before returning. Never retains the input
/// buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, bytes: &[u8], mime_type: &str, filename: &str) -> Result<String, Error> {
        let format = DocumentFormat::detect(mime_type, filename)
            .ok_or_else(|| Error::UnsupportedFormat(format!("{mime_type} ({filename})")))?;

        if bytes.is_empty() {
            return Err(Error::EmptyContent);
        }

        let raw = format.extract(bytes)?;
        let text = normalize(&raw);
        if text.is_empty() {
            return Err(Error::EmptyContent);
        }

        debug!(filename, chars = text.chars().count(), "Document loaded");
        Ok(text)
    }
}

/// Cleanup applied to every extracted text before chunking: whitespace run
/// collapse, newline capping, quote normalization, page-artifact removal.
pub fn normalize(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\r' => {}
            '\u{000C}' => text.push(' '),
            '\u{2018}' | '\u{2019}' => text.push('\''),
            '\u{201C}' | '\u{201D}' => text.push('"'),
            _ => text.push(c),
        }
    }

    let mut lines = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if is_standalone_digits(trimmed) || is_page_header(trimmed) {
            continue;
        }
        let collapsed = collapse_spaces(line);
        if collapsed.trim().is_empty() {
            lines.push(String::new());
        } else {
            lines.push(collapsed);
        }
    }

    let joined = lines.join("\n");

    // cap runs of blank lines: three or more newlines become two
    let mut out = String::with_capacity(joined.len());
    let mut newline_run = 0usize;
    for c in joined.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }

    out.trim().to_string()
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut prev_space = false;
    for c in line.chars() {
        if c == ' ' || c == '\t' {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}

fn is_standalone_digits(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn is_page_header(line: &str) -> bool {
    line.strip_prefix("Page ")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}
