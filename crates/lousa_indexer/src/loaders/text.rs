use lousa_domain::Error;

/// Plain text and Markdown share the same path: decode as UTF-8, replacing
/// invalid sequences.
pub fn extract(bytes: &[u8]) -> Result<String, Error> {
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
