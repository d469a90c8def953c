use std::io::Read;

use lousa_domain::Error;
use quick_xml::events::Event;

/// Decompressed size cap for `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts plain text from a DOCX buffer by streaming the `w:t` text nodes
/// out of `word/document.xml`. Paragraph ends become newlines, tabs and
/// breaks become spaces.
pub fn extract(bytes: &[u8]) -> Result<String, Error> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::Loader(format!("not a DOCX archive: {e}")))?;

    let mut document_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| Error::Loader("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut document_xml)
            .map_err(|e| Error::Loader(format!("failed to read document.xml: {e}")))?;
        if document_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(Error::Loader(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    collect_text_nodes(&document_xml)
}

fn collect_text_nodes(xml: &[u8]) -> Result<String, Error> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" | b"br" => out.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Loader(format!("malformed document.xml: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Loader(format!("malformed document.xml: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn collects_w_t_text_with_paragraph_breaks() {
        let fixture = br#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Primeiro</w:t></w:r></w:p>
                <w:p><w:r><w:t>Segundo</w:t><w:tab/><w:t>trecho</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;

        let actual = collect_text_nodes(fixture).unwrap();
        let expected = "Primeiro\nSegundo trecho\n";
        assert_eq!(actual, expected);
    }

    #[test]
    fn non_zip_bytes_fail_with_loader_error() {
        let actual = extract(b"definitely not a zip");
        assert!(matches!(actual, Err(Error::Loader(_))));
    }
}
