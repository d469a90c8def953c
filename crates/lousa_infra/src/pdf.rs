use async_trait::async_trait;
use lousa_domain::{InlineSpan, PdfArtifact, PdfBlock, PdfDocumentSpec, PdfRenderer};

/// Lines of body text per rendered page.
const LINES_PER_PAGE: usize = 40;

/// Stand-in for the external PDF layout engine: renders the block document to
/// a deterministic plain-text layout with form-feed page breaks. Tests parse
/// the output; production wires a real engine behind the same trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextPdfRenderer;

fn render_spans(spans: &[InlineSpan]) -> String {
    spans
        .iter()
        .map(|span| {
            if span.bold {
                format!("**{}**", span.text)
            } else {
                span.text.clone()
            }
        })
        .collect()
}

fn render_block(block: &PdfBlock, out: &mut String) {
    match block {
        PdfBlock::Heading { level, text } => {
            out.push_str(&"#".repeat(*level as usize));
            out.push(' ');
            out.push_str(text);
            out.push('\n');
        }
        PdfBlock::Paragraph { spans } => {
            out.push_str(&render_spans(spans));
            out.push('\n');
        }
        PdfBlock::Bullets { items } => {
            for item in items {
                out.push_str("• ");
                out.push_str(&render_spans(item));
                out.push('\n');
            }
        }
        PdfBlock::Numbered { items } => {
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("{}. ", i + 1));
                out.push_str(&render_spans(item));
                out.push('\n');
            }
        }
        PdfBlock::PageBreak => out.push('\u{000C}'),
    }
}

#[async_trait]
impl PdfRenderer for PlainTextPdfRenderer {
    async fn render(&self, spec: PdfDocumentSpec) -> anyhow::Result<PdfArtifact> {
        let mut body = String::new();
        body.push_str(&spec.cover);
        body.push('\n');
        body.push_str(&spec.meta_line);
        body.push_str("\n\n");
        for block in &spec.blocks {
            render_block(block, &mut body);
        }

        let page_count: u32 = body
            .split('\u{000C}')
            .map(|segment| {
                let lines = segment.lines().count();
                lines.div_ceil(LINES_PER_PAGE).max(1) as u32
            })
            .sum();

        Ok(PdfArtifact { bytes: body.into_bytes(), page_count })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn renders_cover_meta_and_blocks() {
        let renderer = PlainTextPdfRenderer;
        let spec = PdfDocumentSpec::new("Quiz Fotossintese", "Biologia • Questionário")
            .blocks(vec![
                PdfBlock::Heading { level: 1, text: "Questões".to_string() },
                PdfBlock::Paragraph { spans: vec![InlineSpan::plain("Enunciado.")] },
            ]);

        let artifact = renderer.render(spec).await.unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.starts_with("Quiz Fotossintese\nBiologia • Questionário\n\n"));
        assert!(text.contains("# Questões"));
        assert_eq!(artifact.page_count, 1);
    }

    #[tokio::test]
    async fn page_breaks_add_pages() {
        let renderer = PlainTextPdfRenderer;
        let spec = PdfDocumentSpec::new("Doc", "meta").blocks(vec![
            PdfBlock::Paragraph { spans: vec![InlineSpan::plain("antes")] },
            PdfBlock::PageBreak,
            PdfBlock::Paragraph { spans: vec![InlineSpan::plain("depois")] },
        ]);

        let artifact = renderer.render(spec).await.unwrap();
        assert_eq!(artifact.page_count, 2);
    }
}
