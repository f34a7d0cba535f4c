//! Text extraction from CV and job description files

use crate::error::{AtsGateError, Result};
use pulldown_cmark::{Event, Parser, Tag};
use std::path::Path;
use tokio::fs;

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
            AtsGateError::PdfExtraction(format!("Failed to extract text from PDF '{}': {}", path.display(), e))
        })
    }
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path).await?)
    }
}

pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let markdown = fs::read_to_string(path).await?;
        Ok(Self::plain_text(&markdown))
    }
}

impl MarkdownExtractor {
    /// Strip markup, keeping one line per block element
    pub fn plain_text(markdown: &str) -> String {
        let mut lines = Vec::new();
        let mut current = String::new();

        for event in Parser::new(markdown) {
            match event {
                Event::Text(text) | Event::Code(text) => current.push_str(&text),
                Event::SoftBreak | Event::HardBreak => current.push(' '),
                Event::Start(Tag::Item)
                | Event::End(Tag::Paragraph)
                | Event::End(Tag::Heading(..))
                | Event::End(Tag::Item)
                | Event::End(Tag::CodeBlock(_))
                | Event::End(Tag::TableCell) => {
                    let line = current.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            }
        }
        let tail = current.trim();
        if !tail.is_empty() {
            lines.push(tail.to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_plain_text() {
        let markdown = "# Jane Roe\n\nSenior **Rust** engineer.\n\n- Kubernetes\n- `PostgreSQL`\n";
        let text = MarkdownExtractor::plain_text(markdown);
        assert_eq!(text, "Jane Roe\nSenior Rust engineer.\nKubernetes\nPostgreSQL");
    }
}
