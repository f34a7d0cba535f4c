//! File type detection

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Text,
    Markdown,
    Json,
    Image,
    /// Base64 text, optionally a `data:` URL
    Base64,
    Unknown,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => FileType::Pdf,
            "txt" => FileType::Text,
            "md" | "markdown" => FileType::Markdown,
            "json" => FileType::Json,
            "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" => FileType::Image,
            "b64" | "base64" => FileType::Base64,
            _ => FileType::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileType::Unknown)
    }

    pub fn is_document_text(&self) -> bool {
        matches!(self, FileType::Pdf | FileType::Text | FileType::Markdown)
    }
}
