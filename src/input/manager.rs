//! Input manager for CV text, interview answers, frame predictions and document images

use crate::documents::features::decode_image;
use crate::documents::{DocumentSubmission, ImageSource};
use crate::emotion::fusion::{Frame, FramePrediction};
use crate::error::{AtsGateError, Result};
use crate::input::file_detector::FileType;
use crate::input::text_extractor::{MarkdownExtractor, PdfExtractor, PlainTextExtractor, TextExtractor};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct InputManager {
    cache: HashMap<PathBuf, String>,
    enable_cache: bool,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            enable_cache: true,
        }
    }

    pub fn with_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    /// Read a CV or job description as plain text
    pub async fn extract_text(&mut self, path: &Path) -> Result<String> {
        if self.enable_cache {
            if let Some(cached_text) = self.cache.get(path) {
                debug!("Using cached text for: {}", path.display());
                return Ok(cached_text.clone());
            }
        }

        ensure_exists(path)?;

        let text = match FileType::from_path(path) {
            FileType::Pdf => {
                info!("Extracting text from PDF: {}", path.display());
                PdfExtractor.extract(path).await?
            }
            FileType::Text => {
                info!("Reading plain text file: {}", path.display());
                PlainTextExtractor.extract(path).await?
            }
            FileType::Markdown => {
                info!("Processing markdown file: {}", path.display());
                MarkdownExtractor.extract(path).await?
            }
            _ => {
                return Err(AtsGateError::UnsupportedFormat(format!(
                    "Expected a pdf, txt or md file: {}",
                    path.display()
                )));
            }
        };

        if self.enable_cache {
            self.cache.insert(path.to_path_buf(), text.clone());
        }
        Ok(text)
    }

    /// Answers as a JSON array of strings or blank-line separated blocks
    pub async fn read_answers(&self, path: &Path) -> Result<Vec<String>> {
        ensure_exists(path)?;
        let content = fs::read_to_string(path).await?;
        parse_answers(&content)
    }

    /// JSON array of per-frame classifier outputs
    pub async fn read_frames(&self, path: &Path) -> Result<Vec<FramePrediction>> {
        ensure_exists(path)?;
        let content = fs::read_to_string(path).await?;
        let frames: Vec<FramePrediction> = serde_json::from_str(&content)?;
        info!("Loaded {} frame predictions from {}", frames.len(), path.display());
        Ok(frames)
    }

    /// Load every image in `dir`, ordered by file name, as grayscale frames.
    /// Files that fail to decode are skipped.
    pub async fn read_frame_images(&self, dir: &Path) -> Result<Vec<Frame>> {
        ensure_exists(dir)?;
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if FileType::from_path(&path) == FileType::Image {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = fs::read(&path).await?;
            match decode_image(&bytes) {
                Ok(image) => frames.push(Frame {
                    index: frames.len() as u64,
                    face: Some(image.to_luma8()),
                    landmarks: Vec::new(),
                }),
                Err(e) => warn!("Skipping frame {}: {}", path.display(), e),
            }
        }
        info!("Loaded {} frame images from {}", frames.len(), dir.display());
        Ok(frames)
    }

    pub async fn read_image(&self, path: &Path) -> Result<ImageSource> {
        ensure_exists(path)?;
        match FileType::from_path(path) {
            FileType::Base64 | FileType::Text => Ok(ImageSource::Base64(fs::read_to_string(path).await?)),
            // unknown extensions are left to the image decoder
            _ => Ok(ImageSource::Bytes(fs::read(path).await?)),
        }
    }

    /// Read a `type=path` document argument; a bare path has no declared type.
    pub async fn read_document(&self, spec: &str) -> Result<DocumentSubmission> {
        let (declared, path) = parse_document_arg(spec);
        let source = self.read_image(Path::new(path)).await?;
        Ok(DocumentSubmission::new(declared, source)?.with_label(path))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AtsGateError::InvalidInput(format!("File does not exist: {}", path.display())))
    }
}

pub fn parse_document_arg(spec: &str) -> (Option<&str>, &str) {
    match spec.split_once('=') {
        Some((declared, path)) if !declared.is_empty() && !declared.contains(|c: char| c == '/' || c == '\\') => {
            (Some(declared), path)
        }
        _ => (None, spec),
    }
}

pub fn parse_answers(content: &str) -> Result<Vec<String>> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut answers = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in trimmed.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                answers.push(block.join(" "));
                block.clear();
            }
        } else {
            block.push(line.trim());
        }
    }
    if !block.is_empty() {
        answers.push(block.join(" "));
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentType;
    use tempfile::TempDir;

    #[test]
    fn test_parse_answers_blocks() {
        let answers = parse_answers("First answer\ncontinues here\n\n\nSecond answer\n").unwrap();
        assert_eq!(answers, vec!["First answer continues here", "Second answer"]);
        assert!(parse_answers("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_answers_json() {
        let answers = parse_answers(r#"["one", "two\n\nparagraphs"]"#).unwrap();
        assert_eq!(answers.len(), 2);
        assert!(parse_answers("[not json").is_err());
    }

    #[test]
    fn test_parse_document_arg() {
        assert_eq!(parse_document_arg("cin=scans/id.png"), (Some("cin"), "scans/id.png"));
        assert_eq!(parse_document_arg("scans/id.png"), (None, "scans/id.png"));
        assert_eq!(parse_document_arg("dir/a=b.png"), (None, "dir/a=b.png"));
    }

    #[tokio::test]
    async fn test_extract_text_and_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cv = temp_dir.path().join("cv.md");
        std::fs::write(&cv, "# Skills\n\n- Rust\n").unwrap();

        let mut manager = InputManager::new();
        assert_eq!(manager.extract_text(&cv).await.unwrap(), "Skills\nRust");
        assert_eq!(manager.cache_size(), 1);

        let unsupported = temp_dir.path().join("cv.docx");
        std::fs::write(&unsupported, "binary").unwrap();
        assert!(matches!(
            manager.extract_text(&unsupported).await,
            Err(AtsGateError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            manager.extract_text(&temp_dir.path().join("missing.txt")).await,
            Err(AtsGateError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frames_and_documents() {
        let temp_dir = TempDir::new().unwrap();
        let frames = temp_dir.path().join("frames.json");
        std::fs::write(&frames, r#"[{"landmark": {"emotion": "neutral", "confidence": 0.8}}]"#).unwrap();
        let manager = InputManager::new();
        assert_eq!(manager.read_frames(&frames).await.unwrap().len(), 1);

        let scan = temp_dir.path().join("id.png");
        std::fs::write(&scan, b"\x89PNG").unwrap();
        let spec = format!("cin={}", scan.display());
        let submission = manager.read_document(&spec).await.unwrap();
        assert_eq!(submission.declared_type, Some(DocumentType::Cin));

        let bad = format!("passport={}", scan.display());
        assert!(matches!(manager.read_document(&bad).await, Err(AtsGateError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_read_frame_images_in_order() {
        let temp_dir = TempDir::new().unwrap();
        for (name, shade) in [("b.png", 200u8), ("a.png", 10u8)] {
            image::GrayImage::from_pixel(4, 4, image::Luma([shade]))
                .save(temp_dir.path().join(name))
                .unwrap();
        }
        std::fs::write(temp_dir.path().join("c.png"), b"not an image").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let frames = InputManager::new().read_frame_images(temp_dir.path()).await.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].index, 0);
        assert_eq!(frames[0].face.as_ref().unwrap().get_pixel(0, 0).0[0], 10);
        assert_eq!(frames[1].face.as_ref().unwrap().get_pixel(0, 0).0[0], 200);
    }
}
