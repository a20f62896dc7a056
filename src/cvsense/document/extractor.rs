// SPDX-License-Identifier: MIT

//! Text extraction from uploaded documents

use std::path::Path;

use crate::adk::error::DocumentError;

/// Formats the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Detect the format from magic bytes first, then the file extension.
    /// Without a name and without a PDF header the bytes are treated as text.
    pub fn detect(bytes: &[u8], file_name: Option<&str>) -> Result<Self, DocumentError> {
        if bytes.starts_with(b"%PDF") {
            return Ok(Self::Pdf);
        }

        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            None => Ok(Self::PlainText),
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") | Some("text") => Ok(Self::PlainText),
            Some("md") | Some("markdown") => Ok(Self::Markdown),
            Some(other) => Err(DocumentError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Turns document bytes into plain text
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String, DocumentError>;
}

/// Extractor for PDF, plain text and Markdown documents
#[derive(Debug, Clone, Default)]
pub struct FileTextExtractor;

impl FileTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_pdf(bytes: &[u8]) -> Result<String, DocumentError> {
        // pdf-extract panics on some malformed files
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| DocumentError::Pdf("parser panicked on malformed PDF".into()))?
            .map_err(|e| DocumentError::Pdf(e.to_string()))
    }

    /// UTF-8 first, Latin-1 as a lossless fallback
    fn decode_text(bytes: &[u8]) -> String {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                log::debug!("Document is not UTF-8, decoding as Latin-1");
                bytes.iter().map(|&b| b as char).collect()
            }
        }
    }
}

impl TextExtractor for FileTextExtractor {
    fn extract_text(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String, DocumentError> {
        let format = DocumentFormat::detect(bytes, file_name)?;
        log::debug!(
            "Extracting {:?} document ({} bytes)",
            format,
            bytes.len()
        );

        let text = match format {
            DocumentFormat::Pdf => Self::extract_pdf(bytes)?,
            DocumentFormat::PlainText | DocumentFormat::Markdown => Self::decode_text(bytes),
        };

        if text.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_magic_and_extension() {
        assert_eq!(
            DocumentFormat::detect(b"%PDF-1.7 ...", Some("cv.txt")).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect(b"hello", Some("CV.MD")).unwrap(),
            DocumentFormat::Markdown
        );
        assert_eq!(
            DocumentFormat::detect(b"hello", None).unwrap(),
            DocumentFormat::PlainText
        );
        assert!(matches!(
            DocumentFormat::detect(b"PK\x03\x04", Some("cv.docx")),
            Err(DocumentError::UnsupportedFormat(ext)) if ext == "docx"
        ));
    }

    #[test]
    fn test_extract_utf8_strips_bom() {
        let extractor = FileTextExtractor::new();
        let text = extractor
            .extract_text(b"\xEF\xBB\xBFJane Doe\nEngineer", Some("cv.txt"))
            .unwrap();
        assert_eq!(text, "Jane Doe\nEngineer");
    }

    #[test]
    fn test_extract_latin1_fallback() {
        let extractor = FileTextExtractor::new();
        let text = extractor
            .extract_text(b"Jos\xE9 Garc\xEDa", Some("cv.txt"))
            .unwrap();
        assert_eq!(text, "José García");
    }

    #[test]
    fn test_extract_empty_document() {
        let extractor = FileTextExtractor::new();
        assert!(matches!(
            extractor.extract_text(b"   \n\t", None),
            Err(DocumentError::Empty)
        ));
    }

    #[test]
    fn test_extract_broken_pdf_is_an_error() {
        let extractor = FileTextExtractor::new();
        assert!(matches!(
            extractor.extract_text(b"%PDF-1.4 not really a pdf", None),
            Err(DocumentError::Pdf(_))
        ));
    }
}
