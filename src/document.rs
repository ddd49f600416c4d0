// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local documentation readers for the extraction agent

use std::path::Path;
use tracing::{debug, info};

use crate::{PulseError, Result};

/// Text pulled out of a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    /// Only known for PDFs
    pub page_count: Option<usize>,
}

fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    by_extension || bytes.starts_with(b"%PDF-")
}

/// Extract text from a PDF held in memory
pub fn pdf_text(bytes: &[u8]) -> Result<DocumentText> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| PulseError::Document(format!("Failed to load PDF: {}", e)))?;
    let page_count = doc.get_pages().len();

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PulseError::Document(format!("Text extraction failed: {}", e)))?;

    Ok(DocumentText { text, page_count: Some(page_count) })
}

/// Read a documentation file. PDFs go through the PDF extractor, everything
/// else must be UTF-8 text.
pub fn read_document(path: &Path) -> Result<DocumentText> {
    info!("Reading documentation from {:?}", path);
    let bytes = std::fs::read(path)?;

    let document = if is_pdf(path, &bytes) {
        pdf_text(&bytes)?
    } else {
        let text = String::from_utf8(bytes)
            .map_err(|_| PulseError::Document(format!("{} is not valid UTF-8 text", path.display())))?;
        DocumentText { text, page_count: None }
    };

    if document.text.trim().is_empty() {
        return Err(PulseError::Document(format!("No text found in {}", path.display())));
    }

    debug!("Read {} characters", document.text.chars().count());
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_read_plain_text() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1. Thermal Management Core").unwrap();

        let document = read_document(file.path()).unwrap();
        assert_eq!(document.text.trim(), "1. Thermal Management Core");
        assert_eq!(document.page_count, None);
    }

    #[test]
    fn test_blank_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  \n").unwrap();

        let result = read_document(file.path());
        assert!(matches!(result, Err(PulseError::Document(_))));
    }

    #[test]
    fn test_binary_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x9f]).unwrap();

        let result = read_document(file.path());
        assert!(matches!(result, Err(PulseError::Document(msg)) if msg.contains("UTF-8")));
    }

    #[test]
    fn test_missing_file_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let result = read_document(&dir.path().join("absent.txt"));
        assert!(matches!(result, Err(PulseError::FileSystem(_))));
    }

    #[test]
    fn test_corrupt_pdf_is_document_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thermal.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();

        let result = read_document(&path);
        assert!(matches!(result, Err(PulseError::Document(_))));
    }

    #[test]
    fn test_pdf_detection() {
        assert!(is_pdf(Path::new("a.PDF"), b""));
        assert!(is_pdf(Path::new("a.bin"), b"%PDF-1.7"));
        assert!(!is_pdf(Path::new("a.txt"), b"hello"));
    }
}
