use crate::error::{QaError, Result};
use lopdf::Document;
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
}

pub trait PdfExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedText>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText> {
        if !path.exists() {
            return Err(QaError::NotFound(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let document =
            Document::load(path).map_err(|error| QaError::Extraction(error.to_string()))?;

        let pages = document.get_pages();
        let page_count = pages.len() as u32;

        let mut raw = String::new();
        for (page_no, _page_id) in pages {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| QaError::Extraction(error.to_string()))?;
            raw.push_str(&text);
            raw.push('\n');
        }

        let text = normalize_extracted(&raw)?;
        if text.is_empty() {
            return Err(QaError::Extraction(format!(
                "pdf contains no readable text: {}",
                path.display()
            )));
        }

        Ok(ExtractedText { text, page_count })
    }
}

/// CRLF becomes LF, runs of blank lines collapse to a single newline, and
/// outer whitespace is trimmed.
pub fn normalize_extracted(raw: &str) -> Result<String> {
    let unix = raw.replace("\r\n", "\n");
    let collapsed = Regex::new(r"\n{2,}")?.replace_all(&unix, "\n");
    Ok(collapsed.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn normalization_collapses_newline_runs_and_crlf() {
        let raw = "Article 1.\r\nAll persons.\n\n\n\nArticle 2.\n\nProperty.\n\n";
        let cleaned = normalize_extracted(raw).unwrap();
        assert_eq!(cleaned, "Article 1.\nAll persons.\nArticle 2.\nProperty.");
    }

    #[test]
    fn missing_file_is_not_found() {
        let error = LopdfExtractor
            .extract(Path::new("/nonexistent/laws/family.pdf"))
            .unwrap_err();
        assert!(matches!(error, QaError::NotFound(_)));
    }

    #[test]
    fn malformed_pdf_is_an_extraction_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%not really a pdf")?;

        let error = LopdfExtractor.extract(&path).unwrap_err();
        assert!(matches!(error, QaError::Extraction(_)));
        Ok(())
    }
}
