//! PDF document parser using pdf-extract
//!
//! Earnings presentations usually arrive as PDF. Page breaks are kept as
//! `Page N` marker lines so the segmenter can split the deck into slides.

use std::path::Path;

use crate::{DocumentParseMetadata, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
pub struct PdfParser {
    /// Replace form feeds with `Page N` marker lines
    pub mark_pages: bool,
}

impl PdfParser {
    /// Create a new PDF parser with default settings
    pub fn new() -> Self {
        Self { mark_pages: true }
    }

    /// Enable or disable page markers
    pub fn with_page_markers(mut self, enabled: bool) -> Self {
        self.mark_pages = enabled;
        self
    }

    /// Extract text from a PDF file
    fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ParserError::PdfError(e.to_string()))
    }

    /// Rewrite form feeds as page marker lines; returns the text and page count
    fn mark_page_breaks(&self, text: &str) -> (String, Option<u32>) {
        let breaks = text.matches('\x0C').count() as u32;
        if breaks == 0 {
            return (text.to_string(), None);
        }

        if !self.mark_pages {
            return (text.replace('\x0C', "\n\n"), Some(breaks + 1));
        }

        let mut out = String::with_capacity(text.len() + breaks as usize * 12);
        for (i, page) in text.split('\x0C').enumerate() {
            if i > 0 {
                out.push_str(&format!("\n\nPage {}\n\n", i + 1));
            }
            out.push_str(page);
        }
        (out, Some(breaks + 1))
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let raw = self.extract_text(path)?;
        let (text, page_count) = self.mark_page_breaks(&raw);

        let metadata = DocumentParseMetadata {
            title: first_line_title(&text),
            page_count,
            word_count: Some(text.split_whitespace().count() as u32),
        };

        Ok(ParsedDocument {
            file_path: path.display().to_string(),
            file_type: FileType::Pdf,
            content: text,
            metadata,
        })
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

fn first_line_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .filter(|l| l.len() < 200)
        .map(str::to_string)
}
