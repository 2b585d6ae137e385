//! HTML parser for EDGAR exhibits and saved transcript pages
//!
//! Non-content blocks are removed first, then `html2text` renders the page.
//! Rendered tables are flattened into `cell | cell` rows so figures stay on
//! the same line as their labels.

use std::io::Cursor;
use std::path::Path;

use html2text::render::TrivialDecorator;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{DocumentParseMetadata, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// Rendering width; wide enough that prose lines are never wrapped
const RENDER_WIDTH: usize = 10_000;

fn block_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid regex")
}

static HIDDEN_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["head", "script", "style", "noscript"]
        .into_iter()
        .map(block_pattern)
        .collect()
});

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid regex"));

static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

static EXTRA_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Horizontal rules and corners html2text draws around table rows
fn is_table_rule(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| ('\u{2500}'..='\u{257f}').contains(&c) || c.is_whitespace())
        && line.chars().any(|c| ('\u{2500}'..='\u{257f}').contains(&c))
}

fn render(html: &str) -> Result<String> {
    html2text::from_read_with_decorator(
        Cursor::new(html.as_bytes()),
        RENDER_WIDTH,
        TrivialDecorator::new(),
    )
    .map_err(|e| ParserError::HtmlError(e.to_string()))
}

/// HTML document parser
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Convert an HTML string to readable text
    pub fn html_to_text(&self, html: &str) -> Result<String> {
        let mut stripped = html.to_string();
        for block in HIDDEN_BLOCKS.iter() {
            stripped = block.replace_all(&stripped, "").into_owned();
        }

        let rendered = render(&stripped)?;
        let lines: Vec<String> = rendered
            .lines()
            .filter(|l| !is_table_rule(l.trim()))
            .map(|l| {
                let cells = l.replace('\u{2502}', " | ");
                INLINE_SPACE.replace_all(&cells, " ").trim().to_string()
            })
            .collect();
        let joined = lines.join("\n");

        Ok(EXTRA_BLANK_LINES
            .replace_all(&joined, "\n\n")
            .trim()
            .to_string())
    }

    fn title(&self, html: &str) -> Option<String> {
        let raw = TITLE.captures(html)?.get(1)?.as_str();
        let decoded = render(raw).unwrap_or_else(|_| raw.to_string());
        let title = INLINE_SPACE.replace_all(decoded.trim(), " ").into_owned();
        (!title.is_empty()).then_some(title)
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for HtmlParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        let html = String::from_utf8_lossy(&bytes);

        let title = self.title(&html);
        let content = self.html_to_text(&html)?;

        let metadata = DocumentParseMetadata {
            title,
            page_count: None,
            word_count: Some(content.split_whitespace().count() as u32),
        };

        Ok(ParsedDocument {
            file_path: path.display().to_string(),
            file_type: FileType::Html,
            content,
            metadata,
        })
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Html]
    }
}
