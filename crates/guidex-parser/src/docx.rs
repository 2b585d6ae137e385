//! DOCX document parser using docx-rs
//!
//! Prepared remarks and scripts are commonly shared as Word documents.
//! Paragraphs become blank-line separated blocks; tables become pipe rows.

use std::path::Path;

use docx_rs::read_docx;

use crate::{DocumentParseMetadata, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// DOCX document parser
pub struct DocxParser {
    /// Render tables as pipe-delimited rows instead of dropping them
    pub include_tables: bool,
}

impl DocxParser {
    /// Create a new DOCX parser with default settings
    pub fn new() -> Self {
        Self {
            include_tables: true,
        }
    }

    /// Enable or disable table rendering
    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.include_tables = enabled;
        self
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

fn table_rows(tbl: &docx_rs::Table) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row in &tbl.rows {
        let docx_rs::TableChild::TableRow(tr) = row;
        let mut cells = Vec::new();
        for cell in &tr.cells {
            let docx_rs::TableRowChild::TableCell(tc) = cell;
            let mut cell_text = String::new();
            for child in &tc.children {
                if let docx_rs::TableCellContent::Paragraph(para) = child {
                    if !cell_text.is_empty() {
                        cell_text.push(' ');
                    }
                    cell_text.push_str(paragraph_text(para).trim());
                }
            }
            cells.push(cell_text.trim().to_string());
        }
        rows.push(cells);
    }
    rows
}

fn render_rows(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push('|');
        for cell in row {
            out.push_str(&format!(" {cell} |"));
        }
        out.push('\n');
    }
    out
}

impl DocumentParser for DocxParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let buf = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let docx = read_docx(&buf).map_err(|e| ParserError::DocxError(e.to_string()))?;

        let mut blocks: Vec<String> = Vec::new();
        let mut title = None;

        for child in &docx.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(para) => {
                    let text = paragraph_text(para);
                    if text.trim().is_empty() {
                        continue;
                    }

                    let is_heading = para
                        .property
                        .style
                        .as_ref()
                        .map(|s| s.val.to_lowercase().starts_with("heading"))
                        .unwrap_or(false);
                    if is_heading && title.is_none() {
                        title = Some(text.trim().to_string());
                    }

                    blocks.push(text);
                }
                docx_rs::DocumentChild::Table(tbl) if self.include_tables => {
                    let rows = table_rows(tbl);
                    if !rows.is_empty() {
                        blocks.push(render_rows(&rows));
                    }
                }
                _ => {}
            }
        }

        let content = blocks.join("\n\n");
        let metadata = DocumentParseMetadata {
            title,
            page_count: None,
            word_count: Some(content.split_whitespace().count() as u32),
        };

        Ok(ParsedDocument {
            file_path: path.display().to_string(),
            file_type: FileType::Docx,
            content,
            metadata,
        })
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Docx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docx_parser_creation() {
        let parser = DocxParser::new();
        assert!(parser.include_tables);

        let parser = parser.with_tables(false);
        assert!(!parser.include_tables);
    }

    #[test]
    fn test_render_rows() {
        let rows = vec![
            vec!["Metric".to_string(), "Outlook".to_string()],
            vec!["Revenue".to_string(), "$10B".to_string()],
        ];
        assert_eq!(
            render_rows(&rows),
            "| Metric | Outlook |\n| Revenue | $10B |\n"
        );
    }

    #[test]
    fn test_parse_generated_docx() {
        let mut buf = std::io::Cursor::new(Vec::new());
        docx_rs::Docx::new()
            .add_paragraph(
                docx_rs::Paragraph::new()
                    .add_run(docx_rs::Run::new().add_text("Prepared Remarks"))
                    .style("Heading1"),
            )
            .add_paragraph(
                docx_rs::Paragraph::new()
                    .add_run(docx_rs::Run::new().add_text("We expect revenue of $10 billion.")),
            )
            .build()
            .pack(&mut buf)
            .unwrap();

        let file = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
        std::fs::write(file.path(), buf.into_inner()).unwrap();

        let doc = DocxParser::new().parse(file.path()).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Prepared Remarks"));
        assert_eq!(
            doc.content,
            "Prepared Remarks\n\nWe expect revenue of $10 billion."
        );
    }

    #[test]
    fn test_supported_types() {
        let parser = DocxParser::new();
        assert!(parser.can_parse(FileType::Docx));
        assert!(!parser.can_parse(FileType::Pdf));
    }
}
