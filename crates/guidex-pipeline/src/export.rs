//! Combined table export
//!
//! XLSX output with conflicting rows highlighted, plus a JSON form that
//! `guidex detect` can read back.

use std::collections::BTreeSet;
use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatPattern, Workbook, XlsxError};
use thiserror::Error;

use guidex_core::{Cell, Column, CombinedTable, GuidexError};

/// Worksheet holding the guidance rows
pub const SHEET_NAME: &str = "Guidance_Data";

/// Fill for flagged rows
const HIGHLIGHT: u32 = 0xFFFF00;

/// Errors raised while writing or reading exports
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<ExportError> for GuidexError {
    fn from(err: ExportError) -> Self {
        Self::ExportError(err.to_string())
    }
}

/// Spreadsheet column order: internal order with filing date ahead of source type
pub fn export_columns() -> [Column; 10] {
    let mut columns = Column::ALL;
    let filing = columns.iter().position(|c| *c == Column::FilingDate);
    let source = columns.iter().position(|c| *c == Column::SourceType);
    if let (Some(f), Some(s)) = (filing, source) {
        columns.swap(f, s);
    }
    columns
}

/// XLSX writer for combined tables
#[derive(Debug, Clone, Default)]
pub struct XlsxExporter;

impl XlsxExporter {
    pub fn new() -> Self {
        Self
    }

    fn build(&self, table: &CombinedTable, flagged: &BTreeSet<usize>) -> Result<Workbook, ExportError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        let header = Format::new().set_bold();
        let plain = Format::new();
        let centered = Format::new().set_align(FormatAlign::Center);
        let highlighted = Format::new()
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(HIGHLIGHT));
        let highlighted_centered = highlighted.clone().set_align(FormatAlign::Center);

        let columns = export_columns();
        for (col, column) in columns.iter().enumerate() {
            let col = col as u16;
            worksheet.write_string_with_format(0, col, column.name(), &header)?;
            let width = if *column == Column::Metric || *column == Column::ValueOrRange {
                32.0
            } else {
                16.0
            };
            worksheet.set_column_width(col, width)?;
        }

        for (index, row) in table.rows().iter().enumerate() {
            let excel_row = index as u32 + 1;
            let flagged_row = flagged.contains(&index);

            for (col, column) in columns.iter().enumerate() {
                let col = col as u16;
                let format = match (flagged_row, *column == Column::Metric) {
                    (true, true) => &highlighted,
                    (true, false) => &highlighted_centered,
                    (false, true) => &plain,
                    (false, false) => &centered,
                };

                match row.cell(*column) {
                    Cell::Text(text) => {
                        worksheet.write_string_with_format(excel_row, col, text, format)?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number_with_format(excel_row, col, n, format)?;
                    }
                    Cell::Empty => {
                        worksheet.write_blank(excel_row, col, format)?;
                    }
                }
            }
        }

        Ok(workbook)
    }

    /// Write the table to an XLSX file
    pub fn write(
        &self,
        table: &CombinedTable,
        flagged: &BTreeSet<usize>,
        path: impl AsRef<Path>,
    ) -> Result<(), ExportError> {
        let path = path.as_ref();
        let mut workbook = self.build(table, flagged)?;
        workbook.save(path)?;
        tracing::info!(
            "Wrote {} rows ({} flagged) to {}",
            table.len(),
            flagged.len(),
            path.display()
        );
        Ok(())
    }

    /// Render the table as XLSX bytes
    pub fn to_buffer(
        &self,
        table: &CombinedTable,
        flagged: &BTreeSet<usize>,
    ) -> Result<Vec<u8>, ExportError> {
        let mut workbook = self.build(table, flagged)?;
        Ok(workbook.save_to_buffer()?)
    }
}

/// Write the combined table as pretty JSON
pub fn write_json(table: &CombinedTable, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(table)?;
    std::fs::write(path, json).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Read a combined table written by `write_json`
pub fn read_json(path: impl AsRef<Path>) -> Result<CombinedTable, ExportError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}
