//! Guidance rows and tables
//!
//! `GuidanceRow` is the fixed record the table parser produces at the
//! ingestion boundary. Numeric cells use `GuidanceValue` so that "no data" can
//! never be represented: a cell is a number, a percent string, or the verbatim
//! qualitative text of the row.

use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Period type
// ============================================================================

/// Classification of a guidance period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    #[serde(rename = "Quarter")]
    Quarter,
    #[serde(rename = "Full Year", alias = "FullYear")]
    FullYear,
}

impl PeriodType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarter => "Quarter",
            Self::FullYear => "Full Year",
        }
    }

    /// Parse an explicit period-type label ("Quarter", "Full Year", "FY", ...)
    pub fn parse_label(label: &str) -> Option<Self> {
        let squashed: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match squashed.as_str() {
            "quarter" | "quarterly" | "q" | "qtr" => Some(Self::Quarter),
            "fullyear" | "year" | "fiscalyear" | "annual" | "fy" | "yearly" => {
                Some(Self::FullYear)
            }
            _ => None,
        }
    }

    /// Classify a period from its free text ("Q3 FY24", "Full Year 2025")
    ///
    /// Anything that does not name a quarter is a full year.
    pub fn classify(period: &str) -> Self {
        let lower = period.to_lowercase();
        if lower.contains("quarter") {
            return Self::Quarter;
        }

        let names_quarter = lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| {
                let bytes = token.as_bytes();
                bytes.len() >= 2
                    && ((bytes[0] == b'q' && (b'1'..=b'4').contains(&bytes[1]))
                        || ((b'1'..=b'4').contains(&bytes[0]) && bytes[1] == b'q'))
            });

        if names_quarter {
            Self::Quarter
        } else {
            Self::FullYear
        }
    }

    /// Use the explicit label when it is valid, otherwise classify the period
    pub fn resolve(label: Option<&str>, period: &str) -> Self {
        label
            .and_then(Self::parse_label)
            .unwrap_or_else(|| Self::classify(period))
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Cell values
// ============================================================================

/// Value of a low / high / average cell
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceValue {
    /// Dollar amount in millions, or a per-share figure
    Number(f64),
    /// Percent string, always `%`-suffixed ("-5%", "28.0%")
    Percent(String),
    /// Qualitative text, equal to the row's `value_or_range`
    Text(String),
}

impl GuidanceValue {
    /// Numeric value used for comparisons; `None` for qualitative cells
    pub fn numeric(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => Some(*n),
            Self::Percent(s) => s
                .trim()
                .trim_end_matches('%')
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok(),
            Self::Text(_) => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// Whether the cell carries text rather than a number
    pub fn is_qualitative(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, Self::Percent(_))
    }
}

/// Render a float without a trailing ".0" for whole numbers
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl std::fmt::Display for GuidanceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Percent(s) | Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for GuidanceValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Percent(s) | Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for GuidanceValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawValue::deserialize(deserializer)? {
            RawValue::Number(n) => Self::Number(n),
            RawValue::Text(s) => {
                let percent = Self::Percent(s.clone());
                if s.trim_end().ends_with('%') && percent.numeric().is_some() {
                    percent
                } else {
                    Self::Text(s)
                }
            }
        })
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One extracted guidance statement
///
/// In JSON the qualitative cells are listed in `text_cells`, so a verbatim
/// value such as "25%" reads back as text rather than as a percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RowRecord", from = "RowRecord")]
pub struct GuidanceRow {
    pub metric: String,

    /// Verbatim value text as it appears in the source
    pub value_or_range: String,

    pub period: String,

    pub period_type: PeriodType,

    pub low: GuidanceValue,

    pub high: GuidanceValue,

    pub average: GuidanceValue,

    /// Constant per table ("SEC 8-K", "Transcript", "Upload")
    pub source_type: String,

    pub filing_date: Option<String>,

    pub filing_url: Option<String>,
}

/// Serialized form of a row
#[derive(Serialize, Deserialize)]
struct RowRecord {
    metric: String,
    value_or_range: String,
    period: String,
    period_type: PeriodType,
    low: GuidanceValue,
    high: GuidanceValue,
    average: GuidanceValue,
    source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    text_cells: Vec<String>,
}

impl From<GuidanceRow> for RowRecord {
    fn from(row: GuidanceRow) -> Self {
        let text_cells = [
            (Column::Low, &row.low),
            (Column::High, &row.high),
            (Column::Average, &row.average),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_qualitative())
        .map(|(column, _)| column.name().to_string())
        .collect();

        Self {
            metric: row.metric,
            value_or_range: row.value_or_range,
            period: row.period,
            period_type: row.period_type,
            low: row.low,
            high: row.high,
            average: row.average,
            source_type: row.source_type,
            filing_date: row.filing_date,
            filing_url: row.filing_url,
            text_cells,
        }
    }
}

impl From<RowRecord> for GuidanceRow {
    fn from(record: RowRecord) -> Self {
        let kind = |column: Column, value: GuidanceValue| match value {
            GuidanceValue::Percent(s) if record.text_cells.iter().any(|c| c == column.name()) => {
                GuidanceValue::Text(s)
            }
            other => other,
        };

        Self {
            low: kind(Column::Low, record.low),
            high: kind(Column::High, record.high),
            average: kind(Column::Average, record.average),
            metric: record.metric,
            value_or_range: record.value_or_range,
            period: record.period,
            period_type: record.period_type,
            source_type: record.source_type,
            filing_date: record.filing_date,
            filing_url: record.filing_url,
        }
    }
}

impl GuidanceRow {
    /// Create a qualitative row whose numeric cells all echo `value_or_range`
    pub fn qualitative(
        metric: impl Into<String>,
        value_or_range: impl Into<String>,
        period: impl Into<String>,
    ) -> Self {
        let value_or_range = value_or_range.into();
        let period = period.into();
        Self {
            metric: metric.into(),
            period_type: PeriodType::classify(&period),
            period,
            low: GuidanceValue::Text(value_or_range.clone()),
            high: GuidanceValue::Text(value_or_range.clone()),
            average: GuidanceValue::Text(value_or_range.clone()),
            value_or_range,
            source_type: String::new(),
            filing_date: None,
            filing_url: None,
        }
    }

    /// Set low / high / average
    pub fn with_values(
        mut self,
        low: GuidanceValue,
        high: GuidanceValue,
        average: GuidanceValue,
    ) -> Self {
        self.low = low;
        self.high = high;
        self.average = average;
        self
    }

    /// Set the source type label
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }

    /// Set the filing date
    pub fn with_filing_date(mut self, date: impl Into<String>) -> Self {
        self.filing_date = Some(date.into());
        self
    }

    /// Read one column as a display/export cell
    pub fn cell(&self, column: Column) -> Cell<'_> {
        fn value(v: &GuidanceValue) -> Cell<'_> {
            match v {
                GuidanceValue::Number(n) => Cell::Number(*n),
                GuidanceValue::Percent(s) | GuidanceValue::Text(s) => Cell::Text(s),
            }
        }

        match column {
            Column::Metric => Cell::Text(&self.metric),
            Column::ValueOrRange => Cell::Text(&self.value_or_range),
            Column::Period => Cell::Text(&self.period),
            Column::PeriodType => Cell::Text(self.period_type.as_str()),
            Column::Low => value(&self.low),
            Column::High => value(&self.high),
            Column::Average => value(&self.average),
            Column::SourceType => Cell::Text(&self.source_type),
            Column::FilingDate => self.filing_date.as_deref().map_or(Cell::Empty, Cell::Text),
            Column::FilingUrl => self.filing_url.as_deref().map_or(Cell::Empty, Cell::Text),
        }
    }
}

/// Columns of the guidance table in internal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Metric,
    ValueOrRange,
    Period,
    PeriodType,
    Low,
    High,
    Average,
    SourceType,
    FilingDate,
    FilingUrl,
}

impl Column {
    /// All columns in internal order
    pub const ALL: [Column; 10] = [
        Column::Metric,
        Column::ValueOrRange,
        Column::Period,
        Column::PeriodType,
        Column::Low,
        Column::High,
        Column::Average,
        Column::SourceType,
        Column::FilingDate,
        Column::FilingUrl,
    ];

    /// snake_case field name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::ValueOrRange => "value_or_range",
            Self::Period => "period",
            Self::PeriodType => "period_type",
            Self::Low => "low",
            Self::High => "high",
            Self::Average => "average",
            Self::SourceType => "source_type",
            Self::FilingDate => "filing_date",
            Self::FilingUrl => "filing_url",
        }
    }

    /// Human-readable header
    pub fn header(&self) -> &'static str {
        match self {
            Self::Metric => "Metric",
            Self::ValueOrRange => "Value or Range",
            Self::Period => "Period",
            Self::PeriodType => "Period Type",
            Self::Low => "Low",
            Self::High => "High",
            Self::Average => "Average",
            Self::SourceType => "Source Type",
            Self::FilingDate => "Filing Date",
            Self::FilingUrl => "Source",
        }
    }
}

/// A single cell read out of a row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Empty,
}

impl std::fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Empty => Ok(()),
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Rows extracted from a single document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuidanceTable {
    pub rows: Vec<GuidanceRow>,
}

impl GuidanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<GuidanceRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GuidanceRow> {
        self.rows.iter()
    }

    /// Stamp filing date and URL onto every row
    pub fn stamp_provenance(&mut self, filing_date: &str, filing_url: Option<&str>) {
        for row in &mut self.rows {
            row.filing_date = Some(filing_date.to_string());
            row.filing_url = filing_url.map(str::to_string);
        }
    }
}

/// Append-only concatenation of per-document tables
///
/// Row position is the identity used by duplicate detection and export, so
/// the only mutation offered is appending at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinedTable {
    rows: Vec<GuidanceRow>,
}

impl CombinedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table, returning the index range its rows now occupy
    pub fn append(&mut self, table: GuidanceTable) -> Range<usize> {
        let start = self.rows.len();
        self.rows.extend(table.rows);
        start..self.rows.len()
    }

    pub fn rows(&self) -> &[GuidanceRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&GuidanceRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a markdown table; flagged rows get a `*` in the first column
    pub fn to_markdown(&self, flagged: &BTreeSet<usize>) -> String {
        let mut md = String::from("| |");
        for column in Column::ALL {
            md.push_str(&format!(" {} |", column.header()));
        }
        md.push('\n');

        md.push_str("| --- |");
        for _ in Column::ALL {
            md.push_str(" --- |");
        }
        md.push('\n');

        for (index, row) in self.rows.iter().enumerate() {
            let marker = if flagged.contains(&index) { "*" } else { " " };
            md.push_str(&format!("| {marker} |"));
            for column in Column::ALL {
                md.push_str(&format!(" {} |", row.cell(column)));
            }
            md.push('\n');
        }

        md
    }
}

impl From<Vec<GuidanceRow>> for CombinedTable {
    fn from(rows: Vec<GuidanceRow>) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_type_classification() {
        assert_eq!(PeriodType::classify("Q3 FY24"), PeriodType::Quarter);
        assert_eq!(PeriodType::classify("3Q24"), PeriodType::Quarter);
        assert_eq!(PeriodType::classify("Next Quarter"), PeriodType::Quarter);
        assert_eq!(PeriodType::classify("Full Year 2025"), PeriodType::FullYear);
        assert_eq!(PeriodType::classify("FY24"), PeriodType::FullYear);
        assert_eq!(PeriodType::classify("2023"), PeriodType::FullYear);
    }

    #[test]
    fn test_period_type_resolve_prefers_valid_label() {
        assert_eq!(
            PeriodType::resolve(Some("Full Year"), "Q1 FY25"),
            PeriodType::FullYear
        );
        assert_eq!(
            PeriodType::resolve(Some("full-year"), "Q1"),
            PeriodType::FullYear
        );
        assert_eq!(
            PeriodType::resolve(Some("Half"), "Q1 FY25"),
            PeriodType::Quarter
        );
        assert_eq!(PeriodType::resolve(None, "FY2026"), PeriodType::FullYear);
    }

    #[test]
    fn test_guidance_value_numeric() {
        assert_eq!(GuidanceValue::Number(7700.0).numeric(), Some(7700.0));
        assert_eq!(GuidanceValue::Percent("28.0%".into()).numeric(), Some(28.0));
        assert_eq!(GuidanceValue::Percent("-5%".into()).numeric(), Some(-5.0));
        assert_eq!(GuidanceValue::Text("above last year".into()).numeric(), None);
        assert_eq!(GuidanceValue::Number(f64::NAN).numeric(), None);
    }

    #[test]
    fn test_guidance_value_serde() {
        let values = vec![
            GuidanceValue::Number(0.075),
            GuidanceValue::Percent("25%".into()),
            GuidanceValue::Text("slight expansion".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[0.075,"25%","slight expansion"]"#);

        let back: Vec<GuidanceValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_row_json_keeps_qualitative_percent_text() {
        let qualitative = GuidanceRow::qualitative("Tax Rate", "25%", "FY25");
        let numeric = GuidanceRow::qualitative("Tax Rate", "25%", "FY25").with_values(
            GuidanceValue::Percent("25%".into()),
            GuidanceValue::Percent("25%".into()),
            GuidanceValue::Percent("25%".into()),
        );

        let json = serde_json::to_string(&vec![qualitative.clone(), numeric.clone()]).unwrap();
        assert!(json.contains(r#""text_cells":["low","high","average"]"#));

        let back: Vec<GuidanceRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![qualitative, numeric]);
        assert!(back[0].low.is_qualitative());
        assert!(back[1].low.is_percent());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(7700.0), "7700");
        assert_eq!(format_number(-1.0), "-1");
        assert_eq!(format_number(0.075), "0.075");
    }

    #[test]
    fn test_combined_table_append_ranges() {
        let mut combined = CombinedTable::new();
        let first = combined.append(GuidanceTable::from_rows(vec![
            GuidanceRow::qualitative("Revenue", "up", "FY25"),
            GuidanceRow::qualitative("EPS", "flat", "FY25"),
        ]));
        let second = combined.append(GuidanceTable::from_rows(vec![
            GuidanceRow::qualitative("Revenue", "down", "FY25"),
        ]));

        assert_eq!(first, 0..2);
        assert_eq!(second, 2..3);
        assert_eq!(combined.get(2).unwrap().value_or_range, "down");
    }

    #[test]
    fn test_row_cells() {
        let row = GuidanceRow::qualitative("Revenue", "$7.7 billion", "Q2 FY25")
            .with_values(
                GuidanceValue::Number(7700.0),
                GuidanceValue::Number(7700.0),
                GuidanceValue::Number(7700.0),
            )
            .with_source_type("SEC 8-K");

        assert_eq!(row.cell(Column::Low), Cell::Number(7700.0));
        assert_eq!(row.cell(Column::PeriodType), Cell::Text("Quarter"));
        assert_eq!(row.cell(Column::FilingDate), Cell::Empty);
    }

    #[test]
    fn test_markdown_marks_flagged_rows() {
        let combined = CombinedTable::from(vec![
            GuidanceRow::qualitative("Revenue", "up", "FY25"),
            GuidanceRow::qualitative("Revenue", "down", "FY25"),
        ]);
        let flagged: BTreeSet<usize> = [1].into_iter().collect();

        let md = combined.to_markdown(&flagged);
        assert!(md.contains("| Metric | Value or Range |"));
        assert!(md.contains("| * | Revenue | down |"));
        assert!(md.contains("|   | Revenue | up |"));
    }
}
