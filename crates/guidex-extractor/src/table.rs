//! Guidance table parsing
//!
//! Turns the pipe-delimited table returned by the extraction call into a
//! typed `GuidanceTable`. A row's low / high / average cells are either all
//! numeric (numbers or percent strings) or all the row's verbatim value text.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use guidex_core::{GuidanceRow, GuidanceTable, GuidanceValue, PeriodType};

use crate::normalizer::{strip_qualifier_suffix, MetricNormalizer};

/// Why a response could not be read as a guidance table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableRejection {
    #[error("response contains no pipe-delimited table")]
    NotATable,

    #[error("table has a header but no data rows")]
    NoDataRows,

    #[error("table is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

const REQUIRED_COLUMNS: [&str; 3] = ["metric", "value_or_range", "period"];

const NULL_TOKENS: [&str; 7] = ["", "N/A", "NA", "NULL", "TBD", "-", "NONE"];

static SEPARATOR_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:?-{2,}:?$").expect("valid regex"));

static GAAP_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d\.\s%to–-]*)\s*on a GAAP basis.*?(\d[\d\.\s%to–-]*)\s*on a non-GAAP basis")
        .expect("valid regex")
});

/// "$7.7 billion", "$7.7B"
static BILLION_FIGURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s*(\d+(?:\.\d+)?)\s*(?:billion|bn|b)\b").expect("valid regex")
});

/// "$7.6 to $7.8 billion", "$7.6-7.8B"
static BILLION_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\$\s*(\d+(?:\.\d+)?)\s*(?:to|-|–|and)\s*\$?\s*(\d+(?:\.\d+)?)\s*(?:billion|bn|b)\b",
    )
    .expect("valid regex")
});

static FIGURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));

/// A figure with its sign, currency and unit inside a wordy cell ("approx $1.05")
static CELL_FIGURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(?[-−]?\$?\s*\d[\d,]*(?:\.\d+)?\s*(?:%|(?:billion|bn|million|mm|b|m)\b)?\)?")
        .expect("valid regex")
});

// ============================================================================
// Raw grid
// ============================================================================

/// One data row with cells looked up by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub metric: String,
    pub value_or_range: String,
    pub period: String,
    pub period_type: Option<String>,
    pub low: Option<String>,
    pub high: Option<String>,
    pub average: Option<String>,
}

/// Data rows of a validated table, before any coercion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableGrid {
    pub rows: Vec<RawRow>,
}

impl TableGrid {
    /// Unique metric labels in first-appearance order
    pub fn metrics(&self) -> Vec<String> {
        let mut metrics: Vec<String> = Vec::new();
        for row in &self.rows {
            if !metrics.contains(&row.metric) {
                metrics.push(row.metric.clone());
            }
        }
        metrics
    }
}

fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    cells.iter().any(|c| !c.is_empty())
        && cells
            .iter()
            .all(|c| c.is_empty() || SEPARATOR_CELL.is_match(c))
}

/// Validate the table shape and read rows by column name
pub fn parse_grid(table_text: &str) -> Result<TableGrid, TableRejection> {
    if !table_text.contains('|') {
        return Err(TableRejection::NotATable);
    }

    let rows: Vec<Vec<String>> = table_text
        .lines()
        .filter(|l| l.contains('|'))
        .map(split_cells)
        .filter(|cells| !is_separator(cells))
        .collect();

    if rows.len() < 2 {
        return Err(TableRejection::NoDataRows);
    }

    let header: Vec<String> = rows[0]
        .iter()
        .map(|c| c.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_"))
        .collect();
    let position = |name: &str| header.iter().position(|h| h == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| position(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(TableRejection::MissingColumns(missing));
    }

    let metric = position("metric");
    let value = position("value_or_range");
    let period = position("period");
    let period_type = position("period_type");
    let low = position("low");
    let high = position("high");
    let average = position("average");

    let grid_rows = rows[1..]
        .iter()
        .filter_map(|cells| {
            let cell = |idx: Option<usize>| -> Option<String> {
                idx.map(|i| cells.get(i).cloned().unwrap_or_default())
            };
            let raw = RawRow {
                metric: cell(metric).unwrap_or_default(),
                value_or_range: cell(value).unwrap_or_default(),
                period: cell(period).unwrap_or_default(),
                period_type: cell(period_type),
                low: cell(low),
                high: cell(high),
                average: cell(average),
            };
            if raw.metric.is_empty() && raw.value_or_range.is_empty() {
                None
            } else {
                Some(raw)
            }
        })
        .collect();

    Ok(TableGrid { rows: grid_rows })
}

// ============================================================================
// Cell coercion
// ============================================================================

/// Result of reading one numeric cell
#[derive(Debug, Clone, PartialEq)]
enum Coerced {
    Null,
    Value(GuidanceValue),
    NonNumeric(String),
}

impl Coerced {
    fn is_numeric(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    fn into_value(self, value_or_range: &str) -> GuidanceValue {
        match self {
            Self::Null => GuidanceValue::Text(value_or_range.to_string()),
            Self::Value(v) => v,
            Self::NonNumeric(s) => GuidanceValue::Text(s),
        }
    }
}

fn is_null(cell: &str) -> bool {
    let upper = cell.trim().to_uppercase();
    NULL_TOKENS.contains(&upper.as_str())
}

/// Strip one pair of wrapping parentheses or a leading minus sign
fn split_sign(text: &str) -> (bool, &str) {
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        return (true, inner);
    }
    if let Some(rest) = text.strip_prefix('-').or_else(|| text.strip_prefix('−')) {
        return (true, rest);
    }
    (false, text)
}

fn coerce_percent(cell: &str) -> Coerced {
    let squashed: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
    let (negative, inner) = split_sign(&squashed);
    let digits = inner.trim_end_matches('%').trim_start_matches('+');

    let finite = digits.parse::<f64>().map_or(false, f64::is_finite);
    if digits.contains('%') || !finite {
        return Coerced::NonNumeric(cell.trim().to_string());
    }
    let sign = if negative { "-" } else { "" };
    Coerced::Value(GuidanceValue::Percent(format!("{sign}{digits}%")))
}

/// Dollar figures stated in billions inside the value text
fn billion_figures(value_or_range: &str) -> Vec<f64> {
    let mut figures: Vec<f64> = BILLION_FIGURE
        .captures_iter(value_or_range)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    for caps in BILLION_RANGE.captures_iter(value_or_range) {
        figures.extend(caps[1].parse::<f64>().ok());
        figures.extend(caps[2].parse::<f64>().ok());
    }
    figures
}

/// Whether a bare number restates a billion figure of the value text
fn restates_billions(value: f64, figures: &[f64]) -> bool {
    if figures.is_empty() {
        return false;
    }
    let min = figures.iter().copied().fold(f64::INFINITY, f64::min);
    let max = figures.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    figures.iter().any(|f| (f - value).abs() < 1e-9) || (value >= min && value <= max)
}

fn coerce_cell(cell: Option<&str>, value_or_range: &str) -> Coerced {
    let cell = match cell {
        Some(c) if !is_null(c) => c.trim(),
        _ => return Coerced::Null,
    };

    if cell.contains('%') {
        return coerce_percent(cell);
    }

    let lower: String = cell
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | ',' | '~'))
        .collect();
    let (negative, body) = split_sign(&lower);

    let units: [(&str, f64); 6] = [
        ("billion", 1000.0),
        ("bn", 1000.0),
        ("b", 1000.0),
        ("million", 1.0),
        ("mm", 1.0),
        ("m", 1.0),
    ];
    let (digits, multiplier, had_unit) = units
        .iter()
        .find_map(|(suffix, mult)| body.strip_suffix(suffix).map(|d| (d, *mult, true)))
        .unwrap_or((body, 1.0, false));

    let Ok(magnitude) = digits.trim_start_matches('+').parse::<f64>() else {
        return Coerced::NonNumeric(cell.to_string());
    };
    if !magnitude.is_finite() {
        return Coerced::NonNumeric(cell.to_string());
    }

    if !had_unit && value_or_range.contains('%') {
        let sign = if negative { "-" } else { "" };
        let digits = digits.trim_start_matches('+');
        return Coerced::Value(GuidanceValue::Percent(format!("{sign}{digits}%")));
    }

    let mut value = magnitude * multiplier;
    if !had_unit && restates_billions(magnitude, &billion_figures(value_or_range)) {
        value *= 1000.0;
    }
    if negative {
        value = -value;
    }

    Coerced::Value(GuidanceValue::Number(value))
}

/// Derive low / high / average from a value phrase such as "1.00 to 1.05"
fn derive_from_value(value: &str) -> (GuidanceValue, GuidanceValue, GuidanceValue) {
    let figures: Vec<f64> = FIGURE
        .find_iter(value)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let (Some(&low), Some(&high)) = (figures.first(), figures.last()) else {
        let text = GuidanceValue::Text(value.to_string());
        return (text.clone(), text.clone(), text);
    };
    let average = (low + high) / 2.0;

    if value.contains('%') {
        let percent = |v: f64| GuidanceValue::Percent(format!("{}%", guidex_core::guidance::format_number(v)));
        (percent(low), percent(high), percent(average))
    } else {
        (
            GuidanceValue::Number(low),
            GuidanceValue::Number(high),
            GuidanceValue::Number(average),
        )
    }
}

/// Midpoint of two cells of the same unit; the low cell otherwise
fn midpoint(low: &GuidanceValue, high: &GuidanceValue) -> GuidanceValue {
    if low == high {
        return low.clone();
    }
    match (low, high) {
        (GuidanceValue::Number(a), GuidanceValue::Number(b)) => GuidanceValue::Number((a + b) / 2.0),
        (GuidanceValue::Percent(_), GuidanceValue::Percent(_)) => match (low.numeric(), high.numeric()) {
            (Some(a), Some(b)) => GuidanceValue::Percent(format!(
                "{}%",
                guidex_core::guidance::format_number((a + b) / 2.0)
            )),
            _ => low.clone(),
        },
        _ => low.clone(),
    }
}

/// Make low / high / average all numeric when any of them is
///
/// Wordy cells keep the figure they mention; cells with no figure are taken
/// from their siblings, the average as the low/high midpoint.
fn complete_values(mut row: GuidanceRow) -> GuidanceRow {
    let value_or_range = row.value_or_range.clone();
    let cells = [&row.low, &row.high, &row.average];
    if cells.iter().all(|c| c.is_qualitative()) {
        let text = GuidanceValue::Text(value_or_range);
        row.low = text.clone();
        row.high = text.clone();
        row.average = text;
        return row;
    }

    let recover = |cell: &GuidanceValue| -> GuidanceValue {
        let GuidanceValue::Text(text) = cell else {
            return cell.clone();
        };
        if *text == value_or_range {
            return cell.clone();
        }
        CELL_FIGURE
            .find(text)
            .map(|m| coerce_cell(Some(m.as_str()), &value_or_range))
            .and_then(|c| match c {
                Coerced::Value(v) => Some(v),
                _ => None,
            })
            .unwrap_or_else(|| cell.clone())
    };
    let low = recover(&row.low);
    let high = recover(&row.high);
    let average = recover(&row.average);

    let pick = |a: &GuidanceValue, b: &GuidanceValue| {
        if a.is_qualitative() {
            b.clone()
        } else {
            a.clone()
        }
    };
    let low = if low.is_qualitative() { pick(&high, &average) } else { low };
    let high = if high.is_qualitative() { pick(&low, &average) } else { high };
    let average = if average.is_qualitative() {
        midpoint(&low, &high)
    } else {
        average
    };

    row.low = low;
    row.high = high;
    row.average = average;
    row
}

/// Split a combined "X on a GAAP basis ... Y on a non-GAAP basis" row
fn split_gaap(row: GuidanceRow) -> Vec<GuidanceRow> {
    let Some(caps) = GAAP_SPLIT.captures(&row.value_or_range) else {
        return vec![row];
    };
    let gaap_value = caps[1].trim().to_string();
    let non_gaap_value = caps[2].trim().to_string();
    let base = strip_qualifier_suffix(&row.metric).to_string();

    [(gaap_value, "GAAP"), (non_gaap_value, "Non-GAAP")]
        .into_iter()
        .map(|(value, label)| {
            let (low, high, average) = derive_from_value(&value);
            let keep = |old: &GuidanceValue, derived: GuidanceValue| {
                if old.is_qualitative() {
                    derived
                } else {
                    old.clone()
                }
            };
            let mut split = row.clone();
            split.metric = format!("{base} ({label})");
            split.low = keep(&row.low, low);
            split.high = keep(&row.high, high);
            split.average = keep(&row.average, average);
            split.value_or_range = value;
            split
        })
        .collect()
}

// ============================================================================
// Parser
// ============================================================================

/// Parses extraction responses into guidance tables
#[derive(Debug, Clone, Default)]
pub struct TableParser {
    normalizer: MetricNormalizer,
}

impl TableParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizer(normalizer: MetricNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &MetricNormalizer {
        &self.normalizer
    }

    /// Parse a response; `None` when it is not a usable table
    pub fn parse(&self, table_text: &str, source_type: &str) -> Option<GuidanceTable> {
        match self.try_parse(table_text, source_type) {
            Ok(table) => Some(table),
            Err(rejection) => {
                tracing::debug!("Table rejected: {}", rejection);
                None
            }
        }
    }

    /// Parse a response, reporting why it was rejected
    pub fn try_parse(
        &self,
        table_text: &str,
        source_type: &str,
    ) -> Result<GuidanceTable, TableRejection> {
        let grid = parse_grid(table_text)?;
        Ok(self.assemble(grid, source_type, |label| self.normalizer.normalize(label)))
    }

    /// Build typed rows from a validated grid with the given metric normalization
    pub fn assemble<F>(&self, grid: TableGrid, source_type: &str, normalize: F) -> GuidanceTable
    where
        F: Fn(&str) -> String,
    {
        let mut rows = Vec::with_capacity(grid.rows.len());

        for raw in grid.rows {
            let metric = normalize(&raw.metric);
            let value_or_range = raw.value_or_range;

            let cells = [
                coerce_cell(raw.low.as_deref(), &value_or_range),
                coerce_cell(raw.high.as_deref(), &value_or_range),
                coerce_cell(raw.average.as_deref(), &value_or_range),
            ];
            let [low, high, average] = if cells.iter().any(Coerced::is_numeric) {
                cells.map(|c| c.into_value(&value_or_range))
            } else {
                [(); 3].map(|_| GuidanceValue::Text(value_or_range.clone()))
            };

            let row = GuidanceRow {
                metric,
                period_type: PeriodType::resolve(raw.period_type.as_deref(), &raw.period),
                period: raw.period,
                low,
                high,
                average,
                value_or_range,
                source_type: String::new(),
                filing_date: None,
                filing_url: None,
            };

            for split in split_gaap(row) {
                rows.push(complete_values(split).with_source_type(source_type));
            }
        }

        tracing::debug!("Parsed {} guidance rows ({})", rows.len(), source_type);
        GuidanceTable::from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "| metric | value_or_range | period | period_type | low | high | average |\n\
                          |---|---|---|---|---|---|---|";

    fn table(rows: &[&str]) -> String {
        format!("{HEADER}\n{}", rows.join("\n"))
    }

    #[test]
    fn test_rejects_non_tables() {
        let parser = TableParser::new();
        assert_eq!(
            parser.try_parse("No guidance was provided.", "SEC 8-K"),
            Err(TableRejection::NotATable)
        );
        assert_eq!(
            parser.try_parse(HEADER, "SEC 8-K"),
            Err(TableRejection::NoDataRows)
        );
        assert!(parser.parse("", "SEC 8-K").is_none());
    }

    #[test]
    fn test_missing_required_columns() {
        let text = "| metric | low |\n| Revenue | 10 |";
        let result = TableParser::new().try_parse(text, "SEC 8-K");
        assert_eq!(
            result,
            Err(TableRejection::MissingColumns(vec![
                "value_or_range".to_string(),
                "period".to_string()
            ]))
        );
    }

    #[test]
    fn test_header_names_are_normalized() {
        let text = "| Metric | Value or Range | Period | Period Type | Low | High | Average | Notes |\n\
                    | Revenue | $7.7 billion | Q2 FY25 | Quarter | 7700 | 7700 | 7700 | x |";
        let parsed = TableParser::new().parse(text, "SEC 8-K").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.rows[0].low, GuidanceValue::Number(7700.0));
        assert_eq!(parsed.rows[0].source_type, "SEC 8-K");
    }

    #[test]
    fn test_null_cells_take_value_text() {
        let text = table(&["| Gross margin | slight expansion | FY25 | Full Year | N/A | TBD | |"]);
        let parsed = TableParser::new().parse(&text, "Transcript").unwrap();
        let row = &parsed.rows[0];

        for value in [&row.low, &row.high, &row.average] {
            assert_eq!(value, &GuidanceValue::Text("slight expansion".to_string()));
        }
    }

    #[test]
    fn test_absent_numeric_columns_never_null() {
        let text = "| metric | value_or_range | period |\n| Revenue | modest growth | FY25 |";
        let parsed = TableParser::new().parse(text, "Upload").unwrap();
        let row = &parsed.rows[0];
        assert!(row.low.is_qualitative() && row.high.is_qualitative() && row.average.is_qualitative());
        assert_eq!(row.period_type, PeriodType::FullYear);
    }

    #[test]
    fn test_percent_units() {
        let text = table(&[
            "| Operating margin | 28% to 29% | FY25 | Full Year | 28 | 29% | 28.5 |",
            "| Revenue growth | decline of (5%) | Q1 | | (5%) | (5%) | (5%) |",
        ]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();

        let margin = &parsed.rows[0];
        assert_eq!(margin.low, GuidanceValue::Percent("28%".to_string()));
        assert_eq!(margin.high, GuidanceValue::Percent("29%".to_string()));
        assert_eq!(margin.average, GuidanceValue::Percent("28.5%".to_string()));

        let growth = &parsed.rows[1];
        assert_eq!(growth.low, GuidanceValue::Percent("-5%".to_string()));
        assert_eq!(growth.period_type, PeriodType::Quarter);
    }

    #[test]
    fn test_billion_units() {
        let text = table(&[
            "| Revenue | $7.6 billion to $7.8 billion | Q2 FY25 | Quarter | 7.6 | $7.8B | 7.7 |",
            "| CapEx | about $500 million | FY25 | Full Year | $500 million | 500 | 500M |",
        ]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();

        let revenue = &parsed.rows[0];
        assert_eq!(revenue.low, GuidanceValue::Number(7600.0));
        assert_eq!(revenue.high, GuidanceValue::Number(7800.0));
        assert_eq!(revenue.average, GuidanceValue::Number(7700.0));

        let capex = &parsed.rows[1];
        assert_eq!(capex.metric, "CapEx");
        for value in [&capex.low, &capex.high, &capex.average] {
            assert_eq!(value, &GuidanceValue::Number(500.0));
        }
    }

    #[test]
    fn test_negative_and_text_cells() {
        let text = table(&[
            "| Net income | loss of $1 to $2 | FY25 | Full Year | (1) | -2 | about 1.5 |",
            "| Tax rate | mid-teens | FY25 | Full Year | mid | teens | - |",
        ]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();

        let income = &parsed.rows[0];
        assert_eq!(income.low, GuidanceValue::Number(-1.0));
        assert_eq!(income.high, GuidanceValue::Number(-2.0));
        assert_eq!(income.average, GuidanceValue::Number(1.5));

        let tax = &parsed.rows[1];
        assert_eq!(tax.metric, "Tax Rate");
        for value in [&tax.low, &tax.high, &tax.average] {
            assert_eq!(value, &GuidanceValue::Text("mid-teens".to_string()));
        }
    }

    #[test]
    fn test_mixed_cells_become_all_numeric() {
        let text = table(&[
            "| EPS | $1.00 to $1.10 | FY25 | Full Year | 1.00 | 1.10 | approx 1.05 |",
            "| EPS (GAAP) | $1.00 to $1.10 | Q1 FY25 | Quarter | 1.00 | 1.10 | midpoint |",
            "| Revenue | $10 billion | FY25 | Full Year | 10 | N/A | |",
            "| Gross margin | about 40% | FY25 | Full Year | TBD | roughly 40% | 39% |",
        ]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();

        assert_eq!(parsed.rows[0].average, GuidanceValue::Number(1.05));
        assert_eq!(parsed.rows[1].average, GuidanceValue::Number(1.05));
        for value in [&parsed.rows[2].low, &parsed.rows[2].high, &parsed.rows[2].average] {
            assert_eq!(value, &GuidanceValue::Number(10000.0));
        }
        assert_eq!(parsed.rows[3].low, GuidanceValue::Percent("40%".to_string()));
        assert_eq!(parsed.rows[3].high, GuidanceValue::Percent("40%".to_string()));
        assert_eq!(parsed.rows[3].average, GuidanceValue::Percent("39%".to_string()));
        for row in &parsed.rows {
            assert!(!row.low.is_qualitative() && !row.high.is_qualitative() && !row.average.is_qualitative());
        }
    }

    #[test]
    fn test_non_finite_percent_cells() {
        let text = table(&["| Operating margin | 20% | FY25 | Full Year | inf% | 20% | nan% |"]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();
        let row = &parsed.rows[0];

        for value in [&row.low, &row.high, &row.average] {
            assert_eq!(value, &GuidanceValue::Percent("20%".to_string()));
        }
    }

    #[test]
    fn test_gaap_split() {
        let text = table(&[
            "| Diluted EPS | 1.00 on a GAAP basis and 1.10 on a non-GAAP basis | Q3 FY25 | Quarter | N/A | N/A | N/A |",
        ]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.rows[0].metric, "EPS (GAAP)");
        assert_eq!(parsed.rows[0].value_or_range, "1.00");
        assert_eq!(parsed.rows[0].low, GuidanceValue::Number(1.0));
        assert_eq!(parsed.rows[1].metric, "EPS (Non-GAAP)");
        assert_eq!(parsed.rows[1].value_or_range, "1.10");
        assert_eq!(parsed.rows[1].high, GuidanceValue::Number(1.1));
        assert!(parsed.rows.iter().all(|r| r.source_type == "SEC 8-K"));
    }

    #[test]
    fn test_gaap_split_inherits_numeric_cells() {
        let text = table(&[
            "| Operating margin | 20% to 21% on a GAAP basis and 25% on a non-GAAP basis | FY25 | Full Year | 20 | 25 | |",
        ]);
        let parsed = TableParser::new().parse(&text, "SEC 8-K").unwrap();

        assert_eq!(parsed.rows[0].value_or_range, "20% to 21%");
        assert_eq!(parsed.rows[0].low, GuidanceValue::Percent("20%".to_string()));
        assert_eq!(parsed.rows[0].average, GuidanceValue::Percent("20.5%".to_string()));
        assert_eq!(parsed.rows[1].value_or_range, "25%");
        assert_eq!(parsed.rows[1].average, GuidanceValue::Percent("25%".to_string()));
    }

    #[test]
    fn test_skips_empty_rows_and_pads_short_rows() {
        let text = table(&["| | | | | | | |", "| Revenue | growth | FY25 |"]);
        let parsed = TableParser::new().parse(&text, "Upload").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.rows[0].low, GuidanceValue::Text("growth".to_string()));
    }

    #[test]
    fn test_prose_around_table_is_ignored() {
        let text = format!(
            "Here is the guidance:\n\n{}\n\nLet me know if you need more.",
            table(&["| Revenue | $10B | FY25 | Full Year | 10000 | 10000 | 10000 |"])
        );
        let grid = parse_grid(&text).unwrap();
        assert_eq!(grid.metrics(), vec!["Revenue".to_string()]);
    }
}
