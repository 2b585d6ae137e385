//! Rule-based document tagging
//!
//! Infers ticker, year, quarter and document type for uploaded files from
//! the file name and the opening text, with a confidence per field. Also
//! holds the earnings-release check applied to SEC exhibits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Characters of content used for inference and confidence scoring
const PREVIEW_CHARS: usize = 2500;

static EXCHANGE_TICKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:NYSE American|NYSE|NASDAQ|Nasdaq GS|Nasdaq)\s*:\s*([A-Z]{1,5})\b")
        .expect("valid regex")
});

static UPPERCASE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("valid regex"));

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").expect("valid regex"));

static QUARTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:q([1-4])|([1-4])q|(first|second|third|fourth)\s+quarter)").expect("valid regex")
});

/// Uppercase words that are never tickers
const TICKER_STOPWORDS: &[&str] = &[
    "THE", "AND", "FOR", "INC", "CORP", "LLC", "LTD", "CO", "CEO", "CFO", "COO", "CTO", "GAAP",
    "EPS", "USD", "SEC", "NYSE", "FY", "FORM", "II", "III", "IV", "US", "USA", "PDF", "DOCX",
    "HTML", "TXT", "ARR", "EBIT", "IR", "AI", "PR", "OK", "Q", "NA", "TBD", "ESG", "LP", "PLC",
];

const EARNINGS_KEYWORDS: &[&str] = &[
    "earnings",
    "quarterly results",
    "financial results",
    "revenue",
    "net income",
    "earnings per share",
    "eps",
    "quarterly earnings",
    "fiscal quarter",
    "q1",
    "q2",
    "q3",
    "q4",
    "first quarter",
    "second quarter",
    "third quarter",
    "fourth quarter",
];

const STRONG_EXCLUSIONS: &[&str] = &[
    "dividend declaration only",
    "stock split announcement",
    "director appointment",
    "officer appointment",
    "merger agreement",
    "acquisition agreement",
];

/// Whether an exhibit reads like an earnings release
///
/// Needs at least three earnings keywords, and either five or more keywords
/// or none of the strong exclusion phrases.
pub fn looks_like_earnings_release(text: &str) -> bool {
    let lower = text.to_lowercase();
    let keywords = EARNINGS_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .count();
    let excluded = STRONG_EXCLUSIONS.iter().any(|e| lower.contains(e));

    keywords >= 3 && (keywords >= 5 || !excluded)
}

/// Kind of uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Presentation,
    PreparedRemarks,
    Transcript,
    EarningsRelease,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Presentation => "presentation",
            Self::PreparedRemarks => "prepared_remarks",
            Self::Transcript => "transcript",
            Self::EarningsRelease => "earnings_release",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-field confidence in [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagConfidence {
    pub ticker: f32,
    pub year: f32,
    pub quarter: f32,
    pub document_type: f32,
}

impl TagConfidence {
    /// Mean of the four field confidences
    pub fn overall(&self) -> f32 {
        (self.ticker + self.year + self.quarter + self.document_type) / 4.0
    }
}

/// Inferred document metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentTags {
    pub ticker: Option<String>,
    pub year: Option<u16>,
    /// "Q1" .. "Q4"
    pub quarter: Option<String>,
    pub document_type: DocumentType,
    pub confidence: TagConfidence,
}

/// Rule-based metadata tagger
#[derive(Debug, Clone, Default)]
pub struct DocumentTagger;

impl DocumentTagger {
    pub fn new() -> Self {
        Self
    }

    /// Tag a document from its file name and text
    pub fn tag(&self, file_name: &str, text: &str) -> DocumentTags {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        // Underscores are word characters, so "MSFT_Q2_2024" hides its tokens from \b
        let name_words = file_name.replace(['_', '-', '.'], " ");

        let ticker = ticker_from_content(&preview, true)
            .or_else(|| ticker_from_file_name(file_name))
            .or_else(|| ticker_from_content(&preview, false));
        let year = find_year(&name_words).or_else(|| find_year(&preview));
        let quarter = find_quarter(&name_words).or_else(|| find_quarter(&preview));
        let document_type = classify(file_name, text);

        let confidence = TagConfidence {
            ticker: ticker
                .as_deref()
                .map_or(0.0, |t| (count_word(&preview, t, true) as f32 * 0.2).min(1.0)),
            year: year.map_or(0.0, |y| {
                (count_word(&preview, &y.to_string(), false) as f32 * 0.3).min(1.0)
            }),
            quarter: quarter.as_deref().map_or(0.0, |q| {
                let digit = q.trim_start_matches('Q');
                if preview.contains(q) || preview.contains(digit) {
                    0.8
                } else {
                    0.3
                }
            }),
            document_type: 0.7,
        };

        tracing::debug!(
            "Tagged {}: ticker={:?} year={:?} quarter={:?} type={} (confidence {:.2})",
            file_name,
            ticker,
            year,
            quarter,
            document_type,
            confidence.overall()
        );

        DocumentTags {
            ticker,
            year,
            quarter,
            document_type,
            confidence,
        }
    }
}

fn is_ticker_candidate(word: &str) -> bool {
    (1..=5).contains(&word.len())
        && word.chars().all(|c| c.is_ascii_uppercase())
        && !TICKER_STOPWORDS.contains(&word)
}

/// Exchange-qualified ticker, or the first plausible uppercase word
fn ticker_from_content(text: &str, exchange_only: bool) -> Option<String> {
    if exchange_only {
        return EXCHANGE_TICKER.captures(text).map(|c| c[1].to_string());
    }
    UPPERCASE_WORD
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|w| is_ticker_candidate(w))
        .map(str::to_string)
}

fn ticker_from_file_name(file_name: &str) -> Option<String> {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| token.len() >= 2 && is_ticker_candidate(token))
        .map(str::to_string)
}

fn find_year(text: &str) -> Option<u16> {
    YEAR.captures(text).and_then(|c| c[1].parse().ok())
}

fn find_quarter(text: &str) -> Option<String> {
    let caps = QUARTER.captures(text)?;
    let digit = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            caps.get(3).map(|m| {
                match m.as_str().to_lowercase().as_str() {
                    "first" => "1",
                    "second" => "2",
                    "third" => "3",
                    _ => "4",
                }
                .to_string()
            })
        })?;
    Some(format!("Q{digit}"))
}

fn count_word(text: &str, word: &str, ignore_case: bool) -> usize {
    let flags = if ignore_case { "(?i)" } else { "" };
    Regex::new(&format!(r"{flags}\b{}\b", regex::escape(word)))
        .map(|re| re.find_iter(text).count())
        .unwrap_or(0)
}

fn classify(file_name: &str, text: &str) -> DocumentType {
    let name = file_name.to_lowercase();
    let content = text.to_lowercase();
    let any = |haystack: &str, words: &[&str]| words.iter().any(|w| haystack.contains(w));

    if any(&name, &["presentation", "slides", "deck"]) {
        DocumentType::Presentation
    } else if any(&name, &["prepared", "remarks", "script"]) {
        DocumentType::PreparedRemarks
    } else if any(&name, &["transcript", "call"]) || any(&content, &["earnings call", "conference call"]) {
        DocumentType::Transcript
    } else if any(&content, &["earnings release", "press release"]) {
        DocumentType::EarningsRelease
    } else {
        DocumentType::Other
    }
}
