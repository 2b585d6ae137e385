//! Guidex Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout Guidex:
//! - Source documents (SEC exhibits, call transcripts, uploads) and text segments
//! - Guidance rows, cell values, and tables
//! - Common error types
//! - The LLM client trait used at the extraction boundary
//! - Configuration management

pub mod config;
pub mod guidance;

pub use config::{
    AdjustedPolicy, AppConfig, ConfigError, DuplicateConfig, FilterConfig, FilterProfile,
    GroupingKey, LlmConfig, LlmProvider, LoggingConfig, NormalizerConfig, PipelineConfig,
    SegmenterConfig,
};
pub use guidance::{
    Cell, Column, CombinedTable, GuidanceRow, GuidanceTable, GuidanceValue, PeriodType,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Guidex operations
#[derive(Error, Debug)]
pub enum GuidexError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for GuidexError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GuidexError>;

// ============================================================================
// Source Documents
// ============================================================================

/// Where a document came from
///
/// The derived ordering is the source-group order used when assembling the
/// combined table: SEC filings first, then transcripts, then uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sec,
    Transcript,
    Upload,
}

impl SourceKind {
    /// Label written into the `source_type` column of extracted rows
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sec => "SEC 8-K",
            Self::Transcript => "Transcript",
            Self::Upload => "Upload",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sec => write!(f, "sec"),
            Self::Transcript => write!(f, "transcript"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = GuidexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sec" | "8-k" | "8k" | "sec 8-k" => Ok(Self::Sec),
            "transcript" | "call" => Ok(Self::Transcript),
            "upload" | "document" => Ok(Self::Upload),
            other => Err(GuidexError::ValidationError(format!(
                "unknown source kind: {other}"
            ))),
        }
    }
}

/// A unit of text to be mined for guidance
///
/// Built once per input and never mutated by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (used to correlate log lines)
    pub id: Uuid,

    /// Source category
    pub source_kind: SourceKind,

    /// Extracted plain text
    pub raw_text: String,

    /// Ticker symbol the guidance belongs to
    pub ticker: String,

    /// Fiscal period this document reports on (e.g. "Q3 FY24")
    pub period_label: Option<String>,

    /// Filing or earnings-call date
    pub filing_date: Option<String>,

    /// URL or descriptive origin of the document
    pub filing_url: Option<String>,
}

impl Document {
    /// Create a new document
    pub fn new(
        source_kind: SourceKind,
        ticker: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_kind,
            raw_text: raw_text.into(),
            ticker: ticker.into(),
            period_label: None,
            filing_date: None,
            filing_url: None,
        }
    }

    /// Set the fiscal period label
    pub fn with_period_label(mut self, label: impl Into<String>) -> Self {
        self.period_label = Some(label.into());
        self
    }

    /// Set the filing date
    pub fn with_filing_date(mut self, date: impl Into<String>) -> Self {
        self.filing_date = Some(date.into());
        self
    }

    /// Set the filing URL / origin
    pub fn with_filing_url(mut self, url: impl Into<String>) -> Self {
        self.filing_url = Some(url.into());
        self
    }

    /// Character count of the raw text
    pub fn char_count(&self) -> usize {
        self.raw_text.chars().count()
    }
}

// ============================================================================
// Segments
// ============================================================================

/// How a segment was cut from its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Blank-line paragraph of a small document; never score-gated
    Pooled,
    /// Slide of a presentation deck
    Slide,
    /// Span between two guidance section headers
    Section,
    /// Blank-line paragraph of a large document
    Paragraph,
}

/// A contiguous slice of document text with its guidance score
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    pub kind: SegmentKind,
    /// Section header the segment sits under, if any
    pub heading: Option<String>,
    pub guidance_score: f32,
}

impl Segment {
    /// Create an unscored segment
    pub fn new(text: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            text: text.into(),
            kind,
            heading: None,
            guidance_score: 0.0,
        }
    }

    /// Set the section heading
    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
///
/// This is the extraction-call boundary: the core hands over a prompt and
/// receives free text back.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get client name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
