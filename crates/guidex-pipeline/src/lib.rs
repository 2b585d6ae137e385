//! Guidex Pipeline - Guidance extraction orchestrator
//!
//! Runs every document through segmenting, filtering, the extraction call
//! and table parsing, then assembles the combined table in source-group
//! order and flags conflicting guidance.

pub mod export;
pub mod llm;
pub mod prompt;

pub use export::{ExportError, XlsxExporter};
pub use llm::{create_llm_client, create_review_client, OllamaClient, OpenAiClient};

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use guidex_core::{
    AppConfig, CombinedTable, Document, FilterProfile, GuidanceTable, LlmClient, Result,
    SourceKind,
};
use guidex_extractor::{
    looks_like_earnings_release, parse_grid, DuplicateDetector, GuidanceFilter,
    LlmConflictDetector, LlmMetricNormalizer, MetricNormalizer, TableParser, TableRejection,
    TextSegmenter,
};

// ============================================================================
// Outcomes
// ============================================================================

/// What happened to one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Text shorter than the configured minimum
    InputTooShort,
    /// SEC exhibit that does not read like an earnings release
    NotEarningsRelease,
    /// Nothing guidance-like in the text, or an empty table back
    NoGuidanceFound,
    /// The extraction response could not be read as a guidance table
    MalformedExtractionOutput {
        #[serde(serialize_with = "serialize_rejection")]
        rejection: TableRejection,
    },
    /// Rows were extracted
    Extracted { rows: usize },
    /// The extraction call or a later step failed
    Failed { error: String },
}

fn serialize_rejection<S: serde::Serializer>(
    rejection: &TableRejection,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(rejection)
}

impl DocumentOutcome {
    /// Whether the document contributed rows
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputTooShort => "input_too_short",
            Self::NotEarningsRelease => "not_earnings_release",
            Self::NoGuidanceFound => "no_guidance_found",
            Self::MalformedExtractionOutput { .. } => "malformed_extraction_output",
            Self::Extracted { .. } => "extracted",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for DocumentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedExtractionOutput { rejection } => {
                write!(f, "{}: {}", self.as_str(), rejection)
            }
            Self::Extracted { rows } => write!(f, "extracted {rows} rows"),
            Self::Failed { error } => write!(f, "failed: {error}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Per-document entry of a pipeline report
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document_id: String,
    pub source_kind: SourceKind,
    pub filing_date: String,
    pub outcome: DocumentOutcome,
    /// Indices this document's rows occupy in the combined table
    pub rows: Range<usize>,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub combined: CombinedTable,
    pub flagged: BTreeSet<usize>,
    pub documents: Vec<DocumentReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Number of documents that contributed rows
    pub fn extracted_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| d.outcome.is_extracted())
            .count()
    }

    /// Render the combined table as markdown with flagged rows marked
    pub fn to_markdown(&self) -> String {
        self.combined.to_markdown(&self.flagged)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Guidance extraction pipeline
pub struct GuidancePipeline {
    config: AppConfig,
    client: Arc<dyn LlmClient>,
    review_client: Option<Arc<dyn LlmClient>>,
    segmenter: TextSegmenter,
    filter: GuidanceFilter,
    parser: TableParser,
    detector: DuplicateDetector,
}

impl GuidancePipeline {
    /// Create a pipeline around an extraction client
    pub fn new(config: AppConfig, client: Arc<dyn LlmClient>) -> Self {
        Self {
            segmenter: TextSegmenter::with_config(config.segmenter.clone()),
            filter: GuidanceFilter::with_config(config.filter.clone()),
            parser: TableParser::with_normalizer(MetricNormalizer::with_config(&config.normalizer)),
            detector: DuplicateDetector::with_config(&config.duplicates),
            config,
            client,
            review_client: None,
        }
    }

    /// Create a pipeline with clients built from the LLM configuration
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
        let needs_review = config.normalizer.use_llm || config.duplicates.use_llm;
        let review_client: Option<Arc<dyn LlmClient>> = if needs_review {
            Some(Arc::from(create_review_client(&config.llm)?))
        } else {
            None
        };

        let mut pipeline = Self::new(config, client);
        pipeline.review_client = review_client;
        Ok(pipeline)
    }

    /// Client used for LLM normalization and conflict review
    pub fn with_review_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.review_client = Some(client);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Filing date for a document: its own, the run's SEC date for
    /// transcripts, its period label, or the configured default
    fn resolve_filing_date(&self, document: &Document, sec_date: Option<&str>) -> String {
        document
            .filing_date
            .clone()
            .or_else(|| match document.source_kind {
                SourceKind::Transcript => sec_date.map(str::to_string),
                _ => None,
            })
            .or_else(|| document.period_label.clone())
            .unwrap_or_else(|| self.config.pipeline.default_filing_date.clone())
    }

    /// Process all documents and assemble the combined table
    pub async fn run(&self, mut documents: Vec<Document>) -> PipelineReport {
        let started_at = Utc::now();
        documents.sort_by_key(|d| d.source_kind);

        let sec_date = documents
            .iter()
            .find(|d| d.source_kind == SourceKind::Sec)
            .and_then(|d| d.filing_date.clone());

        tracing::info!(
            "Processing {} documents (max {} in flight)",
            documents.len(),
            self.config.pipeline.max_concurrency
        );

        let jobs = documents.into_iter().map(|document| {
            let filing_date = self.resolve_filing_date(&document, sec_date.as_deref());
            async move {
                let (outcome, table) = self.process(&document, &filing_date).await;
                (document, filing_date, outcome, table)
            }
        });

        let results: Vec<_> = stream::iter(jobs)
            .buffered(self.config.pipeline.max_concurrency.max(1))
            .collect()
            .await;

        let mut combined = CombinedTable::new();
        let mut reports = Vec::with_capacity(results.len());
        for (document, filing_date, outcome, table) in results {
            let rows = combined.append(table);
            tracing::info!(
                "Document {} ({}): {}",
                document.id,
                document.source_kind,
                outcome
            );
            reports.push(DocumentReport {
                document_id: document.id.to_string(),
                source_kind: document.source_kind,
                filing_date,
                outcome,
                rows,
            });
        }

        let flagged = self.detect(&combined).await;
        tracing::info!(
            "Combined table: {} rows, {} flagged",
            combined.len(),
            flagged.len()
        );

        PipelineReport {
            combined,
            flagged,
            documents: reports,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Flag conflicting rows with the configured detector
    pub async fn detect(&self, combined: &CombinedTable) -> BTreeSet<usize> {
        match (&self.review_client, self.config.duplicates.use_llm) {
            (Some(client), true) => {
                LlmConflictDetector::new(client.clone(), self.detector.clone())
                    .detect(combined)
                    .await
            }
            _ => self.detector.detect(combined),
        }
    }

    async fn process(&self, document: &Document, filing_date: &str) -> (DocumentOutcome, GuidanceTable) {
        match self.extract(document, filing_date).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    "Extraction failed for {} ({}): {}",
                    document.id,
                    document.source_kind,
                    e
                );
                (
                    DocumentOutcome::Failed {
                        error: e.to_string(),
                    },
                    GuidanceTable::new(),
                )
            }
        }
    }

    /// Run one document through filter, extraction call and table parsing
    async fn extract(
        &self,
        document: &Document,
        filing_date: &str,
    ) -> Result<(DocumentOutcome, GuidanceTable)> {
        let nothing = |outcome: DocumentOutcome| -> Result<(DocumentOutcome, GuidanceTable)> {
            Ok((outcome, GuidanceTable::new()))
        };

        if document.char_count() < self.config.pipeline.min_document_chars {
            return nothing(DocumentOutcome::InputTooShort);
        }

        if document.source_kind == SourceKind::Sec
            && self.config.pipeline.validate_earnings_release
            && !looks_like_earnings_release(&document.raw_text)
        {
            return nothing(DocumentOutcome::NotEarningsRelease);
        }

        let filtered = match (document.source_kind, self.filter.config().transcript_profile) {
            (SourceKind::Transcript, FilterProfile::Lenient) => {
                self.filter.filter_lenient(&document.raw_text)
            }
            _ => self.filter.filter(self.segmenter.segment(&document.raw_text)),
        };
        tracing::debug!(
            "Filtered {} chars down to {} ({} of {} sentences kept)",
            document.char_count(),
            filtered.text.len(),
            filtered.stats.sentences_kept,
            filtered.stats.sentences_seen
        );
        if !filtered.found {
            return nothing(DocumentOutcome::NoGuidanceFound);
        }

        let prompt = prompt::extraction_prompt(document.source_kind, &document.ticker, &filtered.text);
        let response = self.client.generate(&prompt).await?;

        let grid = match parse_grid(&response) {
            Ok(grid) => grid,
            Err(TableRejection::NoDataRows) => return nothing(DocumentOutcome::NoGuidanceFound),
            Err(rejection) => {
                tracing::debug!("Extraction response rejected: {}", rejection);
                return nothing(DocumentOutcome::MalformedExtractionOutput { rejection });
            }
        };

        let source_type = document.source_kind.label();
        let rules = self.parser.normalizer();
        let mut table = match (&self.review_client, self.config.normalizer.use_llm) {
            (Some(client), true) => {
                let mapping = LlmMetricNormalizer::new(client.clone(), rules.clone())
                    .normalize_all(&grid.metrics())
                    .await;
                self.parser.assemble(grid, source_type, |label| {
                    mapping
                        .get(label.trim())
                        .cloned()
                        .unwrap_or_else(|| rules.normalize(label))
                })
            }
            _ => self
                .parser
                .assemble(grid, source_type, |label| rules.normalize(label)),
        };

        if table.is_empty() {
            return nothing(DocumentOutcome::NoGuidanceFound);
        }

        table.stamp_provenance(filing_date, document.filing_url.as_deref());
        Ok((DocumentOutcome::Extracted { rows: table.len() }, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidex_core::GuidexError;

    struct FixedClient(String);

    #[async_trait::async_trait]
    impl LlmClient for FixedClient {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn pipeline(response: &str) -> GuidancePipeline {
        GuidancePipeline::new(AppConfig::default(), Arc::new(FixedClient(response.to_string())))
    }

    #[test]
    fn test_filing_date_resolution() {
        let p = pipeline("");
        let dated = Document::new(SourceKind::Upload, "X", "t").with_filing_date("2025-01-30");
        let transcript = Document::new(SourceKind::Transcript, "X", "t").with_period_label("Q2 FY25");
        let upload = Document::new(SourceKind::Upload, "X", "t").with_period_label("Q2 FY25");
        let bare = Document::new(SourceKind::Upload, "X", "t");

        assert_eq!(p.resolve_filing_date(&dated, Some("2024-10-01")), "2025-01-30");
        assert_eq!(p.resolve_filing_date(&transcript, Some("2024-10-01")), "2024-10-01");
        assert_eq!(p.resolve_filing_date(&transcript, None), "Q2 FY25");
        assert_eq!(p.resolve_filing_date(&upload, Some("2024-10-01")), "Q2 FY25");
        assert_eq!(p.resolve_filing_date(&bare, None), "Most Recent");
    }

    #[test]
    fn test_outcome_display() {
        let outcome = DocumentOutcome::MalformedExtractionOutput {
            rejection: TableRejection::NotATable,
        };
        assert!(outcome.to_string().starts_with("malformed_extraction_output"));
        assert_eq!(DocumentOutcome::Extracted { rows: 3 }.to_string(), "extracted 3 rows");

        let json = serde_json::to_string(&DocumentOutcome::Failed {
            error: GuidexError::LlmError("timeout".into()).to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"outcome":"failed","error":"LLM error: timeout"}"#);
    }

    #[tokio::test]
    async fn test_short_input() {
        let report = pipeline("").run(vec![Document::new(SourceKind::Upload, "X", "tiny")]).await;
        assert_eq!(report.documents[0].outcome, DocumentOutcome::InputTooShort);
        assert!(report.combined.is_empty());
    }
}
