//! Guidex CLI - Command-line interface
//!
//! Usage:
//!   guidex extract --ticker MSFT --sec ex99.htm --transcript call.txt --output guidance.xlsx
//!   guidex filter <path> [--source sec|transcript|upload]
//!   guidex parse <response.md> [--source-type "SEC 8-K"]
//!   guidex normalize <label>...
//!   guidex detect <combined.json> [--grouping metric-period]
//!   guidex tag <path>

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guidex_core::{
    AppConfig, CombinedTable, Document, FilterProfile, GroupingKey, LlmClient, LoggingConfig,
    SourceKind,
};
use guidex_extractor::{
    DocumentTagger, DuplicateDetector, GuidanceFilter, LlmConflictDetector, LlmMetricNormalizer,
    MetricNormalizer, TableParser, TextSegmenter,
};
use guidex_parser::DocumentLoader;
use guidex_pipeline::export::{read_json, write_json};
use guidex_pipeline::{create_review_client, GuidancePipeline, XlsxExporter};

#[derive(Parser)]
#[command(name = "guidex")]
#[command(about = "Financial guidance extraction from earnings releases and transcripts")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract guidance from a set of documents into one combined table
    Extract {
        /// Company ticker
        #[arg(long)]
        ticker: String,
        /// SEC 8-K earnings release exhibits
        #[arg(long)]
        sec: Vec<PathBuf>,
        /// Earnings call transcripts
        #[arg(long)]
        transcript: Vec<PathBuf>,
        /// Other uploaded documents
        #[arg(long)]
        upload: Vec<PathBuf>,
        /// Filing date of the SEC documents (YYYY-MM-DD)
        #[arg(long)]
        filing_date: Option<String>,
        /// Filing URL of the SEC documents
        #[arg(long)]
        filing_url: Option<String>,
        /// Period label for transcripts and uploads, e.g. "Q2 FY25"
        #[arg(long)]
        period: Option<String>,
        /// XLSX output path
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON output path for the combined table
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Show the text a document is reduced to before extraction
    Filter {
        path: PathBuf,
        #[arg(long, default_value = "sec")]
        source: SourceKind,
    },
    /// Parse an extraction response table into guidance rows
    Parse {
        path: PathBuf,
        #[arg(long, default_value = "Upload")]
        source_type: String,
    },
    /// Map metric labels to canonical names
    Normalize {
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Flag conflicting rows in a combined table written by `extract --json`
    Detect {
        path: PathBuf,
        /// metric-period or metric-period-filing-date
        #[arg(long)]
        grouping: Option<GroupingKey>,
        /// XLSX output path with flagged rows highlighted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Infer ticker, year, quarter and document type
    Tag { path: PathBuf },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn review_client(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    Ok(Arc::from(create_review_client(&config.llm)?))
}

fn load_text(loader: &DocumentLoader, path: &Path) -> anyhow::Result<(String, String)> {
    let parsed = loader
        .load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::debug!(
        "Loaded {} ({}, {} chars, {} words, {} pages, title {:?})",
        parsed.file_path,
        parsed.file_type,
        parsed.char_count(),
        parsed.metadata.word_count.unwrap_or_default(),
        parsed
            .metadata
            .page_count
            .map_or_else(|| "?".to_string(), |n| n.to_string()),
        parsed.metadata.title
    );
    Ok((parsed.file_name().to_string(), parsed.content))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Extract {
            ticker,
            sec,
            transcript,
            upload,
            filing_date,
            filing_url,
            period,
            output,
            json,
        } => {
            let ticker = ticker.trim().to_uppercase();
            if ticker.is_empty() {
                bail!("--ticker must not be empty");
            }

            let loader = DocumentLoader::with_defaults();
            let mut documents = Vec::new();
            for (kind, paths) in [
                (SourceKind::Sec, sec),
                (SourceKind::Transcript, transcript),
                (SourceKind::Upload, upload),
            ] {
                for path in paths {
                    let (_, text) = load_text(&loader, &path)?;
                    let mut document = Document::new(kind, ticker.as_str(), text);
                    match kind {
                        SourceKind::Sec => {
                            if let Some(date) = &filing_date {
                                document = document.with_filing_date(date.as_str());
                            }
                            if let Some(url) = &filing_url {
                                document = document.with_filing_url(url.as_str());
                            }
                        }
                        SourceKind::Transcript | SourceKind::Upload => {
                            if let Some(label) = &period {
                                document = document.with_period_label(label.as_str());
                            }
                        }
                    }
                    documents.push(document);
                }
            }
            if documents.is_empty() {
                bail!("No documents given; use --sec, --transcript or --upload");
            }

            let pipeline = GuidancePipeline::from_config(config)?;
            let report = pipeline.run(documents).await;

            for document in &report.documents {
                eprintln!(
                    "{:<10} {:<14} {}",
                    document.source_kind, document.filing_date, document.outcome
                );
            }
            println!("{}", report.to_markdown());
            eprintln!(
                "{} rows from {} documents, {} flagged",
                report.combined.len(),
                report.extracted_count(),
                report.flagged.len()
            );

            if let Some(path) = output {
                XlsxExporter::new().write(&report.combined, &report.flagged, &path)?;
                eprintln!("Wrote {}", path.display());
            }
            if let Some(path) = json {
                write_json(&report.combined, &path)?;
                eprintln!("Wrote {}", path.display());
            }
        }
        Commands::Filter { path, source } => {
            let (_, text) = load_text(&DocumentLoader::with_defaults(), &path)?;
            let filter = GuidanceFilter::with_config(config.filter.clone());
            let output = match (source, config.filter.transcript_profile) {
                (SourceKind::Transcript, FilterProfile::Lenient) => filter.filter_lenient(&text),
                _ => {
                    let segments =
                        TextSegmenter::with_config(config.segmenter.clone()).segment(&text);
                    filter.filter(segments)
                }
            };

            eprintln!("{}", serde_json::to_string_pretty(&output.stats)?);
            if output.found {
                println!("{}", output.text);
            } else {
                eprintln!("No guidance-like text found");
            }
        }
        Commands::Parse { path, source_type } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let parser = TableParser::with_normalizer(MetricNormalizer::with_config(
                &config.normalizer,
            ));
            let table = parser
                .try_parse(&text, &source_type)
                .with_context(|| format!("{} is not a guidance table", path.display()))?;

            let mut combined = CombinedTable::new();
            combined.append(table);
            println!("{}", combined.to_markdown(&Default::default()));
        }
        Commands::Normalize { labels } => {
            let rules = MetricNormalizer::with_config(&config.normalizer);
            if config.normalizer.use_llm {
                let mapping = LlmMetricNormalizer::new(review_client(&config)?, rules.clone())
                    .normalize_all(&labels)
                    .await;
                for label in &labels {
                    let canonical = mapping
                        .get(label.trim())
                        .cloned()
                        .unwrap_or_else(|| rules.normalize(label));
                    println!("{label} → {canonical}");
                }
            } else {
                for label in &labels {
                    println!("{label} → {}", rules.normalize(label));
                }
            }
        }
        Commands::Detect {
            path,
            grouping,
            output,
        } => {
            let combined = read_json(&path)?;
            let mut detector = DuplicateDetector::with_config(&config.duplicates);
            if let Some(grouping) = grouping {
                detector = detector.with_grouping(grouping);
            }

            for group in detector.groups(&combined) {
                if group.conflicting {
                    tracing::info!(
                        "Conflict: {} / {} rows {:?}",
                        group.key.metric,
                        group.key.period,
                        group.rows
                    );
                }
            }

            let flagged = if config.duplicates.use_llm {
                LlmConflictDetector::new(review_client(&config)?, detector)
                    .detect(&combined)
                    .await
            } else {
                detector.detect(&combined)
            };

            println!("{}", combined.to_markdown(&flagged));
            eprintln!("{} of {} rows flagged", flagged.len(), combined.len());

            if let Some(path) = output {
                XlsxExporter::new().write(&combined, &flagged, &path)?;
                eprintln!("Wrote {}", path.display());
            }
        }
        Commands::Tag { path } => {
            let (file_name, text) = load_text(&DocumentLoader::with_defaults(), &path)?;
            let tags = DocumentTagger::new().tag(&file_name, &text);
            println!("{}", serde_json::to_string_pretty(&tags)?);
        }
    }

    Ok(())
}
