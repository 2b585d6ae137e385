//! Guidex Extractor - Guidance candidate selection and table post-processing
//!
//! Turns raw document text into the slice of text worth sending to the
//! extraction call, and turns the call's pipe table back into typed rows:
//! - `segmenter`: slides, guidance sections or paragraphs
//! - `filter`: keyword scoring, boilerplate removal, sentence selection
//! - `normalizer`: canonical metric names with GAAP qualifiers
//! - `table`: pipe table parsing and numeric coercion
//! - `duplicates`: conflicting guidance across sources
//! - `tagger`: metadata inference for uploaded files

pub mod duplicates;
pub mod filter;
pub mod normalizer;
pub mod segmenter;
pub mod table;
pub mod tagger;

pub use duplicates::{DuplicateDetector, DuplicateGroup, GroupKey, LlmConflictDetector};
pub use filter::{split_sentences, FilterOutput, FilterStats, GuidanceFilter};
pub use normalizer::{LlmMetricNormalizer, MetricNormalizer, Qualifier};
pub use segmenter::TextSegmenter;
pub use table::{parse_grid, TableGrid, TableParser, TableRejection};
pub use tagger::{looks_like_earnings_release, DocumentTagger, DocumentTags, DocumentType};
