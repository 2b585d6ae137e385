//! Guidex Configuration Management
//!
//! Handles configuration from environment variables and TOML config files,
//! with defaults matching the empirically tuned extraction heuristics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Text segmentation thresholds
    pub segmenter: SegmenterConfig,

    /// Guidance filter thresholds
    pub filter: FilterConfig,

    /// Metric normalization policy
    pub normalizer: NormalizerConfig,

    /// Duplicate detection policy
    pub duplicates: DuplicateConfig,

    /// Pipeline orchestration
    pub pipeline: PipelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.openai_base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }

        // Pipeline
        if let Ok(value) = std::env::var("GUIDEX_MAX_CONCURRENCY") {
            config.pipeline.max_concurrency =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "GUIDEX_MAX_CONCURRENCY".to_string(),
                    value,
                })?;
        }

        // Duplicate detection / normalization
        if let Ok(value) = std::env::var("GUIDEX_GROUPING_KEY") {
            config.duplicates.grouping_key = value.parse()?;
        }
        if let Ok(value) = std::env::var("GUIDEX_USE_LLM_DETECTOR") {
            config.duplicates.use_llm = parse_bool("GUIDEX_USE_LLM_DETECTOR", &value)?;
        }
        if let Ok(value) = std::env::var("GUIDEX_USE_LLM_NORMALIZER") {
            config.normalizer.use_llm = parse_bool("GUIDEX_USE_LLM_NORMALIZER", &value)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let defaults = Self::default();

        // Only override if env values differ from defaults
        if env_config.llm.provider != defaults.llm.provider {
            self.llm.provider = env_config.llm.provider;
        }
        if env_config.llm.model != defaults.llm.model {
            self.llm.model = env_config.llm.model;
        }
        if env_config.llm.ollama_url != defaults.llm.ollama_url {
            self.llm.ollama_url = env_config.llm.ollama_url;
        }
        if env_config.pipeline.max_concurrency != defaults.pipeline.max_concurrency {
            self.pipeline.max_concurrency = env_config.pipeline.max_concurrency;
        }
        if env_config.duplicates.grouping_key != defaults.duplicates.grouping_key {
            self.duplicates.grouping_key = env_config.duplicates.grouping_key;
        }
        if env_config.duplicates.use_llm {
            self.duplicates.use_llm = true;
        }
        if env_config.normalizer.use_llm {
            self.normalizer.use_llm = true;
        }
        if env_config.logging.level != defaults.logging.level {
            self.logging.level = env_config.logging.level;
        }

        // Always use env for sensitive values
        if env_config.llm.openai_api_key.is_some() {
            self.llm.openai_api_key = env_config.llm.openai_api_key;
        }
        if env_config.llm.openai_base_url.is_some() {
            self.llm.openai_base_url = env_config.llm.openai_base_url;
        }

        Ok(self)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.max_concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        if self.filter.max_slides == 0 || self.filter.max_paragraphs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "filter.max_slides / filter.max_paragraphs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.segmenter.min_slide_chars > self.segmenter.large_document_chars {
            return Err(ConfigError::InvalidValue {
                key: "segmenter.min_slide_chars".to_string(),
                value: self.segmenter.min_slide_chars.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for extraction calls
    pub temperature: f32,

    /// Temperature for normalization / duplicate-review calls
    pub review_temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            review_temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Text segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Documents longer than this many characters get structural splitting
    pub large_document_chars: usize,

    /// Slides shorter than this are dropped
    pub min_slide_chars: usize,

    /// Sections and paragraphs shorter than this are dropped
    pub min_paragraph_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            large_document_chars: 50_000,
            min_slide_chars: 100,
            min_paragraph_chars: 50,
        }
    }
}

/// Which filter a source's text goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterProfile {
    /// Segment scoring followed by the two-condition sentence filter
    Strict,
    /// Whole paragraphs with any guidance or finance vocabulary
    Lenient,
}

/// Guidance filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum keyword score for a slide to be kept
    pub slide_min_score: u32,

    /// Minimum keyword score for a section or paragraph to be kept
    pub paragraph_min_score: u32,

    /// Slides kept, in document order
    pub max_slides: usize,

    /// Sections or paragraphs kept, in document order
    pub max_paragraphs: usize,

    /// Size budget of the assembled text, in characters
    pub max_output_chars: usize,

    /// Filter applied to earnings-call transcripts
    pub transcript_profile: FilterProfile,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            slide_min_score: 2,
            paragraph_min_score: 3,
            max_slides: 15,
            max_paragraphs: 10,
            max_output_chars: 100_000,
            transcript_profile: FilterProfile::Strict,
        }
    }
}

/// How "adjusted" metrics are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustedPolicy {
    /// "adjusted" means Non-GAAP
    AsNonGaap,
    /// "adjusted" gets its own "(Adjusted)" marker
    Distinct,
}

/// Metric normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub adjusted_policy: AdjustedPolicy,

    /// Ask the LLM for a label mapping before the rule table
    pub use_llm: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            adjusted_policy: AdjustedPolicy::AsNonGaap,
            use_llm: false,
        }
    }
}

/// Columns rows are grouped by when looking for conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    MetricPeriod,
    MetricPeriodFilingDate,
}

impl std::str::FromStr for GroupingKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "metric_period" => Ok(Self::MetricPeriod),
            "metric_period_filing_date" => Ok(Self::MetricPeriodFilingDate),
            _ => Err(ConfigError::InvalidValue {
                key: "GUIDEX_GROUPING_KEY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Duplicate detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    pub grouping_key: GroupingKey,

    /// Ask the LLM to review candidate groups
    pub use_llm: bool,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            grouping_key: GroupingKey::MetricPeriodFilingDate,
            use_llm: false,
        }
    }
}

/// Pipeline orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Documents processed concurrently
    pub max_concurrency: usize,

    /// Documents shorter than this are rejected as insufficient
    pub min_document_chars: usize,

    /// Skip SEC exhibits that do not read like an earnings release
    pub validate_earnings_release: bool,

    /// Filing date used when nothing better is known
    pub default_filing_date: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            min_document_chars: 50,
            validate_earnings_release: true,
            default_filing_date: "Most Recent".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.segmenter.large_document_chars, 50_000);
        assert_eq!(config.filter.slide_min_score, 2);
        assert_eq!(config.filter.paragraph_min_score, 3);
        assert_eq!(config.filter.max_slides, 15);
        assert_eq!(config.filter.max_paragraphs, 10);
        assert_eq!(
            config.duplicates.grouping_key,
            GroupingKey::MetricPeriodFilingDate
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_grouping_key_parse() {
        assert_eq!(
            "metric-period".parse::<GroupingKey>().unwrap(),
            GroupingKey::MetricPeriod
        );
        assert_eq!(
            "METRIC_PERIOD_FILING_DATE".parse::<GroupingKey>().unwrap(),
            GroupingKey::MetricPeriodFilingDate
        );
        assert!("source_pair".parse::<GroupingKey>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "yes").unwrap());
        assert!(!parse_bool("K", "0").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn test_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[filter]\nparagraph_min_score = 4\ntranscript_profile = \"lenient\"\n\n[duplicates]\ngrouping_key = \"metric_period\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.filter.paragraph_min_score, 4);
        assert_eq!(config.filter.slide_min_score, 2);
        assert_eq!(config.filter.transcript_profile, FilterProfile::Lenient);
        assert_eq!(config.duplicates.grouping_key, GroupingKey::MetricPeriod);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/guidex.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.max_concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
