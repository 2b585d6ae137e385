//! Guidance candidate filtering
//!
//! Two stages narrow a document before the extraction call:
//! 1. segment scoring by forward-looking keyword density, with per-kind
//!    thresholds and caps
//! 2. a sentence filter that keeps only sentences carrying both a
//!    forward-looking indicator and financial content, minus boilerplate
//!
//! Transcripts can instead go through a lenient paragraph filter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use guidex_core::{FilterConfig, Segment, SegmentKind};

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("valid regex"));

static GUIDANCE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:expect|anticipate|forecast|project|estimate|target|outlook|guidance|plan|intend|believe|see|view|confident|optimistic)",
    )
    .expect("valid regex")
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)safe\s+harbor",
        r"(?is)forward-looking\s+statements.*risks",
        r"(?is)will\s+provide.*guidance.*connection\s+with.*earnings",
        r"(?is)conference\s+call.*webcast",
        r"(?is)undertakes\s+no\s+duty\s+to\s+update",
        r"(?is)actual\s+results\s+could\s+differ\s+materially",
        r"(?is)based\s+on\s+current\s+expectations.*subject\s+to\s+risks",
        r"(?is)disclaimer",
        r"(?is)replay.*available",
    ])
});

static FORWARD_INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:expect|anticipate|forecast|project|estimate|target)",
        r"(?i)(?:outlook|guidance)",
        r"(?i)for\s+(?:the\s+)?(?:fiscal|next|coming|upcoming)\s+(?:quarter|year)",
        r"(?i)(?:revenue|earnings|eps|margin|growth)\s+(?:is|to\s+be|will\s+be)\s+(?:expected|anticipated)",
    ])
});

static FINANCIAL_CONTENT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\$[\d,.]*\d(?:\s*billion|\s*million|B|M)?",
        r"\d+\.?\d*\s*%",
        r"(?i)\d+\.?\d*\s*(?:billion|million|percent)",
        r"(?i)(?:revenue|earnings|eps|margin|growth).*\$?\d+",
        r"(?i)\d+.*(?:quarter|year|q[1-4]|fy\d+)",
    ])
});

static LENIENT_VOCABULARY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)outlook|guidance|looking\s+ahead|going\s+forward|moving\s+forward",
        r"(?i)we\s+(?:see|anticipate|forecast|expect|believe|project|estimate|plan|intend)",
        r"(?i)for\s+(?:the\s+)?(?:fiscal|next|coming|upcoming|remainder|rest)",
        r"(?i)revenue|margin|growth|earnings|profit|cash\s+flow|capex|investment",
        r"(?i)full\s+year|next\s+quarter|\bq[1-4]\b|fiscal\s+(?:year|quarter)|\b20\d{2}\b",
        r"\$\d|\$\.\d|\d+%",
        r"(?i)range\s+of|between.*\band\b|approximately|about\s+\$",
    ])
});

static CFO_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)chief\s+financial\s+officer|\bcfo\b|finance\s+chief|financial\s+officer")
        .expect("valid regex")
});

static LENIENT_EXCLUSIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)safe\s+harbor",
        r"(?is)forward-looking\s+statements.*risks",
        r"(?is)disclaimer",
    ])
});

// ============================================================================
// Output Types
// ============================================================================

/// Counters describing one filter run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub segments_in: usize,
    pub segments_kept: usize,
    pub sentences_seen: usize,
    pub sentences_kept: usize,
    pub boilerplate_dropped: usize,
    /// Whether the size budget cut off further sentences
    pub truncated: bool,
}

/// Reduced text handed to the extraction call
#[derive(Debug, Clone, Default)]
pub struct FilterOutput {
    /// Surviving sentences joined by blank lines; empty when nothing survived
    pub text: String,
    pub found: bool,
    pub stats: FilterStats,
}

// ============================================================================
// Guidance Filter
// ============================================================================

/// Scores segments and keeps sentences plausibly stating guidance
pub struct GuidanceFilter {
    config: FilterConfig,
}

impl GuidanceFilter {
    /// Create a filter with default thresholds
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    /// Create with custom thresholds
    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Count forward-looking keywords starting a word
    pub fn score(&self, text: &str) -> u32 {
        GUIDANCE_KEYWORDS.find_iter(text).count() as u32
    }

    /// Whether a sentence is boilerplate that must never be kept
    pub fn is_boilerplate(&self, sentence: &str) -> bool {
        BOILERPLATE.iter().any(|re| re.is_match(sentence))
    }

    /// The two-condition sentence test
    pub fn is_guidance_sentence(&self, sentence: &str) -> bool {
        let forward = FORWARD_INDICATORS.iter().any(|re| re.is_match(sentence));
        forward && FINANCIAL_CONTENT.iter().any(|re| re.is_match(sentence))
    }

    /// Score, gate and cap segments, keeping document order
    fn retain_segments(&self, segments: Vec<Segment>, stats: &mut FilterStats) -> Vec<Segment> {
        let mut slides = 0usize;
        let mut paragraphs = 0usize;
        let mut kept = Vec::new();

        for mut segment in segments {
            stats.segments_in += 1;
            let score = self.score(&segment.text);
            segment.guidance_score = score as f32;

            let keep = match segment.kind {
                SegmentKind::Pooled => true,
                SegmentKind::Slide => {
                    let pass = score >= self.config.slide_min_score && slides < self.config.max_slides;
                    if pass {
                        slides += 1;
                    }
                    pass
                }
                SegmentKind::Section | SegmentKind::Paragraph => {
                    let pass = score >= self.config.paragraph_min_score
                        && paragraphs < self.config.max_paragraphs;
                    if pass {
                        paragraphs += 1;
                    }
                    pass
                }
            };

            if keep {
                kept.push(segment);
            }
        }

        stats.segments_kept = kept.len();
        kept
    }

    /// Run both stages over segmenter output
    pub fn filter(&self, segments: Vec<Segment>) -> FilterOutput {
        let mut stats = FilterStats::default();
        let retained = self.retain_segments(segments, &mut stats);

        let mut sentences = Vec::new();
        for segment in &retained {
            for sentence in split_sentences(&segment.text) {
                stats.sentences_seen += 1;
                if self.is_boilerplate(sentence) {
                    stats.boilerplate_dropped += 1;
                    continue;
                }
                if self.is_guidance_sentence(sentence) {
                    sentences.push(sentence);
                }
            }
        }

        let output = self.assemble(sentences, stats);
        tracing::debug!(
            "Filter kept {}/{} segments, {}/{} sentences ({} chars)",
            output.stats.segments_kept,
            output.stats.segments_in,
            output.stats.sentences_kept,
            output.stats.sentences_seen,
            output.text.len()
        );
        output
    }

    /// Lenient transcript filter: whole paragraphs with any guidance or
    /// finance vocabulary, or a CFO mention, minus legal boilerplate
    pub fn filter_lenient(&self, text: &str) -> FilterOutput {
        let mut stats = FilterStats::default();
        let mut kept = Vec::new();

        for paragraph in split_transcript_paragraphs(text) {
            stats.sentences_seen += 1;
            let relevant = LENIENT_VOCABULARY.iter().any(|re| re.is_match(paragraph))
                || CFO_MENTION.is_match(paragraph);
            if !relevant {
                continue;
            }
            if LENIENT_EXCLUSIONS.iter().any(|re| re.is_match(paragraph)) {
                stats.boilerplate_dropped += 1;
                continue;
            }
            kept.push(paragraph);
        }

        stats.segments_in = stats.sentences_seen;
        stats.segments_kept = kept.len();
        self.assemble(kept, stats)
    }

    /// Join pieces by blank lines up to the size budget
    fn assemble(&self, pieces: Vec<&str>, mut stats: FilterStats) -> FilterOutput {
        let mut text = String::new();

        for piece in pieces {
            let separator = if text.is_empty() { 0 } else { 2 };
            if text.len() + separator + piece.len() > self.config.max_output_chars {
                stats.truncated = true;
                if text.is_empty() {
                    let head = truncate_at_char_boundary(piece, self.config.max_output_chars);
                    text.push_str(head.trim_end());
                    stats.sentences_kept += usize::from(!text.is_empty());
                }
                break;
            }
            if separator > 0 {
                text.push_str("\n\n");
            }
            text.push_str(piece);
            stats.sentences_kept += 1;
        }

        FilterOutput {
            found: !text.is_empty(),
            text,
            stats,
        }
    }
}

impl Default for GuidanceFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split after `.`, `!` or `?` followed by whitespace, and at blank lines
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();

    for block in BLANK_LINES.split(text) {
        let bytes = block.as_bytes();
        let mut start = 0;
        let mut i = 0;

        while i < bytes.len() {
            let terminal = matches!(bytes[i], b'.' | b'!' | b'?');
            if terminal && i + 1 < bytes.len() && bytes[i + 1].is_ascii_whitespace() {
                push_trimmed(&mut sentences, &block[start..=i]);
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                start = i;
                continue;
            }
            i += 1;
        }

        if start < block.len() {
            push_trimmed(&mut sentences, &block[start..]);
        }
    }

    sentences
}

/// Split at blank lines, and at `.` + whitespace when a capital letter follows
fn split_transcript_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();

    for block in BLANK_LINES.split(text) {
        let bytes = block.as_bytes();
        let mut start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'.' {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j > i + 1 && j < bytes.len() && bytes[j].is_ascii_uppercase() {
                    push_trimmed(&mut paragraphs, &block[start..=i]);
                    start = j;
                    i = j;
                    continue;
                }
            }
            i += 1;
        }

        if start < block.len() {
            push_trimmed(&mut paragraphs, &block[start..]);
        }
    }

    paragraphs
}

/// Longest prefix of at most `max_bytes` bytes that ends on a char boundary
fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let end = (0..=max_bytes)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    &text[..end]
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece);
    }
}
