//! Text segmentation
//!
//! Cuts a document into candidate segments before guidance filtering:
//! - small documents: one pool of blank-line paragraphs
//! - slide decks: one segment per slide
//! - structured releases: one segment per guidance section
//! - everything else: blank-line paragraphs

use once_cell::sync::Lazy;
use regex::Regex;

use guidex_core::{Segment, SegmentKind, SegmenterConfig};

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("valid regex"));

/// Whole-line section headers that open a guidance section
static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^\s*(?:",
        r"business\s+outlook|financial\s+outlook|outlook|guidance|forward[\s-]+looking",
        r"|looking\s+ahead|going\s+forward|future\s+expectations|expectations",
        r"|projections|forecasts|targets|goals|objectives",
        r"|(?:next|upcoming|coming|current)\s+(?:quarter|year)",
        r"|(?:revenue|earnings|margin|growth)\s+outlook",
        r"|(?:business|operational|strategic)\s+update",
        r"|(?:key|performance|financial)\s+metrics",
        r")\s*:?\s*$"
    ))
    .expect("valid regex")
});

/// A family of slide-boundary marker lines
struct SlideMarker {
    name: &'static str,
    pattern: Regex,
    /// Marker lines needed before the family counts as a slide signature
    min_occurrences: usize,
}

impl SlideMarker {
    fn new(name: &'static str, pattern: &str, min_occurrences: usize) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid regex"),
            min_occurrences,
        }
    }
}

static SLIDE_MARKERS: Lazy<Vec<SlideMarker>> = Lazy::new(|| {
    vec![
        SlideMarker::new("slide/page", r"(?i)^\s*(?:slide|page)\s+\d+\s*$", 1),
        SlideMarker::new("page-number", r"^\s*\d+\s*/\s*\d+\s*$", 1),
        SlideMarker::new("heavy-rule", r"^\s*━+\s*$", 1),
        SlideMarker::new("light-rule", r"^\s*─+\s*$", 1),
        SlideMarker::new("double-rule", r"^\s*═+\s*$", 1),
        SlideMarker::new("dash-rule", r"^\s*-{5,}\s*$", 2),
        SlideMarker::new("equals-rule", r"^\s*={5,}\s*$", 2),
        SlideMarker::new("underscore-rule", r"^\s*_{5,}\s*$", 2),
    ]
});

/// Splits raw document text into candidate segments
pub struct TextSegmenter {
    config: SegmenterConfig,
}

impl TextSegmenter {
    /// Create a segmenter with default thresholds
    pub fn new() -> Self {
        Self::with_config(SegmenterConfig::default())
    }

    /// Create with custom thresholds
    pub fn with_config(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment a document in document order
    pub fn segment(&self, raw_text: &str) -> Vec<Segment> {
        let text = raw_text.replace("\r\n", "\n");
        let chars = text.chars().count();

        if chars <= self.config.large_document_chars {
            let segments = pooled(&text);
            tracing::debug!("Pooled {} chars into {} segments", chars, segments.len());
            return segments;
        }

        if let Some(slides) = self.split_slides(&text) {
            tracing::debug!("Slide deck detected: {} slides kept", slides.len());
            return slides;
        }

        if let Some(sections) = self.split_sections(&text) {
            tracing::debug!("Guidance sections detected: {} kept", sections.len());
            return sections;
        }

        let paragraphs: Vec<Segment> = BLANK_LINES
            .split(&text)
            .map(str::trim)
            .filter(|p| p.chars().count() >= self.config.min_paragraph_chars)
            .map(|p| Segment::new(p, SegmentKind::Paragraph))
            .collect();
        tracing::debug!("Paragraph split: {} kept", paragraphs.len());
        paragraphs
    }

    /// Split on the first marker family that forms a slide signature
    fn split_slides(&self, text: &str) -> Option<Vec<Segment>> {
        let lines: Vec<&str> = text.split('\n').collect();

        let marker = SLIDE_MARKERS.iter().find(|m| {
            lines.iter().filter(|l| m.pattern.is_match(l)).count() >= m.min_occurrences
        })?;
        tracing::debug!("Splitting slides on {} markers", marker.name);

        let mut slides = Vec::new();
        let mut current = String::new();
        let mut heading: Option<String> = None;

        for line in lines {
            if marker.pattern.is_match(line) {
                self.push_slide(&mut slides, &current, heading.take());
                current.clear();
                let label = line.trim();
                if label.chars().any(char::is_alphanumeric) {
                    heading = Some(label.to_string());
                }
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        self.push_slide(&mut slides, &current, heading);

        Some(slides)
    }

    fn push_slide(&self, slides: &mut Vec<Segment>, text: &str, heading: Option<String>) {
        let text = text.trim();
        if text.chars().count() < self.config.min_slide_chars {
            return;
        }
        let mut slide = Segment::new(text, SegmentKind::Slide);
        slide.heading = heading;
        slides.push(slide);
    }

    /// Split at guidance section headers; `None` when no header line exists
    fn split_sections(&self, text: &str) -> Option<Vec<Segment>> {
        let mut spans: Vec<(Option<String>, String)> = vec![(None, String::new())];
        let mut found = false;

        for line in text.split('\n') {
            if SECTION_HEADER.is_match(line) {
                found = true;
                let heading = line.trim().trim_end_matches(':').trim().to_string();
                spans.push((Some(heading), String::new()));
            } else if let Some((_, body)) = spans.last_mut() {
                body.push_str(line);
                body.push('\n');
            }
        }

        if !found {
            return None;
        }

        let sections = spans
            .into_iter()
            .filter_map(|(heading, body)| {
                let body = body.trim();
                if body.chars().count() < self.config.min_paragraph_chars {
                    return None;
                }
                let segment = Segment::new(body, SegmentKind::Section);
                Some(match heading {
                    Some(h) => segment.with_heading(h),
                    None => segment,
                })
            })
            .collect();

        Some(sections)
    }
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

fn pooled(text: &str) -> Vec<Segment> {
    BLANK_LINES
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Segment::new(p, SegmentKind::Pooled))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SegmenterConfig {
        SegmenterConfig {
            large_document_chars: 200,
            min_slide_chars: 40,
            min_paragraph_chars: 20,
        }
    }

    fn filler(n: usize) -> String {
        "Historical results were discussed in detail. ".repeat(n)
    }

    #[test]
    fn test_small_document_is_pooled() {
        let segmenter = TextSegmenter::new();
        let segments = segmenter.segment("Short.\n\nWe expect revenue of $5B.\n\n  \n\nOk");

        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Pooled));
        assert_eq!(segments[0].text, "Short.");
        assert_eq!(segments[2].text, "Ok");
    }

    #[test]
    fn test_slide_markers_preferred() {
        let text = format!(
            "Cover\n\nSlide 1\n{}\n\nOUTLOOK\n{}\nSlide 2\nTiny\nSlide 3\n{}",
            filler(2),
            filler(2),
            filler(2)
        );
        let segments = TextSegmenter::with_config(small_config()).segment(&text);

        assert!(segments.iter().all(|s| s.kind == SegmentKind::Slide));
        // The cover page and "Tiny" slide are under the minimum length
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].heading.as_deref(), Some("Slide 1"));
        assert!(segments[0].text.contains("OUTLOOK"));
        assert_eq!(segments[1].heading.as_deref(), Some("Slide 3"));
    }

    #[test]
    fn test_single_ascii_rule_is_not_a_deck() {
        let text = format!("{}\n-----\n{}", filler(3), filler(3));
        let segments = TextSegmenter::with_config(small_config()).segment(&text);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Paragraph));
    }

    #[test]
    fn test_repeated_ascii_rules_split_slides() {
        let text = format!("{}\n=====\n{}\n=====\n{}", filler(1), filler(2), filler(2));
        let segments = TextSegmenter::with_config(small_config()).segment(&text);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Slide));
    }

    #[test]
    fn test_section_headers() {
        let text = format!(
            "{}\n\nBusiness Outlook:\n{}\n\nFORWARD-LOOKING\n{}",
            filler(2),
            "We expect revenue between $1.0 billion and $1.1 billion for the next quarter.",
            filler(2)
        );
        let segments = TextSegmenter::with_config(small_config()).segment(&text);

        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Section));
        assert!(segments[0].heading.is_none());
        assert_eq!(segments[1].heading.as_deref(), Some("Business Outlook"));
        assert!(segments[1].text.starts_with("We expect revenue"));
        assert_eq!(segments[2].heading.as_deref(), Some("FORWARD-LOOKING"));
    }

    #[test]
    fn test_header_must_be_whole_line() {
        let text = format!("{}\n\nOur outlook remains strong for the year.\n\n{}", filler(3), filler(3));
        let segments = TextSegmenter::with_config(small_config()).segment(&text);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Paragraph));
    }

    #[test]
    fn test_short_paragraphs_dropped() {
        let text = format!("{}\n\nToo short.\n\n{}", filler(3), filler(3));
        let segments = TextSegmenter::with_config(small_config()).segment(&text);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.text.starts_with("Historical")));
    }

    #[test]
    fn test_threshold_boundary() {
        let config = small_config();
        let text = "a".repeat(config.large_document_chars);
        let segments = TextSegmenter::with_config(config).segment(&text);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::Pooled);
    }

    // Default thresholds: 50,000 chars, slides 100, sections and paragraphs 50

    fn large_padding() -> String {
        "p".repeat(50_000)
    }

    #[test]
    fn test_default_large_document_switchover() {
        let segmenter = TextSegmenter::new();

        let at_limit = segmenter.segment(&"b".repeat(50_000));
        assert_eq!(at_limit.len(), 1);
        assert_eq!(at_limit[0].kind, SegmentKind::Pooled);

        let over_limit = segmenter.segment(&"b".repeat(50_001));
        assert_eq!(over_limit.len(), 1);
        assert_eq!(over_limit[0].kind, SegmentKind::Paragraph);
    }

    #[test]
    fn test_default_min_slide_chars() {
        let text = format!(
            "{}
Slide 1
{}
Slide 2
{}",
            large_padding(),
            "s".repeat(99),
            "t".repeat(100)
        );
        let segments = TextSegmenter::new().segment(&text);

        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Slide));
        assert_eq!(segments[1].heading.as_deref(), Some("Slide 2"));
        assert_eq!(segments[1].text.chars().count(), 100);
    }

    #[test]
    fn test_default_min_paragraph_chars() {
        let text = format!(
            "{}

{}

{}",
            large_padding(),
            "q".repeat(49),
            "r".repeat(50)
        );
        let segments = TextSegmenter::new().segment(&text);

        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Paragraph));
        assert_eq!(segments[1].text, "r".repeat(50));
    }

    #[test]
    fn test_default_min_section_chars() {
        let text = format!(
            "{}

Outlook
{}

Guidance
{}",
            large_padding(),
            "s".repeat(49),
            "g".repeat(50)
        );
        let segments = TextSegmenter::new().segment(&text);

        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.kind == SegmentKind::Section));
        assert!(segments[0].heading.is_none());
        assert_eq!(segments[1].heading.as_deref(), Some("Guidance"));
    }
}
