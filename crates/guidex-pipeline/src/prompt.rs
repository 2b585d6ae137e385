//! Extraction prompts
//!
//! One prompt per source kind. All of them ask for the same pipe table so the
//! table parser can read any response.

use guidex_core::SourceKind;

const COLUMNS: &str = "\
Return a pipe-delimited table with exactly these columns:

| metric | value_or_range | period | period_type | low | high | average |

- metric: standardized name that keeps business segments and accounting basis. \
\"FY '26 subscription revenue\" becomes \"Subscription Revenue\", \"Q1 FY '26 non-GAAP EPS\" \
becomes \"EPS (Non-GAAP)\", \"Intelligent Cloud revenue\" becomes \"Intelligent Cloud Revenue\". \
Drop period prefixes, add (GAAP) or (Non-GAAP) where applicable.
- value_or_range: the value exactly as written, e.g. $1.5B-$1.6B, $2.05, ($0.05) to $0.10
- period: e.g. Q3 FY24, Full Year 2025
- period_type: \"Quarter\" or \"Full Year\" only
- low, high, average: low end, high end and midpoint (a single value fills all three)";

const NUMERIC_RULES: &str = "\
NUMERIC COLUMNS (low, high, average):
- If value_or_range contains %, every numeric column carries % too: \"5% to 7%\" gives 5%, 7%, 6%.
- Dollar amounts without $ and in millions: \"$7.7 billion\" gives 7700, 7700, 7700; \
\"$0.05 to $0.10\" gives 0.05, 0.10, 0.075.
- Negatives as -1 and -5%, never (1) or (5%). In \"$(1) million to $1 million\" low is -1 and high is 1.
- Qualitative guidance (\"above last year\", \"slight expansion\"): repeat the value_or_range text in all three.

PERIOD TYPE:
- \"Quarter\" for Q1-Q4, first quarter, next quarter, current quarter.
- \"Full Year\" for full year, fiscal year, FY, annual, or a bare year such as 2023 or FY24.

VALUE_OR_RANGE:
- Keep the original notation including parentheses, $ and %. Keep billions as billions: \
\"$1.10 billion to $1.11 billion\".

If there is no formal guidance, return only the header row.
Respond with the table only, no commentary.";

const SEC_CRITERIA: &str = "\
VALID GUIDANCE:
1. Appears in a dedicated section such as Outlook, Guidance, Financial Outlook or Business Outlook.
2. Names a financial metric (revenue including segment revenue, EPS, operating income, \
operating margin, net income, cash flow, EBITDA and similar).
3. Gives a number, range or percentage, or a relative target such as \"above last year\".
4. Refers to a future period.
5. Is stated as formal company guidance.

EXCLUDE: management commentary and opinions, historical or current-quarter results, \
risk factors and cautionary language, strategy without financial targets, vague statements \
such as \"continued growth\".";

const TRANSCRIPT_CRITERIA: &str = "\
VALID GUIDANCE:
1. Stated as formal company guidance in prepared remarks or an official answer.
2. Names a financial metric (revenue including segment revenue, EPS, operating income, \
operating margin, net income, cash flow, EBITDA and similar).
3. Gives a concrete number, range or percentage.
4. Refers to a future period.

EXCLUDE: general business or market commentary, operational updates without financial \
targets, historical results, vague statements such as \"continued growth\".";

/// Build the extraction prompt for one document's filtered text
pub fn extraction_prompt(kind: SourceKind, ticker: &str, text: &str) -> String {
    let (source, criteria, body) = match kind {
        SourceKind::Sec => (
            "earnings release",
            SEC_CRITERIA,
            format!("DOCUMENT TYPE: SEC 8-K Earnings Release for {ticker}\n\n{text}"),
        ),
        SourceKind::Transcript => (
            "earnings call transcript",
            TRANSCRIPT_CRITERIA,
            format!("DOCUMENT TYPE: Earnings Call Transcript for {ticker}\n\n{text}"),
        ),
        SourceKind::Upload => (
            "document",
            SEC_CRITERIA,
            format!("DOCUMENT TYPE: Uploaded Document for {ticker}\n\n{text}"),
        ),
    };

    format!(
        "You are a financial analyst assistant. Extract ONLY formal financial guidance \
         with concrete targets from this {source} for {ticker}.\n\n\
         {COLUMNS}\n\n{criteria}\n\n{NUMERIC_RULES}\n\n{body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sec_prompt_wraps_document() {
        let prompt = extraction_prompt(SourceKind::Sec, "MSFT", "Outlook: revenue $70B");
        assert!(prompt.contains("DOCUMENT TYPE: SEC 8-K Earnings Release for MSFT"));
        assert!(prompt.contains("| metric | value_or_range | period |"));
        assert!(prompt.ends_with("Outlook: revenue $70B"));
    }

    #[test]
    fn test_transcript_prompt_criteria() {
        let prompt = extraction_prompt(SourceKind::Transcript, "AAPL", "text");
        assert!(prompt.contains("earnings call transcript for AAPL"));
        assert!(prompt.contains("prepared remarks"));
    }
}
