//! Duplicate and conflict detection over the combined table
//!
//! Rows that share a metric and period (and by default a filing date) form a
//! group. A group conflicts when its numeric low or high values genuinely
//! differ; rows that only differ in formatting ("28.0%" vs "28%") do not.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use guidex_core::{CombinedTable, DuplicateConfig, GroupingKey, GuidanceValue, LlmClient};

const TOLERANCE: f64 = 1e-9;

/// Key shared by every row of a group (trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub metric: String,
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filing_date: Option<String>,
}

/// Rows sharing a key, as indices into the combined table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub key: GroupKey,
    pub rows: Vec<usize>,
    pub conflicting: bool,
}

/// Rule-based duplicate detector
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    grouping: GroupingKey,
}

impl DuplicateDetector {
    /// Create a detector grouping by metric, period and filing date
    pub fn new() -> Self {
        Self {
            grouping: GroupingKey::MetricPeriodFilingDate,
        }
    }

    pub fn with_config(config: &DuplicateConfig) -> Self {
        Self {
            grouping: config.grouping_key,
        }
    }

    pub fn with_grouping(mut self, grouping: GroupingKey) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn grouping(&self) -> GroupingKey {
        self.grouping
    }

    fn key_for(&self, metric: &str, period: &str, filing_date: Option<&str>) -> Option<GroupKey> {
        let metric = metric.trim();
        let period = period.trim();
        if metric.is_empty() || period.is_empty() {
            return None;
        }

        let filing_date = match self.grouping {
            GroupingKey::MetricPeriod => None,
            GroupingKey::MetricPeriodFilingDate => {
                let date = filing_date.map(str::trim).filter(|d| !d.is_empty())?;
                Some(date.to_string())
            }
        };

        Some(GroupKey {
            metric: metric.to_string(),
            period: period.to_string(),
            filing_date,
        })
    }

    /// All groups of two or more rows, in order of first appearance
    pub fn groups(&self, table: &CombinedTable) -> Vec<DuplicateGroup> {
        let mut order: Vec<GroupKey> = Vec::new();
        let mut members: HashMap<GroupKey, Vec<usize>> = HashMap::new();

        for (index, row) in table.rows().iter().enumerate() {
            let Some(key) = self.key_for(&row.metric, &row.period, row.filing_date.as_deref()) else {
                continue;
            };
            members
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(index);
        }

        order
            .into_iter()
            .filter_map(|key| {
                let rows = members.remove(&key)?;
                if rows.len() < 2 {
                    return None;
                }
                let conflicting = is_conflicting(table, &rows);
                Some(DuplicateGroup {
                    key,
                    rows,
                    conflicting,
                })
            })
            .collect()
    }

    /// Indices of every row in a conflicting group
    pub fn detect(&self, table: &CombinedTable) -> BTreeSet<usize> {
        let flagged: BTreeSet<usize> = self
            .groups(table)
            .into_iter()
            .filter(|g| g.conflicting)
            .flat_map(|g| g.rows)
            .collect();

        tracing::debug!(
            "Duplicate detection ({:?}): {} of {} rows flagged",
            self.grouping,
            flagged.len(),
            table.len()
        );
        flagged
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Count numeric values, treating values within tolerance as equal
fn distinct_numeric<'a>(values: impl Iterator<Item = &'a GuidanceValue>) -> usize {
    let mut numbers: Vec<f64> = values.filter_map(GuidanceValue::numeric).collect();
    numbers.sort_by(f64::total_cmp);
    numbers.dedup_by(|a, b| (*a - *b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0));
    numbers.len()
}

fn is_conflicting(table: &CombinedTable, rows: &[usize]) -> bool {
    let group: Vec<_> = rows.iter().filter_map(|&i| table.get(i)).collect();
    distinct_numeric(group.iter().map(|r| &r.low)) > 1
        || distinct_numeric(group.iter().map(|r| &r.high)) > 1
}

// ============================================================================
// LLM-based Detector
// ============================================================================

/// Conflict review by an LLM, bounded by the rule-based conflicting groups
pub struct LlmConflictDetector {
    client: Arc<dyn LlmClient>,
    rules: DuplicateDetector,
}

impl LlmConflictDetector {
    pub fn new(client: Arc<dyn LlmClient>, rules: DuplicateDetector) -> Self {
        Self { client, rules }
    }

    /// Build the review prompt for the candidate groups
    pub fn build_prompt(&self, table: &CombinedTable, groups: &[DuplicateGroup]) -> String {
        let payload: Vec<serde_json::Value> = groups
            .iter()
            .map(|group| {
                let rows: Vec<serde_json::Value> = group
                    .rows
                    .iter()
                    .filter_map(|&i| table.get(i).map(|row| (i, row)))
                    .map(|(i, row)| {
                        serde_json::json!({
                            "index": i,
                            "metric": row.metric,
                            "value_or_range": row.value_or_range,
                            "period": row.period,
                            "low": row.low,
                            "high": row.high,
                            "source_type": row.source_type,
                            "filing_date": row.filing_date,
                        })
                    })
                    .collect();
                serde_json::json!({ "rows": rows })
            })
            .collect();

        let groups_json =
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "[]".to_string());

        format!(
            "The following groups of guidance rows share a metric and period and \
             carry different numbers.\n\
             Identify the groups whose guidance genuinely conflicts: different low or \
             high values for the same figure, not a restatement in other units or a \
             narrower wording of the same target.\n\n\
             GROUPS:\n{groups_json}\n\n\
             Return ONLY a JSON array with the index of any row of each conflicting group, \
             for example [0, 3]. \
             Return [] when nothing conflicts."
        )
    }

    /// Read the first JSON index array in a response
    pub fn parse_indices(response: &str) -> Option<Vec<usize>> {
        let start = response.find('[')?;
        let end = response[start..].find(']')? + start;
        serde_json::from_str(&response[start..=end]).ok()
    }

    /// Flag conflicting rows; falls back to the rule result on any failure
    ///
    /// Only groups the rules already consider conflicting are reviewed, and a
    /// group is flagged whole when the answer names any of its rows.
    pub async fn detect(&self, table: &CombinedTable) -> BTreeSet<usize> {
        let groups: Vec<DuplicateGroup> = self
            .rules
            .groups(table)
            .into_iter()
            .filter(|g| g.conflicting)
            .collect();
        if groups.is_empty() {
            return BTreeSet::new();
        }

        let rows_of = |selected: &[&DuplicateGroup]| -> BTreeSet<usize> {
            selected.iter().flat_map(|g| g.rows.iter().copied()).collect()
        };
        let all: Vec<&DuplicateGroup> = groups.iter().collect();

        let response = match self.client.generate(&self.build_prompt(table, &groups)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("LLM conflict review failed, using rules: {}", e);
                return rows_of(&all);
            }
        };

        match Self::parse_indices(&response) {
            Some(indices) => {
                let named: BTreeSet<usize> = indices.into_iter().collect();
                let confirmed: Vec<&DuplicateGroup> = groups
                    .iter()
                    .filter(|g| g.rows.iter().any(|i| named.contains(i)))
                    .collect();
                tracing::debug!(
                    "LLM conflict review confirmed {} of {} conflicting groups",
                    confirmed.len(),
                    groups.len()
                );
                rows_of(&confirmed)
            }
            None => {
                tracing::warn!("Unreadable LLM conflict review response, using rules");
                rows_of(&all)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidex_core::{GuidanceRow, GuidexError, Result};

    fn row(metric: &str, period: &str, low: GuidanceValue, high: GuidanceValue) -> GuidanceRow {
        GuidanceRow::qualitative(metric, "n/a", period)
            .with_values(low.clone(), high, low)
            .with_filing_date("2025-01-30")
    }

    fn pct(s: &str) -> GuidanceValue {
        GuidanceValue::Percent(s.to_string())
    }

    #[test]
    fn test_equivalent_formats_do_not_conflict() {
        let table = CombinedTable::from(vec![
            row("Operating Margin", "FY25", pct("28.0%"), pct("29%")),
            row("Operating Margin", "FY25", pct("28%"), pct("29.0%")),
        ]);
        let detector = DuplicateDetector::new();

        assert!(detector.detect(&table).is_empty());
        let groups = detector.groups(&table);
        assert_eq!(groups.len(), 1);
        assert!(!groups[0].conflicting);
    }

    #[test]
    fn test_true_conflict_flags_all_rows() {
        let table = CombinedTable::from(vec![
            row("Tax Rate", "FY25", pct("25%"), pct("25%")),
            row("Revenue", "FY25", GuidanceValue::Number(100.0), GuidanceValue::Number(110.0)),
            row("Tax Rate ", " FY25", pct("20%"), pct("22%")),
        ]);
        let flagged = DuplicateDetector::new().detect(&table);
        assert_eq!(flagged.into_iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_qualitative_cells_ignored() {
        let table = CombinedTable::from(vec![
            row("Revenue", "FY25", GuidanceValue::Number(100.0), GuidanceValue::Number(110.0)),
            row("Revenue", "FY25", GuidanceValue::Text("n/a".into()), GuidanceValue::Number(110.0)),
        ]);
        assert!(DuplicateDetector::new().detect(&table).is_empty());
    }

    #[test]
    fn test_filing_date_separates_groups() {
        let mut later = row("EPS", "FY25", GuidanceValue::Number(2.0), GuidanceValue::Number(2.1));
        later.filing_date = Some("2025-04-30".to_string());
        let table = CombinedTable::from(vec![
            row("EPS", "FY25", GuidanceValue::Number(1.9), GuidanceValue::Number(2.0)),
            later,
        ]);

        assert!(DuplicateDetector::new().detect(&table).is_empty());
        let loose = DuplicateDetector::new().with_grouping(GroupingKey::MetricPeriod);
        assert_eq!(loose.detect(&table).len(), 2);
    }

    #[test]
    fn test_rows_without_filing_date_not_grouped() {
        let mut a = row("EPS", "FY25", GuidanceValue::Number(1.0), GuidanceValue::Number(1.0));
        let mut b = row("EPS", "FY25", GuidanceValue::Number(2.0), GuidanceValue::Number(2.0));
        a.filing_date = None;
        b.filing_date = None;
        let table = CombinedTable::from(vec![a, b]);

        assert!(DuplicateDetector::new().groups(&table).is_empty());
        assert!(DuplicateDetector::new().detect(&CombinedTable::new()).is_empty());
    }

    struct ReviewClient(std::result::Result<String, String>);

    #[async_trait::async_trait]
    impl LlmClient for ReviewClient {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.0.clone().map_err(GuidexError::LlmError)
        }

        fn name(&self) -> &str {
            "review"
        }
    }

    fn conflicting_table() -> CombinedTable {
        CombinedTable::from(vec![
            row("Tax Rate", "FY25", pct("25%"), pct("25%")),
            row("Tax Rate", "FY25", pct("20%"), pct("22%")),
            row("Revenue", "FY25", GuidanceValue::Number(1.0), GuidanceValue::Number(1.0)),
            row("Revenue", "FY25", GuidanceValue::Number(1.0), GuidanceValue::Number(1.0)),
            row("Capex", "FY25", GuidanceValue::Number(5.0), GuidanceValue::Number(5.0)),
        ])
    }

    #[test]
    fn test_parse_indices() {
        assert_eq!(
            LlmConflictDetector::parse_indices("Conflicts: [1, 3]"),
            Some(vec![1, 3])
        );
        assert_eq!(LlmConflictDetector::parse_indices("none"), None);
        assert_eq!(LlmConflictDetector::parse_indices("[a, b]"), None);
    }

    #[tokio::test]
    async fn test_llm_answer_limited_to_conflicting_groups() {
        let client = Arc::new(ReviewClient(Ok("[1, 2, 4, 99]".to_string())));
        let detector = LlmConflictDetector::new(client, DuplicateDetector::new());

        // Row 1 widens to its whole group; rows 2 and 4 never conflicted
        let flagged = detector.detect(&conflicting_table()).await;
        assert_eq!(flagged.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_llm_can_clear_a_conflict() {
        let client = Arc::new(ReviewClient(Ok("[]".to_string())));
        let detector = LlmConflictDetector::new(client, DuplicateDetector::new());
        assert!(detector.detect(&conflicting_table()).await.is_empty());
    }

    #[tokio::test]
    async fn test_llm_cannot_flag_equivalent_values() {
        let table = CombinedTable::from(vec![
            row("Revenue", "Q1 FY25", pct("28.0%"), pct("28.0%")),
            row("Revenue", "Q1 FY25", pct("28%"), pct("28%")),
        ]);
        let client = Arc::new(ReviewClient(Ok("[0]".to_string())));
        let detector = LlmConflictDetector::new(client, DuplicateDetector::new());

        assert!(detector.detect(&table).await.is_empty());
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_rules() {
        let table = conflicting_table();

        let failing = LlmConflictDetector::new(
            Arc::new(ReviewClient(Err("offline".to_string()))),
            DuplicateDetector::new(),
        );
        assert_eq!(failing.detect(&table).await.into_iter().collect::<Vec<_>>(), vec![0, 1]);

        let garbled = LlmConflictDetector::new(
            Arc::new(ReviewClient(Ok("I think rows one and two".to_string()))),
            DuplicateDetector::new(),
        );
        assert_eq!(garbled.detect(&table).await.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }
}
