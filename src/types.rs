use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Dimensions
// =============================================================================

/// Buyer-journey stage a query is classified into.
///
/// The order of the variants is significant: it is the display order and the
/// order phases appear in the drill-down projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStage {
    ProblemExploration,
    SolutionEducation,
    SolutionComparison,
    SolutionEvaluation,
    FinalResearch,
}

impl JourneyStage {
    /// All stages, in journey order.
    pub const ALL: [JourneyStage; 5] = [
        JourneyStage::ProblemExploration,
        JourneyStage::SolutionEducation,
        JourneyStage::SolutionComparison,
        JourneyStage::SolutionEvaluation,
        JourneyStage::FinalResearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyStage::ProblemExploration => "problem_exploration",
            JourneyStage::SolutionEducation => "solution_education",
            JourneyStage::SolutionComparison => "solution_comparison",
            JourneyStage::SolutionEvaluation => "solution_evaluation",
            JourneyStage::FinalResearch => "final_research",
        }
    }

    /// Parse a stored stage string. Tolerates case, hyphens, and surrounding
    /// whitespace; anything unrecognized is `None` (grouped as "Unknown").
    pub fn parse(value: &str) -> Option<JourneyStage> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "problem_exploration" => Some(JourneyStage::ProblemExploration),
            "solution_education" => Some(JourneyStage::SolutionEducation),
            "solution_comparison" => Some(JourneyStage::SolutionComparison),
            "solution_evaluation" => Some(JourneyStage::SolutionEvaluation),
            "final_research" => Some(JourneyStage::FinalResearch),
            _ => None,
        }
    }
}

/// Tri-state judgment of whether a solution exhibits an evaluated feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureVerdict {
    Yes,
    No,
    Unknown,
}

impl FeatureVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureVerdict::Yes => "yes",
            FeatureVerdict::No => "no",
            FeatureVerdict::Unknown => "unknown",
        }
    }

    /// True when the verdict is an actual judgment (`yes` or `no`), as
    /// opposed to the engine declining to judge.
    pub fn is_judged(&self) -> bool {
        !matches!(self, FeatureVerdict::Unknown)
    }
}

// =============================================================================
// Parse provenance
// =============================================================================

/// Outcome of parsing a dual-format stored field (JSON object vs. legacy
/// string encoding). Keeping the provenance lets callers distinguish a
/// confident parse from a best-effort fallback instead of silently mixing
/// the two code paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FieldParse<T> {
    /// Strict parse of the canonical encoding succeeded.
    Parsed(T),
    /// Canonical parse failed but the legacy fallback encoding yielded data.
    Fallback(T),
    /// Present but unusable; the field contributes nothing for this record.
    Unparseable,
    /// The stored field was null/missing.
    Absent,
}

impl<T> FieldParse<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            FieldParse::Parsed(v) | FieldParse::Fallback(v) => Some(v),
            FieldParse::Unparseable | FieldParse::Absent => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FieldParse::Fallback(_))
    }
}

// =============================================================================
// Records
// =============================================================================

/// One AI engine's stored response row, as it arrives from the storage query
/// layer. Loosely typed on purpose: analytic fields may be null, numbers may
/// arrive as strings, and the structured blobs may be JSON text or objects.
///
/// Accepts both camelCase (API) and snake_case (storage) field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResponseRow {
    #[serde(alias = "company_id")]
    pub company_id: Option<String>,
    #[serde(alias = "query_id")]
    pub query_id: Option<String>,
    pub region: Option<String>,
    pub vertical: Option<String>,
    pub persona: Option<String>,
    #[serde(alias = "journey_stage", alias = "stage")]
    pub journey_stage: Option<String>,
    #[serde(alias = "platform")]
    pub engine: Option<String>,
    #[serde(alias = "sentiment_score")]
    pub sentiment_score: Option<serde_json::Value>,
    #[serde(alias = "ranking_position")]
    pub ranking_position: Option<serde_json::Value>,
    #[serde(alias = "company_mentioned")]
    pub company_mentioned: Option<bool>,
    pub recommended: Option<bool>,
    #[serde(alias = "solution_analysis")]
    pub solution_analysis: Option<serde_json::Value>,
    #[serde(alias = "rank_list", alias = "platform_rankings", alias = "platformRankings")]
    pub rank_list: Option<serde_json::Value>,
    #[serde(alias = "competitors_list")]
    pub competitors_list: Option<serde_json::Value>,
    #[serde(alias = "response_text")]
    pub response_text: Option<String>,
    pub citations: Option<serde_json::Value>,
    #[serde(alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(alias = "batch_id")]
    pub batch_id: Option<String>,
}

/// The strict internal record every downstream component depends on.
/// Produced only by the normalizer; nothing outside the normalization
/// boundary sees the external storage row shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub company_id: String,
    pub query_id: String,
    pub region: String,
    pub vertical: String,
    pub persona: String,
    pub journey_stage: Option<JourneyStage>,
    pub engine: String,
    /// Clamped to [-1, 1] when present.
    pub sentiment_score: Option<f64>,
    /// Positive integer, 1 = best. Non-positive stored values become `None`.
    pub ranking_position: Option<u32>,
    pub company_mentioned: bool,
    pub recommended: bool,
    pub solution_analysis: FieldParse<BTreeMap<String, FeatureVerdict>>,
    pub platform_rankings: FieldParse<BTreeMap<String, u32>>,
    pub competitors: Vec<String>,
    pub response_text: Option<String>,
    pub citations: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub batch_id: Option<String>,
}

impl ResponseRecord {
    /// Grouping key for the journey-stage dimension.
    pub fn stage_key(&self) -> &str {
        self.journey_stage.map(|s| s.as_str()).unwrap_or("Unknown")
    }

    /// UTC calendar date of the response, when the timestamp was parseable.
    pub fn created_date(&self) -> Option<NaiveDate> {
        self.created_at.map(|dt| dt.date_naive())
    }
}

// =============================================================================
// Derived metrics
// =============================================================================

/// Per-metric denominators. `0` means the corresponding metric had no
/// eligible records — the only way callers can tell "no data" apart from
/// "eligible records all scored zero". Also the weights that make weighted
/// re-aggregation exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSamples {
    pub sentiment: usize,
    pub ranking: usize,
    pub mention: usize,
    pub feature: usize,
    pub recommendation: usize,
}

/// The rolled-up metric tuple for one scope. Derived and ephemeral: always
/// recomputed from a record collection, never persisted.
///
/// All values are on a 0–100 scale except `ranking_position` (raw average
/// position, lower is better) and `total_responses` (a count).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub sentiment_score: f64,
    pub ranking_position: f64,
    pub company_mentioned: f64,
    pub feature_score: f64,
    pub recommendation_rate: f64,
    pub total_responses: usize,
    pub samples: MetricSamples,
}

impl AggregatedMetrics {
    /// The well-defined empty-scope value: all zeros.
    pub fn zero() -> AggregatedMetrics {
        AggregatedMetrics::default()
    }
}

/// One point of a metric trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    pub date: NaiveDate,
    pub metrics: AggregatedMetrics,
}

/// Bucket-key derivation for the timeline. Changes only how `created_at`
/// maps to a bucket date, never the metric logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineGranularity {
    Day,
    Week,
    Month,
}

// =============================================================================
// Query/phase projection
// =============================================================================

/// A query known to the company's query catalog. Queries with no response
/// rows for the current filter set still surface (with zero metrics) when
/// their stage has data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(alias = "query_id")]
    pub query_id: String,
    #[serde(alias = "query_text", alias = "text")]
    pub query_text: String,
    #[serde(alias = "journey_stage", alias = "stage")]
    pub stage: Option<JourneyStage>,
}

/// Per-engine detail for a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub ranking_position: Option<u32>,
    pub sentiment_score: Option<f64>,
    pub company_mentioned: bool,
    pub recommended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_verdicts: Option<BTreeMap<String, FeatureVerdict>>,
    pub competitors: Vec<String>,
    pub citations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

/// One catalog query with its own single-query metrics and per-engine results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDetail {
    pub query_id: String,
    pub query_text: String,
    pub metrics: AggregatedMetrics,
    pub engine_results: BTreeMap<String, EngineResult>,
}

/// One buyer-journey phase: the stage's rolled-up metrics plus per-query
/// drill-down detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPhase {
    pub stage: JourneyStage,
    pub metrics: AggregatedMetrics,
    /// Sum of engine-result counts across the phase's queries. A progress
    /// indicator, not a metric.
    pub total_responses: usize,
    pub queries: Vec<QueryDetail>,
}

// =============================================================================
// Filters
// =============================================================================

/// Optional pre-filter the caller may apply before aggregation. The core is
/// indifferent to whether scoping happens upstream in the storage query or
/// here; records arriving at the calculators are assumed already scoped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordFilter {
    pub batch_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn matches(&self, record: &ResponseRecord) -> bool {
        if let Some(ref batch) = self.batch_id {
            if record.batch_id.as_deref() != Some(batch.as_str()) {
                return false;
            }
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            // Date bounds require a parseable timestamp to prove membership.
            let date = match record.created_date() {
                Some(d) => d,
                None => return false,
            };
            if let Some(start) = self.start_date {
                if date < start {
                    return false;
                }
            }
            if let Some(end) = self.end_date {
                if date > end {
                    return false;
                }
            }
        }
        true
    }

    pub fn apply(&self, records: Vec<ResponseRecord>) -> Vec<ResponseRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bare_record() -> ResponseRecord {
        ResponseRecord {
            company_id: "c1".into(),
            query_id: "q1".into(),
            region: "Unknown".into(),
            vertical: "Unknown".into(),
            persona: "Unknown".into(),
            journey_stage: None,
            engine: "unknown".into(),
            sentiment_score: None,
            ranking_position: None,
            company_mentioned: false,
            recommended: false,
            solution_analysis: FieldParse::Absent,
            platform_rankings: FieldParse::Absent,
            competitors: Vec::new(),
            response_text: None,
            citations: Vec::new(),
            created_at: None,
            batch_id: None,
        }
    }

    #[test]
    fn stage_parse_tolerates_formatting() {
        assert_eq!(
            JourneyStage::parse(" Solution-Comparison "),
            Some(JourneyStage::SolutionComparison)
        );
        assert_eq!(JourneyStage::parse("brand_awareness"), None);
    }

    #[test]
    fn stage_order_is_journey_order() {
        let names: Vec<&str> = JourneyStage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "problem_exploration",
                "solution_education",
                "solution_comparison",
                "solution_evaluation",
                "final_research"
            ]
        );
    }

    #[test]
    fn raw_row_accepts_snake_case_aliases() {
        let row: RawResponseRow = serde_json::from_str(
            r#"{"company_id":"c1","query_id":"q1","journey_stage":"final_research","sentiment_score":0.4}"#,
        )
        .unwrap();
        assert_eq!(row.company_id.as_deref(), Some("c1"));
        assert_eq!(row.journey_stage.as_deref(), Some("final_research"));
    }

    #[test]
    fn filter_date_bounds_are_inclusive() {
        let mut record = bare_record();
        record.created_at = Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap());
        record.batch_id = Some("b1".into());

        let filter = RecordFilter {
            batch_id: Some("b1".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 15),
        };
        assert!(filter.matches(&record));

        record.created_at = None;
        assert!(!filter.matches(&record));
    }

    #[test]
    fn filter_batch_mismatch_excludes() {
        let mut record = bare_record();
        record.batch_id = Some("b2".into());
        let filter = RecordFilter {
            batch_id: Some("b1".into()),
            ..RecordFilter::default()
        };
        assert!(!filter.matches(&record));
    }
}
