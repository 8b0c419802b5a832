//! Metric calculators
//!
//! The five canonical metric definitions live here and nowhere else. Each
//! calculator encodes its own applicability filter (which journey stages it
//! applies to) and denominator policy. Any future formula change happens in
//! exactly one place.
//!
//! Stage applicability:
//! - sentiment: every stage
//! - ranking position: solution_comparison, final_research
//! - company mentioned: problem_exploration, solution_education
//! - feature score: solution_evaluation
//! - recommendation rate: every stage
//!
//! A calculator with zero eligible records returns 0, never NaN and never an
//! error. Callers that must distinguish "no data" from "scored zero" read
//! the per-metric denominators in [`MetricSamples`].

use crate::types::{AggregatedMetrics, JourneyStage, MetricSamples, ResponseRecord};

/// Stateless accumulator over response records. Single pass, mergeable, and
/// local to each aggregation request — no shared state across calls.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    total: usize,
    sentiment_sum: f64,
    sentiment_n: usize,
    ranking_sum: f64,
    ranking_n: usize,
    mentioned: usize,
    mention_n: usize,
    feature_ratio_sum: f64,
    feature_n: usize,
    recommended: usize,
}

impl MetricsAccumulator {
    pub fn add(&mut self, record: &ResponseRecord) {
        self.total += 1;

        if let Some(score) = record.sentiment_score {
            // Clamp again at calculation time; stored out-of-range values
            // must not skew the [0,100] display scale.
            self.sentiment_sum += score.clamp(-1.0, 1.0);
            self.sentiment_n += 1;
        }

        if matches!(
            record.journey_stage,
            Some(JourneyStage::SolutionComparison) | Some(JourneyStage::FinalResearch)
        ) {
            if let Some(rank) = record.ranking_position {
                self.ranking_sum += rank as f64;
                self.ranking_n += 1;
            }
        }

        if matches!(
            record.journey_stage,
            Some(JourneyStage::ProblemExploration) | Some(JourneyStage::SolutionEducation)
        ) {
            self.mention_n += 1;
            if record.company_mentioned {
                self.mentioned += 1;
            }
        }

        if record.journey_stage == Some(JourneyStage::SolutionEvaluation) {
            if let Some(ratio) = feature_ratio(record) {
                self.feature_ratio_sum += ratio;
                self.feature_n += 1;
            }
        }

        if record.recommended {
            self.recommended += 1;
        }
    }

    pub fn merge(&mut self, other: &MetricsAccumulator) {
        self.total += other.total;
        self.sentiment_sum += other.sentiment_sum;
        self.sentiment_n += other.sentiment_n;
        self.ranking_sum += other.ranking_sum;
        self.ranking_n += other.ranking_n;
        self.mentioned += other.mentioned;
        self.mention_n += other.mention_n;
        self.feature_ratio_sum += other.feature_ratio_sum;
        self.feature_n += other.feature_n;
        self.recommended += other.recommended;
    }

    pub fn finish(&self) -> AggregatedMetrics {
        let sentiment_score = if self.sentiment_n > 0 {
            let avg = self.sentiment_sum / self.sentiment_n as f64;
            ((avg + 1.0) / 2.0) * 100.0
        } else {
            0.0
        };
        let ranking_position = if self.ranking_n > 0 {
            self.ranking_sum / self.ranking_n as f64
        } else {
            0.0
        };
        let company_mentioned = if self.mention_n > 0 {
            (self.mentioned as f64 / self.mention_n as f64) * 100.0
        } else {
            0.0
        };
        let feature_score = if self.feature_n > 0 {
            (self.feature_ratio_sum / self.feature_n as f64) * 100.0
        } else {
            0.0
        };
        let recommendation_rate = if self.total > 0 {
            (self.recommended as f64 / self.total as f64) * 100.0
        } else {
            0.0
        };

        AggregatedMetrics {
            sentiment_score,
            ranking_position,
            company_mentioned,
            feature_score,
            recommendation_rate,
            total_responses: self.total,
            samples: MetricSamples {
                sentiment: self.sentiment_n,
                ranking: self.ranking_n,
                mention: self.mention_n,
                feature: self.feature_n,
                recommendation: self.total,
            },
        }
    }
}

/// Per-record feature ratio: judged-yes features over judged features.
/// `None` when the record has no parseable analysis or no judged features —
/// such records are excluded from the feature-score denominator, they do
/// not count as "no".
fn feature_ratio(record: &ResponseRecord) -> Option<f64> {
    let analysis = record.solution_analysis.value()?;
    let judged = analysis.values().filter(|v| v.is_judged()).count();
    if judged == 0 {
        return None;
    }
    let yes = analysis
        .values()
        .filter(|v| matches!(v, crate::types::FeatureVerdict::Yes))
        .count();
    Some(yes as f64 / judged as f64)
}

/// Run all five calculators over a record collection.
pub fn aggregate(records: &[ResponseRecord]) -> AggregatedMetrics {
    aggregate_refs(records.iter())
}

/// Same as [`aggregate`], over borrowed partitions produced by the grouping
/// engine.
pub fn aggregate_refs<'a, I>(records: I) -> AggregatedMetrics
where
    I: IntoIterator<Item = &'a ResponseRecord>,
{
    let mut acc = MetricsAccumulator::default();
    for record in records {
        acc.add(record);
    }
    acc.finish()
}

/// Average clamped sentiment mapped from [-1,1] to [0,100]; 0 with no data.
pub fn sentiment_score(records: &[ResponseRecord]) -> f64 {
    aggregate(records).sentiment_score
}

/// Average ranking position over comparison/final-research records; raw
/// position (lower is better), 0 with no eligible records.
pub fn ranking_position(records: &[ResponseRecord]) -> f64 {
    aggregate(records).ranking_position
}

/// Percentage of exploration/education records mentioning the company.
pub fn company_mentioned_rate(records: &[ResponseRecord]) -> f64 {
    aggregate(records).company_mentioned
}

/// Mean per-record judged-yes ratio over evaluation-stage records, ×100.
pub fn feature_score(records: &[ResponseRecord]) -> f64 {
    aggregate(records).feature_score
}

/// Percentage of all records marked recommended (no stage restriction).
pub fn recommendation_rate(records: &[ResponseRecord]) -> f64 {
    aggregate(records).recommendation_rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureVerdict, FieldParse};
    use std::collections::BTreeMap;

    fn record(stage: Option<JourneyStage>) -> ResponseRecord {
        ResponseRecord {
            company_id: "c1".into(),
            query_id: "q1".into(),
            region: "NA".into(),
            vertical: "SaaS".into(),
            persona: "DevOps Lead".into(),
            journey_stage: stage,
            engine: "chatgpt".into(),
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

    fn verdicts(pairs: &[(&str, FeatureVerdict)]) -> FieldParse<BTreeMap<String, FeatureVerdict>> {
        FieldParse::Parsed(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    #[test]
    fn empty_scope_is_all_zeros() {
        let metrics = aggregate(&[]);
        assert_eq!(metrics, AggregatedMetrics::zero());
        assert_eq!(metrics.total_responses, 0);
        assert_eq!(metrics.samples.sentiment, 0);
    }

    #[test]
    fn sentiment_maps_to_display_scale() {
        let mut a = record(Some(JourneyStage::ProblemExploration));
        a.sentiment_score = Some(0.5);
        let mut b = record(Some(JourneyStage::FinalResearch));
        b.sentiment_score = Some(-0.5);
        let c = record(None); // no score, excluded from denominator

        let records = vec![a, b, c];
        assert!((sentiment_score(&records) - 50.0).abs() < 1e-9);
        assert_eq!(aggregate(&records).samples.sentiment, 2);
    }

    #[test]
    fn out_of_range_sentiment_contributes_at_most_100() {
        let mut a = record(None);
        a.sentiment_score = Some(2.5); // stored pre-clamp; calculator clamps
        let records = vec![a];
        assert!((sentiment_score(&records) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_ignores_out_of_scope_stages() {
        let mut a = record(Some(JourneyStage::ProblemExploration));
        a.ranking_position = Some(1); // exploration rank is not meaningful
        let mut b = record(Some(JourneyStage::SolutionComparison));
        b.ranking_position = Some(2);
        let mut c = record(Some(JourneyStage::FinalResearch));
        c.ranking_position = Some(4);

        let records = vec![a, b, c];
        let metrics = aggregate(&records);
        assert!((metrics.ranking_position - 3.0).abs() < 1e-9);
        assert_eq!(metrics.samples.ranking, 2);
    }

    #[test]
    fn stage_scoped_calculators_zero_on_out_of_scope_input() {
        let mut a = record(Some(JourneyStage::SolutionEvaluation));
        a.ranking_position = Some(2);
        a.company_mentioned = true;
        let records = vec![a];

        let metrics = aggregate(&records);
        assert_eq!(metrics.ranking_position, 0.0);
        assert_eq!(metrics.company_mentioned, 0.0);
        assert_eq!(metrics.samples.ranking, 0);
        assert_eq!(metrics.samples.mention, 0);
        assert!(metrics.ranking_position.is_finite());
    }

    #[test]
    fn mention_rate_counts_only_early_stages() {
        let mut a = record(Some(JourneyStage::ProblemExploration));
        a.company_mentioned = true;
        let b = record(Some(JourneyStage::SolutionEducation));
        let mut c = record(Some(JourneyStage::FinalResearch));
        c.company_mentioned = true; // out of scope, ignored

        let records = vec![a, b, c];
        let metrics = aggregate(&records);
        assert!((metrics.company_mentioned - 50.0).abs() < 1e-9);
        assert_eq!(metrics.samples.mention, 2);
    }

    #[test]
    fn feature_score_averages_per_record_judged_yes_ratio() {
        let mut a = record(Some(JourneyStage::SolutionEvaluation));
        a.solution_analysis = verdicts(&[
            ("sso", FeatureVerdict::Yes),
            ("rbac", FeatureVerdict::No),
            ("audit", FeatureVerdict::Unknown), // not judged
        ]);
        let mut b = record(Some(JourneyStage::SolutionEvaluation));
        b.solution_analysis = verdicts(&[("sso", FeatureVerdict::Yes)]);

        // a: 1/2, b: 1/1 → mean 0.75 → 75
        let records = vec![a, b];
        assert!((feature_score(&records) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn unparseable_analysis_excluded_from_feature_denominator() {
        let mut a = record(Some(JourneyStage::SolutionEvaluation));
        a.solution_analysis = FieldParse::Unparseable;
        let mut b = record(Some(JourneyStage::SolutionEvaluation));
        b.solution_analysis = verdicts(&[("sso", FeatureVerdict::Yes)]);

        let records = vec![a, b];
        let metrics = aggregate(&records);
        assert!((metrics.feature_score - 100.0).abs() < 1e-9);
        assert_eq!(metrics.samples.feature, 1);
    }

    #[test]
    fn all_unknown_verdicts_excluded_from_feature_denominator() {
        let mut a = record(Some(JourneyStage::SolutionEvaluation));
        a.solution_analysis = verdicts(&[("sso", FeatureVerdict::Unknown)]);
        let metrics = aggregate(&[a]);
        assert_eq!(metrics.feature_score, 0.0);
        assert_eq!(metrics.samples.feature, 0);
    }

    #[test]
    fn recommendation_rate_has_no_stage_restriction() {
        let mut a = record(Some(JourneyStage::ProblemExploration));
        a.recommended = true;
        let b = record(None);

        let records = vec![a, b];
        assert!((recommendation_rate(&records) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn merged_accumulators_match_single_pass() {
        let mut a = record(Some(JourneyStage::SolutionComparison));
        a.ranking_position = Some(2);
        a.sentiment_score = Some(0.3);
        let mut b = record(Some(JourneyStage::ProblemExploration));
        b.company_mentioned = true;
        b.recommended = true;

        let mut left = MetricsAccumulator::default();
        left.add(&a);
        let mut right = MetricsAccumulator::default();
        right.add(&b);
        left.merge(&right);

        assert_eq!(left.finish(), aggregate(&[a, b]));
    }
}
