//! Grouping and rollup engine
//!
//! Partitions a record collection by an arbitrary dimension key (region,
//! vertical, persona, journey stage, or any composite) and applies the
//! metric calculators per partition. Also re-aggregates already-computed
//! child metrics into parent-level metrics without rescanning raw records.
//!
//! The two modes are interchangeable: weighted re-aggregation of children
//! equals direct aggregation of the union of their raw records, because
//! each metric is weighted by its own sample count.

use std::collections::BTreeMap;

use crate::metrics;
use crate::types::{AggregatedMetrics, MetricSamples, ResponseRecord};

/// Partition records by a caller-supplied key function. Key order is stable
/// (sorted) so breakdown views render deterministically.
pub fn group_by<'a, F>(
    records: &'a [ResponseRecord],
    key_fn: F,
) -> BTreeMap<String, Vec<&'a ResponseRecord>>
where
    F: Fn(&ResponseRecord) -> String,
{
    let mut groups: BTreeMap<String, Vec<&ResponseRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }
    groups
}

/// Direct mode: group, then run the metric calculators on each partition's
/// raw records.
pub fn aggregate_by<F>(
    records: &[ResponseRecord],
    key_fn: F,
) -> BTreeMap<String, AggregatedMetrics>
where
    F: Fn(&ResponseRecord) -> String,
{
    group_by(records, key_fn)
        .into_iter()
        .map(|(key, partition)| (key, metrics::aggregate_refs(partition)))
        .collect()
}

/// Weighted re-aggregation mode: combine already-computed child metrics
/// into a parent-level summary without rescanning raw records. Each metric
/// is the sample-count-weighted mean of the children's values;
/// `total_responses` is the sum. An empty child list yields zeros.
pub fn rollup<'a, I>(children: I) -> AggregatedMetrics
where
    I: IntoIterator<Item = &'a AggregatedMetrics>,
{
    let mut samples = MetricSamples::default();
    let mut total = 0usize;
    let mut sentiment_sum = 0.0;
    let mut ranking_sum = 0.0;
    let mut mention_sum = 0.0;
    let mut feature_sum = 0.0;
    let mut recommendation_sum = 0.0;

    for child in children {
        total += child.total_responses;
        sentiment_sum += child.sentiment_score * child.samples.sentiment as f64;
        ranking_sum += child.ranking_position * child.samples.ranking as f64;
        mention_sum += child.company_mentioned * child.samples.mention as f64;
        feature_sum += child.feature_score * child.samples.feature as f64;
        recommendation_sum += child.recommendation_rate * child.samples.recommendation as f64;

        samples.sentiment += child.samples.sentiment;
        samples.ranking += child.samples.ranking;
        samples.mention += child.samples.mention;
        samples.feature += child.samples.feature;
        samples.recommendation += child.samples.recommendation;
    }

    let weighted = |sum: f64, n: usize| if n > 0 { sum / n as f64 } else { 0.0 };

    AggregatedMetrics {
        sentiment_score: weighted(sentiment_sum, samples.sentiment),
        ranking_position: weighted(ranking_sum, samples.ranking),
        company_mentioned: weighted(mention_sum, samples.mention),
        feature_score: weighted(feature_sum, samples.feature),
        recommendation_rate: weighted(recommendation_sum, samples.recommendation),
        total_responses: total,
        samples,
    }
}

/// Competitors seen alongside the company, counted once per record and
/// sorted by mention count (then name, for a stable order).
pub fn competitor_mentions(records: &[ResponseRecord]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        let mut seen: Vec<&str> = record.competitors.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for name in seen {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
