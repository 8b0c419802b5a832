//! Timeline builder
//!
//! Buckets records by UTC calendar date and produces an ordered series of
//! metric snapshots for trend charts. The series is sparse: days with zero
//! records get no bucket, and gap display is the chart's concern.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::metrics;
use crate::types::{ResponseRecord, TimelineBucket, TimelineGranularity};

/// Build an ascending, date-keyed series of metric snapshots. Records with
/// a missing or unparseable timestamp are excluded — they are not bucketed
/// under an "unknown" date.
pub fn build_timeline(
    records: &[ResponseRecord],
    granularity: TimelineGranularity,
) -> Vec<TimelineBucket> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&ResponseRecord>> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.created_date() {
            buckets
                .entry(bucket_date(date, granularity))
                .or_default()
                .push(record);
        }
    }

    buckets
        .into_iter()
        .map(|(date, partition)| TimelineBucket {
            date,
            metrics: metrics::aggregate_refs(partition),
        })
        .collect()
}

/// Map a calendar date to its bucket key. Week buckets key on the Monday of
/// the ISO week; month buckets on the first of the month.
fn bucket_date(date: NaiveDate, granularity: TimelineGranularity) -> NaiveDate {
    match granularity {
        TimelineGranularity::Day => date,
        TimelineGranularity::Week => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        TimelineGranularity::Month => date.with_day(1).unwrap_or(date),
    }
}
