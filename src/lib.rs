//! answerscope: metrics aggregation for AI answer-engine visibility.
//!
//! Raw query-response rows (one per query × engine run) are normalized into
//! strict records, scored with five visibility metrics, and rolled up across
//! the company / region / vertical / persona / journey-stage hierarchy.
//! Timeline and query-phase projections sit on top of the same calculators,
//! so every view of a given record set reports identical numbers.

pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod query_phase;
pub mod rollup;
pub mod timeline;
pub mod types;

pub use error::{NormalizeError, RejectionSummary};
pub use metrics::{aggregate, MetricsAccumulator};
pub use normalizer::{normalize_row, normalize_rows, NormalizedBatch};
pub use query_phase::build_query_phases;
pub use rollup::{aggregate_by, group_by, rollup};
pub use timeline::build_timeline;
pub use types::{
    AggregatedMetrics, CatalogQuery, FieldParse, JourneyStage, QueryPhase, RawResponseRow,
    RecordFilter, ResponseRecord, TimelineBucket, TimelineGranularity,
};
