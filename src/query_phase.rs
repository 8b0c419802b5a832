//! Query/phase projector
//!
//! The leaf-level drill-down view: records scoped to one (company, region,
//! vertical, persona) tuple are grouped by journey stage in fixed stage
//! order, then by query within each stage. A stage with no rows at all is
//! omitted; a catalog query with no rows inside an included stage still
//! appears with zero metrics so the UI can show unanswered queries.

use std::collections::{BTreeMap, BTreeSet};

use crate::metrics;
use crate::types::{
    CatalogQuery, EngineResult, JourneyStage, QueryDetail, QueryPhase, ResponseRecord,
};

/// Project records into per-phase, per-query detail. `catalog` supplies
/// query text and stage membership; records referencing queries missing
/// from the catalog still surface, keyed by their query id.
pub fn build_query_phases(
    records: &[ResponseRecord],
    catalog: &[CatalogQuery],
) -> Vec<QueryPhase> {
    let mut phases = Vec::new();

    for stage in JourneyStage::ALL {
        let stage_records: Vec<&ResponseRecord> = records
            .iter()
            .filter(|r| r.journey_stage == Some(stage))
            .collect();
        if stage_records.is_empty() {
            continue;
        }

        let mut by_query: BTreeMap<&str, Vec<&ResponseRecord>> = BTreeMap::new();
        for record in &stage_records {
            by_query.entry(record.query_id.as_str()).or_default().push(record);
        }

        let mut queries = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        // Catalog queries first, in catalog order; those without rows for
        // the current filter set still appear with zero metrics.
        for entry in catalog.iter().filter(|c| c.stage == Some(stage)) {
            if !seen.insert(entry.query_id.as_str()) {
                continue;
            }
            let query_records = by_query.get(entry.query_id.as_str());
            queries.push(query_detail(
                &entry.query_id,
                &entry.query_text,
                query_records.map(Vec::as_slice).unwrap_or(&[]),
            ));
        }

        // Rows whose query is not in the catalog: surface them anyway so
        // data never silently disappears from the drill-down.
        for (query_id, query_records) in &by_query {
            if seen.contains(query_id) {
                continue;
            }
            log::warn!("response rows reference uncataloged query '{}'", query_id);
            queries.push(query_detail(query_id, query_id, query_records));
        }

        let total_responses = queries.iter().map(|q| q.engine_results.len()).sum();

        phases.push(QueryPhase {
            stage,
            metrics: metrics::aggregate_refs(stage_records.iter().copied()),
            total_responses,
            queries,
        });
    }

    phases
}

fn query_detail(query_id: &str, query_text: &str, records: &[&ResponseRecord]) -> QueryDetail {
    let mut engine_results = BTreeMap::new();
    for record in records {
        // First response per engine wins; re-runs within a scope are rare
        // and the caller can pre-filter to a batch when they matter.
        engine_results
            .entry(record.engine.clone())
            .or_insert_with(|| engine_result(record));
    }

    QueryDetail {
        query_id: query_id.to_string(),
        query_text: query_text.to_string(),
        metrics: metrics::aggregate_refs(records.iter().copied()),
        engine_results,
    }
}

fn engine_result(record: &ResponseRecord) -> EngineResult {
    EngineResult {
        ranking_position: record.ranking_position,
        sentiment_score: record.sentiment_score,
        company_mentioned: record.company_mentioned,
        recommended: record.recommended,
        feature_verdicts: record.solution_analysis.value().cloned(),
        competitors: record.competitors.clone(),
        citations: record.citations.clone(),
        response_text: record.response_text.clone(),
    }
}
