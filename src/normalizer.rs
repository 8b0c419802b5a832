//! Record normalization boundary
//!
//! Converts loosely-typed storage rows into the strict internal
//! [`ResponseRecord`] shape that every downstream component depends on.
//!
//! Policy per field class:
//! 1. Mandatory identity (`company_id`, `query_id`): missing/blank rejects
//!    the whole record — it would be unattributable.
//! 2. Optional analytic fields: coerced defensively; unparseable values
//!    drop that field's contribution for that record only, with a warning.
//! 3. Dimension strings: null/empty collapse to the `"Unknown"` display
//!    key, consistently across every grouping dimension.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{NormalizeError, RejectionSummary};
use crate::types::{FeatureVerdict, FieldParse, RawResponseRow, ResponseRecord};

/// Result of normalizing a batch of raw rows. Rejections are counted and
/// surfaced to the caller rather than silently dropped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<ResponseRecord>,
    pub rejections: RejectionSummary,
}

/// Normalize one raw row. Pure; errors only when the record is
/// unattributable (missing mandatory identity).
pub fn normalize_row(row: &RawResponseRow) -> Result<ResponseRecord, NormalizeError> {
    let company_id = require_id(&row.company_id).ok_or(NormalizeError::MissingCompanyId)?;
    let query_id = require_id(&row.query_id).ok_or(NormalizeError::MissingQueryId)?;

    let journey_stage = row
        .journey_stage
        .as_deref()
        .and_then(crate::types::JourneyStage::parse);

    Ok(ResponseRecord {
        company_id,
        query_id,
        region: dimension_or_unknown(&row.region),
        vertical: dimension_or_unknown(&row.vertical),
        persona: dimension_or_unknown(&row.persona),
        journey_stage,
        engine: engine_key(&row.engine),
        sentiment_score: row
            .sentiment_score
            .as_ref()
            .and_then(coerce_f64)
            .map(|s| s.clamp(-1.0, 1.0)),
        ranking_position: row.ranking_position.as_ref().and_then(coerce_rank),
        company_mentioned: row.company_mentioned.unwrap_or(false),
        recommended: row.recommended.unwrap_or(false),
        solution_analysis: parse_solution_analysis(row.solution_analysis.as_ref()),
        platform_rankings: parse_rank_list(row.rank_list.as_ref()),
        competitors: parse_string_list(row.competitors_list.as_ref()),
        response_text: row.response_text.clone(),
        citations: parse_string_list(row.citations.as_ref()),
        created_at: row.created_at.as_deref().and_then(parse_timestamp),
        batch_id: row.batch_id.clone(),
    })
}

/// Normalize a batch, partitioning into accepted records and a rejection
/// summary for data-quality reporting.
pub fn normalize_rows(rows: &[RawResponseRow]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for row in rows {
        match normalize_row(row) {
            Ok(record) => batch.records.push(record),
            Err(err) => {
                log::warn!("rejecting response row ({}): {}", err.code(), err);
                batch.rejections.record(&err);
            }
        }
    }
    batch
}

/// Project a normalized record back to the raw row shape. Round-trip
/// invariant: `normalize_row(&raw_projection(r)) == Ok(r)`.
pub fn raw_projection(record: &ResponseRecord) -> RawResponseRow {
    RawResponseRow {
        company_id: Some(record.company_id.clone()),
        query_id: Some(record.query_id.clone()),
        region: Some(record.region.clone()),
        vertical: Some(record.vertical.clone()),
        persona: Some(record.persona.clone()),
        journey_stage: record.journey_stage.map(|s| s.as_str().to_string()),
        engine: Some(record.engine.clone()),
        sentiment_score: record.sentiment_score.map(Value::from),
        ranking_position: record.ranking_position.map(Value::from),
        company_mentioned: Some(record.company_mentioned),
        recommended: Some(record.recommended),
        solution_analysis: match &record.solution_analysis {
            FieldParse::Parsed(map) | FieldParse::Fallback(map) => Some(Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            )),
            FieldParse::Unparseable => Some(Value::from("")),
            FieldParse::Absent => None,
        },
        rank_list: match &record.platform_rankings {
            FieldParse::Parsed(map) => Some(Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(*v)))
                    .collect(),
            )),
            // Preserve the legacy encoding so parse provenance survives the
            // round trip.
            FieldParse::Fallback(map) => Some(Value::from(
                map.iter()
                    .map(|(k, v)| format!("{}:{}", k, v))
                    .collect::<Vec<_>>()
                    .join(","),
            )),
            FieldParse::Unparseable => Some(Value::from("")),
            FieldParse::Absent => None,
        },
        competitors_list: if record.competitors.is_empty() {
            None
        } else {
            Some(Value::from(record.competitors.clone()))
        },
        response_text: record.response_text.clone(),
        citations: if record.citations.is_empty() {
            None
        } else {
            Some(Value::from(record.citations.clone()))
        },
        created_at: record.created_at.map(|dt| dt.to_rfc3339()),
        batch_id: record.batch_id.clone(),
    }
}

fn require_id(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn dimension_or_unknown(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Engine identifiers are lowercase keys ("chatgpt", "perplexity", ...), so
/// the engine dimension normalizes to lowercase rather than "Unknown".
fn engine_key(value: &Option<String>) -> String {
    let trimmed = value.as_deref().map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// Coerce a stored JSON value to a finite float. Never NaN.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Coerce a stored ranking to a positive integer; anything else is absent.
fn coerce_rank(value: &Value) -> Option<u32> {
    let f = coerce_f64(value)?;
    if f >= 1.0 && f <= u32::MAX as f64 && f.fract() == 0.0 {
        Some(f as u32)
    } else {
        None
    }
}

fn parse_solution_analysis(value: Option<&Value>) -> FieldParse<BTreeMap<String, FeatureVerdict>> {
    let value = match value {
        None | Some(Value::Null) => return FieldParse::Absent,
        Some(v) => v,
    };

    match value {
        Value::Object(map) => FieldParse::Parsed(verdict_map(map)),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => FieldParse::Parsed(verdict_map(&map)),
            _ => {
                log::warn!("unparseable solution analysis blob; excluding from feature score");
                FieldParse::Unparseable
            }
        },
        _ => {
            log::warn!("solution analysis has unexpected type; excluding from feature score");
            FieldParse::Unparseable
        }
    }
}

fn verdict_map(map: &serde_json::Map<String, Value>) -> BTreeMap<String, FeatureVerdict> {
    let mut out = BTreeMap::new();
    for (feature, value) in map {
        let feature = feature.trim();
        if feature.is_empty() {
            continue;
        }
        let verdict = match value {
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "yes" | "true" => FeatureVerdict::Yes,
                "no" | "false" => FeatureVerdict::No,
                _ => FeatureVerdict::Unknown,
            },
            Value::Bool(true) => FeatureVerdict::Yes,
            Value::Bool(false) => FeatureVerdict::No,
            _ => continue,
        };
        out.insert(feature.to_string(), verdict);
    }
    out
}

/// Parse engine→rank mappings: strict JSON object first, then the legacy
/// `"engine:rank,engine:rank"` encoding. A malformed single entry is
/// skipped; it never invalidates the whole record.
fn parse_rank_list(value: Option<&Value>) -> FieldParse<BTreeMap<String, u32>> {
    let value = match value {
        None | Some(Value::Null) => return FieldParse::Absent,
        Some(v) => v,
    };

    match value {
        Value::Object(map) => FieldParse::Parsed(rank_map(map)),
        Value::String(text) => {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
                return FieldParse::Parsed(rank_map(&map));
            }
            let fallback = rank_pairs(text);
            if fallback.is_empty() {
                log::warn!("unparseable rank list; excluding platform rankings");
                FieldParse::Unparseable
            } else {
                log::warn!("rank list fell back to legacy pair encoding");
                FieldParse::Fallback(fallback)
            }
        }
        _ => {
            log::warn!("rank list has unexpected type; excluding platform rankings");
            FieldParse::Unparseable
        }
    }
}

fn rank_map(map: &serde_json::Map<String, Value>) -> BTreeMap<String, u32> {
    let mut out = BTreeMap::new();
    for (engine, value) in map {
        let engine = engine.trim().to_lowercase();
        if engine.is_empty() {
            continue;
        }
        if let Some(rank) = coerce_rank(value) {
            out.insert(engine, rank);
        } else {
            log::warn!("skipping unparseable rank for engine '{}'", engine);
        }
    }
    out
}

fn rank_pairs(text: &str) -> BTreeMap<String, u32> {
    let mut out = BTreeMap::new();
    for pair in text.split(',') {
        let mut parts = pair.splitn(2, ':');
        let engine = parts.next().map(str::trim).unwrap_or("").to_lowercase();
        let rank = parts
            .next()
            .map(str::trim)
            .and_then(|p| p.parse::<u32>().ok())
            .filter(|&r| r >= 1);
        match rank {
            Some(rank) if !engine.is_empty() => {
                out.insert(engine, rank);
            }
            _ => {
                if !pair.trim().is_empty() {
                    log::warn!("skipping malformed rank pair '{}'", pair.trim());
                }
            }
        }
    }
    out
}

/// Competitor and citation lists arrive as JSON arrays or comma strings.
fn parse_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(text)) => {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
                return items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Parse stored timestamps defensively. Naive timestamps are interpreted as
/// UTC; unparseable values are excluded from temporal bucketing.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    log::warn!("unparseable created_at '{}'; excluding from timeline", value);
    None
}
