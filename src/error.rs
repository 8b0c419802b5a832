//! Error types for record normalization
//!
//! The taxonomy is deliberately small:
//! - Malformed *optional* fields never error — the normalizer drops the
//!   field's contribution for that record and logs a warning.
//! - Missing *mandatory* identity makes a record unattributable and is the
//!   only rejection path.
//! - Empty input is not an error anywhere in the crate.

use thiserror::Error;

/// Why a raw row was rejected by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("record is missing a company id")]
    MissingCompanyId,

    #[error("record is missing a query id")]
    MissingQueryId,
}

impl NormalizeError {
    /// Short code for data-quality reporting.
    pub fn code(&self) -> &'static str {
        match self {
            NormalizeError::MissingCompanyId => "missing_company_id",
            NormalizeError::MissingQueryId => "missing_query_id",
        }
    }
}

/// Serializable rejection summary for data-quality surfacing. Rejected rows
/// are counted and reported to the caller, never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionSummary {
    pub missing_company_id: usize,
    pub missing_query_id: usize,
}

impl RejectionSummary {
    pub fn record(&mut self, error: &NormalizeError) {
        match error {
            NormalizeError::MissingCompanyId => self.missing_company_id += 1,
            NormalizeError::MissingQueryId => self.missing_query_id += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_company_id + self.missing_query_id
    }
}
