//! Core domain model for the DGII taxpayer registry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rnc-core";

/// Strip hyphens and whitespace from a taxpayer identifier (RNC/cédula).
pub fn normalize_taxpayer_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// True for a normalized identifier of 9 (RNC) or 11 (cédula) ASCII digits.
pub fn is_valid_taxpayer_id(id: &str) -> bool {
    matches!(id.len(), 9 | 11) && id.bytes().all(|b| b.is_ascii_digit())
}

/// One line of the upstream extract, positionally mapped and trimmed.
///
/// Absent optional columns are empty strings; nothing here is validated
/// beyond normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub line_no: usize,
    pub taxpayer_id: String,
    pub name: String,
    pub trade_name: String,
    pub economic_activity: String,
    pub constituted_on: String,
    pub status: String,
    pub payment_regime: String,
    /// Columns beyond the known layout, keyed by synthetic name (`col12`, ...).
    pub extra_columns: Vec<(String, String)>,
}

impl RawRecord {
    /// Mutable portion of the record as it is persisted.
    pub fn profile(&self) -> TaxpayerProfile {
        TaxpayerProfile {
            name: self.name.clone(),
            trade_name: non_empty(&self.trade_name),
            category: None,
            payment_regime: non_empty(&self.payment_regime),
            status: non_empty(&self.status),
            economic_activity: non_empty(&self.economic_activity),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Fields overwritten wholesale on every re-ingestion that matches a key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxpayerProfile {
    pub name: String,
    pub trade_name: Option<String>,
    pub category: Option<String>,
    pub payment_regime: Option<String>,
    pub status: Option<String>,
    pub economic_activity: Option<String>,
}

/// Persisted taxpayer ("contribuyente").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxpayerRecord {
    pub id: i64,
    pub taxpayer_id: String,
    #[serde(flatten)]
    pub profile: TaxpayerProfile,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(RunStatus::Success),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub records_processed: u64,
    pub records_created: u64,
    pub records_updated: u64,
}

impl RunCounters {
    pub fn absorb(&mut self, other: RunCounters) {
        self.records_processed += other.records_processed;
        self.records_created += other.records_created;
        self.records_updated += other.records_updated;
    }
}

/// Ledger row to append; the store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngestionRun {
    pub recorded_at: DateTime<Utc>,
    pub counters: RunCounters,
    pub status: RunStatus,
    pub message: String,
}

/// Persisted ingestion summary ("actualizacion").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub status: RunStatus,
    pub message: String,
}

/// What a trigger returns to its caller: the same facts the ledger stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub message: String,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub recorded_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// How many activities the dataset summary ranks.
pub const TOP_ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCount {
    pub activity: String,
    pub total: i64,
}

/// Aggregate view of the stored registry. Rows with a NULL or empty value
/// are left out of the grouped counts but still count toward `total`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxpayerStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_payment_regime: BTreeMap<String, i64>,
    /// Most frequent first; ties broken alphabetically.
    pub top_activities: Vec<ActivityCount>,
}
