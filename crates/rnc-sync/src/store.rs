//! Record-store seams consumed by the reconciliation engine, the run ledger
//! and the read API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rnc_core::{IngestionRun, NewIngestionRun, TaxpayerProfile, TaxpayerRecord, TaxpayerStats};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("no batch transaction is open")]
    NoActiveBatch,
    #[error("a batch transaction is already open")]
    BatchAlreadyOpen,
    #[error("{0}")]
    Injected(String),
}

/// Keyed taxpayer writes. All writes between `begin_batch` and
/// `commit_batch` land together or not at all.
#[async_trait]
pub trait TaxpayerStore: Send {
    async fn begin_batch(&mut self) -> Result<(), StoreError>;

    async fn find_by_key(
        &mut self,
        taxpayer_id: &str,
    ) -> Result<Option<TaxpayerRecord>, StoreError>;

    async fn insert(
        &mut self,
        taxpayer_id: &str,
        profile: &TaxpayerProfile,
        updated_at: DateTime<Utc>,
    ) -> Result<TaxpayerRecord, StoreError>;

    async fn update(&mut self, record: &TaxpayerRecord) -> Result<(), StoreError>;

    async fn commit_batch(&mut self) -> Result<(), StoreError>;

    /// Discards the open batch. A no-op when nothing is open.
    async fn rollback_batch(&mut self) -> Result<(), StoreError>;
}

/// Append-only ingestion history. Appends never join an open batch.
#[async_trait]
pub trait RunLedger: Send {
    async fn append_run(&mut self, run: NewIngestionRun) -> Result<IngestionRun, StoreError>;
}

/// Read side used by the HTTP surface; safe to call while a run is in flight.
#[async_trait]
pub trait TaxpayerQueries: Send + Sync {
    async fn taxpayer_by_key(
        &self,
        taxpayer_id: &str,
    ) -> Result<Option<TaxpayerRecord>, StoreError>;

    async fn taxpayer_count(&self) -> Result<i64, StoreError>;

    async fn recent_runs(&self, limit: i64) -> Result<Vec<IngestionRun>, StoreError>;

    async fn taxpayer_stats(&self) -> Result<TaxpayerStats, StoreError>;
}

/// Hands out a fresh write session per ingestion run.
pub trait SessionSource: Send + Sync + 'static {
    type Session: TaxpayerStore + RunLedger + Send;

    fn session(&self) -> Self::Session;
}
