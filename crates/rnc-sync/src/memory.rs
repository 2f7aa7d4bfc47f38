//! In-memory store with the same batch semantics as Postgres, used by tests
//! and local dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rnc_core::{
    ActivityCount, IngestionRun, NewIngestionRun, TaxpayerProfile, TaxpayerRecord, TaxpayerStats,
    TOP_ACTIVITY_LIMIT,
};

use crate::store::{RunLedger, SessionSource, StoreError, TaxpayerQueries, TaxpayerStore};

#[derive(Debug, Default)]
struct MemoryState {
    taxpayers: BTreeMap<String, TaxpayerRecord>,
    runs: Vec<IngestionRun>,
    last_taxpayer_id: i64,
    last_run_id: i64,
    committed_batches: usize,
    fail_writes_for: Option<String>,
    fail_ledger: bool,
}

/// Committed state is shared between sessions; the open batch is private to
/// the session that began it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<MemoryState>>,
    pending: Option<BTreeMap<String, TaxpayerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Any insert or update of `taxpayer_id` fails from now on.
    pub fn fail_writes_for(&self, taxpayer_id: impl Into<String>) {
        self.state().fail_writes_for = Some(taxpayer_id.into());
    }

    pub fn fail_ledger_appends(&self, fail: bool) {
        self.state().fail_ledger = fail;
    }

    /// Inserts already-committed rows, bypassing batches.
    pub fn seed(&self, taxpayer_id: &str, profile: TaxpayerProfile, updated_at: DateTime<Utc>) {
        let mut state = self.state();
        state.last_taxpayer_id += 1;
        let record = TaxpayerRecord {
            id: state.last_taxpayer_id,
            taxpayer_id: taxpayer_id.to_string(),
            profile,
            updated_at,
        };
        state.taxpayers.insert(record.taxpayer_id.clone(), record);
    }

    pub fn taxpayers(&self) -> Vec<TaxpayerRecord> {
        self.state().taxpayers.values().cloned().collect()
    }

    pub fn runs(&self) -> Vec<IngestionRun> {
        self.state().runs.clone()
    }

    pub fn committed_batches(&self) -> usize {
        self.state().committed_batches
    }

    fn check_write(&self, taxpayer_id: &str) -> Result<(), StoreError> {
        if self.pending.is_none() {
            return Err(StoreError::NoActiveBatch);
        }
        if self.state().fail_writes_for.as_deref() == Some(taxpayer_id) {
            return Err(StoreError::Injected(format!(
                "write rejected for taxpayer {taxpayer_id}"
            )));
        }
        Ok(())
    }

    fn stage(&mut self, record: TaxpayerRecord) -> Result<(), StoreError> {
        let pending = self.pending.as_mut().ok_or(StoreError::NoActiveBatch)?;
        pending.insert(record.taxpayer_id.clone(), record);
        Ok(())
    }
}

impl SessionSource for MemoryStore {
    type Session = MemoryStore;

    fn session(&self) -> MemoryStore {
        MemoryStore {
            shared: Arc::clone(&self.shared),
            pending: None,
        }
    }
}

#[async_trait]
impl TaxpayerStore for MemoryStore {
    async fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::BatchAlreadyOpen);
        }
        self.pending = Some(BTreeMap::new());
        Ok(())
    }

    async fn find_by_key(
        &mut self,
        taxpayer_id: &str,
    ) -> Result<Option<TaxpayerRecord>, StoreError> {
        let pending = self.pending.as_ref().ok_or(StoreError::NoActiveBatch)?;
        if let Some(record) = pending.get(taxpayer_id) {
            return Ok(Some(record.clone()));
        }
        Ok(self.state().taxpayers.get(taxpayer_id).cloned())
    }

    async fn insert(
        &mut self,
        taxpayer_id: &str,
        profile: &TaxpayerProfile,
        updated_at: DateTime<Utc>,
    ) -> Result<TaxpayerRecord, StoreError> {
        self.check_write(taxpayer_id)?;
        let exists = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.contains_key(taxpayer_id))
            || self.state().taxpayers.contains_key(taxpayer_id);
        if exists {
            return Err(StoreError::Injected(format!(
                "duplicate key value violates unique constraint: rnc={taxpayer_id}"
            )));
        }

        // ids are consumed even when the batch rolls back, like a sequence
        let id = {
            let mut state = self.state();
            state.last_taxpayer_id += 1;
            state.last_taxpayer_id
        };
        let record = TaxpayerRecord {
            id,
            taxpayer_id: taxpayer_id.to_string(),
            profile: profile.clone(),
            updated_at,
        };
        self.stage(record.clone())?;
        Ok(record)
    }

    async fn update(&mut self, record: &TaxpayerRecord) -> Result<(), StoreError> {
        self.check_write(&record.taxpayer_id)?;
        self.stage(record.clone())
    }

    async fn commit_batch(&mut self) -> Result<(), StoreError> {
        let pending = self.pending.take().ok_or(StoreError::NoActiveBatch)?;
        let mut state = self.state();
        state.taxpayers.extend(pending);
        state.committed_batches += 1;
        Ok(())
    }

    async fn rollback_batch(&mut self) -> Result<(), StoreError> {
        self.pending = None;
        Ok(())
    }
}

#[async_trait]
impl RunLedger for MemoryStore {
    async fn append_run(&mut self, run: NewIngestionRun) -> Result<IngestionRun, StoreError> {
        let mut state = self.state();
        if state.fail_ledger {
            return Err(StoreError::Injected("ledger unavailable".into()));
        }
        state.last_run_id += 1;
        let row = IngestionRun {
            id: state.last_run_id,
            recorded_at: run.recorded_at,
            counters: run.counters,
            status: run.status,
            message: run.message,
        };
        state.runs.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl TaxpayerQueries for MemoryStore {
    async fn taxpayer_by_key(
        &self,
        taxpayer_id: &str,
    ) -> Result<Option<TaxpayerRecord>, StoreError> {
        Ok(self.state().taxpayers.get(taxpayer_id).cloned())
    }

    async fn taxpayer_count(&self) -> Result<i64, StoreError> {
        Ok(self.state().taxpayers.len() as i64)
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<IngestionRun>, StoreError> {
        let take = usize::try_from(limit).unwrap_or_default();
        Ok(self.state().runs.iter().rev().take(take).cloned().collect())
    }

    async fn taxpayer_stats(&self) -> Result<TaxpayerStats, StoreError> {
        let state = self.state();
        let mut stats = TaxpayerStats {
            total: state.taxpayers.len() as i64,
            ..TaxpayerStats::default()
        };
        let mut activities = BTreeMap::<String, i64>::new();
        for record in state.taxpayers.values() {
            let profile = &record.profile;
            if let Some(status) = grouping_key(&profile.status) {
                *stats.by_status.entry(status).or_default() += 1;
            }
            if let Some(regime) = grouping_key(&profile.payment_regime) {
                *stats.by_payment_regime.entry(regime).or_default() += 1;
            }
            if let Some(activity) = grouping_key(&profile.economic_activity) {
                *activities.entry(activity).or_default() += 1;
            }
        }

        let mut ranked: Vec<_> = activities.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats.top_activities = ranked
            .into_iter()
            .take(TOP_ACTIVITY_LIMIT)
            .map(|(activity, total)| ActivityCount { activity, total })
            .collect();
        Ok(stats)
    }
}

fn grouping_key(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
