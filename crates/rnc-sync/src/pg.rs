//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rnc_core::{
    ActivityCount, IngestionRun, NewIngestionRun, RunCounters, RunStatus, TaxpayerProfile,
    TaxpayerRecord, TaxpayerStats, TOP_ACTIVITY_LIMIT,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::store::{RunLedger, SessionSource, StoreError, TaxpayerQueries, TaxpayerStore};

const TAXPAYER_COLUMNS: &str = "id, rnc, nombre, nombre_comercial, categoria, regimen_pagos, \
     estado, actividad_economica, fecha_actualizacion";

/// Pool handle: read API plus a session factory for ingestion runs.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SessionSource for PgCatalog {
    type Session = PgStore;

    fn session(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }
}

/// One ingestion session; holds at most one open batch transaction.
pub struct PgStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    fn open_tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::NoActiveBatch)
    }
}

fn taxpayer_from_row(row: &PgRow) -> Result<TaxpayerRecord, sqlx::Error> {
    Ok(TaxpayerRecord {
        id: row.try_get("id")?,
        taxpayer_id: row.try_get("rnc")?,
        profile: TaxpayerProfile {
            name: row.try_get("nombre")?,
            trade_name: row.try_get("nombre_comercial")?,
            category: row.try_get("categoria")?,
            payment_regime: row.try_get("regimen_pagos")?,
            status: row.try_get("estado")?,
            economic_activity: row.try_get("actividad_economica")?,
        },
        updated_at: row.try_get("fecha_actualizacion")?,
    })
}

fn run_from_row(row: &PgRow) -> Result<IngestionRun, sqlx::Error> {
    let counter = |column: &str| -> Result<u64, sqlx::Error> {
        let value: i64 = row.try_get(column)?;
        Ok(u64::try_from(value).unwrap_or_default())
    };
    let status: String = row.try_get("estado")?;
    let message: Option<String> = row.try_get("mensaje")?;
    Ok(IngestionRun {
        id: row.try_get("id")?,
        recorded_at: row.try_get("fecha")?,
        counters: RunCounters {
            records_processed: counter("registros_procesados")?,
            records_created: counter("registros_nuevos")?,
            records_updated: counter("registros_actualizados")?,
        },
        // rows written before status was constrained read as failures
        status: RunStatus::parse(&status).unwrap_or(RunStatus::Error),
        message: message.unwrap_or_default(),
    })
}

/// `(value, count)` per distinct non-empty value of `column`, most frequent
/// first. `column` is always one of our own literals.
async fn grouped_counts(
    pool: &PgPool,
    column: &'static str,
    limit: Option<i64>,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {column} AS value, COUNT(*) AS total
          FROM contribuyentes
         WHERE {column} IS NOT NULL AND {column} <> ''
         GROUP BY {column}
         ORDER BY total DESC, value ASC
         LIMIT $1
        "#
    );
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        out.push((row.try_get("value")?, row.try_get("total")?));
    }
    Ok(out)
}

fn counter_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl TaxpayerStore for PgStore {
    async fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.tx.is_some() {
            return Err(StoreError::BatchAlreadyOpen);
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn find_by_key(
        &mut self,
        taxpayer_id: &str,
    ) -> Result<Option<TaxpayerRecord>, StoreError> {
        let tx = self.open_tx()?;
        let sql = format!("SELECT {TAXPAYER_COLUMNS} FROM contribuyentes WHERE rnc = $1");
        let row = sqlx::query(&sql)
            .bind(taxpayer_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.as_ref().map(taxpayer_from_row).transpose()?)
    }

    async fn insert(
        &mut self,
        taxpayer_id: &str,
        profile: &TaxpayerProfile,
        updated_at: DateTime<Utc>,
    ) -> Result<TaxpayerRecord, StoreError> {
        let tx = self.open_tx()?;
        let sql = format!(
            r#"
            INSERT INTO contribuyentes
                (rnc, nombre, nombre_comercial, categoria, regimen_pagos, estado,
                 actividad_economica, fecha_actualizacion)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TAXPAYER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(taxpayer_id)
            .bind(&profile.name)
            .bind(&profile.trade_name)
            .bind(&profile.category)
            .bind(&profile.payment_regime)
            .bind(&profile.status)
            .bind(&profile.economic_activity)
            .bind(updated_at)
            .fetch_one(&mut **tx)
            .await?;
        Ok(taxpayer_from_row(&row)?)
    }

    async fn update(&mut self, record: &TaxpayerRecord) -> Result<(), StoreError> {
        let tx = self.open_tx()?;
        sqlx::query(
            r#"
            UPDATE contribuyentes
               SET nombre = $2,
                   nombre_comercial = $3,
                   categoria = $4,
                   regimen_pagos = $5,
                   estado = $6,
                   actividad_economica = $7,
                   fecha_actualizacion = $8
             WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.profile.name)
        .bind(&record.profile.trade_name)
        .bind(&record.profile.category)
        .bind(&record.profile.payment_regime)
        .bind(&record.profile.status)
        .bind(&record.profile.economic_activity)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn commit_batch(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::NoActiveBatch)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback_batch(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RunLedger for PgStore {
    async fn append_run(&mut self, run: NewIngestionRun) -> Result<IngestionRun, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO actualizaciones_db
                (fecha, registros_procesados, registros_nuevos, registros_actualizados,
                 estado, mensaje)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, fecha, registros_procesados, registros_nuevos,
                      registros_actualizados, estado, mensaje
            "#,
        )
        .bind(run.recorded_at)
        .bind(counter_value(run.counters.records_processed))
        .bind(counter_value(run.counters.records_created))
        .bind(counter_value(run.counters.records_updated))
        .bind(run.status.as_str())
        .bind(&run.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(run_from_row(&row)?)
    }
}

#[async_trait]
impl TaxpayerQueries for PgCatalog {
    async fn taxpayer_by_key(
        &self,
        taxpayer_id: &str,
    ) -> Result<Option<TaxpayerRecord>, StoreError> {
        let sql = format!("SELECT {TAXPAYER_COLUMNS} FROM contribuyentes WHERE rnc = $1");
        let row = sqlx::query(&sql)
            .bind(taxpayer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(taxpayer_from_row).transpose()?)
    }

    async fn taxpayer_count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM contribuyentes")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<IngestionRun>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, fecha, registros_procesados, registros_nuevos,
                   registros_actualizados, estado, mensaje
              FROM actualizaciones_db
             ORDER BY fecha DESC, id DESC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(run_from_row(row)?);
        }
        Ok(out)
    }

    async fn taxpayer_stats(&self) -> Result<TaxpayerStats, StoreError> {
        let total = self.taxpayer_count().await?;
        let by_status = grouped_counts(&self.pool, "estado", None).await?;
        let by_payment_regime = grouped_counts(&self.pool, "regimen_pagos", None).await?;
        let top = grouped_counts(
            &self.pool,
            "actividad_economica",
            Some(TOP_ACTIVITY_LIMIT as i64),
        )
        .await?;
        Ok(TaxpayerStats {
            total,
            by_status: by_status.into_iter().collect(),
            by_payment_regime: by_payment_regime.into_iter().collect(),
            top_activities: top
                .into_iter()
                .map(|(activity, total)| ActivityCount { activity, total })
                .collect(),
        })
    }
}
