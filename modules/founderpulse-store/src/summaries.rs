// Summaries table: one row per (owner, model, period). Later writes for the
// same key supersede earlier ones, since period boundaries belong to the
// external scheduler.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use founderpulse_common::Owner;

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct SummaryStore {
    pool: PgPool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSummary {
    pub id: Uuid,
    pub model: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub summary_md: String,
    pub created_at: DateTime<Utc>,
}

impl SummaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert one model's summary for an owner and period.
    pub async fn upsert(
        &self,
        owner: &Owner,
        model: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
        summary_md: &str,
    ) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO summaries (founder_id, company_id, model, period_start, period_end, summary_md)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ((COALESCE(founder_id, company_id)), model, period_start)
            DO UPDATE SET
                summary_md = EXCLUDED.summary_md,
                period_end = EXCLUDED.period_end,
                created_at = now()
            RETURNING id
            "#,
        )
        .bind(owner.founder_id())
        .bind(owner.company_id())
        .bind(model)
        .bind(period_start)
        .bind(period_end)
        .bind(summary_md)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, owner))?;

        Ok(id)
    }

    /// All summaries stored for an owner, newest period first.
    pub async fn for_owner(&self, owner: &Owner) -> Result<Vec<StoredSummary>> {
        let rows = sqlx::query_as::<_, StoredSummary>(
            r#"
            SELECT id, model, period_start, period_end, summary_md, created_at
            FROM summaries
            WHERE founder_id IS NOT DISTINCT FROM $1
              AND company_id IS NOT DISTINCT FROM $2
            ORDER BY period_start DESC, model
            "#,
        )
        .bind(owner.founder_id())
        .bind(owner.company_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
