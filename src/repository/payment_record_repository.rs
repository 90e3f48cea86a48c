use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{PaymentRecord, PaymentRecordStatus},
    error::{AppError, Result},
    repository::PaymentRecordRepository,
};

#[derive(FromRow)]
struct PaymentRecordRow {
    id: String,
    external_reference: String,
    submission: String,
    status: String,
    expected_amount: i64,
    expected_currency: String,
    venue_id: Option<String>,
    claim_id: Option<String>,
    completed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRecordRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: PaymentRecordRow) -> Result<PaymentRecord> {
        Ok(PaymentRecord {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            external_reference: row.external_reference,
            submission: row.submission,
            status: PaymentRecordStatus::parse(&row.status).ok_or_else(|| {
                AppError::Database(format!("Invalid payment record status: {}", row.status))
            })?,
            expected_amount: row.expected_amount,
            expected_currency: row.expected_currency,
            venue_id: row
                .venue_id
                .map(|v| Uuid::parse_str(&v))
                .transpose()
                .map_err(|e| AppError::Database(e.to_string()))?,
            claim_id: row
                .claim_id
                .map(|v| Uuid::parse_str(&v))
                .transpose()
                .map_err(|e| AppError::Database(e.to_string()))?,
            completed_at: row
                .completed_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, external_reference, submission, status,
           expected_amount, expected_currency, venue_id, claim_id,
           completed_at, created_at, updated_at
    FROM payment_records
"#;

#[async_trait]
impl PaymentRecordRepository for SqlitePaymentRecordRepository {
    async fn create(&self, record: PaymentRecord) -> Result<PaymentRecord> {
        let id_str = record.id.to_string();
        let status_str = record.status.as_str();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payment_records (
                id, external_reference, submission, status,
                expected_amount, expected_currency, venue_id, claim_id,
                completed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&record.external_reference)
        .bind(&record.submission)
        .bind(status_str)
        .bind(record.expected_amount)
        .bind(&record.expected_currency)
        .bind(record.venue_id.map(|v| v.to_string()))
        .bind(record.claim_id.map(|v| v.to_string()))
        .bind(record.completed_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(record.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment record".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, PaymentRecordRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id_str)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRecordRow>(&format!(
            "{} WHERE external_reference = ?",
            SELECT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_failed(&self, reference: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();

        // Guarded: a record that already moved past Pending is left alone.
        let result = sqlx::query(
            r#"
            UPDATE payment_records
            SET status = ?, updated_at = ?
            WHERE external_reference = ? AND status = ?
            "#,
        )
        .bind(PaymentRecordStatus::Failed.as_str())
        .bind(now)
        .bind(reference)
        .bind(PaymentRecordStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
