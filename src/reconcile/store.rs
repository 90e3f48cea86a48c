//! Payment-record access scoped to the orchestrator's transaction.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::{PaymentRecord, PaymentRecordStatus};

use super::{FatalReason, ReconcileError};

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

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, ReconcileError> {
    Uuid::parse_str(value)
        .map_err(|e| FatalReason::DataIntegrity(format!("invalid {} uuid: {}", what, e)).into())
}

fn row_to_record(row: PaymentRecordRow) -> Result<PaymentRecord, ReconcileError> {
    Ok(PaymentRecord {
        id: parse_uuid(&row.id, "payment record")?,
        status: PaymentRecordStatus::parse(&row.status).ok_or_else(|| {
            FatalReason::DataIntegrity(format!("invalid payment record status: {}", row.status))
        })?,
        external_reference: row.external_reference,
        submission: row.submission,
        expected_amount: row.expected_amount,
        expected_currency: row.expected_currency,
        venue_id: row
            .venue_id
            .as_deref()
            .map(|v| parse_uuid(v, "venue link"))
            .transpose()?,
        claim_id: row
            .claim_id
            .as_deref()
            .map(|v| parse_uuid(v, "claim link"))
            .transpose()?,
        completed_at: row
            .completed_at
            .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

pub(super) async fn load_by_reference(
    tx: &mut Transaction<'_, Sqlite>,
    reference: &str,
) -> Result<Option<PaymentRecord>, ReconcileError> {
    let row = sqlx::query_as::<_, PaymentRecordRow>(
        r#"
        SELECT id, external_reference, submission, status,
               expected_amount, expected_currency, venue_id, claim_id,
               completed_at, created_at, updated_at
        FROM payment_records
        WHERE external_reference = ?
        "#,
    )
    .bind(reference)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(r) => Ok(Some(row_to_record(r)?)),
        None => Ok(None),
    }
}

/// Guarded Pending -> Processing transition. The WHERE clause makes the
/// update a compare-and-swap the database arbitrates: of two racing
/// transactions, exactly one sees rows_affected == 1.
pub(super) async fn begin_processing(
    tx: &mut Transaction<'_, Sqlite>,
    record_id: Uuid,
) -> Result<bool, ReconcileError> {
    let result = sqlx::query(
        r#"
        UPDATE payment_records
        SET status = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(PaymentRecordStatus::Processing.as_str())
    .bind(Utc::now().naive_utc())
    .bind(record_id.to_string())
    .bind(PaymentRecordStatus::Pending.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn complete(
    tx: &mut Transaction<'_, Sqlite>,
    record_id: Uuid,
    venue_id: Uuid,
    claim_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), ReconcileError> {
    sqlx::query(
        r#"
        UPDATE payment_records
        SET status = ?, venue_id = ?, claim_id = ?, completed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(PaymentRecordStatus::Completed.as_str())
    .bind(venue_id.to_string())
    .bind(claim_id.map(|c| c.to_string()))
    .bind(now.naive_utc())
    .bind(now.naive_utc())
    .bind(record_id.to_string())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Replay-path lookup: who manages the linked venue.
pub(super) async fn venue_manager(
    tx: &mut Transaction<'_, Sqlite>,
    venue_id: Uuid,
) -> Result<Option<Uuid>, ReconcileError> {
    let manager: Option<String> =
        sqlx::query_scalar("SELECT manager_id FROM venues WHERE id = ?")
            .bind(venue_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;

    manager
        .map(|m| parse_uuid(&m, "venue manager"))
        .transpose()
}

/// Replay-path lookup: who filed the linked claim.
pub(super) async fn claim_claimant(
    tx: &mut Transaction<'_, Sqlite>,
    claim_id: Uuid,
) -> Result<Option<Uuid>, ReconcileError> {
    let claimant: Option<String> =
        sqlx::query_scalar("SELECT claimant_id FROM venue_claims WHERE id = ?")
            .bind(claim_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;

    claimant
        .map(|c| parse_uuid(&c, "claimant"))
        .transpose()
}
