//! Subscription upsert, keyed by venue id (one subscription per venue).

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::ReconcileError;

/// Write-or-overwrite the subscription row for a venue. The external
/// identifiers always end up reflecting the most recent successful
/// payment, and a successful payment always normalizes status back to
/// `active` (cancellation webhooks flip it elsewhere).
pub(super) async fn upsert(
    tx: &mut Transaction<'_, Sqlite>,
    venue_id: Uuid,
    external_subscription_id: &str,
    external_customer_id: &str,
    current_period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ReconcileError> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, venue_id, external_subscription_id, external_customer_id,
            status, current_period_end, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 'active', ?, ?, ?)
        ON CONFLICT(venue_id) DO UPDATE SET
            external_subscription_id = excluded.external_subscription_id,
            external_customer_id = excluded.external_customer_id,
            status = 'active',
            current_period_end = excluded.current_period_end,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(venue_id.to_string())
    .bind(external_subscription_id)
    .bind(external_customer_id)
    .bind(current_period_end.naive_utc())
    .bind(now.naive_utc())
    .bind(now.naive_utc())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
