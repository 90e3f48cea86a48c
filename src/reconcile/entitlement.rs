//! Entitlement writer: the mutually-exclusive "new listing" and "claim
//! existing listing" branches.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::{derive_slug, ClaimStatus, ClaimSubmission, VenueFields, VenueStatus};

use super::{FatalReason, ReconcileError};

#[derive(Debug, Clone)]
pub(super) struct VenueSummary {
    pub id: Uuid,
    pub name: String,
}

/// Create a fresh paid listing in `Pending` status (manual approval
/// happens elsewhere). Name and address are the only hard requirements.
pub(super) async fn create_venue(
    tx: &mut Transaction<'_, Sqlite>,
    fields: &VenueFields,
    manager_id: Uuid,
    expires_at: DateTime<Utc>,
    subscription_reference: Option<&str>,
    now: DateTime<Utc>,
) -> Result<VenueSummary, ReconcileError> {
    let name = fields.name.trim();
    if name.is_empty() {
        return Err(FatalReason::MissingField("venue.name").into());
    }
    if fields.address.trim().is_empty() {
        return Err(FatalReason::MissingField("venue.address").into());
    }

    let id = Uuid::new_v4();
    let slug = derive_slug(name);

    sqlx::query(
        r#"
        INSERT INTO venues (
            id, name, slug, address, district, capacity, venue_type,
            contact_email, contact_phone, paid, expires_at,
            subscription_reference, manager_id, status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(name)
    .bind(&slug)
    .bind(fields.address.trim())
    .bind(fields.district.as_deref())
    .bind(fields.capacity)
    .bind(fields.venue_type.as_deref())
    .bind(fields.contact_email.as_deref())
    .bind(fields.contact_phone.as_deref())
    .bind(expires_at.naive_utc())
    .bind(subscription_reference)
    .bind(manager_id.to_string())
    .bind(VenueStatus::Pending.as_str())
    .bind(now.naive_utc())
    .bind(now.naive_utc())
    .execute(&mut **tx)
    .await?;

    Ok(VenueSummary {
        id,
        name: name.to_string(),
    })
}

/// Refresh an existing venue's paid entitlement: paid flag on, expiry
/// pushed out, subscription reference updated when one arrived with the
/// payment. The slug and everything else stay untouched.
pub(super) async fn renew_venue(
    tx: &mut Transaction<'_, Sqlite>,
    venue_id: Uuid,
    expires_at: DateTime<Utc>,
    subscription_reference: Option<&str>,
    now: DateTime<Utc>,
) -> Result<VenueSummary, ReconcileError> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM venues WHERE id = ?")
        .bind(venue_id.to_string())
        .fetch_optional(&mut **tx)
        .await?;

    let name = name.ok_or(FatalReason::VenueNotFound(venue_id))?;

    sqlx::query(
        r#"
        UPDATE venues
        SET paid = 1,
            expires_at = ?,
            subscription_reference = COALESCE(?, subscription_reference),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(expires_at.naive_utc())
    .bind(subscription_reference)
    .bind(now.naive_utc())
    .bind(venue_id.to_string())
    .execute(&mut **tx)
    .await?;

    Ok(VenueSummary { id: venue_id, name })
}

#[derive(FromRow)]
struct OpenClaimRow {
    id: String,
    claimant_id: String,
}

/// Attach a claim to the venue for this claimant.
///
/// At most one claim may be open (Pending or Approved) per venue. An
/// open claim by the same claimant is reused, so retries never duplicate
/// rows. An open claim by anyone else is a hard conflict; the payment
/// must not silently create a competing claim.
pub(super) async fn attach_claim(
    tx: &mut Transaction<'_, Sqlite>,
    submission: &ClaimSubmission,
    claimant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Uuid, ReconcileError> {
    let existing = sqlx::query_as::<_, OpenClaimRow>(
        r#"
        SELECT id, claimant_id FROM venue_claims
        WHERE venue_id = ? AND status IN (?, ?)
        LIMIT 1
        "#,
    )
    .bind(submission.venue_id.to_string())
    .bind(ClaimStatus::Pending.as_str())
    .bind(ClaimStatus::Approved.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(row) = existing {
        let existing_claim_id = Uuid::parse_str(&row.id)
            .map_err(|e| FatalReason::DataIntegrity(format!("invalid claim uuid: {}", e)))?;

        if row.claimant_id == claimant_id.to_string() {
            return Ok(existing_claim_id);
        }

        return Err(FatalReason::ClaimConflict {
            venue_id: submission.venue_id,
            existing_claim_id,
        }
        .into());
    }

    let id = Uuid::new_v4();
    let snapshot = serde_json::to_string(&submission.snapshot())
        .map_err(|e| FatalReason::BadSubmission(format!("snapshot serialization: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO venue_claims (id, venue_id, claimant_id, status, submission_snapshot, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(submission.venue_id.to_string())
    .bind(claimant_id.to_string())
    .bind(ClaimStatus::Pending.as_str())
    .bind(&snapshot)
    .bind(now.naive_utc())
    .bind(now.naive_utc())
    .execute(&mut **tx)
    .await?;

    Ok(id)
}
