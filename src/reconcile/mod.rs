//! Payment-to-entitlement reconciliation.
//!
//! Two independent callers (the Stripe webhook and the client confirm
//! endpoint) can both observe "payment succeeded" for the same external
//! reference. Everything here runs inside one database transaction so
//! that, no matter how deliveries race or retry, exactly one venue or
//! claim comes out the other side.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{
        PaymentEvent, PaymentEventStatus, PaymentRecord, PaymentRecordStatus, Submission,
        SubmissionDecodeError, SubmissionEnvelope, SubmissionMode,
    },
    error::AppError,
};

mod entitlement;
mod identity;
mod store;
mod subscription;

pub use identity::ResolvedUser;

/// How long a paid listing stays paid before it has to renew.
const ENTITLEMENT_PERIOD_DAYS: i64 = 365;

/// Terminal outcome of a reconciliation attempt. Both triggers receive
/// the same shape, so a duplicate confirm call and the webhook agree on
/// what happened.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// This call performed the writes.
    Completed(CompletedEntitlement),
    /// A previous call already did; re-derived from the stored links,
    /// side-effect free.
    AlreadyProcessed {
        mode: SubmissionMode,
        venue_id: Uuid,
        user_id: Uuid,
        claim_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone)]
pub struct CompletedEntitlement {
    pub mode: SubmissionMode,
    pub venue_id: Uuid,
    pub venue_name: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub expires_at: DateTime<Utc>,
    pub claim_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A concurrent caller owns this reference right now. Retryable:
    /// webhook redelivery or a client-side poll will converge.
    #[error("payment {0} is already being reconciled")]
    InProgress(String),

    #[error(transparent)]
    Fatal(#[from] FatalReason),
}

/// Non-retryable failures. The transaction rolls back entirely, so no
/// partial state is visible afterwards and the record keeps its
/// pre-attempt status.
#[derive(Debug, Error)]
pub enum FatalReason {
    #[error("upstream payment status is not succeeded")]
    UpstreamNotSucceeded,

    #[error("no payment record for reference {0}")]
    UnknownReference(String),

    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: i64, received: i64 },

    #[error("currency mismatch: expected {expected}, received {received}")]
    CurrencyMismatch { expected: String, received: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("a password is required to register a new account")]
    MissingPassword,

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("venue {0} not found")]
    VenueNotFound(Uuid),

    #[error("venue {venue_id} already has an open claim by another user")]
    ClaimConflict { venue_id: Uuid, existing_claim_id: Uuid },

    #[error("invalid submission payload: {0}")]
    BadSubmission(String),

    #[error("data integrity: {0}")]
    DataIntegrity(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for ReconcileError {
    fn from(err: sqlx::Error) -> Self {
        // SQLITE_BUSY (5) / SQLITE_LOCKED (6), extended codes included:
        // another transaction holds the write lock on this record right
        // now. That is the race this module exists to arbitrate, so it
        // surfaces as retryable, not as a storage failure. The reference
        // is filled in by [`Reconciler::reconcile`].
        if let sqlx::Error::Database(db) = &err {
            let primary = db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| code & 0xff);
            if matches!(primary, Some(5) | Some(6)) {
                return ReconcileError::InProgress(String::new());
            }
        }
        ReconcileError::Fatal(FatalReason::Storage(err.to_string()))
    }
}

impl From<SubmissionDecodeError> for ReconcileError {
    fn from(err: SubmissionDecodeError) -> Self {
        ReconcileError::Fatal(FatalReason::BadSubmission(err.to_string()))
    }
}

impl From<FatalReason> for AppError {
    fn from(reason: FatalReason) -> Self {
        match reason {
            FatalReason::UpstreamNotSucceeded => {
                AppError::Payment("Payment has not succeeded upstream".to_string())
            }
            FatalReason::UnknownReference(reference) => {
                AppError::NotFound(format!("No payment found for reference {}", reference))
            }
            FatalReason::AmountMismatch { .. } | FatalReason::CurrencyMismatch { .. } => {
                AppError::Payment("Payment does not match the recorded order".to_string())
            }
            FatalReason::MissingField(field) => {
                AppError::Validation(format!("Missing required field: {}", field))
            }
            FatalReason::MissingPassword => {
                AppError::Validation("A password is required to create an account".to_string())
            }
            FatalReason::UserNotFound(_) | FatalReason::VenueNotFound(_) => {
                AppError::NotFound("Referenced record not found".to_string())
            }
            FatalReason::ClaimConflict { venue_id, .. } => AppError::Conflict(format!(
                "Venue {} already has an open claim by another user",
                venue_id
            )),
            FatalReason::BadSubmission(msg) => AppError::Validation(msg),
            FatalReason::DataIntegrity(msg) => AppError::Internal(msg),
            FatalReason::Storage(msg) => AppError::Database(msg),
        }
    }
}

/// The orchestrator. Holds only the pool; each reconciliation attempt
/// opens its own request-scoped transaction, per the no-singletons rule.
pub struct Reconciler {
    pool: SqlitePool,
}

impl Reconciler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply an externally-verified successful payment event, exactly
    /// once. See the module docs for the race this is defending against.
    pub async fn reconcile(
        &self,
        event: &PaymentEvent,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.attempt(event).await {
            // Busy/locked database errors arrive without a reference
            // attached; every statement in the attempt concerns this one.
            Err(ReconcileError::InProgress(_)) => {
                Err(ReconcileError::InProgress(event.reference.clone()))
            }
            other => other,
        }
    }

    async fn attempt(&self, event: &PaymentEvent) -> Result<ReconcileOutcome, ReconcileError> {
        if event.status != PaymentEventStatus::Succeeded {
            return Err(FatalReason::UpstreamNotSucceeded.into());
        }

        let mut tx = self.pool.begin().await?;

        let record = store::load_by_reference(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| FatalReason::UnknownReference(event.reference.clone()))?;

        match record.status {
            PaymentRecordStatus::Completed => {
                // Duplicate delivery. Re-derive the prior outcome from
                // the stored links without writing anything.
                let outcome = Self::replay(&mut tx, &record).await?;
                tx.commit().await?;
                tracing::info!(reference = %event.reference, "payment already reconciled, replaying outcome");
                Ok(outcome)
            }
            PaymentRecordStatus::Processing => {
                Err(ReconcileError::InProgress(event.reference.clone()))
            }
            PaymentRecordStatus::Failed => {
                // The provider reports success for a record we already
                // closed as failed. Never resurrect it silently.
                Err(FatalReason::DataIntegrity(format!(
                    "payment record {} is Failed but upstream reports success",
                    record.external_reference
                ))
                .into())
            }
            PaymentRecordStatus::Pending => {
                Self::validate_expectation(&record, event)?;

                // The de-facto mutex: a guarded UPDATE only one
                // transaction can win. Losing means another caller got
                // here first.
                if !store::begin_processing(&mut tx, record.id).await? {
                    return Err(ReconcileError::InProgress(event.reference.clone()));
                }

                let entitlement = Self::execute(&mut tx, &record, event).await?;
                tx.commit().await?;
                tracing::info!(
                    reference = %event.reference,
                    venue_id = %entitlement.venue_id,
                    mode = %entitlement.mode,
                    "payment reconciled"
                );
                Ok(ReconcileOutcome::Completed(entitlement))
            }
        }
    }

    /// The received amount and currency must exactly match what was
    /// recorded when the payment intent was created. Defends against
    /// tampering and stale records.
    fn validate_expectation(
        record: &PaymentRecord,
        event: &PaymentEvent,
    ) -> Result<(), ReconcileError> {
        if event.amount != record.expected_amount {
            return Err(FatalReason::AmountMismatch {
                expected: record.expected_amount,
                received: event.amount,
            }
            .into());
        }
        if !event.currency.eq_ignore_ascii_case(&record.expected_currency) {
            return Err(FatalReason::CurrencyMismatch {
                expected: record.expected_currency.clone(),
                received: event.currency.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Steps that run after the record is marked Processing. Any error
    /// unwinds the whole transaction, Processing marker included.
    async fn execute(
        tx: &mut Transaction<'_, Sqlite>,
        record: &PaymentRecord,
        event: &PaymentEvent,
    ) -> Result<CompletedEntitlement, ReconcileError> {
        let envelope = SubmissionEnvelope::decode(&record.submission)?;
        let now = Utc::now();
        let expires_at = now + Duration::days(ENTITLEMENT_PERIOD_DAYS);

        let user = identity::resolve(tx, envelope.submission.user()).await?;

        match &envelope.submission {
            Submission::Claim(claim) => {
                let venue = entitlement::renew_venue(
                    tx,
                    claim.venue_id,
                    expires_at,
                    event.external_subscription_id.as_deref(),
                    now,
                )
                .await?;

                let claim_id =
                    entitlement::attach_claim(tx, claim, user.id, now).await?;

                if let (Some(sub_id), Some(cust_id)) = (
                    event.external_subscription_id.as_deref(),
                    event.external_customer_id.as_deref(),
                ) {
                    subscription::upsert(tx, venue.id, sub_id, cust_id, expires_at, now).await?;
                }

                store::complete(tx, record.id, venue.id, Some(claim_id), now).await?;

                Ok(CompletedEntitlement {
                    mode: SubmissionMode::Claim,
                    venue_id: venue.id,
                    venue_name: venue.name,
                    user_id: user.id,
                    user_email: user.email,
                    expires_at,
                    claim_id: Some(claim_id),
                    amount: event.amount,
                    currency: event.currency.clone(),
                })
            }
            Submission::New(new) => {
                // Reuse only happens when a prior attempt on this record
                // already created the venue (renewal of a pending
                // record); otherwise always create fresh.
                let venue = match record.venue_id {
                    Some(venue_id) => {
                        entitlement::renew_venue(
                            tx,
                            venue_id,
                            expires_at,
                            event.external_subscription_id.as_deref(),
                            now,
                        )
                        .await?
                    }
                    None => {
                        entitlement::create_venue(
                            tx,
                            &new.venue,
                            user.id,
                            expires_at,
                            event.external_subscription_id.as_deref(),
                            now,
                        )
                        .await?
                    }
                };

                if let (Some(sub_id), Some(cust_id)) = (
                    event.external_subscription_id.as_deref(),
                    event.external_customer_id.as_deref(),
                ) {
                    subscription::upsert(tx, venue.id, sub_id, cust_id, expires_at, now).await?;
                }

                store::complete(tx, record.id, venue.id, None, now).await?;

                Ok(CompletedEntitlement {
                    mode: SubmissionMode::New,
                    venue_id: venue.id,
                    venue_name: venue.name,
                    user_id: user.id,
                    user_email: user.email,
                    expires_at,
                    claim_id: None,
                    amount: event.amount,
                    currency: event.currency.clone(),
                })
            }
        }
    }

    /// Idempotency fast path: the record is Completed, so follow its
    /// venue/claim links and report what the first call produced. A
    /// dangling link is a data-integrity error, not something to guess
    /// around.
    async fn replay(
        tx: &mut Transaction<'_, Sqlite>,
        record: &PaymentRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let envelope = SubmissionEnvelope::decode(&record.submission)?;

        let venue_id = record.venue_id.ok_or_else(|| {
            FatalReason::DataIntegrity(format!(
                "completed payment record {} has no venue link",
                record.external_reference
            ))
        })?;

        let manager_id = store::venue_manager(tx, venue_id).await?.ok_or_else(|| {
            FatalReason::DataIntegrity(format!(
                "completed payment record {} links missing venue {}",
                record.external_reference, venue_id
            ))
        })?;

        let user_id = match record.claim_id {
            Some(claim_id) => store::claim_claimant(tx, claim_id).await?.ok_or_else(|| {
                FatalReason::DataIntegrity(format!(
                    "completed payment record {} links missing claim {}",
                    record.external_reference, claim_id
                ))
            })?,
            None => manager_id,
        };

        Ok(ReconcileOutcome::AlreadyProcessed {
            mode: envelope.submission.mode(),
            venue_id,
            user_id,
            claim_id: record.claim_id,
        })
    }
}
