use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable record of one payment attempt, keyed by the provider-issued
/// external reference. Created before the user pays, transitioned by the
/// reconciliation engine, and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub external_reference: String,
    /// Serialized [`crate::domain::SubmissionEnvelope`].
    pub submission: String,
    pub status: PaymentRecordStatus,
    /// Expected charge in minor units, fixed at intent-creation time.
    pub expected_amount: i64,
    pub expected_currency: String,
    pub venue_id: Option<Uuid>,
    pub claim_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status transitions are monotonic: Pending -> Processing -> Completed,
/// or Pending -> Failed. Processing observed by a second caller means a
/// concurrent reconciliation owns the record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentRecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentRecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "Pending",
            PaymentRecordStatus::Processing => "Processing",
            PaymentRecordStatus::Completed => "Completed",
            PaymentRecordStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentRecordStatus::Pending),
            "Processing" => Some(PaymentRecordStatus::Processing),
            "Completed" => Some(PaymentRecordStatus::Completed),
            "Failed" => Some(PaymentRecordStatus::Failed),
            _ => None,
        }
    }
}

/// What the payment provider asserts about a payment attempt, after
/// signature/API verification. Anything other than `Succeeded` is
/// rejected by the reconciler before it touches the database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentEventStatus {
    Succeeded,
    Processing,
    Failed,
}

/// An externally-verified payment event, the reconciler's sole input.
/// Both triggers (webhook and client confirm) produce this shape.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub reference: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentEventStatus,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
}
