use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod payment_record_repository;

pub use payment_record_repository::SqlitePaymentRecordRepository;

/// Pool-scoped access to payment records for the non-transactional
/// surface: checkout initiation and webhook bookkeeping. Everything the
/// reconciliation engine touches goes through its own transaction
/// instead (see [`crate::reconcile`]).
#[async_trait]
pub trait PaymentRecordRepository: Send + Sync {
    async fn create(&self, record: PaymentRecord) -> Result<PaymentRecord>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentRecord>>;
    async fn find_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>>;
    /// Terminal failure reported by the provider (expired session,
    /// failed intent). Only a `Pending` record moves to `Failed`;
    /// returns whether anything changed.
    async fn mark_failed(&self, reference: &str) -> Result<bool>;
}
