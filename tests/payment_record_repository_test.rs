use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use venuebook::{
    domain::{
        NewVenueSubmission, PaymentRecord, PaymentRecordStatus, Submission, SubmissionEnvelope,
        UserFields, VenueFields,
    },
    repository::{PaymentRecordRepository, SqlitePaymentRecordRepository},
};

async fn setup_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

fn sample_submission() -> anyhow::Result<String> {
    let submission = Submission::New(NewVenueSubmission {
        venue: VenueFields {
            name: "Kino Světozor".to_string(),
            address: "Vodičkova 41".to_string(),
            district: Some("Praha 1".to_string()),
            capacity: Some(120),
            venue_type: None,
            contact_email: None,
            contact_phone: None,
        },
        user: UserFields {
            user_id: None,
            email: "kino@example.com".to_string(),
            name: None,
            phone: None,
            password: Some("secret123".to_string()),
        },
        tracking: None,
    });
    Ok(SubmissionEnvelope::new(submission).encode()?)
}

fn record(reference: &str) -> anyhow::Result<PaymentRecord> {
    Ok(PaymentRecord {
        id: Uuid::new_v4(),
        external_reference: reference.to_string(),
        submission: sample_submission()?,
        status: PaymentRecordStatus::Pending,
        expected_amount: 1_200_000,
        expected_currency: "CZK".to_string(),
        venue_id: None,
        claim_id: None,
        completed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    })
}

#[tokio::test]
async fn create_and_find_by_reference() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = SqlitePaymentRecordRepository::new(pool);

    let created = repo.create(record("cs_abc")?).await?;
    assert_eq!(created.status, PaymentRecordStatus::Pending);
    assert_eq!(created.expected_amount, 1_200_000);
    assert_eq!(created.expected_currency, "CZK");

    let found = repo
        .find_by_reference("cs_abc")
        .await?
        .expect("record should exist");
    assert_eq!(found.id, created.id);
    assert!(found.venue_id.is_none());
    assert!(found.completed_at.is_none());

    let decoded = SubmissionEnvelope::decode(&found.submission)?;
    assert_eq!(decoded.submission.user().email, "kino@example.com");

    assert!(repo.find_by_reference("cs_missing").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn duplicate_reference_is_rejected() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = SqlitePaymentRecordRepository::new(pool);

    repo.create(record("cs_dup")?).await?;
    assert!(repo.create(record("cs_dup")?).await.is_err());

    Ok(())
}

#[tokio::test]
async fn mark_failed_only_touches_pending_records() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = SqlitePaymentRecordRepository::new(pool.clone());

    let created = repo.create(record("cs_fail")?).await?;

    assert!(repo.mark_failed("cs_fail").await?);
    let found = repo.find_by_id(created.id).await?.expect("record");
    assert_eq!(found.status, PaymentRecordStatus::Failed);

    // Second delivery of the failure event changes nothing.
    assert!(!repo.mark_failed("cs_fail").await?);

    // Completed records are immune to late failure events.
    sqlx::query("UPDATE payment_records SET status = 'Completed' WHERE external_reference = ?")
        .bind("cs_fail")
        .execute(&pool)
        .await?;
    assert!(!repo.mark_failed("cs_fail").await?);
    let found = repo.find_by_id(created.id).await?.expect("record");
    assert_eq!(found.status, PaymentRecordStatus::Completed);

    // Unknown references report no change rather than erroring.
    assert!(!repo.mark_failed("cs_unknown").await?);

    Ok(())
}
