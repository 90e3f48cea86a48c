use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use venuebook::{
    api::{self, state::AppState},
    config::Settings,
    domain::{PaymentEvent, PaymentEventStatus, PaymentRecordStatus},
    integrations::NotificationDispatcher,
    payments::{FakeGateway, PaymentGateway},
    reconcile::Reconciler,
    repository::{PaymentRecordRepository, SqlitePaymentRecordRepository},
};

struct TestApp {
    app: Router,
    pool: SqlitePool,
    gateway: Arc<FakeGateway>,
}

async fn setup() -> anyhow::Result<TestApp> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let gateway = Arc::new(FakeGateway::new());
    let state = AppState::new(
        Arc::new(Reconciler::new(pool.clone())),
        Arc::new(SqlitePaymentRecordRepository::new(pool.clone())),
        Some(gateway.clone() as Arc<dyn PaymentGateway>),
        Arc::new(NotificationDispatcher::new()),
        Arc::new(Settings::default()),
    );

    Ok(TestApp {
        app: api::create_app(state),
        pool,
        gateway,
    })
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> anyhow::Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn new_listing_body() -> serde_json::Value {
    serde_json::json!({
        "mode": "new",
        "venue": { "name": "Sál U Lípy", "address": "Dlouhá 12, Praha" },
        "user": { "email": "owner@example.com", "password": "secret123" }
    })
}

fn succeeded_event(reference: &str) -> PaymentEvent {
    PaymentEvent {
        reference: reference.to_string(),
        amount: 1_200_000,
        currency: "CZK".to_string(),
        status: PaymentEventStatus::Succeeded,
        external_subscription_id: Some("sub_api".to_string()),
        external_customer_id: Some("cus_api".to_string()),
    }
}

#[tokio::test]
async fn health_endpoint_responds() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn checkout_creates_pending_record() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .oneshot(json_post("/api/listings/checkout", new_listing_body()))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["reference"], "cs_test_1");
    assert!(body["checkout_url"].as_str().unwrap().starts_with("https://"));

    let repo = SqlitePaymentRecordRepository::new(test.pool.clone());
    let record = repo
        .find_by_reference("cs_test_1")
        .await?
        .expect("record created before payment");
    assert_eq!(record.status, PaymentRecordStatus::Pending);
    assert_eq!(record.expected_amount, 1_200_000);
    assert_eq!(record.expected_currency, "CZK");

    Ok(())
}

#[tokio::test]
async fn checkout_rejects_blank_submission() -> anyhow::Result<()> {
    let test = setup().await?;

    let body = serde_json::json!({
        "mode": "new",
        "venue": { "name": "  ", "address": "Dlouhá 12" },
        "user": { "email": "owner@example.com", "password": "secret123" }
    });
    let response = test
        .app
        .oneshot(json_post("/api/listings/checkout", body))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_records")
        .fetch_one(&test.pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn confirm_completes_and_replays_idempotently() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .clone()
        .oneshot(json_post("/api/listings/checkout", new_listing_body()))
        .await?;
    let reference = body_json(response).await?["reference"]
        .as_str()
        .unwrap()
        .to_string();

    test.gateway.set_payment(succeeded_event(&reference));

    let confirm_body = serde_json::json!({ "reference": reference });
    let response = test
        .app
        .clone()
        .oneshot(json_post("/api/payments/confirm", confirm_body.clone()))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["mode"], "new");

    // The client retrying the confirm gets the same answer, and the
    // database still holds exactly one venue.
    let response = test
        .app
        .clone()
        .oneshot(json_post("/api/payments/confirm", confirm_body))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed");

    let venues: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM venues")
        .fetch_one(&test.pool)
        .await?;
    assert_eq!(venues, 1);

    Ok(())
}

#[tokio::test]
async fn confirm_with_processing_payment_returns_accepted() -> anyhow::Result<()> {
    let test = setup().await?;

    test.gateway.set_payment(PaymentEvent {
        status: PaymentEventStatus::Processing,
        ..succeeded_event("cs_pending")
    });

    let response = test
        .app
        .oneshot(json_post(
            "/api/payments/confirm",
            serde_json::json!({ "reference": "cs_pending" }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "processing");

    Ok(())
}

#[tokio::test]
async fn confirm_with_unknown_reference_is_not_found() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .oneshot(json_post(
            "/api/payments/confirm",
            serde_json::json!({ "reference": "cs_nope" }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn webhook_delivers_success_and_completes_record() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .clone()
        .oneshot(json_post("/api/listings/checkout", new_listing_body()))
        .await?;
    let reference = body_json(response).await?["reference"]
        .as_str()
        .unwrap()
        .to_string();

    test.gateway.set_payment(succeeded_event(&reference));

    // The fake gateway reads the reference straight out of the payload.
    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook/stripe")
                .header("stripe-signature", "t=1,v1=fake")
                .body(Body::from(reference.clone()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed");

    let repo = SqlitePaymentRecordRepository::new(test.pool.clone());
    let record = repo.find_by_reference(&reference).await?.expect("record");
    assert_eq!(record.status, PaymentRecordStatus::Completed);
    assert!(record.venue_id.is_some());

    Ok(())
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook/stripe")
                .body(Body::from("cs_whatever"))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn webhook_failure_marks_pending_record_failed() -> anyhow::Result<()> {
    let test = setup().await?;

    let response = test
        .app
        .clone()
        .oneshot(json_post("/api/listings/checkout", new_listing_body()))
        .await?;
    let reference = body_json(response).await?["reference"]
        .as_str()
        .unwrap()
        .to_string();

    test.gateway.set_payment(PaymentEvent {
        status: PaymentEventStatus::Failed,
        ..succeeded_event(&reference)
    });

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payments/webhook/stripe")
                .header("stripe-signature", "t=1,v1=fake")
                .body(Body::from(reference.clone()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let repo = SqlitePaymentRecordRepository::new(test.pool.clone());
    let record = repo.find_by_reference(&reference).await?.expect("record");
    assert_eq!(record.status, PaymentRecordStatus::Failed);

    Ok(())
}

#[tokio::test]
async fn endpoints_report_unavailable_without_a_gateway() -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState::new(
        Arc::new(Reconciler::new(pool.clone())),
        Arc::new(SqlitePaymentRecordRepository::new(pool)),
        None,
        Arc::new(NotificationDispatcher::new()),
        Arc::new(Settings::default()),
    );
    let app = api::create_app(state);

    let response = app
        .oneshot(json_post("/api/listings/checkout", new_listing_body()))
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    Ok(())
}
