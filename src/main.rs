use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use venuebook::{
    api::{self, state::AppState},
    config::Settings,
    integrations::{analytics::AnalyticsNotifier, email::EmailNotifier, NotificationDispatcher},
    payments::{PaymentGateway, StripeClient},
    reconcile::Reconciler,
    repository::{self, PaymentRecordRepository},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "venuebook=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Venuebook server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let payment_records: Arc<dyn PaymentRecordRepository> = Arc::new(
        repository::SqlitePaymentRecordRepository::new(db_pool.clone()),
    );
    let reconciler = Arc::new(Reconciler::new(db_pool.clone()));

    // Initialize Stripe gateway if configured
    let gateway: Option<Arc<dyn PaymentGateway>> = if settings.stripe.enabled {
        if let (Some(api_key), Some(webhook_secret)) = (
            settings.stripe.secret_key.clone(),
            settings.stripe.webhook_secret.clone(),
        ) {
            tracing::info!("Stripe payment processing enabled");
            Some(Arc::new(StripeClient::new(api_key, webhook_secret)))
        } else {
            tracing::warn!("Stripe enabled but missing configuration");
            None
        }
    } else {
        tracing::info!("Stripe payment processing disabled");
        None
    };

    // Register best-effort notifiers
    let notifications = Arc::new(NotificationDispatcher::new());
    if let Some(email) = EmailNotifier::new(settings.notifications.email.clone()) {
        notifications.register(Arc::new(email)).await;
    }
    if let Some(analytics) = AnalyticsNotifier::new(settings.notifications.analytics.clone()) {
        notifications.register(Arc::new(analytics)).await;
    }

    let app_state = AppState::new(
        reconciler,
        payment_records,
        gateway,
        notifications,
        Arc::new(settings.clone()),
    );

    let app = api::create_app(app_state);

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
