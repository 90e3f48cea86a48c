use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    pub pricing: PricingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// Listing price is fixed server-side; the client never chooses what it
/// pays. Amounts are minor units (1200000 = 12 000,00 CZK).
#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub annual_listing_minor: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    pub email: Option<EmailConfig>,
    pub analytics: Option<AnalyticsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub admin_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_secret: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("stripe.enabled", false)?
            .set_default("pricing.annual_listing_minor", 1_200_000)?
            .set_default("pricing.currency", "CZK")?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with VENUEBOOK__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("VENUEBOOK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://venuebook.db".to_string(),
                max_connections: 10,
            },
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: None,
                enabled: false,
            },
            pricing: PricingConfig {
                annual_listing_minor: 1_200_000,
                currency: "CZK".to_string(),
            },
            notifications: NotificationConfig::default(),
        }
    }
}
