use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub nats: NatsConfig,
    pub provider: ProviderConfig,
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NatsConfig {
    pub url: String,
    pub topic_prefix: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// Use the in-process mock instead of the live mobile-money gateway
    pub use_mock: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaymentsConfig {
    pub currency: String,
    pub delivery_fee: Decimal,
    /// Commission on marketplace orders, percent
    pub marketplace_commission_rate: Decimal,
    /// Commission on expert consultations, percent
    pub expert_commission_rate: Decimal,
    pub single_transaction_limit: Decimal,
    pub daily_transaction_limit: Decimal,
    pub escrow_expiry_days: i64,
    /// Cron expression for the expired-escrow sweep
    pub sweep_schedule: String,
    /// Owner of the platform commission wallet
    pub platform_user_id: Uuid,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8086)?
            .set_default("server.workers", 4)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("nats.url", "nats://localhost:4222")?
            .set_default("nats.topic_prefix", "agromarket")?
            .set_default("nats.enabled", true)?
            .set_default("provider.base_url", "http://localhost:9090")?
            .set_default("provider.api_key", "")?
            .set_default("provider.timeout_secs", 30)?
            .set_default("provider.use_mock", true)?
            .set_default("payments.currency", "XAF")?
            .set_default("payments.delivery_fee", "2000")?
            .set_default("payments.marketplace_commission_rate", "2.50")?
            .set_default("payments.expert_commission_rate", "20.00")?
            .set_default("payments.single_transaction_limit", "500000")?
            .set_default("payments.daily_transaction_limit", "1000000")?
            .set_default("payments.escrow_expiry_days", 14)?
            .set_default("payments.sweep_schedule", "0 0 * * * *")?
            .set_default(
                "payments.platform_user_id",
                "00000000-0000-0000-0000-000000000001",
            )?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("PAYMENTS_ENGINE")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(nats_url) = env::var("NATS_URL") {
            builder = builder.set_override("nats.url", nats_url)?;
        }

        if let Ok(port) = env::var("PAYMENTS_ENGINE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(provider_url) = env::var("PAYMENT_PROVIDER_URL") {
            builder = builder.set_override("provider.base_url", provider_url)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.nats.enabled && self.nats.url.is_empty() {
            return Err("NATS URL is required when NATS is enabled".to_string());
        }

        if !self.provider.use_mock && self.provider.api_key.is_empty() {
            return Err("Provider API key is required outside mock mode".to_string());
        }

        if self.payments.delivery_fee < Decimal::ZERO {
            return Err("Delivery fee cannot be negative".to_string());
        }

        if self.payments.marketplace_commission_rate < Decimal::ZERO
            || self.payments.marketplace_commission_rate > Decimal::from(100)
            || self.payments.expert_commission_rate < Decimal::ZERO
            || self.payments.expert_commission_rate > Decimal::from(100)
        {
            return Err("Commission rates must be between 0 and 100 percent".to_string());
        }

        if self.payments.single_transaction_limit <= Decimal::ZERO
            || self.payments.daily_transaction_limit < self.payments.single_transaction_limit
        {
            return Err(
                "Daily limit must be at least the single-transaction limit".to_string()
            );
        }

        if self.payments.escrow_expiry_days <= 0 {
            return Err("Escrow expiry must be at least one day".to_string());
        }

        Ok(())
    }
}
