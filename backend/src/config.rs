use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::utils::cookies::SameSite;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
    pub app_timezone: Tz,
    /// Public URL the application is reachable at; used in emailed links.
    pub base_url: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub cors_allow_origins: Vec<String>,
    pub rate_limit_ip_max_requests: u32,
    pub rate_limit_ip_window_seconds: u64,
    pub storage_dir: PathBuf,
    pub smtp: SmtpConfig,
    pub invoicing: InvoicingConfig,
    pub tracking: TrackingConfig,
    pub password_reset: PasswordResetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// Copy recipient added to every invoice email.
    pub invoice_cc: Option<String>,
    pub skip_send: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicingConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    pub cron: String,
    pub admin_email: String,
    pub send_summary_email: bool,
    pub send_empty_client_warning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub enabled: bool,
    pub token_expiry_days: i64,
    pub notification_email: String,
    pub send_instant_report: bool,
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub shutdown_timeout_seconds: u64,
}

impl TrackingConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfig {
    pub ip_max_attempts: usize,
    pub email_max_attempts: usize,
    pub window_seconds: u64,
    pub admin_ttl_minutes: i64,
    pub self_ttl_minutes: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("database_url", "postgres://localhost/timesheet")?
            .set_default("jwt_secret", "")?
            .set_default("jwt_expiration_hours", 24)?
            .set_default("app_timezone", "Europe/London")?
            .set_default("base_url", "http://localhost:3000")?
            .set_default("cookie_secure", false)?
            .set_default("cookie_same_site", "Lax")?
            .set_default("cors_allow_origins", vec!["http://localhost:3000"])?
            .set_default("rate_limit_ip_max_requests", 15)?
            .set_default("rate_limit_ip_window_seconds", 900)?
            .set_default("storage_dir", "./storage")?
            .set_default("smtp.host", "localhost")?
            .set_default("smtp.port", 587)?
            .set_default("smtp.username", "")?
            .set_default("smtp.password", "")?
            .set_default("smtp.from_address", "invoices@timesheet.local")?
            .set_default("smtp.skip_send", false)?
            .set_default("invoicing.enabled", false)?
            .set_default("invoicing.cron", "0 0 6 1 * *")?
            .set_default("invoicing.admin_email", "admin@timesheet.local")?
            .set_default("invoicing.send_summary_email", true)?
            .set_default("invoicing.send_empty_client_warning", true)?
            .set_default("tracking.enabled", true)?
            .set_default("tracking.token_expiry_days", 90)?
            .set_default("tracking.notification_email", "admin@timesheet.local")?
            .set_default("tracking.send_instant_report", true)?
            .set_default("tracking.core_workers", 2)?
            .set_default("tracking.max_workers", 5)?
            .set_default("tracking.queue_capacity", 25)?
            .set_default("tracking.shutdown_timeout_seconds", 60)?
            .set_default("password_reset.ip_max_attempts", 5)?
            .set_default("password_reset.email_max_attempts", 3)?
            .set_default("password_reset.window_seconds", 300)?
            .set_default("password_reset.admin_ttl_minutes", 30)?
            .set_default("password_reset.self_ttl_minutes", 15)?
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allow_origins"),
            )
            .build()
            .context("Failed to assemble configuration sources")?;

        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration values")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            ));
        }
        if self.tracking.core_workers == 0 || self.tracking.max_workers < self.tracking.core_workers
        {
            return Err(anyhow!(
                "TRACKING__MAX_WORKERS must be >= TRACKING__CORE_WORKERS >= 1"
            ));
        }
        if self.invoicing.enabled {
            self.invoicing
                .cron
                .parse::<cron::Schedule>()
                .map_err(|e| anyhow!("Invalid INVOICING__CRON expression: {}", e))?;
        }
        Ok(())
    }
}
