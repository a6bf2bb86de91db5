use timesheet_backend::{
    config::Config, db::connection::create_pool, services::email_tracking::EmailTrackingService,
    services::password_reset,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timesheet_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let deleted_tokens = password_reset::cleanup_old_tokens(&pool).await?;
    tracing::info!(deleted = deleted_tokens, "Removed old password reset tokens");

    sqlx::query("VACUUM (ANALYZE) password_reset_tokens")
        .execute(&pool)
        .await?;

    let deleted_tracking = EmailTrackingService::new(pool.clone(), &config.tracking)
        .cleanup_old_records()
        .await?;
    tracing::info!(deleted = deleted_tracking, "Removed old email tracking records");

    sqlx::query("VACUUM (ANALYZE) email_tracking")
        .execute(&pool)
        .await?;

    Ok(())
}
