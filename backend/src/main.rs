use std::{net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timesheet_backend::{
    app,
    config::Config,
    db::connection::{create_pool, DbPool},
    services::scheduler::InvoicingScheduler,
    state::AppState,
    utils::email::SmtpMailer,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timesheet_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        jwt_secret = %mask_secret(&config.jwt_secret),
        jwt_expiration_hours = config.jwt_expiration_hours,
        time_zone = %config.app_timezone,
        base_url = %config.base_url,
        storage_dir = %config.storage_dir.display(),
        smtp_host = %config.smtp.host,
        smtp_password = %mask_secret(&config.smtp.password),
        invoicing_enabled = config.invoicing.enabled,
        invoicing_cron = %config.invoicing.cron,
        tracking_enabled = config.tracking.enabled,
        "Loaded configuration from environment/.env"
    );

    let pool: DbPool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let state = AppState::new(pool, config.clone(), mailer);

    let cancel = CancellationToken::new();
    let scheduler_handle = if config.invoicing.enabled {
        let scheduler = InvoicingScheduler::new(
            state.invoicing_job(),
            &config.invoicing.cron,
            config.app_timezone,
        )?;
        Some(scheduler.spawn(cancel.clone()))
    } else {
        tracing::info!("Monthly invoicing scheduler disabled");
        None
    };

    let notifier = state.notifier.clone();
    let router = app(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    if let Some(handle) = scheduler_handle {
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "Invoicing scheduler task ended abnormally");
        }
    }
    notifier.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
