use anyhow::{Context, bail};
use intercom_daemon::{AppConfig, telemetry};
use intercom_gateway::Gateway;
use intercom_network::DeviceServer;
use intercom_storage::{Database, SqliteRegistrationStore, SqliteReviewerRepository};
use intercom_telegram::{BotApi, TelegramMessenger, UpdatePoller};
use tokio::sync::mpsc;
use tracing::{error, info};

const EVENT_QUEUE: usize = 64;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = AppConfig::load().context("failed to load configuration")?;
    if config.telegram.token.is_empty() {
        bail!("telegram.token is not set (INTERCOM_TELEGRAM__TOKEN)");
    }
    info!(
        device = %config.device.bind_addr,
        database = %config.database.path,
        "Starting intercom gateway"
    );

    let db = Database::new(config.database())
        .await
        .context("failed to open registry database")?;
    let health = db
        .health_check()
        .await
        .context("registry database is not usable")?;
    info!(
        reviewers = health.reviewers,
        units = health.units,
        "Unit registry loaded"
    );
    let registry = SqliteReviewerRepository::new(db.pool().clone());
    let flags = SqliteRegistrationStore::new(db.pool().clone());

    let api = BotApi::new(config.telegram.clone()).context("failed to build Bot API client")?;
    let messenger = TelegramMessenger::new(api.clone());

    let server = DeviceServer::bind(config.device_server()?)
        .await
        .context("failed to bind device listener")?;

    let (device_tx, device_rx) = mpsc::channel(EVENT_QUEUE);
    let (reviewer_tx, reviewer_rx) = mpsc::channel(EVENT_QUEUE);

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(device_tx).await {
            error!(error = %e, "Device server stopped");
        }
    });
    let poller_task = tokio::spawn(UpdatePoller::new(api).run(reviewer_tx));

    let gateway = Gateway::new(config.gateway(), registry, flags, messenger);

    tokio::select! {
        _ = gateway.run(device_rx, reviewer_rx) => {
            info!("Gateway finished");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown requested");
        }
    }

    server_task.abort();
    poller_task.abort();
    db.close().await;

    info!("Intercom gateway stopped");
    Ok(())
}
