use anyhow::{Context, Result};
use heimdall::application::{
    LoginLogRepository, MaintenanceService, PageRepository, PostRepository, Repository,
    RequestContext, UserRepository,
};
use heimdall::config::{Config, LogFormat};
use heimdall::infrastructure::SqliteDocumentStore;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Text => registry.with(fmt::layer()).try_init()?,
    }
    Ok(())
}

fn sweep_context(config: &Config, shutdown: &CancellationToken) -> RequestContext {
    let ctx = RequestContext::new().with_cancellation(shutdown.child_token());
    match config.operation_timeout {
        Some(timeout) => ctx.with_deadline(Instant::now() + timeout),
        None => ctx,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(config.log_format).context("failed to initialise logging")?;

    let store = if config.is_in_memory() {
        SqliteDocumentStore::open_in_memory()
    } else {
        SqliteDocumentStore::open(&config.database_path)
    }
    .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let service = MaintenanceService::new(
        UserRepository::new(store.collection(UserRepository::COLLECTION)?),
        PostRepository::new(store.collection(PostRepository::COLLECTION)?),
        PageRepository::new(store.collection(PageRepository::COLLECTION)?),
    );
    let logs = LoginLogRepository::new(store.collection(LoginLogRepository::COLLECTION)?);

    let setup = RequestContext::new();
    service
        .ensure_indexes(&setup)
        .await
        .context("failed to provision indexes")?;
    logs.create_indexes(&setup)
        .await
        .context("failed to provision login log indexes")?;
    info!(
        database = %config.database_path.display(),
        interval_secs = config.sweep_interval.as_secs(),
        "maintenance started"
    );

    let shutdown = CancellationToken::new();
    if config.run_once {
        service
            .run_sweep(&sweep_context(&config, &shutdown))
            .await
            .context("maintenance sweep failed")?;
        return Ok(());
    }

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let mut interval = tokio::time::interval(config.sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        if let Err(e) = service.run_sweep(&sweep_context(&config, &shutdown)).await {
            error!(error = %e, "maintenance sweep failed");
        }
    }

    info!("maintenance stopped");
    Ok(())
}
