use std::process;
use std::sync::Arc;
use std::time::Duration;

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

use hotboard::application::comments::CommentService;
use hotboard::application::error::AppError;
use hotboard::application::hot::HotCommentsService;
use hotboard::application::jobs::{ResyncJobContext, process_resync_job};
use hotboard::application::repos::CommentsRepo;
use hotboard::cache::{CommentSyncConsumer, HotResync, HotStore, RedisStore};
use hotboard::config;
use hotboard::infra::db::PostgresRepositories;
use hotboard::infra::error::InfraError;
use hotboard::infra::http::{AppState, build_router};
use hotboard::infra::telemetry;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Resync(_) => run_resync(settings).await,
    }
}

async fn init_backends(
    settings: &config::Settings,
) -> Result<(PostgresRepositories, Arc<dyn HotStore>), AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is required"))?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(format!("migrations failed: {err}")))?;

    let store = RedisStore::connect(&settings.redis.url)
        .await
        .map_err(|err| InfraError::cache(err.to_string()))?;

    Ok((PostgresRepositories::new(pool), Arc::new(store)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (db, store) = init_backends(&settings).await?;
    let repo: Arc<dyn CommentsRepo> = Arc::new(db.clone());
    let sync_config = settings.sync.sync_config();

    let consumer = Arc::new(CommentSyncConsumer::new(
        store.clone(),
        sync_config.detail_ttl,
    ));
    let resync = Arc::new(HotResync::new(
        repo.clone(),
        store.clone(),
        sync_config.clone(),
    ));
    let hot = Arc::new(HotCommentsService::new(
        store.clone(),
        repo.clone(),
        sync_config.top_n,
    ));
    let comments = Arc::new(CommentService::new(repo));

    let monitor_handle = spawn_resync_worker(&settings, resync.clone());

    let state = AppState {
        comments,
        hot,
        consumer,
        resync,
        db,
    };
    let result = serve_http(&settings, state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn run_resync(settings: config::Settings) -> Result<(), AppError> {
    let (db, store) = init_backends(&settings).await?;
    let repo: Arc<dyn CommentsRepo> = Arc::new(db);

    let resync = HotResync::new(repo, store, settings.sync.sync_config());
    let outcome = resync.run().await?;
    info!(synced = outcome.synced, "One-shot resync finished");
    Ok(())
}

fn spawn_resync_worker(settings: &config::Settings, resync: Arc<HotResync>) -> JoinHandle<()> {
    let worker = WorkerBuilder::new("resync-worker")
        .data(ResyncJobContext { resync })
        .backend(CronStream::new(settings.sync.schedule.clone()))
        .build_fn(process_resync_job);

    let monitor = Monitor::new().register(worker);
    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.listen_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.listen_addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown handler");
        return;
    }
    info!("Shutdown requested; draining connections");

    // Hard deadline for connections that refuse to drain.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("Graceful shutdown deadline exceeded; exiting");
        process::exit(0);
    });
}
