use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_booking::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TransitBook API ({})", config.app.environment);

    // Общее состояние: БД + миграции, Redis, кеш, поиск рейсов
    let app_state = AppState::new(config.clone()).await?;
    info!("Database and Redis connected");

    // Прогрев кеша перед приемом трафика
    app_state.cache.warmup().await;
    info!("Cache warmed up");

    // --- Фоновые задачи ---

    // Периодическая очистка удержаний по ушедшим рейсам
    let cleanup = CleanupService::new(app_state.clone());
    let cleanup_interval = Duration::from_secs(config.booking.cleanup_interval_seconds);
    task::spawn(async move {
        loop {
            cleanup.run_full_cleanup().await;
            tokio::time::sleep(cleanup_interval).await;
        }
    });

    // --- Веб-сервер ---

    let app = Router::new()
        .route("/", get(|| async { "TransitBook API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // Маршруты из модуля controllers
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
