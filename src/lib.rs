pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod search_client;
pub mod seatmap;
pub mod services;

use std::sync::Arc;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub search_client: search_client::SearchClient,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;
        db.ping().await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        redis.ping().await?;

        let cache = cache::CacheService::new(redis.clone(), db.clone(), &config.booking);
        let search_client = search_client::SearchClient::new(db.pool.clone());
        search_client.initialize().await?;
        let state = Arc::new(Self {
            db,
            redis,
            cache,
            config,
            search_client,
        });

        Ok(state)
    }
}
