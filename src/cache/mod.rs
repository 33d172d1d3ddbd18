use crate::{config::BookingConfig, database::Database, redis_client::RedisClient};
use tracing::info;

pub mod auth;
pub mod holds;
pub mod schedules;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
    hold_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database, booking: &BookingConfig) -> Self {
        Self {
            redis,
            db,
            hold_ttl_seconds: booking.hold_ttl_seconds,
        }
    }

    // Прогрев кеша при старте
    pub async fn warmup(&self) {
        info!("Starting cache warmup...");

        // Занятые места ближайших рейсов
        let upcoming: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM schedules
             WHERE status = 'active' AND departure_at > NOW()
             ORDER BY departure_at
             LIMIT 20",
        )
        .fetch_all(&self.db.pool)
        .await
        .unwrap_or_default();

        for schedule_id in &upcoming {
            let _ = self.get_booked_positions(*schedule_id).await;
        }

        info!("Cache warmup done ({} schedules)", upcoming.len());
    }
}
