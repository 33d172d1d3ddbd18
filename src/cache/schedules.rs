use redis::AsyncCommands;
use tracing::info;

use crate::cache::CacheService;

impl CacheService {
    // Получить проданные позиции рейса
    pub async fn get_booked_positions(&self, schedule_id: i64) -> Vec<(i32, i32)> {
        // Сначала пробуем кеш
        if let Ok(positions) = self.get_booked_from_cache(schedule_id).await {
            return positions;
        }

        // Если кеш не работает - идем в БД
        if let Ok(positions) = self.load_booked_from_db(schedule_id).await {
            let _ = self.save_booked_to_cache(schedule_id, &positions).await;
            return positions;
        }

        vec![]
    }

    // Инвалидировать кеш мест рейса
    pub async fn invalidate_seats(&self, schedule_id: i64) {
        let key = format!("seats:{}", schedule_id);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
        info!("Invalidated seats cache for schedule {}", schedule_id);
    }

    // === Работа с БД ===

    async fn load_booked_from_db(&self, schedule_id: i64) -> Result<Vec<(i32, i32)>, sqlx::Error> {
        sqlx::query_as::<_, (i32, i32)>(
            "SELECT ts.seat_row, ts.seat_col
             FROM ticket_seats ts
             JOIN tickets t ON t.id = ts.ticket_id
             WHERE ts.schedule_id = $1 AND t.status = 'booked'
             ORDER BY ts.seat_row, ts.seat_col",
        )
        .bind(schedule_id)
        .fetch_all(&self.db.pool)
        .await
    }

    // === Работа с кешем ===

    async fn get_booked_from_cache(
        &self,
        schedule_id: i64,
    ) -> Result<Vec<(i32, i32)>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let key = format!("seats:{}", schedule_id);
        let data: String = conn.get(key).await?;
        let positions: Vec<(i32, i32)> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(positions)
    }

    async fn save_booked_to_cache(
        &self,
        schedule_id: i64,
        positions: &[(i32, i32)],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(positions).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let key = format!("seats:{}", schedule_id);
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, data, 3600).await // 1 час
    }

    // === Кеш поисковой выдачи ===

    pub async fn get_cached_search(&self, cache_key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(cache_key).await
    }

    pub async fn cache_search_result(
        &self,
        cache_key: &str,
        json: &str,
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(cache_key, json, ttl_seconds).await
    }
}
