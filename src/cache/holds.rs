use redis::AsyncCommands;
use tracing::info;

use crate::cache::CacheService;

// Удержания мест: ключ hold:{рейс}:{ряд}:{колонка}, значение - user_id.
// Ровно один держатель, TTL снимает удержание само.
impl CacheService {
    fn hold_key(schedule_id: i64, row: u32, column: u32) -> String {
        format!("hold:{}:{}:{}", schedule_id, row, column)
    }

    // Атомарно удержать позицию за пользователем (SET NX EX - без гонок)
    pub async fn hold_position(
        &self,
        schedule_id: i64,
        row: u32,
        column: u32,
        user_id: i32,
    ) -> bool {
        let key = Self::hold_key(schedule_id, row, column);
        let mut conn = self.redis.conn.clone();

        let result: Result<String, _> = redis::cmd("SET")
            .arg(&key)
            .arg(user_id)
            .arg("NX") // только если ключа нет
            .arg("EX") // TTL в секундах
            .arg(self.hold_ttl_seconds)
            .query_async(&mut conn)
            .await;

        result.is_ok()
    }

    // Кто удерживает позицию (None - свободна)
    pub async fn holder_of(&self, schedule_id: i64, row: u32, column: u32) -> Option<i32> {
        let key = Self::hold_key(schedule_id, row, column);
        let mut conn = self.redis.conn.clone();
        conn.get(&key).await.unwrap_or(None)
    }

    pub async fn release_position(&self, schedule_id: i64, row: u32, column: u32) {
        let key = Self::hold_key(schedule_id, row, column);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
    }

    // Снять несколько удержаний одним pipeline
    pub async fn release_positions(&self, schedule_id: i64, positions: &[(u32, u32)]) {
        if positions.is_empty() {
            return;
        }
        let mut conn = self.redis.conn.clone();
        let mut pipe = redis::pipe();
        for (row, column) in positions {
            pipe.del(Self::hold_key(schedule_id, *row, *column));
        }
        if let Err(e) = pipe.query_async::<()>(&mut conn).await {
            tracing::warn!("failed to release holds for schedule {}: {:?}", schedule_id, e);
        }
    }

    // Все удерживаемые позиции рейса (разбор ключей hold:{id}:r:c)
    pub async fn held_positions(&self, schedule_id: i64) -> Vec<(u32, u32)> {
        let mut conn = self.redis.conn.clone();
        let pattern = format!("hold:{}:*", schedule_id);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();

        keys.iter()
            .filter_map(|key| {
                let mut parts = key.split(':').skip(2);
                let row = parts.next()?.parse().ok()?;
                let column = parts.next()?.parse().ok()?;
                Some((row, column))
            })
            .collect()
    }

    // Снять все удержания рейса (отправление прошло или рейс отменен)
    pub async fn clear_schedule_holds(&self, schedule_id: i64) -> usize {
        let mut conn = self.redis.conn.clone();
        let pattern = format!("hold:{}:*", schedule_id);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();

        if keys.is_empty() {
            return 0;
        }
        let removed = keys.len();
        let _: Result<i64, _> = conn.del(keys).await;
        info!("Cleared {} holds for schedule {}", removed, schedule_id);
        removed
    }
}
