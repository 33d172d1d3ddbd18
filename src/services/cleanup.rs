use redis::AsyncCommands;
use std::sync::Arc;
use tracing::info;

use crate::AppState;

pub struct CleanupService {
    state: Arc<AppState>,
}

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Запускает полную очистку: удержания ушедших рейсов + осиротевшие ключи
    pub async fn run_full_cleanup(&self) {
        info!("🧹 Starting full cleanup process");

        // Сначала снимаем удержания по рейсам, которые уже отправились
        self.cleanup_departed_schedule_holds().await;

        // Затем убираем удержания без рейса в БД
        self.cleanup_orphaned_holds().await;

        self.log_stats().await;
        info!("✅ Full cleanup process completed");
    }

    /// Снимает удержания рейсов с прошедшим отправлением или отменой
    async fn cleanup_departed_schedule_holds(&self) {
        let gone: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM schedules
             WHERE departure_at < NOW() OR status = 'cancelled'",
        )
        .fetch_all(&self.state.db.pool)
        .await
        .unwrap_or_default();

        if gone.is_empty() {
            info!("🎫 No departed schedules to cleanup");
            return;
        }

        let mut cleared = 0usize;
        for schedule_id in gone {
            cleared += self.state.cache.clear_schedule_holds(schedule_id).await;
        }

        if cleared > 0 {
            info!("🎫 Cleared {} holds for departed schedules", cleared);
        }
    }

    /// Очистка висящих удержаний, у которых в БД нет рейса
    async fn cleanup_orphaned_holds(&self) {
        let mut redis_conn = self.state.redis.conn.clone();

        // Все ключи удержаний в Redis
        let redis_keys: Vec<String> = redis::cmd("KEYS")
            .arg("hold:*")
            .query_async(&mut redis_conn)
            .await
            .unwrap_or_default();

        if redis_keys.is_empty() {
            info!("🔑 No holds to check");
            return;
        }

        info!("🔑 Checking {} holds for orphaned entries", redis_keys.len());

        let mut orphaned_keys = Vec::new();

        for key in redis_keys {
            // Извлекаем schedule_id из ключа (формат: hold:12:3:4)
            if let Some(schedule_id_str) = Self::extract_schedule_id_from_key(&key) {
                if let Ok(schedule_id) = schedule_id_str.parse::<i64>() {
                    // Проверяем, есть ли рейс в БД
                    let schedule_exists: bool = sqlx::query_scalar(
                        "SELECT EXISTS(SELECT 1 FROM schedules WHERE id = $1)",
                    )
                    .bind(schedule_id)
                    .fetch_one(&self.state.db.pool)
                    .await
                    .unwrap_or(false);

                    if !schedule_exists {
                        orphaned_keys.push(key);
                    }
                }
            }
        }

        if orphaned_keys.is_empty() {
            info!("🔑 No orphaned holds found");
            return;
        }

        info!("🔑 Found {} orphaned holds to cleanup", orphaned_keys.len());

        // Удаляем осиротевшие ключи
        let _: Result<i64, _> = redis_conn.del(orphaned_keys.clone()).await;

        info!("🔑 Cleaned up {} orphaned holds", orphaned_keys.len());
    }

    /// Извлекает schedule_id из ключа hold:{schedule}:{row}:{col}
    fn extract_schedule_id_from_key(key: &str) -> Option<&str> {
        let stripped = key.strip_prefix("hold:")?;
        match stripped.find(':') {
            Some(colon_pos) => Some(&stripped[..colon_pos]),
            None => Some(stripped),
        }
    }

    /// Получает статистику для мониторинга
    pub async fn get_cleanup_stats(&self) -> CleanupStats {
        let departed_schedules: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM schedules
             WHERE departure_at < NOW() OR status = 'cancelled'",
        )
        .fetch_one(&self.state.db.pool)
        .await
        .unwrap_or(0);

        let mut redis_conn = self.state.redis.conn.clone();
        let active_holds: i64 = redis::cmd("EVAL")
            .arg("return #redis.call('keys', ARGV[1])")
            .arg(0)
            .arg("hold:*")
            .query_async(&mut redis_conn)
            .await
            .unwrap_or(0);

        CleanupStats {
            departed_schedules,
            active_holds,
        }
    }

    /// Статистика одним вызовом - для логов и health-страницы
    pub async fn log_stats(&self) {
        let stats = self.get_cleanup_stats().await;
        if stats.active_holds > 0 {
            info!(
                "Cleanup stats: {} departed schedules, {} active holds",
                stats.departed_schedules, stats.active_holds
            );
        }
    }
}

#[derive(Debug)]
pub struct CleanupStats {
    pub departed_schedules: i64,
    pub active_holds: i64,
}
