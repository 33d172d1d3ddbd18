use crate::cache::CacheService;

impl CacheService {
    // Обновлять last_logged_in не чаще раза в 15 минут: SET NX EX
    // как дешевый троттлинг без обращения к БД
    pub async fn should_update_last_login(&self, user_id: i32) -> bool {
        let key = format!("last_login_update:{}", user_id);
        let mut conn = self.redis.conn.clone();
        let result: Result<String, _> = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(900)
            .query_async(&mut conn)
            .await;
        result.is_ok()
    }
}
