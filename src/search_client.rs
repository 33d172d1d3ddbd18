use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

/// Клиент для поиска рейсов
#[derive(Clone)]
pub struct SearchClient {
    pool: PgPool,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct TripSearchResult {
    pub id: i64,
    pub route_name: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: chrono::NaiveDateTime,
    pub fare: f64,
    pub free_seats: i64,
}

impl SearchClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        info!("Search client initialized");
        Ok(())
    }

    pub async fn search_trips(
        &self,
        from: &str,
        to: &str,
        date: Option<chrono::NaiveDateTime>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TripSearchResult>, sqlx::Error> {
        // Оптимизированный запрос
        if from.is_empty() && to.is_empty() && date.is_none() {
            // Быстрый путь для пустых запросов (большинство обращений)
            self.fast_path_upcoming(limit, offset).await
        } else {
            // Поиск по остановкам и дате
            self.filtered_search(from, to, date, limit, offset).await
        }
    }

    /// Быстрый путь: ближайшие рейсы без фильтров
    async fn fast_path_upcoming(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TripSearchResult>, sqlx::Error> {
        sqlx::query_as::<_, TripSearchResult>(
            r#"
            SELECT
                s.id,
                r.name as route_name,
                o.name as origin,
                d.name as destination,
                s.departure_at,
                s.fare,
                (s.total_seats - (
                    SELECT COUNT(*)
                    FROM ticket_seats ts
                    JOIN tickets t ON t.id = ts.ticket_id
                    WHERE ts.schedule_id = s.id AND t.status = 'booked'
                ))::int8 as free_seats
            FROM schedules s
            JOIN routes r ON r.id = s.route_id
            JOIN stoppages o ON o.id = r.origin_stoppage_id
            JOIN stoppages d ON d.id = r.destination_stoppage_id
            WHERE s.status = 'active' AND s.departure_at > NOW()
            ORDER BY s.departure_at
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Поиск по названиям остановок и окну даты (сутки)
    async fn filtered_search(
        &self,
        from: &str,
        to: &str,
        date: Option<chrono::NaiveDateTime>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TripSearchResult>, sqlx::Error> {
        let from_q = Self::prepare_search_query(from);
        let to_q = Self::prepare_search_query(to);

        sqlx::query_as::<_, TripSearchResult>(
            r#"
            SELECT
                s.id,
                r.name as route_name,
                o.name as origin,
                d.name as destination,
                s.departure_at,
                s.fare,
                (s.total_seats - (
                    SELECT COUNT(*)
                    FROM ticket_seats ts
                    JOIN tickets t ON t.id = ts.ticket_id
                    WHERE ts.schedule_id = s.id AND t.status = 'booked'
                ))::int8 as free_seats
            FROM schedules s
            JOIN routes r ON r.id = s.route_id
            JOIN stoppages o ON o.id = r.origin_stoppage_id
            JOIN stoppages d ON d.id = r.destination_stoppage_id
            WHERE
                s.status = 'active'
                AND ($1 = '' OR o.name ILIKE '%' || $1 || '%' OR o.city ILIKE '%' || $1 || '%')
                AND ($2 = '' OR d.name ILIKE '%' || $2 || '%' OR d.city ILIKE '%' || $2 || '%')
                AND s.departure_at >= COALESCE($3, NOW())
                AND ($3 IS NULL OR s.departure_at < $3 + interval '1 day')
            ORDER BY s.departure_at
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(from_q)
        .bind(to_q)
        .bind(date)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    fn prepare_search_query(query: &str) -> String {
        query
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
