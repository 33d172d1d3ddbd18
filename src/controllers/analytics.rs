//! analytics.rs
//!
//! Модуль для получения статистики продаж по рейсу.
//!
//! Включает в себя следующую функциональность:
//! - Подсчет статистики по местам (продано, удерживается, свободно).
//! - Расчет выручки и количества оформленных билетов.
//! - Емкость берется из сохраненной посадочной схемы рейса.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;

use crate::{middleware::AdminStaff, AppState};

/// Определяет маршруты, связанные с аналитикой.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/analytics", get(get_schedule_analytics))
}

// --- Вспомогательные функции ---

/// Проверяет, что рейс существует и принадлежит компании сотрудника.
async fn schedule_belongs_to_company(
    pool: &sqlx::PgPool,
    schedule_id: i64,
    company_id: i64,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM schedules s
            JOIN buses b ON b.id = s.bus_id
            WHERE s.id = $1 AND b.company_id = $2
         )",
    )
    .bind(schedule_id)
    .bind(company_id)
    .fetch_one(pool)
    .await
}

// --- Управление аналитикой ---

/// GET /api/analytics
///
/// Возвращает статистику продаж для указанного рейса: места,
/// удержания, выручку и количество билетов.
#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct AnalyticsResponse {
    pub schedule_id: i64,
    pub total_seats: i32,
    pub sold_seats: i32,
    pub held_seats: i32,
    pub free_seats: i32,
    pub total_revenue: String,
    pub tickets_count: i32,
}

async fn get_schedule_analytics(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Query(params): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "ID рейса должен быть > 0".to_string()));
    }

    // Проверяем, что рейс существует и свой.
    let exists = schedule_belongs_to_company(&state.db.pool, params.id, staff.company_id)
        .await
        .map_err(|e| {
            tracing::error!("get_schedule_analytics: ошибка проверки рейса {}: {:?}", params.id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка проверки рейса".to_string())
        })?;

    if !exists {
        return Err((StatusCode::NOT_FOUND, "Рейс не найден".to_string()));
    }

    // Емкость - из сохраненной схемы, продажи - из билетов.
    let row = sqlx::query(
        r#"
        SELECT
            s.total_seats,
            COUNT(ts.id) FILTER (WHERE t.status = 'booked')::int as sold_seats,
            COALESCE(SUM(ts.fare) FILTER (WHERE t.status = 'booked'), 0)::float8 as total_revenue,
            COUNT(DISTINCT t.id) FILTER (WHERE t.status = 'booked')::int as tickets_count
        FROM schedules s
        LEFT JOIN ticket_seats ts ON ts.schedule_id = s.id
        LEFT JOIN tickets t ON t.id = ts.ticket_id
        WHERE s.id = $1
        GROUP BY s.total_seats
        "#,
    )
    .bind(params.id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_schedule_analytics: sql ошибка для рейса {}: {:?}", params.id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить аналитику".to_string())
    })?;

    // Если рейс без схемы, возвращаем нулевую статистику.
    let row = match row {
        Some(row) => row,
        None => {
            let empty_response = AnalyticsResponse {
                schedule_id: params.id,
                total_seats: 0,
                sold_seats: 0,
                held_seats: 0,
                free_seats: 0,
                total_revenue: "0.00".to_string(),
                tickets_count: 0,
            };
            return Ok((StatusCode::OK, Json(empty_response)));
        }
    };

    let total_seats: i32 = row.get("total_seats");
    let sold_seats: i32 = row.get("sold_seats");
    let total_revenue: f64 = row.get("total_revenue");
    let tickets_count: i32 = row.get("tickets_count");

    // Удержания живут в Redis, а не в БД.
    let held_seats = state.cache.held_positions(params.id).await.len() as i32;

    let response = AnalyticsResponse {
        schedule_id: params.id,
        total_seats,
        sold_seats,
        held_seats,
        free_seats: (total_seats - sold_seats - held_seats).max(0),
        total_revenue: format!("{:.2}", total_revenue),
        tickets_count,
    };

    tracing::info!(
        "Аналитика по рейсу {}: {} мест, {} продано, выручка {}",
        params.id, total_seats, sold_seats, response.total_revenue
    );

    Ok((StatusCode::OK, Json(response)))
}
