use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json as SqlJson;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    middleware::AdminStaff,
    models::{Bus, Schedule},
    seatmap::{CellKind, Grid, SeatPicker, SeatState},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/schedules/search", get(search_trips))
        .route("/schedules/seats", get(get_schedule_seats))
        .route("/schedules", post(create_schedule))
        .route("/schedules", patch(update_schedule))
}

/* ---------- SEARCH ---------- */

// GET /api/schedules/search
#[derive(Debug, Deserialize)]
pub struct TripsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

pub async fn search_trips(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TripsQuery>,
) -> Response {
    let from_val = params.from.as_deref().unwrap_or_default();
    let to_val = params.to.as_deref().unwrap_or_default();
    let date_val = params.date.as_deref().unwrap_or_default();
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 20);

    // 1. Уникальный ключ кеша по параметрам запроса
    let cache_key = format!(
        "search:trips:from={}&to={}&date={}&p={}&ps={}",
        from_val, to_val, date_val, page, page_size
    );

    // 2. Пытаемся отдать из кеша
    if let Ok(Some(cached_json)) = state.cache.get_cached_search(&cache_key).await {
        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "HIT")
            .body(Body::from(cached_json))
            .unwrap();
    }

    // 3. Cache Miss: идем в базу данных
    let from_date = params.date.and_then(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
            .ok()
    });

    let limit: i64 = page_size as i64;
    let offset: i64 = ((page.max(1) - 1) * page_size) as i64;

    let search_result = state
        .search_client
        .search_trips(from_val, to_val, from_date, limit, offset)
        .await;

    let response_json = match search_result {
        Ok(trips) => {
            json!({
                "success": true,
                "trips": trips,
                "count": trips.len()
            })
        }
        Err(e) => {
            tracing::error!("Failed to search trips: {:?}", e);
            return Json(json!({
                "success": false,
                "error": "Failed to retrieve trips"
            }))
            .into_response();
        }
    };

    // 4. Сохраняем результат в кеш
    if let Ok(json_str) = serde_json::to_string(&response_json) {
        if let Err(e) = state.cache.cache_search_result(&cache_key, &json_str, 600).await {
            tracing::error!("Failed to cache search result: {:?}", e);
        }

        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "MISS")
            .body(Body::from(json_str))
            .unwrap();
    }

    // Fallback в случае ошибки сериализации
    Json(response_json).into_response()
}

/* ---------- SEATS VIEW ---------- */

// GET /api/schedules/seats - посадочная схема для экрана выбора мест
#[derive(Debug, Deserialize)]
struct SeatsQuery {
    schedule_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeatView {
    row: u32,
    column: u32,
    status: &'static str, // AISLE | BROKEN | SOLD | HELD | FREE
    #[serde(skip_serializing_if = "Option::is_none")]
    seat_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seat_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fare: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeatsResponse {
    schedule_id: i64,
    row_count: u32,
    column_count: u32,
    aisle_columns: Vec<u32>,
    fare: f64,
    seats: Vec<SeatView>,
}

async fn get_schedule_seats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.schedule_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "schedule_id должен быть > 0".to_string()));
    }

    let schedule = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = $1")
        .bind(params.schedule_id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("get_schedule_seats sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
        })?
        .ok_or((StatusCode::NOT_FOUND, "Рейс не найден".to_string()))?;

    // Проданные позиции - истина из билетов, удержания - из Redis
    let booked: Vec<(u32, u32)> = state
        .cache
        .get_booked_positions(schedule.id)
        .await
        .into_iter()
        .map(|(r, c)| (r as u32, c as u32))
        .collect();
    let held: HashSet<(u32, u32)> = state.cache.held_positions(schedule.id).await.into_iter().collect();

    let grid = Grid::from_doc(schedule.layout.0.clone());
    let picker = SeatPicker::new(grid, booked);

    let mut seats = Vec::new();
    for row in picker.grid().view() {
        for cell in row.into_iter().flatten() {
            let status = match cell.kind {
                CellKind::Aisle => "AISLE",
                CellKind::Broken => "BROKEN",
                CellKind::Seat => match picker.state_of(cell.row, cell.column) {
                    Ok(Some(SeatState::Unavailable)) => "SOLD",
                    _ if held.contains(&(cell.row, cell.column)) => "HELD",
                    _ => "FREE",
                },
            };
            let fare = match cell.kind {
                CellKind::Aisle => None,
                // Индивидуальный тариф места перекрывает цену рейса
                _ => Some(cell.fare.unwrap_or(schedule.fare)),
            };
            seats.push(SeatView {
                row: cell.row,
                column: cell.column,
                status,
                seat_number: cell.seat_number,
                seat_label: cell.seat_label.clone(),
                fare,
            });
        }
    }

    let response = SeatsResponse {
        schedule_id: schedule.id,
        row_count: picker.grid().row_count(),
        column_count: picker.grid().column_count(),
        aisle_columns: picker.grid().aisle_columns().iter().copied().collect(),
        fare: schedule.fare,
        seats,
    };

    Ok((StatusCode::OK, Json(response)))
}

/* ---------- ADMIN CRUD ---------- */

// POST /api/schedules
//
// Рейс получает снимок сетки борта на момент создания: дальнейшая
// правка борта расписание не трогает.
#[derive(Debug, Deserialize)]
struct CreateScheduleRequest {
    pub route_id: i64,
    pub bus_id: i64,
    pub departure_at: NaiveDateTime,
    pub arrival_at: Option<NaiveDateTime>,
    pub fare: f64,
}

async fn create_schedule(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.fare < 0.0 {
        return Err((StatusCode::BAD_REQUEST, "Цена не может быть отрицательной".to_string()));
    }

    let bus = sqlx::query_as::<_, Bus>("SELECT * FROM buses WHERE id = $1 AND company_id = $2")
        .bind(req.bus_id)
        .bind(staff.company_id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Борт не найден".to_string()))?;

    let belongs = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1 AND company_id = $2)",
    )
    .bind(req.route_id)
    .bind(staff.company_id)
    .fetch_one(&state.db.pool)
    .await
    .unwrap_or(false);
    if !belongs {
        return Err((StatusCode::NOT_FOUND, "Маршрут не найден".to_string()));
    }

    if Grid::from_doc(bus.layout.0.clone()).has_no_cells() {
        return Err((StatusCode::CONFLICT, "У борта нет посадочной схемы".to_string()));
    }

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO schedules (route_id, bus_id, departure_at, arrival_at, fare, layout, total_seats, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'active')
         RETURNING id",
    )
    .bind(req.route_id)
    .bind(req.bus_id)
    .bind(req.departure_at)
    .bind(req.arrival_at)
    .bind(req.fare)
    .bind(SqlJson(&bus.layout.0))
    .bind(bus.total_seats)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(json!({"id": id})))),
        Err(e) => {
            tracing::error!("create_schedule sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать рейс".to_string()))
        }
    }
}

// PATCH /api/schedules - цена/статус/время; сетка рейса неизменна
#[derive(Debug, Deserialize)]
struct UpdateScheduleRequest {
    pub id: i64,
    pub departure_at: Option<NaiveDateTime>,
    pub arrival_at: Option<NaiveDateTime>,
    pub fare: Option<f64>,
    pub status: Option<String>, // active | cancelled
}

async fn update_schedule(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(ref status) = req.status {
        if !matches!(status.as_str(), "active" | "cancelled") {
            return Err((StatusCode::BAD_REQUEST, "status должен быть active | cancelled".to_string()));
        }
    }

    let ok = sqlx::query(
        "UPDATE schedules s SET
            departure_at = COALESCE($3, s.departure_at),
            arrival_at = COALESCE($4, s.arrival_at),
            fare = COALESCE($5, s.fare),
            status = COALESCE($6, s.status)
         FROM buses b
         WHERE s.id = $1 AND b.id = s.bus_id AND b.company_id = $2",
    )
    .bind(req.id)
    .bind(staff.company_id)
    .bind(req.departure_at)
    .bind(req.arrival_at)
    .bind(req.fare)
    .bind(&req.status)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if !ok {
        return Err((StatusCode::NOT_FOUND, "Рейс не найден".to_string()));
    }

    // Отмена рейса снимает все удержания
    if req.status.as_deref() == Some("cancelled") {
        state.cache.clear_schedule_holds(req.id).await;
        state.cache.invalidate_seats(req.id).await;
    }

    Ok((StatusCode::OK, Json(json!({"message":"Рейс обновлен"}))))
}
