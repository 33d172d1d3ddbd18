use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    middleware::AdminStaff,
    models::{RouteStop, TransitRoute},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/routes", get(list_routes))
        .route("/routes", post(create_route))
        .route("/routes/stops", get(list_route_stops))
        .route("/routes/stops", post(replace_route_stops))
}

/* ---------- helpers ---------- */

async fn route_belongs_to_company(
    pool: &sqlx::PgPool,
    route_id: i64,
    company_id: i64,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1 AND company_id = $2)",
    )
    .bind(route_id)
    .bind(company_id)
    .fetch_one(pool)
    .await
}

/* ---------- ROUTES ---------- */

// GET /api/routes
async fn list_routes(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query_as::<_, TransitRoute>(
        "SELECT * FROM routes WHERE company_id = $1 AND is_active = true ORDER BY name",
    )
    .bind(staff.company_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_routes sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить маршруты".to_string())
    })?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/routes
#[derive(Debug, Deserialize, Validate)]
struct CreateRouteRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub origin_stoppage_id: i64,
    pub destination_stoppage_id: i64,
    // bus | train | air | ship
    #[serde(rename = "type")]
    pub transport_kind: String,
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<CreateRouteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    if !matches!(req.transport_kind.as_str(), "bus" | "train" | "air" | "ship") {
        return Err((StatusCode::BAD_REQUEST, "type должен быть bus | train | air | ship".to_string()));
    }
    if req.origin_stoppage_id == req.destination_stoppage_id {
        return Err((StatusCode::BAD_REQUEST, "Начальная и конечная остановки совпадают".to_string()));
    }

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO routes (company_id, name, origin_stoppage_id, destination_stoppage_id, type)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(staff.company_id)
    .bind(&req.name)
    .bind(req.origin_stoppage_id)
    .bind(req.destination_stoppage_id)
    .bind(&req.transport_kind)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id})))),
        Err(e) => {
            tracing::error!("create_route sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать маршрут".to_string()))
        }
    }
}

/* ---------- ROUTE STOPS ---------- */

// GET /api/routes/stops
#[derive(Debug, Deserialize)]
struct RouteStopsQuery {
    route_id: i64,
}

async fn list_route_stops(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RouteStopsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query_as::<_, RouteStop>(
        "SELECT * FROM route_stops WHERE route_id = $1 ORDER BY position",
    )
    .bind(params.route_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_route_stops sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить остановки маршрута".to_string())
    })?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/routes/stops - полная замена списка остановок маршрута
#[derive(Debug, Deserialize)]
struct StopEntry {
    pub stoppage_id: i64,
    pub fare: f64,
}

#[derive(Debug, Deserialize)]
struct ReplaceStopsRequest {
    pub route_id: i64,
    pub stops: Vec<StopEntry>,
}

async fn replace_route_stops(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<ReplaceStopsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let belongs = route_belongs_to_company(&state.db.pool, req.route_id, staff.company_id)
        .await
        .unwrap_or(false);
    if !belongs {
        return Err((StatusCode::FORBIDDEN, "Маршрут не найден или не принадлежит вам".to_string()));
    }
    if req.stops.iter().any(|s| s.fare < 0.0) {
        return Err((StatusCode::BAD_REQUEST, "Тариф не может быть отрицательным".to_string()));
    }

    // Начинаем транзакцию: список меняется только целиком
    let mut tx = state.db.pool.begin().await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка транзакции".to_string()))?;

    if let Err(e) = sqlx::query("DELETE FROM route_stops WHERE route_id = $1")
        .bind(req.route_id)
        .execute(&mut *tx)
        .await
    {
        tracing::error!("failed to clear stops for route {}: {:?}", req.route_id, e);
        let _ = tx.rollback().await;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить остановки".to_string()));
    }

    for (position, stop) in req.stops.iter().enumerate() {
        let ins = sqlx::query(
            "INSERT INTO route_stops (route_id, stoppage_id, position, fare)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(req.route_id)
        .bind(stop.stoppage_id)
        .bind(position as i32)
        .bind(stop.fare)
        .execute(&mut *tx)
        .await;

        if let Err(e) = ins {
            tracing::error!("failed to insert stop for route {}: {:?}", req.route_id, e);
            let _ = tx.rollback().await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить остановки".to_string()));
        }
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("failed to commit stops for route {}: {:?}", req.route_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка фиксации транзакции".to_string())
    })?;

    Ok((StatusCode::OK, Json(serde_json::json!({"message":"Остановки маршрута обновлены"}))))
}
