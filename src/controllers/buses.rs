use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::types::Json as SqlJson;
use std::sync::Arc;
use validator::Validate;

use crate::{
    middleware::AdminStaff,
    models::{Bus, SeatPlan},
    seatmap::{Grid, GridDoc},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/buses", get(list_buses))
        .route("/buses", post(create_bus))
        .route("/buses", patch(update_bus))
        .route("/buses/layout", patch(save_layout))
        .route("/buses/syncLayout", patch(sync_layout))
}

/* ---------- helpers ---------- */

async fn load_bus_for_company(
    pool: &sqlx::PgPool,
    bus_id: i64,
    company_id: i64,
) -> Result<Bus, (StatusCode, String)> {
    let bus = sqlx::query_as::<_, Bus>("SELECT * FROM buses WHERE id = $1 AND company_id = $2")
        .bind(bus_id)
        .bind(company_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("load bus {} sql error: {:?}", bus_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
        })?;

    bus.ok_or((StatusCode::NOT_FOUND, "Борт не найден".to_string()))
}

/* ---------- BUSES ---------- */

// GET /api/buses
async fn list_buses(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query_as::<_, Bus>(
        "SELECT * FROM buses WHERE company_id = $1 AND is_active = true ORDER BY registration_no",
    )
    .bind(staff.company_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_buses sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить борта".to_string())
    })?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/buses
//
// Если указан seat_plan_id, сетка шаблона копируется в борт один раз.
// Дальше копия живет своя - правка шаблона ее не затрагивает.
#[derive(Debug, Deserialize, Validate)]
struct CreateBusRequest {
    #[validate(length(min = 1, max = 50))]
    pub registration_no: String,
    pub title: Option<String>,
    pub seat_plan_id: Option<i64>,
}

async fn create_bus(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<CreateBusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    // Снимок шаблона, если он задан
    let (layout, total_seats) = match req.seat_plan_id {
        Some(plan_id) => {
            let plan = sqlx::query_as::<_, SeatPlan>(
                "SELECT * FROM seat_plans WHERE id = $1 AND company_id = $2",
            )
            .bind(plan_id)
            .bind(staff.company_id)
            .fetch_optional(&state.db.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
            .ok_or((StatusCode::NOT_FOUND, "Шаблон не найден".to_string()))?;
            (plan.layout.0, plan.total_seats)
        }
        None => (GridDoc::default(), 0),
    };

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO buses (company_id, seat_plan_id, registration_no, title, layout, total_seats)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(staff.company_id)
    .bind(req.seat_plan_id)
    .bind(&req.registration_no)
    .bind(&req.title)
    .bind(SqlJson(&layout))
    .bind(total_seats)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id})))),
        Err(e) if super::is_unique_violation(&e) => {
            Err((StatusCode::CONFLICT, "Борт с таким номером уже есть".to_string()))
        }
        Err(e) => {
            tracing::error!("create_bus sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать борт".to_string()))
        }
    }
}

// PATCH /api/buses
#[derive(Debug, Deserialize)]
struct UpdateBusRequest {
    pub id: i64,
    pub registration_no: Option<String>,
    pub title: Option<String>,
    pub is_active: Option<bool>,
}

async fn update_bus(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<UpdateBusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ok = sqlx::query(
        "UPDATE buses SET
            registration_no = COALESCE($3, registration_no),
            title = COALESCE($4, title),
            is_active = COALESCE($5, is_active)
         WHERE id = $1 AND company_id = $2",
    )
    .bind(req.id)
    .bind(staff.company_id)
    .bind(&req.registration_no)
    .bind(&req.title)
    .bind(req.is_active)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(serde_json::json!({"message":"Борт обновлен"}))))
    } else {
        Err((StatusCode::NOT_FOUND, "Борт не найден".to_string()))
    }
}

/* ---------- LAYOUT ---------- */

// PATCH /api/buses/layout - ручная правка сетки борта
#[derive(Debug, Deserialize)]
struct SaveBusLayoutRequest {
    pub bus_id: i64,
    pub layout: GridDoc,
}

async fn save_layout(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<SaveBusLayoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    load_bus_for_company(&state.db.pool, req.bus_id, staff.company_id).await?;

    let saved = Grid::from_doc(req.layout).export();

    let ok = sqlx::query(
        "UPDATE buses SET layout = $3, total_seats = $4 WHERE id = $1 AND company_id = $2",
    )
    .bind(req.bus_id)
    .bind(staff.company_id)
    .bind(SqlJson(&saved.doc))
    .bind(saved.total_seats as i32)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(saved)))
    } else {
        Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось сохранить сетку".to_string()))
    }
}

// PATCH /api/buses/syncLayout
//
// Подтянуть сетку из привязанного шаблона. Работает только пока
// собственная сетка борта пуста: после ручной правки шаблон больше
// не применяется автоматически.
#[derive(Debug, Deserialize)]
struct SyncLayoutRequest {
    pub bus_id: i64,
}

async fn sync_layout(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<SyncLayoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bus = load_bus_for_company(&state.db.pool, req.bus_id, staff.company_id).await?;

    let grid = Grid::from_doc(bus.layout.0);
    if !grid.has_no_cells() {
        return Err((
            StatusCode::CONFLICT,
            "У борта уже есть своя сетка, шаблон не применяется".to_string(),
        ));
    }
    let plan_id = bus
        .seat_plan_id
        .ok_or((StatusCode::CONFLICT, "К борту не привязан шаблон".to_string()))?;

    let plan = sqlx::query_as::<_, SeatPlan>(
        "SELECT * FROM seat_plans WHERE id = $1 AND company_id = $2",
    )
    .bind(plan_id)
    .bind(staff.company_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
    .ok_or((StatusCode::NOT_FOUND, "Шаблон не найден".to_string()))?;

    let ok = sqlx::query(
        "UPDATE buses SET layout = $3, total_seats = $4 WHERE id = $1 AND company_id = $2",
    )
    .bind(req.bus_id)
    .bind(staff.company_id)
    .bind(SqlJson(&plan.layout.0))
    .bind(plan.total_seats)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(serde_json::json!({"message":"Сетка скопирована из шаблона"}))))
    } else {
        Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось скопировать сетку".to_string()))
    }
}
