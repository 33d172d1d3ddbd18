//! seat_plans.rs
//!
//! Шаблоны планировок салона. Админ рисует сетку в редакторе, сюда
//! приходит готовый документ; перед записью он приводится к
//! канонической форме: все позиции заполняются явно, места получают
//! сквозные номера, считается емкость. Борта копируют шаблон, а не
//! ссылаются на него - правка шаблона уже выданные копии не меняет.

use axum::{
    extract::{Query, State},
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
    models::SeatPlan,
    seatmap::{EditorSession, Grid, GridDoc},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seat-plans", get(list_seat_plans))
        .route("/seat-plans", post(create_seat_plan))
        .route("/seat-plans", patch(update_seat_plan))
        .route("/seat-plans/layout", patch(save_layout))
        .route("/seat-plans/appendRow", post(append_row))
}

/* ---------- helpers ---------- */

async fn load_plan_for_company(
    pool: &sqlx::PgPool,
    seat_plan_id: i64,
    company_id: i64,
) -> Result<SeatPlan, (StatusCode, String)> {
    let plan = sqlx::query_as::<_, SeatPlan>(
        "SELECT * FROM seat_plans WHERE id = $1 AND company_id = $2",
    )
    .bind(seat_plan_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("load seat_plan {} sql error: {:?}", seat_plan_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
    })?;

    plan.ok_or((StatusCode::NOT_FOUND, "Шаблон не найден".to_string()))
}

/* ---------- SEAT PLANS ---------- */

// GET /api/seat-plans
async fn list_seat_plans(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query_as::<_, SeatPlan>(
        "SELECT * FROM seat_plans WHERE company_id = $1 AND status != 'archived' ORDER BY name",
    )
    .bind(staff.company_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_seat_plans sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить шаблоны".to_string())
    })?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/seat-plans - новый шаблон с пустой сеткой заданных размеров
#[derive(Debug, Deserialize, Validate)]
struct CreateSeatPlanRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "type")]
    pub transport_kind: String,
    #[validate(range(min = 1, max = 100))]
    pub row_count: u32,
    #[validate(range(min = 1, max = 20))]
    pub column_count: u32,
}

async fn create_seat_plan(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<CreateSeatPlanRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    if !matches!(req.transport_kind.as_str(), "bus" | "train" | "air" | "ship") {
        return Err((StatusCode::BAD_REQUEST, "type должен быть bus | train | air | ship".to_string()));
    }

    let layout = Grid::new(req.row_count, req.column_count).to_doc();

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO seat_plans (company_id, name, type, status, layout, total_seats)
         VALUES ($1, $2, $3, 'draft', $4, 0)
         RETURNING id",
    )
    .bind(staff.company_id)
    .bind(&req.name)
    .bind(&req.transport_kind)
    .bind(SqlJson(&layout))
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id})))),
        Err(e) => {
            tracing::error!("create_seat_plan sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать шаблон".to_string()))
        }
    }
}

// PATCH /api/seat-plans - имя/статус; сетку меняет только /layout
#[derive(Debug, Deserialize)]
struct UpdateSeatPlanRequest {
    pub id: i64,
    pub name: Option<String>,
    pub status: Option<String>, // draft | active | archived
}

async fn update_seat_plan(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<UpdateSeatPlanRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(ref status) = req.status {
        if !matches!(status.as_str(), "draft" | "active" | "archived") {
            return Err((StatusCode::BAD_REQUEST, "status должен быть draft | active | archived".to_string()));
        }
    }

    let ok = sqlx::query(
        "UPDATE seat_plans SET
            name = COALESCE($3, name),
            status = COALESCE($4, status)
         WHERE id = $1 AND company_id = $2",
    )
    .bind(req.id)
    .bind(staff.company_id)
    .bind(&req.name)
    .bind(&req.status)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(serde_json::json!({"message":"Шаблон обновлен"}))))
    } else {
        Err((StatusCode::NOT_FOUND, "Шаблон не найден".to_string()))
    }
}

/* ---------- LAYOUT ---------- */

// PATCH /api/seat-plans/layout
//
// Сохранение сетки из редактора. На входе - документ как есть, на
// выходе в БД - нормализованная форма и пересчитанная емкость.
#[derive(Debug, Deserialize)]
struct SaveLayoutRequest {
    pub seat_plan_id: i64,
    pub layout: GridDoc,
}

async fn save_layout(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<SaveLayoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    load_plan_for_company(&state.db.pool, req.seat_plan_id, staff.company_id).await?;

    // Полная развертка + перенумерация перед записью
    let saved = Grid::from_doc(req.layout).export();

    let ok = sqlx::query(
        "UPDATE seat_plans SET layout = $3, total_seats = $4 WHERE id = $1 AND company_id = $2",
    )
    .bind(req.seat_plan_id)
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

// POST /api/seat-plans/appendRow
//
// Шаг "добавить ряд": по одному значению на каждую не-проходную
// колонку, мини-язык: пусто - пропустить, XX - сломанное место,
// XY - пропустить, любой другой текст - подпись места.
#[derive(Debug, Deserialize)]
struct AppendRowRequest {
    pub seat_plan_id: i64,
    pub entries: Vec<String>,
}

async fn append_row(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<AppendRowRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plan = load_plan_for_company(&state.db.pool, req.seat_plan_id, staff.company_id).await?;

    let grid = Grid::from_doc(plan.layout.0);
    let mut session = EditorSession::new(grid);
    session
        .begin_append_row()
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

    // Значения раскладываются по не-проходным колонкам слева направо
    let editable: Vec<u32> = (0..session.grid().column_count())
        .filter(|c| !session.grid().is_aisle_column(*c))
        .collect();
    if req.entries.len() != editable.len() {
        session.cancel();
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Ожидалось {} значений, получено {}", editable.len(), req.entries.len()),
        ));
    }
    for (column, text) in editable.iter().zip(&req.entries) {
        if let Err(e) = session.set_append_field(*column, text) {
            session.cancel();
            return Err((StatusCode::BAD_REQUEST, e.to_string()));
        }
    }
    session
        .confirm_append_row()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // Ряд добавлен, но это еще не сохранение: развертка и нумерация
    // выполнятся при записи через /layout
    let doc = session.into_grid().to_doc();
    let ok = sqlx::query("UPDATE seat_plans SET layout = $3 WHERE id = $1 AND company_id = $2")
        .bind(req.seat_plan_id)
        .bind(staff.company_id)
        .bind(SqlJson(&doc))
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(doc)))
    } else {
        Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось сохранить ряд".to_string()))
    }
}
