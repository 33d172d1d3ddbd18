use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{middleware::AdminStaff, models::Stoppage, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stoppages", get(list_stoppages))
        .route("/stoppages", post(create_stoppage))
        .route("/stoppages", patch(update_stoppage))
}

// GET /api/stoppages
#[derive(Debug, Deserialize)]
struct StoppagesQuery {
    query: Option<String>,
}

async fn list_stoppages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StoppagesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let query_val = params.query.unwrap_or_default();

    let rows = sqlx::query_as::<_, Stoppage>(
        "SELECT * FROM stoppages
         WHERE is_active = true
           AND ($1 = '' OR name ILIKE '%' || $1 || '%' OR city ILIKE '%' || $1 || '%')
         ORDER BY city, name",
    )
    .bind(&query_val)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_stoppages sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить остановки".to_string())
    })?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/stoppages
#[derive(Debug, Deserialize, Validate)]
struct CreateStoppageRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
}

async fn create_stoppage(
    State(state): State<Arc<AppState>>,
    _staff: AdminStaff,
    Json(req): Json<CreateStoppageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO stoppages (name, city) VALUES ($1, $2) RETURNING id",
    )
    .bind(&req.name)
    .bind(&req.city)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id})))),
        Err(e) => {
            tracing::error!("create_stoppage sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать остановку".to_string()))
        }
    }
}

// PATCH /api/stoppages
#[derive(Debug, Deserialize)]
struct UpdateStoppageRequest {
    pub id: i64,
    pub name: Option<String>,
    pub city: Option<String>,
    pub is_active: Option<bool>,
}

async fn update_stoppage(
    State(state): State<Arc<AppState>>,
    _staff: AdminStaff,
    Json(req): Json<UpdateStoppageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ok = sqlx::query(
        "UPDATE stoppages SET
            name = COALESCE($2, name),
            city = COALESCE($3, city),
            is_active = COALESCE($4, is_active)
         WHERE id = $1",
    )
    .bind(req.id)
    .bind(&req.name)
    .bind(&req.city)
    .bind(req.is_active)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(serde_json::json!({"message":"Остановка обновлена"}))))
    } else {
        Err((StatusCode::NOT_FOUND, "Остановка не найдена".to_string()))
    }
}
