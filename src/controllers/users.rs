use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{middleware::AuthUser, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/me", get(profile))
}

// POST /api/users/register
#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub surname: String,
    pub phone: Option<String>,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("bcrypt error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось зарегистрировать".to_string())
    })?;

    let res = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (email, password_hash, first_name, surname, phone)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING user_id",
    )
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.first_name)
    .bind(&req.surname)
    .bind(&req.phone)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(user_id) => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({"user_id": user_id})),
        )),
        Err(e) if super::is_unique_violation(&e) => {
            Err((StatusCode::CONFLICT, "Email уже зарегистрирован".to_string()))
        }
        Err(e) => {
            tracing::error!("register sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось зарегистрировать".to_string()))
        }
    }
}

// GET /api/users/me - заодно проверка Basic Auth
async fn profile(user: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "user": {
            "id": user.user_id,
            "email": user.email,
            "name": format!("{} {}", user.first_name, user.surname)
        }
    }))
}
