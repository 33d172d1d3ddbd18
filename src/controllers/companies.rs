use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::{middleware::AdminStaff, models::{Company, Staff}, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/companies", get(list_companies))
        .route("/companies", post(create_company))
        .route("/companies", patch(update_company))
        .route("/companies/staff", get(list_staff))
        .route("/companies/staff", post(create_staff))
}

/* ---------- COMPANIES ---------- */

// GET /api/companies
async fn list_companies(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let companies = sqlx::query_as::<_, Company>(
        "SELECT * FROM companies WHERE is_active = true ORDER BY name",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_companies sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить список компаний".to_string())
    })?;

    Ok((StatusCode::OK, Json(companies)))
}

// POST /api/companies
#[derive(Debug, Deserialize, Validate)]
struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCompanyResponse {
    pub id: i64,
}

async fn create_company(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    // Новые компании заводит только владелец
    if staff.role != "owner" {
        return Err((StatusCode::FORBIDDEN, "Недостаточно прав".to_string()));
    }

    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO companies (name, contact_email, phone)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(&req.name)
    .bind(&req.contact_email)
    .bind(&req.phone)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(CreateCompanyResponse { id }))),
        Err(e) => {
            tracing::error!("create_company sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать компанию".to_string()))
        }
    }
}

// PATCH /api/companies
#[derive(Debug, Deserialize)]
struct UpdateCompanyRequest {
    pub id: i64,
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

async fn update_company(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Сотрудник правит только свою компанию
    if staff.company_id != req.id {
        return Err((StatusCode::FORBIDDEN, "Это не ваша компания".to_string()));
    }

    let ok = sqlx::query(
        "UPDATE companies SET
            name = COALESCE($2, name),
            contact_email = COALESCE($3, contact_email),
            phone = COALESCE($4, phone),
            is_active = COALESCE($5, is_active)
         WHERE id = $1",
    )
    .bind(req.id)
    .bind(&req.name)
    .bind(&req.contact_email)
    .bind(&req.phone)
    .bind(req.is_active)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .unwrap_or(false);

    if ok {
        Ok((StatusCode::OK, Json(serde_json::json!({"message":"Компания обновлена"}))))
    } else {
        Err((StatusCode::NOT_FOUND, "Компания не найдена".to_string()))
    }
}

/* ---------- STAFF ---------- */

// GET /api/companies/staff
async fn list_staff(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query_as::<_, Staff>(
        "SELECT * FROM staff WHERE company_id = $1 ORDER BY full_name",
    )
    .bind(staff.company_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_staff sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить сотрудников".to_string())
    })?;

    Ok((StatusCode::OK, Json(rows)))
}

// POST /api/companies/staff
#[derive(Debug, Deserialize, Validate)]
struct CreateStaffRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    pub role: String,
}

async fn create_staff(
    State(state): State<Arc<AppState>>,
    staff: AdminStaff,
    Json(req): Json<CreateStaffRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Некорректные данные: {}", e)))?;

    if staff.role != "owner" {
        return Err((StatusCode::FORBIDDEN, "Сотрудников заводит только владелец".to_string()));
    }
    if !matches!(req.role.as_str(), "owner" | "manager" | "counter") {
        return Err((StatusCode::BAD_REQUEST, "role должен быть owner | manager | counter".to_string()));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("bcrypt error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать сотрудника".to_string())
    })?;

    let res = sqlx::query_scalar::<_, i32>(
        "INSERT INTO staff (company_id, email, password_hash, full_name, role)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING staff_id",
    )
    .bind(staff.company_id)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.full_name)
    .bind(&req.role)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(staff_id) => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({"staff_id": staff_id})),
        )),
        Err(e) if super::is_unique_violation(&e) => {
            Err((StatusCode::CONFLICT, "Email уже занят".to_string()))
        }
        Err(e) => {
            tracing::error!("create_staff sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать сотрудника".to_string()))
        }
    }
}
