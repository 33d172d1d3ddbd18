use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

// Пассажир, покупающий билеты через публичный API
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub first_name: String,
    pub surname: String,
}

// Сотрудник компании-перевозчика, работающий в админке
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdminStaff {
    pub staff_id: i32,
    pub company_id: i64,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

// Структуры для результатов из БД
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i32,
    email: String,
    password_hash: String,
    first_name: String,
    surname: String,
}

#[derive(sqlx::FromRow)]
struct StaffRow {
    staff_id: i32,
    company_id: i64,
    email: String,
    password_hash: String,
    full_name: String,
    role: String,
}

// Разбор заголовка Basic auth: email:password
fn basic_credentials(parts: &Parts) -> Result<(String, String), StatusCode> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let mut parts = credentials.splitn(2, ':');
    let email = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;
    let password = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;
    Ok((email.to_string(), password.to_string()))
}

// Basic Auth extractor для пассажира
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = basic_credentials(parts)?;

        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, email, password_hash, first_name, surname
             FROM users
             WHERE email = $1 AND is_active = true",
        )
        .bind(&email)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let user = row.ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем пароль
        if !bcrypt::verify(&password, &user.password_hash).unwrap_or(false) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        // Обновляем last_logged_in, но не чаще раза в 15 минут
        if state.cache.should_update_last_login(user.user_id).await {
            sqlx::query("UPDATE users SET last_logged_in = NOW() WHERE user_id = $1")
                .bind(user.user_id)
                .execute(&state.db.pool)
                .await
                .ok(); // Игнорируем ошибку обновления
        }

        Ok(AuthUser {
            user_id: user.user_id,
            email: user.email,
            first_name: user.first_name,
            surname: user.surname,
        })
    }
}

// Basic Auth extractor для сотрудника админки
impl FromRequestParts<Arc<crate::AppState>> for AdminStaff {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = basic_credentials(parts)?;

        let row: Option<StaffRow> = sqlx::query_as(
            "SELECT staff_id, company_id, email, password_hash, full_name, role
             FROM staff
             WHERE email = $1 AND is_active = true",
        )
        .bind(&email)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let staff = row.ok_or(StatusCode::UNAUTHORIZED)?;

        if !bcrypt::verify(&password, &staff.password_hash).unwrap_or(false) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AdminStaff {
            staff_id: staff.staff_id,
            company_id: staff.company_id,
            email: staff.email,
            full_name: staff.full_name,
            role: staff.role,
        })
    }
}
