use serde::Serialize;
use sqlx::FromRow;

// Сотрудник компании: owner / manager / counter
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Staff {
    pub staff_id: i32,
    pub company_id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
}
