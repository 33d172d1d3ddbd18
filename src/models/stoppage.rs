use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Stoppage {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub is_active: bool,
}
