use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::seatmap::GridDoc;

// Именованный шаблон планировки; борта копируют его, а не ссылаются
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeatPlan {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub transport_kind: String,
    pub status: String,
    pub layout: Json<GridDoc>,
    pub total_seats: i32,
}
