use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::seatmap::GridDoc;

// Борт (автобус/вагон/судно). Планировка - собственная копия: после
// клонирования шаблона живет своей жизнью.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bus {
    pub id: i64,
    pub company_id: i64,
    pub seat_plan_id: Option<i64>,
    pub registration_no: String,
    pub title: Option<String>,
    pub layout: Json<GridDoc>,
    pub total_seats: i32,
    pub is_active: bool,
}
