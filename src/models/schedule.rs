use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::seatmap::GridDoc;

// Рейс: снимок планировки борта на момент создания + плоская цена.
// Индивидуальные тарифы мест (fare в ячейке) перекрывают плоскую.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub route_id: i64,
    pub bus_id: i64,
    pub departure_at: NaiveDateTime,
    pub arrival_at: Option<NaiveDateTime>,
    pub fare: f64,
    pub layout: Json<GridDoc>,
    pub total_seats: i32,
    pub status: String,
}
