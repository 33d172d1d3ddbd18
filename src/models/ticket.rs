use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub code: Uuid,
    pub schedule_id: i64,
    pub user_id: i32,
    pub status: String,
    pub subtotal: f64,
    pub created_at: NaiveDateTime,
}

// Место в билете; UNIQUE(schedule_id, seat_row, seat_col) в БД не дает
// продать одну позицию дважды
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TicketSeat {
    pub id: i64,
    pub ticket_id: i64,
    pub schedule_id: i64,
    pub seat_row: i32,
    pub seat_col: i32,
    pub seat_number: Option<i32>,
    pub seat_label: Option<String>,
    pub fare: f64,
}
