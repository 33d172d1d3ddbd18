pub mod analytics;
pub mod buses;
pub mod companies;
pub mod schedules;
pub mod seat_plans;
pub mod stoppages;
pub mod tickets;
pub mod transit_routes;
pub mod users;

use axum::{http::StatusCode, Router};
use std::sync::Arc;

/* ---------- helpers ---------- */

// 419 - место занято/конфликт бронирования (нестандартный, но устоявшийся)
pub(crate) fn status_419() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::CONFLICT)
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(analytics::routes())
        .merge(buses::routes())
        .merge(companies::routes())
        .merge(schedules::routes())
        .merge(seat_plans::routes())
        .merge(stoppages::routes())
        .merge(tickets::routes())
        .merge(transit_routes::routes())
        .merge(users::routes())
}
