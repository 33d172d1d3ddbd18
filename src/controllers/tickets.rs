use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::status_419;
use crate::{
    middleware::AuthUser,
    models::Schedule,
    seatmap::{Grid, SeatPicker, ToggleOutcome},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats/hold", post(hold_seat))
        .route("/seats/release", patch(release_seat))
        .route("/tickets", get(get_user_tickets))
        .route("/tickets", post(create_ticket))
        .route("/tickets/cancel", patch(cancel_ticket))
}

/* ---------- helpers ---------- */

async fn load_active_schedule(
    pool: &sqlx::PgPool,
    schedule_id: i64,
) -> Result<Schedule, (StatusCode, String)> {
    let schedule = sqlx::query_as::<_, Schedule>(
        "SELECT * FROM schedules WHERE id = $1 AND status = 'active' AND departure_at > NOW()",
    )
    .bind(schedule_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("load schedule {} sql error: {:?}", schedule_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
    })?;

    schedule.ok_or((status_419(), "Рейс не найден или продажи закрыты".to_string()))
}

async fn ticket_belongs_to_user(
    pool: &sqlx::PgPool,
    ticket_id: i64,
    user_id: i32,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM tickets WHERE id = $1 AND user_id = $2)",
    )
    .bind(ticket_id)
    .bind(user_id as i64)
    .fetch_one(pool)
    .await
}

/* ---------- HOLDS ---------- */

// POST /api/seats/hold
#[derive(Debug, Deserialize)]
struct HoldSeatRequest {
    pub schedule_id: i64,
    pub row: u32,
    pub column: u32,
}

async fn hold_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<HoldSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.schedule_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "schedule_id должен быть > 0".to_string()));
    }

    let schedule = load_active_schedule(&state.db.pool, req.schedule_id).await?;

    // Позиция должна быть продаваемым местом
    let grid = Grid::from_doc(schedule.layout.0);
    let booked: Vec<(u32, u32)> = state
        .cache
        .get_booked_positions(schedule.id)
        .await
        .into_iter()
        .map(|(r, c)| (r as u32, c as u32))
        .collect();
    let mut picker = SeatPicker::new(grid, booked);
    match picker.toggle(req.row, req.column) {
        Ok(ToggleOutcome::Added) => {}
        Ok(_) => return Err((status_419(), "Место недоступно для продажи".to_string())),
        Err(e) => return Err((StatusCode::BAD_REQUEST, e.to_string())),
    }

    // Атомарный резерв в Redis на время оформления
    let held = state
        .cache
        .hold_position(req.schedule_id, req.row, req.column, user.user_id)
        .await;
    if !held {
        return Err((status_419(), "Место уже удерживается другим покупателем".to_string()));
    }

    Ok((StatusCode::OK, Json(serde_json::json!({"message":"Место удержано за вами"}))))
}

// PATCH /api/seats/release
#[derive(Debug, Deserialize)]
struct ReleaseSeatRequest {
    pub schedule_id: i64,
    pub row: u32,
    pub column: u32,
}

async fn release_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ReleaseSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let holder = state
        .cache
        .holder_of(req.schedule_id, req.row, req.column)
        .await;
    if holder != Some(user.user_id) {
        return Err((StatusCode::FORBIDDEN, "Место не удерживается вами".to_string()));
    }

    state
        .cache
        .release_position(req.schedule_id, req.row, req.column)
        .await;

    Ok((StatusCode::OK, Json(serde_json::json!({"message":"Место освобождено"}))))
}

/* ---------- TICKETS ---------- */

// POST /api/tickets
#[derive(Debug, Deserialize)]
struct SeatRef {
    pub row: u32,
    pub column: u32,
}

#[derive(Debug, Deserialize)]
struct CreateTicketRequest {
    pub schedule_id: i64,
    pub seats: Vec<SeatRef>,
}

#[derive(Debug, Serialize)]
struct CreateTicketResponse {
    pub id: i64,
    pub code: Uuid,
    pub subtotal: f64,
    pub seats: Vec<crate::seatmap::SeatChoice>,
}

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.seats.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Не выбрано ни одного места".to_string()));
    }
    if req.seats.len() > 10 {
        return Err((StatusCode::BAD_REQUEST, "Не больше 10 мест за одну покупку".to_string()));
    }

    let schedule = load_active_schedule(&state.db.pool, req.schedule_id).await?;

    // 1) Прогоняем выбор через посадочную схему: проданные, сломанные,
    //    проходы и дубли отсекаются здесь
    let booked: Vec<(u32, u32)> = state
        .cache
        .get_booked_positions(schedule.id)
        .await
        .into_iter()
        .map(|(r, c)| (r as u32, c as u32))
        .collect();
    let grid = Grid::from_doc(schedule.layout.0.clone());
    let mut picker = SeatPicker::new(grid, booked);

    for seat in &req.seats {
        match picker.toggle(seat.row, seat.column) {
            Ok(ToggleOutcome::Added) => {}
            Ok(_) => {
                return Err((status_419(), "Место уже продано или недоступно".to_string()));
            }
            Err(e) => return Err((StatusCode::BAD_REQUEST, e.to_string())),
        }
    }

    // 2) Удержания: позиция либо уже наша, либо берем ее сейчас.
    //    При неудаче возвращаем взятые в этом запросе.
    let mut acquired: Vec<(u32, u32)> = Vec::new();
    for seat in &req.seats {
        let holder = state
            .cache
            .holder_of(schedule.id, seat.row, seat.column)
            .await;
        if holder == Some(user.user_id) {
            continue;
        }
        if state
            .cache
            .hold_position(schedule.id, seat.row, seat.column, user.user_id)
            .await
        {
            acquired.push((seat.row, seat.column));
        } else {
            state.cache.release_positions(schedule.id, &acquired).await;
            return Err((status_419(), "Место уже удерживается другим покупателем".to_string()));
        }
    }

    // 3) Цены: индивидуальный тариф места, иначе плоская цена рейса
    let checkout = picker.checkout(|cell| cell.fare.unwrap_or(schedule.fare));

    // 4) Транзакция: билет + места. UNIQUE(schedule_id, seat_row,
    //    seat_col) ловит гонку двух покупателей на одной позиции.
    let mut tx = state.db.pool.begin().await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка транзакции".to_string()))?;

    let code = Uuid::new_v4();
    let ticket_id = match sqlx::query_scalar::<_, i64>(
        "INSERT INTO tickets (code, schedule_id, user_id, status, subtotal)
         VALUES ($1, $2, $3, 'booked', $4)
         RETURNING id",
    )
    .bind(code)
    .bind(schedule.id)
    .bind(user.user_id as i64)
    .bind(checkout.subtotal)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("create_ticket insert error: {:?}", e);
            let _ = tx.rollback().await;
            state.cache.release_positions(schedule.id, &acquired).await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать билет".to_string()));
        }
    };

    for choice in &checkout.seats {
        let ins = sqlx::query(
            "INSERT INTO ticket_seats (ticket_id, schedule_id, seat_row, seat_col, seat_number, seat_label, fare)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(ticket_id)
        .bind(schedule.id)
        .bind(choice.row as i32)
        .bind(choice.column as i32)
        .bind(choice.seat_number.map(|n| n as i32))
        .bind(&choice.seat_label)
        .bind(choice.fare)
        .execute(&mut *tx)
        .await;

        if let Err(e) = ins {
            let _ = tx.rollback().await;
            state.cache.release_positions(schedule.id, &acquired).await;
            if super::is_unique_violation(&e) {
                // Кто-то успел раньше между проверкой и записью
                state.cache.invalidate_seats(schedule.id).await;
                return Err((status_419(), "Место уже продано".to_string()));
            }
            tracing::error!("create_ticket seat insert error: {:?}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось записать места".to_string()));
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("failed to commit ticket {}: {:?}", ticket_id, e);
        state.cache.release_positions(schedule.id, &acquired).await;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Ошибка фиксации транзакции".to_string()));
    }

    // 5) Места проданы - удержания больше не нужны, кеш устарел
    let sold: Vec<(u32, u32)> = checkout.seats.iter().map(|s| (s.row, s.column)).collect();
    state.cache.release_positions(schedule.id, &sold).await;
    state.cache.invalidate_seats(schedule.id).await;

    Ok((
        StatusCode::CREATED,
        Json(CreateTicketResponse {
            id: ticket_id,
            code,
            subtotal: checkout.subtotal,
            seats: checkout.seats,
        }),
    ))
}

// GET /api/tickets
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketSeatResponse {
    row: i32,
    column: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seat_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seat_label: Option<String>,
    fare: f64,
}

#[derive(Debug, Serialize)]
struct TicketResponse {
    id: i64,
    code: Uuid,
    schedule_id: i64,
    status: String,
    subtotal: f64,
    seats: Vec<TicketSeatResponse>,
}

async fn get_user_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT t.id as tid, t.code as tcode, t.schedule_id as sid, t.status as tstatus,
               t.subtotal as tsubtotal,
               s.seat_row, s.seat_col, s.seat_number, s.seat_label, s.fare
        FROM tickets t
        LEFT JOIN ticket_seats s ON s.ticket_id = t.id
        WHERE t.user_id = $1
        ORDER BY t.created_at DESC, s.seat_row, s.seat_col
        "#,
    )
    .bind(user.user_id as i64)
    .fetch_all(&state.db.pool)
    .await;

    let rows = rows.map_err(|e| {
        tracing::error!("get_user_tickets sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось получить список билетов".to_string())
    })?;

    let mut map: BTreeMap<i64, TicketResponse> = BTreeMap::new();
    for r in rows {
        let tid: i64 = r.get("tid");
        let entry = map.entry(tid).or_insert_with(|| TicketResponse {
            id: tid,
            code: r.get("tcode"),
            schedule_id: r.get("sid"),
            status: r.get("tstatus"),
            subtotal: r.get("tsubtotal"),
            seats: Vec::new(),
        });
        // LEFT JOIN: у отмененного билета мест может не быть
        if let Ok(Some(seat_row)) = r.try_get::<Option<i32>, _>("seat_row") {
            entry.seats.push(TicketSeatResponse {
                row: seat_row,
                column: r.get("seat_col"),
                seat_number: r.try_get("seat_number").ok().flatten(),
                seat_label: r.try_get("seat_label").ok().flatten(),
                fare: r.get("fare"),
            });
        }
    }

    let resp: Vec<TicketResponse> = map.into_values().collect();
    Ok((StatusCode::OK, Json(resp)))
}

// PATCH /api/tickets/cancel
#[derive(Debug, Deserialize)]
struct CancelTicketRequest {
    pub ticket_id: i64,
}

async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CancelTicketRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.ticket_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "ticket_id должен быть > 0".to_string()));
    }

    // Проверка владельца
    let belongs = ticket_belongs_to_user(&state.db.pool, req.ticket_id, user.user_id)
        .await
        .unwrap_or(false);
    if !belongs {
        return Err((StatusCode::FORBIDDEN, "Билет не найден или не принадлежит вам".to_string()));
    }

    // Заранее получим schedule_id для инвалидации кеша позже
    let schedule_id = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT schedule_id FROM tickets WHERE id = $1",
    )
    .bind(req.ticket_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string()))?
    .ok_or((status_419(), "Билет не найден".to_string()))?;

    // Начинаем транзакцию
    let mut tx = state.db.pool.begin().await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка транзакции".to_string()))?;

    // 1) Освободим позиции билета и соберем их
    let freed_result = sqlx::query_as::<_, (i32, i32)>(
        "DELETE FROM ticket_seats WHERE ticket_id = $1 RETURNING seat_row, seat_col",
    )
    .bind(req.ticket_id)
    .fetch_all(&mut *tx)
    .await;

    let freed: Vec<(i32, i32)> = match freed_result {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("failed to free seats for ticket {}: {:?}", req.ticket_id, e);
            let _ = tx.rollback().await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось освободить места".to_string()));
        }
    };

    // 2) Пометим билет отмененным
    let upd_result = sqlx::query(
        "UPDATE tickets SET status = 'cancelled' WHERE id = $1 AND status = 'booked'",
    )
    .bind(req.ticket_id)
    .execute(&mut *tx)
    .await;

    match upd_result {
        Ok(r) if r.rows_affected() > 0 => {}
        Ok(_) => {
            let _ = tx.rollback().await;
            return Err((status_419(), "Билет уже отменен".to_string()));
        }
        Err(e) => {
            tracing::error!("failed to update ticket {}: {:?}", req.ticket_id, e);
            let _ = tx.rollback().await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Не удалось отменить билет".to_string()));
        }
    }

    // 3) Коммитим
    if let Err(e) = tx.commit().await {
        tracing::error!("failed to commit cancel_ticket tx for {}: {:?}", req.ticket_id, e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Ошибка фиксации транзакции".to_string()));
    }

    // 4) Снимем возможные удержания на освободившихся позициях
    let positions: Vec<(u32, u32)> = freed.iter().map(|(r, c)| (*r as u32, *c as u32)).collect();
    state.cache.release_positions(schedule_id, &positions).await;

    // 5) Инвалидируем кеш мест рейса
    state.cache.invalidate_seats(schedule_id).await;

    Ok((StatusCode::OK, Json(serde_json::json!({"message":"Билет успешно отменен"}))))
}
