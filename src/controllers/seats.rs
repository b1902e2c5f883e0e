use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Room, Seat, SeatKey};
use crate::AppState;

use super::map_assignment_error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats", get(get_seats))
        .route("/seats/map", get(get_room_map))
        .route("/seats/my", get(get_my_seat))
        .route("/seats/acquire", patch(acquire_seat))
        .route("/seats/release", patch(release_seat))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Deserialize)]
struct SeatsQuery {
    room: Option<String>,
    section: Option<String>,
    status: Option<String>, // available, occupied, reserved, maintenance
    page: Option<u32>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
}

// GET /api/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(ref r) = params.room {
        let ok = matches!(r.as_str(), "117" | "118" | "204");
        if !ok {
            return Err((StatusCode::BAD_REQUEST, "Неизвестная аудитория".to_string()));
        }
    }
    if let Some(ref st) = params.status {
        let ok = matches!(st.as_str(), "available" | "occupied" | "reserved" | "maintenance");
        if !ok {
            return Err((
                StatusCode::BAD_REQUEST,
                "status должен быть available | occupied | reserved | maintenance".to_string(),
            ));
        }
    }

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * page_size;

    let mut q = String::from(
        "SELECT number, section, room_number, status, assigned_to, confirmed, created_at, updated_at
         FROM seats WHERE TRUE",
    );
    let mut bind_idx = 1;
    if params.room.is_some() {
        q.push_str(&format!(" AND room_number = ${}::room_number", bind_idx));
        bind_idx += 1;
    }
    if params.section.is_some() {
        q.push_str(&format!(" AND section = ${}", bind_idx));
        bind_idx += 1;
    }
    if params.status.is_some() {
        q.push_str(&format!(" AND status = ${}::seat_status", bind_idx));
        bind_idx += 1;
    }
    q.push_str(&format!(
        " ORDER BY room_number, section, number LIMIT ${} OFFSET ${}",
        bind_idx,
        bind_idx + 1
    ));

    let mut dbq = sqlx::query_as::<_, Seat>(&q);
    if let Some(r) = params.room {
        dbq = dbq.bind(r);
    }
    if let Some(s) = params.section {
        dbq = dbq.bind(s);
    }
    if let Some(st) = params.status {
        dbq = dbq.bind(st);
    }

    let seats = dbq
        .bind(page_size as i64)
        .bind(offset as i64)
        .fetch_all(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("get_seats sql error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Не удалось получить список мест".to_string(),
            )
        })?;

    Ok((StatusCode::OK, Json(seats)))
}

#[derive(Debug, Deserialize)]
struct RoomMapQuery {
    room: Room,
}

// GET /api/seats/map - полная карта мест аудитории через кеш
async fn get_room_map(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RoomMapQuery>,
) -> Result<Response, (StatusCode, String)> {
    let (seats, hit) = state.cache.room_map(params.room).await;

    let json_str = serde_json::to_string(&seats).map_err(|e| {
        tracing::error!("room map serialize error: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Не удалось получить карту мест".to_string(),
        )
    })?;

    Ok(Response::builder()
        .header("Content-Type", "application/json")
        .header("X-Cache", if hit { "HIT" } else { "MISS" })
        .body(Body::from(json_str))
        .unwrap())
}

// GET /api/seats/my
async fn get_my_seat(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let seat = state
        .assignments
        .held_seat(&user.user_id)
        .await
        .map_err(map_assignment_error)?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "seat": seat }))))
}

// PATCH /api/seats/acquire
#[derive(Debug, Deserialize)]
struct AcquireSeatRequest {
    number: i32,
    section: String,
}

async fn acquire_seat(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<AcquireSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.number <= 0 || req.section.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "number должен быть > 0, section непустой".to_string(),
        ));
    }

    let key = SeatKey::new(req.number, req.section);
    let seat = state
        .assignments
        .acquire(&key, &user.caller(), Utc::now())
        .await
        .map_err(map_assignment_error)?;

    // Карта аудитории изменилась
    state.cache.invalidate_room(seat.room_number).await;

    Ok((StatusCode::OK, Json(seat)))
}

// PATCH /api/seats/release
#[derive(Debug, Deserialize)]
struct ReleaseSeatRequest {
    number: i32,
    section: String,
}

async fn release_seat(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<ReleaseSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.number <= 0 || req.section.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "number должен быть > 0, section непустой".to_string(),
        ));
    }

    let key = SeatKey::new(req.number, req.section);
    let seat = state
        .assignments
        .release(&key, &user.caller())
        .await
        .map_err(map_assignment_error)?;

    state.cache.invalidate_room(seat.room_number).await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Место успешно освобождено"})),
    ))
}
