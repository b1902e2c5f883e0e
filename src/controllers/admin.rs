use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::middleware::AuthUser;
use crate::models::SeatKey;
use crate::AppState;

use super::map_assignment_error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/seats/confirm", patch(confirm_seat))
        .route("/admin/seats/assign", post(assign_seat))
}

fn require_admin(user: &AuthUser) -> Result<(), (StatusCode, String)> {
    if user.is_admin {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            "Операция доступна только администратору".to_string(),
        ))
    }
}

// PATCH /api/admin/seats/confirm
#[derive(Debug, Deserialize)]
struct ConfirmSeatRequest {
    number: i32,
    section: String,
}

async fn confirm_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ConfirmSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&user)?;

    let key = SeatKey::new(req.number, req.section);
    let seat = state
        .assignments
        .confirm(&key)
        .await
        .map_err(map_assignment_error)?;

    state.cache.invalidate_room(seat.room_number).await;

    Ok((StatusCode::OK, Json(seat)))
}

// POST /api/admin/seats/assign
#[derive(Debug, Deserialize)]
struct AssignSeatRequest {
    number: i32,
    section: String,
    user_id: String,
}

async fn assign_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<AssignSeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&user)?;

    if req.user_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "user_id не может быть пустым".to_string()));
    }

    let key = SeatKey::new(req.number, req.section);
    let seat = state
        .assignments
        .admin_assign(&key, &req.user_id)
        .await
        .map_err(map_assignment_error)?;

    state.cache.invalidate_room(seat.room_number).await;

    Ok((StatusCode::CREATED, Json(seat)))
}
