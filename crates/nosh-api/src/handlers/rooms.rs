//! Room handlers.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::json;
use tracing::{info, instrument};

use nosh_core::{logging, NewRoom};

use super::FormParts;
use crate::session::Session;
use crate::{ApiError, AppState};

/// Create a room owned by the caller.
///
/// # Multipart Fields
/// - `name`: room name (required, non-empty)
#[instrument(skip_all, fields(subsystem = "api", op = "create_room"))]
pub async fn create_room(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = FormParts::read(multipart).await?;
    let name = form.require("name")?.to_string();
    let owner = state.platform.require_profile(session.email()?).await?;

    let room = state
        .platform
        .rooms
        .insert(NewRoom {
            name,
            created_by: owner.id,
        })
        .await?;
    info!(
        { logging::ROOM_ID } = room.id,
        { logging::USER_ID } = owner.id,
        "Room created"
    );
    Ok(Json(json!({ "status": "success", "room": room })))
}

/// Rooms created by the caller.
pub async fn list_rooms(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = state.platform.require_profile(session.email()?).await?;
    let rooms = state.platform.rooms.list_by_creator(owner.id).await?;
    Ok(Json(json!({ "rooms": rooms })))
}
