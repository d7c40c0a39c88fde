//! Room file uploads.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::json;
use tracing::instrument;

use nosh_core::store_room_file;

use super::FormParts;
use crate::session::Session;
use crate::{ApiError, AppState};

/// Upload a file into a room.
///
/// # Multipart Fields
/// - `file`: pdf, docx or image (required)
/// - `notesroom_id` (or `room_id`): target room (required)
///
/// # Returns
/// - 200 `{file_path, metadata}`
/// - 400 for a missing field or an unsupported type, before anything is stored
#[instrument(skip_all, fields(subsystem = "api", op = "upload_room_file", auth_id = %session.user.id))]
pub async fn upload_room_file(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = FormParts::read(multipart).await?;
    let room = form
        .text("notesroom_id")
        .or_else(|| form.text("room_id"))
        .ok_or_else(|| ApiError::BadRequest("notesroom_id is required".to_string()))?
        .to_string();
    let upload = form
        .file
        .take()
        .ok_or_else(|| ApiError::BadRequest("file is required".to_string()))?;

    let record = store_room_file(&state.platform, &room, session.user.id, upload).await?;
    Ok(Json(json!({
        "file_path": record.file_path,
        "metadata": record,
    })))
}
