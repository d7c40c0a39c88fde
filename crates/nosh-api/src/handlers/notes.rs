//! Note handlers: create, list by room, get, update, signed file URL.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use nosh_core::{
    parse_tag_list, NoteDraft, NotePipeline, NoteUpdate, NoteWithTags, RowId, NOTE_FILES_BUCKET,
};

use super::FormParts;
use crate::session::Session;
use crate::{ApiError, AppState};

const NOTE_NOT_FOUND: &str = "Note not found";

/// Create a note with an optional file and tags.
///
/// # Multipart Fields
/// - `title` (required)
/// - `room_id` (required, integer)
/// - `content` (optional)
/// - `tags` (optional, comma separated)
/// - `file` (optional; pdf, docx or image)
///
/// # Returns
/// - 200 `{status, message, data}` with `data` the note and its tag names
/// - 400 for missing fields or an unsupported file type, before any write
/// - 500 `"Upload failed at <step>: ..."` when a pipeline step fails
#[instrument(skip_all, fields(subsystem = "api", op = "upload_note"))]
pub async fn upload_note(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = FormParts::read(multipart).await?;
    let title = form.require("title")?.to_string();
    let room_id: RowId = form
        .require("room_id")?
        .parse()
        .map_err(|_| ApiError::BadRequest("room_id must be an integer".to_string()))?;
    let content = form.raw("content").map(str::to_string);
    let tags = form.text("tags").map(parse_tag_list).unwrap_or_default();
    let file = form.file.take();

    let author = state.platform.require_profile(session.email()?).await?;
    let draft = NoteDraft {
        room_id,
        user_id: author.id,
        title,
        content,
        tags,
        file,
    };
    let now_millis = chrono::Utc::now().timestamp_millis();
    let note = NotePipeline::new(&state.platform)
        .run(draft, now_millis)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Note uploaded successfully!",
        "data": note,
    })))
}

/// Notes in a room, each with its tag names.
pub async fn notes_by_room(
    State(state): State<AppState>,
    _session: Session,
    Path(room_id): Path<RowId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let notes = state.platform.notes.list_by_room(room_id).await?;
    let notes = state.platform.with_tags(notes).await?;
    Ok(Json(json!({ "notes": notes })))
}

async fn note_with_tags(state: &AppState, note_id: RowId) -> Result<NoteWithTags, ApiError> {
    let note = state
        .platform
        .notes
        .fetch(note_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.to_string()))?;
    state
        .platform
        .with_tags(vec![note])
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.to_string()))
}

/// One note with its tag names.
pub async fn get_note(
    State(state): State<AppState>,
    _session: Session,
    Path(note_id): Path<RowId>,
) -> Result<Json<NoteWithTags>, ApiError> {
    Ok(Json(note_with_tags(&state, note_id).await?))
}

/// Update a note's title and/or content.
#[instrument(skip_all, fields(subsystem = "api", op = "update_note", note_id))]
pub async fn update_note(
    State(state): State<AppState>,
    _session: Session,
    Path(note_id): Path<RowId>,
    Json(update): Json<NoteUpdate>,
) -> Result<Json<NoteWithTags>, ApiError> {
    tracing::Span::current().record(nosh_core::logging::NOTE_ID, note_id);
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "Provide a title or content to update".to_string(),
        ));
    }
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("Title must not be empty".to_string()));
    }

    let note = state
        .platform
        .notes
        .update(note_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.to_string()))?;
    info!("Note updated");
    let mut with_tags = state.platform.with_tags(vec![note]).await?;
    with_tags
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct FileUrlQuery {
    pub note_id: RowId,
}

/// Signed URL for a note's file, by path parameter.
pub async fn file_url(
    State(state): State<AppState>,
    _session: Session,
    Path(note_id): Path<RowId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    signed_file_url(&state, note_id).await
}

/// Signed URL for a note's file, by `?note_id=`.
pub async fn file_url_query(
    State(state): State<AppState>,
    _session: Session,
    Query(query): Query<FileUrlQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    signed_file_url(&state, query.note_id).await
}

async fn signed_file_url(
    state: &AppState,
    note_id: RowId,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .platform
        .notes
        .fetch(note_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOTE_NOT_FOUND.to_string()))?;
    let record = state
        .platform
        .files
        .note_file(note_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note has no file".to_string()))?;

    let expires_in = state.config.signed_url_ttl_secs;
    let url = state
        .platform
        .storage
        .signed_url(NOTE_FILES_BUCKET, &record.file_path, expires_in)
        .await?;
    Ok(Json(json!({ "url": url, "expires_in": expires_in })))
}
