//! Note creation pipeline.
//!
//! Creating a note touches up to five platform calls:
//!
//! ```text
//! upload_file? -> insert_note -> record_file? -> upsert_tags? -> link_tags?
//! ```
//!
//! Steps marked `?` only run when a file or tags were supplied. Each step
//! either succeeds or stops the pipeline with [`Error::Pipeline`] naming the
//! step. Nothing is rolled back: whatever earlier steps wrote stays written,
//! and a warning is logged so orphans can be found later.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn, Span};

use crate::error::{Error, Result};
use crate::files::{classify_content_type, note_storage_path, FileUpload, NOTE_FILES_BUCKET};
use crate::logging;
use crate::models::{NewNote, NoteFileRecord, NoteTag, NoteWithTags, RowId, Tag};
use crate::traits::Platform;

/// Steps of the note creation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStep {
    UploadFile,
    InsertNote,
    RecordFile,
    UpsertTags,
    LinkTags,
}

impl NoteStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStep::UploadFile => "upload_file",
            NoteStep::InsertNote => "insert_note",
            NoteStep::RecordFile => "record_file",
            NoteStep::UpsertTags => "upsert_tags",
            NoteStep::LinkTags => "link_tags",
        }
    }
}

impl fmt::Display for NoteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create one note.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub room_id: RowId,
    pub user_id: RowId,
    pub title: String,
    pub content: Option<String>,
    /// Already parsed with [`crate::parse_tag_list`].
    pub tags: Vec<String>,
    pub file: Option<FileUpload>,
}

/// Runs a [`NoteDraft`] through the platform.
pub struct NotePipeline<'a> {
    platform: &'a Platform,
}

fn at(step: NoteStep) -> impl FnOnce(Error) -> Error {
    move |e| Error::Pipeline {
        step,
        message: e.detail(),
    }
}

impl<'a> NotePipeline<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    /// Create the note. `now_millis` names the stored object.
    #[instrument(
        skip(self, draft),
        fields(subsystem = "pipeline", op = "create_note", room_id = draft.room_id, note_id)
    )]
    pub async fn run(&self, draft: NoteDraft, now_millis: i64) -> Result<NoteWithTags> {
        let start = Instant::now();
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::BadRequest("Title is required".to_string()));
        }
        let kind = match &draft.file {
            Some(file) => Some(classify_content_type(&file.content_type)?),
            None => None,
        };

        // upload_file
        let mut stored = None;
        if let (Some(file), Some(kind)) = (draft.file, kind) {
            let path = note_storage_path(draft.user_id, now_millis, &file.content_type);
            self.platform
                .storage
                .upload(NOTE_FILES_BUCKET, &path, file.data, &file.content_type)
                .await
                .map_err(at(NoteStep::UploadFile))?;
            let url = self.platform.storage.public_url(NOTE_FILES_BUCKET, &path);
            debug!(
                { logging::BUCKET } = NOTE_FILES_BUCKET,
                { logging::STORAGE_PATH } = %path,
                "Note file uploaded"
            );
            stored = Some((kind, path, url));
        }

        // insert_note
        let note = self
            .platform
            .notes
            .insert(NewNote {
                room_id: draft.room_id,
                user_id: draft.user_id,
                title,
                content: draft.content.filter(|c| !c.is_empty()),
                file_url: stored.as_ref().map(|(_, _, url)| url.clone()),
            })
            .await
            .map_err(|e| {
                if let Some((_, path, _)) = &stored {
                    warn!(
                        { logging::STORAGE_PATH } = %path,
                        "Note insert failed, object left orphaned"
                    );
                }
                at(NoteStep::InsertNote)(e)
            })?;
        Span::current().record(logging::NOTE_ID, note.id);

        // record_file
        if let Some((file_type, file_path, file_url)) = stored {
            self.platform
                .files
                .insert_note_file(NoteFileRecord {
                    note_id: note.id,
                    file_type,
                    file_url,
                    file_path,
                })
                .await
                .map_err(|e| self.partial(note.id, NoteStep::RecordFile, e))?;
        }

        // upsert_tags, link_tags
        let mut tag_names = Vec::new();
        if !draft.tags.is_empty() {
            let rows = self
                .platform
                .tags
                .upsert_by_name(&draft.tags)
                .await
                .map_err(|e| self.partial(note.id, NoteStep::UpsertTags, e))?;
            let linked = ordered_tags(&draft.tags, &rows);
            let links: Vec<NoteTag> = linked
                .iter()
                .map(|tag| NoteTag {
                    note_id: note.id,
                    tag_id: tag.id,
                })
                .collect();
            self.platform
                .tags
                .link(&links)
                .await
                .map_err(|e| self.partial(note.id, NoteStep::LinkTags, e))?;
            tag_names = linked.into_iter().map(|t| t.name.clone()).collect();
        }

        info!(
            { logging::NOTE_ID } = note.id,
            { logging::TAG_COUNT } = tag_names.len(),
            has_file = note.file_url.is_some(),
            { logging::DURATION_MS } = start.elapsed().as_millis() as u64,
            "Note created"
        );
        Ok(NoteWithTags {
            note,
            tags: tag_names,
        })
    }

    fn partial(&self, note_id: RowId, step: NoteStep, e: Error) -> Error {
        warn!(
            { logging::NOTE_ID } = note_id,
            { logging::STEP } = %step,
            { logging::ERROR_MSG } = %e,
            "Note created but a later step failed"
        );
        at(step)(e)
    }
}

/// Rows returned by the upsert, in the order the names were requested.
/// Names the store did not echo back are skipped.
fn ordered_tags<'t>(names: &[String], rows: &'t [Tag]) -> Vec<&'t Tag> {
    names
        .iter()
        .filter_map(|name| rows.iter().find(|row| &row.name == name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display_matches_wire_names() {
        assert_eq!(NoteStep::UploadFile.to_string(), "upload_file");
        assert_eq!(NoteStep::LinkTags.to_string(), "link_tags");
        assert_eq!(
            serde_json::to_value(NoteStep::RecordFile).unwrap(),
            serde_json::json!("record_file")
        );
    }

    #[test]
    fn test_at_wraps_detail() {
        let err = at(NoteStep::UploadFile)(Error::Provider {
            status: 413,
            message: "Payload too large".to_string(),
        });
        assert_eq!(err.to_string(), "Upload failed at upload_file: Payload too large");
    }

    #[test]
    fn test_ordered_tags_follows_request_order() {
        let rows = vec![
            Tag { id: 2, name: "b".to_string() },
            Tag { id: 1, name: "a".to_string() },
        ];
        let names = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        let ids: Vec<RowId> = ordered_tags(&names, &rows).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
