//! Upload classification, object path derivation and the room file flow.

use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::logging;
use crate::models::{FileKind, RoomFileRecord, RowId};
use crate::traits::Platform;

/// Bucket holding files attached to notes.
pub const NOTE_FILES_BUCKET: &str = "note-files";

/// Bucket holding files uploaded directly into rooms.
pub const ROOM_FILES_BUCKET: &str = "notes";

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Classify a declared MIME type; parameters and case are ignored.
pub fn classify_content_type(content_type: &str) -> Result<FileKind> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => Ok(FileKind::Pdf),
        DOCX_MIME => Ok(FileKind::Docx),
        m if m.starts_with("image/") && m.len() > "image/".len() => Ok(FileKind::Image),
        _ => Err(Error::UnsupportedFileType(format!(
            "'{}' is not a pdf, docx or image",
            content_type
        ))),
    }
}

/// Extension (with leading dot) for a declared MIME type; `.bin` when unknown.
pub fn extension_for_mime(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => ".pdf",
        DOCX_MIME => ".docx",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/bmp" => ".bmp",
        "image/tiff" => ".tiff",
        "image/heic" => ".heic",
        "image/avif" => ".avif",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        _ => ".bin",
    }
}

/// Strip directory components and anything outside a safe character set.
pub fn sanitize_filename(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Object path for a note attachment: `<user id>/<unix millis><ext>`, with
/// the extension taken from the declared MIME type.
pub fn note_storage_path(user_id: RowId, unix_millis: i64, content_type: &str) -> String {
    format!("{}/{}{}", user_id, unix_millis, extension_for_mime(content_type))
}

/// Parse a room id received from a form. Only integer row ids are accepted,
/// so the value can never contribute a path separator or `..` to an object key.
pub fn parse_room_id(raw: &str) -> Result<RowId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::BadRequest("notesroom_id is required".to_string()));
    }
    raw.parse::<RowId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| Error::BadRequest("notesroom_id must be a room id".to_string()))
}

/// Object path for a room file: `<room id>/<auth user id>/<sanitized name>`.
pub fn room_storage_path(room_id: RowId, owner: Uuid, file_name: &str) -> String {
    format!("{}/{}/{}", room_id, owner, sanitize_filename(file_name))
}

/// Store a file in a room and record its metadata row.
///
/// The type check happens before any storage write. A failed metadata insert
/// leaves the object behind.
#[instrument(
    skip(platform, upload),
    fields(subsystem = "storage", op = "store_room_file", bucket = ROOM_FILES_BUCKET)
)]
pub async fn store_room_file(
    platform: &Platform,
    room: &str,
    owner: Uuid,
    upload: FileUpload,
) -> Result<RoomFileRecord> {
    let room_id = parse_room_id(room)?;
    classify_content_type(&upload.content_type)?;

    let path = room_storage_path(room_id, owner, &upload.file_name);
    let size = upload.data.len();
    platform
        .storage
        .upload(ROOM_FILES_BUCKET, &path, upload.data, &upload.content_type)
        .await?;

    let record = RoomFileRecord {
        file_path: path.clone(),
        notesroom_id: room_id.to_string(),
        owner_id: owner,
    };
    match platform.files.insert_room_file(record).await {
        Ok(stored) => {
            info!(
                { logging::STORAGE_PATH } = %path,
                { logging::SIZE_BYTES } = size,
                "Room file stored"
            );
            Ok(stored)
        }
        Err(e) => {
            warn!(
                { logging::STORAGE_PATH } = %path,
                { logging::ERROR_MSG } = %e,
                "Object stored without metadata row"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pdf() {
        assert_eq!(classify_content_type("application/pdf").unwrap(), FileKind::Pdf);
    }

    #[test]
    fn test_classify_docx() {
        assert_eq!(classify_content_type(DOCX_MIME).unwrap(), FileKind::Docx);
    }

    #[test]
    fn test_classify_image_variants() {
        assert_eq!(classify_content_type("image/png").unwrap(), FileKind::Image);
        assert_eq!(classify_content_type("IMAGE/JPEG").unwrap(), FileKind::Image);
        assert_eq!(
            classify_content_type("image/webp; q=0.9").unwrap(),
            FileKind::Image
        );
    }

    #[test]
    fn test_classify_rejects_others() {
        for mime in ["text/plain", "application/msword", "image/", "", "video/mp4"] {
            let err = classify_content_type(mime).unwrap_err();
            assert!(matches!(err, Error::UnsupportedFileType(_)), "{mime}");
        }
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("application/pdf"), ".pdf");
        assert_eq!(extension_for_mime(DOCX_MIME), ".docx");
        assert_eq!(extension_for_mime("IMAGE/JPEG"), ".jpg");
        assert_eq!(extension_for_mime("image/png; charset=binary"), ".png");
        assert_eq!(extension_for_mime("image/x-unknown"), ".bin");
        assert_eq!(extension_for_mime(""), ".bin");
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\report.pdf"), "report.pdf");
    }

    #[test]
    fn test_sanitize_filename_replaces_unsafe_chars() {
        assert_eq!(sanitize_filename("my notes (v2).pdf"), "my_notes__v2_.pdf");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn test_note_storage_path_uses_mime_extension() {
        assert_eq!(
            note_storage_path(42, 1_700_000_000_123, "image/png"),
            "42/1700000000123.png"
        );
        assert_eq!(note_storage_path(1, 5, "image/x-raw"), "1/5.bin");
    }

    #[test]
    fn test_room_storage_path() {
        let owner = Uuid::nil();
        assert_eq!(
            room_storage_path(3, owner, "a b.pdf"),
            format!("3/{}/a_b.pdf", owner)
        );
    }

    #[test]
    fn test_parse_room_id_accepts_row_ids() {
        assert_eq!(parse_room_id("7").unwrap(), 7);
        assert_eq!(parse_room_id(" 12 ").unwrap(), 12);
    }

    #[test]
    fn test_parse_room_id_rejects_path_like_values() {
        for raw in ["../note-files/7", "../x", "a/b", "3/..", "room-9", "-1", "0", "1.5"] {
            let err = parse_room_id(raw).unwrap_err();
            assert!(matches!(err, Error::BadRequest(_)), "{raw}");
        }
        assert!(matches!(
            parse_room_id("  "),
            Err(Error::BadRequest(msg)) if msg == "notesroom_id is required"
        ));
    }
}
