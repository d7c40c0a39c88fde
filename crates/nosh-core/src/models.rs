//! Core data models for NOsh.
//!
//! Rows mirror the tables on the hosted relational store; identities and
//! token pairs mirror the auth provider's payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Primary key type of every table on the relational store.
pub type RowId = i64;

// =============================================================================
// AUTH TYPES
// =============================================================================

/// Identity resolved by the external auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: JsonValue,
    #[serde(default)]
    pub app_metadata: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Email of the identity, or an error when the provider returned none.
    pub fn require_email(&self) -> crate::Result<&str> {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| crate::Error::Unauthenticated("Session has no email".to_string()))
    }
}

/// Session token pair issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

// =============================================================================
// PROFILE TYPES
// =============================================================================

/// How a mirrored profile was first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Email,
    Google,
}

/// Local mirror of an external identity (`users` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: RowId,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AuthMethod>,
}

/// Insert payload for a profile row.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub username: String,
    pub email: String,
    /// Argon2id PHC string; absent for OAuth identities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub auth_id: Uuid,
    pub provider: AuthMethod,
}

// =============================================================================
// ROOM TYPES
// =============================================================================

/// A shared notes room (`rooms` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RowId,
    pub name: String,
    pub created_by: RowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRoom {
    pub name: String,
    pub created_by: RowId,
}

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A note row (`notes` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: RowId,
    pub room_id: RowId,
    pub user_id: RowId,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNote {
    pub room_id: RowId,
    pub user_id: RowId,
    pub title: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
}

/// Partial update of a note; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// A note together with the names of its tags, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteWithTags {
    #[serde(flatten)]
    pub note: Note,
    pub tags: Vec<String>,
}

// =============================================================================
// TAG TYPES
// =============================================================================

/// A tag row (`tags` table); `name` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: RowId,
    pub name: String,
}

/// Link row between a note and a tag (`note_tags` table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTag {
    pub note_id: RowId,
    pub tag_id: RowId,
}

// =============================================================================
// FILE TYPES
// =============================================================================

/// Accepted upload categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Image,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Image => "image",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a note (`storage_buckets` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteFileRecord {
    pub note_id: RowId,
    pub file_type: FileKind,
    pub file_url: String,
    pub file_path: String,
}

/// File uploaded into a room (`file_metadata` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomFileRecord {
    pub file_path: String,
    pub notesroom_id: String,
    pub owner_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_user_tolerates_missing_metadata() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "7b0f3c1e-9a55-4a4e-bb0a-2f2d1d8c4e10",
            "email": "ada@example.org"
        }))
        .unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.org"));
        assert!(user.user_metadata.is_null());
    }

    #[test]
    fn test_require_email_rejects_blank() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(String::new()),
            user_metadata: JsonValue::Null,
            app_metadata: JsonValue::Null,
            created_at: None,
        };
        assert!(matches!(
            user.require_email(),
            Err(crate::Error::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_note_with_tags_flattens() {
        let note = NoteWithTags {
            note: Note {
                id: 9,
                room_id: 3,
                user_id: 1,
                title: "Lecture 1".to_string(),
                content: None,
                file_url: None,
                created_at: None,
            },
            tags: vec!["math".to_string()],
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["title"], "Lecture 1");
        assert_eq!(value["tags"], json!(["math"]));
        assert!(value.get("note").is_none());
    }

    #[test]
    fn test_note_update_skips_absent_fields() {
        let update = NoteUpdate {
            title: Some("New".to_string()),
            content: None,
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"title": "New"}));
        assert!(!update.is_empty());
        assert!(NoteUpdate::default().is_empty());
    }

    #[test]
    fn test_new_profile_omits_password_for_oauth() {
        let profile = NewProfile {
            username: "ada".to_string(),
            email: "ada@example.org".to_string(),
            password: None,
            auth_id: Uuid::nil(),
            provider: AuthMethod::Google,
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["provider"], "google");
    }

    #[test]
    fn test_file_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(FileKind::Docx).unwrap(), json!("docx"));
        assert_eq!(FileKind::Image.to_string(), "image");
    }
}
