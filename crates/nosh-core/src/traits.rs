//! Core traits for the external platform NOsh delegates to.
//!
//! Every piece of persistent state lives behind these interfaces. The
//! Supabase client in `nosh-platform` implements all of them; so does the
//! in-memory platform used by tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// AUTH PROVIDER
// =============================================================================

/// External identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register an email/password identity. `Ok(None)` when the provider
    /// accepted the request but returned no user.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<AuthUser>>;

    /// Exchange credentials for a session token pair.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthTokens>;

    /// URL the browser is sent to for a third-party OAuth login.
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;

    /// Exchange an OAuth authorization code (PKCE) for tokens.
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthTokens>;

    /// Resolve an access token to its identity. `Ok(None)` when the
    /// provider does not recognise the token.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<()>;
}

// =============================================================================
// ROW REPOSITORIES
// =============================================================================

/// Mirrored profiles (`users`).
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>>;

    /// Insert a profile, returning the stored row if the store echoed one.
    async fn insert(&self, profile: NewProfile) -> Result<Option<Profile>>;
}

/// Rooms (`rooms`).
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn insert(&self, room: NewRoom) -> Result<Room>;

    async fn list_by_creator(&self, created_by: RowId) -> Result<Vec<Room>>;
}

/// Notes (`notes`).
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn insert(&self, note: NewNote) -> Result<Note>;

    async fn fetch(&self, id: RowId) -> Result<Option<Note>>;

    async fn list_by_room(&self, room_id: RowId) -> Result<Vec<Note>>;

    /// Apply a partial update. `Ok(None)` when no row matched.
    async fn update(&self, id: RowId, update: NoteUpdate) -> Result<Option<Note>>;
}

/// Tags (`tags`) and their links to notes (`note_tags`).
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Upsert tags by unique name and return every affected row, existing
    /// ones included.
    async fn upsert_by_name(&self, names: &[String]) -> Result<Vec<Tag>>;

    async fn link(&self, links: &[NoteTag]) -> Result<()>;

    /// Tag names for each of the given notes. Notes without tags may be
    /// absent from the map.
    async fn names_for_notes(&self, note_ids: &[RowId]) -> Result<HashMap<RowId, Vec<String>>>;
}

/// File bookkeeping rows (`storage_buckets`, `file_metadata`).
#[async_trait]
pub trait FileRecordRepository: Send + Sync {
    async fn insert_note_file(&self, record: NoteFileRecord) -> Result<NoteFileRecord>;

    async fn note_file(&self, note_id: RowId) -> Result<Option<NoteFileRecord>>;

    async fn insert_room_file(&self, record: RoomFileRecord) -> Result<RoomFileRecord>;
}

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Hosted object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `path` inside `bucket`.
    async fn upload(&self, bucket: &str, path: &str, data: Bytes, content_type: &str)
        -> Result<()>;

    /// Publicly reachable URL of an object. Pure string construction.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Time-limited URL of an object.
    async fn signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64) -> Result<String>;
}

// =============================================================================
// PLATFORM BUNDLE
// =============================================================================

/// Every collaborator a handler may need, shared behind `Arc`s.
#[derive(Clone)]
pub struct Platform {
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub rooms: Arc<dyn RoomRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub files: Arc<dyn FileRecordRepository>,
    pub storage: Arc<dyn ObjectStore>,
}

impl Platform {
    /// Attach tag names to notes with one lookup.
    pub async fn with_tags(&self, notes: Vec<Note>) -> Result<Vec<NoteWithTags>> {
        if notes.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<RowId> = notes.iter().map(|n| n.id).collect();
        let mut names = self.tags.names_for_notes(&ids).await?;
        Ok(notes
            .into_iter()
            .map(|note| {
                let tags = names.remove(&note.id).unwrap_or_default();
                NoteWithTags { note, tags }
            })
            .collect())
    }

    /// Profile row for an email, or NotFound("User not found").
    pub async fn require_profile(&self, email: &str) -> Result<Profile> {
        self.profiles
            .find_by_email(email)
            .await?
            .ok_or_else(|| crate::Error::NotFound("User not found".to_string()))
    }
}
