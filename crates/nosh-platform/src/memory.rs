//! In-memory platform for tests.
//!
//! Implements every core trait against plain collections and records each
//! call, so tests can assert both on the resulting rows and on which
//! platform calls were (or were not) made.
//!
//! ## Usage
//!
//! ```ignore
//! use nosh_platform::memory::MemoryPlatform;
//!
//! # async fn demo() {
//! let memory = MemoryPlatform::new();
//! memory.register_user("ada@example.org", "pw");
//! let platform = memory.platform();
//! let tokens = platform.auth.sign_in_with_password("ada@example.org", "pw").await.unwrap();
//! assert!(platform.auth.get_user(&tokens.access_token).await.unwrap().is_some());
//! assert_eq!(memory.call_count(), 2);
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use nosh_core::{
    derive_username, AuthMethod, AuthProvider, AuthTokens, AuthUser, Error, FileRecordRepository,
    NewNote, NewProfile, NewRoom, Note, NoteFileRecord, NoteRepository, NoteTag, NoteUpdate,
    ObjectStore, Platform, Profile, ProfileRepository, Result, Room, RoomFileRecord,
    RoomRepository, RowId, Tag, TagRepository,
};

/// Base URL used for public and signed object URLs.
pub const MEMORY_BASE_URL: &str = "http://memory.invalid";

/// One recorded platform call.
#[derive(Debug, Clone)]
pub struct MemoryCall {
    pub operation: String,
    pub detail: String,
    pub timestamp: Instant,
}

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, (AuthUser, String)>,
    sessions: HashMap<String, String>,
    oauth_codes: HashMap<String, String>,
    profiles: Vec<Profile>,
    rooms: Vec<Room>,
    notes: Vec<Note>,
    tags: Vec<Tag>,
    note_tags: Vec<NoteTag>,
    note_files: Vec<NoteFileRecord>,
    room_files: Vec<RoomFileRecord>,
    objects: HashMap<(String, String), StoredObject>,
    next_id: RowId,
    failures: HashSet<String>,
    empty_profile_insert: bool,
    null_sign_up: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> RowId {
        self.next_id += 1;
        self.next_id
    }

    fn issue_session(&mut self, email: &str) -> String {
        let token = format!("mem-access-{}", Uuid::new_v4());
        self.sessions.insert(token.clone(), email.to_string());
        token
    }

    fn account(&mut self, email: &str, password: &str) -> AuthUser {
        if let Some((user, _)) = self.accounts.get(email) {
            return user.clone();
        }
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: JsonValue::Null,
            app_metadata: JsonValue::Null,
            created_at: None,
        };
        self.accounts
            .insert(email.to_string(), (user.clone(), password.to_string()));
        user
    }

    fn tokens_for(&mut self, email: &str) -> AuthTokens {
        let user = self.accounts.get(email).map(|(u, _)| u.clone());
        AuthTokens {
            access_token: self.issue_session(email),
            refresh_token: Some(format!("mem-refresh-{}", Uuid::new_v4())),
            expires_in: Some(3600),
            token_type: Some("bearer".to_string()),
            user,
        }
    }
}

/// Cloneable in-memory platform; clones share state and call log.
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    state: Arc<Mutex<MemoryState>>,
    call_log: Arc<Mutex<Vec<MemoryCall>>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle this store as a [`Platform`].
    pub fn platform(&self) -> Platform {
        Platform {
            auth: Arc::new(self.clone()),
            profiles: Arc::new(self.clone()),
            rooms: Arc::new(self.clone()),
            notes: Arc::new(self.clone()),
            tags: Arc::new(self.clone()),
            files: Arc::new(self.clone()),
            storage: Arc::new(self.clone()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call, then fail it if a failure was injected for `operation`.
    fn enter(&self, operation: &str, detail: impl Into<String>) -> Result<()> {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MemoryCall {
                operation: operation.to_string(),
                detail: detail.into(),
                timestamp: Instant::now(),
            });
        if self.state().failures.contains(operation) {
            return Err(Error::Provider {
                status: 500,
                message: format!("injected failure: {}", operation),
            });
        }
        Ok(())
    }

    // ─── Call log ───────────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<MemoryCall> {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of calls whose operation starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear()
    }

    // ─── Behaviour switches ────────────────────────────────────────────────

    /// Make every call to `operation` (e.g. `"tags.upsert"`) fail.
    pub fn fail_on(&self, operation: &str) -> &Self {
        self.state().failures.insert(operation.to_string());
        self
    }

    /// Profile inserts succeed but return no row.
    pub fn with_empty_profile_insert(&self) -> &Self {
        self.state().empty_profile_insert = true;
        self
    }

    /// Sign-up succeeds but returns no user.
    pub fn with_null_sign_up(&self) -> &Self {
        self.state().null_sign_up = true;
        self
    }

    // ─── Seeding ───────────────────────────────────────────────────────────

    /// Create an auth identity without logging a call.
    pub fn register_user(&self, email: &str, password: &str) -> AuthUser {
        self.state().account(email, password)
    }

    /// Issue an access token for a registered identity.
    pub fn issue_token(&self, email: &str) -> String {
        self.state().issue_session(email)
    }

    /// Insert a mirrored profile for `email`.
    pub fn add_profile(&self, email: &str) -> Profile {
        let mut state = self.state();
        let auth_id = state.accounts.get(email).map(|(u, _)| u.id);
        let profile = Profile {
            id: state.next_id(),
            username: derive_username(email),
            email: email.to_string(),
            auth_id,
            provider: Some(AuthMethod::Email),
        };
        state.profiles.push(profile.clone());
        profile
    }

    pub fn add_room(&self, name: &str, created_by: RowId) -> Room {
        let mut state = self.state();
        let room = Room {
            id: state.next_id(),
            name: name.to_string(),
            created_by,
            created_at: None,
        };
        state.rooms.push(room.clone());
        room
    }

    pub fn add_tag(&self, name: &str) -> Tag {
        let mut state = self.state();
        let tag = Tag {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.tags.push(tag.clone());
        tag
    }

    /// Accept `code` in a later code exchange, resolving to `email`.
    pub fn add_oauth_code(&self, code: &str, email: &str) {
        let mut state = self.state();
        state.account(email, "");
        state
            .oauth_codes
            .insert(code.to_string(), email.to_string());
    }

    // ─── Inspection ────────────────────────────────────────────────────────

    pub fn profiles(&self) -> Vec<Profile> {
        self.state().profiles.clone()
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.state().rooms.clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.state().notes.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state().tags.clone()
    }

    pub fn note_tags(&self) -> Vec<NoteTag> {
        self.state().note_tags.clone()
    }

    pub fn note_files(&self) -> Vec<NoteFileRecord> {
        self.state().note_files.clone()
    }

    pub fn room_files(&self) -> Vec<RoomFileRecord> {
        self.state().room_files.clone()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }
}

#[async_trait]
impl AuthProvider for MemoryPlatform {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<AuthUser>> {
        self.enter("auth.sign_up", email)?;
        let mut state = self.state();
        if state.null_sign_up {
            return Ok(None);
        }
        if state.accounts.contains_key(email) {
            return Err(Error::Provider {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        Ok(Some(state.account(email, password)))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthTokens> {
        self.enter("auth.sign_in", email)?;
        let mut state = self.state();
        let valid = matches!(state.accounts.get(email), Some((_, stored)) if stored == password);
        if !valid {
            return Err(Error::Provider {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        Ok(state.tokens_for(email))
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            MEMORY_BASE_URL,
            provider,
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthTokens> {
        self.enter("auth.exchange_code", auth_code)?;
        if code_verifier.is_empty() {
            return Err(Error::Provider {
                status: 400,
                message: "code verifier missing".to_string(),
            });
        }
        let mut state = self.state();
        match state.oauth_codes.remove(auth_code) {
            Some(email) => Ok(state.tokens_for(&email)),
            None => Err(Error::Provider {
                status: 404,
                message: "invalid flow state, no valid flow state found".to_string(),
            }),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        self.enter("auth.get_user", "")?;
        let state = self.state();
        Ok(state
            .sessions
            .get(access_token)
            .and_then(|email| state.accounts.get(email))
            .map(|(user, _)| user.clone()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.enter("auth.sign_out", "")?;
        self.state().sessions.remove(access_token);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryPlatform {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        self.enter("users.select", email)?;
        Ok(self
            .state()
            .profiles
            .iter()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn insert(&self, profile: NewProfile) -> Result<Option<Profile>> {
        self.enter("users.insert", &profile.email)?;
        let mut state = self.state();
        if state.profiles.iter().any(|p| p.email == profile.email) {
            return Err(Error::Provider {
                status: 409,
                message: "duplicate key value violates unique constraint \"users_email_key\""
                    .to_string(),
            });
        }
        let row = Profile {
            id: state.next_id(),
            username: profile.username,
            email: profile.email,
            auth_id: Some(profile.auth_id),
            provider: Some(profile.provider),
        };
        state.profiles.push(row.clone());
        if state.empty_profile_insert {
            return Ok(None);
        }
        Ok(Some(row))
    }
}

#[async_trait]
impl RoomRepository for MemoryPlatform {
    async fn insert(&self, room: NewRoom) -> Result<Room> {
        self.enter("rooms.insert", &room.name)?;
        let mut state = self.state();
        let row = Room {
            id: state.next_id(),
            name: room.name,
            created_by: room.created_by,
            created_at: None,
        };
        state.rooms.push(row.clone());
        Ok(row)
    }

    async fn list_by_creator(&self, created_by: RowId) -> Result<Vec<Room>> {
        self.enter("rooms.select", created_by.to_string())?;
        Ok(self
            .state()
            .rooms
            .iter()
            .filter(|r| r.created_by == created_by)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NoteRepository for MemoryPlatform {
    async fn insert(&self, note: NewNote) -> Result<Note> {
        self.enter("notes.insert", &note.title)?;
        let mut state = self.state();
        let row = Note {
            id: state.next_id(),
            room_id: note.room_id,
            user_id: note.user_id,
            title: note.title,
            content: note.content,
            file_url: note.file_url,
            created_at: None,
        };
        state.notes.push(row.clone());
        Ok(row)
    }

    async fn fetch(&self, id: RowId) -> Result<Option<Note>> {
        self.enter("notes.select", id.to_string())?;
        Ok(self.state().notes.iter().find(|n| n.id == id).cloned())
    }

    async fn list_by_room(&self, room_id: RowId) -> Result<Vec<Note>> {
        self.enter("notes.select", format!("room {}", room_id))?;
        Ok(self
            .state()
            .notes
            .iter()
            .filter(|n| n.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: RowId, update: NoteUpdate) -> Result<Option<Note>> {
        self.enter("notes.update", id.to_string())?;
        let mut state = self.state();
        let Some(note) = state.notes.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            note.title = title;
        }
        if let Some(content) = update.content {
            note.content = Some(content);
        }
        Ok(Some(note.clone()))
    }
}

#[async_trait]
impl TagRepository for MemoryPlatform {
    async fn upsert_by_name(&self, names: &[String]) -> Result<Vec<Tag>> {
        self.enter("tags.upsert", names.join(","))?;
        let mut state = self.state();
        let mut rows = Vec::with_capacity(names.len());
        for name in names {
            let existing = state.tags.iter().find(|t| &t.name == name).cloned();
            let tag = match existing {
                Some(tag) => tag,
                None => {
                    let tag = Tag {
                        id: state.next_id(),
                        name: name.clone(),
                    };
                    state.tags.push(tag.clone());
                    tag
                }
            };
            rows.push(tag);
        }
        Ok(rows)
    }

    async fn link(&self, links: &[NoteTag]) -> Result<()> {
        self.enter("note_tags.insert", links.len().to_string())?;
        let mut state = self.state();
        for link in links {
            if !state.note_tags.contains(link) {
                state.note_tags.push(*link);
            }
        }
        Ok(())
    }

    async fn names_for_notes(&self, note_ids: &[RowId]) -> Result<HashMap<RowId, Vec<String>>> {
        self.enter("note_tags.select", note_ids.len().to_string())?;
        let state = self.state();
        let mut names: HashMap<RowId, Vec<String>> = HashMap::new();
        for link in state.note_tags.iter().filter(|l| note_ids.contains(&l.note_id)) {
            if let Some(tag) = state.tags.iter().find(|t| t.id == link.tag_id) {
                names.entry(link.note_id).or_default().push(tag.name.clone());
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl FileRecordRepository for MemoryPlatform {
    async fn insert_note_file(&self, record: NoteFileRecord) -> Result<NoteFileRecord> {
        self.enter("storage_buckets.insert", &record.file_path)?;
        self.state().note_files.push(record.clone());
        Ok(record)
    }

    async fn note_file(&self, note_id: RowId) -> Result<Option<NoteFileRecord>> {
        self.enter("storage_buckets.select", note_id.to_string())?;
        Ok(self
            .state()
            .note_files
            .iter()
            .find(|f| f.note_id == note_id)
            .cloned())
    }

    async fn insert_room_file(&self, record: RoomFileRecord) -> Result<RoomFileRecord> {
        self.enter("file_metadata.insert", &record.file_path)?;
        self.state().room_files.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl ObjectStore for MemoryPlatform {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        self.enter("storage.upload", format!("{}/{}", bucket, path))?;
        let mut state = self.state();
        let key = (bucket.to_string(), path.to_string());
        if state.objects.contains_key(&key) {
            return Err(Error::Provider {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        state.objects.insert(
            key,
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", MEMORY_BASE_URL, bucket, path)
    }

    async fn signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64) -> Result<String> {
        self.enter("storage.sign", format!("{}/{}", bucket, path))?;
        if !self
            .state()
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
        {
            return Err(Error::Provider {
                status: 404,
                message: "Object not found".to_string(),
            });
        }
        Ok(format!(
            "{}/storage/v1/object/sign/{}/{}?token=mem&expires_in={}",
            MEMORY_BASE_URL, bucket, path, expires_in_secs
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_issues_resolvable_token() {
        let memory = MemoryPlatform::new();
        let user = memory.register_user("ada@example.org", "pw");
        let platform = memory.platform();

        let tokens = platform
            .auth
            .sign_in_with_password("ada@example.org", "pw")
            .await
            .unwrap();
        let resolved = platform.auth.get_user(&tokens.access_token).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_wrong_password_is_client_rejection() {
        let memory = MemoryPlatform::new();
        memory.register_user("ada@example.org", "pw");
        let err = memory
            .platform()
            .auth
            .sign_in_with_password("ada@example.org", "nope")
            .await
            .unwrap_err();
        assert!(err.is_client_rejection());
    }

    #[tokio::test]
    async fn test_upsert_is_stable() {
        let memory = MemoryPlatform::new();
        let existing = memory.add_tag("a");
        let platform = memory.platform();

        let names = vec!["a".to_string(), "b".to_string()];
        let first = platform.tags.upsert_by_name(&names).await.unwrap();
        let second = platform.tags.upsert_by_name(&names).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].id, existing.id);
        assert_eq!(memory.tags().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_is_logged() {
        let memory = MemoryPlatform::new();
        memory.fail_on("notes.select");
        let result = memory.platform().notes.fetch(1).await;
        assert!(matches!(result, Err(Error::Provider { status: 500, .. })));
        assert_eq!(memory.calls_to("notes."), 1);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_session() {
        let memory = MemoryPlatform::new();
        memory.register_user("ada@example.org", "pw");
        let token = memory.issue_token("ada@example.org");
        let platform = memory.platform();

        platform.auth.sign_out(&token).await.unwrap();
        assert!(platform.auth.get_user(&token).await.unwrap().is_none());
    }
}
