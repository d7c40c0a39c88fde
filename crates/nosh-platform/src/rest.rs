//! PostgREST (`/rest/v1`) row repositories.
//!
//! One repository per table, all sharing the same [`SupabaseClient`] and the
//! service-role key. Filters are passed as query pairs (`col=eq.value`) so
//! reqwest handles the encoding.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use nosh_core::{
    logging, Error, FileRecordRepository, NewNote, NewProfile, NewRoom, Note, NoteFileRecord,
    NoteRepository, NoteTag, NoteUpdate, Profile, ProfileRepository, Result, Room,
    RoomFileRecord, RoomRepository, RowId, Tag, TagRepository,
};

use crate::client::{KeyRole, SupabaseClient};

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// Table-scoped request helpers.
#[derive(Clone)]
struct Table {
    client: SupabaseClient,
    name: &'static str,
}

impl Table {
    fn new(client: SupabaseClient, name: &'static str) -> Self {
        Self { client, name }
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client.request(
            method,
            &format!("/rest/v1/{}", self.name),
            KeyRole::Service,
            None,
        )
    }

    async fn select<T: DeserializeOwned>(
        &self,
        columns: &str,
        filters: &[(&str, String)],
        op: &'static str,
    ) -> Result<Vec<T>> {
        let req = self
            .request(Method::GET)
            .query(&[("select", columns)])
            .query(filters);
        let response = self.client.send(req, op).await?;
        let rows: Vec<T> = SupabaseClient::json(response, op).await?;
        trace!({ logging::TABLE } = self.name, rows = rows.len(), "Rows selected");
        Ok(rows)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        body: &B,
        op: &'static str,
    ) -> Result<Vec<T>> {
        let req = self
            .request(Method::POST)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        let response = self.client.send(req, op).await?;
        SupabaseClient::json(response, op).await
    }

    async fn insert_one<B: Serialize, T: DeserializeOwned>(
        &self,
        body: &B,
        op: &'static str,
    ) -> Result<T> {
        self.insert::<B, T>(body, op)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal(format!("Insert into {} returned no row", self.name)))
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// `users` table.
#[derive(Clone)]
pub struct RestProfileRepository {
    table: Table,
}

impl RestProfileRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            table: Table::new(client, "users"),
        }
    }
}

#[async_trait]
impl ProfileRepository for RestProfileRepository {
    #[instrument(skip(self, email), fields(subsystem = "rest", table = "users", op = "find_by_email"))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let rows: Vec<Profile> = self
            .table
            .select(
                "id,username,email,auth_id,provider",
                &[("email", eq(email)), ("limit", "1".to_string())],
                "users.select",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, profile), fields(subsystem = "rest", table = "users", op = "insert"))]
    async fn insert(&self, profile: NewProfile) -> Result<Option<Profile>> {
        let rows: Vec<Profile> = self.table.insert(&profile, "users.insert").await?;
        Ok(rows.into_iter().next())
    }
}

// =============================================================================
// ROOMS
// =============================================================================

/// `rooms` table.
#[derive(Clone)]
pub struct RestRoomRepository {
    table: Table,
}

impl RestRoomRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            table: Table::new(client, "rooms"),
        }
    }
}

#[async_trait]
impl RoomRepository for RestRoomRepository {
    #[instrument(skip(self, room), fields(subsystem = "rest", table = "rooms", op = "insert"))]
    async fn insert(&self, room: NewRoom) -> Result<Room> {
        self.table.insert_one(&room, "rooms.insert").await
    }

    #[instrument(skip(self), fields(subsystem = "rest", table = "rooms", op = "list_by_creator"))]
    async fn list_by_creator(&self, created_by: RowId) -> Result<Vec<Room>> {
        self.table
            .select(
                "*",
                &[("created_by", eq(created_by)), ("order", "id.asc".to_string())],
                "rooms.select",
            )
            .await
    }
}

// =============================================================================
// NOTES
// =============================================================================

/// `notes` table.
#[derive(Clone)]
pub struct RestNoteRepository {
    table: Table,
}

impl RestNoteRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            table: Table::new(client, "notes"),
        }
    }
}

#[async_trait]
impl NoteRepository for RestNoteRepository {
    #[instrument(skip(self, note), fields(subsystem = "rest", table = "notes", op = "insert"))]
    async fn insert(&self, note: NewNote) -> Result<Note> {
        self.table.insert_one(&note, "notes.insert").await
    }

    #[instrument(skip(self), fields(subsystem = "rest", table = "notes", op = "fetch"))]
    async fn fetch(&self, id: RowId) -> Result<Option<Note>> {
        let rows: Vec<Note> = self
            .table
            .select("*", &[("id", eq(id)), ("limit", "1".to_string())], "notes.select")
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self), fields(subsystem = "rest", table = "notes", op = "list_by_room"))]
    async fn list_by_room(&self, room_id: RowId) -> Result<Vec<Note>> {
        self.table
            .select(
                "*",
                &[("room_id", eq(room_id)), ("order", "id.asc".to_string())],
                "notes.select",
            )
            .await
    }

    #[instrument(skip(self, update), fields(subsystem = "rest", table = "notes", op = "update"))]
    async fn update(&self, id: RowId, update: NoteUpdate) -> Result<Option<Note>> {
        let req = self
            .table
            .request(Method::PATCH)
            .query(&[("id", eq(id))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&update);
        let response = self.table.client.send(req, "notes.update").await?;
        let rows: Vec<Note> = SupabaseClient::json(response, "notes.update").await?;
        Ok(rows.into_iter().next())
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// `tags` and `note_tags` tables.
#[derive(Clone)]
pub struct RestTagRepository {
    tags: Table,
    links: Table,
}

#[derive(Serialize)]
struct TagName<'a> {
    name: &'a str,
}

/// `note_tags` row with the tag embedded through its foreign key.
#[derive(Deserialize)]
struct LinkedTag {
    note_id: RowId,
    tags: Option<EmbeddedTag>,
}

#[derive(Deserialize)]
struct EmbeddedTag {
    name: String,
}

impl RestTagRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            tags: Table::new(client.clone(), "tags"),
            links: Table::new(client, "note_tags"),
        }
    }
}

fn in_list(ids: &[RowId]) -> String {
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({})", joined)
}

#[async_trait]
impl TagRepository for RestTagRepository {
    #[instrument(skip(self, names), fields(subsystem = "rest", table = "tags", op = "upsert", tag_count = names.len()))]
    async fn upsert_by_name(&self, names: &[String]) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let body: Vec<TagName<'_>> = names.iter().map(|name| TagName { name }).collect();
        // merge-duplicates turns the insert into an upsert, so existing rows
        // come back alongside new ones.
        let req = self
            .tags
            .request(Method::POST)
            .query(&[("on_conflict", "name")])
            .header(
                "Prefer",
                format!("resolution=merge-duplicates,{}", RETURN_REPRESENTATION),
            )
            .json(&body);
        let response = self.tags.client.send(req, "tags.upsert").await?;
        SupabaseClient::json(response, "tags.upsert").await
    }

    #[instrument(skip(self, links), fields(subsystem = "rest", table = "note_tags", op = "link"))]
    async fn link(&self, links: &[NoteTag]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        let req = self
            .links
            .request(Method::POST)
            .header("Prefer", RETURN_MINIMAL)
            .json(links);
        self.links.client.send(req, "note_tags.insert").await?;
        Ok(())
    }

    #[instrument(skip(self, note_ids), fields(subsystem = "rest", table = "note_tags", op = "names_for_notes"))]
    async fn names_for_notes(&self, note_ids: &[RowId]) -> Result<HashMap<RowId, Vec<String>>> {
        if note_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<LinkedTag> = self
            .links
            .select(
                "note_id,tags(name)",
                &[("note_id", in_list(note_ids)), ("order", "tag_id.asc".to_string())],
                "note_tags.select",
            )
            .await?;
        let mut names: HashMap<RowId, Vec<String>> = HashMap::new();
        for row in rows {
            if let Some(tag) = row.tags {
                names.entry(row.note_id).or_default().push(tag.name);
            }
        }
        Ok(names)
    }
}

// =============================================================================
// FILE RECORDS
// =============================================================================

/// `storage_buckets` and `file_metadata` tables.
#[derive(Clone)]
pub struct RestFileRecordRepository {
    note_files: Table,
    room_files: Table,
}

impl RestFileRecordRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            note_files: Table::new(client.clone(), "storage_buckets"),
            room_files: Table::new(client, "file_metadata"),
        }
    }
}

#[async_trait]
impl FileRecordRepository for RestFileRecordRepository {
    #[instrument(skip(self, record), fields(subsystem = "rest", table = "storage_buckets", op = "insert"))]
    async fn insert_note_file(&self, record: NoteFileRecord) -> Result<NoteFileRecord> {
        self.note_files
            .insert_one(&record, "storage_buckets.insert")
            .await
    }

    #[instrument(skip(self), fields(subsystem = "rest", table = "storage_buckets", op = "note_file"))]
    async fn note_file(&self, note_id: RowId) -> Result<Option<NoteFileRecord>> {
        let rows: Vec<NoteFileRecord> = self
            .note_files
            .select(
                "note_id,file_type,file_url,file_path",
                &[("note_id", eq(note_id)), ("limit", "1".to_string())],
                "storage_buckets.select",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, record), fields(subsystem = "rest", table = "file_metadata", op = "insert"))]
    async fn insert_room_file(&self, record: RoomFileRecord) -> Result<RoomFileRecord> {
        self.room_files
            .insert_one(&record, "file_metadata.insert")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq(7), "eq.7");
        assert_eq!(eq("ada@example.org"), "eq.ada@example.org");
    }

    #[test]
    fn test_in_list() {
        assert_eq!(in_list(&[1, 2, 3]), "in.(1,2,3)");
    }

    #[test]
    fn test_linked_tag_parses_embedded_resource() {
        let row: LinkedTag =
            serde_json::from_str(r#"{"note_id": 4, "tags": {"name": "math"}}"#).unwrap();
        assert_eq!(row.note_id, 4);
        assert_eq!(row.tags.map(|t| t.name).as_deref(), Some("math"));
    }
}
