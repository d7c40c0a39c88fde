//! # nosh-core
//!
//! Core types, traits, and request pipelines for the NOsh backend.
//!
//! NOsh keeps no state of its own: users, rooms, notes, tags and files all
//! live on an external backend-as-a-service platform. This crate defines the
//! contract the rest of the workspace programs against:
//!
//! - [`traits`]: the auth provider, row repositories and object store that a
//!   platform implementation must supply, bundled as [`Platform`].
//! - [`models`]: rows and identities exchanged with the platform.
//! - [`pipeline`]: the multi-step note creation flow, reporting which step
//!   failed instead of rolling back.
//! - [`files`]: MIME classification, storage path derivation and the room
//!   file upload flow.

pub mod accounts;
pub mod error;
pub mod files;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use accounts::{derive_username, hash_password, validate_credentials};
pub use error::{Error, Result};
pub use files::{
    classify_content_type, extension_for_mime, note_storage_path, parse_room_id, room_storage_path,
    sanitize_filename, store_room_file, FileUpload, NOTE_FILES_BUCKET, ROOM_FILES_BUCKET,
};
pub use models::*;
pub use pipeline::{NoteDraft, NotePipeline, NoteStep};
pub use tags::parse_tag_list;
pub use traits::*;
