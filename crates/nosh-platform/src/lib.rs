//! # nosh-platform
//!
//! Supabase implementation of the `nosh-core` traits:
//!
//! - [`auth`]: GoTrue sign-up, password and PKCE token grants, user lookup
//! - [`rest`]: PostgREST repositories, one per table
//! - [`storage`]: object upload, public and signed URLs
//!
//! [`connect`] builds one HTTP client and wires every service onto it.
//! With the `mock` feature, [`memory::MemoryPlatform`] provides the same
//! [`Platform`] backed by in-process collections.

pub mod auth;
pub mod client;
pub mod rest;
pub mod storage;

#[cfg(any(test, feature = "mock"))]
pub mod memory;

use std::sync::Arc;

use tracing::info;

use nosh_core::{logging, Platform, Result};

pub use auth::SupabaseAuth;
pub use client::{SupabaseClient, SupabaseConfig, DEFAULT_TIMEOUT_SECS};
pub use rest::{
    RestFileRecordRepository, RestNoteRepository, RestProfileRepository, RestRoomRepository,
    RestTagRepository,
};
pub use storage::SupabaseStorage;

/// Build the Supabase-backed [`Platform`].
pub fn connect(config: SupabaseConfig) -> Result<Platform> {
    let client = SupabaseClient::new(config)?;
    info!(
        { logging::SUBSYSTEM } = "platform",
        url = %client.config().url,
        timeout_secs = client.config().timeout_seconds,
        "Supabase client initialized"
    );
    Ok(Platform {
        auth: Arc::new(SupabaseAuth::new(client.clone())),
        profiles: Arc::new(RestProfileRepository::new(client.clone())),
        rooms: Arc::new(RestRoomRepository::new(client.clone())),
        notes: Arc::new(RestNoteRepository::new(client.clone())),
        tags: Arc::new(RestTagRepository::new(client.clone())),
        files: Arc::new(RestFileRecordRepository::new(client.clone())),
        storage: Arc::new(SupabaseStorage::new(client)),
    })
}
