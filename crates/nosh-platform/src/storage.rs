//! Storage (`/storage/v1`) implementation of [`ObjectStore`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use nosh_core::{Error, ObjectStore, Result};

use crate::client::{encode_path, KeyRole, SupabaseClient};

/// Supabase object storage, accessed with the service-role key.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: SupabaseClient,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn object_endpoint(kind: &str, bucket: &str, path: &str) -> String {
        format!(
            "/storage/v1/object{}/{}/{}",
            kind,
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    #[instrument(skip(self, data), fields(subsystem = "storage", op = "upload", size_bytes = data.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let req = self
            .client
            .request(
                Method::POST,
                &Self::object_endpoint("", bucket, path),
                KeyRole::Service,
                None,
            )
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data);
        self.client.send(req, "storage.upload").await?;
        info!("Object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.client
            .url(&Self::object_endpoint("/public", bucket, path))
    }

    #[instrument(skip(self), fields(subsystem = "storage", op = "signed_url"))]
    async fn signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64) -> Result<String> {
        let req = self
            .client
            .request(
                Method::POST,
                &Self::object_endpoint("/sign", bucket, path),
                KeyRole::Service,
                None,
            )
            .json(&json!({ "expiresIn": expires_in_secs }));
        let response = self.client.send(req, "storage.sign").await?;
        let body: SignedUrlResponse = SupabaseClient::json(response, "storage.sign").await?;
        if body.signed_url.is_empty() {
            return Err(Error::Internal("Storage returned an empty signed URL".to_string()));
        }
        // The returned path is relative to the storage API root.
        Ok(self.client.url(&format!("/storage/v1{}", body.signed_url)))
    }
}
