//! HTTP handlers for nosh-api.

pub mod auth;
pub mod files;
pub mod notes;
pub mod rooms;

use axum::extract::multipart::{Field, Multipart};
use nosh_core::FileUpload;

use crate::ApiError;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Multipart form collected into text fields and at most one file.
#[derive(Debug, Default)]
pub(crate) struct FormParts {
    fields: Vec<(String, String)>,
    pub file: Option<FileUpload>,
}

impl FormParts {
    /// Drain a multipart body. A `file` part with no name and no bytes is
    /// treated as absent, which is what browsers send for an empty picker.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormParts::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let upload = read_file(field).await?;
                if !(upload.file_name.is_empty() && upload.data.is_empty()) {
                    form.file = Some(upload);
                }
            } else if !name.is_empty() {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
                form.fields.push((name, value));
            }
        }
        Ok(form)
    }

    /// First value of a text field, trimmed; empty counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First value of a free-text field exactly as sent; whitespace-only
    /// counts as absent.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
    }
}

async fn read_file(field: Field<'_>) -> Result<FileUpload, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
    Ok(FileUpload {
        file_name,
        content_type,
        data,
    })
}
