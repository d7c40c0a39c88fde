//! Error types for NOsh.

use thiserror::Error;

use crate::pipeline::NoteStep;

/// Result type alias using NOsh's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for NOsh operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing, invalid or expired session credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Malformed input or credentials rejected by the provider
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Uploaded content is not a pdf, docx or image
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// No matching row for a lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// A step of the note creation pipeline failed; earlier steps are not undone
    #[error("Upload failed at {step}: {message}")]
    Pipeline { step: NoteStep, message: String },

    /// The external platform answered with a non-success status
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// HTTP/network request to the platform failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the platform rejected the request as a client error (4xx).
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, Error::Provider { status, .. } if (400..500).contains(status))
    }

    /// The message without the variant prefix, used for response bodies.
    pub fn detail(&self) -> String {
        match self {
            Error::Unauthenticated(msg)
            | Error::BadRequest(msg)
            | Error::NotFound(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::Provider { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unauthenticated() {
        let err = Error::Unauthenticated("Not logged in".to_string());
        assert_eq!(err.to_string(), "Unauthenticated: Not logged in");
    }

    #[test]
    fn test_error_display_pipeline_names_step() {
        let err = Error::Pipeline {
            step: NoteStep::UpsertTags,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "Upload failed at upsert_tags: duplicate key");
    }

    #[test]
    fn test_detail_strips_prefix() {
        let err = Error::NotFound("Note not found".to_string());
        assert_eq!(err.detail(), "Note not found");
    }

    #[test]
    fn test_detail_keeps_pipeline_context() {
        let err = Error::Pipeline {
            step: NoteStep::InsertNote,
            message: "boom".to_string(),
        };
        assert_eq!(err.detail(), "Upload failed at insert_note: boom");
    }

    #[test]
    fn test_client_rejection() {
        let rejected = Error::Provider {
            status: 400,
            message: "Invalid login credentials".to_string(),
        };
        let outage = Error::Provider {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(rejected.is_client_rejection());
        assert!(!outage.is_client_rejection());
        assert!(!Error::Request("timeout".to_string()).is_client_rejection());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
