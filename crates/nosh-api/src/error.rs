//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use nosh_core::logging;

/// Error returned by handlers; rendered as `{"detail": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Provider rejections (4xx) become BadRequest; anything else maps as usual.
    pub fn rejected_by_provider(err: nosh_core::Error) -> Self {
        if err.is_client_rejection() {
            ApiError::BadRequest(err.detail())
        } else {
            err.into()
        }
    }
}

impl From<nosh_core::Error> for ApiError {
    fn from(err: nosh_core::Error) -> Self {
        use nosh_core::Error;
        match err {
            Error::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            Error::BadRequest(msg) => ApiError::BadRequest(msg),
            Error::UnsupportedFileType(_) => ApiError::BadRequest(err.to_string()),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.detail()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Unauthorized(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg) => msg,
        };
        if status.is_server_error() {
            error!(
                { logging::STATUS } = status.as_u16(),
                { logging::ERROR_MSG } = %message,
                "Request failed"
            );
        }

        (status, Json(serde_json::json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosh_core::{Error, NoteStep};

    #[test]
    fn test_core_error_mapping() {
        let cases = [
            (Error::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (Error::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (Error::UnsupportedFileType("x".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Request("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                Error::Provider { status: 400, message: "x".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_pipeline_error_keeps_step_in_detail() {
        let api: ApiError = Error::Pipeline {
            step: NoteStep::LinkTags,
            message: "fk violation".into(),
        }
        .into();
        match api {
            ApiError::Internal(msg) => assert_eq!(msg, "Upload failed at link_tags: fk violation"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejected_by_provider() {
        let rejected = ApiError::rejected_by_provider(Error::Provider {
            status: 400,
            message: "Invalid login credentials".into(),
        });
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let outage = ApiError::rejected_by_provider(Error::Request("timed out".into()));
        assert_eq!(outage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
