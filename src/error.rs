use axum::http::StatusCode;
use thiserror::Error;

use crate::model::InviteCode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("campfire {0} already exists")]
    DuplicateCode(InviteCode),

    #[error("Invalid code: {0}")]
    NotFound(String),

    #[error("remote write failed: {0}")]
    RemoteWriteFailed(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("a campfire is already in progress")]
    AlreadyActive,
}

impl SessionError {
    pub fn not_found(code: impl Into<String>) -> Self {
        Self::NotFound(code.into())
    }

    pub fn status(&self) -> StatusCode {
        use SessionError::*;
        match self {
            DuplicateCode(_) => StatusCode::CONFLICT,
            NotFound(_) => StatusCode::NOT_FOUND,
            MalformedRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RemoteWriteFailed(_) | Unavailable(_) => StatusCode::BAD_GATEWAY,
            AlreadyActive => StatusCode::CONFLICT,
        }
    }
}
