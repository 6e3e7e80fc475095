mod http;
mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::{
    error::SessionError,
    model::{InviteCode, Session, SessionPatch},
};

pub use http::HttpSessionStore;
pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Where campfires live. Every call is a single remote round trip and is
/// never retried.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with [`SessionError::DuplicateCode`] rather than overwrite.
    async fn create_session(&self, session: &Session) -> Result<(), SessionError>;

    async fn get_session(&self, code: &InviteCode) -> Result<Session, SessionError>;

    /// Replaces each list present in `patch` as a whole.
    async fn update_session(
        &self,
        code: &InviteCode,
        patch: SessionPatch,
    ) -> Result<(), SessionError>;

    /// Deleting a code that does not exist is not an error.
    async fn delete_session(&self, code: &InviteCode) -> Result<(), SessionError>;
}
