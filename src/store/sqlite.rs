use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::{
    codec::{SessionRecord, encode_list},
    error::SessionError,
    model::{InviteCode, Session, SessionPatch},
    notifier::Notifier,
};

use super::SessionStore;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS campfire_sessions (
    code TEXT PRIMARY KEY NOT NULL,
    users TEXT NOT NULL,
    tasks TEXT NOT NULL
)";

/// `campfire_sessions` table. Publishes every applied update.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db_pool: SqlitePool,
    notifier: Notifier,
}

fn unavailable(err: sqlx::Error) -> SessionError {
    SessionError::Unavailable(err.to_string())
}

fn write_failed(err: sqlx::Error) -> SessionError {
    SessionError::RemoteWriteFailed(err.to_string())
}

impl SqliteSessionStore {
    pub fn new(db_pool: SqlitePool, notifier: Notifier) -> Self {
        Self { db_pool, notifier }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&self.db_pool).await?;
        info!("campfire_sessions table ready");
        Ok(())
    }

    async fn fetch_record(&self, code: &InviteCode) -> Result<Option<SessionRecord>, sqlx::Error> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT users,tasks FROM campfire_sessions WHERE code=?")
                .bind(code.as_str())
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(|(users, tasks)| SessionRecord {
            code: code.clone(),
            users: Value::String(users),
            tasks: Value::String(tasks),
        }))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), SessionError> {
        let inserted = sqlx::query(
            "INSERT INTO campfire_sessions (code,users,tasks) VALUES (?,?,?) ON CONFLICT(code) DO NOTHING",
        )
        .bind(session.code.as_str())
        .bind(encode_list(&session.users)?)
        .bind(encode_list(&session.tasks)?)
        .execute(&self.db_pool)
        .await
        .map_err(unavailable)?;

        if inserted.rows_affected() == 0 {
            return Err(SessionError::DuplicateCode(session.code.clone()));
        }
        info!(code = %session.code, "campfire lit");
        Ok(())
    }

    async fn get_session(&self, code: &InviteCode) -> Result<Session, SessionError> {
        self.fetch_record(code)
            .await
            .map_err(unavailable)?
            .map(|record| record.decode_lenient())
            .ok_or_else(|| SessionError::not_found(code.as_str()))
    }

    async fn update_session(
        &self,
        code: &InviteCode,
        patch: SessionPatch,
    ) -> Result<(), SessionError> {
        let users = patch.users.as_deref().map(encode_list).transpose()?;
        let tasks = patch.tasks.as_deref().map(encode_list).transpose()?;

        let updated = sqlx::query(
            "UPDATE campfire_sessions SET users=COALESCE(?,users), tasks=COALESCE(?,tasks) WHERE code=?",
        )
        .bind(users)
        .bind(tasks)
        .bind(code.as_str())
        .execute(&self.db_pool)
        .await
        .map_err(write_failed)?;

        if updated.rows_affected() == 0 {
            return Err(SessionError::not_found(code.as_str()));
        }
        debug!(%code, "campfire updated");

        // the row may already be gone again if a peer ended the campfire
        if let Some(record) = self.fetch_record(code).await.map_err(write_failed)? {
            self.notifier.publish(record);
        }
        Ok(())
    }

    async fn delete_session(&self, code: &InviteCode) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM campfire_sessions WHERE code=?")
            .bind(code.as_str())
            .execute(&self.db_pool)
            .await
            .map_err(write_failed)?;

        info!(%code, "campfire put out");
        Ok(())
    }
}
