use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    codec::{SessionRecord, encode_list},
    error::SessionError,
    model::{InviteCode, Session, SessionPatch},
    notifier::Notifier,
};

use super::SessionStore;

/// Keeps encoded records in memory. Used by tests and single-process setups.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<InviteCode, SessionRecord>>,
    notifier: Notifier,
}

impl MemorySessionStore {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            records: Mutex::default(),
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Writes a raw record, bypassing encoding.
    pub async fn put_raw(&self, record: SessionRecord) {
        self.records.lock().await.insert(record.code.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), SessionError> {
        let record = SessionRecord::encode(session)?;
        let mut records = self.records.lock().await;
        if records.contains_key(&session.code) {
            return Err(SessionError::DuplicateCode(session.code.clone()));
        }
        records.insert(session.code.clone(), record);
        Ok(())
    }

    async fn get_session(&self, code: &InviteCode) -> Result<Session, SessionError> {
        let records = self.records.lock().await;
        records
            .get(code)
            .map(SessionRecord::decode_lenient)
            .ok_or_else(|| SessionError::not_found(code.as_str()))
    }

    async fn update_session(
        &self,
        code: &InviteCode,
        patch: SessionPatch,
    ) -> Result<(), SessionError> {
        let updated = {
            let mut records = self.records.lock().await;
            let record = records
                .get_mut(code)
                .ok_or_else(|| SessionError::not_found(code.as_str()))?;
            if let Some(users) = &patch.users {
                record.users = Value::String(encode_list(users)?);
            }
            if let Some(tasks) = &patch.tasks {
                record.tasks = Value::String(encode_list(tasks)?);
            }
            record.clone()
        };
        self.notifier.publish(updated);
        Ok(())
    }

    async fn delete_session(&self, code: &InviteCode) -> Result<(), SessionError> {
        self.records.lock().await.remove(code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Participant, Task};

    use super::*;

    fn ember() -> Session {
        Session::new(
            InviteCode::parse("EMBER").unwrap(),
            Participant::new("Ash", "ash@example.com"),
        )
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = MemorySessionStore::default();
        let session = ember();
        store.create_session(&session).await.unwrap();

        let fetched = store.get_session(&session.code).await.unwrap();
        assert_eq!(fetched.users, vec![Participant::new("Ash", "ash@example.com")]);
        assert!(fetched.tasks.is_empty());
    }

    #[tokio::test]
    async fn create_never_overwrites() {
        let store = MemorySessionStore::default();
        let session = ember();
        store.create_session(&session).await.unwrap();
        store
            .update_session(&session.code, SessionPatch::tasks(vec![Task::new("wood")]))
            .await
            .unwrap();

        let err = store.create_session(&session).await.unwrap_err();
        assert_eq!(err, SessionError::DuplicateCode(session.code.clone()));
        assert_eq!(store.get_session(&session.code).await.unwrap().tasks.len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_only_given_list() {
        let store = MemorySessionStore::default();
        let session = ember();
        store.create_session(&session).await.unwrap();

        let tasks = vec![Task::new("a"), Task::new("b")];
        store
            .update_session(&session.code, SessionPatch::tasks(tasks.clone()))
            .await
            .unwrap();

        let fetched = store.get_session(&session.code).await.unwrap();
        assert_eq!(fetched.tasks, tasks);
        assert_eq!(fetched.users, session.users);
    }

    #[tokio::test]
    async fn missing_codes() {
        let store = MemorySessionStore::default();
        let code = InviteCode::parse("NOPE").unwrap();
        assert!(matches!(store.get_session(&code).await, Err(SessionError::NotFound(_))));
        assert!(matches!(
            store.update_session(&code, SessionPatch::tasks(vec![])).await,
            Err(SessionError::NotFound(_))
        ));
        store.delete_session(&code).await.unwrap();
    }

    #[tokio::test]
    async fn structured_rows_still_read() {
        let store = MemorySessionStore::default();
        let code = InviteCode::parse("OLDROW").unwrap();
        store
            .put_raw(SessionRecord {
                code: code.clone(),
                users: serde_json::json!([{ "name": "Ash", "email": "ash@example.com" }]),
                tasks: Value::Bool(true),
            })
            .await;

        let fetched = store.get_session(&code).await.unwrap();
        assert_eq!(fetched.users.len(), 1);
        assert!(fetched.tasks.is_empty());
    }
}
