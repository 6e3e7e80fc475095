//! Serialization boundary between the stored record and [`Session`].
//!
//! Lists are written as JSON text. Readers accept that text, an already
//! structured array, or nothing at all, since rows written by older clients
//! carry either form.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

use crate::{
    error::SessionError,
    model::{InviteCode, Participant, Session, Task},
};

/// A session row exactly as stored or pushed, lists not yet decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub code: InviteCode,
    #[serde(default)]
    pub users: Value,
    #[serde(default)]
    pub tasks: Value,
}

impl SessionRecord {
    pub fn encode(session: &Session) -> Result<Self, SessionError> {
        Ok(Self {
            code: session.code.clone(),
            users: Value::String(encode_list(&session.users)?),
            tasks: Value::String(encode_list(&session.tasks)?),
        })
    }

    /// Strict decode, for input that can still be rejected.
    pub fn decode(&self) -> Result<Session, SessionError> {
        Ok(Session {
            code: self.code.clone(),
            users: decode_list(&self.users)?,
            tasks: decode_list(&self.tasks)?,
        })
    }

    /// Decode for data already persisted: a malformed list reads as empty.
    pub fn decode_lenient(&self) -> Session {
        Session {
            code: self.code.clone(),
            users: decode_list_lenient::<Participant>(&self.users, &self.code, "users"),
            tasks: decode_list_lenient::<Task>(&self.tasks, &self.code, "tasks"),
        }
    }
}

pub fn encode_list<T: Serialize>(items: &[T]) -> Result<String, SessionError> {
    serde_json::to_string(items).map_err(|e| SessionError::MalformedRecord(e.to_string()))
}

pub fn decode_list<T: DeserializeOwned>(value: &Value) -> Result<Vec<T>, SessionError> {
    let parsed = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(text) => serde_json::from_str(text),
        Value::Array(_) => Vec::<T>::deserialize(value),
        other => {
            return Err(SessionError::MalformedRecord(format!(
                "expected a list, got {other}"
            )));
        }
    };
    parsed.map_err(|e| SessionError::MalformedRecord(e.to_string()))
}

pub fn decode_list_lenient<T: DeserializeOwned>(
    value: &Value,
    code: &InviteCode,
    field: &str,
) -> Vec<T> {
    decode_list(value).unwrap_or_else(|e| {
        warn!(%code, field, "treating stored list as empty: {e}");
        Vec::new()
    })
}
