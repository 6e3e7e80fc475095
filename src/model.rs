use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Characters a generated invite code is drawn from. `0`, `O`, `1` and `I`
/// are left out since codes get read aloud and typed by hand.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;
const MAX_CODE_LEN: usize = 32;

/// Short human-shareable name of a campfire. Always upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode(String);

impl InviteCode {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalizes a code the way users type it: surrounding whitespace is
    /// dropped and letters are upper-cased.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty()
            || code.len() > MAX_CODE_LEN
            || !code.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(SessionError::not_found(raw.trim()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InviteCode {
    type Error = SessionError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub email: String,
}

impl Participant {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    pub completed: bool,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }
}

/// A campfire as the rest of the crate sees it: lists already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub code: InviteCode,
    pub users: Vec<Participant>,
    pub tasks: Vec<Task>,
}

impl Session {
    pub fn new(code: InviteCode, host: Participant) -> Self {
        Self {
            code,
            users: vec![host],
            tasks: Vec::new(),
        }
    }

    pub fn has_member(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email == email)
    }
}

/// Fields to replace on an existing session. Each present field overwrites
/// the stored list as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<Participant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

impl SessionPatch {
    pub fn users(users: Vec<Participant>) -> Self {
        Self {
            users: Some(users),
            tasks: None,
        }
    }

    pub fn tasks(tasks: Vec<Task>) -> Self {
        Self {
            users: None,
            tasks: Some(tasks),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_none() && self.tasks.is_none()
    }
}
