use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::{
    codec::SessionRecord,
    error::SessionError,
    model::{InviteCode, Session, SessionPatch},
};

use super::SessionStore;

/// Talks to a campfire backend's `/sessions` API.
#[derive(Clone)]
pub struct HttpSessionStore {
    base_url: String,
    http_client: Client,
}

impl HttpSessionStore {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http_client,
        }
    }

    fn url(&self, code: Option<&InviteCode>) -> String {
        match code {
            Some(code) => format!("{}/sessions/{code}", self.base_url),
            None => format!("{}/sessions", self.base_url),
        }
    }
}

async fn describe(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{status}: {body}")
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), SessionError> {
        let response = self
            .http_client
            .post(self.url(None))
            .json(&SessionRecord::encode(session)?)
            .send()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::CONFLICT => Err(SessionError::DuplicateCode(session.code.clone())),
            s if s.is_success() => Ok(()),
            _ => Err(SessionError::Unavailable(describe(response).await)),
        }
    }

    async fn get_session(&self, code: &InviteCode) -> Result<Session, SessionError> {
        let response = self
            .http_client
            .get(self.url(Some(code)))
            .send()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SessionError::not_found(code.as_str())),
            s if s.is_success() => {
                let record: SessionRecord = response
                    .json()
                    .await
                    .map_err(|e| SessionError::MalformedRecord(e.to_string()))?;
                Ok(record.decode_lenient())
            }
            _ => Err(SessionError::Unavailable(describe(response).await)),
        }
    }

    async fn update_session(
        &self,
        code: &InviteCode,
        patch: SessionPatch,
    ) -> Result<(), SessionError> {
        let response = self
            .http_client
            .patch(self.url(Some(code)))
            .json(&patch)
            .send()
            .await
            .map_err(|e| SessionError::RemoteWriteFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SessionError::not_found(code.as_str())),
            s if s.is_success() => Ok(()),
            _ => Err(SessionError::RemoteWriteFailed(describe(response).await)),
        }
    }

    async fn delete_session(&self, code: &InviteCode) -> Result<(), SessionError> {
        let response = self
            .http_client
            .delete(self.url(Some(code)))
            .send()
            .await
            .map_err(|e| SessionError::RemoteWriteFailed(e.to_string()))?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(SessionError::RemoteWriteFailed(describe(response).await))
        }
    }
}
