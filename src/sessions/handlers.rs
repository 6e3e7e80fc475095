use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    AppResult, AppState,
    codec::{SessionRecord, decode_list},
    error::SessionError,
    model::{InviteCode, SessionPatch},
    store::SessionStore,
};

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateBody {
    users: Option<Value>,
    tasks: Option<Value>,
}

impl UpdateBody {
    fn decode(&self) -> Result<SessionPatch, SessionError> {
        let patch = SessionPatch {
            users: self.users.as_ref().map(decode_list).transpose()?,
            tasks: self.tasks.as_ref().map(decode_list).transpose()?,
        };
        if patch.is_empty() {
            return Err(SessionError::MalformedRecord("nothing to update".into()));
        }
        Ok(patch)
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(store): State<Arc<dyn SessionStore>>,
    Json(record): Json<SessionRecord>,
) -> AppResult<Response> {
    let session = record.decode()?;
    store.create_session(&session).await?;

    Ok((StatusCode::CREATED, Json(session)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn fetch(
    State(store): State<Arc<dyn SessionStore>>,
    Path(code): Path<String>,
) -> AppResult<Response> {
    let code = InviteCode::parse(&code)?;
    let session = store.get_session(&code).await?;

    Ok(Json(session).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(store): State<Arc<dyn SessionStore>>,
    Path(code): Path<String>,
    Json(body): Json<UpdateBody>,
) -> AppResult<Response> {
    let code = InviteCode::parse(&code)?;
    store.update_session(&code, body.decode()?).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(store): State<Arc<dyn SessionStore>>,
    Path(code): Path<String>,
) -> AppResult<Response> {
    let code = InviteCode::parse(&code)?;
    store.delete_session(&code).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
