use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State, WebSocketUpgrade, ws::Message},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{AppResult, AppState, model::InviteCode, notifier::Notifier, store::SessionStore};

/// Streams every update of one campfire as JSON text frames.
#[debug_handler(state = AppState)]
pub(crate) async fn session_ws(
    Path(code): Path<String>,
    State(store): State<Arc<dyn SessionStore>>,
    State(notifier): State<Notifier>,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let code = InviteCode::parse(&code)?;
    store.get_session(&code).await?;
    // subscribe before answering so no update slips past a fresh client
    let mut watch = notifier.watch(&code);

    Ok(ws.on_upgrade(move |stream| async move {
        debug!(%code, "watcher connected");
        let (mut sender, mut receiver) = stream.split();

        let watched = code.clone();
        let mut broadcast_task = tokio::spawn(async move {
            loop {
                let event = match watch.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(code = %watched, skipped, "watcher lagged behind updates");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let mut read_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                if let Message::Close(_) = msg {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut broadcast_task => read_task.abort(),
            _ = &mut read_task => broadcast_task.abort(),
        };
        debug!(%code, "watcher disconnected");
    })
    .into_response())
}
