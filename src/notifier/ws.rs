use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::{error::SessionError, model::InviteCode};

use super::{ChangeNotifier, SessionUpdated, Subscription, UpdateCallback};

/// Receives change events from a remote backend over `/sessions/{code}/ws`.
pub struct WsChangeNotifier {
    ws_base: String,
}

impl WsChangeNotifier {
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_owned()
        };
        Self { ws_base }
    }

    pub fn url_for(&self, code: &InviteCode) -> String {
        format!("{}/sessions/{code}/ws", self.ws_base)
    }
}

#[async_trait]
impl ChangeNotifier for WsChangeNotifier {
    async fn subscribe(
        &self,
        code: &InviteCode,
        mut on_update: UpdateCallback,
    ) -> Result<Subscription, SessionError> {
        let url = self.url_for(code);
        let (mut stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::Unavailable(format!("{url}: {e}")))?;

        let watched = code.clone();
        let task = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<SessionUpdated>(text.as_str()) {
                            Ok(event) => on_update(event),
                            Err(e) => warn!(code = %watched, "skipping unreadable update: {e}"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(code = %watched, "update stream failed: {e}");
                        break;
                    }
                }
            }
            debug!(code = %watched, "update stream closed");
        });

        Ok(Subscription::new(code.clone(), task))
    }
}
