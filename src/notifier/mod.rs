mod local;
mod ws;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::{codec::SessionRecord, error::SessionError, model::InviteCode};

pub use local::{Notifier, Watch};
pub use ws::WsChangeNotifier;

/// Pushed to every subscriber of a code after its record is updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdated {
    pub record: SessionRecord,
}

pub type UpdateCallback = Box<dyn FnMut(SessionUpdated) + Send + 'static>;

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn subscribe(
        &self,
        code: &InviteCode,
        on_update: UpdateCallback,
    ) -> Result<Subscription, SessionError>;
}

/// Live registration for one code. Delivery stops when this is dropped.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    code: InviteCode,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(code: InviteCode, task: JoinHandle<()>) -> Self {
        let id = Uuid::now_v7();
        debug!(%id, %code, "subscribed");
        Self { id, code, task }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn code(&self) -> &InviteCode {
        &self.code
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(id = %self.id, code = %self.code, "unsubscribed");
    }
}
