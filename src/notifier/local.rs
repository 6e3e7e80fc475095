use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::{codec::SessionRecord, error::SessionError, model::InviteCode};

use super::{ChangeNotifier, SessionUpdated, Subscription, UpdateCallback};

type ChannelMap = HashMap<InviteCode, broadcast::Sender<SessionUpdated>>;
type Channels = Arc<Mutex<ChannelMap>>;

fn lock(channels: &Channels) -> MutexGuard<'_, ChannelMap> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process fan-out of change events, one broadcast channel per code.
/// A code's channel lives exactly as long as some [`Watch`] on it.
#[derive(Clone)]
pub struct Notifier {
    channels: Channels,
    capacity: usize,
}

/// One receiver on a code's channel.
pub struct Watch {
    code: InviteCode,
    rx: broadcast::Receiver<SessionUpdated>,
    channels: Channels,
}

impl Watch {
    pub async fn recv(&mut self) -> Result<SessionUpdated, RecvError> {
        self.rx.recv().await
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        let mut channels = lock(&self.channels);
        // `self.rx` is still counted here
        let last = channels
            .get(&self.code)
            .is_some_and(|tx| tx.receiver_count() <= 1);
        if last {
            channels.remove(&self.code);
            debug!(code = %self.code, "channel closed");
        }
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    pub fn watch(&self, code: &InviteCode) -> Watch {
        let rx = lock(&self.channels)
            .entry(code.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        Watch {
            code: code.clone(),
            rx,
            channels: Arc::clone(&self.channels),
        }
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, record: SessionRecord) -> usize {
        let channels = lock(&self.channels);
        let code = record.code.clone();
        let Some(tx) = channels.get(&code) else {
            return 0;
        };

        let reached = tx.send(SessionUpdated { record }).unwrap_or(0);
        debug!(%code, subscribers = reached, "published update");
        reached
    }

    pub fn subscriber_count(&self, code: &InviteCode) -> usize {
        lock(&self.channels)
            .get(code)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Codes with at least one live watch.
    pub fn channel_count(&self) -> usize {
        lock(&self.channels).len()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl ChangeNotifier for Notifier {
    async fn subscribe(
        &self,
        code: &InviteCode,
        mut on_update: UpdateCallback,
    ) -> Result<Subscription, SessionError> {
        let mut watch = self.watch(code);

        let task = tokio::spawn(async move {
            loop {
                match watch.recv().await {
                    Ok(event) => on_update(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(code = %watch.code, skipped, "subscriber lagged behind updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(code.clone(), task))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn record(code: &InviteCode, tasks: serde_json::Value) -> SessionRecord {
        SessionRecord {
            code: code.clone(),
            users: json!("[]"),
            tasks,
        }
    }

    #[tokio::test]
    async fn delivers_only_matching_codes() {
        let notifier = Notifier::new(8);
        let mine = InviteCode::parse("MINE").unwrap();
        let other = InviteCode::parse("OTHER").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = notifier
            .subscribe(&mine, Box::new(move |event: SessionUpdated| {
                let _ = tx.send(event);
            }))
            .await
            .unwrap();

        assert_eq!(notifier.publish(record(&other, json!("[]"))), 0);
        assert_eq!(notifier.publish(record(&mine, json!("[1]"))), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.record.code, mine);
        assert_eq!(event.record.tasks, json!("[1]"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_the_subscription_stops_delivery() {
        let notifier = Notifier::new(8);
        let code = InviteCode::parse("EMBER").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = notifier
            .subscribe(&code, Box::new(move |event: SessionUpdated| {
                let _ = tx.send(event);
            }))
            .await
            .unwrap();
        assert_eq!(notifier.subscriber_count(&code), 1);

        sub.unsubscribe();
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(notifier.publish(record(&code, json!("[]"))), 0);
        assert_eq!(notifier.subscriber_count(&code), 0);
        assert_eq!(notifier.channel_count(), 0);
        let late = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(late, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn channel_goes_with_its_last_watch() {
        let notifier = Notifier::new(8);
        let code = InviteCode::parse("EMBER").unwrap();

        let first = notifier.watch(&code);
        let mut second = notifier.watch(&code);
        assert_eq!(notifier.channel_count(), 1);

        drop(first);
        assert_eq!(notifier.channel_count(), 1);
        assert_eq!(notifier.publish(record(&code, json!("[]"))), 1);
        assert!(second.recv().await.is_ok());

        drop(second);
        assert_eq!(notifier.channel_count(), 0);

        for n in 0..50 {
            drop(notifier.watch(&InviteCode::parse(&format!("GHOST{n}")).unwrap()));
        }
        assert_eq!(notifier.channel_count(), 0);
    }
}
