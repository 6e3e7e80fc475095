//! Client side of a campfire.
//!
//! A [`SessionClient`] owns the local copy of one session. Task edits are
//! applied locally first and written back as a whole list in the
//! background, one at a time and in edit order; pushed updates replace the
//! local copy wholesale. Two clients
//! editing the same list at once can therefore lose one of the edits: the
//! last full list to reach the store wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    codec::SessionRecord,
    error::SessionError,
    model::{InviteCode, Participant, Session, SessionPatch, Task},
    notifier::{ChangeNotifier, SessionUpdated, Subscription},
    store::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    #[default]
    NoSession,
    Creating,
    Joining,
    Active,
    Errored,
    Ended,
}

impl ClientState {
    /// Whether a new campfire can be started or joined from here.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::NoSession | Self::Errored | Self::Ended)
    }
}

/// Read-only copy of what the client currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    pub state: ClientState,
    pub code: Option<InviteCode>,
    pub users: Vec<Participant>,
    pub tasks: Vec<Task>,
}

impl SessionSnapshot {
    pub fn host(&self) -> Option<&Participant> {
        self.users.first()
    }

    pub fn guest(&self) -> Option<&Participant> {
        self.users.get(1)
    }

    /// Any finished task makes the fire burn faster.
    pub fn is_blazing(&self) -> bool {
        self.tasks.iter().any(|t| t.completed)
    }
}

type View = SessionSnapshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_remote(view: &Mutex<View>, record: &SessionRecord) -> bool {
    let mut view = lock(view);
    if view.code.as_ref() != Some(&record.code) {
        debug!(code = %record.code, "ignoring update for another campfire");
        return false;
    }
    let session = record.decode_lenient();
    view.users = session.users;
    view.tasks = session.tasks;
    true
}

enum Write {
    Tasks { code: InviteCode, tasks: Vec<Task> },
    Flush(oneshot::Sender<()>),
}

/// Single worker draining one client's task writes in the order they were
/// queued. Aborted with the client.
struct Writer {
    queue: mpsc::UnboundedSender<Write>,
    task: JoinHandle<()>,
}

impl Writer {
    fn spawn(store: Arc<dyn SessionStore>) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_tasks(store, rx));
        Self { queue, task }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn write_tasks(store: Arc<dyn SessionStore>, mut queue: mpsc::UnboundedReceiver<Write>) {
    while let Some(write) = queue.recv().await {
        match write {
            Write::Tasks { code, tasks } => {
                let count = tasks.len();
                match store.update_session(&code, SessionPatch::tasks(tasks)).await {
                    Ok(()) => debug!(%code, count, "tasks saved"),
                    Err(e) => warn!(%code, "tasks not saved: {e}"),
                }
            }
            Write::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

pub struct SessionClient {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn ChangeNotifier>,
    view: Arc<Mutex<View>>,
    subscription: Mutex<Option<Subscription>>,
    writer: Mutex<Option<Writer>>,
}

impl SessionClient {
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            store,
            notifier,
            view: Arc::default(),
            subscription: Mutex::default(),
            writer: Mutex::default(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.view).clone()
    }

    pub fn state(&self) -> ClientState {
        lock(&self.view).state
    }

    pub fn code(&self) -> Option<InviteCode> {
        lock(&self.view).code.clone()
    }

    /// Lights a new campfire hosted by `identity` and returns its invite code.
    pub async fn create_session(
        &self,
        display_name: &str,
        identity: &str,
    ) -> Result<InviteCode, SessionError> {
        self.begin(ClientState::Creating)?;

        let session = Session::new(
            InviteCode::generate(),
            Participant::new(display_name, identity),
        );
        if let Err(e) = self.store.create_session(&session).await {
            warn!(code = %session.code, "could not create campfire: {e}");
            return Err(self.fail(e));
        }

        let code = session.code.clone();
        self.activate(session).await?;
        info!(%code, "hosting campfire");
        Ok(code)
    }

    /// Joins an existing campfire. Joining again with the same identity does
    /// not add a second entry.
    pub async fn join_session(
        &self,
        code: &str,
        display_name: &str,
        identity: &str,
    ) -> Result<(), SessionError> {
        self.begin(ClientState::Joining)?;

        let session = match self.fetch_and_enlist(code, display_name, identity).await {
            Ok(session) => session,
            Err(e) => {
                warn!(code, "could not join campfire: {e}");
                return Err(self.fail(e));
            }
        };

        let code = session.code.clone();
        self.activate(session).await?;
        info!(%code, "joined campfire");
        Ok(())
    }

    async fn fetch_and_enlist(
        &self,
        code: &str,
        display_name: &str,
        identity: &str,
    ) -> Result<Session, SessionError> {
        let code = InviteCode::parse(code)?;
        let mut session = self.store.get_session(&code).await?;

        if !session.has_member(identity) {
            session.users.push(Participant::new(display_name, identity));
            self.store
                .update_session(&code, SessionPatch::users(session.users.clone()))
                .await?;
        }
        Ok(session)
    }

    /// Adds a task locally and writes the new list in the background.
    /// Blank text is ignored, as is any call without an active campfire.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add_task(&self, text: &str) -> Option<Task> {
        if text.trim().is_empty() {
            return None;
        }

        let task = Task::new(text);
        let mut view = lock(&self.view);
        if view.state != ClientState::Active {
            return None;
        }
        let code = view.code.clone()?;
        view.tasks.push(task.clone());
        // queued while the view is held so lists leave in edit order
        self.persist_tasks(code, view.tasks.clone());
        Some(task)
    }

    /// Flips a task locally and writes the new list in the background.
    /// Returns `false` if `index` is out of range.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn toggle_task(&self, index: usize) -> bool {
        let mut view = lock(&self.view);
        if view.state != ClientState::Active {
            return false;
        }
        let Some(code) = view.code.clone() else {
            return false;
        };
        let Some(task) = view.tasks.get_mut(index) else {
            return false;
        };
        task.completed = !task.completed;
        self.persist_tasks(code, view.tasks.clone());
        true
    }

    /// Deletes the campfire for everyone and leaves it.
    pub async fn end_session(&self) {
        let code = {
            let mut view = lock(&self.view);
            let Some(code) = view.code.take() else {
                return;
            };
            *view = View {
                state: ClientState::Ended,
                ..View::default()
            };
            code
        };
        self.drop_subscription();

        if let Err(e) = self.store.delete_session(&code).await {
            warn!(%code, "could not delete campfire: {e}");
        }
        info!(%code, "campfire ended");
    }

    /// Replaces the local lists with a pushed record.
    pub fn on_remote_update(&self, record: &SessionRecord) -> bool {
        apply_remote(&self.view, record)
    }

    /// Re-reads the active campfire. If it is gone the client moves to
    /// [`ClientState::Ended`] and the `NotFound` is returned.
    pub async fn refresh(&self) -> Result<SessionSnapshot, SessionError> {
        let Some(code) = self.code() else {
            return Err(SessionError::not_found(""));
        };

        match self.store.get_session(&code).await {
            Ok(session) => {
                let mut view = lock(&self.view);
                if view.code.as_ref() == Some(&code) {
                    view.users = session.users;
                    view.tasks = session.tasks;
                }
                Ok(view.clone())
            }
            Err(e @ SessionError::NotFound(_)) => {
                info!(%code, "campfire is gone");
                {
                    let mut view = lock(&self.view);
                    if view.code.as_ref() == Some(&code) {
                        *view = View {
                            state: ClientState::Ended,
                            ..View::default()
                        };
                    }
                }
                self.drop_subscription();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for every background task write issued so far. Writes still
    /// queued when the client is dropped are cancelled.
    pub async fn flush(&self) {
        let flushed = {
            let writer = lock(&self.writer);
            let Some(writer) = writer.as_ref() else {
                return;
            };
            let (done, flushed) = oneshot::channel();
            if writer.queue.send(Write::Flush(done)).is_err() {
                return;
            }
            flushed
        };

        if flushed.await.is_err() {
            warn!("task writer stopped before flushing");
        }
    }

    fn persist_tasks(&self, code: InviteCode, tasks: Vec<Task>) {
        let mut writer = lock(&self.writer);
        let writer = writer.get_or_insert_with(|| Writer::spawn(Arc::clone(&self.store)));
        if writer.queue.send(Write::Tasks { code, tasks }).is_err() {
            warn!("task writer is gone, write dropped");
        }
    }

    fn begin(&self, next: ClientState) -> Result<(), SessionError> {
        let mut view = lock(&self.view);
        if !view.state.is_idle() {
            return Err(SessionError::AlreadyActive);
        }
        *view = View {
            state: next,
            ..View::default()
        };
        Ok(())
    }

    fn fail(&self, err: SessionError) -> SessionError {
        *lock(&self.view) = View {
            state: ClientState::Errored,
            ..View::default()
        };
        err
    }

    async fn activate(&self, session: Session) -> Result<(), SessionError> {
        let code = session.code.clone();
        {
            let mut view = lock(&self.view);
            view.code = Some(session.code);
            view.users = session.users;
            view.tasks = session.tasks;
        }

        let view = Arc::clone(&self.view);
        let on_update = Box::new(move |event: SessionUpdated| {
            apply_remote(&view, &event.record);
        });

        match self.notifier.subscribe(&code, on_update).await {
            Ok(subscription) => {
                let mut view = lock(&self.view);
                if view.code.as_ref() != Some(&code) {
                    debug!(%code, "campfire ended while subscribing");
                    return Err(SessionError::not_found(code.as_str()));
                }
                view.state = ClientState::Active;
                *lock(&self.subscription) = Some(subscription);
                Ok(())
            }
            Err(e) => {
                warn!(%code, "could not subscribe to campfire: {e}");
                Err(self.fail(e))
            }
        }
    }

    fn drop_subscription(&self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.unsubscribe();
        }
    }
}
