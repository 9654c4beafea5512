//! Session store: the ordered tab list plus the displayed and monitored
//! session pointers.
//!
//! Every mutation queues a detached settings write for the values it
//! changed; writes keep their order, so the last one always wins on disk.

use std::path::Path;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use ezs_core::{Session, SessionId};

use crate::settings::{keys, SettingsHandle};

#[derive(Debug)]
pub struct SessionStore {
    sessions: Vec<Session>,
    current: SessionId,
    listen: SessionId,
    settings: SettingsHandle,
}

impl SessionStore {
    /// Restores sessions and pointers from settings.
    ///
    /// Falls back to the default session when nothing usable is stored; a
    /// pointer naming a session that no longer exists moves to the first.
    pub async fn restore(settings: SettingsHandle) -> Self {
        let mut sessions: Vec<Session> = settings
            .get_as(keys::SESSION_LIST)
            .await
            .unwrap_or_default();
        if sessions.is_empty() {
            sessions.push(Session::default_session());
        }

        let first = sessions
            .first()
            .map(|s| s.id.clone())
            .unwrap_or_else(SessionId::default_session);
        let known = |id: &SessionId| sessions.iter().any(|s| &s.id == id);

        let current = settings
            .get_as::<SessionId>(keys::CURRENT_SESSION)
            .await
            .filter(|id| known(id))
            .unwrap_or_else(|| first.clone());
        let listen = settings
            .get_as::<SessionId>(keys::CURRENT_LISTEN_SESSION)
            .await
            .filter(|id| known(id))
            .unwrap_or(first);

        debug!(sessions = sessions.len(), current = %current, listen = %listen, "sessions restored");
        Self {
            sessions,
            current,
            listen,
            settings,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.iter().any(|s| &s.id == id)
    }

    /// Session whose data is displayed.
    pub fn current(&self) -> &SessionId {
        &self.current
    }

    /// Session receiving live backend traffic.
    pub fn listen(&self) -> &SessionId {
        &self.listen
    }

    /// Appends a session and displays it.
    pub async fn add_session(&mut self, session: Session) {
        info!(session_id = %session.id, label = %session.label, "session added");
        self.current = session.id.clone();
        self.sessions.push(session);
        self.persist_list().await;
        self.persist_current().await;
    }

    /// Removes `id` and moves the displayed pointer to its predecessor (the
    /// new first session when `id` was first).
    ///
    /// No-op when only one session is left or `id` is unknown. Returns true
    /// if a session was removed.
    pub async fn remove_session(&mut self, id: &SessionId) -> bool {
        if self.sessions.len() <= 1 {
            debug!(session_id = %id, "refusing to remove the last session");
            return false;
        }
        let Some(index) = self.sessions.iter().position(|s| &s.id == id) else {
            return false;
        };

        self.sessions.remove(index);
        let next = self
            .sessions
            .get(index.saturating_sub(1))
            .map(|s| s.id.clone());
        if let Some(next) = next {
            self.current = next;
        }
        if &self.listen == id {
            debug!(session_id = %id, "monitored session removed");
        }

        info!(session_id = %id, current = %self.current, "session removed");
        self.persist_list().await;
        self.persist_current().await;
        true
    }

    /// Drops every session in favour of a fresh default one.
    ///
    /// Telling the backend to monitor it is left to the caller.
    pub async fn reset(&mut self) {
        let default = Session::default_session();
        self.current = default.id.clone();
        self.listen = default.id.clone();
        self.sessions = vec![default];
        info!("sessions reset");
        self.persist_list().await;
        self.persist_current().await;
        self.persist_listen().await;
    }

    /// Creates and displays a session for an imported file.
    ///
    /// The id is the current time in milliseconds, bumped if it collides.
    pub async fn create_for_path(&mut self, path: &Path) -> SessionId {
        let mut at = Utc::now();
        let mut id = SessionId::from_time(at);
        while self.contains(&id) {
            at += Duration::milliseconds(1);
            id = SessionId::from_time(at);
        }

        self.add_session(Session::new(id.clone(), Session::label_for_path(path)))
            .await;
        id
    }

    /// Displays `id`. Returns false for an unknown session.
    pub async fn set_current(&mut self, id: &SessionId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.current = id.clone();
        self.persist_current().await;
        true
    }

    /// Records that the backend now routes live traffic into `id`.
    pub async fn set_listen(&mut self, id: &SessionId) {
        self.listen = id.clone();
        self.persist_listen().await;
    }

    async fn persist_list(&self) {
        self.settings
            .set_detached(keys::SESSION_LIST, &self.sessions)
            .await;
    }

    async fn persist_current(&self) {
        self.settings
            .set_detached(keys::CURRENT_SESSION, &self.current)
            .await;
    }

    async fn persist_listen(&self) {
        self.settings
            .set_detached(keys::CURRENT_LISTEN_SESSION, &self.listen)
            .await;
    }
}
