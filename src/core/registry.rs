//! Live session registry
//!
//! Sessions are independent; the registry only maps ids to them. Removing a
//! session tears it down, cancelling any reply still in flight. Sessions a
//! client abandoned without closing are swept once idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{CharacterRoster, SessionSettings};

use super::session::ConversationSession;

pub type SharedSession = Arc<Mutex<ConversationSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    settings: SessionSettings,
    roster: Arc<CharacterRoster>,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings, roster: Arc<CharacterRoster>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
            roster,
        }
    }

    /// Open a session with `character`, or the roster default
    pub async fn create(&self, character: Option<String>) -> SharedSession {
        let character =
            character.unwrap_or_else(|| self.roster.default_profile().name.clone());
        let session = ConversationSession::new(character, self.settings, Arc::clone(&self.roster));
        let id = session.id();
        let session = Arc::new(Mutex::new(session));

        self.sessions.write().await.insert(id, Arc::clone(&session));
        tracing::info!(session = %id, "Session opened");
        session
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Close and forget a session. Returns false if it was unknown.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.lock().await.close();
                let open = self.len().await;
                tracing::info!(session = %id, open, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Close every session idle for longer than the configured timeout.
    /// Returns how many were closed.
    pub async fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let sessions: Vec<(Uuid, SharedSession)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (*id, Arc::clone(session)))
            .collect();

        let mut idle = Vec::new();
        for (id, session) in sessions {
            if session.lock().await.is_idle(now, self.settings.idle_timeout) {
                idle.push(id);
            }
        }

        let mut closed = 0;
        for id in idle {
            if self.remove(&id).await {
                closed += 1;
            }
        }
        if closed > 0 {
            tracing::info!(closed, "Swept idle sessions");
        }
        closed
    }

    /// Run `sweep_idle` every `period` until the returned handle is aborted
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                registry.sweep_idle().await;
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn roster(&self) -> &CharacterRoster {
        &self.roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::characters::builtin as characters_builtin;
    use std::time::Duration;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SessionSettings::default(), Arc::new(CharacterRoster::builtin()))
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_remove_future_is_send() {
        let registry = registry();
        let id = Uuid::new_v4();
        let removing = registry.remove(&id);
        assert_send(&removing);
        assert!(!removing.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_closes_abandoned_sessions() {
        let registry = registry();
        let timeout = SessionSettings::default().idle_timeout;
        registry.create(None).await;

        tokio::time::sleep(timeout / 2).await;
        assert_eq!(registry.sweep_idle().await, 0);

        tokio::time::sleep(timeout).await;
        assert_eq!(registry.sweep_idle().await, 1);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_active_sessions() {
        let registry = registry();
        let timeout = SessionSettings::default().idle_timeout;

        let watched = registry.create(None).await;
        let _feed = watched.lock().await.subscribe();

        let touched = registry.create(None).await;
        tokio::time::sleep(timeout / 2).await;
        touched.lock().await.touch();
        tokio::time::sleep(timeout * 3 / 4).await;

        assert_eq!(registry.sweep_idle().await, 0);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_periodically() {
        let registry = Arc::new(registry());
        let timeout = SessionSettings::default().idle_timeout;
        registry.create(None).await;

        let sweeper = registry.spawn_sweeper(Duration::from_secs(60));
        tokio::time::sleep(timeout + Duration::from_secs(120)).await;
        sweeper.abort();

        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_create_uses_default_character() {
        let registry = registry();
        let session = registry.create(None).await;
        let snapshot = session.lock().await.snapshot();

        assert_eq!(snapshot.character, characters_builtin::ALAN_TURING);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_and_remove() {
        let registry = registry();
        let session = registry
            .create(Some(characters_builtin::ADA_LOVELACE.into()))
            .await;
        let id = session.lock().await.id();

        assert!(registry.get(&id).await.is_some());
        assert!(registry.remove(&id).await);
        assert!(registry.get(&id).await.is_none());
        assert!(!registry.remove(&id).await);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = registry();
        let first = registry.create(None).await;
        let second = registry.create(None).await;

        first.lock().await.edit_draft("only here");
        assert_eq!(second.lock().await.snapshot().draft, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_cancels_pending_reply() {
        let registry = registry();
        let session = registry.create(None).await;
        let id = {
            let mut guard = session.lock().await;
            guard.edit_draft("Hello");
            guard.submit().unwrap();
            guard.id()
        };

        registry.remove(&id).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(session.lock().await.snapshot().messages.len(), 2);
    }
}
