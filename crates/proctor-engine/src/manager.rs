//! Session engine: spawns, tracks, and routes to session actors.

use std::collections::HashMap;
use std::sync::Arc;

use proctor_protocol::{ClientMessage, ServerMessage, SessionId};
use proctor_store::QuizStore;
use proctor_timer::{TimerConfig, TimerSupervisor};
use tokio::sync::{mpsc, Mutex};

use crate::session::spawn_session;
use crate::{EngineError, SessionHandle, SharedRegistry, SharedTimers};

/// Default command channel size for session actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Manages all live session actors and routes messages to them.
///
/// This is the entry point for session operations from the gateway. One
/// actor exists per session with a live connection or a running
/// countdown; actors for sessions that completed while detached exit on
/// their own and their handles are pruned lazily.
pub struct SessionEngine<S: QuizStore> {
    /// Live actors, keyed by session id.
    sessions: HashMap<SessionId, SessionHandle>,

    registry: SharedRegistry,
    store: S,

    /// Every live countdown, shared with the actors so completion can
    /// cancel from inside and shutdown can cancel from outside.
    timers: SharedTimers,
}

impl<S: QuizStore> SessionEngine<S> {
    /// Creates a new engine over the given registry and store.
    pub fn new(
        registry: SharedRegistry,
        store: S,
        timer_config: TimerConfig,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            registry,
            store,
            timers: Arc::new(Mutex::new(TimerSupervisor::new(timer_config))),
        }
    }

    /// Attaches a connection's outbound channel to a session, spawning
    /// its actor first if none is running.
    ///
    /// The actor immediately emits `connected` and, for an in-progress
    /// session, resumes the countdown from the last persisted remaining
    /// time — this is the reconnect/restart recovery path.
    pub async fn attach(
        &mut self,
        session_id: &SessionId,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(), EngineError> {
        let handle = self.ensure_actor(session_id).await?;
        match handle.attach(outbound.clone()).await {
            Ok(()) => Ok(()),
            Err(EngineError::Unavailable(_)) => {
                // The tracked actor already exited (it completed while
                // detached). Spawn a fresh one and retry once.
                self.sessions.remove(session_id);
                let handle = self.ensure_actor(session_id).await?;
                handle.attach(outbound).await
            }
            Err(e) => Err(e),
        }
    }

    /// Routes a client action to the session's actor.
    pub async fn route(
        &mut self,
        session_id: &SessionId,
        msg: ClientMessage,
    ) -> Result<(), EngineError> {
        let handle = self
            .sessions
            .get(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.clone()))?;

        match handle.action(msg).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Dead actor — prune the stale handle.
                self.sessions.remove(session_id);
                Err(e)
            }
        }
    }

    /// Detaches a session's connection. Its countdown keeps running —
    /// disconnecting never pauses the clock. Actors whose session has
    /// completed are dropped here; they exit on their own once detached.
    pub async fn detach(&mut self, session_id: &SessionId) {
        let completed = {
            let registry = self.registry.lock().await;
            registry
                .get(session_id)
                .map(|r| r.status.is_terminal())
                .unwrap_or(true)
        };

        if let Some(handle) = self.sessions.get(session_id) {
            let _ = handle.detach().await;
            if completed {
                self.sessions.remove(session_id);
            }
        }
    }

    /// Stops every actor and cancels every countdown. Server shutdown.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.sessions.drain() {
            let _ = handle.shutdown().await;
        }
        self.timers.lock().await.cancel_all();
        tracing::info!("session engine shut down");
    }

    /// Number of tracked session actors.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns the existing handle for a session, or spawns its actor.
    async fn ensure_actor(
        &mut self,
        session_id: &SessionId,
    ) -> Result<SessionHandle, EngineError> {
        if let Some(handle) = self.sessions.get(session_id) {
            return Ok(handle.clone());
        }

        // Load everything the actor needs up front; quiz data is
        // immutable, so the actor never re-reads it.
        let quiz_id = {
            let registry = self.registry.lock().await;
            registry
                .get(session_id)
                .map(|r| r.quiz_id.clone())
                .ok_or_else(|| {
                    EngineError::SessionNotFound(session_id.clone())
                })?
        };

        let quiz = self
            .store
            .get_quiz(&quiz_id)
            .await?
            .ok_or_else(|| EngineError::QuizNotFound(quiz_id.clone()))?;
        let questions = self.store.get_questions(&quiz_id).await?;

        let handle = spawn_session(
            session_id.clone(),
            quiz,
            questions,
            Arc::clone(&self.registry),
            self.store.clone(),
            Arc::clone(&self.timers),
            DEFAULT_CHANNEL_SIZE,
        );
        self.sessions.insert(session_id.clone(), handle.clone());
        Ok(handle)
    }
}
