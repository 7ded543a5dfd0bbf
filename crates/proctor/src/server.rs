//! `ProctorServer` builder and server loop.
//!
//! This is the entry point for running a quiz session server. It ties
//! together all the layers: transport → protocol → registry → engine.

use std::sync::Arc;

use proctor_engine::{SessionEngine, SharedRegistry};
use proctor_protocol::{JsonCodec, QuizId, SessionId, SessionToken};
use proctor_registry::{RegistryConfig, SessionRegistry, SessionStatusView};
use proctor_store::{QuizStore, QuizSummary};
use proctor_timer::TimerConfig;
use proctor_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::ProctorError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed.
pub(crate) struct ServerState<S: QuizStore> {
    pub(crate) registry: SharedRegistry,
    pub(crate) engine: Mutex<SessionEngine<S>>,
    pub(crate) store: S,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Proctor server.
///
/// # Example
///
/// ```rust,ignore
/// use proctor::prelude::*;
///
/// let store = MemoryStore::new();
/// store.seed_sample_quiz().await?;
/// let server = ProctorServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(store)
///     .await?;
/// server.run().await
/// ```
pub struct ProctorServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
    timer_config: TimerConfig,
}

impl ProctorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            registry_config: RegistryConfig::default(),
            timer_config: TimerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the registry's admission-control configuration.
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Sets the countdown timer configuration.
    pub fn timer_config(mut self, config: TimerConfig) -> Self {
        self.timer_config = config;
        self
    }

    /// Builds and starts the server over the given quiz store.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` — the codec is behind
    /// the `Codec` trait, so a binary format could replace it without
    /// touching the handler.
    pub async fn build<S: QuizStore>(
        self,
        store: S,
    ) -> Result<ProctorServer<S>, ProctorError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let registry: SharedRegistry = Arc::new(Mutex::new(
            SessionRegistry::new(self.registry_config),
        ));
        let engine = SessionEngine::new(
            Arc::clone(&registry),
            store.clone(),
            self.timer_config,
        );

        let state = Arc::new(ServerState {
            registry,
            engine: Mutex::new(engine),
            store,
            codec: JsonCodec,
        });

        Ok(ProctorServer { transport, state })
    }
}

impl Default for ProctorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Proctor quiz server.
///
/// Call [`run()`](Self::run) to start accepting connections. Grab a
/// [`handle()`](Self::handle) first if you need to create sessions or
/// read statuses while the server runs.
pub struct ProctorServer<S: QuizStore> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S>>,
}

impl<S: QuizStore> ProctorServer<S> {
    /// Creates a new builder.
    pub fn builder() -> ProctorServerBuilder {
        ProctorServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a cheap handle to the server's session/quiz API.
    pub fn handle(&self) -> ProctorHandle<S> {
        ProctorHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ProctorError> {
        tracing::info!("Proctor server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection::<S>(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// The session and quiz API surface of a running server.
///
/// This is how sessions come to exist: a caller (a REST shim, an admin
/// tool, the demo binary) creates one here, hands the student the
/// returned id + token, and the student's client connects over
/// WebSocket with them.
#[derive(Clone)]
pub struct ProctorHandle<S: QuizStore> {
    state: Arc<ServerState<S>>,
}

impl<S: QuizStore> ProctorHandle<S> {
    /// Creates a session for one attempt at a quiz.
    ///
    /// The session inherits the quiz's time limit. The returned token is
    /// the ONLY time the credential is exposed — status reads never
    /// include it. `caller` keys the creation rate limit.
    ///
    /// # Errors
    /// [`EngineError::QuizNotFound`](proctor_engine::EngineError) if the
    /// quiz doesn't exist, [`RegistryError::RateLimited`] if the caller
    /// exceeded the creation limit.
    ///
    /// [`RegistryError::RateLimited`]: proctor_registry::RegistryError
    pub async fn create_session(
        &self,
        quiz_id: &QuizId,
        student_name: Option<String>,
        caller: &str,
    ) -> Result<(SessionId, SessionToken), ProctorError> {
        let quiz = self
            .state
            .store
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| {
                proctor_engine::EngineError::QuizNotFound(quiz_id.clone())
            })?;

        let mut registry = self.state.registry.lock().await;
        let pair = registry.create(
            quiz_id.clone(),
            student_name,
            caller,
            quiz.time_limit_seconds,
        )?;
        Ok(pair)
    }

    /// Reads a session's status: progress, remaining time, and score —
    /// never the token or the student's name.
    pub async fn session_status(
        &self,
        session_id: &SessionId,
    ) -> Option<SessionStatusView> {
        self.state
            .registry
            .lock()
            .await
            .get(session_id)
            .map(|record| record.status_view())
    }

    /// Lists all published quizzes.
    pub async fn list_quizzes(
        &self,
    ) -> Result<Vec<QuizSummary>, ProctorError> {
        Ok(self.state.store.list_quizzes().await?)
    }
}
