//! # Proctor
//!
//! Server-authoritative timed quiz sessions over WebSocket.
//!
//! Many independent students take the same quiz concurrently; each
//! student's timer, position, and answers live server-side, so a client
//! cannot cheat by manipulating local time or replaying stale state.
//! Dropping the connection doesn't pause the clock, and reconnecting
//! with the session token resumes exactly where the server says the
//! attempt is.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use proctor::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! store.seed_sample_quiz().await?;
//!
//! let server = ProctorServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(store)
//!     .await?;
//!
//! // Hand out a session: the student connects to
//! // ws://host/ws/{session_id}?token={token}
//! let handle = server.handle();
//! let (session_id, token) = handle
//!     .create_session(&QuizId::new("demo-quiz"), None, "docs")
//!     .await?;
//! println!("ws://0.0.0.0:8080/ws/{session_id}?token={}", token.as_str());
//!
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::ProctorError;
pub use server::{ProctorHandle, ProctorServer, ProctorServerBuilder};

/// One-stop imports for building and talking to a Proctor server.
pub mod prelude {
    pub use crate::{
        ProctorError, ProctorHandle, ProctorServer, ProctorServerBuilder,
    };
    pub use proctor_engine::{scoring, EngineError, SessionEngine};
    pub use proctor_protocol::{
        ClientMessage, CloseReason, CompletionReason, QuestionId,
        QuestionResult, QuestionView, QuizId, QuizInfo, ScoreSummary,
        ServerMessage, SessionId, SessionSnapshot, SessionStatus,
        SessionToken,
    };
    pub use proctor_registry::{RegistryConfig, SessionStatusView};
    pub use proctor_store::{
        MemoryStore, Question, Quiz, QuizStore, QuizSummary,
    };
    pub use proctor_timer::TimerConfig;
}
