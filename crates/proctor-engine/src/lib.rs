//! Session runtime for Proctor: the state machine and the scoring engine.
//!
//! Each quiz session runs as an isolated Tokio task (actor model) with
//! its own command channel and countdown events, which serializes all
//! transitions per session while keeping sessions fully parallel.
//!
//! # Key types
//!
//! - [`SessionEngine`] — spawns/tracks actors, routes client actions
//! - [`SessionHandle`] — send commands to a running session actor
//! - [`scoring::score_session`] — pure quiz + responses → score report
//! - [`EngineError`] — what callers of the engine can see go wrong

mod error;
mod manager;
pub mod scoring;
mod session;

pub use error::EngineError;
pub use manager::SessionEngine;
pub use session::SessionHandle;

use std::sync::Arc;

use proctor_registry::SessionRegistry;
use proctor_timer::TimerSupervisor;
use tokio::sync::Mutex;

/// The session registry, shared between the gateway (bind/unbind,
/// creation) and the session actors (state transitions, tick writes).
pub type SharedRegistry = Arc<Mutex<SessionRegistry>>;

/// The countdown supervisor, shared between the engine (shutdown) and
/// the session actors (start on begin/resume, cancel on completion).
pub type SharedTimers = Arc<Mutex<TimerSupervisor>>;
