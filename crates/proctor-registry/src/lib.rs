//! Session registry for Proctor.
//!
//! This crate tracks every quiz attempt on the server:
//!
//! 1. **Creation** — minting session ids and credential tokens
//!    (rate-limited per caller)
//! 2. **Authorization** — validating tokens in constant time before a
//!    connection may attach
//! 3. **Binding** — enforcing at most one live connection per session and
//!    a global connection ceiling
//! 4. **State** — the durable session record the engine and countdown
//!    mutate through forward-only transitions
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← binds/unbinds connections, creates sessions
//!     ↕
//! Registry (this crate)  ← owns session records and admission control
//!     ↕
//! Protocol (below)  ← provides SessionId, SessionStatus, token types
//! ```

mod error;
mod record;
mod registry;

pub use error::RegistryError;
pub use record::{RegistryConfig, SessionRecord, SessionStatusView};
pub use registry::SessionRegistry;
