//! Unified error type for the Proctor server.

use proctor_engine::EngineError;
use proctor_protocol::ProtocolError;
use proctor_registry::RegistryError;
use proctor_store::StoreError;
use proctor_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `proctor` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ProctorError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A store-level error (quiz lookup, response write).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A registry-level error (creation, binding, transitions).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An engine-level error (actor spawn, routing).
    #[error(transparent)]
    Engine(#[from] EngineError),
}
