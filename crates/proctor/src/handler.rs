//! Per-connection handler: authorization, attach, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Parse `/ws/{session_id}?token=...` from the request target
//!   2. Bind via the registry — or close with a specific code, never
//!      touching the session
//!   3. Attach to the session engine → the actor sends `connected`
//!   4. Pump: actor output → socket, socket input → engine

use std::sync::Arc;

use proctor_protocol::{
    ClientMessage, CloseReason, Codec, ServerMessage, SessionId,
};
use proctor_store::QuizStore;
use proctor_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use url::Url;

use crate::server::ServerState;
use crate::ProctorError;

/// Drop guard that releases a session's binding when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async locks.
/// Unbind and detach are idempotent, so running after the handler's own
/// cleanup is harmless.
struct BindingGuard<S: QuizStore> {
    session_id: SessionId,
    state: Arc<ServerState<S>>,
}

impl<S: QuizStore> Drop for BindingGuard<S> {
    fn drop(&mut self) {
        let session_id = self.session_id.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry.lock().await.unbind(&session_id);
            state.engine.lock().await.detach(&session_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S: QuizStore>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S>>,
) -> Result<(), ProctorError> {
    let conn_id = conn.id();
    tracing::debug!(
        %conn_id,
        request_target = conn.target(),
        "handling new connection"
    );

    // --- Step 1: who is this for? ---
    let (session_id, token) = match parse_target(conn.target()) {
        Ok(parsed) => parsed,
        Err(reason) => {
            let _ = conn.close_with(reason.code(), &reason.to_string()).await;
            return Ok(());
        }
    };

    // --- Step 2: authorize ---
    // A failed bind closes with its specific code and never reaches the
    // engine: no session state is read or mutated for a refused caller.
    let bind_result = {
        let mut registry = state.registry.lock().await;
        registry.bind(&session_id, &token).map(|_| ()).map_err(|e| {
            e.close_reason().unwrap_or(CloseReason::InvalidToken)
        })
    };
    if let Err(reason) = bind_result {
        tracing::info!(%conn_id, %session_id, %reason, "connection refused");
        let _ = conn.close_with(reason.code(), &reason.to_string()).await;
        return Ok(());
    }

    let _guard = BindingGuard {
        session_id: session_id.clone(),
        state: Arc::clone(&state),
    };

    tracing::info!(%conn_id, %session_id, "connection bound");

    // --- Step 3: attach to the session actor ---
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let attach_result = {
        let mut engine = state.engine.lock().await;
        engine.attach(&session_id, outbound_tx.clone()).await
    };
    if let Err(e) = attach_result {
        tracing::error!(%session_id, error = %e, "failed to attach session");
        let _ = conn.close_with(1011, "internal error").await;
        return Err(e.into());
    }

    // --- Step 4a: outbound pump ---
    // Everything the actor emits goes to the socket in emission order.
    let writer_conn = conn.clone();
    let writer_codec = state.codec;
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let bytes = match writer_codec.encode(&msg) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode message");
                    continue;
                }
            };
            if writer_conn.send(&bytes).await.is_err() {
                // Connection gone — the read loop will notice too.
                break;
            }
        }
    });

    // --- Step 4b: inbound loop ---
    // No idle timeout here: a student reading a question legitimately
    // sends nothing for minutes while ticks flow outbound.
    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                let msg: ClientMessage = match state.codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        // Malformed or unknown type: report it and keep
                        // the connection open. No state changed.
                        tracing::debug!(
                            %session_id,
                            error = %e,
                            "undecodable message"
                        );
                        let _ = outbound_tx.send(ServerMessage::Error {
                            message: "unknown or malformed message".into(),
                        });
                        continue;
                    }
                };

                let routed =
                    state.engine.lock().await.route(&session_id, msg).await;
                if let Err(e) = routed {
                    tracing::warn!(%session_id, error = %e, "routing failed");
                    let _ = outbound_tx.send(ServerMessage::Error {
                        message: "failed to process message".into(),
                    });
                }
            }
            Ok(None) => {
                tracing::info!(%session_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "recv error");
                break;
            }
        }
    }

    // Release the binding and detach; the session record and its
    // countdown are untouched — the session stays resumable with the
    // same token until it completes on its own clock.
    state.registry.lock().await.unbind(&session_id);
    state.engine.lock().await.detach(&session_id).await;

    // Detach dropped the actor's sender; with ours gone too the pump
    // drains and exits.
    drop(outbound_tx);
    let _ = writer.await;

    Ok(())
}

/// Parses `/ws/{session_id}?token={token}` from a request target.
///
/// Anything that doesn't name a session closes as `NotFound`; a missing
/// token closes as `InvalidToken` (same as a wrong one — the two are
/// indistinguishable to a caller on purpose).
fn parse_target(target: &str) -> Result<(SessionId, String), CloseReason> {
    // A request target is scheme-less; a fixed base makes it parseable.
    let base = Url::parse("ws://proctor.invalid/").expect("static base URL");
    let url = base.join(target).map_err(|_| CloseReason::NotFound)?;

    let mut segments =
        url.path_segments().ok_or(CloseReason::NotFound)?;
    let session_id = match (segments.next(), segments.next(), segments.next())
    {
        (Some("ws"), Some(id), None) if !id.is_empty() => SessionId::new(id),
        _ => return Err(CloseReason::NotFound),
    };

    let token = url
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
        .ok_or(CloseReason::InvalidToken)?;

    Ok((session_id, token))
}
