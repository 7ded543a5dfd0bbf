//! Runnable demo: seeds the sample quiz, mints one session, and serves.
//!
//! Connect any WebSocket client to the printed URL and drive the quiz
//! with JSON messages, e.g. `{"type":"start_quiz"}`.

use proctor::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = MemoryStore::new();
    store.seed_sample_quiz().await?;

    let server = ProctorServerBuilder::new()
        .bind("127.0.0.1:8080")
        .build(store)
        .await?;
    let addr = server.local_addr()?;
    let handle = server.handle();

    let (session_id, token) = handle
        .create_session(
            &QuizId::new("demo-quiz"),
            Some("Demo Student".into()),
            "demo",
        )
        .await?;

    eprintln!("demo session ready — connect with:");
    eprintln!("  ws://{addr}/ws/{session_id}?token={}", token.as_str());
    eprintln!("then send: {{\"type\":\"start_quiz\"}}");

    server.run().await?;
    Ok(())
}
