//! Development server binary.
//!
//! Runs a single Greenroom process with the numeric-token dev
//! authenticator. Filter logs with `RUST_LOG`, e.g.
//! `RUST_LOG=greenroom=debug`.

use greenroom::{GreenroomError, GreenroomServerBuilder};
use greenroom_session::DevAuthenticator;

#[tokio::main]
async fn main() -> Result<(), GreenroomError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let server = GreenroomServerBuilder::new()
        .bind(&addr)
        .build(DevAuthenticator)
        .await?;
    tracing::info!(%addr, "greenroom listening");
    server.run().await
}
