use anyhow::{Context, Result};
use std::sync::Arc;
use workout_dataset::{DatasetCache, DatasetConfig};
use workout_mcp::{serve, StdoutGuard, Transport, WorkoutService};
use workout_session::{SessionConfig, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging to stderr only (stdout is the control channel).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    // Isolation before anything else can write: without the guard, one
    // stray print would corrupt every later protocol message. Failing to
    // acquire it means failing to start.
    let guard = StdoutGuard::acquire().context("failed to isolate the control channel")?;
    let control = guard
        .control_channel()
        .context("failed to open the control channel")?;

    log::info!("Starting workout MCP server");

    let cache = Arc::new(DatasetCache::new(DatasetConfig::from_env()));
    let sessions = Arc::new(SessionStore::new(SessionConfig::from_env()));
    let service = WorkoutService::new(cache, sessions);
    let transport = Transport::new(tokio::io::stdin(), control);

    serve(service, transport)
        .await
        .context("control channel failure")?;

    log::info!("Workout MCP server stopped");
    Ok(())
}
