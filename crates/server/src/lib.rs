//! Workout MCP Server
//!
//! Exposes the gym exercise dataset to LLM agents as callable tools over a
//! newline-delimited JSON protocol on stdio.
//!
//! ## Tools
//!
//! - `search_exercises` - filter and rank exercises against a subject's
//!   constraints, with session-based refinement
//! - `get_exercise_by_name` - exact, case-insensitive record lookup
//! - `download_dataset` - fetch or refresh the local dataset snapshot
//!
//! Stdout is the control channel and carries protocol messages only; all
//! diagnostics go to stderr.

pub mod isolation;
pub mod tools;
pub mod transport;

pub use isolation::StdoutGuard;
pub use tools::WorkoutService;
pub use transport::{FrameError, Transport};

use tokio::io::{AsyncRead, AsyncWrite};

/// Request loop: decode, dispatch, respond, in order. Returns `Ok(())` on
/// clean EOF. A [`FrameError`] ends the loop; the caller terminates the
/// process without writing anything further to the channel.
pub async fn serve<R, W>(
    service: WorkoutService,
    mut transport: Transport<R, W>,
) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        match transport.read_request().await {
            Ok(Some(request)) => {
                let response = service.handle(request).await;
                transport.write_response(&response).await?;
            }
            Ok(None) => break,
            Err(err) => {
                log::error!("control channel failure: {err}");
                transport.shutdown().await;
                return Err(err);
            }
        }
    }
    transport.shutdown().await;
    Ok(())
}
