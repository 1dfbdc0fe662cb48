//! Control-channel framing.
//!
//! One JSON object per line, in both directions. serde_json escapes control
//! bytes inside string fields, so a `\n` in the stream is always a frame
//! boundary. Any input the decoder cannot turn into a [`ToolRequest`] is a
//! [`FrameError`], and a `FrameError` is channel-fatal: after one, the
//! stream has no trustworthy resynchronization point.

use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use workout_protocol::{ToolRequest, ToolResponse};

pub const MAX_BUFFER_BYTES: usize = if cfg!(test) { 4096 } else { 8 * 1024 * 1024 };
pub const MAX_MESSAGE_BYTES: usize = if cfg!(test) { 1024 } else { 4 * 1024 * 1024 };

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("IO error on control channel: {0}")]
    Io(#[from] io::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame of {size} bytes exceeds limit of {limit}")]
    Oversized { size: usize, limit: usize },

    #[error("control channel writer is gone")]
    WriterClosed,
}

struct WriteRequest {
    bytes: Vec<u8>,
    reply: oneshot::Sender<io::Result<()>>,
}

async fn run_write_loop<W: AsyncWrite + Unpin>(mut write: W, mut rx: mpsc::Receiver<WriteRequest>) {
    while let Some(req) = rx.recv().await {
        let result = async {
            write.write_all(&req.bytes).await?;
            write.flush().await?;
            Ok(())
        }
        .await;
        let should_stop = result.is_err();
        let _ = req.reply.send(result);
        if should_stop {
            break;
        }
    }
}

/// Framed transport over a byte stream pair.
///
/// All writes funnel through a dedicated writer task; each response is
/// written and flushed as one unit before the ack comes back, so no partial
/// message is ever observable on the channel.
pub struct Transport<R, W> {
    read: R,
    buf: Vec<u8>,
    write_tx: Option<mpsc::Sender<WriteRequest>>,
    write_task: Option<tokio::task::JoinHandle<()>>,
    _write_marker: std::marker::PhantomData<fn() -> W>,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(read: R, write: W) -> Self {
        let (write_tx, write_rx) = mpsc::channel::<WriteRequest>(16);
        let write_task = tokio::spawn(run_write_loop(write, write_rx));
        Self {
            read,
            buf: Vec::new(),
            write_tx: Some(write_tx),
            write_task: Some(write_task),
            _write_marker: std::marker::PhantomData,
        }
    }

    /// Blocks until one complete request is available. `Ok(None)` is clean
    /// EOF: the peer closed the stream between messages.
    pub async fn read_request(&mut self) -> Result<Option<ToolRequest>, FrameError> {
        loop {
            if let Some(request) = self.try_decode()? {
                return Ok(Some(request));
            }

            let mut tmp = [0u8; 8192];
            let n = self.read.read(&mut tmp).await?;
            if n == 0 {
                // EOF. Whitespace residue is fine, and some callers write
                // one final request and close stdin without a trailing
                // newline; give the residue one decode attempt.
                if self.buf.iter().all(|b| b.is_ascii_whitespace()) {
                    return Ok(None);
                }
                let line: Vec<u8> = std::mem::take(&mut self.buf);
                return match serde_json::from_slice::<ToolRequest>(&line) {
                    Ok(request) => Ok(Some(request)),
                    Err(err) => Err(FrameError::Malformed(err.to_string())),
                };
            }
            self.buf.extend_from_slice(&tmp[..n]);
            if self.buf.len() > MAX_BUFFER_BYTES {
                return Err(FrameError::Oversized {
                    size: self.buf.len(),
                    limit: MAX_BUFFER_BYTES,
                });
            }
        }
    }

    fn try_decode(&mut self) -> Result<Option<ToolRequest>, FrameError> {
        loop {
            let Some(nl) = self.buf.iter().position(|b| *b == b'\n') else {
                // No delimiter yet; bound how long a single frame may grow.
                if self.buf.len() > MAX_MESSAGE_BYTES {
                    return Err(FrameError::Oversized {
                        size: self.buf.len(),
                        limit: MAX_MESSAGE_BYTES,
                    });
                }
                return Ok(None);
            };

            let mut line: Vec<u8> = self.buf.drain(..=nl).collect();
            line.pop();
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            if line.len() > MAX_MESSAGE_BYTES {
                return Err(FrameError::Oversized {
                    size: line.len(),
                    limit: MAX_MESSAGE_BYTES,
                });
            }

            return match serde_json::from_slice::<ToolRequest>(&line) {
                Ok(request) => Ok(Some(request)),
                Err(err) => Err(FrameError::Malformed(err.to_string())),
            };
        }
    }

    /// Serializes and writes one response as a single atomic unit.
    pub async fn write_response(&mut self, response: &ToolResponse) -> Result<(), FrameError> {
        let Some(write_tx) = self.write_tx.as_ref() else {
            return Err(FrameError::WriterClosed);
        };
        let mut out = serde_json::to_vec(response)
            .map_err(|err| FrameError::Malformed(err.to_string()))?;
        out.push(b'\n');

        let (reply_tx, reply_rx) = oneshot::channel::<io::Result<()>>();
        write_tx
            .send(WriteRequest {
                bytes: out,
                reply: reply_tx,
            })
            .await
            .map_err(|_| FrameError::WriterClosed)?;
        reply_rx.await.map_err(|_| FrameError::WriterClosed)??;
        Ok(())
    }

    /// Stops the writer task. Pending writes have already been acked by the
    /// time callers get here, so aborting is safe.
    pub async fn shutdown(mut self) {
        self.write_tx.take();
        if let Some(task) = self.write_task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}
