//! Output isolation for the control channel.
//!
//! The protocol owns stdout. Anything else that writes there, a chatty
//! dependency, a stray `println!`, a child process inheriting fd 1, would
//! corrupt framing for every later message. The guard claims the real
//! stdout for the transport and points fd 1 at stderr for the rest of the
//! process lifetime, so unsolicited output lands on the diagnostic stream
//! instead of the channel.
//!
//! Acquired once in `main`, before anything can write; released only at
//! process exit. If acquisition fails the process must not serve.

use std::fs::File;
use std::io;
use std::os::unix::io::{FromRawFd, RawFd};

/// Scoped owner of the real stdout.
///
/// After [`StdoutGuard::acquire`]:
/// - `control_fd` is a private duplicate of the original stdout, handed
///   exclusively to the transport via [`control_channel`];
/// - fd 1 is a duplicate of stderr, catching every other writer.
///
/// [`control_channel`]: StdoutGuard::control_channel
#[derive(Debug)]
pub struct StdoutGuard {
    control_fd: RawFd,
}

impl StdoutGuard {
    pub fn acquire() -> io::Result<Self> {
        let control_fd = unsafe { libc::dup(libc::STDOUT_FILENO) };
        if control_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // The control channel must not leak into child processes.
        unsafe {
            let flags = libc::fcntl(control_fd, libc::F_GETFD);
            if flags < 0 || libc::fcntl(control_fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
                let err = io::Error::last_os_error();
                libc::close(control_fd);
                return Err(err);
            }
        }
        if unsafe { libc::dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO) } < 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(control_fd);
            }
            return Err(err);
        }
        log::debug!("control channel isolated; fd 1 now follows stderr");
        Ok(Self { control_fd })
    }

    /// Async handle on the real stdout for the transport's writer task.
    /// The guard keeps its own fd; the handle gets a duplicate, so dropping
    /// either side leaves the other valid.
    pub fn control_channel(&self) -> io::Result<tokio::fs::File> {
        let fd = unsafe { libc::dup(self.control_fd) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let file = unsafe { File::from_raw_fd(fd) };
        Ok(tokio::fs::File::from_std(file))
    }
}

impl Drop for StdoutGuard {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.control_fd);
        }
    }
}
