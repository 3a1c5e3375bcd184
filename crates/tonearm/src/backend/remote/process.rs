//! Backend process supervision: spawn with redirected standard streams,
//! force-kill and reap on teardown.
//!
//! The supervisor never interprets process exit as a playback event — exit
//! is observable only through the control stream closing, and what that
//! means is the state machine's call.

use std::io;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct BackendProcess {
    child: Child,
    reaped: bool,
}

impl BackendProcess {
    /// Spawn the backend with stdin and stdout piped (stderr discarded).
    /// Returns the stream handles the control channel needs.
    pub fn spawn(
        program: &str,
        args: &[String],
    ) -> io::Result<(Self, ChildStdin, ChildStdout)> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        log::info!("spawned backend `{program}` (pid {})", child.id());
        Ok((
            Self {
                child,
                reaped: false,
            },
            stdin,
            stdout,
        ))
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Terminate immediately and reap. Safe to call repeatedly, and a
    /// no-op once the child has been reaped.
    pub fn kill(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            log::debug!("kill backend pid {}: {e}", self.child.id());
        }
        match self.child.wait() {
            Ok(status) => log::debug!("backend pid {} exited: {status}", self.child.id()),
            Err(e) => log::warn!("failed to reap backend pid {}: {e}", self.child.id()),
        }
        self.reaped = true;
    }
}

impl Drop for BackendProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
