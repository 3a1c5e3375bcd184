//! Errors surfaced to callers. Telemetry noise and backend `@E` chatter are
//! handled internally and never show up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// Volume percent above 100. Rejected before any command is sent.
    #[error("volume must be between 0 and 100, got {0}")]
    InvalidVolume(u8),

    /// A command was issued with no backend process attached, or the
    /// attached process is no longer writable.
    #[error("no backend process attached to the control channel")]
    ChannelClosed,

    /// A blocking stop wait was cancelled (teardown, or a newer stop
    /// request) before the backend confirmed.
    #[error("stop wait was cancelled before the backend confirmed")]
    StopInterrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
