//! Playback backends and the capability seam between them and the facade.
//!
//! Exactly one backend is constructed per player, chosen once at startup by
//! target-OS detection; there is no further runtime dispatch beyond that
//! single selection point.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::error::PlayerError;
use crate::event::PlayerEvent;
use crate::settings::PlayerSettings;
use crate::types::AudioFileInfo;

pub mod remote;
#[cfg(unix)]
pub mod signal;
#[cfg(target_os = "windows")]
pub mod mci;

#[cfg(not(any(unix, target_os = "windows")))]
compile_error!("no audio backend is available for this target");

/// The uniform playback contract every backend fulfills.
///
/// Callers hand in pre-validated input: volume is checked against the
/// 0-100 range by the facade before it reaches a backend.
pub trait AudioBackend: Send + Sync {
    fn play(&self, path: &Path) -> Result<(), PlayerError>;
    fn pause(&self) -> Result<(), PlayerError>;
    fn resume(&self) -> Result<(), PlayerError>;
    fn stop(&self) -> Result<(), PlayerError>;
    fn set_volume(&self, percent: u8) -> Result<(), PlayerError>;
    fn seek(&self, position: Duration) -> Result<(), PlayerError>;
    fn playing(&self) -> bool;
    fn paused(&self) -> bool;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn file_info(&self) -> Option<AudioFileInfo>;
    fn subscribe(&self) -> Receiver<PlayerEvent>;
    /// Force-kill any backend process and release every waiter. Called on
    /// drop; must be idempotent and must never block indefinitely.
    fn shutdown(&self);
}

/// Construct the default backend for the current platform.
#[cfg(target_os = "windows")]
pub fn default_backend(settings: &PlayerSettings) -> Box<dyn AudioBackend> {
    let _ = settings;
    Box::new(mci::MciPlayer::new())
}

/// Construct the default backend for the current platform.
#[cfg(target_os = "macos")]
pub fn default_backend(settings: &PlayerSettings) -> Box<dyn AudioBackend> {
    Box::new(signal::SignalPlayer::afplay(settings))
}

/// Construct the default backend for the current platform.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn default_backend(settings: &PlayerSettings) -> Box<dyn AudioBackend> {
    Box::new(remote::RemotePlayer::new(settings))
}
