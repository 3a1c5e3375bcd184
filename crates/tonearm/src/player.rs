//! The public facade: one backend, selected once at construction.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::backend::{self, AudioBackend};
use crate::error::PlayerError;
use crate::event::PlayerEvent;
use crate::settings::PlayerSettings;
use crate::types::{AudioFileInfo, PlayerStatus};

/// Cross-platform audio player. Construction picks the backend for the
/// current OS; every subsequent call delegates to it.
///
/// Commands are short and synchronous and do not wait for the backend,
/// with one exception: [`Player::stop`] blocks until the backend confirms
/// (bounded by the configured stop timeout).
pub struct Player {
    backend: Box<dyn AudioBackend>,
}

impl Player {
    /// Backend chosen by platform, configured from the persisted settings.
    pub fn new() -> Self {
        Self::with_settings(PlayerSettings::load())
    }

    pub fn with_settings(settings: PlayerSettings) -> Self {
        Self {
            backend: backend::default_backend(&settings),
        }
    }

    /// Bring your own backend (an explicitly chosen platform variant, or a
    /// custom [`AudioBackend`] implementation).
    pub fn with_backend(backend: Box<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// Stop whatever is playing and start the given file from the top.
    pub fn play(&self, path: impl AsRef<Path>) -> Result<(), PlayerError> {
        self.backend.play(path.as_ref())
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.backend.pause()
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        self.backend.resume()
    }

    /// Blocks until the backend confirms the stop or the configured bound
    /// elapses (after which the backend is force-killed).
    pub fn stop(&self) -> Result<(), PlayerError> {
        self.backend.stop()
    }

    /// Set volume percent. Values above 100 are rejected here, before any
    /// backend command is constructed.
    pub fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        if percent > 100 {
            return Err(PlayerError::InvalidVolume(percent));
        }
        self.backend.set_volume(percent)
    }

    /// Seek to an absolute position. A seek before the duration is known,
    /// or past the end of the track, is a no-op rather than an error.
    pub fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.backend.seek(position)
    }

    pub fn playing(&self) -> bool {
        self.backend.playing()
    }

    pub fn paused(&self) -> bool {
        self.backend.paused()
    }

    pub fn position(&self) -> Option<Duration> {
        self.backend.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.backend.duration()
    }

    pub fn file_info(&self) -> Option<AudioFileInfo> {
        self.backend.file_info()
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            playing: self.backend.playing(),
            paused: self.backend.paused(),
            position: self.backend.position(),
            duration: self.backend.duration(),
        }
    }

    /// Ordered stream of playback events. Any number of subscribers.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.backend.subscribe()
    }

    /// Kill the backend and release any blocked caller. Also runs on drop.
    pub fn shutdown(&self) {
        self.backend.shutdown();
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.backend.shutdown();
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::backend::remote::RemotePlayer;

    fn quiet_player() -> Player {
        // A backend that consumes commands and never answers; nothing real
        // is spawned until play.
        Player::with_backend(Box::new(RemotePlayer::with_command(
            "sh".into(),
            vec!["-c".into(), "cat >/dev/null".into()],
            Duration::from_millis(200),
            None,
        )))
    }

    #[test]
    fn volume_above_100_is_rejected_before_any_command() {
        let player = quiet_player();
        // No backend process exists; if validation did not short-circuit,
        // this would surface a channel error instead.
        assert!(matches!(
            player.set_volume(101),
            Err(PlayerError::InvalidVolume(101))
        ));
        assert!(matches!(
            player.set_volume(255),
            Err(PlayerError::InvalidVolume(255))
        ));
    }

    #[test]
    fn full_volume_range_is_accepted() {
        let player = quiet_player();
        player.play("/tmp/track.mp3").unwrap();
        for percent in [0u8, 1, 50, 99, 100] {
            player.set_volume(percent).unwrap();
        }
    }

    #[test]
    fn status_snapshot_reflects_playback_flags() {
        let player = quiet_player();
        assert_eq!(player.status(), PlayerStatus::default());

        player.play("/tmp/track.mp3").unwrap();
        let status = player.status();
        assert!(status.playing);
        assert!(!status.paused);
    }

    #[test]
    fn file_info_is_recorded_at_play() {
        let player = quiet_player();
        player.play("/tmp/track.mp3").unwrap();
        let info = player.file_info().expect("info recorded");
        assert_eq!(info.file_name, "track.mp3");
        assert_eq!(info.extension, "mp3");
    }
}
