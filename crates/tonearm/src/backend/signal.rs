//! Spawn-and-signal backend for platforms without a control channel.
//!
//! One player process per play (`afplay` on macOS, `aplay -q` as the
//! generic fallback). Pause and resume are delivered as SIGSTOP/SIGCONT
//! through a spawned `kill`; the only playback telemetry is process exit,
//! observed by a watcher thread.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::backend::AudioBackend;
use crate::error::PlayerError;
use crate::event::{EventBus, PlayerEvent};
use crate::settings::PlayerSettings;
use crate::types::AudioFileInfo;

const WATCH_INTERVAL: Duration = Duration::from_millis(100);

struct Inner {
    child: Option<Child>,
    /// Bumped whenever the current child stops being ours (new play, stop,
    /// shutdown) so a stale watcher thread retires instead of reporting.
    epoch: u64,
    paused: bool,
    info: Option<AudioFileInfo>,
}

struct Shared {
    inner: Mutex<Inner>,
    bus: EventBus,
}

pub struct SignalPlayer {
    program: String,
    args: Vec<String>,
    shared: Arc<Shared>,
}

impl SignalPlayer {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    child: None,
                    epoch: 0,
                    paused: false,
                    info: None,
                }),
                bus: EventBus::new(),
            }),
        }
    }

    /// The macOS player.
    pub fn afplay(settings: &PlayerSettings) -> Self {
        Self::new(
            settings
                .backend_program
                .clone()
                .unwrap_or_else(|| "afplay".into()),
            settings.backend_args.clone().unwrap_or_default(),
        )
    }

    /// The generic ALSA fallback.
    pub fn aplay(settings: &PlayerSettings) -> Self {
        Self::new(
            settings
                .backend_program
                .clone()
                .unwrap_or_else(|| "aplay".into()),
            settings
                .backend_args
                .clone()
                .unwrap_or_else(|| vec!["-q".into()]),
        )
    }

    pub fn play(&self, path: &Path) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        // One child at a time: replace whatever is still running.
        inner.epoch += 1;
        if let Some(mut old) = inner.child.take() {
            let _ = old.kill();
            let _ = old.wait();
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        log::info!("spawned `{}` (pid {})", self.program, child.id());

        inner.child = Some(child);
        inner.paused = false;
        inner.info = Some(AudioFileInfo::probe(path));

        let epoch = inner.epoch;
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("tonearm-watch".into())
            .spawn(move || watch_child(&shared, epoch))?;
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        if inner.paused {
            return Ok(());
        }
        let Some(child) = inner.child.as_ref() else {
            return Ok(());
        };
        signal(child.id(), "-STOP")?;
        inner.paused = true;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        if !inner.paused {
            return Ok(());
        }
        let Some(child) = inner.child.as_ref() else {
            return Ok(());
        };
        signal(child.id(), "-CONT")?;
        inner.paused = false;
        Ok(())
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        let stopped = {
            let mut inner = self.lock();
            inner.epoch += 1;
            inner.paused = false;
            match inner.child.take() {
                Some(mut child) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    true
                }
                None => false,
            }
        };
        if stopped {
            self.shared.bus.broadcast(&PlayerEvent::PlaybackFinished);
        }
        Ok(())
    }

    pub fn playing(&self) -> bool {
        self.lock().child.is_some()
    }

    pub fn paused(&self) -> bool {
        self.lock().paused
    }

    pub fn file_info(&self) -> Option<AudioFileInfo> {
        self.lock().info.clone()
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.shared.bus.subscribe()
    }

    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.paused = false;
        if let Some(mut child) = inner.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for SignalPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioBackend for SignalPlayer {
    fn play(&self, path: &Path) -> Result<(), PlayerError> {
        self.play(path)
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.pause()
    }

    fn resume(&self) -> Result<(), PlayerError> {
        self.resume()
    }

    fn stop(&self) -> Result<(), PlayerError> {
        self.stop()
    }

    fn set_volume(&self, _percent: u8) -> Result<(), PlayerError> {
        log::debug!("`{}` has no volume control; ignoring", self.program);
        Ok(())
    }

    fn seek(&self, _position: Duration) -> Result<(), PlayerError> {
        log::debug!("`{}` cannot seek; ignoring", self.program);
        Ok(())
    }

    fn playing(&self) -> bool {
        self.playing()
    }

    fn paused(&self) -> bool {
        self.paused()
    }

    fn position(&self) -> Option<Duration> {
        None
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn file_info(&self) -> Option<AudioFileInfo> {
        self.file_info()
    }

    fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.subscribe()
    }

    fn shutdown(&self) {
        self.shutdown();
    }
}

/// Deliver a signal the way the platform tooling does. A missing process is
/// not an error — it just exited first.
fn signal(pid: u32, flag: &str) -> Result<(), PlayerError> {
    let status = Command::new("kill")
        .arg(flag)
        .arg(pid.to_string())
        .status()?;
    if !status.success() {
        log::warn!("kill {flag} {pid} exited with {status}");
    }
    Ok(())
}

/// Poll the child until it exits or is replaced. Exit is the only finish
/// signal this backend has; a nonzero status is reported as a fault rather
/// than a normal end.
fn watch_child(shared: &Shared, epoch: u64) {
    loop {
        thread::sleep(WATCH_INTERVAL);
        let finished = {
            let Ok(mut inner) = shared.inner.lock() else {
                return;
            };
            if inner.epoch != epoch {
                return;
            }
            let Some(child) = inner.child.as_mut() else {
                return;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    inner.child = None;
                    inner.paused = false;
                    Some(status)
                }
                Ok(None) => None,
                Err(e) => {
                    log::warn!("failed to poll player process: {e}");
                    return;
                }
            }
        };
        if let Some(status) = finished {
            if status.success() {
                shared.bus.broadcast(&PlayerEvent::TrackFinished);
                shared.bus.broadcast(&PlayerEvent::PlaybackFinished);
            } else {
                log::warn!("player process exited with {status}");
                shared.bus.broadcast(&PlayerEvent::BackendFailed(format!(
                    "player process exited with {status}"
                )));
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn ignoring_sleeper() -> SignalPlayer {
        // `$0` swallows the appended file path.
        SignalPlayer::new("sh".into(), vec!["-c".into(), "sleep 30".into(), "sh".into()])
    }

    #[test]
    fn clean_exit_is_a_finished_track() {
        let player = SignalPlayer::new("true".into(), Vec::new());
        let events = player.subscribe();
        player.play(Path::new("/tmp/track.wav")).unwrap();

        assert_eq!(events.recv_timeout(WAIT), Ok(PlayerEvent::TrackFinished));
        assert_eq!(events.recv_timeout(WAIT), Ok(PlayerEvent::PlaybackFinished));
        assert!(!player.playing());
    }

    #[test]
    fn failed_exit_is_a_fault() {
        let player = SignalPlayer::new("false".into(), Vec::new());
        let events = player.subscribe();
        player.play(Path::new("/tmp/track.wav")).unwrap();

        assert!(matches!(
            events.recv_timeout(WAIT),
            Ok(PlayerEvent::BackendFailed(_))
        ));
    }

    #[test]
    fn stop_kills_the_child() {
        let player = ignoring_sleeper();
        let events = player.subscribe();
        player.play(Path::new("/tmp/track.wav")).unwrap();
        assert!(player.playing());

        player.stop().unwrap();
        assert!(!player.playing());
        assert_eq!(events.recv_timeout(WAIT), Ok(PlayerEvent::PlaybackFinished));
    }

    #[test]
    fn pause_and_resume_flip_the_flag() {
        let player = ignoring_sleeper();
        player.play(Path::new("/tmp/track.wav")).unwrap();

        player.pause().unwrap();
        assert!(player.paused());
        player.resume().unwrap();
        assert!(!player.paused());

        player.stop().unwrap();
    }
}
