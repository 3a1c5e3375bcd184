//! Windows backend over the WinMM MCI string interface.
//!
//! MCI plays the file itself, so there is no child process and no
//! telemetry stream: a ticker thread derives position events from wall
//! clock (honoring pause gaps) and declares the finish when the elapsed
//! time reaches the length MCI reported at load.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use windows::Win32::Foundation::HWND;
use windows::Win32::Media::Audio::{HWAVEOUT, waveOutSetVolume};
use windows::Win32::Media::Multimedia::{mciGetErrorStringW, mciSendStringW};
use windows::core::HSTRING;

use crate::backend::AudioBackend;
use crate::error::PlayerError;
use crate::event::{EventBus, PlayerEvent};
use crate::types::AudioFileInfo;

const TICK: Duration = Duration::from_millis(250);

struct Inner {
    /// Quoted file path, which doubles as the MCI device identifier.
    device: Option<String>,
    info: Option<AudioFileInfo>,
    length: Duration,
    playing: bool,
    paused: bool,
    /// Bumped whenever the current ticker thread must retire.
    epoch: u64,
    started: Option<Instant>,
    elapsed_base: Duration,
    last_position: Option<Duration>,
}

struct Shared {
    inner: Mutex<Inner>,
    bus: EventBus,
}

pub struct MciPlayer {
    shared: Arc<Shared>,
}

impl MciPlayer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    device: None,
                    info: None,
                    length: Duration::ZERO,
                    playing: false,
                    paused: false,
                    epoch: 0,
                    started: None,
                    elapsed_base: Duration::ZERO,
                    last_position: None,
                }),
                bus: EventBus::new(),
            }),
        }
    }

    pub fn play(&self, path: &Path) -> Result<(), PlayerError> {
        let length = {
            let mut inner = self.lock();
            inner.epoch += 1;
            if let Some(device) = inner.device.take() {
                let _ = mci(&format!("stop {device}"));
                let _ = mci(&format!("close {device}"));
            }

            let device = format!("\"{}\"", path.display());
            let _ = mci(&format!("set {device} time format milliseconds"));
            let reply = mci(&format!("status {device} length"))?;
            let length = Duration::from_millis(reply.trim().parse().unwrap_or(0));
            mci(&format!("play {device}"))?;

            inner.device = Some(device);
            inner.info = Some(AudioFileInfo::probe(path));
            inner.length = length;
            inner.playing = true;
            inner.paused = false;
            inner.started = Some(Instant::now());
            inner.elapsed_base = Duration::ZERO;
            inner.last_position = None;

            let epoch = inner.epoch;
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name("tonearm-tick".into())
                .spawn(move || tick(&shared, epoch))?;
            length
        };
        self.shared.bus.broadcast(&PlayerEvent::DurationChanged(length));
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        if !inner.playing || inner.paused {
            return Ok(());
        }
        let Some(device) = inner.device.clone() else {
            return Ok(());
        };
        mci(&format!("pause {device}"))?;
        inner.elapsed_base += inner
            .started
            .take()
            .map(|s| s.elapsed())
            .unwrap_or_default();
        inner.paused = true;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        if !inner.paused {
            return Ok(());
        }
        let Some(device) = inner.device.clone() else {
            return Ok(());
        };
        mci(&format!("resume {device}"))?;
        inner.started = Some(Instant::now());
        inner.paused = false;
        Ok(())
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        let was_playing = {
            let mut inner = self.lock();
            inner.epoch += 1;
            let was_playing = inner.playing;
            if let Some(device) = inner.device.take() {
                let _ = mci(&format!("stop {device}"));
                let _ = mci(&format!("close {device}"));
            }
            inner.playing = false;
            inner.paused = false;
            inner.started = None;
            was_playing
        };
        if was_playing {
            self.shared.bus.broadcast(&PlayerEvent::PlaybackFinished);
        }
        Ok(())
    }

    pub fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        // Percent is pre-validated; scale to the 16-bit per-channel range,
        // same level on both channels.
        let unit = 0xFFFF * u32::from(percent) / 100;
        // SAFETY: a null device handle addresses the default wave-out
        // device; the call only reads its arguments.
        let result = unsafe { waveOutSetVolume(HWAVEOUT::default(), unit | (unit << 16)) };
        if result != 0 {
            log::warn!("waveOutSetVolume failed with {result}");
        }
        Ok(())
    }

    pub fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        let Some(device) = inner.device.clone() else {
            log::debug!("seek ignored: no track loaded");
            return Ok(());
        };
        if position >= inner.length {
            log::debug!("seek target at or past end of track; ignoring");
            return Ok(());
        }
        let ms = position.as_millis();
        if inner.paused {
            mci(&format!("seek {device} to {ms}"))?;
        } else {
            mci(&format!("play {device} from {ms}"))?;
            inner.started = Some(Instant::now());
        }
        inner.elapsed_base = position;
        inner.last_position = None;
        Ok(())
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.shared.bus.subscribe()
    }

    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        if let Some(device) = inner.device.take() {
            let _ = mci(&format!("stop {device}"));
            let _ = mci(&format!("close {device}"));
        }
        inner.playing = false;
        inner.paused = false;
        inner.started = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MciPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MciPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioBackend for MciPlayer {
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

    fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.set_volume(percent)
    }

    fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.seek(position)
    }

    fn playing(&self) -> bool {
        self.lock().playing
    }

    fn paused(&self) -> bool {
        self.lock().paused
    }

    fn position(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.device.is_none() {
            return None;
        }
        Some(elapsed(&inner))
    }

    fn duration(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.device.is_none() || inner.length.is_zero() {
            return None;
        }
        Some(inner.length)
    }

    fn file_info(&self) -> Option<AudioFileInfo> {
        self.lock().info.clone()
    }

    fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.subscribe()
    }

    fn shutdown(&self) {
        self.shutdown();
    }
}

fn elapsed(inner: &Inner) -> Duration {
    inner.elapsed_base + inner.started.map(|s| s.elapsed()).unwrap_or_default()
}

/// Position ticker and finish timer for one play. Retires as soon as the
/// epoch moves on.
fn tick(shared: &Shared, epoch: u64) {
    loop {
        thread::sleep(TICK);
        let mut events = Vec::new();
        {
            let Ok(mut inner) = shared.inner.lock() else {
                return;
            };
            if inner.epoch != epoch || !inner.playing {
                return;
            }
            if inner.paused {
                continue;
            }
            let now = elapsed(&inner);
            if !inner.length.is_zero() && now >= inner.length {
                if let Some(device) = inner.device.take() {
                    let _ = mci(&format!("stop {device}"));
                    let _ = mci(&format!("close {device}"));
                }
                inner.playing = false;
                inner.started = None;
                events.push(PlayerEvent::TrackFinished);
                events.push(PlayerEvent::PlaybackFinished);
            } else {
                let due = match inner.last_position {
                    None => true,
                    Some(prev) => now.saturating_sub(prev) >= Duration::from_secs(1),
                };
                if due {
                    inner.last_position = Some(now);
                    events.push(PlayerEvent::PositionChanged(now));
                }
            }
        }
        let finished = events.contains(&PlayerEvent::TrackFinished);
        for event in &events {
            shared.bus.broadcast(event);
        }
        if finished {
            return;
        }
    }
}

fn mci(command: &str) -> Result<String, PlayerError> {
    let mut reply = [0u16; 128];
    // SAFETY: the command string is NUL-terminated (HSTRING) and the reply
    // buffer length is passed alongside its pointer by the binding.
    let code =
        unsafe { mciSendStringW(&HSTRING::from(command), Some(&mut reply), HWND::default()) };
    if code != 0 {
        let mut text = [0u16; 256];
        // SAFETY: plain out-buffer call; the API writes a NUL-terminated
        // UTF-16 message into `text`.
        let _ = unsafe { mciGetErrorStringW(code, &mut text) };
        let message = utf16_until_nul(&text);
        log::warn!("MCI `{command}` failed: {message}");
        return Err(PlayerError::Io(std::io::Error::other(message)));
    }
    Ok(utf16_until_nul(&reply))
}

fn utf16_until_nul(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}
