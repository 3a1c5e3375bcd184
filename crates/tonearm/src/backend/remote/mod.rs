//! Remote-control backend: drives a persistent decoder process (mpg123 in
//! remote mode) over its line-oriented protocol and lifts the raw
//! frame/status stream into semantic playback events.
//!
//! All mutable state lives behind one mutex in [`Inner`]; the reader thread
//! and command callers both go through it, and telemetry-derived events are
//! collected under the lock but broadcast after it is released. The reader
//! is the sole emitter of telemetry-derived events, so subscribers see them
//! in arrival order.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::backend::AudioBackend;
use crate::error::PlayerError;
use crate::event::{EventBus, PlayerEvent};
use crate::settings::PlayerSettings;
use crate::types::AudioFileInfo;

use self::channel::{Command, CommandWriter};
use self::process::BackendProcess;
use self::state::{PlaybackState, StateMachine, StopOutcome};
use self::telemetry::Telemetry;
use self::tracker::Session;

pub mod channel;
pub mod process;
pub mod state;
pub mod telemetry;
pub mod tracker;

/// Marker in `@E` lines that means the track ran out rather than the
/// backend failing.
const END_OF_TRACK_ERROR: &str = "No track loaded";

struct Link {
    process: BackendProcess,
    writer: CommandWriter,
    reader: JoinHandle<()>,
}

struct Inner {
    link: Option<Link>,
    /// Bumped on every spawn and deliberate teardown so a stale reader
    /// (from a killed process) cannot mutate its successor's state.
    epoch: u64,
    machine: StateMachine,
    session: Option<Session>,
    shutdown: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    bus: EventBus,
}

pub struct RemotePlayer {
    program: String,
    args: Vec<String>,
    stop_timeout: Duration,
    initial_volume: Option<u8>,
    shared: Arc<Shared>,
}

impl RemotePlayer {
    pub fn new(settings: &PlayerSettings) -> Self {
        let program = settings
            .backend_program
            .clone()
            .unwrap_or_else(|| "mpg123".into());
        let args = settings
            .backend_args
            .clone()
            .unwrap_or_else(|| vec!["-R".into()]);
        Self::with_command(program, args, settings.stop_timeout(), settings.volume)
    }

    /// Build against an explicit backend invocation. Also the seam the
    /// tests use to substitute a scripted stand-in for the real decoder.
    pub fn with_command(
        program: String,
        args: Vec<String>,
        stop_timeout: Duration,
        initial_volume: Option<u8>,
    ) -> Self {
        Self {
            program,
            args,
            stop_timeout,
            initial_volume,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    link: None,
                    epoch: 0,
                    machine: StateMachine::new(),
                    session: None,
                    shutdown: false,
                }),
                bus: EventBus::new(),
            }),
        }
    }

    pub fn play(&self, path: &Path) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        // A new session wipes every derived field of the previous one.
        inner.session = Some(Session::new(AudioFileInfo::probe(path)));
        self.ensure_backend(&mut inner)?;
        Self::send(&mut inner, &Command::Load(path.to_path_buf()))?;
        if let Some(volume) = self.initial_volume {
            Self::send(&mut inner, &Command::Volume(volume))?;
        }
        inner.machine.request_play();
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        if inner.machine.state() != PlaybackState::Unpaused {
            return Ok(());
        }
        Self::send(&mut inner, &Command::TogglePause)?;
        inner.machine.request_pause();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        if inner.machine.state() != PlaybackState::Paused {
            return Ok(());
        }
        Self::send(&mut inner, &Command::TogglePause)?;
        inner.machine.request_resume();
        Ok(())
    }

    /// Stop playback and block until the backend confirms, bounded by the
    /// configured stop timeout; a backend that fails to confirm in time is
    /// force-killed.
    pub fn stop(&self) -> Result<(), PlayerError> {
        let rx = {
            let mut inner = self.lock();
            if !inner.machine.playing() {
                return Ok(());
            }
            if inner.link.is_none() {
                inner.machine.abort();
                return Ok(());
            }
            let rx = inner.machine.begin_stop();
            Self::send(&mut inner, &Command::Stop)?;
            rx
        };
        match rx.recv_timeout(self.stop_timeout) {
            Ok(StopOutcome::Confirmed) => Ok(()),
            Ok(StopOutcome::Aborted) | Err(RecvTimeoutError::Disconnected) => {
                Err(PlayerError::StopInterrupted)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "backend did not confirm stop within {:?}; killing it",
                    self.stop_timeout
                );
                let link = {
                    let mut inner = self.lock();
                    inner.epoch += 1;
                    inner.machine.abort();
                    inner.link.take()
                };
                if let Some(link) = link {
                    Self::dismantle(link);
                }
                self.shared.bus.broadcast(&PlayerEvent::PlaybackFinished);
                Ok(())
            }
        }
    }

    /// Percent is validated by the facade before a command is constructed.
    pub fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        Self::send(&mut inner, &Command::Volume(percent))
    }

    pub fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        let mut inner = self.lock();
        let target = {
            let Some(session) = inner.session.as_ref() else {
                log::debug!("seek ignored: no track loaded");
                return Ok(());
            };
            if session.duration().is_none() {
                log::debug!("seek ignored: duration not known yet");
                return Ok(());
            }
            session.seek_target(position.as_secs_f64())
        };
        let Some(frame) = target else {
            log::debug!("seek target at or past end of track; ignoring");
            return Ok(());
        };
        Self::send(&mut inner, &Command::Jump(frame))?;
        if let Some(session) = inner.session.as_mut() {
            session.note_seek();
        }
        Ok(())
    }

    pub fn playing(&self) -> bool {
        self.lock().machine.playing()
    }

    pub fn paused(&self) -> bool {
        self.lock().machine.paused()
    }

    pub fn position(&self) -> Option<Duration> {
        self.lock().session.as_ref().and_then(Session::position)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.lock().session.as_ref().and_then(Session::duration)
    }

    pub fn file_info(&self) -> Option<AudioFileInfo> {
        self.lock().session.as_ref().map(|s| s.info().clone())
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.shared.bus.subscribe()
    }

    /// Kill the backend and release every waiter. Idempotent.
    pub fn shutdown(&self) {
        let link = {
            let mut inner = self.lock();
            inner.shutdown = true;
            // Silence the doomed reader's close handler.
            inner.epoch += 1;
            inner.machine.abort();
            inner.session = None;
            inner.link.take()
        };
        if let Some(link) = link {
            Self::dismantle(link);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn ensure_backend(&self, inner: &mut Inner) -> Result<(), PlayerError> {
        if inner.link.is_some() {
            return Ok(());
        }
        if inner.shutdown {
            return Err(PlayerError::ChannelClosed);
        }
        let (process, stdin, stdout) = BackendProcess::spawn(&self.program, &self.args)?;
        inner.epoch += 1;
        let epoch = inner.epoch;
        let line_shared = Arc::clone(&self.shared);
        let close_shared = Arc::clone(&self.shared);
        let reader = channel::spawn_reader(
            stdout,
            move |line| handle_line(&line_shared, epoch, line),
            move || handle_stream_closed(&close_shared, epoch),
        )?;
        inner.link = Some(Link {
            process,
            writer: CommandWriter::new(stdin),
            reader,
        });
        Ok(())
    }

    fn send(inner: &mut Inner, command: &Command) -> Result<(), PlayerError> {
        let link = inner.link.as_mut().ok_or(PlayerError::ChannelClosed)?;
        link.writer.send(command).map_err(|e| {
            log::warn!("command write failed: {e}");
            PlayerError::ChannelClosed
        })
    }

    fn dismantle(mut link: Link) {
        link.process.kill();
        if link.reader.join().is_err() {
            log::warn!("reader thread panicked");
        }
    }
}

impl Drop for RemotePlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioBackend for RemotePlayer {
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
        self.playing()
    }

    fn paused(&self) -> bool {
        self.paused()
    }

    fn position(&self) -> Option<Duration> {
        self.position()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration()
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

fn handle_line(shared: &Shared, epoch: u64, line: &str) {
    let Some(telemetry) = telemetry::classify(line) else {
        // Malformed frame/status payloads are expected noise.
        return;
    };
    let mut events = Vec::new();
    {
        let Ok(mut inner) = shared.inner.lock() else {
            return;
        };
        if inner.epoch != epoch {
            return;
        }
        apply_telemetry(&mut inner, telemetry, &mut events);
    }
    for event in &events {
        shared.bus.broadcast(event);
    }
}

fn apply_telemetry(inner: &mut Inner, telemetry: Telemetry, events: &mut Vec<PlayerEvent>) {
    match telemetry {
        Telemetry::Frame(frame) => {
            let Some(outcome) = inner.session.as_mut().map(|s| s.on_frame(&frame)) else {
                return;
            };
            if let Some(duration) = outcome.duration {
                events.push(PlayerEvent::DurationChanged(duration));
            }
            if let Some(position) = outcome.position {
                events.push(PlayerEvent::PositionChanged(position));
            }
            if outcome.finished {
                finish_track(inner, events);
            }
        }
        Telemetry::Status(code) => match PlaybackState::from_code(code) {
            Some(status) => {
                if inner.machine.on_status(status) {
                    events.push(PlayerEvent::PlaybackFinished);
                }
            }
            None => log::debug!("ignoring unknown status code {code}"),
        },
        Telemetry::Info(text) => log::debug!("backend: {text}"),
        Telemetry::Error(text) => {
            if text.contains(END_OF_TRACK_ERROR) {
                // The backend reports running out of track through its
                // error channel; treat it as a normal lifecycle event.
                if let Some(session) = inner.session.as_mut() {
                    session.finish();
                }
                finish_track(inner, events);
            } else {
                log::warn!("backend error: {text}");
            }
        }
        Telemetry::Unrecognized(text) => {
            if !text.is_empty() {
                log::trace!("unrecognized backend line: {text:?}");
            }
        }
    }
}

/// Natural end of the loaded track: fires the semantic events at most once
/// per session and clears the playing flag. Explicit stops and process
/// exits are unrelated conditions and do not come through here.
fn finish_track(inner: &mut Inner, events: &mut Vec<PlayerEvent>) {
    if !inner.machine.recently_playing() {
        return;
    }
    inner.machine.note_track_done();
    events.push(PlayerEvent::TrackFinished);
    events.push(PlayerEvent::PlaybackFinished);
}

fn handle_stream_closed(shared: &Shared, epoch: u64) {
    let failed = {
        let Ok(mut inner) = shared.inner.lock() else {
            return;
        };
        if inner.epoch != epoch {
            // Deliberate teardown; already handled by whoever bumped the epoch.
            return;
        }
        if let Some(mut link) = inner.link.take() {
            // The process already exited; this only reaps it.
            link.process.kill();
        }
        let failed = inner.machine.playing();
        inner.machine.abort();
        failed
    };
    if failed {
        log::warn!("backend process exited unexpectedly");
        shared.bus.broadcast(&PlayerEvent::BackendFailed(
            "backend process exited unexpectedly".into(),
        ));
    }
}
