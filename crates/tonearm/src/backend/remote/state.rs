//! Playback lifecycle state machine for the remote backend.
//!
//! Owns the six-state lifecycle and the one synchronous rendezvous in the
//! whole design: a `stop()` caller blocking until the backend confirms the
//! stopped transition.

use crossbeam_channel::{Receiver, Sender};

/// The six lifecycle states reported by `@P` status codes. `Stopping`,
/// `Pausing` and `Unpausing` are transient: they exist only while a command
/// is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Paused,
    Unpaused,
    Stopping,
    Pausing,
    Unpausing,
}

impl PlaybackState {
    /// Map a raw `@P` code. Unknown codes map to `None` and are ignored.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            1 => Some(Self::Paused),
            2 => Some(Self::Unpaused),
            3 => Some(Self::Stopping),
            4 => Some(Self::Pausing),
            5 => Some(Self::Unpausing),
            _ => None,
        }
    }
}

/// How a pending `stop()` rendezvous was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The backend confirmed with a stopped status.
    Confirmed,
    /// The wait was cancelled (teardown, or a newer stop request).
    Aborted,
}

pub struct StateMachine {
    state: PlaybackState,
    pending_stop: Option<Sender<StopOutcome>>,
    /// Set when playback starts (or the backend reports it started) and
    /// cleared once the track ends or stops. Gates end-of-track detection
    /// so stray frame lines cannot finish a session that never played.
    recently_playing: bool,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            pending_stop: None,
            recently_playing: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playing(&self) -> bool {
        self.state != PlaybackState::Stopped
    }

    pub fn paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn recently_playing(&self) -> bool {
        self.recently_playing
    }

    /// A load command went out. State goes to unpaused optimistically, with
    /// no confirmation wait, matching the backend's own async behavior.
    pub fn request_play(&mut self) {
        self.state = PlaybackState::Unpaused;
        self.recently_playing = true;
    }

    /// The caller's intent, not the backend's confirmation, determines the
    /// locally tracked paused flag.
    pub fn request_pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    pub fn request_resume(&mut self) {
        self.state = PlaybackState::Unpaused;
    }

    /// Begin a stop request: state goes to `Stopping` and a fresh
    /// single-shot completion signal replaces any previous one (the
    /// replaced waiter is resolved as aborted).
    pub fn begin_stop(&mut self) -> Receiver<StopOutcome> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        if let Some(old) = self.pending_stop.replace(tx) {
            let _ = old.try_send(StopOutcome::Aborted);
        }
        self.state = PlaybackState::Stopping;
        rx
    }

    /// Apply a status reported by the backend. Returns `true` when this
    /// status confirmed an outstanding stop request.
    pub fn on_status(&mut self, status: PlaybackState) -> bool {
        if status == PlaybackState::Stopped {
            let confirmed = self.state == PlaybackState::Stopping;
            self.resolve_pending(StopOutcome::Confirmed);
            self.state = PlaybackState::Stopped;
            self.recently_playing = false;
            return confirmed;
        }
        if self.state == PlaybackState::Stopping {
            // Seek and pause confirmations also produce status codes; none
            // of them may cancel an in-flight stop.
            return false;
        }
        if matches!(status, PlaybackState::Unpaused | PlaybackState::Pausing) && !self.playing() {
            self.recently_playing = true;
        }
        self.state = status;
        false
    }

    /// The track reached its natural end: clear the playing flag. Any
    /// pending stop is resolved as confirmed — playback has ceased.
    pub fn note_track_done(&mut self) {
        self.resolve_pending(StopOutcome::Confirmed);
        self.state = PlaybackState::Stopped;
        self.recently_playing = false;
    }

    /// Teardown: force the stopped state and release any blocked waiter
    /// with a cancellation signal instead of leaving it to hang.
    pub fn abort(&mut self) {
        self.resolve_pending(StopOutcome::Aborted);
        self.state = PlaybackState::Stopped;
        self.recently_playing = false;
    }

    fn resolve_pending(&mut self, outcome: StopOutcome) {
        if let Some(tx) = self.pending_stop.take() {
            let _ = tx.try_send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_states() {
        assert_eq!(PlaybackState::from_code(0), Some(PlaybackState::Stopped));
        assert_eq!(PlaybackState::from_code(1), Some(PlaybackState::Paused));
        assert_eq!(PlaybackState::from_code(2), Some(PlaybackState::Unpaused));
        assert_eq!(PlaybackState::from_code(3), Some(PlaybackState::Stopping));
        assert_eq!(PlaybackState::from_code(4), Some(PlaybackState::Pausing));
        assert_eq!(PlaybackState::from_code(5), Some(PlaybackState::Unpausing));
        assert_eq!(PlaybackState::from_code(6), None);
        assert_eq!(PlaybackState::from_code(-1), None);
    }

    #[test]
    fn play_is_optimistically_unpaused() {
        let mut machine = StateMachine::new();
        machine.request_play();
        assert_eq!(machine.state(), PlaybackState::Unpaused);
        assert!(machine.playing());
        assert!(!machine.paused());
    }

    #[test]
    fn stopped_status_confirms_pending_stop() {
        let mut machine = StateMachine::new();
        machine.request_play();
        let rx = machine.begin_stop();
        assert_eq!(machine.state(), PlaybackState::Stopping);

        let confirmed = machine.on_status(PlaybackState::Stopped);
        assert!(confirmed);
        assert_eq!(rx.try_recv(), Ok(StopOutcome::Confirmed));
        assert!(!machine.playing());
    }

    #[test]
    fn other_statuses_do_not_cancel_an_inflight_stop() {
        let mut machine = StateMachine::new();
        machine.request_play();
        let rx = machine.begin_stop();

        assert!(!machine.on_status(PlaybackState::Unpaused));
        assert!(!machine.on_status(PlaybackState::Pausing));
        assert_eq!(machine.state(), PlaybackState::Stopping);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn abort_releases_the_waiter() {
        let mut machine = StateMachine::new();
        machine.request_play();
        let rx = machine.begin_stop();

        machine.abort();
        assert_eq!(rx.try_recv(), Ok(StopOutcome::Aborted));
        assert!(!machine.playing());
    }

    #[test]
    fn newer_stop_replaces_the_pending_signal() {
        let mut machine = StateMachine::new();
        machine.request_play();
        let first = machine.begin_stop();
        let second = machine.begin_stop();

        assert_eq!(first.try_recv(), Ok(StopOutcome::Aborted));
        machine.on_status(PlaybackState::Stopped);
        assert_eq!(second.try_recv(), Ok(StopOutcome::Confirmed));
    }

    #[test]
    fn unpaused_status_while_inactive_marks_recently_playing() {
        let mut machine = StateMachine::new();
        assert!(!machine.recently_playing());
        machine.on_status(PlaybackState::Unpaused);
        assert!(machine.recently_playing());

        machine.note_track_done();
        assert!(!machine.recently_playing());
        assert!(!machine.playing());
    }
}
