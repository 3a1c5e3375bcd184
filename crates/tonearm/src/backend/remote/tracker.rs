//! Per-session position and duration bookkeeping.
//!
//! The backend never announces a track's duration directly; it has to be
//! derived from the first progress frame of a session. Likewise there is no
//! single trustworthy "track ended" line, so the end is declared from a
//! frame/time heuristic.

use std::time::Duration;

use super::telemetry::FrameUpdate;
use crate::types::AudioFileInfo;

/// What one frame line produced: at most one duration announcement, at most
/// one throttled position update, and the end-of-track flag.
#[derive(Debug, Default, PartialEq)]
pub struct FrameOutcome {
    pub duration: Option<Duration>,
    pub position: Option<Duration>,
    pub finished: bool,
}

/// Bookkeeping for one loaded file, created on play and replaced wholesale
/// by the next play. All derived fields start unset.
pub struct Session {
    info: AudioFileInfo,
    frame_rate: f64,
    total_frames: i64,
    duration: Option<Duration>,
    last_seconds: f64,
    last_published: Option<f64>,
    finished: bool,
}

impl Session {
    pub fn new(info: AudioFileInfo) -> Self {
        Self {
            info,
            frame_rate: 0.0,
            total_frames: 0,
            duration: None,
            last_seconds: 0.0,
            last_published: None,
            finished: false,
        }
    }

    pub fn info(&self) -> &AudioFileInfo {
        &self.info
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Last position reported by the backend (not throttled).
    pub fn position(&self) -> Option<Duration> {
        if self.duration.is_some() {
            Some(Duration::from_secs_f64(self.last_seconds.max(0.0)))
        } else {
            None
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Absorb one progress frame.
    ///
    /// The first frame of a session fixes duration and frame rate:
    /// duration = elapsed + remaining seconds, frame rate = frame / elapsed
    /// (falling back to the remaining-frames count as the total when the
    /// session starts at zero elapsed time). The derivation tolerates being
    /// invoked mid-stream — a session does not need to start at frame 0.
    ///
    /// Position updates are throttled to one per elapsed second of track
    /// time. End-of-track is declared when the decoder reports less than a
    /// second or zero frames remaining — decoders near the end are
    /// unreliable about which of the two they get right.
    pub fn on_frame(&mut self, frame: &FrameUpdate) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        if self.finished {
            return outcome;
        }

        if self.duration.is_none() {
            let total_seconds = frame.seconds + frame.seconds_left;
            if frame.seconds > 0.0 {
                self.frame_rate = frame.frame as f64 / frame.seconds;
                self.total_frames = (self.frame_rate * total_seconds).round() as i64;
            } else {
                self.total_frames = frame.frames_left;
                self.frame_rate = if total_seconds > 0.0 {
                    self.total_frames as f64 / total_seconds
                } else {
                    0.0
                };
            }
            let duration = Duration::from_secs_f64(total_seconds.max(0.0));
            self.duration = Some(duration);
            outcome.duration = Some(duration);
        }

        self.last_seconds = frame.seconds;

        if frame.seconds_left < 1.0 || frame.frames_left <= 0 {
            self.finished = true;
            outcome.finished = true;
            return outcome;
        }

        let publish = match self.last_published {
            None => true,
            Some(previous) => frame.seconds - previous >= 1.0,
        };
        if publish {
            self.last_published = Some(frame.seconds);
            outcome.position = Some(Duration::from_secs_f64(frame.seconds.max(0.0)));
        }
        outcome
    }

    /// Mark the session finished without a frame (the backend surfaced the
    /// end through its error channel instead).
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Frame index for a seek to `seconds`, or `None` when the seek must be
    /// skipped: duration/frame-rate not yet known, or the target lies at or
    /// past the end of the track.
    pub fn seek_target(&self, seconds: f64) -> Option<i64> {
        if self.finished || self.duration.is_none() || self.frame_rate <= 0.0 {
            return None;
        }
        let target = (seconds * self.frame_rate) as i64;
        if target < 0 || target >= self.total_frames {
            return None;
        }
        Some(target)
    }

    /// A seek went out: reset the throttle so the next frame publishes a
    /// position immediately, even backwards.
    pub fn note_seek(&mut self) {
        self.last_published = None;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn frame(frame: i64, frames_left: i64, seconds: f64, seconds_left: f64) -> FrameUpdate {
        FrameUpdate {
            frame,
            frames_left,
            seconds,
            seconds_left,
        }
    }

    fn session() -> Session {
        Session::new(AudioFileInfo::probe(Path::new("track.mp3")))
    }

    #[test]
    fn first_frame_fixes_duration_and_frame_rate() {
        let mut s = session();
        let outcome = s.on_frame(&frame(1000, 9000, 10.0, 90.0));

        assert_eq!(outcome.duration, Some(Duration::from_secs(100)));
        assert!(!outcome.finished);
        assert_eq!(s.duration(), Some(Duration::from_secs(100)));
        // 1000 frames in 10 seconds.
        assert_eq!(s.seek_target(50.0), Some(5000));
    }

    #[test]
    fn duration_is_published_exactly_once() {
        let mut s = session();
        assert!(s.on_frame(&frame(1000, 9000, 10.0, 90.0)).duration.is_some());
        assert!(s.on_frame(&frame(1100, 8900, 11.0, 89.0)).duration.is_none());
    }

    #[test]
    fn zero_elapsed_falls_back_to_remaining_frames_as_total() {
        let mut s = session();
        let outcome = s.on_frame(&frame(0, 2500, 0.0, 50.0));

        assert_eq!(outcome.duration, Some(Duration::from_secs(50)));
        // 2500 frames over 50 seconds.
        assert_eq!(s.seek_target(10.0), Some(500));
    }

    #[test]
    fn positions_are_throttled_to_one_per_track_second() {
        let mut s = session();
        let first = s.on_frame(&frame(1000, 9000, 10.0, 90.0));
        assert_eq!(first.position, Some(Duration::from_secs_f64(10.0)));

        assert_eq!(s.on_frame(&frame(1025, 8975, 10.25, 89.75)).position, None);
        assert_eq!(s.on_frame(&frame(1075, 8925, 10.75, 89.25)).position, None);
        let next = s.on_frame(&frame(1100, 8900, 11.0, 89.0));
        assert_eq!(next.position, Some(Duration::from_secs_f64(11.0)));
    }

    #[test]
    fn seek_resets_the_position_throttle() {
        let mut s = session();
        s.on_frame(&frame(1000, 9000, 10.0, 90.0));
        s.note_seek();
        // Backwards and less than a second later — still published.
        let outcome = s.on_frame(&frame(500, 9500, 5.0, 95.0));
        assert_eq!(outcome.position, Some(Duration::from_secs_f64(5.0)));
    }

    #[test]
    fn finishes_once_on_low_seconds_left() {
        let mut s = session();
        s.on_frame(&frame(1000, 9000, 10.0, 90.0));

        let end = s.on_frame(&frame(9950, 50, 99.5, 0.5));
        assert!(end.finished);
        assert_eq!(end.position, None);

        // Nothing more after the end, ever.
        let after = s.on_frame(&frame(9975, 25, 99.75, 0.25));
        assert_eq!(after, FrameOutcome::default());
    }

    #[test]
    fn finishes_on_zero_frames_left() {
        let mut s = session();
        s.on_frame(&frame(1000, 9000, 10.0, 90.0));
        assert!(s.on_frame(&frame(10000, 0, 98.0, 2.0)).finished);
    }

    #[test]
    fn seek_past_end_is_skipped() {
        let mut s = session();
        s.on_frame(&frame(1000, 9000, 10.0, 90.0));

        assert_eq!(s.seek_target(150.0), None);
        assert_eq!(s.seek_target(100.0), None);
        assert_eq!(s.seek_target(50.0), Some(5000));
    }

    #[test]
    fn seek_before_duration_known_is_skipped() {
        let s = session();
        assert_eq!(s.seek_target(10.0), None);
    }
}
