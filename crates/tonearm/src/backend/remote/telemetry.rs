//! Classifier for the backend's line-oriented telemetry.
//!
//! mpg123's remote mode prefixes every output line with a two-character
//! token: `@F` progress frames, `@P` status codes, `@I` informational text,
//! `@E` errors. Malformed frame lines are expected noise from the decoder
//! and classify to `None` rather than an error.

/// One parsed progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUpdate {
    /// Absolute index of the frame currently being decoded.
    pub frame: i64,
    /// Frames remaining until the end of the track.
    pub frames_left: i64,
    /// Elapsed playback time in seconds.
    pub seconds: f64,
    /// Remaining playback time in seconds.
    pub seconds_left: f64,
}

/// One classified telemetry line. Produced per line, consumed once.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    Frame(FrameUpdate),
    /// Raw status code from a `@P` line; mapping to a playback state (and
    /// discarding unknown codes) happens at the consumer.
    Status(i64),
    Info(String),
    Error(String),
    Unrecognized(String),
}

/// Classify one raw line by its fixed two-character prefix.
///
/// Returns `None` for lines that carry a known prefix but do not parse
/// (short or non-numeric `@F`/`@P` payloads) — those are discarded
/// silently, never surfaced as errors.
pub fn classify(line: &str) -> Option<Telemetry> {
    match line.get(..2) {
        Some("@F") => parse_frame(line).map(Telemetry::Frame),
        Some("@P") => line[2..].trim().parse().ok().map(Telemetry::Status),
        Some("@I") => Some(Telemetry::Info(line[2..].trim().to_string())),
        Some("@E") => Some(Telemetry::Error(line[2..].trim().to_string())),
        _ => Some(Telemetry::Unrecognized(line.to_string())),
    }
}

fn parse_frame(line: &str) -> Option<FrameUpdate> {
    // Five space-separated fields including the prefix token itself.
    let mut fields = line.split_whitespace();
    fields.next();
    Some(FrameUpdate {
        frame: fields.next()?.parse().ok()?,
        frames_left: fields.next()?.parse().ok()?,
        seconds: fields.next()?.parse().ok()?,
        seconds_left: fields.next()?.parse().ok()?,
    })
}
