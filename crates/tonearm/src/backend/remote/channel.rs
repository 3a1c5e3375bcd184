//! Control channel to the backend process: synchronous line commands out on
//! stdin, a dedicated reader thread dispatching telemetry lines from stdout.

use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{ChildStdin, ChildStdout};
use std::thread::{self, JoinHandle};

/// The entire outbound vocabulary of the remote-control protocol. Anything
/// the backend would accept beyond these five verbs is unused here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load `path` and start playing it.
    Load(PathBuf),
    /// Toggle between paused and unpaused.
    TogglePause,
    /// Stop playback.
    Stop,
    /// Set volume percent. Callers validate the 0-100 range before a
    /// command is ever constructed.
    Volume(u8),
    /// Seek to an absolute frame index.
    Jump(i64),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(path) => write!(f, "L {}", path.display()),
            Self::TogglePause => f.write_str("P"),
            Self::Stop => f.write_str("S"),
            Self::Volume(percent) => write!(f, "V {percent}"),
            Self::Jump(frame) => write!(f, "JUMP {frame}"),
        }
    }
}

/// Write side of the channel. There is exactly one writer per process, so
/// command writes never interleave; each line is flushed immediately.
pub struct CommandWriter {
    stdin: ChildStdin,
}

impl CommandWriter {
    pub fn new(stdin: ChildStdin) -> Self {
        Self { stdin }
    }

    pub fn send(&mut self, command: &Command) -> io::Result<()> {
        log::trace!("-> {command}");
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()
    }
}

/// Spawn the reader loop for one backend process.
///
/// `on_line` runs for every output line, strictly in arrival order;
/// `on_close` runs exactly once when the stream ends, whether the process
/// exited on its own or was killed.
pub fn spawn_reader(
    stdout: ChildStdout,
    mut on_line: impl FnMut(&str) + Send + 'static,
    on_close: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tonearm-reader".into())
        .spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) => on_line(&line),
                    Err(e) => {
                        log::debug!("control stream read error: {e}");
                        break;
                    }
                }
            }
            log::debug!("control stream closed");
            on_close();
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_render_the_wire_vocabulary() {
        assert_eq!(
            Command::Load(PathBuf::from("/music/track.mp3")).to_string(),
            "L /music/track.mp3"
        );
        assert_eq!(Command::TogglePause.to_string(), "P");
        assert_eq!(Command::Stop.to_string(), "S");
        assert_eq!(Command::Volume(0).to_string(), "V 0");
        assert_eq!(Command::Volume(100).to_string(), "V 100");
        assert_eq!(Command::Jump(5000).to_string(), "JUMP 5000");
    }
}
