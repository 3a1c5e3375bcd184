//! Cross-platform audio playback control over external player processes.
//!
//! `tonearm` starts, commands, and tears down a platform media player and
//! exposes a uniform play/pause/resume/stop/seek/volume contract plus
//! subscribable playback-progress events. On Linux (and other Unixes with
//! mpg123 installed) it drives a persistent `mpg123 -R` child through its
//! line-oriented remote-control protocol; on macOS it spawns `afplay` and
//! signals it; on Windows it talks to the WinMM MCI interface directly.
//!
//! ```no_run
//! use tonearm::{Player, PlayerEvent};
//!
//! let player = Player::new();
//! let events = player.subscribe();
//! player.play("/music/track.mp3")?;
//! for event in events {
//!     match event {
//!         PlayerEvent::PositionChanged(at) => println!("at {at:?}"),
//!         PlayerEvent::TrackFinished => break,
//!         _ => {}
//!     }
//! }
//! # Ok::<(), tonearm::PlayerError>(())
//! ```

pub mod backend;
mod error;
mod event;
mod player;
mod settings;
mod types;

pub use error::PlayerError;
pub use event::{EventBus, PlayerEvent};
pub use player::Player;
pub use settings::PlayerSettings;
pub use types::{AudioFileInfo, PlayerStatus};
