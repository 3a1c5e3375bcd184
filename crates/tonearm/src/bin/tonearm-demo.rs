//! Interactive command-line demo: load a file, then drive the player with
//! one-word commands while playback events print as they arrive.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tonearm::{Player, PlayerEvent};

const HELP: &str = "\
commands:
  play <path>   load and play a file (bare `play` replays the last one)
  pause         pause playback
  resume        resume playback
  stop          stop playback (waits for the backend to confirm)
  vol <0-100>   set volume percent
  seek <secs>   jump to an absolute position
  status        print the current playback snapshot
  info          print file info for the loaded track
  quit          exit";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let player = Player::new();
    let events = player.subscribe();
    thread::spawn(move || {
        for event in events {
            match event {
                PlayerEvent::DurationChanged(total) => println!("* duration {}", fmt(total)),
                PlayerEvent::PositionChanged(at) => println!("* position {}", fmt(at)),
                PlayerEvent::TrackFinished => println!("* track finished"),
                PlayerEvent::PlaybackFinished => println!("* playback finished"),
                PlayerEvent::BackendFailed(reason) => println!("* backend failed: {reason}"),
            }
        }
    });

    println!("{HELP}");
    let mut last_path: Option<String> = None;
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = stdin.lock().lines().next() else {
            break;
        };
        let line = line?;
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let arg = words.next();

        let outcome = match verb {
            "" => continue,
            "play" => {
                let path = arg.map(str::to_string).or_else(|| last_path.clone());
                match path {
                    Some(path) => {
                        let result = player.play(&path);
                        last_path = Some(path);
                        result
                    }
                    None => {
                        println!("play what? (`play <path>`)");
                        continue;
                    }
                }
            }
            "pause" => player.pause(),
            "resume" => player.resume(),
            "stop" => player.stop(),
            "vol" => match arg.and_then(|v| v.parse().ok()) {
                Some(percent) => player.set_volume(percent),
                None => {
                    println!("usage: vol <0-100>");
                    continue;
                }
            },
            "seek" => match arg.and_then(|v| v.parse::<f64>().ok()) {
                Some(secs) if secs >= 0.0 => player.seek(Duration::from_secs_f64(secs)),
                _ => {
                    println!("usage: seek <secs>");
                    continue;
                }
            },
            "status" => {
                let status = player.status();
                println!(
                    "playing: {}, paused: {}, position: {}, duration: {}",
                    status.playing,
                    status.paused,
                    status.position.map_or("-".into(), fmt),
                    status.duration.map_or("-".into(), fmt),
                );
                continue;
            }
            "info" => {
                match player.file_info() {
                    Some(info) => println!(
                        "{} ({} bytes, .{})",
                        info.path.display(),
                        info.size_bytes,
                        info.extension
                    ),
                    None => println!("nothing loaded"),
                }
                continue;
            }
            "quit" | "exit" => break,
            _ => {
                println!("{HELP}");
                continue;
            }
        };

        if let Err(e) = outcome {
            println!("error: {e}");
        }
    }

    player.shutdown();
    Ok(())
}

fn fmt(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
