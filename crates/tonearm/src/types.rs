use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File-level facts about the loaded track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFileInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub extension: String,
    pub size_bytes: u64,
}

impl AudioFileInfo {
    /// Best-effort probe. A missing file yields size 0 — the backend will
    /// surface its own error when asked to load it.
    pub fn probe(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        }
    }
}

/// Snapshot of the player's externally visible state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub playing: bool,
    pub paused: bool,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn probe_reads_name_extension_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"not really mpeg audio").unwrap();

        let info = AudioFileInfo::probe(&path);
        assert_eq!(info.file_name, "song.mp3");
        assert_eq!(info.extension, "mp3");
        assert_eq!(info.size_bytes, 21);
        assert_eq!(info.path, path);
    }

    #[test]
    fn probe_of_a_missing_file_is_harmless() {
        let info = AudioFileInfo::probe(Path::new("/no/such/file.wav"));
        assert_eq!(info.file_name, "file.wav");
        assert_eq!(info.extension, "wav");
        assert_eq!(info.size_bytes, 0);
    }
}
