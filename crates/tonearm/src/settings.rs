use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Persisted player settings. Anything unset falls back to the platform
/// defaults, so a missing or stale settings file is never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub version: u32,
    /// Override for the backend program (e.g. an absolute mpg123 path, or
    /// an alternative player for the spawn-and-signal backend).
    pub backend_program: Option<String>,
    /// Arguments passed to the backend program before the file path.
    pub backend_args: Option<Vec<String>>,
    /// How long a blocking stop waits for the backend's confirmation
    /// before the process is force-killed.
    pub stop_timeout_ms: u64,
    /// Volume percent applied when a track is loaded.
    pub volume: Option<u8>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            backend_program: None,
            backend_args: None,
            stop_timeout_ms: 2000,
            volume: None,
        }
    }
}

impl PlayerSettings {
    pub fn load() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = config_dir.join("tonearm").join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(config_dir) = dirs::config_dir() else {
            return;
        };
        let dir = config_dir.join("tonearm");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("settings.json");
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_the_rest() {
        let settings: PlayerSettings =
            serde_json::from_str(r#"{"backend_program": "/usr/local/bin/mpg123"}"#).unwrap();
        assert_eq!(
            settings.backend_program.as_deref(),
            Some("/usr/local/bin/mpg123")
        );
        assert_eq!(settings.stop_timeout_ms, 2000);
        assert_eq!(settings.volume, None);
    }

    #[test]
    fn settings_round_trip() {
        let settings = PlayerSettings {
            backend_args: Some(vec!["-R".into(), "--quiet".into()]),
            volume: Some(80),
            ..PlayerSettings::default()
        };

        let json = serde_json::to_string(&settings).unwrap();
        let back: PlayerSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.backend_args, settings.backend_args);
        assert_eq!(back.volume, Some(80));
    }
}
