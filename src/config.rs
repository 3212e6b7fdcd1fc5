use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::playback::{PlaybackConfig, PlaybackSpeed};

/// Persistent viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Delay between frames at 1x, in milliseconds
    pub frame_interval_ms: u64,
    /// Speed playback starts at
    pub speed: PlaybackSpeed,
    /// `tracing` filter used when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 50,
            speed: PlaybackSpeed::Normal,
            log_filter: "info".to_string(),
        }
    }
}

impl ViewerSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("touch-replay").join("settings.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing file gives defaults silently; an
    /// unreadable or invalid one gives defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read settings {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring invalid settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("No configuration directory on this platform"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            // A zero interval would spin the timer
            frame_interval: Duration::from_millis(self.frame_interval_ms.max(1)),
            speed: self.speed,
        }
    }
}
