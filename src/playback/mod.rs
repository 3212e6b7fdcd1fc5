pub mod controller;
pub mod driver;
pub mod session;

pub use controller::{Effect, FrameView, PlaybackController, PlaybackView};
pub use driver::{PlaybackDriver, PlaybackHandle};
pub use session::PlaybackSession;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No session loaded yet
    NoData,
    /// Not running, at frame 0
    Stopped,
    /// Not running, frame index retained
    Paused,
    Playing,
}

/// Playback speed levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    #[serde(rename = "0.25x")]
    Quarter,
    #[serde(rename = "0.5x")]
    Half,
    #[default]
    #[serde(rename = "1x")]
    Normal,
    #[serde(rename = "2x")]
    Double,
    #[serde(rename = "4x")]
    Quadruple,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 5] = [
        PlaybackSpeed::Quarter,
        PlaybackSpeed::Half,
        PlaybackSpeed::Normal,
        PlaybackSpeed::Double,
        PlaybackSpeed::Quadruple,
    ];

    /// Delay between frames for a given base interval
    pub fn frame_delay(self, frame_interval: Duration) -> Duration {
        match self {
            PlaybackSpeed::Quarter => frame_interval * 4,
            PlaybackSpeed::Half => frame_interval * 2,
            PlaybackSpeed::Normal => frame_interval,
            PlaybackSpeed::Double => frame_interval / 2,
            PlaybackSpeed::Quadruple => frame_interval / 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackSpeed::Quarter => "0.25x",
            PlaybackSpeed::Half => "0.5x",
            PlaybackSpeed::Normal => "1x",
            PlaybackSpeed::Double => "2x",
            PlaybackSpeed::Quadruple => "4x",
        }
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PlaybackSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_suffix('x').unwrap_or(s);
        PlaybackSpeed::ALL
            .into_iter()
            .find(|speed| speed.label().trim_end_matches('x') == s)
            .ok_or_else(|| {
                format!(
                    "unknown speed '{}', expected one of 0.25x, 0.5x, 1x, 2x, 4x",
                    s
                )
            })
    }
}

/// Playback configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Delay between frames at 1x speed
    pub frame_interval: Duration,
    /// Speed used until the user changes it
    pub speed: PlaybackSpeed,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(50),
            speed: PlaybackSpeed::Normal,
        }
    }
}

/// Rejected playback operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("no session loaded")]
    NoSession,

    #[error("session has no frames")]
    NoFrames,

    #[error("seeking is disabled while playing")]
    SeekWhilePlaying,

    /// A timer callback from a session that has since been replaced
    #[error("stale timer from generation {tick} (current {current})")]
    StaleGeneration { tick: u64, current: u64 },

    #[error("playback driver has shut down")]
    Closed,
}
