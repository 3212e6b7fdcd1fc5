//! Replay of recorded touch sensor test captures.
//!
//! A capture is loaded and validated by [`input`], per-contact traces are
//! reconstructed once by [`trace`], and [`playback`] drives a shared frame
//! index on a timer for any number of subscribed views.

pub mod config;
pub mod core;
pub mod input;
pub mod playback;
pub mod trace;

pub use config::ViewerSettings;
pub use input::{load_file, Capture, LoadError};
pub use playback::{PlaybackDriver, PlaybackHandle, PlaybackSession, PlaybackView};
pub use trace::{reconstruct, TraceSnapshot};
