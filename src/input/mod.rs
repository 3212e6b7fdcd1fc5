pub mod json;

pub use json::{load_json, parse_capture};

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::{AdcFrame, CaptureFrame, TouchReport};
use crate::trace::TraceError;

/// Message shown to the user for any failed load
pub const ALERT_MESSAGE_LOAD_FILE: &str = "Failed to load test data file";

/// A validated capture: test info plus a non-empty frame sequence
#[derive(Debug, Clone)]
pub struct Capture {
    pub info: serde_json::Value,
    pub frames: Vec<CaptureFrame>,
}

impl Capture {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Split into the per-frame ADC and touch sequences
    pub fn into_parts(self) -> (serde_json::Value, Vec<AdcFrame>, Vec<TouchReport>) {
        let (adc, reports) = self
            .frames
            .into_iter()
            .map(|frame| (frame.adc, frame.report))
            .unzip();
        (self.info, adc, reports)
    }
}

/// Why a capture could not become a playback session
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no file content")]
    NoContent,

    #[error("invalid file content: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no valid JSON data content: missing info")]
    MissingInfo,

    #[error("no valid JSON data content: missing or empty frames")]
    NoFrames,

    #[error(transparent)]
    Trace(#[from] TraceError),
}

impl LoadError {
    /// True for upload problems (as opposed to reconstruction failures)
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, LoadError::Trace(_))
    }

    /// The single advisory surfaced to the user
    pub fn advisory(&self) -> &'static str {
        ALERT_MESSAGE_LOAD_FILE
    }
}

/// Load a capture file. Only the JSON capture layout is supported.
pub fn load_file(path: impl AsRef<Path>) -> Result<Capture, LoadError> {
    load_json(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Contact;

    #[test]
    fn test_capture_into_parts() {
        let capture = Capture {
            info: serde_json::json!({"tx": 2}),
            frames: vec![
                CaptureFrame {
                    adc: AdcFrame::new(vec![vec![1.0]]),
                    report: TouchReport::new(vec![Contact::new(0, 1.0, 2.0)]),
                },
                CaptureFrame::default(),
            ],
        };
        assert_eq!(capture.num_frames(), 2);

        let (info, adc, reports) = capture.into_parts();
        assert_eq!(info["tx"], 2);
        assert_eq!(adc.len(), 2);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].contacts().len(), 1);
    }

    #[test]
    fn test_trace_error_is_not_invalid_input() {
        let err = LoadError::from(TraceError::OutOfRangeContact {
            frame: 3,
            object_index: 12,
        });
        assert!(!err.is_invalid_input());
        assert_eq!(err.advisory(), ALERT_MESSAGE_LOAD_FILE);
        assert!(LoadError::NoContent.is_invalid_input());
    }
}
