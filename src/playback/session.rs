use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::{AdcFrame, TouchReport};
use crate::input::{self, Capture, LoadError};
use crate::trace::{reconstruct, TraceSnapshot};

/// Everything needed to replay one loaded capture
///
/// Built once per successful load and never mutated afterwards; the next
/// load replaces it wholesale.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    info: serde_json::Value,
    adc: Vec<AdcFrame>,
    reports: Vec<TouchReport>,
    traces: Vec<TraceSnapshot>,
    /// Assigned by the controller when the session is installed
    pub(crate) generation: u64,
    source: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl PlaybackSession {
    /// Reconstruct traces for a validated capture
    pub fn from_capture(capture: Capture) -> Result<Self, LoadError> {
        let (info, adc, reports) = capture.into_parts();
        let traces = reconstruct(&reports)?;

        Ok(Self {
            info,
            adc,
            reports,
            traces,
            generation: 0,
            source: None,
            loaded_at: Utc::now(),
        })
    }

    /// Load, validate and reconstruct a capture file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let mut session = Self::from_capture(input::load_file(path)?)?;
        session.source = Some(path.to_path_buf());

        info!(
            "Loaded {} ({} frames)",
            path.display(),
            session.num_frames()
        );
        Ok(session)
    }

    pub fn num_frames(&self) -> usize {
        self.adc.len()
    }

    /// Test info block from the capture
    pub fn info(&self) -> &serde_json::Value {
        &self.info
    }

    pub fn adc_frames(&self) -> &[AdcFrame] {
        &self.adc
    }

    pub fn reports(&self) -> &[TouchReport] {
        &self.reports
    }

    pub fn traces(&self) -> &[TraceSnapshot] {
        &self.traces
    }

    /// Generation tag; 0 until installed in a controller
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
