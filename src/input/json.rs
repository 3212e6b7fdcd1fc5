use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::core::CaptureFrame;
use crate::input::{Capture, LoadError};

/// On-disk layout before validation. Every field is optional so that
/// a missing `info` or `frames` maps to its own error instead of a
/// generic serde message.
#[derive(Deserialize)]
struct RawCapture {
    #[serde(default)]
    info: Option<serde_json::Value>,
    #[serde(default)]
    frames: Option<Vec<CaptureFrame>>,
}

/// Parse and validate a capture document
///
/// Expected layout:
/// ```json
/// { "info": { ... }, "frames": [ { "frame": ..., "report": ... }, ... ] }
/// ```
/// where `frame` and `report` are either bare objects or `[kind, data]` pairs.
pub fn parse_capture(data: &[u8]) -> Result<Capture, LoadError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(LoadError::NoContent);
    }

    let raw: RawCapture = serde_json::from_slice(data)?;

    let info = match raw.info {
        Some(info) if !info.is_null() => info,
        _ => return Err(LoadError::MissingInfo),
    };
    let frames = match raw.frames {
        Some(frames) if !frames.is_empty() => frames,
        _ => return Err(LoadError::NoFrames),
    };

    debug!("Parsed capture with {} frames", frames.len());
    Ok(Capture { info, frames })
}

/// Read a capture file from disk and validate it
pub fn load_json(path: &Path) -> Result<Capture, LoadError> {
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_capture(&data)
}
