pub mod engine;

pub use engine::{reconstruct, TraceBuilder};

use crate::core::MAX_CONTACTS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tracking state of one object slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Next touch starts a fresh trace
    Empty,
    /// Touched in the current frame
    Active,
    /// Touched in the previous frame only; one frame of grace
    Lingering,
}

/// One position in a trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub x: f64,
    pub y: f64,
}

impl TracePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// All ten slot traces as they stood after one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    slots: [Vec<TracePoint>; MAX_CONTACTS],
}

impl TraceSnapshot {
    pub fn new(slots: [Vec<TracePoint>; MAX_CONTACTS]) -> Self {
        Self { slots }
    }

    /// Trace held by `slot`. Panics if `slot >= MAX_CONTACTS`.
    pub fn trace(&self, slot: usize) -> &[TracePoint] {
        &self.slots[slot]
    }

    pub fn slots(&self) -> &[Vec<TracePoint>; MAX_CONTACTS] {
        &self.slots
    }

    /// X coordinates of a slot's trace, for plotting
    pub fn x_trace(&self, slot: usize) -> impl Iterator<Item = f64> + '_ {
        self.slots[slot].iter().map(|p| p.x)
    }

    /// Y coordinates of a slot's trace, for plotting
    pub fn y_trace(&self, slot: usize) -> impl Iterator<Item = f64> + '_ {
        self.slots[slot].iter().map(|p| p.y)
    }

    /// Slots holding at least one point
    pub fn non_empty_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CONTACTS).filter(|&slot| !self.slots[slot].is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("frame {frame}: contact objectIndex {object_index} is outside slots 0-9")]
    OutOfRangeContact { frame: usize, object_index: i64 },
}
