use tracing::debug;

use crate::core::{TouchReport, MAX_CONTACTS};
use crate::trace::{SlotState, TraceError, TracePoint, TraceSnapshot};

/// Per-slot trace buffers being built up frame by frame
///
/// A touch on an `Empty` slot restarts its buffer; a touch on an `Active`
/// or `Lingering` slot extends it. A slot that misses one frame lingers,
/// a slot that misses two in a row goes back to `Empty`. The buffer of an
/// `Empty` slot is kept until the next touch on it.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    states: [SlotState; MAX_CONTACTS],
    buffers: [Vec<TracePoint>; MAX_CONTACTS],
    frames_processed: usize,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self {
            states: [SlotState::Empty; MAX_CONTACTS],
            buffers: Default::default(),
            frames_processed: 0,
        }
    }

    /// Current state of each slot
    pub fn states(&self) -> &[SlotState; MAX_CONTACTS] {
        &self.states
    }

    /// Advance by one frame and return the snapshot for it
    pub fn push_frame(&mut self, report: &TouchReport) -> Result<TraceSnapshot, TraceError> {
        let frame = self.frames_processed;

        // Validate before touching any slot so a bad frame leaves no trace
        if let Some(bad) = report.contacts().iter().find(|c| c.slot().is_none()) {
            return Err(TraceError::OutOfRangeContact {
                frame,
                object_index: bad.object_index,
            });
        }

        let mut touched = [false; MAX_CONTACTS];
        for contact in report.contacts() {
            let Some(slot) = contact.slot() else {
                continue;
            };
            let buffer = &mut self.buffers[slot];
            if self.states[slot] == SlotState::Empty {
                buffer.clear();
            }
            buffer.push(TracePoint::new(contact.x_meas, contact.y_meas));
            self.states[slot] = SlotState::Active;
            touched[slot] = true;
        }

        for (state, touched) in self.states.iter_mut().zip(touched) {
            if touched {
                continue;
            }
            *state = match *state {
                SlotState::Active => SlotState::Lingering,
                SlotState::Lingering | SlotState::Empty => SlotState::Empty,
            };
        }

        self.frames_processed += 1;
        Ok(self.snapshot())
    }

    /// Deep copy of all ten buffers
    pub fn snapshot(&self) -> TraceSnapshot {
        TraceSnapshot::new(self.buffers.clone())
    }
}

/// Reconstruct per-contact traces for a whole session
///
/// Returns one snapshot per input frame, in frame order. Fails on the first
/// contact whose `objectIndex` is outside the slot range.
pub fn reconstruct(reports: &[TouchReport]) -> Result<Vec<TraceSnapshot>, TraceError> {
    let mut builder = TraceBuilder::new();
    let snapshots = reports
        .iter()
        .map(|report| builder.push_frame(report))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Reconstructed traces for {} frames", snapshots.len());
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Contact;

    fn frame(contacts: &[(i64, f64, f64)]) -> TouchReport {
        TouchReport::new(
            contacts
                .iter()
                .map(|&(index, x, y)| Contact::new(index, x, y))
                .collect(),
        )
    }

    fn touch(index: i64, x: f64) -> TouchReport {
        frame(&[(index, x, x * 2.0)])
    }

    #[test]
    fn test_one_snapshot_per_frame() {
        let reports = vec![touch(0, 1.0), frame(&[]), touch(4, 2.0), frame(&[])];
        let snapshots = reconstruct(&reports).unwrap();
        assert_eq!(snapshots.len(), reports.len());

        assert!(reconstruct(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_first_touch_starts_single_point_trace() {
        let snapshots = reconstruct(&[touch(7, 3.0)]).unwrap();
        assert_eq!(snapshots[0].trace(7), &[TracePoint::new(3.0, 6.0)]);
        for slot in (0..MAX_CONTACTS).filter(|&s| s != 7) {
            assert!(snapshots[0].trace(slot).is_empty());
        }
    }

    #[test]
    fn test_consecutive_touches_extend_trace() {
        let snapshots = reconstruct(&[touch(1, 1.0), touch(1, 2.0), touch(1, 3.0)]).unwrap();
        assert_eq!(snapshots[0].trace(1).len(), 1);
        assert_eq!(snapshots[1].trace(1).len(), 2);
        assert_eq!(
            snapshots[2].trace(1),
            &[
                TracePoint::new(1.0, 2.0),
                TracePoint::new(2.0, 4.0),
                TracePoint::new(3.0, 6.0)
            ]
        );
    }

    #[test]
    fn test_single_frame_gap_tolerated() {
        let snapshots = reconstruct(&[touch(2, 1.0), frame(&[]), touch(2, 5.0)]).unwrap();
        assert_eq!(snapshots[2].trace(2).len(), 2);
        assert_eq!(snapshots[2].trace(2)[0], TracePoint::new(1.0, 2.0));
    }

    #[test]
    fn test_two_frame_gap_resets_trace() {
        let snapshots =
            reconstruct(&[touch(2, 1.0), frame(&[]), frame(&[]), touch(2, 5.0)]).unwrap();
        assert_eq!(snapshots[3].trace(2), &[TracePoint::new(5.0, 10.0)]);
    }

    #[test]
    fn test_empty_slot_retains_trace_until_next_touch() {
        let snapshots =
            reconstruct(&[touch(5, 1.0), touch(5, 2.0), frame(&[]), frame(&[])]).unwrap();
        // Slot is empty again by frame 3 but still holds its last trace
        assert_eq!(snapshots[3].trace(5).len(), 2);
    }

    #[test]
    fn test_snapshots_are_independent_copies() {
        let snapshots = reconstruct(&[touch(0, 1.0), touch(0, 2.0)]).unwrap();
        assert_eq!(snapshots[0].trace(0).len(), 1);
        assert_eq!(snapshots[1].trace(0).len(), 2);
    }

    #[test]
    fn test_slot_state_transitions() {
        let mut builder = TraceBuilder::new();
        builder.push_frame(&touch(3, 1.0)).unwrap();
        assert_eq!(builder.states()[3], SlotState::Active);

        builder.push_frame(&frame(&[])).unwrap();
        assert_eq!(builder.states()[3], SlotState::Lingering);

        builder.push_frame(&frame(&[])).unwrap();
        assert_eq!(builder.states()[3], SlotState::Empty);

        builder.push_frame(&touch(3, 1.0)).unwrap();
        assert_eq!(builder.states()[3], SlotState::Active);
        assert_eq!(builder.snapshot().trace(3).len(), 1);
    }

    #[test]
    fn test_gap_scenarios_on_slot_two() {
        let tolerated = reconstruct(&[touch(2, 1.0), frame(&[]), touch(2, 2.0)]).unwrap();
        assert_eq!(tolerated.len(), 3);
        assert_eq!(tolerated[2].trace(2).len(), 2);

        let reset =
            reconstruct(&[touch(2, 1.0), frame(&[]), frame(&[]), touch(2, 2.0)]).unwrap();
        assert_eq!(reset.len(), 4);
        assert_eq!(reset[3].trace(2).len(), 1);
    }

    #[test]
    fn test_multiple_slots_tracked_independently() {
        let snapshots = reconstruct(&[
            frame(&[(0, 1.0, 1.0), (1, 9.0, 9.0)]),
            frame(&[(1, 8.0, 8.0)]),
            frame(&[(1, 7.0, 7.0)]),
            frame(&[(0, 2.0, 2.0), (1, 6.0, 6.0)]),
        ])
        .unwrap();
        assert_eq!(snapshots[3].trace(0), &[TracePoint::new(2.0, 2.0)]);
        assert_eq!(snapshots[3].trace(1).len(), 4);
    }

    #[test]
    fn test_out_of_range_contact_fails() {
        let err = reconstruct(&[touch(0, 1.0), touch(10, 1.0)]).unwrap_err();
        assert_eq!(
            err,
            TraceError::OutOfRangeContact {
                frame: 1,
                object_index: 10
            }
        );

        let err = reconstruct(&[touch(-1, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            TraceError::OutOfRangeContact {
                frame: 0,
                object_index: -1
            }
        ));
    }

    #[test]
    fn test_same_slot_twice_in_one_frame_appends() {
        let snapshots = reconstruct(&[frame(&[(4, 1.0, 1.0), (4, 2.0, 2.0)])]).unwrap();
        assert_eq!(snapshots[0].trace(4).len(), 2);
    }
}
