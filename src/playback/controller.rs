use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{AdcFrame, TouchReport};
use crate::playback::{PlaybackConfig, PlaybackError, PlaybackSession, PlaybackSpeed, PlaybackState};
use crate::trace::TraceSnapshot;

/// Timer work requested by the controller
///
/// The controller never sleeps or spawns; whoever drives it executes these
/// and feeds the results back through [`PlaybackController::tick`] and
/// [`PlaybackController::apply_reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Call `tick(generation)` after `delay`, replacing any pending tick
    ScheduleTick { generation: u64, delay: Duration },
    /// Drop the pending tick, if any
    CancelTick,
    /// Call `apply_reset(generation)` after one scheduler turn
    DeferReset { generation: u64 },
}

/// Frame-synchronized playback state for the ADC and touch views
pub struct PlaybackController {
    session: Option<Arc<PlaybackSession>>,
    generation: u64,
    running: bool,
    frame_index: usize,
    /// Set by `load`/`stop` until the index has been zeroed
    pending_reset: bool,
    speed: PlaybackSpeed,
    frame_interval: Duration,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}

impl PlaybackController {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            session: None,
            generation: 0,
            running: false,
            frame_index: 0,
            pending_reset: false,
            speed: config.speed,
            frame_interval: config.frame_interval,
        }
    }

    /// Get current playback position
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Get total number of frames, 0 without a session
    pub fn num_frames(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.num_frames())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn session(&self) -> Option<&Arc<PlaybackSession>> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        derive_state(self.session.is_some(), self.running, self.frame_index)
    }

    /// Delay the next scheduled tick will use
    pub fn frame_delay(&self) -> Duration {
        self.speed.frame_delay(self.frame_interval)
    }

    /// Install a new session
    ///
    /// The new bounds are visible immediately, with the old index clamped
    /// into them; the index itself goes to 0 once the returned deferred
    /// reset is applied.
    pub fn load(&mut self, mut session: PlaybackSession) -> Vec<Effect> {
        self.generation += 1;
        session.generation = self.generation;

        let num_frames = session.num_frames();
        self.session = Some(Arc::new(session));
        self.running = false;
        self.frame_index = self.frame_index.min(num_frames.saturating_sub(1));
        self.pending_reset = true;

        info!(
            "Session generation {} installed ({} frames)",
            self.generation, num_frames
        );
        vec![
            Effect::CancelTick,
            Effect::DeferReset {
                generation: self.generation,
            },
        ]
    }

    /// Start or pause playback
    pub fn toggle_play(&mut self) -> Result<Vec<Effect>, PlaybackError> {
        match &self.session {
            None => return Err(PlaybackError::NoSession),
            Some(session) if session.num_frames() == 0 => return Err(PlaybackError::NoFrames),
            Some(_) => {}
        }

        self.running = !self.running;
        debug!(
            "Playback {} at frame {}",
            if self.running { "started" } else { "paused" },
            self.frame_index
        );

        if self.running {
            Ok(vec![self.schedule_tick()])
        } else {
            Ok(vec![Effect::CancelTick])
        }
    }

    /// Stop playback; the index returns to 0 after one scheduler turn
    pub fn stop(&mut self) -> Vec<Effect> {
        self.running = false;
        self.pending_reset = true;
        vec![
            Effect::CancelTick,
            Effect::DeferReset {
                generation: self.generation,
            },
        ]
    }

    /// Change speed. A tick already scheduled keeps its delay.
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
    }

    /// Jump to a frame, clamped into range. Rejected while playing.
    pub fn seek(&mut self, index: usize) -> Result<usize, PlaybackError> {
        if self.running {
            return Err(PlaybackError::SeekWhilePlaying);
        }
        let num_frames = self.num_frames();
        if self.session.is_none() {
            return Err(PlaybackError::NoSession);
        }
        if num_frames == 0 {
            return Err(PlaybackError::NoFrames);
        }

        self.frame_index = index.min(num_frames - 1);
        Ok(self.frame_index)
    }

    /// Advance one frame, looping back to 0 after the last one
    pub fn tick(&mut self, generation: u64) -> Result<Vec<Effect>, PlaybackError> {
        self.check_generation(generation)?;

        let num_frames = self.num_frames();
        if !self.running || num_frames == 0 {
            return Ok(Vec::new());
        }

        self.frame_index = (self.frame_index + 1) % num_frames;
        Ok(vec![self.schedule_tick()])
    }

    /// Second half of `load` / `stop`. Returns false if the reset was
    /// already flushed by a later command.
    pub fn apply_reset(&mut self, generation: u64) -> Result<bool, PlaybackError> {
        self.check_generation(generation)?;
        if !self.pending_reset {
            return Ok(false);
        }
        self.pending_reset = false;
        self.frame_index = 0;
        Ok(true)
    }

    /// Apply a pending reset now, ahead of a newer command
    pub fn flush_reset(&mut self) -> bool {
        self.apply_reset(self.generation).unwrap_or(false)
    }

    /// Read-only snapshot for renderers
    pub fn view(&self) -> PlaybackView {
        PlaybackView {
            generation: self.generation,
            running: self.running,
            frame_index: self.frame_index,
            num_frames: self.num_frames(),
            speed: self.speed,
            session: self.session.clone(),
        }
    }

    fn schedule_tick(&self) -> Effect {
        Effect::ScheduleTick {
            generation: self.generation,
            delay: self.frame_delay(),
        }
    }

    fn check_generation(&self, generation: u64) -> Result<(), PlaybackError> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(PlaybackError::StaleGeneration {
                tick: generation,
                current: self.generation,
            })
        }
    }
}

fn derive_state(loaded: bool, running: bool, frame_index: usize) -> PlaybackState {
    match (loaded, running) {
        (false, _) => PlaybackState::NoData,
        (true, true) => PlaybackState::Playing,
        (true, false) if frame_index == 0 => PlaybackState::Stopped,
        (true, false) => PlaybackState::Paused,
    }
}

/// What every view reads: one shared frame index plus the session data
#[derive(Debug, Clone, Default)]
pub struct PlaybackView {
    pub generation: u64,
    pub running: bool,
    pub frame_index: usize,
    pub num_frames: usize,
    pub speed: PlaybackSpeed,
    pub session: Option<Arc<PlaybackSession>>,
}

impl PlaybackView {
    pub fn state(&self) -> PlaybackState {
        derive_state(self.session.is_some(), self.running, self.frame_index)
    }

    /// Data for the current frame
    pub fn frame(&self) -> Option<FrameView<'_>> {
        let session = self.session.as_deref()?;
        Some(FrameView {
            index: self.frame_index,
            adc: session.adc_frames().get(self.frame_index)?,
            report: session.reports().get(self.frame_index)?,
            traces: session.traces().get(self.frame_index)?,
        })
    }

    /// Playback progress in `[0, 1]`, shown in place of the scrubber while running
    pub fn progress(&self) -> f64 {
        if self.num_frames <= 1 {
            return 0.0;
        }
        self.frame_index as f64 / (self.num_frames - 1) as f64
    }
}

/// One frame as seen by the ADC and touch views
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub index: usize,
    pub adc: &'a AdcFrame,
    pub report: &'a TouchReport,
    pub traces: &'a TraceSnapshot,
}
