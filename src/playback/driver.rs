use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::playback::{
    Effect, PlaybackConfig, PlaybackController, PlaybackError, PlaybackSession, PlaybackSpeed,
    PlaybackView,
};

/// Queue depth for user commands
const COMMAND_QUEUE: usize = 32;

enum Command {
    Load(Box<PlaybackSession>),
    TogglePlay,
    Stop,
    SetSpeed(PlaybackSpeed),
    Seek(usize),
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<PlaybackView, PlaybackError>>,
}

/// Callbacks coming back from timer tasks
enum TimerEvent {
    Tick { generation: u64, seq: u64 },
    Reset { generation: u64 },
}

/// Task that owns the playback controller and runs its timers
///
/// All state changes go through this task, so the controller needs no
/// locking. Views observe it through the `watch` channel handed out by
/// [`PlaybackHandle::subscribe`].
pub struct PlaybackDriver {
    controller: PlaybackController,
    commands: mpsc::Receiver<Request>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    view_tx: watch::Sender<PlaybackView>,
    pending_tick: Option<JoinHandle<()>>,
    /// Bumped on every schedule/cancel so a tick that fired before its
    /// task was aborted cannot advance the index twice
    tick_seq: u64,
}

impl PlaybackDriver {
    /// Create a driver and its handle without starting it
    pub fn new(config: PlaybackConfig) -> (PlaybackHandle, Self) {
        let controller = PlaybackController::new(config);
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(controller.view());

        let handle = PlaybackHandle {
            commands: command_tx,
            view: view_rx,
        };
        let driver = Self {
            controller,
            commands,
            timer_tx,
            timer_rx,
            view_tx,
            pending_tick: None,
            tick_seq: 0,
        };
        (handle, driver)
    }

    /// Spawn the driver on the current tokio runtime
    pub fn spawn(config: PlaybackConfig) -> PlaybackHandle {
        let (handle, driver) = Self::new(config);
        tokio::spawn(driver.run());
        handle
    }

    /// Serve commands and timer events until every handle is dropped
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.timer_rx.recv() => self.handle_timer(event),
                request = self.commands.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }

        self.cancel_tick();
        debug!("Playback driver stopped");
    }

    fn handle_request(&mut self, request: Request) {
        // A new command means views have had their turn with the new bounds
        if self.controller.flush_reset() {
            self.publish();
        }

        let result = match request.command {
            Command::Load(session) => Ok(self.controller.load(*session)),
            Command::TogglePlay => self.controller.toggle_play(),
            Command::Stop => Ok(self.controller.stop()),
            Command::SetSpeed(speed) => {
                self.controller.set_speed(speed);
                Ok(Vec::new())
            }
            Command::Seek(index) => self.controller.seek(index).map(|_| Vec::new()),
        };

        let reply = match result {
            Ok(effects) => {
                // Publish first so views see the new bounds before any
                // deferred reset lands
                self.publish();
                self.apply(effects);
                Ok(self.controller.view())
            }
            Err(e) => {
                debug!("Playback command rejected: {}", e);
                Err(e)
            }
        };

        // Caller may have given up waiting
        let _ = request.reply.send(reply);
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        let result = match event {
            TimerEvent::Tick { seq, .. } if seq != self.tick_seq => return,
            TimerEvent::Tick { generation, .. } => {
                self.pending_tick = None;
                self.controller.tick(generation)
            }
            TimerEvent::Reset { generation } => {
                self.controller.apply_reset(generation).map(|_| Vec::new())
            }
        };

        match result {
            Ok(effects) => {
                self.apply(effects);
                self.publish();
            }
            Err(PlaybackError::StaleGeneration { tick, current }) => {
                trace!("Dropped timer from generation {} (current {})", tick, current);
            }
            Err(e) => warn!("Unexpected timer failure: {}", e),
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScheduleTick { generation, delay } => {
                    self.schedule_tick(generation, delay)
                }
                Effect::CancelTick => self.cancel_tick(),
                Effect::DeferReset { generation } => {
                    let timer_tx = self.timer_tx.clone();
                    tokio::spawn(async move {
                        tokio::task::yield_now().await;
                        let _ = timer_tx.send(TimerEvent::Reset { generation });
                    });
                }
            }
        }
    }

    fn schedule_tick(&mut self, generation: u64, delay: Duration) {
        self.cancel_tick();
        let seq = self.tick_seq;
        let timer_tx = self.timer_tx.clone();
        self.pending_tick = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timer_tx.send(TimerEvent::Tick { generation, seq });
        }));
    }

    fn cancel_tick(&mut self) {
        self.tick_seq = self.tick_seq.wrapping_add(1);
        if let Some(task) = self.pending_tick.take() {
            task.abort();
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.controller.view());
    }
}

/// Cloneable front end to a running [`PlaybackDriver`]
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<Request>,
    view: watch::Receiver<PlaybackView>,
}

impl PlaybackHandle {
    async fn request(&self, command: Command) -> Result<PlaybackView, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| PlaybackError::Closed)?;
        response.await.map_err(|_| PlaybackError::Closed)?
    }

    /// Install a new session. Playback stops and the index returns to 0.
    pub async fn load(&self, session: PlaybackSession) -> Result<(), PlaybackError> {
        self.request(Command::Load(Box::new(session))).await?;
        Ok(())
    }

    /// Flip between playing and paused; returns whether playback is now running
    pub async fn toggle_play(&self) -> Result<bool, PlaybackError> {
        Ok(self.request(Command::TogglePlay).await?.running)
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.request(Command::Stop).await?;
        Ok(())
    }

    pub async fn set_speed(&self, speed: PlaybackSpeed) -> Result<(), PlaybackError> {
        self.request(Command::SetSpeed(speed)).await?;
        Ok(())
    }

    /// Jump to a frame while paused; returns the clamped index
    pub async fn seek(&self, index: usize) -> Result<usize, PlaybackError> {
        Ok(self.request(Command::Seek(index)).await?.frame_index)
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<PlaybackView> {
        self.view.clone()
    }

    /// Latest published state
    pub fn view(&self) -> PlaybackView {
        self.view.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AdcFrame, CaptureFrame, Contact, TouchReport};
    use crate::input::Capture;
    use crate::playback::PlaybackState;

    fn session(num_frames: usize) -> PlaybackSession {
        let frames = (0..num_frames)
            .map(|i| CaptureFrame {
                adc: AdcFrame::new(vec![vec![i as f64]]),
                report: TouchReport::new(vec![Contact::new(1, i as f64, i as f64)]),
            })
            .collect();
        PlaybackSession::from_capture(Capture {
            info: serde_json::json!({}),
            frames,
        })
        .unwrap()
    }

    async fn loaded(num_frames: usize) -> PlaybackHandle {
        let handle = PlaybackDriver::spawn(PlaybackConfig::default());
        handle.load(session(num_frames)).await.unwrap();
        handle
            .subscribe()
            .wait_for(|v| v.frame_index == 0)
            .await
            .unwrap();
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_view_has_no_data() {
        let handle = PlaybackDriver::spawn(PlaybackConfig::default());
        let view = handle.view();
        assert_eq!(view.state(), PlaybackState::NoData);
        assert_eq!(handle.toggle_play().await, Err(PlaybackError::NoSession));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_settles_at_frame_zero() {
        let handle = loaded(4).await;
        let view = handle.view();
        assert_eq!(view.num_frames, 4);
        assert_eq!(view.frame_index, 0);
        assert!(!view.running);
        assert_eq!(view.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_advances_on_timer() {
        let handle = loaded(10).await;
        assert!(handle.toggle_play().await.unwrap());

        tokio::time::sleep(Duration::from_millis(75)).await;
        assert_eq!(handle.view().frame_index, 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.view().frame_index, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_loops_to_start() {
        let handle = loaded(3).await;
        assert_eq!(handle.seek(2).await, Ok(2));
        handle.toggle_play().await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let view = handle.view();
        assert_eq!(view.frame_index, 0);
        assert!(view.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_rejected_while_playing() {
        let handle = loaded(10).await;
        handle.toggle_play().await.unwrap();
        assert_eq!(handle.seek(5).await, Err(PlaybackError::SeekWhilePlaying));

        assert!(!handle.toggle_play().await.unwrap());
        assert_eq!(handle.seek(50).await, Ok(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_keeps_index() {
        let handle = loaded(10).await;
        handle.toggle_play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.toggle_play().await.unwrap();

        let paused_at = handle.view().frame_index;
        assert_eq!(paused_at, 2);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.view().frame_index, paused_at);
        assert_eq!(handle.view().state(), PlaybackState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_to_zero() {
        let handle = loaded(10).await;
        handle.toggle_play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.stop().await.unwrap();

        handle
            .subscribe()
            .wait_for(|v| v.frame_index == 0)
            .await
            .unwrap();
        let view = handle.view();
        assert!(!view.running);
        assert_eq!(view.state(), PlaybackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_invalidates_old_timer() {
        let handle = loaded(8).await;
        handle.toggle_play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(handle.view().frame_index, 2);

        handle.load(session(3)).await.unwrap();
        let view = handle.view();
        assert!(view.frame_index < view.num_frames);
        assert_eq!(view.num_frames, 3);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let view = handle.view();
        assert_eq!(view.generation, 2);
        assert_eq!(view.frame_index, 0);
        assert!(!view.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_change_shortens_delay() {
        let handle = loaded(20).await;
        handle.set_speed(PlaybackSpeed::Quadruple).await.unwrap();
        handle.toggle_play().await.unwrap();

        // 12.5ms per frame at 4x
        tokio::time::sleep(Duration::from_millis(55)).await;
        assert_eq!(handle.view().frame_index, 4);
        assert_eq!(handle.view().speed, PlaybackSpeed::Quadruple);
    }

    #[tokio::test(start_paused = true)]
    async fn test_views_share_frame_index() {
        let handle = loaded(5).await;
        let mut adc_view = handle.subscribe();
        let mut touch_view = handle.subscribe();

        handle.seek(3).await.unwrap();
        adc_view.changed().await.unwrap();
        touch_view.changed().await.unwrap();

        let adc = adc_view.borrow_and_update().clone();
        let touch = touch_view.borrow_and_update().clone();
        assert_eq!(adc.frame_index, touch.frame_index);
        assert_eq!(adc.frame().unwrap().adc.image, vec![vec![3.0]]);
        assert_eq!(touch.frame().unwrap().traces.trace(1).len(), 4);
    }

    #[tokio::test]
    async fn test_closed_driver() {
        let (handle, driver) = PlaybackDriver::new(PlaybackConfig::default());
        drop(driver);
        assert_eq!(handle.stop().await, Err(PlaybackError::Closed));
    }
}
