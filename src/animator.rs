//! Animator thread: ticks the board on a fixed step and renders each frame.
//!
//! Lifecycle: `Animator` (idle) → `AnimatorHandle` (running) → stopped.
//! The renderer lives entirely on the animator thread: it is built,
//! initialised, fed frames, and terminated there.
//!
//! ## Non-drifting loop
//! Ticks are scheduled against a fixed timeline (`start + n * step`), not
//! "sleep one step after the previous tick", so a slow tick does not
//! push every later tick back. If a tick overruns by more than a full
//! step, the missed slots are skipped and logged. The time passed to
//! `Board::update` is the actual wall-clock time since the previous tick
//! started, so movements follow real time even when ticks jitter.
//!
//! ## Rust concepts
//! - `std::thread::Builder` for a named thread
//! - `mpsc::sync_channel` to report initialisation back to the caller
//! - `Instant::checked_duration_since` for "is this in the future?"

use crate::movement::MovementError;
use crate::renderer::{FrameSize, Renderer, RendererError};
use crate::{SharedBoard, Shutdown, lock_board};
use serde::Serialize;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// ── Status ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnimatorState {
    Idle,
    Running,
    Stopped,
}

/// Shared status that the HTTP server reads to report the animation loop.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct AnimatorStatus {
    pub state: AnimatorState,
    /// Frames rendered since start
    pub ticks: u64,
    /// Tick slots skipped because a tick took longer than the step
    pub overruns: u64,
    /// Time passed to the last board update, in ms
    pub last_delta_ms: u64,
}

impl AnimatorStatus {
    pub fn new() -> Self {
        Self {
            state: AnimatorState::Idle,
            ticks: 0,
            overruns: 0,
            last_delta_ms: 0,
        }
    }
}

impl Default for AnimatorStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedAnimatorStatus = Arc<Mutex<AnimatorStatus>>;

fn with_status(status: &SharedAnimatorStatus, f: impl FnOnce(&mut AnimatorStatus)) {
    f(&mut status.lock().unwrap_or_else(PoisonError::into_inner));
}

// ── Scheduling ───────────────────────────────────────────────────────

/// Advance `next_loop_start` past `now` in whole steps.
///
/// Returns the delay until the next tick and how many steps were added.
/// More than one step means that many minus one tick slots were missed.
pub fn schedule_next(next_loop_start: &mut Instant, step: Duration, now: Instant) -> (Duration, u32) {
    let mut added = 0;
    loop {
        let delay = next_loop_start.checked_duration_since(now);
        *next_loop_start += step;
        added += 1;
        if let Some(delay) = delay {
            return (delay, added);
        }
    }
}

// ── Animator ─────────────────────────────────────────────────────────

/// An animation loop that has not been started yet.
pub struct Animator {
    board: SharedBoard,
    step: Duration,
    shutdown: Shutdown,
    status: SharedAnimatorStatus,
}

impl Animator {
    pub fn new(board: SharedBoard, step: Duration, shutdown: Shutdown) -> Self {
        Self {
            board,
            step: step.max(Duration::from_millis(1)),
            shutdown,
            status: Arc::new(Mutex::new(AnimatorStatus::new())),
        }
    }

    /// Handle on the status this animator will keep updated.
    pub fn status(&self) -> SharedAnimatorStatus {
        self.status.clone()
    }

    /// Spawn the animator thread.
    ///
    /// `make_renderer` runs on the new thread, then the renderer is
    /// initialised with `size`. This call blocks until that has succeeded,
    /// and returns the renderer's error otherwise (the thread has exited
    /// by then and the board was never touched).
    pub fn start<F>(self, make_renderer: F, size: Option<FrameSize>) -> Result<AnimatorHandle, RendererError>
    where
        F: FnOnce() -> Result<Box<dyn Renderer>, RendererError> + Send + 'static,
    {
        let (init_tx, init_rx) = mpsc::sync_channel(1);
        let shutdown = self.shutdown.clone();
        let status = self.status.clone();

        let thread = thread::Builder::new()
            .name("board-animator".to_string())
            .spawn(move || {
                let renderer = make_renderer().and_then(|mut renderer| {
                    renderer.initialise(size)?;
                    Ok(renderer)
                });

                let mut renderer = match renderer {
                    Ok(renderer) => {
                        let _ = init_tx.send(Ok(()));
                        renderer
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                self.run(renderer.as_mut());

                if let Err(e) = renderer.terminate() {
                    tracing::error!("Failed to terminate renderer: {}", e);
                }
            })?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(AnimatorHandle {
                thread,
                shutdown,
                status,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(RendererError::Init(
                    "animator thread exited during renderer setup".to_string(),
                ))
            }
        }
    }

    fn run(&self, renderer: &mut dyn Renderer) {
        lock_board(&self.board).reset();
        with_status(&self.status, |s| s.state = AnimatorState::Running);

        let mut last_loop_start = Instant::now();
        let mut next_loop_start = last_loop_start + self.step;

        tracing::info!("Board animator running ({} ms step)", self.step.as_millis());

        while !self.shutdown.is_triggered() {
            let this_loop_start = Instant::now();

            if let Err(e) = self.tick(renderer, last_loop_start) {
                tracing::error!("Board animator stopping: {}", e);
                self.shutdown.trigger();
                break;
            }

            let (delay, added) = schedule_next(&mut next_loop_start, self.step, Instant::now());
            if added > 1 {
                let missed = added - 1;
                tracing::warn!("Exceeded animation loop step duration {} time(s)", missed);
                with_status(&self.status, |s| s.overruns += missed as u64);
            }

            if self.shutdown.wait_timeout(delay) {
                break;
            }
            last_loop_start = this_loop_start;
        }

        with_status(&self.status, |s| s.state = AnimatorState::Stopped);
        tracing::info!("Board animator stopped running");
    }

    /// Advance the board by the time since `last_loop_start` and render it,
    /// all under the board lock.
    fn tick(&self, renderer: &mut dyn Renderer, last_loop_start: Instant) -> Result<(), MovementError> {
        let mut board = lock_board(&self.board);

        let delta_ms = last_loop_start.elapsed().as_millis() as u64;
        board.update(delta_ms)?;

        // A failed frame is not fatal; the next tick draws a fresh one.
        if let Err(e) = renderer.render_frame(board.pixels()) {
            tracing::error!("Failed to render frame: {}", e);
        }

        with_status(&self.status, |s| {
            s.ticks += 1;
            s.last_delta_ms = delta_ms;
        });
        Ok(())
    }
}

/// A running animator.
pub struct AnimatorHandle {
    thread: JoinHandle<()>,
    shutdown: Shutdown,
    status: SharedAnimatorStatus,
}

impl AnimatorHandle {
    pub fn status(&self) -> AnimatorStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Raise the shutdown signal and wait for the thread to finish.
    pub fn stop(self) {
        self.shutdown.trigger();
        self.join();
    }

    /// Wait for the thread to finish (after the shutdown signal was raised
    /// elsewhere). The renderer has been terminated when this returns.
    pub fn join(self) {
        if self.thread.join().is_err() {
            tracing::error!("Board animator thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, BoardSection, SectionContent};
    use crate::movement::Movement;
    use crate::updater::{SectionUpdate, update_sections};
    use crate::{Color, Pixel, SectionArea, shared_board};
    use pretty_assertions::assert_eq;

    // ── Scheduling ───────────────────────────────────────────────────

    #[test]
    fn on_time_tick_waits_for_the_rest_of_the_step() {
        let base = Instant::now();
        let step = Duration::from_millis(50);
        let mut next = base + step;

        let (delay, added) = schedule_next(&mut next, step, base + Duration::from_millis(10));
        assert_eq!(delay, Duration::from_millis(40));
        assert_eq!(added, 1);
        assert_eq!(next, base + 2 * step);
    }

    #[test]
    fn late_tick_skips_missed_slots() {
        let base = Instant::now();
        let step = Duration::from_millis(50);
        let mut next = base + step;

        let (delay, added) = schedule_next(&mut next, step, base + Duration::from_millis(130));
        assert_eq!(delay, Duration::from_millis(20));
        assert_eq!(added, 3);
        assert_eq!(next, base + 4 * step);
    }

    #[test]
    fn tick_exactly_on_schedule_does_not_wait() {
        let base = Instant::now();
        let step = Duration::from_millis(50);
        let mut next = base + step;

        let (delay, added) = schedule_next(&mut next, step, base + step);
        assert_eq!(delay, Duration::ZERO);
        assert_eq!(added, 1);
    }

    // ── Thread ───────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct Recording {
        frames: Arc<Mutex<Vec<Vec<Pixel>>>>,
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    struct RecordingRenderer {
        recording: Recording,
        fail_init: bool,
    }

    impl Renderer for RecordingRenderer {
        fn initialise(&mut self, _size: Option<FrameSize>) -> Result<(), RendererError> {
            self.recording.events.lock().unwrap().push("initialise");
            if self.fail_init {
                return Err(RendererError::Init("no display".to_string()));
            }
            Ok(())
        }

        fn render_frame(&mut self, pixels: &[Pixel]) -> Result<(), RendererError> {
            self.recording.frames.lock().unwrap().push(pixels.to_vec());
            Ok(())
        }

        fn terminate(&mut self) -> Result<(), RendererError> {
            self.recording.events.lock().unwrap().push("terminate");
            Ok(())
        }
    }

    fn factory(
        recording: &Recording,
        fail_init: bool,
    ) -> impl FnOnce() -> Result<Box<dyn Renderer>, RendererError> + Send + 'static {
        let recording = recording.clone();
        move || Ok(Box::new(RecordingRenderer { recording, fail_init }) as Box<dyn Renderer>)
    }

    fn one_section_board() -> SharedBoard {
        let section = BoardSection::new(
            SectionArea::new(0, 0, 8, 1),
            SectionContent::new(vec![Pixel::new(0, 0, Color::WHITE)], 8, 1),
            // leftwards: the wrap keeps exactly one copy of the pixel on screen
            Movement::scrolling(5, 0, -1, 0),
        );
        shared_board(Board::new(8, 1, vec![section]))
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn animator_renders_until_stopped_then_terminates() {
        let recording = Recording::default();
        let animator = Animator::new(one_section_board(), Duration::from_millis(5), Shutdown::new());
        let status = animator.status();
        assert_eq!(status.lock().unwrap().state, AnimatorState::Idle);

        let handle = animator
            .start(factory(&recording, false), Some(FrameSize::new(8, 1)))
            .unwrap();

        assert!(wait_until(|| recording.frames.lock().unwrap().len() >= 3));
        assert_eq!(handle.status().state, AnimatorState::Running);
        handle.stop();

        assert_eq!(*recording.events.lock().unwrap(), vec!["initialise", "terminate"]);
        let status = status.lock().unwrap().clone();
        assert_eq!(status.state, AnimatorState::Stopped);
        assert!(status.ticks >= 3);

        // every frame shows the single content pixel somewhere on the row
        for frame in recording.frames.lock().unwrap().iter() {
            assert_eq!(frame.len(), 1);
            assert!((0..8).contains(&frame[0].x));
        }
    }

    #[test]
    fn failed_initialisation_is_reported_to_caller() {
        let recording = Recording::default();
        let shutdown = Shutdown::new();
        let animator = Animator::new(one_section_board(), Duration::from_millis(5), shutdown.clone());
        let status = animator.status();

        let result = animator.start(factory(&recording, true), None);
        assert!(matches!(result, Err(RendererError::Init(_))));
        assert!(recording.frames.lock().unwrap().is_empty());
        assert_eq!(status.lock().unwrap().state, AnimatorState::Idle);
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn updates_between_ticks_show_up_in_frames() {
        let recording = Recording::default();
        let board = shared_board(crate::BoardConfig::new(16, 8, 5).build_board());
        let shutdown = Shutdown::new();
        let handle = Animator::new(board.clone(), Duration::from_millis(5), shutdown.clone())
            .start(factory(&recording, false), None)
            .unwrap();

        let red = Color::new(255, 0, 0);
        update_sections(
            &board,
            vec![(
                1,
                SectionUpdate {
                    content: Some(SectionContent::new(vec![Pixel::new(3, 0, red)], 16, 2)),
                    movement: Some(Movement::none()),
                    continue_movement: false,
                },
            )],
        );

        // section 1 of a 16x8 board starts at y=3
        let expected = Pixel::new(3, 3, red);
        assert!(wait_until(|| {
            recording
                .frames
                .lock()
                .unwrap()
                .last()
                .is_some_and(|f| f.contains(&expected))
        }));

        shutdown.trigger();
        handle.join();
    }

    #[test]
    fn movement_contract_violation_stops_the_animator() {
        let recording = Recording::default();
        let board = one_section_board();
        let shutdown = Shutdown::new();
        let handle = Animator::new(board.clone(), Duration::from_millis(5), shutdown.clone())
            .start(factory(&recording, false), None)
            .unwrap();
        assert!(wait_until(|| handle.status().ticks >= 1));

        // replace the movement without resetting the section
        lock_board(&board)
            .section_mut(0)
            .unwrap()
            .update_movement(Movement::scrolling(5, 0, 1, 0));

        assert!(shutdown.wait_timeout(Duration::from_secs(5)));
        handle.join();
        assert_eq!(*recording.events.lock().unwrap(), vec!["initialise", "terminate"]);
    }
}
