//! Departure board compositing and animation engine.
//!
//! A fixed-size pixel display is split into independently animated
//! sections. Each section shows some content that may scroll, pause and
//! cycle through multi-phase movements. A dedicated animator thread ticks
//! the board on a fixed time step and pushes every frame to a renderer
//! (an RGB LED matrix or a software emulator).
//!
//! This module holds the types shared by everything else:
//! - Board geometry and tick configuration
//! - Colors and pixels
//! - The shared, lock-protected board
//! - The shutdown signal used for cooperative cancellation

pub mod animator;
pub mod board;
pub mod movement;
pub mod protocol;
pub mod renderer;
pub mod server;
pub mod updater;

use board::Board;
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// ── Board configuration ────────────────────────────────────────────

/// Display size and animation step of the board.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (a handful of integers), so it
/// can be handed to the animator thread and to the HTTP state by value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardConfig {
    pub width: u32,
    pub height: u32,
    /// Animator tick step in milliseconds
    pub tick_ms: u64,
}

impl BoardConfig {
    pub fn new(width: u32, height: u32, tick_ms: u64) -> Self {
        Self {
            width,
            height,
            tick_ms,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Three full-width rows stacked with 1-pixel gaps.
    ///
    /// For the default 192x32 display this gives rows at y=0, y=11 and
    /// y=22, each 10 pixels high.
    pub fn three_row_layout(&self) -> Vec<SectionArea> {
        let width = self.width as i32;
        let row_h = (self.height.saturating_sub(2) / 3) as i32;

        (0..3)
            .map(|row| SectionArea::new(0, row * (row_h + 1), width, row_h))
            .collect()
    }

    /// Create a board with the three-row layout and empty sections.
    pub fn build_board(&self) -> Board {
        Board::with_empty_sections(
            self.width as i32,
            self.height as i32,
            &self.three_row_layout(),
        )
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 192,
            height: 32,
            tick_ms: 50,
        }
    }
}

/// Placement of a section on the display, in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct SectionArea {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl SectionArea {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// Renderers convert it at their boundary (`Into<LedColor>` for the
/// matrix, `image::Rgb` for the emulator).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(c: Color) -> Self {
        image::Rgb([c.r, c.g, c.b])
    }
}

/// A single lit pixel. Coordinates are relative to whatever owns the
/// pixel: content-local inside a `SectionContent`, absolute on the display
/// once a section has placed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl Pixel {
    pub const fn new(x: i32, y: i32, color: Color) -> Self {
        Self { x, y, color }
    }

    /// The same pixel moved by `(dx, dy)`, or `None` if that leaves the
    /// `i32` coordinate space.
    pub fn translated(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            color: self.color,
        })
    }
}

// ── Shared board ───────────────────────────────────────────────────

/// The board shared between the animator thread and request handlers.
///
/// Every read-modify sequence against the board (a tick, or a batch of
/// section updates) holds this lock for its whole critical section.
pub type SharedBoard = Arc<Mutex<Board>>;

pub fn shared_board(board: Board) -> SharedBoard {
    Arc::new(Mutex::new(board))
}

/// Lock the board, recovering it if a previous holder panicked.
///
/// Board mutations never leave a section half-updated, so the inner value
/// is still usable after a poisoning panic.
pub fn lock_board(board: &SharedBoard) -> MutexGuard<'_, Board> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Shutdown signal ────────────────────────────────────────────────

/// Cross-thread cancellation token.
///
/// # Rust concept: Mutex + Condvar
/// An `AtomicBool` is enough to poll a "should I stop?" flag, but the
/// animator must also be woken up in the middle of its inter-tick sleep.
/// A `Condvar` paired with the flag's `Mutex` lets a waiting thread sleep
/// with a timeout and return as soon as another thread triggers it.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every waiter. Idempotent.
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for at most `timeout`. Returns `true` if the signal was raised
    /// (before or during the wait).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Block until the signal is raised.
    pub fn wait(&self) {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = cvar
            .wait_while(guard, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Set up a Ctrl+C handler that raises `shutdown`.
pub fn setup_signal_handler(shutdown: &Shutdown) -> Result<(), ctrlc::Error> {
    let s = shutdown.clone();

    ctrlc::set_handler(move || {
        tracing::info!("received interrupt signal");
        s.trigger();
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Instant;

    // ── BoardConfig tests ──────────────────────────────────────────

    #[test]
    fn board_config_default_is_192x32_at_50ms() {
        let config = BoardConfig::default();
        assert_eq!(config.width, 192);
        assert_eq!(config.height, 32);
        assert_eq!(config.tick(), Duration::from_millis(50));
    }

    #[test]
    fn default_layout_is_three_rows_with_gaps() {
        let areas = BoardConfig::default().three_row_layout();
        assert_eq!(
            areas,
            vec![
                SectionArea::new(0, 0, 192, 10),
                SectionArea::new(0, 11, 192, 10),
                SectionArea::new(0, 22, 192, 10),
            ]
        );
    }

    #[rstest]
    #[case(32, 10)]
    #[case(17, 5)]
    #[case(2, 0)]
    #[case(0, 0)]
    fn layout_row_height(#[case] height: u32, #[case] row_h: i32) {
        let areas = BoardConfig::new(64, height, 50).three_row_layout();
        assert!(areas.iter().all(|a| a.h == row_h));
    }

    #[test]
    fn build_board_has_three_sections() {
        let board = BoardConfig::default().build_board();
        assert_eq!(board.sections().len(), 3);
        assert_eq!(board.width(), 192);
        assert_eq!(board.height(), 32);
    }

    #[test]
    fn zero_tick_is_clamped() {
        assert_eq!(BoardConfig::new(8, 8, 0).tick(), Duration::from_millis(1));
    }

    // ── Color tests ────────────────────────────────────────────────

    #[test]
    fn apply_brightness_100_is_identity() {
        let c = Color::new(100, 200, 50);
        assert_eq!(c.apply_brightness(100), c);
    }

    #[test]
    fn apply_brightness_0_is_black() {
        assert_eq!(Color::WHITE.apply_brightness(0), Color::BLACK);
    }

    #[test]
    fn apply_brightness_50_halves() {
        let c = Color::new(200, 100, 50);
        assert_eq!(c.apply_brightness(50), Color::new(100, 50, 25));
    }

    #[test]
    fn pixel_translated_keeps_color() {
        let p = Pixel::new(1, 2, Color::WHITE).translated(10, -3);
        assert_eq!(p, Some(Pixel::new(11, -1, Color::WHITE)));
    }

    #[test]
    fn pixel_translated_out_of_range_is_none() {
        assert_eq!(Pixel::new(i32::MAX, 0, Color::WHITE).translated(5, 0), None);
        assert_eq!(Pixel::new(0, i32::MIN, Color::WHITE).translated(0, -1), None);
    }

    // ── Shutdown tests ─────────────────────────────────────────────

    #[test]
    fn shutdown_wait_times_out_when_not_triggered() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(5)));
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn shutdown_already_triggered_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let start = Instant::now();
        assert!(shutdown.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn shutdown_wakes_waiter_from_other_thread() {
        let shutdown = Shutdown::new();
        let s = shutdown.clone();
        let waiter = std::thread::spawn(move || s.wait_timeout(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(10));
        shutdown.trigger();

        assert!(waiter.join().unwrap());
    }
}
