//! Renderers: where finished frames go.
//!
//! The animator hands every frame (a list of lit pixels in display
//! coordinates) to a `Renderer`. Implementations:
//! - `ImageRenderer`: software emulator drawing into an in-memory image,
//!   served over HTTP as PNG and optionally saved at shutdown
//! - `LedMatrixRenderer` (feature `hardware`): an RGB LED matrix panel
//!
//! The renderer is created, used and torn down on the animator thread,
//! because the LED matrix C library is not thread-safe. Callers pass a
//! `RendererFactory` instead of a renderer.

pub mod image;
#[cfg(feature = "hardware")]
pub mod led_matrix;

use crate::Pixel;
use std::fmt;
use std::path::PathBuf;

pub use self::image::{FrameSnapshot, ImageRenderer, PixelStyle};

/// Logical display size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum RendererError {
    /// The display could not be set up.
    Init(String),
    /// A frame could not be drawn.
    Render(String),
    Io(std::io::Error),
    Image(::image::ImageError),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererError::Init(msg) => write!(f, "renderer initialisation failed: {msg}"),
            RendererError::Render(msg) => write!(f, "frame rendering failed: {msg}"),
            RendererError::Io(e) => write!(f, "I/O error: {e}"),
            RendererError::Image(e) => write!(f, "image error: {e}"),
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RendererError::Io(e) => Some(e),
            RendererError::Image(e) => Some(e),
            RendererError::Init(_) | RendererError::Render(_) => None,
        }
    }
}

impl From<std::io::Error> for RendererError {
    fn from(e: std::io::Error) -> Self {
        RendererError::Io(e)
    }
}

impl From<::image::ImageError> for RendererError {
    fn from(e: ::image::ImageError) -> Self {
        RendererError::Image(e)
    }
}

// ── Renderer capability ──────────────────────────────────────────────

/// A display that frames can be drawn to.
///
/// # Rust concept: trait objects
/// The animator only knows about `dyn Renderer`, so concrete displays are
/// picked at startup without the animator being generic over them.
pub trait Renderer {
    /// Acquire display resources. Called once, before any frame.
    fn initialise(&mut self, size: Option<FrameSize>) -> Result<(), RendererError>;

    /// Clear to black, draw `pixels`, and present the frame. An empty
    /// slice draws a blank frame.
    fn render_frame(&mut self, pixels: &[Pixel]) -> Result<(), RendererError>;

    /// Release display resources. Called once, at shutdown.
    fn terminate(&mut self) -> Result<(), RendererError>;
}

/// Builds a renderer on the thread that will use it.
pub type RendererFactory =
    Box<dyn FnOnce() -> Result<Box<dyn Renderer>, RendererError> + Send + 'static>;

// ── Selection ────────────────────────────────────────────────────────

/// Which renderer to run, chosen on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RendererKind {
    /// Software emulator (PNG snapshots over HTTP)
    Image,
    /// RGB LED matrix panel
    #[cfg(feature = "hardware")]
    LedMatrix,
}

#[derive(Clone, Debug)]
pub struct RendererOptions {
    pub kind: RendererKind,
    /// Physical pixels per logical pixel (emulator only)
    pub scale: u32,
    pub style: PixelStyle,
    /// 0-100
    pub brightness: u8,
    /// Where the emulator saves its last frame at shutdown
    pub snapshot_path: Option<PathBuf>,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            kind: RendererKind::Image,
            scale: 5,
            style: PixelStyle::Blob,
            brightness: 100,
            snapshot_path: None,
        }
    }
}

/// Build the factory for the configured renderer.
///
/// `snapshot` receives every frame drawn by the emulator.
pub fn renderer_factory(options: RendererOptions, snapshot: Option<FrameSnapshot>) -> RendererFactory {
    match options.kind {
        RendererKind::Image => Box::new(move || {
            let mut renderer = ImageRenderer::new(options.scale, options.style)
                .with_brightness(options.brightness);
            if let Some(snapshot) = snapshot {
                renderer = renderer.with_snapshot(snapshot);
            }
            if let Some(path) = options.snapshot_path {
                renderer = renderer.with_dump_path(path);
            }
            Ok(Box::new(renderer) as Box<dyn Renderer>)
        }),
        #[cfg(feature = "hardware")]
        RendererKind::LedMatrix => Box::new(move || {
            Ok(Box::new(led_matrix::LedMatrixRenderer::new(options.brightness)) as Box<dyn Renderer>)
        }),
    }
}
