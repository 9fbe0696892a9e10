//! Software emulator: draws frames into an in-memory RGB image.
//!
//! Each logical board pixel becomes a `scale` x `scale` cell, drawn either
//! as a filled square or as a rounded "LED blob" that leaves a dark grid
//! between pixels, like a real matrix panel seen up close.
//!
//! The latest frame is published to a `FrameSnapshot`, which the HTTP
//! server encodes as PNG on request.

use super::{FrameSize, Renderer, RendererError};
use crate::Pixel;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// How a logical pixel is drawn inside its cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PixelStyle {
    /// Fill the whole cell
    Square,
    /// Rounded dot with a 1-pixel dark border (falls back to `Square`
    /// below scale 3)
    Blob,
}

// ── Snapshot ─────────────────────────────────────────────────────────

/// Latest frame drawn by an `ImageRenderer`, shared with other threads.
#[derive(Clone, Default)]
pub struct FrameSnapshot {
    latest: Arc<Mutex<Option<RgbImage>>>,
}

impl FrameSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, frame: &RgbImage) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame.clone());
    }

    /// A copy of the latest frame, if one has been drawn.
    pub fn latest(&self) -> Option<RgbImage> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The latest frame encoded as PNG.
    pub fn to_png(&self) -> Result<Option<Vec<u8>>, image::ImageError> {
        let Some(frame) = self.latest() else {
            return Ok(None);
        };

        let mut bytes = Cursor::new(Vec::new());
        frame.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(Some(bytes.into_inner()))
    }
}

// ── Renderer ─────────────────────────────────────────────────────────

pub struct ImageRenderer {
    scale: u32,
    style: PixelStyle,
    brightness: u8,
    size: FrameSize,
    canvas: Option<RgbImage>,
    snapshot: FrameSnapshot,
    dump_path: Option<PathBuf>,
}

impl ImageRenderer {
    pub fn new(scale: u32, style: PixelStyle) -> Self {
        Self {
            scale: scale.max(1),
            style,
            brightness: 100,
            size: FrameSize::new(0, 0),
            canvas: None,
            snapshot: FrameSnapshot::new(),
            dump_path: None,
        }
    }

    /// Brightness 0-100 applied to every pixel.
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness.min(100);
        self
    }

    pub fn with_snapshot(mut self, snapshot: FrameSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Save the last frame as PNG to `path` on `terminate()`.
    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        self.snapshot.clone()
    }

    /// Physical pixel offsets, within a cell, lit for one logical pixel.
    fn cell_pattern(&self) -> Vec<(u32, u32)> {
        let s = self.scale;

        if self.style == PixelStyle::Square || s < 3 {
            return (0..s).flat_map(|dy| (0..s).map(move |dx| (dx, dy))).collect();
        }

        // (s-1) x (s-1) dot without its corners, e.g. for s = 5:
        //  .XX.
        //  XXXX
        //  XXXX
        //  .XX.
        let last = s - 2;
        (0..s - 1)
            .flat_map(|dy| (0..s - 1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| !((dx == 0 || dx == last) && (dy == 0 || dy == last)))
            .collect()
    }
}

impl Renderer for ImageRenderer {
    fn initialise(&mut self, size: Option<FrameSize>) -> Result<(), RendererError> {
        let size = size.ok_or_else(|| RendererError::Init("emulator needs a frame size".to_string()))?;

        self.size = size;
        self.canvas = Some(RgbImage::new(size.width * self.scale, size.height * self.scale));

        tracing::info!(
            "Image renderer ready: {}x{} board, {}x{} image ({:?} pixels)",
            size.width,
            size.height,
            size.width * self.scale,
            size.height * self.scale,
            self.style
        );
        Ok(())
    }

    fn render_frame(&mut self, pixels: &[Pixel]) -> Result<(), RendererError> {
        let pattern = self.cell_pattern();
        let (width, height) = (self.size.width as i32, self.size.height as i32);
        let brightness = self.brightness;
        let scale = self.scale;

        let canvas = self
            .canvas
            .as_mut()
            .ok_or_else(|| RendererError::Render("renderer not initialised".to_string()))?;

        canvas.fill(0);

        for pixel in pixels {
            if !(0..width).contains(&pixel.x) || !(0..height).contains(&pixel.y) {
                continue;
            }

            let color: Rgb<u8> = pixel.color.apply_brightness(brightness).into();
            let (cell_x, cell_y) = (pixel.x as u32 * scale, pixel.y as u32 * scale);

            for &(dx, dy) in &pattern {
                canvas.put_pixel(cell_x + dx, cell_y + dy, color);
            }
        }

        self.snapshot.publish(canvas);
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), RendererError> {
        let Some(canvas) = self.canvas.take() else {
            return Ok(());
        };

        if let Some(path) = &self.dump_path {
            canvas.save_with_format(path, ImageFormat::Png)?;
            tracing::info!("Saved last frame to {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RED: Color = Color::new(255, 0, 0);

    fn color_at(image: &RgbImage, x: u32, y: u32) -> Color {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Color::new(r, g, b)
    }

    fn lit(image: &RgbImage) -> Vec<(u32, u32)> {
        image
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [0, 0, 0])
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn initialise_requires_a_size() {
        let mut renderer = ImageRenderer::new(1, PixelStyle::Square);
        assert!(matches!(
            renderer.initialise(None),
            Err(RendererError::Init(_))
        ));
    }

    #[test]
    fn render_before_initialise_fails() {
        let mut renderer = ImageRenderer::new(1, PixelStyle::Square);
        assert!(matches!(
            renderer.render_frame(&[]),
            Err(RendererError::Render(_))
        ));
    }

    #[test]
    fn actual_size_draws_one_pixel_per_pixel() {
        let mut renderer = ImageRenderer::new(1, PixelStyle::Square);
        renderer.initialise(Some(FrameSize::new(8, 4))).unwrap();
        renderer
            .render_frame(&[Pixel::new(2, 3, RED), Pixel::new(7, 0, Color::WHITE)])
            .unwrap();

        let frame = renderer.snapshot().latest().unwrap();
        assert_eq!(frame.dimensions(), (8, 4));
        assert_eq!(color_at(&frame, 2, 3), RED);
        assert_eq!(color_at(&frame, 7, 0), Color::WHITE);
        assert_eq!(lit(&frame).len(), 2);
    }

    #[test]
    fn blob_style_matches_led_dot_shape() {
        let mut renderer = ImageRenderer::new(5, PixelStyle::Blob);
        renderer.initialise(Some(FrameSize::new(2, 2))).unwrap();
        renderer.render_frame(&[Pixel::new(1, 0, RED)]).unwrap();

        let frame = renderer.snapshot().latest().unwrap();
        let mut expected = vec![
            (6, 0),
            (7, 0),
            (5, 1),
            (6, 1),
            (7, 1),
            (8, 1),
            (5, 2),
            (6, 2),
            (7, 2),
            (8, 2),
            (6, 3),
            (7, 3),
        ];
        expected.sort_by_key(|&(x, y)| (y, x));
        assert_eq!(lit(&frame), expected);
    }

    #[test]
    fn square_style_fills_whole_cell() {
        let mut renderer = ImageRenderer::new(3, PixelStyle::Square);
        renderer.initialise(Some(FrameSize::new(2, 1))).unwrap();
        renderer.render_frame(&[Pixel::new(0, 0, RED)]).unwrap();

        assert_eq!(lit(&renderer.snapshot().latest().unwrap()).len(), 9);
    }

    #[test]
    fn new_frame_clears_previous_one() {
        let mut renderer = ImageRenderer::new(1, PixelStyle::Square);
        renderer.initialise(Some(FrameSize::new(4, 4))).unwrap();
        renderer.render_frame(&[Pixel::new(1, 1, RED)]).unwrap();
        renderer.render_frame(&[]).unwrap();

        assert!(lit(&renderer.snapshot().latest().unwrap()).is_empty());
    }

    #[test]
    fn out_of_frame_pixels_are_ignored() {
        let mut renderer = ImageRenderer::new(2, PixelStyle::Square);
        renderer.initialise(Some(FrameSize::new(4, 4))).unwrap();
        renderer
            .render_frame(&[Pixel::new(-1, 0, RED), Pixel::new(4, 0, RED), Pixel::new(0, 9, RED)])
            .unwrap();

        assert!(lit(&renderer.snapshot().latest().unwrap()).is_empty());
    }

    #[test]
    fn brightness_is_applied() {
        let mut renderer = ImageRenderer::new(1, PixelStyle::Square).with_brightness(50);
        renderer.initialise(Some(FrameSize::new(1, 1))).unwrap();
        renderer.render_frame(&[Pixel::new(0, 0, Color::new(200, 100, 50))]).unwrap();

        let frame = renderer.snapshot().latest().unwrap();
        assert_eq!(color_at(&frame, 0, 0), Color::new(100, 50, 25));
    }

    #[test]
    fn snapshot_encodes_png() {
        let snapshot = FrameSnapshot::new();
        assert!(snapshot.to_png().unwrap().is_none());

        let mut renderer = ImageRenderer::new(2, PixelStyle::Blob).with_snapshot(snapshot.clone());
        renderer.initialise(Some(FrameSize::new(3, 2))).unwrap();
        renderer.render_frame(&[Pixel::new(0, 0, RED)]).unwrap();

        let png = snapshot.to_png().unwrap().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (6, 4));
        assert_eq!(color_at(&decoded, 1, 1), RED);
    }

    #[test]
    fn terminate_saves_last_frame() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("last.png");

        let mut renderer = ImageRenderer::new(1, PixelStyle::Square).with_dump_path(&path);
        renderer.initialise(Some(FrameSize::new(5, 5))).unwrap();
        renderer.render_frame(&[Pixel::new(4, 4, RED)]).unwrap();
        renderer.terminate().unwrap();

        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(color_at(&saved, 4, 4), RED);
    }
}
