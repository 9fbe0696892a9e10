//! RGB LED matrix panel driven through `rpi-led-matrix`.
//!
//! Double-buffered: every frame is drawn to an offscreen canvas and then
//! swapped in, so partially drawn frames are never visible.

use super::{FrameSize, Renderer, RendererError};
use crate::Pixel;
use rpi_led_matrix::{LedCanvas, LedMatrix, LedMatrixOptions, LedRuntimeOptions};

pub struct LedMatrixRenderer {
    brightness: u8,
    matrix: Option<LedMatrix>,
    canvas: Option<LedCanvas>,
}

impl LedMatrixRenderer {
    pub fn new(brightness: u8) -> Self {
        Self {
            brightness: brightness.min(100),
            matrix: None,
            canvas: None,
        }
    }
}

/// Create a matrix configured for our hardware:
/// Pi + Adafruit HAT/Bonnet + `size` panel geometry.
///
/// # Rust concept: Result and the ? operator
/// Matrix initialization can fail (e.g., if not running as root, or if GPIO
/// is unavailable). The C library reports failures as `&str`, which we wrap
/// into our own error type at the boundary.
fn create_matrix(size: FrameSize) -> Result<LedMatrix, RendererError> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(size.height);
    options.set_cols(size.width);
    options.set_hardware_mapping("adafruit-hat");

    options
        .set_pwm_bits(8) // Full 8-bit color depth
        .map_err(|e| RendererError::Init(e.to_string()))?;
    options.set_pwm_lsb_nanoseconds(130); // Stable timing (~143Hz refresh)

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2); // Pi Zero 2 W requires slowdown=2

    LedMatrix::new(Some(options), Some(rt_options)).map_err(|e| RendererError::Init(e.to_string()))
}

impl Renderer for LedMatrixRenderer {
    fn initialise(&mut self, size: Option<FrameSize>) -> Result<(), RendererError> {
        let size = size.unwrap_or(FrameSize::new(192, 32));
        let matrix = create_matrix(size)?;

        self.canvas = Some(matrix.offscreen_canvas());
        self.matrix = Some(matrix);

        tracing::info!(
            "LED matrix ready: {}x{} (brightness {})",
            size.width,
            size.height,
            self.brightness
        );
        Ok(())
    }

    fn render_frame(&mut self, pixels: &[Pixel]) -> Result<(), RendererError> {
        let (Some(matrix), Some(mut canvas)) = (self.matrix.as_ref(), self.canvas.take()) else {
            return Err(RendererError::Render("LED matrix not initialised".to_string()));
        };

        canvas.clear();
        for pixel in pixels {
            let color = pixel.color.apply_brightness(self.brightness);
            canvas.set(pixel.x, pixel.y, &color.into());
        }

        self.canvas = Some(matrix.swap(canvas));
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), RendererError> {
        // Dropping the matrix stops its refresh thread and blanks the panel.
        self.canvas = None;
        self.matrix = None;
        tracing::info!("LED matrix released");
        Ok(())
    }
}
