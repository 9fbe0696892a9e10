//! Wire format of the board update call.
//!
//! Producers send a batch of per-section updates as JSON. These types only
//! describe the encoding; they are converted into core board types
//! (`SectionContent`, `Movement`, `SectionUpdate`) before touching the
//! board.
//!
//! ## Rust concepts
//! - Serde `#[serde(tag = "type")]` for internally tagged enums
//! - `#[serde(default)]` for optional fields
//! - `From`/`Into` conversions at the boundary

use crate::board::SectionContent;
use crate::movement::Movement;
use crate::updater::{SectionOperationStatus, SectionUpdate};
use crate::{Color, Pixel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest magnitude accepted for coordinates, offsets, content sizes and
/// per-step deltas. Keeps every later offset computation well inside `i32`.
pub const COORDINATE_LIMIT: i32 = i16::MAX as i32;

// ── Errors ───────────────────────────────────────────────────────────

/// A request that decodes but cannot be applied to the board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// A coordinate-like field lies outside `±COORDINATE_LIMIT`.
    OutOfRange {
        section_index: u32,
        field: &'static str,
        value: i32,
    },
    /// `step_duration * total_steps` does not fit in a `u64`.
    DurationOverflow { section_index: u32 },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::OutOfRange {
                section_index,
                field,
                value,
            } => write!(
                f,
                "section {section_index}: {field} = {value} is outside ±{COORDINATE_LIMIT}"
            ),
            RequestError::DurationOverflow { section_index } => write!(
                f,
                "section {section_index}: step_duration * total_steps overflows"
            ),
        }
    }
}

impl std::error::Error for RequestError {}

fn check_coordinate(section_index: u32, field: &'static str, value: i32) -> Result<(), RequestError> {
    if value.unsigned_abs() > COORDINATE_LIMIT.unsigned_abs() {
        return Err(RequestError::OutOfRange {
            section_index,
            field,
            value,
        });
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PixelMessage {
    pub x: i32,
    pub y: i32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<PixelMessage> for Pixel {
    fn from(p: PixelMessage) -> Self {
        Pixel::new(p.x, p.y, Color::new(p.r, p.g, p.b))
    }
}

impl From<Pixel> for PixelMessage {
    fn from(p: Pixel) -> Self {
        Self {
            x: p.x,
            y: p.y,
            r: p.color.r,
            g: p.color.g,
            b: p.color.b,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ContentMessage {
    /// Pixels relative to the top-left of the content
    #[serde(default)]
    pub pixels: Vec<PixelMessage>,
    /// Virtual width, may exceed the pixels to leave space before a repeat. 0 disables horizontal wrapping.
    #[schema(example = 192)]
    pub content_w: i32,
    /// Virtual height. 0 disables vertical wrapping.
    #[schema(example = 10)]
    pub content_h: i32,
    /// Repeat the content to the right when its right edge is visible
    #[serde(default = "default_repeat")]
    #[schema(default = true)]
    pub repeat_x: bool,
    /// Repeat the content downwards when its bottom edge is visible
    #[serde(default = "default_repeat")]
    #[schema(default = true)]
    pub repeat_y: bool,
}

fn default_repeat() -> bool {
    true
}

impl ContentMessage {
    fn validate(&self, section_index: u32) -> Result<(), RequestError> {
        check_coordinate(section_index, "content_w", self.content_w)?;
        check_coordinate(section_index, "content_h", self.content_h)?;
        for pixel in &self.pixels {
            check_coordinate(section_index, "pixels.x", pixel.x)?;
            check_coordinate(section_index, "pixels.y", pixel.y)?;
        }
        Ok(())
    }
}

impl From<ContentMessage> for SectionContent {
    fn from(c: ContentMessage) -> Self {
        SectionContent::new(
            c.pixels.into_iter().map(Pixel::from).collect(),
            c.content_w,
            c.content_h,
        )
        .with_repeat(c.repeat_x, c.repeat_y)
    }
}

/// One movement. Durations are in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementMessage {
    /// Content stays at its initial offset
    NoMovement {
        #[serde(default)]
        x_offset_init: i32,
        #[serde(default)]
        y_offset_init: i32,
    },
    /// Pause for `total_duration` ms (0: forever)
    StaticContent {
        total_duration: u64,
        #[serde(default)]
        x_offset_init: i32,
        #[serde(default)]
        y_offset_init: i32,
    },
    /// Move by a fixed delta every `step_duration` ms, `total_steps` times (0: forever)
    ScrollingContent {
        step_duration: u64,
        #[serde(default)]
        total_steps: u32,
        delta_x_per_step: i32,
        delta_y_per_step: i32,
        #[serde(default)]
        x_offset_init: i32,
        #[serde(default)]
        y_offset_init: i32,
    },
}

impl MovementMessage {
    fn validate(&self, section_index: u32) -> Result<(), RequestError> {
        let (x_offset_init, y_offset_init) = match *self {
            MovementMessage::NoMovement {
                x_offset_init,
                y_offset_init,
            }
            | MovementMessage::StaticContent {
                x_offset_init,
                y_offset_init,
                ..
            } => (x_offset_init, y_offset_init),
            MovementMessage::ScrollingContent {
                step_duration,
                total_steps,
                delta_x_per_step,
                delta_y_per_step,
                x_offset_init,
                y_offset_init,
            } => {
                check_coordinate(section_index, "delta_x_per_step", delta_x_per_step)?;
                check_coordinate(section_index, "delta_y_per_step", delta_y_per_step)?;
                if step_duration.checked_mul(u64::from(total_steps)).is_none() {
                    return Err(RequestError::DurationOverflow { section_index });
                }
                (x_offset_init, y_offset_init)
            }
        };

        check_coordinate(section_index, "x_offset_init", x_offset_init)?;
        check_coordinate(section_index, "y_offset_init", y_offset_init)
    }
}

impl From<MovementMessage> for Movement {
    fn from(m: MovementMessage) -> Self {
        match m {
            MovementMessage::NoMovement {
                x_offset_init,
                y_offset_init,
            } => Movement::none().with_initial_offset(x_offset_init, y_offset_init),
            MovementMessage::StaticContent {
                total_duration,
                x_offset_init,
                y_offset_init,
            } => Movement::static_content(total_duration)
                .with_initial_offset(x_offset_init, y_offset_init),
            MovementMessage::ScrollingContent {
                step_duration,
                total_steps,
                delta_x_per_step,
                delta_y_per_step,
                x_offset_init,
                y_offset_init,
            } => Movement::scrolling(step_duration, total_steps, delta_x_per_step, delta_y_per_step)
                .with_initial_offset(x_offset_init, y_offset_init),
        }
    }
}

/// Interpret a movement list: empty means "leave the movement alone", a
/// single entry is used as-is, several entries form a cycle.
pub fn movement_from_list(movements: Vec<MovementMessage>) -> Option<Movement> {
    match movements.len() {
        0 => None,
        1 => movements.into_iter().next().map(Movement::from),
        _ => Movement::cycle(movements.into_iter().map(Movement::from).collect()).ok(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SectionUpdateRequest {
    /// Index of the section, from the top
    #[schema(example = 0)]
    pub section_index: u32,
    /// New content, if any
    #[serde(default)]
    pub content: Option<ContentMessage>,
    /// New movement: empty = unchanged, one entry = that movement, several = a cycle
    #[serde(default)]
    pub movement: Vec<MovementMessage>,
    /// Keep the running movement if the new content has the same size
    #[serde(default)]
    #[schema(default = false)]
    pub continue_movement: bool,
}

impl SectionUpdateRequest {
    /// Check every value against the board's limits, then convert.
    pub fn into_update(self) -> Result<(u32, SectionUpdate), RequestError> {
        if let Some(content) = &self.content {
            content.validate(self.section_index)?;
        }
        for movement in &self.movement {
            movement.validate(self.section_index)?;
        }

        let update = SectionUpdate {
            content: self.content.map(SectionContent::from),
            movement: movement_from_list(self.movement),
            continue_movement: self.continue_movement,
        };
        Ok((self.section_index, update))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BoardSectionsUpdateRequest {
    pub requests: Vec<SectionUpdateRequest>,
}

impl BoardSectionsUpdateRequest {
    /// All updates, or the first invalid entry. Nothing is converted
    /// partially.
    pub fn into_updates(self) -> Result<Vec<(u32, SectionUpdate)>, RequestError> {
        self.requests
            .into_iter()
            .map(SectionUpdateRequest::into_update)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct BoardSectionsUpdateResponse {
    /// One entry per requested section, in request order
    pub status: Vec<SectionOperationStatus>,
}
