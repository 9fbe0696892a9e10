//! Board, sections and section content.
//!
//! A `Board` is an ordered list of `BoardSection`s covering a fixed-size
//! display. Each section places a `SectionContent` inside its own output
//! area, shifted by the offset of its `Movement`, repeated to the right
//! and/or downwards when a copy's edge becomes visible.
//!
//! Pixel lists are cached and only recomputed after something changed.
//! Sections later in the list are appended later, so they are drawn over
//! earlier ones wherever they overlap.

use crate::movement::{Movement, MovementError, Millis, Offset};
use crate::{Pixel, SectionArea};

// ── Content ──────────────────────────────────────────────────────────

/// Pixels to show in a section, before any movement is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionContent {
    /// Relative to the top-left of the content
    pixels: Vec<Pixel>,
    /// Virtual bounding box `(0, 0, content_w, content_h)`. May be larger
    /// than the pixels themselves to leave space before a repeat.
    /// A size `<= 0` disables wrapping on that axis.
    content_w: i32,
    content_h: i32,
    repeat_x: bool,
    repeat_y: bool,
}

impl SectionContent {
    /// Content repeating in both directions.
    pub fn new(pixels: Vec<Pixel>, content_w: i32, content_h: i32) -> Self {
        Self {
            pixels,
            content_w,
            content_h,
            repeat_x: true,
            repeat_y: true,
        }
    }

    pub fn with_repeat(mut self, repeat_x: bool, repeat_y: bool) -> Self {
        self.repeat_x = repeat_x;
        self.repeat_y = repeat_y;
        self
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn content_w(&self) -> i32 {
        self.content_w
    }

    pub fn content_h(&self) -> i32 {
        self.content_h
    }

    pub fn size(&self) -> (i32, i32) {
        (self.content_w, self.content_h)
    }

    pub fn repeat_x(&self) -> bool {
        self.repeat_x
    }

    pub fn repeat_y(&self) -> bool {
        self.repeat_y
    }
}

// ── Visibility helpers ───────────────────────────────────────────────

/// Offsets at which content is drawn on each axis.
///
/// The movement's own offset is always included. A second copy starts at
/// `offset + content_size` if repeat is enabled on that axis and that copy
/// begins strictly inside the output area.
pub fn repeated_offsets(
    offset: Offset,
    content: &SectionContent,
    output_w: i32,
    output_h: i32,
) -> (Vec<i32>, Vec<i32>) {
    let mut x_offsets = vec![offset.x];
    let mut y_offsets = vec![offset.y];

    if let Some(next_x) = offset.x.checked_add(content.content_w) {
        if content.repeat_x && 0 < next_x && next_x < output_w {
            x_offsets.push(next_x);
        }
    }

    if let Some(next_y) = offset.y.checked_add(content.content_h) {
        if content.repeat_y && 0 < next_y && next_y < output_h {
            y_offsets.push(next_y);
        }
    }

    (x_offsets, y_offsets)
}

/// Content pixels shifted by `(x_offset, y_offset)` that land inside
/// `[0, output_w) x [0, output_h)`. Pixels the shift would carry out of
/// the `i32` range are dropped.
pub fn visible_pixels(
    pixels: &[Pixel],
    x_offset: i32,
    y_offset: i32,
    output_w: i32,
    output_h: i32,
) -> impl Iterator<Item = Pixel> + '_ {
    pixels
        .iter()
        .filter_map(move |p| p.translated(x_offset, y_offset))
        .filter(move |p| (0..output_w).contains(&p.x) && (0..output_h).contains(&p.y))
}

// ── Section ──────────────────────────────────────────────────────────

/// One independently animated area of the board.
#[derive(Clone, Debug)]
pub struct BoardSection {
    area: SectionArea,
    content: SectionContent,
    movement: Movement,
    /// Absolute display coordinates, valid while `has_changed` is false
    section_pixels: Vec<Pixel>,
    has_changed: bool,
}

impl BoardSection {
    pub fn new(area: SectionArea, content: SectionContent, movement: Movement) -> Self {
        Self {
            area,
            content,
            movement,
            section_pixels: Vec::new(),
            has_changed: true,
        }
    }

    /// A section with no content and no movement.
    pub fn empty(area: SectionArea) -> Self {
        Self::new(area, SectionContent::default(), Movement::none())
    }

    pub fn area(&self) -> SectionArea {
        self.area
    }

    pub fn content(&self) -> &SectionContent {
        &self.content
    }

    pub fn movement(&self) -> &Movement {
        &self.movement
    }

    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    /// Restart the movement from its initial offset.
    pub fn reset(&mut self) {
        self.movement.reset();
        self.has_changed = true;
    }

    pub fn update_content(&mut self, content: SectionContent) {
        self.content = content;
        self.has_changed = true;
    }

    /// Replace the movement. The caller resets the section to start it.
    pub fn update_movement(&mut self, movement: Movement) {
        self.movement = movement;
        self.has_changed = true;
    }

    /// Advance the movement by `delta_time` ms and re-wrap its offset.
    ///
    /// Returns whether the section needs redrawing, which stays `true`
    /// until `pixels()` is read.
    pub fn update(&mut self, delta_time: Millis) -> Result<bool, MovementError> {
        self.has_changed |= self.movement.update(delta_time)?;
        self.wrap_offset();
        Ok(self.has_changed)
    }

    /// Keep the offset in `(-content_size, 0]` on each axis, or at 0 when
    /// the content has no size on that axis.
    ///
    /// Wrapped content draws exactly the same pixels thanks to repetition,
    /// so this never marks the section as changed.
    fn wrap_offset(&mut self) {
        let current = self.movement.offset();
        let x = wrap_axis(current.x, self.content.content_w);
        let y = wrap_axis(current.y, self.content.content_h);

        if (x, y) != (current.x, current.y) {
            self.movement.set_offset(x, y);
        }
    }

    /// Visible pixels in absolute display coordinates, recomputed only if
    /// the section changed since the last call.
    pub fn pixels(&mut self) -> &[Pixel] {
        if self.has_changed {
            self.section_pixels = self.compute_pixels();
            self.has_changed = false;
        }
        &self.section_pixels
    }

    fn compute_pixels(&self) -> Vec<Pixel> {
        let SectionArea { x, y, w, h } = self.area;
        let content = &self.content;
        let (x_offsets, y_offsets) = repeated_offsets(self.movement.offset(), content, w, h);

        let mut output = Vec::new();

        for &x_offset in &x_offsets {
            for &y_offset in &y_offsets {
                // skip copies that cannot reach the output area
                if x_offset >= w
                    || i64::from(x_offset) + i64::from(content.content_w) + i64::from(w) < 0
                    || y_offset >= h
                    || i64::from(y_offset) + i64::from(content.content_h) + i64::from(h) < 0
                {
                    continue;
                }

                output.extend(
                    visible_pixels(&content.pixels, x_offset, y_offset, w, h)
                        .filter_map(|p| p.translated(x, y)),
                );
            }
        }

        output
    }
}

fn wrap_axis(offset: i32, content_size: i32) -> i32 {
    if content_size <= 0 {
        0
    } else if offset <= -content_size {
        let size = i64::from(content_size);
        // lands in (-content_size, 0], always representable
        ((i64::from(offset) - 1).rem_euclid(size) - size + 1) as i32
    } else {
        offset
    }
}

// ── Board ────────────────────────────────────────────────────────────

/// The whole display: sections in painting order.
#[derive(Clone, Debug)]
pub struct Board {
    width: i32,
    height: i32,
    sections: Vec<BoardSection>,
    display_pixels: Vec<Pixel>,
    has_changed: bool,
}

impl Board {
    pub fn new(width: i32, height: i32, sections: Vec<BoardSection>) -> Self {
        Self {
            width,
            height,
            sections,
            display_pixels: Vec::new(),
            has_changed: true,
        }
    }

    pub fn with_empty_sections(width: i32, height: i32, areas: &[SectionArea]) -> Self {
        let sections = areas.iter().copied().map(BoardSection::empty).collect();
        Self::new(width, height, sections)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn sections(&self) -> &[BoardSection] {
        &self.sections
    }

    pub fn section_mut(&mut self, index: usize) -> Option<&mut BoardSection> {
        self.sections.get_mut(index)
    }

    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    /// Restart every section's movement.
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Advance every section. The board stays marked as changed until
    /// `pixels()` is read, even across several updates.
    pub fn update(&mut self, delta_time: Millis) -> Result<bool, MovementError> {
        for section in &mut self.sections {
            self.has_changed |= section.update(delta_time)?;
        }
        Ok(self.has_changed)
    }

    /// All section pixels concatenated in section order.
    pub fn pixels(&mut self) -> &[Pixel] {
        if self.has_changed {
            self.display_pixels.clear();
            for section in &mut self.sections {
                self.display_pixels.extend_from_slice(section.pixels());
            }
            self.has_changed = false;
        }
        &self.display_pixels
    }
}

// ── Tests ────────────────────────────────────────────────────────────
