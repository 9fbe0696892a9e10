//! Time-driven offset calculators for board sections.
//!
//! A `Movement` turns elapsed time (in milliseconds) into the `(x, y)`
//! offset a section's content is drawn at. The variants are:
//! - `NoMovement`: offset fixed at its initial value forever
//! - `Static`: a pause, optionally bounded in time
//! - `Scrolling`: a step-wise linear scroll, optionally bounded in steps
//! - `Cycle`: bounded segments chained end-to-end, wrapping back to the first
//!
//! Every movement must be `reset()` before its first `update()`.
//!
//! ## Rust concepts
//! - `enum` with data variants instead of a class hierarchy
//! - One shared precondition check before dispatching with `match`
//! - Destructuring `&mut self` to borrow disjoint fields at once

use std::fmt;

/// Time in milliseconds.
pub type Millis = u64;

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MovementError {
    /// `update()` was called before `reset()`.
    NotStarted { kind: &'static str },
    /// A movement cycle needs at least one segment.
    EmptyCycle,
}

impl fmt::Display for MovementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementError::NotStarted { kind } => {
                write!(f, "movement not started for {kind} movement")
            }
            MovementError::EmptyCycle => write!(f, "movement cycle has no segments"),
        }
    }
}

impl std::error::Error for MovementError {}

// ── Offset ───────────────────────────────────────────────────────────

/// Content offset relative to the top-left of its section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move by `steps` times `(dx, dy)`, saturating at the `i32` bounds.
    fn advance(&mut self, steps: u64, dx: i32, dy: i32) {
        self.x = shifted(self.x, steps, dx);
        self.y = shifted(self.y, steps, dy);
    }
}

fn shifted(position: i32, steps: u64, delta: i32) -> i32 {
    let steps = i64::try_from(steps).unwrap_or(i64::MAX);
    let moved = i64::from(position).saturating_add(steps.saturating_mul(i64::from(delta)));
    moved.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

// ── Segment bookkeeping ──────────────────────────────────────────────

/// Elapsed-time state shared by the bounded segment variants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentClock {
    pub elapsed: Millis,
    pub extra_time_after_end: Millis,
    pub ended: bool,
}

impl SegmentClock {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A pause. `total_duration == 0` never ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticContent {
    pub total_duration: Millis,
    clock: SegmentClock,
}

impl StaticContent {
    fn new(total_duration: Millis) -> Self {
        Self {
            total_duration,
            clock: SegmentClock::default(),
        }
    }

    /// The offset of a pause never changes, so this always returns `false`.
    fn advance(&mut self, delta_time: Millis) -> bool {
        if self.total_duration == 0 {
            return false;
        }

        self.clock.elapsed = self.clock.elapsed.saturating_add(delta_time);

        if self.clock.elapsed >= self.total_duration {
            self.clock.ended = true;
            self.clock.extra_time_after_end = self.clock.elapsed - self.total_duration;
            self.clock.elapsed = self.total_duration;
        }

        false
    }
}

/// A step-wise scroll. `total_steps == 0` scrolls forever.
///
/// The first step is taken at reset (t = 0), so a bounded scroll of N steps
/// moves at t = 0, step, 2*step, ... (N-1)*step and then ends at
/// N*step without moving again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollingContent {
    pub step_duration: Millis,
    pub total_steps: u32,
    pub delta_x_per_step: i32,
    pub delta_y_per_step: i32,
    current_step: u64,
    clock: SegmentClock,
}

impl ScrollingContent {
    fn new(step_duration: Millis, total_steps: u32, delta_x: i32, delta_y: i32) -> Self {
        Self {
            // A zero step would divide by zero; treat it as the shortest step.
            step_duration: step_duration.max(1),
            total_steps,
            delta_x_per_step: delta_x,
            delta_y_per_step: delta_y,
            current_step: 0,
            clock: SegmentClock::default(),
        }
    }

    /// Saturates at `Millis::MAX`, which is then never reached.
    pub fn total_duration(&self) -> Millis {
        Millis::from(self.total_steps).saturating_mul(self.step_duration)
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    fn reset(&mut self, offset: &mut Offset) {
        self.clock.reset();
        self.current_step = 0;
        offset.advance(1, self.delta_x_per_step, self.delta_y_per_step);
    }

    fn advance(&mut self, delta_time: Millis, offset: &mut Offset) -> bool {
        let new_elapsed = self.clock.elapsed.saturating_add(delta_time);

        // Perpetual: advance, then fold back to step 0 so counters stay small.
        if self.total_steps == 0 {
            let new_step = new_elapsed / self.step_duration;
            let steps = new_step.saturating_sub(self.current_step);
            offset.advance(steps, self.delta_x_per_step, self.delta_y_per_step);

            self.current_step = 0;
            self.clock.elapsed = new_elapsed % self.step_duration;
            return steps > 0;
        }

        let total_duration = self.total_duration();

        // '>=': no extra step at t == total_duration, the first one was at t == 0.
        if new_elapsed >= total_duration {
            let last_step = self.total_steps as u64 - 1;
            let steps = last_step.saturating_sub(self.current_step);
            offset.advance(steps, self.delta_x_per_step, self.delta_y_per_step);

            self.current_step = last_step;
            self.clock.elapsed = total_duration;
            self.clock.extra_time_after_end = new_elapsed - total_duration;
            self.clock.ended = true;
            return steps > 0;
        }

        let new_step = new_elapsed / self.step_duration;
        let steps = new_step.saturating_sub(self.current_step);
        offset.advance(steps, self.delta_x_per_step, self.delta_y_per_step);

        self.current_step = new_step;
        self.clock.elapsed = new_elapsed;
        steps > 0
    }
}

/// Segments played one after the other, wrapping back to the first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovementCycle {
    segments: Vec<Movement>,
    current: usize,
}

impl MovementCycle {
    pub fn segments(&self) -> &[Movement] {
        &self.segments
    }

    /// Index of the active segment.
    pub fn current_segment(&self) -> usize {
        self.current
    }

    fn reset(&mut self, offset: &mut Offset) {
        self.current = 0;
        let first = &mut self.segments[0];
        first.reset();
        // the first segment may already have moved (scroll step at t == 0)
        *offset = first.offset();
    }

    fn advance(&mut self, mut delta_time: Millis, offset: &mut Offset) -> Result<bool, MovementError> {
        let len = self.segments.len();

        let new_offset = loop {
            let segment = &mut self.segments[self.current];
            segment.update(delta_time)?;
            let segment_offset = segment.offset();

            if !segment.segment_ended() {
                break segment_offset;
            }

            // carry the overshoot into the next segment
            delta_time = segment.extra_time_after_end();

            self.current = (self.current + 1) % len;
            let next = &mut self.segments[self.current];
            next.set_initial_offset(segment_offset.x, segment_offset.y);
            next.reset();
        };

        if new_offset == *offset {
            return Ok(false);
        }

        *offset = new_offset;
        self.segments[self.current].set_offset(new_offset.x, new_offset.y);
        Ok(true)
    }
}

// ── Movement ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MovementKind {
    NoMovement,
    Static(StaticContent),
    Scrolling(ScrollingContent),
    Cycle(MovementCycle),
}

impl MovementKind {
    fn name(&self) -> &'static str {
        match self {
            MovementKind::NoMovement => "no",
            MovementKind::Static(_) => "static",
            MovementKind::Scrolling(_) => "scrolling",
            MovementKind::Cycle(_) => "cycle",
        }
    }
}

/// A movement: an initial offset, the current offset, and the
/// variant-specific timing state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Movement {
    init: Offset,
    offset: Offset,
    started: bool,
    kind: MovementKind,
}

impl Default for Movement {
    fn default() -> Self {
        Self::none()
    }
}

impl Movement {
    fn from_kind(kind: MovementKind) -> Self {
        Self {
            init: Offset::default(),
            offset: Offset::default(),
            started: false,
            kind,
        }
    }

    /// Offset fixed at its initial value.
    pub fn none() -> Self {
        Self::from_kind(MovementKind::NoMovement)
    }

    /// A pause of `total_duration` ms (0: forever).
    pub fn static_content(total_duration: Millis) -> Self {
        Self::from_kind(MovementKind::Static(StaticContent::new(total_duration)))
    }

    /// Move by `(delta_x, delta_y)` every `step_duration` ms, `total_steps`
    /// times (0: forever).
    pub fn scrolling(step_duration: Millis, total_steps: u32, delta_x: i32, delta_y: i32) -> Self {
        Self::from_kind(MovementKind::Scrolling(ScrollingContent::new(
            step_duration,
            total_steps,
            delta_x,
            delta_y,
        )))
    }

    /// Chain `segments` end-to-end, cyclically.
    pub fn cycle(segments: Vec<Movement>) -> Result<Self, MovementError> {
        if segments.is_empty() {
            return Err(MovementError::EmptyCycle);
        }
        Ok(Self::from_kind(MovementKind::Cycle(MovementCycle {
            segments,
            current: 0,
        })))
    }

    /// Builder-style initial offset, used on every `reset()`.
    pub fn with_initial_offset(mut self, x: i32, y: i32) -> Self {
        self.set_initial_offset(x, y);
        self
    }

    pub fn set_initial_offset(&mut self, x: i32, y: i32) {
        self.init = Offset::new(x, y);
        if !self.started {
            self.offset = self.init;
        }
    }

    pub fn kind(&self) -> &MovementKind {
        &self.kind
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn initial_offset(&self) -> Offset {
        self.init
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether a bounded segment has run to its end. Always `false` for
    /// `NoMovement` and cycles, which never end.
    pub fn segment_ended(&self) -> bool {
        self.clock().is_some_and(|c| c.ended)
    }

    /// Time past the end of a segment, consumed by the next cycle segment.
    pub fn extra_time_after_end(&self) -> Millis {
        self.clock().map_or(0, |c| c.extra_time_after_end)
    }

    /// Elapsed time within the current segment.
    pub fn elapsed(&self) -> Millis {
        self.clock().map_or(0, |c| c.elapsed)
    }

    fn clock(&self) -> Option<&SegmentClock> {
        match &self.kind {
            MovementKind::Static(s) => Some(&s.clock),
            MovementKind::Scrolling(s) => Some(&s.clock),
            MovementKind::NoMovement | MovementKind::Cycle(_) => None,
        }
    }

    /// Return to the initial offset and restart the clock.
    pub fn reset(&mut self) {
        let Movement {
            init,
            offset,
            started,
            kind,
        } = self;

        *offset = *init;
        *started = true;

        match kind {
            MovementKind::NoMovement => {}
            MovementKind::Static(s) => s.clock.reset(),
            MovementKind::Scrolling(s) => s.reset(offset),
            MovementKind::Cycle(c) => c.reset(offset),
        }
    }

    /// Advance by `delta_time` ms. Returns whether the offset changed.
    pub fn update(&mut self, delta_time: Millis) -> Result<bool, MovementError> {
        if !self.started {
            return Err(MovementError::NotStarted {
                kind: self.kind.name(),
            });
        }

        let Movement { offset, kind, .. } = self;

        match kind {
            MovementKind::NoMovement => Ok(false),
            MovementKind::Static(s) => Ok(s.advance(delta_time)),
            MovementKind::Scrolling(s) => Ok(s.advance(delta_time, offset)),
            MovementKind::Cycle(c) => c.advance(delta_time, offset),
        }
    }

    /// Overwrite the current offset without touching the clock.
    ///
    /// Used when a section wraps the offset, and when a cycle hands over to
    /// its next segment. For a cycle, the active segment follows too.
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = Offset::new(x, y);
        if let MovementKind::Cycle(c) = &mut self.kind {
            c.segments[c.current].set_offset(x, y);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
