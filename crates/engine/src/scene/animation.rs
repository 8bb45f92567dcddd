use std::fmt;
use std::sync::Arc;

use super::geometry::Rect;

/// Decoded RGBA sprite sheet shared by every animation or tile layer that
/// samples it. Read-only once loaded.
pub struct SpriteSheet {
    key: String,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SpriteSheet {
    pub fn new(key: impl Into<String>, width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            width,
            height,
            rgba,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// RGBA value at a sheet pixel, `None` outside the sheet.
    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl fmt::Debug for SpriteSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteSheet")
            .field("key", &self.key)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Layout of one animation row inside a sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSpec {
    pub frame_width: i32,
    pub frame_height: i32,
    pub row: i32,
    pub frames: i32,
    pub frame_delay: i32,
    pub once: bool,
}

/// A single sprite-sheet row played frame by frame.
///
/// The frame counters are local to each instance; only the sheet is shared.
#[derive(Debug, Clone)]
pub struct Animation {
    sheet: Option<Arc<SpriteSheet>>,
    spec: AnimationSpec,
    current_frame: i32,
    delay_counter: i32,
    flipped: bool,
}

impl Animation {
    pub fn new(sheet: Option<Arc<SpriteSheet>>, spec: AnimationSpec) -> Self {
        let spec = AnimationSpec {
            frames: spec.frames.max(1),
            frame_delay: spec.frame_delay.max(1),
            ..spec
        };
        Self {
            sheet,
            spec,
            current_frame: 0,
            delay_counter: spec.frame_delay,
            flipped: false,
        }
    }

    pub fn spec(&self) -> AnimationSpec {
        self.spec
    }

    pub fn current_frame(&self) -> i32 {
        self.current_frame
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn set_flipped(&mut self, flipped: bool) {
        self.flipped = flipped;
    }

    /// Advance one tick. A `once` animation holds on its last frame until reset.
    pub fn update(&mut self) {
        let last_frame = self.spec.frames - 1;
        let holding = self.spec.once && self.current_frame >= last_frame;
        if holding && self.delay_counter <= 0 {
            return;
        }

        self.delay_counter -= 1;
        if self.delay_counter <= 0 && !holding {
            self.delay_counter = self.spec.frame_delay;
            self.current_frame = (self.current_frame + 1) % self.spec.frames;
        }
    }

    pub fn reset(&mut self) {
        self.delay_counter = self.spec.frame_delay;
        self.current_frame = 0;
    }

    /// Total ticks in one cycle.
    pub fn cycle_duration(&self) -> i32 {
        self.spec.frames * self.spec.frame_delay
    }

    /// Ticks left before the current cycle completes.
    pub fn cycle_remaining(&self) -> i32 {
        self.delay_counter + self.spec.frame_delay * (self.spec.frames - self.current_frame - 1)
    }

    pub fn is_complete(&self) -> bool {
        self.current_frame == self.spec.frames - 1 && self.delay_counter == 0
    }

    /// Fraction of the cycle already played, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        let total = self.cycle_duration();
        let remaining = self.cycle_remaining().clamp(0, total);
        1.0 - remaining as f32 / total as f32
    }

    pub fn sheet(&self) -> Option<&Arc<SpriteSheet>> {
        self.sheet.as_ref()
    }

    /// Region of the sheet holding the current frame.
    pub fn frame_sample(&self) -> Rect {
        Rect::new(
            self.current_frame * self.spec.frame_width,
            self.spec.row * self.spec.frame_height,
            self.spec.frame_width,
            self.spec.frame_height,
        )
    }

    /// Frame-sized rectangle centered on `anchor`.
    pub fn frame_bounds(&self, anchor: &Rect) -> Rect {
        let (cx, cy) = anchor.center();
        Rect::new(
            cx - self.spec.frame_width / 2,
            cy - self.spec.frame_height / 2,
            self.spec.frame_width,
            self.spec.frame_height,
        )
    }
}
