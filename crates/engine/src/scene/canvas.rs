use super::animation::SpriteSheet;
use super::geometry::Rect;

pub type Rgba = [u8; 4];

pub const DEBUG_BOUNDS_COLOR: Rgba = [255, 64, 160, 255];
pub const SOLID_TILE_COLOR: Rgba = [96, 72, 56, 255];
pub const BACKDROP_TILE_COLOR: Rgba = [44, 40, 52, 255];
pub const PROMPT_BACKGROUND_COLOR: Rgba = [16, 16, 20, 255];
pub const PROMPT_GLYPH_COLOR: Rgba = [240, 232, 200, 255];

/// Drawing surface in screen pixels. Anything outside the surface is clipped
/// by the implementation.
pub trait Canvas {
    fn fill_rect(&mut self, dest: Rect, color: Rgba);
    fn outline_rect(&mut self, dest: Rect, color: Rgba);
    /// Copy `sample` out of `sheet` into `dest`, mirrored horizontally when
    /// `flipped`. Fully transparent sheet pixels are skipped.
    fn blit(&mut self, sheet: &SpriteSheet, sample: Rect, dest: Rect, flipped: bool);
}

/// Camera view and switches shared by one render traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPass {
    pub camera: Rect,
    pub debug_bounds: bool,
}

impl RenderPass {
    pub fn with_camera(self, camera: Rect) -> Self {
        Self { camera, ..self }
    }
}

pub fn world_to_screen(rect: Rect, camera: &Rect) -> Rect {
    rect.translated(-camera.x, -camera.y)
}
