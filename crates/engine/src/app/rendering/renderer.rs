use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::scene::SceneTree;

use super::frame::{FrameCanvas, CLEAR_COLOR};

/// Draws the scene into a fixed logical frame that `pixels` scales up to the
/// window surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    logical_width: u32,
    logical_height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>, logical_width: u32, logical_height: u32) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(
            Arc::clone(&window),
            (logical_width, logical_height),
            size.width,
            size.height,
        )?;
        Ok(Self {
            window,
            pixels,
            logical_width,
            logical_height,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(
            Arc::clone(&self.window),
            self.logical_size(),
            width,
            height,
        )?;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        (logical_width, logical_height): (u32, u32),
        surface_width: u32,
        surface_height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(surface_width, surface_height, window);
        Pixels::new(logical_width, logical_height, surface)
    }

    pub fn logical_size(&self) -> (u32, u32) {
        (self.logical_width, self.logical_height)
    }

    pub fn render(&mut self, tree: &SceneTree, debug_bounds: bool) -> Result<(), Error> {
        let mut canvas =
            FrameCanvas::new(self.pixels.frame_mut(), self.logical_width, self.logical_height);
        canvas.clear(CLEAR_COLOR);
        tree.render(&mut canvas, debug_bounds);
        self.pixels.render()
    }
}
