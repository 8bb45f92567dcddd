use crate::scene::{Canvas, Rect, Rgba, SpriteSheet};

pub const CLEAR_COLOR: Rgba = [20, 18, 26, 255];

/// `Canvas` over a borrowed RGBA frame at the logical resolution. Everything
/// outside the frame is clipped.
pub(crate) struct FrameCanvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> FrameCanvas<'a> {
    pub(crate) fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub(crate) fn clear(&mut self, color: Rgba) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    /// `dest` intersected with the frame, as `(x0, y0, x1, y1)` half-open.
    fn clip(&self, dest: Rect) -> Option<(i32, i32, i32, i32)> {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        let x0 = dest.x.max(0);
        let y0 = dest.y.max(0);
        let x1 = dest.right().min(width);
        let y1 = dest.bottom().min(height);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.frame.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn put(&mut self, x: i32, y: i32, color: Rgba) {
        write_pixel_rgba_clipped(self.frame, self.width as usize, x, y, color);
    }
}

impl Canvas for FrameCanvas<'_> {
    fn fill_rect(&mut self, dest: Rect, color: Rgba) {
        let Some((x0, y0, x1, y1)) = self.clip(dest) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.put(x, y, color);
            }
        }
    }

    fn outline_rect(&mut self, dest: Rect, color: Rgba) {
        if dest.w <= 0 || dest.h <= 0 {
            return;
        }
        let (left, top) = (dest.x, dest.y);
        let (right, bottom) = (dest.right() - 1, dest.bottom() - 1);
        for x in left..=right {
            self.put(x, top, color);
            self.put(x, bottom, color);
        }
        for y in top..=bottom {
            self.put(left, y, color);
            self.put(right, y, color);
        }
    }

    fn blit(&mut self, sheet: &SpriteSheet, sample: Rect, dest: Rect, flipped: bool) {
        let w = sample.w.min(dest.w);
        let h = sample.h.min(dest.h);
        for dy in 0..h {
            for dx in 0..w {
                let sx = if flipped {
                    sample.x + sample.w - 1 - dx
                } else {
                    sample.x + dx
                };
                let Some(source) = sheet.pixel(sx, sample.y + dy) else {
                    continue;
                };
                if source[3] == 0 {
                    continue;
                }
                let (x, y) = (dest.x + dx, dest.y + dy);
                let color = if source[3] == u8::MAX {
                    source
                } else {
                    match self.pixel(x, y) {
                        Some(under) => blend(under, source),
                        None => continue,
                    }
                };
                self.put(x, y, color);
            }
        }
    }
}

fn blend(under: Rgba, over: Rgba) -> Rgba {
    let alpha = u16::from(over[3]);
    let mix = |a: u8, b: u8| ((u16::from(b) * alpha + u16::from(a) * (255 - alpha)) / 255) as u8;
    [
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        u8::MAX,
    ]
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: Rgba) {
    if x < 0 || y < 0 {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    if x >= width {
        return;
    }
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}
