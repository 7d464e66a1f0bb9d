/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The MTMC-16 frame buffer.

use std::default::Default;

use failure::Fail;

use sprite::Sprite;

/// The width of the display.
pub const WIDTH: usize = 160;
/// The height of the display.
pub const HEIGHT: usize = 144;

/// The colour the display is filled with when it is reset.
pub const BACKGROUND: u8 = 3;

/// The source rectangle and destination size of a sprite blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blit {
    /// The left edge of the source rectangle.
    pub sx: i32,
    /// The top edge of the source rectangle.
    pub sy: i32,
    /// The width of the source rectangle.
    pub sw: i32,
    /// The height of the source rectangle.
    pub sh: i32,
    /// The width drawn on the display.
    pub w: i32,
    /// The height drawn on the display.
    pub h: i32,
}

impl Blit {
    /// Returns a blit of the whole sprite at its own size.
    pub fn whole(sprite: &Sprite) -> Self {
        let (w, h) = (sprite.width() as i32, sprite.height() as i32);
        Blit {
            sx: 0,
            sy: 0,
            sw: w,
            sh: h,
            w,
            h,
        }
    }

    /// Returns a blit of the whole sprite scaled to the given size.
    pub fn scaled(sprite: &Sprite, w: i32, h: i32) -> Self {
        Blit {
            w,
            h,
            ..Blit::whole(sprite)
        }
    }

    /// Returns a blit of part of the sprite at its own size.
    pub fn clipped(sx: i32, sy: i32, w: i32, h: i32) -> Self {
        Blit {
            sx,
            sy,
            sw: w,
            sh: h,
            w,
            h,
        }
    }
}

/// A 4-colour display buffer.
pub struct Buffer {
    /// The colour of each pixel, row by row.
    data: Vec<u8>,
    /// Whether the display needs to be refreshed.
    needs_refresh: bool,
}

impl Buffer {
    /// Returns a new display buffer filled with the background colour.
    pub fn new() -> Self {
        Buffer {
            data: vec![BACKGROUND; WIDTH * HEIGHT],
            needs_refresh: true,
        }
    }

    /// Fills the whole display with the given colour.
    pub fn clear(&mut self, color: u8) {
        for px in self.data.iter_mut() {
            *px = color & 3;
        }
        self.needs_refresh = true;
    }

    /// Returns a reference to the underlying pixel data (row-major).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the colour of the given pixel, or `None` if it is off the
    /// display.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        index(x, y).map(|i| self.data[i])
    }

    /// Sets the given pixel, ignoring pixels off the display.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u8) {
        if let Some(i) = index(x, y) {
            self.data[i] = color & 3;
            self.needs_refresh = true;
        }
    }

    /// Fills a rectangle, clipped to the display.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u8) {
        let (x0, y0) = (x.max(0), y.max(0));
        let x1 = x.saturating_add(w).min(WIDTH as i32);
        let y1 = y.saturating_add(h).min(HEIGHT as i32);
        for j in y0..y1 {
            for i in x0..x1 {
                self.set_pixel(i, j, color);
            }
        }
    }

    /// Draws a line between two points (inclusive), clipped to the display.
    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (step_x, step_y) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += step_x;
            }
            if e2 <= dx {
                err += dx;
                y += step_y;
            }
        }
    }

    /// Draws part of a sprite with its top left corner at the given position.
    ///
    /// Destination pixels are mapped back to the source rectangle by
    /// nearest-neighbour sampling.  Transparent pixels, and pixels outside
    /// either the sprite or the display, are skipped.
    pub fn draw_sprite(&mut self, sprite: &Sprite, x: i32, y: i32, blit: Blit) {
        if blit.w <= 0 || blit.h <= 0 || blit.sw <= 0 || blit.sh <= 0 {
            return;
        }

        for j in 0..blit.h.min(HEIGHT as i32 - y) {
            let sy = blit.sy + j * blit.sh / blit.h;
            for i in 0..blit.w.min(WIDTH as i32 - x) {
                if x + i < 0 || y + j < 0 || sy < 0 {
                    continue;
                }
                let sx = blit.sx + i * blit.sw / blit.w;
                if sx < 0 {
                    continue;
                }
                if let Some(color) = sprite.pixel(sx as usize, sy as usize) {
                    self.set_pixel(x + i, y + j, color);
                }
            }
        }
    }

    /// Forces a refresh on the next call to `refresh`, even if nothing has
    /// been drawn.
    pub fn force_refresh(&mut self) {
        self.needs_refresh = true;
    }

    /// Refreshes the display using the given refresh function.
    ///
    /// If nothing has changed since the last refresh, nothing will be done.
    /// The refresh function receives a "snapshot" of the display, and should
    /// draw that to whatever user-facing display is currently being used.
    pub fn refresh<F, E>(&mut self, f: F) -> Result<(), E>
    where
        F: FnOnce(&Self) -> Result<(), E>,
        E: Fail,
    {
        if self.needs_refresh {
            f(self)?;
            self.needs_refresh = false;
        }
        Ok(())
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

fn index(x: i32, y: i32) -> Option<usize> {
    if x >= 0 && y >= 0 && (x as usize) < WIDTH && (y as usize) < HEIGHT {
        Some(y as usize * WIDTH + x as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Fail)]
    #[fail(display = "refresh failed")]
    struct RefreshError;

    fn count(buffer: &Buffer, color: u8) -> usize {
        buffer.data().iter().filter(|&&c| c == color).count()
    }

    #[test]
    fn fill_rect_is_clipped() {
        // Test cases, in the format ((x, y, w, h), pixels filled).
        let cases = [
            ((0, 0, 2, 3), 6),
            ((-1, -1, 2, 2), 1),
            ((158, 142, 10, 10), 4),
            ((10, 10, 0, 5), 0),
            ((10, 10, -3, 5), 0),
            ((200, 0, 5, 5), 0),
        ];

        for &((x, y, w, h), filled) in cases.iter() {
            let mut buffer = Buffer::new();
            buffer.fill_rect(x, y, w, h, 1);
            assert_eq!(count(&buffer, 1), filled, "case {:?}", (x, y, w, h));
        }
    }

    #[test]
    fn lines() {
        let mut buffer = Buffer::new();
        buffer.line(0, 0, 3, 3, 0);
        for i in 0..4 {
            assert_eq!(buffer.pixel(i, i), Some(0));
        }
        assert_eq!(count(&buffer, 0), 4);

        buffer.clear(BACKGROUND);
        buffer.line(5, 2, 1, 2, 2);
        assert_eq!(count(&buffer, 2), 5);
        assert_eq!(buffer.pixel(1, 2), Some(2));

        buffer.clear(BACKGROUND);
        buffer.line(-2, 0, 2, 0, 1);
        assert_eq!(count(&buffer, 1), 3);
    }

    #[test]
    fn sprites() {
        let mut sprite = Sprite::new(2, 2);
        sprite.set_pixel(0, 0, Some(1));
        sprite.set_pixel(1, 0, None);
        sprite.set_pixel(0, 1, Some(2));
        sprite.set_pixel(1, 1, Some(2));

        let mut buffer = Buffer::new();
        buffer.draw_sprite(&sprite, 4, 5, Blit::whole(&sprite));
        assert_eq!(buffer.pixel(4, 5), Some(1));
        assert_eq!(buffer.pixel(5, 5), Some(BACKGROUND));
        assert_eq!(buffer.pixel(5, 6), Some(2));

        buffer.clear(BACKGROUND);
        buffer.draw_sprite(&sprite, 0, 0, Blit::scaled(&sprite, 4, 4));
        assert_eq!(count(&buffer, 1), 4);
        assert_eq!(count(&buffer, 2), 8);
        assert_eq!(buffer.pixel(1, 1), Some(1));
        assert_eq!(buffer.pixel(3, 1), Some(BACKGROUND));

        buffer.clear(BACKGROUND);
        buffer.draw_sprite(&sprite, 10, 10, Blit::clipped(0, 1, 2, 1));
        assert_eq!(count(&buffer, 2), 2);
        assert_eq!(buffer.pixel(10, 10), Some(2));

        buffer.clear(BACKGROUND);
        buffer.draw_sprite(&sprite, -1, 142, Blit::whole(&sprite));
        assert_eq!(buffer.pixel(0, 143), Some(2));
        assert_eq!(count(&buffer, 2), 1);
    }

    #[test]
    fn refresh() {
        let mut buffer = Buffer::new();
        let mut refreshes = 0;
        for _ in 0..2 {
            buffer
                .refresh(|_| {
                    refreshes += 1;
                    Ok::<(), RefreshError>(())
                })
                .unwrap();
        }
        assert_eq!(refreshes, 1);

        buffer.set_pixel(0, 0, 2);
        buffer
            .refresh(|b| {
                assert_eq!(b.pixel(0, 0), Some(2));
                refreshes += 1;
                Ok::<(), RefreshError>(())
            })
            .unwrap();
        assert_eq!(refreshes, 2);
    }
}
