/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Sprites and their PNG encoding.
//!
//! A sprite is stored as two bit planes, both row-major with each row padded
//! to a whole number of bytes: a transparency mask with one bit per pixel
//! (set means transparent) and a colour plane with two bits per pixel.  In
//! both planes the leftmost pixel of a byte is in its least significant bits.

use std::io::{Read, Write};

use failure::Error;
use png;

use {MAX_GRAPHIC_HEIGHT, MAX_GRAPHIC_WIDTH};

/// The four sprite colours, as RGB triples.
pub const PALETTE: [[u8; 3]; 4] = [[42, 69, 59], [54, 93, 72], [87, 124, 68], [127, 134, 15]];

/// An error resulting from a PNG in a colour format that can't be mapped to
/// the palette.
#[derive(Debug, Fail)]
#[fail(display = "PNG color type {:?} not supported", _0)]
pub struct UnsupportedColorError(pub png::ColorType);

/// An error resulting from an image larger than any sprite may be.
#[derive(Debug, Fail)]
#[fail(display = "image is too large: {}x{}", _0, _1)]
pub struct ImageTooLargeError(pub u32, pub u32);

/// A sprite image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    width: usize,
    height: usize,
    mask: Vec<u8>,
    data: Vec<u8>,
}

impl Sprite {
    /// Returns a new sprite of the given size, filled with opaque colour 0.
    pub fn new(width: usize, height: usize) -> Self {
        Sprite {
            width,
            height,
            mask: vec![0; (width + 7) / 8 * height],
            data: vec![0; (width + 3) / 4 * height],
        }
    }

    /// Returns the width of the sprite.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the sprite.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the colour of the given pixel, or `None` if it is transparent.
    ///
    /// Pixels outside the sprite are transparent.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        if self.mask[self.mask_index(x, y)] >> (x % 8) & 1 == 1 {
            None
        } else {
            Some(self.data[self.data_index(x, y)] >> (x % 4 * 2) & 3)
        }
    }

    /// Sets the given pixel to a colour, or makes it transparent.
    ///
    /// Pixels outside the sprite are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Option<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (mi, di) = (self.mask_index(x, y), self.data_index(x, y));
        let shift = x % 4 * 2;
        self.data[di] &= !(3 << shift);
        match color {
            Some(c) => {
                self.mask[mi] &= !(1 << (x % 8));
                self.data[di] |= (c & 3) << shift;
            }
            None => self.mask[mi] |= 1 << (x % 8),
        }
    }

    /// Returns whether any pixel is transparent.
    pub fn has_mask(&self) -> bool {
        self.mask.iter().any(|&b| b != 0)
    }

    /// Decodes a sprite from PNG data.
    ///
    /// The image must be RGB or RGBA once palettes and bit depths have been
    /// expanded.  Pixels with an alpha below one half are transparent, and
    /// every other pixel takes the nearest palette colour.
    pub fn decode_png<R: Read>(input: R) -> Result<Self, Error> {
        let mut decoder = png::Decoder::new(input);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let (info, mut reader) = decoder.read_info()?;
        if info.width as usize > MAX_GRAPHIC_WIDTH || info.height as usize > MAX_GRAPHIC_HEIGHT {
            return Err(ImageTooLargeError(info.width, info.height).into());
        }
        let stride = match info.color_type {
            png::ColorType::RGB => 3,
            png::ColorType::RGBA => 4,
            other => Err(UnsupportedColorError(other))?,
        };

        let mut buf = vec![0; info.buffer_size()];
        reader.next_frame(&mut buf)?;

        let mut sprite = Sprite::new(info.width as usize, info.height as usize);
        for (y, row) in buf.chunks(info.line_size).take(sprite.height).enumerate() {
            for (x, px) in row.chunks(stride).take(sprite.width).enumerate() {
                let alpha = if stride == 4 { px[3] } else { 255 };
                let color = if alpha < 127 {
                    None
                } else {
                    Some(nearest_color(px[0], px[1], px[2]))
                };
                sprite.set_pixel(x, y, color);
            }
        }
        trace!("decoded {}x{} sprite", sprite.width, sprite.height);

        Ok(sprite)
    }

    /// Encodes the sprite as an 8-bit indexed PNG.
    ///
    /// Transparent pixels use a fifth, fully transparent palette entry, which
    /// is only present if the sprite has any.
    pub fn encode_png<W: Write>(&self, output: W) -> Result<(), Error> {
        let masked = self.has_mask();
        let mut palette: Vec<u8> = PALETTE.iter().flat_map(|c| c.iter().cloned()).collect();
        if masked {
            palette.extend_from_slice(&[0, 0, 0]);
        }

        let mut encoder = png::Encoder::new(output, self.width as u32, self.height as u32);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(palette);
        if masked {
            encoder.set_trns(vec![255, 255, 255, 255, 0]);
        }

        let mut pixels = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push(self.pixel(x, y).unwrap_or(4));
            }
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;

        Ok(())
    }

    fn mask_index(&self, x: usize, y: usize) -> usize {
        (self.width + 7) / 8 * y + x / 8
    }

    fn data_index(&self, x: usize, y: usize) -> usize {
        (self.width + 3) / 4 * y + x / 4
    }
}

/// Returns the index of the palette colour nearest to the given one.
///
/// Ties go to the lower index.
pub fn nearest_color(r: u8, g: u8, b: u8) -> u8 {
    let dist = |c: &[u8; 3]| {
        let (dr, dg, db) = (
            r as i32 - c[0] as i32,
            g as i32 - c[1] as i32,
            b as i32 - c[2] as i32,
        );
        dr * dr + dg * dg + db * db
    };

    let mut best = 0;
    for (i, c) in PALETTE.iter().enumerate().skip(1) {
        if dist(c) < dist(&PALETTE[best]) {
            best = i;
        }
    }
    best as u8
}
