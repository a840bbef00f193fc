//! Monochrome display buffer.
use std::fmt::Write as FmtWrite;

use crate::constants::*;

/// 64x32 pixel grid, stored row-major.
///
/// Only the clear and draw instructions mutate the buffer.
pub struct Framebuffer {
    pixels: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[(x & DISPLAY_WIDTH_MASK) + (y & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH]
    }

    #[inline]
    pub fn pixels(&self) -> &[bool; DISPLAY_BUFFER_SIZE] {
        &self.pixels
    }

    /// XOR a sprite onto the buffer with its top left corner at `(x, y)`.
    ///
    /// Each byte of `sprite` is one row, most significant bit leftmost.
    /// Coordinates wrap around to the opposite edge instead of clipping.
    ///
    /// Returns `true` when any pixel was switched from set to clear.
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let mut is_erased = false;

        for (r, row) in sprite.iter().enumerate() {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            for c in 0..8 {
                let d = ((x + c) & DISPLAY_WIDTH_MASK)
                    + ((y + r) & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH;

                let old_px = self.pixels[d];
                let new_px = (row >> (7 - c) & 1) != 0;

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= old_px && new_px;

                self.pixels[d] = old_px ^ new_px;
            }
        }

        is_erased
    }

    /// Number of pixels currently set.
    pub fn count_lit(&self) -> usize {
        self.pixels.iter().filter(|px| **px).count()
    }

    /// Returns the contents of the display as a human readable string.
    pub fn dump(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT);

        for row in self.pixels.chunks(DISPLAY_WIDTH) {
            for px in row {
                buf.write_char(if *px { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_draw_msb_first() {
        let mut fb = Framebuffer::new();
        let erased = fb.draw_sprite(0, 0, &[0b1000_0001]);

        assert!(!erased);
        assert!(fb.get(0, 0));
        assert!(!fb.get(1, 0));
        assert!(fb.get(7, 0));
        assert_eq!(fb.count_lit(), 2);
    }

    #[test]
    fn test_draw_wraps() {
        let mut fb = Framebuffer::new();
        // Bottom right corner, 2 rows of 8 pixels.
        fb.draw_sprite(60, 31, &[0xFF, 0xFF]);

        assert!(fb.get(63, 31));
        assert!(fb.get(0, 31)); // column 64 wraps to 0
        assert!(fb.get(3, 31));
        assert!(!fb.get(4, 31));
        assert!(fb.get(60, 0)); // row 32 wraps to 0
        assert!(fb.get(3, 0));
        assert_eq!(fb.count_lit(), 16);
    }

    #[test]
    fn test_draw_involution() {
        let mut fb = Framebuffer::new();
        let sprite = [0xF0, 0x90, 0x90, 0x90, 0xF0];

        assert!(!fb.draw_sprite(10, 5, &sprite));
        assert!(fb.count_lit() > 0);
        assert!(fb.draw_sprite(10, 5, &sprite));
        assert_eq!(fb.count_lit(), 0);
    }

    #[test]
    fn test_zero_bits_do_not_erase() {
        let mut fb = Framebuffer::new();

        // ____####
        assert!(!fb.draw_sprite(4, 0, &[0b1111_0000]));
        // ####____ drawn over the previous sprite's empty half
        assert!(!fb.draw_sprite(0, 0, &[0b1111_0000]));
        assert_eq!(fb.count_lit(), 8);
    }

    #[test]
    fn test_clear_and_dump() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, &[0b1100_0000]);

        let dump = fb.dump().unwrap();
        assert!(dump.starts_with("##......"));
        assert_eq!(dump.lines().count(), DISPLAY_HEIGHT);

        fb.clear();
        assert_eq!(fb.count_lit(), 0);
    }
}
