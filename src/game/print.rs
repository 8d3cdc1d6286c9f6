//! The debug text overlay: the print buffer that `diPrintf` fills and `diPrintfAll`, which draws
//! it.

use super::gfx::{DisplayList, Gfx, TextureHandle};
use crate::printf::SPACING_CODE;

pub const BUFFER_SIZE: usize = 0x900;

/// Prints are refused once the cursor is further than this into the buffer. The remaining space
/// absorbs the last print that crossed it.
pub const BUFFER_LIMIT: usize = 0x800;

pub const GLYPH_WIDTH: i32 = 8;
pub const LINE_HEIGHT: i32 = 10;

/// Top-left corner of the overlay, before the origin offsets are applied.
pub const MARGIN_X: i32 = 32;
pub const MARGIN_Y: i32 = 24;

const FIRST_GLYPH: u8 = 0x20;
const LAST_GLYPH: u8 = 0x7E;
const GLYPHS_PER_TEXTURE: u8 = 32;

#[derive(Debug)]
pub struct DebugPrint {
    /// `gDebugPrintBufferStart`: NUL-separated strings waiting to be drawn.
    pub buffer: Vec<u8>,

    /// `gDebugPrintBufferEnd`, as an offset into `buffer`.
    pub cursor: usize,

    /// Glyphs are drawn at double width.
    pub scale_x: bool,

    /// Lines are drawn at double height.
    pub scale_y: bool,

    /// Offset of the first line from the margin, in glyph cells.
    pub origin_x: i8,
    pub origin_y: i8,

    /// `gDiTextures`: glyph sheets for 0x20..0x40, 0x40..0x60 and 0x60..0x7F.
    pub textures: [Option<TextureHandle>; 3],
}

impl Default for DebugPrint {
    fn default() -> Self {
        DebugPrint {
            buffer: vec![0; BUFFER_SIZE],
            cursor: 0,
            scale_x: false,
            scale_y: false,
            origin_x: 0,
            origin_y: 0,
            textures: [None; 3],
        }
    }
}

impl DebugPrint {
    /// Returns the strings printed since the last flush.
    pub fn pending(&self) -> impl Iterator<Item = &[u8]> {
        // Every string is NUL-terminated, so splitting leaves an empty tail to drop.
        self.buffer[..self.cursor]
            .split(|b| *b == 0)
            .take(self.pending_count())
    }

    fn pending_count(&self) -> usize {
        self.buffer[..self.cursor].iter().filter(|b| **b == 0).count()
    }

    fn texture_for(&self, glyph: u8) -> Option<TextureHandle> {
        let index = ((glyph - FIRST_GLYPH) / GLYPHS_PER_TEXTURE) as usize;
        self.textures.get(index).copied().flatten()
    }
}

/// Draws every pending string into `gfx`, one per line, then empties the buffer.
pub fn di_printf_all(print: &mut DebugPrint, gfx: &mut DisplayList) {
    let glyph_width = if print.scale_x { GLYPH_WIDTH * 2 } else { GLYPH_WIDTH };
    let line_height = if print.scale_y { LINE_HEIGHT * 2 } else { LINE_HEIGHT };

    let line_start = MARGIN_X + i32::from(print.origin_x) * glyph_width;
    let mut y = MARGIN_Y + i32::from(print.origin_y) * line_height;
    let mut texture = None;

    for string in print.pending() {
        let mut x = line_start;
        let mut bytes = string.iter().copied();

        while let Some(byte) = bytes.next() {
            match byte {
                b'\n' => {
                    x = line_start;
                    y += line_height;
                }

                SPACING_CODE => {
                    let cells = bytes.next().unwrap_or(0);
                    x += i32::from(cells) * glyph_width;
                }

                b' ' => x += glyph_width,

                FIRST_GLYPH..=LAST_GLYPH => {
                    let Some(handle) = print.texture_for(byte) else {
                        x += glyph_width;
                        continue;
                    };

                    if texture != Some(handle) {
                        gfx.push(Gfx::SetTexture(handle));
                        texture = Some(handle);
                    }

                    gfx.push(Gfx::Glyph {
                        x,
                        y,
                        width: glyph_width,
                        height: line_height,
                        glyph: byte,
                    });

                    x += glyph_width;
                }

                // Anything else has no glyph.
                _ => {}
            }
        }

        y += line_height;
    }

    print.cursor = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_strings(strings: &[&[u8]]) -> DebugPrint {
        let mut print = DebugPrint {
            textures: [
                Some(TextureHandle(1)),
                Some(TextureHandle(2)),
                Some(TextureHandle(3)),
            ],
            ..DebugPrint::default()
        };

        for string in strings {
            let end = print.cursor + string.len();
            print.buffer[print.cursor..end].copy_from_slice(string);
            print.buffer[end] = 0;
            print.cursor = end + 1;
        }

        print
    }

    #[test]
    fn test_pending_strings() {
        let print = with_strings(&[b"one", b"two"]);
        let pending: Vec<_> = print.pending().collect();

        assert_eq!(pending, [&b"one"[..], &b"two"[..]]);
        assert_eq!(DebugPrint::default().pending().count(), 0);
    }

    #[test]
    fn test_flush_lays_out_lines() {
        let mut print = with_strings(&[b"Ab", b"c"]);
        let mut gfx = DisplayList::default();

        di_printf_all(&mut print, &mut gfx);

        assert_eq!(
            gfx.commands(),
            [
                Gfx::SetTexture(TextureHandle(2)),
                Gfx::Glyph { x: MARGIN_X, y: MARGIN_Y, width: 8, height: 10, glyph: b'A' },
                Gfx::SetTexture(TextureHandle(3)),
                Gfx::Glyph { x: MARGIN_X + 8, y: MARGIN_Y, width: 8, height: 10, glyph: b'b' },
                Gfx::Glyph { x: MARGIN_X, y: MARGIN_Y + 10, width: 8, height: 10, glyph: b'c' },
            ]
        );

        assert_eq!(print.cursor, 0);
    }

    #[test]
    fn test_flush_spacing_codes_and_newlines() {
        let mut print = with_strings(&[&[b'1', SPACING_CODE, 3, b'2', b'\n', b'3']]);
        let mut gfx = DisplayList::default();

        di_printf_all(&mut print, &mut gfx);

        let positions: Vec<_> = gfx
            .commands()
            .iter()
            .filter_map(|command| match command {
                Gfx::Glyph { x, y, .. } => Some((*x, *y)),
                Gfx::SetTexture(_) => None,
            })
            .collect();

        assert_eq!(
            positions,
            [
                (MARGIN_X, MARGIN_Y),
                (MARGIN_X + 4 * GLYPH_WIDTH, MARGIN_Y),
                (MARGIN_X, MARGIN_Y + LINE_HEIGHT),
            ]
        );
    }

    #[test]
    fn test_flush_scaled_with_origin() {
        let mut print = with_strings(&[b"x"]);
        print.scale_x = true;
        print.scale_y = true;
        print.origin_x = 1;
        print.origin_y = 2;

        let mut gfx = DisplayList::default();
        di_printf_all(&mut print, &mut gfx);

        assert_eq!(
            gfx.commands()[1],
            Gfx::Glyph {
                x: MARGIN_X + 16,
                y: MARGIN_Y + 40,
                width: 16,
                height: 20,
                glyph: b'x'
            }
        );
    }
}
