use crate::glyph_atlas_data::{
    GlyphRows, ASCII_END, ASCII_START, GLYPH_COUNT, GLYPH_HEIGHT, GLYPH_WIDTH, PIXEL_GLYPHS,
};

/// Built-in pixel face used for text marks when no outline font is
/// configured. Printable ASCII only; anything else samples as empty.
#[derive(Debug, Clone, Copy)]
pub struct GlyphAtlas {
    glyphs: &'static [GlyphRows; GLYPH_COUNT],
}

impl GlyphAtlas {
    pub fn new() -> Self {
        Self {
            glyphs: &PIXEL_GLYPHS,
        }
    }

    pub fn glyph_width(&self) -> u32 {
        GLYPH_WIDTH
    }

    pub fn glyph_height(&self) -> u32 {
        GLYPH_HEIGHT
    }

    pub fn supports(&self, character: char) -> bool {
        let code = character as u32;
        code >= u32::from(ASCII_START) && code <= u32::from(ASCII_END)
    }

    pub fn sample(&self, character: char, x: u32, y: u32) -> bool {
        if !self.supports(character) || x >= GLYPH_WIDTH || y >= GLYPH_HEIGHT {
            return false;
        }

        let glyph_index = (character as u8 - ASCII_START) as usize;
        let row_mask = self.glyphs[glyph_index][y as usize];
        ((row_mask >> (GLYPH_WIDTH - 1 - x)) & 1) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::GlyphAtlas;

    #[test]
    fn space_is_empty() {
        let atlas = GlyphAtlas::new();
        for y in 0..atlas.glyph_height() {
            for x in 0..atlas.glyph_width() {
                assert!(!atlas.sample(' ', x, y));
            }
        }
    }

    #[test]
    fn printable_letters_have_coverage() {
        let atlas = GlyphAtlas::new();
        for character in ['A', 'z', '0', '@'] {
            let mut on_pixels = 0;
            for y in 0..atlas.glyph_height() {
                for x in 0..atlas.glyph_width() {
                    if atlas.sample(character, x, y) {
                        on_pixels += 1;
                    }
                }
            }
            assert!(on_pixels > 0, "glyph '{character}' should not be blank");
        }
    }

    #[test]
    fn non_ascii_samples_empty() {
        let atlas = GlyphAtlas::new();
        assert!(!atlas.supports('心'));
        assert!(!atlas.sample('心', 3, 3));
        assert!(!atlas.sample('\n', 0, 0));
    }

    #[test]
    fn out_of_cell_coordinates_sample_empty() {
        let atlas = GlyphAtlas::new();
        assert!(!atlas.sample('A', 8, 0));
        assert!(!atlas.sample('A', 0, 8));
    }
}
