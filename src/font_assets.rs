use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::Font;

/// Loads a user-supplied TTF/OTF for the outline text path.
pub fn load_outline_font(path: &Path) -> Result<Font> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file '{}'", path.display()))?;
    Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font '{}': {error}", path.display()))
}

/// Rejects mark text the configured outline font cannot shape. A missing
/// glyph would silently render as nothing, which reads as data loss.
pub fn ensure_supported_codepoints(font: &Font, text: &str, font_label: &str) -> Result<()> {
    for ch in text.chars() {
        if matches!(ch, '\n' | '\r' | '\t') {
            continue;
        }
        if font.lookup_glyph_index(ch) == 0 {
            return Err(anyhow!(
                "unsupported codepoint U+{:04X} ({}) in font {}",
                ch as u32,
                ch.escape_default(),
                font_label
            ));
        }
    }
    Ok(())
}
