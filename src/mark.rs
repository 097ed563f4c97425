use anyhow::{anyhow, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::Font;
use tiny_skia::{
    BlendMode, FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform,
};

use crate::font_assets::ensure_supported_codepoints;
use crate::geometry::tile_edge;
use crate::glyph_atlas::GlyphAtlas;
use crate::schema::{ColorRgba, MarkKind, WatermarkConfig};

/// Measured text height is the font size padded by this factor, matching the
/// ascent/descent slack the compositor's tile math expects.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Renders one rotated, opacified instance of the configured mark, centered
/// in a square tile sized by the geometry module (plus gap when tiling).
///
/// Returns `None` when `kind` is `image` but no mark asset has been decoded
/// yet; callers treat that as "nothing to overlay", not as a failure.
pub fn render_mark(
    config: &WatermarkConfig,
    mark_image: Option<&Pixmap>,
    outline_font: Option<&Font>,
) -> Result<Option<Pixmap>> {
    match config.kind {
        MarkKind::Text => render_text_mark(config, outline_font).map(Some),
        MarkKind::Image => match mark_image {
            Some(image) => render_image_mark(config, image).map(Some),
            None => Ok(None),
        },
    }
}

/// Natural (unrotated) extent of the mark text at the requested size.
pub fn measure_text(text: &str, text_size: f32, outline_font: Option<&Font>) -> (f32, f32) {
    let height = (text_size * LINE_HEIGHT_FACTOR).ceil();
    let width = match outline_font {
        Some(font) => {
            let mut layout = new_layout();
            layout.append(&[font], &TextStyle::new(text, text_size, 0));
            let mut max_x = 0.0_f32;
            for glyph in layout.glyphs() {
                max_x = max_x.max(glyph.x + glyph.width as f32);
            }
            max_x.ceil()
        }
        None => {
            // The pixel face is a square-cell font: one cell per character.
            (text.chars().count() as f32) * text_size.ceil()
        }
    };
    (width.max(1.0), height.max(1.0))
}

fn render_text_mark(config: &WatermarkConfig, outline_font: Option<&Font>) -> Result<Pixmap> {
    let (text_w, text_h) = measure_text(&config.text, config.text_size, outline_font);
    let unrotated = match outline_font {
        Some(font) => raster_outline_text(font, &config.text, config.text_size, config.text_color)?,
        None => raster_atlas_text(&config.text, config.text_size, config.text_color)?,
    };

    let edge = tile_edge(text_w, text_h, config.rotation_degrees, config.gap, config.mode);
    let mut tile = new_pixmap(edge, edge)?;

    let offset_x = (((edge as f32) - text_w) / 2.0).floor();
    let offset_y = (((edge as f32) - text_h) / 2.0).floor();
    let center = edge as f32 / 2.0;
    let transform = Transform::from_translate(offset_x, offset_y)
        .post_concat(Transform::from_rotate_at(config.rotation_degrees, center, center));

    tile.draw_pixmap(0, 0, unrotated.as_ref(), &mark_paint(config.opacity), transform, None);
    Ok(tile)
}

fn render_image_mark(config: &WatermarkConfig, image: &Pixmap) -> Result<Pixmap> {
    let scaled_w = image.width() as f32 * config.image_scale;
    let scaled_h = image.height() as f32 * config.image_scale;

    let edge = tile_edge(
        scaled_w,
        scaled_h,
        config.rotation_degrees,
        config.gap,
        config.mode,
    );
    let mut tile = new_pixmap(edge, edge)?;

    let offset_x = (((edge as f32) - scaled_w) / 2.0).floor();
    let offset_y = (((edge as f32) - scaled_h) / 2.0).floor();
    let center = edge as f32 / 2.0;
    let transform = Transform::from_scale(config.image_scale, config.image_scale)
        .post_concat(Transform::from_translate(offset_x, offset_y))
        .post_concat(Transform::from_rotate_at(config.rotation_degrees, center, center));

    tile.draw_pixmap(0, 0, image.as_ref(), &mark_paint(config.opacity), transform, None);
    Ok(tile)
}

fn mark_paint(opacity: f32) -> PixmapPaint {
    PixmapPaint {
        opacity: opacity.clamp(0.0, 1.0),
        blend_mode: BlendMode::SourceOver,
        quality: FilterQuality::Bilinear,
    }
}

fn new_layout() -> Layout {
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x: 0.0,
        y: 0.0,
        max_width: None,
        max_height: None,
        horizontal_align: fontdue::layout::HorizontalAlign::Left,
        vertical_align: fontdue::layout::VerticalAlign::Top,
        line_height: 1.0,
        wrap_style: fontdue::layout::WrapStyle::Letter,
        wrap_hard_breaks: true,
    });
    layout
}

fn raster_outline_text(
    font: &Font,
    text: &str,
    text_size: f32,
    color: ColorRgba,
) -> Result<Pixmap> {
    ensure_supported_codepoints(font, text, "mark text")?;

    let (text_w, text_h) = measure_text(text, text_size, Some(font));
    let mut pixmap = new_pixmap(text_w as u32, text_h as u32)?;

    let mut layout = new_layout();
    layout.append(&[font], &TextStyle::new(text, text_size, 0));
    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (_, coverage) = font.rasterize_config(glyph.key);
        let origin_x = glyph.x.round() as i32;
        let origin_y = glyph.y.round() as i32;

        for row in 0..glyph.height {
            for col in 0..glyph.width {
                stamp_coverage(
                    &mut pixmap,
                    origin_x + col as i32,
                    origin_y + row as i32,
                    coverage[row * glyph.width + col],
                    color,
                );
            }
        }
    }

    Ok(pixmap)
}

fn raster_atlas_text(text: &str, text_size: f32, color: ColorRgba) -> Result<Pixmap> {
    let atlas = GlyphAtlas::new();
    let (text_w, text_h) = measure_text(text, text_size, None);
    let mut pixmap = new_pixmap(text_w as u32, text_h as u32)?;

    let cell = text_size.ceil().max(1.0) as u32;
    let origin_y = (((text_h - cell as f32) / 2.0).floor().max(0.0)) as u32;

    for (index, character) in text.chars().enumerate() {
        // Unsupported characters still advance one cell so spacing survives.
        if !atlas.supports(character) {
            continue;
        }
        let origin_x = index as u32 * cell;

        for dy in 0..cell {
            let glyph_y = (dy * atlas.glyph_height() / cell).min(atlas.glyph_height() - 1);
            for dx in 0..cell {
                let glyph_x = (dx * atlas.glyph_width() / cell).min(atlas.glyph_width() - 1);
                if atlas.sample(character, glyph_x, glyph_y) {
                    stamp_coverage(
                        &mut pixmap,
                        (origin_x + dx) as i32,
                        (origin_y + dy) as i32,
                        255,
                        color,
                    );
                }
            }
        }
    }

    Ok(pixmap)
}

fn stamp_coverage(pixmap: &mut Pixmap, x: i32, y: i32, coverage: u8, color: ColorRgba) {
    if coverage == 0 || x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x >= pixmap.width() || y >= pixmap.height() {
        return;
    }

    let alpha = mul_div255(coverage, color.a);
    if alpha == 0 {
        return;
    }

    let index = (y * pixmap.width() + x) as usize;
    let pixels = pixmap.pixels_mut();
    // Glyph boxes may overlap at their edges; keep the denser coverage.
    if pixels[index].alpha() >= alpha {
        return;
    }
    pixels[index] = PremultipliedColorU8::from_rgba(
        mul_div255(color.r, alpha),
        mul_div255(color.g, alpha),
        mul_div255(color.b, alpha),
        alpha,
    )
    .unwrap_or(PremultipliedColorU8::TRANSPARENT);
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width.max(1), height.max(1))
        .ok_or_else(|| anyhow!("failed to allocate {width}x{height} mark buffer"))
}

fn mul_div255(value: u8, scale: u8) -> u8 {
    ((u32::from(value) * u32::from(scale) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tile_edge;
    use crate::media::pixmap_from_rgba;
    use crate::schema::{MarkKind, MarkMode, WatermarkConfig};

    fn text_config() -> WatermarkConfig {
        let mut config = WatermarkConfig::default();
        config.text = "AX".to_owned();
        config.text_size = 16.0;
        config.opacity = 1.0;
        config.rotation_degrees = 0.0;
        config.gap = 0;
        config.mode = MarkMode::Tiled;
        config
    }

    #[test]
    fn text_tile_matches_geometry_sizing() {
        let config = text_config();
        let tile = render_mark(&config, None, None)
            .expect("render should succeed")
            .expect("text kind always yields a tile");

        let (w, h) = measure_text(&config.text, config.text_size, None);
        let expected = tile_edge(w, h, 0.0, 0, MarkMode::Tiled);
        assert_eq!(tile.width(), expected);
        assert_eq!(tile.height(), expected);
    }

    #[test]
    fn text_tile_has_ink() {
        let tile = render_mark(&text_config(), None, None)
            .expect("render should succeed")
            .expect("tile");
        assert!(tile.pixels().iter().any(|pixel| pixel.alpha() > 0));
    }

    #[test]
    fn gap_grows_tiled_tiles_only() {
        let mut config = text_config();
        config.gap = 40;
        let tiled = render_mark(&config, None, None).expect("render").expect("tile");

        config.mode = MarkMode::Single;
        let single = render_mark(&config, None, None).expect("render").expect("tile");

        assert_eq!(tiled.width(), single.width() + 40);
    }

    #[test]
    fn image_kind_without_asset_is_noop() {
        let mut config = text_config();
        config.kind = MarkKind::Image;
        let result = render_mark(&config, None, None).expect("render should not fail");
        assert!(result.is_none());
    }

    #[test]
    fn image_mark_scales_before_bounding() {
        let data = vec![255_u8; 16 * 8 * 4];
        let asset = pixmap_from_rgba(&data, 16, 8).expect("asset should build");

        let mut config = text_config();
        config.kind = MarkKind::Image;
        config.image_scale = 2.0;
        config.rotation_degrees = 0.0;
        config.mode = MarkMode::Single;

        let tile = render_mark(&config, Some(&asset), None)
            .expect("render")
            .expect("tile");
        // 16x8 scaled by 2 -> bounds 32x16 -> square tile of 32.
        assert_eq!(tile.width(), 32);
        assert!(tile.pixels().iter().any(|pixel| pixel.alpha() > 0));
    }

    #[test]
    fn rotation_quarter_turn_swaps_tile_bounds() {
        let data = vec![255_u8; 20 * 10 * 4];
        let asset = pixmap_from_rgba(&data, 20, 10).expect("asset should build");

        let mut config = text_config();
        config.kind = MarkKind::Image;
        config.image_scale = 1.0;
        config.mode = MarkMode::Single;
        config.rotation_degrees = 90.0;

        let tile = render_mark(&config, Some(&asset), None)
            .expect("render")
            .expect("tile");
        assert_eq!(tile.width(), 20);

        // The rotated stamp is 10 wide and 20 tall: rows near the vertical
        // midline carry ink, columns near the left edge do not.
        let center_x = tile.width() / 2;
        let mut midline_ink = false;
        for y in 0..tile.height() {
            if tile.pixels()[(y * tile.width() + center_x) as usize].alpha() > 0 {
                midline_ink = true;
            }
        }
        assert!(midline_ink);
    }

    #[test]
    fn opacity_halves_coverage() {
        let mut config = text_config();
        config.opacity = 0.5;
        let tile = render_mark(&config, None, None).expect("render").expect("tile");
        let max_alpha = tile.pixels().iter().map(|p| p.alpha()).max().unwrap_or(0);
        assert!(max_alpha > 0 && max_alpha < 255, "alpha {max_alpha}");
    }
}
