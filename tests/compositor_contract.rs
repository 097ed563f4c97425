use sigil::compositor::composite;
use sigil::mark::{measure_text, render_mark};
use sigil::media::pixmap_from_rgba;
use sigil::schema::{MarkKind, MarkMode, WatermarkConfig};
use tiny_skia::Pixmap;

fn solid_source(width: u32, height: u32, rgba: [u8; 4]) -> Pixmap {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&rgba);
    }
    pixmap_from_rgba(&data, width, height).expect("source pixmap should build")
}

fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> tiny_skia::PremultipliedColorU8 {
    pixmap.pixels()[(y * pixmap.width() + x) as usize]
}

fn tiled_text_config(gap: u32, rotation: f32) -> WatermarkConfig {
    let mut config = WatermarkConfig::default();
    config.text = "AX".to_owned();
    config.text_size = 16.0;
    config.opacity = 0.6;
    config.mode = MarkMode::Tiled;
    config.rotation_degrees = rotation;
    config.gap = gap;
    config
}

#[test]
fn tiled_output_is_periodic_for_any_gap() {
    for gap in [0_u32, 24, 60] {
        let config = tiled_text_config(gap, 30.0);
        let tile = render_mark(&config, None, None)
            .expect("mark should render")
            .expect("text kind always yields a tile");
        let period = tile.width();

        let edge = period * 2 + 10;
        let source = solid_source(edge, edge, [90, 90, 90, 255]);
        let output = composite(&source, &config, Some(&tile)).expect("composite should succeed");

        for y in 0..period {
            for x in 0..period {
                let origin = pixel(&output, x, y);
                assert_eq!(
                    origin,
                    pixel(&output, x + period, y),
                    "horizontal period broken at ({x},{y}) with gap {gap}"
                );
                assert_eq!(
                    origin,
                    pixel(&output, x, y + period),
                    "vertical period broken at ({x},{y}) with gap {gap}"
                );
            }
        }
    }
}

#[test]
fn tile_period_matches_measured_text_at_zero_rotation() {
    // gap 0, rotation 0: the period is exactly the larger text extent.
    let config = tiled_text_config(0, 0.0);
    let tile = render_mark(&config, None, None)
        .expect("mark should render")
        .expect("tile");

    let (text_w, text_h) = measure_text(&config.text, config.text_size, None);
    assert_eq!(tile.width(), text_w.max(text_h).ceil() as u32);
}

#[test]
fn single_image_mark_lands_centered_within_one_pixel() {
    let asset = solid_source(10, 10, [255, 255, 255, 255]);

    let mut config = WatermarkConfig::default();
    config.kind = MarkKind::Image;
    config.image_scale = 1.0;
    config.rotation_degrees = 0.0;
    config.opacity = 1.0;
    config.mode = MarkMode::Single;

    let tile = render_mark(&config, Some(&asset), None)
        .expect("mark should render")
        .expect("tile");

    for (width, height) in [(101_u32, 101_u32), (100, 60)] {
        let source = solid_source(width, height, [10, 10, 10, 255]);
        let output = composite(&source, &config, Some(&tile)).expect("composite should succeed");

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0_u32, 0_u32);
        let mut ink = 0_u32;
        for y in 0..height {
            for x in 0..width {
                if pixel(&output, x, y).red() > 128 {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                    ink += 1;
                }
            }
        }

        assert_eq!(ink, 100, "exactly one 10x10 stamp expected");
        let center_x = (min_x + max_x) as f32 / 2.0;
        let center_y = (min_y + max_y) as f32 / 2.0;
        assert!((center_x - (width as f32 - 1.0) / 2.0).abs() <= 1.0);
        assert!((center_y - (height as f32 - 1.0) / 2.0).abs() <= 1.0);
    }
}

#[test]
fn single_text_mark_renders_once_opaque_and_near_center() {
    let mut config = WatermarkConfig::default();
    config.text = "SAMPLE".to_owned();
    config.text_size = 24.0;
    config.opacity = 1.0;
    config.rotation_degrees = 0.0;
    config.mode = MarkMode::Single;

    let source = solid_source(800, 600, [40, 40, 40, 255]);
    let tile = render_mark(&config, None, None)
        .expect("mark should render")
        .expect("tile");
    let output = composite(&source, &config, Some(&tile)).expect("composite should succeed");

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0_u32, 0_u32);
    let mut pure_white = false;
    for y in 0..600 {
        for x in 0..800 {
            let px = pixel(&output, x, y);
            if px.red() > 60 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
                if (px.red(), px.green(), px.blue(), px.alpha()) == (255, 255, 255, 255) {
                    pure_white = true;
                }
            }
        }
    }

    assert!(pure_white, "opacity 1 must leave fully opaque mark pixels");
    // All ink fits inside the single centered tile.
    assert!(max_x - min_x < tile.width());
    assert!(max_y - min_y < tile.height());
    // Glyph boxes are not perfectly symmetric; allow slack proportional to
    // one scaled font pixel on either side.
    let center_x = (min_x + max_x) as f32 / 2.0;
    let center_y = (min_y + max_y) as f32 / 2.0;
    assert!((center_x - 399.5).abs() <= 4.0, "center_x = {center_x}");
    assert!((center_y - 299.5).abs() <= 4.0, "center_y = {center_y}");
    // Corners stay untouched.
    assert_eq!(pixel(&output, 0, 0).red(), 40);
    assert_eq!(pixel(&output, 799, 599).red(), 40);
}

#[test]
fn image_kind_without_asset_leaves_source_untouched() {
    let mut config = WatermarkConfig::default();
    config.kind = MarkKind::Image;

    let source = solid_source(64, 32, [120, 60, 30, 255]);
    let mark = render_mark(&config, None, None).expect("render should not fail");
    assert!(mark.is_none());

    let output = composite(&source, &config, mark.as_ref()).expect("composite should succeed");
    assert_eq!(output.data(), source.data());
}

#[test]
fn recomposition_is_byte_identical() {
    let config = tiled_text_config(30, -30.0);
    let source = solid_source(200, 150, [5, 80, 160, 255]);

    let tile_a = render_mark(&config, None, None).expect("render").expect("tile");
    let tile_b = render_mark(&config, None, None).expect("render").expect("tile");
    assert_eq!(tile_a.data(), tile_b.data());

    let first = composite(&source, &config, Some(&tile_a)).expect("composite");
    let second = composite(&source, &config, Some(&tile_b)).expect("composite");
    assert_eq!(first.data(), second.data());
}

#[test]
fn output_always_matches_source_dimensions() {
    let config = tiled_text_config(150, -30.0);
    // Source smaller than one tile period still composites cleanly.
    let source = solid_source(20, 14, [200, 200, 200, 255]);
    let tile = render_mark(&config, None, None).expect("render").expect("tile");
    let output = composite(&source, &config, Some(&tile)).expect("composite");
    assert_eq!((output.width(), output.height()), (20, 14));
}
