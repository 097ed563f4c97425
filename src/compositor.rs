use anyhow::{anyhow, Result};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::schema::{MarkMode, WatermarkConfig};

/// Composites the source frame and the mark tile into a fresh output buffer.
///
/// The output always matches the source frame's dimensions and carries the
/// source unscaled at the origin. `mark = None` (asset still pending) leaves
/// the output as source-only. The whole buffer is rebuilt on every call;
/// there is no incremental recomposition.
pub fn composite(
    source_frame: &Pixmap,
    config: &WatermarkConfig,
    mark: Option<&Pixmap>,
) -> Result<Pixmap> {
    let width = source_frame.width();
    let height = source_frame.height();
    let mut output = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate {width}x{height} output buffer"))?;

    let paint = PixmapPaint::default();
    output.draw_pixmap(
        0,
        0,
        source_frame.as_ref(),
        &paint,
        Transform::identity(),
        None,
    );

    let Some(tile) = mark else {
        return Ok(output);
    };

    match config.mode {
        MarkMode::Tiled => {
            // The tile edge already includes the gap, so stepping by it is
            // exactly the repeat period.
            let period = tile.width().max(1);
            let mut y = 0_u32;
            while y < height {
                let mut x = 0_u32;
                while x < width {
                    output.draw_pixmap(
                        x as i32,
                        y as i32,
                        tile.as_ref(),
                        &paint,
                        Transform::identity(),
                        None,
                    );
                    x += period;
                }
                y += period;
            }
        }
        MarkMode::Single => {
            let x = (i64::from(width) - i64::from(tile.width())) / 2;
            let y = (i64::from(height) - i64::from(tile.height())) / 2;
            output.draw_pixmap(
                x as i32,
                y as i32,
                tile.as_ref(),
                &paint,
                Transform::identity(),
                None,
            );
        }
    }

    Ok(output)
}
