use crate::schema::MarkMode;

/// Upper bound on a mark tile edge. Extreme scale and rotation combinations
/// clamp here instead of attempting an unbounded allocation.
pub const MAX_TILE_DIM: u32 = 8192;

/// Axis-aligned bounding box of a `width` x `height` rectangle rotated about
/// its center by `degrees`.
pub fn rotated_bounds(width: f32, height: f32, degrees: f32) -> (f32, f32) {
    let radians = degrees.to_radians();
    let sin = radians.sin().abs();
    let cos = radians.cos().abs();
    (width * cos + height * sin, width * sin + height * cos)
}

/// Edge of the square tile holding one rotated mark instance. In tiled mode
/// the gap widens the tile so it doubles as the repeat period; an undersized
/// tile would clip rotated corners and show seams when repeated.
pub fn tile_edge(width: f32, height: f32, degrees: f32, gap: u32, mode: MarkMode) -> u32 {
    let (bounds_w, bounds_h) = rotated_bounds(width, height, degrees);
    let edge = bounds_w.max(bounds_h).ceil().max(1.0) as u32;
    let edge = match mode {
        MarkMode::Tiled => edge.saturating_add(gap),
        MarkMode::Single => edge,
    };
    edge.min(MAX_TILE_DIM)
}
