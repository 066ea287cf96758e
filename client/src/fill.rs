use inkroom_shared::{FillChannel, FillData, Rgba};

use crate::raster::Surface;

/// Flood fills from the seed in `fill` and returns the filled region as a
/// separate transparent surface. `None` when the seed is off the canvas.
pub fn flood_fill(source: &Surface, fill: &FillData) -> Option<Surface> {
    let width = source.width() as usize;
    let height = source.height() as usize;
    if fill.x < 0 || fill.y < 0 || fill.x as usize >= width || fill.y as usize >= height {
        return None;
    }
    let seed = source.pixel(fill.x as u32, fill.y as u32);
    let mut seen = vec![false; width * height];
    let mut out = Surface::new(source.width(), source.height());

    let open = |seen: &[bool], x: usize, y: usize| {
        !seen[y * width + x]
            && matches(
                seed,
                source.pixel(x as u32, y as u32),
                fill.threshold,
                fill.channel,
            )
    };

    let mut stack = vec![(fill.x as usize, fill.y as usize)];
    while let Some((x, mut y)) = stack.pop() {
        if !open(&seen, x, y) {
            continue;
        }
        while y > 0 && open(&seen, x, y - 1) {
            y -= 1;
        }
        let mut reach_left = false;
        let mut reach_right = false;
        while y < height && open(&seen, x, y) {
            seen[y * width + x] = true;
            out.set_pixel(x as u32, y as u32, fill.color);
            if x > 0 {
                if open(&seen, x - 1, y) {
                    if !reach_left {
                        stack.push((x - 1, y));
                        reach_left = true;
                    }
                } else {
                    reach_left = false;
                }
            }
            if x + 1 < width {
                if open(&seen, x + 1, y) {
                    if !reach_right {
                        stack.push((x + 1, y));
                        reach_right = true;
                    }
                } else {
                    reach_right = false;
                }
            }
            y += 1;
        }
    }
    Some(out)
}

/// Fills into a scratch buffer and composites it onto `canvas` in one pass.
pub fn apply_fill(canvas: &mut Surface, fill: &FillData) {
    if let Some(region) = flood_fill(canvas, fill) {
        canvas.compose(&region, fill.opacity, fill.blend);
    }
}

fn matches(seed: Rgba, candidate: Rgba, threshold: u8, channel: FillChannel) -> bool {
    let diff = |a: u8, b: u8| a.abs_diff(b);
    let distance = match channel {
        FillChannel::Rgba => diff(seed.r, candidate.r)
            .max(diff(seed.g, candidate.g))
            .max(diff(seed.b, candidate.b))
            .max(diff(seed.a, candidate.a)),
        FillChannel::Rgb => diff(seed.r, candidate.r)
            .max(diff(seed.g, candidate.g))
            .max(diff(seed.b, candidate.b)),
        FillChannel::Red => diff(seed.r, candidate.r),
        FillChannel::Green => diff(seed.g, candidate.g),
        FillChannel::Blue => diff(seed.b, candidate.b),
        FillChannel::Alpha => diff(seed.a, candidate.a),
    };
    distance <= threshold
}
