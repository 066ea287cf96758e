//! Software RGBA surface used as the drawing backend.
//!
//! Everything here is integer or plain `f32` arithmetic with no
//! antialiasing, so two clients replaying the same history produce the same
//! bytes.

use inkroom_shared::{BaseData, BlendMode, PixelBuffer, Point, Rect, Rgba, ShapeStyle};

/// Smallest radius that still covers the pixel under a point.
const MIN_RADIUS: f32 = 0.75;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    pixels: PixelBuffer,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: PixelBuffer::new(width, height),
        }
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let mut surface = Self::new(width, height);
        surface.fill(color);
        surface
    }

    pub fn from_base(base: &BaseData) -> Self {
        let mut surface = Self::filled(base.width, base.height, base.background);
        if let Some(image) = base.image.as_ref().filter(|image| image.is_valid()) {
            surface.put_pixels(0, 0, image);
        }
        surface
    }

    pub fn width(&self) -> u32 {
        self.pixels.width
    }

    pub fn height(&self) -> u32 {
        self.pixels.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixels.pixel(x, y)
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        self.pixels.set_pixel(x, y, color);
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.data.iter().all(|byte| *byte == 0)
    }

    pub fn clear(&mut self) {
        self.pixels.data.fill(0);
    }

    pub fn fill(&mut self, color: Rgba) {
        let bytes = color.to_array();
        for chunk in self.pixels.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&bytes);
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        if let Some((x0, y0, x1, y1)) = self.clip(rect) {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.pixels.set_pixel(x, y, color);
                }
            }
        }
    }

    pub fn clear_rect(&mut self, rect: Rect) {
        self.fill_rect(rect, Rgba::TRANSPARENT);
    }

    /// Copies the pixels under `rect`; anything outside the surface reads as
    /// transparent.
    pub fn get_pixels(&self, rect: Rect) -> PixelBuffer {
        let rect = rect.normalized();
        let mut out = PixelBuffer::new(rect.width as u32, rect.height as u32);
        for dy in 0..rect.height {
            for dx in 0..rect.width {
                let (x, y) = (rect.x.saturating_add(dx), rect.y.saturating_add(dy));
                if x >= 0 && y >= 0 {
                    out.set_pixel(dx as u32, dy as u32, self.pixel(x as u32, y as u32));
                }
            }
        }
        out
    }

    /// Overwrites pixels starting at (`x`, `y`), clipped to the surface.
    pub fn put_pixels(&mut self, x: i32, y: i32, pixels: &PixelBuffer) {
        for sy in 0..pixels.height {
            for sx in 0..pixels.width {
                let (tx, ty) = (x.saturating_add(sx as i32), y.saturating_add(sy as i32));
                if tx >= 0 && ty >= 0 {
                    self.pixels
                        .set_pixel(tx as u32, ty as u32, pixels.pixel(sx, sy));
                }
            }
        }
    }

    /// Nearest-neighbour blit of `pixels` stretched over `rect`.
    pub fn put_pixels_scaled(&mut self, rect: Rect, pixels: &PixelBuffer, flip_x: bool, flip_y: bool) {
        let rect = rect.normalized();
        if rect.is_empty() || pixels.width == 0 || pixels.height == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = (x as i64 - rect.x as i64) as u64;
                let dy = (y as i64 - rect.y as i64) as u64;
                let mut sx = (dx * pixels.width as u64 / rect.width as u64) as u32;
                let mut sy = (dy * pixels.height as u64 / rect.height as u64) as u32;
                if flip_x {
                    sx = pixels.width - 1 - sx;
                }
                if flip_y {
                    sy = pixels.height - 1 - sy;
                }
                self.pixels.set_pixel(x, y, pixels.pixel(sx, sy));
            }
        }
    }

    /// Polyline with round caps and joins.
    pub fn stroke(&mut self, points: &[Point], width: f32, color: Rgba) {
        let radius = (width / 2.0).max(MIN_RADIUS);
        match points {
            [] => {}
            [point] => self.stamp_segment(*point, *point, radius, color),
            _ => {
                for window in points.windows(2) {
                    self.stamp_segment(window[0], window[1], radius, color);
                }
            }
        }
    }

    pub fn line(&mut self, from: Point, to: Point, width: f32, color: Rgba) {
        self.stroke(&[from, to], width, color);
    }

    pub fn rect(&mut self, rect: Rect, style: &ShapeStyle) {
        let rect = rect.normalized();
        if let Some(fill) = style.fill {
            self.fill_rect(rect, fill);
        }
        let Some(outline) = style.outline else {
            return;
        };
        let half = (style.width / 2.0).max(MIN_RADIUS / 2.0);
        let (left, top) = (rect.x as f32, rect.y as f32);
        let (right, bottom) = (rect.right() as f32, rect.bottom() as f32);
        let bounds = Rect::new(
            (left - half).floor() as i32,
            (top - half).floor() as i32,
            ((right - left + 2.0 * half).ceil() as i32).saturating_add(1),
            ((bottom - top + 2.0 * half).ceil() as i32).saturating_add(1),
        );
        self.for_each_in(bounds, |x, y| {
            let outer = x >= left - half && x <= right + half && y >= top - half && y <= bottom + half;
            let inner = x > left + half && x < right - half && y > top + half && y < bottom - half;
            outer && !inner
        }, outline);
    }

    pub fn ellipse(&mut self, rect: Rect, style: &ShapeStyle) {
        let rect = rect.normalized();
        let rx = rect.width as f32 / 2.0;
        let ry = rect.height as f32 / 2.0;
        let cx = rect.x as f32 + rx;
        let cy = rect.y as f32 + ry;
        if let Some(fill) = style.fill {
            self.for_each_in(rect, |x, y| inside_ellipse(x - cx, y - cy, rx, ry), fill);
        }
        let Some(outline) = style.outline else {
            return;
        };
        let half = (style.width / 2.0).max(MIN_RADIUS / 2.0);
        let bounds = Rect::new(
            (cx - rx - half).floor() as i32,
            (cy - ry - half).floor() as i32,
            ((2.0 * (rx + half)).ceil() as i32).saturating_add(1),
            ((2.0 * (ry + half)).ceil() as i32).saturating_add(1),
        );
        self.for_each_in(bounds, |x, y| {
            let (dx, dy) = (x - cx, y - cy);
            inside_ellipse(dx, dy, rx + half, ry + half)
                && !inside_ellipse(dx, dy, rx - half, ry - half)
        }, outline);
    }

    /// Composites `source` over this surface. `opacity` scales the source
    /// alpha before blending.
    pub fn compose(&mut self, source: &Surface, opacity: f32, blend: BlendMode) {
        let scale = opacity_scale(opacity);
        if scale == 0 {
            return;
        }
        let width = self.width().min(source.width()) as usize;
        let height = self.height().min(source.height()) as usize;
        for y in 0..height {
            let dst_row = y * self.width() as usize * 4;
            let src_row = y * source.width() as usize * 4;
            for x in 0..width {
                let src = &source.pixels.data[src_row + x * 4..src_row + x * 4 + 4];
                if src[3] == 0 {
                    continue;
                }
                let dst = &mut self.pixels.data[dst_row + x * 4..dst_row + x * 4 + 4];
                let out = composite(
                    [dst[0], dst[1], dst[2], dst[3]],
                    [src[0], src[1], src[2], src[3]],
                    scale,
                    blend,
                );
                dst.copy_from_slice(&out);
            }
        }
    }

    /// Changes the surface size, keeping the overlapping top-left region.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width() && height == self.height() {
            return;
        }
        let mut resized = Surface::new(width, height);
        resized.put_pixels(0, 0, &self.pixels);
        *self = resized;
    }

    fn clip(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let rect = rect.normalized();
        let x0 = rect.x.max(0) as i64;
        let y0 = rect.y.max(0) as i64;
        let x1 = (rect.right() as i64).min(self.width() as i64);
        let y1 = (rect.bottom() as i64).min(self.height() as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Sets every pixel in `bounds` whose centre satisfies `covered`.
    fn for_each_in(&mut self, bounds: Rect, covered: impl Fn(f32, f32) -> bool, color: Rgba) {
        let Some((x0, y0, x1, y1)) = self.clip(bounds) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                if covered(x as f32 + 0.5, y as f32 + 0.5) {
                    self.pixels.set_pixel(x, y, color);
                }
            }
        }
    }

    fn stamp_segment(&mut self, from: Point, to: Point, radius: f32, color: Rgba) {
        if !from.is_finite() || !to.is_finite() {
            return;
        }
        let bounds = Rect::new(
            (from.x.min(to.x) - radius).floor() as i32,
            (from.y.min(to.y) - radius).floor() as i32,
            (((from.x - to.x).abs() + 2.0 * radius).ceil() as i32).saturating_add(1),
            (((from.y - to.y).abs() + 2.0 * radius).ceil() as i32).saturating_add(1),
        );
        self.for_each_in(
            bounds,
            |x, y| distance_to_segment(x, y, from.x, from.y, to.x, to.y) <= radius,
            color,
        );
    }
}

fn inside_ellipse(dx: f32, dy: f32, rx: f32, ry: f32) -> bool {
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    (dx * dx) / (rx * rx) + (dy * dy) / (ry * ry) <= 1.0
}

pub fn distance_to_segment(px: f32, py: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    if dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON {
        return ((px - x1).powi(2) + (py - y1).powi(2)).sqrt();
    }
    let t = ((px - x1) * dx + (py - y1) * dy) / (dx * dx + dy * dy);
    let t = t.clamp(0.0, 1.0);
    let proj_x = x1 + t * dx;
    let proj_y = y1 + t * dy;
    ((px - proj_x).powi(2) + (py - proj_y).powi(2)).sqrt()
}

pub fn opacity_scale(opacity: f32) -> u32 {
    if !opacity.is_finite() {
        return 255;
    }
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u32
}

fn mul255(a: u32, b: u32) -> u32 {
    (a * b + 127) / 255
}

fn blend_channel(blend: BlendMode, src: u32, dst: u32) -> u32 {
    match blend {
        BlendMode::Normal | BlendMode::Erase => src,
        BlendMode::Multiply => mul255(src, dst),
        BlendMode::Screen => src + dst - mul255(src, dst),
        BlendMode::Darken => src.min(dst),
        BlendMode::Lighten => src.max(dst),
        BlendMode::Difference => src.abs_diff(dst),
    }
}

/// Non-premultiplied source-over with a separable blend function.
pub fn composite(dst: [u8; 4], src: [u8; 4], scale: u32, blend: BlendMode) -> [u8; 4] {
    let sa = mul255(src[3] as u32, scale);
    if sa == 0 {
        return dst;
    }
    let da = dst[3] as u32;
    if blend == BlendMode::Erase {
        return [dst[0], dst[1], dst[2], mul255(da, 255 - sa) as u8];
    }
    let back = mul255(da, 255 - sa);
    let out_a = sa + back;
    let mut out = [0u8; 4];
    for channel in 0..3 {
        let sc = src[channel] as u32;
        let dc = dst[channel] as u32;
        let mixed = if blend == BlendMode::Normal {
            sc
        } else {
            ((255 - da) * sc + da * blend_channel(blend, sc, dc) + 127) / 255
        };
        let value = (mixed * sa + dc * back + out_a / 2) / out_a;
        out[channel] = value.min(255) as u8;
    }
    out[3] = out_a.min(255) as u8;
    out
}
