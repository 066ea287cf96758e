use inkroom_shared::{
    Handle, PasteData, Point, Rect, Rgba, SelectionClearData, SelectionData, MAX_COORD,
};

use crate::raster::Surface;

/// Visible size of a resize handle.
pub const HANDLE_SIZE: f32 = 8.0;
/// Distance from a handle centre that still grabs it.
pub const GRAB_MARGIN: f32 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionHit {
    Handle(Handle),
    Inside,
}

pub fn mirror_x(handle: Handle) -> Handle {
    match handle {
        Handle::NorthWest => Handle::NorthEast,
        Handle::NorthEast => Handle::NorthWest,
        Handle::East => Handle::West,
        Handle::West => Handle::East,
        Handle::SouthEast => Handle::SouthWest,
        Handle::SouthWest => Handle::SouthEast,
        Handle::North | Handle::South => handle,
    }
}

pub fn mirror_y(handle: Handle) -> Handle {
    match handle {
        Handle::NorthWest => Handle::SouthWest,
        Handle::SouthWest => Handle::NorthWest,
        Handle::North => Handle::South,
        Handle::South => Handle::North,
        Handle::NorthEast => Handle::SouthEast,
        Handle::SouthEast => Handle::NorthEast,
        Handle::East | Handle::West => handle,
    }
}

pub fn handle_position(rect: Rect, handle: Handle) -> Point {
    let left = rect.x as f32;
    let top = rect.y as f32;
    let right = rect.right() as f32;
    let bottom = rect.bottom() as f32;
    let mid_x = (left + right) / 2.0;
    let mid_y = (top + bottom) / 2.0;
    let (x, y) = match handle {
        Handle::NorthWest => (left, top),
        Handle::North => (mid_x, top),
        Handle::NorthEast => (right, top),
        Handle::East => (right, mid_y),
        Handle::SouthEast => (right, bottom),
        Handle::South => (mid_x, bottom),
        Handle::SouthWest => (left, bottom),
        Handle::West => (left, mid_y),
    };
    Point::new(x, y)
}

/// Handles win over the interior so a small selection can still be resized.
pub fn hit_test(rect: Rect, point: Point) -> Option<SelectionHit> {
    let rect = rect.normalized();
    for handle in Handle::ALL {
        let centre = handle_position(rect, handle);
        if (point.x - centre.x).abs() <= GRAB_MARGIN && (point.y - centre.y).abs() <= GRAB_MARGIN
        {
            return Some(SelectionHit::Handle(handle));
        }
    }
    rect.contains(point.x, point.y).then_some(SelectionHit::Inside)
}

pub trait SelectionGeometry {
    fn translate(&mut self, dx: i32, dy: i32);
    fn resize(&mut self, handle: Handle, dx: i32, dy: i32);
    fn normalize(&mut self, handle: Option<&mut Handle>);
    fn copy_from(&mut self, canvas: &Surface);
    fn cut(&mut self, canvas: &Surface, color: Rgba) -> SelectionClearData;
    fn paste_data(&self) -> Option<PasteData>;
    fn clear_data(&self, color: Rgba) -> SelectionClearData;
}

impl SelectionGeometry for SelectionData {
    fn translate(&mut self, dx: i32, dy: i32) {
        self.rect.x = self.rect.x.saturating_add(dx);
        self.rect.y = self.rect.y.saturating_add(dy);
        self.rect = self.rect.clamped();
    }

    /// Applies a drag to the edges owned by `handle`. The result may have a
    /// negative size until `normalize` runs.
    fn resize(&mut self, handle: Handle, dx: i32, dy: i32) {
        let rect = &mut self.rect;
        if matches!(handle, Handle::NorthWest | Handle::West | Handle::SouthWest) {
            let right = rect.right();
            rect.x = rect.x.saturating_add(dx).clamp(-MAX_COORD, MAX_COORD);
            rect.width = right.saturating_sub(rect.x);
        }
        if matches!(handle, Handle::NorthEast | Handle::East | Handle::SouthEast) {
            rect.width = rect.width.saturating_add(dx);
        }
        if matches!(handle, Handle::NorthWest | Handle::North | Handle::NorthEast) {
            let bottom = rect.bottom();
            rect.y = rect.y.saturating_add(dy).clamp(-MAX_COORD, MAX_COORD);
            rect.height = bottom.saturating_sub(rect.y);
        }
        if matches!(handle, Handle::SouthWest | Handle::South | Handle::SouthEast) {
            rect.height = rect.height.saturating_add(dy);
        }
        *rect = rect.clamped();
    }

    fn normalize(&mut self, mut handle: Option<&mut Handle>) {
        let normalized = self.rect.normalized();
        if self.rect.width < 0 {
            self.rect.x = normalized.x;
            self.rect.width = normalized.width;
            if self.payload.is_some() {
                self.flip_x = !self.flip_x;
            }
            if let Some(handle) = handle.as_deref_mut() {
                *handle = mirror_x(*handle);
            }
        }
        if self.rect.height < 0 {
            self.rect.y = normalized.y;
            self.rect.height = normalized.height;
            if self.payload.is_some() {
                self.flip_y = !self.flip_y;
            }
            if let Some(handle) = handle {
                *handle = mirror_y(*handle);
            }
        }
    }

    /// Only the part of the selection that lies on the canvas is kept.
    fn copy_from(&mut self, canvas: &Surface) {
        self.normalize(None);
        self.rect = self.rect.intersection(&canvas.bounds());
        self.payload = Some(canvas.get_pixels(self.rect));
        self.flip_x = false;
        self.flip_y = false;
    }

    /// Copies, then returns the entry that clears the source area.
    fn cut(&mut self, canvas: &Surface, color: Rgba) -> SelectionClearData {
        self.copy_from(canvas);
        self.clear_data(color)
    }

    fn paste_data(&self) -> Option<PasteData> {
        let pixels = self
            .payload
            .clone()
            .filter(|pixels| pixels.width > 0 && pixels.height > 0)?;
        Some(PasteData {
            rect: self.rect.normalized(),
            pixels,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
        })
    }

    fn clear_data(&self, color: Rgba) -> SelectionClearData {
        SelectionClearData {
            rect: self.rect.normalized(),
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use inkroom_shared::PixelBuffer;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn handles_hit_within_grab_margin() {
        let rect = Rect::new(10, 10, 100, 50);
        assert_eq!(
            hit_test(rect, Point::new(14.0, 15.0)),
            Some(SelectionHit::Handle(Handle::NorthWest))
        );
        assert_eq!(
            hit_test(rect, Point::new(110.0, 35.0)),
            Some(SelectionHit::Handle(Handle::East))
        );
        assert_eq!(hit_test(rect, Point::new(50.0, 30.0)), Some(SelectionHit::Inside));
        assert_eq!(hit_test(rect, Point::new(200.0, 30.0)), None);
    }

    #[test]
    fn dragging_west_handle_past_east_edge_mirrors_it() {
        let mut selection = SelectionData::new(Rect::new(10, 10, 20, 20));
        selection.payload = Some(PixelBuffer::new(20, 20));
        let mut handle = Handle::West;
        selection.resize(handle, 30, 0);
        selection.normalize(Some(&mut handle));
        assert_eq!(selection.rect, Rect::new(30, 10, 10, 20));
        assert_eq!(handle, Handle::East);
        assert!(selection.flip_x);
        assert!(!selection.flip_y);

        // Continuing the same drag now grows the rectangle to the right.
        selection.resize(handle, 5, 0);
        selection.normalize(Some(&mut handle));
        assert_eq!(selection.rect, Rect::new(30, 10, 15, 20));
    }

    #[test]
    fn corner_handle_mirrors_on_both_axes() {
        let mut selection = SelectionData::new(Rect::new(0, 0, 10, 10));
        let mut handle = Handle::NorthWest;
        selection.resize(handle, 15, 15);
        selection.normalize(Some(&mut handle));
        assert_eq!(handle, Handle::SouthEast);
        assert_eq!(selection.rect, Rect::new(10, 10, 5, 5));
        // Without a payload there is nothing to flip.
        assert!(!selection.flip_x && !selection.flip_y);
    }

    #[test]
    fn copy_captures_pixels_and_resets_flips() {
        let mut canvas = Surface::filled(4, 4, Rgba::WHITE);
        canvas.set_pixel(1, 1, Rgba::BLACK);
        let mut selection = SelectionData::new(Rect::new(3, 3, -2, -2));
        selection.flip_x = true;
        selection.copy_from(&canvas);
        let payload = selection.payload.as_ref().unwrap();
        assert_eq!((payload.width, payload.height), (2, 2));
        assert_eq!(payload.pixel(0, 0), Rgba::BLACK);
        assert!(!selection.flip_x);
    }

    #[test]
    fn cut_keeps_pixels_and_clears_source() {
        let mut canvas = Surface::filled(4, 4, Rgba::BLACK);
        let mut selection = SelectionData::new(Rect::new(1, 1, 2, 2));
        let clear = selection.cut(&canvas, Rgba::WHITE);
        assert_eq!(clear.rect, Rect::new(1, 1, 2, 2));
        canvas.fill_rect(clear.rect, clear.color);
        assert_eq!(canvas.pixel(1, 1), Rgba::WHITE);
        let paste = selection.paste_data().unwrap();
        assert_eq!(paste.pixels.pixel(1, 1), Rgba::BLACK);
    }

    #[test]
    fn extreme_drags_stay_pinned() {
        let mut selection = SelectionData::new(Rect::new(10, 10, 0, 0));
        selection.resize(Handle::SouthEast, i32::MAX, i32::MAX);
        selection.resize(Handle::SouthEast, i32::MAX, i32::MAX);
        assert!(selection.rect.is_bounded());
        assert_eq!(selection.rect.right(), MAX_COORD);

        selection.translate(i32::MIN, i32::MAX);
        selection.translate(i32::MIN, i32::MAX);
        assert_eq!((selection.rect.x, selection.rect.y), (-MAX_COORD, MAX_COORD));

        let mut handle = Handle::NorthWest;
        selection.resize(handle, i32::MAX, i32::MIN);
        selection.normalize(Some(&mut handle));
        assert!(selection.rect.is_bounded());
        assert!(selection.rect.width >= 0 && selection.rect.height >= 0);
        assert!(selection.rect.normalized().is_bounded());
    }

    #[test]
    fn copy_keeps_only_the_on_canvas_part() {
        let canvas = Surface::filled(8, 6, Rgba::BLACK);
        let mut selection = SelectionData::new(Rect::new(4, -3, MAX_COORD, MAX_COORD));
        selection.copy_from(&canvas);
        assert_eq!(selection.rect, Rect::new(4, 0, 4, 6));
        let payload = selection.payload.as_ref().unwrap();
        assert_eq!((payload.width, payload.height), (4, 6));

        let mut outside = SelectionData::new(Rect::new(100, 100, 5, 5));
        outside.copy_from(&canvas);
        assert!(outside.rect.is_empty());
        assert_eq!(outside.paste_data(), None);
    }

    proptest! {
        #[test]
        fn normalization_is_non_negative_and_idempotent(
            x in -500i32..500,
            y in -500i32..500,
            w in -500i32..500,
            h in -500i32..500,
            with_payload: bool,
            handle_index in 0usize..8,
        ) {
            let mut selection = SelectionData::new(Rect::new(x, y, w, h));
            if with_payload {
                selection.payload = Some(PixelBuffer::new(1, 1));
            }
            let mut handle = Handle::ALL[handle_index];
            selection.normalize(Some(&mut handle));
            prop_assert!(selection.rect.width >= 0 && selection.rect.height >= 0);
            prop_assert_eq!(selection.rect, Rect::new(x, y, w, h).normalized());

            let once = selection.clone();
            let handle_once = handle;
            selection.normalize(Some(&mut handle));
            prop_assert_eq!(selection, once);
            prop_assert_eq!(handle, handle_once);
        }
    }
}
