use inkroom_shared::{
    Action, BlendMode, Handle, LineData, PastActionKind, Rect, Rgba, SelectionData, ShapeData,
    ShapeKind, StrokeData,
};

use crate::fill::apply_fill;
use crate::raster::Surface;
use crate::selection::{handle_position, HANDLE_SIZE};

const DASH: i32 = 4;
const DASH_DARK: Rgba = Rgba::new(26, 31, 42, 255);
const DASH_LIGHT: Rgba = Rgba::WHITE;

/// Redraws a live action from scratch into its member surface.
pub fn draw_action(surface: &mut Surface, action: &Action) {
    surface.clear();
    match action {
        Action::Stroke(stroke) => draw_stroke(surface, stroke),
        Action::Line(line) => draw_line(surface, line),
        Action::Rect(shape) => draw_shape(surface, ShapeKind::Rect, shape),
        Action::Ellipse(shape) => draw_shape(surface, ShapeKind::Ellipse, shape),
        Action::None
        | Action::Selecting(_)
        | Action::SelectionMove(_)
        | Action::SelectionResize { .. } => {}
    }
}

pub fn draw_stroke(surface: &mut Surface, stroke: &StrokeData) {
    surface.stroke(&stroke.points, stroke.style.width, stroke.style.color);
}

pub fn draw_line(surface: &mut Surface, line: &LineData) {
    surface.line(line.from, line.to, line.style.width, line.style.color);
}

pub fn draw_shape(surface: &mut Surface, kind: ShapeKind, shape: &ShapeData) {
    match kind {
        ShapeKind::Rect => surface.rect(shape.rect, &shape.style),
        ShapeKind::Ellipse => surface.ellipse(shape.rect, &shape.style),
    }
}

/// Applies one committed history entry to the committed canvas.
pub fn apply_past_action(canvas: &mut Surface, kind: &PastActionKind) {
    match kind {
        PastActionKind::Base(base) => *canvas = Surface::from_base(base),
        PastActionKind::Stroke(stroke) => {
            compose_scratch(canvas, stroke.style.opacity, stroke.style.blend, |scratch| {
                draw_stroke(scratch, stroke)
            })
        }
        PastActionKind::Line(line) => {
            compose_scratch(canvas, line.style.opacity, line.style.blend, |scratch| {
                draw_line(scratch, line)
            })
        }
        PastActionKind::Rect(shape) => {
            compose_scratch(canvas, shape.style.opacity, shape.style.blend, |scratch| {
                draw_shape(scratch, ShapeKind::Rect, shape)
            })
        }
        PastActionKind::Ellipse(shape) => {
            compose_scratch(canvas, shape.style.opacity, shape.style.blend, |scratch| {
                draw_shape(scratch, ShapeKind::Ellipse, shape)
            })
        }
        PastActionKind::Fill(fill) => apply_fill(canvas, fill),
        PastActionKind::SelectionPaste(paste) => {
            compose_scratch(canvas, 1.0, BlendMode::Normal, |scratch| {
                scratch.put_pixels_scaled(paste.rect, &paste.pixels, paste.flip_x, paste.flip_y)
            })
        }
        PastActionKind::SelectionClear(clear) => canvas.fill_rect(clear.rect, clear.color),
        PastActionKind::Clear(color) => canvas.fill(*color),
        PastActionKind::ClearBlank => canvas.clear(),
        PastActionKind::ResizeCanvas(size) => canvas.resize(size.width, size.height),
    }
}

fn compose_scratch(
    canvas: &mut Surface,
    opacity: f32,
    blend: BlendMode,
    draw: impl FnOnce(&mut Surface),
) {
    let mut scratch = Surface::new(canvas.width(), canvas.height());
    draw(&mut scratch);
    canvas.compose(&scratch, opacity, blend);
}

/// Draws a selection on top of the composited view: the floating payload,
/// a dashed outline and the eight resize handles.
pub fn draw_selection_overlay(view: &mut Surface, selection: &SelectionData) {
    let rect = selection.rect.normalized();
    if let Some(payload) = &selection.payload {
        let mut floating = Surface::new(view.width(), view.height());
        floating.put_pixels_scaled(rect, payload, selection.flip_x, selection.flip_y);
        view.compose(&floating, 1.0, BlendMode::Normal);
    }
    draw_dashed_rect(view, rect);
    if !rect.is_empty() {
        for handle in Handle::ALL {
            draw_handle(view, rect, handle);
        }
    }
}

/// Outline only; edges off the view are skipped and visible runs are
/// clipped, so the cost is bounded by the view size.
fn draw_dashed_rect(view: &mut Surface, rect: Rect) {
    let (width, height) = (view.width() as i32, view.height() as i32);
    let dash = |offset: i32| {
        if (offset / DASH) % 2 == 0 {
            DASH_DARK
        } else {
            DASH_LIGHT
        }
    };
    let (left, top, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());
    let (x0, x1) = (left.max(0), right.min(width - 1));
    let (y0, y1) = (top.max(0), bottom.min(height - 1));
    for y in [top, bottom] {
        if (0..height).contains(&y) {
            for x in x0..=x1 {
                view.set_pixel(x as u32, y as u32, dash(x.saturating_sub(left)));
            }
        }
    }
    for x in [left, right] {
        if (0..width).contains(&x) {
            for y in y0..=y1 {
                view.set_pixel(x as u32, y as u32, dash(y.saturating_sub(top)));
            }
        }
    }
}

fn draw_handle(view: &mut Surface, rect: Rect, handle: Handle) {
    let centre = handle_position(rect, handle);
    let half = HANDLE_SIZE / 2.0;
    view.fill_rect(
        Rect::new(
            (centre.x - half).round() as i32,
            (centre.y - half).round() as i32,
            HANDLE_SIZE as i32,
            HANDLE_SIZE as i32,
        ),
        DASH_DARK,
    );
}
