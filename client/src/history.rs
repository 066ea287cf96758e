//! Committed edit log with a cursor.
//!
//! The visible canvas is always the result of replaying entries `0..=pos`
//! in order, skipping disabled ones, starting from the base entry. Undo,
//! toggle and reorder never compute inverses; they replay.

use inkroom_shared::{
    BaseData, PastAction, PastActionKind, PixelBuffer, ShapeStyle, StrokeStyle, MAX_CANVAS_SIDE,
    MAX_STROKE_WIDTH,
};

use crate::raster::Surface;
use crate::render::apply_past_action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("history index {0} is out of range")]
    OutOfRange(i64),
    #[error("the base entry cannot be toggled or moved")]
    BaseImmutable,
    #[error("history does not start with a base entry")]
    MissingBase,
    #[error("history entry {0} is out of bounds")]
    InvalidEntry(usize),
}

#[derive(Clone, Debug)]
pub struct History {
    log: Vec<PastAction>,
    pos: usize,
    canvas: Surface,
}

impl History {
    pub fn new(base: BaseData) -> Self {
        let canvas = Surface::from_base(&base);
        Self {
            log: vec![PastAction::new(PastActionKind::Base(base))],
            pos: 0,
            canvas,
        }
    }

    pub fn log(&self) -> &[PastAction] {
        &self.log
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn canvas(&self) -> &Surface {
        &self.canvas
    }

    pub fn can_undo(&self) -> bool {
        self.pos > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pos + 1 < self.log.len()
    }

    /// Drops the redo branch and commits `kind` as the newest entry.
    pub fn append(&mut self, kind: PastActionKind) {
        self.log.truncate(self.pos + 1);
        apply_past_action(&mut self.canvas, &kind);
        self.log.push(PastAction::new(kind));
        self.pos = self.log.len() - 1;
    }

    pub fn move_to(&mut self, target: usize) -> Result<(), HistoryError> {
        if target >= self.log.len() {
            return Err(HistoryError::OutOfRange(target as i64));
        }
        if target < self.pos {
            self.pos = target;
            self.replay();
        } else if target > self.pos {
            for entry in &self.log[self.pos + 1..=target] {
                if entry.enabled {
                    apply_past_action(&mut self.canvas, &entry.kind);
                }
            }
            self.pos = target;
        }
        Ok(())
    }

    pub fn toggle_action(&mut self, index: usize) -> Result<(), HistoryError> {
        if index == 0 {
            return Err(HistoryError::BaseImmutable);
        }
        let entry = self
            .log
            .get_mut(index)
            .ok_or(HistoryError::OutOfRange(index as i64))?;
        entry.enabled = !entry.enabled;
        self.replay();
        Ok(())
    }

    /// Moves the entry at `index` to `index + offset`. The cursor stays
    /// where it is, so an entry can move in or out of the applied range.
    pub fn move_action(&mut self, index: usize, offset: i64) -> Result<(), HistoryError> {
        if index == 0 {
            return Err(HistoryError::BaseImmutable);
        }
        if index >= self.log.len() {
            return Err(HistoryError::OutOfRange(index as i64));
        }
        let target = index as i64 + offset;
        if target == 0 {
            return Err(HistoryError::BaseImmutable);
        }
        if target < 0 || target >= self.log.len() as i64 {
            return Err(HistoryError::OutOfRange(target));
        }
        if offset != 0 {
            let entry = self.log.remove(index);
            self.log.insert(target as usize, entry);
            self.replay();
        }
        Ok(())
    }

    /// Rebuilds the canvas from the base entry.
    pub fn replay(&mut self) {
        let mut entries = self.log[..=self.pos].iter();
        if let Some(PastAction {
            kind: PastActionKind::Base(base),
            ..
        }) = entries.next()
        {
            self.canvas = Surface::from_base(base);
        }
        for entry in entries.filter(|entry| entry.enabled) {
            apply_past_action(&mut self.canvas, &entry.kind);
        }
    }

    /// Starts over from a new base, e.g. after importing an image.
    pub fn reset(&mut self, base: BaseData) {
        *self = Self::new(base);
    }

    pub fn snapshot(&self) -> (Vec<PastAction>, usize) {
        (self.log.clone(), self.pos)
    }

    /// Replaces the log and cursor after validating them. On error nothing
    /// changes.
    pub fn restore(&mut self, log: Vec<PastAction>, pos: usize) -> Result<(), HistoryError> {
        validate(&log, pos)?;
        self.log = log;
        self.pos = pos;
        self.replay();
        Ok(())
    }
}

pub fn validate(log: &[PastAction], pos: usize) -> Result<(), HistoryError> {
    match log.first() {
        Some(PastAction {
            kind: PastActionKind::Base(_),
            ..
        }) => {}
        _ => return Err(HistoryError::MissingBase),
    }
    if log[1..]
        .iter()
        .any(|entry| matches!(entry.kind, PastActionKind::Base(_)))
    {
        return Err(HistoryError::MissingBase);
    }
    if let Some(index) = log.iter().position(|entry| !valid_entry(&entry.kind)) {
        return Err(HistoryError::InvalidEntry(index));
    }
    if pos >= log.len() {
        return Err(HistoryError::OutOfRange(pos as i64));
    }
    Ok(())
}

pub fn valid_size(width: u32, height: u32) -> bool {
    (1..=MAX_CANVAS_SIDE).contains(&width) && (1..=MAX_CANVAS_SIDE).contains(&height)
}

pub fn valid_pixels(pixels: &PixelBuffer) -> bool {
    pixels.width <= MAX_CANVAS_SIDE && pixels.height <= MAX_CANVAS_SIDE && pixels.is_valid()
}

pub fn valid_base(base: &BaseData) -> bool {
    valid_size(base.width, base.height) && base.image.as_ref().map_or(true, valid_pixels)
}

fn valid_opacity(opacity: f32) -> bool {
    (0.0..=1.0).contains(&opacity)
}

fn valid_width(width: f32) -> bool {
    (0.0..=MAX_STROKE_WIDTH).contains(&width)
}

fn valid_stroke_style(style: &StrokeStyle) -> bool {
    valid_width(style.width) && valid_opacity(style.opacity)
}

fn valid_shape_style(style: &ShapeStyle) -> bool {
    valid_width(style.width) && valid_opacity(style.opacity)
}

/// Whether an entry can be replayed with bounded memory and time.
pub fn valid_entry(kind: &PastActionKind) -> bool {
    match kind {
        PastActionKind::Base(base) => valid_base(base),
        PastActionKind::ResizeCanvas(size) => valid_size(size.width, size.height),
        PastActionKind::Stroke(stroke) => valid_stroke_style(&stroke.style),
        PastActionKind::Line(line) => valid_stroke_style(&line.style),
        PastActionKind::Rect(shape) | PastActionKind::Ellipse(shape) => {
            valid_shape_style(&shape.style) && shape.rect.is_bounded()
        }
        PastActionKind::Fill(fill) => valid_opacity(fill.opacity),
        PastActionKind::SelectionPaste(paste) => {
            paste.rect.is_bounded() && valid_pixels(&paste.pixels)
        }
        PastActionKind::SelectionClear(clear) => clear.rect.is_bounded(),
        PastActionKind::Clear(_) | PastActionKind::ClearBlank => true,
    }
}

#[cfg(test)]
mod tests {
    use inkroom_shared::{
        BlendMode, FillChannel, FillData, Point, Rect, Rgba, ResizeData, SelectionClearData,
        ShapeData, ShapeStyle, StrokeData, StrokeStyle,
    };
    use proptest::prelude::*;

    use super::*;

    fn stroke(x: f32, color: Rgba, blend: BlendMode) -> PastActionKind {
        PastActionKind::Stroke(StrokeData {
            style: StrokeStyle {
                color,
                width: 3.0,
                opacity: 0.8,
                blend,
            },
            points: vec![Point::new(x, 1.0), Point::new(x + 4.0, 14.0)],
        })
    }

    fn sample_entries() -> Vec<PastActionKind> {
        vec![
            stroke(2.0, Rgba::new(255, 0, 0, 255), BlendMode::Normal),
            PastActionKind::Fill(FillData {
                x: 15,
                y: 15,
                color: Rgba::new(0, 200, 0, 255),
                opacity: 1.0,
                blend: BlendMode::Normal,
                threshold: 10,
                channel: FillChannel::Rgb,
            }),
            stroke(6.0, Rgba::new(0, 0, 255, 255), BlendMode::Multiply),
            PastActionKind::Rect(ShapeData {
                style: ShapeStyle::default(),
                rect: Rect::new(3, 3, 8, 6),
            }),
            PastActionKind::SelectionClear(SelectionClearData {
                rect: Rect::new(0, 0, 3, 3),
                color: Rgba::TRANSPARENT,
            }),
        ]
    }

    fn history_with(entries: Vec<PastActionKind>) -> History {
        let mut history = History::new(BaseData::blank(16, 16));
        for entry in entries {
            history.append(entry);
        }
        history
    }

    /// Canvas produced by replaying from nothing but the log.
    fn rendered(history: &History) -> Surface {
        let mut fresh = history.clone();
        fresh.canvas = Surface::new(1, 1);
        fresh.replay();
        fresh.canvas
    }

    #[test]
    fn append_advances_cursor() {
        let history = history_with(sample_entries());
        assert_eq!(history.len(), 6);
        assert_eq!(history.pos(), 5);
        assert_eq!(history.canvas(), &rendered(&history));
    }

    #[test]
    fn append_discards_redo_branch() {
        let mut history = history_with(sample_entries());
        history.move_to(2).unwrap();
        history.append(PastActionKind::ClearBlank);
        assert_eq!(history.len(), 4);
        assert_eq!(history.pos(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_redo_round_trip() {
        let before = history_with(sample_entries()[..4].to_vec());
        let mut history = before.clone();
        history.append(sample_entries()[4].clone());
        let after_append = history.canvas().clone();
        let pos = history.pos();
        history.move_to(pos - 1).unwrap();
        assert_eq!(history.canvas(), before.canvas());
        history.move_to(pos).unwrap();
        assert_eq!(history.canvas(), &after_append);
    }

    #[test]
    fn move_to_current_position_is_noop() {
        let mut history = history_with(sample_entries());
        let canvas = history.canvas().clone();
        history.move_to(history.pos()).unwrap();
        assert_eq!(history.canvas(), &canvas);
        assert_eq!(
            history.move_to(history.len()),
            Err(HistoryError::OutOfRange(6))
        );
    }

    #[test]
    fn toggle_twice_restores_canvas() {
        let mut history = history_with(sample_entries());
        let original = history.canvas().clone();
        history.toggle_action(2).unwrap();
        assert!(!history.log()[2].enabled);
        assert_ne!(history.canvas(), &original);
        history.toggle_action(2).unwrap();
        assert!(history.log()[2].enabled);
        assert_eq!(history.canvas(), &original);
    }

    #[test]
    fn toggling_hides_an_old_entry_without_removing_it() {
        let mut history = history_with(vec![stroke(2.0, Rgba::BLACK, BlendMode::Normal)]);
        history.toggle_action(1).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.canvas(), &Surface::from_base(&BaseData::blank(16, 16)));
    }

    #[test]
    fn base_entry_is_immutable() {
        let mut history = history_with(sample_entries());
        assert_eq!(history.toggle_action(0), Err(HistoryError::BaseImmutable));
        assert_eq!(history.move_action(0, 1), Err(HistoryError::BaseImmutable));
        assert_eq!(history.move_action(2, -2), Err(HistoryError::BaseImmutable));
        assert_eq!(history.move_action(2, 9), Err(HistoryError::OutOfRange(11)));
    }

    #[test]
    fn reorder_is_a_permutation() {
        let mut history = history_with(sample_entries());
        let original_log = history.log().to_vec();
        let original = history.canvas().clone();
        history.move_action(1, 3).unwrap();
        assert_eq!(history.log()[4], original_log[1]);
        history.move_action(4, -3).unwrap();
        assert_eq!(history.log(), &original_log[..]);
        assert_eq!(history.canvas(), &original);
    }

    #[test]
    fn replay_honours_resize_entries() {
        let mut history = history_with(vec![PastActionKind::ResizeCanvas(ResizeData {
            width: 20,
            height: 4,
        })]);
        assert_eq!(history.canvas().width(), 20);
        history.move_to(0).unwrap();
        assert_eq!(history.canvas().width(), 16);
        history.move_to(1).unwrap();
        assert_eq!(history.canvas().height(), 4);
    }

    #[test]
    fn restore_rejects_logs_without_base() {
        let mut history = history_with(sample_entries());
        let before = history.snapshot();
        let bogus = vec![PastAction::new(PastActionKind::ClearBlank)];
        assert_eq!(history.restore(bogus, 0), Err(HistoryError::MissingBase));
        assert_eq!(history.snapshot(), before);
        let (log, _) = history.snapshot();
        assert_eq!(history.restore(log, 42), Err(HistoryError::OutOfRange(42)));
        assert_eq!(history.snapshot(), before);
    }

    #[test]
    fn restore_rejects_entries_that_cannot_be_replayed_cheaply() {
        let mut history = history_with(sample_entries());
        let before = history.snapshot();
        let base = || PastAction::new(PastActionKind::Base(BaseData::blank(4, 4)));

        let huge = vec![PastAction::new(PastActionKind::Base(BaseData::blank(200_000, 200_000)))];
        assert_eq!(history.restore(huge, 0), Err(HistoryError::InvalidEntry(0)));

        let resize = vec![
            base(),
            PastAction::new(PastActionKind::ResizeCanvas(ResizeData {
                width: MAX_CANVAS_SIDE + 1,
                height: 1,
            })),
        ];
        assert_eq!(history.restore(resize, 1), Err(HistoryError::InvalidEntry(1)));

        let style = StrokeStyle {
            width: f32::INFINITY,
            ..StrokeStyle::default()
        };
        let wide = vec![
            base(),
            PastAction::new(PastActionKind::Stroke(StrokeData {
                style,
                points: vec![Point::new(1.0, 1.0)],
            })),
        ];
        assert_eq!(history.restore(wide, 1), Err(HistoryError::InvalidEntry(1)));

        let far = vec![
            base(),
            PastAction::new(PastActionKind::SelectionClear(SelectionClearData {
                rect: Rect::new(0, 0, i32::MAX, 1),
                color: Rgba::BLACK,
            })),
        ];
        assert_eq!(history.restore(far, 1), Err(HistoryError::InvalidEntry(1)));
        assert_eq!(history.snapshot(), before);
    }

    proptest! {
        #[test]
        fn replay_matches_incremental_state(
            ops in proptest::collection::vec((0u8..4, 0usize..8, -3i64..4), 0..24)
        ) {
            let mut history = history_with(sample_entries());
            for (op, index, offset) in ops {
                let _ = match op {
                    0 => history.move_to(index % history.len()),
                    1 => history.toggle_action(index),
                    2 => history.move_action(index, offset),
                    _ => {
                        history.append(stroke(index as f32, Rgba::BLACK, BlendMode::Darken));
                        Ok(())
                    }
                };
                let once = rendered(&history);
                prop_assert_eq!(history.canvas(), &once);
                prop_assert_eq!(&rendered(&history), &once);
            }
        }
    }
}
