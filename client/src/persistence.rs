use inkroom_shared::{
    decode_canvas_file, encode_canvas_file, CanvasFileData, SessionFileDecodeError,
};

use crate::history::{History, HistoryError};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] SessionFileDecodeError),
    #[error("canvas file history is invalid: {0}")]
    History(#[from] HistoryError),
}

pub fn save(history: &History) -> Vec<u8> {
    let (log, pos) = history.snapshot();
    encode_canvas_file(&CanvasFileData {
        history: log,
        cursor: pos as u32,
    })
}

/// Same data as `save`, as JSON text.
pub fn save_text(history: &History) -> String {
    let (log, pos) = history.snapshot();
    serde_json::to_string(&CanvasFileData {
        history: log,
        cursor: pos as u32,
    })
    .unwrap_or_default()
}

/// Reads a binary canvas file, falling back to JSON text.
pub fn parse_load_payload_bytes(bytes: &[u8]) -> Result<CanvasFileData, SessionFileDecodeError> {
    match decode_canvas_file(bytes) {
        Ok(data) => Ok(data),
        Err(SessionFileDecodeError::InvalidData) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| serde_json::from_str::<CanvasFileData>(text.trim()).ok())
            .ok_or(SessionFileDecodeError::InvalidData),
        Err(err) => Err(err),
    }
}

/// Replaces the history with the one stored in `bytes`. The current log and
/// cursor are backed up first and put back on any failure, so a bad file
/// never leaves the history half loaded.
pub fn open(history: &mut History, bytes: &[u8]) -> Result<(), LoadError> {
    let (backup_log, backup_pos) = history.snapshot();
    let result = parse_load_payload_bytes(bytes)
        .map_err(LoadError::from)
        .and_then(|data| {
            history
                .restore(data.history, data.cursor as usize)
                .map_err(LoadError::from)
        });
    if let Err(err) = &result {
        log::warn!("canvas load failed: {err}");
        if history.restore(backup_log, backup_pos).is_err() {
            history.replay();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use inkroom_shared::{
        BaseData, BlendMode, PastAction, PastActionKind, Point, Rgba, StrokeData, StrokeStyle,
        CANVAS_FILE_MAGIC,
    };

    use super::*;

    fn drawn_history() -> History {
        let mut history = History::new(BaseData::blank(12, 12));
        history.append(PastActionKind::Stroke(StrokeData {
            style: StrokeStyle {
                color: Rgba::BLACK,
                width: 2.0,
                opacity: 1.0,
                blend: BlendMode::Normal,
            },
            points: vec![Point::new(1.0, 1.0), Point::new(10.0, 10.0)],
        }));
        history.append(PastActionKind::Clear(Rgba::new(0, 0, 255, 255)));
        history.move_to(1).unwrap();
        history
    }

    #[test]
    fn save_then_open_restores_log_cursor_and_canvas() {
        let saved = drawn_history();
        let bytes = save(&saved);
        let mut loaded = History::new(BaseData::blank(3, 3));
        open(&mut loaded, &bytes).unwrap();
        assert_eq!(loaded.snapshot(), saved.snapshot());
        assert_eq!(loaded.canvas(), saved.canvas());
    }

    #[test]
    fn json_text_is_accepted() {
        let saved = drawn_history();
        let text = save_text(&saved);
        let mut loaded = History::new(BaseData::blank(3, 3));
        open(&mut loaded, text.as_bytes()).unwrap();
        assert_eq!(loaded.canvas(), saved.canvas());
    }

    #[test]
    fn legacy_file_leaves_history_untouched() {
        let mut history = drawn_history();
        let before = history.snapshot();
        let canvas = history.canvas().clone();
        let mut bytes = save(&history);
        bytes[4..8].copy_from_slice(&1u32.to_le_bytes());
        assert_eq!(
            open(&mut history, &bytes),
            Err(LoadError::Decode(SessionFileDecodeError::UnsupportedVersion(1)))
        );
        assert_eq!(history.snapshot(), before);
        assert_eq!(history.canvas(), &canvas);
    }

    #[test]
    fn garbage_and_invalid_logs_are_rejected() {
        let mut history = drawn_history();
        let before = history.snapshot();
        assert_eq!(
            open(&mut history, b"not a canvas"),
            Err(LoadError::Decode(SessionFileDecodeError::InvalidData))
        );

        let mut truncated = CANVAS_FILE_MAGIC.to_vec();
        truncated.extend_from_slice(&2u32.to_le_bytes());
        truncated.push(7);
        assert!(open(&mut history, &truncated).is_err());

        let no_base = encode_canvas_file(&CanvasFileData {
            history: vec![PastAction::new(PastActionKind::ClearBlank)],
            cursor: 0,
        });
        assert_eq!(
            open(&mut history, &no_base),
            Err(LoadError::History(HistoryError::MissingBase))
        );
        assert_eq!(history.snapshot(), before);
    }

    #[test]
    fn files_that_would_not_fit_in_memory_are_rejected() {
        let mut history = drawn_history();
        let before = history.snapshot();
        let huge = encode_canvas_file(&CanvasFileData {
            history: vec![PastAction::new(PastActionKind::Base(BaseData::blank(
                u32::MAX,
                u32::MAX,
            )))],
            cursor: 0,
        });
        assert_eq!(
            open(&mut history, &huge),
            Err(LoadError::History(HistoryError::InvalidEntry(0)))
        );
        assert_eq!(history.snapshot(), before);
    }
}
