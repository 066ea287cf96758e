use bincode::{Decode, Encode};

use crate::PastAction;

pub const CANVAS_FILE_MAGIC: [u8; 4] = *b"ICNV";
pub const CANVAS_FILE_VERSION: u32 = 2;
const CANVAS_HEADER_LEN: usize = CANVAS_FILE_MAGIC.len() + std::mem::size_of::<u32>();

#[derive(Clone, Debug, Default, PartialEq, Encode, Decode, serde::Serialize, serde::Deserialize)]
pub struct CanvasFileData {
    pub history: Vec<PastAction>,
    pub cursor: u32,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionFileDecodeError {
    #[error("unsupported canvas file version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid canvas file")]
    InvalidData,
}

pub fn encode_canvas_file(data: &CanvasFileData) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&CANVAS_FILE_MAGIC);
    payload.extend_from_slice(&CANVAS_FILE_VERSION.to_le_bytes());
    let body = bincode::encode_to_vec(data, bincode::config::standard()).unwrap_or_default();
    payload.extend_from_slice(&body);
    payload
}

pub fn decode_canvas_file(payload: &[u8]) -> Result<CanvasFileData, SessionFileDecodeError> {
    if !(payload.len() >= CANVAS_HEADER_LEN && payload.starts_with(&CANVAS_FILE_MAGIC)) {
        return Err(SessionFileDecodeError::InvalidData);
    }
    let version = u32::from_le_bytes(
        payload[CANVAS_FILE_MAGIC.len()..CANVAS_HEADER_LEN]
            .try_into()
            .map_err(|_| SessionFileDecodeError::InvalidData)?,
    );
    let body = &payload[CANVAS_HEADER_LEN..];
    match version {
        CANVAS_FILE_VERSION => bincode::decode_from_slice(body, bincode::config::standard())
            .map(|(data, _)| data)
            .map_err(|_| SessionFileDecodeError::InvalidData),
        _ => Err(SessionFileDecodeError::UnsupportedVersion(version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BaseData, PastActionKind};

    fn sample() -> CanvasFileData {
        CanvasFileData {
            history: vec![PastAction::new(PastActionKind::Base(BaseData::blank(4, 4)))],
            cursor: 0,
        }
    }

    #[test]
    fn header_carries_magic_and_version() {
        let payload = encode_canvas_file(&sample());
        assert!(payload.starts_with(&CANVAS_FILE_MAGIC));
        assert_eq!(payload[4..8], CANVAS_FILE_VERSION.to_le_bytes());
        assert_eq!(decode_canvas_file(&payload), Ok(sample()));
    }

    #[test]
    fn legacy_version_is_rejected() {
        let mut payload = encode_canvas_file(&sample());
        payload[4..8].copy_from_slice(&1u32.to_le_bytes());
        assert_eq!(
            decode_canvas_file(&payload),
            Err(SessionFileDecodeError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn truncated_body_is_invalid() {
        let payload = encode_canvas_file(&sample());
        assert_eq!(
            decode_canvas_file(&payload[..payload.len() - 3]),
            Err(SessionFileDecodeError::InvalidData)
        );
        assert_eq!(
            decode_canvas_file(b"nope"),
            Err(SessionFileDecodeError::InvalidData)
        );
    }
}
