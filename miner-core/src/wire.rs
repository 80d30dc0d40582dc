use serde_json::Value;

use crate::error::DecodeError;

/// Байты, на которых заканчивается один ответ майнера.
/// Claymore/Ethminer завершают ответ `\n`, SGMiner - `\0`.
pub const FRAME_TERMINATORS: &[u8] = b"\n\0";

/// Ответ майнера ровно в том виде, в каком пришёл по сети
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Полезная нагрузка без хвостовых `\0`, `\r`, `\n` и пробелов
    pub fn payload(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .rposition(|b| !matches!(b, b'\0' | b'\r' | b'\n' | b' ' | b'\t'))
            .map_or(0, |i| i + 1);
        &self.bytes[..end]
    }

    /// JSON-значение ответа
    pub fn json(&self) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(self.payload())?)
    }
}

impl From<&str> for RawFrame {
    fn from(s: &str) -> Self {
        RawFrame::new(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_strips_line_and_nul_terminators() {
        let frame = RawFrame::new(b"{\"a\":1}\r\n\0".to_vec());
        assert_eq!(frame.payload(), b"{\"a\":1}");
        assert_eq!(frame.json().unwrap()["a"], 1);
    }

    #[test]
    fn payload_of_only_terminators_is_empty() {
        let frame = RawFrame::new(b"\n\0".to_vec());
        assert!(frame.payload().is_empty());
        assert!(!frame.is_empty());
    }

    #[test]
    fn garbage_is_json_error() {
        let frame = RawFrame::from("not json");
        assert!(matches!(frame.json(), Err(DecodeError::Json(_))));
    }
}
