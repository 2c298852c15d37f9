//! Binary-safe wrapping of the stored document.
//!
//! The document is UTF-8 text carried as base64. Decoding must be two
//! steps (base64 to raw bytes, then bytes to UTF-8) because collapsing
//! them into a single pass corrupts multi-byte characters. Encoding
//! inverts exactly, and the decoder tolerates the line-wrapped base64 some
//! stores emit.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::SyncError;

/// UTF-8 string → bytes → base64.
pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// base64 → bytes → UTF-8 string. Embedded newlines are stripped first.
pub fn decode(wrapped: &str) -> Result<String, SyncError> {
    let compact: String = wrapped.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SyncError::Parse(format!("invalid base64 payload: {e}")))?;
    String::from_utf8(bytes).map_err(|e| SyncError::Parse(format!("payload is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multibyte_text() {
        let original = r#"{"title":"🦁 Ariel board — חתול task","note":"naïve café"}"#;
        let decoded = decode(&encode(original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn tolerates_line_wrapped_payloads() {
        let encoded = encode("🔨 multi-byte survives wrapping");
        let wrapped: String = encoded
            .as_bytes()
            .chunks(16)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(decode(&wrapped).unwrap(), "🔨 multi-byte survives wrapping");
    }

    #[test]
    fn rejects_invalid_base64_and_non_utf8() {
        assert!(matches!(decode("!!!"), Err(SyncError::Parse(_))));
        // 0xFF 0xFE is not valid UTF-8.
        let bad = STANDARD.encode([0xFFu8, 0xFE]);
        assert!(matches!(decode(&bad), Err(SyncError::Parse(_))));
    }
}
