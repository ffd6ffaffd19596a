//! Byte stream decoding with charset fallback

use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// What to do with bytes that are not valid UTF-8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Replace invalid sequences with U+FFFD and keep the rest as UTF-8
    #[default]
    LenientUtf8,
    /// Reinterpret the whole buffer as single-byte Latin-1
    Latin1,
}

/// Which rung of the decoding ladder produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fidelity {
    Utf8,
    LenientUtf8,
    Latin1,
}

/// Decoded text together with how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub fidelity: Fidelity,
}

impl Decoded {
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Concatenate byte chunks in order and decode them.
///
/// Never fails: invalid input degrades to a lossier decode.
pub fn decode_chunks<I, B>(chunks: I, fallback: Fallback) -> Decoded
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut buffer = Vec::new();
    for chunk in chunks {
        buffer.extend_from_slice(chunk.as_ref());
    }
    decode_bytes(&buffer, fallback)
}

/// Decode one contiguous buffer: strict UTF-8 first, then `fallback`.
#[must_use]
pub fn decode_bytes(bytes: &[u8], fallback: Fallback) -> Decoded {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: text.to_string(),
            fidelity: Fidelity::Utf8,
        };
    }

    let decoded = match fallback {
        Fallback::LenientUtf8 => {
            let (text, _) = UTF_8.decode_without_bom_handling(bytes);
            Decoded {
                text: text.into_owned(),
                fidelity: Fidelity::LenientUtf8,
            }
        }
        Fallback::Latin1 => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Decoded {
                text: text.into_owned(),
                fidelity: Fidelity::Latin1,
            }
        }
    };

    debug!(
        len = bytes.len(),
        fidelity = ?decoded.fidelity,
        "Input is not valid UTF-8, decoded with fallback"
    );
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8_is_strict() {
        let decoded = decode_bytes("验证码 123".as_bytes(), Fallback::LenientUtf8);
        assert_eq!(decoded.text, "验证码 123");
        assert_eq!(decoded.fidelity, Fidelity::Utf8);
    }

    #[test]
    fn test_bom_is_dropped() {
        let decoded = decode_bytes(b"\xEF\xBB\xBFhello", Fallback::LenientUtf8);
        assert_eq!(decoded.text, "hello");
    }

    #[test]
    fn test_invalid_utf8_lenient() {
        let decoded = decode_bytes(b"code \xFF 123456", Fallback::LenientUtf8);
        assert_eq!(decoded.fidelity, Fidelity::LenientUtf8);
        assert_eq!(decoded.text, "code \u{FFFD} 123456");
    }

    #[test]
    fn test_invalid_utf8_latin1() {
        let decoded = decode_bytes(b"caf\xE9", Fallback::Latin1);
        assert_eq!(decoded.fidelity, Fidelity::Latin1);
        assert_eq!(decoded.text, "café");
    }

    #[test]
    fn test_chunks_are_concatenated_in_order() {
        let chunks: Vec<&[u8]> = vec![b"Sub", b"ject: ", "验".as_bytes()];
        assert_eq!(decode_chunks(chunks, Fallback::default()).text, "Subject: 验");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let bytes = "码".as_bytes();
        let chunks = vec![bytes[..1].to_vec(), bytes[1..].to_vec()];
        let decoded = decode_chunks(chunks, Fallback::LenientUtf8);
        assert_eq!(decoded.text, "码");
        assert_eq!(decoded.fidelity, Fidelity::Utf8);
    }

    #[test]
    fn test_never_fails_on_any_byte() {
        let all: Vec<u8> = (0..=255).collect();
        for fallback in [Fallback::LenientUtf8, Fallback::Latin1] {
            let decoded = decode_bytes(&all, fallback);
            assert!(!decoded.text.is_empty());
            for b in &all {
                let _ = decode_bytes(&[*b, *b, 0x80], fallback);
            }
        }
        assert!(decode_chunks(Vec::<Vec<u8>>::new(), Fallback::default()).text.is_empty());
    }
}
