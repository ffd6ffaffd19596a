//! Transfer decoding of accumulated part bodies

use crate::charset::{Fallback, decode_bytes};
use crate::parser::TransferEncoding;
use crate::types::DecodedParts;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use quoted_printable::ParseMode;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Standard alphabet, padding optional, trailing bits tolerated
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

static SOFT_BREAK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=\r?\n").unwrap());

static LEAKED_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\Acharset=[^\r\n]*\r?\n\r?\n").unwrap());

static TRAILING_EQUALS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)=+(\r?)$").unwrap());

/// Decode both raw part buffers with the last-seen transfer encoding and
/// clean up leftover encoding artifacts
#[must_use]
pub fn decode_parts(
    text: &str,
    html: &str,
    encoding: TransferEncoding,
    fallback: Fallback,
) -> DecodedParts {
    let decode = |body: &str| -> String {
        let body = body.trim();
        match encoding {
            TransferEncoding::Base64 => decode_base64(body, fallback),
            TransferEncoding::QuotedPrintable => decode_quoted_printable(body, fallback),
            TransferEncoding::None => body.to_string(),
        }
    };

    DecodedParts {
        text: cleanup(&decode(text)),
        html: cleanup(&decode(html)),
    }
}

/// Decode a base64 body. Invalid input is returned unchanged.
#[must_use]
pub fn decode_base64(input: &str, fallback: Fallback) -> String {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return String::new();
    }

    match LENIENT_BASE64.decode(compact.as_bytes()) {
        Ok(bytes) => decode_bytes(&bytes, fallback).into_text(),
        Err(e) => {
            warn!(error = %e, len = input.len(), "Base64 decoding failed, keeping raw body");
            input.to_string()
        }
    }
}

/// Decode a quoted-printable body: join soft line breaks, unescape `=XX`,
/// then drop a leaked `charset=` preamble and stray trailing `=`.
///
/// Malformed escapes are kept literally. Raw 8-bit bytes in the body are
/// preserved rather than discarded.
#[must_use]
pub fn decode_quoted_printable(input: &str, fallback: Fallback) -> String {
    if input.is_empty() {
        return String::new();
    }

    let joined = SOFT_BREAK_REGEX.replace_all(input, "");
    let escaped = escape_eight_bit(&joined);
    let bytes = match quoted_printable::decode(&escaped, ParseMode::Robust) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, len = input.len(), "Quoted-printable decoding failed, keeping raw body");
            joined.as_bytes().to_vec()
        }
    };
    let text = decode_bytes(&bytes, fallback).into_text().replace("\r\n", "\n");

    let text = LEAKED_CHARSET_REGEX.replace(&text, "");
    TRAILING_EQUALS_REGEX
        .replace_all(&text, "$1")
        .trim()
        .to_string()
}

/// Re-encode non-ASCII bytes as `=XX` so the decoder passes them through
fn escape_eight_bit(input: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for b in input.bytes() {
        if b.is_ascii() {
            out.push(b);
        } else {
            out.extend_from_slice(format!("={b:02X}").as_bytes());
        }
    }
    out
}

/// Remove encoding artifacts left in a decoded body.
///
/// Applied until nothing changes, so `cleanup(cleanup(x)) == cleanup(x)`.
#[must_use]
pub fn cleanup(input: &str) -> String {
    let mut current = cleanup_once(input);
    loop {
        let next = cleanup_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn cleanup_once(input: &str) -> String {
    let s = LEAKED_CHARSET_REGEX.replace(input, "");
    let s = SOFT_BREAK_REGEX.replace_all(&s, "");
    let s = TRAILING_EQUALS_REGEX.replace_all(&s, "$1");
    s.trim().to_string()
}
