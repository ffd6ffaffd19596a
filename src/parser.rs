//! Header/body splitting and multipart part tracking
//!
//! This is a single-pass, non-recursive approximation of MIME parsing aimed
//! at machine-generated transactional mail with a flat `text/plain` +
//! `text/html` structure. It does not build a part tree: one content type and
//! one transfer encoding are "current" at any time, and every body line is
//! routed to the text or html buffer accordingly.

use crate::charset::Fallback;
use crate::decode::decode_parts;
use crate::types::DecodedParts;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static BOUNDARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)boundary[=:]\s*["']?([^"'\s;]+)"#).unwrap());

static HTML_TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content-type:\s*text/html").unwrap());

static PLAIN_TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content-type:\s*text/plain").unwrap());

static TRANSFER_ENCODING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content-transfer-encoding:([^:]*)").unwrap());

/// Logical body alternative a line belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Part {
    #[default]
    Text,
    Html,
}

/// Content-Transfer-Encoding in effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEncoding {
    #[default]
    None,
    Base64,
    QuotedPrintable,
}

impl TransferEncoding {
    /// Map a header value (`base64`, `Quoted-Printable`, ...) to an encoding.
    /// Anything unrecognised (`7bit`, `8bit`, `binary`) needs no decoding.
    #[must_use]
    pub fn from_header_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::None,
        }
    }
}

/// Position of the scan within the message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Headers,
    Body,
}

/// What a single line means to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Boundary,
    ContentType(Part),
    TransferEncoding(TransferEncoding),
    OtherMimeHeader,
    CharsetParameter,
    Content(&'a str),
}

impl<'a> LineKind<'a> {
    /// Classify a line. `boundary` is only passed while scanning the body.
    fn classify(line: &'a str, boundary: Option<&str>) -> Self {
        if line.trim().is_empty() {
            return Self::Blank;
        }
        if boundary.is_some_and(|b| line.contains(b)) {
            return Self::Boundary;
        }
        if HTML_TYPE_REGEX.is_match(line) {
            return Self::ContentType(Part::Html);
        }
        if PLAIN_TYPE_REGEX.is_match(line) {
            return Self::ContentType(Part::Text);
        }
        if let Some(caps) = TRANSFER_ENCODING_REGEX.captures(line) {
            let value = caps.get(1).map_or("", |m| m.as_str());
            return Self::TransferEncoding(TransferEncoding::from_header_value(value));
        }

        // Header names start at column 0. A folded `charset=` parameter is
        // indented, so only that prefix is matched after leading whitespace.
        if starts_with_ignore_case(line, "content-") {
            Self::OtherMimeHeader
        } else if starts_with_ignore_case(line.trim_start(), "charset=") {
            Self::CharsetParameter
        } else {
            Self::Content(line)
        }
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Per-message tracker state, threaded through the line scan
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    state: ScanState,
    current_part: Part,
    current_encoding: TransferEncoding,
    boundary: Option<String>,
    text: String,
    html: String,
}

impl ExtractionContext {
    /// Run the tracker over a complete raw message.
    #[must_use]
    pub fn scan(raw: &str) -> Self {
        let mut ctx = Self {
            boundary: find_boundary(raw),
            text: String::with_capacity(raw.len() / 2),
            html: String::with_capacity(raw.len() / 2),
            ..Self::default()
        };

        for line in raw.lines() {
            ctx.feed(line);
        }

        debug!(
            boundary = ?ctx.boundary,
            encoding = ?ctx.current_encoding,
            text_len = ctx.text.len(),
            html_len = ctx.html.len(),
            "Scanned message parts"
        );
        ctx
    }

    fn feed(&mut self, line: &str) {
        let boundary = match self.state {
            ScanState::Headers => None,
            ScanState::Body => self.boundary.as_deref(),
        };

        match (self.state, LineKind::classify(line, boundary)) {
            (ScanState::Headers, LineKind::Blank) => self.state = ScanState::Body,
            (_, LineKind::ContentType(part)) => self.current_part = part,
            (_, LineKind::TransferEncoding(encoding)) => self.current_encoding = encoding,
            (
                ScanState::Headers,
                LineKind::Boundary
                | LineKind::OtherMimeHeader
                | LineKind::CharsetParameter
                | LineKind::Content(_),
            )
            | (
                ScanState::Body,
                LineKind::Boundary | LineKind::OtherMimeHeader | LineKind::CharsetParameter,
            ) => {}
            (ScanState::Body, LineKind::Blank) => {
                if !(self.text.is_empty() && self.html.is_empty()) {
                    self.append("");
                }
            }
            (ScanState::Body, LineKind::Content(content)) => self.append(content),
        }
    }

    fn append(&mut self, line: &str) {
        let buffer = match self.current_part {
            Part::Text => &mut self.text,
            Part::Html => &mut self.html,
        };
        buffer.push_str(line);
        buffer.push('\n');
    }

    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    #[must_use]
    pub const fn current_part(&self) -> Part {
        self.current_part
    }

    /// The last transfer encoding announced anywhere in the message
    #[must_use]
    pub const fn current_encoding(&self) -> TransferEncoding {
        self.current_encoding
    }

    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Raw (still transfer-encoded) text buffer
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw (still transfer-encoded) html buffer
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Find the multipart boundary token anywhere in the raw message
#[must_use]
pub fn find_boundary(raw: &str) -> Option<String> {
    BOUNDARY_REGEX
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Split, track and decode a raw message into its text and html bodies
#[must_use]
pub fn parse_body(raw: &str, fallback: Fallback) -> DecodedParts {
    let ctx = ExtractionContext::scan(raw);
    decode_parts(&ctx.text, &ctx.html, ctx.current_encoding, fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_priority() {
        let boundary = Some("b1");
        assert_eq!(LineKind::classify("--b1", boundary), LineKind::Boundary);
        assert_eq!(
            LineKind::classify("Content-Type: text/html; boundary=b1", boundary),
            LineKind::Boundary
        );
        assert_eq!(
            LineKind::classify("Content-Type: text/html; charset=utf-8", None),
            LineKind::ContentType(Part::Html)
        );
        assert_eq!(
            LineKind::classify("CONTENT-TYPE:text/plain", None),
            LineKind::ContentType(Part::Text)
        );
        assert_eq!(
            LineKind::classify("Content-Transfer-Encoding: Base64 ", None),
            LineKind::TransferEncoding(TransferEncoding::Base64)
        );
        assert_eq!(
            LineKind::classify("Content-Disposition: inline", None),
            LineKind::OtherMimeHeader
        );
        assert_eq!(
            LineKind::classify("\tcharset=\"utf-8\"", None),
            LineKind::CharsetParameter
        );
        assert_eq!(
            LineKind::classify("  Content-rich updates inside", None),
            LineKind::Content("  Content-rich updates inside")
        );
        assert_eq!(LineKind::classify("  \t", None), LineKind::Blank);
        assert_eq!(LineKind::classify("hello", None), LineKind::Content("hello"));
    }

    #[test]
    fn test_transfer_encoding_values() {
        assert_eq!(
            TransferEncoding::from_header_value(" Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::from_header_value("7bit"), TransferEncoding::None);
        assert_eq!(TransferEncoding::from_header_value(""), TransferEncoding::None);
    }

    #[test]
    fn test_headers_then_body() {
        let ctx = ExtractionContext::scan("Subject: hi\r\nContent-Type: text/html\r\n\r\n<p>x</p>\r\n");
        assert_eq!(ctx.state(), ScanState::Body);
        assert_eq!(ctx.current_part(), Part::Html);
        assert_eq!(ctx.html(), "<p>x</p>\n");
        assert!(ctx.text().is_empty());
    }

    #[test]
    fn test_header_only_message() {
        let ctx = ExtractionContext::scan("Subject: hi\nFrom: a@b.c");
        assert_eq!(ctx.state(), ScanState::Headers);
        assert!(ctx.text().is_empty());
        assert!(ctx.html().is_empty());
    }

    #[test]
    fn test_leading_blank_lines_skipped() {
        let ctx = ExtractionContext::scan("Subject: hi\n\n\n\nbody\n\nmore\n");
        assert_eq!(ctx.text(), "body\n\nmore\n");
    }

    #[test]
    fn test_find_boundary_variants() {
        assert_eq!(
            find_boundary("Content-Type: multipart/alternative; boundary=\"abc123\"").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            find_boundary("Content-Type: multipart/mixed;\n\tBOUNDARY='xyz'; foo").as_deref(),
            Some("xyz")
        );
        assert_eq!(find_boundary("no multipart here"), None);
    }
}
