//! Core types for ingested mail

use crate::charset::{Fallback, decode_chunks};
use mailparse::{MailAddr, MailHeader, MailHeaderMap};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Unique mail identifier: base-36 epoch milliseconds followed by a random
/// base-36 suffix. Collisions are unlikely, not impossible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MailId(pub String);

impl MailId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a message received at `timestamp_ms`
    #[must_use]
    pub fn generate(timestamp_ms: i64) -> Self {
        let mut rng = rand::rng();
        let mut id = to_base36(timestamp_ms.unsigned_abs());
        for _ in 0..ID_SUFFIX_LEN {
            id.push(char::from(BASE36[rng.random_range(0..BASE36.len())]));
        }
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        #[allow(clippy::cast_possible_truncation)]
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// Message as handed over by the mail transport
///
/// The body is kept as the chunks it arrived in; it is read once, in order.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// Envelope sender
    pub from: String,

    /// Envelope recipient (the inbox address)
    pub to: String,

    /// Header lookup, keys stored lower-cased, first value wins
    headers: HashMap<String, String>,

    /// Raw message bytes (headers and body)
    chunks: Vec<Vec<u8>>,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    /// Build a message from a complete `.eml`, taking sender, recipient and
    /// headers from the message itself
    #[must_use]
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut message = Self::default();

        match mailparse::parse_headers(raw) {
            Ok((headers, _)) => {
                message.from = headers
                    .get_first_header("From")
                    .and_then(first_address)
                    .unwrap_or_default();
                message.to = headers
                    .get_first_header("To")
                    .and_then(first_address)
                    .unwrap_or_default();
                for header in &headers {
                    message = message.with_header(header.get_key(), header.get_value());
                }
            }
            Err(e) => warn!(error = %e, "Could not parse message headers"),
        }

        message.with_chunk(raw.to_vec())
    }

    /// Add a header; later values for the same key are ignored
    #[must_use]
    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(key.as_ref().to_ascii_lowercase())
            .or_insert_with(|| value.into());
        self
    }

    /// Append a chunk of the raw byte stream
    #[must_use]
    pub fn with_chunk(mut self, chunk: impl Into<Vec<u8>>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.header("subject").unwrap_or_default()
    }

    /// Drain the byte stream into text
    #[must_use]
    pub fn raw_text(&self, fallback: Fallback) -> String {
        decode_chunks(&self.chunks, fallback).into_text()
    }
}

/// First mailbox of an address header; groups contribute their first member
fn first_address(header: &MailHeader<'_>) -> Option<String> {
    match mailparse::addrparse_header(header) {
        Ok(list) => list.iter().find_map(|addr| match addr {
            MailAddr::Single(info) => Some(info.addr.clone()),
            MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
        }),
        Err(e) => {
            warn!(header = %header.get_key(), error = %e, "Could not parse address header");
            None
        }
    }
}

/// Decoded text and html bodies. Empty means "no content found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedParts {
    pub text: String,
    pub html: String,
}

impl DecodedParts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.html.is_empty()
    }
}

/// A fully ingested mail as stored under `mail:{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailRecord {
    pub id: MailId,

    /// Recipient inbox address
    pub to: String,

    /// Sender address
    pub from: String,

    pub subject: String,

    /// Decoded plain text body
    pub text: String,

    /// Decoded html body
    pub html: String,

    /// Detected one-time code, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,

    /// Receive time, epoch milliseconds
    pub timestamp: i64,

    /// Set by the mailbox layer once the mail has been fetched
    pub read: bool,
}

impl MailRecord {
    /// Projection kept in the recency index
    #[must_use]
    pub fn summary(&self) -> InboxEntry {
        InboxEntry {
            id: self.id.clone(),
            from: self.from.clone(),
            subject: self.subject.clone(),
            timestamp: self.timestamp,
            read: self.read,
        }
    }
}

/// One entry of the per-recipient recency index (`inbox:{recipient}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub id: MailId,
    pub from: String,
    pub subject: String,
    pub timestamp: i64,
    pub read: bool,
}

/// Fast-path code lookup stored under `code:{recipient}:latest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCodeEntry {
    pub code: String,
    pub mail_id: MailId,
    pub timestamp: i64,
}
