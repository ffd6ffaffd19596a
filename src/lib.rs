// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Inbound Mail Verification Code Extraction
//!
//! Turns raw inbound email into structured records for temporary inboxes and
//! detects the one-time verification code a transactional mail carries.
//!
//! # Pipeline
//!
//! - Byte decoding with UTF-8 → lenient UTF-8 → Latin-1 fallback
//! - Header/body splitting and flat multipart part tracking
//! - Quoted-printable and base64 transfer decoding with artifact cleanup
//! - A prioritized verification code cascade with a date/filler filter
//! - Record assembly and storage behind an abstract key-value store
//!
//! # Example
//!
//! ```rust
//! use inbox_otp::{Fallback, InboundMessage, assemble};
//!
//! let raw = b"Subject: Sign in\r\n\r\nYour verification code is 482913.";
//! let message = InboundMessage::new("noreply@example.com", "me@example.org")
//!     .with_header("Subject", "Sign in")
//!     .with_chunk(raw.to_vec());
//! let record = assemble(&message, Fallback::default(), 0);
//!
//! assert_eq!(record.verification_code.as_deref(), Some("482913"));
//! assert_eq!(record.subject, "Sign in");
//! ```

pub mod api;
mod charset;
mod config;
mod decode;
mod error;
mod extracted;
mod ingest;
pub mod mailbox;
mod parser;
mod store;
mod types;

pub use charset::{Decoded, Fallback, Fidelity, decode_bytes, decode_chunks};
pub use config::{
    Config, DEFAULT_CODE_TTL_SECS, DEFAULT_INBOX_CAPACITY, DEFAULT_LIST_LIMIT, MAX_CODE_TTL_SECS,
};
pub use decode::{cleanup, decode_base64, decode_parts, decode_quoted_printable};
pub use error::{IngestError, Result};
pub use extracted::*;
pub use ingest::{assemble, ingest};
pub use mailbox::Mailbox;
pub use parser::{
    ExtractionContext, Part, ScanState, TransferEncoding, find_boundary, parse_body,
};
pub use store::{KvStore, MemoryStore, PutOptions};
pub use types::*;
