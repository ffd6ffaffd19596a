//! Record assembly: raw message in, stored [`MailRecord`] out

use crate::charset::Fallback;
use crate::config::Config;
use crate::error::Result;
use crate::extracted::ExtractedCode;
use crate::mailbox::Mailbox;
use crate::parser::parse_body;
use crate::store::KvStore;
use crate::types::{InboundMessage, MailId, MailRecord};
use chrono::Utc;
use tracing::{debug, info};

/// Decode a message and build its record, without touching storage
#[must_use]
pub fn assemble(message: &InboundMessage, fallback: Fallback, timestamp_ms: i64) -> MailRecord {
    let raw = message.raw_text(fallback);
    let parts = parse_body(&raw, fallback);
    let extracted = ExtractedCode::extract(&parts.text, &parts.html);

    debug!(
        text_len = parts.text.len(),
        html_len = parts.html.len(),
        code_pattern = ?extracted.as_ref().map(|found| found.pattern),
        "Decoded message"
    );

    MailRecord {
        id: MailId::generate(timestamp_ms),
        to: message.to.clone(),
        from: message.from.clone(),
        subject: message.subject().to_string(),
        text: parts.text,
        html: parts.html,
        verification_code: extracted.map(|found| found.code),
        timestamp: timestamp_ms,
        read: false,
    }
}

/// Assemble a record for `message` and persist it.
///
/// Storage failures are returned; the message is not retried.
pub async fn ingest<S: KvStore + ?Sized>(
    store: &S,
    config: &Config,
    message: &InboundMessage,
) -> Result<MailRecord> {
    info!(
        from = %message.from,
        to = %message.to,
        subject = message.subject(),
        "Received mail"
    );

    let record = assemble(message, config.fallback, Utc::now().timestamp_millis());
    Mailbox::new(store, config).store_mail(&record).await?;
    Ok(record)
}
