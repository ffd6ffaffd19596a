//! Per-recipient mail storage on top of a [`KvStore`]
//!
//! Key layout:
//!
//! - `mail:{id}` full [`MailRecord`] as JSON
//! - `inbox:{recipient}` JSON array of [`InboxEntry`], newest first, capped
//! - `code:{recipient}:latest` [`VerificationCodeEntry`] with a TTL
//!
//! The recency index is maintained with an unguarded read-modify-write. Two
//! messages for the same recipient stored concurrently can race and one index
//! update can be lost. Evicting an entry from the index also leaves its
//! `mail:{id}` record in the store.

use crate::config::Config;
use crate::error::Result;
use crate::store::{KvStore, PutOptions};
use crate::types::{InboxEntry, MailId, MailRecord, VerificationCodeEntry};
use tracing::{debug, info, warn};

#[must_use]
pub fn mail_key(id: &MailId) -> String {
    format!("mail:{id}")
}

#[must_use]
pub fn inbox_key(recipient: &str) -> String {
    format!("inbox:{recipient}")
}

#[must_use]
pub fn code_key(recipient: &str) -> String {
    format!("code:{recipient}:latest")
}

/// Mail operations for all recipients of one store
pub struct Mailbox<'a, S: KvStore + ?Sized> {
    store: &'a S,
    config: &'a Config,
}

impl<'a, S: KvStore + ?Sized> Mailbox<'a, S> {
    pub const fn new(store: &'a S, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Persist a freshly assembled record: the record itself, its index
    /// entry and, when a code was found, the quick-access code entry
    pub async fn store_mail(&self, record: &MailRecord) -> Result<()> {
        self.store
            .put(
                &mail_key(&record.id),
                serde_json::to_string(record)?,
                PutOptions::default(),
            )
            .await?;

        let mut inbox = self.inbox(&record.to).await?;
        inbox.insert(0, record.summary());
        if inbox.len() > self.config.inbox_capacity {
            let evicted = inbox.split_off(self.config.inbox_capacity);
            debug!(
                recipient = %record.to,
                evicted = evicted.len(),
                "Inbox index full, dropping oldest entries"
            );
        }
        self.write_inbox(&record.to, &inbox).await?;

        if let Some(code) = &record.verification_code {
            let entry = VerificationCodeEntry {
                code: code.clone(),
                mail_id: record.id.clone(),
                timestamp: record.timestamp,
            };
            self.store
                .put(
                    &code_key(&record.to),
                    serde_json::to_string(&entry)?,
                    PutOptions::with_ttl(self.config.code_ttl_secs),
                )
                .await?;
        }

        info!(id = %record.id, to = %record.to, "Stored mail");
        Ok(())
    }

    /// Recency index of a recipient, newest first (empty when unknown)
    pub async fn inbox(&self, recipient: &str) -> Result<Vec<InboxEntry>> {
        match self.store.get(&inbox_key(recipient)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_inbox(&self, recipient: &str, inbox: &[InboxEntry]) -> Result<()> {
        self.store
            .put(
                &inbox_key(recipient),
                serde_json::to_string(inbox)?,
                PutOptions::default(),
            )
            .await
    }

    /// Full record by id, regardless of recipient
    pub async fn mail(&self, id: &MailId) -> Result<Option<MailRecord>> {
        match self.store.get(&mail_key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Fetch a recipient's mail and mark it read in the record and index.
    ///
    /// Returns `None` when the mail does not exist or belongs to someone
    /// else. A failure to update the index is logged, not returned.
    pub async fn open_mail(&self, id: &MailId, recipient: &str) -> Result<Option<MailRecord>> {
        let Some(mut record) = self.mail(id).await? else {
            return Ok(None);
        };
        if record.to != recipient {
            debug!(id = %id, owner = %record.to, recipient, "Mail belongs to another inbox");
            return Ok(None);
        }

        record.read = true;
        self.store
            .put(
                &mail_key(id),
                serde_json::to_string(&record)?,
                PutOptions::default(),
            )
            .await?;

        if let Err(e) = self.mark_indexed_read(recipient, id).await {
            warn!(error = %e, id = %id, "Failed to update read status in inbox index");
        }

        Ok(Some(record))
    }

    async fn mark_indexed_read(&self, recipient: &str, id: &MailId) -> Result<()> {
        let mut inbox = self.inbox(recipient).await?;
        if inbox.is_empty() {
            return Ok(());
        }
        for entry in inbox.iter_mut().filter(|e| &e.id == id) {
            entry.read = true;
        }
        self.write_inbox(recipient, &inbox).await
    }

    /// Delete a mail record and drop it from the recipient's index
    pub async fn delete_mail(&self, recipient: &str, id: &MailId) -> Result<()> {
        self.store.delete(&mail_key(id)).await?;

        let mut inbox = self.inbox(recipient).await?;
        if !inbox.is_empty() {
            inbox.retain(|entry| &entry.id != id);
            self.write_inbox(recipient, &inbox).await?;
        }

        info!(id = %id, recipient, "Deleted mail");
        Ok(())
    }

    /// Latest code entry, if one was stored and has not expired
    pub async fn latest_code(&self, recipient: &str) -> Result<Option<VerificationCodeEntry>> {
        match self.store.get(&code_key(recipient)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Newest record referenced by the index
    pub async fn latest_mail(&self, recipient: &str) -> Result<Option<MailRecord>> {
        match self.inbox(recipient).await?.first() {
            Some(entry) => self.mail(&entry.id).await,
            None => Ok(None),
        }
    }
}
